//! Declarative manifest applied by the command line tool.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use redshift_api::{MemoryRedshift, RedshiftApi, Tags};
use serde::{Deserialize, Serialize};
use tracing::info;

use redshift_reconciler::reconciler::cluster::ClusterConfig;
use redshift_reconciler::reconciler::snapshot_schedule::SnapshotScheduleConfig;
use redshift_reconciler::reconciler::subnet_group::SubnetGroupConfig;
use redshift_reconciler::reconciler::{
    AuthenticationProfileReconciler, ClusterReconciler, ClusterSnapshotReconciler,
    DataShareAuthorizationReconciler, DataShareConsumerAssociationReconciler,
    EndpointAccessReconciler, EndpointAuthorizationReconciler, EventSubscriptionReconciler,
    HsmClientCertificateReconciler, HsmConfigurationReconciler, IntegrationReconciler,
    PartnerReconciler, ScheduledActionReconciler, SnapshotScheduleAssociationReconciler,
    SnapshotScheduleReconciler, SubnetGroupReconciler, UsageLimitReconciler,
};
use redshift_reconciler::{Applied, ProviderContext, Reconciler, ResourceKind};

/// Resources to converge, in dependency order.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Manifest {
    /// Tags applied to every resource; resource tags win.
    pub default_tags: Tags,
    pub ignore_tag_prefixes: Vec<String>,
    pub subnet_groups: Vec<SubnetGroupConfig>,
    pub clusters: Vec<ClusterConfig>,
    pub snapshot_schedules: Vec<SnapshotScheduleConfig>,
}

impl Manifest {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read manifest {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse manifest {}", path.display()))
    }
}

/// One converged resource as printed by the tool.
#[derive(Debug, Serialize)]
pub struct Outcome {
    pub kind: ResourceKind,
    pub id: String,
    pub state: serde_json::Value,
}

impl Outcome {
    fn new<S: Serialize>(kind: ResourceKind, applied: Applied<S>) -> Result<Self> {
        Ok(Self {
            kind,
            id: applied.id,
            state: serde_json::to_value(applied.state)?,
        })
    }
}

/// Every reconciler wired to one simulated service.
pub struct Provider {
    client: Arc<dyn RedshiftApi>,
    ctx: Arc<ProviderContext>,
    subnet_groups: SubnetGroupReconciler,
    clusters: ClusterReconciler,
    snapshot_schedules: SnapshotScheduleReconciler,
}

impl Provider {
    pub fn new(sim: MemoryRedshift, ctx: ProviderContext) -> Self {
        let client: Arc<dyn RedshiftApi> = Arc::new(sim);
        let ctx = Arc::new(ctx);
        Self {
            subnet_groups: SubnetGroupReconciler::new(client.clone(), ctx.clone()),
            clusters: ClusterReconciler::new(client.clone(), ctx.clone()),
            snapshot_schedules: SnapshotScheduleReconciler::new(client.clone(), ctx.clone()),
            client,
            ctx,
        }
    }

    /// Create every resource of `manifest`, in order.
    pub async fn apply(&self, manifest: &Manifest) -> Result<Vec<Outcome>> {
        let mut outcomes = Vec::new();
        for config in &manifest.subnet_groups {
            let applied = self
                .subnet_groups
                .create(config)
                .await
                .with_context(|| format!("failed to apply subnet group {}", config.name))?;
            outcomes.push(Outcome::new(ResourceKind::SubnetGroup, applied)?);
        }
        for config in &manifest.clusters {
            let applied = self
                .clusters
                .create(config)
                .await
                .with_context(|| format!("failed to apply cluster {}", config.cluster_identifier))?;
            outcomes.push(Outcome::new(ResourceKind::Cluster, applied)?);
        }
        for config in &manifest.snapshot_schedules {
            let applied = self
                .snapshot_schedules
                .create(config)
                .await
                .with_context(|| format!("failed to apply snapshot schedule {}", config.identifier))?;
            outcomes.push(Outcome::new(ResourceKind::SnapshotSchedule, applied)?);
        }
        info!("Applied {} resources", outcomes.len());
        Ok(outcomes)
    }

    /// Delete the resources of `outcomes` in reverse order.
    pub async fn destroy(&self, manifest: &Manifest, outcomes: &[Outcome]) -> Result<()> {
        for (config, outcome) in manifest
            .snapshot_schedules
            .iter()
            .zip(outcomes_of(outcomes, ResourceKind::SnapshotSchedule))
        {
            self.snapshot_schedules
                .delete(&outcome.id, config)
                .await
                .with_context(|| format!("failed to destroy snapshot schedule {}", outcome.id))?;
        }
        for (config, outcome) in manifest
            .clusters
            .iter()
            .zip(outcomes_of(outcomes, ResourceKind::Cluster))
        {
            self.clusters
                .delete(&outcome.id, config)
                .await
                .with_context(|| format!("failed to destroy cluster {}", outcome.id))?;
        }
        for (config, outcome) in manifest
            .subnet_groups
            .iter()
            .zip(outcomes_of(outcomes, ResourceKind::SubnetGroup))
        {
            self.subnet_groups
                .delete(&outcome.id, config)
                .await
                .with_context(|| format!("failed to destroy subnet group {}", outcome.id))?;
        }
        Ok(())
    }

    /// Parse `raw_id` as an identifier of `kind` and read the resource.
    pub async fn import(&self, kind: ResourceKind, raw_id: &str) -> Result<Outcome> {
        let client = self.client.clone();
        let ctx = self.ctx.clone();
        match kind {
            ResourceKind::Cluster => import(&self.clusters, raw_id).await,
            ResourceKind::SubnetGroup => import(&self.subnet_groups, raw_id).await,
            ResourceKind::SnapshotSchedule => import(&self.snapshot_schedules, raw_id).await,
            ResourceKind::SnapshotScheduleAssociation => {
                import(&SnapshotScheduleAssociationReconciler::new(client, ctx), raw_id).await
            }
            ResourceKind::ScheduledAction => {
                import(&ScheduledActionReconciler::new(client, ctx), raw_id).await
            }
            ResourceKind::UsageLimit => import(&UsageLimitReconciler::new(client, ctx), raw_id).await,
            ResourceKind::EndpointAccess => {
                import(&EndpointAccessReconciler::new(client, ctx), raw_id).await
            }
            ResourceKind::ClusterSnapshot => {
                import(&ClusterSnapshotReconciler::new(client, ctx), raw_id).await
            }
            ResourceKind::HsmClientCertificate => {
                import(&HsmClientCertificateReconciler::new(client, ctx), raw_id).await
            }
            ResourceKind::Partner => import(&PartnerReconciler::new(client, ctx), raw_id).await,
            ResourceKind::DataShareAuthorization => {
                import(&DataShareAuthorizationReconciler::new(client, ctx), raw_id).await
            }
            ResourceKind::DataShareConsumerAssociation => {
                import(&DataShareConsumerAssociationReconciler::new(client, ctx), raw_id).await
            }
            ResourceKind::EventSubscription => {
                import(&EventSubscriptionReconciler::new(client, ctx), raw_id).await
            }
            ResourceKind::EndpointAuthorization => {
                import(&EndpointAuthorizationReconciler::new(client, ctx), raw_id).await
            }
            ResourceKind::HsmConfiguration => {
                import(&HsmConfigurationReconciler::new(client, ctx), raw_id).await
            }
            ResourceKind::AuthenticationProfile => {
                import(&AuthenticationProfileReconciler::new(client, ctx), raw_id).await
            }
            ResourceKind::Integration => {
                import(&IntegrationReconciler::new(client, ctx), raw_id).await
            }
        }
    }
}

fn outcomes_of(outcomes: &[Outcome], kind: ResourceKind) -> impl Iterator<Item = &Outcome> {
    outcomes.iter().filter(move |o| o.kind == kind)
}

async fn import<R>(reconciler: &R, raw_id: &str) -> Result<Outcome>
where
    R: Reconciler,
    R::State: Serialize,
{
    let kind = reconciler.kind();
    let applied = reconciler
        .import(raw_id)
        .await
        .with_context(|| format!("failed to import {} {:?}", kind, raw_id))?;
    Outcome::new(kind, applied)
}
