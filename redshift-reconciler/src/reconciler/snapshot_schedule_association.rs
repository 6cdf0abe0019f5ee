//! Snapshot schedule association reconciler.
//!
//! The association has no remote name; it is identified locally as
//! `cluster_identifier/schedule_identifier`.

use std::sync::Arc;

use async_trait::async_trait;
use redshift_api::resources::{
    ClusterAssociatedToSchedule, DescribeSnapshotSchedulesInput,
    ModifyClusterSnapshotScheduleInput, SnapshotSchedule, association_state,
};
use redshift_api::{FaultKind, RedshiftApi};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{Applied, Reconciler, absent_on_not_found, ensure_in_place};
use crate::config::ProviderContext;
use crate::error::{Error, Result};
use crate::finder::Finder;
use crate::identity::SNAPSHOT_SCHEDULE_ASSOCIATION;
use crate::kind::ResourceKind;
use crate::waiter::StateWaiter;

const KIND: ResourceKind = ResourceKind::SnapshotScheduleAssociation;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotScheduleAssociationConfig {
    pub cluster_identifier: String,
    pub schedule_identifier: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotScheduleAssociationState {
    pub cluster_identifier: String,
    pub schedule_identifier: String,
    pub schedule_association_state: String,
}

/// Look up the association of `cluster` with `schedule`.
pub(crate) async fn find_association(
    client: &dyn RedshiftApi,
    cluster: &str,
    schedule: &str,
) -> Result<ClusterAssociatedToSchedule> {
    let id = SNAPSHOT_SCHEDULE_ASSOCIATION.compose(&[cluster, schedule])?;
    let finder = Finder::new(KIND, &id, "DescribeSnapshotSchedules");
    let found = finder
        .find(
            move |marker| {
                client.describe_snapshot_schedules(DescribeSnapshotSchedulesInput {
                    schedule_identifier: Some(schedule.to_string()),
                    cluster_identifier: Some(cluster.to_string()),
                    marker,
                })
            },
            |s: &SnapshotSchedule| s.schedule_identifier == schedule,
        )
        .await?;
    found
        .associated_clusters
        .into_iter()
        .find(|a| a.cluster_identifier == cluster)
        .ok_or_else(|| finder.not_found("cluster is not associated".to_string()))
}

/// Detach `cluster` from `schedule` and wait until the association is gone.
/// A missing association counts as detached.
pub(crate) async fn disassociate(
    client: &dyn RedshiftApi,
    ctx: &ProviderContext,
    cluster: &str,
    schedule: &str,
) -> Result<()> {
    let id = SNAPSHOT_SCHEDULE_ASSOCIATION.compose(&[cluster, schedule])?;
    info!("Disassociating {} {}", KIND, id);
    let result = client
        .modify_cluster_snapshot_schedule(ModifyClusterSnapshotScheduleInput {
            cluster_identifier: cluster.to_string(),
            schedule_identifier: Some(schedule.to_string()),
            disassociate_schedule: true,
        })
        .await;
    match result {
        Ok(()) => {}
        Err(fault) if fault.is(FaultKind::NotFound) => {
            info!("{} ({}) already deleted", KIND, id);
            return Ok(());
        }
        Err(fault) => return Err(Error::api(KIND, &id, "disassociating", fault)),
    }

    StateWaiter::new(KIND, &id, ctx.poll())
        .pending(&[association_state::MODIFYING, association_state::ACTIVE])
        .failure(&[association_state::FAILED])
        .timeout(ctx.timeouts().schedule_association)
        .until_gone(move || find_association(client, cluster, schedule))
        .await
}

pub struct SnapshotScheduleAssociationReconciler {
    client: Arc<dyn RedshiftApi>,
    ctx: Arc<ProviderContext>,
}

impl SnapshotScheduleAssociationReconciler {
    pub fn new(client: Arc<dyn RedshiftApi>, ctx: Arc<ProviderContext>) -> Self {
        Self { client, ctx }
    }

    fn parse(id: &str) -> Result<(String, String)> {
        let mut parts = SNAPSHOT_SCHEDULE_ASSOCIATION.parse(id)?.into_iter();
        match (parts.next(), parts.next()) {
            (Some(cluster), Some(schedule)) => Ok((cluster, schedule)),
            _ => Err(Error::MalformedIdentifier {
                kind: KIND,
                id: id.to_string(),
                reason: "expected cluster_identifier/schedule_identifier".to_string(),
            }),
        }
    }

    async fn find_state(&self, cluster: &str, schedule: &str) -> Result<SnapshotScheduleAssociationState> {
        let association = find_association(self.client.as_ref(), cluster, schedule).await?;
        Ok(SnapshotScheduleAssociationState {
            cluster_identifier: association.cluster_identifier,
            schedule_identifier: schedule.to_string(),
            schedule_association_state: association.schedule_association_state,
        })
    }
}

#[async_trait]
impl Reconciler for SnapshotScheduleAssociationReconciler {
    type Config = SnapshotScheduleAssociationConfig;
    type State = SnapshotScheduleAssociationState;

    fn kind(&self) -> ResourceKind {
        KIND
    }

    async fn create(
        &self,
        config: &SnapshotScheduleAssociationConfig,
    ) -> Result<Applied<SnapshotScheduleAssociationState>> {
        let cluster = config.cluster_identifier.as_str();
        let schedule = config.schedule_identifier.as_str();
        let id = SNAPSHOT_SCHEDULE_ASSOCIATION.compose(&[cluster, schedule])?;
        info!("Creating {} {}", KIND, id);

        self.client
            .modify_cluster_snapshot_schedule(ModifyClusterSnapshotScheduleInput {
                cluster_identifier: cluster.to_string(),
                schedule_identifier: Some(schedule.to_string()),
                disassociate_schedule: false,
            })
            .await
            .map_err(|f| Error::api(KIND, &id, "creating", f))?;

        let client = self.client.as_ref();
        StateWaiter::new(KIND, &id, self.ctx.poll())
            .pending(&[association_state::MODIFYING])
            .target(&[association_state::ACTIVE])
            .failure(&[association_state::FAILED])
            .timeout(self.ctx.timeouts().schedule_association)
            .until_state(move || find_association(client, cluster, schedule))
            .await?;

        let state = self.find_state(cluster, schedule).await?;
        Ok(Applied { id, state })
    }

    async fn read(&self, id: &str) -> Result<Option<SnapshotScheduleAssociationState>> {
        let (cluster, schedule) = Self::parse(id)?;
        absent_on_not_found(KIND, id, self.find_state(&cluster, &schedule).await)
    }

    async fn update(
        &self,
        id: &str,
        old: &SnapshotScheduleAssociationConfig,
        new: &SnapshotScheduleAssociationConfig,
    ) -> Result<SnapshotScheduleAssociationState> {
        ensure_in_place(
            KIND,
            id,
            &[
                (
                    "cluster_identifier",
                    old.cluster_identifier != new.cluster_identifier,
                ),
                (
                    "schedule_identifier",
                    old.schedule_identifier != new.schedule_identifier,
                ),
            ],
        )?;
        let (cluster, schedule) = Self::parse(id)?;
        self.find_state(&cluster, &schedule).await
    }

    async fn delete(&self, id: &str, _config: &SnapshotScheduleAssociationConfig) -> Result<()> {
        let (cluster, schedule) = Self::parse(id)?;
        disassociate(self.client.as_ref(), &self.ctx, &cluster, &schedule).await
    }

    async fn import(&self, raw_id: &str) -> Result<Applied<SnapshotScheduleAssociationState>> {
        let (cluster, schedule) = Self::parse(raw_id)?;
        let state = self.find_state(&cluster, &schedule).await?;
        Ok(Applied {
            id: raw_id.to_string(),
            state,
        })
    }
}
