//! Manual cluster snapshot reconciler.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redshift_api::resources::{
    ClusterSnapshot, CreateClusterSnapshotInput, ModifyClusterSnapshotInput, snapshot_status,
};
use redshift_api::{RedshiftApi, Tags};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{Applied, Reconciler, absent_on_not_found, ensure_in_place, ignore_not_found, update_tags};
use crate::config::ProviderContext;
use crate::diff::changed_opt;
use crate::error::{Error, Result};
use crate::finder::Finder;
use crate::kind::ResourceKind;
use crate::waiter::StateWaiter;

const KIND: ResourceKind = ResourceKind::ClusterSnapshot;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterSnapshotConfig {
    pub snapshot_identifier: String,
    pub cluster_identifier: String,
    /// Days to keep the snapshot, `-1` keeps it indefinitely.
    #[serde(default)]
    pub manual_snapshot_retention_period: Option<i64>,
    #[serde(default)]
    pub tags: Tags,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClusterSnapshotState {
    pub arn: String,
    pub snapshot_identifier: String,
    pub cluster_identifier: String,
    pub manual_snapshot_retention_period: i64,
    pub owner_account: String,
    pub kms_key_id: Option<String>,
    pub snapshot_create_time: Option<DateTime<Utc>>,
    pub tags: Tags,
}

pub struct ClusterSnapshotReconciler {
    client: Arc<dyn RedshiftApi>,
    ctx: Arc<ProviderContext>,
}

impl ClusterSnapshotReconciler {
    pub fn new(client: Arc<dyn RedshiftApi>, ctx: Arc<ProviderContext>) -> Self {
        Self { client, ctx }
    }

    async fn find(&self, id: &str) -> Result<ClusterSnapshot> {
        Finder::new(KIND, id, "DescribeClusterSnapshots")
            .find(
                move |marker| self.client.describe_cluster_snapshots(Some(id), marker),
                |s: &ClusterSnapshot| s.snapshot_identifier == id,
            )
            .await
    }

    fn project(&self, snapshot: ClusterSnapshot) -> ClusterSnapshotState {
        ClusterSnapshotState {
            arn: self
                .ctx
                .arn
                .snapshot(&snapshot.cluster_identifier, &snapshot.snapshot_identifier),
            tags: self.ctx.visible_tags(&snapshot.tags),
            snapshot_identifier: snapshot.snapshot_identifier,
            cluster_identifier: snapshot.cluster_identifier,
            manual_snapshot_retention_period: snapshot.manual_snapshot_retention_period,
            owner_account: snapshot.owner_account,
            kms_key_id: snapshot.kms_key_id,
            snapshot_create_time: snapshot.snapshot_create_time,
        }
    }
}

#[async_trait]
impl Reconciler for ClusterSnapshotReconciler {
    type Config = ClusterSnapshotConfig;
    type State = ClusterSnapshotState;

    fn kind(&self) -> ResourceKind {
        KIND
    }

    async fn create(&self, config: &ClusterSnapshotConfig) -> Result<Applied<ClusterSnapshotState>> {
        info!(
            "Creating {} {} of cluster {}",
            KIND, config.snapshot_identifier, config.cluster_identifier
        );
        let snapshot = self
            .client
            .create_cluster_snapshot(CreateClusterSnapshotInput {
                snapshot_identifier: config.snapshot_identifier.clone(),
                cluster_identifier: config.cluster_identifier.clone(),
                manual_snapshot_retention_period: config.manual_snapshot_retention_period,
                tags: self.ctx.effective_tags(&config.tags),
            })
            .await
            .map_err(|f| Error::api(KIND, &config.snapshot_identifier, "creating", f))?;

        let id = snapshot.snapshot_identifier;
        let name = id.as_str();
        let snapshot = StateWaiter::new(KIND, name, self.ctx.poll())
            .pending(&[snapshot_status::CREATING])
            .target(&[snapshot_status::AVAILABLE])
            .failure(&[snapshot_status::FAILED])
            .timeout(self.ctx.timeouts().snapshot_create)
            .until_state(move || self.find(name))
            .await?;
        let state = self.project(snapshot);
        Ok(Applied { id, state })
    }

    async fn read(&self, id: &str) -> Result<Option<ClusterSnapshotState>> {
        let found = self.find(id).await.map(|s| self.project(s));
        absent_on_not_found(KIND, id, found)
    }

    async fn update(
        &self,
        id: &str,
        old: &ClusterSnapshotConfig,
        new: &ClusterSnapshotConfig,
    ) -> Result<ClusterSnapshotState> {
        ensure_in_place(
            KIND,
            id,
            &[
                (
                    "snapshot_identifier",
                    old.snapshot_identifier != new.snapshot_identifier,
                ),
                (
                    "cluster_identifier",
                    old.cluster_identifier != new.cluster_identifier,
                ),
            ],
        )?;

        if let Some(period) = changed_opt(
            &old.manual_snapshot_retention_period,
            &new.manual_snapshot_retention_period,
        ) {
            info!("Updating retention of {} {} to {} days", KIND, id, period);
            self.client
                .modify_cluster_snapshot(ModifyClusterSnapshotInput {
                    snapshot_identifier: id.to_string(),
                    manual_snapshot_retention_period: Some(period),
                })
                .await
                .map_err(|f| Error::api(KIND, id, "modifying", f))?;
        }

        update_tags(
            self.client.as_ref(),
            &self.ctx,
            KIND,
            id,
            &self.ctx.arn.snapshot(&new.cluster_identifier, id),
            &old.tags,
            &new.tags,
        )
        .await?;

        let snapshot = self.find(id).await?;
        Ok(self.project(snapshot))
    }

    async fn delete(&self, id: &str, _config: &ClusterSnapshotConfig) -> Result<()> {
        info!("Deleting {} {}", KIND, id);
        let result = self
            .client
            .delete_cluster_snapshot(id)
            .await
            .map(|_| ())
            .map_err(|f| Error::api(KIND, id, "deleting", f));
        ignore_not_found(KIND, id, result)
    }

    async fn import(&self, raw_id: &str) -> Result<Applied<ClusterSnapshotState>> {
        let snapshot = self.find(raw_id).await?;
        Ok(Applied {
            id: raw_id.to_string(),
            state: self.project(snapshot),
        })
    }
}
