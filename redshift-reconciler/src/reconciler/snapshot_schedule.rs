//! Snapshot schedule reconciler.
//!
//! A schedule with clusters attached cannot be deleted. With
//! `force_destroy` every attached cluster is detached first.

use std::sync::Arc;

use async_trait::async_trait;
use redshift_api::resources::{
    CreateSnapshotScheduleInput, DescribeSnapshotSchedulesInput, ModifySnapshotScheduleInput,
    SnapshotSchedule,
};
use redshift_api::{RedshiftApi, Tags};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::snapshot_schedule_association::disassociate;
use super::{
    Applied, Reconciler, absent_on_not_found, ensure_in_place, ignore_not_found, read_after_create,
    update_tags,
};
use crate::config::ProviderContext;
use crate::diff::same_set;
use crate::error::{Error, Result};
use crate::finder::Finder;
use crate::kind::ResourceKind;

const KIND: ResourceKind = ResourceKind::SnapshotSchedule;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotScheduleConfig {
    pub identifier: String,
    pub description: Option<String>,
    /// e.g. `rate(12 hours)` or `cron(0 3 * * ? *)`
    pub definitions: Vec<String>,
    /// Detach associated clusters before deleting.
    pub force_destroy: bool,
    pub tags: Tags,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotScheduleState {
    pub arn: String,
    pub identifier: String,
    pub description: Option<String>,
    pub definitions: Vec<String>,
    pub associated_clusters: Vec<String>,
    pub tags: Tags,
}

pub struct SnapshotScheduleReconciler {
    client: Arc<dyn RedshiftApi>,
    ctx: Arc<ProviderContext>,
}

impl SnapshotScheduleReconciler {
    pub fn new(client: Arc<dyn RedshiftApi>, ctx: Arc<ProviderContext>) -> Self {
        Self { client, ctx }
    }

    async fn find(&self, id: &str) -> Result<SnapshotSchedule> {
        Finder::new(KIND, id, "DescribeSnapshotSchedules")
            .find(
                move |marker| {
                    self.client
                        .describe_snapshot_schedules(DescribeSnapshotSchedulesInput {
                            schedule_identifier: Some(id.to_string()),
                            cluster_identifier: None,
                            marker,
                        })
                },
                |s: &SnapshotSchedule| s.schedule_identifier == id,
            )
            .await
    }

    async fn find_state(&self, id: &str) -> Result<SnapshotScheduleState> {
        let schedule = self.find(id).await?;
        Ok(SnapshotScheduleState {
            arn: self.ctx.arn.snapshot_schedule(id),
            identifier: schedule.schedule_identifier,
            description: schedule.schedule_description,
            definitions: schedule.schedule_definitions,
            associated_clusters: schedule
                .associated_clusters
                .into_iter()
                .map(|a| a.cluster_identifier)
                .collect(),
            tags: self.ctx.visible_tags(&schedule.tags),
        })
    }

    /// Detach every cluster still attached to the schedule, one at a time.
    async fn detach_all(&self, id: &str) -> Result<()> {
        let schedule = match self.find(id).await {
            Ok(schedule) => schedule,
            Err(e) if e.is_not_found() => return Ok(()),
            Err(e) => return Err(e),
        };
        for association in &schedule.associated_clusters {
            disassociate(
                self.client.as_ref(),
                &self.ctx,
                &association.cluster_identifier,
                id,
            )
            .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Reconciler for SnapshotScheduleReconciler {
    type Config = SnapshotScheduleConfig;
    type State = SnapshotScheduleState;

    fn kind(&self) -> ResourceKind {
        KIND
    }

    async fn create(&self, config: &SnapshotScheduleConfig) -> Result<Applied<SnapshotScheduleState>> {
        info!("Creating {} {}", KIND, config.identifier);
        let schedule = self
            .client
            .create_snapshot_schedule(CreateSnapshotScheduleInput {
                schedule_identifier: config.identifier.clone(),
                schedule_description: config.description.clone(),
                schedule_definitions: config.definitions.clone(),
                tags: self.ctx.effective_tags(&config.tags),
            })
            .await
            .map_err(|f| Error::api(KIND, &config.identifier, "creating", f))?;

        let id = schedule.schedule_identifier;
        let key = id.as_str();
        let state = read_after_create(&self.ctx, KIND, key, move || self.find_state(key)).await?;
        Ok(Applied { id, state })
    }

    async fn read(&self, id: &str) -> Result<Option<SnapshotScheduleState>> {
        absent_on_not_found(KIND, id, self.find_state(id).await)
    }

    async fn update(
        &self,
        id: &str,
        old: &SnapshotScheduleConfig,
        new: &SnapshotScheduleConfig,
    ) -> Result<SnapshotScheduleState> {
        ensure_in_place(
            KIND,
            id,
            &[
                ("identifier", old.identifier != new.identifier),
                ("description", old.description != new.description),
            ],
        )?;

        if !same_set(&old.definitions, &new.definitions) {
            info!("Updating definitions of {} {}", KIND, id);
            self.client
                .modify_snapshot_schedule(ModifySnapshotScheduleInput {
                    schedule_identifier: id.to_string(),
                    schedule_definitions: new.definitions.clone(),
                })
                .await
                .map_err(|f| Error::api(KIND, id, "modifying", f))?;
        }

        update_tags(
            self.client.as_ref(),
            &self.ctx,
            KIND,
            id,
            &self.ctx.arn.snapshot_schedule(id),
            &old.tags,
            &new.tags,
        )
        .await?;

        self.find_state(id).await
    }

    async fn delete(&self, id: &str, config: &SnapshotScheduleConfig) -> Result<()> {
        if config.force_destroy {
            self.detach_all(id).await?;
        }
        info!("Deleting {} {}", KIND, id);
        let result = self
            .client
            .delete_snapshot_schedule(id)
            .await
            .map_err(|f| Error::api(KIND, id, "deleting", f));
        ignore_not_found(KIND, id, result)
    }

    async fn import(&self, raw_id: &str) -> Result<Applied<SnapshotScheduleState>> {
        let state = self.find_state(raw_id).await?;
        Ok(Applied {
            id: raw_id.to_string(),
            state,
        })
    }
}
