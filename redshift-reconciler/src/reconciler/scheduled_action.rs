//! Scheduled action reconciler.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redshift_api::resources::{
    CreateScheduledActionInput, ModifyScheduledActionInput, ScheduledAction,
    ScheduledActionTarget, scheduled_action_state,
};
use redshift_api::{FaultKind, RedshiftApi};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{
    Applied, Reconciler, absent_on_not_found, ensure_in_place, ignore_not_found, read_after_create,
};
use crate::config::ProviderContext;
use crate::diff::{changed, changed_opt};
use crate::error::{Error, Result};
use crate::finder::Finder;
use crate::kind::ResourceKind;
use crate::retry::RetryWhen;

const KIND: ResourceKind = ResourceKind::ScheduledAction;

fn enabled() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledActionConfig {
    pub name: String,
    pub target_action: ScheduledActionTarget,
    /// `at(...)` or `cron(...)`
    pub schedule: String,
    pub iam_role: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "enabled")]
    pub enable: bool,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduledActionState {
    pub name: String,
    pub target_action: ScheduledActionTarget,
    pub schedule: String,
    pub iam_role: String,
    pub description: Option<String>,
    pub enable: bool,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

impl From<ScheduledAction> for ScheduledActionState {
    fn from(action: ScheduledAction) -> Self {
        Self {
            enable: action.state == scheduled_action_state::ACTIVE,
            name: action.scheduled_action_name,
            target_action: action.target_action,
            schedule: action.schedule,
            iam_role: action.iam_role,
            description: action.scheduled_action_description,
            start_time: action.start_time,
            end_time: action.end_time,
        }
    }
}

/// Changed attributes only. `enable` is always sent when it changed.
fn modify_request(
    id: &str,
    old: &ScheduledActionConfig,
    new: &ScheduledActionConfig,
) -> ModifyScheduledActionInput {
    ModifyScheduledActionInput {
        scheduled_action_name: id.to_string(),
        target_action: changed(&old.target_action, &new.target_action),
        schedule: changed(&old.schedule, &new.schedule),
        iam_role: changed(&old.iam_role, &new.iam_role),
        scheduled_action_description: changed_opt(&old.description, &new.description),
        enable: changed(&old.enable, &new.enable),
        start_time: changed_opt(&old.start_time, &new.start_time),
        end_time: changed_opt(&old.end_time, &new.end_time),
    }
}

pub struct ScheduledActionReconciler {
    client: Arc<dyn RedshiftApi>,
    ctx: Arc<ProviderContext>,
}

impl ScheduledActionReconciler {
    pub fn new(client: Arc<dyn RedshiftApi>, ctx: Arc<ProviderContext>) -> Self {
        Self { client, ctx }
    }

    async fn find_state(&self, name: &str) -> Result<ScheduledActionState> {
        Finder::new(KIND, name, "DescribeScheduledActions")
            .find(
                move |marker| self.client.describe_scheduled_actions(Some(name), marker),
                |a: &ScheduledAction| a.scheduled_action_name == name,
            )
            .await
            .map(ScheduledActionState::from)
    }
}

#[async_trait]
impl Reconciler for ScheduledActionReconciler {
    type Config = ScheduledActionConfig;
    type State = ScheduledActionState;

    fn kind(&self) -> ResourceKind {
        KIND
    }

    async fn create(&self, config: &ScheduledActionConfig) -> Result<Applied<ScheduledActionState>> {
        info!("Creating {} {}", KIND, config.name);
        let input = CreateScheduledActionInput {
            scheduled_action_name: config.name.clone(),
            target_action: config.target_action.clone(),
            schedule: config.schedule.clone(),
            iam_role: config.iam_role.clone(),
            scheduled_action_description: config.description.clone(),
            enable: Some(config.enable),
            start_time: config.start_time,
            end_time: config.end_time,
        };
        let action = RetryWhen::new(
            KIND,
            &config.name,
            "creating",
            FaultKind::RolePropagation,
            self.ctx.timeouts().iam_propagation,
            self.ctx.poll(),
        )
        .run(move || self.client.create_scheduled_action(input.clone()))
        .await?;

        let id = action.scheduled_action_name;
        let key = id.as_str();
        let state = read_after_create(&self.ctx, KIND, key, move || self.find_state(key)).await?;
        Ok(Applied { id, state })
    }

    async fn read(&self, id: &str) -> Result<Option<ScheduledActionState>> {
        absent_on_not_found(KIND, id, self.find_state(id).await)
    }

    async fn update(
        &self,
        id: &str,
        old: &ScheduledActionConfig,
        new: &ScheduledActionConfig,
    ) -> Result<ScheduledActionState> {
        ensure_in_place(KIND, id, &[("name", old.name != new.name)])?;

        let input = modify_request(id, old, new);
        let unchanged = ModifyScheduledActionInput {
            scheduled_action_name: id.to_string(),
            ..Default::default()
        };
        if input != unchanged {
            info!("Updating {} {}", KIND, id);
            RetryWhen::new(
                KIND,
                id,
                "modifying",
                FaultKind::RolePropagation,
                self.ctx.timeouts().iam_propagation,
                self.ctx.poll(),
            )
            .run(move || self.client.modify_scheduled_action(input.clone()))
            .await?;
        }
        self.find_state(id).await
    }

    async fn delete(&self, id: &str, _config: &ScheduledActionConfig) -> Result<()> {
        info!("Deleting {} {}", KIND, id);
        let result = self
            .client
            .delete_scheduled_action(id)
            .await
            .map_err(|f| Error::api(KIND, id, "deleting", f));
        ignore_not_found(KIND, id, result)
    }

    async fn import(&self, raw_id: &str) -> Result<Applied<ScheduledActionState>> {
        let state = self.find_state(raw_id).await?;
        Ok(Applied {
            id: raw_id.to_string(),
            state,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pause() -> ScheduledActionConfig {
        ScheduledActionConfig {
            name: "nightly-pause".to_string(),
            target_action: ScheduledActionTarget::PauseCluster {
                cluster_identifier: "analytics".to_string(),
            },
            schedule: "cron(0 22 * * ? *)".to_string(),
            iam_role: "arn:aws:iam::123456789012:role/scheduler".to_string(),
            description: None,
            enable: true,
            start_time: None,
            end_time: None,
        }
    }

    #[test]
    fn test_modify_request_sends_changed_schedule_only() {
        let new = ScheduledActionConfig {
            schedule: "cron(0 23 * * ? *)".to_string(),
            ..pause()
        };
        let input = modify_request("nightly-pause", &pause(), &new);
        assert_eq!(input.schedule.as_deref(), Some("cron(0 23 * * ? *)"));
        assert_eq!(input.target_action, None);
        assert_eq!(input.iam_role, None);
        assert_eq!(input.enable, None);
    }

    #[test]
    fn test_disabling_is_sent_explicitly() {
        let new = ScheduledActionConfig {
            enable: false,
            ..pause()
        };
        assert_eq!(modify_request("nightly-pause", &pause(), &new).enable, Some(false));
    }
}
