//! Event subscription reconciler.
//!
//! A subscription only starts delivering once the service confirmed it can
//! publish to the SNS topic, so create waits for `active`.

use std::sync::Arc;

use async_trait::async_trait;
use redshift_api::resources::{
    CreateEventSubscriptionInput, EventSubscription, ModifyEventSubscriptionInput,
    event_subscription_status,
};
use redshift_api::{RedshiftApi, Tags};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{
    Applied, Reconciler, absent_on_not_found, ensure_in_place, ignore_not_found, update_tags,
};
use crate::config::ProviderContext;
use crate::diff::{changed, changed_opt, same_set};
use crate::error::{Error, Result};
use crate::finder::Finder;
use crate::kind::ResourceKind;
use crate::waiter::StateWaiter;

const KIND: ResourceKind = ResourceKind::EventSubscription;

const PENDING: &[&str] = &[event_subscription_status::CREATING];
const ACTIVE: &[&str] = &[event_subscription_status::ACTIVE];
const BROKEN: &[&str] = &[
    event_subscription_status::NO_PERMISSION,
    event_subscription_status::TOPIC_NOT_EXIST,
];

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSubscriptionConfig {
    pub name: String,
    pub sns_topic_arn: String,
    #[serde(default)]
    pub source_type: Option<String>,
    #[serde(default)]
    pub source_ids: Vec<String>,
    #[serde(default)]
    pub event_categories: Vec<String>,
    /// `ERROR` or `INFO`
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub tags: Tags,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventSubscriptionState {
    pub arn: String,
    pub name: String,
    pub customer_aws_id: String,
    pub sns_topic_arn: String,
    pub status: String,
    pub source_type: Option<String>,
    pub source_ids: Vec<String>,
    pub event_categories: Vec<String>,
    pub severity: Option<String>,
    pub enabled: bool,
    pub tags: Tags,
}

pub struct EventSubscriptionReconciler {
    client: Arc<dyn RedshiftApi>,
    ctx: Arc<ProviderContext>,
}

impl EventSubscriptionReconciler {
    pub fn new(client: Arc<dyn RedshiftApi>, ctx: Arc<ProviderContext>) -> Self {
        Self { client, ctx }
    }

    async fn find(&self, name: &str) -> Result<EventSubscription> {
        Finder::new(KIND, name, "DescribeEventSubscriptions")
            .find(
                move |marker| self.client.describe_event_subscriptions(Some(name), marker),
                |s: &EventSubscription| s.cust_subscription_id == name,
            )
            .await
    }

    fn project(&self, subscription: EventSubscription) -> EventSubscriptionState {
        EventSubscriptionState {
            arn: self
                .ctx
                .arn
                .event_subscription(&subscription.cust_subscription_id),
            name: subscription.cust_subscription_id,
            customer_aws_id: subscription.customer_aws_id,
            sns_topic_arn: subscription.sns_topic_arn,
            status: subscription.status,
            source_type: subscription.source_type,
            source_ids: subscription.source_ids,
            event_categories: subscription.event_categories,
            severity: subscription.severity,
            enabled: subscription.enabled,
            tags: self.ctx.visible_tags(&subscription.tags),
        }
    }

    fn modify_request(
        id: &str,
        old: &EventSubscriptionConfig,
        new: &EventSubscriptionConfig,
    ) -> Option<ModifyEventSubscriptionInput> {
        let request = ModifyEventSubscriptionInput {
            subscription_name: id.to_string(),
            sns_topic_arn: changed(&old.sns_topic_arn, &new.sns_topic_arn),
            source_type: changed_opt(&old.source_type, &new.source_type),
            source_ids: (!same_set(&old.source_ids, &new.source_ids))
                .then(|| new.source_ids.clone()),
            event_categories: (!same_set(&old.event_categories, &new.event_categories))
                .then(|| new.event_categories.clone()),
            severity: changed_opt(&old.severity, &new.severity),
            enabled: changed(&old.enabled, &new.enabled),
        };
        let unchanged = ModifyEventSubscriptionInput {
            subscription_name: id.to_string(),
            ..Default::default()
        };
        (request != unchanged).then_some(request)
    }
}

#[async_trait]
impl Reconciler for EventSubscriptionReconciler {
    type Config = EventSubscriptionConfig;
    type State = EventSubscriptionState;

    fn kind(&self) -> ResourceKind {
        KIND
    }

    async fn create(
        &self,
        config: &EventSubscriptionConfig,
    ) -> Result<Applied<EventSubscriptionState>> {
        info!("Creating {} {}", KIND, config.name);
        let subscription = self
            .client
            .create_event_subscription(CreateEventSubscriptionInput {
                subscription_name: config.name.clone(),
                sns_topic_arn: config.sns_topic_arn.clone(),
                source_type: config.source_type.clone(),
                source_ids: config.source_ids.clone(),
                event_categories: config.event_categories.clone(),
                severity: config.severity.clone(),
                enabled: Some(config.enabled),
                tags: self.ctx.effective_tags(&config.tags),
            })
            .await
            .map_err(|f| Error::api(KIND, &config.name, "creating", f))?;

        let id = subscription.cust_subscription_id;
        let key = id.as_str();
        let subscription = StateWaiter::new(KIND, key, self.ctx.poll())
            .pending(PENDING)
            .target(ACTIVE)
            .failure(BROKEN)
            .timeout(self.ctx.timeouts().eventual_consistency)
            .until_state(move || self.find(key))
            .await?;
        Ok(Applied {
            state: self.project(subscription),
            id,
        })
    }

    async fn read(&self, id: &str) -> Result<Option<EventSubscriptionState>> {
        absent_on_not_found(KIND, id, self.find(id).await.map(|s| self.project(s)))
    }

    async fn update(
        &self,
        id: &str,
        old: &EventSubscriptionConfig,
        new: &EventSubscriptionConfig,
    ) -> Result<EventSubscriptionState> {
        ensure_in_place(KIND, id, &[("name", old.name != new.name)])?;

        if let Some(request) = Self::modify_request(id, old, new) {
            info!("Modifying {} {}", KIND, id);
            self.client
                .modify_event_subscription(request)
                .await
                .map_err(|f| Error::api(KIND, id, "modifying", f))?;
        }
        update_tags(
            self.client.as_ref(),
            &self.ctx,
            KIND,
            id,
            &self.ctx.arn.event_subscription(id),
            &old.tags,
            &new.tags,
        )
        .await?;
        self.find(id).await.map(|s| self.project(s))
    }

    async fn delete(&self, id: &str, _config: &EventSubscriptionConfig) -> Result<()> {
        info!("Deleting {} {}", KIND, id);
        let result = self
            .client
            .delete_event_subscription(id)
            .await
            .map_err(|f| Error::api(KIND, id, "deleting", f));
        ignore_not_found(KIND, id, result)
    }

    async fn import(&self, raw_id: &str) -> Result<Applied<EventSubscriptionState>> {
        let subscription = self.find(raw_id).await?;
        Ok(Applied {
            id: raw_id.to_string(),
            state: self.project(subscription),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> EventSubscriptionConfig {
        EventSubscriptionConfig {
            name: "ops-alerts".to_string(),
            sns_topic_arn: "arn:aws:sns:us-west-2:123456789012:ops".to_string(),
            source_type: Some("cluster".to_string()),
            source_ids: vec!["analytics".to_string(), "reporting".to_string()],
            event_categories: vec!["monitoring".to_string()],
            severity: Some("ERROR".to_string()),
            enabled: true,
            tags: Tags::new(),
        }
    }

    #[test]
    fn test_reordered_sources_need_no_modify() {
        let old = config();
        let mut new = config();
        new.source_ids.reverse();
        new.tags.insert("team".to_string(), "ops".to_string());

        assert_eq!(
            EventSubscriptionReconciler::modify_request("ops-alerts", &old, &new),
            None
        );
    }

    #[test]
    fn test_modify_carries_only_changed_fields() {
        let old = config();
        let mut new = config();
        new.severity = Some("INFO".to_string());
        new.enabled = false;

        let request =
            EventSubscriptionReconciler::modify_request("ops-alerts", &old, &new).unwrap();
        assert_eq!(request.severity.as_deref(), Some("INFO"));
        assert_eq!(request.enabled, Some(false));
        assert_eq!(request.sns_topic_arn, None);
        assert_eq!(request.source_ids, None);
    }
}
