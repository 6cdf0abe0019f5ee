//! Usage limit reconciler. The identifier is assigned by the service.

use std::sync::Arc;

use async_trait::async_trait;
use redshift_api::resources::{CreateUsageLimitInput, ModifyUsageLimitInput, UsageLimit};
use redshift_api::{RedshiftApi, Tags};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{
    Applied, Reconciler, absent_on_not_found, ensure_in_place, ignore_not_found, read_after_create,
    update_tags,
};
use crate::config::ProviderContext;
use crate::diff::{changed, changed_opt};
use crate::error::{Error, Result};
use crate::finder::Finder;
use crate::kind::ResourceKind;

const KIND: ResourceKind = ResourceKind::UsageLimit;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageLimitConfig {
    pub cluster_identifier: String,
    /// `spectrum`, `concurrency-scaling` or `cross-region-datasharing`
    pub feature_type: String,
    /// `time` or `data-scanned`
    pub limit_type: String,
    pub amount: i64,
    #[serde(default)]
    pub period: Option<String>,
    #[serde(default)]
    pub breach_action: Option<String>,
    #[serde(default)]
    pub tags: Tags,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsageLimitState {
    pub arn: String,
    pub usage_limit_id: String,
    pub cluster_identifier: String,
    pub feature_type: String,
    pub limit_type: String,
    pub amount: i64,
    pub period: String,
    pub breach_action: String,
    pub tags: Tags,
}

pub struct UsageLimitReconciler {
    client: Arc<dyn RedshiftApi>,
    ctx: Arc<ProviderContext>,
}

impl UsageLimitReconciler {
    pub fn new(client: Arc<dyn RedshiftApi>, ctx: Arc<ProviderContext>) -> Self {
        Self { client, ctx }
    }

    async fn find_state(&self, id: &str) -> Result<UsageLimitState> {
        // The id was handed out by the create call; a lagging read may
        // return another limit for it.
        let limit = Finder::new(KIND, id, "DescribeUsageLimits")
            .find(
                move |marker| self.client.describe_usage_limits(Some(id), marker),
                |l: &UsageLimit| l.usage_limit_id == id,
            )
            .await?;
        Ok(UsageLimitState {
            arn: self.ctx.arn.usage_limit(id),
            usage_limit_id: limit.usage_limit_id,
            cluster_identifier: limit.cluster_identifier,
            feature_type: limit.feature_type,
            limit_type: limit.limit_type,
            amount: limit.amount,
            period: limit.period,
            breach_action: limit.breach_action,
            tags: self.ctx.visible_tags(&limit.tags),
        })
    }
}

#[async_trait]
impl Reconciler for UsageLimitReconciler {
    type Config = UsageLimitConfig;
    type State = UsageLimitState;

    fn kind(&self) -> ResourceKind {
        KIND
    }

    async fn create(&self, config: &UsageLimitConfig) -> Result<Applied<UsageLimitState>> {
        info!(
            "Creating {} for cluster {} ({})",
            KIND, config.cluster_identifier, config.feature_type
        );
        let limit = self
            .client
            .create_usage_limit(CreateUsageLimitInput {
                cluster_identifier: config.cluster_identifier.clone(),
                feature_type: config.feature_type.clone(),
                limit_type: config.limit_type.clone(),
                amount: config.amount,
                period: config.period.clone(),
                breach_action: config.breach_action.clone(),
                tags: self.ctx.effective_tags(&config.tags),
            })
            .await
            .map_err(|f| Error::api(KIND, &config.cluster_identifier, "creating", f))?;

        let id = limit.usage_limit_id;
        info!("Created {} {}", KIND, id);
        let key = id.as_str();
        let state = read_after_create(&self.ctx, KIND, key, move || self.find_state(key)).await?;
        Ok(Applied { id, state })
    }

    async fn read(&self, id: &str) -> Result<Option<UsageLimitState>> {
        absent_on_not_found(KIND, id, self.find_state(id).await)
    }

    async fn update(
        &self,
        id: &str,
        old: &UsageLimitConfig,
        new: &UsageLimitConfig,
    ) -> Result<UsageLimitState> {
        ensure_in_place(
            KIND,
            id,
            &[
                (
                    "cluster_identifier",
                    old.cluster_identifier != new.cluster_identifier,
                ),
                ("feature_type", old.feature_type != new.feature_type),
                ("limit_type", old.limit_type != new.limit_type),
                ("period", old.period != new.period),
            ],
        )?;

        let amount = changed(&old.amount, &new.amount);
        let breach_action = changed_opt(&old.breach_action, &new.breach_action);
        if amount.is_some() || breach_action.is_some() {
            info!("Updating {} {}", KIND, id);
            self.client
                .modify_usage_limit(ModifyUsageLimitInput {
                    usage_limit_id: id.to_string(),
                    amount,
                    breach_action,
                })
                .await
                .map_err(|f| Error::api(KIND, id, "modifying", f))?;
        }

        update_tags(
            self.client.as_ref(),
            &self.ctx,
            KIND,
            id,
            &self.ctx.arn.usage_limit(id),
            &old.tags,
            &new.tags,
        )
        .await?;

        self.find_state(id).await
    }

    async fn delete(&self, id: &str, _config: &UsageLimitConfig) -> Result<()> {
        info!("Deleting {} {}", KIND, id);
        let result = self
            .client
            .delete_usage_limit(id)
            .await
            .map_err(|f| Error::api(KIND, id, "deleting", f));
        ignore_not_found(KIND, id, result)
    }

    async fn import(&self, raw_id: &str) -> Result<Applied<UsageLimitState>> {
        let state = self.find_state(raw_id).await?;
        Ok(Applied {
            id: raw_id.to_string(),
            state,
        })
    }
}
