//! Zero-ETL integration reconciler.
//!
//! Replicates a source database into a cluster namespace. The service
//! assigns the integration ARN, which is used as the identifier. Create,
//! modify and delete are all asynchronous and waited out.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redshift_api::resources::{
    CreateIntegrationInput, Integration, ModifyIntegrationInput, integration_status,
};
use redshift_api::{FaultKind, RedshiftApi, Tags};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{Applied, Reconciler, absent_on_not_found, ensure_in_place, update_tags};
use crate::config::ProviderContext;
use crate::diff::{changed, changed_opt};
use crate::error::{Error, Result};
use crate::finder::Finder;
use crate::kind::ResourceKind;
use crate::waiter::StateWaiter;

const KIND: ResourceKind = ResourceKind::Integration;

const SETTLING: &[&str] = &[
    integration_status::CREATING,
    integration_status::MODIFYING,
    integration_status::SYNCING,
];
const ACTIVE: &[&str] = &[integration_status::ACTIVE];
const BROKEN: &[&str] = &[
    integration_status::FAILED,
    integration_status::NEEDS_ATTENTION,
];
const DELETE_PENDING: &[&str] = &[
    integration_status::ACTIVE,
    integration_status::MODIFYING,
    integration_status::DELETING,
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrationConfig {
    pub name: String,
    pub source_arn: String,
    /// Namespace ARN of the target cluster.
    pub target_arn: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub kms_key_id: Option<String>,
    #[serde(default)]
    pub additional_encryption_context: BTreeMap<String, String>,
    #[serde(default)]
    pub tags: Tags,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntegrationState {
    pub arn: String,
    pub name: String,
    pub source_arn: String,
    pub target_arn: String,
    pub status: String,
    pub description: Option<String>,
    pub kms_key_id: Option<String>,
    pub additional_encryption_context: BTreeMap<String, String>,
    pub create_time: Option<DateTime<Utc>>,
    pub tags: Tags,
}

pub struct IntegrationReconciler {
    client: Arc<dyn RedshiftApi>,
    ctx: Arc<ProviderContext>,
}

impl IntegrationReconciler {
    pub fn new(client: Arc<dyn RedshiftApi>, ctx: Arc<ProviderContext>) -> Self {
        Self { client, ctx }
    }

    async fn find(&self, arn: &str) -> Result<Integration> {
        Finder::new(KIND, arn, "DescribeIntegrations")
            .find(
                move |marker| self.client.describe_integrations(Some(arn), marker),
                |i: &Integration| i.integration_arn == arn,
            )
            .await
    }

    async fn wait_active(&self, arn: &str, timeout: Duration) -> Result<Integration> {
        StateWaiter::new(KIND, arn, self.ctx.poll())
            .pending(SETTLING)
            .target(ACTIVE)
            .failure(BROKEN)
            .timeout(timeout)
            .until_state(move || self.find(arn))
            .await
    }

    fn project(&self, integration: Integration) -> IntegrationState {
        IntegrationState {
            arn: integration.integration_arn,
            name: integration.integration_name,
            source_arn: integration.source_arn,
            target_arn: integration.target_arn,
            status: integration.status,
            description: integration.description,
            kms_key_id: integration.kms_key_id,
            additional_encryption_context: integration.additional_encryption_context,
            create_time: integration.create_time,
            tags: self.ctx.visible_tags(&integration.tags),
        }
    }
}

#[async_trait]
impl Reconciler for IntegrationReconciler {
    type Config = IntegrationConfig;
    type State = IntegrationState;

    fn kind(&self) -> ResourceKind {
        KIND
    }

    async fn create(&self, config: &IntegrationConfig) -> Result<Applied<IntegrationState>> {
        info!(
            "Creating {} {} into {}",
            KIND, config.name, config.target_arn
        );
        let integration = self
            .client
            .create_integration(CreateIntegrationInput {
                integration_name: config.name.clone(),
                source_arn: config.source_arn.clone(),
                target_arn: config.target_arn.clone(),
                description: config.description.clone(),
                kms_key_id: config.kms_key_id.clone(),
                additional_encryption_context: config.additional_encryption_context.clone(),
                tags: self.ctx.effective_tags(&config.tags),
            })
            .await
            .map_err(|f| Error::api(KIND, &config.name, "creating", f))?;

        let id = integration.integration_arn;
        let integration = self
            .wait_active(&id, self.ctx.timeouts().integration_create)
            .await?;
        Ok(Applied {
            state: self.project(integration),
            id,
        })
    }

    async fn read(&self, id: &str) -> Result<Option<IntegrationState>> {
        absent_on_not_found(KIND, id, self.find(id).await.map(|i| self.project(i)))
    }

    async fn update(
        &self,
        id: &str,
        old: &IntegrationConfig,
        new: &IntegrationConfig,
    ) -> Result<IntegrationState> {
        ensure_in_place(
            KIND,
            id,
            &[
                ("source_arn", old.source_arn != new.source_arn),
                ("target_arn", old.target_arn != new.target_arn),
                ("kms_key_id", old.kms_key_id != new.kms_key_id),
                (
                    "additional_encryption_context",
                    old.additional_encryption_context != new.additional_encryption_context,
                ),
            ],
        )?;

        let name = changed(&old.name, &new.name);
        let description = changed_opt(&old.description, &new.description);
        if name.is_some() || description.is_some() {
            info!("Modifying {} {}", KIND, id);
            self.client
                .modify_integration(ModifyIntegrationInput {
                    integration_arn: id.to_string(),
                    integration_name: name,
                    description,
                })
                .await
                .map_err(|f| Error::api(KIND, id, "modifying", f))?;
            self.wait_active(id, self.ctx.timeouts().integration_update)
                .await?;
        }
        update_tags(
            self.client.as_ref(),
            &self.ctx,
            KIND,
            id,
            id,
            &old.tags,
            &new.tags,
        )
        .await?;
        self.find(id).await.map(|i| self.project(i))
    }

    async fn delete(&self, id: &str, _config: &IntegrationConfig) -> Result<()> {
        info!("Deleting {} {}", KIND, id);
        match self.client.delete_integration(id).await {
            Ok(_) => {}
            Err(fault) if fault.is(FaultKind::NotFound) => {
                info!("{} ({}) already deleted", KIND, id);
                return Ok(());
            }
            Err(fault) => return Err(Error::api(KIND, id, "deleting", fault)),
        }

        StateWaiter::new(KIND, id, self.ctx.poll())
            .pending(DELETE_PENDING)
            .timeout(self.ctx.timeouts().integration_delete)
            .until_gone(move || self.find(id))
            .await
    }

    async fn import(&self, raw_id: &str) -> Result<Applied<IntegrationState>> {
        let integration = self.find(raw_id).await?;
        Ok(Applied {
            id: raw_id.to_string(),
            state: self.project(integration),
        })
    }
}
