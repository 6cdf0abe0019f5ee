//! HSM configuration reconciler. Only tags can change in place; the
//! partition password is write-only and never read back.

use std::sync::Arc;

use async_trait::async_trait;
use redshift_api::resources::{CreateHsmConfigurationInput, HsmConfiguration};
use redshift_api::{RedshiftApi, Tags};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{
    Applied, Reconciler, absent_on_not_found, ensure_in_place, ignore_not_found, read_after_create,
    update_tags,
};
use crate::config::ProviderContext;
use crate::error::{Error, Result};
use crate::finder::Finder;
use crate::kind::ResourceKind;

const KIND: ResourceKind = ResourceKind::HsmConfiguration;

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HsmConfigurationConfig {
    pub identifier: String,
    pub description: String,
    pub hsm_ip_address: String,
    pub hsm_partition_name: String,
    pub hsm_partition_password: String,
    pub hsm_server_public_certificate: String,
    #[serde(default)]
    pub tags: Tags,
}

impl std::fmt::Debug for HsmConfigurationConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HsmConfigurationConfig")
            .field("identifier", &self.identifier)
            .field("description", &self.description)
            .field("hsm_ip_address", &self.hsm_ip_address)
            .field("hsm_partition_name", &self.hsm_partition_name)
            .field("hsm_partition_password", &"<redacted>")
            .field("tags", &self.tags)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HsmConfigurationState {
    pub arn: String,
    pub identifier: String,
    pub description: String,
    pub hsm_ip_address: String,
    pub hsm_partition_name: String,
    pub tags: Tags,
}

pub struct HsmConfigurationReconciler {
    client: Arc<dyn RedshiftApi>,
    ctx: Arc<ProviderContext>,
}

impl HsmConfigurationReconciler {
    pub fn new(client: Arc<dyn RedshiftApi>, ctx: Arc<ProviderContext>) -> Self {
        Self { client, ctx }
    }

    async fn find_state(&self, id: &str) -> Result<HsmConfigurationState> {
        let configuration = Finder::new(KIND, id, "DescribeHsmConfigurations")
            .find(
                move |marker| self.client.describe_hsm_configurations(Some(id), marker),
                |c: &HsmConfiguration| c.hsm_configuration_identifier == id,
            )
            .await?;
        Ok(HsmConfigurationState {
            arn: self.ctx.arn.hsm_configuration(id),
            identifier: configuration.hsm_configuration_identifier,
            description: configuration.description,
            hsm_ip_address: configuration.hsm_ip_address,
            hsm_partition_name: configuration.hsm_partition_name,
            tags: self.ctx.visible_tags(&configuration.tags),
        })
    }
}

#[async_trait]
impl Reconciler for HsmConfigurationReconciler {
    type Config = HsmConfigurationConfig;
    type State = HsmConfigurationState;

    fn kind(&self) -> ResourceKind {
        KIND
    }

    async fn create(
        &self,
        config: &HsmConfigurationConfig,
    ) -> Result<Applied<HsmConfigurationState>> {
        info!("Creating {} {}", KIND, config.identifier);
        let configuration = self
            .client
            .create_hsm_configuration(CreateHsmConfigurationInput {
                hsm_configuration_identifier: config.identifier.clone(),
                description: config.description.clone(),
                hsm_ip_address: config.hsm_ip_address.clone(),
                hsm_partition_name: config.hsm_partition_name.clone(),
                hsm_partition_password: config.hsm_partition_password.clone(),
                hsm_server_public_certificate: config.hsm_server_public_certificate.clone(),
                tags: self.ctx.effective_tags(&config.tags),
            })
            .await
            .map_err(|f| Error::api(KIND, &config.identifier, "creating", f))?;

        let id = configuration.hsm_configuration_identifier;
        let key = id.as_str();
        let state = read_after_create(&self.ctx, KIND, key, move || self.find_state(key)).await?;
        Ok(Applied { id, state })
    }

    async fn read(&self, id: &str) -> Result<Option<HsmConfigurationState>> {
        absent_on_not_found(KIND, id, self.find_state(id).await)
    }

    async fn update(
        &self,
        id: &str,
        old: &HsmConfigurationConfig,
        new: &HsmConfigurationConfig,
    ) -> Result<HsmConfigurationState> {
        ensure_in_place(
            KIND,
            id,
            &[
                ("identifier", old.identifier != new.identifier),
                ("description", old.description != new.description),
                ("hsm_ip_address", old.hsm_ip_address != new.hsm_ip_address),
                (
                    "hsm_partition_name",
                    old.hsm_partition_name != new.hsm_partition_name,
                ),
                (
                    "hsm_partition_password",
                    old.hsm_partition_password != new.hsm_partition_password,
                ),
                (
                    "hsm_server_public_certificate",
                    old.hsm_server_public_certificate != new.hsm_server_public_certificate,
                ),
            ],
        )?;
        update_tags(
            self.client.as_ref(),
            &self.ctx,
            KIND,
            id,
            &self.ctx.arn.hsm_configuration(id),
            &old.tags,
            &new.tags,
        )
        .await?;
        self.find_state(id).await
    }

    async fn delete(&self, id: &str, _config: &HsmConfigurationConfig) -> Result<()> {
        info!("Deleting {} {}", KIND, id);
        let result = self
            .client
            .delete_hsm_configuration(id)
            .await
            .map_err(|f| Error::api(KIND, id, "deleting", f));
        ignore_not_found(KIND, id, result)
    }

    async fn import(&self, raw_id: &str) -> Result<Applied<HsmConfigurationState>> {
        let state = self.find_state(raw_id).await?;
        Ok(Applied {
            id: raw_id.to_string(),
            state,
        })
    }
}
