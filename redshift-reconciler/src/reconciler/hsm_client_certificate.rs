//! HSM client certificate reconciler. Only tags can change in place.

use std::sync::Arc;

use async_trait::async_trait;
use redshift_api::resources::{CreateHsmClientCertificateInput, HsmClientCertificate};
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

const KIND: ResourceKind = ResourceKind::HsmClientCertificate;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HsmClientCertificateConfig {
    pub identifier: String,
    #[serde(default)]
    pub tags: Tags,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HsmClientCertificateState {
    pub arn: String,
    pub identifier: String,
    pub public_key: String,
    pub tags: Tags,
}

pub struct HsmClientCertificateReconciler {
    client: Arc<dyn RedshiftApi>,
    ctx: Arc<ProviderContext>,
}

impl HsmClientCertificateReconciler {
    pub fn new(client: Arc<dyn RedshiftApi>, ctx: Arc<ProviderContext>) -> Self {
        Self { client, ctx }
    }

    async fn find_state(&self, id: &str) -> Result<HsmClientCertificateState> {
        let certificate = Finder::new(KIND, id, "DescribeHsmClientCertificates")
            .find(
                move |marker| self.client.describe_hsm_client_certificates(Some(id), marker),
                |c: &HsmClientCertificate| c.hsm_client_certificate_identifier == id,
            )
            .await?;
        Ok(HsmClientCertificateState {
            arn: self.ctx.arn.hsm_client_certificate(id),
            identifier: certificate.hsm_client_certificate_identifier,
            public_key: certificate.hsm_client_certificate_public_key,
            tags: self.ctx.visible_tags(&certificate.tags),
        })
    }
}

#[async_trait]
impl Reconciler for HsmClientCertificateReconciler {
    type Config = HsmClientCertificateConfig;
    type State = HsmClientCertificateState;

    fn kind(&self) -> ResourceKind {
        KIND
    }

    async fn create(
        &self,
        config: &HsmClientCertificateConfig,
    ) -> Result<Applied<HsmClientCertificateState>> {
        info!("Creating {} {}", KIND, config.identifier);
        let certificate = self
            .client
            .create_hsm_client_certificate(CreateHsmClientCertificateInput {
                hsm_client_certificate_identifier: config.identifier.clone(),
                tags: self.ctx.effective_tags(&config.tags),
            })
            .await
            .map_err(|f| Error::api(KIND, &config.identifier, "creating", f))?;

        let id = certificate.hsm_client_certificate_identifier;
        let key = id.as_str();
        let state = read_after_create(&self.ctx, KIND, key, move || self.find_state(key)).await?;
        Ok(Applied { id, state })
    }

    async fn read(&self, id: &str) -> Result<Option<HsmClientCertificateState>> {
        absent_on_not_found(KIND, id, self.find_state(id).await)
    }

    async fn update(
        &self,
        id: &str,
        old: &HsmClientCertificateConfig,
        new: &HsmClientCertificateConfig,
    ) -> Result<HsmClientCertificateState> {
        ensure_in_place(KIND, id, &[("identifier", old.identifier != new.identifier)])?;
        update_tags(
            self.client.as_ref(),
            &self.ctx,
            KIND,
            id,
            &self.ctx.arn.hsm_client_certificate(id),
            &old.tags,
            &new.tags,
        )
        .await?;
        self.find_state(id).await
    }

    async fn delete(&self, id: &str, _config: &HsmClientCertificateConfig) -> Result<()> {
        info!("Deleting {} {}", KIND, id);
        let result = self
            .client
            .delete_hsm_client_certificate(id)
            .await
            .map_err(|f| Error::api(KIND, id, "deleting", f));
        ignore_not_found(KIND, id, result)
    }

    async fn import(&self, raw_id: &str) -> Result<Applied<HsmClientCertificateState>> {
        let state = self.find_state(raw_id).await?;
        Ok(Applied {
            id: raw_id.to_string(),
            state,
        })
    }
}
