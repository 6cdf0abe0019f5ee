//! Partner integration reconciler.
//!
//! Identified locally as `account_id:cluster_identifier:database_name:partner_name`.
//! Nothing can change in place; the status is output only.

use std::sync::Arc;

use async_trait::async_trait;
use redshift_api::resources::{PartnerIntegration, PartnerKey};
use redshift_api::{Page, RedshiftApi};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{
    Applied, Reconciler, absent_on_not_found, ensure_in_place, ignore_not_found, read_after_create,
};
use crate::config::ProviderContext;
use crate::error::{Error, Result};
use crate::finder::Finder;
use crate::identity::PARTNER;
use crate::kind::ResourceKind;

const KIND: ResourceKind = ResourceKind::Partner;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartnerConfig {
    /// Defaults to the provider account.
    #[serde(default)]
    pub account_id: String,
    pub cluster_identifier: String,
    pub database_name: String,
    pub partner_name: String,
}

impl PartnerConfig {
    fn key(&self, ctx: &ProviderContext) -> PartnerKey {
        let account_id = if self.account_id.is_empty() {
            &ctx.arn.account_id
        } else {
            &self.account_id
        };
        PartnerKey {
            account_id: account_id.clone(),
            cluster_identifier: self.cluster_identifier.clone(),
            database_name: self.database_name.clone(),
            partner_name: self.partner_name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartnerState {
    pub account_id: String,
    pub cluster_identifier: String,
    pub database_name: String,
    pub partner_name: String,
    pub status: String,
    pub status_message: Option<String>,
}

fn parse(id: &str) -> Result<PartnerKey> {
    let parts = PARTNER.parse(id)?;
    match <[String; 4]>::try_from(parts) {
        Ok([account_id, cluster_identifier, database_name, partner_name]) => Ok(PartnerKey {
            account_id,
            cluster_identifier,
            database_name,
            partner_name,
        }),
        Err(_) => Err(Error::MalformedIdentifier {
            kind: KIND,
            id: id.to_string(),
            reason: "expected four parts".to_string(),
        }),
    }
}

pub struct PartnerReconciler {
    client: Arc<dyn RedshiftApi>,
    ctx: Arc<ProviderContext>,
}

impl PartnerReconciler {
    pub fn new(client: Arc<dyn RedshiftApi>, ctx: Arc<ProviderContext>) -> Self {
        Self { client, ctx }
    }

    async fn find_state(&self, id: &str, key: &PartnerKey) -> Result<PartnerState> {
        // DescribePartners is not paginated.
        let integration = Finder::new(KIND, id, "DescribePartners")
            .find(
                move |_marker| async move {
                    self.client.describe_partners(key).await.map(Page::last)
                },
                |p: &PartnerIntegration| {
                    p.database_name == key.database_name && p.partner_name == key.partner_name
                },
            )
            .await?;
        Ok(PartnerState {
            account_id: key.account_id.clone(),
            cluster_identifier: key.cluster_identifier.clone(),
            database_name: integration.database_name,
            partner_name: integration.partner_name,
            status: integration.status,
            status_message: integration.status_message,
        })
    }
}

#[async_trait]
impl Reconciler for PartnerReconciler {
    type Config = PartnerConfig;
    type State = PartnerState;

    fn kind(&self) -> ResourceKind {
        KIND
    }

    async fn create(&self, config: &PartnerConfig) -> Result<Applied<PartnerState>> {
        let key = config.key(&self.ctx);
        let id = PARTNER.compose(&[
            key.account_id.as_str(),
            key.cluster_identifier.as_str(),
            key.database_name.as_str(),
            key.partner_name.as_str(),
        ])?;
        info!("Creating {} {}", KIND, id);

        let key = self
            .client
            .add_partner(key)
            .await
            .map_err(|f| Error::api(KIND, &id, "creating", f))?;

        let (name, key) = (id.as_str(), &key);
        let state = read_after_create(&self.ctx, KIND, name, move || self.find_state(name, key)).await?;
        Ok(Applied { id, state })
    }

    async fn read(&self, id: &str) -> Result<Option<PartnerState>> {
        let key = parse(id)?;
        absent_on_not_found(KIND, id, self.find_state(id, &key).await)
    }

    async fn update(
        &self,
        id: &str,
        old: &PartnerConfig,
        new: &PartnerConfig,
    ) -> Result<PartnerState> {
        ensure_in_place(
            KIND,
            id,
            &[
                (
                    "account_id",
                    old.key(&self.ctx).account_id != new.key(&self.ctx).account_id,
                ),
                (
                    "cluster_identifier",
                    old.cluster_identifier != new.cluster_identifier,
                ),
                ("database_name", old.database_name != new.database_name),
                ("partner_name", old.partner_name != new.partner_name),
            ],
        )?;
        let key = parse(id)?;
        self.find_state(id, &key).await
    }

    async fn delete(&self, id: &str, _config: &PartnerConfig) -> Result<()> {
        let key = parse(id)?;
        info!("Deleting {} {}", KIND, id);
        let result = self
            .client
            .delete_partner(key)
            .await
            .map(|_| ())
            .map_err(|f| Error::api(KIND, id, "deleting", f));
        ignore_not_found(KIND, id, result)
    }

    async fn import(&self, raw_id: &str) -> Result<Applied<PartnerState>> {
        let key = parse(raw_id)?;
        let state = self.find_state(raw_id, &key).await?;
        Ok(Applied {
            id: raw_id.to_string(),
            state,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_partner_id() {
        let key = parse("123456789012:analytics:dev:Fivetran").unwrap();
        assert_eq!(key.account_id, "123456789012");
        assert_eq!(key.cluster_identifier, "analytics");
        assert_eq!(key.database_name, "dev");
        assert_eq!(key.partner_name, "Fivetran");
    }

    #[test]
    fn test_parse_rejects_short_id() {
        let err = parse("123456789012:analytics:dev").unwrap_err();
        assert!(matches!(err, Error::MalformedIdentifier { .. }));
    }
}
