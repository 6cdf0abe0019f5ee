//! Endpoint authorization reconciler.
//!
//! Grants another account the right to create endpoints for a cluster.
//! Identified locally as `account:cluster_identifier`. An empty VPC list
//! grants every VPC of the account; switching between that and an explicit
//! list needs a new authorization.

use std::sync::Arc;

use async_trait::async_trait;
use redshift_api::resources::{
    AuthorizeEndpointAccessInput, EndpointAuthorization, RevokeEndpointAccessInput,
    endpoint_authorization_status,
};
use redshift_api::{FaultKind, RedshiftApi};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{Applied, Reconciler, absent_on_not_found, ensure_in_place};
use crate::config::ProviderContext;
use crate::diff::SetDiff;
use crate::error::{Error, Result};
use crate::finder::Finder;
use crate::identity::ENDPOINT_AUTHORIZATION;
use crate::kind::ResourceKind;
use crate::waiter::StateWaiter;

const KIND: ResourceKind = ResourceKind::EndpointAuthorization;

const AUTHORIZED: &[&str] = &[endpoint_authorization_status::AUTHORIZED];
const REVOKE_PENDING: &[&str] = &[
    endpoint_authorization_status::AUTHORIZED,
    endpoint_authorization_status::REVOKING,
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointAuthorizationConfig {
    /// Grantee account.
    pub account: String,
    pub cluster_identifier: String,
    #[serde(default)]
    pub vpc_ids: Vec<String>,
    /// Also delete the grantee's endpoints when revoking.
    #[serde(default)]
    pub force_delete: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EndpointAuthorizationState {
    pub account: String,
    pub cluster_identifier: String,
    pub grantor: String,
    pub status: String,
    pub allowed_all_vpcs: bool,
    pub vpc_ids: Vec<String>,
    pub endpoint_count: i64,
}

impl From<EndpointAuthorization> for EndpointAuthorizationState {
    fn from(authorization: EndpointAuthorization) -> Self {
        Self {
            account: authorization.grantee,
            cluster_identifier: authorization.cluster_identifier,
            grantor: authorization.grantor,
            status: authorization.status,
            allowed_all_vpcs: authorization.allowed_all_vpcs,
            vpc_ids: authorization.allowed_vpcs,
            endpoint_count: authorization.endpoint_count,
        }
    }
}

fn parse(id: &str) -> Result<(String, String)> {
    let parts = ENDPOINT_AUTHORIZATION.parse(id)?;
    match <[String; 2]>::try_from(parts) {
        Ok([account, cluster]) => Ok((account, cluster)),
        Err(_) => Err(Error::MalformedIdentifier {
            kind: KIND,
            id: id.to_string(),
            reason: "expected account:cluster_identifier".to_string(),
        }),
    }
}

pub struct EndpointAuthorizationReconciler {
    client: Arc<dyn RedshiftApi>,
    ctx: Arc<ProviderContext>,
}

impl EndpointAuthorizationReconciler {
    pub fn new(client: Arc<dyn RedshiftApi>, ctx: Arc<ProviderContext>) -> Self {
        Self { client, ctx }
    }

    async fn find(&self, id: &str, account: &str, cluster: &str) -> Result<EndpointAuthorization> {
        Finder::new(KIND, id, "DescribeEndpointAuthorization")
            .find(
                move |marker| {
                    self.client
                        .describe_endpoint_authorization(Some(cluster), Some(account), marker)
                },
                |a: &EndpointAuthorization| a.grantee == account && a.cluster_identifier == cluster,
            )
            .await
    }

    async fn wait_authorized(
        &self,
        id: &str,
        account: &str,
        cluster: &str,
    ) -> Result<EndpointAuthorization> {
        StateWaiter::new(KIND, id, self.ctx.poll())
            .target(AUTHORIZED)
            .timeout(self.ctx.timeouts().eventual_consistency)
            .until_state(move || self.find(id, account, cluster))
            .await
    }
}

#[async_trait]
impl Reconciler for EndpointAuthorizationReconciler {
    type Config = EndpointAuthorizationConfig;
    type State = EndpointAuthorizationState;

    fn kind(&self) -> ResourceKind {
        KIND
    }

    async fn create(
        &self,
        config: &EndpointAuthorizationConfig,
    ) -> Result<Applied<EndpointAuthorizationState>> {
        let account = config.account.as_str();
        let cluster = config.cluster_identifier.as_str();
        let id = ENDPOINT_AUTHORIZATION.compose(&[account, cluster])?;
        info!("Creating {} {}", KIND, id);

        self.client
            .authorize_endpoint_access(AuthorizeEndpointAccessInput {
                cluster_identifier: cluster.to_string(),
                account: account.to_string(),
                vpc_ids: config.vpc_ids.clone(),
            })
            .await
            .map_err(|f| Error::api(KIND, &id, "creating", f))?;

        let authorization = self.wait_authorized(&id, account, cluster).await?;
        Ok(Applied {
            id,
            state: authorization.into(),
        })
    }

    async fn read(&self, id: &str) -> Result<Option<EndpointAuthorizationState>> {
        let (account, cluster) = parse(id)?;
        absent_on_not_found(
            KIND,
            id,
            self.find(id, &account, &cluster).await.map(Into::into),
        )
    }

    async fn update(
        &self,
        id: &str,
        old: &EndpointAuthorizationConfig,
        new: &EndpointAuthorizationConfig,
    ) -> Result<EndpointAuthorizationState> {
        ensure_in_place(
            KIND,
            id,
            &[
                ("account", old.account != new.account),
                (
                    "cluster_identifier",
                    old.cluster_identifier != new.cluster_identifier,
                ),
                (
                    "vpc_ids",
                    old.vpc_ids.is_empty() != new.vpc_ids.is_empty(),
                ),
            ],
        )?;
        let (account, cluster) = parse(id)?;

        let vpcs = SetDiff::between(&old.vpc_ids, &new.vpc_ids);
        if !vpcs.to_remove.is_empty() {
            info!("Revoking {} VPCs from {} {}", vpcs.to_remove.len(), KIND, id);
            self.client
                .revoke_endpoint_access(RevokeEndpointAccessInput {
                    cluster_identifier: cluster.clone(),
                    account: account.clone(),
                    vpc_ids: vpcs.to_remove.iter().cloned().collect(),
                    force: false,
                })
                .await
                .map_err(|f| Error::api(KIND, id, "revoking VPCs of", f))?;
        }
        if !vpcs.to_add.is_empty() {
            info!("Authorizing {} VPCs for {} {}", vpcs.to_add.len(), KIND, id);
            self.client
                .authorize_endpoint_access(AuthorizeEndpointAccessInput {
                    cluster_identifier: cluster.clone(),
                    account: account.clone(),
                    vpc_ids: vpcs.to_add.iter().cloned().collect(),
                })
                .await
                .map_err(|f| Error::api(KIND, id, "authorizing VPCs of", f))?;
        }
        self.wait_authorized(id, &account, &cluster)
            .await
            .map(Into::into)
    }

    async fn delete(&self, id: &str, config: &EndpointAuthorizationConfig) -> Result<()> {
        let (account, cluster) = parse(id)?;
        info!("Deleting {} {}", KIND, id);
        let revoked = self
            .client
            .revoke_endpoint_access(RevokeEndpointAccessInput {
                cluster_identifier: cluster.clone(),
                account: account.clone(),
                vpc_ids: Vec::new(),
                force: config.force_delete,
            })
            .await;
        match revoked {
            Ok(_) => {}
            Err(fault) if fault.is(FaultKind::NotFound) => {
                info!("{} ({}) already deleted", KIND, id);
                return Ok(());
            }
            Err(fault) => return Err(Error::api(KIND, id, "deleting", fault)),
        }

        let (account, cluster) = (account.as_str(), cluster.as_str());
        StateWaiter::new(KIND, id, self.ctx.poll())
            .pending(REVOKE_PENDING)
            .timeout(self.ctx.timeouts().eventual_consistency)
            .until_gone(move || self.find(id, account, cluster))
            .await
    }

    async fn import(&self, raw_id: &str) -> Result<Applied<EndpointAuthorizationState>> {
        let (account, cluster) = parse(raw_id)?;
        let authorization = self.find(raw_id, &account, &cluster).await?;
        Ok(Applied {
            id: raw_id.to_string(),
            state: authorization.into(),
        })
    }
}
