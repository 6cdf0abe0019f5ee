//! Endpoint access reconciler.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redshift_api::resources::{
    CreateEndpointAccessInput, EndpointAccess, ModifyEndpointAccessInput, endpoint_status,
};
use redshift_api::{FaultKind, RedshiftApi};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{Applied, Reconciler, absent_on_not_found, ensure_in_place};
use crate::config::ProviderContext;
use crate::diff::same_set;
use crate::error::{Error, Result};
use crate::finder::Finder;
use crate::kind::ResourceKind;
use crate::waiter::StateWaiter;

const KIND: ResourceKind = ResourceKind::EndpointAccess;

const ACTIVE: &[&str] = &[endpoint_status::ACTIVE];
const SETTLING: &[&str] = &[endpoint_status::CREATING, endpoint_status::MODIFYING];
const DELETE_PENDING: &[&str] = &[endpoint_status::ACTIVE, endpoint_status::DELETING];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointAccessConfig {
    pub endpoint_name: String,
    pub cluster_identifier: String,
    pub subnet_group_name: String,
    #[serde(default)]
    pub resource_owner: Option<String>,
    #[serde(default)]
    pub vpc_security_group_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EndpointAccessState {
    pub endpoint_name: String,
    pub cluster_identifier: String,
    pub subnet_group_name: String,
    pub resource_owner: String,
    pub address: Option<String>,
    pub port: Option<i64>,
    pub vpc_security_group_ids: Vec<String>,
}

impl From<EndpointAccess> for EndpointAccessState {
    fn from(endpoint: EndpointAccess) -> Self {
        Self {
            endpoint_name: endpoint.endpoint_name,
            cluster_identifier: endpoint.cluster_identifier,
            subnet_group_name: endpoint.subnet_group_name,
            resource_owner: endpoint.resource_owner,
            address: endpoint.address,
            port: endpoint.port,
            vpc_security_group_ids: endpoint.vpc_security_group_ids,
        }
    }
}

pub struct EndpointAccessReconciler {
    client: Arc<dyn RedshiftApi>,
    ctx: Arc<ProviderContext>,
}

impl EndpointAccessReconciler {
    pub fn new(client: Arc<dyn RedshiftApi>, ctx: Arc<ProviderContext>) -> Self {
        Self { client, ctx }
    }

    async fn find(&self, name: &str) -> Result<EndpointAccess> {
        Finder::new(KIND, name, "DescribeEndpointAccess")
            .find(
                move |marker| self.client.describe_endpoint_access(Some(name), marker),
                |e: &EndpointAccess| e.endpoint_name == name,
            )
            .await
    }

    async fn wait_active(&self, name: &str, timeout: Duration) -> Result<EndpointAccess> {
        StateWaiter::new(KIND, name, self.ctx.poll())
            .pending(SETTLING)
            .target(ACTIVE)
            .timeout(timeout)
            .until_state(move || self.find(name))
            .await
    }
}

#[async_trait]
impl Reconciler for EndpointAccessReconciler {
    type Config = EndpointAccessConfig;
    type State = EndpointAccessState;

    fn kind(&self) -> ResourceKind {
        KIND
    }

    async fn create(&self, config: &EndpointAccessConfig) -> Result<Applied<EndpointAccessState>> {
        info!(
            "Creating {} {} for cluster {}",
            KIND, config.endpoint_name, config.cluster_identifier
        );
        let endpoint = self
            .client
            .create_endpoint_access(CreateEndpointAccessInput {
                endpoint_name: config.endpoint_name.clone(),
                cluster_identifier: config.cluster_identifier.clone(),
                subnet_group_name: config.subnet_group_name.clone(),
                resource_owner: config.resource_owner.clone(),
                vpc_security_group_ids: config.vpc_security_group_ids.clone(),
            })
            .await
            .map_err(|f| Error::api(KIND, &config.endpoint_name, "creating", f))?;

        let id = endpoint.endpoint_name;
        let endpoint = self
            .wait_active(&id, self.ctx.timeouts().endpoint_create)
            .await?;
        Ok(Applied {
            id,
            state: endpoint.into(),
        })
    }

    async fn read(&self, id: &str) -> Result<Option<EndpointAccessState>> {
        absent_on_not_found(KIND, id, self.find(id).await.map(Into::into))
    }

    async fn update(
        &self,
        id: &str,
        old: &EndpointAccessConfig,
        new: &EndpointAccessConfig,
    ) -> Result<EndpointAccessState> {
        ensure_in_place(
            KIND,
            id,
            &[
                ("endpoint_name", old.endpoint_name != new.endpoint_name),
                (
                    "cluster_identifier",
                    old.cluster_identifier != new.cluster_identifier,
                ),
                (
                    "subnet_group_name",
                    old.subnet_group_name != new.subnet_group_name,
                ),
                ("resource_owner", old.resource_owner != new.resource_owner),
            ],
        )?;

        if !same_set(&old.vpc_security_group_ids, &new.vpc_security_group_ids) {
            info!("Updating security groups of {} {}", KIND, id);
            self.client
                .modify_endpoint_access(ModifyEndpointAccessInput {
                    endpoint_name: id.to_string(),
                    vpc_security_group_ids: new.vpc_security_group_ids.clone(),
                })
                .await
                .map_err(|f| Error::api(KIND, id, "modifying", f))?;
            return self
                .wait_active(id, self.ctx.timeouts().endpoint_update)
                .await
                .map(Into::into);
        }
        self.find(id).await.map(Into::into)
    }

    async fn delete(&self, id: &str, _config: &EndpointAccessConfig) -> Result<()> {
        info!("Deleting {} {}", KIND, id);
        match self.client.delete_endpoint_access(id).await {
            Ok(_) => {}
            Err(fault) if fault.is(FaultKind::NotFound) => {
                info!("{} ({}) already deleted", KIND, id);
                return Ok(());
            }
            Err(fault) => return Err(Error::api(KIND, id, "deleting", fault)),
        }

        StateWaiter::new(KIND, id, self.ctx.poll())
            .pending(DELETE_PENDING)
            .timeout(self.ctx.timeouts().endpoint_delete)
            .until_gone(move || self.find(id))
            .await
    }

    async fn import(&self, raw_id: &str) -> Result<Applied<EndpointAccessState>> {
        let endpoint = self.find(raw_id).await?;
        Ok(Applied {
            id: raw_id.to_string(),
            state: endpoint.into(),
        })
    }
}
