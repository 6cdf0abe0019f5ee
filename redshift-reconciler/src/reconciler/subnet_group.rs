//! Subnet group reconciler - one modify call carries the full subnet list.

use std::sync::Arc;

use async_trait::async_trait;
use redshift_api::resources::{
    ClusterSubnetGroup, CreateClusterSubnetGroupInput, ModifyClusterSubnetGroupInput,
};
use redshift_api::{RedshiftApi, Tags};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{
    Applied, Reconciler, absent_on_not_found, ensure_in_place, ignore_not_found, read_after_create,
    update_tags,
};
use crate::config::ProviderContext;
use crate::diff::same_set;
use crate::error::{Error, Result};
use crate::finder::Finder;
use crate::kind::ResourceKind;

const KIND: ResourceKind = ResourceKind::SubnetGroup;

const DEFAULT_DESCRIPTION: &str = "Managed by redshift-reconciler";

fn default_description() -> String {
    DEFAULT_DESCRIPTION.to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubnetGroupConfig {
    pub name: String,
    #[serde(default = "default_description")]
    pub description: String,
    pub subnet_ids: Vec<String>,
    #[serde(default)]
    pub tags: Tags,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubnetGroupState {
    pub arn: String,
    pub name: String,
    pub description: String,
    pub vpc_id: String,
    pub subnet_ids: Vec<String>,
    pub tags: Tags,
}

pub struct SubnetGroupReconciler {
    client: Arc<dyn RedshiftApi>,
    ctx: Arc<ProviderContext>,
}

impl SubnetGroupReconciler {
    pub fn new(client: Arc<dyn RedshiftApi>, ctx: Arc<ProviderContext>) -> Self {
        Self { client, ctx }
    }

    async fn find_state(&self, name: &str) -> Result<SubnetGroupState> {
        let group = Finder::new(KIND, name, "DescribeClusterSubnetGroups")
            .find(
                move |marker| self.client.describe_cluster_subnet_groups(Some(name), marker),
                |g: &ClusterSubnetGroup| g.cluster_subnet_group_name == name,
            )
            .await?;
        Ok(SubnetGroupState {
            arn: self.ctx.arn.subnet_group(name),
            name: group.cluster_subnet_group_name,
            description: group.description,
            vpc_id: group.vpc_id,
            subnet_ids: group.subnet_ids,
            tags: self.ctx.visible_tags(&group.tags),
        })
    }
}

#[async_trait]
impl Reconciler for SubnetGroupReconciler {
    type Config = SubnetGroupConfig;
    type State = SubnetGroupState;

    fn kind(&self) -> ResourceKind {
        KIND
    }

    async fn create(&self, config: &SubnetGroupConfig) -> Result<Applied<SubnetGroupState>> {
        if config.subnet_ids.is_empty() {
            return Err(Error::invalid_config(
                KIND,
                &config.name,
                "at least one subnet id is required",
            ));
        }
        info!("Creating {} {}", KIND, config.name);
        let group = self
            .client
            .create_cluster_subnet_group(CreateClusterSubnetGroupInput {
                cluster_subnet_group_name: config.name.clone(),
                description: config.description.clone(),
                subnet_ids: config.subnet_ids.clone(),
                tags: self.ctx.effective_tags(&config.tags),
            })
            .await
            .map_err(|f| Error::api(KIND, &config.name, "creating", f))?;

        let id = group.cluster_subnet_group_name;
        let key = id.as_str();
        let state = read_after_create(&self.ctx, KIND, key, move || self.find_state(key)).await?;
        Ok(Applied { id, state })
    }

    async fn read(&self, id: &str) -> Result<Option<SubnetGroupState>> {
        absent_on_not_found(KIND, id, self.find_state(id).await)
    }

    async fn update(
        &self,
        id: &str,
        old: &SubnetGroupConfig,
        new: &SubnetGroupConfig,
    ) -> Result<SubnetGroupState> {
        ensure_in_place(KIND, id, &[("name", old.name != new.name)])?;

        if old.description != new.description || !same_set(&old.subnet_ids, &new.subnet_ids) {
            info!("Updating {} {}", KIND, id);
            self.client
                .modify_cluster_subnet_group(ModifyClusterSubnetGroupInput {
                    cluster_subnet_group_name: id.to_string(),
                    description: Some(new.description.clone()),
                    subnet_ids: new.subnet_ids.clone(),
                })
                .await
                .map_err(|f| Error::api(KIND, id, "modifying", f))?;
        }

        update_tags(
            self.client.as_ref(),
            &self.ctx,
            KIND,
            id,
            &self.ctx.arn.subnet_group(id),
            &old.tags,
            &new.tags,
        )
        .await?;

        self.find_state(id).await
    }

    async fn delete(&self, id: &str, _config: &SubnetGroupConfig) -> Result<()> {
        info!("Deleting {} {}", KIND, id);
        let result = self
            .client
            .delete_cluster_subnet_group(id)
            .await
            .map_err(|f| Error::api(KIND, id, "deleting", f));
        ignore_not_found(KIND, id, result)
    }

    async fn import(&self, raw_id: &str) -> Result<Applied<SubnetGroupState>> {
        let state = self.find_state(raw_id).await?;
        Ok(Applied {
            id: raw_id.to_string(),
            state,
        })
    }
}
