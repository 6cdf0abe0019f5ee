//! Cluster reconciler.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redshift_api::cluster::{
    CLUSTER_TYPE_MULTI_NODE, CLUSTER_TYPE_SINGLE_NODE, Cluster, ClusterNode, ClusterOptions,
    CreateClusterInput, DeleteClusterInput, EnableLoggingInput, EnableSnapshotCopyInput,
    LoggingStatus, ModifyAquaConfigurationInput, ModifyClusterIamRolesInput, ModifyClusterInput,
    RestoreFromClusterSnapshotInput, aqua_status, relocation_status, status,
};
use redshift_api::{FaultKind, RedshiftApi, Tags};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{Applied, Reconciler, absent_on_not_found, ensure_in_place, update_tags};
use crate::config::ProviderContext;
use crate::diff::{SetDiff, changed, changed_opt, same_set};
use crate::error::{Error, Result};
use crate::finder::Finder;
use crate::kind::ResourceKind;
use crate::retry::RetryWhen;
use crate::waiter::{StateWaiter, Stateful};

const KIND: ResourceKind = ResourceKind::Cluster;

const AVAILABLE: &[&str] = &[status::AVAILABLE];

const CREATE_PENDING: &[&str] = &[
    status::AVAILABLE_PREP_FOR_RESIZE,
    status::AVAILABLE_RESIZE_CLEANUP,
    status::BACKING_UP,
    status::CREATING,
    status::MODIFYING,
    status::RESTORING,
];

const UPDATE_PENDING: &[&str] = &[
    status::AVAILABLE_PREP_FOR_RESIZE,
    status::AVAILABLE_RESIZE_CLEANUP,
    status::MODIFYING,
    status::REBOOTING,
    status::RESIZING,
];

const DELETE_PENDING: &[&str] = &[
    status::AVAILABLE,
    status::CREATING,
    status::DELETING,
    status::FINAL_SNAPSHOT,
    status::REBOOTING,
    status::RENAMING,
    status::RESIZING,
];

const RELOCATION_PENDING: &[&str] = &[
    relocation_status::DISABLING,
    relocation_status::ENABLING,
    relocation_status::PENDING_DISABLING,
    relocation_status::PENDING_ENABLING,
];

const RELOCATION_RESOLVED: &[&str] = &[relocation_status::ENABLED, relocation_status::DISABLED];

const REBOOT_PENDING: &[&str] = &[status::MODIFYING, status::REBOOTING];

const AQUA_APPLIED: &[&str] = &[aqua_status::ENABLED, aqua_status::DISABLED];

/// Cross-region snapshot copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotCopy {
    pub destination_region: String,
    #[serde(default)]
    pub retention_period: Option<i64>,
    #[serde(default)]
    pub grant_name: Option<String>,
}

/// Audit logging destination. Logging is enabled while this is set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Logging {
    pub bucket_name: Option<String>,
    pub s3_key_prefix: Option<String>,
    pub log_destination_type: Option<String>,
    pub log_exports: Vec<String>,
}

/// Desired cluster configuration.
///
/// `None` leaves the attribute to the service default on create and
/// untouched on update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    pub cluster_identifier: String,
    pub node_type: String,
    pub number_of_nodes: i64,
    pub master_username: Option<String>,
    pub master_password: Option<String>,
    pub manage_master_password: bool,
    /// KMS key of the managed master password secret.
    pub master_password_secret_kms_key_id: Option<String>,
    pub database_name: Option<String>,
    pub cluster_version: Option<String>,
    pub encrypted: bool,
    pub kms_key_id: Option<String>,
    pub allow_version_upgrade: Option<bool>,
    /// `enabled`, `disabled` or `auto`.
    pub aqua_configuration_status: Option<String>,
    /// Reboot right away so an AQUA change takes effect.
    pub apply_immediately: bool,
    pub automated_snapshot_retention_period: Option<i64>,
    pub manual_snapshot_retention_period: Option<i64>,
    pub availability_zone: Option<String>,
    pub availability_zone_relocation_enabled: Option<bool>,
    pub cluster_parameter_group_name: Option<String>,
    pub cluster_subnet_group_name: Option<String>,
    pub default_iam_role_arn: Option<String>,
    pub elastic_ip: Option<String>,
    pub enhanced_vpc_routing: Option<bool>,
    pub iam_roles: Vec<String>,
    pub maintenance_track_name: Option<String>,
    pub multi_az: Option<bool>,
    pub port: Option<i64>,
    pub preferred_maintenance_window: Option<String>,
    pub publicly_accessible: Option<bool>,
    pub vpc_security_group_ids: Vec<String>,
    /// Restore from this snapshot instead of creating an empty cluster.
    pub snapshot_identifier: Option<String>,
    pub snapshot_arn: Option<String>,
    pub snapshot_cluster_identifier: Option<String>,
    pub owner_account: Option<String>,
    pub snapshot_copy: Option<SnapshotCopy>,
    pub logging: Option<Logging>,
    pub skip_final_snapshot: bool,
    pub final_snapshot_identifier: Option<String>,
    pub tags: Tags,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            cluster_identifier: String::new(),
            node_type: String::new(),
            number_of_nodes: 1,
            master_username: None,
            master_password: None,
            manage_master_password: false,
            master_password_secret_kms_key_id: None,
            database_name: None,
            cluster_version: None,
            encrypted: false,
            kms_key_id: None,
            allow_version_upgrade: None,
            aqua_configuration_status: None,
            apply_immediately: false,
            automated_snapshot_retention_period: None,
            manual_snapshot_retention_period: None,
            availability_zone: None,
            availability_zone_relocation_enabled: None,
            cluster_parameter_group_name: None,
            cluster_subnet_group_name: None,
            default_iam_role_arn: None,
            elastic_ip: None,
            enhanced_vpc_routing: None,
            iam_roles: Vec::new(),
            maintenance_track_name: None,
            multi_az: None,
            port: None,
            preferred_maintenance_window: None,
            publicly_accessible: None,
            vpc_security_group_ids: Vec::new(),
            snapshot_identifier: None,
            snapshot_arn: None,
            snapshot_cluster_identifier: None,
            owner_account: None,
            snapshot_copy: None,
            logging: None,
            skip_final_snapshot: false,
            final_snapshot_identifier: None,
            tags: Tags::new(),
        }
    }
}

impl ClusterConfig {
    /// Configuration matching an imported cluster. Imported clusters are
    /// deleted without a final snapshot unless configured otherwise.
    pub fn from_imported(state: &ClusterState) -> Self {
        Self {
            cluster_identifier: state.cluster_identifier.clone(),
            node_type: state.node_type.clone(),
            number_of_nodes: state.number_of_nodes,
            master_username: Some(state.master_username.clone()),
            manage_master_password: state.master_password_secret_arn.is_some(),
            master_password_secret_kms_key_id: state.master_password_secret_kms_key_id.clone(),
            database_name: state.database_name.clone(),
            cluster_version: Some(state.cluster_version.clone()),
            encrypted: state.encrypted,
            kms_key_id: state.kms_key_id.clone(),
            allow_version_upgrade: Some(state.allow_version_upgrade),
            aqua_configuration_status: state.aqua_configuration_status.clone(),
            automated_snapshot_retention_period: Some(state.automated_snapshot_retention_period),
            manual_snapshot_retention_period: Some(state.manual_snapshot_retention_period),
            availability_zone: state.availability_zone.clone(),
            availability_zone_relocation_enabled: Some(state.availability_zone_relocation_enabled),
            cluster_parameter_group_name: state.cluster_parameter_group_name.clone(),
            cluster_subnet_group_name: state.cluster_subnet_group_name.clone(),
            default_iam_role_arn: state.default_iam_role_arn.clone(),
            enhanced_vpc_routing: Some(state.enhanced_vpc_routing),
            iam_roles: state.iam_roles.clone(),
            maintenance_track_name: state.maintenance_track_name.clone(),
            multi_az: Some(state.multi_az),
            port: state.port,
            preferred_maintenance_window: state.preferred_maintenance_window.clone(),
            publicly_accessible: Some(state.publicly_accessible),
            vpc_security_group_ids: state.vpc_security_group_ids.clone(),
            snapshot_copy: state.snapshot_copy.clone(),
            logging: state.logging.clone(),
            skip_final_snapshot: true,
            tags: state.tags.clone(),
            ..Default::default()
        }
    }

    fn restores_snapshot(&self) -> bool {
        self.snapshot_identifier.is_some() || self.snapshot_arn.is_some()
    }

    fn options(&self) -> ClusterOptions {
        ClusterOptions {
            allow_version_upgrade: self.allow_version_upgrade,
            aqua_configuration_status: self.aqua_configuration_status.clone(),
            automated_snapshot_retention_period: self.automated_snapshot_retention_period,
            manual_snapshot_retention_period: self.manual_snapshot_retention_period,
            availability_zone: self.availability_zone.clone(),
            availability_zone_relocation: self.availability_zone_relocation_enabled,
            cluster_parameter_group_name: self.cluster_parameter_group_name.clone(),
            cluster_subnet_group_name: self.cluster_subnet_group_name.clone(),
            default_iam_role_arn: self.default_iam_role_arn.clone(),
            elastic_ip: self.elastic_ip.clone(),
            enhanced_vpc_routing: self.enhanced_vpc_routing,
            iam_roles: self.iam_roles.clone(),
            kms_key_id: self.kms_key_id.clone(),
            maintenance_track_name: self.maintenance_track_name.clone(),
            manage_master_password: self.manage_master_password.then_some(true),
            master_password_secret_kms_key_id: self.master_password_secret_kms_key_id.clone(),
            multi_az: self.multi_az,
            port: self.port,
            preferred_maintenance_window: self.preferred_maintenance_window.clone(),
            publicly_accessible: self.publicly_accessible,
            vpc_security_group_ids: self.vpc_security_group_ids.clone(),
        }
    }
}

/// Cluster as projected from the service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterState {
    pub arn: String,
    pub cluster_identifier: String,
    pub cluster_status: String,
    pub cluster_type: String,
    pub node_type: String,
    pub number_of_nodes: i64,
    pub cluster_nodes: Vec<ClusterNode>,
    pub dns_name: Option<String>,
    /// `address:port`
    pub endpoint: Option<String>,
    pub port: Option<i64>,
    pub master_username: String,
    pub master_password_secret_arn: Option<String>,
    pub master_password_secret_kms_key_id: Option<String>,
    pub database_name: Option<String>,
    pub cluster_version: String,
    pub encrypted: bool,
    pub kms_key_id: Option<String>,
    pub allow_version_upgrade: bool,
    pub aqua_configuration_status: Option<String>,
    pub automated_snapshot_retention_period: i64,
    pub manual_snapshot_retention_period: i64,
    pub availability_zone: Option<String>,
    pub availability_zone_relocation_enabled: bool,
    pub cluster_namespace_arn: Option<String>,
    pub cluster_parameter_group_name: Option<String>,
    pub cluster_subnet_group_name: Option<String>,
    pub default_iam_role_arn: Option<String>,
    pub enhanced_vpc_routing: bool,
    pub iam_roles: Vec<String>,
    pub maintenance_track_name: Option<String>,
    pub multi_az: bool,
    pub preferred_maintenance_window: Option<String>,
    pub publicly_accessible: bool,
    pub vpc_security_group_ids: Vec<String>,
    pub snapshot_copy: Option<SnapshotCopy>,
    pub logging: Option<Logging>,
    pub tags: Tags,
}

/// A cluster seen through its availability zone relocation status.
struct Relocation(Cluster);

impl Stateful for Relocation {
    fn state(&self) -> &str {
        self.0
            .availability_zone_relocation_status
            .as_deref()
            .unwrap_or_default()
    }
}

/// A cluster seen through its AQUA status.
struct Aqua(Cluster);

impl Stateful for Aqua {
    fn state(&self) -> &str {
        self.0
            .aqua_configuration
            .as_ref()
            .map(|a| a.aqua_status.as_str())
            .unwrap_or_default()
    }
}

/// Builds the consolidated `ModifyCluster` request for the attributes the
/// service accepts together. Only changed attributes are set.
fn modify_request(id: &str, old: &ClusterConfig, new: &ClusterConfig) -> ModifyClusterInput {
    let mut input = ModifyClusterInput::new(id);
    input.allow_version_upgrade = changed_opt(&old.allow_version_upgrade, &new.allow_version_upgrade);
    input.automated_snapshot_retention_period = changed_opt(
        &old.automated_snapshot_retention_period,
        &new.automated_snapshot_retention_period,
    );
    input.manual_snapshot_retention_period = changed_opt(
        &old.manual_snapshot_retention_period,
        &new.manual_snapshot_retention_period,
    );
    input.availability_zone_relocation = changed_opt(
        &old.availability_zone_relocation_enabled,
        &new.availability_zone_relocation_enabled,
    );
    input.cluster_parameter_group_name = changed_opt(
        &old.cluster_parameter_group_name,
        &new.cluster_parameter_group_name,
    );
    input.cluster_version = changed_opt(&old.cluster_version, &new.cluster_version);
    input.encrypted = changed(&old.encrypted, &new.encrypted);
    input.enhanced_vpc_routing = changed_opt(&old.enhanced_vpc_routing, &new.enhanced_vpc_routing);
    if new.encrypted {
        input.kms_key_id = changed_opt(&old.kms_key_id, &new.kms_key_id);
    }
    input.maintenance_track_name =
        changed_opt(&old.maintenance_track_name, &new.maintenance_track_name);
    input.master_user_password = changed_opt(&old.master_password, &new.master_password);
    input.manage_master_password =
        changed(&old.manage_master_password, &new.manage_master_password);
    if new.manage_master_password {
        input.master_password_secret_kms_key_id = changed_opt(
            &old.master_password_secret_kms_key_id,
            &new.master_password_secret_kms_key_id,
        );
    }
    input.preferred_maintenance_window = changed_opt(
        &old.preferred_maintenance_window,
        &new.preferred_maintenance_window,
    );
    input.publicly_accessible = changed_opt(&old.publicly_accessible, &new.publicly_accessible);
    if !same_set(&old.vpc_security_group_ids, &new.vpc_security_group_ids) {
        input.vpc_security_group_ids = Some(new.vpc_security_group_ids.clone());
    }

    // Node type, cluster type and node count go out together.
    if old.node_type != new.node_type || old.number_of_nodes != new.number_of_nodes {
        input.node_type = Some(new.node_type.clone());
        if new.number_of_nodes > 1 {
            input.cluster_type = Some(CLUSTER_TYPE_MULTI_NODE.to_string());
            input.number_of_nodes = Some(new.number_of_nodes);
        } else {
            input.cluster_type = Some(CLUSTER_TYPE_SINGLE_NODE.to_string());
        }
    }
    input
}

/// Cluster reconciler.
pub struct ClusterReconciler {
    client: Arc<dyn RedshiftApi>,
    ctx: Arc<ProviderContext>,
}

impl ClusterReconciler {
    pub fn new(client: Arc<dyn RedshiftApi>, ctx: Arc<ProviderContext>) -> Self {
        Self { client, ctx }
    }

    async fn find(&self, id: &str) -> Result<Cluster> {
        Finder::new(KIND, id, "DescribeClusters")
            .find(
                move |marker| self.client.describe_clusters(Some(id), marker),
                |c: &Cluster| c.cluster_identifier == id,
            )
            .await
    }

    async fn find_state(&self, id: &str) -> Result<ClusterState> {
        let cluster = self.find(id).await?;
        let logging = self
            .client
            .describe_logging_status(id)
            .await
            .map_err(|f| Finder::new(KIND, id, "DescribeLoggingStatus").fault(f))?;
        self.project(cluster, logging)
    }

    fn project(&self, cluster: Cluster, logging: LoggingStatus) -> Result<ClusterState> {
        let id = cluster.cluster_identifier.clone();
        let unexpected = |attribute: &'static str, value: &str| Error::UnexpectedValue {
            kind: KIND,
            id: id.clone(),
            attribute,
            value: value.to_string(),
        };

        let relocation = cluster
            .availability_zone_relocation_status
            .as_deref()
            .unwrap_or_default();
        let availability_zone_relocation_enabled = match relocation {
            relocation_status::ENABLED => true,
            relocation_status::DISABLED => false,
            other => return Err(unexpected("availability_zone_relocation_status", other)),
        };

        let multi_az_raw = cluster.multi_az.as_deref().unwrap_or_default();
        let multi_az = match multi_az_raw.to_ascii_lowercase().as_str() {
            "enabled" => true,
            "disabled" => false,
            _ => return Err(unexpected("multi_az", multi_az_raw)),
        };

        let cluster_type = if cluster.cluster_nodes.len() > 1 {
            CLUSTER_TYPE_MULTI_NODE
        } else {
            CLUSTER_TYPE_SINGLE_NODE
        };

        let (dns_name, endpoint, port) = match &cluster.endpoint {
            Some(e) if !e.address.is_empty() && e.port != 0 => (
                Some(e.address.clone()),
                Some(format!("{}:{}", e.address, e.port)),
                Some(e.port),
            ),
            Some(e) if !e.address.is_empty() => {
                (Some(e.address.clone()), Some(e.address.clone()), None)
            }
            _ => (None, None, None),
        };

        let logging = if logging.logging_enabled {
            Some(Logging {
                bucket_name: logging.bucket_name,
                s3_key_prefix: logging.s3_key_prefix,
                log_destination_type: logging.log_destination_type,
                log_exports: logging.log_exports,
            })
        } else {
            None
        };

        let snapshot_copy = cluster.snapshot_copy_status.map(|s| SnapshotCopy {
            destination_region: s.destination_region,
            retention_period: Some(s.retention_period),
            grant_name: s.snapshot_copy_grant_name,
        });

        Ok(ClusterState {
            arn: self.ctx.arn.cluster(&id),
            cluster_status: cluster.cluster_status,
            cluster_type: cluster_type.to_string(),
            node_type: cluster.node_type,
            number_of_nodes: cluster.number_of_nodes,
            cluster_nodes: cluster.cluster_nodes,
            dns_name,
            endpoint,
            port,
            master_username: cluster.master_username,
            master_password_secret_arn: cluster.master_password_secret_arn,
            master_password_secret_kms_key_id: cluster.master_password_secret_kms_key_id,
            database_name: cluster.db_name,
            cluster_version: cluster.cluster_version,
            encrypted: cluster.encrypted,
            kms_key_id: cluster.kms_key_id,
            allow_version_upgrade: cluster.allow_version_upgrade,
            aqua_configuration_status: cluster
                .aqua_configuration
                .map(|a| a.aqua_configuration_status),
            automated_snapshot_retention_period: cluster.automated_snapshot_retention_period,
            manual_snapshot_retention_period: cluster.manual_snapshot_retention_period,
            availability_zone: cluster.availability_zone,
            availability_zone_relocation_enabled,
            cluster_namespace_arn: cluster.cluster_namespace_arn,
            cluster_parameter_group_name: cluster.cluster_parameter_group_name,
            cluster_subnet_group_name: cluster.cluster_subnet_group_name,
            default_iam_role_arn: cluster.default_iam_role_arn,
            enhanced_vpc_routing: cluster.enhanced_vpc_routing,
            iam_roles: cluster
                .iam_roles
                .into_iter()
                .map(|r| r.iam_role_arn)
                .collect(),
            maintenance_track_name: cluster.maintenance_track_name,
            multi_az,
            preferred_maintenance_window: cluster.preferred_maintenance_window,
            publicly_accessible: cluster.publicly_accessible,
            vpc_security_group_ids: cluster.vpc_security_group_ids,
            snapshot_copy,
            logging,
            tags: self.ctx.visible_tags(&cluster.tags),
            cluster_identifier: id,
        })
    }

    fn create_input(&self, config: &ClusterConfig) -> Result<CreateClusterInput> {
        let id = config.cluster_identifier.as_str();
        let master_username = config.master_username.clone().ok_or_else(|| {
            Error::invalid_config(
                KIND,
                id,
                "master_username is required unless restoring from a snapshot",
            )
        })?;
        match (&config.master_password, config.manage_master_password) {
            (None, false) => {
                return Err(Error::invalid_config(
                    KIND,
                    id,
                    "one of master_password or manage_master_password is required",
                ));
            }
            (Some(_), true) => {
                return Err(Error::invalid_config(
                    KIND,
                    id,
                    "master_password conflicts with manage_master_password",
                ));
            }
            _ => {}
        }

        let (cluster_type, number_of_nodes) = if config.number_of_nodes > 1 {
            (CLUSTER_TYPE_MULTI_NODE, Some(config.number_of_nodes))
        } else {
            (CLUSTER_TYPE_SINGLE_NODE, None)
        };

        Ok(CreateClusterInput {
            cluster_identifier: config.cluster_identifier.clone(),
            cluster_type: cluster_type.to_string(),
            node_type: config.node_type.clone(),
            number_of_nodes,
            master_username,
            master_user_password: config.master_password.clone(),
            db_name: config.database_name.clone(),
            cluster_version: config.cluster_version.clone(),
            encrypted: config.encrypted.then_some(true),
            options: config.options(),
            tags: self.ctx.effective_tags(&config.tags),
        })
    }

    fn restore_input(&self, config: &ClusterConfig) -> RestoreFromClusterSnapshotInput {
        RestoreFromClusterSnapshotInput {
            cluster_identifier: config.cluster_identifier.clone(),
            node_type: config.node_type.clone(),
            number_of_nodes: (config.number_of_nodes > 1).then_some(config.number_of_nodes),
            snapshot_identifier: config.snapshot_identifier.clone(),
            snapshot_arn: config.snapshot_arn.clone(),
            snapshot_cluster_identifier: config.snapshot_cluster_identifier.clone(),
            owner_account: config.owner_account.clone(),
            options: config.options(),
        }
    }

    /// Retry for calls rejected while the cluster is busy.
    fn busy_retry<'a>(&'a self, id: &'a str, action: &'static str) -> RetryWhen<'a> {
        RetryWhen::new(
            KIND,
            id,
            action,
            FaultKind::InvalidState,
            self.ctx.timeouts().invalid_state_retry,
            self.ctx.poll(),
        )
    }

    async fn wait_settled(&self, id: &str, pending: &[&str], timeout: Duration) -> Result<Cluster> {
        StateWaiter::new(KIND, id, self.ctx.poll())
            .pending(pending)
            .target(AVAILABLE)
            .timeout(timeout)
            .until_state(move || self.find(id))
            .await
    }

    async fn wait_updated(&self, id: &str) -> Result<()> {
        self.wait_settled(id, UPDATE_PENDING, self.ctx.timeouts().cluster_update)
            .await
            .map(|_| ())
    }

    async fn wait_relocation_resolved(&self, id: &str) -> Result<()> {
        StateWaiter::new(KIND, id, self.ctx.poll())
            .pending(RELOCATION_PENDING)
            .target(RELOCATION_RESOLVED)
            .timeout(self.ctx.timeouts().cluster_update)
            .until_state(move || async move { self.find(id).await.map(Relocation) })
            .await
            .map(|_| ())
    }

    async fn modify(&self, input: ModifyClusterInput, action: &'static str) -> Result<()> {
        let id = input.cluster_identifier.clone();
        debug!("{} {} {}: {:?}", action, KIND, id, input);
        self.busy_retry(&id, action)
            .run(move || self.client.modify_cluster(input.clone()))
            .await?;
        self.wait_updated(&id).await
    }

    /// Change the AQUA configuration. It only takes effect on the next
    /// reboot, which `apply_immediately` triggers and waits out.
    async fn modify_aqua(&self, id: &str, configuration: String, apply_immediately: bool) -> Result<()> {
        info!("Modifying AQUA configuration of {} {} to {}", KIND, id, configuration);
        self.client
            .modify_aqua_configuration(ModifyAquaConfigurationInput {
                cluster_identifier: id.to_string(),
                aqua_configuration_status: configuration,
            })
            .await
            .map_err(|f| Error::api(KIND, id, "modifying AQUA configuration of", f))?;
        if !apply_immediately {
            return Ok(());
        }

        info!("Rebooting {} {}", KIND, id);
        self.busy_retry(id, "rebooting")
            .run(move || self.client.reboot_cluster(id))
            .await?;
        let timeout = self.ctx.timeouts().cluster_update;
        self.wait_settled(id, REBOOT_PENDING, timeout).await?;
        StateWaiter::new(KIND, id, self.ctx.poll())
            .pending(&[aqua_status::APPLYING])
            .target(AQUA_APPLIED)
            .timeout(timeout)
            .until_state(move || async move { self.find(id).await.map(Aqua) })
            .await
            .map(|_| ())
    }

    async fn enable_snapshot_copy(&self, id: &str, copy: &SnapshotCopy) -> Result<()> {
        info!("Enabling snapshot copy to {} for {} {}", copy.destination_region, KIND, id);
        self.client
            .enable_snapshot_copy(EnableSnapshotCopyInput {
                cluster_identifier: id.to_string(),
                destination_region: copy.destination_region.clone(),
                retention_period: copy.retention_period,
                snapshot_copy_grant_name: copy.grant_name.clone(),
            })
            .await
            .map(|_| ())
            .map_err(|f| Error::api(KIND, id, "enabling snapshot copy for", f))
    }

    async fn disable_snapshot_copy(&self, id: &str) -> Result<()> {
        info!("Disabling snapshot copy for {} {}", KIND, id);
        self.client
            .disable_snapshot_copy(id)
            .await
            .map(|_| ())
            .map_err(|f| Error::api(KIND, id, "disabling snapshot copy for", f))
    }

    async fn enable_logging(&self, id: &str, logging: &Logging) -> Result<()> {
        info!("Enabling logging for {} {}", KIND, id);
        let input = EnableLoggingInput {
            cluster_identifier: id.to_string(),
            bucket_name: logging.bucket_name.clone(),
            s3_key_prefix: logging.s3_key_prefix.clone(),
            log_destination_type: logging.log_destination_type.clone(),
            log_exports: logging.log_exports.clone(),
        };
        self.busy_retry(id, "enabling logging for")
            .run(move || self.client.enable_logging(input.clone()))
            .await
            .map(|_| ())
    }

    async fn disable_logging(&self, id: &str) -> Result<()> {
        info!("Disabling logging for {} {}", KIND, id);
        self.busy_retry(id, "disabling logging for")
            .run(move || self.client.disable_logging(id))
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl Reconciler for ClusterReconciler {
    type Config = ClusterConfig;
    type State = ClusterState;

    fn kind(&self) -> ResourceKind {
        KIND
    }

    async fn create(&self, config: &ClusterConfig) -> Result<Applied<ClusterState>> {
        let requested = config.cluster_identifier.as_str();
        if requested.is_empty() || config.node_type.is_empty() {
            return Err(Error::invalid_config(
                KIND,
                requested,
                "cluster_identifier and node_type are required",
            ));
        }
        let timeouts = self.ctx.timeouts();
        let propagation = RetryWhen::new(
            KIND,
            requested,
            "creating",
            FaultKind::RolePropagation,
            timeouts.iam_propagation,
            self.ctx.poll(),
        );

        let created = if config.restores_snapshot() {
            info!("Restoring {} {} from snapshot", KIND, requested);
            let input = self.restore_input(config);
            propagation
                .run(move || self.client.restore_from_cluster_snapshot(input.clone()))
                .await?
        } else {
            info!("Creating {} {}", KIND, requested);
            let input = self.create_input(config)?;
            propagation
                .run(move || self.client.create_cluster(input.clone()))
                .await?
        };
        let id = created.cluster_identifier;

        self.wait_settled(&id, CREATE_PENDING, timeouts.cluster_create)
            .await?;
        self.wait_relocation_resolved(&id).await?;

        if config.restores_snapshot() {
            let arn = self.ctx.arn.cluster(&id);
            update_tags(
                self.client.as_ref(),
                &self.ctx,
                KIND,
                &id,
                &arn,
                &Tags::new(),
                &config.tags,
            )
            .await?;
        }
        if let Some(copy) = &config.snapshot_copy {
            self.enable_snapshot_copy(&id, copy).await?;
        }
        if let Some(logging) = &config.logging {
            self.enable_logging(&id, logging).await?;
        }

        let state = self.find_state(&id).await?;
        info!("Created {} {}", KIND, id);
        Ok(Applied { id, state })
    }

    async fn read(&self, id: &str) -> Result<Option<ClusterState>> {
        absent_on_not_found(KIND, id, self.find_state(id).await)
    }

    async fn update(
        &self,
        id: &str,
        old: &ClusterConfig,
        new: &ClusterConfig,
    ) -> Result<ClusterState> {
        ensure_in_place(
            KIND,
            id,
            &[
                (
                    "cluster_identifier",
                    old.cluster_identifier != new.cluster_identifier,
                ),
                ("master_username", old.master_username != new.master_username),
                ("database_name", old.database_name != new.database_name),
                (
                    "cluster_subnet_group_name",
                    old.cluster_subnet_group_name != new.cluster_subnet_group_name,
                ),
                ("port", old.port != new.port),
                ("elastic_ip", old.elastic_ip != new.elastic_ip),
                (
                    "snapshot_identifier",
                    old.snapshot_identifier != new.snapshot_identifier,
                ),
                ("snapshot_arn", old.snapshot_arn != new.snapshot_arn),
                (
                    "snapshot_cluster_identifier",
                    old.snapshot_cluster_identifier != new.snapshot_cluster_identifier,
                ),
                ("owner_account", old.owner_account != new.owner_account),
            ],
        )?;
        info!("Updating {} {}", KIND, id);

        let modify = modify_request(id, old, new);
        if modify != ModifyClusterInput::new(id) {
            self.modify(modify, "modifying").await?;
            self.wait_relocation_resolved(id).await?;
        }

        if !same_set(&old.iam_roles, &new.iam_roles)
            || old.default_iam_role_arn != new.default_iam_role_arn
        {
            let roles = SetDiff::between(&old.iam_roles, &new.iam_roles);
            let input = ModifyClusterIamRolesInput {
                cluster_identifier: id.to_string(),
                add_iam_roles: roles.to_add.into_iter().collect(),
                remove_iam_roles: roles.to_remove.into_iter().collect(),
                default_iam_role_arn: Some(new.default_iam_role_arn.clone().unwrap_or_default()),
            };
            debug!("Modifying IAM roles of {} {}: {:?}", KIND, id, input);
            self.busy_retry(id, "modifying IAM roles of")
                .run(move || self.client.modify_cluster_iam_roles(input.clone()))
                .await?;
            self.wait_updated(id).await?;
        }

        if let Some(configuration) =
            changed_opt(&old.aqua_configuration_status, &new.aqua_configuration_status)
        {
            self.modify_aqua(id, configuration, new.apply_immediately)
                .await?;
        }

        // The availability zone cannot change together with other settings.
        if let Some(zone) = changed_opt(&old.availability_zone, &new.availability_zone) {
            let mut input = ModifyClusterInput::new(id);
            input.availability_zone = Some(zone);
            self.modify(input, "relocating").await?;
        }

        if old.snapshot_copy != new.snapshot_copy {
            match &new.snapshot_copy {
                Some(copy) => match self.enable_snapshot_copy(id, copy).await {
                    Err(e) if e.fault_kind() == Some(FaultKind::AlreadyExists) => {
                        // Settings of an active copy can only change by toggling it.
                        self.disable_snapshot_copy(id).await?;
                        self.enable_snapshot_copy(id, copy).await?;
                    }
                    other => other?,
                },
                None => self.disable_snapshot_copy(id).await?,
            }
        }

        if old.logging != new.logging {
            match &new.logging {
                Some(logging) => self.enable_logging(id, logging).await?,
                None => self.disable_logging(id).await?,
            }
        }

        if let Some(multi_az) = changed_opt(&old.multi_az, &new.multi_az) {
            let mut input = ModifyClusterInput::new(id);
            input.multi_az = Some(multi_az);
            self.modify(input, "modifying multi-AZ of").await?;

            if !multi_az {
                // Disabling multi-AZ switches relocation on; restore the configured value.
                let mut input = ModifyClusterInput::new(id);
                input.availability_zone_relocation =
                    Some(new.availability_zone_relocation_enabled.unwrap_or(false));
                self.modify(input, "modifying AZ relocation of").await?;
            }
        }

        update_tags(
            self.client.as_ref(),
            &self.ctx,
            KIND,
            id,
            &self.ctx.arn.cluster(id),
            &old.tags,
            &new.tags,
        )
        .await?;

        self.find_state(id).await
    }

    async fn delete(&self, id: &str, config: &ClusterConfig) -> Result<()> {
        if !config.skip_final_snapshot && config.final_snapshot_identifier.is_none() {
            return Err(Error::invalid_config(
                KIND,
                id,
                "final_snapshot_identifier is required when skip_final_snapshot is false",
            ));
        }
        info!("Deleting {} {}", KIND, id);

        let input = DeleteClusterInput {
            cluster_identifier: id.to_string(),
            skip_final_cluster_snapshot: config.skip_final_snapshot,
            final_cluster_snapshot_identifier: if config.skip_final_snapshot {
                None
            } else {
                config.final_snapshot_identifier.clone()
            },
        };
        match self
            .busy_retry(id, "deleting")
            .run(move || self.client.delete_cluster(input.clone()))
            .await
        {
            Ok(_) => {}
            Err(e) if e.is_not_found() => {
                info!("{} ({}) already deleted", KIND, id);
                return Ok(());
            }
            Err(e) => return Err(e),
        }

        StateWaiter::new(KIND, id, self.ctx.poll())
            .pending(DELETE_PENDING)
            .timeout(self.ctx.timeouts().cluster_delete)
            .until_gone(move || self.find(id))
            .await
    }

    async fn import(&self, raw_id: &str) -> Result<Applied<ClusterState>> {
        info!("Importing {} {}", KIND, raw_id);
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

    fn base() -> ClusterConfig {
        ClusterConfig {
            cluster_identifier: "analytics".to_string(),
            node_type: "ra3.xlplus".to_string(),
            number_of_nodes: 2,
            master_username: Some("admin".to_string()),
            master_password: Some("Sup3rSecret".to_string()),
            preferred_maintenance_window: Some("sun:01:00-sun:01:30".to_string()),
            automated_snapshot_retention_period: Some(1),
            ..Default::default()
        }
    }

    #[test]
    fn test_modify_request_touches_only_changed_field() {
        let old = base();
        let new = ClusterConfig {
            preferred_maintenance_window: Some("mon:02:00-mon:02:30".to_string()),
            ..base()
        };

        let mut expected = ModifyClusterInput::new("analytics");
        expected.preferred_maintenance_window = Some("mon:02:00-mon:02:30".to_string());
        assert_eq!(modify_request("analytics", &old, &new), expected);
    }

    #[test]
    fn test_modify_request_is_empty_without_changes() {
        assert_eq!(
            modify_request("analytics", &base(), &base()),
            ModifyClusterInput::new("analytics")
        );
    }

    #[test]
    fn test_resize_sends_node_settings_together() {
        let new = ClusterConfig {
            number_of_nodes: 4,
            ..base()
        };
        let input = modify_request("analytics", &base(), &new);
        assert_eq!(input.node_type.as_deref(), Some("ra3.xlplus"));
        assert_eq!(input.cluster_type.as_deref(), Some(CLUSTER_TYPE_MULTI_NODE));
        assert_eq!(input.number_of_nodes, Some(4));
    }

    #[test]
    fn test_shrinking_to_single_node_omits_node_count() {
        let new = ClusterConfig {
            number_of_nodes: 1,
            ..base()
        };
        let input = modify_request("analytics", &base(), &new);
        assert_eq!(input.cluster_type.as_deref(), Some(CLUSTER_TYPE_SINGLE_NODE));
        assert_eq!(input.number_of_nodes, None);
    }

    #[test]
    fn test_reordered_security_groups_are_unchanged() {
        let old = ClusterConfig {
            vpc_security_group_ids: vec!["sg-1".into(), "sg-2".into()],
            ..base()
        };
        let new = ClusterConfig {
            vpc_security_group_ids: vec!["sg-2".into(), "sg-1".into()],
            ..base()
        };
        assert_eq!(modify_request("analytics", &old, &new).vpc_security_group_ids, None);
    }

    #[test]
    fn test_kms_key_only_sent_for_encrypted_clusters() {
        let new = ClusterConfig {
            kms_key_id: Some("key-1".into()),
            ..base()
        };
        assert_eq!(modify_request("analytics", &base(), &new).kms_key_id, None);

        let encrypted = ClusterConfig {
            encrypted: true,
            ..new
        };
        let input = modify_request("analytics", &base(), &encrypted);
        assert_eq!(input.encrypted, Some(true));
        assert_eq!(input.kms_key_id.as_deref(), Some("key-1"));
    }
}
