//! Cluster records and requests.

use serde::{Deserialize, Serialize};

use crate::Tags;

/// Cluster status values reported by the service.
pub mod status {
    pub const AVAILABLE: &str = "available";
    pub const AVAILABLE_PREP_FOR_RESIZE: &str = "available, prep-for-resize";
    pub const AVAILABLE_RESIZE_CLEANUP: &str = "available, resize-cleanup";
    pub const BACKING_UP: &str = "backing-up";
    pub const CREATING: &str = "creating";
    pub const DELETING: &str = "deleting";
    pub const FINAL_SNAPSHOT: &str = "final-snapshot";
    pub const MODIFYING: &str = "modifying";
    pub const REBOOTING: &str = "rebooting";
    pub const RENAMING: &str = "renaming";
    pub const RESIZING: &str = "resizing";
    pub const RESTORING: &str = "restoring";
}

/// Availability zone relocation status values.
pub mod relocation_status {
    pub const ENABLED: &str = "enabled";
    pub const DISABLED: &str = "disabled";
    pub const ENABLING: &str = "enabling";
    pub const DISABLING: &str = "disabling";
    pub const PENDING_ENABLING: &str = "pending_enabling";
    pub const PENDING_DISABLING: &str = "pending_disabling";
}

/// AQUA status values; `applying` until a reboot picks up a change.
pub mod aqua_status {
    pub const ENABLED: &str = "enabled";
    pub const DISABLED: &str = "disabled";
    pub const APPLYING: &str = "applying";
}

/// Requested AQUA configuration values.
pub mod aqua_configuration_status {
    pub const ENABLED: &str = "enabled";
    pub const DISABLED: &str = "disabled";
    pub const AUTO: &str = "auto";
}

pub const CLUSTER_TYPE_SINGLE_NODE: &str = "single-node";
pub const CLUSTER_TYPE_MULTI_NODE: &str = "multi-node";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterNode {
    pub node_role: String,
    pub private_ip_address: Option<String>,
    pub public_ip_address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterIamRole {
    pub iam_role_arn: String,
    pub apply_status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterEndpoint {
    pub address: String,
    pub port: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotCopyStatus {
    pub destination_region: String,
    pub retention_period: i64,
    pub snapshot_copy_grant_name: Option<String>,
}

/// Advanced query accelerator (AQUA) settings of a cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AquaConfiguration {
    pub aqua_status: String,
    pub aqua_configuration_status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifyAquaConfigurationInput {
    pub cluster_identifier: String,
    pub aqua_configuration_status: String,
}

/// A cluster as returned by `DescribeClusters`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cluster {
    pub cluster_identifier: String,
    pub cluster_status: String,
    pub allow_version_upgrade: bool,
    pub aqua_configuration: Option<AquaConfiguration>,
    pub automated_snapshot_retention_period: i64,
    pub manual_snapshot_retention_period: i64,
    pub availability_zone: Option<String>,
    pub availability_zone_relocation_status: Option<String>,
    pub cluster_namespace_arn: Option<String>,
    pub cluster_nodes: Vec<ClusterNode>,
    pub cluster_parameter_group_name: Option<String>,
    pub cluster_subnet_group_name: Option<String>,
    pub cluster_version: String,
    pub db_name: Option<String>,
    pub default_iam_role_arn: Option<String>,
    pub encrypted: bool,
    pub enhanced_vpc_routing: bool,
    pub iam_roles: Vec<ClusterIamRole>,
    pub kms_key_id: Option<String>,
    pub maintenance_track_name: Option<String>,
    pub master_username: String,
    pub master_password_secret_arn: Option<String>,
    pub master_password_secret_kms_key_id: Option<String>,
    pub multi_az: Option<String>,
    pub node_type: String,
    pub number_of_nodes: i64,
    pub preferred_maintenance_window: Option<String>,
    pub publicly_accessible: bool,
    pub snapshot_copy_status: Option<SnapshotCopyStatus>,
    pub vpc_security_group_ids: Vec<String>,
    pub endpoint: Option<ClusterEndpoint>,
    pub tags: Tags,
}

/// Settings shared by `CreateCluster` and `RestoreFromClusterSnapshot`.
///
/// Unset fields are omitted from the request so the service applies its
/// own defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterOptions {
    pub allow_version_upgrade: Option<bool>,
    pub aqua_configuration_status: Option<String>,
    pub automated_snapshot_retention_period: Option<i64>,
    pub manual_snapshot_retention_period: Option<i64>,
    pub availability_zone: Option<String>,
    pub availability_zone_relocation: Option<bool>,
    pub cluster_parameter_group_name: Option<String>,
    pub cluster_subnet_group_name: Option<String>,
    pub default_iam_role_arn: Option<String>,
    pub elastic_ip: Option<String>,
    pub enhanced_vpc_routing: Option<bool>,
    pub iam_roles: Vec<String>,
    pub kms_key_id: Option<String>,
    pub maintenance_track_name: Option<String>,
    pub manage_master_password: Option<bool>,
    pub master_password_secret_kms_key_id: Option<String>,
    pub multi_az: Option<bool>,
    pub port: Option<i64>,
    pub preferred_maintenance_window: Option<String>,
    pub publicly_accessible: Option<bool>,
    pub vpc_security_group_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateClusterInput {
    pub cluster_identifier: String,
    pub cluster_type: String,
    pub node_type: String,
    pub number_of_nodes: Option<i64>,
    pub master_username: String,
    pub master_user_password: Option<String>,
    pub db_name: Option<String>,
    pub cluster_version: Option<String>,
    pub encrypted: Option<bool>,
    pub options: ClusterOptions,
    pub tags: Tags,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreFromClusterSnapshotInput {
    pub cluster_identifier: String,
    pub node_type: String,
    pub number_of_nodes: Option<i64>,
    pub snapshot_identifier: Option<String>,
    pub snapshot_arn: Option<String>,
    pub snapshot_cluster_identifier: Option<String>,
    pub owner_account: Option<String>,
    pub options: ClusterOptions,
}

/// `ModifyCluster` request. Only fields that are `Some` are changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifyClusterInput {
    pub cluster_identifier: String,
    pub allow_version_upgrade: Option<bool>,
    pub automated_snapshot_retention_period: Option<i64>,
    pub manual_snapshot_retention_period: Option<i64>,
    pub availability_zone: Option<String>,
    pub availability_zone_relocation: Option<bool>,
    pub cluster_parameter_group_name: Option<String>,
    pub cluster_type: Option<String>,
    pub cluster_version: Option<String>,
    pub encrypted: Option<bool>,
    pub enhanced_vpc_routing: Option<bool>,
    pub kms_key_id: Option<String>,
    pub maintenance_track_name: Option<String>,
    pub manage_master_password: Option<bool>,
    pub master_user_password: Option<String>,
    pub master_password_secret_kms_key_id: Option<String>,
    pub multi_az: Option<bool>,
    pub node_type: Option<String>,
    pub number_of_nodes: Option<i64>,
    pub preferred_maintenance_window: Option<String>,
    pub publicly_accessible: Option<bool>,
    pub vpc_security_group_ids: Option<Vec<String>>,
}

impl ModifyClusterInput {
    pub fn new(cluster_identifier: impl Into<String>) -> Self {
        Self {
            cluster_identifier: cluster_identifier.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifyClusterIamRolesInput {
    pub cluster_identifier: String,
    pub add_iam_roles: Vec<String>,
    pub remove_iam_roles: Vec<String>,
    pub default_iam_role_arn: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteClusterInput {
    pub cluster_identifier: String,
    pub skip_final_cluster_snapshot: bool,
    pub final_cluster_snapshot_identifier: Option<String>,
}

/// Audit logging configuration of a cluster.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingStatus {
    pub logging_enabled: bool,
    pub bucket_name: Option<String>,
    pub s3_key_prefix: Option<String>,
    pub log_destination_type: Option<String>,
    pub log_exports: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnableLoggingInput {
    pub cluster_identifier: String,
    pub bucket_name: Option<String>,
    pub s3_key_prefix: Option<String>,
    pub log_destination_type: Option<String>,
    pub log_exports: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnableSnapshotCopyInput {
    pub cluster_identifier: String,
    pub destination_region: String,
    pub retention_period: Option<i64>,
    pub snapshot_copy_grant_name: Option<String>,
}
