//! Records and requests for the non-cluster resource types.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Tags;

// =============================================================================
// Subnet groups
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterSubnetGroup {
    pub cluster_subnet_group_name: String,
    pub description: String,
    pub vpc_id: String,
    pub subnet_group_status: String,
    pub subnet_ids: Vec<String>,
    pub tags: Tags,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateClusterSubnetGroupInput {
    pub cluster_subnet_group_name: String,
    pub description: String,
    pub subnet_ids: Vec<String>,
    pub tags: Tags,
}

/// The service requires the full subnet list on every modify call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifyClusterSubnetGroupInput {
    pub cluster_subnet_group_name: String,
    pub description: Option<String>,
    pub subnet_ids: Vec<String>,
}

// =============================================================================
// Snapshot schedules
// =============================================================================

/// Association states of a cluster attached to a snapshot schedule.
pub mod association_state {
    pub const ACTIVE: &str = "ACTIVE";
    pub const FAILED: &str = "FAILED";
    pub const MODIFYING: &str = "MODIFYING";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterAssociatedToSchedule {
    pub cluster_identifier: String,
    pub schedule_association_state: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotSchedule {
    pub schedule_identifier: String,
    pub schedule_description: Option<String>,
    pub schedule_definitions: Vec<String>,
    pub associated_clusters: Vec<ClusterAssociatedToSchedule>,
    pub tags: Tags,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescribeSnapshotSchedulesInput {
    pub schedule_identifier: Option<String>,
    pub cluster_identifier: Option<String>,
    pub marker: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateSnapshotScheduleInput {
    pub schedule_identifier: String,
    pub schedule_description: Option<String>,
    pub schedule_definitions: Vec<String>,
    pub tags: Tags,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifySnapshotScheduleInput {
    pub schedule_identifier: String,
    pub schedule_definitions: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifyClusterSnapshotScheduleInput {
    pub cluster_identifier: String,
    pub schedule_identifier: Option<String>,
    pub disassociate_schedule: bool,
}

// =============================================================================
// Scheduled actions
// =============================================================================

pub mod scheduled_action_state {
    pub const ACTIVE: &str = "ACTIVE";
    pub const DISABLED: &str = "DISABLED";
}

/// The cluster operation a scheduled action runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduledActionTarget {
    PauseCluster {
        cluster_identifier: String,
    },
    ResumeCluster {
        cluster_identifier: String,
    },
    ResizeCluster {
        cluster_identifier: String,
        cluster_type: Option<String>,
        node_type: Option<String>,
        number_of_nodes: Option<i64>,
        classic: Option<bool>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledAction {
    pub scheduled_action_name: String,
    pub target_action: ScheduledActionTarget,
    pub schedule: String,
    pub iam_role: String,
    pub scheduled_action_description: Option<String>,
    pub state: String,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateScheduledActionInput {
    pub scheduled_action_name: String,
    pub target_action: ScheduledActionTarget,
    pub schedule: String,
    pub iam_role: String,
    pub scheduled_action_description: Option<String>,
    pub enable: Option<bool>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifyScheduledActionInput {
    pub scheduled_action_name: String,
    pub target_action: Option<ScheduledActionTarget>,
    pub schedule: Option<String>,
    pub iam_role: Option<String>,
    pub scheduled_action_description: Option<String>,
    pub enable: Option<bool>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

// =============================================================================
// Usage limits
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageLimit {
    pub usage_limit_id: String,
    pub cluster_identifier: String,
    pub feature_type: String,
    pub limit_type: String,
    pub amount: i64,
    pub period: String,
    pub breach_action: String,
    pub tags: Tags,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateUsageLimitInput {
    pub cluster_identifier: String,
    pub feature_type: String,
    pub limit_type: String,
    pub amount: i64,
    pub period: Option<String>,
    pub breach_action: Option<String>,
    pub tags: Tags,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifyUsageLimitInput {
    pub usage_limit_id: String,
    pub amount: Option<i64>,
    pub breach_action: Option<String>,
}

// =============================================================================
// Endpoint access
// =============================================================================

pub mod endpoint_status {
    pub const ACTIVE: &str = "active";
    pub const CREATING: &str = "creating";
    pub const DELETING: &str = "deleting";
    pub const MODIFYING: &str = "modifying";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointAccess {
    pub endpoint_name: String,
    pub cluster_identifier: String,
    pub subnet_group_name: String,
    pub resource_owner: String,
    pub endpoint_status: String,
    pub address: Option<String>,
    pub port: Option<i64>,
    pub vpc_security_group_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateEndpointAccessInput {
    pub endpoint_name: String,
    pub cluster_identifier: String,
    pub subnet_group_name: String,
    pub resource_owner: Option<String>,
    pub vpc_security_group_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifyEndpointAccessInput {
    pub endpoint_name: String,
    pub vpc_security_group_ids: Vec<String>,
}

// =============================================================================
// Cluster snapshots
// =============================================================================

pub mod snapshot_status {
    pub const AVAILABLE: &str = "available";
    pub const CREATING: &str = "creating";
    pub const DELETED: &str = "deleted";
    pub const FAILED: &str = "failed";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterSnapshot {
    pub snapshot_identifier: String,
    pub cluster_identifier: String,
    pub status: String,
    pub manual_snapshot_retention_period: i64,
    pub snapshot_create_time: Option<DateTime<Utc>>,
    pub owner_account: String,
    pub kms_key_id: Option<String>,
    pub tags: Tags,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateClusterSnapshotInput {
    pub snapshot_identifier: String,
    pub cluster_identifier: String,
    pub manual_snapshot_retention_period: Option<i64>,
    pub tags: Tags,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifyClusterSnapshotInput {
    pub snapshot_identifier: String,
    pub manual_snapshot_retention_period: Option<i64>,
}

// =============================================================================
// HSM client certificates
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HsmClientCertificate {
    pub hsm_client_certificate_identifier: String,
    pub hsm_client_certificate_public_key: String,
    pub tags: Tags,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateHsmClientCertificateInput {
    pub hsm_client_certificate_identifier: String,
    pub tags: Tags,
}

// =============================================================================
// Partner integrations
// =============================================================================

pub mod partner_status {
    pub const ACTIVE: &str = "Active";
    pub const INACTIVE: &str = "Inactive";
    pub const RUNTIME_FAILURE: &str = "RuntimeFailure";
    pub const CONNECTION_FAILURE: &str = "ConnectionFailure";
}

/// Natural key of a partner integration.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PartnerKey {
    pub account_id: String,
    pub cluster_identifier: String,
    pub database_name: String,
    pub partner_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartnerIntegration {
    pub database_name: String,
    pub partner_name: String,
    pub status: String,
    pub status_message: Option<String>,
}

// =============================================================================
// Data shares
// =============================================================================

pub mod data_share_status {
    pub const ACTIVE: &str = "ACTIVE";
    pub const AUTHORIZED: &str = "AUTHORIZED";
    pub const DEAUTHORIZED: &str = "DEAUTHORIZED";
    pub const PENDING_AUTHORIZATION: &str = "PENDING_AUTHORIZATION";
    pub const REJECTED: &str = "REJECTED";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataShareAssociation {
    pub consumer_identifier: String,
    /// Set for associations scoped to one consumer region.
    pub consumer_region: Option<String>,
    pub status: String,
    pub allow_writes: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataShare {
    pub data_share_arn: String,
    pub producer_arn: String,
    pub allow_publicly_accessible_consumers: bool,
    pub associations: Vec<DataShareAssociation>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizeDataShareInput {
    pub data_share_arn: String,
    pub consumer_identifier: String,
    pub allow_writes: Option<bool>,
}

/// Consumer side of a data share. Exactly one of `associate_entire_account`,
/// `consumer_arn` and `consumer_region` is expected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssociateDataShareConsumerInput {
    pub data_share_arn: String,
    pub associate_entire_account: Option<bool>,
    pub consumer_arn: Option<String>,
    pub consumer_region: Option<String>,
    pub allow_writes: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisassociateDataShareConsumerInput {
    pub data_share_arn: String,
    pub disassociate_entire_account: Option<bool>,
    pub consumer_arn: Option<String>,
    pub consumer_region: Option<String>,
}

// =============================================================================
// Event subscriptions
// =============================================================================

pub mod event_subscription_status {
    pub const CREATING: &str = "creating";
    pub const ACTIVE: &str = "active";
    pub const NO_PERMISSION: &str = "no-permission";
    pub const TOPIC_NOT_EXIST: &str = "topic-not-exist";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSubscription {
    pub cust_subscription_id: String,
    pub customer_aws_id: String,
    pub sns_topic_arn: String,
    pub status: String,
    pub source_type: Option<String>,
    pub source_ids: Vec<String>,
    pub event_categories: Vec<String>,
    pub severity: Option<String>,
    pub enabled: bool,
    pub tags: Tags,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateEventSubscriptionInput {
    pub subscription_name: String,
    pub sns_topic_arn: String,
    pub source_type: Option<String>,
    pub source_ids: Vec<String>,
    pub event_categories: Vec<String>,
    pub severity: Option<String>,
    pub enabled: Option<bool>,
    pub tags: Tags,
}

/// Only fields that are `Some` are changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifyEventSubscriptionInput {
    pub subscription_name: String,
    pub sns_topic_arn: Option<String>,
    pub source_type: Option<String>,
    pub source_ids: Option<Vec<String>>,
    pub event_categories: Option<Vec<String>>,
    pub severity: Option<String>,
    pub enabled: Option<bool>,
}

// =============================================================================
// Endpoint authorizations
// =============================================================================

pub mod endpoint_authorization_status {
    pub const AUTHORIZED: &str = "Authorized";
    pub const REVOKING: &str = "Revoking";
}

/// Cross-account permission to create endpoints for a cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointAuthorization {
    pub grantor: String,
    pub grantee: String,
    pub cluster_identifier: String,
    pub status: String,
    pub allowed_all_vpcs: bool,
    pub allowed_vpcs: Vec<String>,
    pub endpoint_count: i64,
}

/// An empty `vpc_ids` list grants every VPC of the account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizeEndpointAccessInput {
    pub cluster_identifier: String,
    pub account: String,
    pub vpc_ids: Vec<String>,
}

/// An empty `vpc_ids` list revokes the whole authorization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevokeEndpointAccessInput {
    pub cluster_identifier: String,
    pub account: String,
    pub vpc_ids: Vec<String>,
    /// Also delete endpoints the grantee created.
    pub force: bool,
}

// =============================================================================
// HSM configurations
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HsmConfiguration {
    pub hsm_configuration_identifier: String,
    pub description: String,
    pub hsm_ip_address: String,
    pub hsm_partition_name: String,
    pub tags: Tags,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateHsmConfigurationInput {
    pub hsm_configuration_identifier: String,
    pub description: String,
    pub hsm_ip_address: String,
    pub hsm_partition_name: String,
    pub hsm_partition_password: String,
    pub hsm_server_public_certificate: String,
    pub tags: Tags,
}

// =============================================================================
// Authentication profiles
// =============================================================================

/// Also used as the create and modify request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticationProfile {
    pub authentication_profile_name: String,
    /// JSON document.
    pub authentication_profile_content: String,
}

// =============================================================================
// Zero-ETL integrations
// =============================================================================

pub mod integration_status {
    pub const ACTIVE: &str = "active";
    pub const CREATING: &str = "creating";
    pub const DELETING: &str = "deleting";
    pub const FAILED: &str = "failed";
    pub const MODIFYING: &str = "modifying";
    pub const NEEDS_ATTENTION: &str = "needs_attention";
    pub const SYNCING: &str = "syncing";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Integration {
    pub integration_arn: String,
    pub integration_name: String,
    pub source_arn: String,
    pub target_arn: String,
    pub status: String,
    pub description: Option<String>,
    pub kms_key_id: Option<String>,
    pub additional_encryption_context: BTreeMap<String, String>,
    pub create_time: Option<DateTime<Utc>>,
    pub tags: Tags,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateIntegrationInput {
    pub integration_name: String,
    pub source_arn: String,
    pub target_arn: String,
    pub description: Option<String>,
    pub kms_key_id: Option<String>,
    pub additional_encryption_context: BTreeMap<String, String>,
    pub tags: Tags,
}

/// Only fields that are `Some` are changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifyIntegrationInput {
    pub integration_arn: String,
    pub integration_name: Option<String>,
    pub description: Option<String>,
}
