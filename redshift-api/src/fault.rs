//! Typed faults returned by the management API.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classification of a remote fault.
///
/// Clients map the service's error codes onto this enum once, so callers
/// never have to inspect codes or messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FaultKind {
    /// The addressed record does not exist.
    NotFound,
    /// A record with the same identifier already exists.
    AlreadyExists,
    /// A request parameter was rejected.
    InvalidParameter,
    /// The record is mid-transition or has dependents blocking the call.
    InvalidState,
    /// A referenced IAM role is not yet trusted by the service.
    RolePropagation,
    /// The caller is not allowed to perform the call.
    AccessDenied,
    /// An account or resource quota would be exceeded.
    QuotaExceeded,
    /// The service is throttling or temporarily unavailable.
    Unavailable,
    /// Anything the client could not classify.
    Other,
}

/// A fault returned by the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct ApiFault {
    pub kind: FaultKind,
    pub code: String,
    pub message: String,
}

impl ApiFault {
    pub fn new(kind: FaultKind, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn not_found(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(FaultKind::NotFound, code, message)
    }

    pub fn already_exists(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(FaultKind::AlreadyExists, code, message)
    }

    pub fn invalid_state(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(FaultKind::InvalidState, code, message)
    }

    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::new(FaultKind::InvalidParameter, codes::INVALID_PARAMETER_VALUE, message)
    }

    pub fn is(&self, kind: FaultKind) -> bool {
        self.kind == kind
    }
}

/// Result type for API calls.
pub type Result<T> = std::result::Result<T, ApiFault>;

/// Error codes emitted by the service.
pub mod codes {
    pub const CLUSTER_NOT_FOUND: &str = "ClusterNotFound";
    pub const CLUSTER_ALREADY_EXISTS: &str = "ClusterAlreadyExists";
    pub const INVALID_CLUSTER_STATE: &str = "InvalidClusterState";
    pub const CLUSTER_SNAPSHOT_NOT_FOUND: &str = "ClusterSnapshotNotFound";
    pub const CLUSTER_SNAPSHOT_ALREADY_EXISTS: &str = "ClusterSnapshotAlreadyExists";
    pub const INVALID_CLUSTER_SNAPSHOT_STATE: &str = "InvalidClusterSnapshotState";
    pub const CLUSTER_SUBNET_GROUP_NOT_FOUND: &str = "ClusterSubnetGroupNotFoundFault";
    pub const CLUSTER_SUBNET_GROUP_ALREADY_EXISTS: &str = "ClusterSubnetGroupAlreadyExists";
    pub const INVALID_CLUSTER_SUBNET_GROUP_STATE: &str = "InvalidClusterSubnetGroupStateFault";
    pub const SNAPSHOT_SCHEDULE_NOT_FOUND: &str = "SnapshotScheduleNotFound";
    pub const SNAPSHOT_SCHEDULE_ALREADY_EXISTS: &str = "SnapshotScheduleAlreadyExists";
    pub const INVALID_CLUSTER_SNAPSHOT_SCHEDULE_STATE: &str = "InvalidClusterSnapshotScheduleState";
    pub const SNAPSHOT_COPY_ALREADY_ENABLED: &str = "SnapshotCopyAlreadyEnabledFault";
    pub const SNAPSHOT_COPY_ALREADY_DISABLED: &str = "SnapshotCopyAlreadyDisabledFault";
    pub const SCHEDULED_ACTION_NOT_FOUND: &str = "ScheduledActionNotFound";
    pub const SCHEDULED_ACTION_ALREADY_EXISTS: &str = "ScheduledActionAlreadyExists";
    pub const INVALID_SCHEDULED_ACTION: &str = "InvalidScheduledAction";
    pub const USAGE_LIMIT_NOT_FOUND: &str = "UsageLimitNotFound";
    pub const USAGE_LIMIT_ALREADY_EXISTS: &str = "UsageLimitAlreadyExists";
    pub const ENDPOINT_NOT_FOUND: &str = "EndpointNotFound";
    pub const ENDPOINT_ALREADY_EXISTS: &str = "EndpointAlreadyExists";
    pub const INVALID_ENDPOINT_STATE: &str = "InvalidEndpointState";
    pub const HSM_CLIENT_CERTIFICATE_NOT_FOUND: &str = "HsmClientCertificateNotFoundFault";
    pub const HSM_CLIENT_CERTIFICATE_ALREADY_EXISTS: &str = "HsmClientCertificateAlreadyExistsFault";
    pub const PARTNER_NOT_FOUND: &str = "PartnerNotFound";
    pub const UNAUTHORIZED_PARTNER_INTEGRATION: &str = "UnauthorizedPartnerIntegration";
    pub const INVALID_DATA_SHARE: &str = "InvalidDataShareFault";
    pub const SUBSCRIPTION_NOT_FOUND: &str = "SubscriptionNotFound";
    pub const SUBSCRIPTION_ALREADY_EXISTS: &str = "SubscriptionAlreadyExist";
    pub const SNS_TOPIC_ARN_NOT_FOUND: &str = "SNSTopicArnNotFound";
    pub const ENDPOINT_AUTHORIZATION_NOT_FOUND: &str = "EndpointAuthorizationNotFound";
    pub const ENDPOINT_AUTHORIZATION_ALREADY_EXISTS: &str = "EndpointAuthorizationAlreadyExists";
    pub const INVALID_AUTHORIZATION_STATE: &str = "InvalidAuthorizationState";
    pub const HSM_CONFIGURATION_NOT_FOUND: &str = "HsmConfigurationNotFoundFault";
    pub const HSM_CONFIGURATION_ALREADY_EXISTS: &str = "HsmConfigurationAlreadyExistsFault";
    pub const AUTHENTICATION_PROFILE_NOT_FOUND: &str = "AuthenticationProfileNotFoundFault";
    pub const AUTHENTICATION_PROFILE_ALREADY_EXISTS: &str = "AuthenticationProfileAlreadyExistsFault";
    pub const INVALID_AUTHENTICATION_PROFILE_REQUEST: &str = "InvalidAuthenticationProfileRequestFault";
    pub const INTEGRATION_NOT_FOUND: &str = "IntegrationNotFoundFault";
    pub const INTEGRATION_ALREADY_EXISTS: &str = "IntegrationAlreadyExistsFault";
    pub const INTEGRATION_TARGET_NOT_FOUND: &str = "IntegrationTargetNotFoundFault";
    pub const INVALID_INTEGRATION_STATE: &str = "InvalidIntegrationStateFault";
    pub const INVALID_PARAMETER_VALUE: &str = "InvalidParameterValue";
    pub const RESOURCE_NOT_FOUND: &str = "ResourceNotFoundFault";
    pub const INVALID_TAG: &str = "InvalidTagFault";
}
