//! Resource kinds managed by the reconcilers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    Cluster,
    SubnetGroup,
    SnapshotSchedule,
    SnapshotScheduleAssociation,
    ScheduledAction,
    UsageLimit,
    EndpointAccess,
    ClusterSnapshot,
    HsmClientCertificate,
    Partner,
    DataShareAuthorization,
    DataShareConsumerAssociation,
    EventSubscription,
    EndpointAuthorization,
    HsmConfiguration,
    AuthenticationProfile,
    Integration,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 17] = [
        ResourceKind::Cluster,
        ResourceKind::SubnetGroup,
        ResourceKind::SnapshotSchedule,
        ResourceKind::SnapshotScheduleAssociation,
        ResourceKind::ScheduledAction,
        ResourceKind::UsageLimit,
        ResourceKind::EndpointAccess,
        ResourceKind::ClusterSnapshot,
        ResourceKind::HsmClientCertificate,
        ResourceKind::Partner,
        ResourceKind::DataShareAuthorization,
        ResourceKind::DataShareConsumerAssociation,
        ResourceKind::EventSubscription,
        ResourceKind::EndpointAuthorization,
        ResourceKind::HsmConfiguration,
        ResourceKind::AuthenticationProfile,
        ResourceKind::Integration,
    ];

    /// Short name used on the command line and in manifests.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Cluster => "cluster",
            ResourceKind::SubnetGroup => "subnet-group",
            ResourceKind::SnapshotSchedule => "snapshot-schedule",
            ResourceKind::SnapshotScheduleAssociation => "snapshot-schedule-association",
            ResourceKind::ScheduledAction => "scheduled-action",
            ResourceKind::UsageLimit => "usage-limit",
            ResourceKind::EndpointAccess => "endpoint-access",
            ResourceKind::ClusterSnapshot => "cluster-snapshot",
            ResourceKind::HsmClientCertificate => "hsm-client-certificate",
            ResourceKind::Partner => "partner",
            ResourceKind::DataShareAuthorization => "data-share-authorization",
            ResourceKind::DataShareConsumerAssociation => "data-share-consumer-association",
            ResourceKind::EventSubscription => "event-subscription",
            ResourceKind::EndpointAuthorization => "endpoint-authorization",
            ResourceKind::HsmConfiguration => "hsm-configuration",
            ResourceKind::AuthenticationProfile => "authentication-profile",
            ResourceKind::Integration => "integration",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceKind::Cluster => "Redshift Cluster",
            ResourceKind::SubnetGroup => "Redshift Subnet Group",
            ResourceKind::SnapshotSchedule => "Redshift Snapshot Schedule",
            ResourceKind::SnapshotScheduleAssociation => "Redshift Snapshot Schedule Association",
            ResourceKind::ScheduledAction => "Redshift Scheduled Action",
            ResourceKind::UsageLimit => "Redshift Usage Limit",
            ResourceKind::EndpointAccess => "Redshift Endpoint Access",
            ResourceKind::ClusterSnapshot => "Redshift Cluster Snapshot",
            ResourceKind::HsmClientCertificate => "Redshift HSM Client Certificate",
            ResourceKind::Partner => "Redshift Partner",
            ResourceKind::DataShareAuthorization => "Redshift Data Share Authorization",
            ResourceKind::DataShareConsumerAssociation => {
                "Redshift Data Share Consumer Association"
            }
            ResourceKind::EventSubscription => "Redshift Event Subscription",
            ResourceKind::EndpointAuthorization => "Redshift Endpoint Authorization",
            ResourceKind::HsmConfiguration => "Redshift HSM Configuration",
            ResourceKind::AuthenticationProfile => "Redshift Authentication Profile",
            ResourceKind::Integration => "Redshift Integration",
        };
        f.write_str(name)
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResourceKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| {
                let known: Vec<&str> = ResourceKind::ALL.iter().map(|k| k.as_str()).collect();
                format!("unknown resource kind {:?}, expected one of: {}", s, known.join(", "))
            })
    }
}
