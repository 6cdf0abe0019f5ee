//! ARN formatting for Redshift resources.

use serde::{Deserialize, Serialize};

/// Partition, region and account an ARN is scoped to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArnContext {
    pub partition: String,
    pub region: String,
    pub account_id: String,
}

impl ArnContext {
    pub fn new(
        partition: impl Into<String>,
        region: impl Into<String>,
        account_id: impl Into<String>,
    ) -> Self {
        Self {
            partition: partition.into(),
            region: region.into(),
            account_id: account_id.into(),
        }
    }

    /// Format `arn:<partition>:redshift:<region>:<account>:<resource_type>:<name>`.
    pub fn redshift(&self, resource_type: &str, name: &str) -> String {
        format!(
            "arn:{}:redshift:{}:{}:{}:{}",
            self.partition, self.region, self.account_id, resource_type, name
        )
    }

    pub fn cluster(&self, cluster_identifier: &str) -> String {
        self.redshift("cluster", cluster_identifier)
    }

    pub fn subnet_group(&self, name: &str) -> String {
        self.redshift("subnetgroup", name)
    }

    pub fn snapshot_schedule(&self, identifier: &str) -> String {
        self.redshift("snapshotschedule", identifier)
    }

    pub fn usage_limit(&self, usage_limit_id: &str) -> String {
        self.redshift("usagelimit", usage_limit_id)
    }

    pub fn snapshot(&self, cluster_identifier: &str, snapshot_identifier: &str) -> String {
        self.redshift(
            "snapshot",
            &format!("{}/{}", cluster_identifier, snapshot_identifier),
        )
    }

    pub fn hsm_client_certificate(&self, identifier: &str) -> String {
        self.redshift("hsmclientcertificate", identifier)
    }

    pub fn data_share(&self, producer_namespace: &str, name: &str) -> String {
        self.redshift("datashare", &format!("{}/{}", producer_namespace, name))
    }

    pub fn event_subscription(&self, name: &str) -> String {
        self.redshift("eventsubscription", name)
    }

    pub fn hsm_configuration(&self, identifier: &str) -> String {
        self.redshift("hsmconfiguration", identifier)
    }

    pub fn integration(&self, id: &str) -> String {
        self.redshift("integration", id)
    }
}

impl Default for ArnContext {
    fn default() -> Self {
        Self::new("aws", "us-west-2", "123456789012")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cluster_arn() {
        let ctx = ArnContext::new("aws", "eu-west-1", "111122223333");
        assert_eq!(
            ctx.cluster("analytics"),
            "arn:aws:redshift:eu-west-1:111122223333:cluster:analytics"
        );
    }

    #[test]
    fn test_snapshot_arn_is_hierarchical() {
        let ctx = ArnContext::default();
        assert_eq!(
            ctx.snapshot("c1", "s1"),
            "arn:aws:redshift:us-west-2:123456789012:snapshot:c1/s1"
        );
    }
}
