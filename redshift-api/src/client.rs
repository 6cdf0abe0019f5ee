//! The management API trait consumed by the reconciler.

use async_trait::async_trait;

use crate::cluster::{
    AquaConfiguration, Cluster, CreateClusterInput, DeleteClusterInput, EnableLoggingInput, EnableSnapshotCopyInput,
    LoggingStatus, ModifyAquaConfigurationInput, ModifyClusterIamRolesInput, ModifyClusterInput,
    RestoreFromClusterSnapshotInput,
};
use crate::resources::{
    AssociateDataShareConsumerInput, AuthenticationProfile, AuthorizeDataShareInput,
    AuthorizeEndpointAccessInput, ClusterSnapshot, ClusterSubnetGroup, CreateClusterSnapshotInput,
    CreateClusterSubnetGroupInput, CreateEndpointAccessInput, CreateEventSubscriptionInput,
    CreateHsmClientCertificateInput, CreateHsmConfigurationInput, CreateIntegrationInput,
    CreateScheduledActionInput, CreateSnapshotScheduleInput, CreateUsageLimitInput, DataShare,
    DescribeSnapshotSchedulesInput, DisassociateDataShareConsumerInput, EndpointAccess,
    EndpointAuthorization, EventSubscription, HsmClientCertificate, HsmConfiguration, Integration,
    ModifyClusterSnapshotInput, ModifyClusterSnapshotScheduleInput, ModifyClusterSubnetGroupInput,
    ModifyEndpointAccessInput, ModifyEventSubscriptionInput, ModifyIntegrationInput,
    ModifyScheduledActionInput, ModifySnapshotScheduleInput, ModifyUsageLimitInput,
    PartnerIntegration, PartnerKey, RevokeEndpointAccessInput, ScheduledAction, SnapshotSchedule,
    UsageLimit,
};
use crate::{Page, Result, Tags};

/// Request/response operations of the Redshift management API.
///
/// Describe calls filtered by an identifier either return the matching
/// records or a `NotFound` fault, depending on the operation; callers must
/// handle both. Paginated calls take the marker of the previous page.
#[async_trait]
pub trait RedshiftApi: Send + Sync {
    // -------------------------------------------------------------------------
    // Clusters
    // -------------------------------------------------------------------------

    async fn describe_clusters(
        &self,
        cluster_identifier: Option<&str>,
        marker: Option<String>,
    ) -> Result<Page<Cluster>>;

    async fn create_cluster(&self, input: CreateClusterInput) -> Result<Cluster>;

    async fn restore_from_cluster_snapshot(
        &self,
        input: RestoreFromClusterSnapshotInput,
    ) -> Result<Cluster>;

    async fn modify_cluster(&self, input: ModifyClusterInput) -> Result<Cluster>;

    async fn modify_cluster_iam_roles(&self, input: ModifyClusterIamRolesInput)
    -> Result<Cluster>;

    async fn delete_cluster(&self, input: DeleteClusterInput) -> Result<Cluster>;

    async fn reboot_cluster(&self, cluster_identifier: &str) -> Result<Cluster>;

    /// The change takes effect on the next reboot.
    async fn modify_aqua_configuration(
        &self,
        input: ModifyAquaConfigurationInput,
    ) -> Result<AquaConfiguration>;

    async fn describe_logging_status(&self, cluster_identifier: &str) -> Result<LoggingStatus>;

    async fn enable_logging(&self, input: EnableLoggingInput) -> Result<LoggingStatus>;

    async fn disable_logging(&self, cluster_identifier: &str) -> Result<LoggingStatus>;

    async fn enable_snapshot_copy(&self, input: EnableSnapshotCopyInput) -> Result<Cluster>;

    async fn disable_snapshot_copy(&self, cluster_identifier: &str) -> Result<Cluster>;

    // -------------------------------------------------------------------------
    // Subnet groups
    // -------------------------------------------------------------------------

    async fn describe_cluster_subnet_groups(
        &self,
        name: Option<&str>,
        marker: Option<String>,
    ) -> Result<Page<ClusterSubnetGroup>>;

    async fn create_cluster_subnet_group(
        &self,
        input: CreateClusterSubnetGroupInput,
    ) -> Result<ClusterSubnetGroup>;

    async fn modify_cluster_subnet_group(
        &self,
        input: ModifyClusterSubnetGroupInput,
    ) -> Result<ClusterSubnetGroup>;

    async fn delete_cluster_subnet_group(&self, name: &str) -> Result<()>;

    // -------------------------------------------------------------------------
    // Snapshot schedules
    // -------------------------------------------------------------------------

    async fn describe_snapshot_schedules(
        &self,
        input: DescribeSnapshotSchedulesInput,
    ) -> Result<Page<SnapshotSchedule>>;

    async fn create_snapshot_schedule(
        &self,
        input: CreateSnapshotScheduleInput,
    ) -> Result<SnapshotSchedule>;

    async fn modify_snapshot_schedule(
        &self,
        input: ModifySnapshotScheduleInput,
    ) -> Result<SnapshotSchedule>;

    async fn delete_snapshot_schedule(&self, schedule_identifier: &str) -> Result<()>;

    async fn modify_cluster_snapshot_schedule(
        &self,
        input: ModifyClusterSnapshotScheduleInput,
    ) -> Result<()>;

    // -------------------------------------------------------------------------
    // Scheduled actions
    // -------------------------------------------------------------------------

    async fn describe_scheduled_actions(
        &self,
        name: Option<&str>,
        marker: Option<String>,
    ) -> Result<Page<ScheduledAction>>;

    async fn create_scheduled_action(
        &self,
        input: CreateScheduledActionInput,
    ) -> Result<ScheduledAction>;

    async fn modify_scheduled_action(
        &self,
        input: ModifyScheduledActionInput,
    ) -> Result<ScheduledAction>;

    async fn delete_scheduled_action(&self, name: &str) -> Result<()>;

    // -------------------------------------------------------------------------
    // Usage limits
    // -------------------------------------------------------------------------

    async fn describe_usage_limits(
        &self,
        usage_limit_id: Option<&str>,
        marker: Option<String>,
    ) -> Result<Page<UsageLimit>>;

    async fn create_usage_limit(&self, input: CreateUsageLimitInput) -> Result<UsageLimit>;

    async fn modify_usage_limit(&self, input: ModifyUsageLimitInput) -> Result<UsageLimit>;

    async fn delete_usage_limit(&self, usage_limit_id: &str) -> Result<()>;

    // -------------------------------------------------------------------------
    // Endpoint access
    // -------------------------------------------------------------------------

    async fn describe_endpoint_access(
        &self,
        endpoint_name: Option<&str>,
        marker: Option<String>,
    ) -> Result<Page<EndpointAccess>>;

    async fn create_endpoint_access(
        &self,
        input: CreateEndpointAccessInput,
    ) -> Result<EndpointAccess>;

    async fn modify_endpoint_access(
        &self,
        input: ModifyEndpointAccessInput,
    ) -> Result<EndpointAccess>;

    async fn delete_endpoint_access(&self, endpoint_name: &str) -> Result<EndpointAccess>;

    // -------------------------------------------------------------------------
    // Cluster snapshots
    // -------------------------------------------------------------------------

    async fn describe_cluster_snapshots(
        &self,
        snapshot_identifier: Option<&str>,
        marker: Option<String>,
    ) -> Result<Page<ClusterSnapshot>>;

    async fn create_cluster_snapshot(
        &self,
        input: CreateClusterSnapshotInput,
    ) -> Result<ClusterSnapshot>;

    async fn modify_cluster_snapshot(
        &self,
        input: ModifyClusterSnapshotInput,
    ) -> Result<ClusterSnapshot>;

    async fn delete_cluster_snapshot(&self, snapshot_identifier: &str) -> Result<ClusterSnapshot>;

    // -------------------------------------------------------------------------
    // HSM client certificates
    // -------------------------------------------------------------------------

    async fn describe_hsm_client_certificates(
        &self,
        identifier: Option<&str>,
        marker: Option<String>,
    ) -> Result<Page<HsmClientCertificate>>;

    async fn create_hsm_client_certificate(
        &self,
        input: CreateHsmClientCertificateInput,
    ) -> Result<HsmClientCertificate>;

    async fn delete_hsm_client_certificate(&self, identifier: &str) -> Result<()>;

    // -------------------------------------------------------------------------
    // Partner integrations
    // -------------------------------------------------------------------------

    async fn describe_partners(&self, key: &PartnerKey) -> Result<Vec<PartnerIntegration>>;

    async fn add_partner(&self, key: PartnerKey) -> Result<PartnerKey>;

    async fn delete_partner(&self, key: PartnerKey) -> Result<PartnerKey>;

    // -------------------------------------------------------------------------
    // Data shares
    // -------------------------------------------------------------------------

    async fn describe_data_shares(
        &self,
        data_share_arn: Option<&str>,
        marker: Option<String>,
    ) -> Result<Page<DataShare>>;

    async fn authorize_data_share(&self, input: AuthorizeDataShareInput) -> Result<DataShare>;

    async fn deauthorize_data_share(
        &self,
        data_share_arn: &str,
        consumer_identifier: &str,
    ) -> Result<DataShare>;

    async fn associate_data_share_consumer(
        &self,
        input: AssociateDataShareConsumerInput,
    ) -> Result<DataShare>;

    async fn disassociate_data_share_consumer(
        &self,
        input: DisassociateDataShareConsumerInput,
    ) -> Result<DataShare>;

    // -------------------------------------------------------------------------
    // Event subscriptions
    // -------------------------------------------------------------------------

    async fn describe_event_subscriptions(
        &self,
        name: Option<&str>,
        marker: Option<String>,
    ) -> Result<Page<EventSubscription>>;

    async fn create_event_subscription(
        &self,
        input: CreateEventSubscriptionInput,
    ) -> Result<EventSubscription>;

    async fn modify_event_subscription(
        &self,
        input: ModifyEventSubscriptionInput,
    ) -> Result<EventSubscription>;

    async fn delete_event_subscription(&self, name: &str) -> Result<()>;

    // -------------------------------------------------------------------------
    // Endpoint authorizations
    // -------------------------------------------------------------------------

    /// Authorizations granted on `cluster_identifier` to `account`.
    async fn describe_endpoint_authorization(
        &self,
        cluster_identifier: Option<&str>,
        account: Option<&str>,
        marker: Option<String>,
    ) -> Result<Page<EndpointAuthorization>>;

    async fn authorize_endpoint_access(
        &self,
        input: AuthorizeEndpointAccessInput,
    ) -> Result<EndpointAuthorization>;

    async fn revoke_endpoint_access(
        &self,
        input: RevokeEndpointAccessInput,
    ) -> Result<EndpointAuthorization>;

    // -------------------------------------------------------------------------
    // HSM configurations
    // -------------------------------------------------------------------------

    async fn describe_hsm_configurations(
        &self,
        identifier: Option<&str>,
        marker: Option<String>,
    ) -> Result<Page<HsmConfiguration>>;

    async fn create_hsm_configuration(
        &self,
        input: CreateHsmConfigurationInput,
    ) -> Result<HsmConfiguration>;

    async fn delete_hsm_configuration(&self, identifier: &str) -> Result<()>;

    // -------------------------------------------------------------------------
    // Authentication profiles
    // -------------------------------------------------------------------------

    /// Not paginated.
    async fn describe_authentication_profiles(
        &self,
        name: Option<&str>,
    ) -> Result<Vec<AuthenticationProfile>>;

    async fn create_authentication_profile(
        &self,
        input: AuthenticationProfile,
    ) -> Result<AuthenticationProfile>;

    async fn modify_authentication_profile(
        &self,
        input: AuthenticationProfile,
    ) -> Result<AuthenticationProfile>;

    async fn delete_authentication_profile(&self, name: &str) -> Result<()>;

    // -------------------------------------------------------------------------
    // Zero-ETL integrations
    // -------------------------------------------------------------------------

    async fn describe_integrations(
        &self,
        integration_arn: Option<&str>,
        marker: Option<String>,
    ) -> Result<Page<Integration>>;

    async fn create_integration(&self, input: CreateIntegrationInput) -> Result<Integration>;

    async fn modify_integration(&self, input: ModifyIntegrationInput) -> Result<Integration>;

    async fn delete_integration(&self, integration_arn: &str) -> Result<Integration>;

    // -------------------------------------------------------------------------
    // Tags
    // -------------------------------------------------------------------------

    async fn create_tags(&self, resource_arn: &str, tags: Tags) -> Result<()>;

    async fn delete_tags(&self, resource_arn: &str, tag_keys: Vec<String>) -> Result<()>;
}
