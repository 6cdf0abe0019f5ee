//! `RedshiftApi` implementation of the simulator.

use async_trait::async_trait;
use chrono::Utc;

use super::{MemoryRedshift, SimState, Tracked, paginate, resolved_aqua_status, tick};
use crate::cluster::{
    AquaConfiguration, CLUSTER_TYPE_MULTI_NODE, CLUSTER_TYPE_SINGLE_NODE, Cluster,
    ClusterEndpoint, ClusterIamRole, ClusterNode, ClusterOptions, CreateClusterInput,
    DeleteClusterInput, EnableLoggingInput, EnableSnapshotCopyInput, LoggingStatus,
    ModifyAquaConfigurationInput, ModifyClusterIamRolesInput, ModifyClusterInput,
    RestoreFromClusterSnapshotInput, SnapshotCopyStatus, aqua_configuration_status, aqua_status,
    relocation_status, status,
};
use crate::fault::codes;
use crate::resources::{
    AssociateDataShareConsumerInput, AuthenticationProfile, AuthorizeDataShareInput,
    AuthorizeEndpointAccessInput, ClusterAssociatedToSchedule, ClusterSnapshot,
    ClusterSubnetGroup, CreateClusterSnapshotInput, CreateClusterSubnetGroupInput,
    CreateEndpointAccessInput, CreateEventSubscriptionInput, CreateHsmClientCertificateInput,
    CreateHsmConfigurationInput, CreateIntegrationInput, CreateScheduledActionInput,
    CreateSnapshotScheduleInput, CreateUsageLimitInput, DataShare, DataShareAssociation,
    DescribeSnapshotSchedulesInput, DisassociateDataShareConsumerInput, EndpointAccess,
    EndpointAuthorization, EventSubscription, HsmClientCertificate, HsmConfiguration,
    Integration, ModifyClusterSnapshotInput, ModifyClusterSnapshotScheduleInput,
    ModifyClusterSubnetGroupInput, ModifyEndpointAccessInput, ModifyEventSubscriptionInput,
    ModifyIntegrationInput, ModifyScheduledActionInput, ModifySnapshotScheduleInput,
    ModifyUsageLimitInput, PartnerIntegration, PartnerKey, RevokeEndpointAccessInput,
    ScheduledAction, SnapshotSchedule, UsageLimit, association_state, data_share_status,
    endpoint_authorization_status, endpoint_status, event_subscription_status,
    integration_status, partner_status, scheduled_action_state, snapshot_status,
};
use crate::{ApiFault, FaultKind, Page, RedshiftApi, Result, Tags};

const DEFAULT_PORT: i64 = 5439;
const DEFAULT_SECRET_KMS_KEY: &str = "alias/aws/secretsmanager";

fn cluster_not_found(id: &str) -> ApiFault {
    ApiFault::not_found(
        codes::CLUSTER_NOT_FOUND,
        format!("Cluster {} not found.", id),
    )
}

fn cluster_busy(id: &str) -> ApiFault {
    ApiFault::invalid_state(
        codes::INVALID_CLUSTER_STATE,
        format!("There is an operation running on the Cluster {}.", id),
    )
}

fn data_share_not_found(arn: &str) -> ApiFault {
    ApiFault::not_found(
        codes::INVALID_DATA_SHARE,
        format!("Data share {} not found.", arn),
    )
}

fn subscription_not_found(name: &str) -> ApiFault {
    ApiFault::not_found(
        codes::SUBSCRIPTION_NOT_FOUND,
        format!("Event subscription {} not found.", name),
    )
}

fn authorization_not_found(cluster: &str, account: &str) -> ApiFault {
    ApiFault::not_found(
        codes::ENDPOINT_AUTHORIZATION_NOT_FOUND,
        format!(
            "No endpoint authorization for account {} on cluster {}.",
            account, cluster
        ),
    )
}

fn integration_not_found(arn: &str) -> ApiFault {
    ApiFault::not_found(
        codes::INTEGRATION_NOT_FOUND,
        format!("Integration {} not found.", arn),
    )
}

fn authentication_profile_not_found(name: &str) -> ApiFault {
    ApiFault::not_found(
        codes::AUTHENTICATION_PROFILE_NOT_FOUND,
        format!("Authentication profile {} not found.", name),
    )
}

/// Authentication profile content has to be a JSON object.
fn check_profile_content(content: &str) -> Result<()> {
    let trimmed = content.trim();
    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        return Ok(());
    }
    Err(ApiFault::new(
        FaultKind::InvalidParameter,
        codes::INVALID_AUTHENTICATION_PROFILE_REQUEST,
        "Authentication profile content must be a JSON object.",
    ))
}

/// Which consumer an associate or disassociate call addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Consumer {
    EntireAccount,
    Namespace(String),
    Region(String),
}

impl Consumer {
    fn pick(
        entire_account: Option<bool>,
        consumer_arn: Option<String>,
        consumer_region: Option<String>,
    ) -> Result<Self> {
        match (entire_account.unwrap_or(false), consumer_arn, consumer_region) {
            (true, None, None) => Ok(Consumer::EntireAccount),
            (false, Some(arn), None) => Ok(Consumer::Namespace(arn)),
            (false, None, Some(region)) => Ok(Consumer::Region(region)),
            _ => Err(ApiFault::invalid_parameter(
                "Exactly one of entire account, consumer ARN and consumer region must be set.",
            )),
        }
    }

    fn matches(&self, account: &str, association: &DataShareAssociation) -> bool {
        match self {
            Consumer::EntireAccount => {
                association.consumer_identifier == account && association.consumer_region.is_none()
            }
            Consumer::Namespace(arn) => association.consumer_identifier == *arn,
            Consumer::Region(region) => {
                association.consumer_identifier == account
                    && association.consumer_region.as_deref() == Some(region.as_str())
            }
        }
    }
}

fn reject_system_tags(tags: &Tags) -> Result<()> {
    if let Some(key) = tags
        .keys()
        .find(|k| k.to_ascii_lowercase().starts_with("aws:"))
    {
        return Err(ApiFault::new(
            FaultKind::InvalidParameter,
            codes::INVALID_TAG,
            format!("Tag keys starting with 'aws:' are reserved: {}", key),
        ));
    }
    Ok(())
}

impl MemoryRedshift {
    fn build_cluster(
        &self,
        cluster_identifier: &str,
        node_type: &str,
        number_of_nodes: i64,
        options: &ClusterOptions,
    ) -> Cluster {
        let cluster_nodes = if number_of_nodes > 1 {
            let mut nodes = vec![ClusterNode {
                node_role: "LEADER".to_string(),
                private_ip_address: Some("10.0.0.10".to_string()),
                public_ip_address: None,
            }];
            nodes.extend((0..number_of_nodes).map(|i| ClusterNode {
                node_role: format!("COMPUTE-{}", i),
                private_ip_address: Some(format!("10.0.0.{}", 11 + i)),
                public_ip_address: None,
            }));
            nodes
        } else {
            vec![ClusterNode {
                node_role: "SHARED".to_string(),
                private_ip_address: Some("10.0.0.10".to_string()),
                public_ip_address: None,
            }]
        };
        let relocation = match options.availability_zone_relocation {
            Some(true) => relocation_status::ENABLED,
            _ => relocation_status::DISABLED,
        };
        let multi_az = match options.multi_az {
            Some(true) => "Enabled",
            _ => "Disabled",
        };
        let aqua = options
            .aqua_configuration_status
            .clone()
            .unwrap_or_else(|| aqua_configuration_status::AUTO.to_string());

        Cluster {
            cluster_identifier: cluster_identifier.to_string(),
            cluster_status: status::CREATING.to_string(),
            allow_version_upgrade: options.allow_version_upgrade.unwrap_or(true),
            aqua_configuration: Some(AquaConfiguration {
                aqua_status: resolved_aqua_status(&aqua).to_string(),
                aqua_configuration_status: aqua,
            }),
            automated_snapshot_retention_period: options
                .automated_snapshot_retention_period
                .unwrap_or(1),
            manual_snapshot_retention_period: options.manual_snapshot_retention_period.unwrap_or(-1),
            availability_zone: Some(
                options
                    .availability_zone
                    .clone()
                    .unwrap_or_else(|| format!("{}a", self.arn.region)),
            ),
            availability_zone_relocation_status: Some(relocation.to_string()),
            cluster_namespace_arn: Some(
                self.arn
                    .redshift("namespace", &format!("{}-namespace", cluster_identifier)),
            ),
            cluster_nodes,
            cluster_parameter_group_name: Some(
                options
                    .cluster_parameter_group_name
                    .clone()
                    .unwrap_or_else(|| "default.redshift-1.0".to_string()),
            ),
            cluster_subnet_group_name: options.cluster_subnet_group_name.clone(),
            cluster_version: "1.0".to_string(),
            db_name: Some("dev".to_string()),
            default_iam_role_arn: options.default_iam_role_arn.clone(),
            encrypted: false,
            enhanced_vpc_routing: options.enhanced_vpc_routing.unwrap_or(false),
            iam_roles: options
                .iam_roles
                .iter()
                .map(|arn| ClusterIamRole {
                    iam_role_arn: arn.clone(),
                    apply_status: "in-sync".to_string(),
                })
                .collect(),
            kms_key_id: options.kms_key_id.clone(),
            maintenance_track_name: Some(
                options
                    .maintenance_track_name
                    .clone()
                    .unwrap_or_else(|| "current".to_string()),
            ),
            master_username: String::new(),
            master_password_secret_arn: None,
            master_password_secret_kms_key_id: options.master_password_secret_kms_key_id.clone(),
            multi_az: Some(multi_az.to_string()),
            node_type: node_type.to_string(),
            number_of_nodes,
            preferred_maintenance_window: Some(
                options
                    .preferred_maintenance_window
                    .clone()
                    .unwrap_or_else(|| "sat:10:30-sat:11:00".to_string()),
            ),
            publicly_accessible: options.publicly_accessible.unwrap_or(false),
            snapshot_copy_status: None,
            vpc_security_group_ids: options.vpc_security_group_ids.clone(),
            endpoint: Some(ClusterEndpoint {
                address: format!(
                    "{}.c0ffee.{}.redshift.amazonaws.com",
                    cluster_identifier, self.arn.region
                ),
                port: options.port.unwrap_or(DEFAULT_PORT),
            }),
            tags: Tags::new(),
        }
    }

    /// Insert a freshly built cluster in `creating` state.
    fn insert_cluster(
        &self,
        state: &mut SimState,
        mut cluster: Cluster,
        manage_master_password: bool,
        tags: Tags,
    ) -> Cluster {
        let id = cluster.cluster_identifier.clone();
        if manage_master_password {
            cluster.master_password_secret_arn = Some(format!(
                "arn:{}:secretsmanager:{}:{}:secret:redshift!{}-admin",
                self.arn.partition, self.arn.region, self.arn.account_id, id
            ));
            cluster
                .master_password_secret_kms_key_id
                .get_or_insert_with(|| DEFAULT_SECRET_KMS_KEY.to_string());
        } else {
            cluster.master_password_secret_kms_key_id = None;
        }
        let arn = self.arn.cluster(&id);
        state.tags.insert(arn, tags.clone());
        state.logging.insert(id.clone(), LoggingStatus::default());
        cluster.tags = tags;
        let transition = state.settle_into(status::AVAILABLE);
        state.clusters.insert(
            id,
            Tracked {
                record: cluster.clone(),
                transition,
            },
        );
        cluster
    }

    /// Look up a cluster that must be idle for a mutating call.
    fn available_cluster<'a>(state: &'a mut SimState, id: &str) -> Result<&'a mut Tracked<Cluster>> {
        let tracked = state
            .clusters
            .get_mut(id)
            .ok_or_else(|| cluster_not_found(id))?;
        if tracked.record.cluster_status != status::AVAILABLE {
            return Err(cluster_busy(id));
        }
        Ok(tracked)
    }

    fn start_cluster_modification(state: &mut SimState, id: &str) {
        let transition = state.settle_into(status::AVAILABLE);
        if let Some(tracked) = state.clusters.get_mut(id) {
            tracked.record.cluster_status = status::MODIFYING.to_string();
            tracked.transition = transition;
        }
    }

    fn decorate_cluster(state: &SimState, arn: &str, tracked: &Tracked<Cluster>) -> Cluster {
        let mut cluster = tracked.record.clone();
        cluster.tags = state.tags_for(arn);
        cluster
    }
}

#[async_trait]
impl RedshiftApi for MemoryRedshift {
    // -------------------------------------------------------------------------
    // Clusters
    // -------------------------------------------------------------------------

    async fn describe_clusters(
        &self,
        cluster_identifier: Option<&str>,
        marker: Option<String>,
    ) -> Result<Page<Cluster>> {
        let mut state = self.state.lock().await;
        state.begin("DescribeClusters", cluster_identifier.unwrap_or(""))?;
        tick(&mut state.clusters);
        state.tick_aqua();

        let clusters: Vec<Cluster> = state
            .clusters
            .values()
            .filter(|t| cluster_identifier.is_none_or(|id| t.record.cluster_identifier == id))
            .map(|t| {
                let arn = self.arn.cluster(&t.record.cluster_identifier);
                Self::decorate_cluster(&state, &arn, t)
            })
            .collect();

        if let Some(id) = cluster_identifier {
            if clusters.is_empty() {
                return Err(cluster_not_found(id));
            }
        }
        paginate(clusters, marker.as_deref(), state.page_size)
    }

    async fn create_cluster(&self, input: CreateClusterInput) -> Result<Cluster> {
        let mut state = self.state.lock().await;
        state.begin("CreateCluster", &input.cluster_identifier)?;

        if state.clusters.contains_key(&input.cluster_identifier) {
            return Err(ApiFault::already_exists(
                codes::CLUSTER_ALREADY_EXISTS,
                "Cluster already exists",
            ));
        }
        if input.node_type.is_empty() {
            return Err(ApiFault::invalid_parameter("NodeType is required"));
        }
        if input.master_user_password.is_none() && input.options.manage_master_password != Some(true)
        {
            return Err(ApiFault::invalid_parameter(
                "MasterUserPassword is required unless ManageMasterPassword is set",
            ));
        }
        if input.cluster_type == CLUSTER_TYPE_MULTI_NODE && input.number_of_nodes.unwrap_or(0) < 2 {
            return Err(ApiFault::invalid_parameter(
                "Number of nodes for cluster type multi-node must be greater than or equal to 2",
            ));
        }
        reject_system_tags(&input.tags)?;

        let mut cluster = self.build_cluster(
            &input.cluster_identifier,
            &input.node_type,
            input.number_of_nodes.unwrap_or(1),
            &input.options,
        );
        cluster.master_username = input.master_username.clone();
        cluster.encrypted = input.encrypted.unwrap_or(false);
        if let Some(db_name) = &input.db_name {
            cluster.db_name = Some(db_name.clone());
        }
        if let Some(version) = &input.cluster_version {
            cluster.cluster_version = version.clone();
        }
        let manage = input.options.manage_master_password == Some(true);
        Ok(self.insert_cluster(&mut state, cluster, manage, input.tags))
    }

    async fn restore_from_cluster_snapshot(
        &self,
        input: RestoreFromClusterSnapshotInput,
    ) -> Result<Cluster> {
        let mut state = self.state.lock().await;
        state.begin("RestoreFromClusterSnapshot", &input.cluster_identifier)?;

        if state.clusters.contains_key(&input.cluster_identifier) {
            return Err(ApiFault::already_exists(
                codes::CLUSTER_ALREADY_EXISTS,
                "Cluster already exists",
            ));
        }
        let snapshot_id = input
            .snapshot_identifier
            .clone()
            .or_else(|| {
                input
                    .snapshot_arn
                    .as_deref()
                    .and_then(|arn| arn.rsplit('/').next())
                    .map(str::to_string)
            })
            .ok_or_else(|| {
                ApiFault::invalid_parameter("SnapshotIdentifier or SnapshotArn is required")
            })?;
        let snapshot = state
            .snapshots
            .get(&snapshot_id)
            .map(|t| t.record.clone())
            .ok_or_else(|| {
                ApiFault::not_found(
                    codes::CLUSTER_SNAPSHOT_NOT_FOUND,
                    format!("Snapshot {} not found.", snapshot_id),
                )
            })?;

        let mut cluster = self.build_cluster(
            &input.cluster_identifier,
            &input.node_type,
            input.number_of_nodes.unwrap_or(1),
            &input.options,
        );
        cluster.master_username = "admin".to_string();
        cluster.kms_key_id = snapshot.kms_key_id.clone().or(cluster.kms_key_id);
        cluster.cluster_status = status::RESTORING.to_string();
        let manage = input.options.manage_master_password == Some(true);
        Ok(self.insert_cluster(&mut state, cluster, manage, Tags::new()))
    }

    async fn modify_cluster(&self, input: ModifyClusterInput) -> Result<Cluster> {
        let mut state = self.state.lock().await;
        state.begin("ModifyCluster", &input.cluster_identifier)?;
        let id = input.cluster_identifier.clone();

        let tracked = Self::available_cluster(&mut state, &id)?;
        let managed = tracked.record.master_password_secret_arn.is_some()
            || input.manage_master_password == Some(true);
        if input.master_password_secret_kms_key_id.is_some() && !managed {
            return Err(ApiFault::invalid_parameter(
                "MasterPasswordSecretKmsKeyId requires ManageMasterPassword",
            ));
        }
        let cluster = &mut tracked.record;
        if let Some(v) = input.allow_version_upgrade {
            cluster.allow_version_upgrade = v;
        }
        if let Some(v) = input.automated_snapshot_retention_period {
            cluster.automated_snapshot_retention_period = v;
        }
        if let Some(v) = input.manual_snapshot_retention_period {
            cluster.manual_snapshot_retention_period = v;
        }
        if let Some(v) = &input.availability_zone {
            cluster.availability_zone = Some(v.clone());
        }
        if let Some(v) = input.availability_zone_relocation {
            let status = if v {
                relocation_status::ENABLED
            } else {
                relocation_status::DISABLED
            };
            cluster.availability_zone_relocation_status = Some(status.to_string());
        }
        if let Some(v) = &input.cluster_parameter_group_name {
            cluster.cluster_parameter_group_name = Some(v.clone());
        }
        if let Some(v) = &input.cluster_version {
            cluster.cluster_version = v.clone();
        }
        if let Some(v) = input.encrypted {
            cluster.encrypted = v;
        }
        if let Some(v) = input.enhanced_vpc_routing {
            cluster.enhanced_vpc_routing = v;
        }
        if let Some(v) = &input.kms_key_id {
            cluster.kms_key_id = Some(v.clone());
        }
        if let Some(v) = &input.maintenance_track_name {
            cluster.maintenance_track_name = Some(v.clone());
        }
        if let Some(v) = input.multi_az {
            cluster.multi_az = Some(if v { "Enabled" } else { "Disabled" }.to_string());
            if !v {
                // The service turns relocation on when multi-AZ is switched off.
                cluster.availability_zone_relocation_status =
                    Some(relocation_status::ENABLED.to_string());
            }
        }
        if let Some(v) = &input.node_type {
            cluster.node_type = v.clone();
        }
        match (input.number_of_nodes, input.cluster_type.as_deref()) {
            (Some(v), _) => cluster.number_of_nodes = v,
            (None, Some(CLUSTER_TYPE_SINGLE_NODE)) => cluster.number_of_nodes = 1,
            _ => {}
        }
        if let Some(v) = &input.preferred_maintenance_window {
            cluster.preferred_maintenance_window = Some(v.clone());
        }
        if let Some(v) = input.publicly_accessible {
            cluster.publicly_accessible = v;
        }
        if let Some(v) = &input.vpc_security_group_ids {
            cluster.vpc_security_group_ids = v.clone();
        }
        let node_type = cluster.node_type.clone();
        let number_of_nodes = cluster.number_of_nodes;
        if input.node_type.is_some() || input.cluster_type.is_some() {
            let options = ClusterOptions::default();
            let rebuilt = self.build_cluster(&id, &node_type, number_of_nodes, &options);
            if let Some(tracked) = state.clusters.get_mut(&id) {
                tracked.record.cluster_nodes = rebuilt.cluster_nodes;
            }
        }
        if input.manage_master_password == Some(true) {
            if let Some(tracked) = state.clusters.get_mut(&id) {
                tracked.record.master_password_secret_arn = Some(format!(
                    "arn:{}:secretsmanager:{}:{}:secret:redshift!{}-admin",
                    self.arn.partition, self.arn.region, self.arn.account_id, id
                ));
                tracked
                    .record
                    .master_password_secret_kms_key_id
                    .get_or_insert_with(|| DEFAULT_SECRET_KMS_KEY.to_string());
            }
        }
        if let Some(key) = &input.master_password_secret_kms_key_id {
            if let Some(tracked) = state.clusters.get_mut(&id) {
                tracked.record.master_password_secret_kms_key_id = Some(key.clone());
            }
        }

        state.modify_cluster_requests.push(input);
        Self::start_cluster_modification(&mut state, &id);
        let arn = self.arn.cluster(&id);
        let tracked = &state.clusters[&id];
        Ok(Self::decorate_cluster(&state, &arn, tracked))
    }

    async fn modify_cluster_iam_roles(
        &self,
        input: ModifyClusterIamRolesInput,
    ) -> Result<Cluster> {
        let mut state = self.state.lock().await;
        state.begin("ModifyClusterIamRoles", &input.cluster_identifier)?;
        let id = input.cluster_identifier.clone();

        let tracked = Self::available_cluster(&mut state, &id)?;
        let cluster = &mut tracked.record;
        cluster
            .iam_roles
            .retain(|r| !input.remove_iam_roles.contains(&r.iam_role_arn));
        for arn in &input.add_iam_roles {
            if !cluster.iam_roles.iter().any(|r| &r.iam_role_arn == arn) {
                cluster.iam_roles.push(ClusterIamRole {
                    iam_role_arn: arn.clone(),
                    apply_status: "in-sync".to_string(),
                });
            }
        }
        cluster.default_iam_role_arn = input
            .default_iam_role_arn
            .clone()
            .filter(|arn| !arn.is_empty());

        state.iam_role_requests.push(input);
        Self::start_cluster_modification(&mut state, &id);
        let arn = self.arn.cluster(&id);
        Ok(Self::decorate_cluster(&state, &arn, &state.clusters[&id]))
    }

    async fn delete_cluster(&self, input: DeleteClusterInput) -> Result<Cluster> {
        let mut state = self.state.lock().await;
        state.begin("DeleteCluster", &input.cluster_identifier)?;
        let id = input.cluster_identifier.clone();

        let tracked = state
            .clusters
            .get(&id)
            .ok_or_else(|| cluster_not_found(&id))?;
        if tracked.record.cluster_status != status::AVAILABLE {
            return Err(cluster_busy(&id));
        }
        if !input.skip_final_cluster_snapshot && input.final_cluster_snapshot_identifier.is_none() {
            return Err(ApiFault::invalid_parameter(
                "FinalClusterSnapshotIdentifier is required unless SkipFinalClusterSnapshot is set",
            ));
        }

        if let Some(snapshot_id) = &input.final_cluster_snapshot_identifier {
            if !input.skip_final_cluster_snapshot {
                let snapshot = ClusterSnapshot {
                    snapshot_identifier: snapshot_id.clone(),
                    cluster_identifier: id.clone(),
                    status: snapshot_status::AVAILABLE.to_string(),
                    manual_snapshot_retention_period: -1,
                    snapshot_create_time: Some(Utc::now()),
                    owner_account: self.arn.account_id.clone(),
                    kms_key_id: tracked.record.kms_key_id.clone(),
                    tags: Tags::new(),
                };
                state.tags.insert(self.arn.snapshot(&id, snapshot_id), Tags::new());
                state
                    .snapshots
                    .insert(snapshot_id.clone(), Tracked::settled(snapshot));
            }
        }

        let transition = state.removal();
        let tracked = state
            .clusters
            .get_mut(&id)
            .ok_or_else(|| cluster_not_found(&id))?;
        tracked.record.cluster_status = status::DELETING.to_string();
        tracked.transition = transition;
        let cluster = tracked.record.clone();
        state.logging.remove(&id);
        state.associations.retain(|(_, cluster_id), _| cluster_id != &id);
        Ok(cluster)
    }

    async fn reboot_cluster(&self, cluster_identifier: &str) -> Result<Cluster> {
        let mut state = self.state.lock().await;
        state.begin("RebootCluster", cluster_identifier)?;
        Self::available_cluster(&mut state, cluster_identifier)?;

        let transition = state.settle_into(status::AVAILABLE);
        let settle_polls = state.settle_polls;
        let tracked = state
            .clusters
            .get_mut(cluster_identifier)
            .ok_or_else(|| cluster_not_found(cluster_identifier))?;
        tracked.record.cluster_status = status::REBOOTING.to_string();
        tracked.transition = transition;
        let aqua_applying = tracked
            .record
            .aqua_configuration
            .as_ref()
            .is_some_and(|a| a.aqua_status == aqua_status::APPLYING);
        if aqua_applying {
            state
                .aqua_reboots
                .insert(cluster_identifier.to_string(), settle_polls);
        }
        let arn = self.arn.cluster(cluster_identifier);
        Ok(Self::decorate_cluster(
            &state,
            &arn,
            &state.clusters[cluster_identifier],
        ))
    }

    async fn modify_aqua_configuration(
        &self,
        input: ModifyAquaConfigurationInput,
    ) -> Result<AquaConfiguration> {
        let mut state = self.state.lock().await;
        state.begin("ModifyAquaConfiguration", &input.cluster_identifier)?;

        let requested = input.aqua_configuration_status.as_str();
        if ![
            aqua_configuration_status::ENABLED,
            aqua_configuration_status::DISABLED,
            aqua_configuration_status::AUTO,
        ]
        .contains(&requested)
        {
            return Err(ApiFault::invalid_parameter(format!(
                "Invalid AquaConfigurationStatus: {}",
                requested
            )));
        }
        let tracked = Self::available_cluster(&mut state, &input.cluster_identifier)?;
        let aqua = AquaConfiguration {
            aqua_status: aqua_status::APPLYING.to_string(),
            aqua_configuration_status: input.aqua_configuration_status,
        };
        tracked.record.aqua_configuration = Some(aqua.clone());
        Ok(aqua)
    }

    async fn describe_logging_status(&self, cluster_identifier: &str) -> Result<LoggingStatus> {
        let mut state = self.state.lock().await;
        state.begin("DescribeLoggingStatus", cluster_identifier)?;
        state
            .logging
            .get(cluster_identifier)
            .cloned()
            .ok_or_else(|| cluster_not_found(cluster_identifier))
    }

    async fn enable_logging(&self, input: EnableLoggingInput) -> Result<LoggingStatus> {
        let mut state = self.state.lock().await;
        state.begin("EnableLogging", &input.cluster_identifier)?;
        Self::available_cluster(&mut state, &input.cluster_identifier)?;

        let destination = input
            .log_destination_type
            .clone()
            .unwrap_or_else(|| "s3".to_string());
        if destination == "s3" && input.bucket_name.is_none() {
            return Err(ApiFault::invalid_parameter(
                "BucketName is required for the s3 log destination",
            ));
        }
        let logging = LoggingStatus {
            logging_enabled: true,
            bucket_name: input.bucket_name,
            s3_key_prefix: input.s3_key_prefix,
            log_destination_type: Some(destination),
            log_exports: input.log_exports,
        };
        state
            .logging
            .insert(input.cluster_identifier, logging.clone());
        Ok(logging)
    }

    async fn disable_logging(&self, cluster_identifier: &str) -> Result<LoggingStatus> {
        let mut state = self.state.lock().await;
        state.begin("DisableLogging", cluster_identifier)?;
        Self::available_cluster(&mut state, cluster_identifier)?;

        let logging = LoggingStatus::default();
        state
            .logging
            .insert(cluster_identifier.to_string(), logging.clone());
        Ok(logging)
    }

    async fn enable_snapshot_copy(&self, input: EnableSnapshotCopyInput) -> Result<Cluster> {
        let mut state = self.state.lock().await;
        state.begin("EnableSnapshotCopy", &input.cluster_identifier)?;

        let id = input.cluster_identifier.clone();
        let tracked = state
            .clusters
            .get_mut(&id)
            .ok_or_else(|| cluster_not_found(&id))?;
        if tracked.record.snapshot_copy_status.is_some() {
            return Err(ApiFault::already_exists(
                codes::SNAPSHOT_COPY_ALREADY_ENABLED,
                format!("Snapshot copy is already enabled for cluster {}.", id),
            ));
        }
        if input.destination_region == self.arn.region {
            return Err(ApiFault::invalid_parameter(
                "The destination region must differ from the source region",
            ));
        }
        tracked.record.snapshot_copy_status = Some(SnapshotCopyStatus {
            destination_region: input.destination_region,
            retention_period: input.retention_period.unwrap_or(7),
            snapshot_copy_grant_name: input.snapshot_copy_grant_name,
        });
        let arn = self.arn.cluster(&id);
        Ok(Self::decorate_cluster(&state, &arn, &state.clusters[&id]))
    }

    async fn disable_snapshot_copy(&self, cluster_identifier: &str) -> Result<Cluster> {
        let mut state = self.state.lock().await;
        state.begin("DisableSnapshotCopy", cluster_identifier)?;

        let tracked = state
            .clusters
            .get_mut(cluster_identifier)
            .ok_or_else(|| cluster_not_found(cluster_identifier))?;
        if tracked.record.snapshot_copy_status.take().is_none() {
            return Err(ApiFault::invalid_state(
                codes::SNAPSHOT_COPY_ALREADY_DISABLED,
                format!(
                    "Snapshot copy is already disabled for cluster {}.",
                    cluster_identifier
                ),
            ));
        }
        let arn = self.arn.cluster(cluster_identifier);
        Ok(Self::decorate_cluster(
            &state,
            &arn,
            &state.clusters[cluster_identifier],
        ))
    }

    // -------------------------------------------------------------------------
    // Subnet groups
    // -------------------------------------------------------------------------

    async fn describe_cluster_subnet_groups(
        &self,
        name: Option<&str>,
        marker: Option<String>,
    ) -> Result<Page<ClusterSubnetGroup>> {
        let mut state = self.state.lock().await;
        state.begin("DescribeClusterSubnetGroups", name.unwrap_or(""))?;

        let groups: Vec<ClusterSubnetGroup> = state
            .subnet_groups
            .values()
            .filter(|g| name.is_none_or(|n| g.cluster_subnet_group_name == n))
            .map(|g| {
                let mut group = g.clone();
                group.tags = state.tags_for(&self.arn.subnet_group(&g.cluster_subnet_group_name));
                group
            })
            .collect();
        if let Some(name) = name {
            if groups.is_empty() {
                return Err(ApiFault::not_found(
                    codes::CLUSTER_SUBNET_GROUP_NOT_FOUND,
                    format!("Cluster subnet group {} not found.", name),
                ));
            }
        }
        paginate(groups, marker.as_deref(), state.page_size)
    }

    async fn create_cluster_subnet_group(
        &self,
        input: CreateClusterSubnetGroupInput,
    ) -> Result<ClusterSubnetGroup> {
        let mut state = self.state.lock().await;
        state.begin("CreateClusterSubnetGroup", &input.cluster_subnet_group_name)?;

        if state
            .subnet_groups
            .contains_key(&input.cluster_subnet_group_name)
        {
            return Err(ApiFault::already_exists(
                codes::CLUSTER_SUBNET_GROUP_ALREADY_EXISTS,
                format!(
                    "Cluster subnet group {} already exists.",
                    input.cluster_subnet_group_name
                ),
            ));
        }
        if input.subnet_ids.is_empty() {
            return Err(ApiFault::invalid_parameter("At least one subnet is required"));
        }
        reject_system_tags(&input.tags)?;

        let group = ClusterSubnetGroup {
            cluster_subnet_group_name: input.cluster_subnet_group_name.clone(),
            description: input.description,
            vpc_id: "vpc-0sim".to_string(),
            subnet_group_status: "Complete".to_string(),
            subnet_ids: input.subnet_ids,
            tags: input.tags.clone(),
        };
        state.tags.insert(
            self.arn.subnet_group(&group.cluster_subnet_group_name),
            input.tags,
        );
        state
            .subnet_groups
            .insert(group.cluster_subnet_group_name.clone(), group.clone());
        Ok(group)
    }

    async fn modify_cluster_subnet_group(
        &self,
        input: ModifyClusterSubnetGroupInput,
    ) -> Result<ClusterSubnetGroup> {
        let mut state = self.state.lock().await;
        state.begin("ModifyClusterSubnetGroup", &input.cluster_subnet_group_name)?;

        if input.subnet_ids.is_empty() {
            return Err(ApiFault::invalid_parameter("At least one subnet is required"));
        }
        let group = state
            .subnet_groups
            .get_mut(&input.cluster_subnet_group_name)
            .ok_or_else(|| {
                ApiFault::not_found(
                    codes::CLUSTER_SUBNET_GROUP_NOT_FOUND,
                    format!(
                        "Cluster subnet group {} not found.",
                        input.cluster_subnet_group_name
                    ),
                )
            })?;
        if let Some(description) = input.description {
            group.description = description;
        }
        group.subnet_ids = input.subnet_ids;
        Ok(group.clone())
    }

    async fn delete_cluster_subnet_group(&self, name: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        state.begin("DeleteClusterSubnetGroup", name)?;

        if !state.subnet_groups.contains_key(name) {
            return Err(ApiFault::not_found(
                codes::CLUSTER_SUBNET_GROUP_NOT_FOUND,
                format!("Cluster subnet group {} not found.", name),
            ));
        }
        if state
            .clusters
            .values()
            .any(|t| t.record.cluster_subnet_group_name.as_deref() == Some(name))
        {
            return Err(ApiFault::invalid_state(
                codes::INVALID_CLUSTER_SUBNET_GROUP_STATE,
                format!("Cluster subnet group {} is in use.", name),
            ));
        }
        state.subnet_groups.remove(name);
        state.tags.remove(&self.arn.subnet_group(name));
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Snapshot schedules
    // -------------------------------------------------------------------------

    async fn describe_snapshot_schedules(
        &self,
        input: DescribeSnapshotSchedulesInput,
    ) -> Result<Page<SnapshotSchedule>> {
        let mut state = self.state.lock().await;
        let target = input
            .schedule_identifier
            .clone()
            .or_else(|| input.cluster_identifier.clone())
            .unwrap_or_default();
        state.begin("DescribeSnapshotSchedules", &target)?;
        tick(&mut state.associations);

        let schedules: Vec<SnapshotSchedule> = state
            .schedules
            .values()
            .filter(|s| {
                input
                    .schedule_identifier
                    .as_deref()
                    .is_none_or(|id| s.schedule_identifier == id)
            })
            .map(|s| {
                let mut schedule = s.clone();
                schedule.associated_clusters = state
                    .associations
                    .iter()
                    .filter(|((schedule_id, _), _)| schedule_id == &s.schedule_identifier)
                    .map(|(_, t)| t.record.clone())
                    .collect();
                schedule.tags = state.tags_for(&self.arn.snapshot_schedule(&s.schedule_identifier));
                schedule
            })
            .filter(|s| {
                input.cluster_identifier.as_deref().is_none_or(|cluster| {
                    s.associated_clusters
                        .iter()
                        .any(|a| a.cluster_identifier == cluster)
                })
            })
            .collect();
        paginate(schedules, input.marker.as_deref(), state.page_size)
    }

    async fn create_snapshot_schedule(
        &self,
        input: CreateSnapshotScheduleInput,
    ) -> Result<SnapshotSchedule> {
        let mut state = self.state.lock().await;
        state.begin("CreateSnapshotSchedule", &input.schedule_identifier)?;

        if state.schedules.contains_key(&input.schedule_identifier) {
            return Err(ApiFault::already_exists(
                codes::SNAPSHOT_SCHEDULE_ALREADY_EXISTS,
                format!(
                    "Snapshot schedule {} already exists.",
                    input.schedule_identifier
                ),
            ));
        }
        if input.schedule_definitions.is_empty() {
            return Err(ApiFault::invalid_parameter(
                "At least one schedule definition is required",
            ));
        }
        reject_system_tags(&input.tags)?;

        let schedule = SnapshotSchedule {
            schedule_identifier: input.schedule_identifier.clone(),
            schedule_description: input.schedule_description,
            schedule_definitions: input.schedule_definitions,
            associated_clusters: Vec::new(),
            tags: input.tags.clone(),
        };
        state.tags.insert(
            self.arn.snapshot_schedule(&input.schedule_identifier),
            input.tags,
        );
        state
            .schedules
            .insert(input.schedule_identifier, schedule.clone());
        Ok(schedule)
    }

    async fn modify_snapshot_schedule(
        &self,
        input: ModifySnapshotScheduleInput,
    ) -> Result<SnapshotSchedule> {
        let mut state = self.state.lock().await;
        state.begin("ModifySnapshotSchedule", &input.schedule_identifier)?;

        let schedule = state
            .schedules
            .get_mut(&input.schedule_identifier)
            .ok_or_else(|| {
                ApiFault::not_found(
                    codes::SNAPSHOT_SCHEDULE_NOT_FOUND,
                    format!("Snapshot schedule {} not found.", input.schedule_identifier),
                )
            })?;
        schedule.schedule_definitions = input.schedule_definitions;
        Ok(schedule.clone())
    }

    async fn delete_snapshot_schedule(&self, schedule_identifier: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        state.begin("DeleteSnapshotSchedule", schedule_identifier)?;

        if !state.schedules.contains_key(schedule_identifier) {
            return Err(ApiFault::not_found(
                codes::SNAPSHOT_SCHEDULE_NOT_FOUND,
                format!("Snapshot schedule {} not found.", schedule_identifier),
            ));
        }
        if state
            .associations
            .keys()
            .any(|(schedule_id, _)| schedule_id == schedule_identifier)
        {
            return Err(ApiFault::invalid_state(
                codes::INVALID_CLUSTER_SNAPSHOT_SCHEDULE_STATE,
                format!(
                    "The snapshot schedule {} is associated with one or more clusters.",
                    schedule_identifier
                ),
            ));
        }
        state.schedules.remove(schedule_identifier);
        state
            .tags
            .remove(&self.arn.snapshot_schedule(schedule_identifier));
        Ok(())
    }

    async fn modify_cluster_snapshot_schedule(
        &self,
        input: ModifyClusterSnapshotScheduleInput,
    ) -> Result<()> {
        let mut state = self.state.lock().await;
        state.begin("ModifyClusterSnapshotSchedule", &input.cluster_identifier)?;

        if !state.clusters.contains_key(&input.cluster_identifier) {
            return Err(cluster_not_found(&input.cluster_identifier));
        }

        if input.disassociate_schedule {
            let key = state
                .associations
                .keys()
                .find(|(schedule_id, cluster_id)| {
                    cluster_id == &input.cluster_identifier
                        && input
                            .schedule_identifier
                            .as_deref()
                            .is_none_or(|s| s == schedule_id)
                })
                .cloned()
                .ok_or_else(|| {
                    ApiFault::not_found(
                        codes::SNAPSHOT_SCHEDULE_NOT_FOUND,
                        format!(
                            "Cluster {} is not associated with a snapshot schedule.",
                            input.cluster_identifier
                        ),
                    )
                })?;
            let transition = state.removal();
            if let Some(tracked) = state.associations.get_mut(&key) {
                tracked.record.schedule_association_state = association_state::MODIFYING.to_string();
                tracked.transition = transition;
            }
            return Ok(());
        }

        let schedule_id = input
            .schedule_identifier
            .clone()
            .ok_or_else(|| ApiFault::invalid_parameter("ScheduleIdentifier is required"))?;
        if !state.schedules.contains_key(&schedule_id) {
            return Err(ApiFault::not_found(
                codes::SNAPSHOT_SCHEDULE_NOT_FOUND,
                format!("Snapshot schedule {} not found.", schedule_id),
            ));
        }
        if state
            .associations
            .keys()
            .any(|(_, cluster_id)| cluster_id == &input.cluster_identifier)
        {
            return Err(ApiFault::invalid_state(
                codes::INVALID_CLUSTER_SNAPSHOT_SCHEDULE_STATE,
                format!(
                    "Cluster {} is already associated with a snapshot schedule.",
                    input.cluster_identifier
                ),
            ));
        }
        let transition = state.settle_into(association_state::ACTIVE);
        state.associations.insert(
            (schedule_id, input.cluster_identifier.clone()),
            Tracked {
                record: ClusterAssociatedToSchedule {
                    cluster_identifier: input.cluster_identifier,
                    schedule_association_state: association_state::MODIFYING.to_string(),
                },
                transition,
            },
        );
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Scheduled actions
    // -------------------------------------------------------------------------

    async fn describe_scheduled_actions(
        &self,
        name: Option<&str>,
        marker: Option<String>,
    ) -> Result<Page<ScheduledAction>> {
        let mut state = self.state.lock().await;
        state.begin("DescribeScheduledActions", name.unwrap_or(""))?;

        let actions: Vec<ScheduledAction> = state
            .scheduled_actions
            .values()
            .filter(|a| name.is_none_or(|n| a.scheduled_action_name == n))
            .cloned()
            .collect();
        if let Some(name) = name {
            if actions.is_empty() {
                return Err(ApiFault::not_found(
                    codes::SCHEDULED_ACTION_NOT_FOUND,
                    format!("Scheduled action {} not found.", name),
                ));
            }
        }
        paginate(actions, marker.as_deref(), state.page_size)
    }

    async fn create_scheduled_action(
        &self,
        input: CreateScheduledActionInput,
    ) -> Result<ScheduledAction> {
        let mut state = self.state.lock().await;
        state.begin("CreateScheduledAction", &input.scheduled_action_name)?;

        if state
            .scheduled_actions
            .contains_key(&input.scheduled_action_name)
        {
            return Err(ApiFault::already_exists(
                codes::SCHEDULED_ACTION_ALREADY_EXISTS,
                format!(
                    "Scheduled action {} already exists.",
                    input.scheduled_action_name
                ),
            ));
        }
        if input.iam_role.is_empty() {
            return Err(ApiFault::new(
                FaultKind::InvalidParameter,
                codes::INVALID_SCHEDULED_ACTION,
                "IamRole is required",
            ));
        }
        let action_state = if input.enable == Some(false) {
            scheduled_action_state::DISABLED
        } else {
            scheduled_action_state::ACTIVE
        };
        let action = ScheduledAction {
            scheduled_action_name: input.scheduled_action_name.clone(),
            target_action: input.target_action,
            schedule: input.schedule,
            iam_role: input.iam_role,
            scheduled_action_description: input.scheduled_action_description,
            state: action_state.to_string(),
            start_time: input.start_time,
            end_time: input.end_time,
        };
        state
            .scheduled_actions
            .insert(input.scheduled_action_name, action.clone());
        Ok(action)
    }

    async fn modify_scheduled_action(
        &self,
        input: ModifyScheduledActionInput,
    ) -> Result<ScheduledAction> {
        let mut state = self.state.lock().await;
        state.begin("ModifyScheduledAction", &input.scheduled_action_name)?;

        let action = state
            .scheduled_actions
            .get_mut(&input.scheduled_action_name)
            .ok_or_else(|| {
                ApiFault::not_found(
                    codes::SCHEDULED_ACTION_NOT_FOUND,
                    format!(
                        "Scheduled action {} not found.",
                        input.scheduled_action_name
                    ),
                )
            })?;
        if let Some(v) = input.target_action {
            action.target_action = v;
        }
        if let Some(v) = input.schedule {
            action.schedule = v;
        }
        if let Some(v) = input.iam_role {
            action.iam_role = v;
        }
        if let Some(v) = input.scheduled_action_description {
            action.scheduled_action_description = Some(v);
        }
        if let Some(v) = input.enable {
            let s = if v {
                scheduled_action_state::ACTIVE
            } else {
                scheduled_action_state::DISABLED
            };
            action.state = s.to_string();
        }
        if input.start_time.is_some() {
            action.start_time = input.start_time;
        }
        if input.end_time.is_some() {
            action.end_time = input.end_time;
        }
        Ok(action.clone())
    }

    async fn delete_scheduled_action(&self, name: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        state.begin("DeleteScheduledAction", name)?;

        state.scheduled_actions.remove(name).map(|_| ()).ok_or_else(|| {
            ApiFault::not_found(
                codes::SCHEDULED_ACTION_NOT_FOUND,
                format!("Scheduled action {} not found.", name),
            )
        })
    }

    // -------------------------------------------------------------------------
    // Usage limits
    // -------------------------------------------------------------------------

    async fn describe_usage_limits(
        &self,
        usage_limit_id: Option<&str>,
        marker: Option<String>,
    ) -> Result<Page<UsageLimit>> {
        let mut state = self.state.lock().await;
        state.begin("DescribeUsageLimits", usage_limit_id.unwrap_or(""))?;

        let limits: Vec<UsageLimit> = state
            .usage_limits
            .values()
            .filter(|l| usage_limit_id.is_none_or(|id| l.usage_limit_id == id))
            .map(|l| {
                let mut limit = l.clone();
                limit.tags = state.tags_for(&self.arn.usage_limit(&l.usage_limit_id));
                limit
            })
            .collect();
        if let Some(id) = usage_limit_id {
            if limits.is_empty() {
                return Err(ApiFault::not_found(
                    codes::USAGE_LIMIT_NOT_FOUND,
                    format!("Usage limit {} not found.", id),
                ));
            }
        }
        paginate(limits, marker.as_deref(), state.page_size)
    }

    async fn create_usage_limit(&self, input: CreateUsageLimitInput) -> Result<UsageLimit> {
        let mut state = self.state.lock().await;
        state.begin("CreateUsageLimit", &input.cluster_identifier)?;

        if !state.clusters.contains_key(&input.cluster_identifier) {
            return Err(cluster_not_found(&input.cluster_identifier));
        }
        if input.amount <= 0 {
            return Err(ApiFault::invalid_parameter("Amount must be positive"));
        }
        reject_system_tags(&input.tags)?;

        let limit = UsageLimit {
            usage_limit_id: uuid::Uuid::new_v4().to_string(),
            cluster_identifier: input.cluster_identifier,
            feature_type: input.feature_type,
            limit_type: input.limit_type,
            amount: input.amount,
            period: input.period.unwrap_or_else(|| "monthly".to_string()),
            breach_action: input.breach_action.unwrap_or_else(|| "log".to_string()),
            tags: input.tags.clone(),
        };
        state
            .tags
            .insert(self.arn.usage_limit(&limit.usage_limit_id), input.tags);
        state
            .usage_limits
            .insert(limit.usage_limit_id.clone(), limit.clone());
        Ok(limit)
    }

    async fn modify_usage_limit(&self, input: ModifyUsageLimitInput) -> Result<UsageLimit> {
        let mut state = self.state.lock().await;
        state.begin("ModifyUsageLimit", &input.usage_limit_id)?;

        let limit = state
            .usage_limits
            .get_mut(&input.usage_limit_id)
            .ok_or_else(|| {
                ApiFault::not_found(
                    codes::USAGE_LIMIT_NOT_FOUND,
                    format!("Usage limit {} not found.", input.usage_limit_id),
                )
            })?;
        if let Some(amount) = input.amount {
            limit.amount = amount;
        }
        if let Some(action) = input.breach_action {
            limit.breach_action = action;
        }
        Ok(limit.clone())
    }

    async fn delete_usage_limit(&self, usage_limit_id: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        state.begin("DeleteUsageLimit", usage_limit_id)?;

        state
            .usage_limits
            .remove(usage_limit_id)
            .ok_or_else(|| {
                ApiFault::not_found(
                    codes::USAGE_LIMIT_NOT_FOUND,
                    format!("Usage limit {} not found.", usage_limit_id),
                )
            })?;
        state.tags.remove(&self.arn.usage_limit(usage_limit_id));
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Endpoint access
    // -------------------------------------------------------------------------

    async fn describe_endpoint_access(
        &self,
        endpoint_name: Option<&str>,
        marker: Option<String>,
    ) -> Result<Page<EndpointAccess>> {
        let mut state = self.state.lock().await;
        state.begin("DescribeEndpointAccess", endpoint_name.unwrap_or(""))?;
        tick(&mut state.endpoints);

        let endpoints: Vec<EndpointAccess> = state
            .endpoints
            .values()
            .filter(|t| endpoint_name.is_none_or(|n| t.record.endpoint_name == n))
            .map(|t| t.record.clone())
            .collect();
        if let Some(name) = endpoint_name {
            if endpoints.is_empty() {
                return Err(ApiFault::not_found(
                    codes::ENDPOINT_NOT_FOUND,
                    format!("Endpoint {} not found.", name),
                ));
            }
        }
        paginate(endpoints, marker.as_deref(), state.page_size)
    }

    async fn create_endpoint_access(
        &self,
        input: CreateEndpointAccessInput,
    ) -> Result<EndpointAccess> {
        let mut state = self.state.lock().await;
        state.begin("CreateEndpointAccess", &input.endpoint_name)?;

        if state.endpoints.contains_key(&input.endpoint_name) {
            return Err(ApiFault::already_exists(
                codes::ENDPOINT_ALREADY_EXISTS,
                format!("Endpoint {} already exists.", input.endpoint_name),
            ));
        }
        let port = state
            .clusters
            .get(&input.cluster_identifier)
            .ok_or_else(|| cluster_not_found(&input.cluster_identifier))?
            .record
            .endpoint
            .as_ref()
            .map(|e| e.port)
            .unwrap_or(DEFAULT_PORT);
        if !state.subnet_groups.contains_key(&input.subnet_group_name) {
            return Err(ApiFault::not_found(
                codes::CLUSTER_SUBNET_GROUP_NOT_FOUND,
                format!("Cluster subnet group {} not found.", input.subnet_group_name),
            ));
        }

        let endpoint = EndpointAccess {
            endpoint_name: input.endpoint_name.clone(),
            cluster_identifier: input.cluster_identifier,
            subnet_group_name: input.subnet_group_name,
            resource_owner: input
                .resource_owner
                .unwrap_or_else(|| self.arn.account_id.clone()),
            endpoint_status: endpoint_status::CREATING.to_string(),
            address: Some(format!(
                "{}-endpoint.c0ffee.{}.redshift.amazonaws.com",
                input.endpoint_name, self.arn.region
            )),
            port: Some(port),
            vpc_security_group_ids: input.vpc_security_group_ids,
        };
        let transition = state.settle_into(endpoint_status::ACTIVE);
        state.endpoints.insert(
            input.endpoint_name,
            Tracked {
                record: endpoint.clone(),
                transition,
            },
        );
        Ok(endpoint)
    }

    async fn modify_endpoint_access(
        &self,
        input: ModifyEndpointAccessInput,
    ) -> Result<EndpointAccess> {
        let mut state = self.state.lock().await;
        state.begin("ModifyEndpointAccess", &input.endpoint_name)?;

        let transition = state.settle_into(endpoint_status::ACTIVE);
        let tracked = state.endpoints.get_mut(&input.endpoint_name).ok_or_else(|| {
            ApiFault::not_found(
                codes::ENDPOINT_NOT_FOUND,
                format!("Endpoint {} not found.", input.endpoint_name),
            )
        })?;
        if tracked.record.endpoint_status != endpoint_status::ACTIVE {
            return Err(ApiFault::invalid_state(
                codes::INVALID_ENDPOINT_STATE,
                format!("Endpoint {} is not active.", input.endpoint_name),
            ));
        }
        tracked.record.vpc_security_group_ids = input.vpc_security_group_ids;
        tracked.record.endpoint_status = endpoint_status::MODIFYING.to_string();
        tracked.transition = transition;
        Ok(tracked.record.clone())
    }

    async fn delete_endpoint_access(&self, endpoint_name: &str) -> Result<EndpointAccess> {
        let mut state = self.state.lock().await;
        state.begin("DeleteEndpointAccess", endpoint_name)?;

        let transition = state.removal();
        let tracked = state.endpoints.get_mut(endpoint_name).ok_or_else(|| {
            ApiFault::not_found(
                codes::ENDPOINT_NOT_FOUND,
                format!("Endpoint {} not found.", endpoint_name),
            )
        })?;
        tracked.record.endpoint_status = endpoint_status::DELETING.to_string();
        tracked.transition = transition;
        Ok(tracked.record.clone())
    }

    // -------------------------------------------------------------------------
    // Cluster snapshots
    // -------------------------------------------------------------------------

    async fn describe_cluster_snapshots(
        &self,
        snapshot_identifier: Option<&str>,
        marker: Option<String>,
    ) -> Result<Page<ClusterSnapshot>> {
        let mut state = self.state.lock().await;
        state.begin("DescribeClusterSnapshots", snapshot_identifier.unwrap_or(""))?;
        tick(&mut state.snapshots);

        let snapshots: Vec<ClusterSnapshot> = state
            .snapshots
            .values()
            .filter(|t| snapshot_identifier.is_none_or(|id| t.record.snapshot_identifier == id))
            .map(|t| {
                let mut snapshot = t.record.clone();
                snapshot.tags = state.tags_for(
                    &self
                        .arn
                        .snapshot(&snapshot.cluster_identifier, &snapshot.snapshot_identifier),
                );
                snapshot
            })
            .collect();
        if let Some(id) = snapshot_identifier {
            if snapshots.is_empty() {
                return Err(ApiFault::not_found(
                    codes::CLUSTER_SNAPSHOT_NOT_FOUND,
                    format!("Snapshot {} not found.", id),
                ));
            }
        }
        paginate(snapshots, marker.as_deref(), state.page_size)
    }

    async fn create_cluster_snapshot(
        &self,
        input: CreateClusterSnapshotInput,
    ) -> Result<ClusterSnapshot> {
        let mut state = self.state.lock().await;
        state.begin("CreateClusterSnapshot", &input.snapshot_identifier)?;

        if state.snapshots.contains_key(&input.snapshot_identifier) {
            return Err(ApiFault::already_exists(
                codes::CLUSTER_SNAPSHOT_ALREADY_EXISTS,
                format!("Snapshot {} already exists.", input.snapshot_identifier),
            ));
        }
        let cluster = state
            .clusters
            .get(&input.cluster_identifier)
            .ok_or_else(|| cluster_not_found(&input.cluster_identifier))?;
        if cluster.record.cluster_status != status::AVAILABLE {
            return Err(cluster_busy(&input.cluster_identifier));
        }
        reject_system_tags(&input.tags)?;

        let snapshot = ClusterSnapshot {
            snapshot_identifier: input.snapshot_identifier.clone(),
            cluster_identifier: input.cluster_identifier.clone(),
            status: snapshot_status::CREATING.to_string(),
            manual_snapshot_retention_period: input.manual_snapshot_retention_period.unwrap_or(-1),
            snapshot_create_time: Some(Utc::now()),
            owner_account: self.arn.account_id.clone(),
            kms_key_id: cluster.record.kms_key_id.clone(),
            tags: input.tags.clone(),
        };
        state.tags.insert(
            self.arn
                .snapshot(&input.cluster_identifier, &input.snapshot_identifier),
            input.tags,
        );
        let transition = state.settle_into(snapshot_status::AVAILABLE);
        state.snapshots.insert(
            input.snapshot_identifier,
            Tracked {
                record: snapshot.clone(),
                transition,
            },
        );
        Ok(snapshot)
    }

    async fn modify_cluster_snapshot(
        &self,
        input: ModifyClusterSnapshotInput,
    ) -> Result<ClusterSnapshot> {
        let mut state = self.state.lock().await;
        state.begin("ModifyClusterSnapshot", &input.snapshot_identifier)?;

        let tracked = state
            .snapshots
            .get_mut(&input.snapshot_identifier)
            .ok_or_else(|| {
                ApiFault::not_found(
                    codes::CLUSTER_SNAPSHOT_NOT_FOUND,
                    format!("Snapshot {} not found.", input.snapshot_identifier),
                )
            })?;
        if let Some(period) = input.manual_snapshot_retention_period {
            tracked.record.manual_snapshot_retention_period = period;
        }
        Ok(tracked.record.clone())
    }

    async fn delete_cluster_snapshot(&self, snapshot_identifier: &str) -> Result<ClusterSnapshot> {
        let mut state = self.state.lock().await;
        state.begin("DeleteClusterSnapshot", snapshot_identifier)?;

        let tracked = state.snapshots.get(snapshot_identifier).ok_or_else(|| {
            ApiFault::not_found(
                codes::CLUSTER_SNAPSHOT_NOT_FOUND,
                format!("Snapshot {} not found.", snapshot_identifier),
            )
        })?;
        if tracked.record.status != snapshot_status::AVAILABLE {
            return Err(ApiFault::invalid_state(
                codes::INVALID_CLUSTER_SNAPSHOT_STATE,
                format!("Snapshot {} is not available.", snapshot_identifier),
            ));
        }
        let mut snapshot = tracked.record.clone();
        state.snapshots.remove(snapshot_identifier);
        state.tags.remove(
            &self
                .arn
                .snapshot(&snapshot.cluster_identifier, snapshot_identifier),
        );
        snapshot.status = snapshot_status::DELETED.to_string();
        Ok(snapshot)
    }

    // -------------------------------------------------------------------------
    // HSM client certificates
    // -------------------------------------------------------------------------

    async fn describe_hsm_client_certificates(
        &self,
        identifier: Option<&str>,
        marker: Option<String>,
    ) -> Result<Page<HsmClientCertificate>> {
        let mut state = self.state.lock().await;
        state.begin("DescribeHsmClientCertificates", identifier.unwrap_or(""))?;

        let certificates: Vec<HsmClientCertificate> = state
            .hsm_certificates
            .values()
            .filter(|c| identifier.is_none_or(|id| c.hsm_client_certificate_identifier == id))
            .map(|c| {
                let mut certificate = c.clone();
                certificate.tags = state.tags_for(
                    &self
                        .arn
                        .hsm_client_certificate(&c.hsm_client_certificate_identifier),
                );
                certificate
            })
            .collect();
        if let Some(id) = identifier {
            if certificates.is_empty() {
                return Err(ApiFault::not_found(
                    codes::HSM_CLIENT_CERTIFICATE_NOT_FOUND,
                    format!("HSM client certificate {} not found.", id),
                ));
            }
        }
        paginate(certificates, marker.as_deref(), state.page_size)
    }

    async fn create_hsm_client_certificate(
        &self,
        input: CreateHsmClientCertificateInput,
    ) -> Result<HsmClientCertificate> {
        let mut state = self.state.lock().await;
        state.begin(
            "CreateHsmClientCertificate",
            &input.hsm_client_certificate_identifier,
        )?;

        if state
            .hsm_certificates
            .contains_key(&input.hsm_client_certificate_identifier)
        {
            return Err(ApiFault::already_exists(
                codes::HSM_CLIENT_CERTIFICATE_ALREADY_EXISTS,
                format!(
                    "HSM client certificate {} already exists.",
                    input.hsm_client_certificate_identifier
                ),
            ));
        }
        reject_system_tags(&input.tags)?;

        let certificate = HsmClientCertificate {
            hsm_client_certificate_identifier: input.hsm_client_certificate_identifier.clone(),
            hsm_client_certificate_public_key: format!(
                "-----BEGIN CERTIFICATE-----\n{}\n-----END CERTIFICATE-----",
                uuid::Uuid::new_v4().simple()
            ),
            tags: input.tags.clone(),
        };
        state.tags.insert(
            self.arn
                .hsm_client_certificate(&input.hsm_client_certificate_identifier),
            input.tags,
        );
        state.hsm_certificates.insert(
            input.hsm_client_certificate_identifier,
            certificate.clone(),
        );
        Ok(certificate)
    }

    async fn delete_hsm_client_certificate(&self, identifier: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        state.begin("DeleteHsmClientCertificate", identifier)?;

        state.hsm_certificates.remove(identifier).ok_or_else(|| {
            ApiFault::not_found(
                codes::HSM_CLIENT_CERTIFICATE_NOT_FOUND,
                format!("HSM client certificate {} not found.", identifier),
            )
        })?;
        state
            .tags
            .remove(&self.arn.hsm_client_certificate(identifier));
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Partner integrations
    // -------------------------------------------------------------------------

    async fn describe_partners(&self, key: &PartnerKey) -> Result<Vec<PartnerIntegration>> {
        let mut state = self.state.lock().await;
        state.begin("DescribePartners", &key.cluster_identifier)?;

        if !state.clusters.contains_key(&key.cluster_identifier) {
            return Err(cluster_not_found(&key.cluster_identifier));
        }
        Ok(state
            .partners
            .iter()
            .filter(|(k, _)| {
                k.account_id == key.account_id
                    && k.cluster_identifier == key.cluster_identifier
                    && (key.database_name.is_empty() || k.database_name == key.database_name)
                    && (key.partner_name.is_empty() || k.partner_name == key.partner_name)
            })
            .map(|(_, p)| p.clone())
            .collect())
    }

    async fn add_partner(&self, key: PartnerKey) -> Result<PartnerKey> {
        let mut state = self.state.lock().await;
        state.begin("AddPartner", &key.cluster_identifier)?;

        if !state.clusters.contains_key(&key.cluster_identifier) {
            return Err(cluster_not_found(&key.cluster_identifier));
        }
        if key.account_id != self.arn.account_id {
            return Err(ApiFault::new(
                FaultKind::AccessDenied,
                codes::UNAUTHORIZED_PARTNER_INTEGRATION,
                format!("Account {} cannot integrate partners here.", key.account_id),
            ));
        }
        if state.partners.contains_key(&key) {
            return Err(ApiFault::already_exists(
                "PartnerAlreadyExists",
                format!("Partner {} is already integrated.", key.partner_name),
            ));
        }
        state.partners.insert(
            key.clone(),
            PartnerIntegration {
                database_name: key.database_name.clone(),
                partner_name: key.partner_name.clone(),
                status: partner_status::ACTIVE.to_string(),
                status_message: None,
            },
        );
        Ok(key)
    }

    async fn delete_partner(&self, key: PartnerKey) -> Result<PartnerKey> {
        let mut state = self.state.lock().await;
        state.begin("DeletePartner", &key.cluster_identifier)?;

        if state.partners.remove(&key).is_none() {
            return Err(ApiFault::not_found(
                codes::PARTNER_NOT_FOUND,
                format!("Partner {} not found.", key.partner_name),
            ));
        }
        Ok(key)
    }

    // -------------------------------------------------------------------------
    // Data shares
    // -------------------------------------------------------------------------

    async fn describe_data_shares(
        &self,
        data_share_arn: Option<&str>,
        marker: Option<String>,
    ) -> Result<Page<DataShare>> {
        let mut state = self.state.lock().await;
        state.begin("DescribeDataShares", data_share_arn.unwrap_or(""))?;

        let mut shares: Vec<DataShare> = state
            .data_shares
            .values()
            .filter(|s| data_share_arn.is_none_or(|arn| s.data_share_arn == arn))
            .cloned()
            .collect();
        if let Some(arn) = data_share_arn {
            if shares.is_empty() {
                return Err(ApiFault::not_found(
                    codes::INVALID_DATA_SHARE,
                    format!("Data share {} not found.", arn),
                ));
            }
        }
        if state.stale_data_share_reads > 0 {
            state.stale_data_share_reads -= 1;
            for share in &mut shares {
                share.data_share_arn = format!("{}-previous", share.data_share_arn);
            }
        }
        paginate(shares, marker.as_deref(), state.page_size)
    }

    async fn authorize_data_share(&self, input: AuthorizeDataShareInput) -> Result<DataShare> {
        let mut state = self.state.lock().await;
        state.begin("AuthorizeDataShare", &input.data_share_arn)?;

        let share = state
            .data_shares
            .get_mut(&input.data_share_arn)
            .ok_or_else(|| {
                ApiFault::not_found(
                    codes::INVALID_DATA_SHARE,
                    format!("Data share {} not found.", input.data_share_arn),
                )
            })?;
        if share
            .associations
            .iter()
            .any(|a| a.consumer_identifier == input.consumer_identifier)
        {
            return Err(ApiFault::already_exists(
                codes::INVALID_DATA_SHARE,
                format!(
                    "Consumer {} is already authorized.",
                    input.consumer_identifier
                ),
            ));
        }
        share.associations.push(DataShareAssociation {
            consumer_identifier: input.consumer_identifier,
            consumer_region: None,
            status: data_share_status::AUTHORIZED.to_string(),
            allow_writes: input.allow_writes.unwrap_or(false),
        });
        Ok(share.clone())
    }

    async fn deauthorize_data_share(
        &self,
        data_share_arn: &str,
        consumer_identifier: &str,
    ) -> Result<DataShare> {
        let mut state = self.state.lock().await;
        state.begin("DeauthorizeDataShare", data_share_arn)?;

        let not_authorized = || {
            ApiFault::not_found(
                codes::INVALID_DATA_SHARE,
                format!(
                    "Consumer {} is not authorized for data share {}.",
                    consumer_identifier, data_share_arn
                ),
            )
        };
        let share = state
            .data_shares
            .get_mut(data_share_arn)
            .ok_or_else(not_authorized)?;
        let before = share.associations.len();
        share
            .associations
            .retain(|a| a.consumer_identifier != consumer_identifier);
        if share.associations.len() == before {
            return Err(not_authorized());
        }
        Ok(share.clone())
    }

    async fn associate_data_share_consumer(
        &self,
        input: AssociateDataShareConsumerInput,
    ) -> Result<DataShare> {
        let mut state = self.state.lock().await;
        state.begin("AssociateDataShareConsumer", &input.data_share_arn)?;

        let consumer = Consumer::pick(
            input.associate_entire_account,
            input.consumer_arn,
            input.consumer_region,
        )?;
        let account = self.arn.account_id.as_str();
        let share = state
            .data_shares
            .get_mut(&input.data_share_arn)
            .ok_or_else(|| data_share_not_found(&input.data_share_arn))?;
        let authorization = share
            .associations
            .iter()
            .position(|a| {
                Consumer::EntireAccount.matches(account, a)
                    && (a.status == data_share_status::AUTHORIZED
                        || a.status == data_share_status::ACTIVE)
            })
            .ok_or_else(|| {
                ApiFault::invalid_state(
                    codes::INVALID_DATA_SHARE,
                    format!(
                        "Data share {} is not authorized for account {}.",
                        input.data_share_arn, account
                    ),
                )
            })?;
        let already = || {
            ApiFault::already_exists(
                codes::INVALID_DATA_SHARE,
                format!(
                    "Data share {} is already associated with {:?}.",
                    input.data_share_arn, consumer
                ),
            )
        };

        match &consumer {
            Consumer::EntireAccount => {
                let entry = &mut share.associations[authorization];
                if entry.status == data_share_status::ACTIVE {
                    return Err(already());
                }
                entry.status = data_share_status::ACTIVE.to_string();
                if let Some(allow_writes) = input.allow_writes {
                    entry.allow_writes = allow_writes;
                }
            }
            Consumer::Namespace(arn) => {
                if share.associations.iter().any(|a| consumer.matches(account, a)) {
                    return Err(already());
                }
                share.associations.push(DataShareAssociation {
                    consumer_identifier: arn.clone(),
                    consumer_region: None,
                    status: data_share_status::ACTIVE.to_string(),
                    allow_writes: input.allow_writes.unwrap_or(false),
                });
            }
            Consumer::Region(region) => {
                if share.associations.iter().any(|a| consumer.matches(account, a)) {
                    return Err(already());
                }
                share.associations.push(DataShareAssociation {
                    consumer_identifier: account.to_string(),
                    consumer_region: Some(region.clone()),
                    status: data_share_status::ACTIVE.to_string(),
                    allow_writes: input.allow_writes.unwrap_or(false),
                });
            }
        }
        Ok(share.clone())
    }

    async fn disassociate_data_share_consumer(
        &self,
        input: DisassociateDataShareConsumerInput,
    ) -> Result<DataShare> {
        let mut state = self.state.lock().await;
        state.begin("DisassociateDataShareConsumer", &input.data_share_arn)?;

        let consumer = Consumer::pick(
            input.disassociate_entire_account,
            input.consumer_arn,
            input.consumer_region,
        )?;
        let account = self.arn.account_id.as_str();
        let not_associated = || {
            ApiFault::not_found(
                codes::INVALID_DATA_SHARE,
                format!(
                    "Data share {} is not associated with {:?}.",
                    input.data_share_arn, consumer
                ),
            )
        };
        let share = state
            .data_shares
            .get_mut(&input.data_share_arn)
            .ok_or_else(not_associated)?;

        if consumer == Consumer::EntireAccount {
            let entry = share
                .associations
                .iter_mut()
                .find(|a| consumer.matches(account, a) && a.status == data_share_status::ACTIVE)
                .ok_or_else(not_associated)?;
            entry.status = data_share_status::AUTHORIZED.to_string();
        } else {
            let before = share.associations.len();
            share.associations.retain(|a| !consumer.matches(account, a));
            if share.associations.len() == before {
                return Err(not_associated());
            }
        }
        Ok(share.clone())
    }

    // -------------------------------------------------------------------------
    // Event subscriptions
    // -------------------------------------------------------------------------

    async fn describe_event_subscriptions(
        &self,
        name: Option<&str>,
        marker: Option<String>,
    ) -> Result<Page<EventSubscription>> {
        let mut state = self.state.lock().await;
        state.begin("DescribeEventSubscriptions", name.unwrap_or(""))?;
        tick(&mut state.event_subscriptions);

        let subscriptions: Vec<EventSubscription> = state
            .event_subscriptions
            .values()
            .filter(|t| name.is_none_or(|n| t.record.cust_subscription_id == n))
            .map(|t| {
                let mut subscription = t.record.clone();
                subscription.tags = state.tags_for(
                    &self
                        .arn
                        .event_subscription(&subscription.cust_subscription_id),
                );
                subscription
            })
            .collect();
        if let Some(name) = name {
            if subscriptions.is_empty() {
                return Err(subscription_not_found(name));
            }
        }
        paginate(subscriptions, marker.as_deref(), state.page_size)
    }

    async fn create_event_subscription(
        &self,
        input: CreateEventSubscriptionInput,
    ) -> Result<EventSubscription> {
        let mut state = self.state.lock().await;
        state.begin("CreateEventSubscription", &input.subscription_name)?;

        if state
            .event_subscriptions
            .contains_key(&input.subscription_name)
        {
            return Err(ApiFault::already_exists(
                codes::SUBSCRIPTION_ALREADY_EXISTS,
                format!(
                    "Event subscription {} already exists.",
                    input.subscription_name
                ),
            ));
        }
        if !input.sns_topic_arn.starts_with("arn:") || !input.sns_topic_arn.contains(":sns:") {
            return Err(ApiFault::new(
                FaultKind::InvalidParameter,
                codes::SNS_TOPIC_ARN_NOT_FOUND,
                format!("SNS topic {} not found.", input.sns_topic_arn),
            ));
        }
        if !input.source_ids.is_empty() && input.source_type.is_none() {
            return Err(ApiFault::invalid_parameter(
                "Source IDs require a source type.",
            ));
        }
        reject_system_tags(&input.tags)?;

        let subscription = EventSubscription {
            cust_subscription_id: input.subscription_name.clone(),
            customer_aws_id: self.arn.account_id.clone(),
            sns_topic_arn: input.sns_topic_arn,
            status: event_subscription_status::CREATING.to_string(),
            source_type: input.source_type,
            source_ids: input.source_ids,
            event_categories: input.event_categories,
            severity: input.severity,
            enabled: input.enabled.unwrap_or(true),
            tags: input.tags.clone(),
        };
        state.tags.insert(
            self.arn.event_subscription(&input.subscription_name),
            input.tags,
        );
        let transition = state.settle_into(event_subscription_status::ACTIVE);
        state.event_subscriptions.insert(
            input.subscription_name,
            Tracked {
                record: subscription.clone(),
                transition,
            },
        );
        Ok(subscription)
    }

    async fn modify_event_subscription(
        &self,
        input: ModifyEventSubscriptionInput,
    ) -> Result<EventSubscription> {
        let mut state = self.state.lock().await;
        state.begin("ModifyEventSubscription", &input.subscription_name)?;

        let tracked = state
            .event_subscriptions
            .get_mut(&input.subscription_name)
            .ok_or_else(|| subscription_not_found(&input.subscription_name))?;
        let record = &mut tracked.record;
        if let Some(topic) = input.sns_topic_arn {
            record.sns_topic_arn = topic;
        }
        if let Some(source_type) = input.source_type {
            record.source_type = Some(source_type);
        }
        if let Some(source_ids) = input.source_ids {
            record.source_ids = source_ids;
        }
        if let Some(categories) = input.event_categories {
            record.event_categories = categories;
        }
        if let Some(severity) = input.severity {
            record.severity = Some(severity);
        }
        if let Some(enabled) = input.enabled {
            record.enabled = enabled;
        }
        Ok(record.clone())
    }

    async fn delete_event_subscription(&self, name: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        state.begin("DeleteEventSubscription", name)?;

        state
            .event_subscriptions
            .remove(name)
            .ok_or_else(|| subscription_not_found(name))?;
        state.tags.remove(&self.arn.event_subscription(name));
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Endpoint authorizations
    // -------------------------------------------------------------------------

    async fn describe_endpoint_authorization(
        &self,
        cluster_identifier: Option<&str>,
        account: Option<&str>,
        marker: Option<String>,
    ) -> Result<Page<EndpointAuthorization>> {
        let mut state = self.state.lock().await;
        state.begin(
            "DescribeEndpointAuthorization",
            cluster_identifier.unwrap_or(""),
        )?;
        tick(&mut state.endpoint_authorizations);
        tick(&mut state.endpoints);

        let authorizations: Vec<EndpointAuthorization> = state
            .endpoint_authorizations
            .iter()
            .filter(|((cluster, grantee), _)| {
                cluster_identifier.is_none_or(|c| cluster == c)
                    && account.is_none_or(|a| grantee == a)
            })
            .map(|((cluster, grantee), t)| {
                let mut authorization = t.record.clone();
                authorization.endpoint_count = state
                    .endpoints
                    .values()
                    .filter(|e| {
                        e.record.cluster_identifier == *cluster
                            && e.record.resource_owner == *grantee
                    })
                    .count() as i64;
                authorization
            })
            .collect();
        paginate(authorizations, marker.as_deref(), state.page_size)
    }

    async fn authorize_endpoint_access(
        &self,
        input: AuthorizeEndpointAccessInput,
    ) -> Result<EndpointAuthorization> {
        let mut state = self.state.lock().await;
        state.begin("AuthorizeEndpointAccess", &input.cluster_identifier)?;

        if !state.clusters.contains_key(&input.cluster_identifier) {
            return Err(cluster_not_found(&input.cluster_identifier));
        }
        if input.account == self.arn.account_id {
            return Err(ApiFault::invalid_parameter(
                "Cannot authorize the cluster owner's own account.",
            ));
        }
        let key = (input.cluster_identifier.clone(), input.account.clone());
        if let Some(tracked) = state.endpoint_authorizations.get_mut(&key) {
            let record = &mut tracked.record;
            let added: Vec<String> = input
                .vpc_ids
                .into_iter()
                .filter(|v| !record.allowed_vpcs.contains(v))
                .collect();
            if record.status != endpoint_authorization_status::AUTHORIZED || added.is_empty() {
                return Err(ApiFault::already_exists(
                    codes::ENDPOINT_AUTHORIZATION_ALREADY_EXISTS,
                    format!(
                        "Account {} is already authorized on cluster {}.",
                        input.account, input.cluster_identifier
                    ),
                ));
            }
            record.allowed_vpcs.extend(added);
            record.allowed_all_vpcs = false;
            return Ok(record.clone());
        }

        let authorization = EndpointAuthorization {
            grantor: self.arn.account_id.clone(),
            grantee: input.account,
            cluster_identifier: input.cluster_identifier,
            status: endpoint_authorization_status::AUTHORIZED.to_string(),
            allowed_all_vpcs: input.vpc_ids.is_empty(),
            allowed_vpcs: input.vpc_ids,
            endpoint_count: 0,
        };
        state
            .endpoint_authorizations
            .insert(key, Tracked::settled(authorization.clone()));
        Ok(authorization)
    }

    async fn revoke_endpoint_access(
        &self,
        input: RevokeEndpointAccessInput,
    ) -> Result<EndpointAuthorization> {
        let mut state = self.state.lock().await;
        state.begin("RevokeEndpointAccess", &input.cluster_identifier)?;

        let key = (input.cluster_identifier.clone(), input.account.clone());
        let status = state
            .endpoint_authorizations
            .get(&key)
            .map(|t| t.record.status.clone())
            .ok_or_else(|| authorization_not_found(&input.cluster_identifier, &input.account))?;
        if status != endpoint_authorization_status::AUTHORIZED {
            return Err(ApiFault::invalid_state(
                codes::INVALID_AUTHORIZATION_STATE,
                format!(
                    "Authorization for account {} is {}.",
                    input.account, status
                ),
            ));
        }

        if !input.vpc_ids.is_empty() {
            let tracked = state
                .endpoint_authorizations
                .get_mut(&key)
                .ok_or_else(|| authorization_not_found(&input.cluster_identifier, &input.account))?;
            tracked
                .record
                .allowed_vpcs
                .retain(|v| !input.vpc_ids.contains(v));
            return Ok(tracked.record.clone());
        }

        let owned: Vec<String> = state
            .endpoints
            .values()
            .filter(|e| {
                e.record.cluster_identifier == input.cluster_identifier
                    && e.record.resource_owner == input.account
            })
            .map(|e| e.record.endpoint_name.clone())
            .collect();
        if !owned.is_empty() && !input.force {
            return Err(ApiFault::invalid_state(
                codes::INVALID_AUTHORIZATION_STATE,
                format!(
                    "Account {} still owns endpoints on cluster {}.",
                    input.account, input.cluster_identifier
                ),
            ));
        }
        for name in owned {
            state.endpoints.remove(&name);
        }

        let transition = state.removal();
        let tracked = state
            .endpoint_authorizations
            .get_mut(&key)
            .ok_or_else(|| authorization_not_found(&input.cluster_identifier, &input.account))?;
        tracked.record.status = endpoint_authorization_status::REVOKING.to_string();
        tracked.transition = transition;
        Ok(tracked.record.clone())
    }

    // -------------------------------------------------------------------------
    // HSM configurations
    // -------------------------------------------------------------------------

    async fn describe_hsm_configurations(
        &self,
        identifier: Option<&str>,
        marker: Option<String>,
    ) -> Result<Page<HsmConfiguration>> {
        let mut state = self.state.lock().await;
        state.begin("DescribeHsmConfigurations", identifier.unwrap_or(""))?;

        let configurations: Vec<HsmConfiguration> = state
            .hsm_configurations
            .values()
            .filter(|c| identifier.is_none_or(|id| c.hsm_configuration_identifier == id))
            .map(|c| {
                let mut configuration = c.clone();
                configuration.tags = state
                    .tags_for(&self.arn.hsm_configuration(&c.hsm_configuration_identifier));
                configuration
            })
            .collect();
        if let Some(id) = identifier {
            if configurations.is_empty() {
                return Err(ApiFault::not_found(
                    codes::HSM_CONFIGURATION_NOT_FOUND,
                    format!("HSM configuration {} not found.", id),
                ));
            }
        }
        paginate(configurations, marker.as_deref(), state.page_size)
    }

    async fn create_hsm_configuration(
        &self,
        input: CreateHsmConfigurationInput,
    ) -> Result<HsmConfiguration> {
        let mut state = self.state.lock().await;
        state.begin(
            "CreateHsmConfiguration",
            &input.hsm_configuration_identifier,
        )?;

        if state
            .hsm_configurations
            .contains_key(&input.hsm_configuration_identifier)
        {
            return Err(ApiFault::already_exists(
                codes::HSM_CONFIGURATION_ALREADY_EXISTS,
                format!(
                    "HSM configuration {} already exists.",
                    input.hsm_configuration_identifier
                ),
            ));
        }
        if input.hsm_partition_password.is_empty() || input.hsm_server_public_certificate.is_empty()
        {
            return Err(ApiFault::invalid_parameter(
                "HSM partition password and server certificate are required.",
            ));
        }
        reject_system_tags(&input.tags)?;

        let configuration = HsmConfiguration {
            hsm_configuration_identifier: input.hsm_configuration_identifier.clone(),
            description: input.description,
            hsm_ip_address: input.hsm_ip_address,
            hsm_partition_name: input.hsm_partition_name,
            tags: input.tags.clone(),
        };
        state.tags.insert(
            self.arn
                .hsm_configuration(&input.hsm_configuration_identifier),
            input.tags,
        );
        state.hsm_configurations.insert(
            input.hsm_configuration_identifier,
            configuration.clone(),
        );
        Ok(configuration)
    }

    async fn delete_hsm_configuration(&self, identifier: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        state.begin("DeleteHsmConfiguration", identifier)?;

        state.hsm_configurations.remove(identifier).ok_or_else(|| {
            ApiFault::not_found(
                codes::HSM_CONFIGURATION_NOT_FOUND,
                format!("HSM configuration {} not found.", identifier),
            )
        })?;
        state.tags.remove(&self.arn.hsm_configuration(identifier));
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Authentication profiles
    // -------------------------------------------------------------------------

    async fn describe_authentication_profiles(
        &self,
        name: Option<&str>,
    ) -> Result<Vec<AuthenticationProfile>> {
        let mut state = self.state.lock().await;
        state.begin("DescribeAuthenticationProfiles", name.unwrap_or(""))?;

        match name {
            Some(name) => state
                .authentication_profiles
                .get(name)
                .map(|p| vec![p.clone()])
                .ok_or_else(|| authentication_profile_not_found(name)),
            None => Ok(state.authentication_profiles.values().cloned().collect()),
        }
    }

    async fn create_authentication_profile(
        &self,
        input: AuthenticationProfile,
    ) -> Result<AuthenticationProfile> {
        let mut state = self.state.lock().await;
        state.begin(
            "CreateAuthenticationProfile",
            &input.authentication_profile_name,
        )?;

        if state
            .authentication_profiles
            .contains_key(&input.authentication_profile_name)
        {
            return Err(ApiFault::already_exists(
                codes::AUTHENTICATION_PROFILE_ALREADY_EXISTS,
                format!(
                    "Authentication profile {} already exists.",
                    input.authentication_profile_name
                ),
            ));
        }
        check_profile_content(&input.authentication_profile_content)?;
        state
            .authentication_profiles
            .insert(input.authentication_profile_name.clone(), input.clone());
        Ok(input)
    }

    async fn modify_authentication_profile(
        &self,
        input: AuthenticationProfile,
    ) -> Result<AuthenticationProfile> {
        let mut state = self.state.lock().await;
        state.begin(
            "ModifyAuthenticationProfile",
            &input.authentication_profile_name,
        )?;

        check_profile_content(&input.authentication_profile_content)?;
        let profile = state
            .authentication_profiles
            .get_mut(&input.authentication_profile_name)
            .ok_or_else(|| authentication_profile_not_found(&input.authentication_profile_name))?;
        profile.authentication_profile_content = input.authentication_profile_content;
        Ok(profile.clone())
    }

    async fn delete_authentication_profile(&self, name: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        state.begin("DeleteAuthenticationProfile", name)?;

        state
            .authentication_profiles
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| authentication_profile_not_found(name))
    }

    // -------------------------------------------------------------------------
    // Zero-ETL integrations
    // -------------------------------------------------------------------------

    async fn describe_integrations(
        &self,
        integration_arn: Option<&str>,
        marker: Option<String>,
    ) -> Result<Page<Integration>> {
        let mut state = self.state.lock().await;
        state.begin("DescribeIntegrations", integration_arn.unwrap_or(""))?;
        tick(&mut state.integrations);

        let integrations: Vec<Integration> = state
            .integrations
            .values()
            .filter(|t| integration_arn.is_none_or(|arn| t.record.integration_arn == arn))
            .map(|t| {
                let mut integration = t.record.clone();
                integration.tags = state.tags_for(&integration.integration_arn);
                integration
            })
            .collect();
        if let Some(arn) = integration_arn {
            if integrations.is_empty() {
                return Err(integration_not_found(arn));
            }
        }
        paginate(integrations, marker.as_deref(), state.page_size)
    }

    async fn create_integration(&self, input: CreateIntegrationInput) -> Result<Integration> {
        let mut state = self.state.lock().await;
        state.begin("CreateIntegration", &input.integration_name)?;

        if state
            .integrations
            .values()
            .any(|t| t.record.integration_name == input.integration_name)
        {
            return Err(ApiFault::already_exists(
                codes::INTEGRATION_ALREADY_EXISTS,
                format!("Integration {} already exists.", input.integration_name),
            ));
        }
        let target_known = state
            .clusters
            .values()
            .any(|t| t.record.cluster_namespace_arn.as_deref() == Some(input.target_arn.as_str()));
        if !target_known {
            return Err(ApiFault::not_found(
                codes::INTEGRATION_TARGET_NOT_FOUND,
                format!("Integration target {} not found.", input.target_arn),
            ));
        }
        reject_system_tags(&input.tags)?;

        let integration_arn = self
            .arn
            .integration(&uuid::Uuid::new_v4().hyphenated().to_string());
        let integration = Integration {
            integration_arn: integration_arn.clone(),
            integration_name: input.integration_name,
            source_arn: input.source_arn,
            target_arn: input.target_arn,
            status: integration_status::CREATING.to_string(),
            description: input.description,
            kms_key_id: input.kms_key_id,
            additional_encryption_context: input.additional_encryption_context,
            create_time: Some(Utc::now()),
            tags: input.tags.clone(),
        };
        state.tags.insert(integration_arn.clone(), input.tags);
        let transition = state.settle_into(integration_status::ACTIVE);
        state.integrations.insert(
            integration_arn,
            Tracked {
                record: integration.clone(),
                transition,
            },
        );
        Ok(integration)
    }

    async fn modify_integration(&self, input: ModifyIntegrationInput) -> Result<Integration> {
        let mut state = self.state.lock().await;
        state.begin("ModifyIntegration", &input.integration_arn)?;

        let transition = state.settle_into(integration_status::ACTIVE);
        let tracked = state
            .integrations
            .get_mut(&input.integration_arn)
            .ok_or_else(|| integration_not_found(&input.integration_arn))?;
        if tracked.record.status != integration_status::ACTIVE {
            return Err(ApiFault::invalid_state(
                codes::INVALID_INTEGRATION_STATE,
                format!(
                    "Integration {} is {}.",
                    input.integration_arn, tracked.record.status
                ),
            ));
        }
        if let Some(name) = input.integration_name {
            tracked.record.integration_name = name;
        }
        if let Some(description) = input.description {
            tracked.record.description = Some(description);
        }
        tracked.record.status = integration_status::MODIFYING.to_string();
        tracked.transition = transition;
        Ok(tracked.record.clone())
    }

    async fn delete_integration(&self, integration_arn: &str) -> Result<Integration> {
        let mut state = self.state.lock().await;
        state.begin("DeleteIntegration", integration_arn)?;

        let transition = state.removal();
        let tracked = state
            .integrations
            .get_mut(integration_arn)
            .ok_or_else(|| integration_not_found(integration_arn))?;
        tracked.record.status = integration_status::DELETING.to_string();
        tracked.transition = transition;
        let integration = tracked.record.clone();
        state.tags.remove(integration_arn);
        Ok(integration)
    }

    // -------------------------------------------------------------------------
    // Tags
    // -------------------------------------------------------------------------

    async fn create_tags(&self, resource_arn: &str, tags: Tags) -> Result<()> {
        let mut state = self.state.lock().await;
        state.begin("CreateTags", resource_arn)?;
        reject_system_tags(&tags)?;

        let existing = state.tags.get_mut(resource_arn).ok_or_else(|| {
            ApiFault::not_found(
                codes::RESOURCE_NOT_FOUND,
                format!("Resource {} not found.", resource_arn),
            )
        })?;
        existing.extend(tags);
        Ok(())
    }

    async fn delete_tags(&self, resource_arn: &str, tag_keys: Vec<String>) -> Result<()> {
        let mut state = self.state.lock().await;
        state.begin("DeleteTags", resource_arn)?;

        let existing = state.tags.get_mut(resource_arn).ok_or_else(|| {
            ApiFault::not_found(
                codes::RESOURCE_NOT_FOUND,
                format!("Resource {} not found.", resource_arn),
            )
        })?;
        for key in tag_keys {
            existing.remove(&key);
        }
        Ok(())
    }
}
