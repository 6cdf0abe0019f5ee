//! In-memory Redshift simulator.
//!
//! Records move through the same transitional statuses the service reports
//! (`creating` → `available`, `deleting` → gone, ...). A record stays in its
//! transitional status for `settle_polls` describe calls before it settles,
//! so waiters see real pending states.
//!
//! Tests steer the simulator with [`MemoryRedshift::inject_fault`] (queue a
//! fault for the next N calls of an operation) and
//! [`MemoryRedshift::serve_stale_data_share_reads`] (return a different data
//! share for the next N describe calls), and inspect what was sent through
//! the call log.

mod api;

use std::collections::{BTreeMap, HashMap, VecDeque};

use tokio::sync::Mutex;
use tracing::debug;

use crate::cluster::{
    Cluster, LoggingStatus, ModifyClusterIamRolesInput, ModifyClusterInput, aqua_configuration_status,
    aqua_status, status,
};
use crate::resources::{
    AuthenticationProfile, ClusterAssociatedToSchedule, ClusterSnapshot, ClusterSubnetGroup,
    DataShare, EndpointAccess, EndpointAuthorization, EventSubscription, HsmClientCertificate,
    HsmConfiguration, Integration, PartnerIntegration, PartnerKey, ScheduledAction,
    SnapshotSchedule, UsageLimit,
};
use crate::{ApiFault, ArnContext, Page, Result, Tags};

const DEFAULT_SETTLE_POLLS: u32 = 1;
const DEFAULT_PAGE_SIZE: usize = 100;

/// One call received by the simulator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    /// Service action name, e.g. `ModifyCluster`.
    pub operation: &'static str,
    /// Identifier the call addressed, if any.
    pub target: String,
}

/// What happens to a record once its transition settles.
#[derive(Debug, Clone)]
enum Outcome {
    Settle(&'static str),
    Remove,
}

#[derive(Debug, Clone)]
struct Transition {
    polls_left: u32,
    outcome: Outcome,
}

/// A record plus its pending status transition.
#[derive(Debug, Clone)]
struct Tracked<T> {
    record: T,
    transition: Option<Transition>,
}

impl<T> Tracked<T> {
    fn settled(record: T) -> Self {
        Self {
            record,
            transition: None,
        }
    }
}

/// Records whose status the simulator drives.
trait HasStatus {
    fn set_status(&mut self, status: &str);
}

impl HasStatus for Cluster {
    fn set_status(&mut self, status: &str) {
        self.cluster_status = status.to_string();
    }
}

impl HasStatus for EndpointAccess {
    fn set_status(&mut self, status: &str) {
        self.endpoint_status = status.to_string();
    }
}

impl HasStatus for ClusterSnapshot {
    fn set_status(&mut self, status: &str) {
        self.status = status.to_string();
    }
}

impl HasStatus for ClusterAssociatedToSchedule {
    fn set_status(&mut self, status: &str) {
        self.schedule_association_state = status.to_string();
    }
}

impl HasStatus for EventSubscription {
    fn set_status(&mut self, status: &str) {
        self.status = status.to_string();
    }
}

impl HasStatus for EndpointAuthorization {
    fn set_status(&mut self, status: &str) {
        self.status = status.to_string();
    }
}

impl HasStatus for Integration {
    fn set_status(&mut self, status: &str) {
        self.status = status.to_string();
    }
}

/// Advance every pending transition in `map` by one describe call.
fn tick<K: Ord + Clone, T: HasStatus>(map: &mut BTreeMap<K, Tracked<T>>) {
    let mut removed = Vec::new();
    for (key, tracked) in map.iter_mut() {
        let Some(transition) = tracked.transition.as_mut() else {
            continue;
        };
        if transition.polls_left > 0 {
            transition.polls_left -= 1;
            continue;
        }
        match transition.outcome {
            Outcome::Settle(status) => {
                tracked.record.set_status(status);
                tracked.transition = None;
            }
            Outcome::Remove => removed.push(key.clone()),
        }
    }
    for key in removed {
        map.remove(&key);
    }
}

/// AQUA status a cluster ends up in once `configuration` is applied.
fn resolved_aqua_status(configuration: &str) -> &'static str {
    if configuration == aqua_configuration_status::ENABLED {
        aqua_status::ENABLED
    } else {
        aqua_status::DISABLED
    }
}

/// Slice `items` into the page addressed by `marker`.
fn paginate<T>(items: Vec<T>, marker: Option<&str>, page_size: usize) -> Result<Page<T>> {
    let start = match marker {
        None => 0,
        Some(m) => m
            .parse::<usize>()
            .map_err(|_| ApiFault::invalid_parameter(format!("Invalid marker: {}", m)))?,
    };
    let total = items.len();
    let end = (start + page_size).min(total);
    let items = items
        .into_iter()
        .skip(start)
        .take(end.saturating_sub(start))
        .collect();
    let marker = (end < total).then(|| end.to_string());
    Ok(Page { items, marker })
}

struct SimState {
    settle_polls: u32,
    page_size: usize,
    clusters: BTreeMap<String, Tracked<Cluster>>,
    /// Rebooted clusters with an AQUA change still applying, and the
    /// describes left before it resolves.
    aqua_reboots: BTreeMap<String, u32>,
    logging: BTreeMap<String, LoggingStatus>,
    subnet_groups: BTreeMap<String, ClusterSubnetGroup>,
    schedules: BTreeMap<String, SnapshotSchedule>,
    /// Keyed by (schedule, cluster).
    associations: BTreeMap<(String, String), Tracked<ClusterAssociatedToSchedule>>,
    scheduled_actions: BTreeMap<String, ScheduledAction>,
    usage_limits: BTreeMap<String, UsageLimit>,
    endpoints: BTreeMap<String, Tracked<EndpointAccess>>,
    snapshots: BTreeMap<String, Tracked<ClusterSnapshot>>,
    hsm_certificates: BTreeMap<String, HsmClientCertificate>,
    partners: BTreeMap<PartnerKey, PartnerIntegration>,
    data_shares: BTreeMap<String, DataShare>,
    event_subscriptions: BTreeMap<String, Tracked<EventSubscription>>,
    /// Keyed by (cluster, grantee account).
    endpoint_authorizations: BTreeMap<(String, String), Tracked<EndpointAuthorization>>,
    hsm_configurations: BTreeMap<String, HsmConfiguration>,
    authentication_profiles: BTreeMap<String, AuthenticationProfile>,
    /// Keyed by integration ARN.
    integrations: BTreeMap<String, Tracked<Integration>>,
    /// Tags by resource ARN.
    tags: BTreeMap<String, Tags>,
    faults: HashMap<&'static str, VecDeque<ApiFault>>,
    stale_data_share_reads: u32,
    calls: Vec<Call>,
    modify_cluster_requests: Vec<ModifyClusterInput>,
    iam_role_requests: Vec<ModifyClusterIamRolesInput>,
}

impl SimState {
    fn new() -> Self {
        Self {
            settle_polls: DEFAULT_SETTLE_POLLS,
            page_size: DEFAULT_PAGE_SIZE,
            clusters: BTreeMap::new(),
            aqua_reboots: BTreeMap::new(),
            logging: BTreeMap::new(),
            subnet_groups: BTreeMap::new(),
            schedules: BTreeMap::new(),
            associations: BTreeMap::new(),
            scheduled_actions: BTreeMap::new(),
            usage_limits: BTreeMap::new(),
            endpoints: BTreeMap::new(),
            snapshots: BTreeMap::new(),
            hsm_certificates: BTreeMap::new(),
            partners: BTreeMap::new(),
            data_shares: BTreeMap::new(),
            event_subscriptions: BTreeMap::new(),
            endpoint_authorizations: BTreeMap::new(),
            hsm_configurations: BTreeMap::new(),
            authentication_profiles: BTreeMap::new(),
            integrations: BTreeMap::new(),
            tags: BTreeMap::new(),
            faults: HashMap::new(),
            stale_data_share_reads: 0,
            calls: Vec::new(),
            modify_cluster_requests: Vec::new(),
            iam_role_requests: Vec::new(),
        }
    }

    /// Record the call and pop an injected fault for it, if any.
    fn begin(&mut self, operation: &'static str, target: &str) -> Result<()> {
        debug!("Simulated {} {}", operation, target);
        self.calls.push(Call {
            operation,
            target: target.to_string(),
        });
        if let Some(fault) = self
            .faults
            .get_mut(operation)
            .and_then(|queue| queue.pop_front())
        {
            debug!("Injecting fault into {}: {}", operation, fault);
            return Err(fault);
        }
        Ok(())
    }

    /// A transition that settles on `status` after `settle_polls` describes.
    fn settle_into(&self, status: &'static str) -> Option<Transition> {
        Some(Transition {
            polls_left: self.settle_polls,
            outcome: Outcome::Settle(status),
        })
    }

    fn removal(&self) -> Option<Transition> {
        Some(Transition {
            polls_left: self.settle_polls,
            outcome: Outcome::Remove,
        })
    }

    /// Resolve AQUA changes once the reboot that picked them up finished.
    fn tick_aqua(&mut self) {
        let mut resolved = Vec::new();
        for (id, polls_left) in self.aqua_reboots.iter_mut() {
            let Some(tracked) = self.clusters.get(id) else {
                resolved.push(id.clone());
                continue;
            };
            if tracked.record.cluster_status != status::AVAILABLE {
                continue;
            }
            if *polls_left > 0 {
                *polls_left -= 1;
                continue;
            }
            resolved.push(id.clone());
        }
        for id in resolved {
            self.aqua_reboots.remove(&id);
            if let Some(aqua) = self
                .clusters
                .get_mut(&id)
                .and_then(|t| t.record.aqua_configuration.as_mut())
            {
                aqua.aqua_status = resolved_aqua_status(&aqua.aqua_configuration_status).to_string();
            }
        }
    }

    fn tags_for(&self, arn: &str) -> Tags {
        self.tags.get(arn).cloned().unwrap_or_default()
    }
}

/// In-memory implementation of [`crate::RedshiftApi`].
pub struct MemoryRedshift {
    arn: ArnContext,
    state: Mutex<SimState>,
}

impl MemoryRedshift {
    pub fn new(arn: ArnContext) -> Self {
        Self {
            arn,
            state: Mutex::new(SimState::new()),
        }
    }

    /// Number of describe calls a record stays in a transitional status.
    pub fn with_settle_polls(mut self, polls: u32) -> Self {
        self.state.get_mut().settle_polls = polls;
        self
    }

    /// Maximum number of records per describe page.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.state.get_mut().page_size = page_size.max(1);
        self
    }

    pub fn arn_context(&self) -> &ArnContext {
        &self.arn
    }

    /// Fail the next `times` calls of `operation` with `fault`.
    pub async fn inject_fault(&self, operation: &'static str, fault: ApiFault, times: usize) {
        let mut state = self.state.lock().await;
        let queue = state.faults.entry(operation).or_default();
        for _ in 0..times {
            queue.push_back(fault.clone());
        }
    }

    /// Make the next `reads` data share describes return a different share
    /// than the one asked for, as a lagging replica would.
    pub async fn serve_stale_data_share_reads(&self, reads: u32) {
        self.state.lock().await.stale_data_share_reads = reads;
    }

    /// Register a data share produced in `producer_namespace`.
    ///
    /// Data shares are created through SQL, not the management API, so
    /// tests seed them directly.
    pub async fn seed_data_share(&self, producer_namespace: &str, name: &str) -> String {
        let data_share_arn = self.arn.data_share(producer_namespace, name);
        let producer_arn = self.arn.redshift("namespace", producer_namespace);
        let mut state = self.state.lock().await;
        state.data_shares.insert(
            data_share_arn.clone(),
            DataShare {
                data_share_arn: data_share_arn.clone(),
                producer_arn,
                allow_publicly_accessible_consumers: false,
                associations: Vec::new(),
            },
        );
        data_share_arn
    }

    /// Every call received so far, oldest first.
    pub async fn calls(&self) -> Vec<Call> {
        self.state.lock().await.calls.clone()
    }

    /// Number of calls received for `operation`.
    pub async fn call_count(&self, operation: &str) -> usize {
        self.state
            .lock()
            .await
            .calls
            .iter()
            .filter(|c| c.operation == operation)
            .count()
    }

    /// `ModifyCluster` requests received so far.
    pub async fn modify_cluster_requests(&self) -> Vec<ModifyClusterInput> {
        self.state.lock().await.modify_cluster_requests.clone()
    }

    /// `ModifyClusterIamRoles` requests received so far.
    pub async fn iam_role_requests(&self) -> Vec<ModifyClusterIamRolesInput> {
        self.state.lock().await.iam_role_requests.clone()
    }

    /// Current tags of the resource with `arn`, bypassing the call log.
    pub async fn tags_of(&self, arn: &str) -> Tags {
        self.state.lock().await.tags_for(arn)
    }

    /// Overwrite the availability zone relocation status of a cluster, as
    /// a newer service release reporting an unknown value would.
    pub async fn set_relocation_status(&self, cluster_identifier: &str, value: &str) {
        if let Some(tracked) = self.state.lock().await.clusters.get_mut(cluster_identifier) {
            tracked.record.availability_zone_relocation_status = Some(value.to_string());
        }
    }

    /// Flip an event subscription into `status`, as the service does when
    /// it loses access to the SNS topic.
    pub async fn set_event_subscription_status(&self, name: &str, status: &str) {
        if let Some(tracked) = self.state.lock().await.event_subscriptions.get_mut(name) {
            tracked.record.status = status.to_string();
            tracked.transition = None;
        }
    }

    /// Whether a cluster record exists, bypassing status transitions.
    pub async fn has_cluster(&self, cluster_identifier: &str) -> bool {
        self.state
            .lock()
            .await
            .clusters
            .contains_key(cluster_identifier)
    }
}
