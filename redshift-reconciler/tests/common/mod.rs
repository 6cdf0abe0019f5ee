//! Shared fixtures for reconciler integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use redshift_api::{ArnContext, MemoryRedshift, RedshiftApi};
use redshift_reconciler::reconciler::cluster::ClusterConfig;
use redshift_reconciler::{PollConfig, ProviderContext, ReconcilerConfig, Timeouts};

/// Simulator plus the provider context every reconciler is built with.
pub struct Harness {
    pub sim: Arc<MemoryRedshift>,
    pub ctx: Arc<ProviderContext>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_sim(MemoryRedshift::new(ArnContext::default()))
    }

    pub fn with_sim(sim: MemoryRedshift) -> Self {
        let ctx = ProviderContext::new(sim.arn_context().clone(), fast_config());
        Self {
            sim: Arc::new(sim),
            ctx: Arc::new(ctx),
        }
    }

    pub fn client(&self) -> Arc<dyn RedshiftApi> {
        self.sim.clone()
    }

    /// Build a reconciler from the shared client and context.
    pub fn reconciler<R>(&self, new: fn(Arc<dyn RedshiftApi>, Arc<ProviderContext>) -> R) -> R {
        new(self.client(), self.ctx.clone())
    }
}

/// Millisecond timeouts and poll intervals.
pub fn fast_config() -> ReconcilerConfig {
    let timeout = Duration::from_secs(2);
    ReconcilerConfig {
        timeouts: Timeouts {
            cluster_create: timeout,
            cluster_update: timeout,
            cluster_delete: timeout,
            invalid_state_retry: timeout,
            iam_propagation: timeout,
            eventual_consistency: timeout,
            endpoint_create: timeout,
            endpoint_update: timeout,
            endpoint_delete: timeout,
            schedule_association: timeout,
            snapshot_create: timeout,
            integration_create: timeout,
            integration_update: timeout,
            integration_delete: timeout,
        },
        poll: PollConfig {
            delay: Duration::ZERO,
            min_interval: Duration::from_millis(1),
            max_interval: Duration::from_millis(5),
        },
    }
}

pub fn cluster_config(id: &str) -> ClusterConfig {
    ClusterConfig {
        cluster_identifier: id.to_string(),
        node_type: "ra3.xlplus".to_string(),
        number_of_nodes: 2,
        master_username: Some("admin".to_string()),
        master_password: Some("Sup3rSecret".to_string()),
        skip_final_snapshot: true,
        ..Default::default()
    }
}
