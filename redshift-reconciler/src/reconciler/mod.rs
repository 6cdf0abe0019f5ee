//! Reconcilers for the different resource kinds.
//!
//! Each reconciler converges one remote resource towards its desired
//! configuration. Every entry point is idempotent on its own: create fails
//! loudly on an existing resource, read reports out-of-band deletion as
//! `None`, update touches only changed attributes and delete treats an
//! already absent resource as success.

pub mod authentication_profile;
pub mod cluster;
pub mod cluster_snapshot;
pub mod data_share_authorization;
pub mod data_share_consumer_association;
pub mod endpoint_access;
pub mod endpoint_authorization;
pub mod event_subscription;
pub mod hsm_client_certificate;
pub mod hsm_configuration;
pub mod integration;
pub mod partner;
pub mod scheduled_action;
pub mod snapshot_schedule;
pub mod snapshot_schedule_association;
pub mod subnet_group;
pub mod usage_limit;

use std::future::Future;

use async_trait::async_trait;
use redshift_api::{RedshiftApi, Tags};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::ProviderContext;
use crate::error::{Error, Result};
use crate::kind::ResourceKind;
use crate::tags;
use crate::waiter::StateWaiter;

pub use authentication_profile::AuthenticationProfileReconciler;
pub use cluster::ClusterReconciler;
pub use cluster_snapshot::ClusterSnapshotReconciler;
pub use data_share_authorization::DataShareAuthorizationReconciler;
pub use data_share_consumer_association::DataShareConsumerAssociationReconciler;
pub use endpoint_access::EndpointAccessReconciler;
pub use endpoint_authorization::EndpointAuthorizationReconciler;
pub use event_subscription::EventSubscriptionReconciler;
pub use hsm_client_certificate::HsmClientCertificateReconciler;
pub use hsm_configuration::HsmConfigurationReconciler;
pub use integration::IntegrationReconciler;
pub use partner::PartnerReconciler;
pub use scheduled_action::ScheduledActionReconciler;
pub use snapshot_schedule::SnapshotScheduleReconciler;
pub use snapshot_schedule_association::SnapshotScheduleAssociationReconciler;
pub use subnet_group::SubnetGroupReconciler;
pub use usage_limit::UsageLimitReconciler;

/// Identifier and projected state of a resource after create or import.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Applied<S> {
    pub id: String,
    pub state: S,
}

/// Trait for resource reconcilers.
#[async_trait]
pub trait Reconciler: Send + Sync {
    /// Desired configuration, validated by the caller.
    type Config: Send + Sync;
    /// Remote state projected after every successful read.
    type State: Send;

    fn kind(&self) -> ResourceKind;

    /// Create the resource, wait for it to settle and read it back.
    async fn create(&self, config: &Self::Config) -> Result<Applied<Self::State>>;

    /// Refresh the resource. `None` means it was deleted out of band and
    /// the caller should clear its identifier.
    async fn read(&self, id: &str) -> Result<Option<Self::State>>;

    /// Converge an existing resource from `old` to `new`.
    async fn update(&self, id: &str, old: &Self::Config, new: &Self::Config)
    -> Result<Self::State>;

    /// Delete the resource. Deleting an absent resource succeeds.
    async fn delete(&self, id: &str, config: &Self::Config) -> Result<()>;

    /// Parse a user supplied identifier and read the resource once.
    async fn import(&self, raw_id: &str) -> Result<Applied<Self::State>>;
}

/// Turn a not-found read into `None`.
pub(crate) fn absent_on_not_found<T>(
    kind: ResourceKind,
    id: &str,
    result: Result<T>,
) -> Result<Option<T>> {
    match result {
        Ok(state) => Ok(Some(state)),
        Err(e) if e.is_not_found() => {
            warn!("{} ({}) not found, removing from state", kind, id);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Read back a resource the service just created. Reads that still miss it
/// are retried until the eventual consistency timeout elapses.
pub(crate) async fn read_after_create<T, F, Fut>(
    ctx: &ProviderContext,
    kind: ResourceKind,
    id: &str,
    read: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    StateWaiter::new(kind, id, ctx.poll())
        .timeout(ctx.timeouts().eventual_consistency)
        .until_found(read)
        .await
}

/// Treat a not-found delete as already converged.
pub(crate) fn ignore_not_found(kind: ResourceKind, id: &str, result: Result<()>) -> Result<()> {
    match result {
        Err(e) if e.is_not_found() => {
            info!("{} ({}) already deleted", kind, id);
            Ok(())
        }
        other => other,
    }
}

/// Refuse an in-place update when a replacement attribute changed.
///
/// `changes` pairs attribute names with whether they differ.
pub(crate) fn ensure_in_place(
    kind: ResourceKind,
    id: &str,
    changes: &[(&'static str, bool)],
) -> Result<()> {
    match changes.iter().find(|(_, changed)| *changed) {
        Some((attribute, _)) => Err(Error::ForceNew {
            kind,
            id: id.to_string(),
            attribute: *attribute,
        }),
        None => Ok(()),
    }
}

/// Converge the tags of `arn` from the `old` to the `new` configuration.
pub(crate) async fn update_tags(
    client: &dyn RedshiftApi,
    ctx: &ProviderContext,
    kind: ResourceKind,
    id: &str,
    arn: &str,
    old: &Tags,
    new: &Tags,
) -> Result<()> {
    let changes = tags::diff(&ctx.effective_tags(old), &ctx.effective_tags(new));
    if changes.is_empty() {
        return Ok(());
    }
    info!("Updating tags of {} {}", kind, id);
    tags::apply(client, kind, id, arn, changes).await
}
