//! redshift-reconciler: converges declared Redshift resources with the
//! remote management API.
//!
//! The building blocks are shared by every resource kind:
//! - [`finder`] turns paginated describe calls into single-record lookups
//! - [`waiter`] polls a record until it settles or disappears
//! - [`retry`] re-issues calls rejected with a transient fault
//! - [`identity`] composes and parses compound identifiers
//! - [`reconciler`] holds one orchestrator per resource kind

pub mod config;
pub mod diff;
pub mod error;
pub mod finder;
pub mod identity;
pub mod kind;
pub mod reconciler;
pub mod retry;
pub mod tags;
pub mod waiter;

pub use config::{PollConfig, ProviderContext, ReconcilerConfig, Timeouts};
pub use error::{Error, Result};
pub use kind::ResourceKind;
pub use reconciler::{Applied, Reconciler};
