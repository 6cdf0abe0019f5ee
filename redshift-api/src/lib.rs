//! Redshift management API contract.
//!
//! The reconciler talks to the remote service exclusively through the
//! [`RedshiftApi`] trait defined here. Every call either returns a record
//! (or a page of records) or an [`ApiFault`] carrying a typed [`FaultKind`]
//! next to the verbatim code and message the service sent.
//!
//! [`MemoryRedshift`] is an in-memory implementation of the same contract.
//! It models asynchronous status transitions, pagination, injected faults
//! and stale reads, and records every call it receives.

pub mod arn;
mod client;
pub mod cluster;
pub mod fault;
mod page;
pub mod resources;
pub mod sim;

pub use arn::ArnContext;
pub use client::RedshiftApi;
pub use fault::{ApiFault, FaultKind, Result};
pub use page::Page;
pub use sim::MemoryRedshift;

use std::collections::BTreeMap;

/// Resource tags as returned by and sent to the service.
pub type Tags = BTreeMap<String, String>;
