//! Reconciliation error types.

use std::time::Duration;

use redshift_api::{ApiFault, FaultKind};
use thiserror::Error;

use crate::kind::ResourceKind;

/// Errors surfaced by reconcilers.
///
/// Every variant names the resource kind and the identifier (or the best
/// partial key available) so a host can report it without extra context.
#[derive(Debug, Error)]
pub enum Error {
    /// The lookup matched no record.
    #[error("{kind} ({id}) not found: {query}")]
    NotFound {
        kind: ResourceKind,
        id: String,
        query: String,
    },

    /// The lookup matched more than one record.
    #[error("{kind} ({id}): lookup matched {count} records, expected exactly one")]
    TooManyResults {
        kind: ResourceKind,
        id: String,
        count: usize,
    },

    #[error("{kind}: malformed identifier {id:?}: {reason}")]
    MalformedIdentifier {
        kind: ResourceKind,
        id: String,
        reason: String,
    },

    /// The remote service rejected a call. The fault is kept verbatim.
    #[error("{action} {kind} ({id}): {fault}")]
    Api {
        kind: ResourceKind,
        id: String,
        action: &'static str,
        #[source]
        fault: ApiFault,
    },

    #[error(
        "waiting for {kind} ({id}) to reach {target}: timeout after {elapsed:?}, last state {last_state:?}"
    )]
    WaitTimeout {
        kind: ResourceKind,
        id: String,
        target: String,
        last_state: String,
        elapsed: Duration,
    },

    #[error("waiting for {kind} ({id}) to reach {target}: {reason}")]
    WaitFailure {
        kind: ResourceKind,
        id: String,
        target: String,
        state: String,
        reason: String,
    },

    #[error("{kind} ({id}): invalid configuration: {reason}")]
    InvalidConfig {
        kind: ResourceKind,
        id: String,
        reason: String,
    },

    /// An in-place update touched an attribute that requires replacement.
    #[error("{kind} ({id}): changing {attribute} requires replacing the resource")]
    ForceNew {
        kind: ResourceKind,
        id: String,
        attribute: &'static str,
    },

    #[error("{kind} ({id}): unexpected {attribute} value {value:?}")]
    UnexpectedValue {
        kind: ResourceKind,
        id: String,
        attribute: &'static str,
        value: String,
    },
}

impl Error {
    pub fn api(kind: ResourceKind, id: impl Into<String>, action: &'static str, fault: ApiFault) -> Self {
        Error::Api {
            kind,
            id: id.into(),
            action,
            fault,
        }
    }

    pub fn invalid_config(kind: ResourceKind, id: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidConfig {
            kind,
            id: id.into(),
            reason: reason.into(),
        }
    }

    /// Fault kind of a remote rejection, if this error is one.
    pub fn fault_kind(&self) -> Option<FaultKind> {
        match self {
            Error::Api { fault, .. } => Some(fault.kind),
            _ => None,
        }
    }

    /// True when the addressed record does not exist, whether the finder
    /// came back empty or a call was rejected with a not-found fault.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::NotFound { .. } => true,
            Error::Api { fault, .. } => fault.kind == FaultKind::NotFound,
            _ => false,
        }
    }

    /// True when re-invoking the whole operation later may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::WaitTimeout { .. } => true,
            Error::Api { fault, .. } => match fault.kind {
                FaultKind::InvalidState | FaultKind::RolePropagation | FaultKind::Unavailable => {
                    true
                }
                FaultKind::NotFound
                | FaultKind::AlreadyExists
                | FaultKind::InvalidParameter
                | FaultKind::AccessDenied
                | FaultKind::QuotaExceeded
                | FaultKind::Other => false,
            },
            Error::NotFound { .. }
            | Error::TooManyResults { .. }
            | Error::MalformedIdentifier { .. }
            | Error::WaitFailure { .. }
            | Error::InvalidConfig { .. }
            | Error::ForceNew { .. }
            | Error::UnexpectedValue { .. } => false,
        }
    }
}

/// Result type for reconciler operations.
pub type Result<T> = std::result::Result<T, Error>;
