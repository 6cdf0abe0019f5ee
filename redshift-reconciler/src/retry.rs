//! Retrying calls the service rejects with a transient fault class.

use std::future::Future;
use std::time::Duration;

use redshift_api::FaultKind;
use tokio::time::{Instant, sleep};
use tracing::info;

use crate::config::PollConfig;
use crate::error::{Error, Result};
use crate::kind::ResourceKind;

/// Retries one remote call while it fails with a given fault kind.
#[derive(Debug, Clone)]
pub struct RetryWhen<'a> {
    kind: ResourceKind,
    id: &'a str,
    action: &'static str,
    fault: FaultKind,
    timeout: Duration,
    poll: &'a PollConfig,
}

impl<'a> RetryWhen<'a> {
    /// `action` is the verb used in errors, e.g. `creating`.
    pub fn new(
        kind: ResourceKind,
        id: &'a str,
        action: &'static str,
        fault: FaultKind,
        timeout: Duration,
        poll: &'a PollConfig,
    ) -> Self {
        Self {
            kind,
            id,
            action,
            fault,
            timeout,
            poll,
        }
    }

    /// Run `call` until it succeeds, fails with a different fault, or the
    /// timeout elapses. The last fault is returned verbatim.
    pub async fn run<T, F, Fut>(&self, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = redshift_api::Result<T>>,
    {
        let deadline = Instant::now() + self.timeout;
        let mut interval = self.poll.first_interval();
        loop {
            let fault = match call().await {
                Ok(value) => return Ok(value),
                Err(fault) => fault,
            };
            let now = Instant::now();
            if fault.kind != self.fault || now >= deadline {
                return Err(Error::api(self.kind, self.id, self.action, fault));
            }
            info!(
                "Retrying {} {} {} after {}",
                self.action, self.kind, self.id, fault
            );
            sleep(interval.min(deadline - now)).await;
            interval = self.poll.next_interval(interval);
        }
    }
}
