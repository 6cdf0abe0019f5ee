//! Polling a record until it reaches a terminal state.

use std::future::Future;
use std::time::Duration;

use redshift_api::cluster::Cluster;
use redshift_api::resources::{
    ClusterAssociatedToSchedule, ClusterSnapshot, EndpointAccess, EndpointAuthorization,
    EventSubscription, Integration,
};
use tokio::time::{Instant, sleep};
use tracing::{debug, warn};

use crate::config::PollConfig;
use crate::error::{Error, Result};
use crate::kind::ResourceKind;

/// Records that report a status string.
pub trait Stateful {
    fn state(&self) -> &str;
}

impl Stateful for Cluster {
    fn state(&self) -> &str {
        &self.cluster_status
    }
}

impl Stateful for EndpointAccess {
    fn state(&self) -> &str {
        &self.endpoint_status
    }
}

impl Stateful for ClusterSnapshot {
    fn state(&self) -> &str {
        &self.status
    }
}

impl Stateful for ClusterAssociatedToSchedule {
    fn state(&self) -> &str {
        &self.schedule_association_state
    }
}

impl Stateful for EventSubscription {
    fn state(&self) -> &str {
        &self.status
    }
}

impl Stateful for EndpointAuthorization {
    fn state(&self) -> &str {
        &self.status
    }
}

impl Stateful for Integration {
    fn state(&self) -> &str {
        &self.status
    }
}

const NOT_FOUND_STATE: &str = "(not found)";
const VISIBLE_STATE: &str = "visible";

/// Any record that was found at all.
struct Visible<T>(T);

impl<T> Stateful for Visible<T> {
    fn state(&self) -> &str {
        VISIBLE_STATE
    }
}

/// Waits for a polled record to move from a pending state into a target
/// state.
///
/// A read reporting not-found is success when waiting for removal and
/// still pending otherwise. A state listed as failure, or a state in
/// neither list while `pending` is non-empty, ends the wait with
/// [`Error::WaitFailure`]. Running past the timeout yields
/// [`Error::WaitTimeout`].
#[derive(Debug, Clone)]
pub struct StateWaiter<'a> {
    kind: ResourceKind,
    id: &'a str,
    pending: &'a [&'a str],
    target: &'a [&'a str],
    failure: &'a [&'a str],
    timeout: Duration,
    poll: PollConfig,
}

impl<'a> StateWaiter<'a> {
    pub fn new(kind: ResourceKind, id: &'a str, poll: &PollConfig) -> Self {
        Self {
            kind,
            id,
            pending: &[],
            target: &[],
            failure: &[],
            timeout: Duration::ZERO,
            poll: poll.clone(),
        }
    }

    pub fn pending(mut self, states: &'a [&'a str]) -> Self {
        self.pending = states;
        self
    }

    pub fn target(mut self, states: &'a [&'a str]) -> Self {
        self.target = states;
        self
    }

    pub fn failure(mut self, states: &'a [&'a str]) -> Self {
        self.failure = states;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Poll until the record reaches a target state and return it.
    pub async fn until_state<T, F, Fut>(&self, read: F) -> Result<T>
    where
        T: Stateful,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        match self.run(read, false).await? {
            Some(record) => Ok(record),
            // run() only yields None when removal counts as success.
            None => Err(self.timed_out(NOT_FOUND_STATE, Duration::ZERO)),
        }
    }

    /// Poll until the record disappears.
    pub async fn until_gone<T, F, Fut>(&self, read: F) -> Result<()>
    where
        T: Stateful,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.run(read, true).await.map(|_| ())
    }

    /// Poll until a freshly created record becomes readable and return it.
    /// Only not-found answers are retried; the configured state lists are
    /// ignored.
    pub async fn until_found<T, F, Fut>(&self, mut read: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let waiter = StateWaiter {
            pending: &[],
            target: &[VISIBLE_STATE],
            failure: &[],
            ..self.clone()
        };
        let found = waiter
            .run(
                move || {
                    let fut = read();
                    async move { fut.await.map(Visible) }
                },
                false,
            )
            .await?;
        match found {
            Some(Visible(record)) => Ok(record),
            None => Err(waiter.timed_out(NOT_FOUND_STATE, Duration::ZERO)),
        }
    }

    async fn run<T, F, Fut>(&self, mut read: F, gone_is_success: bool) -> Result<Option<T>>
    where
        T: Stateful,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let started = Instant::now();
        let deadline = started + self.timeout;
        let mut interval = self.poll.first_interval();
        let mut last_state = String::new();

        if !self.poll.delay.is_zero() {
            sleep(self.poll.delay).await;
        }

        loop {
            match read().await {
                Ok(record) => {
                    let state = record.state();
                    debug!(
                        kind = %self.kind,
                        id = self.id,
                        state,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Polled state"
                    );
                    if self.target.contains(&state) {
                        return Ok(Some(record));
                    }
                    if self.failure.contains(&state) {
                        return Err(self.failed(state, format!("reached failure state {:?}", state)));
                    }
                    if !self.pending.is_empty() && !self.pending.contains(&state) {
                        return Err(self.failed(state, format!("unexpected state {:?}", state)));
                    }
                    last_state = state.to_string();
                }
                Err(e) if e.is_not_found() => {
                    debug!(kind = %self.kind, id = self.id, "Polled record not found");
                    if gone_is_success {
                        return Ok(None);
                    }
                    last_state = NOT_FOUND_STATE.to_string();
                }
                Err(e) => return Err(e),
            }

            let now = Instant::now();
            if now >= deadline {
                let elapsed = now.duration_since(started);
                warn!(
                    "Timed out after {:?} waiting for {} {} (last state {:?})",
                    elapsed, self.kind, self.id, last_state
                );
                return Err(self.timed_out(&last_state, elapsed));
            }
            sleep(interval.min(deadline - now)).await;
            interval = self.poll.next_interval(interval);
        }
    }

    fn target_description(&self) -> String {
        if self.target.is_empty() {
            "deleted".to_string()
        } else {
            self.target.join("|")
        }
    }

    fn failed(&self, state: &str, reason: String) -> Error {
        Error::WaitFailure {
            kind: self.kind,
            id: self.id.to_string(),
            target: self.target_description(),
            state: state.to_string(),
            reason,
        }
    }

    fn timed_out(&self, last_state: &str, elapsed: Duration) -> Error {
        Error::WaitTimeout {
            kind: self.kind,
            id: self.id.to_string(),
            target: self.target_description(),
            last_state: last_state.to_string(),
            elapsed,
        }
    }
}
