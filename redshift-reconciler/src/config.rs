//! Reconciler configuration.
//!
//! Timeouts and poll settings are loaded from JSON; every field has a
//! default matching the service's documented provisioning times.
//!
//! ```json
//! {
//!   "timeouts": { "cluster_create": "90m", "iam_propagation": "3m" },
//!   "poll": { "min_interval": "5s" }
//! }
//! ```

use std::path::Path;
use std::time::Duration;

use redshift_api::{ArnContext, Tags};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tags;

const MINUTE: u64 = 60;

/// Shortest sleep between two polls, whatever the configuration says.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid poll settings: {0}")]
    InvalidPoll(String),
}

/// Root reconciler configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ReconcilerConfig {
    pub timeouts: Timeouts,
    pub poll: PollConfig,
}

impl ReconcilerConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config: ReconcilerConfig =
            serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: path.display().to_string(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll.min_interval.is_zero() {
            return Err(ConfigError::InvalidPoll(
                "min_interval must be greater than zero".to_string(),
            ));
        }
        if self.poll.max_interval < self.poll.min_interval {
            return Err(ConfigError::InvalidPoll(format!(
                "max_interval {:?} is shorter than min_interval {:?}",
                self.poll.max_interval, self.poll.min_interval
            )));
        }
        Ok(())
    }
}

/// Per-operation deadlines.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Timeouts {
    #[serde(with = "humantime_serde")]
    pub cluster_create: Duration,

    #[serde(with = "humantime_serde")]
    pub cluster_update: Duration,

    #[serde(with = "humantime_serde")]
    pub cluster_delete: Duration,

    /// How long calls rejected because the cluster is busy are retried.
    #[serde(with = "humantime_serde")]
    pub invalid_state_retry: Duration,

    /// How long calls rejected because an IAM role is not yet trusted are
    /// retried.
    #[serde(with = "humantime_serde")]
    pub iam_propagation: Duration,

    /// How long a freshly created record may stay invisible or stale.
    #[serde(with = "humantime_serde")]
    pub eventual_consistency: Duration,

    #[serde(with = "humantime_serde")]
    pub endpoint_create: Duration,

    #[serde(with = "humantime_serde")]
    pub endpoint_update: Duration,

    #[serde(with = "humantime_serde")]
    pub endpoint_delete: Duration,

    #[serde(with = "humantime_serde")]
    pub schedule_association: Duration,

    #[serde(with = "humantime_serde")]
    pub snapshot_create: Duration,

    #[serde(with = "humantime_serde")]
    pub integration_create: Duration,

    #[serde(with = "humantime_serde")]
    pub integration_update: Duration,

    #[serde(with = "humantime_serde")]
    pub integration_delete: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            cluster_create: Duration::from_secs(75 * MINUTE),
            cluster_update: Duration::from_secs(75 * MINUTE),
            cluster_delete: Duration::from_secs(40 * MINUTE),
            invalid_state_retry: Duration::from_secs(15 * MINUTE),
            iam_propagation: Duration::from_secs(2 * MINUTE),
            eventual_consistency: Duration::from_secs(2 * MINUTE),
            endpoint_create: Duration::from_secs(75 * MINUTE),
            endpoint_update: Duration::from_secs(75 * MINUTE),
            endpoint_delete: Duration::from_secs(75 * MINUTE),
            schedule_association: Duration::from_secs(75 * MINUTE),
            snapshot_create: Duration::from_secs(75 * MINUTE),
            integration_create: Duration::from_secs(30 * MINUTE),
            integration_update: Duration::from_secs(30 * MINUTE),
            integration_delete: Duration::from_secs(30 * MINUTE),
        }
    }
}

/// Polling cadence shared by waiters and retry loops.
///
/// The first poll happens after `delay`; subsequent polls back off
/// exponentially from `min_interval` up to `max_interval`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PollConfig {
    #[serde(with = "humantime_serde")]
    pub delay: Duration,

    #[serde(with = "humantime_serde")]
    pub min_interval: Duration,

    #[serde(with = "humantime_serde")]
    pub max_interval: Duration,
}

impl PollConfig {
    /// Sleep before the second poll. Never below [`MIN_POLL_INTERVAL`].
    pub fn first_interval(&self) -> Duration {
        self.min_interval.max(MIN_POLL_INTERVAL)
    }

    /// Interval following `current`. Never below [`MIN_POLL_INTERVAL`].
    pub fn next_interval(&self, current: Duration) -> Duration {
        current
            .saturating_mul(2)
            .min(self.max_interval)
            .max(MIN_POLL_INTERVAL)
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            delay: Duration::ZERO,
            min_interval: Duration::from_secs(10),
            max_interval: Duration::from_secs(30),
        }
    }
}

/// Provider-level settings handed to every reconciler.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ProviderContext {
    pub arn: ArnContext,
    /// Tags applied to every taggable resource; resource tags win.
    pub default_tags: Tags,
    /// Tag key prefixes hidden from comparison and projection.
    pub ignore_tag_prefixes: Vec<String>,
    pub config: ReconcilerConfig,
}

impl ProviderContext {
    pub fn new(arn: ArnContext, config: ReconcilerConfig) -> Self {
        Self {
            arn,
            default_tags: Tags::new(),
            ignore_tag_prefixes: Vec::new(),
            config,
        }
    }

    pub fn with_default_tags(mut self, default_tags: Tags) -> Self {
        self.default_tags = default_tags;
        self
    }

    pub fn with_ignore_tag_prefixes(mut self, prefixes: Vec<String>) -> Self {
        self.ignore_tag_prefixes = prefixes;
        self
    }

    /// Tags to send for a resource configured with `resource_tags`.
    pub fn effective_tags(&self, resource_tags: &Tags) -> Tags {
        tags::ignore_system(
            &tags::merge(&self.default_tags, resource_tags),
            &self.ignore_tag_prefixes,
        )
    }

    /// Tags as projected into state.
    pub fn visible_tags(&self, remote: &Tags) -> Tags {
        tags::ignore_system(remote, &self.ignore_tag_prefixes)
    }

    pub fn timeouts(&self) -> &Timeouts {
        &self.config.timeouts
    }

    pub fn poll(&self) -> &PollConfig {
        &self.config.poll
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ReconcilerConfig::default();
        assert_eq!(config.timeouts.cluster_create, Duration::from_secs(4500));
        assert_eq!(config.timeouts.cluster_delete, Duration::from_secs(2400));
        assert_eq!(config.timeouts.invalid_state_retry, Duration::from_secs(900));
        assert_eq!(config.timeouts.iam_propagation, Duration::from_secs(120));
        assert_eq!(config.poll.min_interval, Duration::from_secs(10));
        assert_eq!(config.poll.max_interval, Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"timeouts": {{"cluster_create": "90m"}}, "poll": {{"min_interval": "5s"}}}}"#
        )
        .unwrap();

        let config = ReconcilerConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.timeouts.cluster_create, Duration::from_secs(90 * 60));
        assert_eq!(config.timeouts.cluster_update, Duration::from_secs(75 * 60));
        assert_eq!(config.poll.min_interval, Duration::from_secs(5));
        assert_eq!(config.poll.max_interval, Duration::from_secs(30));
    }

    #[test]
    fn test_inverted_intervals_are_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"poll": {{"min_interval": "1m", "max_interval": "10s"}}}}"#
        )
        .unwrap();

        let err = ReconcilerConfig::from_json_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPoll(_)));
    }

    #[test]
    fn test_backoff_is_capped() {
        let poll = PollConfig::default();
        assert_eq!(
            poll.next_interval(Duration::from_secs(10)),
            Duration::from_secs(20)
        );
        assert_eq!(
            poll.next_interval(Duration::from_secs(20)),
            Duration::from_secs(30)
        );
    }

    #[test]
    fn test_zero_intervals_are_floored() {
        let poll = PollConfig {
            delay: Duration::ZERO,
            min_interval: Duration::ZERO,
            max_interval: Duration::ZERO,
        };
        assert_eq!(poll.first_interval(), MIN_POLL_INTERVAL);
        assert_eq!(poll.next_interval(Duration::ZERO), MIN_POLL_INTERVAL);
        assert_eq!(poll.next_interval(poll.first_interval()), MIN_POLL_INTERVAL);
    }

    #[test]
    fn test_effective_tags_merge_defaults() {
        let ctx = ProviderContext::default().with_default_tags(Tags::from([
            ("team".to_string(), "data".to_string()),
            ("env".to_string(), "dev".to_string()),
        ]));
        let tags = ctx.effective_tags(&Tags::from([("env".to_string(), "prod".to_string())]));
        assert_eq!(tags["env"], "prod");
        assert_eq!(tags["team"], "data");
    }
}
