//! Pipeline configuration.
//!
//! Every tunable is a `nutype` newtype validated at construction, so a
//! [`PipelineConfig`] that exists is always usable. Configurations can be
//! built in code or parsed from JSON with [`PipelineConfig::from_json`].

use crate::errors::ConfigError;
use nutype::nutype;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Idle interval between store polls in milliseconds.
///
/// Validated to be between 10ms and one minute.
#[nutype(
    validate(greater_or_equal = 10, less_or_equal = 60_000),
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Into,
        Default,
        Serialize,
        Deserialize
    ),
    default = 500
)]
pub struct PollIntervalMs(u64);

impl PollIntervalMs {
    /// Convert to Duration for use with tokio timers.
    pub fn as_duration(self) -> Duration {
        Duration::from_millis(self.into())
    }
}

/// Maximum number of events read per poll.
#[nutype(
    validate(greater_or_equal = 1, less_or_equal = 10_000),
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Into,
        Default,
        Serialize,
        Deserialize
    ),
    default = 1_000
)]
pub struct PollBatchSize(usize);

/// Upper bound on commands being dispatched and written at the same time.
#[nutype(
    validate(greater_or_equal = 1, less_or_equal = 10_000),
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Into,
        Default,
        Serialize,
        Deserialize
    ),
    default = 64
)]
pub struct MaxConcurrentDispatches(usize);

/// What happens when an acknowledgement cannot be appended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcknowledgementPolicy {
    /// Log the failure. A caller waiting on the command keeps waiting.
    #[default]
    BestEffort,
    /// Log the failure and resolve in-process waiters with an internal
    /// error.
    FailLoudly,
}

/// Complete pipeline configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Poller idle interval.
    pub poll_interval: PollIntervalMs,
    /// Events per poll.
    pub poll_batch_size: PollBatchSize,
    /// Dispatch concurrency bound.
    pub max_concurrent_dispatches: MaxConcurrentDispatches,
    /// Acknowledgement append failure handling.
    pub acknowledgement_policy: AcknowledgementPolicy,
}

impl PipelineConfig {
    /// Parses a configuration from JSON; omitted fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the text is not valid JSON or a
    /// value is out of range.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Sets the poll interval.
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval: PollIntervalMs) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Sets the poll batch size.
    #[must_use]
    pub const fn with_poll_batch_size(mut self, poll_batch_size: PollBatchSize) -> Self {
        self.poll_batch_size = poll_batch_size;
        self
    }

    /// Sets the dispatch concurrency bound.
    #[must_use]
    pub const fn with_max_concurrent_dispatches(
        mut self,
        max_concurrent_dispatches: MaxConcurrentDispatches,
    ) -> Self {
        self.max_concurrent_dispatches = max_concurrent_dispatches;
        self
    }

    /// Sets the acknowledgement policy.
    #[must_use]
    pub const fn with_acknowledgement_policy(mut self, policy: AcknowledgementPolicy) -> Self {
        self.acknowledgement_policy = policy;
        self
    }
}
