//! Failure injection for any [`EventStore`].
//!
//! [`ChaosEventStore`] wraps a store and fails a configurable share of calls
//! with [`EventStoreError::Unavailable`]. Domain appends, acknowledgement
//! appends and reads each have their own probability, so a test can break
//! exactly the step it is interested in. With a deterministic seed the
//! sequence of injected failures is reproducible.

use async_trait::async_trait;
use eventflow::errors::{EventStoreError, EventStoreResult};
use eventflow::event::RecordedEvent;
use eventflow::event_store::{EventStore, ReadOptions, StoredEvent};
use eventflow::types::StreamId;
use nutype::nutype;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{random, Rng, SeedableRng};
use tracing::debug;

/// Probability value for chaos engineering injection rates.
///
/// Probability represents a value in the range [0.0, 1.0] where 0.0 means
/// never inject failures and 1.0 means always inject failures.
///
/// # Examples
///
/// ```ignore
/// use eventflow_memory::chaos::Probability;
///
/// let never = Probability::try_new(0.0).unwrap();
/// let always = Probability::try_new(1.0).unwrap();
///
/// // Values outside [0.0, 1.0] are rejected
/// assert!(Probability::try_new(1.5).is_err());
/// ```
#[nutype(
    validate(greater_or_equal = 0.0, less_or_equal = 1.0),
    derive(Debug, Clone, Copy, PartialEq, PartialOrd, Display, Into)
)]
pub struct Probability(f32);

impl Probability {
    fn clamped(probability: f32) -> Self {
        let clamped = if probability.is_nan() {
            0.0
        } else {
            probability.clamp(0.0, 1.0)
        };
        Self::try_new(clamped).unwrap_or_else(|_| Self::never())
    }

    fn never() -> Self {
        Self::try_new(0.0).expect("0.0 is valid probability")
    }
}

/// Which calls fail, and how often.
#[derive(Debug, Clone)]
pub struct ChaosConfig {
    deterministic_seed: Option<u64>,
    append_failure_probability: Probability,
    acknowledgement_failure_probability: Probability,
    read_failure_probability: Probability,
}

impl ChaosConfig {
    /// A configuration with a fixed seed and no failures yet.
    pub fn deterministic() -> Self {
        Self {
            deterministic_seed: Some(0),
            ..Self::default()
        }
    }

    /// Uses `seed` for the failure sequence.
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.deterministic_seed = Some(seed);
        self
    }

    /// Fails domain event appends with the given probability.
    #[must_use]
    pub fn with_append_failure_probability(mut self, probability: f32) -> Self {
        self.append_failure_probability = Probability::clamped(probability);
        self
    }

    /// Fails acknowledgement appends with the given probability.
    #[must_use]
    pub fn with_acknowledgement_failure_probability(mut self, probability: f32) -> Self {
        self.acknowledgement_failure_probability = Probability::clamped(probability);
        self
    }

    /// Fails reads with the given probability.
    #[must_use]
    pub fn with_read_failure_probability(mut self, probability: f32) -> Self {
        self.read_failure_probability = Probability::clamped(probability);
        self
    }
}

impl Default for ChaosConfig {
    fn default() -> Self {
        Self {
            deterministic_seed: None,
            append_failure_probability: Probability::never(),
            acknowledgement_failure_probability: Probability::never(),
            read_failure_probability: Probability::never(),
        }
    }
}

/// Adds [`ChaosEventStoreExt::with_chaos`] to every store.
pub trait ChaosEventStoreExt: Sized {
    /// Wraps `self` with failure injection.
    fn with_chaos(self, config: ChaosConfig) -> ChaosEventStore<Self>;
}

/// A store that fails on purpose.
#[derive(Debug)]
pub struct ChaosEventStore<S> {
    store: S,
    config: ChaosConfig,
    rng: Mutex<StdRng>,
}

impl<S> ChaosEventStore<S> {
    /// Wraps `store`.
    pub fn new(store: S, config: ChaosConfig) -> Self {
        let rng = match config.deterministic_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::seed_from_u64(random()),
        };

        Self {
            store,
            config,
            rng: Mutex::new(rng),
        }
    }

    /// The wrapped store.
    pub const fn inner(&self) -> &S {
        &self.store
    }

    fn should_inject(&self, probability: Probability) -> bool {
        let probability: f32 = probability.into();

        if probability <= 0.0 {
            return false;
        }

        if probability >= 1.0 {
            return true;
        }

        self.rng.lock().random_bool(f64::from(probability))
    }
}

#[async_trait]
impl<S: EventStore> EventStore for ChaosEventStore<S> {
    type Event = S::Event;

    async fn append_events(
        &self,
        events: Vec<RecordedEvent<Self::Event>>,
    ) -> EventStoreResult<Vec<StoredEvent<Self::Event>>> {
        let acknowledging = events
            .iter()
            .any(|record| record.as_acknowledgement().is_some());
        let probability = if acknowledging {
            self.config.acknowledgement_failure_probability
        } else {
            self.config.append_failure_probability
        };

        if self.should_inject(probability) {
            debug!(acknowledging, "chaos: failing append");
            return Err(EventStoreError::Unavailable(
                "chaos: injected append failure".to_string(),
            ));
        }

        self.store.append_events(events).await
    }

    async fn read_all(
        &self,
        options: ReadOptions,
    ) -> EventStoreResult<Vec<StoredEvent<Self::Event>>> {
        if self.should_inject(self.config.read_failure_probability) {
            debug!("chaos: failing read");
            return Err(EventStoreError::Unavailable(
                "chaos: injected read failure".to_string(),
            ));
        }

        self.store.read_all(options).await
    }

    async fn read_stream(
        &self,
        stream_id: &StreamId,
    ) -> EventStoreResult<Vec<StoredEvent<Self::Event>>> {
        if self.should_inject(self.config.read_failure_probability) {
            debug!(%stream_id, "chaos: failing read");
            return Err(EventStoreError::Unavailable(
                "chaos: injected read failure".to_string(),
            ));
        }

        self.store.read_stream(stream_id).await
    }
}

impl<S: EventStore> ChaosEventStoreExt for S {
    fn with_chaos(self, config: ChaosConfig) -> ChaosEventStore<Self> {
        ChaosEventStore::new(self, config)
    }
}
