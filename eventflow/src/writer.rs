//! Persisting dispatch outcomes.
//!
//! For each outcome the [`OutcomeWriter`] performs at most two appends, in
//! this order:
//!
//! 1. the handler's domain events, only for an accepted `Processed` outcome
//!    that produced any. If that append fails the outcome is replaced by a
//!    `Faulted` one carrying [`Fault::Append`], so a caller can never see a
//!    success acknowledgement for events that were not stored;
//! 2. one [`CommandProcessed`] acknowledgement built from the (possibly
//!    replaced) outcome.
//!
//! A failed acknowledgement append is handled according to the configured
//! [`AcknowledgementPolicy`]. A successful one raises the [`WakeUp`] signal.

use crate::config::AcknowledgementPolicy;
use crate::errors::{EventStoreError, Fault};
use crate::event::{CommandProcessed, RecordedEvent};
use crate::event_store::EventStore;
use crate::fan_out::FanOut;
use crate::outcome::DispatchOutcome;
use crate::result::{FunctionalResult, OperationResult};
use crate::wake_up::WakeUp;
use tracing::{error, trace};

/// What happened when an outcome was written.
#[derive(Debug, Clone)]
pub struct WriteReport<E> {
    /// The outcome that was acknowledged; `Faulted` if the domain append
    /// failed.
    pub outcome: DispatchOutcome<E>,
    /// The appended acknowledgement, or why it could not be appended.
    pub acknowledgement: Result<CommandProcessed, EventStoreError>,
}

/// Appends domain events and acknowledgements for dispatch outcomes.
#[derive(Debug)]
pub struct OutcomeWriter<S: EventStore> {
    store: S,
    wake_up: Option<WakeUp>,
    policy: AcknowledgementPolicy,
    local_acknowledgements: FanOut<CommandProcessed>,
}

impl<S: EventStore> OutcomeWriter<S> {
    /// Creates a writer with the best-effort policy and no wake-up signal.
    pub fn new(store: S) -> Self {
        Self {
            store,
            wake_up: None,
            policy: AcknowledgementPolicy::default(),
            local_acknowledgements: FanOut::new(),
        }
    }

    /// Raises `wake_up` after every acknowledgement append.
    #[must_use]
    pub fn with_wake_up(mut self, wake_up: WakeUp) -> Self {
        self.wake_up = Some(wake_up);
        self
    }

    /// Sets how acknowledgement append failures are handled.
    #[must_use]
    pub const fn with_policy(mut self, policy: AcknowledgementPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The underlying store.
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Acknowledgements that exist only in this process.
    ///
    /// Under [`AcknowledgementPolicy::FailLoudly`] an `InternalError`
    /// acknowledgement is published here for every command whose real
    /// acknowledgement could not be stored.
    pub const fn local_acknowledgements(&self) -> &FanOut<CommandProcessed> {
        &self.local_acknowledgements
    }

    /// Writes one outcome.
    pub async fn write(&self, outcome: DispatchOutcome<S::Event>) -> WriteReport<S::Event> {
        let outcome = self.append_domain_events(outcome).await;
        let acknowledgement = outcome.to_acknowledgement();
        let command_id = acknowledgement.command_id;

        let appended = self
            .store
            .append_events(vec![RecordedEvent::Acknowledgement(acknowledgement.clone())])
            .await;

        let acknowledgement = match appended {
            Ok(_) => {
                trace!(%command_id, "acknowledgement appended");
                if let Some(wake_up) = &self.wake_up {
                    wake_up.there_is_work_to_do();
                }
                Ok(acknowledgement)
            }
            Err(err) => {
                error!(%command_id, error = %err, "failed to append acknowledgement");
                if self.policy == AcknowledgementPolicy::FailLoudly {
                    let message = format!("Failed to record acknowledgement: {err}");
                    self.local_acknowledgements.publish(CommandProcessed::new(
                        command_id,
                        OperationResult::InternalError(message.clone()),
                        Some(message),
                    ));
                }
                Err(err)
            }
        };

        WriteReport {
            outcome,
            acknowledgement,
        }
    }

    async fn append_domain_events(
        &self,
        outcome: DispatchOutcome<S::Event>,
    ) -> DispatchOutcome<S::Event> {
        match outcome {
            DispatchOutcome::Processed {
                command_id,
                events,
                functional_result: functional_result @ FunctionalResult::Ok(_),
                result_message,
            } if !events.is_empty() => {
                let records = events.iter().cloned().map(RecordedEvent::Domain).collect();
                match self.store.append_events(records).await {
                    Ok(stored) => {
                        trace!(%command_id, count = stored.len(), "domain events appended");
                        DispatchOutcome::Processed {
                            command_id,
                            events,
                            functional_result,
                            result_message,
                        }
                    }
                    Err(err) => {
                        error!(%command_id, error = %err, "failed to append domain events");
                        DispatchOutcome::faulted(command_id, Fault::Append(err))
                    }
                }
            }
            other => other,
        }
    }
}
