//! The consumer side of the command channel.
//!
//! A [`CommandProcessor`] subscribes to a [`CommandChannel`] and, for every
//! admitted command, runs dispatch followed by the outcome write as its own
//! task. Admission order is total, but dispatches of different commands run
//! concurrently (up to the configured bound) and may finish out of order.
//!
//! Each outcome is logged exactly once, after it has been written.

use crate::channel::{CommandChannel, CommandSubscription};
use crate::command::{Command, CommandEnvelope};
use crate::config::MaxConcurrentDispatches;
use crate::dispatcher::CommandDispatcher;
use crate::event_store::EventStore;
use crate::outcome::DispatchOutcome;
use crate::result::FunctionalResult;
use crate::writer::{OutcomeWriter, WriteReport};
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn, Instrument};

/// Handle to a running processor.
#[derive(Debug)]
pub struct CommandProcessor {
    task: JoinHandle<()>,
}

impl CommandProcessor {
    /// Subscribes to `channel` and starts processing on the current runtime.
    ///
    /// The subscription is registered before this returns, so every command
    /// sent afterwards is processed.
    pub fn start<C, S>(
        channel: &CommandChannel<C>,
        dispatcher: CommandDispatcher<C, S::Event>,
        writer: Arc<OutcomeWriter<S>>,
        max_concurrent: MaxConcurrentDispatches,
    ) -> Self
    where
        C: Command,
        S: EventStore,
    {
        let commands = channel.subscribe();
        let task = tokio::spawn(run(commands, dispatcher, writer, max_concurrent.into()));
        Self { task }
    }

    /// Waits until the channel has been disposed and every in-flight command
    /// has been written.
    pub async fn finished(self) {
        if let Err(err) = self.task.await {
            error!(error = %err, "command processor task ended abnormally");
        }
    }
}

async fn run<C, S>(
    mut commands: CommandSubscription<C>,
    dispatcher: CommandDispatcher<C, S::Event>,
    writer: Arc<OutcomeWriter<S>>,
    max_concurrent: usize,
) where
    C: Command,
    S: EventStore,
{
    let permits = Arc::new(Semaphore::new(max_concurrent));
    let tracker = TaskTracker::new();
    debug!(max_concurrent, "command processor started");

    while let Some(envelope) = commands.next().await {
        let Ok(permit) = Arc::clone(&permits).acquire_owned().await else {
            break;
        };
        let dispatcher = dispatcher.clone();
        let writer = Arc::clone(&writer);
        let span = tracing::info_span!("process_command", command_id = %envelope.id());
        tracker.spawn(
            async move {
                let report = process(&dispatcher, &writer, &envelope).await;
                log_report(&envelope, &report);
                drop(permit);
            }
            .instrument(span),
        );
    }

    tracker.close();
    debug!(in_flight = tracker.len(), "command channel closed, draining");
    tracker.wait().await;
    debug!("command processor stopped");
}

async fn process<C, S>(
    dispatcher: &CommandDispatcher<C, S::Event>,
    writer: &OutcomeWriter<S>,
    envelope: &CommandEnvelope<C>,
) -> WriteReport<S::Event>
where
    C: Command,
    S: EventStore,
{
    let outcome = dispatcher.dispatch(envelope).await;
    writer.write(outcome).await
}

fn log_report<C: Command, E>(envelope: &CommandEnvelope<C>, report: &WriteReport<E>) {
    let kind = envelope.kind();
    let message = report.outcome.result_message().unwrap_or_default();
    match &report.outcome {
        DispatchOutcome::Processed {
            functional_result: FunctionalResult::Ok(_),
            events,
            ..
        } => info!(
            ?kind,
            events = events.len(),
            result_message = message,
            "command processed"
        ),
        DispatchOutcome::Processed {
            functional_result: FunctionalResult::Failed(reason),
            ..
        } => error!(?kind, reason = %reason, "command rejected"),
        DispatchOutcome::Unhandled { .. } => {
            error!(?kind, result_message = message, "command unhandled");
        }
        DispatchOutcome::Faulted { fault, .. } => {
            error!(?kind, fault = %fault, "command faulted");
        }
        DispatchOutcome::Cancelled { .. } => {
            info!(?kind, result_message = message, "command cancelled");
        }
    }
    if let Err(err) = &report.acknowledgement {
        warn!(
            ?kind,
            outcome = report.outcome.label(),
            error = %err,
            "command outcome was not acknowledged"
        );
    }
}
