//! The assembled pipeline.
//!
//! [`Pipeline`] wires the pieces together over one store:
//!
//! ```text
//! send ─▶ CommandChannel ─▶ CommandProcessor ─▶ CommandDispatcher
//!                                 │
//!                                 ▼
//!                           OutcomeWriter ──append──▶ EventStore
//!                                 │                       │
//!                              WakeUp ──────────────▶ EventPoller ─▶ acknowledgements
//!                                                                  ─▶ subscribe_events
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! let pipeline = Pipeline::builder(InMemoryEventStore::new(), registry)
//!     .config(PipelineConfig::default())
//!     .start();
//!
//! let result = pipeline.send_and_wait(BankCommand::CreateAccount(create)).await;
//! assert!(result.is_ok());
//!
//! pipeline.shutdown().await;
//! ```

use crate::channel::CommandChannel;
use crate::command::{Command, CommandEnvelope};
use crate::config::PipelineConfig;
use crate::dispatcher::CommandDispatcher;
use crate::errors::ChannelError;
use crate::event::CommandProcessed;
use crate::event_store::EventStore;
use crate::handler::HandlerRegistry;
use crate::poller::{EventPoller, EventSubscription};
use crate::processor::CommandProcessor;
use crate::result::OperationResult;
use crate::types::CommandId;
use crate::waiter::{self, AcknowledgementStream};
use crate::wake_up::WakeUp;
use crate::writer::OutcomeWriter;
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::info;

/// Builder for [`Pipeline`].
pub struct PipelineBuilder<C: Command, S: EventStore> {
    store: S,
    registry: HandlerRegistry<C, S::Event>,
    config: PipelineConfig,
}

impl<C: Command, S: EventStore> PipelineBuilder<C, S> {
    /// Replaces the default configuration.
    #[must_use]
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Spawns the processor and poller on the current runtime.
    pub fn start(self) -> Pipeline<C, S> {
        let config = self.config;
        let store = Arc::new(self.store);
        let wake_up = WakeUp::new();

        let writer = Arc::new(
            OutcomeWriter::new(Arc::clone(&store))
                .with_wake_up(wake_up.clone())
                .with_policy(config.acknowledgement_policy),
        );
        let poller = EventPoller::builder(Arc::clone(&store))
            .wake_up(wake_up)
            .interval(config.poll_interval)
            .batch_size(config.poll_batch_size)
            .start();

        let channel = Arc::new(CommandChannel::new());
        let processor = CommandProcessor::start(
            &channel,
            CommandDispatcher::new(self.registry),
            Arc::clone(&writer),
            config.max_concurrent_dispatches,
        );

        info!(?config, "pipeline started");
        Pipeline {
            store,
            channel,
            writer,
            poller,
            processor: Mutex::new(Some(processor)),
            config,
        }
    }
}

impl<C: Command, S: EventStore> std::fmt::Debug for PipelineBuilder<C, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineBuilder")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// A running command pipeline.
pub struct Pipeline<C: Command, S: EventStore> {
    store: Arc<S>,
    channel: Arc<CommandChannel<C>>,
    writer: Arc<OutcomeWriter<Arc<S>>>,
    poller: EventPoller<Arc<S>>,
    processor: Mutex<Option<CommandProcessor>>,
    config: PipelineConfig,
}

impl<C: Command, S: EventStore> Pipeline<C, S> {
    /// Starts configuring a pipeline over `store` routing through `registry`.
    pub fn builder(store: S, registry: HandlerRegistry<C, S::Event>) -> PipelineBuilder<C, S> {
        PipelineBuilder {
            store,
            registry,
            config: PipelineConfig::default(),
        }
    }

    /// Submits a command without waiting for it to be processed.
    pub async fn send(
        &self,
        command: impl Into<CommandEnvelope<C>>,
    ) -> Result<CommandId, ChannelError> {
        let envelope = command.into();
        let command_id = envelope.id();
        self.channel.send(envelope).await?;
        Ok(command_id)
    }

    /// Submits a batch; returns the ids in input order once all are admitted.
    pub async fn send_many<I>(&self, commands: I) -> Result<Vec<CommandId>, ChannelError>
    where
        I: IntoIterator,
        I::Item: Into<CommandEnvelope<C>>,
    {
        let envelopes: Vec<CommandEnvelope<C>> = commands.into_iter().map(Into::into).collect();
        let ids = envelopes.iter().map(CommandEnvelope::id).collect();
        self.channel.send_many(envelopes).await?;
        Ok(ids)
    }

    /// Submits a command and waits for its acknowledgement.
    pub async fn send_and_wait(
        &self,
        command: impl Into<CommandEnvelope<C>>,
    ) -> OperationResult<()> {
        waiter::send_and_wait(&self.channel, command, self).await
    }

    /// Subscribes to every stored record the poller reads from now on.
    pub fn subscribe_events(&self) -> EventSubscription<S::Event> {
        self.poller.subscribe_events()
    }

    /// The command channel, for callers that subscribe to commands directly.
    pub fn channel(&self) -> &CommandChannel<C> {
        &self.channel
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The configuration the pipeline was started with.
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Stops the pipeline.
    ///
    /// Admission stops at once and callers still waiting resolve as
    /// cancelled. Commands already admitted are dispatched and written, the
    /// poller delivers what is in the store, and then every subscription
    /// completes. Calling this more than once is harmless.
    pub async fn shutdown(&self) {
        self.channel.dispose();
        let processor = self.processor.lock().take();
        if let Some(processor) = processor {
            processor.finished().await;
        }
        let position = self.poller.shutdown().await;
        self.writer.local_acknowledgements().complete();
        info!(?position, "pipeline stopped");
    }
}

impl<C: Command, S: EventStore> AcknowledgementStream for Pipeline<C, S> {
    fn acknowledgements(&self) -> BoxStream<'static, CommandProcessed> {
        stream::select(
            self.poller.acknowledgements(),
            self.writer.local_acknowledgements().acknowledgements(),
        )
        .boxed()
    }
}

impl<C: Command, S: EventStore> Drop for Pipeline<C, S> {
    fn drop(&mut self) {
        self.channel.dispose();
    }
}

impl<C: Command, S: EventStore> std::fmt::Debug for Pipeline<C, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("channel", &self.channel)
            .field("poller", &self.poller)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AcknowledgementPolicy, PollIntervalMs};
    use crate::errors::HandlerError;
    use crate::handler::{CommandHandler, HandlerContext, HandlerOutput};
    use crate::test_support::{RecordingStore, Tick};
    use async_trait::async_trait;
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Note {
        Write(&'static str),
        Refuse,
        Orphan,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum NoteKind {
        Write,
        Refuse,
        Orphan,
    }

    impl Command for Note {
        type Kind = NoteKind;

        fn kind(&self) -> NoteKind {
            match self {
                Self::Write(_) => NoteKind::Write,
                Self::Refuse => NoteKind::Refuse,
                Self::Orphan => NoteKind::Orphan,
            }
        }
    }

    struct Notes;

    #[async_trait]
    impl CommandHandler<Note, Tick> for Notes {
        async fn handle(
            &self,
            command: &Note,
            _context: &HandlerContext,
        ) -> Result<HandlerOutput<Tick>, HandlerError> {
            match command {
                Note::Write(stream) => Ok(HandlerOutput::ok(vec![Tick::on(*stream, 1)])),
                Note::Refuse => Ok(HandlerOutput::failed("refused")),
                Note::Orphan => Err(HandlerError::msg("unreachable")),
            }
        }
    }

    fn config() -> PipelineConfig {
        PipelineConfig::default().with_poll_interval(PollIntervalMs::try_new(20).unwrap())
    }

    fn start(
        store: RecordingStore<Tick>,
        config: PipelineConfig,
    ) -> Pipeline<Note, RecordingStore<Tick>> {
        let registry = HandlerRegistry::<Note, Tick>::builder()
            .register(NoteKind::Write, Notes)
            .and_then(|builder| builder.register(NoteKind::Refuse, Notes))
            .unwrap()
            .build();
        Pipeline::builder(store, registry).config(config).start()
    }

    async fn within<T>(future: impl std::future::Future<Output = T>) -> T {
        tokio::time::timeout(Duration::from_secs(5), future)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn send_and_wait_resolves_every_kind_of_outcome() {
        let pipeline = start(RecordingStore::new(), config());

        assert_eq!(
            within(pipeline.send_and_wait(Note::Write("notes"))).await,
            OperationResult::Ok(())
        );
        assert_eq!(
            within(pipeline.send_and_wait(Note::Refuse)).await,
            OperationResult::Error("refused".to_string())
        );
        assert!(matches!(
            within(pipeline.send_and_wait(Note::Orphan)).await,
            OperationResult::InternalError(_)
        ));

        pipeline.shutdown().await;
    }

    #[tokio::test]
    async fn subscribers_see_stored_domain_events() {
        let pipeline = start(RecordingStore::new(), config());
        let mut events = pipeline.subscribe_events();

        within(pipeline.send_and_wait(Note::Write("journal"))).await;

        let stored = within(events.next()).await.unwrap();
        assert_eq!(stored.domain(), Some(&Tick::on("journal", 1)));
        pipeline.shutdown().await;
    }

    #[tokio::test]
    async fn fail_loudly_resolves_waiters_when_acknowledgements_cannot_be_stored() {
        let config = config().with_acknowledgement_policy(AcknowledgementPolicy::FailLoudly);
        let pipeline = start(RecordingStore::new().failing_acknowledgements(), config);

        let result = within(pipeline.send_and_wait(Note::Write("lost"))).await;

        assert!(matches!(result, OperationResult::InternalError(_)));
        pipeline.shutdown().await;
    }

    #[tokio::test]
    async fn send_many_returns_ids_in_input_order() {
        let pipeline = start(RecordingStore::new(), config());
        let commands = vec![Note::Write("a"), Note::Write("b")];
        let envelopes: Vec<_> = commands.into_iter().map(CommandEnvelope::new).collect();
        let expected: Vec<_> = envelopes.iter().map(CommandEnvelope::id).collect();

        let ids = pipeline.send_many(envelopes).await.unwrap();

        assert_eq!(ids, expected);
        pipeline.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_stops_admission_and_is_idempotent() {
        let pipeline = start(RecordingStore::new(), config());
        pipeline.shutdown().await;
        pipeline.shutdown().await;

        assert_eq!(pipeline.send(Note::Refuse).await, Err(ChannelError::Closed));
        assert!(pipeline.send_and_wait(Note::Refuse).await.is_cancelled());
    }
}
