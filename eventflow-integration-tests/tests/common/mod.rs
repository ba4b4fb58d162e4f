//! Helpers shared by the integration tests.

use eventflow::{EventStore, HandlerRegistry, Pipeline, PipelineConfig, PollIntervalMs};
use eventflow_examples::banking::{
    AccountId, BankCommand, BankCommandKind, BankingEvent, CreateAccountHandler, Money,
    TransferMoney, TransferMoneyHandler,
};
use std::future::Future;
use std::time::Duration;

/// Fails the test if `future` takes longer than five seconds.
pub async fn within<T>(future: impl Future<Output = T>) -> T {
    tokio::time::timeout(Duration::from_secs(5), future)
        .await
        .expect("timed out")
}

/// A configuration that polls often enough for tests.
pub fn fast_config() -> PipelineConfig {
    PipelineConfig::default().with_poll_interval(PollIntervalMs::try_new(10).unwrap())
}

/// Starts a banking pipeline with the given handlers over `store`.
pub fn start<S>(
    store: S,
    registry: HandlerRegistry<BankCommand, BankingEvent>,
    config: PipelineConfig,
) -> Pipeline<BankCommand, S>
where
    S: EventStore<Event = BankingEvent>,
{
    Pipeline::builder(store, registry).config(config).start()
}

/// A registry with handlers for `kinds` only.
pub fn registry_for(kinds: &[BankCommandKind]) -> HandlerRegistry<BankCommand, BankingEvent> {
    let mut builder = HandlerRegistry::<BankCommand, BankingEvent>::builder();
    for kind in kinds {
        builder = match kind {
            BankCommandKind::CreateAccount => builder.register(*kind, CreateAccountHandler),
            BankCommandKind::TransferMoney => builder.register(*kind, TransferMoneyHandler),
        }
        .unwrap();
    }
    builder.build()
}

/// An account id with a readable name.
pub fn account(id: &str) -> AccountId {
    AccountId::try_new(id).unwrap()
}

/// A transfer command.
pub fn transfer(from: &str, to: &str, cents: u64) -> BankCommand {
    TransferMoney::new(account(from), account(to), Money::from_cents(cents)).into()
}
