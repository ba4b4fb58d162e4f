//! Banking example application
//!
//! Opens two accounts concurrently, then transfers money between them, while
//! a projection reports every balance change.

use anyhow::Result;
use eventflow::{replay_acknowledgements, OperationResult, Pipeline, PipelineConfig};
use eventflow_examples::banking::{
    registry, AccountId, Accounts, BankCommand, BankingEvent, CreateAccount, Money, Owner,
    TransferMoney,
};
use eventflow_memory::InMemoryEventStore;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let store = InMemoryEventStore::<BankingEvent>::new();
    let pipeline = Pipeline::builder(store, registry()?)
        .config(PipelineConfig::default())
        .start();

    let accounts = Accounts::new();
    let mut changes = accounts.subscribe_changes();
    let projector = accounts.clone().spawn(pipeline.subscribe_events());
    let reporter = tokio::spawn(async move {
        while let Some(change) = changes.recv().await {
            info!(
                owner = %change.owner,
                balance = %format_cents(change.balance_cents),
                "balance changed"
            );
        }
    });

    let mine = AccountId::generate();
    let yours = AccountId::generate();

    let (alex, mace) = tokio::join!(
        pipeline.send_and_wait(BankCommand::from(CreateAccount::new(
            mine.clone(),
            Owner::try_new("Alex")?,
            Money::ZERO,
        ))),
        pipeline.send_and_wait(BankCommand::from(CreateAccount::new(
            yours.clone(),
            Owner::try_new("Mace")?,
            Money::from_dollars(1_000)?,
        ))),
    );

    let outcome = match OperationResult::aggregate([alex, mace]) {
        OperationResult::Ok(_) => {
            pipeline
                .send_and_wait(BankCommand::from(TransferMoney::new(
                    mine,
                    yours,
                    Money::from_cents(123),
                )))
                .await
        }
        failure => failure.map(|_| ()),
    };

    match &outcome {
        OperationResult::Ok(()) => info!("Money transferred"),
        failure => info!(%failure, "Something went wrong"),
    }

    pipeline.shutdown().await;
    projector.await?;
    reporter.await?;

    for account in accounts.all() {
        info!(
            owner = %account.owner,
            balance = %format_cents(account.balance_cents),
            "final balance"
        );
    }

    let replayed = replay_acknowledgements(pipeline.store()).await?;
    info!(commands = replayed.len(), "acknowledgements replayed from the store");

    Ok(())
}

fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let cents = cents.unsigned_abs();
    format!("{sign}${}.{:02}", cents / 100, cents % 100)
}
