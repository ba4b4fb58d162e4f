//! Account balances read model
//!
//! [`Accounts`] folds the applied-event stream of a pipeline into one balance
//! per account and republishes every changed balance, so callers can react to
//! balance changes without touching the store.

use crate::banking::events::BankingEvent;
use crate::banking::types::{AccountId, Money, Owner};
use eventflow::{EventSubscription, FanOut, GlobalPosition, Subscription};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Current state of one account.
///
/// The balance is signed: transfers are not checked against funds, so an
/// account can be overdrawn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountBalance {
    /// The account
    pub account_id: AccountId,
    /// Who owns it
    pub owner: Owner,
    /// Balance in cents
    pub balance_cents: i64,
}

fn signed(amount: Money) -> i64 {
    i64::try_from(amount.cents()).unwrap_or(i64::MAX)
}

#[derive(Default)]
struct State {
    balances: HashMap<AccountId, AccountBalance>,
    position: Option<GlobalPosition>,
}

/// Balance projection over [`BankingEvent`]s.
///
/// Clones share the same state.
#[derive(Clone, Default)]
pub struct Accounts {
    state: Arc<RwLock<State>>,
    changes: FanOut<AccountBalance>,
}

impl std::fmt::Debug for Accounts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("Accounts")
            .field("accounts", &state.balances.len())
            .field("position", &state.position)
            .finish()
    }
}

impl Accounts {
    /// An empty projection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Balance changes applied from now on.
    pub fn subscribe_changes(&self) -> Subscription<AccountBalance> {
        self.changes.subscribe()
    }

    /// The current state of `account_id`, if it exists.
    pub fn get(&self, account_id: &AccountId) -> Option<AccountBalance> {
        self.state.read().balances.get(account_id).cloned()
    }

    /// Every known account, ordered by id.
    pub fn all(&self) -> Vec<AccountBalance> {
        let mut balances: Vec<_> = self.state.read().balances.values().cloned().collect();
        balances.sort_by(|a, b| a.account_id.cmp(&b.account_id));
        balances
    }

    /// Position of the last record this projection has seen.
    pub fn position(&self) -> Option<GlobalPosition> {
        self.state.read().position
    }

    /// Applies one event and publishes the resulting balance.
    ///
    /// Money moving in or out of an unknown account is ignored.
    pub fn apply(&self, event: &BankingEvent) -> Option<AccountBalance> {
        let mut state = self.state.write();
        let changed = match event {
            BankingEvent::AccountCreated(created) => {
                let balance = AccountBalance {
                    account_id: created.account_id.clone(),
                    owner: created.owner.clone(),
                    balance_cents: signed(created.initial_balance),
                };
                state
                    .balances
                    .insert(created.account_id.clone(), balance.clone());
                Some(balance)
            }
            BankingEvent::MoneyWithdrawn(withdrawn) => {
                state.balances.get_mut(&withdrawn.account_id).map(|account| {
                    account.balance_cents =
                        account.balance_cents.saturating_sub(signed(withdrawn.amount));
                    account.clone()
                })
            }
            BankingEvent::MoneyDeposited(deposited) => {
                state.balances.get_mut(&deposited.account_id).map(|account| {
                    account.balance_cents =
                        account.balance_cents.saturating_add(signed(deposited.amount));
                    account.clone()
                })
            }
        };
        drop(state);

        let Some(balance) = changed else {
            warn!(account_id = %event.account_id(), "event for unknown account ignored");
            return None;
        };
        self.changes.publish(balance.clone());
        Some(balance)
    }

    /// Applies every domain event from `events` until the stream ends, then
    /// completes the change stream.
    pub fn spawn(self, mut events: EventSubscription<BankingEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(stored) = events.recv().await {
                if let Some(event) = stored.domain() {
                    self.apply(event);
                }
                self.state.write().position = Some(stored.position);
            }
            debug!(position = ?self.position(), "account projection caught up");
            self.changes.complete();
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::banking::events::{AccountCreated, MoneyDeposited, MoneyWithdrawn};

    fn account(id: &str) -> AccountId {
        AccountId::try_new(id).unwrap()
    }

    fn created(id: &str, cents: u64) -> BankingEvent {
        AccountCreated {
            account_id: account(id),
            owner: Owner::try_new(format!("owner of {id}")).unwrap(),
            initial_balance: Money::from_cents(cents),
        }
        .into()
    }

    #[test]
    fn transfers_move_balances_between_accounts() {
        let accounts = Accounts::new();
        accounts.apply(&created("A", 0));
        accounts.apply(&created("B", 1_000));

        accounts.apply(
            &MoneyWithdrawn {
                account_id: account("A"),
                amount: Money::from_cents(123),
                counterparty: account("B"),
            }
            .into(),
        );
        accounts.apply(
            &MoneyDeposited {
                account_id: account("B"),
                amount: Money::from_cents(123),
                counterparty: account("A"),
            }
            .into(),
        );

        assert_eq!(accounts.get(&account("A")).unwrap().balance_cents, -123);
        assert_eq!(accounts.get(&account("B")).unwrap().balance_cents, 1_123);
        assert_eq!(accounts.all().len(), 2);
    }

    #[test]
    fn unknown_accounts_are_ignored() {
        let accounts = Accounts::new();
        let changed = accounts.apply(
            &MoneyDeposited {
                account_id: account("ghost"),
                amount: Money::from_cents(1),
                counterparty: account("A"),
            }
            .into(),
        );

        assert!(changed.is_none());
        assert!(accounts.all().is_empty());
    }

    #[tokio::test]
    async fn changes_are_published_to_subscribers() {
        let accounts = Accounts::new();
        let mut changes = accounts.subscribe_changes();

        accounts.apply(&created("A", 50));

        let change = changes.recv().await.unwrap();
        assert_eq!(change.account_id, account("A"));
        assert_eq!(change.balance_cents, 50);
    }
}
