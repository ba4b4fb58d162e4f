//! Events for the banking domain
//!
//! Every event belongs to the stream of the account it changes.

use crate::banking::types::{AccountId, Money, Owner};
use eventflow::{EventPayload, StreamId};
use serde::{Deserialize, Serialize};

/// Event emitted when a new account is opened
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountCreated {
    /// The new account
    pub account_id: AccountId,
    /// Who owns it
    pub owner: Owner,
    /// Balance the account starts with
    pub initial_balance: Money,
}

/// Event emitted when money leaves an account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoneyWithdrawn {
    /// The account money is withdrawn from
    pub account_id: AccountId,
    /// Amount being withdrawn
    pub amount: Money,
    /// The account receiving the money
    pub counterparty: AccountId,
}

/// Event emitted when money arrives in an account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoneyDeposited {
    /// The account receiving the deposit
    pub account_id: AccountId,
    /// Amount being deposited
    pub amount: Money,
    /// The account the money came from
    pub counterparty: AccountId,
}

/// All possible events in the banking domain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BankingEvent {
    /// An account was opened
    AccountCreated(AccountCreated),
    /// Money was withdrawn
    MoneyWithdrawn(MoneyWithdrawn),
    /// Money was deposited
    MoneyDeposited(MoneyDeposited),
}

impl BankingEvent {
    /// The account this event changes.
    pub const fn account_id(&self) -> &AccountId {
        match self {
            Self::AccountCreated(event) => &event.account_id,
            Self::MoneyWithdrawn(event) => &event.account_id,
            Self::MoneyDeposited(event) => &event.account_id,
        }
    }
}

/// Name of the stream holding one account's events.
pub fn account_stream(account_id: &AccountId) -> StreamId {
    StreamId::try_new(format!("account-{account_id}"))
        .expect("account ids are non-empty and short enough to form a stream id")
}

impl EventPayload for BankingEvent {
    fn stream_id(&self) -> StreamId {
        account_stream(self.account_id())
    }
}

impl From<AccountCreated> for BankingEvent {
    fn from(event: AccountCreated) -> Self {
        Self::AccountCreated(event)
    }
}

impl From<MoneyWithdrawn> for BankingEvent {
    fn from(event: MoneyWithdrawn) -> Self {
        Self::MoneyWithdrawn(event)
    }
}

impl From<MoneyDeposited> for BankingEvent {
    fn from(event: MoneyDeposited) -> Self {
        Self::MoneyDeposited(event)
    }
}
