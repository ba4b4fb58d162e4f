//! Banking example demonstrating account management and money transfers
//!
//! - [`CreateAccount`] opens an account with an initial balance
//! - [`TransferMoney`] withdraws from one account and deposits into another
//! - [`Accounts`] keeps the balance of every account up to date

pub mod commands;
pub mod events;
pub mod projection;
pub mod types;

// Re-export commonly used types
pub use commands::{
    registry, BankCommand, BankCommandKind, CreateAccount, CreateAccountHandler, TransferMoney,
    TransferMoneyHandler,
};
pub use events::{AccountCreated, BankingEvent, MoneyDeposited, MoneyWithdrawn};
pub use projection::{AccountBalance, Accounts};
pub use types::{AccountId, Money, MoneyError, Owner};
