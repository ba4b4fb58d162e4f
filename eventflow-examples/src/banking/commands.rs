//! Commands and their handlers for the banking domain

use crate::banking::events::{AccountCreated, BankingEvent, MoneyDeposited, MoneyWithdrawn};
use crate::banking::types::{AccountId, Money, Owner};
use eventflow::{
    async_trait, Command, CommandHandler, HandlerContext, HandlerError, HandlerOutput,
    HandlerRegistry, RegistryError,
};
use serde::{Deserialize, Serialize};

/// Open a new account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateAccount {
    /// The account to open
    pub account_id: AccountId,
    /// Who owns it
    pub owner: Owner,
    /// Opening balance
    pub initial_balance: Money,
}

impl CreateAccount {
    /// Creates the command.
    pub const fn new(account_id: AccountId, owner: Owner, initial_balance: Money) -> Self {
        Self {
            account_id,
            owner,
            initial_balance,
        }
    }
}

/// Move money from one account to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferMoney {
    /// Account sending the money
    pub from: AccountId,
    /// Account receiving the money
    pub to: AccountId,
    /// Amount being transferred
    pub amount: Money,
}

impl TransferMoney {
    /// Creates the command.
    pub const fn new(from: AccountId, to: AccountId, amount: Money) -> Self {
        Self { from, to, amount }
    }
}

/// Every command the banking domain accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BankCommand {
    /// See [`CreateAccount`]
    CreateAccount(CreateAccount),
    /// See [`TransferMoney`]
    TransferMoney(TransferMoney),
}

/// Routing key for [`BankCommand`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BankCommandKind {
    /// [`BankCommand::CreateAccount`]
    CreateAccount,
    /// [`BankCommand::TransferMoney`]
    TransferMoney,
}

impl Command for BankCommand {
    type Kind = BankCommandKind;

    fn kind(&self) -> BankCommandKind {
        match self {
            Self::CreateAccount(_) => BankCommandKind::CreateAccount,
            Self::TransferMoney(_) => BankCommandKind::TransferMoney,
        }
    }
}

impl From<CreateAccount> for BankCommand {
    fn from(command: CreateAccount) -> Self {
        Self::CreateAccount(command)
    }
}

impl From<TransferMoney> for BankCommand {
    fn from(command: TransferMoney) -> Self {
        Self::TransferMoney(command)
    }
}

fn mismatched(expected: BankCommandKind, command: &BankCommand) -> HandlerError {
    HandlerError::msg(format!(
        "{expected:?} handler received a {:?} command",
        command.kind()
    ))
}

/// Handles [`CreateAccount`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CreateAccountHandler;

#[async_trait]
impl CommandHandler<BankCommand, BankingEvent> for CreateAccountHandler {
    async fn handle(
        &self,
        command: &BankCommand,
        _context: &HandlerContext,
    ) -> Result<HandlerOutput<BankingEvent>, HandlerError> {
        let BankCommand::CreateAccount(create) = command else {
            return Err(mismatched(BankCommandKind::CreateAccount, command));
        };

        let created = AccountCreated {
            account_id: create.account_id.clone(),
            owner: create.owner.clone(),
            initial_balance: create.initial_balance,
        };

        Ok(HandlerOutput::ok(vec![created.into()]).with_message(format!(
            "Account {} created for {}",
            create.account_id, create.owner
        )))
    }
}

/// Handles [`TransferMoney`]: one withdrawal and one deposit.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransferMoneyHandler;

#[async_trait]
impl CommandHandler<BankCommand, BankingEvent> for TransferMoneyHandler {
    async fn handle(
        &self,
        command: &BankCommand,
        context: &HandlerContext,
    ) -> Result<HandlerOutput<BankingEvent>, HandlerError> {
        let BankCommand::TransferMoney(transfer) = command else {
            return Err(mismatched(BankCommandKind::TransferMoney, command));
        };

        if context.is_cancelled() {
            return Err(HandlerError::Cancelled);
        }
        if transfer.from == transfer.to {
            return Ok(HandlerOutput::failed(format!(
                "Cannot transfer from account {} to itself",
                transfer.from
            )));
        }
        if transfer.amount.is_zero() {
            return Ok(HandlerOutput::failed("Transfer amount must be positive"));
        }

        let withdrawn = MoneyWithdrawn {
            account_id: transfer.from.clone(),
            amount: transfer.amount,
            counterparty: transfer.to.clone(),
        };
        let deposited = MoneyDeposited {
            account_id: transfer.to.clone(),
            amount: transfer.amount,
            counterparty: transfer.from.clone(),
        };

        Ok(
            HandlerOutput::ok(vec![withdrawn.into(), deposited.into()]).with_message(format!(
                "Transferred {} from {} to {}",
                transfer.amount, transfer.from, transfer.to
            )),
        )
    }
}

/// A registry with a handler for every banking command.
pub fn registry() -> Result<HandlerRegistry<BankCommand, BankingEvent>, RegistryError> {
    Ok(HandlerRegistry::builder()
        .register(BankCommandKind::CreateAccount, CreateAccountHandler)?
        .register(BankCommandKind::TransferMoney, TransferMoneyHandler)?
        .build())
}
