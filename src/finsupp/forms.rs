//! Input validation for create/update commands.

use chrono::NaiveDate;
use color_eyre::{eyre::eyre, Result};
use rust_decimal::Decimal;

use super::api_types::{AccountRequest, CreateTransactionRequest};
use super::types::{Account, AccountType, TransactionType};

/// Account fields given on the command line. Unset fields keep their
/// current value on update, or take the defaults on create.
#[derive(Debug, Clone, Default)]
pub struct AccountDraft {
  pub description: Option<String>,
  pub account_type: Option<AccountType>,
  pub bank: Option<i64>,
  pub balance: Option<Decimal>,
  pub closing_day: Option<u8>,
  pub payment_due_day: Option<u8>,
}

impl AccountDraft {
  const DEFAULT_CLOSING_DAY: u8 = 1;
  const DEFAULT_DUE_DAY: u8 = 10;

  /// Build the body for a new account.
  pub fn into_create_request(self) -> Result<AccountRequest> {
    let description = non_blank(self.description, "description")?;
    let bank = self.bank.ok_or_else(|| eyre!("A bank must be selected"))?;

    Ok(AccountRequest {
      description,
      account_type: self.account_type.unwrap_or_default(),
      bank,
      balance: self.balance.unwrap_or_default(),
      closing_day: self.closing_day.unwrap_or(Self::DEFAULT_CLOSING_DAY),
      payment_due_day: self.payment_due_day.unwrap_or(Self::DEFAULT_DUE_DAY),
    })
  }

  /// Build the body for updating `current`.
  pub fn into_update_request(self, current: &Account) -> Result<AccountRequest> {
    let description = match self.description {
      Some(d) => non_blank(Some(d), "description")?,
      None => current.description.clone(),
    };

    Ok(AccountRequest {
      description,
      account_type: self.account_type.unwrap_or(current.account_type),
      bank: self.bank.unwrap_or(current.bank),
      balance: self.balance.unwrap_or(current.balance),
      closing_day: self.closing_day.unwrap_or(current.closing_day),
      payment_due_day: self.payment_due_day.unwrap_or(current.payment_due_day),
    })
  }
}

/// Transaction fields given on the command line.
#[derive(Debug, Clone)]
pub struct TransactionDraft {
  pub transaction_type: TransactionType,
  pub description: String,
  pub amount: Decimal,
  pub date: Option<NaiveDate>,
  pub account: Option<i64>,
  pub to_account: Option<i64>,
  pub category: Option<i64>,
}

impl TransactionDraft {
  /// Validate and build the request body. `today` fills a missing date.
  pub fn into_request(self, today: NaiveDate) -> Result<CreateTransactionRequest> {
    let description = non_blank(Some(self.description), "description")?;
    let account_id = self
      .account
      .ok_or_else(|| eyre!("A source account must be selected"))?;

    if self.amount <= Decimal::ZERO {
      return Err(eyre!("Amount must be greater than zero"));
    }

    let recipient_account_id = match self.transaction_type {
      TransactionType::Transfer => Some(
        self
          .to_account
          .ok_or_else(|| eyre!("Select the destination account for a transfer"))?,
      ),
      // Only transfers carry a destination
      TransactionType::Withdraw | TransactionType::Deposit => None,
    };

    Ok(CreateTransactionRequest {
      description,
      amount: self.amount,
      transaction_date: self.date.unwrap_or(today),
      transaction_type: self.transaction_type,
      account_id,
      recipient_account_id,
      category: self.category,
      add_to_bill: false,
      installments: 1,
    })
  }
}

fn non_blank(value: Option<String>, field: &str) -> Result<String> {
  match value {
    Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
    _ => Err(eyre!("The {} field is required", field)),
  }
}
