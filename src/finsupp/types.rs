use clap::ValueEnum;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of bank account
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountType {
  #[default]
  Checking,
  Savings,
  Investment,
}

impl AccountType {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Checking => "CHECKING",
      Self::Savings => "SAVINGS",
      Self::Investment => "INVESTMENT",
    }
  }
}

impl fmt::Display for AccountType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.pad(self.as_str())
  }
}

/// Bank account owned by the logged-in user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
  pub id: i64,
  pub description: String,
  pub bank: i64, // Bank id from the bank listing
  pub account_type: AccountType,
  pub closing_day: u8,
  pub payment_due_day: u8,
  #[serde(with = "rust_decimal::serde::float")]
  pub balance: Decimal,
}

impl Account {
  /// Case-insensitive description match; a blank query matches everything.
  pub fn matches(&self, query: &str) -> bool {
    let query = query.trim();
    query.is_empty()
      || self
        .description
        .to_lowercase()
        .contains(&query.to_lowercase())
  }
}

/// Bank available when creating accounts
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Bank {
  pub id: i64,
  pub name: String,
}

/// Transaction category
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Category {
  pub id: i64,
  pub description: String,
}

/// Direction of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
  Withdraw,
  Deposit,
  Transfer,
}

impl fmt::Display for TransactionType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.pad(match self {
      Self::Withdraw => "WITHDRAW",
      Self::Deposit => "DEPOSIT",
      Self::Transfer => "TRANSFER",
    })
  }
}

/// Recorded transaction
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
  pub id: i64,
  pub description: String,
  #[serde(with = "rust_decimal::serde::float")]
  pub amount: Decimal,
  #[serde(rename = "type")]
  pub transaction_type: TransactionType,
  pub transaction_date: String,
  pub account: i64,                      // Source account id
  pub recipient_account_id: Option<i64>, // Destination account, transfers only
  pub category: Option<i64>,
}
