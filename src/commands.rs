use chrono::NaiveDate;
use clap::{Args, Subcommand};
use rust_decimal::Decimal;

use crate::finsupp::forms::{AccountDraft, TransactionDraft};
use crate::finsupp::types::{AccountType, TransactionType};

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Command {
  /// Log in (password is read from FINSUPP_PASSWORD)
  Login {
    #[arg(short, long)]
    email: String,
  },
  /// Create a user and log in (password is read from FINSUPP_PASSWORD)
  Register {
    #[arg(short, long)]
    name: String,
    #[arg(short, long)]
    email: String,
  },
  /// Forget the session and the cached accounts
  Logout,
  /// Manage bank accounts
  #[command(subcommand)]
  Accounts(AccountsCommand),
  /// List available banks
  Banks,
  /// List transaction categories
  Categories,
  /// Manage transactions
  #[command(subcommand)]
  Transactions(TransactionsCommand),
}

#[derive(Subcommand, Debug)]
pub enum AccountsCommand {
  /// List accounts (served from the local cache when offline)
  #[command(alias = "ls")]
  List {
    /// Only show accounts whose description contains this text
    #[arg(short, long)]
    search: Option<String>,
  },
  /// Create an account
  Create(AccountArgs),
  /// Change an account; omitted fields keep their value
  Update {
    id: i64,
    #[command(flatten)]
    fields: AccountArgs,
  },
  /// Delete an account
  #[command(alias = "rm")]
  Delete { id: i64 },
}

#[derive(Args, Debug, Clone)]
pub struct AccountArgs {
  #[arg(long)]
  pub description: Option<String>,
  #[arg(long = "type", value_enum)]
  pub account_type: Option<AccountType>,
  /// Bank id (see `finsupp banks`)
  #[arg(long)]
  pub bank: Option<i64>,
  #[arg(long, allow_negative_numbers = true)]
  pub balance: Option<Decimal>,
  /// Day of month the bill closes
  #[arg(long, value_parser = clap::value_parser!(u8).range(1..=31))]
  pub closing_day: Option<u8>,
  /// Day of month the bill is due
  #[arg(long, value_parser = clap::value_parser!(u8).range(1..=31))]
  pub due_day: Option<u8>,
}

impl From<AccountArgs> for AccountDraft {
  fn from(args: AccountArgs) -> Self {
    Self {
      description: args.description,
      account_type: args.account_type,
      bank: args.bank,
      balance: args.balance,
      closing_day: args.closing_day,
      payment_due_day: args.due_day,
    }
  }
}

#[derive(Subcommand, Debug)]
pub enum TransactionsCommand {
  /// List transactions
  #[command(alias = "ls")]
  List,
  /// Record a withdrawal, deposit or transfer
  Create(TransactionArgs),
  /// Delete a transaction
  #[command(alias = "rm")]
  Delete { id: i64 },
}

#[derive(Args, Debug, Clone)]
pub struct TransactionArgs {
  #[arg(long = "type", value_enum, default_value = "withdraw")]
  pub transaction_type: TransactionType,
  #[arg(long)]
  pub description: String,
  #[arg(long)]
  pub amount: Decimal,
  /// Source account id
  #[arg(long)]
  pub account: i64,
  /// Destination account id (transfers only)
  #[arg(long)]
  pub to_account: Option<i64>,
  #[arg(long)]
  pub category: Option<i64>,
  /// Transaction date as YYYY-MM-DD (defaults to today)
  #[arg(long)]
  pub date: Option<NaiveDate>,
}

impl From<TransactionArgs> for TransactionDraft {
  fn from(args: TransactionArgs) -> Self {
    Self {
      transaction_type: args.transaction_type,
      description: args.description,
      amount: args.amount,
      date: args.date,
      account: Some(args.account),
      to_account: args.to_account,
      category: args.category,
    }
  }
}
