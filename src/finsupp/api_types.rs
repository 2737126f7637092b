//! Serde types matching FinSupp API requests and responses.
//!
//! These types are separate from domain types to allow clean (de)serialization
//! while keeping domain types focused on application needs.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::types::{AccountType, TransactionType};

// ============================================================================
// Envelopes
// ============================================================================

/// Listing envelope shared by every collection endpoint.
#[derive(Debug, Deserialize)]
pub struct ApiListResponse<T> {
  #[serde(default)]
  pub message: Option<String>,
  #[serde(rename = "dataList")]
  pub data_list: Option<Vec<T>>,
}

/// Build the advisory text for a failed request.
///
/// Validation failures carry `dataList: [{description}]`; those descriptions
/// win over the top-level `message`. Bodies that are not JSON are shown as-is.
pub fn error_advisory(raw: &str, status: u16) -> String {
  let fallback = || format!("Request failed ({})", status);

  let value: Value = match serde_json::from_str(raw) {
    Ok(value) => value,
    Err(_) if raw.trim().is_empty() => return fallback(),
    Err(_) => return raw.trim().to_string(),
  };

  let descriptions: Vec<&str> = value
    .get("dataList")
    .and_then(Value::as_array)
    .map(|items| {
      items
        .iter()
        .filter_map(|item| item.get("description").and_then(Value::as_str))
        .collect()
    })
    .unwrap_or_default();

  if !descriptions.is_empty() {
    return descriptions.join("\n");
  }

  value
    .get("message")
    .and_then(Value::as_str)
    .map(String::from)
    .unwrap_or_else(fallback)
}

// ============================================================================
// Auth
// ============================================================================

#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
  pub email: &'a str,
  pub password: &'a str,
}

#[derive(Debug, Serialize)]
pub struct RegisterRequest<'a> {
  pub name: &'a str,
  pub email: &'a str,
  pub password: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct LoginResponse {
  #[serde(default)]
  pub message: Option<String>,
  #[serde(rename = "type", default)]
  pub kind: Option<String>,
  pub data: Option<UserData>,
}

impl LoginResponse {
  pub fn is_success(&self) -> bool {
    self.kind.as_deref() == Some("Success")
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserData {
  pub name: String,
  pub token: String,
}

// ============================================================================
// Accounts
// ============================================================================

/// Body of account create and update calls.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountRequest {
  pub description: String,
  pub account_type: AccountType,
  pub bank: i64,
  #[serde(with = "rust_decimal::serde::float")]
  pub balance: Decimal,
  pub closing_day: u8,
  pub payment_due_day: u8,
}

// ============================================================================
// Transactions
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTransactionRequest {
  pub description: String,
  #[serde(with = "rust_decimal::serde::float")]
  pub amount: Decimal,
  pub transaction_date: NaiveDate,
  #[serde(rename = "type")]
  pub transaction_type: TransactionType,
  pub account_id: i64,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub recipient_account_id: Option<i64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub category: Option<i64>,
  pub add_to_bill: bool,
  pub installments: u32,
}
