//! Payout bank details

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stored payout account. Only the last four digits of the account number
/// are kept in clear; the sealed payload never leaves the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankDetails {
    pub id: i64,
    pub user_id: i64,
    pub account_last4: String,
    pub routing_number: String,
    pub account_holder_name: String,
    pub bank_name: String,
    #[serde(skip_serializing, default)]
    pub sealed_payload: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BankDetails {
    /// Account number as shown to the owner, e.g. `****6789`
    pub fn masked_account(&self) -> String {
        format!("****{}", self.account_last4)
    }
}

/// Bank details as submitted by the client
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankDetailsInput {
    #[serde(default)]
    pub account_number: Option<String>,
    #[serde(default)]
    pub routing_number: Option<String>,
    #[serde(default)]
    pub account_holder_name: Option<String>,
    #[serde(default)]
    pub bank_name: Option<String>,
}

/// Validated values ready to be written
#[derive(Debug, Clone)]
pub struct NewBankDetails {
    pub user_id: i64,
    pub account_last4: String,
    pub routing_number: String,
    pub account_holder_name: String,
    pub bank_name: String,
    pub sealed_payload: String,
}

/// Last four characters of an account number (the whole value if shorter)
pub fn last_four(account_number: &str) -> String {
    let chars: Vec<char> = account_number.chars().collect();
    let start = chars.len().saturating_sub(4);
    chars[start..].iter().collect()
}
