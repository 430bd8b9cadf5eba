//! Bank details service
//!
//! Validates payout accounts, keeps only the last four digits in clear and
//! seals the full numbers into an opaque payload.

use crate::db::repositories::BankDetailsRepository;
use crate::models::{last_four, BankDetails, BankDetailsInput, NewBankDetails, NewNotification};
use crate::services::notification::NotificationService;
use anyhow::Context;
use chrono::{SecondsFormat, Utc};
use data_encoding::BASE64;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum BankDetailsError {
    #[error("{0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SealedAccount<'a> {
    account_number: &'a str,
    routing_number: &'a str,
    timestamp: String,
}

pub struct BankDetailsService {
    repo: Arc<dyn BankDetailsRepository>,
    notifications: Arc<NotificationService>,
}

impl BankDetailsService {
    pub fn new(
        repo: Arc<dyn BankDetailsRepository>,
        notifications: Arc<NotificationService>,
    ) -> Self {
        Self {
            repo,
            notifications,
        }
    }

    /// Save (or replace) the user's payout account.
    pub async fn save(
        &self,
        user_id: i64,
        input: BankDetailsInput,
    ) -> Result<BankDetails, BankDetailsError> {
        let field = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        let (account_number, routing_number, account_holder_name, bank_name) = match (
            field(input.account_number),
            field(input.routing_number),
            field(input.account_holder_name),
            field(input.bank_name),
        ) {
            (Some(a), Some(r), Some(h), Some(b)) => (a, r, h, b),
            _ => {
                return Err(BankDetailsError::ValidationError(
                    "All fields are required".to_string(),
                ))
            }
        };

        let sealed_payload = seal_account(&account_number, &routing_number)?;
        let details = self
            .repo
            .upsert(&NewBankDetails {
                user_id,
                account_last4: last_four(&account_number),
                routing_number,
                account_holder_name,
                bank_name,
                sealed_payload,
            })
            .await
            .context("Failed to save bank details")?;

        tracing::info!(user_id, "Saved bank details");
        self.notifications
            .notify(NewNotification::bank_details_saved(user_id))
            .await;
        Ok(details)
    }

    pub async fn get(&self, user_id: i64) -> Result<Option<BankDetails>, BankDetailsError> {
        let details = self
            .repo
            .get_by_user(user_id)
            .await
            .context("Failed to load bank details")?;
        Ok(details)
    }
}

/// Base64 of the JSON `{accountNumber, routingNumber, timestamp}`
fn seal_account(account_number: &str, routing_number: &str) -> anyhow::Result<String> {
    let json = serde_json::to_vec(&SealedAccount {
        account_number,
        routing_number,
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    })
    .context("Failed to encode bank details")?;
    Ok(BASE64.encode(&json))
}
