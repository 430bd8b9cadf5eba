//! Bank details repository
//!
//! One row per contributor; saving again replaces the previous account.

use crate::db::{Backend, DynDatabasePool};
use crate::models::{BankDetails, NewBankDetails};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

const BANK_COLUMNS: &str = "id, user_id, account_last4, routing_number, account_holder_name, bank_name, sealed_payload, created_at, updated_at";

#[async_trait]
pub trait BankDetailsRepository: Send + Sync {
    /// Insert or replace the user's bank details
    async fn upsert(&self, details: &NewBankDetails) -> Result<BankDetails>;

    async fn get_by_user(&self, user_id: i64) -> Result<Option<BankDetails>>;
}

pub struct SqlxBankDetailsRepository {
    pool: DynDatabasePool,
}

impl SqlxBankDetailsRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn BankDetailsRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl BankDetailsRepository for SqlxBankDetailsRepository {
    async fn upsert(&self, details: &NewBankDetails) -> Result<BankDetails> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => upsert_sqlite(pool, details).await?,
            Backend::Mysql(pool) => upsert_mysql(pool, details).await?,
        }
        self.get_by_user(details.user_id)
            .await?
            .context("Bank details missing after upsert")
    }

    async fn get_by_user(&self, user_id: i64) -> Result<Option<BankDetails>> {
        let sql = format!("SELECT {} FROM bank_details WHERE user_id = ?", BANK_COLUMNS);
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                let row = sqlx::query(&sql)
                    .bind(user_id)
                    .fetch_optional(pool)
                    .await
                    .context("Failed to get bank details")?;
                Ok(row.map(|row| row_to_bank_details_sqlite(&row)))
            }
            Backend::Mysql(pool) => {
                let row = sqlx::query(&sql)
                    .bind(user_id)
                    .fetch_optional(pool)
                    .await
                    .context("Failed to get bank details")?;
                Ok(row.map(|row| row_to_bank_details_mysql(&row)))
            }
        }
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn upsert_sqlite(pool: &SqlitePool, details: &NewBankDetails) -> Result<()> {
    let now = Utc::now();
    sqlx::query(
        r#"
        INSERT INTO bank_details
            (user_id, account_last4, routing_number, account_holder_name, bank_name, sealed_payload, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(user_id) DO UPDATE SET
            account_last4 = excluded.account_last4,
            routing_number = excluded.routing_number,
            account_holder_name = excluded.account_holder_name,
            bank_name = excluded.bank_name,
            sealed_payload = excluded.sealed_payload,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(details.user_id)
    .bind(&details.account_last4)
    .bind(&details.routing_number)
    .bind(&details.account_holder_name)
    .bind(&details.bank_name)
    .bind(&details.sealed_payload)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to save bank details")?;
    Ok(())
}

fn row_to_bank_details_sqlite(row: &sqlx::sqlite::SqliteRow) -> BankDetails {
    BankDetails {
        id: row.get("id"),
        user_id: row.get("user_id"),
        account_last4: row.get("account_last4"),
        routing_number: row.get("routing_number"),
        account_holder_name: row.get("account_holder_name"),
        bank_name: row.get("bank_name"),
        sealed_payload: row.get("sealed_payload"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn upsert_mysql(pool: &MySqlPool, details: &NewBankDetails) -> Result<()> {
    let now = Utc::now();
    sqlx::query(
        r#"
        INSERT INTO bank_details
            (user_id, account_last4, routing_number, account_holder_name, bank_name, sealed_payload, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ON DUPLICATE KEY UPDATE
            account_last4 = VALUES(account_last4),
            routing_number = VALUES(routing_number),
            account_holder_name = VALUES(account_holder_name),
            bank_name = VALUES(bank_name),
            sealed_payload = VALUES(sealed_payload),
            updated_at = VALUES(updated_at)
        "#,
    )
    .bind(details.user_id)
    .bind(&details.account_last4)
    .bind(&details.routing_number)
    .bind(&details.account_holder_name)
    .bind(&details.bank_name)
    .bind(&details.sealed_payload)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to save bank details")?;
    Ok(())
}

fn row_to_bank_details_mysql(row: &sqlx::mysql::MySqlRow) -> BankDetails {
    BankDetails {
        id: row.get("id"),
        user_id: row.get("user_id"),
        account_last4: row.get("account_last4"),
        routing_number: row.get("routing_number"),
        account_holder_name: row.get("account_holder_name"),
        bank_name: row.get("bank_name"),
        sealed_payload: row.get("sealed_payload"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}
