//! User repository
//!
//! Contributor accounts: registration, lookup, onboarding profile and
//! quality-check outcome.

use crate::db::{Backend, DynDatabasePool};
use crate::models::{ContributorStatus, ExperienceLevel, ProfileInput, User};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

const USER_COLUMNS: &str = "id, email, password_hash, name, country, phone_number, bio, experience, status, quality_check_passed, quality_check_date, created_at, updated_at";

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, user: &User) -> Result<User>;

    async fn get_by_id(&self, id: i64) -> Result<Option<User>>;

    async fn get_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Write onboarding profile fields. Returns `None` for an unknown user.
    async fn update_profile(&self, id: i64, profile: &ProfileInput) -> Result<Option<User>>;

    /// Record a quality-check outcome and the resulting status.
    async fn record_quality_check(
        &self,
        id: i64,
        passed: bool,
        checked_at: DateTime<Utc>,
    ) -> Result<Option<User>>;

    async fn count(&self) -> Result<i64>;
}

/// SQLx-based user repository (SQLite and MySQL)
pub struct SqlxUserRepository {
    pool: DynDatabasePool,
}

impl SqlxUserRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }
}

fn status_for(passed: bool) -> ContributorStatus {
    if passed {
        ContributorStatus::Active
    } else {
        ContributorStatus::Rejected
    }
}

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create(&self, user: &User) -> Result<User> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => create_user_sqlite(pool, user).await,
            Backend::Mysql(pool) => create_user_mysql(pool, user).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => get_user_by_id_sqlite(pool, id).await,
            Backend::Mysql(pool) => get_user_by_id_mysql(pool, id).await,
        }
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => get_user_by_email_sqlite(pool, email).await,
            Backend::Mysql(pool) => get_user_by_email_mysql(pool, email).await,
        }
    }

    async fn update_profile(&self, id: i64, profile: &ProfileInput) -> Result<Option<User>> {
        let affected = match self.pool.backend() {
            Backend::Sqlite(pool) => update_profile_sqlite(pool, id, profile).await?,
            Backend::Mysql(pool) => update_profile_mysql(pool, id, profile).await?,
        };
        if affected == 0 {
            return Ok(None);
        }
        self.get_by_id(id).await
    }

    async fn record_quality_check(
        &self,
        id: i64,
        passed: bool,
        checked_at: DateTime<Utc>,
    ) -> Result<Option<User>> {
        let affected = match self.pool.backend() {
            Backend::Sqlite(pool) => {
                record_quality_check_sqlite(pool, id, passed, checked_at).await?
            }
            Backend::Mysql(pool) => record_quality_check_mysql(pool, id, passed, checked_at).await?,
        };
        if affected == 0 {
            return Ok(None);
        }
        self.get_by_id(id).await
    }

    async fn count(&self) -> Result<i64> {
        let count: i64 = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query("SELECT COUNT(*) as count FROM users")
                .fetch_one(pool)
                .await
                .context("Failed to count users")?
                .get("count"),
            Backend::Mysql(pool) => sqlx::query("SELECT COUNT(*) as count FROM users")
                .fetch_one(pool)
                .await
                .context("Failed to count users")?
                .get("count"),
        };
        Ok(count)
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_user_sqlite(pool: &SqlitePool, user: &User) -> Result<User> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO users (email, password_hash, status, quality_check_passed, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(user.status.to_string())
    .bind(user.quality_check_passed)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create user")?;

    Ok(User {
        id: result.last_insert_rowid(),
        created_at: now,
        updated_at: now,
        ..user.clone()
    })
}

async fn get_user_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<User>> {
    let sql = format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get user by ID")?;

    row.map(|row| row_to_user_sqlite(&row)).transpose()
}

async fn get_user_by_email_sqlite(pool: &SqlitePool, email: &str) -> Result<Option<User>> {
    let sql = format!("SELECT {} FROM users WHERE email = ?", USER_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(email)
        .fetch_optional(pool)
        .await
        .context("Failed to get user by email")?;

    row.map(|row| row_to_user_sqlite(&row)).transpose()
}

async fn update_profile_sqlite(pool: &SqlitePool, id: i64, profile: &ProfileInput) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE users
        SET name = ?, country = ?, phone_number = ?, bio = ?, experience = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&profile.name)
    .bind(&profile.country)
    .bind(&profile.phone_number)
    .bind(&profile.bio)
    .bind(profile.experience.to_string())
    .bind(Utc::now())
    .bind(id)
    .execute(pool)
    .await
    .context("Failed to update user profile")?;

    Ok(result.rows_affected())
}

async fn record_quality_check_sqlite(
    pool: &SqlitePool,
    id: i64,
    passed: bool,
    checked_at: DateTime<Utc>,
) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE users
        SET quality_check_passed = ?, quality_check_date = ?, status = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(passed)
    .bind(checked_at)
    .bind(status_for(passed).to_string())
    .bind(Utc::now())
    .bind(id)
    .execute(pool)
    .await
    .context("Failed to record quality check")?;

    Ok(result.rows_affected())
}

fn row_to_user_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<User> {
    let status: String = row.get("status");
    let experience: Option<String> = row.get("experience");

    Ok(User {
        id: row.get("id"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        name: row.get("name"),
        country: row.get("country"),
        phone_number: row.get("phone_number"),
        bio: row.get("bio"),
        experience: experience
            .as_deref()
            .map(ExperienceLevel::from_str)
            .transpose()?,
        status: ContributorStatus::from_str(&status)?,
        quality_check_passed: row.get("quality_check_passed"),
        quality_check_date: row.get("quality_check_date"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_user_mysql(pool: &MySqlPool, user: &User) -> Result<User> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO users (email, password_hash, status, quality_check_passed, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(user.status.to_string())
    .bind(user.quality_check_passed)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create user")?;

    Ok(User {
        id: result.last_insert_id() as i64,
        created_at: now,
        updated_at: now,
        ..user.clone()
    })
}

async fn get_user_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<User>> {
    let sql = format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get user by ID")?;

    row.map(|row| row_to_user_mysql(&row)).transpose()
}

async fn get_user_by_email_mysql(pool: &MySqlPool, email: &str) -> Result<Option<User>> {
    let sql = format!("SELECT {} FROM users WHERE email = ?", USER_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(email)
        .fetch_optional(pool)
        .await
        .context("Failed to get user by email")?;

    row.map(|row| row_to_user_mysql(&row)).transpose()
}

async fn update_profile_mysql(pool: &MySqlPool, id: i64, profile: &ProfileInput) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE users
        SET name = ?, country = ?, phone_number = ?, bio = ?, experience = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&profile.name)
    .bind(&profile.country)
    .bind(&profile.phone_number)
    .bind(&profile.bio)
    .bind(profile.experience.to_string())
    .bind(Utc::now())
    .bind(id)
    .execute(pool)
    .await
    .context("Failed to update user profile")?;

    Ok(result.rows_affected())
}

async fn record_quality_check_mysql(
    pool: &MySqlPool,
    id: i64,
    passed: bool,
    checked_at: DateTime<Utc>,
) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE users
        SET quality_check_passed = ?, quality_check_date = ?, status = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(passed)
    .bind(checked_at)
    .bind(status_for(passed).to_string())
    .bind(Utc::now())
    .bind(id)
    .execute(pool)
    .await
    .context("Failed to record quality check")?;

    Ok(result.rows_affected())
}

fn row_to_user_mysql(row: &sqlx::mysql::MySqlRow) -> Result<User> {
    let status: String = row.get("status");
    let experience: Option<String> = row.get("experience");

    Ok(User {
        id: row.get("id"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        name: row.get("name"),
        country: row.get("country"),
        phone_number: row.get("phone_number"),
        bio: row.get("bio"),
        experience: experience
            .as_deref()
            .map(ExperienceLevel::from_str)
            .transpose()?,
        status: ContributorStatus::from_str(&status)?,
        quality_check_passed: row.get("quality_check_passed"),
        quality_check_date: row.get("quality_check_date"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}
