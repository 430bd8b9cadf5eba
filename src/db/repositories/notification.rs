//! Notification repository
//!
//! Every query is scoped by `user_id` so one contributor can never read or
//! change another contributor's notifications.

use crate::db::{Backend, DynDatabasePool};
use crate::models::{
    decode_channels, encode_channels, NewNotification, Notification, NotificationType,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

const NOTIFICATION_COLUMNS: &str =
    "id, user_id, kind, title, message, is_read, channels, sent_at, created_at";

#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn create(&self, notification: &NewNotification) -> Result<Notification>;

    async fn get(&self, user_id: i64, id: i64) -> Result<Option<Notification>>;

    /// Newest first
    async fn list(&self, user_id: i64, limit: i64, unread_only: bool) -> Result<Vec<Notification>>;

    async fn mark_all_read(&self, user_id: i64) -> Result<u64>;

    async fn mark_read(&self, user_id: i64, ids: &[i64]) -> Result<u64>;

    /// Set the read flag of one notification; `None` when it isn't the user's
    async fn set_read(&self, user_id: i64, id: i64, read: bool) -> Result<Option<Notification>>;

    async fn delete(&self, user_id: i64, id: i64) -> Result<bool>;

    async fn unread_count(&self, user_id: i64) -> Result<i64>;

    /// Stamp a successful delivery
    async fn mark_sent(&self, id: i64, sent_at: DateTime<Utc>) -> Result<()>;
}

pub struct SqlxNotificationRepository {
    pool: DynDatabasePool,
}

impl SqlxNotificationRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn NotificationRepository> {
        Arc::new(Self::new(pool))
    }
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

#[async_trait]
impl NotificationRepository for SqlxNotificationRepository {
    async fn create(&self, notification: &NewNotification) -> Result<Notification> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => create_notification_sqlite(pool, notification).await,
            Backend::Mysql(pool) => create_notification_mysql(pool, notification).await,
        }
    }

    async fn get(&self, user_id: i64, id: i64) -> Result<Option<Notification>> {
        let sql = format!(
            "SELECT {} FROM notifications WHERE id = ? AND user_id = ?",
            NOTIFICATION_COLUMNS
        );
        match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(&sql)
                .bind(id)
                .bind(user_id)
                .fetch_optional(pool)
                .await
                .context("Failed to get notification")?
                .map(|row| row_to_notification_sqlite(&row))
                .transpose(),
            Backend::Mysql(pool) => sqlx::query(&sql)
                .bind(id)
                .bind(user_id)
                .fetch_optional(pool)
                .await
                .context("Failed to get notification")?
                .map(|row| row_to_notification_mysql(&row))
                .transpose(),
        }
    }

    async fn list(&self, user_id: i64, limit: i64, unread_only: bool) -> Result<Vec<Notification>> {
        let filter = if unread_only { " AND is_read = ?" } else { "" };
        let sql = format!(
            "SELECT {} FROM notifications WHERE user_id = ?{} ORDER BY created_at DESC, id DESC LIMIT ?",
            NOTIFICATION_COLUMNS, filter
        );
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                let mut query = sqlx::query(&sql).bind(user_id);
                if unread_only {
                    query = query.bind(false);
                }
                let rows = query
                    .bind(limit)
                    .fetch_all(pool)
                    .await
                    .context("Failed to list notifications")?;
                rows.iter().map(row_to_notification_sqlite).collect()
            }
            Backend::Mysql(pool) => {
                let mut query = sqlx::query(&sql).bind(user_id);
                if unread_only {
                    query = query.bind(false);
                }
                let rows = query
                    .bind(limit)
                    .fetch_all(pool)
                    .await
                    .context("Failed to list notifications")?;
                rows.iter().map(row_to_notification_mysql).collect()
            }
        }
    }

    async fn mark_all_read(&self, user_id: i64) -> Result<u64> {
        let sql = "UPDATE notifications SET is_read = ? WHERE user_id = ? AND is_read = ?";
        let affected = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql)
                .bind(true)
                .bind(user_id)
                .bind(false)
                .execute(pool)
                .await
                .context("Failed to mark notifications as read")?
                .rows_affected(),
            Backend::Mysql(pool) => sqlx::query(sql)
                .bind(true)
                .bind(user_id)
                .bind(false)
                .execute(pool)
                .await
                .context("Failed to mark notifications as read")?
                .rows_affected(),
        };
        Ok(affected)
    }

    async fn mark_read(&self, user_id: i64, ids: &[i64]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let sql = format!(
            "UPDATE notifications SET is_read = ? WHERE user_id = ? AND id IN ({})",
            placeholders(ids.len())
        );
        let affected = match self.pool.backend() {
            Backend::Sqlite(pool) => {
                let mut query = sqlx::query(&sql).bind(true).bind(user_id);
                for id in ids {
                    query = query.bind(*id);
                }
                query
                    .execute(pool)
                    .await
                    .context("Failed to mark notifications as read")?
                    .rows_affected()
            }
            Backend::Mysql(pool) => {
                let mut query = sqlx::query(&sql).bind(true).bind(user_id);
                for id in ids {
                    query = query.bind(*id);
                }
                query
                    .execute(pool)
                    .await
                    .context("Failed to mark notifications as read")?
                    .rows_affected()
            }
        };
        Ok(affected)
    }

    async fn set_read(&self, user_id: i64, id: i64, read: bool) -> Result<Option<Notification>> {
        // MySQL reports zero affected rows for an unchanged value, so ownership
        // is decided by the follow-up read.
        let sql = "UPDATE notifications SET is_read = ? WHERE id = ? AND user_id = ?";
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                sqlx::query(sql)
                    .bind(read)
                    .bind(id)
                    .bind(user_id)
                    .execute(pool)
                    .await
                    .context("Failed to update notification")?;
            }
            Backend::Mysql(pool) => {
                sqlx::query(sql)
                    .bind(read)
                    .bind(id)
                    .bind(user_id)
                    .execute(pool)
                    .await
                    .context("Failed to update notification")?;
            }
        }
        self.get(user_id, id).await
    }

    async fn delete(&self, user_id: i64, id: i64) -> Result<bool> {
        let sql = "DELETE FROM notifications WHERE id = ? AND user_id = ?";
        let affected = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql)
                .bind(id)
                .bind(user_id)
                .execute(pool)
                .await
                .context("Failed to delete notification")?
                .rows_affected(),
            Backend::Mysql(pool) => sqlx::query(sql)
                .bind(id)
                .bind(user_id)
                .execute(pool)
                .await
                .context("Failed to delete notification")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn unread_count(&self, user_id: i64) -> Result<i64> {
        let sql = "SELECT COUNT(*) as count FROM notifications WHERE user_id = ? AND is_read = ?";
        let count: i64 = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql)
                .bind(user_id)
                .bind(false)
                .fetch_one(pool)
                .await
                .context("Failed to count unread notifications")?
                .get("count"),
            Backend::Mysql(pool) => sqlx::query(sql)
                .bind(user_id)
                .bind(false)
                .fetch_one(pool)
                .await
                .context("Failed to count unread notifications")?
                .get("count"),
        };
        Ok(count)
    }

    async fn mark_sent(&self, id: i64, sent_at: DateTime<Utc>) -> Result<()> {
        let sql = "UPDATE notifications SET sent_at = ? WHERE id = ?";
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                sqlx::query(sql)
                    .bind(sent_at)
                    .bind(id)
                    .execute(pool)
                    .await
                    .context("Failed to mark notification as sent")?;
            }
            Backend::Mysql(pool) => {
                sqlx::query(sql)
                    .bind(sent_at)
                    .bind(id)
                    .execute(pool)
                    .await
                    .context("Failed to mark notification as sent")?;
            }
        }
        Ok(())
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_notification_sqlite(
    pool: &SqlitePool,
    notification: &NewNotification,
) -> Result<Notification> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO notifications (user_id, kind, title, message, is_read, channels, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(notification.user_id)
    .bind(notification.kind.as_str())
    .bind(&notification.title)
    .bind(&notification.message)
    .bind(false)
    .bind(encode_channels(&notification.channels))
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create notification")?;

    Ok(Notification {
        id: result.last_insert_rowid(),
        user_id: notification.user_id,
        kind: notification.kind,
        title: notification.title.clone(),
        message: notification.message.clone(),
        read: false,
        channels: notification.channels.clone(),
        sent_at: None,
        created_at: now,
    })
}

fn row_to_notification_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Notification> {
    let kind: String = row.get("kind");
    let channels: String = row.get("channels");
    Ok(Notification {
        id: row.get("id"),
        user_id: row.get("user_id"),
        kind: NotificationType::from_str(&kind)?,
        title: row.get("title"),
        message: row.get("message"),
        read: row.get("is_read"),
        channels: decode_channels(&channels),
        sent_at: row.get("sent_at"),
        created_at: row.get("created_at"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_notification_mysql(
    pool: &MySqlPool,
    notification: &NewNotification,
) -> Result<Notification> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO notifications (user_id, kind, title, message, is_read, channels, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(notification.user_id)
    .bind(notification.kind.as_str())
    .bind(&notification.title)
    .bind(&notification.message)
    .bind(false)
    .bind(encode_channels(&notification.channels))
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create notification")?;

    Ok(Notification {
        id: result.last_insert_id() as i64,
        user_id: notification.user_id,
        kind: notification.kind,
        title: notification.title.clone(),
        message: notification.message.clone(),
        read: false,
        channels: notification.channels.clone(),
        sent_at: None,
        created_at: now,
    })
}

fn row_to_notification_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Notification> {
    let kind: String = row.get("kind");
    let channels: String = row.get("channels");
    Ok(Notification {
        id: row.get("id"),
        user_id: row.get("user_id"),
        kind: NotificationType::from_str(&kind)?,
        title: row.get("title"),
        message: row.get("message"),
        read: row.get("is_read"),
        channels: decode_channels(&channels),
        sent_at: row.get("sent_at"),
        created_at: row.get("created_at"),
    })
}
