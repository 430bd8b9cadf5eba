//! Notification service
//!
//! Stores notifications per contributor and hands `email`-channel messages
//! to the SMTP sender when one is configured.

use crate::db::repositories::{NotificationRepository, UserRepository};
use crate::models::{NewNotification, Notification, NotificationChannel};
use crate::services::email::EmailService;
use anyhow::Context;
use chrono::Utc;
use std::sync::Arc;

/// Upper bound for a single page of notifications
pub const MAX_LIST_LIMIT: i64 = 100;

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("Notification not found")]
    NotFound,

    #[error("{0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct NotificationService {
    repo: Arc<dyn NotificationRepository>,
    user_repo: Arc<dyn UserRepository>,
    email: Option<Arc<EmailService>>,
    default_limit: i64,
}

impl NotificationService {
    pub fn new(
        repo: Arc<dyn NotificationRepository>,
        user_repo: Arc<dyn UserRepository>,
        default_limit: i64,
    ) -> Self {
        Self {
            repo,
            user_repo,
            email: None,
            default_limit: default_limit.clamp(1, MAX_LIST_LIMIT),
        }
    }

    pub fn with_email(mut self, email: EmailService) -> Self {
        self.email = Some(Arc::new(email));
        self
    }

    /// Store a notification and start email delivery if requested.
    pub async fn create(&self, input: NewNotification) -> Result<Notification, NotificationError> {
        if input.title.trim().is_empty() || input.message.trim().is_empty() {
            return Err(NotificationError::ValidationError(
                "Missing required fields: type, title, message".to_string(),
            ));
        }

        let notification = self
            .repo
            .create(&input)
            .await
            .context("Failed to create notification")?;

        tracing::debug!(
            user_id = notification.user_id,
            kind = %notification.kind,
            "Created notification"
        );

        if notification.channels.contains(&NotificationChannel::Email) {
            self.deliver_email(&notification);
        }
        Ok(notification)
    }

    /// Fire-and-forget variant for background producers (lifecycle, earnings).
    pub async fn notify(&self, input: NewNotification) {
        let user_id = input.user_id;
        if let Err(e) = self.create(input).await {
            tracing::warn!(user_id, "Failed to create notification: {}", e);
        }
    }

    fn deliver_email(&self, notification: &Notification) {
        let Some(email) = self.email.clone() else {
            tracing::debug!(
                notification_id = notification.id,
                "No SMTP relay configured, skipping email delivery"
            );
            return;
        };

        let repo = self.repo.clone();
        let user_repo = self.user_repo.clone();
        let id = notification.id;
        let user_id = notification.user_id;
        let subject = notification.title.clone();
        let body = notification.message.clone();

        tokio::spawn(async move {
            let address = match user_repo.get_by_id(user_id).await {
                Ok(Some(user)) => user.email,
                Ok(None) => return,
                Err(e) => {
                    tracing::warn!(user_id, "Failed to look up notification recipient: {:#}", e);
                    return;
                }
            };

            if let Err(e) = email.send(&address, &subject, &body).await {
                tracing::warn!(notification_id = id, "Email delivery failed: {:#}", e);
                return;
            }
            if let Err(e) = repo.mark_sent(id, Utc::now()).await {
                tracing::warn!(notification_id = id, "Failed to stamp sent_at: {:#}", e);
            }
        });
    }

    /// Newest first. `limit` defaults to the configured page size and is
    /// capped at [`MAX_LIST_LIMIT`].
    pub async fn list(
        &self,
        user_id: i64,
        limit: Option<i64>,
        unread_only: bool,
    ) -> Result<Vec<Notification>, NotificationError> {
        let limit = limit
            .filter(|l| *l > 0)
            .unwrap_or(self.default_limit)
            .min(MAX_LIST_LIMIT);
        let notifications = self
            .repo
            .list(user_id, limit, unread_only)
            .await
            .context("Failed to list notifications")?;
        Ok(notifications)
    }

    pub async fn mark_all_read(&self, user_id: i64) -> Result<u64, NotificationError> {
        let count = self
            .repo
            .mark_all_read(user_id)
            .await
            .context("Failed to mark notifications as read")?;
        Ok(count)
    }

    pub async fn mark_read(&self, user_id: i64, ids: &[i64]) -> Result<u64, NotificationError> {
        if ids.is_empty() {
            return Err(NotificationError::ValidationError(
                "notificationIds must not be empty".to_string(),
            ));
        }
        let count = self
            .repo
            .mark_read(user_id, ids)
            .await
            .context("Failed to mark notifications as read")?;
        Ok(count)
    }

    pub async fn set_read(
        &self,
        user_id: i64,
        id: i64,
        read: bool,
    ) -> Result<Notification, NotificationError> {
        self.repo
            .set_read(user_id, id, read)
            .await
            .context("Failed to update notification")?
            .ok_or(NotificationError::NotFound)
    }

    pub async fn delete(&self, user_id: i64, id: i64) -> Result<(), NotificationError> {
        let deleted = self
            .repo
            .delete(user_id, id)
            .await
            .context("Failed to delete notification")?;
        if deleted {
            Ok(())
        } else {
            Err(NotificationError::NotFound)
        }
    }

    pub async fn unread_count(&self, user_id: i64) -> Result<i64, NotificationError> {
        let count = self
            .repo
            .unread_count(user_id)
            .await
            .context("Failed to count unread notifications")?;
        Ok(count)
    }
}
