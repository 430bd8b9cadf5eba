//! Notification API endpoints
//!
//! - GET /api/notifications - List (`?limit=&unreadOnly=`)
//! - POST /api/notifications - Create for the current user
//! - PATCH /api/notifications - Bulk mark as read
//! - GET /api/notifications/unread-count - Unread counter
//! - PATCH /api/notifications/{id} - Set the read flag
//! - DELETE /api/notifications/{id} - Delete

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{NewNotification, Notification, NotificationChannel, NotificationType};

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(list_notifications)
                .post(create_notification)
                .patch(bulk_update),
        )
        .route("/unread-count", get(unread_count))
        .route(
            "/{id}",
            patch(update_notification).delete(delete_notification),
        )
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub limit: Option<i64>,
    #[serde(default)]
    pub unread_only: bool,
}

#[derive(Debug, Serialize)]
pub struct NotificationsResponse {
    pub notifications: Vec<Notification>,
}

#[derive(Debug, Serialize)]
pub struct NotificationResponse {
    pub notification: Notification,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated: Option<u64>,
}

async fn list_notifications(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<NotificationsResponse>, ApiError> {
    let notifications = state
        .notification_service
        .list(user.0.id, query.limit, query.unread_only)
        .await?;
    Ok(Json(NotificationsResponse { notifications }))
}

#[derive(Debug, Deserialize)]
pub struct CreateNotificationRequest {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub title: Option<String>,
    pub message: Option<String>,
    #[serde(default)]
    pub channels: Vec<String>,
}

async fn create_notification(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<CreateNotificationRequest>,
) -> Result<(StatusCode, Json<NotificationResponse>), ApiError> {
    let missing = || ApiError::validation_error("Missing required fields: type, title, message");
    let kind = body.kind.filter(|k| !k.trim().is_empty()).ok_or_else(missing)?;
    let title = body.title.filter(|t| !t.trim().is_empty()).ok_or_else(missing)?;
    let message = body.message.filter(|m| !m.trim().is_empty()).ok_or_else(missing)?;

    let kind: NotificationType = kind
        .parse()
        .map_err(|_| ApiError::validation_error(format!("Invalid notification type: {}", kind)))?;
    let channels = body
        .channels
        .iter()
        .map(|c| c.parse::<NotificationChannel>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ApiError::validation_error(e.to_string()))?;

    let notification = state
        .notification_service
        .create(NewNotification::new(user.0.id, kind, title, message).with_channels(channels))
        .await?;

    Ok((StatusCode::CREATED, Json(NotificationResponse { notification })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkUpdateRequest {
    pub action: Option<String>,
    #[serde(default)]
    pub notification_ids: Option<Vec<i64>>,
}

async fn bulk_update(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<BulkUpdateRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    match (body.action.as_deref(), body.notification_ids) {
        (Some("markAllAsRead"), _) => {
            let updated = state.notification_service.mark_all_read(user.0.id).await?;
            Ok(Json(MessageResponse {
                success: true,
                message: "All notifications marked as read",
                updated: Some(updated),
            }))
        }
        (Some("markAsRead"), Some(ids)) if !ids.is_empty() => {
            let updated = state.notification_service.mark_read(user.0.id, &ids).await?;
            Ok(Json(MessageResponse {
                success: true,
                message: "Notifications marked as read",
                updated: Some(updated),
            }))
        }
        _ => Err(ApiError::validation_error("Invalid action")),
    }
}

#[derive(Debug, Serialize)]
pub struct UnreadCountResponse {
    pub count: i64,
}

async fn unread_count(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<UnreadCountResponse>, ApiError> {
    let count = state.notification_service.unread_count(user.0.id).await?;
    Ok(Json(UnreadCountResponse { count }))
}

fn default_read() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct UpdateNotificationRequest {
    #[serde(default = "default_read")]
    pub read: bool,
}

async fn update_notification(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<UpdateNotificationRequest>,
) -> Result<Json<NotificationResponse>, ApiError> {
    let notification = state
        .notification_service
        .set_read(user.0.id, id, body.read)
        .await?;
    Ok(Json(NotificationResponse { notification }))
}

async fn delete_notification(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.notification_service.delete(user.0.id, id).await?;
    Ok(Json(MessageResponse {
        success: true,
        message: "Notification deleted successfully",
        updated: None,
    }))
}
