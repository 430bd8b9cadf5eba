//! Image pipeline API
//!
//! - GET /api/images - List the user's images (`?status=`)
//! - POST /api/images - Upload (multipart fields `files` or `images`)
//! - DELETE /api/images - Remove every image
//! - GET /api/images/stats - Dashboard counters
//! - GET /api/images/debug - Per-status breakdown
//! - POST /api/images/submit - Submit completed images for review
//! - POST /api/images/publish-approved - Publish every approved image
//! - POST /api/images/keep-live - Drop everything not yet published
//! - GET /api/images/{id} - One image
//! - PATCH /api/images/{id}/metadata - Partial metadata edit
//! - POST /api/images/{id}/publish - Publish one approved image

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::common::read_image_parts;
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{DebugInfo, ImageRecord, ImageStats, ImageStatus, MetadataPatch, PruneResult};
use crate::services::UploadOutcome;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_images).post(upload_images).delete(clear_images))
        .route("/stats", get(get_stats))
        .route("/debug", get(get_debug))
        .route("/submit", post(submit_images))
        .route("/publish-approved", post(publish_approved))
        .route("/keep-live", post(keep_live))
        .route("/{id}", get(get_image))
        .route("/{id}/metadata", patch(update_metadata))
        .route("/{id}/publish", post(publish_image))
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ImagesResponse {
    pub images: Vec<ImageRecord>,
}

#[derive(Debug, Serialize)]
pub struct ImageResponse {
    pub image: ImageRecord,
}

async fn list_images(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<ImagesResponse>, ApiError> {
    let store = state.lifecycle.store();
    let images = match query.status.as_deref().filter(|s| !s.is_empty()) {
        Some(raw) => {
            let status: ImageStatus = raw
                .parse()
                .map_err(|_| ApiError::validation_error(format!("Invalid status: {}", raw)))?;
            store.list_by_status(user.0.id, status).await
        }
        None => store.list(user.0.id).await,
    };
    Ok(Json(ImagesResponse { images }))
}

async fn upload_images(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadOutcome>), ApiError> {
    let files = read_image_parts(&mut multipart, &["files", "images"]).await?;
    let outcome = state.lifecycle.upload(user.0.id, files).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

#[derive(Debug, Serialize)]
pub struct ClearResponse {
    pub success: bool,
    pub removed: usize,
}

async fn clear_images(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Json<ClearResponse> {
    let removed = state.lifecycle.clear(user.0.id).await;
    Json(ClearResponse {
        success: true,
        removed,
    })
}

async fn get_stats(State(state): State<AppState>, user: AuthenticatedUser) -> Json<ImageStats> {
    Json(state.lifecycle.store().stats(user.0.id).await)
}

async fn get_debug(State(state): State<AppState>, user: AuthenticatedUser) -> Json<DebugInfo> {
    Json(state.lifecycle.store().debug_info(user.0.id).await)
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub success: bool,
    pub submitted: usize,
    pub message: String,
}

async fn submit_images(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<SubmitResponse>, ApiError> {
    let submitted = state.lifecycle.submit_all(user.0.id).await?;
    let message = if submitted == 0 {
        "No completed images to submit".to_string()
    } else {
        format!("{} image(s) submitted for review", submitted)
    };
    Ok(Json(SubmitResponse {
        success: true,
        submitted,
        message,
    }))
}

#[derive(Debug, Serialize)]
pub struct PublishedResponse {
    pub published: usize,
    pub images: Vec<ImageRecord>,
}

async fn publish_approved(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Json<PublishedResponse> {
    let images = state.lifecycle.publish_all_approved(user.0.id).await;
    Json(PublishedResponse {
        published: images.len(),
        images,
    })
}

async fn keep_live(State(state): State<AppState>, user: AuthenticatedUser) -> Json<PruneResult> {
    Json(state.lifecycle.keep_only_live(user.0.id).await)
}

async fn get_image(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<Json<ImageResponse>, ApiError> {
    let image = state
        .lifecycle
        .store()
        .get(user.0.id, &id)
        .await
        .ok_or_else(|| ApiError::not_found("Image not found"))?;
    Ok(Json(ImageResponse { image }))
}

async fn update_metadata(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
    Json(patch): Json<MetadataPatch>,
) -> Result<Json<ImageResponse>, ApiError> {
    if patch.is_empty() {
        return Err(ApiError::validation_error("No metadata fields provided"));
    }
    let image = state
        .lifecycle
        .store()
        .update_metadata(user.0.id, &id, patch)
        .await?;
    Ok(Json(ImageResponse { image }))
}

async fn publish_image(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<Json<ImageResponse>, ApiError> {
    let image = state.lifecycle.publish(user.0.id, &id).await?;
    Ok(Json(ImageResponse { image }))
}
