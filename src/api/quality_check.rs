//! Quality check API
//!
//! - POST /api/quality-check - Score sample images (multipart field `images`)

use axum::{
    extract::{Multipart, State},
    routing::post,
    Json, Router,
};

use crate::api::common::read_image_parts;
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::services::QualityReport;

pub fn router() -> Router<AppState> {
    Router::new().route("/", post(run_quality_check))
}

async fn run_quality_check(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    mut multipart: Multipart,
) -> Result<Json<QualityReport>, ApiError> {
    let images = read_image_parts(&mut multipart, &["images"]).await?;
    if images.is_empty() {
        return Err(ApiError::validation_error("No images provided"));
    }

    let report = state
        .quality_check_service
        .evaluate(user.0.id, images)
        .await?;
    Ok(Json(report))
}
