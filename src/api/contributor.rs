//! Contributor onboarding
//!
//! - POST /api/contributor/setup - Save the contributor profile

use axum::{extract::State, routing::post, Json, Router};
use serde::Serialize;

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::User;
use crate::services::SetupProfileInput;

pub fn router() -> Router<AppState> {
    Router::new().route("/setup", post(setup_profile))
}

#[derive(Debug, Serialize)]
pub struct SetupResponse {
    pub message: &'static str,
    pub user: User,
}

async fn setup_profile(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<SetupProfileInput>,
) -> Result<Json<SetupResponse>, ApiError> {
    let user = state.user_service.setup_profile(user.0.id, body).await?;
    tracing::info!(user_id = user.id, "Contributor profile saved");

    Ok(Json(SetupResponse {
        message: "Profile updated successfully",
        user,
    }))
}
