//! Payout bank details
//!
//! - GET /api/bank-details - Masked account on file
//! - POST /api/bank-details - Save or replace the account

use axum::{
    extract::State,
    routing::get,
    Json, Router,
};
use serde::Serialize;

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{BankDetails, BankDetailsInput};

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(get_bank_details).post(save_bank_details))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BankDetailsView {
    #[serde(flatten)]
    pub details: BankDetails,
    pub masked_account: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BankDetailsResponse {
    pub bank_details: Option<BankDetailsView>,
}

#[derive(Debug, Serialize)]
pub struct SaveResponse {
    pub success: bool,
    pub message: &'static str,
}

async fn get_bank_details(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<BankDetailsResponse>, ApiError> {
    let details = state.bank_details_service.get(user.0.id).await?;
    Ok(Json(BankDetailsResponse {
        bank_details: details.map(|details| BankDetailsView {
            masked_account: details.masked_account(),
            details,
        }),
    }))
}

async fn save_bank_details(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<BankDetailsInput>,
) -> Result<Json<SaveResponse>, ApiError> {
    state.bank_details_service.save(user.0.id, body).await?;
    Ok(Json(SaveResponse {
        success: true,
        message: "Bank details saved successfully",
    }))
}
