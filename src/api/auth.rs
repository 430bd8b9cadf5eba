//! Authentication API endpoints
//!
//! - POST /api/auth/register - Create an account and sign in
//! - POST /api/auth/login - Sign in
//! - POST /api/auth/logout - Sign out
//! - GET /api/auth/me - Current user

use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

use crate::api::middleware::{extract_session_token, ApiError, AppState, AuthenticatedUser, SESSION_COOKIE};
use crate::models::{Session, User};
use crate::services::user::{LoginInput, RegisterInput, UserServiceError};

#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub message: &'static str,
    pub user: User,
    pub token: String,
}

/// Routes reachable without a session
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

/// Routes behind `require_auth`
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/logout", post(logout))
        .route("/me", get(get_current_user))
}

fn session_cookie(state: &AppState, session: &Session) -> Result<HeaderMap, ApiError> {
    let max_age = session.remaining_seconds();
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE, session.id, max_age
    );
    if state.config.auth.secure_cookies {
        cookie.push_str("; Secure");
    }

    let mut headers = HeaderMap::new();
    headers.insert(
        header::SET_COOKIE,
        HeaderValue::from_str(&cookie).map_err(ApiError::internal)?,
    );
    Ok(headers)
}

/// POST /api/auth/register
async fn register(
    State(state): State<AppState>,
    Json(body): Json<CredentialsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .user_service
        .register(RegisterInput::new(body.email, body.password))
        .await?;
    let session = state.user_service.start_session(user.id).await?;
    let headers = session_cookie(&state, &session)?;

    Ok((
        StatusCode::CREATED,
        headers,
        Json(AuthResponse {
            message: "Registration successful",
            user,
            token: session.id,
        }),
    ))
}

/// POST /api/auth/login
///
/// Throttled per client IP and per email.
async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CredentialsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(ip) = client_ip(&headers) {
        if state.rate_limiter.is_ip_limited(ip).await {
            tracing::warn!(%ip, "Login rate limit hit");
            return Err(ApiError::rate_limited(
                "Too many requests, please try again later",
                60,
            ));
        }
        state.rate_limiter.record_request(ip).await;
    }

    if state.rate_limiter.is_email_limited(&body.email).await {
        return Err(ApiError::rate_limited(
            "Too many failed login attempts, please try again in 15 minutes",
            900,
        ));
    }

    let email = body.email.clone();
    let (session, user) = match state
        .user_service
        .login(LoginInput::new(body.email, body.password))
        .await
    {
        Ok(result) => result,
        Err(e @ UserServiceError::AuthenticationError(_)) => {
            state.rate_limiter.record_failure(&email).await;
            return Err(e.into());
        }
        Err(e) => return Err(e.into()),
    };

    state.rate_limiter.clear_failures(&email).await;
    tracing::info!(user_id = user.id, "User logged in");

    let headers = session_cookie(&state, &session)?;
    Ok((
        headers,
        Json(AuthResponse {
            message: "Login successful",
            user,
            token: session.id,
        }),
    ))
}

/// POST /api/auth/logout
async fn logout(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let token = extract_session_token(&headers)
        .ok_or_else(|| ApiError::unauthorized("Unauthorized"))?;
    state.user_service.logout(&token).await?;

    let clear_cookie = format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", SESSION_COOKIE);
    let mut response_headers = HeaderMap::new();
    response_headers.insert(
        header::SET_COOKIE,
        HeaderValue::from_str(&clear_cookie).map_err(ApiError::internal)?,
    );

    Ok((StatusCode::NO_CONTENT, response_headers))
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: User,
}

/// GET /api/auth/me
async fn get_current_user(user: AuthenticatedUser) -> Json<MeResponse> {
    Json(MeResponse { user: user.0 })
}

/// Client address as reported by a reverse proxy
fn client_ip(headers: &HeaderMap) -> Option<IpAddr> {
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first) = forwarded.split(',').next() {
            if let Ok(ip) = first.trim().parse() {
                return Some(ip);
            }
        }
    }
    headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_ip() {
        let mut headers = HeaderMap::new();
        assert!(client_ip(&headers).is_none());

        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.2"));
        assert_eq!(client_ip(&headers), Some("10.0.0.2".parse().unwrap()));

        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        );
        assert_eq!(client_ip(&headers), Some("203.0.113.7".parse().unwrap()));

        headers.insert("x-forwarded-for", HeaderValue::from_static("garbage"));
        assert_eq!(client_ip(&headers), Some("10.0.0.2".parse().unwrap()));
    }
}
