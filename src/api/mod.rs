//! API layer - HTTP handlers and routing
//!
//! Everything lives under `/api`; stored uploads are served from `/uploads`.

pub mod auth;
pub mod bank_details;
pub mod common;
pub mod contributor;
pub mod health;
pub mod images;
pub mod middleware;
pub mod notifications;
pub mod quality_check;

#[cfg(test)]
mod tests;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    Router,
};
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use crate::config::Config;
use crate::db::repositories::{
    SqlxBankDetailsRepository, SqlxNotificationRepository, SqlxSessionRepository,
    SqlxUserRepository,
};
use crate::db::DynDatabasePool;
use crate::services::{
    BankDetailsService, EmailService, ImageStore, LifecycleService, LoginRateLimiter,
    NotificationService, QualityCheckService, UserService,
};

pub use middleware::{ApiError, AppState, AuthenticatedUser};

/// Wire repositories and services into the shared state
pub async fn build_state(pool: DynDatabasePool, config: Config) -> anyhow::Result<AppState> {
    let user_repo = SqlxUserRepository::boxed(pool.clone());
    let session_repo = SqlxSessionRepository::boxed(pool.clone());

    let user_service = Arc::new(UserService::with_session_expiration(
        user_repo.clone(),
        session_repo,
        config.auth.session_days,
    ));

    let mut notification_service = NotificationService::new(
        SqlxNotificationRepository::boxed(pool.clone()),
        user_repo,
        config.notifications.default_limit,
    );
    if let Some(smtp) = &config.notifications.smtp {
        match EmailService::new(smtp) {
            Ok(email) => {
                tracing::info!("Email notifications via {}:{}", smtp.host, smtp.port);
                notification_service = notification_service.with_email(email);
            }
            Err(e) => tracing::warn!("Email notifications disabled: {:#}", e),
        }
    }
    let notification_service = Arc::new(notification_service);

    let bank_details_service = Arc::new(BankDetailsService::new(
        SqlxBankDetailsRepository::boxed(pool.clone()),
        notification_service.clone(),
    ));
    let quality_check_service = Arc::new(QualityCheckService::new(
        user_service.clone(),
        notification_service.clone(),
        config.quality_check.clone(),
    ));

    let store = Arc::new(
        ImageStore::open(
            notification_service.clone(),
            config.lifecycle.snapshot_path.clone(),
        )
        .await?,
    );
    let lifecycle = Arc::new(LifecycleService::new(
        store,
        notification_service.clone(),
        config.lifecycle.clone(),
        config.upload.clone(),
    ));

    Ok(AppState {
        pool,
        config: Arc::new(config),
        user_service,
        notification_service,
        bank_details_service,
        quality_check_service,
        lifecycle,
        rate_limiter: Arc::new(LoginRateLimiter::new()),
    })
}

/// Largest multipart body accepted by the upload endpoints
fn upload_body_limit(config: &Config) -> usize {
    let batch = config.upload.max_batch.max(config.quality_check.max_images) as u64;
    // headroom for multipart framing
    let limit = config.upload.max_file_size.saturating_mul(batch) + 1024 * 1024;
    usize::try_from(limit).unwrap_or(usize::MAX)
}

/// Build the `/api` router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    let body_limit = DefaultBodyLimit::max(upload_body_limit(&state.config));

    let protected_routes = Router::new()
        .nest("/auth", auth::protected_router())
        .nest("/contributor", contributor::router())
        .nest("/bank-details", bank_details::router())
        .nest("/notifications", notifications::router())
        .nest("/quality-check", quality_check::router().layer(body_limit))
        .nest("/images", images::router().layer(body_limit))
        .route_layer(axum_middleware::from_fn_with_state(
            state,
            middleware::require_auth,
        ));

    Router::new()
        .nest("/health", health::router())
        .nest("/auth", auth::public_router())
        .merge(protected_routes)
}

fn cors_layer(origin: &str) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::COOKIE]);

    if origin == "*" {
        return base.allow_origin(Any);
    }
    match origin.parse::<HeaderValue>() {
        Ok(value) => base.allow_origin(value).allow_credentials(true),
        Err(_) => {
            tracing::warn!("Invalid CORS origin '{}', cross-origin requests disabled", origin);
            base
        }
    }
}

/// Build the complete router with middleware
pub fn build_router(state: AppState) -> Router {
    let uploads = ServeDir::new(&state.config.upload.path);
    let cors = cors_layer(&state.config.server.cors_origin);

    Router::new()
        .nest("/api", build_api_router(state.clone()))
        .nest_service("/uploads", uploads)
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
