use super::*;
use crate::config::{LifecycleConfig, UploadConfig};
use crate::db::{create_test_pool, migrations::run_migrations};
use crate::services::quality_check::tests::encoded_image;
use axum::http::{header, HeaderValue, StatusCode};
use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use image::ImageFormat;
use serde_json::{json, Value};
use std::time::Duration;
use tempfile::TempDir;
use tokio_test::{assert_err, assert_ok};
use tower::ServiceExt;

struct TestApp {
    server: TestServer,
    _uploads: TempDir,
}

async fn setup_app() -> TestApp {
    let pool = create_test_pool().await.expect("Failed to create test pool");
    run_migrations(&pool).await.expect("Failed to run migrations");

    let uploads = TempDir::new().expect("Failed to create upload dir");
    let config = Config {
        upload: UploadConfig {
            path: uploads.path().to_path_buf(),
            ..Default::default()
        },
        lifecycle: LifecycleConfig::fast(),
        ..Default::default()
    };

    let state = build_state(pool, config).await.expect("Failed to build state");
    let server = TestServer::new(build_router(state)).expect("Failed to start test server");
    TestApp {
        server,
        _uploads: uploads,
    }
}

fn bearer(token: &str) -> HeaderValue {
    HeaderValue::from_str(&format!("Bearer {}", token)).unwrap()
}

async fn register(server: &TestServer, email: &str) -> String {
    let response = server
        .post("/api/auth/register")
        .json(&json!({ "email": email, "password": "password123" }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let body = response.json::<Value>();
    body["token"].as_str().unwrap().to_string()
}

fn png_form(field: &str, names: &[&str]) -> MultipartForm {
    names.iter().fold(MultipartForm::new(), |form, name| {
        form.add_part(
            field,
            Part::bytes(encoded_image(32, 24, ImageFormat::Png))
                .file_name(*name)
                .mime_type("image/png"),
        )
    })
}

/// Poll an image until it reaches `status` or give up after two seconds.
async fn wait_for_status(server: &TestServer, token: &str, id: &str, status: &str) -> Value {
    for _ in 0..200 {
        let response = server
            .get(&format!("/api/images/{}", id))
            .add_header(header::AUTHORIZATION, bearer(token))
            .await;
        let body = response.json::<Value>();
        if body["image"]["status"] == status {
            return body["image"].clone();
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("image {} never reached status {}", id, status);
}

#[tokio::test]
async fn test_build_state_without_smtp() {
    let pool = create_test_pool().await.unwrap();
    run_migrations(&pool).await.unwrap();

    let state = assert_ok!(build_state(pool, Config::default()).await);
    assert!(state.config.notifications.smtp.is_none());
}

#[test]
fn test_upload_body_limit_covers_a_full_batch() {
    let config = Config::default();
    let limit = upload_body_limit(&config) as u64;
    assert!(limit > config.upload.max_file_size * config.upload.max_batch as u64);
}

#[test]
fn test_cors_origin_parsing() {
    assert_ok!("http://localhost:3000".parse::<HeaderValue>());
    assert_err!("bad\norigin".parse::<HeaderValue>());
    // an unparsable origin still yields a layer
    let _ = cors_layer("bad\norigin");
}

#[tokio::test]
async fn test_api_router_rejects_anonymous_requests() {
    let pool = create_test_pool().await.unwrap();
    run_migrations(&pool).await.unwrap();
    let state = build_state(pool, Config::default()).await.unwrap();
    let app = build_api_router(state.clone()).with_state(state);

    let response = app
        .oneshot(
            axum::http::Request::builder()
                .uri("/images/stats")
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_health() {
    let app = setup_app().await;
    let response = app.server.get("/api/health").await;
    response.assert_status_ok();
    let body = response.json::<Value>();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], "ok");
}

#[tokio::test]
async fn test_register_login_me_logout() {
    let app = setup_app().await;
    let token = register(&app.server, "Ada@Example.com").await;

    let me = app
        .server
        .get("/api/auth/me")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await;
    me.assert_status_ok();
    let body = me.json::<Value>();
    assert_eq!(body["user"]["email"], "ada@example.com");
    assert!(body["user"].get("passwordHash").is_none());

    let login = app
        .server
        .post("/api/auth/login")
        .json(&json!({ "email": "ada@example.com", "password": "password123" }))
        .await;
    login.assert_status_ok();
    assert!(login
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|c| c.starts_with("token=") && c.contains("HttpOnly")));
    let body = login.json::<Value>();
    assert_eq!(body["message"], "Login successful");
    let second_token = body["token"].as_str().unwrap().to_string();

    let logout = app
        .server
        .post("/api/auth/logout")
        .add_header(header::AUTHORIZATION, bearer(&second_token))
        .await;
    logout.assert_status(StatusCode::NO_CONTENT);

    let after = app
        .server
        .get("/api/auth/me")
        .add_header(header::AUTHORIZATION, bearer(&second_token))
        .await;
    after.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(after.json::<Value>()["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_register_duplicate_and_bad_login() {
    let app = setup_app().await;
    register(&app.server, "dup@example.com").await;

    let duplicate = app
        .server
        .post("/api/auth/register")
        .json(&json!({ "email": "dup@example.com", "password": "password123" }))
        .await;
    duplicate.assert_status(StatusCode::CONFLICT);

    let wrong = app
        .server
        .post("/api/auth/login")
        .json(&json!({ "email": "dup@example.com", "password": "wrong-password" }))
        .await;
    wrong.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(wrong.json::<Value>()["error"]["message"], "Invalid credentials");

    let missing = app
        .server
        .post("/api/auth/login")
        .json(&json!({ "email": "dup@example.com" }))
        .await;
    missing.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_login_is_throttled_per_email() {
    let app = setup_app().await;
    register(&app.server, "slow@example.com").await;

    for _ in 0..5 {
        app.server
            .post("/api/auth/login")
            .json(&json!({ "email": "slow@example.com", "password": "nope-nope" }))
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    let blocked = app
        .server
        .post("/api/auth/login")
        .json(&json!({ "email": "slow@example.com", "password": "password123" }))
        .await;
    blocked.assert_status(StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(blocked.json::<Value>()["error"]["code"], "RATE_LIMIT");
}

#[tokio::test]
async fn test_protected_routes_require_session() {
    let app = setup_app().await;

    let response = app.server.get("/api/notifications").await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(response.json::<Value>()["error"]["message"], "Unauthorized");

    let response = app
        .server
        .get("/api/notifications")
        .add_header(header::AUTHORIZATION, bearer("not-a-session"))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(response.json::<Value>()["error"]["message"], "Invalid token");
}

#[tokio::test]
async fn test_session_cookie_authenticates() {
    let app = setup_app().await;
    let token = register(&app.server, "cookie@example.com").await;

    let response = app
        .server
        .get("/api/auth/me")
        .add_header(
            header::COOKIE,
            HeaderValue::from_str(&format!("theme=dark; token={}", token)).unwrap(),
        )
        .await;
    response.assert_status_ok();
}

#[tokio::test]
async fn test_contributor_setup() {
    let app = setup_app().await;
    let token = register(&app.server, "setup@example.com").await;

    let incomplete = app
        .server
        .post("/api/contributor/setup")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({ "name": "Ada" }))
        .await;
    incomplete.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(
        incomplete.json::<Value>()["error"]["message"],
        "Name, country, and experience are required"
    );

    let response = app
        .server
        .post("/api/contributor/setup")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({
            "name": "Ada",
            "country": "UK",
            "experience": "professional",
            "bio": "  "
        }))
        .await;
    response.assert_status_ok();
    let body = response.json::<Value>();
    assert_eq!(body["message"], "Profile updated successfully");
    assert_eq!(body["user"]["name"], "Ada");
    assert_eq!(body["user"]["experience"], "professional");
    assert!(body["user"]["bio"].is_null());
}

#[tokio::test]
async fn test_notification_crud() {
    let app = setup_app().await;
    let token = register(&app.server, "notes@example.com").await;
    let other = register(&app.server, "other@example.com").await;

    let created = app
        .server
        .post("/api/notifications")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({
            "type": "ACCOUNT_UPDATE",
            "title": "Hello",
            "message": "First note",
            "channels": ["mobile"]
        }))
        .await;
    created.assert_status(StatusCode::CREATED);
    let id = created.json::<Value>()["notification"]["id"].as_i64().unwrap();

    let invalid = app
        .server
        .post("/api/notifications")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({ "type": "ACCOUNT_UPDATE", "title": "No message" }))
        .await;
    invalid.assert_status(StatusCode::BAD_REQUEST);

    let count = app
        .server
        .get("/api/notifications/unread-count")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await;
    assert_eq!(count.json::<Value>()["count"], 1);

    // other users cannot touch it
    app.server
        .patch(&format!("/api/notifications/{}", id))
        .add_header(header::AUTHORIZATION, bearer(&other))
        .json(&json!({}))
        .await
        .assert_status(StatusCode::NOT_FOUND);
    app.server
        .delete(&format!("/api/notifications/{}", id))
        .add_header(header::AUTHORIZATION, bearer(&other))
        .await
        .assert_status(StatusCode::NOT_FOUND);

    let marked = app
        .server
        .patch(&format!("/api/notifications/{}", id))
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({}))
        .await;
    marked.assert_status_ok();
    assert_eq!(marked.json::<Value>()["notification"]["read"], true);

    let unread = app
        .server
        .get("/api/notifications?unreadOnly=true")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await;
    assert_eq!(
        unread.json::<Value>()["notifications"].as_array().unwrap().len(),
        0
    );

    let deleted = app
        .server
        .delete(&format!("/api/notifications/{}", id))
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await;
    deleted.assert_status_ok();
    assert_eq!(
        deleted.json::<Value>()["message"],
        "Notification deleted successfully"
    );
}

#[tokio::test]
async fn test_notification_bulk_actions() {
    let app = setup_app().await;
    let token = register(&app.server, "bulk@example.com").await;

    for title in ["One", "Two", "Three"] {
        app.server
            .post("/api/notifications")
            .add_header(header::AUTHORIZATION, bearer(&token))
            .json(&json!({ "type": "SALE_MADE", "title": title, "message": "m" }))
            .await
            .assert_status(StatusCode::CREATED);
    }

    let list = app
        .server
        .get("/api/notifications?limit=2")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await;
    let notifications = list.json::<Value>()["notifications"].clone();
    assert_eq!(notifications.as_array().unwrap().len(), 2);
    let first_id = notifications[0]["id"].as_i64().unwrap();

    let marked = app
        .server
        .patch("/api/notifications")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({ "action": "markAsRead", "notificationIds": [first_id] }))
        .await;
    marked.assert_status_ok();
    assert_eq!(marked.json::<Value>()["updated"], 1);

    let all = app
        .server
        .patch("/api/notifications")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({ "action": "markAllAsRead" }))
        .await;
    all.assert_status_ok();
    assert_eq!(all.json::<Value>()["updated"], 2);

    app.server
        .patch("/api/notifications")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({ "action": "archive" }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_bank_details_upsert() {
    let app = setup_app().await;
    let token = register(&app.server, "bank@example.com").await;

    let empty = app
        .server
        .get("/api/bank-details")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await;
    assert!(empty.json::<Value>()["bankDetails"].is_null());

    app.server
        .post("/api/bank-details")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({ "accountNumber": "12345678" }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    for account in ["12345678", "99990000"] {
        let saved = app
            .server
            .post("/api/bank-details")
            .add_header(header::AUTHORIZATION, bearer(&token))
            .json(&json!({
                "accountNumber": account,
                "routingNumber": "021000021",
                "accountHolderName": "Ada Lovelace",
                "bankName": "First Bank"
            }))
            .await;
        saved.assert_status_ok();
        assert_eq!(
            saved.json::<Value>()["message"],
            "Bank details saved successfully"
        );
    }

    let fetched = app
        .server
        .get("/api/bank-details")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await;
    let details = fetched.json::<Value>()["bankDetails"].clone();
    assert_eq!(details["maskedAccount"], "****0000");
    assert!(details.get("sealedPayload").is_none());
    assert!(!details.to_string().contains("99990000"));
}

#[tokio::test]
async fn test_quality_check_small_image_fails() {
    let app = setup_app().await;
    let token = register(&app.server, "qc@example.com").await;

    let response = app
        .server
        .post("/api/quality-check")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .multipart(png_form("images", &["sample.png"]))
        .await;
    response.assert_status_ok();
    let report = response.json::<Value>();
    assert_eq!(report["success"], true);
    assert_eq!(report["passed"], false);
    assert_eq!(report["images"].as_array().unwrap().len(), 1);
    assert!(report["averageScore"].as_f64().unwrap() < 30.0);

    let no_images = app
        .server
        .post("/api/quality-check")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .multipart(png_form("other", &["sample.png"]))
        .await;
    no_images.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(
        no_images.json::<Value>()["error"]["message"],
        "No images provided"
    );
}

#[tokio::test]
async fn test_image_upload_submit_publish() {
    let app = setup_app().await;
    let token = register(&app.server, "images@example.com").await;

    let uploaded = app
        .server
        .post("/api/images")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .multipart(png_form("files", &["forest.png"]))
        .await;
    uploaded.assert_status(StatusCode::CREATED);
    let body = uploaded.json::<Value>();
    let id = body["images"][0]["id"].as_str().unwrap().to_string();
    let preview = body["images"][0]["preview"].as_str().unwrap().to_string();

    // not approved yet
    let early = app
        .server
        .post(&format!("/api/images/{}/publish", id))
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await;
    early.assert_status(StatusCode::CONFLICT);

    let completed = wait_for_status(&app.server, &token, &id, "completed").await;
    assert_eq!(completed["progress"], 100);
    assert!(completed["metadata"]["title"].is_string());

    app.server.get(&preview).await.assert_status_ok();

    let submitted = app
        .server
        .post("/api/images/submit")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await;
    submitted.assert_status_ok();
    assert_eq!(submitted.json::<Value>()["submitted"], 1);

    wait_for_status(&app.server, &token, &id, "published").await;

    let stats = app
        .server
        .get("/api/images/stats")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await;
    assert_eq!(stats.json::<Value>()["publishedImages"], 1);

    let notifications = app
        .server
        .get("/api/notifications")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await;
    let kinds: Vec<String> = notifications.json::<Value>()["notifications"]
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["type"].as_str().unwrap_or_default().to_string())
        .collect();
    assert!(kinds.iter().any(|k| k == "IMAGE_APPROVED"));
}

#[tokio::test]
async fn test_image_upload_rejects_non_images() {
    let app = setup_app().await;
    let token = register(&app.server, "junk@example.com").await;

    let form = MultipartForm::new().add_part(
        "files",
        Part::bytes(b"not an image".to_vec())
            .file_name("notes.txt")
            .mime_type("text/plain"),
    );
    let response = app
        .server
        .post("/api/images")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .multipart(form)
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let list = app
        .server
        .get("/api/images")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await;
    assert!(list.json::<Value>()["images"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_images_are_scoped_per_user() {
    let app = setup_app().await;
    let owner = register(&app.server, "owner@example.com").await;
    let stranger = register(&app.server, "stranger@example.com").await;

    let uploaded = app
        .server
        .post("/api/images")
        .add_header(header::AUTHORIZATION, bearer(&owner))
        .multipart(png_form("images", &["a.png", "b.png"]))
        .await;
    uploaded.assert_status(StatusCode::CREATED);
    let id = uploaded.json::<Value>()["images"][0]["id"]
        .as_str()
        .unwrap()
        .to_string();

    app.server
        .get(&format!("/api/images/{}", id))
        .add_header(header::AUTHORIZATION, bearer(&stranger))
        .await
        .assert_status(StatusCode::NOT_FOUND);

    app.server
        .get("/api/images?status=bogus")
        .add_header(header::AUTHORIZATION, bearer(&owner))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    let cleared = app
        .server
        .delete("/api/images")
        .add_header(header::AUTHORIZATION, bearer(&owner))
        .await;
    assert_eq!(cleared.json::<Value>()["removed"], 2);
}
