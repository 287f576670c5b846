//! Authentication and authorization integration tests.
//!
//! Tests verify:
//! - Missing and invalid tokens are rejected
//! - Staff scopes and mail logins reach the right access decision
//! - Login links are mailed only for allowed origins and carry a usable token

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use super::test_utils::{
    create_test_jpeg, edepot_file_url, mail_token, metadata_source, staff_token, test_app,
    test_auth, MockFileSource, LOGIN_ORIGIN, WABO_URL,
};

fn image_uri(barcode: &str) -> String {
    format!("/iiif/2/edepot:SDZ_38~{}_00001/full/full/0/default.jpg", barcode)
}

fn with_bearer(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

fn with_mail_login(uri: &str, email: &str) -> Request<Body> {
    Request::builder()
        .uri(format!("{}?auth={}", uri, mail_token(email)))
        .body(Body::empty())
        .unwrap()
}

/// File source holding the first scan of every edepot fixture document.
fn edepot_files() -> MockFileSource {
    ["SDZ-38-0001", "SDZ-38-0002", "SDZ-38-0003", "SDZ-38-0004"]
        .iter()
        .fold(MockFileSource::new(), |files, barcode| {
            files.with_file(
                &edepot_file_url(barcode, "00001"),
                create_test_jpeg(16, 16),
                "image/jpeg",
            )
        })
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

// =============================================================================
// Token Validation
// =============================================================================

#[tokio::test]
async fn test_missing_token_rejected() {
    let app = test_app(metadata_source(), edepot_files());

    let request = Request::builder()
        .uri(image_uri("SDZ-38-0001"))
        .body(Body::empty())
        .unwrap();
    let response = app.router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(app.metadata.call_count(), 0);
}

#[tokio::test]
async fn test_garbage_bearer_rejected() {
    let app = test_app(metadata_source(), edepot_files());

    let response = app
        .router
        .oneshot(with_bearer(&image_uri("SDZ-38-0001"), "not-a-token"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_mail_token_not_accepted_as_bearer() {
    let app = test_app(metadata_source(), edepot_files());

    let response = app
        .router
        .oneshot(with_bearer(
            &image_uri("SDZ-38-0001"),
            &mail_token("visitor@example.com"),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_unknown_scope_denied() {
    let app = test_app(metadata_source(), edepot_files());

    let response = app
        .router
        .oneshot(with_bearer(&image_uri("SDZ-38-0001"), &staff_token(&["HR/ADMIN"])))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(app.files.call_count(), 0);
}

// =============================================================================
// Access Decisions
// =============================================================================

#[tokio::test]
async fn test_restricted_document_needs_extended_scope() {
    let app = test_app(metadata_source(), edepot_files());

    let response = app
        .router
        .clone()
        .oneshot(with_bearer(&image_uri("SDZ-38-0002"), &staff_token(&["BD/R"])))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert!(String::from_utf8_lossy(&body).contains("restricted"));

    let response = app
        .router
        .oneshot(with_bearer(&image_uri("SDZ-38-0002"), &staff_token(&["BD/X"])))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_highest_scope_wins() {
    let app = test_app(metadata_source(), edepot_files());

    let response = app
        .router
        .oneshot(with_bearer(
            &image_uri("SDZ-38-0002"),
            &staff_token(&["BD/P", "BD/X", "BD/R"]),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_access_request_blocked_even_for_extended_scope() {
    let app = test_app(metadata_source(), edepot_files());

    let response = app
        .router
        .oneshot(with_bearer(&image_uri("SDZ-38-0004"), &staff_token(&["BD/X"])))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(app.files.call_count(), 0);
}

#[tokio::test]
async fn test_mail_login_sees_public_document() {
    let app = test_app(metadata_source(), edepot_files());

    let response = app
        .router
        .oneshot(with_mail_login(&image_uri("SDZ-38-0001"), "visitor@example.com"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_mail_login_blocked_by_copyright() {
    let app = test_app(metadata_source(), edepot_files());

    let response = app
        .router
        .oneshot(with_mail_login(&image_uri("SDZ-38-0003"), "visitor@example.com"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_staff_read_scope_ignores_copyright() {
    let app = test_app(metadata_source(), edepot_files());

    let response = app
        .router
        .oneshot(with_bearer(&image_uri("SDZ-38-0003"), &staff_token(&["BD/R"])))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_mail_login_cannot_reach_wabo() {
    let files = MockFileSource::new().with_file(
        &format!("{}/SDC%5C9089%5Ctekening.jpg", WABO_URL),
        create_test_jpeg(16, 16),
        "image/jpeg",
    );
    let app = test_app(metadata_source(), files);

    let response = app
        .router
        .oneshot(with_mail_login(
            "/iiif/2/wabo:SDC_9089~21388_ST-00015-00001_1/info.json",
            "visitor@example.com",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(app.files.call_count(), 0);
}

// =============================================================================
// Login Links
// =============================================================================

#[tokio::test]
async fn test_login_link_mailed_with_working_token() {
    let app = test_app(metadata_source(), edepot_files());

    let response = app
        .router
        .oneshot(post_json(
            "/iiif/login-link-to-email",
            serde_json::json!({
                "email": "visitor@example.com",
                "origin_url": format!("{}/bouwdossiers", LOGIN_ORIGIN),
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let sent = app.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "visitor@example.com");

    let link = sent[0]
        .body
        .lines()
        .find(|line| line.starts_with(LOGIN_ORIGIN))
        .expect("link in mail body");
    let link = url::Url::parse(link).unwrap();
    assert_eq!(link.path(), "/bouwdossiers");

    let token = link
        .query_pairs()
        .find(|(key, _)| key == "auth")
        .map(|(_, value)| value.into_owned())
        .expect("auth parameter");
    let caller = test_auth().verify_mail(&token).unwrap();
    assert!(caller.is_mail_login);
    assert_eq!(caller.email.as_deref(), Some("visitor@example.com"));
    assert_eq!(caller.scope, "BD/P");
}

#[tokio::test]
async fn test_login_link_rejects_unknown_origin() {
    let app = test_app(metadata_source(), edepot_files());

    let response = app
        .router
        .oneshot(post_json(
            "/iiif/login-link-to-email",
            serde_json::json!({
                "email": "visitor@example.com",
                "origin_url": "https://phishing.example.net/bouwdossiers",
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(app.mailer.sent().is_empty());
}

#[tokio::test]
async fn test_login_link_rejects_bad_email() {
    let app = test_app(metadata_source(), edepot_files());

    let response = app
        .router
        .oneshot(post_json(
            "/iiif/login-link-to-email",
            serde_json::json!({ "email": "nobody", "origin_url": LOGIN_ORIGIN }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(app.mailer.sent().is_empty());
}

#[tokio::test]
async fn test_login_link_get_not_allowed() {
    let app = test_app(metadata_source(), edepot_files());

    let request = Request::builder()
        .uri("/iiif/login-link-to-email")
        .body(Body::empty())
        .unwrap();
    let response = app.router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}
