//! API integration tests for single-file IIIF requests.
//!
//! Tests verify:
//! - Raw file, transformed image and info.json responses
//! - Filename variant fallback and transport failure handling
//! - Error statuses for parse, metadata and file server failures

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use archive_iiif_proxy::fetch::TransportError;

use super::test_utils::{
    create_test_jpeg, edepot_file_url, is_valid_jpeg, metadata_source, public_dossier, staff_token,
    test_app, MockFileSource, MockMetadataSource, EDEPOT_URL, WABO_URL,
};

fn get(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

const PUBLIC_IMAGE: &str = "/iiif/2/edepot:SDZ_38~SDZ-38-0001_00001";

/// Lowercase barcode, so all three edepot spellings differ.
const LOWERCASE_IMAGE: &str = "/iiif/2/edepot:sdz_38~sdz-38-0001_00001/full/full/0/default.jpg";

fn lowercase_metadata() -> MockMetadataSource {
    MockMetadataSource::new().with_dossier("sdz", "38", public_dossier("sdz-38-0001"))
}

// =============================================================================
// Successful Responses
// =============================================================================

#[tokio::test]
async fn test_health() {
    let app = test_app(metadata_source(), MockFileSource::new());

    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let response = app.router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["status"], "healthy");
}

#[tokio::test]
async fn test_raw_source_file() {
    let jpeg = create_test_jpeg(64, 48);
    let files = MockFileSource::new().with_file(
        &edepot_file_url("SDZ-38-0001", "00001"),
        jpeg.clone(),
        "image/jpeg",
    );
    let app = test_app(metadata_source(), files);

    let uri = format!("{}/full/full/0/default.jpg?source_file=true", PUBLIC_IMAGE);
    let response = app
        .router
        .oneshot(get(&uri, &staff_token(&["BD/R"])))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "image/jpeg"
    );
    assert_eq!(
        response.headers().get(header::CACHE_CONTROL).unwrap(),
        "private, max-age=3600"
    );

    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(body.as_ref(), jpeg.as_slice());
}

#[tokio::test]
async fn test_info_json() {
    let files = MockFileSource::new().with_file(
        &edepot_file_url("SDZ-38-0001", "00001"),
        create_test_jpeg(400, 300),
        "image/jpeg",
    );
    let app = test_app(metadata_source(), files);

    let request = Request::builder()
        .uri(format!("{}/info.json", PUBLIC_IMAGE))
        .header(header::AUTHORIZATION, format!("Bearer {}", staff_token(&["BD/R"])))
        .header(header::HOST, "images.example.com")
        .body(Body::empty())
        .unwrap();
    let response = app.router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let info: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(info["width"], 400);
    assert_eq!(info["height"], 300);
    assert_eq!(info["@context"], "http://iiif.io/api/image/2/context.json");
    assert_eq!(
        info["@id"],
        "http://images.example.com/iiif/2/edepot:SDZ_38~SDZ-38-0001_00001"
    );
}

#[tokio::test]
async fn test_scaled_image() {
    let files = MockFileSource::new().with_file(
        &edepot_file_url("SDZ-38-0001", "00001"),
        create_test_jpeg(400, 300),
        "image/jpeg",
    );
    let app = test_app(metadata_source(), files);

    let uri = format!("{}/full/100,/0/default.jpg", PUBLIC_IMAGE);
    let response = app
        .router
        .oneshot(get(&uri, &staff_token(&["BD/R"])))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert!(is_valid_jpeg(&body));
    let image = image::load_from_memory(&body).unwrap();
    assert_eq!((image.width(), image.height()), (100, 75));
}

#[tokio::test]
async fn test_cropped_image() {
    let files = MockFileSource::new().with_file(
        &edepot_file_url("SDZ-38-0001", "00001"),
        create_test_jpeg(400, 300),
        "image/jpeg",
    );
    let app = test_app(metadata_source(), files);

    let uri = format!("{}/10,20,50,40/full/0/default.jpg", PUBLIC_IMAGE);
    let response = app
        .router
        .oneshot(get(&uri, &staff_token(&["BD/R"])))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let image = image::load_from_memory(&body).unwrap();
    assert_eq!((image.width(), image.height()), (50, 40));
}

#[tokio::test]
async fn test_region_outside_image_rejected() {
    let files = MockFileSource::new().with_file(
        &edepot_file_url("SDZ-38-0001", "00001"),
        create_test_jpeg(400, 300),
        "image/jpeg",
    );
    let app = test_app(metadata_source(), files);

    let uri = format!("{}/500,500,10,10/full/0/default.jpg", PUBLIC_IMAGE);
    let response = app
        .router
        .oneshot(get(&uri, &staff_token(&["BD/R"])))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// =============================================================================
// Filename Fallback
// =============================================================================

#[tokio::test]
async fn test_uppercase_variant_fallback() {
    let files = MockFileSource::new().with_file(
        &format!("{}/sdz/38/SDZ-38-0001_00001.jpg", EDEPOT_URL),
        create_test_jpeg(8, 8),
        "image/jpeg",
    );
    let app = test_app(lowercase_metadata(), files.clone());

    let response = app
        .router
        .oneshot(get(LOWERCASE_IMAGE, &staff_token(&["BD/R"])))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        files.requests(),
        vec![
            format!("{}/sdz/38/sdz-38-0001_00001.jpg", EDEPOT_URL),
            format!("{}/sdz/38/SDZ-38-0001_00001.jpg", EDEPOT_URL),
        ]
    );
}

#[tokio::test]
async fn test_timeouts_then_success_on_third_candidate() {
    let timeout = || TransportError::Timeout("read timed out".into());
    let files = MockFileSource::new()
        .with_failure(&format!("{}/sdz/38/sdz-38-0001_00001.jpg", EDEPOT_URL), timeout())
        .with_failure(&format!("{}/sdz/38/SDZ-38-0001_00001.jpg", EDEPOT_URL), timeout())
        .with_file(
            &format!("{}/sdz/38/sdz-38-0001_00001.JPG", EDEPOT_URL),
            create_test_jpeg(8, 8),
            "image/jpeg",
        );
    let app = test_app(lowercase_metadata(), files.clone());

    let response = app
        .router
        .oneshot(get(LOWERCASE_IMAGE, &staff_token(&["BD/R"])))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(files.call_count(), 3);
}

#[tokio::test]
async fn test_all_candidates_time_out() {
    let timeout = || TransportError::Timeout("read timed out".into());
    let files = MockFileSource::new()
        .with_failure(&format!("{}/sdz/38/sdz-38-0001_00001.jpg", EDEPOT_URL), timeout())
        .with_failure(&format!("{}/sdz/38/SDZ-38-0001_00001.jpg", EDEPOT_URL), timeout())
        .with_failure(&format!("{}/sdz/38/sdz-38-0001_00001.JPG", EDEPOT_URL), timeout());
    let app = test_app(lowercase_metadata(), files.clone());

    let response = app
        .router
        .oneshot(get(LOWERCASE_IMAGE, &staff_token(&["BD/R"])))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(files.call_count(), 3);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert!(String::from_utf8_lossy(&body).contains("Timeout"));
}

#[tokio::test]
async fn test_server_error_stops_fallback() {
    let files = MockFileSource::new().with_status(&edepot_file_url("SDZ-38-0001", "00001"), 500);
    let app = test_app(metadata_source(), files.clone());

    let uri = format!("{}/full/full/0/default.jpg", PUBLIC_IMAGE);
    let response = app
        .router
        .oneshot(get(&uri, &staff_token(&["BD/R"])))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(files.call_count(), 1);
}

#[tokio::test]
async fn test_file_missing_everywhere() {
    let files = MockFileSource::new();
    let app = test_app(metadata_source(), files.clone());

    let uri = format!("{}/full/full/0/default.jpg", PUBLIC_IMAGE);
    let response = app
        .router
        .oneshot(get(&uri, &staff_token(&["BD/R"])))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(files.call_count() >= 2);
}

#[tokio::test]
async fn test_wabo_path_separator_fallback() {
    let files = MockFileSource::new().with_file(
        &format!("{}/SDC/9089/besluit.pdf", WABO_URL),
        b"%PDF-1.4".to_vec(),
        "application/pdf",
    );
    let app = test_app(metadata_source(), files.clone());

    let uri = "/iiif/2/wabo:SDC_9089~21388_ST-00015-00001_2/full/full/0/default.jpg?source_file=true";
    let response = app
        .router
        .oneshot(get(uri, &staff_token(&["BD/R"])))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/pdf"
    );
    assert_eq!(
        files.requests(),
        vec![
            format!("{}/SDC%5C9089%5Cbesluit.PDF", WABO_URL),
            format!("{}/SDC/9089/besluit.PDF", WABO_URL),
            format!("{}/SDC/9089/besluit.pdf", WABO_URL),
        ]
    );
}

#[tokio::test]
async fn test_wabo_file_number_out_of_range() {
    let app = test_app(metadata_source(), MockFileSource::new());

    let uri = "/iiif/2/wabo:SDC_9089~21388_ST-00015-00001_7/full/full/0/default.jpg";
    let response = app
        .router
        .oneshot(get(uri, &staff_token(&["BD/R"])))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(app.files.call_count(), 0);
}

// =============================================================================
// Error Responses
// =============================================================================

#[tokio::test]
async fn test_unknown_source_tag() {
    let app = test_app(metadata_source(), MockFileSource::new());

    let response = app
        .router
        .oneshot(get(
            "/iiif/2/dropbox:SDZ_38~SDZ-38-0001_00001/info.json",
            &staff_token(&["BD/R"]),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(app.metadata.call_count(), 0);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert!(String::from_utf8_lossy(&body).contains("dropbox"));
}

#[tokio::test]
async fn test_malformed_suffix() {
    let app = test_app(metadata_source(), MockFileSource::new());

    let uri = format!("{}/full/full/0", PUBLIC_IMAGE);
    let response = app
        .router
        .oneshot(get(&uri, &staff_token(&["BD/R"])))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_dossier() {
    let app = test_app(metadata_source(), MockFileSource::new());

    let response = app
        .router
        .oneshot(get(
            "/iiif/2/edepot:SDZ_99~SDZ-99-0001_00001/info.json",
            &staff_token(&["BD/R"]),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unknown_barcode() {
    let app = test_app(metadata_source(), MockFileSource::new());

    let response = app
        .router
        .oneshot(get(
            "/iiif/2/edepot:SDZ_38~SDZ-38-9999_00001/info.json",
            &staff_token(&["BD/X"]),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(app.files.call_count(), 0);
}

#[tokio::test]
async fn test_metadata_unavailable() {
    let app = test_app(MockMetadataSource::unavailable(), MockFileSource::new());

    let uri = format!("{}/info.json", PUBLIC_IMAGE);
    let response = app
        .router
        .oneshot(get(&uri, &staff_token(&["BD/R"])))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}
