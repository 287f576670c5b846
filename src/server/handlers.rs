//! HTTP request handlers for the archive proxy.
//!
//! # Endpoints
//!
//! - `GET /iiif/2/{*segment}` - Serve an image, a raw source file or `info.json`
//! - `POST /iiif/zip` - Queue a bulk zip download
//! - `POST /iiif/login-link-to-email` - Mail an email-login link
//! - `GET /health` - Health check endpoint

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{Body, Bytes},
    extract::{FromRef, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::access::CallerContext;
use crate::bulk::{Email, JobSubmitter, JobUrl, Mailer, ZipJob};
use crate::error::ProxyError;
use crate::fetch::FileSource;
use crate::iiif::{self, IIIF_PATH_PREFIX, INFO_JSON};
use crate::metadata::MetadataSource;
use crate::service::{ArchiveService, ServedContent};

use super::auth::{Caller, TokenAuth, MAIL_TOKEN_PARAM};

/// Default validity of email-login links.
pub const DEFAULT_MAIL_TOKEN_TTL: Duration = Duration::from_secs(24 * 60 * 60);

const IIIF_CONTEXT: &str = "http://iiif.io/api/image/2/context.json";
const IIIF_PROTOCOL: &str = "http://iiif.io/api/image";
const IIIF_PROFILE: &str = "http://iiif.io/api/image/2/level0.json";

// =============================================================================
// Application State
// =============================================================================

/// Shared application state.
///
/// This is passed to all handlers via Axum's State extractor.
pub struct AppState<M, F> {
    /// Resolve, authorize and fetch single files
    pub service: Arc<ArchiveService<M, F>>,

    /// Token verification and issuing
    pub auth: TokenAuth,

    /// Queues zip jobs; the zip endpoint answers 503 without it
    pub submitter: Option<JobSubmitter>,

    /// Sends login links; the login-link endpoint answers 503 without it
    pub mailer: Option<Arc<dyn Mailer>>,

    /// Origins a login link may point back to
    pub login_origins: Vec<String>,

    /// Validity of issued email-login tokens
    pub mail_token_ttl: Duration,

    /// Cache-Control max-age in seconds
    pub cache_max_age: u32,
}

impl<M, F> AppState<M, F> {
    pub fn new(service: ArchiveService<M, F>, auth: TokenAuth) -> Self {
        Self::from_shared(Arc::new(service), auth)
    }

    /// State around a service that is also used elsewhere (e.g. by a worker).
    pub fn from_shared(service: Arc<ArchiveService<M, F>>, auth: TokenAuth) -> Self {
        Self {
            service,
            auth,
            submitter: None,
            mailer: None,
            login_origins: Vec::new(),
            mail_token_ttl: DEFAULT_MAIL_TOKEN_TTL,
            cache_max_age: 3600,
        }
    }

    pub fn with_submitter(mut self, submitter: JobSubmitter) -> Self {
        self.submitter = Some(submitter);
        self
    }

    pub fn with_mailer(mut self, mailer: Arc<dyn Mailer>) -> Self {
        self.mailer = Some(mailer);
        self
    }

    pub fn with_login_origins(mut self, origins: Vec<String>) -> Self {
        self.login_origins = origins;
        self
    }

    pub fn with_mail_token_ttl(mut self, ttl: Duration) -> Self {
        self.mail_token_ttl = ttl;
        self
    }

    pub fn with_cache_max_age(mut self, seconds: u32) -> Self {
        self.cache_max_age = seconds;
        self
    }

    fn origin_allowed(&self, origin: &str) -> bool {
        self.login_origins
            .iter()
            .any(|allowed| allowed.trim_end_matches('/') == origin)
    }
}

impl<M, F> Clone for AppState<M, F> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            auth: self.auth.clone(),
            submitter: self.submitter.clone(),
            mailer: self.mailer.clone(),
            login_origins: self.login_origins.clone(),
            mail_token_ttl: self.mail_token_ttl,
            cache_max_age: self.cache_max_age,
        }
    }
}

impl<M, F> FromRef<AppState<M, F>> for TokenAuth {
    fn from_ref(state: &AppState<M, F>) -> Self {
        state.auth.clone()
    }
}

// =============================================================================
// Request Parameters
// =============================================================================

/// Query parameters for IIIF requests.
#[derive(Debug, Default, Deserialize)]
pub struct IiifQueryParams {
    /// `true` to receive the untouched source file
    #[serde(default)]
    pub source_file: Option<String>,

    /// Email-login token (handled by the [`Caller`] extractor)
    #[serde(default)]
    pub auth: Option<String>,
}

impl IiifQueryParams {
    pub fn wants_raw_source_file(&self) -> bool {
        self.source_file.as_deref() == Some("true")
    }
}

/// Body of `POST /iiif/zip`.
#[derive(Debug, Deserialize)]
pub struct ZipRequest {
    /// Full IIIF URLs, in the order they should appear in the report
    #[serde(default)]
    pub urls: Vec<String>,

    /// Where to send the download link; defaults to the caller's address.
    /// Email logins may only name their own address.
    #[serde(default)]
    pub email: Option<String>,
}

/// Body of `POST /iiif/login-link-to-email`.
#[derive(Debug, Deserialize)]
pub struct LoginLinkRequest {
    #[serde(default)]
    pub email: String,

    #[serde(default)]
    pub origin_url: String,
}

// =============================================================================
// Response Types
// =============================================================================

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Service version
    pub version: String,
}

/// IIIF Image API 2 `info.json`.
#[derive(Debug, Serialize)]
pub struct ImageInfoResponse {
    #[serde(rename = "@context")]
    pub context: String,

    #[serde(rename = "@id")]
    pub id: String,

    pub protocol: String,

    pub width: u32,

    pub height: u32,

    pub profile: Vec<String>,
}

// =============================================================================
// Error Mapping
// =============================================================================

/// Convert ProxyError to HTTP response.
///
/// Bodies are plain text. Logging follows severity:
/// - 5xx errors are logged at ERROR level
/// - 404 at DEBUG level (common and expected)
/// - other 4xx at WARN level
impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();
        log_by_severity(status, self.error_type(), &message);
        (status, message).into_response()
    }
}

/// Errors raised by the handlers themselves, outside the proxy chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    /// Payload failed validation (400)
    BadRequest(String),

    /// Caller lacks a usable scope (401)
    Unauthorized(String),

    /// Endpoint's backing service is not configured (503)
    NotConfigured(&'static str),

    /// A collaborator failed (500)
    Internal(String),
}

impl RequestError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            RequestError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", msg.clone())
            }
            RequestError::Unauthorized(msg) => {
                (StatusCode::UNAUTHORIZED, "unauthorized", msg.clone())
            }
            RequestError::NotConfigured(what) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "not_configured",
                format!("{} is not configured", what),
            ),
            RequestError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                msg.clone(),
            ),
        }
    }
}

impl IntoResponse for RequestError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = self.parts();
        log_by_severity(status, error_type, &message);
        (status, message).into_response()
    }
}

fn log_by_severity(status: StatusCode, error_type: &str, message: &str) {
    if status.is_server_error() {
        error!(
            error_type = error_type,
            status = status.as_u16(),
            "Server error: {}",
            message
        );
    } else if status == StatusCode::NOT_FOUND {
        debug!(
            error_type = error_type,
            status = status.as_u16(),
            "Resource not found: {}",
            message
        );
    } else if status.is_client_error() {
        warn!(
            error_type = error_type,
            status = status.as_u16(),
            "Client error: {}",
            message
        );
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Handle IIIF requests.
///
/// # Endpoint
///
/// `GET /iiif/2/{*segment}`
///
/// # Query Parameters
///
/// - `source_file=true`: return the untouched source file
/// - `auth`: email-login token (when no bearer header is sent)
///
/// # Response
///
/// - `200 OK`: file bytes with the source content type, or `info.json`
/// - `400 Bad Request`: unparseable segment or region outside the image
/// - `401 Unauthorized`: missing or invalid token, or access denied
/// - `404 Not Found`: dossier, document or file not found
/// - `502 Bad Gateway`: metadata service or file server unavailable
///
/// # Headers
///
/// - `Cache-Control: private, max-age={cache_max_age}`
pub async fn iiif_handler<M, F>(
    State(state): State<AppState<M, F>>,
    Caller(caller): Caller,
    Path(segment): Path<String>,
    Query(query): Query<IiifQueryParams>,
    headers: HeaderMap,
) -> Result<Response, ProxyError>
where
    M: MetadataSource + 'static,
    F: FileSource + 'static,
{
    let reference = iiif::parse(&segment, query.wants_raw_source_file())?;
    let cache_control = format!("private, max-age={}", state.cache_max_age);

    match state.service.serve(&reference, &caller).await? {
        ServedContent::Info { width, height } => {
            let info = ImageInfoResponse {
                context: IIIF_CONTEXT.to_string(),
                id: image_id(&headers, &segment),
                protocol: IIIF_PROTOCOL.to_string(),
                width,
                height,
                profile: vec![IIIF_PROFILE.to_string()],
            };
            Ok(([(header::CACHE_CONTROL, cache_control)], Json(info)).into_response())
        }
        ServedContent::File {
            data,
            content_type,
            filename,
        } => {
            debug!(filename = %filename, bytes = data.len(), "Serving file");
            Ok((
                [
                    (header::CONTENT_TYPE, content_type),
                    (header::CACHE_CONTROL, cache_control),
                ],
                Body::from(data),
            )
                .into_response())
        }
    }
}

/// Public URL of the image, used as the `@id` of `info.json`.
fn image_id(headers: &HeaderMap, segment: &str) -> String {
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("http");
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    let identifier = segment
        .strip_suffix(INFO_JSON)
        .unwrap_or(segment)
        .trim_end_matches('/');

    format!("{}://{}{}{}", scheme, host, IIIF_PATH_PREFIX, identifier)
}

/// Handle bulk zip requests.
///
/// # Endpoint
///
/// `POST /iiif/zip` with JSON body `{"urls": [...], "email"?: "..."}`
///
/// # Response
///
/// - `200 OK`: empty body, the job is queued
/// - `400 Bad Request`: bad JSON, no URLs, an unparseable URL, no email address,
///   or an email login asking for another address
/// - `401 Unauthorized`: missing/invalid token or an unrecognised scope
/// - `500 Internal Server Error`: the job could not be stored or queued
pub async fn zip_handler<M, F>(
    State(state): State<AppState<M, F>>,
    Caller(caller): Caller,
    body: Bytes,
) -> Result<StatusCode, RequestError>
where
    M: MetadataSource + 'static,
    F: FileSource + 'static,
{
    if state.auth.policy().scope(&caller.scope).is_none() {
        return Err(RequestError::Unauthorized(format!(
            "scope '{}' is not valid",
            caller.scope
        )));
    }

    let request: ZipRequest = serde_json::from_slice(&body)
        .map_err(|e| RequestError::BadRequest(format!("invalid request body: {}", e)))?;

    if request.urls.is_empty() {
        return Err(RequestError::BadRequest("no urls requested".to_string()));
    }

    let email = zip_recipient(&caller, request.email)?;

    let urls = request
        .urls
        .into_iter()
        .map(|raw_url| {
            iiif::parse_url(&raw_url)
                .map(|reference| JobUrl { raw_url, reference })
                .map_err(|e| RequestError::BadRequest(e.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let submitter = state
        .submitter
        .as_ref()
        .ok_or(RequestError::NotConfigured("zip job queue"))?;

    let job = ZipJob::new(email, &caller, urls);
    submitter
        .submit(&job)
        .await
        .map_err(|e| RequestError::Internal(format!("failed to queue zip job: {}", e)))?;

    Ok(StatusCode::OK)
}

/// Address the download link goes to.
///
/// Staff may name any address. An email login is tied to the address in its
/// token, so a different address in the body is rejected.
fn zip_recipient(caller: &CallerContext, requested: Option<String>) -> Result<String, RequestError> {
    let requested = requested.filter(|email| !email.trim().is_empty());

    if caller.is_mail_login {
        let own = caller
            .email
            .clone()
            .ok_or_else(|| RequestError::BadRequest("no email address to send to".to_string()))?;
        return match requested {
            Some(email) if !email.trim().eq_ignore_ascii_case(own.trim()) => Err(
                RequestError::BadRequest(
                    "an email login can only send zips to its own address".to_string(),
                ),
            ),
            _ => Ok(own),
        };
    }

    requested
        .or_else(|| caller.email.clone())
        .filter(|email| !email.trim().is_empty())
        .ok_or_else(|| RequestError::BadRequest("no email address to send to".to_string()))
}

/// Handle login link requests.
///
/// # Endpoint
///
/// `POST /iiif/login-link-to-email` with JSON body `{"email", "origin_url"}`
///
/// Mails `<origin_url>?auth=<token>` to `email`. Needs no authentication.
///
/// # Response
///
/// - `200 OK`: empty body
/// - `400 Bad Request`: bad JSON, missing email, or an origin outside the allow-list
/// - `500 Internal Server Error`: the mail could not be sent
pub async fn login_link_handler<M, F>(
    State(state): State<AppState<M, F>>,
    body: Bytes,
) -> Result<StatusCode, RequestError>
where
    M: MetadataSource + 'static,
    F: FileSource + 'static,
{
    let request: LoginLinkRequest = serde_json::from_slice(&body)
        .map_err(|e| RequestError::BadRequest(format!("invalid request body: {}", e)))?;

    let email = request.email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(RequestError::BadRequest("invalid email address".to_string()));
    }

    let mut link = url::Url::parse(&request.origin_url)
        .map_err(|e| RequestError::BadRequest(format!("invalid origin_url: {}", e)))?;
    let origin = link.origin().ascii_serialization();
    if !state.origin_allowed(&origin) {
        return Err(RequestError::BadRequest(format!(
            "origin '{}' is not allowed",
            origin
        )));
    }

    let mailer = state
        .mailer
        .as_ref()
        .ok_or(RequestError::NotConfigured("mail relay"))?;

    let token = state.auth.issue_mail_token(email, state.mail_token_ttl);
    link.query_pairs_mut().append_pair(MAIL_TOKEN_PARAM, &token);

    mailer
        .send(&Email::login_link(email, link.as_str()))
        .await
        .map_err(|e| RequestError::Internal(format!("failed to send login link: {}", e)))?;

    info!(origin = %origin, "Login link sent");
    Ok(StatusCode::OK)
}

/// Handle health check requests.
///
/// # Endpoint
///
/// `GET /health`
///
/// # Response
///
/// `200 OK` with JSON body:
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0"
/// }
/// ```
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// =============================================================================
// Tests
// =============================================================================
