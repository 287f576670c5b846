//! Token authentication.
//!
//! Two kinds of callers reach the proxy:
//!
//! - **Staff**, with a bearer token carrying their scopes:
//!   `Authorization: Bearer <token>`
//! - **Email-login** visitors, who follow a link that was mailed to them:
//!   `/iiif/2/...?auth=<token>`
//!
//! Both are compact HS256 JSON Web Tokens, signed with separate secrets:
//!
//! ```text
//! base64url(header) "." base64url(claims) "." base64url(HMAC-SHA256(secret, header "." claims))
//! ```
//!
//! Signatures are compared in constant time.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use archive_iiif_proxy::access::AccessPolicy;
//! use archive_iiif_proxy::server::auth::TokenAuth;
//!
//! let auth = TokenAuth::new("staff-secret", "mail-secret", AccessPolicy::default());
//! let token = auth.issue_mail_token("visitor@example.com", Duration::from_secs(3600));
//!
//! let caller = auth.verify_mail(&token).unwrap();
//! assert!(caller.is_mail_login);
//! assert_eq!(caller.scope, "BD/P");
//! ```

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    response::{IntoResponse, Response},
};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::{debug, warn};
use url::form_urlencoded;

use crate::access::{AccessPolicy, CallerContext, Scope};

// =============================================================================
// Types
// =============================================================================

/// HMAC-SHA256 type alias
type HmacSha256 = Hmac<Sha256>;

/// Only supported signing algorithm.
const ALGORITHM: &str = "HS256";

/// Query parameter carrying an email-login token.
pub const MAIL_TOKEN_PARAM: &str = "auth";

/// Authentication error types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Neither a bearer header nor an `auth` query parameter
    MissingToken,

    /// Not three base64url parts of valid JSON
    MalformedToken,

    /// Header names an algorithm other than HS256
    UnsupportedAlgorithm(String),

    /// Signature does not match
    InvalidSignature,

    /// Token has expired
    Expired {
        /// When the token expired
        expired_at: u64,
        /// Current time
        current_time: u64,
    },
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::MissingToken => write!(f, "Missing authentication token"),
            AuthError::MalformedToken => write!(f, "Malformed authentication token"),
            AuthError::UnsupportedAlgorithm(alg) => {
                write!(f, "Unsupported token algorithm '{}'", alg)
            }
            AuthError::InvalidSignature => write!(f, "Invalid token signature"),
            AuthError::Expired {
                expired_at,
                current_time,
            } => write!(
                f,
                "Token expired at {} (current time: {})",
                expired_at, current_time
            ),
        }
    }
}

impl std::error::Error for AuthError {}

impl AuthError {
    fn error_type(&self) -> &'static str {
        match self {
            AuthError::MissingToken => "missing_token",
            AuthError::MalformedToken => "malformed_token",
            AuthError::UnsupportedAlgorithm(_) => "unsupported_algorithm",
            AuthError::InvalidSignature => "invalid_signature",
            AuthError::Expired { .. } => "token_expired",
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = StatusCode::UNAUTHORIZED;
        let error_type = self.error_type();
        let message = self.to_string();

        // A bad signature may be tampering; everything else is routine
        match &self {
            AuthError::InvalidSignature | AuthError::UnsupportedAlgorithm(_) => {
                warn!(
                    error_type = error_type,
                    status = status.as_u16(),
                    "Authentication failed: {}",
                    message
                );
            }
            _ => {
                debug!(
                    error_type = error_type,
                    status = status.as_u16(),
                    "Authentication failed: {}",
                    message
                );
            }
        }

        (status, message).into_response()
    }
}

// =============================================================================
// Claims
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
struct TokenHeader {
    alg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    typ: Option<String>,
}

/// Claims of a staff bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffClaims {
    #[serde(default)]
    pub scopes: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    pub exp: u64,
}

/// Claims of an email-login token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailClaims {
    /// Email address the link was sent to
    pub sub: String,

    pub exp: u64,
}

// =============================================================================
// HS256 Signing
// =============================================================================

/// Signs and verifies HS256 tokens with one secret.
#[derive(Clone)]
struct TokenSigner {
    secret_key: Vec<u8>,
}

impl TokenSigner {
    fn new(secret_key: impl AsRef<[u8]>) -> Self {
        Self {
            secret_key: secret_key.as_ref().to_vec(),
        }
    }

    fn sign<T: Serialize>(&self, claims: &T) -> String {
        let header = TokenHeader {
            alg: ALGORITHM.to_string(),
            typ: Some("JWT".to_string()),
        };
        // Serializing plain structs of strings and integers cannot fail
        let header = serde_json::to_vec(&header).unwrap_or_default();
        let claims = serde_json::to_vec(claims).unwrap_or_default();

        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(header),
            URL_SAFE_NO_PAD.encode(claims)
        );
        let signature = URL_SAFE_NO_PAD.encode(self.compute_signature(&signing_input));
        format!("{}.{}", signing_input, signature)
    }

    /// Check structure and signature, then decode the claims.
    ///
    /// Expiry is left to the caller.
    fn verify<T: DeserializeOwned>(&self, token: &str) -> Result<T, AuthError> {
        let mut parts = token.split('.');
        let (Some(header), Some(claims), Some(signature), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(AuthError::MalformedToken);
        };

        let header: TokenHeader = decode_json(header)?;
        if header.alg != ALGORITHM {
            return Err(AuthError::UnsupportedAlgorithm(header.alg));
        }

        let provided = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| AuthError::MalformedToken)?;
        let signing_input = &token[..token.len() - signature.len() - 1];
        let expected = self.compute_signature(signing_input);

        // Constant-time comparison
        if !bool::from(provided.ct_eq(&expected)) {
            return Err(AuthError::InvalidSignature);
        }

        decode_json(claims)
    }

    fn compute_signature(&self, signing_input: &str) -> Vec<u8> {
        let mut mac =
            HmacSha256::new_from_slice(&self.secret_key).expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        mac.finalize().into_bytes().to_vec()
    }
}

fn decode_json<T: DeserializeOwned>(part: &str) -> Result<T, AuthError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(part)
        .map_err(|_| AuthError::MalformedToken)?;
    serde_json::from_slice(&bytes).map_err(|_| AuthError::MalformedToken)
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn check_expiry(exp: u64) -> Result<(), AuthError> {
    let current_time = now_secs();
    if current_time > exp {
        return Err(AuthError::Expired {
            expired_at: exp,
            current_time,
        });
    }
    Ok(())
}

// =============================================================================
// Token Authentication
// =============================================================================

/// Issues and verifies both kinds of tokens, turning them into a
/// [`CallerContext`] under the configured [`AccessPolicy`].
#[derive(Clone)]
pub struct TokenAuth {
    staff: TokenSigner,
    mail: TokenSigner,
    policy: AccessPolicy,
}

impl TokenAuth {
    pub fn new(
        staff_secret: impl AsRef<[u8]>,
        mail_secret: impl AsRef<[u8]>,
        policy: AccessPolicy,
    ) -> Self {
        Self {
            staff: TokenSigner::new(staff_secret),
            mail: TokenSigner::new(mail_secret),
            policy,
        }
    }

    pub fn policy(&self) -> &AccessPolicy {
        &self.policy
    }

    /// Sign a staff token valid for `ttl`.
    pub fn sign_staff_token(&self, scopes: &[String], sub: Option<&str>, ttl: Duration) -> String {
        self.staff.sign(&StaffClaims {
            scopes: scopes.to_vec(),
            sub: sub.map(str::to_string),
            exp: now_secs() + ttl.as_secs(),
        })
    }

    /// Sign an email-login token for `email`, valid for `ttl`.
    pub fn issue_mail_token(&self, email: &str, ttl: Duration) -> String {
        self.mail.sign(&MailClaims {
            sub: email.to_string(),
            exp: now_secs() + ttl.as_secs(),
        })
    }

    /// Verify a staff token.
    ///
    /// The caller gets the highest scope the policy recognises among the
    /// token's scopes. A token without any recognised scope still
    /// authenticates; the access engine then denies with `invalid_scope`.
    pub fn verify_staff(&self, token: &str) -> Result<CallerContext, AuthError> {
        let claims: StaffClaims = self.staff.verify(token)?;
        check_expiry(claims.exp)?;

        let scope = match self
            .policy
            .highest_scope(claims.scopes.iter().map(String::as_str))
        {
            Some(scope) => self.policy.scope_name(scope).to_string(),
            None => claims.scopes.first().cloned().unwrap_or_default(),
        };

        Ok(CallerContext {
            scope,
            email: claims.sub,
            is_mail_login: false,
        })
    }

    /// Verify an email-login token.
    pub fn verify_mail(&self, token: &str) -> Result<CallerContext, AuthError> {
        let claims: MailClaims = self.mail.verify(token)?;
        check_expiry(claims.exp)?;

        Ok(CallerContext::mail_login(
            self.policy.scope_name(Scope::PublicEmail),
            claims.sub,
        ))
    }
}

// =============================================================================
// Axum Extractor
// =============================================================================

/// The authenticated caller of a request.
///
/// A bearer header takes precedence over the `auth` query parameter.
/// Requests with neither are rejected with 401.
#[derive(Debug, Clone)]
pub struct Caller(pub CallerContext);

impl<S> FromRequestParts<S> for Caller
where
    TokenAuth: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth = TokenAuth::from_ref(state);

        if let Some(value) = parts.headers.get(AUTHORIZATION) {
            let value = value.to_str().map_err(|_| AuthError::MalformedToken)?;
            let token = value
                .strip_prefix("Bearer ")
                .ok_or(AuthError::MalformedToken)?;
            return auth.verify_staff(token.trim()).map(Caller);
        }

        let query = parts.uri.query().unwrap_or("");
        let token = form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == MAIL_TOKEN_PARAM)
            .map(|(_, value)| value.into_owned())
            .ok_or(AuthError::MissingToken)?;

        auth.verify_mail(&token).map(Caller)
    }
}

// =============================================================================
// Tests
// =============================================================================
