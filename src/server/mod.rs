//! HTTP server layer for the archive proxy.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HTTP Layer                              │
//! │     GET /iiif/2/{*segment}      POST /iiif/zip                  │
//! │                                                                 │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────────┐  │
//! │  │  handlers   │  │    auth     │  │        routes           │  │
//! │  │ (requests)  │  │  (tokens)   │  │  (router config)        │  │
//! │  └─────────────┘  └─────────────┘  └─────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//!               ArchiveService / JobSubmitter / Mailer
//! ```

pub mod auth;
pub mod handlers;
pub mod routes;

pub use auth::{AuthError, Caller, MailClaims, StaffClaims, TokenAuth, MAIL_TOKEN_PARAM};
pub use handlers::{
    health_handler, iiif_handler, login_link_handler, zip_handler, AppState, HealthResponse,
    IiifQueryParams, ImageInfoResponse, LoginLinkRequest, RequestError, ZipRequest,
    DEFAULT_MAIL_TOKEN_TTL,
};
pub use routes::{create_router, RouterConfig};
