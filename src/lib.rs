//! # Archive IIIF Proxy
//!
//! An authorizing IIIF image proxy in front of two legacy building-dossier
//! archives (`edepot` and `wabo`), with asynchronous bulk zip delivery.
//!
//! ## Features
//!
//! - **IIIF Image API 2**: `info.json`, region crops and fit-within scaling
//! - **Access control**: scope-based decisions against dossier metadata
//! - **Filename fallback**: tries the spelling variants the archives have accumulated
//! - **Bulk downloads**: zip jobs queued, built by a worker, and mailed as a link
//! - **Authentication**: HS256 bearer tokens for staff, mailed login links for visitors
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`iiif`] - IIIF URL parsing into [`UrlReference`]
//! - [`metadata`] - Dossier metadata model, HTTP source and per-request cache
//! - [`access`] - Access policy and decision engine
//! - [`fetch`] - Candidate URLs and the single-file fetch pipeline
//! - [`transform`] - Cropping, scaling and re-encoding
//! - [`service`] - The resolve / authorize / fetch / transform chain
//! - [`bulk`] - Zip jobs: queue, storage, worker and mail
//! - [`server`] - Axum-based HTTP server and routes
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,ignore
//! use archive_iiif_proxy::{
//!     create_router, AccessEngine, AccessPolicy, AppState, ArchiveService, FileEndpoints,
//!     FilePipeline, ImageTransformer, MetadataResolver, RouterConfig, TokenAuth,
//! };
//!
//! let policy = AccessPolicy::default();
//! let service = ArchiveService::new(
//!     MetadataResolver::new(metadata_source, policy.clone()),
//!     AccessEngine::new(policy.clone()),
//!     FilePipeline::new(file_source, FileEndpoints::new(edepot_url, wabo_url)),
//!     ImageTransformer::default(),
//! );
//! let auth = TokenAuth::new(staff_secret, mail_secret, policy);
//!
//! let router = create_router(AppState::new(service, auth), RouterConfig::new());
//! ```

pub mod access;
pub mod bulk;
pub mod config;
pub mod error;
pub mod fetch;
pub mod iiif;
pub mod metadata;
pub mod server;
pub mod service;
pub mod transform;

// Re-export commonly used types
pub use access::{
    decide, AccessEngine, AccessPolicy, AccessVerdict, CallerContext, Decision, ReasonCode, Scope,
};
pub use bulk::{
    create_s3_client, create_sqs_client, HttpMailer, JobQueue, JobSubmitter, Mailer, ObjectStore,
    S3ObjectStore, SqsJobQueue, ZipJob, ZipReport, ZipWorker,
};
pub use config::{Cli, Command, ServeConfig, TokenConfig, TokenKind, WorkerConfig};
pub use error::{
    FetchError, InvalidIiifUrl, IoError, JobError, MetadataError, ProxyError, ReferenceError,
    TransformError,
};
pub use fetch::{FileEndpoints, FilePipeline, FileSource, HttpFileSource};
pub use iiif::{parse, parse_url, Region, ResponseShape, Scale, Source, UrlReference};
pub use metadata::{DossierMetadata, HttpMetadataSource, MetadataCache, MetadataResolver, MetadataSource};
pub use server::{create_router, AppState, RouterConfig, TokenAuth};
pub use service::{ArchiveService, ServedContent};
pub use transform::ImageTransformer;
