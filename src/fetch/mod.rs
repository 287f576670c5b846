//! Fetching source files from the archive file servers.
//!
//! ```text
//! UrlReference + DossierMetadata
//!         │
//!         ▼
//!   candidates() ──► [url₁, url₂, url₃]
//!         │
//!         ▼
//!   FileSource::get, in order, until a 200 or a hard failure
//! ```

mod candidates;
mod pipeline;
mod source;

pub use candidates::{candidates, FileCandidates, FileEndpoints};
pub use pipeline::{guess_content_type, FetchedFile, FilePipeline};
pub use source::{
    build_http_client, FileSource, HttpFileSource, TransportError, UpstreamResponse,
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_REQUEST_TIMEOUT,
};
