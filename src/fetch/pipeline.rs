//! Single-file fetch with location fallback.

use bytes::Bytes;
use tracing::{debug, warn};

use crate::error::FetchError;
use crate::iiif::UrlReference;
use crate::metadata::DossierMetadata;

use super::candidates::{candidates, FileEndpoints};
use super::source::{FileSource, TransportError};

/// A file fetched from one of the archive file servers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedFile {
    /// Name used when the file is saved, e.g. in a zip archive
    pub filename: String,
    pub content_type: String,
    pub data: Bytes,

    /// Location that answered
    pub url: String,
}

/// Fetches files, trying each candidate location in turn.
pub struct FilePipeline<F> {
    source: F,
    endpoints: FileEndpoints,
}

impl<F: FileSource> FilePipeline<F> {
    pub fn new(source: F, endpoints: FileEndpoints) -> Self {
        Self { source, endpoints }
    }

    pub fn source(&self) -> &F {
        &self.source
    }

    pub fn endpoints(&self) -> &FileEndpoints {
        &self.endpoints
    }

    /// Fetch the file named by `reference`.
    ///
    /// Timeouts, connection errors and 404s move on to the next candidate;
    /// a 200 returns immediately; any other status fails at once.
    pub async fn fetch(
        &self,
        reference: &UrlReference,
        metadata: &DossierMetadata,
    ) -> Result<FetchedFile, FetchError> {
        let resolved = candidates(reference, metadata, &self.endpoints)?;
        let attempts = resolved.urls.len();
        let mut last_failure: Option<TransportError> = None;

        for url in resolved.urls {
            match self.source.get(&url).await {
                Ok(response) if response.status == 200 => {
                    let content_type = response
                        .content_type
                        .unwrap_or_else(|| guess_content_type(&resolved.filename).to_string());
                    return Ok(FetchedFile {
                        filename: resolved.filename,
                        content_type,
                        data: response.body,
                        url,
                    });
                }
                Ok(response) if response.status == 404 => {
                    debug!(url = %url, "File not at candidate location");
                }
                Ok(response) => {
                    warn!(url = %url, status = response.status, "File server error");
                    return Err(FetchError::SourceUnavailable {
                        cause: format!("HTTP {}", response.status),
                        detail: format!("{} answered with status {}", url, response.status),
                    });
                }
                Err(err) if err.is_retryable() => {
                    warn!(
                        url = %url,
                        error_class = err.class_name(),
                        "File server unreachable, trying next location: {}",
                        err.message()
                    );
                    last_failure = Some(err);
                }
                Err(err) => {
                    warn!(url = %url, error_class = err.class_name(), "File request failed: {}", err.message());
                    return Err(FetchError::SourceUnavailable {
                        cause: err.class_name().to_string(),
                        detail: err.message().to_string(),
                    });
                }
            }
        }

        match last_failure {
            None => Err(FetchError::SourceNotFound { attempts }),
            Some(err) => Err(FetchError::SourceUnavailable {
                cause: err.class_name().to_string(),
                detail: err.message().to_string(),
            }),
        }
    }
}

/// Content type by file extension.
pub fn guess_content_type(filename: &str) -> &'static str {
    let extension = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "tif" | "tiff" => "image/tiff",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}
