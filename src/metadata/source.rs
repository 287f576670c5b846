//! Upstream metadata service.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};

use crate::error::MetadataError;

use super::model::RawDossier;

/// Source of raw dossier metadata.
///
/// The resolver works against this trait so the HTTP service can be swapped
/// for an in-memory one in tests.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Fetch the metadata of one dossier.
    async fn fetch_dossier(&self, district: &str, dossier: &str)
        -> Result<RawDossier, MetadataError>;
}

/// Metadata service reached over HTTP.
///
/// Dossiers are fetched with `GET {base_url}/{district}_{dossier}`.
#[derive(Clone)]
pub struct HttpMetadataSource {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpMetadataSource {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
        }
    }

    /// Send `Authorization: Bearer <key>` with every request.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// URL of one dossier.
    pub fn dossier_url(&self, district: &str, dossier: &str) -> String {
        format!(
            "{}/{}",
            self.base_url,
            urlencoding::encode(&format!("{}_{}", district, dossier))
        )
    }
}

#[async_trait]
impl MetadataSource for HttpMetadataSource {
    async fn fetch_dossier(
        &self,
        district: &str,
        dossier: &str,
    ) -> Result<RawDossier, MetadataError> {
        let mut request = self.client.get(self.dossier_url(district, dossier));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| MetadataError::Unavailable(format!("request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| MetadataError::Unavailable(format!("failed to read body: {}", e)))?;

        classify_metadata_response(status, &body, district, dossier)
    }
}

/// Turn a metadata service response into a dossier or a typed error.
pub fn classify_metadata_response(
    status: StatusCode,
    body: &[u8],
    district: &str,
    dossier: &str,
) -> Result<RawDossier, MetadataError> {
    match status {
        StatusCode::OK => serde_json::from_slice(body)
            .map_err(|e| MetadataError::Unavailable(format!("invalid metadata body: {}", e))),
        StatusCode::NOT_FOUND => Err(MetadataError::NotFound {
            district: district.to_string(),
            dossier: dossier.to_string(),
        }),
        other => Err(MetadataError::Unavailable(format!(
            "metadata service returned status {}",
            other.as_u16()
        ))),
    }
}
