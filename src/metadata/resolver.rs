//! Metadata resolution with a caller-owned cache.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::access::AccessPolicy;
use crate::error::MetadataError;

use super::model::DossierMetadata;
use super::source::MetadataSource;

/// Dossier metadata already fetched during one request or one zip job.
///
/// Owned by the caller and dropped with it; a fresh cache per unit of work
/// keeps access decisions from running on stale metadata.
#[derive(Debug, Default)]
pub struct MetadataCache {
    entries: HashMap<String, Arc<DossierMetadata>>,
}

impl MetadataCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn key(district: &str, dossier: &str) -> String {
        format!("{}_{}", district, dossier)
    }

    pub fn get(&self, district: &str, dossier: &str) -> Option<Arc<DossierMetadata>> {
        self.entries.get(&Self::key(district, dossier)).cloned()
    }

    pub fn insert(&mut self, district: &str, dossier: &str, metadata: Arc<DossierMetadata>) {
        self.entries.insert(Self::key(district, dossier), metadata);
    }
}

/// Resolves dossier metadata through a [`MetadataSource`].
pub struct MetadataResolver<S> {
    source: S,
    policy: AccessPolicy,
}

impl<S: MetadataSource> MetadataResolver<S> {
    pub fn new(source: S, policy: AccessPolicy) -> Self {
        Self { source, policy }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Metadata for `(district, dossier)`, from `cache` or the source.
    ///
    /// A successful fetch is stored in `cache` before returning, so a dossier
    /// costs at most one upstream call per cache.
    pub async fn resolve(
        &self,
        district: &str,
        dossier: &str,
        cache: &mut MetadataCache,
    ) -> Result<Arc<DossierMetadata>, MetadataError> {
        if let Some(metadata) = cache.get(district, dossier) {
            debug!(district, dossier, "Metadata cache hit");
            return Ok(metadata);
        }

        let raw = match self.source.fetch_dossier(district, dossier).await {
            Ok(raw) => raw,
            Err(err) => {
                if let MetadataError::Unavailable(reason) = &err {
                    warn!(district, dossier, reason = %reason, "Metadata service unavailable");
                }
                return Err(err);
            }
        };

        let metadata = Arc::new(DossierMetadata::from_raw(raw, &self.policy));
        cache.insert(district, dossier, metadata.clone());
        Ok(metadata)
    }
}
