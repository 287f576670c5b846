//! Single-file orchestration.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        ArchiveService                           │
//! │                                                                 │
//! │  UrlReference ─► MetadataResolver ─► AccessEngine ─► FilePipeline│
//! │                                                        │        │
//! │                          info.json ◄── dimensions ◄────┤        │
//! │                          image     ◄── ImageTransformer┤        │
//! │                          raw file  ◄───────────────────┘        │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The HTTP handler and the zip worker both go through [`ArchiveService`],
//! so a file is authorized the same way whichever path requests it.

use bytes::Bytes;
use tracing::debug;

use crate::access::{AccessEngine, CallerContext};
use crate::error::ProxyError;
use crate::fetch::{FetchedFile, FilePipeline, FileSource};
use crate::iiif::{ResponseShape, UrlReference};
use crate::metadata::{MetadataCache, MetadataResolver, MetadataSource};
use crate::transform::ImageTransformer;

/// What a single-file request produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServedContent {
    /// File bytes, raw or transformed
    File {
        data: Bytes,
        content_type: String,
        filename: String,
    },

    /// Dimensions for an IIIF `info.json`
    Info { width: u32, height: u32 },
}

/// Resolve, authorize, fetch and shape archive files.
pub struct ArchiveService<M, F> {
    resolver: MetadataResolver<M>,
    engine: AccessEngine,
    pipeline: FilePipeline<F>,
    transformer: ImageTransformer,
}

impl<M: MetadataSource, F: FileSource> ArchiveService<M, F> {
    pub fn new(
        resolver: MetadataResolver<M>,
        engine: AccessEngine,
        pipeline: FilePipeline<F>,
        transformer: ImageTransformer,
    ) -> Self {
        Self {
            resolver,
            engine,
            pipeline,
            transformer,
        }
    }

    pub fn engine(&self) -> &AccessEngine {
        &self.engine
    }

    pub fn resolver(&self) -> &MetadataResolver<M> {
        &self.resolver
    }

    pub fn pipeline(&self) -> &FilePipeline<F> {
        &self.pipeline
    }

    /// Fetch the untouched file behind `reference` if `caller` may see it.
    ///
    /// `cache` is owned by the unit of work (one request, one zip job).
    pub async fn retrieve(
        &self,
        reference: &UrlReference,
        caller: &CallerContext,
        cache: &mut MetadataCache,
    ) -> Result<FetchedFile, ProxyError> {
        let metadata = self
            .resolver
            .resolve(&reference.district, &reference.dossier, cache)
            .await?;

        let verdict = self.engine.authorize(&metadata, reference, caller);
        if !verdict.is_allowed() {
            debug!(
                identifier = %reference.identifier(),
                reason = verdict.reason.as_str(),
                "Access denied"
            );
            return Err(ProxyError::Denied(verdict.reason));
        }

        Ok(self.pipeline.fetch(reference, &metadata).await?)
    }

    /// Answer one IIIF request.
    pub async fn serve(
        &self,
        reference: &UrlReference,
        caller: &CallerContext,
    ) -> Result<ServedContent, ProxyError> {
        let mut cache = MetadataCache::new();
        let file = self.retrieve(reference, caller, &mut cache).await?;

        match reference.shape {
            ResponseShape::Info => {
                let (width, height) = self.transformer.dimensions(&file.data)?;
                Ok(ServedContent::Info { width, height })
            }
            ResponseShape::RawSourceFile => Ok(ServedContent::File {
                data: file.data,
                content_type: file.content_type,
                filename: file.filename,
            }),
            ResponseShape::Image { region, scale } => {
                let data = self.transformer.apply(file.data, region, scale)?;
                Ok(ServedContent::File {
                    data,
                    content_type: file.content_type,
                    filename: file.filename,
                })
            }
        }
    }
}
