//! Dossier metadata.
//!
//! The metadata service describes every dossier: its visibility, and per
//! document the visibility, copyright flag, title and files. Raw JSON is
//! interpreted once, through the [`AccessPolicy`](crate::access::AccessPolicy),
//! into a [`DossierMetadata`].

mod model;
mod resolver;
mod source;

pub use model::{Access, Document, DocumentFile, DossierMetadata, RawDocument, RawDossier, RawFile};
pub use resolver::{MetadataCache, MetadataResolver};
pub use source::{classify_metadata_response, HttpMetadataSource, MetadataSource};
