//! Dossier metadata, raw and typed.

use serde::{Deserialize, Serialize};

use crate::access::AccessPolicy;

/// Visibility of a dossier or document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Access {
    Public,
    Restricted,
}

// =============================================================================
// Upstream JSON
// =============================================================================

/// Dossier as returned by the metadata service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawDossier {
    #[serde(default)]
    pub access: Option<String>,

    #[serde(default)]
    pub documents: Vec<RawDocument>,
}

/// Document as returned by the metadata service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawDocument {
    pub barcode: String,

    #[serde(default)]
    pub access: Option<String>,

    /// Copyright flag, compared against the policy's copyright sentinel
    #[serde(default)]
    pub copyright: Option<String>,

    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub files: Vec<RawFile>,
}

/// File entry as returned by the metadata service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawFile {
    pub filename: String,

    #[serde(alias = "url")]
    pub path: String,
}

// =============================================================================
// Typed model
// =============================================================================

/// Title prefix marking a document as a request for access.
const ACCESS_REQUEST_TITLE_PREFIX: &str = "aanvraag";

/// Metadata of one dossier, interpreted through an [`AccessPolicy`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DossierMetadata {
    pub access: Access,
    pub documents: Vec<Document>,
}

/// One document in a dossier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub barcode: String,
    pub access: Access,
    pub copyright: bool,
    pub title: Option<String>,
    pub files: Vec<DocumentFile>,
}

/// One file of a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentFile {
    pub filename: String,

    /// Location on the file server; may use `\` separators
    pub path: String,
}

impl DossierMetadata {
    pub fn from_raw(raw: RawDossier, policy: &AccessPolicy) -> Self {
        let access = policy.access_from(raw.access.as_deref());
        let documents = raw
            .documents
            .into_iter()
            .map(|document| Document {
                access: policy.access_from(document.access.as_deref()),
                copyright: policy.has_copyright(document.copyright.as_deref()),
                barcode: document.barcode,
                title: document.title,
                files: document
                    .files
                    .into_iter()
                    .map(|file| DocumentFile {
                        filename: file.filename,
                        path: file.path,
                    })
                    .collect(),
            })
            .collect();

        Self { access, documents }
    }

    /// First document with the given barcode.
    pub fn document(&self, barcode: &str) -> Option<&Document> {
        self.documents.iter().find(|document| document.barcode == barcode)
    }

    /// Public only if both the dossier and the document are public.
    pub fn is_public(&self, document: &Document) -> bool {
        self.access == Access::Public && document.access == Access::Public
    }
}

impl Document {
    /// File by 1-based number; `None` selects the first file.
    pub fn file(&self, file_number: Option<&str>) -> Option<&DocumentFile> {
        let index = match file_number {
            None => 0,
            Some(number) => number.parse::<usize>().ok()?.checked_sub(1)?,
        };
        self.files.get(index)
    }

    /// Whether the title marks this document as an access request.
    pub fn is_access_request(&self) -> bool {
        self.title.as_deref().is_some_and(|title| {
            title
                .trim_start()
                .to_lowercase()
                .starts_with(ACCESS_REQUEST_TITLE_PREFIX)
        })
    }
}
