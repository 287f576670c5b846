//! Parsed archival references.

use serde::{Deserialize, Serialize};

use crate::error::ReferenceError;

/// Legacy archive system a reference points into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    /// The e-depot scan archive
    Edepot,

    /// The permit (wabo) document system
    Wabo,
}

impl Source {
    /// Resolve a source tag as it appears before the `:` in a segment.
    pub fn from_tag(tag: &str) -> Result<Self, ReferenceError> {
        match tag {
            "edepot" => Ok(Source::Edepot),
            "wabo" => Ok(Source::Wabo),
            other => Err(ReferenceError::UnknownSource(other.to_string())),
        }
    }

    /// The tag used in URL segments.
    pub fn tag(&self) -> &'static str {
        match self {
            Source::Edepot => "edepot",
            Source::Wabo => "wabo",
        }
    }
}

/// Requested image region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Region {
    /// No crop
    Full,

    /// Centered square with side `min(width, height)`
    Square,

    /// Explicit pixel box; x and y may be negative
    Box {
        x: i64,
        y: i64,
        width: i64,
        height: i64,
    },
}

/// Requested output size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Scale {
    /// No resize
    Full,

    /// Fit within the box, preserving aspect ratio. At least one side is set.
    Fit {
        width: Option<u32>,
        height: Option<u32>,
    },
}

/// What the caller wants back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseShape {
    /// IIIF `info.json`
    Info,

    /// The untouched source file
    RawSourceFile,

    /// A cropped and/or scaled image
    Image { region: Region, scale: Scale },
}

/// An archival reference parsed from an IIIF URL segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlReference {
    pub source: Source,
    pub district: String,
    pub dossier: String,
    pub document_barcode: String,

    /// File number within the document. Always set for edepot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_number: Option<String>,

    /// OLO (permit) number, wabo only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub olo_number: Option<String>,

    pub shape: ResponseShape,
}

impl UrlReference {
    pub fn wants_info_only(&self) -> bool {
        matches!(self.shape, ResponseShape::Info)
    }

    pub fn wants_raw_source_file(&self) -> bool {
        matches!(self.shape, ResponseShape::RawSourceFile)
    }

    /// Requested region, if the caller asked for an image.
    pub fn region(&self) -> Option<Region> {
        match self.shape {
            ResponseShape::Image { region, .. } => Some(region),
            _ => None,
        }
    }

    /// Requested scale, if the caller asked for an image.
    pub fn scale(&self) -> Option<Scale> {
        match self.shape {
            ResponseShape::Image { scale, .. } => Some(scale),
            _ => None,
        }
    }

    /// Metadata cache key for the dossier this reference belongs to.
    pub fn dossier_key(&self) -> String {
        format!("{}_{}", self.district, self.dossier)
    }

    /// Canonical path of the source file on the edepot server.
    ///
    /// Wabo file paths come from the dossier metadata instead, so this
    /// returns `None` for wabo references.
    pub fn source_filename(&self) -> Option<String> {
        match self.source {
            Source::Edepot => Some(format!(
                "{}/{}/{}",
                self.district,
                self.dossier,
                self.display_filename()
            )),
            Source::Wabo => None,
        }
    }

    /// File name used in zip archives and reports before metadata is known.
    pub fn display_filename(&self) -> String {
        match (self.source, &self.file_number) {
            (Source::Edepot, Some(number)) => {
                format!("{}_{}.jpg", self.document_barcode, number)
            }
            (Source::Edepot, None) => format!("{}.jpg", self.document_barcode),
            (Source::Wabo, Some(number)) => format!("{}_{}", self.document_barcode, number),
            (Source::Wabo, None) => self.document_barcode.clone(),
        }
    }

    /// The identifier part of the segment, e.g. `edepot:SDZ_38~SDZ-38-0001_00001`.
    pub fn identifier(&self) -> String {
        let document = match (self.source, &self.olo_number, &self.file_number) {
            (Source::Wabo, Some(olo), Some(number)) => {
                format!("{}_{}_{}", olo, self.document_barcode, number)
            }
            (Source::Wabo, Some(olo), None) => format!("{}_{}", olo, self.document_barcode),
            (_, _, Some(number)) => format!("{}_{}", self.document_barcode, number),
            (_, _, None) => self.document_barcode.clone(),
        };
        format!(
            "{}:{}_{}~{}",
            self.source.tag(),
            self.district,
            self.dossier,
            document
        )
    }
}
