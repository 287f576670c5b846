//! IIIF URL parsing.
//!
//! A request segment names an archival reference and, optionally, a crop and
//! size:
//!
//! ```text
//! edepot:SDZ_38~SDZ-38-0001_00001/full/1000,/0/default.jpg
//! wabo:SDC_9089~21388_ST-00015-00001_00002/info.json
//! └─┬──┘ └─────────────┬─────────────────┘ └────┬────┘
//!  tag           identity                    suffix
//! ```
//!
//! The tag selects one of the historical naming grammars (see [`edepot`] and
//! [`wabo`] sub-modules); the suffix grammar is shared. Every failure is
//! reported to callers as [`InvalidIiifUrl`], with the precise
//! [`ReferenceError`] kept as its cause.

mod edepot;
mod reference;
mod suffix;
mod wabo;

pub use reference::{Region, ResponseShape, Scale, Source, UrlReference};
pub use suffix::INFO_JSON;

use crate::error::{InvalidIiifUrl, ReferenceError};

/// Path prefix in front of every IIIF segment.
pub const IIIF_PATH_PREFIX: &str = "/iiif/2/";

/// Identity fields shared by both grammars.
#[derive(Debug, PartialEq, Eq)]
struct ParsedIdentity {
    district: String,
    dossier: String,
    barcode: String,
    file_number: Option<String>,
    olo_number: Option<String>,
}

/// Parse a raw IIIF segment (the part after [`IIIF_PATH_PREFIX`]).
///
/// `wants_raw_source_file` is the out-of-band `source_file=true` flag; when
/// set, any suffix is ignored and the reference asks for the untouched file.
pub fn parse(segment: &str, wants_raw_source_file: bool) -> Result<UrlReference, InvalidIiifUrl> {
    parse_segment(segment, wants_raw_source_file).map_err(|cause| InvalidIiifUrl {
        segment: segment.to_string(),
        cause,
    })
}

/// Parse a complete request URL as submitted to the bulk endpoint.
///
/// The segment is taken from the path after [`IIIF_PATH_PREFIX`] and
/// percent-decoded. `source_file=true` in the query selects the raw file.
pub fn parse_url(raw_url: &str) -> Result<UrlReference, InvalidIiifUrl> {
    let invalid = |cause| InvalidIiifUrl {
        segment: raw_url.to_string(),
        cause,
    };

    let url = url::Url::parse(raw_url)
        .map_err(|e| invalid(ReferenceError::InvalidUrl(e.to_string())))?;

    let (_, encoded_segment) = url
        .path()
        .split_once(IIIF_PATH_PREFIX)
        .ok_or_else(|| invalid(ReferenceError::MissingIiifPrefix(IIIF_PATH_PREFIX)))?;

    let segment = urlencoding::decode(encoded_segment)
        .map_err(|e| invalid(ReferenceError::InvalidUrl(e.to_string())))?;

    let wants_raw_source_file = url
        .query_pairs()
        .any(|(key, value)| key == "source_file" && value == "true");

    parse_segment(&segment, wants_raw_source_file).map_err(invalid)
}

fn parse_segment(segment: &str, wants_raw_source_file: bool) -> Result<UrlReference, ReferenceError> {
    let (tag, rest) = segment
        .split_once(':')
        .ok_or(ReferenceError::MissingSourceTag)?;
    let source = Source::from_tag(tag)?;

    let (identity, suffix) = rest.split_once('/').unwrap_or((rest, ""));

    let parsed = match source {
        Source::Edepot => edepot::parse_identity(identity)?,
        Source::Wabo => wabo::parse_identity(identity)?,
    };
    let shape = suffix::parse_shape(suffix, wants_raw_source_file)?;

    Ok(UrlReference {
        source,
        district: parsed.district,
        dossier: parsed.dossier,
        document_barcode: parsed.barcode,
        file_number: parsed.file_number,
        olo_number: parsed.olo_number,
        shape,
    })
}

fn non_empty<'a>(value: &'a str, field: &'static str) -> Result<&'a str, ReferenceError> {
    if value.is_empty() {
        Err(ReferenceError::EmptyField(field))
    } else {
        Ok(value)
    }
}

fn is_numeric(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit())
}
