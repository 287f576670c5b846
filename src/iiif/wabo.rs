//! Identifier grammar of the wabo permit archive.
//!
//! ```text
//! <district>_<dossier>~<oloNumber>_<barcode>[_<fileNumber>]
//! ```
//!
//! Barcodes may contain `-` and `_`, so fields are taken from the edges
//! inward: the OLO number up to the first `_`, the file number as the last
//! field only if it is numeric and something precedes it, the barcode is
//! whatever remains.

use crate::error::ReferenceError;

use super::{is_numeric, non_empty, ParsedIdentity};

pub(super) fn parse_identity(identity: &str) -> Result<ParsedIdentity, ReferenceError> {
    let (dossier_part, document_part) = identity
        .split_once('~')
        .ok_or(ReferenceError::MissingDocumentSeparator)?;

    let (district, dossier) = dossier_part
        .split_once('_')
        .ok_or(ReferenceError::FieldCount {
            part: "dossier",
            expected: 2,
            actual: 1,
        })?;
    let district = non_empty(district, "district")?;
    let dossier = non_empty(dossier, "dossier")?;

    let (olo_number, rest) = document_part
        .split_once('_')
        .ok_or(ReferenceError::FieldCount {
            part: "document",
            expected: 2,
            actual: 1,
        })?;
    let olo_number = non_empty(olo_number, "olo number")?;
    let rest = non_empty(rest, "barcode")?;

    let (barcode, file_number) = match rest.rsplit_once('_') {
        Some((barcode, number)) if !barcode.is_empty() && is_numeric(number) => {
            (barcode, Some(number))
        }
        _ => (rest, None),
    };

    Ok(ParsedIdentity {
        district: district.to_string(),
        dossier: dossier.to_string(),
        barcode: barcode.to_string(),
        file_number: file_number.map(str::to_string),
        olo_number: Some(olo_number.to_string()),
    })
}
