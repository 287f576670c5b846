//! Identifier grammar of the edepot scan archive.
//!
//! ```text
//! <district>_<dossier>~<barcode>_<fileNumber>
//! ```
//!
//! Some dossier tokens carry a second, glued-on dossier reference from a
//! historical data-entry artifact (`38-SDZ_39`). When the dossier part has
//! more than two `_` fields, the dossier is cut at its first `-`.

use crate::error::ReferenceError;

use super::{is_numeric, non_empty, ParsedIdentity};

pub(super) fn parse_identity(identity: &str) -> Result<ParsedIdentity, ReferenceError> {
    let (dossier_part, document_part) = identity
        .split_once('~')
        .ok_or(ReferenceError::MissingDocumentSeparator)?;

    let fields: Vec<&str> = dossier_part.split('_').collect();
    if fields.len() < 2 {
        return Err(ReferenceError::FieldCount {
            part: "dossier",
            expected: 2,
            actual: fields.len(),
        });
    }

    let district = non_empty(fields[0], "district")?;
    let dossier = if fields.len() > 2 {
        strip_duplicate_reference(fields[1])
    } else {
        fields[1]
    };
    let dossier = non_empty(dossier, "dossier")?;

    let (barcode, file_number) =
        document_part
            .rsplit_once('_')
            .ok_or(ReferenceError::FieldCount {
                part: "document",
                expected: 2,
                actual: 1,
            })?;
    let barcode = non_empty(barcode, "barcode")?;
    let file_number = non_empty(file_number, "file number")?;
    if !is_numeric(file_number) {
        return Err(ReferenceError::NotNumeric("file number"));
    }

    Ok(ParsedIdentity {
        district: district.to_string(),
        dossier: dossier.to_string(),
        barcode: barcode.to_string(),
        file_number: Some(file_number.to_string()),
        olo_number: None,
    })
}

fn strip_duplicate_reference(token: &str) -> &str {
    token.split_once('-').map(|(dossier, _)| dossier).unwrap_or(token)
}
