//! Candidate file locations.
//!
//! The archives are inconsistent about file name casing and path
//! separators, so each reference expands into an ordered list of locations
//! to try.

use crate::error::FetchError;
use crate::iiif::{Source, UrlReference};
use crate::metadata::DossierMetadata;

/// Base URLs of the two file servers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEndpoints {
    pub edepot_url: String,
    pub wabo_url: String,
}

impl FileEndpoints {
    pub fn new(edepot_url: impl Into<String>, wabo_url: impl Into<String>) -> Self {
        Self {
            edepot_url: edepot_url.into().trim_end_matches('/').to_string(),
            wabo_url: wabo_url.into().trim_end_matches('/').to_string(),
        }
    }
}

/// A resolved file: its name and the locations to try, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileCandidates {
    pub filename: String,
    pub urls: Vec<String>,
}

/// Candidate locations for `reference`.
pub fn candidates(
    reference: &UrlReference,
    metadata: &DossierMetadata,
    endpoints: &FileEndpoints,
) -> Result<FileCandidates, FetchError> {
    match reference.source {
        Source::Edepot => Ok(edepot_candidates(reference, endpoints)),
        Source::Wabo => wabo_candidates(reference, metadata, endpoints),
    }
}

fn edepot_candidates(reference: &UrlReference, endpoints: &FileEndpoints) -> FileCandidates {
    let stem = match &reference.file_number {
        Some(number) => format!("{}_{}", reference.document_barcode, number),
        None => reference.document_barcode.clone(),
    };
    let directory = format!(
        "{}/{}/{}",
        endpoints.edepot_url,
        urlencoding::encode(&reference.district),
        urlencoding::encode(&reference.dossier)
    );

    let names = [
        format!("{}.jpg", stem),
        format!("{}.jpg", stem.to_uppercase()),
        format!("{}.JPG", stem),
    ];
    let urls = names
        .iter()
        .map(|name| format!("{}/{}", directory, urlencoding::encode(name)))
        .collect();

    FileCandidates {
        filename: names[0].clone(),
        urls: dedup(urls),
    }
}

fn wabo_candidates(
    reference: &UrlReference,
    metadata: &DossierMetadata,
    endpoints: &FileEndpoints,
) -> Result<FileCandidates, FetchError> {
    let not_found = || FetchError::FilenameNotFoundInDocument {
        barcode: reference.document_barcode.clone(),
        file_number: reference
            .file_number
            .clone()
            .unwrap_or_else(|| "1".to_string()),
    };

    let file = metadata
        .document(&reference.document_barcode)
        .and_then(|document| document.file(reference.file_number.as_deref()))
        .ok_or_else(not_found)?;

    let normalized = file.path.replace('\\', "/");
    let paths = [
        file.path.clone(),
        normalized.clone(),
        lowercase_extension(&normalized),
    ];
    let urls = paths
        .iter()
        .map(|path| join_path(&endpoints.wabo_url, path))
        .collect();

    Ok(FileCandidates {
        filename: file.filename.clone(),
        urls: dedup(urls),
    })
}

fn join_path(base: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    let encoded: Vec<String> = path
        .trim_start_matches('/')
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect();
    format!("{}/{}", base, encoded.join("/"))
}

fn lowercase_extension(path: &str) -> String {
    let file_start = path.rfind('/').map(|i| i + 1).unwrap_or(0);
    match path[file_start..].rfind('.') {
        Some(dot) => {
            let split = file_start + dot;
            format!("{}{}", &path[..split], path[split..].to_lowercase())
        }
        None => path.to_string(),
    }
}

fn dedup(urls: Vec<String>) -> Vec<String> {
    let mut unique: Vec<String> = Vec::with_capacity(urls.len());
    for url in urls {
        if !unique.contains(&url) {
            unique.push(url);
        }
    }
    unique
}
