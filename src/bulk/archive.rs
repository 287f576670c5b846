//! Zip archive creation.

use std::collections::HashSet;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::JobError;

/// Zip every regular file directly inside `dir` into `archive_path`.
///
/// Entries are added in file name order. Blocking; run it off the async
/// runtime.
pub fn write_zip(dir: &Path, archive_path: &Path) -> Result<usize, JobError> {
    let archive_error = |e: &dyn std::fmt::Display| JobError::Archive(e.to_string());

    let mut entries = std::fs::read_dir(dir)
        .map_err(|e| archive_error(&e))?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .map(|entry| entry.path())
        .collect::<Vec<_>>();
    entries.sort();

    let file = File::create(archive_path).map_err(|e| archive_error(&e))?;
    let mut zip = ZipWriter::new(file);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    for path in &entries {
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| JobError::Archive(format!("non UTF-8 file name {}", path.display())))?;
        let data = std::fs::read(path).map_err(|e| archive_error(&e))?;

        zip.start_file(name, options).map_err(|e| archive_error(&e))?;
        zip.write_all(&data).map_err(|e| archive_error(&e))?;
    }

    zip.finish().map_err(|e| archive_error(&e))?;
    Ok(entries.len())
}

/// Make an upstream file name safe to create inside the working directory.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| match c {
            ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    match cleaned.trim_matches('.') {
        "" => "file".to_string(),
        _ => cleaned,
    }
}

/// Hands out unique entry names for one archive.
///
/// Names are compared case-insensitively so the archive also unpacks on
/// case-insensitive file systems. A taken name gets a ` (n)` suffix before
/// its extension.
#[derive(Debug, Default)]
pub struct EntryNames {
    used: HashSet<String>,
}

impl EntryNames {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep `name` out of reach of [`claim`](Self::claim).
    pub fn reserve(&mut self, name: &str) {
        self.used.insert(name.to_lowercase());
    }

    /// Sanitize `name` and make it unique within the archive.
    pub fn claim(&mut self, name: &str) -> String {
        let name = sanitize_filename(name);
        if self.used.insert(name.to_lowercase()) {
            return name;
        }

        let (stem, extension) = match name.rfind('.') {
            Some(dot) if dot > 0 => name.split_at(dot),
            _ => (name.as_str(), ""),
        };
        (2..)
            .map(|n| format!("{} ({}){}", stem, n, extension))
            .find(|candidate| self.used.insert(candidate.to_lowercase()))
            .unwrap_or(name)
    }
}
