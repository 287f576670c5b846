//! Zip job wire formats.
//!
//! A job is stored as a blob; the queue message only names the blob:
//!
//! ```text
//! queue:  {"version": "zip_job_v1", "data": "zip_jobs/<uuid>.json"}
//! blob:   {"job_id": "...", "email_address": "...", "scope": "...",
//!          "is_mail_login": false,
//!          "urls": {"<raw url>": {"url_info": {...}}, ...}}
//! ```
//!
//! The `urls` object keeps request order.

use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use crate::access::CallerContext;
use crate::error::JobError;
use crate::iiif::UrlReference;

/// Version tag of the current envelope format.
pub const ZIP_JOB_VERSION: &str = "zip_job_v1";

/// Blob name prefix for stored jobs.
pub const JOB_BLOB_PREFIX: &str = "zip_jobs/";

// =============================================================================
// Queue Envelope
// =============================================================================

/// Queue message body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEnvelope {
    pub version: String,

    /// Blob name of the job
    pub data: String,
}

impl QueueEnvelope {
    pub fn for_blob(blob_name: impl Into<String>) -> Self {
        Self {
            version: ZIP_JOB_VERSION.to_string(),
            data: blob_name.into(),
        }
    }

    /// Parse and version-check a message body.
    pub fn decode(body: &str) -> Result<Self, JobError> {
        let envelope: QueueEnvelope =
            serde_json::from_str(body).map_err(|e| JobError::MalformedMessage(e.to_string()))?;
        if envelope.version != ZIP_JOB_VERSION {
            return Err(JobError::UnsupportedVersion(envelope.version));
        }
        Ok(envelope)
    }

    pub fn encode(&self) -> Result<String, JobError> {
        serde_json::to_string(self).map_err(|e| JobError::MalformedMessage(e.to_string()))
    }
}

// =============================================================================
// Zip Job
// =============================================================================

/// One requested URL and its parsed reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobUrl {
    pub raw_url: String,
    pub reference: UrlReference,
}

/// A bulk download request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZipJob {
    #[serde(default = "Uuid::new_v4")]
    pub job_id: Uuid,

    pub email_address: String,

    pub scope: String,

    #[serde(default)]
    pub is_mail_login: bool,

    #[serde(with = "ordered_urls")]
    pub urls: Vec<JobUrl>,
}

impl ZipJob {
    /// New job for `caller`. Repeated URLs are kept once, at their first position.
    pub fn new(email_address: impl Into<String>, caller: &CallerContext, urls: Vec<JobUrl>) -> Self {
        let mut unique: Vec<JobUrl> = Vec::with_capacity(urls.len());
        for url in urls {
            if !unique.iter().any(|u| u.raw_url == url.raw_url) {
                unique.push(url);
            }
        }

        Self {
            job_id: Uuid::new_v4(),
            email_address: email_address.into(),
            scope: caller.scope.clone(),
            is_mail_login: caller.is_mail_login,
            urls: unique,
        }
    }

    /// Blob name the job is stored under.
    pub fn blob_name(&self) -> String {
        format!("{}{}.json", JOB_BLOB_PREFIX, self.job_id)
    }

    /// The requesting caller, as seen by the access engine.
    pub fn caller(&self) -> CallerContext {
        CallerContext {
            scope: self.scope.clone(),
            email: Some(self.email_address.clone()),
            is_mail_login: self.is_mail_login,
        }
    }

    pub fn to_json(&self) -> Result<Vec<u8>, JobError> {
        serde_json::to_vec(self).map_err(|e| JobError::MalformedJob(e.to_string()))
    }

    pub fn from_json(data: &[u8]) -> Result<Self, JobError> {
        serde_json::from_slice(data).map_err(|e| JobError::MalformedJob(e.to_string()))
    }
}

mod ordered_urls {
    use super::*;

    #[derive(Serialize)]
    struct EntryRef<'a> {
        url_info: &'a UrlReference,
    }

    #[derive(Deserialize)]
    struct Entry {
        url_info: UrlReference,
    }

    pub fn serialize<S: Serializer>(urls: &[JobUrl], serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(urls.len()))?;
        for url in urls {
            map.serialize_entry(
                &url.raw_url,
                &EntryRef {
                    url_info: &url.reference,
                },
            )?;
        }
        map.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<JobUrl>, D::Error> {
        deserializer.deserialize_map(UrlsVisitor)
    }

    struct UrlsVisitor;

    impl<'de> Visitor<'de> for UrlsVisitor {
        type Value = Vec<JobUrl>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a map of raw url to {\"url_info\": reference}")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
            let mut urls = Vec::with_capacity(access.size_hint().unwrap_or(0));
            while let Some((raw_url, entry)) = access.next_entry::<String, Entry>()? {
                urls.push(JobUrl {
                    raw_url,
                    reference: entry.url_info,
                });
            }
            Ok(urls)
        }
    }
}
