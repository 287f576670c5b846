use http::StatusCode;
use thiserror::Error;

use crate::access::ReasonCode;

/// Precise cause of an IIIF URL segment that could not be parsed.
///
/// Callers outside the parser only ever see [`InvalidIiifUrl`]; the cause is
/// kept for logging and tests.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReferenceError {
    /// Segment does not start with `<source>:`
    #[error("missing source tag (expected 'edepot:' or 'wabo:')")]
    MissingSourceTag,

    /// Source tag is not one of the known archive systems
    #[error("unknown source tag '{0}'")]
    UnknownSource(String),

    /// No `~` between the dossier and the document part
    #[error("missing '~' between dossier and document")]
    MissingDocumentSeparator,

    /// Wrong number of `_`-separated fields
    #[error("expected at least {expected} '_'-separated fields in the {part} part, got {actual}")]
    FieldCount {
        part: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A required field is empty
    #[error("empty {0} field")]
    EmptyField(&'static str),

    /// A field that must be numeric is not
    #[error("{0} is not numeric")]
    NotNumeric(&'static str),

    /// Region is not `full`, `square` or four integers
    #[error("malformed region '{0}'")]
    MalformedRegion(String),

    /// Region field is empty
    #[error("missing region parameter")]
    MissingRegionParameter,

    /// Scale is not `full` or `w,h` with at least one side present
    #[error("malformed scaling parameter '{0}'")]
    MalformedScalingParameter(String),

    /// Scale field is empty
    #[error("missing scaling parameter")]
    MissingScaleParameter,

    /// Path after the identifier is neither `info.json` nor region/scale/rotation/quality
    #[error("expected region/scale/rotation/quality after the identifier, got {0} path field(s)")]
    MalformedSuffix(usize),

    /// Full URL could not be parsed or decoded
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    /// Full URL does not contain the IIIF path prefix
    #[error("url does not contain '{0}'")]
    MissingIiifPrefix(&'static str),
}

/// Uniform outward error for any unparseable IIIF reference (HTTP 400).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid IIIF url '{segment}': {cause}")]
pub struct InvalidIiifUrl {
    /// The offending raw segment or URL
    pub segment: String,

    /// What exactly went wrong
    #[source]
    pub cause: ReferenceError,
}

/// Errors from the metadata service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetadataError {
    /// The metadata service does not know the dossier (HTTP 404)
    #[error("no metadata found for dossier {district}_{dossier}")]
    NotFound { district: String, dossier: String },

    /// Any other upstream failure (HTTP 502)
    #[error("metadata service unavailable: {0}")]
    Unavailable(String),
}

/// Errors from the single-file fetch pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Every candidate location answered 404
    #[error("file not found on the file server (tried {attempts} location(s))")]
    SourceNotFound { attempts: usize },

    /// The file server failed; `cause` names the triggering error class
    #[error("file server unavailable ({cause}): {detail}")]
    SourceUnavailable { cause: String, detail: String },

    /// The requested file number does not exist in the document
    #[error("file {file_number} not found in document {barcode}")]
    FilenameNotFoundInDocument { barcode: String, file_number: String },
}

/// Errors from cropping, scaling and re-encoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransformError {
    #[error("region width and height must be positive, got {width}x{height}")]
    NonPositiveRegion { width: i64, height: i64 },

    #[error("region does not overlap the image")]
    NonOverlappingRegion,

    #[error("failed to decode image: {message}")]
    DecodeError { message: String },

    #[error("failed to encode image: {message}")]
    EncodeError { message: String },
}

/// I/O errors from the external collaborators (object storage, queue, mail).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IoError {
    /// Error from S3 or S3-compatible storage
    #[error("S3 error: {0}")]
    S3(String),

    /// Object not found
    #[error("object not found: {0}")]
    NotFound(String),

    /// Error from the job queue
    #[error("queue error: {0}")]
    Queue(String),

    /// Error from the mail relay
    #[error("mail error: {0}")]
    Mail(String),

    /// Local filesystem error
    #[error("local I/O error: {0}")]
    Local(String),
}

/// Batch-fatal errors while processing a zip job.
///
/// Any of these leaves the queue message in place so the queue redelivers it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobError {
    /// Queue message body is not a valid envelope
    #[error("malformed queue message: {0}")]
    MalformedMessage(String),

    /// Envelope carries an unknown version tag
    #[error("unsupported job version '{0}'")]
    UnsupportedVersion(String),

    /// Job blob could not be decoded
    #[error("malformed job payload: {0}")]
    MalformedJob(String),

    /// Archive creation failed
    #[error("archive error: {0}")]
    Archive(String),

    /// External collaborator failed
    #[error(transparent)]
    Io(#[from] IoError),
}

/// Everything that can stop a single-file request, threaded as a value
/// through the request chain.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProxyError {
    #[error(transparent)]
    InvalidReference(#[from] InvalidIiifUrl),

    #[error(transparent)]
    Metadata(#[from] MetadataError),

    #[error("access denied: {}", .0.description())]
    Denied(ReasonCode),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Transform(#[from] TransformError),
}

impl ProxyError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::InvalidReference(_) => StatusCode::BAD_REQUEST,
            ProxyError::Metadata(MetadataError::NotFound { .. }) => StatusCode::NOT_FOUND,
            ProxyError::Metadata(MetadataError::Unavailable(_)) => StatusCode::BAD_GATEWAY,
            ProxyError::Denied(reason) => reason.status(),
            ProxyError::Fetch(FetchError::SourceNotFound { .. }) => StatusCode::NOT_FOUND,
            ProxyError::Fetch(FetchError::FilenameNotFoundInDocument { .. }) => {
                StatusCode::NOT_FOUND
            }
            ProxyError::Fetch(FetchError::SourceUnavailable { .. }) => StatusCode::BAD_GATEWAY,
            ProxyError::Transform(TransformError::NonPositiveRegion { .. })
            | ProxyError::Transform(TransformError::NonOverlappingRegion) => {
                StatusCode::BAD_REQUEST
            }
            ProxyError::Transform(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short machine-readable identifier used in logs.
    pub fn error_type(&self) -> &'static str {
        match self {
            ProxyError::InvalidReference(_) => "malformed_reference",
            ProxyError::Metadata(MetadataError::NotFound { .. }) => "metadata_not_found",
            ProxyError::Metadata(MetadataError::Unavailable(_)) => "metadata_unavailable",
            ProxyError::Denied(reason) => reason.as_str(),
            ProxyError::Fetch(FetchError::SourceNotFound { .. }) => "source_not_found",
            ProxyError::Fetch(FetchError::SourceUnavailable { .. }) => "source_unavailable",
            ProxyError::Fetch(FetchError::FilenameNotFoundInDocument { .. }) => {
                "filename_not_found_in_document"
            }
            ProxyError::Transform(TransformError::NonPositiveRegion { .. }) => {
                "non_positive_region"
            }
            ProxyError::Transform(TransformError::NonOverlappingRegion) => "non_overlapping_region",
            ProxyError::Transform(TransformError::DecodeError { .. }) => "decode_error",
            ProxyError::Transform(TransformError::EncodeError { .. }) => "encode_error",
        }
    }

    /// Reason text for a zip report line ("Not included in this zip because ...").
    pub fn reason_text(&self) -> String {
        match self {
            ProxyError::InvalidReference(_) => "the url could not be parsed".to_string(),
            ProxyError::Metadata(MetadataError::NotFound { .. }) => {
                "the dossier was not found in the metadata".to_string()
            }
            ProxyError::Metadata(MetadataError::Unavailable(_)) => {
                "the metadata service was unavailable".to_string()
            }
            ProxyError::Denied(reason) => reason.description().to_string(),
            ProxyError::Fetch(FetchError::SourceNotFound { .. }) => {
                "the file was not found on the file server".to_string()
            }
            ProxyError::Fetch(FetchError::SourceUnavailable { .. }) => {
                "the file server was unavailable".to_string()
            }
            ProxyError::Fetch(FetchError::FilenameNotFoundInDocument { .. }) => {
                "the requested file number does not exist in the document".to_string()
            }
            ProxyError::Transform(err) => err.to_string(),
        }
    }
}
