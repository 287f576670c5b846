//! Bulk zip downloads.
//!
//! ```text
//! POST /iiif/zip ─► JobSubmitter ─► ObjectStore (job blob)
//!                        │
//!                        └────────► JobQueue ("zip_job_v1" envelope)
//!                                        │
//!                                        ▼
//!                                   ZipWorker ─► ArchiveService per URL
//!                                        │
//!                                        ├─► zip + report.txt ─► ObjectStore
//!                                        └─► Mailer (download link)
//! ```
//!
//! Delivery is at-least-once: a job that fails part way is redelivered by
//! the queue and may produce a second archive and email.

mod archive;
mod job;
mod mailer;
mod queue;
mod report;
mod storage;
mod submit;
mod worker;

pub use archive::{sanitize_filename, write_zip, EntryNames};
pub use job::{JobUrl, QueueEnvelope, ZipJob, JOB_BLOB_PREFIX, ZIP_JOB_VERSION};
pub use mailer::{Email, HttpMailer, Mailer};
pub use queue::{
    create_sqs_client, JobQueue, ReceivedMessage, SqsJobQueue, DEFAULT_VISIBILITY_TIMEOUT,
    DEFAULT_WAIT_TIME,
};
pub use report::{ZipReport, REPORT_FILENAME};
pub use storage::{create_s3_client, ObjectStore, S3ObjectStore};
pub use submit::JobSubmitter;
pub use worker::{
    MessageOutcome, RetryPolicy, ZipSettings, ZipWorker, DEFAULT_ARCHIVE_PREFIX,
    DEFAULT_LINK_EXPIRY, DEFAULT_MAX_ATTEMPTS,
};
