//! Zip job queue consumer.
//!
//! Each message goes through:
//!
//! ```text
//! Received ──► dequeue_count > max_attempts ──► Abandoned (message and blob deleted, nothing else)
//!     │
//!     ▼
//! Processing ──► any batch-fatal error ──► RequeuedForRetry (left on the queue)
//!     │
//!     ▼
//! Completed (archive uploaded, link mailed, blob and message deleted)
//! ```
//!
//! Per-URL failures are not batch-fatal: they become report lines.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{IoError, JobError};
use crate::fetch::{FetchedFile, FileSource};
use crate::iiif::{Source, UrlReference};
use crate::metadata::{MetadataCache, MetadataSource};
use crate::service::ArchiveService;

use super::archive::{sanitize_filename, write_zip, EntryNames};
use super::job::{QueueEnvelope, ZipJob};
use super::mailer::{Email, Mailer};
use super::queue::{JobQueue, ReceivedMessage};
use super::report::{ZipReport, REPORT_FILENAME};
use super::storage::ObjectStore;

/// Default number of deliveries before a message is given up on.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default validity of download links.
pub const DEFAULT_LINK_EXPIRY: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Default object key prefix for finished archives.
pub const DEFAULT_ARCHIVE_PREFIX: &str = "zips/";

// =============================================================================
// Configuration
// =============================================================================

/// When to stop redelivering a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl RetryPolicy {
    pub fn should_abandon(&self, dequeue_count: u32) -> bool {
        dequeue_count > self.max_attempts
    }
}

/// Worker settings.
#[derive(Debug, Clone)]
pub struct ZipSettings {
    /// Object key prefix for archives
    pub archive_prefix: String,

    /// Validity of the mailed download link
    pub link_expiry: Duration,

    /// Pause after a failed queue receive
    pub error_backoff: Duration,
}

impl Default for ZipSettings {
    fn default() -> Self {
        Self {
            archive_prefix: DEFAULT_ARCHIVE_PREFIX.to_string(),
            link_expiry: DEFAULT_LINK_EXPIRY,
            error_backoff: Duration::from_secs(5),
        }
    }
}

/// Final state of one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOutcome {
    Completed,
    RequeuedForRetry,
    Abandoned,
}

// =============================================================================
// Worker
// =============================================================================

/// Consumes zip jobs, one at a time.
pub struct ZipWorker<M, F> {
    service: Arc<ArchiveService<M, F>>,
    queue: Arc<dyn JobQueue>,
    store: Arc<dyn ObjectStore>,
    mailer: Arc<dyn Mailer>,
    retry: RetryPolicy,
    settings: ZipSettings,
}

impl<M: MetadataSource, F: FileSource> ZipWorker<M, F> {
    pub fn new(
        service: Arc<ArchiveService<M, F>>,
        queue: Arc<dyn JobQueue>,
        store: Arc<dyn ObjectStore>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        Self {
            service,
            queue,
            store,
            mailer,
            retry: RetryPolicy::default(),
            settings: ZipSettings::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_settings(mut self, settings: ZipSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Drive one message to its final state.
    pub async fn handle_message(&self, message: &ReceivedMessage) -> MessageOutcome {
        if self.retry.should_abandon(message.dequeue_count) {
            error!(
                message_id = %message.message_id,
                dequeue_count = message.dequeue_count,
                max_attempts = self.retry.max_attempts,
                "Abandoning zip job after too many deliveries"
            );
            if let Err(err) = self.queue.delete(message).await {
                error!(message_id = %message.message_id, "Failed to delete abandoned message: {}", err);
            }
            self.discard_blob(message).await;
            return MessageOutcome::Abandoned;
        }

        match self.process(message).await {
            Ok(job_id) => match self.queue.delete(message).await {
                Ok(()) => {
                    info!(message_id = %message.message_id, job_id = %job_id, "Zip job completed");
                    MessageOutcome::Completed
                }
                Err(err) => {
                    error!(
                        message_id = %message.message_id,
                        job_id = %job_id,
                        "Zip job done but message not deleted, it will be redelivered: {}",
                        err
                    );
                    MessageOutcome::RequeuedForRetry
                }
            },
            Err(err) => {
                error!(
                    message_id = %message.message_id,
                    dequeue_count = message.dequeue_count,
                    "Zip job failed, leaving it for redelivery: {}",
                    err
                );
                MessageOutcome::RequeuedForRetry
            }
        }
    }

    /// Best-effort removal of an abandoned message's job blob.
    async fn discard_blob(&self, message: &ReceivedMessage) {
        let envelope = match QueueEnvelope::decode(&message.body) {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!(message_id = %message.message_id, "Abandoned message has no readable envelope: {}", err);
                return;
            }
        };
        if let Err(err) = self.store.delete(&envelope.data).await {
            warn!(
                message_id = %message.message_id,
                blob = %envelope.data,
                "Failed to delete abandoned job blob: {}",
                err
            );
        }
    }

    async fn process(&self, message: &ReceivedMessage) -> Result<Uuid, JobError> {
        let envelope = QueueEnvelope::decode(&message.body)?;
        let blob = self.store.get(&envelope.data).await?;
        let job = ZipJob::from_json(&blob)?;

        self.process_job(&job).await?;

        self.store.delete(&envelope.data).await?;
        Ok(job.job_id)
    }

    /// Build, upload and mail the archive for `job`.
    ///
    /// Returns the report. Temporary files are removed on return.
    pub async fn process_job(&self, job: &ZipJob) -> Result<ZipReport, JobError> {
        info!(job_id = %job.job_id, urls = job.urls.len(), "Processing zip job");

        let workdir = tempfile::tempdir().map_err(local)?;
        let report = self.collect_files(job, workdir.path()).await?;
        tokio::fs::write(workdir.path().join(REPORT_FILENAME), report.render())
            .await
            .map_err(local)?;

        let outdir = tempfile::tempdir().map_err(local)?;
        let archive_path = outdir.path().join(format!("{}.zip", job.job_id));
        let (source_dir, target) = (workdir.path().to_path_buf(), archive_path.clone());
        let entries = tokio::task::spawn_blocking(move || write_zip(&source_dir, &target))
            .await
            .map_err(|e| JobError::Archive(e.to_string()))??;
        let archive = tokio::fs::read(&archive_path).await.map_err(local)?;

        let key = format!("{}{}.zip", self.settings.archive_prefix, Uuid::new_v4());
        self.store
            .put(&key, Bytes::from(archive), "application/zip")
            .await?;
        let link = self.store.signed_url(&key, self.settings.link_expiry).await?;
        debug!(job_id = %job.job_id, key = %key, entries, "Archive uploaded");

        let email = Email::download_link(&job.email_address, &link, self.settings.link_expiry);
        self.mailer.send(&email).await?;

        Ok(report)
    }

    async fn collect_files(&self, job: &ZipJob, workdir: &Path) -> Result<ZipReport, JobError> {
        let caller = job.caller();
        let mut cache = MetadataCache::new();
        let mut report = ZipReport::new();
        let mut names = EntryNames::new();
        names.reserve(REPORT_FILENAME);

        for entry in &job.urls {
            match self
                .service
                .retrieve(&entry.reference, &caller, &mut cache)
                .await
            {
                Ok(file) => {
                    let filename = names.claim(&entry_name(&entry.reference, &file));
                    tokio::fs::write(workdir.join(&filename), &file.data)
                        .await
                        .map_err(local)?;
                    report.included(&filename);
                }
                Err(err) => {
                    warn!(
                        job_id = %job.job_id,
                        url = %entry.raw_url,
                        error_type = err.error_type(),
                        "File left out of zip: {}",
                        err
                    );
                    report.excluded(&entry.reference.display_filename(), &err.reason_text());
                }
            }
        }

        Ok(report)
    }

    /// Receive and handle whatever the queue hands out in one poll.
    pub async fn run_once(&self) -> Result<Vec<MessageOutcome>, IoError> {
        let messages = self.queue.receive().await?;
        let mut outcomes = Vec::with_capacity(messages.len());
        for message in &messages {
            outcomes.push(self.handle_message(message).await);
        }
        Ok(outcomes)
    }

    /// Poll until `shutdown` turns true. A job in progress is always finished.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!("Zip worker started");
        loop {
            if *shutdown.borrow() {
                break;
            }

            let received = tokio::select! {
                _ = shutdown.changed() => break,
                received = self.queue.receive() => received,
            };

            match received {
                Ok(messages) => {
                    for message in &messages {
                        self.handle_message(message).await;
                    }
                }
                Err(err) => {
                    error!("Failed to receive from job queue: {}", err);
                    tokio::time::sleep(self.settings.error_backoff).await;
                }
            }
        }
        info!("Zip worker stopped");
    }
}

/// Archive entry name for a fetched file.
///
/// Always starts with the reference's display name, the name excluded
/// files are reported under. Wabo files keep their metadata file name after it.
fn entry_name(reference: &UrlReference, file: &FetchedFile) -> String {
    match reference.source {
        Source::Edepot => reference.display_filename(),
        Source::Wabo => format!(
            "{}_{}",
            reference.display_filename(),
            sanitize_filename(&file.filename)
        ),
    }
}

fn local(err: std::io::Error) -> IoError {
    IoError::Local(err.to_string())
}
