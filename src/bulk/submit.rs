//! Enqueueing zip jobs.

use std::sync::Arc;

use bytes::Bytes;
use tracing::info;

use crate::error::JobError;

use super::job::{QueueEnvelope, ZipJob};
use super::queue::JobQueue;
use super::storage::ObjectStore;

/// Stores a job blob and queues a message pointing at it.
#[derive(Clone)]
pub struct JobSubmitter {
    queue: Arc<dyn JobQueue>,
    store: Arc<dyn ObjectStore>,
}

impl JobSubmitter {
    pub fn new(queue: Arc<dyn JobQueue>, store: Arc<dyn ObjectStore>) -> Self {
        Self { queue, store }
    }

    /// The blob is written first, so a queued message always has its job.
    pub async fn submit(&self, job: &ZipJob) -> Result<(), JobError> {
        let blob_name = job.blob_name();
        self.store
            .put(&blob_name, Bytes::from(job.to_json()?), "application/json")
            .await?;

        let envelope = QueueEnvelope::for_blob(&blob_name);
        self.queue.send(&envelope.encode()?).await?;

        info!(job_id = %job.job_id, urls = job.urls.len(), "Zip job queued");
        Ok(())
    }
}
