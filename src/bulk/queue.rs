//! Durable job queue.

use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_sqs::types::MessageSystemAttributeName;
use aws_sdk_sqs::Client;

use crate::error::IoError;

/// A message taken off the queue, still owned by it until deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedMessage {
    pub message_id: String,

    /// Handle used to delete the message
    pub receipt: String,

    pub body: String,

    /// How many times the queue has delivered this message, this time included
    pub dequeue_count: u32,
}

/// At-least-once message queue.
///
/// A received message becomes invisible for the queue's visibility timeout
/// and reappears unless deleted.
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn send(&self, body: &str) -> Result<(), IoError>;

    /// Wait for messages; may return none.
    async fn receive(&self) -> Result<Vec<ReceivedMessage>, IoError>;

    async fn delete(&self, message: &ReceivedMessage) -> Result<(), IoError>;
}

/// Default long-poll wait.
pub const DEFAULT_WAIT_TIME: Duration = Duration::from_secs(20);

/// Default visibility timeout for a received job.
pub const DEFAULT_VISIBILITY_TIMEOUT: Duration = Duration::from_secs(15 * 60);

/// Amazon SQS (or compatible) queue.
#[derive(Clone)]
pub struct SqsJobQueue {
    client: Client,
    queue_url: String,
    wait_time: Duration,
    visibility_timeout: Duration,
}

impl SqsJobQueue {
    pub fn new(client: Client, queue_url: impl Into<String>) -> Self {
        Self {
            client,
            queue_url: queue_url.into(),
            wait_time: DEFAULT_WAIT_TIME,
            visibility_timeout: DEFAULT_VISIBILITY_TIMEOUT,
        }
    }

    pub fn with_wait_time(mut self, wait_time: Duration) -> Self {
        self.wait_time = wait_time;
        self
    }

    pub fn with_visibility_timeout(mut self, visibility_timeout: Duration) -> Self {
        self.visibility_timeout = visibility_timeout;
        self
    }

    pub fn queue_url(&self) -> &str {
        &self.queue_url
    }
}

#[async_trait]
impl JobQueue for SqsJobQueue {
    async fn send(&self, body: &str) -> Result<(), IoError> {
        self.client
            .send_message()
            .queue_url(&self.queue_url)
            .message_body(body)
            .send()
            .await
            .map_err(|e| IoError::Queue(e.to_string()))?;
        Ok(())
    }

    async fn receive(&self) -> Result<Vec<ReceivedMessage>, IoError> {
        let output = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(1)
            .wait_time_seconds(self.wait_time.as_secs() as i32)
            .visibility_timeout(self.visibility_timeout.as_secs() as i32)
            .message_system_attribute_names(MessageSystemAttributeName::ApproximateReceiveCount)
            .send()
            .await
            .map_err(|e| IoError::Queue(e.to_string()))?;

        let messages = output
            .messages()
            .iter()
            .filter_map(|message| {
                let dequeue_count = message
                    .attributes()
                    .and_then(|attributes| {
                        attributes.get(&MessageSystemAttributeName::ApproximateReceiveCount)
                    })
                    .and_then(|count| count.parse().ok())
                    .unwrap_or(1);

                Some(ReceivedMessage {
                    message_id: message.message_id()?.to_string(),
                    receipt: message.receipt_handle()?.to_string(),
                    body: message.body().unwrap_or_default().to_string(),
                    dequeue_count,
                })
            })
            .collect();

        Ok(messages)
    }

    async fn delete(&self, message: &ReceivedMessage) -> Result<(), IoError> {
        self.client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(&message.receipt)
            .send()
            .await
            .map_err(|e| IoError::Queue(e.to_string()))?;
        Ok(())
    }
}

/// Create an SQS client with optional custom endpoint and region.
pub async fn create_sqs_client(endpoint_url: Option<&str>, region: &str) -> Client {
    let region = aws_config::Region::new(region.to_string());
    let mut config_loader =
        aws_config::defaults(aws_config::BehaviorVersion::latest()).region(region);

    if let Some(endpoint) = endpoint_url {
        config_loader = config_loader.endpoint_url(endpoint);
    }

    let sdk_config = config_loader.load().await;
    Client::new(&sdk_config)
}
