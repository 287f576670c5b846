//! Object storage for job blobs and finished archives.

use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;

use crate::error::IoError;

/// Blob store with time-limited download links.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> Result<(), IoError>;

    async fn get(&self, key: &str) -> Result<Bytes, IoError>;

    async fn delete(&self, key: &str) -> Result<(), IoError>;

    /// A URL that downloads `key` without credentials until `expires_in` passes.
    async fn signed_url(&self, key: &str, expires_in: Duration) -> Result<String, IoError>;
}

/// S3 bucket, or any S3-compatible service.
#[derive(Clone)]
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
}

impl S3ObjectStore {
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn location(&self, key: &str) -> String {
        format!("s3://{}/{}", self.bucket, key)
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> Result<(), IoError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| IoError::S3(format!("put {}: {}", self.location(key), e)))?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes, IoError> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let is_not_found = e
                    .as_service_error()
                    .map(|se| se.is_no_such_key())
                    .unwrap_or(false);
                if is_not_found {
                    IoError::NotFound(self.location(key))
                } else {
                    IoError::S3(format!("get {}: {}", self.location(key), e))
                }
            })?;

        let data = response
            .body
            .collect()
            .await
            .map_err(|e| IoError::S3(format!("read {}: {}", self.location(key), e)))?
            .into_bytes();
        Ok(data)
    }

    async fn delete(&self, key: &str) -> Result<(), IoError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| IoError::S3(format!("delete {}: {}", self.location(key), e)))?;
        Ok(())
    }

    async fn signed_url(&self, key: &str, expires_in: Duration) -> Result<String, IoError> {
        let config = PresigningConfig::expires_in(expires_in)
            .map_err(|e| IoError::S3(format!("presigning config: {}", e)))?;
        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(config)
            .await
            .map_err(|e| IoError::S3(format!("presign {}: {}", self.location(key), e)))?;
        Ok(request.uri().to_string())
    }
}

/// Create an S3 client with optional custom endpoint and region.
///
/// Use a custom endpoint for S3-compatible services like MinIO:
/// ```ignore
/// let client = create_s3_client(Some("http://localhost:9000"), "us-east-1").await;
/// ```
pub async fn create_s3_client(endpoint_url: Option<&str>, region: &str) -> Client {
    let region = aws_config::Region::new(region.to_string());
    let mut config_loader =
        aws_config::defaults(aws_config::BehaviorVersion::latest()).region(region);

    if let Some(endpoint) = endpoint_url {
        config_loader = config_loader.endpoint_url(endpoint);
    }

    let sdk_config = config_loader.load().await;

    // S3-compatible services need path-style addressing
    let s3_config = if endpoint_url.is_some() {
        aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(true)
            .build()
    } else {
        aws_sdk_s3::config::Builder::from(&sdk_config).build()
    };

    Client::from_conf(s3_config)
}
