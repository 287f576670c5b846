//! Test utilities for integration tests.
//!
//! In-memory stand-ins for every external collaborator, each recording the
//! calls it receives, plus fixtures for a small edepot and wabo archive.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};

use archive_iiif_proxy::access::{AccessEngine, AccessPolicy};
use archive_iiif_proxy::bulk::{Email, JobQueue, JobSubmitter, Mailer, ObjectStore, ReceivedMessage, ZipWorker};
use archive_iiif_proxy::error::{IoError, MetadataError};
use archive_iiif_proxy::fetch::{FileEndpoints, FilePipeline, FileSource, TransportError, UpstreamResponse};
use archive_iiif_proxy::metadata::{MetadataResolver, MetadataSource, RawDocument, RawDossier, RawFile};
use archive_iiif_proxy::server::{create_router, AppState, RouterConfig, TokenAuth};
use archive_iiif_proxy::service::ArchiveService;
use archive_iiif_proxy::transform::ImageTransformer;

pub const EDEPOT_URL: &str = "http://edepot.test/files";
pub const WABO_URL: &str = "http://wabo.test";
pub const STAFF_SECRET: &str = "staff-secret";
pub const MAIL_SECRET: &str = "mail-secret";
pub const LOGIN_ORIGIN: &str = "https://dossiers.example.com";

// =============================================================================
// Mock Metadata Source
// =============================================================================

/// Metadata service serving fixed dossiers and counting calls.
#[derive(Clone, Default)]
pub struct MockMetadataSource {
    dossiers: HashMap<String, RawDossier>,
    unavailable: bool,
    call_count: Arc<AtomicUsize>,
}

impl MockMetadataSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dossier(mut self, district: &str, dossier: &str, raw: RawDossier) -> Self {
        self.dossiers.insert(format!("{}_{}", district, dossier), raw);
        self
    }

    /// Every call fails as if the service were down.
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetadataSource for MockMetadataSource {
    async fn fetch_dossier(
        &self,
        district: &str,
        dossier: &str,
    ) -> Result<RawDossier, MetadataError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);

        if self.unavailable {
            return Err(MetadataError::Unavailable("connection refused".to_string()));
        }

        self.dossiers
            .get(&format!("{}_{}", district, dossier))
            .cloned()
            .ok_or_else(|| MetadataError::NotFound {
                district: district.to_string(),
                dossier: dossier.to_string(),
            })
    }
}

// =============================================================================
// Mock File Source
// =============================================================================

/// File server answering from a URL table; unknown URLs get 404.
#[derive(Clone, Default)]
pub struct MockFileSource {
    files: HashMap<String, UpstreamResponse>,
    failures: HashMap<String, TransportError>,
    requests: Arc<Mutex<Vec<String>>>,
}

impl MockFileSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, url: &str, data: impl Into<Bytes>, content_type: &str) -> Self {
        self.files
            .insert(url.to_string(), UpstreamResponse::ok(data, Some(content_type)));
        self
    }

    pub fn with_status(mut self, url: &str, status: u16) -> Self {
        self.files
            .insert(url.to_string(), UpstreamResponse::status(status));
        self
    }

    pub fn with_failure(mut self, url: &str, failure: TransportError) -> Self {
        self.failures.insert(url.to_string(), failure);
        self
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl FileSource for MockFileSource {
    async fn get(&self, url: &str) -> Result<UpstreamResponse, TransportError> {
        self.requests.lock().unwrap().push(url.to_string());

        if let Some(failure) = self.failures.get(url) {
            return Err(failure.clone());
        }
        Ok(self
            .files
            .get(url)
            .cloned()
            .unwrap_or_else(|| UpstreamResponse::status(404)))
    }
}

// =============================================================================
// In-Memory Queue, Store and Mailer
// =============================================================================

/// Queue that hands out whatever was sent or pushed, once.
#[derive(Default)]
pub struct InMemoryQueue {
    pending: Mutex<Vec<ReceivedMessage>>,
    sent: Mutex<Vec<String>>,
    deleted: Mutex<Vec<String>>,
    next_id: AtomicUsize,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `body` available as if delivered `dequeue_count` times.
    pub fn push(&self, body: &str, dequeue_count: u32) -> ReceivedMessage {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let message = ReceivedMessage {
            message_id: format!("msg-{}", id),
            receipt: format!("receipt-{}", id),
            body: body.to_string(),
            dequeue_count,
        };
        self.pending.lock().unwrap().push(message.clone());
        message
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobQueue for InMemoryQueue {
    async fn send(&self, body: &str) -> Result<(), IoError> {
        self.sent.lock().unwrap().push(body.to_string());
        self.push(body, 1);
        Ok(())
    }

    async fn receive(&self) -> Result<Vec<ReceivedMessage>, IoError> {
        Ok(std::mem::take(&mut *self.pending.lock().unwrap()))
    }

    async fn delete(&self, message: &ReceivedMessage) -> Result<(), IoError> {
        self.deleted.lock().unwrap().push(message.message_id.clone());
        Ok(())
    }
}

/// Object store backed by a map.
#[derive(Default)]
pub struct InMemoryStore {
    objects: Mutex<HashMap<String, Bytes>>,
    failing_prefix: Option<String>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `put` fails.
    pub fn failing() -> Self {
        Self::failing_under("")
    }

    /// Every `put` of a key starting with `prefix` fails.
    pub fn failing_under(prefix: &str) -> Self {
        Self {
            failing_prefix: Some(prefix.to_string()),
            ..Self::default()
        }
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.lock().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn object(&self, key: &str) -> Option<Bytes> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.keys()
            .into_iter()
            .filter(|key| key.starts_with(prefix))
            .collect()
    }
}

#[async_trait]
impl ObjectStore for InMemoryStore {
    async fn put(&self, key: &str, data: Bytes, _content_type: &str) -> Result<(), IoError> {
        if self
            .failing_prefix
            .as_deref()
            .is_some_and(|prefix| key.starts_with(prefix))
        {
            return Err(IoError::S3("bucket unavailable".to_string()));
        }
        self.objects.lock().unwrap().insert(key.to_string(), data);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes, IoError> {
        self.object(key)
            .ok_or_else(|| IoError::NotFound(key.to_string()))
    }

    async fn delete(&self, key: &str) -> Result<(), IoError> {
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }

    async fn signed_url(&self, key: &str, expires_in: Duration) -> Result<String, IoError> {
        Ok(format!(
            "https://storage.test/{}?expires={}",
            key,
            expires_in.as_secs()
        ))
    }
}

/// Mailer that keeps every email.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<Email>>,
    failing: bool,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every send fails and nothing is recorded.
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<Email> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: &Email) -> Result<(), IoError> {
        if self.failing {
            return Err(IoError::Mail("mail relay unavailable".to_string()));
        }
        self.sent.lock().unwrap().push(email.clone());
        Ok(())
    }
}

// =============================================================================
// Fixtures
// =============================================================================

/// Create a test RGB JPEG image.
pub fn create_test_jpeg(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    });

    let mut buf = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut buf, 90);
    encoder.encode_image(&img).unwrap();
    buf
}

/// Check if data is a valid JPEG (starts with SOI, ends with EOI).
pub fn is_valid_jpeg(data: &[u8]) -> bool {
    data.len() >= 4 && data[0..2] == [0xFF, 0xD8] && data[data.len() - 2..] == [0xFF, 0xD9]
}

pub fn document(barcode: &str, access: &str) -> RawDocument {
    RawDocument {
        barcode: barcode.to_string(),
        access: Some(access.to_string()),
        ..RawDocument::default()
    }
}

/// Edepot dossier `SDZ_38`:
///
/// - `SDZ-38-0001` public
/// - `SDZ-38-0002` restricted
/// - `SDZ-38-0003` public, copyright
/// - `SDZ-38-0004` restricted access request
pub fn edepot_dossier() -> RawDossier {
    RawDossier {
        access: Some("PUBLIC".to_string()),
        documents: vec![
            document("SDZ-38-0001", "PUBLIC"),
            document("SDZ-38-0002", "RESTRICTED"),
            RawDocument {
                copyright: Some("J".to_string()),
                ..document("SDZ-38-0003", "PUBLIC")
            },
            RawDocument {
                title: Some("Aanvraag bouwvergunning".to_string()),
                ..document("SDZ-38-0004", "RESTRICTED")
            },
        ],
    }
}

/// Public dossier holding a single public document.
pub fn public_dossier(barcode: &str) -> RawDossier {
    RawDossier {
        access: Some("PUBLIC".to_string()),
        documents: vec![document(barcode, "PUBLIC")],
    }
}

/// Wabo dossier `SDC_9089` with one public document of two files.
pub fn wabo_dossier() -> RawDossier {
    RawDossier {
        access: Some("PUBLIC".to_string()),
        documents: vec![RawDocument {
            files: vec![
                RawFile {
                    filename: "tekening.jpg".to_string(),
                    path: "SDC\\9089\\tekening.jpg".to_string(),
                },
                RawFile {
                    filename: "besluit.pdf".to_string(),
                    path: "SDC\\9089\\besluit.PDF".to_string(),
                },
            ],
            ..document("ST-00015-00001", "PUBLIC")
        }],
    }
}

/// File server URL of an edepot scan, first candidate spelling.
pub fn edepot_file_url(barcode: &str, file_number: &str) -> String {
    let district = barcode.split('-').next().unwrap_or_default();
    let dossier = barcode.split('-').nth(1).unwrap_or_default();
    format!(
        "{}/{}/{}/{}_{}.jpg",
        EDEPOT_URL, district, dossier, barcode, file_number
    )
}

pub fn metadata_source() -> MockMetadataSource {
    MockMetadataSource::new()
        .with_dossier("SDZ", "38", edepot_dossier())
        .with_dossier("SDC", "9089", wabo_dossier())
}

pub fn test_service(
    metadata: MockMetadataSource,
    files: MockFileSource,
) -> ArchiveService<MockMetadataSource, MockFileSource> {
    let policy = AccessPolicy::default();
    ArchiveService::new(
        MetadataResolver::new(metadata, policy.clone()),
        AccessEngine::new(policy),
        FilePipeline::new(files, FileEndpoints::new(EDEPOT_URL, WABO_URL)),
        ImageTransformer::default(),
    )
}

pub fn test_auth() -> TokenAuth {
    TokenAuth::new(STAFF_SECRET, MAIL_SECRET, AccessPolicy::default())
}

pub fn staff_token(scopes: &[&str]) -> String {
    let scopes: Vec<String> = scopes.iter().map(|s| s.to_string()).collect();
    test_auth().sign_staff_token(&scopes, Some("clerk@example.com"), Duration::from_secs(3600))
}

pub fn mail_token(email: &str) -> String {
    test_auth().issue_mail_token(email, Duration::from_secs(3600))
}

/// Everything a router test may want to inspect afterwards.
pub struct TestApp {
    pub router: axum::Router,
    pub metadata: MockMetadataSource,
    pub files: MockFileSource,
    pub queue: Arc<InMemoryQueue>,
    pub store: Arc<InMemoryStore>,
    pub mailer: Arc<RecordingMailer>,
}

pub fn test_app(metadata: MockMetadataSource, files: MockFileSource) -> TestApp {
    test_app_with_store(metadata, files, InMemoryStore::new())
}

pub fn test_app_with_store(
    metadata: MockMetadataSource,
    files: MockFileSource,
    store: InMemoryStore,
) -> TestApp {
    let queue = Arc::new(InMemoryQueue::new());
    let store = Arc::new(store);
    let mailer = Arc::new(RecordingMailer::new());

    let state = AppState::new(test_service(metadata.clone(), files.clone()), test_auth())
        .with_submitter(JobSubmitter::new(queue.clone(), store.clone()))
        .with_mailer(mailer.clone())
        .with_login_origins(vec![LOGIN_ORIGIN.to_string()]);

    let router = create_router(state, RouterConfig::new().with_tracing(false));

    TestApp {
        router,
        metadata,
        files,
        queue,
        store,
        mailer,
    }
}

pub fn test_worker(
    metadata: MockMetadataSource,
    files: MockFileSource,
    queue: Arc<InMemoryQueue>,
    store: Arc<InMemoryStore>,
    mailer: Arc<RecordingMailer>,
) -> ZipWorker<MockMetadataSource, MockFileSource> {
    ZipWorker::new(Arc::new(test_service(metadata, files)), queue, store, mailer)
}
