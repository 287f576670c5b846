//! Upstream file servers.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;

/// Default connect timeout for upstream requests.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default total timeout for upstream requests.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Response of a file server, whatever its status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl UpstreamResponse {
    pub fn ok(body: impl Into<Bytes>, content_type: Option<&str>) -> Self {
        Self {
            status: 200,
            content_type: content_type.map(str::to_string),
            body: body.into(),
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            content_type: None,
            body: Bytes::new(),
        }
    }
}

/// A request that produced no HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Connect or read timed out
    Timeout(String),

    /// Connection could not be established
    Connect(String),

    /// Anything else
    Other(String),
}

impl TransportError {
    /// Error class name, embedded in `SourceUnavailable` errors.
    pub fn class_name(&self) -> &'static str {
        match self {
            TransportError::Timeout(_) => "Timeout",
            TransportError::Connect(_) => "ConnectError",
            TransportError::Other(_) => "RequestError",
        }
    }

    /// Whether the next candidate location should be tried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TransportError::Timeout(_) | TransportError::Connect(_))
    }

    pub fn message(&self) -> &str {
        match self {
            TransportError::Timeout(message)
            | TransportError::Connect(message)
            | TransportError::Other(message) => message,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout(err.to_string())
        } else if err.is_connect() {
            TransportError::Connect(err.to_string())
        } else {
            TransportError::Other(err.to_string())
        }
    }
}

/// A server that files can be fetched from by URL.
#[async_trait]
pub trait FileSource: Send + Sync {
    async fn get(&self, url: &str) -> Result<UpstreamResponse, TransportError>;
}

/// HTTP client with bounded connect and total timeouts.
pub fn build_http_client(
    connect_timeout: Duration,
    timeout: Duration,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .connect_timeout(connect_timeout)
        .timeout(timeout)
        .build()
}

#[derive(Clone)]
struct BasicAuth {
    url_prefix: String,
    username: String,
    password: String,
}

/// File server reached over HTTP.
///
/// Credentials are attached per URL prefix, since the two archive file
/// servers use separate accounts.
#[derive(Clone)]
pub struct HttpFileSource {
    client: Client,
    credentials: Vec<BasicAuth>,
}

impl HttpFileSource {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            credentials: Vec::new(),
        }
    }

    /// Use basic auth for every URL starting with `url_prefix`.
    pub fn with_basic_auth(
        mut self,
        url_prefix: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.credentials.push(BasicAuth {
            url_prefix: url_prefix.into(),
            username: username.into(),
            password: password.into(),
        });
        self
    }
}

#[async_trait]
impl FileSource for HttpFileSource {
    async fn get(&self, url: &str) -> Result<UpstreamResponse, TransportError> {
        let mut request = self.client.get(url);
        if let Some(auth) = self
            .credentials
            .iter()
            .find(|auth| url.starts_with(&auth.url_prefix))
        {
            request = request.basic_auth(&auth.username, Some(&auth.password));
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await?;

        Ok(UpstreamResponse {
            status,
            content_type,
            body,
        })
    }
}
