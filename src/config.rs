//! Configuration management for the archive proxy.
//!
//! Configuration comes from command-line arguments via clap, with every option
//! also readable from an `APX_` prefixed environment variable.
//!
//! # Commands
//!
//! - `serve` - Run the HTTP proxy
//! - `worker` - Consume zip jobs from the queue
//! - `token` - Sign a staff or email-login token (for testing and operations)
//!
//! # Environment Variables
//!
//! - `APX_HOST`, `APX_PORT` - Server bind address (default: 0.0.0.0:3000)
//! - `APX_METADATA_URL` - Base URL of the metadata service (required)
//! - `APX_METADATA_API_KEY` - Bearer key for the metadata service
//! - `APX_EDEPOT_URL`, `APX_WABO_URL` - File server base URLs (required)
//! - `APX_WABO_USERNAME`, `APX_WABO_PASSWORD` - Basic auth for the wabo file server
//! - `APX_STAFF_SECRET`, `APX_MAIL_SECRET` - Token secrets
//! - `APX_LOGIN_ORIGINS` - Origins login links may point to (comma-separated)
//! - `APX_S3_BUCKET`, `APX_S3_ENDPOINT`, `APX_S3_REGION` - Object storage
//! - `APX_QUEUE_URL`, `APX_QUEUE_ENDPOINT` - Zip job queue
//! - `APX_MAIL_ENDPOINT`, `APX_MAIL_API_KEY` - Mail relay
//! - `APX_SCOPE_PUBLIC_EMAIL`, `APX_SCOPE_READ`, `APX_SCOPE_EXTENDED` - Scope names
//! - `APX_CACHE_MAX_AGE` - HTTP cache max-age seconds (default: 3600)

use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::access::{
    AccessPolicy, DEFAULT_COPYRIGHT_SENTINEL, DEFAULT_EXTENDED_SCOPE, DEFAULT_PUBLIC_EMAIL_SCOPE,
    DEFAULT_PUBLIC_SENTINEL, DEFAULT_READ_SCOPE,
};
use crate::bulk::{DEFAULT_ARCHIVE_PREFIX, DEFAULT_MAX_ATTEMPTS};
use crate::transform::DEFAULT_JPEG_QUALITY;

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default AWS region.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Default HTTP cache max-age in seconds (1 hour).
pub const DEFAULT_CACHE_MAX_AGE: u32 = 3600;

/// Default upstream connect timeout in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;

/// Default upstream request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default validity of email-login tokens in seconds (1 day).
pub const DEFAULT_MAIL_TOKEN_TTL_SECS: u64 = 24 * 60 * 60;

/// Default validity of zip download links in seconds (7 days).
pub const DEFAULT_LINK_EXPIRY_SECS: u64 = 7 * 24 * 60 * 60;

/// Default validity of tokens signed by the `token` command (1 hour).
pub const DEFAULT_TOKEN_TTL_SECS: u64 = 3600;

// =============================================================================
// CLI
// =============================================================================

/// Archive IIIF proxy - authorizing image access to legacy building-dossier archives.
#[derive(Parser, Debug, Clone)]
#[command(name = "archive-iiif-proxy")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn into_command(self) -> Command {
        self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the HTTP proxy.
    Serve(ServeConfig),

    /// Consume zip jobs from the queue.
    Worker(WorkerConfig),

    /// Sign a token.
    Token(TokenConfig),
}

// =============================================================================
// Shared Argument Groups
// =============================================================================

/// Metadata service and file servers.
#[derive(Args, Debug, Clone)]
pub struct UpstreamArgs {
    /// Base URL of the metadata service.
    #[arg(long, env = "APX_METADATA_URL", default_value = "")]
    pub metadata_url: String,

    /// Bearer key for the metadata service.
    #[arg(long, env = "APX_METADATA_API_KEY")]
    pub metadata_api_key: Option<String>,

    /// Base URL of the edepot file server.
    #[arg(long, env = "APX_EDEPOT_URL", default_value = "")]
    pub edepot_url: String,

    /// Base URL of the wabo file server.
    #[arg(long, env = "APX_WABO_URL", default_value = "")]
    pub wabo_url: String,

    /// Basic auth user for the wabo file server.
    #[arg(long, env = "APX_WABO_USERNAME")]
    pub wabo_username: Option<String>,

    /// Basic auth password for the wabo file server.
    #[arg(long, env = "APX_WABO_PASSWORD")]
    pub wabo_password: Option<String>,

    /// Upstream connect timeout in seconds.
    #[arg(long, default_value_t = DEFAULT_CONNECT_TIMEOUT_SECS, env = "APX_CONNECT_TIMEOUT")]
    pub connect_timeout: u64,

    /// Upstream request timeout in seconds.
    #[arg(long, default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS, env = "APX_REQUEST_TIMEOUT")]
    pub request_timeout: u64,

    /// JPEG quality for re-encoded images (1-100).
    #[arg(long, default_value_t = DEFAULT_JPEG_QUALITY, env = "APX_JPEG_QUALITY")]
    pub jpeg_quality: u8,
}

impl UpstreamArgs {
    pub fn validate(&self) -> Result<(), String> {
        for (value, flag, var) in [
            (&self.metadata_url, "--metadata-url", "APX_METADATA_URL"),
            (&self.edepot_url, "--edepot-url", "APX_EDEPOT_URL"),
            (&self.wabo_url, "--wabo-url", "APX_WABO_URL"),
        ] {
            if value.is_empty() {
                return Err(format!("{} is required. Set {} or {}", flag, flag, var));
            }
            url::Url::parse(value).map_err(|e| format!("{} is not a valid URL: {}", flag, e))?;
        }

        if self.wabo_username.is_some() != self.wabo_password.is_some() {
            return Err("wabo_username and wabo_password must be set together".to_string());
        }

        if self.connect_timeout == 0 || self.request_timeout == 0 {
            return Err("timeouts must be greater than 0".to_string());
        }

        if self.jpeg_quality == 0 || self.jpeg_quality > 100 {
            return Err("jpeg_quality must be between 1 and 100".to_string());
        }

        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }
}

/// Names used by tokens and metadata to express access.
#[derive(Args, Debug, Clone)]
pub struct AccessArgs {
    /// Scope name for email-login callers (public material only).
    #[arg(long, default_value = DEFAULT_PUBLIC_EMAIL_SCOPE, env = "APX_SCOPE_PUBLIC_EMAIL")]
    pub scope_public_email: String,

    /// Scope name for reading public material.
    #[arg(long, default_value = DEFAULT_READ_SCOPE, env = "APX_SCOPE_READ")]
    pub scope_read: String,

    /// Scope name for reading everything.
    #[arg(long, default_value = DEFAULT_EXTENDED_SCOPE, env = "APX_SCOPE_EXTENDED")]
    pub scope_extended: String,

    /// Metadata access value meaning "public".
    #[arg(long, default_value = DEFAULT_PUBLIC_SENTINEL, env = "APX_PUBLIC_SENTINEL")]
    pub public_sentinel: String,

    /// Metadata copyright value meaning "copyright applies".
    #[arg(long, default_value = DEFAULT_COPYRIGHT_SENTINEL, env = "APX_COPYRIGHT_SENTINEL")]
    pub copyright_sentinel: String,
}

impl Default for AccessArgs {
    fn default() -> Self {
        Self {
            scope_public_email: DEFAULT_PUBLIC_EMAIL_SCOPE.to_string(),
            scope_read: DEFAULT_READ_SCOPE.to_string(),
            scope_extended: DEFAULT_EXTENDED_SCOPE.to_string(),
            public_sentinel: DEFAULT_PUBLIC_SENTINEL.to_string(),
            copyright_sentinel: DEFAULT_COPYRIGHT_SENTINEL.to_string(),
        }
    }
}

impl AccessArgs {
    pub fn validate(&self) -> Result<(), String> {
        let names = [
            &self.scope_public_email,
            &self.scope_read,
            &self.scope_extended,
        ];
        if names.iter().any(|name| name.is_empty()) {
            return Err("scope names must not be empty".to_string());
        }
        if names[0] == names[1] || names[1] == names[2] || names[0] == names[2] {
            return Err("scope names must be distinct".to_string());
        }
        Ok(())
    }

    /// Build the immutable policy handed to the access engine.
    pub fn policy(&self) -> AccessPolicy {
        AccessPolicy::new()
            .scope_names(
                &self.scope_public_email,
                &self.scope_read,
                &self.scope_extended,
            )
            .public_sentinel(&self.public_sentinel)
            .copyright_sentinel(&self.copyright_sentinel)
    }
}

/// Object storage and the zip job queue.
#[derive(Args, Debug, Clone)]
pub struct StorageArgs {
    /// S3 bucket for job blobs and zip archives.
    #[arg(long, env = "APX_S3_BUCKET")]
    pub s3_bucket: Option<String>,

    /// Custom S3 endpoint URL for S3-compatible services (MinIO, etc.).
    #[arg(long, env = "APX_S3_ENDPOINT")]
    pub s3_endpoint: Option<String>,

    /// AWS region.
    #[arg(long, default_value = DEFAULT_REGION, env = "APX_S3_REGION")]
    pub s3_region: String,

    /// URL of the zip job queue.
    #[arg(long, env = "APX_QUEUE_URL")]
    pub queue_url: Option<String>,

    /// Custom queue endpoint URL (ElasticMQ, LocalStack, etc.).
    #[arg(long, env = "APX_QUEUE_ENDPOINT")]
    pub queue_endpoint: Option<String>,
}

impl StorageArgs {
    /// Bucket and queue, if both are configured.
    pub fn bulk_target(&self) -> Option<(&str, &str)> {
        match (self.s3_bucket.as_deref(), self.queue_url.as_deref()) {
            (Some(bucket), Some(queue)) if !bucket.is_empty() && !queue.is_empty() => {
                Some((bucket, queue))
            }
            _ => None,
        }
    }

    pub fn require(&self) -> Result<(&str, &str), String> {
        self.bulk_target().ok_or_else(|| {
            "S3 bucket and queue URL are required. \
             Set --s3-bucket/APX_S3_BUCKET and --queue-url/APX_QUEUE_URL"
                .to_string()
        })
    }
}

/// Mail relay.
#[derive(Args, Debug, Clone)]
pub struct MailArgs {
    /// Endpoint that accepts `{"to", "subject", "body"}` as JSON.
    #[arg(long, env = "APX_MAIL_ENDPOINT")]
    pub mail_endpoint: Option<String>,

    /// Bearer key for the mail relay.
    #[arg(long, env = "APX_MAIL_API_KEY")]
    pub mail_api_key: Option<String>,
}

// =============================================================================
// Serve Command
// =============================================================================

#[derive(Args, Debug, Clone)]
pub struct ServeConfig {
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "APX_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "APX_PORT")]
    pub port: u16,

    #[command(flatten)]
    pub upstream: UpstreamArgs,

    #[command(flatten)]
    pub access: AccessArgs,

    #[command(flatten)]
    pub storage: StorageArgs,

    #[command(flatten)]
    pub mail: MailArgs,

    /// Secret for staff bearer tokens.
    #[arg(long, env = "APX_STAFF_SECRET")]
    pub staff_secret: Option<String>,

    /// Secret for email-login tokens.
    #[arg(long, env = "APX_MAIL_SECRET")]
    pub mail_secret: Option<String>,

    /// Validity of email-login tokens in seconds.
    #[arg(long, default_value_t = DEFAULT_MAIL_TOKEN_TTL_SECS, env = "APX_MAIL_TOKEN_TTL")]
    pub mail_token_ttl: u64,

    /// Origins login links may point to (comma-separated).
    #[arg(long, env = "APX_LOGIN_ORIGINS", value_delimiter = ',')]
    pub login_origins: Vec<String>,

    /// HTTP Cache-Control max-age in seconds.
    #[arg(long, default_value_t = DEFAULT_CACHE_MAX_AGE, env = "APX_CACHE_MAX_AGE")]
    pub cache_max_age: u32,

    /// Allowed CORS origins (comma-separated).
    ///
    /// If not specified, allows any origin.
    #[arg(long, env = "APX_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl ServeConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        self.upstream.validate()?;
        self.access.validate()?;

        match (&self.staff_secret, &self.mail_secret) {
            (Some(staff), Some(mail)) if !staff.is_empty() && !mail.is_empty() => {
                if staff == mail {
                    return Err("staff_secret and mail_secret must differ".to_string());
                }
            }
            _ => {
                return Err("Token secrets are required. \
                     Set --staff-secret/APX_STAFF_SECRET and --mail-secret/APX_MAIL_SECRET"
                    .to_string())
            }
        }

        if self.mail_token_ttl == 0 {
            return Err("mail_token_ttl must be greater than 0".to_string());
        }

        for origin in &self.login_origins {
            url::Url::parse(origin)
                .map_err(|e| format!("login origin '{}' is not a valid URL: {}", origin, e))?;
        }

        Ok(())
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn staff_secret_or_empty(&self) -> &str {
        self.staff_secret.as_deref().unwrap_or("")
    }

    pub fn mail_secret_or_empty(&self) -> &str {
        self.mail_secret.as_deref().unwrap_or("")
    }

    pub fn mail_token_ttl(&self) -> Duration {
        Duration::from_secs(self.mail_token_ttl)
    }
}

// =============================================================================
// Worker Command
// =============================================================================

#[derive(Args, Debug, Clone)]
pub struct WorkerConfig {
    #[command(flatten)]
    pub upstream: UpstreamArgs,

    #[command(flatten)]
    pub access: AccessArgs,

    #[command(flatten)]
    pub storage: StorageArgs,

    #[command(flatten)]
    pub mail: MailArgs,

    /// Deliveries after which a job is abandoned.
    #[arg(long, default_value_t = DEFAULT_MAX_ATTEMPTS, env = "APX_MAX_ATTEMPTS")]
    pub max_attempts: u32,

    /// Validity of download links in seconds.
    #[arg(long, default_value_t = DEFAULT_LINK_EXPIRY_SECS, env = "APX_LINK_EXPIRY")]
    pub link_expiry: u64,

    /// Object key prefix for finished archives.
    #[arg(long, default_value = DEFAULT_ARCHIVE_PREFIX, env = "APX_ARCHIVE_PREFIX")]
    pub archive_prefix: String,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl WorkerConfig {
    pub fn validate(&self) -> Result<(), String> {
        self.upstream.validate()?;
        self.access.validate()?;
        self.storage.require()?;

        if self.mail.mail_endpoint.as_deref().unwrap_or("").is_empty() {
            return Err(
                "Mail endpoint is required. Set --mail-endpoint or APX_MAIL_ENDPOINT".to_string(),
            );
        }

        if self.max_attempts == 0 {
            return Err("max_attempts must be greater than 0".to_string());
        }

        // Presigned URLs are capped at 7 days
        if self.link_expiry == 0 || self.link_expiry > DEFAULT_LINK_EXPIRY_SECS {
            return Err("link_expiry must be between 1 second and 7 days".to_string());
        }

        Ok(())
    }

    pub fn link_expiry(&self) -> Duration {
        Duration::from_secs(self.link_expiry)
    }
}

// =============================================================================
// Token Command
// =============================================================================

/// Kind of token to sign.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Bearer token with scopes
    Staff,
    /// Email-login token
    Mail,
}

#[derive(Args, Debug, Clone)]
pub struct TokenConfig {
    /// Kind of token.
    #[arg(value_enum)]
    pub kind: TokenKind,

    /// Scopes for a staff token (comma-separated).
    #[arg(long, value_delimiter = ',')]
    pub scopes: Vec<String>,

    /// Subject: the email address for a mail token, optional for staff.
    #[arg(long)]
    pub subject: Option<String>,

    /// Validity in seconds.
    #[arg(long, default_value_t = DEFAULT_TOKEN_TTL_SECS)]
    pub ttl: u64,

    /// Secret for staff bearer tokens.
    #[arg(long, env = "APX_STAFF_SECRET")]
    pub staff_secret: Option<String>,

    /// Secret for email-login tokens.
    #[arg(long, env = "APX_MAIL_SECRET")]
    pub mail_secret: Option<String>,
}

impl TokenConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.ttl == 0 {
            return Err("ttl must be greater than 0".to_string());
        }

        match self.kind {
            TokenKind::Staff => {
                if self.staff_secret.as_deref().unwrap_or("").is_empty() {
                    return Err("--staff-secret or APX_STAFF_SECRET is required".to_string());
                }
                if self.scopes.is_empty() {
                    return Err("a staff token needs at least one --scopes entry".to_string());
                }
            }
            TokenKind::Mail => {
                if self.mail_secret.as_deref().unwrap_or("").is_empty() {
                    return Err("--mail-secret or APX_MAIL_SECRET is required".to_string());
                }
                if self.subject.as_deref().unwrap_or("").is_empty() {
                    return Err("a mail token needs --subject <email>".to_string());
                }
            }
        }

        Ok(())
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl)
    }
}

// =============================================================================
// Tests
// =============================================================================
