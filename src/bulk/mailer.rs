//! Outgoing email.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use crate::error::IoError;

/// A plain-text email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl Email {
    /// Download link for a finished zip archive.
    pub fn download_link(to: impl Into<String>, link: &str, expires_in: Duration) -> Self {
        let days = expires_in.as_secs() / (24 * 60 * 60);
        let validity = if days > 0 {
            format!("{} day(s)", days)
        } else {
            format!("{} hour(s)", (expires_in.as_secs() / 3600).max(1))
        };

        Self {
            to: to.into(),
            subject: "Your requested files are ready for download".to_string(),
            body: format!(
                "The files you requested have been collected in a zip archive.\n\n\
                 Download it here: {}\n\n\
                 The link is valid for {}. The archive contains report.txt listing \
                 which files were included.\n",
                link, validity
            ),
        }
    }

    /// Login link for the email-login flow.
    pub fn login_link(to: impl Into<String>, link: &str) -> Self {
        Self {
            to: to.into(),
            subject: "Your login link".to_string(),
            body: format!(
                "Use the following link to view public building dossiers:\n\n{}\n",
                link
            ),
        }
    }
}

/// Something that delivers email.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &Email) -> Result<(), IoError>;
}

/// Mail relay reached over HTTP.
///
/// Each email is posted as JSON `{"to", "subject", "body"}`.
#[derive(Clone)]
pub struct HttpMailer {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpMailer {
    pub fn new(client: Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            api_key: None,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, email: &Email) -> Result<(), IoError> {
        let mut request = self.client.post(&self.endpoint).json(email);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| IoError::Mail(e.to_string()))?;

        if !response.status().is_success() {
            return Err(IoError::Mail(format!(
                "mail relay returned status {}",
                response.status().as_u16()
            )));
        }
        Ok(())
    }
}
