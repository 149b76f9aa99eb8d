//! Outbound delivery of contact submissions.
//!
//! Two backends implement [`Mailer`]: [`SmtpMailer`] keeps a pooled
//! connection to a mail relay, [`EmailClient`] calls a transactional email
//! HTTP API. Which one runs is decided once, from configuration, at startup.

mod email_client;
mod message;
mod smtp;

use async_trait::async_trait;

pub use email_client::EmailClient;
pub use message::RenderedEmail;
pub use smtp::SmtpMailer;

use crate::domain::ContactSubmission;
use crate::utils::error_chain_fmt;

#[async_trait]
pub trait Mailer: Send + Sync {
    /// Whether the credentials and addresses needed to deliver are present.
    fn is_configured(&self) -> bool;

    /// Sends the submission to the site owner.
    async fn deliver(&self, submission: &ContactSubmission) -> Result<(), DeliveryError>;
}

#[derive(thiserror::Error)]
#[error("{message}")]
pub struct DeliveryError {
    message: String,
    code: Option<String>,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl DeliveryError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
            source: None,
        }
    }

    pub fn with_code(mut self, code: impl ToString) -> Self {
        self.code = Some(code.to_string());
        self
    }

    pub fn with_source(
        mut self,
        source: impl Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
    ) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Provider-specific code: SMTP reply code or HTTP status.
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }
}

impl std::fmt::Debug for DeliveryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl From<lettre::address::AddressError> for DeliveryError {
    fn from(e: lettre::address::AddressError) -> Self {
        Self::new("Invalid mailbox address").with_source(e)
    }
}

impl From<lettre::error::Error> for DeliveryError {
    fn from(e: lettre::error::Error) -> Self {
        Self::new("Failed to build the email message").with_source(e)
    }
}

impl From<lettre::transport::smtp::Error> for DeliveryError {
    fn from(e: lettre::transport::smtp::Error) -> Self {
        let code = e.status();
        let error = Self::new("SMTP relay rejected the message").with_source(e);
        match code {
            Some(code) => error.with_code(code),
            None => error,
        }
    }
}

impl From<reqwest::Error> for DeliveryError {
    fn from(e: reqwest::Error) -> Self {
        let status = e.status();
        let error = Self::new("Email API request failed").with_source(e);
        match status {
            Some(status) => error.with_code(status.as_u16()),
            None => error,
        }
    }
}
