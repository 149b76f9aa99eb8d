use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::transport::smtp::PoolConfig;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use secrecy::ExposeSecret;
use tokio::sync::{Mutex, OnceCell};
use tokio::time::Instant;

use super::{DeliveryError, Mailer, RenderedEmail};
use crate::configuration::MailerSettings;
use crate::domain::ContactSubmission;

/// Delivers through a pooled, rate-spaced connection to an SMTP relay.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    verified: OnceCell<()>,
    throttle: SendThrottle,
    sender: String,
    recipient: String,
    subject_prefix: String,
    has_credentials: bool,
}

impl SmtpMailer {
    pub fn new(settings: &MailerSettings) -> Result<Self, anyhow::Error> {
        let smtp = &settings.smtp;
        let tls = TlsParameters::builder(smtp.host.clone())
            .dangerous_accept_invalid_certs(smtp.accept_invalid_certs)
            .build()?;
        let transport = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&smtp.host)
            .port(smtp.port)
            .tls(Tls::Opportunistic(tls))
            .credentials(Credentials::new(
                smtp.username.clone(),
                smtp.password.expose_secret().clone(),
            ))
            .pool_config(PoolConfig::new().max_size(smtp.max_connections))
            .build();

        // The relay account doubles as sender unless one is configured.
        let sender = if settings.sender_email.trim().is_empty() {
            smtp.username.clone()
        } else {
            settings.sender_email.clone()
        };

        Ok(Self {
            transport,
            verified: OnceCell::new(),
            throttle: SendThrottle::new(smtp.send_interval()),
            sender,
            recipient: settings.recipient_email.clone(),
            subject_prefix: settings.subject_prefix.clone(),
            has_credentials: smtp.has_credentials(),
        })
    }

    /// Checks the relay is reachable. Runs until it succeeds once per process.
    async fn ensure_verified(&self) -> Result<(), DeliveryError> {
        self.verified
            .get_or_try_init(|| async {
                tracing::info!("Testing SMTP connection");
                if self.transport.test_connection().await? {
                    tracing::info!("SMTP connection verified");
                    Ok::<(), DeliveryError>(())
                } else {
                    Err(DeliveryError::new("SMTP relay did not answer the connection test"))
                }
            })
            .await
            .map(|_| ())
    }

    fn build_message(&self, email: RenderedEmail) -> Result<Message, DeliveryError> {
        let reply_to = Mailbox::new(
            Some(email.reply_to_name),
            email.reply_to_email.parse::<Address>()?,
        );
        let message = Message::builder()
            .from(self.sender.parse::<Mailbox>()?)
            .reply_to(reply_to)
            .to(self.recipient.parse::<Mailbox>()?)
            .subject(email.subject)
            .multipart(MultiPart::alternative_plain_html(
                email.text_body,
                email.html_body,
            ))?;
        Ok(message)
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    fn is_configured(&self) -> bool {
        self.has_credentials && !self.recipient.trim().is_empty()
    }

    #[tracing::instrument(name = "Sending email over SMTP", skip_all)]
    async fn deliver(&self, submission: &ContactSubmission) -> Result<(), DeliveryError> {
        self.ensure_verified().await?;
        let email = RenderedEmail::render(submission, &self.subject_prefix, Utc::now());
        let message = self.build_message(email)?;

        self.throttle.wait_for_slot().await;
        let response = self.transport.send(message).await?;
        tracing::info!(smtp.code = %response.code(), "SMTP relay accepted the message");
        Ok(())
    }
}

/// Spaces sends on the shared transport at least `interval` apart.
struct SendThrottle {
    interval: Duration,
    next_slot: Mutex<Instant>,
}

impl SendThrottle {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_slot: Mutex::new(Instant::now()),
        }
    }

    async fn wait_for_slot(&self) {
        let slot = {
            let mut next_slot = self.next_slot.lock().await;
            let slot = (*next_slot).max(Instant::now());
            *next_slot = slot + self.interval;
            slot
        };
        tokio::time::sleep_until(slot).await;
    }
}
