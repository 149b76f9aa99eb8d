use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use secrecy::{ExposeSecret, Secret};

use super::{DeliveryError, Mailer, RenderedEmail};
use crate::configuration::MailerSettings;
use crate::domain::ContactSubmission;

/// Client for a transactional email HTTP API.
pub struct EmailClient {
    http_client: Client,
    base_url: String,
    sender: String,
    recipient: String,
    subject_prefix: String,
    authorization_token: Secret<String>,
}

impl EmailClient {
    pub fn new(settings: &MailerSettings) -> Result<Self, reqwest::Error> {
        let http_client = Client::builder().timeout(settings.api.timeout()).build()?;
        Ok(Self {
            http_client,
            base_url: settings.api.base_url.trim_end_matches('/').to_string(),
            sender: settings.sender_email.clone(),
            recipient: settings.recipient_email.clone(),
            subject_prefix: settings.subject_prefix.clone(),
            authorization_token: settings.api.authorization_token.clone(),
        })
    }

    pub async fn send_email(&self, email: &RenderedEmail) -> Result<(), reqwest::Error> {
        let url = format!("{}/email", self.base_url);
        let reply_to = format!("{} <{}>", email.reply_to_name, email.reply_to_email);
        let request_body = SendEmailRequest {
            from: &self.sender,
            to: &self.recipient,
            reply_to: &reply_to,
            subject: &email.subject,
            html_body: &email.html_body,
            text_body: &email.text_body,
        };
        self.http_client
            .post(&url)
            .header(
                "X-Postmark-Server-Token",
                self.authorization_token.expose_secret(),
            )
            .json(&request_body)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

#[async_trait]
impl Mailer for EmailClient {
    fn is_configured(&self) -> bool {
        !self.authorization_token.expose_secret().is_empty()
            && !self.sender.trim().is_empty()
            && !self.recipient.trim().is_empty()
    }

    #[tracing::instrument(name = "Sending email through the email API", skip_all)]
    async fn deliver(&self, submission: &ContactSubmission) -> Result<(), DeliveryError> {
        let email = RenderedEmail::render(submission, &self.subject_prefix, Utc::now());
        self.send_email(&email).await?;
        Ok(())
    }
}

#[derive(serde::Serialize)]
#[serde(rename_all = "PascalCase")]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: &'a str,
    reply_to: &'a str,
    subject: &'a str,
    html_body: &'a str,
    text_body: &'a str,
}
