use std::sync::Arc;
use std::time::Instant;

use actix_web::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
};
use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse, ResponseError};
use anyhow::Context;
use futures::StreamExt;
use serde_json::json;
use tracing::Instrument;
use uuid::Uuid;

use crate::domain::{validate, ContactSubmission};
use crate::mailer::Mailer;
use crate::utils::error_chain_fmt;

const MAX_PAYLOAD_BYTES: usize = 1024 * 1024;

#[derive(serde::Deserialize, Debug)]
pub struct FormData {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    subject: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl From<FormData> for ContactSubmission {
    fn from(form: FormData) -> Self {
        Self {
            name: form.name.unwrap_or_default(),
            email: form.email.unwrap_or_default(),
            subject: form.subject.unwrap_or_default(),
            message: form.message.unwrap_or_default(),
        }
    }
}

#[derive(thiserror::Error)]
pub enum ContactError {
    #[error("Validation failed")]
    ValidationError(Vec<String>),
    #[error("Email service not configured")]
    NotConfigured,
    #[error("Failed to process request")]
    UnexpectedError(#[from] anyhow::Error),
}

impl std::fmt::Debug for ContactError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl ResponseError for ContactError {
    fn status_code(&self) -> StatusCode {
        match self {
            ContactError::ValidationError(_) => StatusCode::BAD_REQUEST,
            ContactError::NotConfigured | ContactError::UnexpectedError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            ContactError::ValidationError(details) => json!({
                "error": self.to_string(),
                "details": details,
            }),
            ContactError::NotConfigured | ContactError::UnexpectedError(_) => json!({
                "error": self.to_string(),
            }),
        };
        HttpResponse::build(self.status_code()).json(body)
    }
}

#[tracing::instrument(name = "Relaying a contact form submission", skip(payload, mailer))]
pub async fn contact(
    payload: web::Payload,
    mailer: web::Data<dyn Mailer>,
) -> Result<HttpResponse, ContactError> {
    let started_at = Instant::now();
    let body = read_body(payload).await?;
    let form = parse_form(&body)?;
    let submission = ContactSubmission::from(form);

    let violations = validate(&submission);
    if !violations.is_empty() {
        return Err(ContactError::ValidationError(violations));
    }

    if !mailer.is_configured() {
        tracing::error!("Missing email configuration, the submission cannot be relayed");
        return Err(ContactError::NotConfigured);
    }

    spawn_delivery(mailer.into_inner(), submission);

    let response_time = started_at.elapsed().as_millis();
    tracing::info!(
        response_time_ms = response_time as u64,
        "Contact submission accepted, email sending in background"
    );
    Ok(HttpResponse::Ok().json(json!({
        "message": "Message received successfully",
        "status": "sending",
        "responseTime": format!("{}ms", response_time),
    })))
}

async fn read_body(mut payload: web::Payload) -> Result<web::BytesMut, anyhow::Error> {
    let mut body = web::BytesMut::new();
    while let Some(chunk) = payload.next().await {
        let chunk =
            chunk.map_err(|e| anyhow::anyhow!("Failed to read the request body: {}", e))?;
        if body.len() + chunk.len() > MAX_PAYLOAD_BYTES {
            anyhow::bail!("The request body exceeds {} bytes", MAX_PAYLOAD_BYTES);
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}

/// Only a JSON object is a form. Arrays would otherwise fill the fields
/// by position.
fn parse_form(body: &[u8]) -> Result<FormData, anyhow::Error> {
    let value: serde_json::Value =
        serde_json::from_slice(body).context("The contact form payload is not valid JSON")?;
    if !value.is_object() {
        anyhow::bail!("The contact form payload is not a JSON object");
    }
    serde_json::from_value(value).context("Failed to parse the contact form payload")
}

/// Hands delivery to the runtime without waiting for it. Failures end here:
/// they are logged and never reach the caller.
fn spawn_delivery(mailer: Arc<dyn Mailer>, submission: ContactSubmission) {
    let span = tracing::info_span!(
        "Delivering a contact submission",
        submission_id = %Uuid::new_v4(),
        reply_to = %submission.email,
    );
    tokio::spawn(
        async move {
            match mailer.deliver(&submission).await {
                Ok(()) => tracing::info!("Contact submission delivered"),
                Err(e) => tracing::error!(
                    error.cause_chain = ?e,
                    error.message = %e,
                    error.code = e.code(),
                    "Failed to deliver a contact submission"
                ),
            }
        }
        .instrument(span),
    );
}

pub async fn contact_preflight() -> HttpResponse {
    HttpResponse::Ok()
        .insert_header((ACCESS_CONTROL_ALLOW_ORIGIN, "*"))
        .insert_header((ACCESS_CONTROL_ALLOW_METHODS, "POST, OPTIONS"))
        .insert_header((ACCESS_CONTROL_ALLOW_HEADERS, "Content-Type"))
        .finish()
}
