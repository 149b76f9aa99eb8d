use chrono::{DateTime, Utc};

use crate::domain::ContactSubmission;

const FOOTER: &str = "Sent from your portfolio contact form";

/// The email both backends send for a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub subject: String,
    pub text_body: String,
    pub html_body: String,
    pub reply_to_name: String,
    pub reply_to_email: String,
}

impl RenderedEmail {
    pub fn render(
        submission: &ContactSubmission,
        subject_prefix: &str,
        sent_at: DateTime<Utc>,
    ) -> Self {
        let name = submission.name.trim();
        let email = submission.email.trim();
        let subject = submission.subject.trim();
        let message = submission.message.trim();

        let text_body = format!(
            "Name: {name}\n\
             Email: {email}\n\
             Subject: {subject}\n\
             \n\
             Message:\n\
             {message}\n\
             \n\
             ---\n\
             {FOOTER}\n"
        );

        let html_body = format!(
            r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto; padding: 20px; background-color: #f9f9f9;">
  <div style="background-color: white; padding: 30px; border-radius: 10px;">
    <h2 style="color: #333; border-bottom: 2px solid #4F46E5; padding-bottom: 10px;">New Portfolio Contact Form Submission</h2>
    <p><strong style="color: #4F46E5;">Name:</strong><br />{name}</p>
    <p><strong style="color: #4F46E5;">Email:</strong><br /><a href="mailto:{href}" style="color: #4F46E5;">{email}</a></p>
    <p><strong style="color: #4F46E5;">Subject:</strong><br />{subject}</p>
    <div style="margin: 10px 0; padding: 15px; background-color: #f8f9fa; border-left: 4px solid #4F46E5;">
      <p style="margin: 0; white-space: pre-wrap;">{message}</p>
    </div>
    <p style="color: #666; font-size: 12px; text-align: center;">{FOOTER} &bull; {sent_at}</p>
  </div>
</div>
"#,
            name = escape_html(name),
            href = escape_html(email),
            email = escape_html(email),
            subject = escape_html(subject),
            message = escape_html(message),
            sent_at = sent_at.format("%Y-%m-%d %H:%M:%S UTC"),
        );

        Self {
            subject: format!("{subject_prefix}{subject}"),
            text_body,
            html_body,
            reply_to_name: name.to_string(),
            reply_to_email: email.to_string(),
        }
    }
}

/// Escapes markup in user text. `clean_text` also encodes whitespace as
/// numeric entities; that is harmless in text nodes and quoted attributes,
/// so it is put back.
fn escape_html(text: &str) -> String {
    ammonia::clean_text(text)
        .replace("&#32;", " ")
        .replace("&#9;", "\t")
        .replace("&#10;", "\n")
}
