mod contact_submission;
mod validation;

pub use contact_submission::ContactSubmission;
pub use validation::{validate, validate_email, validate_message, validate_name, validate_subject};
