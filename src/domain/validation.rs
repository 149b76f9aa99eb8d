use std::collections::HashSet;

use unicode_segmentation::UnicodeSegmentation;

use crate::domain::ContactSubmission;

const NAME_MIN_LENGTH: usize = 2;
const NAME_MAX_LENGTH: usize = 50;
const EMAIL_MAX_LENGTH: usize = 100;
const SUBJECT_MIN_LENGTH: usize = 3;
const SUBJECT_MAX_LENGTH: usize = 100;
const MESSAGE_MIN_LENGTH: usize = 10;
const MESSAGE_MAX_LENGTH: usize = 1000;
const MESSAGE_MIN_DISTINCT_CHARS: usize = 3;

/// Checks every field of a submission and returns the violations in field
/// order (name, email, subject, message). Each field reports at most one
/// violation: the first rule it breaks.
pub fn validate(submission: &ContactSubmission) -> Vec<String> {
    [
        validate_name(&submission.name),
        validate_email(&submission.email),
        validate_subject(&submission.subject),
        validate_message(&submission.message),
    ]
    .into_iter()
    .filter_map(Result::err)
    .map(String::from)
    .collect()
}

pub fn validate_name(name: &str) -> Result<(), &'static str> {
    let name = name.trim();
    if name.is_empty() {
        return Err("Name is required");
    }
    let length = length_of(name);
    if length < NAME_MIN_LENGTH {
        return Err("Name must be at least 2 characters");
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphabetic() || c.is_whitespace() || c == '-' || c == '\'')
    {
        return Err("Name can only contain letters, spaces, hyphens, and apostrophes");
    }
    if !has_letters(name) {
        return Err("Name must contain at least some letters");
    }
    if length > NAME_MAX_LENGTH {
        return Err("Name cannot exceed 50 characters");
    }
    Ok(())
}

/// Format and length are checked on the raw value, so surrounding
/// whitespace makes an address invalid.
pub fn validate_email(email: &str) -> Result<(), &'static str> {
    if email.trim().is_empty() {
        return Err("Email is required");
    }
    if !is_well_formed_email(email) {
        return Err("Please enter a valid email");
    }
    if length_of(email) > EMAIL_MAX_LENGTH {
        return Err("Email cannot exceed 100 characters");
    }
    Ok(())
}

pub fn validate_subject(subject: &str) -> Result<(), &'static str> {
    let subject = subject.trim();
    if subject.is_empty() {
        return Err("Subject is required");
    }
    let length = length_of(subject);
    if length < SUBJECT_MIN_LENGTH {
        return Err("Subject must be at least 3 characters");
    }
    if !has_letters(subject) {
        return Err("Subject must contain at least some letters");
    }
    if subject.chars().all(|c| c.is_ascii_punctuation()) {
        return Err("Subject cannot contain only special characters");
    }
    if length > SUBJECT_MAX_LENGTH {
        return Err("Subject cannot exceed 100 characters");
    }
    Ok(())
}

pub fn validate_message(message: &str) -> Result<(), &'static str> {
    let message = message.trim();
    if message.is_empty() {
        return Err("Message is required");
    }
    let length = length_of(message);
    if length < MESSAGE_MIN_LENGTH {
        return Err("Message must be at least 10 characters");
    }
    if !has_letters(message) {
        return Err("Message must contain at least some letters");
    }
    if message
        .chars()
        .all(|c| c.is_ascii_punctuation() || c.is_whitespace())
    {
        return Err("Message cannot contain only special characters or spaces");
    }
    if length > MESSAGE_MAX_LENGTH {
        return Err("Message cannot exceed 1000 characters");
    }
    if distinct_visible_chars(message) < MESSAGE_MIN_DISTINCT_CHARS {
        return Err("Message should contain more varied content");
    }
    Ok(())
}

fn length_of(s: &str) -> usize {
    s.graphemes(true).count()
}

fn has_letters(s: &str) -> bool {
    s.chars().any(|c| c.is_ascii_alphabetic())
}

fn distinct_visible_chars(s: &str) -> usize {
    s.to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<HashSet<_>>()
        .len()
}

// local@domain.tld: no whitespace, a single '@', and a '.' inside the domain
// with at least one character on either side.
fn is_well_formed_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    domain
        .char_indices()
        .any(|(i, c)| c == '.' && i > 0 && i + 1 < domain.len())
}
