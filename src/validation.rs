//! Checks a posted contact form before anything is sent.

use crate::error::{Field, ValidationError};
use crate::models::{ContactForm, ValidatedFields};
use once_cell::sync::Lazy;
use regex::Regex;

pub(crate) const MAX_NAME_CHARS: usize = 256;
pub(crate) const MAX_EMAIL_CHARS: usize = 254;
pub(crate) const MAX_SUBJECT_CHARS: usize = 256;
pub(crate) const MAX_MESSAGE_CHARS: usize = 4096;

/// One `@`, at least one `.` after it, no whitespace.
static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$")
        .expect("Failed to compile email pattern. This should not happen.")
});

fn required(value: Option<&str>, field: Field) -> Result<String, ValidationError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(ValidationError::MissingField { field }),
    }
}

fn within(value: &str, field: Field, max: usize) -> Result<(), ValidationError> {
    if value.chars().count() > max {
        return Err(ValidationError::TooLong { field, max });
    }
    Ok(())
}

/// Returns true if `email` has the shape `local@domain.tld`.
pub(crate) fn is_valid_email(email: &str) -> bool {
    EMAIL_PATTERN.is_match(email)
}

/// Validates a contact form.
///
/// Presence of all four fields is checked first, then the email format, then
/// length limits. The first failure is returned; errors are not aggregated.
///
/// # Returns
/// * `Ok(ValidatedFields)` with every field trimmed.
/// * `Err(ValidationError)` describing the first violated rule.
pub(crate) fn validate(form: &ContactForm) -> Result<ValidatedFields, ValidationError> {
    let name = required(form.name.as_deref(), Field::Name)?;
    let email = required(form.email.as_deref(), Field::Email)?;
    let subject = required(form.subject.as_deref(), Field::Subject)?;
    let message = required(form.message.as_deref(), Field::Message)?;

    if !is_valid_email(&email) {
        return Err(ValidationError::InvalidEmail);
    }

    within(&name, Field::Name, MAX_NAME_CHARS)?;
    within(&email, Field::Email, MAX_EMAIL_CHARS)?;
    within(&subject, Field::Subject, MAX_SUBJECT_CHARS)?;
    within(&message, Field::Message, MAX_MESSAGE_CHARS)?;

    Ok(ValidatedFields {
        name,
        email,
        subject,
        message,
    })
}
