//! Defines the custom error types for the contact-relay application.

use std::fmt;
use std::io;
use thiserror::Error;
use url::ParseError as UrlParseError;

/// The primary error type for handling a contact submission.
#[derive(Error, Debug)]
pub(crate) enum AppError {
    /// Error occurring during configuration loading or validation.
    #[error("Configuration Error: {0}")]
    Config(String),

    /// Error related to file or stdin input/output operations.
    #[error("IO Error: {0}")]
    Io(#[from] io::Error),

    /// Error during JSON serialization or deserialization.
    #[error("JSON Error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error parsing a URL.
    #[error("URL Parsing Error: {0}")]
    UrlParse(#[from] UrlParseError),

    /// Error setting up the HTTP client via reqwest.
    #[error("HTTP Request Error: {0}")]
    Request(#[from] reqwest::Error),

    /// Error compiling or rendering an email template.
    #[error("Template Error: {0}")]
    Template(#[from] tera::Error),

    /// A request body flagged as base64 could not be decoded.
    #[error("Base64 Decode Error: {0}")]
    Base64(#[from] base64::DecodeError),

    /// The submission was rejected by the validator.
    #[error("Validation Error: {0}")]
    Validation(#[from] ValidationError),

    /// An underlying error that doesn't fit other categories, using anyhow.
    #[error("Generic Error: {0}")]
    Generic(#[from] anyhow::Error),
}

/// The form fields a submission must carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Field {
    Name,
    Email,
    Subject,
    Message,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Field::Name => "Name",
            Field::Email => "Email",
            Field::Subject => "Subject",
            Field::Message => "Message",
        };
        f.write_str(label)
    }
}

/// Reasons a submission is rejected. The display text is shown to the visitor verbatim.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub(crate) enum ValidationError {
    /// A required field was absent or blank.
    #[error("All fields are required.")]
    MissingField { field: Field },

    /// The email field does not look like `local@domain.tld`.
    #[error("Please provide a valid email address.")]
    InvalidEmail,

    /// A field exceeds its maximum length in characters.
    #[error("{field} is too long (maximum {max} characters).")]
    TooLong { field: Field, max: usize },
}

impl ValidationError {
    /// The offending field, when the rule concerns a single one.
    pub(crate) fn field(&self) -> Option<Field> {
        match self {
            ValidationError::MissingField { field } | ValidationError::TooLong { field, .. } => {
                Some(*field)
            }
            ValidationError::InvalidEmail => Some(Field::Email),
        }
    }
}

pub(crate) type Result<T> = std::result::Result<T, AppError>;
