//! Defines the core data structures used in the contact-relay application.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Placeholder recorded when the client address or user agent cannot be determined.
pub(crate) const UNKNOWN: &str = "unknown";

/// Represents the raw contact form body posted by the website.
/// Every field is optional here so that absence is reported by the validator, not the parser.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ContactForm {
    pub name: Option<String>,
    pub email: Option<String>,
    pub subject: Option<String>,
    pub message: Option<String>,
}

/// The four text fields of a form that passed validation, trimmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ValidatedFields {
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
}

/// One inbound message, accepted and stamped at receipt.
/// Lives for the duration of a single request only.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub(crate) struct ContactSubmission {
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
    /// Time of receipt (UTC).
    pub timestamp: DateTime<Utc>,
    /// Best-effort client address, `"unknown"` when not determinable.
    pub source_ip: String,
    /// Best-effort client user agent, `"unknown"` when absent.
    pub user_agent: String,
}

impl ContactSubmission {
    /// Stamps validated fields with receipt metadata.
    pub(crate) fn new(
        fields: ValidatedFields,
        timestamp: DateTime<Utc>,
        source_ip: Option<String>,
        user_agent: Option<String>,
    ) -> Self {
        let or_unknown = |value: Option<String>| {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| UNKNOWN.to_string())
        };

        Self {
            name: fields.name,
            email: fields.email,
            subject: fields.subject,
            message: fields.message,
            timestamp,
            source_ip: or_unknown(source_ip),
            user_agent: or_unknown(user_agent),
        }
    }

    /// ISO-8601 rendering of the receipt time, as shown to visitors and in emails.
    pub(crate) fn submitted_at(&self) -> String {
        self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

/// The email APIs a submission can be relayed through, in priority order.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub(crate) enum ProviderKind {
    /// Primary provider.
    Resend,
    /// Secondary provider.
    SendGrid,
    /// Tertiary provider: a hosted form endpoint.
    Formspree,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProviderKind::Resend => "resend",
            ProviderKind::SendGrid => "sendgrid",
            ProviderKind::Formspree => "formspree",
        };
        f.write_str(name)
    }
}

/// Result of a single provider attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ProviderOutcome {
    /// The provider accepted the message. Some APIs return their own message id.
    Sent { id: Option<String> },
    /// No usable credential; the provider was skipped without a network call.
    NotConfigured,
    /// Network failure or non-2xx status. The detail is for logs only.
    Failed(String),
}

impl ProviderOutcome {
    pub(crate) fn is_sent(&self) -> bool {
        matches!(self, ProviderOutcome::Sent { .. })
    }

    pub(crate) fn label(&self) -> &'static str {
        match self {
            ProviderOutcome::Sent { .. } => "sent",
            ProviderOutcome::NotConfigured => "not_configured",
            ProviderOutcome::Failed(_) => "failed",
        }
    }
}

/// A provider attempt as recorded by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DeliveryAttempt {
    pub provider: ProviderKind,
    pub outcome: ProviderOutcome,
}

/// Outcome of attempting to deliver a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DeliveryResult {
    pub success: bool,
    /// The provider that accepted the message, if any.
    pub provider_used: Option<ProviderKind>,
    /// Human-readable text returned to the visitor.
    pub user_message: String,
    /// Display-only token generated on success. Never stored.
    pub reference_id: Option<String>,
    /// Every attempt made, in order.
    pub attempts: Vec<DeliveryAttempt>,
}

/// JSON body returned by the contact endpoint.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub(crate) struct ApiResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub data: Option<SubmissionData>,
}

impl ApiResponse {
    pub(crate) fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
        }
    }
}

/// Receipt details echoed back after a successful submission.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SubmissionData {
    pub submitted_at: String,
    pub reference: String,
}
