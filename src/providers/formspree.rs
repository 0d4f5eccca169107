//! Tertiary provider: a hosted form endpoint (Formspree-style).
//!
//! The endpoint URL itself is the credential. The hosted service builds and
//! sends the email, so the raw submission fields are posted instead of the
//! rendered HTML.

use super::{EmailProvider, OutgoingEmail, check_status};
use crate::models::{ContactSubmission, ProviderKind, ProviderOutcome};
use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::ACCEPT;
use serde::Serialize;
use url::Url;

#[derive(Serialize)]
struct FormSubmission<'a> {
    name: &'a str,
    email: &'a str,
    subject: &'a str,
    message: &'a str,
    #[serde(rename = "_replyto")]
    reply_to: &'a str,
    #[serde(rename = "_subject")]
    email_subject: &'a str,
    submitted_at: String,
}

pub(crate) struct FormspreeProvider {
    client: Client,
    endpoint: Option<Url>,
}

impl FormspreeProvider {
    pub(crate) fn new(client: Client, endpoint: Option<Url>) -> Self {
        Self { client, endpoint }
    }
}

#[async_trait]
impl EmailProvider for FormspreeProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Formspree
    }

    fn is_configured(&self) -> bool {
        self.endpoint.is_some()
    }

    async fn send(&self, email: &OutgoingEmail, submission: &ContactSubmission) -> ProviderOutcome {
        let Some(endpoint) = &self.endpoint else {
            return ProviderOutcome::NotConfigured;
        };

        let payload = FormSubmission {
            name: &submission.name,
            email: &submission.email,
            subject: &email.subject,
            message: &submission.message,
            reply_to: &email.reply_to,
            email_subject: &email.subject,
            submitted_at: submission.submitted_at(),
        };

        tracing::debug!(target: "provider_task", "POST {}", endpoint);
        let response = match self
            .client
            .post(endpoint.clone())
            .header(ACCEPT, "application/json")
            .json(&payload)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return ProviderOutcome::Failed(e.to_string()),
        };

        match check_status(response).await {
            Ok(_) => ProviderOutcome::Sent { id: None },
            Err(detail) => ProviderOutcome::Failed(detail),
        }
    }
}
