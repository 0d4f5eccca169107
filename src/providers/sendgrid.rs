//! Secondary provider: the SendGrid v3 mail API.

use super::{EmailProvider, OutgoingEmail, check_status, usable_credential};
use crate::error::Result;
use crate::models::{ContactSubmission, ProviderKind, ProviderOutcome};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use url::Url;

#[derive(Serialize)]
struct MailSendRequest<'a> {
    personalizations: [Personalization<'a>; 1],
    from: EmailAddress<'a>,
    reply_to: EmailAddress<'a>,
    subject: &'a str,
    content: [Content<'a>; 2],
}

#[derive(Serialize)]
struct Personalization<'a> {
    to: [EmailAddress<'a>; 1],
}

#[derive(Serialize)]
struct EmailAddress<'a> {
    email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(rename = "type")]
    mime_type: &'static str,
    value: &'a str,
}

/// Sends through `POST {base}/v3/mail/send`. SendGrid answers `202 Accepted` with an empty body.
pub(crate) struct SendGridProvider {
    client: Client,
    api_key: Option<String>,
    endpoint: Url,
}

impl SendGridProvider {
    pub(crate) fn new(client: Client, api_key: Option<String>, base_url: &Url) -> Result<Self> {
        Ok(Self {
            client,
            api_key: usable_credential(api_key),
            endpoint: base_url.join("v3/mail/send")?,
        })
    }
}

#[async_trait]
impl EmailProvider for SendGridProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::SendGrid
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn send(&self, email: &OutgoingEmail, _submission: &ContactSubmission) -> ProviderOutcome {
        let Some(api_key) = self.api_key.as_deref() else {
            return ProviderOutcome::NotConfigured;
        };

        let payload = MailSendRequest {
            personalizations: [Personalization {
                to: [EmailAddress {
                    email: email.to.as_ref(),
                    name: None,
                }],
            }],
            from: EmailAddress {
                email: email.from.email.as_ref(),
                name: email.from.name.as_deref(),
            },
            reply_to: EmailAddress {
                email: &email.reply_to,
                name: Some(&email.reply_to_name),
            },
            subject: &email.subject,
            content: [
                Content {
                    mime_type: "text/plain",
                    value: &email.text,
                },
                Content {
                    mime_type: "text/html",
                    value: &email.html,
                },
            ],
        };

        tracing::debug!(target: "provider_task", "POST {}", self.endpoint);
        let response = match self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(api_key)
            .json(&payload)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return ProviderOutcome::Failed(e.to_string()),
        };

        match check_status(response).await {
            Ok(response) => {
                let id = response
                    .headers()
                    .get("x-message-id")
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                ProviderOutcome::Sent { id }
            }
            Err(detail) => ProviderOutcome::Failed(detail),
        }
    }
}
