//! Primary provider: the Resend email API.

use super::{EmailProvider, OutgoingEmail, check_status, usable_credential};
use crate::error::Result;
use crate::models::{ContactSubmission, ProviderKind, ProviderOutcome};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

#[derive(Serialize)]
struct SendEmailRequest<'a> {
    from: String,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
    text: &'a str,
    reply_to: &'a str,
}

#[derive(Deserialize)]
struct SendEmailResponse {
    id: Option<String>,
}

/// Sends through `POST {base}/emails` with a bearer API key.
pub(crate) struct ResendProvider {
    client: Client,
    api_key: Option<String>,
    endpoint: Url,
}

impl ResendProvider {
    pub(crate) fn new(client: Client, api_key: Option<String>, base_url: &Url) -> Result<Self> {
        Ok(Self {
            client,
            api_key: usable_credential(api_key),
            endpoint: base_url.join("emails")?,
        })
    }
}

#[async_trait]
impl EmailProvider for ResendProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Resend
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn send(&self, email: &OutgoingEmail, _submission: &ContactSubmission) -> ProviderOutcome {
        let Some(api_key) = self.api_key.as_deref() else {
            return ProviderOutcome::NotConfigured;
        };

        let payload = SendEmailRequest {
            from: email.from.to_string(),
            to: [email.to.as_ref()],
            subject: &email.subject,
            html: &email.html,
            text: &email.text,
            reply_to: &email.reply_to,
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
                    .json::<SendEmailResponse>()
                    .await
                    .ok()
                    .and_then(|body| body.id);
                ProviderOutcome::Sent { id }
            }
            Err(detail) => ProviderOutcome::Failed(detail),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::test_support::{outgoing, stub_server, submission};
    use warp::http::StatusCode;

    fn base(addr: std::net::SocketAddr) -> Url {
        Url::parse(&format!("http://{}/", addr)).unwrap()
    }

    #[tokio::test]
    async fn test_send_posts_expected_payload() {
        let (addr, captured) =
            stub_server(StatusCode::OK, serde_json::json!({"id": "re_msg_1"})).await;
        let provider =
            ResendProvider::new(Client::new(), Some("re_test_key".to_string()), &base(addr))
                .unwrap();

        let outcome = provider.send(&outgoing(), &submission()).await;
        assert_eq!(
            outcome,
            ProviderOutcome::Sent {
                id: Some("re_msg_1".to_string())
            }
        );

        let requests = captured.lock().unwrap();
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert_eq!(request.path, "/emails");
        assert_eq!(request.authorization.as_deref(), Some("Bearer re_test_key"));
        assert_eq!(request.body["to"], serde_json::json!(["owner@example.com"]));
        assert_eq!(request.body["reply_to"], "ann@x.com");
        assert_eq!(request.body["subject"], "Portfolio Contact: Hi");
        assert_eq!(request.body["html"], "<p>Hello</p>");
    }

    #[tokio::test]
    async fn test_send_reports_error_status() {
        let (addr, _captured) = stub_server(
            StatusCode::UNAUTHORIZED,
            serde_json::json!({"message": "API key is invalid"}),
        )
        .await;
        let provider =
            ResendProvider::new(Client::new(), Some("re_bad".to_string()), &base(addr)).unwrap();

        match provider.send(&outgoing(), &submission()).await {
            ProviderOutcome::Failed(detail) => {
                assert!(detail.starts_with("HTTP 401"), "{detail}");
                assert!(detail.contains("API key is invalid"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_placeholder_key_skips_network() {
        let unreachable = Url::parse("http://127.0.0.1:9/").unwrap();
        let provider = ResendProvider::new(
            Client::new(),
            Some("your_resend_api_key".to_string()),
            &unreachable,
        )
        .unwrap();
        assert!(!provider.is_configured());
        assert_eq!(
            provider.send(&outgoing(), &submission()).await,
            ProviderOutcome::NotConfigured
        );
    }
}
