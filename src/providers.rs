//! Adapters for the third-party email APIs a submission can be relayed through.
//!
//! Each adapter owns one credential and makes at most one HTTP call per send.
//! A missing or placeholder credential yields `NotConfigured` without touching
//! the network; a transport error or non-2xx status yields `Failed` carrying
//! the raw detail for the logs.

mod formspree;
mod resend;
mod sendgrid;

use crate::config::Config;
use crate::error::Result;
use crate::models::{ContactSubmission, ProviderKind, ProviderOutcome};
use async_trait::async_trait;
use lettre::Address;
use lettre::message::Mailbox;
use reqwest::{Client, Response};

pub(crate) use formspree::FormspreeProvider;
pub(crate) use resend::ResendProvider;
pub(crate) use sendgrid::SendGridProvider;

/// Longest slice of a provider error body kept for the logs.
const ERROR_BODY_EXCERPT_CHARS: usize = 300;

/// A rendered message ready to be handed to a provider.
#[derive(Debug, Clone)]
pub(crate) struct OutgoingEmail {
    /// Always the site owner.
    pub to: Address,
    pub from: Mailbox,
    /// The visitor's address, so replies go straight to them.
    pub reply_to: String,
    /// Name shown next to the reply-to address.
    pub reply_to_name: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

/// One email-sending API.
#[async_trait]
pub(crate) trait EmailProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// False when the credential is absent or a placeholder.
    fn is_configured(&self) -> bool;

    /// Attempts delivery exactly once.
    async fn send(&self, email: &OutgoingEmail, submission: &ContactSubmission)
        -> ProviderOutcome;
}

/// Builds the HTTP client shared by all adapters.
pub(crate) fn build_http_client(config: &Config) -> Result<Client> {
    let client = Client::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .timeout(config.request_timeout)
        .build()?;
    Ok(client)
}

/// Builds the adapters in priority order: primary, secondary, tertiary.
pub(crate) fn default_chain(
    config: &Config,
    client: &Client,
) -> Result<Vec<Box<dyn EmailProvider>>> {
    let mut chain: Vec<Box<dyn EmailProvider>> = Vec::with_capacity(3);
    chain.push(Box::new(ResendProvider::new(
        client.clone(),
        config.resend_api_key.clone(),
        &config.resend_base_url,
    )?));
    chain.push(Box::new(SendGridProvider::new(
        client.clone(),
        config.sendgrid_api_key.clone(),
        &config.sendgrid_base_url,
    )?));
    chain.push(Box::new(FormspreeProvider::new(
        client.clone(),
        config.form_endpoint.clone(),
    )));
    Ok(chain)
}

/// Drops credentials that are empty or left as template values.
fn usable_credential(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| crate::config::is_usable_credential(v))
}

/// Passes 2xx responses through and turns anything else into a loggable error detail.
async fn check_status(response: Response) -> std::result::Result<Response, String> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let excerpt: String = body.chars().take(ERROR_BODY_EXCERPT_CHARS).collect();
    Err(format!("HTTP {}: {}", status, excerpt.trim()))
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usable_credential_trims_and_filters() {
        assert_eq!(usable_credential(None), None);
        assert_eq!(usable_credential(Some(" ".to_string())), None);
        assert_eq!(usable_credential(Some("your_api_key".to_string())), None);
        assert_eq!(
            usable_credential(Some(" re_live_1 ".to_string())),
            Some("re_live_1".to_string())
        );
    }

    #[test]
    fn test_default_chain_order() {
        let config = Config::for_tests();
        let client = build_http_client(&config).unwrap();
        let chain = default_chain(&config, &client).unwrap();
        let kinds: Vec<ProviderKind> = chain.iter().map(|p| p.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                ProviderKind::Resend,
                ProviderKind::SendGrid,
                ProviderKind::Formspree
            ]
        );
        assert!(chain.iter().all(|p| !p.is_configured()));
    }
}
