//! Turns an accepted submission into a delivered message.

use crate::config::{Config, DeliveryMode};
use crate::error::Result;
use crate::models::{
    ContactSubmission, DeliveryAttempt, DeliveryResult, ProviderKind, ProviderOutcome,
};
use crate::providers::{self, EmailProvider, OutgoingEmail};
use crate::template::TemplateRenderer;
use chrono::Utc;
use lettre::Address;
use lettre::message::Mailbox;
use rand::Rng;
use std::time::Duration;

pub(crate) const DELIVERED_MESSAGE: &str = "Thank you for your message! I'll get back to you soon.";
pub(crate) const UNDELIVERED_MESSAGE: &str =
    "Sorry, your message could not be delivered right now. Please try again later.";

const BASE36: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

fn to_base36(mut value: u64) -> String {
    if value == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while value > 0 {
        digits.push(BASE36[(value % 36) as usize]);
        value /= 36;
    }
    digits.reverse();
    String::from_utf8_lossy(&digits).into_owned()
}

/// Generates a display-only reference such as `MSG-LVNQ3Z1C-7K2A`.
/// Time-based with a random suffix; not unique across processes and never stored.
pub(crate) fn generate_reference_id() -> String {
    let millis = u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default();
    let mut rng = rand::thread_rng();
    let suffix: String = (0..4)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect();
    format!("MSG-{}-{}", to_base36(millis), suffix)
}

impl DeliveryResult {
    fn delivered(provider: Option<ProviderKind>, attempts: Vec<DeliveryAttempt>) -> Self {
        Self {
            success: true,
            provider_used: provider,
            user_message: DELIVERED_MESSAGE.to_string(),
            reference_id: Some(generate_reference_id()),
            attempts,
        }
    }

    fn undelivered(attempts: Vec<DeliveryAttempt>) -> Self {
        Self {
            success: false,
            provider_used: None,
            user_message: UNDELIVERED_MESSAGE.to_string(),
            reference_id: None,
            attempts,
        }
    }
}

/// Relays submissions through an ordered chain of providers; the first success wins.
pub(crate) struct Mailer {
    providers: Vec<Box<dyn EmailProvider>>,
    owner_email: Address,
    from_address: Mailbox,
    renderer: TemplateRenderer,
}

impl Mailer {
    pub(crate) fn new(
        providers: Vec<Box<dyn EmailProvider>>,
        owner_email: Address,
        from_address: Mailbox,
    ) -> Result<Self> {
        Ok(Self {
            providers,
            owner_email,
            from_address,
            renderer: TemplateRenderer::new()?,
        })
    }

    /// Builds the primary, secondary and tertiary adapters from configuration.
    pub(crate) fn from_config(config: &Config) -> Result<Self> {
        let client = providers::build_http_client(config)?;
        let chain = providers::default_chain(config, &client)?;

        let configured: Vec<String> = chain
            .iter()
            .filter(|p| p.is_configured())
            .map(|p| p.kind().to_string())
            .collect();
        tracing::info!(target: "delivery_task",
            "Email providers configured: [{}]",
            configured.join(", ")
        );

        Self::new(
            chain,
            config.owner_email.clone(),
            config.from_address.clone(),
        )
    }

    fn compose(&self, submission: &ContactSubmission) -> Result<OutgoingEmail> {
        let rendered = self.renderer.render(submission)?;
        Ok(OutgoingEmail {
            to: self.owner_email.clone(),
            from: self.from_address.clone(),
            reply_to: submission.email.clone(),
            reply_to_name: submission.name.clone(),
            subject: rendered.subject,
            html: rendered.html,
            text: rendered.text,
        })
    }

    /// Tries each provider once, strictly in order, stopping at the first `Sent`.
    /// Attempt N+1 starts only after attempt N has resolved.
    ///
    /// Fails only when the email cannot be rendered; provider failures are
    /// reported in the result.
    pub(crate) async fn deliver(&self, submission: &ContactSubmission) -> Result<DeliveryResult> {
        let email = self.compose(submission)?;
        let mut attempts = Vec::with_capacity(self.providers.len());

        for provider in &self.providers {
            let kind = provider.kind();
            let outcome = provider.send(&email, submission).await;

            match &outcome {
                ProviderOutcome::Sent { id } => {
                    tracing::info!(target: "delivery_task",
                        provider = %kind, message_id = ?id, "Provider accepted the message");
                }
                ProviderOutcome::NotConfigured => {
                    tracing::debug!(target: "delivery_task",
                        provider = %kind, "Provider not configured, skipping");
                }
                ProviderOutcome::Failed(detail) => {
                    tracing::warn!(target: "delivery_task",
                        provider = %kind, error = %detail, "Provider failed");
                }
            }

            let sent = outcome.is_sent();
            attempts.push(DeliveryAttempt {
                provider: kind,
                outcome,
            });
            if sent {
                return Ok(DeliveryResult::delivered(Some(kind), attempts));
            }
        }

        let summary: Vec<String> = attempts
            .iter()
            .map(|a| format!("{}={}", a.provider, a.outcome.label()))
            .collect();
        tracing::error!(target: "delivery_task",
            attempts = %summary.join(", "),
            "No provider delivered the message from {}", submission.email
        );
        Ok(DeliveryResult::undelivered(attempts))
    }
}

/// What the handler does with an accepted submission, chosen per deployment.
pub(crate) enum Dispatcher {
    /// Relay through the provider chain.
    Providers(Mailer),
    /// Print the submission and acknowledge after an artificial delay.
    LogOnly { delay: Duration },
}

impl Dispatcher {
    pub(crate) fn from_config(config: &Config) -> Result<Self> {
        match config.delivery_mode {
            DeliveryMode::Providers => Ok(Dispatcher::Providers(Mailer::from_config(config)?)),
            DeliveryMode::LogOnly => {
                tracing::info!(target: "delivery_task",
                    "Log-only delivery: submissions are recorded but not emailed");
                Ok(Dispatcher::LogOnly {
                    delay: config.simulated_delay,
                })
            }
        }
    }

    pub(crate) async fn dispatch(&self, submission: &ContactSubmission) -> Result<DeliveryResult> {
        match self {
            Dispatcher::Providers(mailer) => mailer.deliver(submission).await,
            Dispatcher::LogOnly { delay } => {
                tracing::info!(target: "delivery_task",
                    name = %submission.name,
                    email = %submission.email,
                    subject = %submission.subject,
                    message = %submission.message,
                    timestamp = %submission.submitted_at(),
                    ip = %submission.source_ip,
                    user_agent = %submission.user_agent,
                    "New contact form submission"
                );
                if !delay.is_zero() {
                    tokio::time::sleep(*delay).await;
                }
                Ok(DeliveryResult::delivered(None, Vec::new()))
            }
        }
    }
}
