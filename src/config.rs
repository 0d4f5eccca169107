//! Defines the configuration settings for the contact-relay application.

use crate::error::{AppError, Result};
use anyhow::Context;
use clap::{Args, ValueEnum};
use lettre::Address;
use lettre::message::Mailbox;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use url::Url;

pub(crate) const DEFAULT_RESEND_BASE_URL: &str = "https://api.resend.com/";
pub(crate) const DEFAULT_SENDGRID_BASE_URL: &str = "https://api.sendgrid.com/";

/// How accepted submissions are handled.
#[derive(ValueEnum, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub(crate) enum DeliveryMode {
    /// Relay through the email provider chain.
    #[default]
    Providers,
    /// Only log the submission and acknowledge it after a simulated delay.
    LogOnly,
}

/// Command line arguments shared by every subcommand.
#[derive(Args, Debug, Default, Clone)]
pub(crate) struct ConfigArgs {
    /// Path to configuration file (TOML format)
    #[arg(long, global = true, env = "CONTACT_RELAY_CONFIG")]
    pub config_file: Option<String>,

    /// Address that receives contact messages
    #[arg(long, global = true, env = "CONTACT_RELAY_OWNER_EMAIL")]
    pub owner_email: Option<String>,

    /// Sender mailbox used for relayed messages, e.g. "Portfolio <hello@example.com>"
    #[arg(long, global = true, env = "CONTACT_RELAY_FROM")]
    pub from_address: Option<String>,

    /// API key for the primary provider (Resend)
    #[arg(long, global = true, env = "RESEND_API_KEY", hide_env_values = true)]
    pub resend_api_key: Option<String>,

    /// API key for the secondary provider (SendGrid)
    #[arg(long, global = true, env = "SENDGRID_API_KEY", hide_env_values = true)]
    pub sendgrid_api_key: Option<String>,

    /// Public form endpoint used as the tertiary provider (Formspree-style)
    #[arg(long, global = true, env = "CONTACT_FORM_ENDPOINT")]
    pub form_endpoint: Option<String>,

    /// Base URL of the Resend API
    #[arg(long, global = true, env = "RESEND_BASE_URL")]
    pub resend_base_url: Option<String>,

    /// Base URL of the SendGrid API
    #[arg(long, global = true, env = "SENDGRID_BASE_URL")]
    pub sendgrid_base_url: Option<String>,

    /// Provider HTTP request timeout in seconds
    #[arg(long, global = true, env = "CONTACT_RELAY_REQUEST_TIMEOUT")]
    pub request_timeout: Option<u64>,

    /// What to do with accepted submissions
    #[arg(long, global = true, value_enum, env = "CONTACT_RELAY_DELIVERY_MODE")]
    pub delivery_mode: Option<DeliveryMode>,

    /// Simulated processing delay in log-only mode (milliseconds)
    #[arg(long, global = true, env = "CONTACT_RELAY_SIMULATED_DELAY_MS")]
    pub simulated_delay_ms: Option<u64>,

    /// Add permissive CORS headers to contact endpoint responses
    #[arg(long, global = true, env = "CONTACT_RELAY_CORS")]
    pub cors: Option<bool>,

    /// Include internal error details in 500 responses (local debugging only)
    #[arg(long, global = true, env = "CONTACT_RELAY_DEVELOPMENT")]
    pub development: Option<bool>,
}

/// TOML Configuration file structure
#[derive(Deserialize, Debug, Default)]
struct ConfigFile {
    server: Option<ServerConfig>,
    email: Option<EmailConfig>,
    providers: Option<ProvidersConfig>,
    delivery: Option<DeliveryConfig>,
}

#[derive(Deserialize, Debug, Default)]
struct ServerConfig {
    port: Option<u16>,
    cors: Option<bool>,
    development: Option<bool>,
}

#[derive(Deserialize, Debug, Default)]
struct EmailConfig {
    owner_email: Option<String>,
    from_address: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
struct ProvidersConfig {
    resend_api_key: Option<String>,
    sendgrid_api_key: Option<String>,
    form_endpoint: Option<String>,
    resend_base_url: Option<String>,
    sendgrid_base_url: Option<String>,
    request_timeout: Option<u64>,
}

#[derive(Deserialize, Debug, Default)]
struct DeliveryConfig {
    mode: Option<DeliveryMode>,
    simulated_delay_ms: Option<u64>,
}

/// Layered settings before addresses and URLs are parsed.
#[derive(Debug, Clone)]
struct Settings {
    port: u16,
    owner_email: String,
    from_address: String,
    resend_api_key: Option<String>,
    sendgrid_api_key: Option<String>,
    form_endpoint: Option<String>,
    resend_base_url: String,
    sendgrid_base_url: String,
    request_timeout: Duration,
    delivery_mode: DeliveryMode,
    simulated_delay: Duration,
    cors: bool,
    development: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            port: 8080,
            owner_email: "owner@example.com".to_string(),
            from_address: "Portfolio Contact <onboarding@resend.dev>".to_string(),
            resend_api_key: None,
            sendgrid_api_key: None,
            form_endpoint: None,
            resend_base_url: DEFAULT_RESEND_BASE_URL.to_string(),
            sendgrid_base_url: DEFAULT_SENDGRID_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(10),
            delivery_mode: DeliveryMode::Providers,
            simulated_delay: Duration::from_millis(1000),
            cors: true,
            development: false,
        }
    }
}

/// Application configuration settings.
#[derive(Debug, Clone)]
pub(crate) struct Config {
    /// Port the HTTP server listens on.
    pub port: u16,
    /// Recipient of every relayed message.
    pub owner_email: Address,
    /// Sender mailbox of relayed messages.
    pub from_address: Mailbox,
    /// Primary provider credential, as supplied. May be a placeholder.
    pub resend_api_key: Option<String>,
    /// Secondary provider credential, as supplied. May be a placeholder.
    pub sendgrid_api_key: Option<String>,
    /// Tertiary provider endpoint; `None` when absent, a placeholder, or not a valid URL.
    pub form_endpoint: Option<Url>,
    pub resend_base_url: Url,
    pub sendgrid_base_url: Url,
    /// Timeout applied to every provider request.
    pub request_timeout: Duration,
    pub delivery_mode: DeliveryMode,
    /// Artificial delay before acknowledging in log-only mode.
    pub simulated_delay: Duration,
    pub cors: bool,
    /// Echo internal error details in 500 responses.
    pub development: bool,
}

/// Returns false for credentials that are empty or obviously left as a template value.
pub(crate) fn is_usable_credential(value: &str) -> bool {
    let value = value.trim();
    if value.is_empty() {
        return false;
    }
    let lower = value.to_ascii_lowercase();
    let looks_like_template = ["your_", "your-", "placeholder", "changeme", "<", ">"]
        .iter()
        .any(|marker| lower.contains(marker));
    let all_x = lower.chars().all(|c| c == 'x');
    !(looks_like_template || all_x)
}

/// Load configuration from a TOML file
fn load_config_file(file_path: &str) -> anyhow::Result<ConfigFile> {
    let path = Path::new(file_path);
    if !path.exists() {
        tracing::warn!("Configuration file {} not found, using defaults", file_path);
        return Ok(ConfigFile::default());
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read configuration file: {}", file_path))?;

    let config = parse_config_file(&content)
        .with_context(|| format!("Failed to parse TOML configuration from {}", file_path))?;

    tracing::info!("Loaded configuration from {}", file_path);
    Ok(config)
}

fn parse_config_file(content: &str) -> std::result::Result<ConfigFile, toml::de::Error> {
    toml::from_str(content)
}

fn apply_file_config(settings: &mut Settings, file_config: &ConfigFile) {
    if let Some(server) = &file_config.server {
        if let Some(port) = server.port {
            settings.port = port;
        }
        if let Some(cors) = server.cors {
            settings.cors = cors;
        }
        if let Some(development) = server.development {
            settings.development = development;
        }
    }

    if let Some(email) = &file_config.email {
        if let Some(owner) = &email.owner_email {
            settings.owner_email = owner.clone();
        }
        if let Some(from) = &email.from_address {
            settings.from_address = from.clone();
        }
    }

    if let Some(providers) = &file_config.providers {
        if let Some(key) = &providers.resend_api_key {
            settings.resend_api_key = Some(key.clone());
        }
        if let Some(key) = &providers.sendgrid_api_key {
            settings.sendgrid_api_key = Some(key.clone());
        }
        if let Some(endpoint) = &providers.form_endpoint {
            settings.form_endpoint = Some(endpoint.clone());
        }
        if let Some(base) = &providers.resend_base_url {
            settings.resend_base_url = base.clone();
        }
        if let Some(base) = &providers.sendgrid_base_url {
            settings.sendgrid_base_url = base.clone();
        }
        if let Some(timeout) = providers.request_timeout {
            settings.request_timeout = Duration::from_secs(timeout);
        }
    }

    if let Some(delivery) = &file_config.delivery {
        if let Some(mode) = delivery.mode {
            settings.delivery_mode = mode;
        }
        if let Some(delay) = delivery.simulated_delay_ms {
            settings.simulated_delay = Duration::from_millis(delay);
        }
    }
}

/// Apply command line arguments (and their environment fallbacks) on top of the file settings
fn apply_cli_args(settings: &mut Settings, args: &ConfigArgs) {
    if let Some(ref owner) = args.owner_email {
        settings.owner_email = owner.clone();
    }

    if let Some(ref from) = args.from_address {
        settings.from_address = from.clone();
    }

    if let Some(ref key) = args.resend_api_key {
        settings.resend_api_key = Some(key.clone());
    }

    if let Some(ref key) = args.sendgrid_api_key {
        settings.sendgrid_api_key = Some(key.clone());
    }

    if let Some(ref endpoint) = args.form_endpoint {
        settings.form_endpoint = Some(endpoint.clone());
    }

    if let Some(ref base) = args.resend_base_url {
        settings.resend_base_url = base.clone();
    }

    if let Some(ref base) = args.sendgrid_base_url {
        settings.sendgrid_base_url = base.clone();
    }

    if let Some(timeout) = args.request_timeout {
        settings.request_timeout = Duration::from_secs(timeout);
    }

    if let Some(mode) = args.delivery_mode {
        settings.delivery_mode = mode;
    }

    if let Some(delay) = args.simulated_delay_ms {
        settings.simulated_delay = Duration::from_millis(delay);
    }

    if let Some(cors) = args.cors {
        settings.cors = cors;
    }

    if let Some(development) = args.development {
        settings.development = development;
    }
}

fn parse_base_url(value: &str, name: &str) -> Result<Url> {
    let mut url = Url::parse(value.trim())
        .map_err(|e| AppError::Config(format!("Invalid {} '{}': {}", name, value, e)))?;
    // Keep the last path segment when endpoints are joined onto the base.
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn parse_form_endpoint(value: Option<&str>) -> Option<Url> {
    let value = value?.trim();
    if !is_usable_credential(value) {
        tracing::debug!("Form endpoint is empty or a placeholder; tertiary provider disabled.");
        return None;
    }
    match Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Some(url),
        Ok(url) => {
            tracing::warn!(
                "Form endpoint must be an http(s) URL, got scheme '{}'. Tertiary provider disabled.",
                url.scheme()
            );
            None
        }
        Err(e) => {
            tracing::warn!("Form endpoint is not a valid URL ({}). Tertiary provider disabled.", e);
            None
        }
    }
}

fn validate_config(mut settings: Settings) -> Result<Config> {
    let owner_email: Address = settings.owner_email.trim().parse().map_err(|e| {
        AppError::Config(format!(
            "Invalid owner email '{}': {}",
            settings.owner_email, e
        ))
    })?;

    let from_address: Mailbox = settings.from_address.trim().parse().map_err(|e| {
        AppError::Config(format!(
            "Invalid sender address '{}': {}",
            settings.from_address, e
        ))
    })?;

    if settings.request_timeout.is_zero() {
        settings.request_timeout = Duration::from_secs(10);
        tracing::warn!("Request timeout was set to 0. Setting to 10 seconds.");
    }

    if settings.delivery_mode == DeliveryMode::Providers
        && !settings
            .resend_api_key
            .as_deref()
            .is_some_and(is_usable_credential)
        && !settings
            .sendgrid_api_key
            .as_deref()
            .is_some_and(is_usable_credential)
        && parse_form_endpoint(settings.form_endpoint.as_deref()).is_none()
    {
        tracing::warn!(
            "No email provider is configured. Every contact submission will fail to deliver."
        );
    }

    Ok(Config {
        port: settings.port,
        owner_email,
        from_address,
        form_endpoint: parse_form_endpoint(settings.form_endpoint.as_deref()),
        resend_base_url: parse_base_url(&settings.resend_base_url, "Resend base URL")?,
        sendgrid_base_url: parse_base_url(&settings.sendgrid_base_url, "SendGrid base URL")?,
        resend_api_key: settings.resend_api_key,
        sendgrid_api_key: settings.sendgrid_api_key,
        request_timeout: settings.request_timeout,
        delivery_mode: settings.delivery_mode,
        simulated_delay: settings.simulated_delay,
        cors: settings.cors,
        development: settings.development,
    })
}

pub(crate) fn build_config(args: &ConfigArgs) -> anyhow::Result<Config> {
    let mut settings = Settings::default();

    if let Some(ref file_path) = args.config_file {
        match load_config_file(file_path) {
            Ok(file_config) => apply_file_config(&mut settings, &file_config),
            Err(e) => {
                tracing::error!("Failed to load configuration file: {:#}", e);
            }
        }
    } else {
        for path in ["./contact-relay.toml", "./config.toml"].iter() {
            if Path::new(path).exists() {
                match load_config_file(path) {
                    Ok(file_config) => {
                        apply_file_config(&mut settings, &file_config);
                        break;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load configuration from {}: {:#}", path, e);
                    }
                }
            }
        }
    }

    apply_cli_args(&mut settings, args);

    let config = validate_config(settings)?;

    tracing::debug!(
        owner = %config.owner_email,
        mode = ?config.delivery_mode,
        cors = config.cors,
        "Final configuration built"
    );

    Ok(config)
}

#[cfg(test)]
impl Config {
    /// Default configuration with no provider credentials, for tests.
    pub(crate) fn for_tests() -> Self {
        validate_config(Settings::default()).expect("default settings are valid")
    }
}
