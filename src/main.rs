use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod api;
mod config;
mod delivery;
mod error;
mod handler;
mod models;
mod platform;
mod providers;
mod template;
mod validation;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    settings: config::ConfigArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server
    Serve {
        /// Port to listen on
        #[arg(short, long, env = "CONTACT_RELAY_PORT")]
        port: Option<u16>,
    },
    /// Validate and deliver a single message, printing the endpoint's JSON response
    Send {
        /// Sender's name
        #[arg(long)]
        name: String,

        /// Sender's email address
        #[arg(long)]
        email: String,

        /// Message subject
        #[arg(long)]
        subject: String,

        /// Message text
        #[arg(long)]
        message: String,
    },
    /// Handle one serverless-function event and print the function response
    Invoke {
        /// Path to the event JSON file (reads stdin when omitted)
        #[arg(short, long)]
        event: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing; stdout is reserved for command output
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Load configuration
    let mut config = config::build_config(&cli.settings)?;

    match cli.command {
        Commands::Serve { port } => {
            if let Some(port) = port {
                config.port = port;
            }
            info!("Starting contact relay on port {}", config.port);
            api::start_api_server(Arc::new(config)).await?;
        }
        Commands::Send {
            name,
            email,
            subject,
            message,
        } => {
            let handler = handler::ContactHandler::from_config(&config)?;
            let form = models::ContactForm {
                name: Some(name),
                email: Some(email),
                subject: Some(subject),
                message: Some(message),
            };
            send_message(&handler, form).await?;
            info!("Message delivered");
        }
        Commands::Invoke { event } => {
            let raw = platform::read_event(event.as_deref())?;
            let handler = handler::ContactHandler::from_config(&config)?;
            let response = platform::invoke(&handler, &raw, config.cors).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
    }

    Ok(())
}

/// Runs one form through the handler and prints the endpoint's JSON response.
///
/// Returns the response body when the message was delivered and an error otherwise.
async fn send_message(
    handler: &handler::ContactHandler,
    form: models::ContactForm,
) -> Result<models::ApiResponse> {
    let request = handler::ContactRequest {
        method: warp::http::Method::POST,
        body: serde_json::to_vec(&form)?,
        client_ip: None,
        user_agent: Some(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string()),
    };

    let response = handler.handle(request).await;
    let Some(body) = response.body else {
        anyhow::bail!("Handler returned no body (status {})", response.status);
    };
    println!("{}", serde_json::to_string_pretty(&body)?);

    if !body.success {
        anyhow::bail!(
            "Message was not delivered (status {}): {}",
            response.status,
            body.message
        );
    }
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::test_support::{log_only_handler, unconfigured_handler};
    use crate::models::ContactForm;

    fn form(email: &str) -> ContactForm {
        ContactForm {
            name: Some("Ann".to_string()),
            email: Some(email.to_string()),
            subject: Some("Hi".to_string()),
            message: Some("Hello".to_string()),
        }
    }

    #[tokio::test]
    async fn test_send_message_returns_delivered_response() {
        let body = send_message(&log_only_handler(), form("ann@x.com"))
            .await
            .unwrap();
        assert!(body.success);
        assert!(!body.data.unwrap().reference.is_empty());
    }

    #[tokio::test]
    async fn test_send_message_fails_when_nothing_delivers() {
        let err = send_message(&unconfigured_handler(), form("ann@x.com"))
            .await
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("status 500"), "{message}");
        assert!(message.contains(crate::delivery::UNDELIVERED_MESSAGE), "{message}");
    }

    #[tokio::test]
    async fn test_send_message_fails_on_invalid_input() {
        let err = send_message(&log_only_handler(), form("not-an-email"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Please provide a valid email address."));
    }
}
