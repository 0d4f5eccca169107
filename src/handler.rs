//! Platform-independent handling of a contact endpoint request.
//!
//! HTTP servers and serverless runtimes translate their native request into a
//! [`ContactRequest`], call [`ContactHandler::handle`], and translate the
//! [`ContactResponse`] back. Every request reaches exactly one response, via
//! success, validation rejection, or the error path.

use crate::config::Config;
use crate::delivery::Dispatcher;
use crate::error::{AppError, Result};
use crate::models::{ApiResponse, ContactForm, ContactSubmission, SubmissionData};
use crate::validation::validate;
use chrono::Utc;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use warp::http::{Method, StatusCode};

pub(crate) const METHOD_NOT_ALLOWED_MESSAGE: &str = "Method not allowed. Use POST.";
pub(crate) const INTERNAL_ERROR_MESSAGE: &str = "Something went wrong. Please try again later.";

/// Headers added to contact responses when CORS is enabled.
pub(crate) const CORS_HEADERS: [(&str, &str); 3] = [
    ("access-control-allow-origin", "*"),
    ("access-control-allow-methods", "POST, OPTIONS"),
    ("access-control-allow-headers", "Content-Type"),
];

/// A request as seen by the handler, independent of the hosting platform.
#[derive(Debug, Clone)]
pub(crate) struct ContactRequest {
    pub method: Method,
    pub body: Vec<u8>,
    pub client_ip: Option<String>,
    pub user_agent: Option<String>,
}

/// The handler's answer. `body` is `None` only for a CORS preflight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ContactResponse {
    pub status: StatusCode,
    pub body: Option<ApiResponse>,
}

impl ContactResponse {
    fn json(status: StatusCode, body: ApiResponse) -> Self {
        Self {
            status,
            body: Some(body),
        }
    }
}

/// Request lifecycle stages, traced for each request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Received,
    Validating,
    Rejected,
    Delivering,
    Succeeded,
    Failed,
    Responded,
}

fn trace_stage(stage: Stage) {
    tracing::debug!(target: "contact_request", ?stage, "contact request stage");
}

pub(crate) struct ContactHandler {
    dispatcher: Dispatcher,
    development: bool,
}

impl ContactHandler {
    pub(crate) fn new(dispatcher: Dispatcher, development: bool) -> Self {
        Self {
            dispatcher,
            development,
        }
    }

    pub(crate) fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(
            Dispatcher::from_config(config)?,
            config.development,
        ))
    }

    /// Handles one request. Never fails: errors and panics become a 500 response.
    pub(crate) async fn handle(&self, request: ContactRequest) -> ContactResponse {
        trace_stage(Stage::Received);

        let response = match AssertUnwindSafe(self.process(request))
            .catch_unwind()
            .await
        {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => self.internal_error(&e.to_string()),
            Err(panic) => {
                let detail = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "panic".to_string());
                self.internal_error(&detail)
            }
        };

        trace_stage(Stage::Responded);
        response
    }

    async fn process(&self, request: ContactRequest) -> Result<ContactResponse> {
        if request.method == Method::OPTIONS {
            return Ok(ContactResponse {
                status: StatusCode::OK,
                body: None,
            });
        }
        if request.method != Method::POST {
            tracing::debug!(target: "contact_request", method = %request.method, "Rejected non-POST request");
            return Ok(ContactResponse::json(
                StatusCode::METHOD_NOT_ALLOWED,
                ApiResponse::failure(METHOD_NOT_ALLOWED_MESSAGE),
            ));
        }

        trace_stage(Stage::Validating);
        let submission = match accept(request) {
            Ok(submission) => submission,
            Err(AppError::Validation(e)) => {
                trace_stage(Stage::Rejected);
                tracing::info!(target: "contact_request", field = ?e.field(), "Submission rejected: {}", e);
                return Ok(ContactResponse::json(
                    StatusCode::BAD_REQUEST,
                    ApiResponse::failure(e.to_string()),
                ));
            }
            Err(e) => return Err(e),
        };

        tracing::info!(target: "contact_request",
            name = %submission.name,
            email = %submission.email,
            subject = %submission.subject,
            ip = %submission.source_ip,
            "Contact submission received"
        );

        trace_stage(Stage::Delivering);
        let result = self.dispatcher.dispatch(&submission).await?;

        if !result.success {
            trace_stage(Stage::Failed);
            return Ok(ContactResponse::json(
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiResponse::failure(result.user_message),
            ));
        }

        trace_stage(Stage::Succeeded);
        tracing::info!(target: "contact_request",
            provider = ?result.provider_used,
            "Contact submission handled"
        );
        let reference = result
            .reference_id
            .unwrap_or_else(crate::delivery::generate_reference_id);
        Ok(ContactResponse::json(
            StatusCode::OK,
            ApiResponse {
                success: true,
                message: result.user_message,
                data: Some(SubmissionData {
                    submitted_at: submission.submitted_at(),
                    reference,
                }),
            },
        ))
    }

    /// Answers a request that could not be translated from its platform's native form.
    pub(crate) fn malformed(&self, error: &AppError) -> ContactResponse {
        trace_stage(Stage::Received);
        let response = self.internal_error(&error.to_string());
        trace_stage(Stage::Responded);
        response
    }

    fn internal_error(&self, detail: &str) -> ContactResponse {
        tracing::error!(target: "contact_request", error = %detail, "Contact request failed");
        let message = if self.development {
            format!("{} ({})", INTERNAL_ERROR_MESSAGE, detail)
        } else {
            INTERNAL_ERROR_MESSAGE.to_string()
        };
        ContactResponse::json(
            StatusCode::INTERNAL_SERVER_ERROR,
            ApiResponse::failure(message),
        )
    }
}

/// Parses and validates the body, stamping the submission with receipt metadata.
fn accept(request: ContactRequest) -> Result<ContactSubmission> {
    let form: ContactForm = serde_json::from_slice(&request.body)?;
    let fields = validate(&form)?;
    Ok(ContactSubmission::new(
        fields,
        Utc::now(),
        request.client_ip,
        request.user_agent,
    ))
}
