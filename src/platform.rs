//! Serverless-function binding: a function-style event in, a function-style response out.
//!
//! Hosting platforms that invoke the contact endpoint as a function pass an
//! event shaped like `{httpMethod, headers, body, isBase64Encoded}` and expect
//! `{statusCode, headers, body}` back with the body as a JSON string.

use crate::error::{AppError, Result};
use crate::handler::{CORS_HEADERS, ContactHandler, ContactRequest, ContactResponse};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::io::Read;
use std::path::Path;
use warp::http::Method;

/// Incoming function event.
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FunctionEvent {
    pub http_method: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub is_base64_encoded: bool,
}

/// Outgoing function response.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FunctionResponse {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl FunctionEvent {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.trim())
            .filter(|value| !value.is_empty())
    }

    /// Translates the event into a platform-independent request.
    pub(crate) fn into_contact_request(self) -> Result<ContactRequest> {
        let method = Method::from_bytes(self.http_method.trim().to_ascii_uppercase().as_bytes())
            .map_err(|e| {
                AppError::Generic(anyhow::anyhow!(
                    "Invalid HTTP method '{}': {}",
                    self.http_method,
                    e
                ))
            })?;

        let client_ip = self
            .header("x-forwarded-for")
            .and_then(|v| v.split(',').map(str::trim).find(|s| !s.is_empty()))
            .or_else(|| self.header("x-real-ip"))
            .or_else(|| self.header("client-ip"))
            .map(str::to_string);
        let user_agent = self.header("user-agent").map(str::to_string);

        let body = match self.body {
            Some(body) if self.is_base64_encoded => STANDARD.decode(body.trim())?,
            Some(body) => body.into_bytes(),
            None => Vec::new(),
        };

        Ok(ContactRequest {
            method,
            body,
            client_ip,
            user_agent,
        })
    }
}

impl FunctionResponse {
    fn from_contact_response(response: ContactResponse, cors: bool) -> Result<Self> {
        let mut headers = BTreeMap::new();
        let body = match response.body {
            Some(body) => {
                headers.insert("content-type".to_string(), "application/json".to_string());
                serde_json::to_string(&body)?
            }
            None => String::new(),
        };
        if cors {
            for (name, value) in CORS_HEADERS {
                headers.insert(name.to_string(), value.to_string());
            }
        }
        Ok(Self {
            status_code: response.status.as_u16(),
            headers,
            body,
        })
    }
}

/// Reads the raw event text from a file, or from stdin when no path is given.
pub(crate) fn read_event(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => Ok(std::fs::read_to_string(path)?),
        None => {
            let mut raw = String::new();
            std::io::stdin().read_to_string(&mut raw)?;
            Ok(raw)
        }
    }
}

/// Parses a raw event and translates it into a platform-independent request.
fn parse_event(raw: &str) -> Result<ContactRequest> {
    let event: FunctionEvent = serde_json::from_str(raw)?;
    event.into_contact_request()
}

/// Runs one raw event through the handler.
///
/// An event that cannot be parsed or translated still yields a response: the
/// handler answers it as an internal error carrying the underlying cause.
pub(crate) async fn invoke(
    handler: &ContactHandler,
    raw: &str,
    cors: bool,
) -> Result<FunctionResponse> {
    let response = match parse_event(raw) {
        Ok(request) => handler.handle(request).await,
        Err(e) => {
            tracing::warn!(target: "contact_request", "Malformed function event: {}", e);
            handler.malformed(&e)
        }
    };
    FunctionResponse::from_contact_response(response, cors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::INTERNAL_ERROR_MESSAGE;
    use crate::handler::test_support::{development_handler, log_only_handler};
    use crate::models::ApiResponse;
    use serde_json::json;

    fn event(method: &str, body: Option<&str>) -> FunctionEvent {
        FunctionEvent {
            http_method: method.to_string(),
            headers: HashMap::from([
                ("User-Agent".to_string(), "Mozilla/5.0".to_string()),
                ("X-Forwarded-For".to_string(), "198.51.100.4, 10.0.0.1".to_string()),
            ]),
            body: body.map(str::to_string),
            is_base64_encoded: false,
        }
    }

    fn raw_event(method: &str, body: Option<&str>) -> String {
        json!({
            "httpMethod": method,
            "headers": {"user-agent": "Mozilla/5.0"},
            "body": body,
        })
        .to_string()
    }

    fn body(response: &FunctionResponse) -> ApiResponse {
        serde_json::from_str(&response.body).unwrap()
    }

    const ANN: &str = r#"{"name":"Ann","email":"ann@x.com","subject":"Hi","message":"Hello"}"#;

    #[test]
    fn test_event_translation() {
        let request = event("post", Some(ANN)).into_contact_request().unwrap();
        assert_eq!(request.method, Method::POST);
        assert_eq!(request.client_ip.as_deref(), Some("198.51.100.4"));
        assert_eq!(request.user_agent.as_deref(), Some("Mozilla/5.0"));
        assert_eq!(request.body, ANN.as_bytes());
    }

    #[test]
    fn test_base64_body_is_decoded() {
        let mut encoded = event("POST", Some(&STANDARD.encode(ANN)));
        encoded.is_base64_encoded = true;
        let request = encoded.into_contact_request().unwrap();
        assert_eq!(request.body, ANN.as_bytes());

        let mut broken = event("POST", Some("***"));
        broken.is_base64_encoded = true;
        assert!(matches!(
            broken.into_contact_request(),
            Err(AppError::Base64(_))
        ));
    }

    #[test]
    fn test_event_deserializes_from_platform_json() {
        let event: FunctionEvent = serde_json::from_str(
            r#"{"httpMethod":"OPTIONS","headers":{"origin":"https://example.com"}}"#,
        )
        .unwrap();
        assert_eq!(event.http_method, "OPTIONS");
        assert!(event.body.is_none());
        assert!(!event.is_base64_encoded);
    }

    #[tokio::test]
    async fn test_invoke_success_response() {
        let response = invoke(&log_only_handler(), &raw_event("POST", Some(ANN)), true)
            .await
            .unwrap();
        assert_eq!(response.status_code, 200);
        assert_eq!(response.headers["access-control-allow-origin"], "*");
        assert_eq!(response.headers["content-type"], "application/json");
        assert!(body(&response).success);
    }

    #[tokio::test]
    async fn test_invoke_preflight_and_wrong_method() {
        let preflight = invoke(&log_only_handler(), &raw_event("OPTIONS", None), true)
            .await
            .unwrap();
        assert_eq!(preflight.status_code, 200);
        assert!(preflight.body.is_empty());

        let get = invoke(&log_only_handler(), &raw_event("GET", Some(ANN)), false)
            .await
            .unwrap();
        assert_eq!(get.status_code, 405);
        assert!(!get.headers.contains_key("access-control-allow-origin"));
        assert_eq!(body(&get).message, "Method not allowed. Use POST.");
    }

    #[tokio::test]
    async fn test_invoke_bad_method_is_500_with_cause() {
        let raw = raw_event("NOT A METHOD", Some(ANN));

        let response = invoke(&log_only_handler(), &raw, false).await.unwrap();
        assert_eq!(response.status_code, 500);
        assert_eq!(body(&response), ApiResponse::failure(INTERNAL_ERROR_MESSAGE));

        let response = invoke(&development_handler(), &raw, false).await.unwrap();
        let message = body(&response).message;
        assert!(message.contains("Invalid HTTP method"), "{message}");
    }

    #[tokio::test]
    async fn test_invoke_missing_http_method_is_500() {
        let raw = json!({"body": ANN}).to_string();

        let response = invoke(&log_only_handler(), &raw, true).await.unwrap();
        assert_eq!(response.status_code, 500);
        assert_eq!(response.headers["access-control-allow-origin"], "*");
        assert_eq!(body(&response), ApiResponse::failure(INTERNAL_ERROR_MESSAGE));

        let response = invoke(&development_handler(), &raw, true).await.unwrap();
        let message = body(&response).message;
        assert!(message.contains("httpMethod"), "{message}");
    }

    #[tokio::test]
    async fn test_invoke_object_body_is_500() {
        let raw = json!({
            "httpMethod": "POST",
            "body": {"name": "Ann", "email": "ann@x.com", "subject": "Hi", "message": "Hello"},
        })
        .to_string();

        let response = invoke(&log_only_handler(), &raw, false).await.unwrap();
        assert_eq!(response.status_code, 500);
        let body = body(&response);
        assert!(!body.success);
        assert_eq!(body.message, INTERNAL_ERROR_MESSAGE);
    }

    #[tokio::test]
    async fn test_invoke_bad_base64_is_500_with_cause() {
        let raw = json!({"httpMethod": "POST", "body": "***", "isBase64Encoded": true}).to_string();
        let response = invoke(&development_handler(), &raw, false).await.unwrap();
        assert_eq!(response.status_code, 500);
        let message = body(&response).message;
        assert!(message.contains("Base64"), "{message}");
    }

    #[tokio::test]
    async fn test_invoke_non_json_event_is_500() {
        let response = invoke(&log_only_handler(), "not json", false).await.unwrap();
        assert_eq!(response.status_code, 500);
    }
}
