//! API server for contact-relay.

use crate::config::Config;
use crate::handler::{CORS_HEADERS, ContactHandler, ContactRequest, ContactResponse};
use crate::models::ApiResponse;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use warp::filters::BoxedFilter;
use warp::http::header::{HeaderMap, HeaderName, HeaderValue};
use warp::http::{Method, StatusCode};
use warp::hyper::body::Bytes;
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

/// Largest contact form body accepted, in bytes.
const MAX_BODY_BYTES: u64 = 64 * 1024;

/// Determines the client address: first `X-Forwarded-For` entry, then `X-Real-IP`, then the peer.
fn client_ip(headers: &HeaderMap, remote: Option<SocketAddr>) -> Option<String> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    if let Some(forwarded) = header("x-forwarded-for") {
        if let Some(first) = forwarded.split(',').map(str::trim).find(|s| !s.is_empty()) {
            return Some(first.to_string());
        }
    }
    if let Some(real_ip) = header("x-real-ip") {
        return Some(real_ip.to_string());
    }
    remote.map(|addr| addr.ip().to_string())
}

fn user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get("user-agent")
        .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
}

/// Converts a handler response into a warp reply, adding CORS headers when enabled.
fn into_reply(response: ContactResponse, cors: bool) -> Response {
    let mut reply = match response.body {
        Some(body) => warp::reply::with_status(warp::reply::json(&body), response.status)
            .into_response(),
        None => warp::reply::with_status(warp::reply(), response.status).into_response(),
    };
    if cors {
        let headers = reply.headers_mut();
        for (name, value) in CORS_HEADERS {
            headers.insert(
                HeaderName::from_static(name),
                HeaderValue::from_static(value),
            );
        }
    }
    reply
}

async fn handle_contact(
    method: Method,
    headers: HeaderMap,
    remote: Option<SocketAddr>,
    body: Bytes,
    handler: Arc<ContactHandler>,
    cors: bool,
) -> Result<Response, Infallible> {
    let request = ContactRequest {
        method,
        body: body.to_vec(),
        client_ip: client_ip(&headers, remote),
        user_agent: user_agent(&headers),
    };
    let response = handler.handle(request).await;
    Ok(into_reply(response, cors))
}

/// Builds every route served by the API.
pub(crate) fn routes(handler: Arc<ContactHandler>, cors: bool) -> BoxedFilter<(Response,)> {
    let handler_filter = warp::any().map(move || handler.clone());
    let cors_filter = warp::any().map(move || cors);

    let contact_path = warp::path!("api" / "contact")
        .or(warp::path!("contact"))
        .unify();

    // Health check endpoint
    let health = warp::path!("health").and(warp::get()).map(|| {
        warp::reply::json(&ApiResponse {
            success: true,
            message: "ok".to_string(),
            data: None,
        })
        .into_response()
    });

    // Submissions carry a bounded JSON body
    let submit = contact_path
        .clone()
        .and(warp::post())
        .and(warp::method())
        .and(warp::header::headers_cloned())
        .and(warp::addr::remote())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::bytes())
        .and(handler_filter.clone())
        .and(cors_filter.clone())
        .and_then(handle_contact);

    // Every other method is answered without reading the body
    let non_post = warp::method().and_then(|method: Method| async move {
        if method == Method::POST {
            Err(warp::reject::not_found())
        } else {
            Ok::<_, Rejection>(method)
        }
    });
    let other = contact_path
        .and(non_post)
        .and(warp::header::headers_cloned())
        .and(warp::addr::remote())
        .map(|method: Method, headers: HeaderMap, remote: Option<SocketAddr>| {
            (method, headers, remote, Bytes::new())
        })
        .untuple_one()
        .and(handler_filter)
        .and(cors_filter)
        .and_then(handle_contact);

    health
        .or(submit)
        .unify()
        .or(other)
        .unify()
        .recover(handle_rejection)
        .unify()
        .boxed()
}

/// Start the API server
pub(crate) async fn start_api_server(config: Arc<Config>) -> crate::error::Result<()> {
    let handler = Arc::new(ContactHandler::from_config(&config)?);
    let routes = routes(handler, config.cors);

    tracing::info!("Starting API server on port {}", config.port);
    warp::serve(routes).run(([0, 0, 0, 0], config.port)).await;

    Ok(())
}

/// Handle API rejections
async fn handle_rejection(err: Rejection) -> Result<Response, Rejection> {
    let (status, message) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not Found")
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, "Message is too large.")
    } else if err.find::<warp::reject::LengthRequired>().is_some() {
        (StatusCode::LENGTH_REQUIRED, "Content-Length header is required.")
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed.")
    } else {
        tracing::warn!("Unhandled rejection: {:?}", err);
        (StatusCode::BAD_REQUEST, "Bad request")
    };

    Ok(warp::reply::with_status(
        warp::reply::json(&ApiResponse::failure(message)),
        status,
    )
    .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::test_support::log_only_handler;
    use serde_json::json;

    fn api(cors: bool) -> BoxedFilter<(Response,)> {
        routes(Arc::new(log_only_handler()), cors)
    }

    fn parse(response: &warp::http::Response<Bytes>) -> ApiResponse {
        serde_json::from_slice(response.body()).unwrap()
    }

    #[tokio::test]
    async fn test_post_contact_succeeds() {
        let response = warp::test::request()
            .method("POST")
            .path("/api/contact")
            .header("user-agent", "Mozilla/5.0")
            .header("x-forwarded-for", "198.51.100.4, 10.0.0.1")
            .json(&json!({"name": "Ann", "email": "ann@x.com", "subject": "Hi", "message": "Hello"}))
            .reply(&api(true))
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["access-control-allow-origin"], "*");
        let body = parse(&response);
        assert!(body.success);
        assert!(!body.data.unwrap().reference.is_empty());
    }

    #[tokio::test]
    async fn test_post_invalid_email_is_400() {
        let response = warp::test::request()
            .method("POST")
            .path("/contact")
            .json(&json!({"name": "Ann", "email": "not-an-email", "subject": "Hi", "message": "Hello"}))
            .reply(&api(false))
            .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(response.headers().get("access-control-allow-origin").is_none());
        assert_eq!(
            parse(&response),
            ApiResponse::failure("Please provide a valid email address.")
        );
    }

    #[tokio::test]
    async fn test_other_methods_are_405() {
        for method in ["GET", "PUT", "DELETE"] {
            let response = warp::test::request()
                .method(method)
                .path("/api/contact")
                .body(r#"{"name":"Ann","email":"ann@x.com","subject":"Hi","message":"Hello"}"#)
                .reply(&api(true))
                .await;
            assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED, "{method}");
            assert_eq!(
                parse(&response),
                ApiResponse::failure("Method not allowed. Use POST.")
            );
        }
    }

    #[tokio::test]
    async fn test_options_preflight() {
        let response = warp::test::request()
            .method("OPTIONS")
            .path("/api/contact")
            .reply(&api(true))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.body().is_empty());
        assert_eq!(response.headers()["access-control-allow-methods"], "POST, OPTIONS");
    }

    #[tokio::test]
    async fn test_oversized_body_is_rejected() {
        let message = "x".repeat(MAX_BODY_BYTES as usize + 1);
        let response = warp::test::request()
            .method("POST")
            .path("/api/contact")
            .json(&json!({"name": "Ann", "email": "ann@x.com", "subject": "Hi", "message": message}))
            .reply(&api(true))
            .await;
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_health_and_not_found() {
        let response = warp::test::request().path("/health").reply(&api(true)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(parse(&response).success);

        let response = warp::test::request().path("/nope").reply(&api(true)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_wrong_method_on_health_is_neutral_405() {
        let response = warp::test::request()
            .method("POST")
            .path("/health")
            .reply(&api(true))
            .await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(parse(&response), ApiResponse::failure("Method not allowed."));
    }

    #[test]
    fn test_client_ip_precedence() {
        let remote: Option<SocketAddr> = Some("192.0.2.1:5555".parse().unwrap());
        let mut headers = HeaderMap::new();
        assert_eq!(client_ip(&headers, remote).as_deref(), Some("192.0.2.1"));
        assert_eq!(client_ip(&headers, None), None);

        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.9"));
        assert_eq!(client_ip(&headers, remote).as_deref(), Some("198.51.100.9"));

        headers.insert("x-forwarded-for", HeaderValue::from_static(" 203.0.113.5 , 10.0.0.1"));
        assert_eq!(client_ip(&headers, remote).as_deref(), Some("203.0.113.5"));
    }
}
