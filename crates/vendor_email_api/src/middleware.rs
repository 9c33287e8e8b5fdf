//! Middleware for request limits, security headers, and request correlation

use crate::{api_handler::ApiError, AppState};
use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::{error, warn};
use uuid::Uuid;

/// Correlation ID of the request being served
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Request correlation middleware
///
/// Resolves the request ID once, hands it to handlers as a `RequestId`
/// extension and echoes it in the `x-request-id` response header. Any
/// `ApiError` raised below this layer is re-rendered with that ID.
pub async fn request_context(mut request: Request, next: Next) -> Response {
    let request_id = extract_or_generate_request_id(request.headers());
    request.extensions_mut().insert(RequestId(request_id.clone()));

    let mut response = next.run(request).await;

    if let Some(api_error) = response.extensions_mut().remove::<ApiError>() {
        if response.status().is_server_error() {
            error!("Server error for request {}: {:?}", request_id, api_error);
        } else {
            warn!("Client error for request {}: {:?}", request_id, api_error);
        }
        response = api_error.into_response_with_id(request_id.clone());
    }

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert("x-request-id", value);
    }

    response
}

/// Request ID extraction and generation
///
/// Extracts request ID from headers or generates a new one.
/// Useful for distributed tracing and request correlation.
pub fn extract_or_generate_request_id(headers: &HeaderMap) -> String {
    for header in ["x-trace-id", "x-request-id"] {
        if let Some(id) = headers.get(header).and_then(|value| value.to_str().ok()) {
            if !id.trim().is_empty() {
                return id.to_string();
            }
        }
    }

    Uuid::new_v4().to_string()
}

/// Security headers middleware
///
/// Adds security-related headers to all responses.
pub async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;

    let headers = response.headers_mut();
    headers.insert("x-content-type-options", HeaderValue::from_static("nosniff"));
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert(
        "referrer-policy",
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
    headers.insert("x-api-version", HeaderValue::from_static(env!("CARGO_PKG_VERSION")));

    response
}

/// Request size limiter middleware
///
/// Rejects requests whose declared content length exceeds the configured
/// limit before the body is read.
pub async fn request_size_limiter(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let max_body_size = state.config.security.max_body_size_bytes;

    let declared_length = request
        .headers()
        .get("content-length")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<usize>().ok());

    if let Some(length) = declared_length {
        if length > max_body_size {
            warn!("Request body too large: {} bytes (limit {})", length, max_body_size);
            return ApiError::RequestTooLarge.into_response();
        }
    }

    next.run(request).await
}
