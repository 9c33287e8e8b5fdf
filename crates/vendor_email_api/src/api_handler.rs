//! Shared API types and utilities
//!
//! This module contains common types, error handling, and conversion utilities
//! used across all API endpoints.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::SystemTime;
use uuid::Uuid;
use vendor_email_core::{DiscoveryError, Vendor, VerificationResult};

/// Longest vendor name accepted
pub const MAX_NAME_LENGTH: usize = 256;

/// Longest website URL accepted
pub const MAX_WEBSITE_LENGTH: usize = 2048;

/// Request body for single-vendor verification
#[derive(Debug, Clone, Deserialize)]
pub struct VerifyRequest {
    /// Business name
    pub name: String,
    /// Business website, if known
    #[serde(default)]
    pub website: Option<String>,
}

/// Request body for bulk verification
#[derive(Debug, Deserialize)]
pub struct BulkVerifyRequest {
    pub vendors: Vec<VerifyRequest>,
}

/// Verification outcome for one vendor
#[derive(Debug, Serialize)]
pub struct VendorResult {
    /// Vendor name as submitted
    pub name: String,
    /// Domain extracted from the website
    pub domain: Option<String>,
    /// Verified contact address
    pub email: Option<String>,
    /// Whether a mail exchanger accepted `email`
    pub verified: bool,
    /// Number of SMTP probes attempted
    pub candidates_tried: usize,
    /// Timestamp when verification finished (ISO 8601)
    pub checked_at: String,
}

/// API response for single-vendor verification
#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    /// Request ID for tracking
    pub request_id: String,
    #[serde(flatten)]
    pub result: VendorResult,
}

/// API response for bulk verification
#[derive(Debug, Serialize)]
pub struct BulkVerifyResponse {
    /// Request ID for tracking
    pub request_id: String,
    /// One entry per submitted vendor, in submission order
    pub results: Vec<VendorResult>,
    /// Number of vendors with a verified address
    pub verified_count: usize,
}

/// Error response structure
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
    pub request_id: String,
    pub timestamp: String,
    pub details: Option<HashMap<String, String>>,
}

/// Result type for API handlers
pub type ApiResult<T> = Result<Json<T>, ApiError>;

/// API error types
///
/// Rendered as an `ErrorResponse`. The response also carries the error as an
/// extension so `request_context` can re-render it with the request's ID.
#[derive(Debug, Clone)]
pub enum ApiError {
    InvalidRequest(String),
    RequestTooLarge,
    InternalError(String),
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            ApiError::InvalidRequest(msg) => {
                (StatusCode::BAD_REQUEST, "INVALID_REQUEST", msg.clone())
            }
            ApiError::RequestTooLarge => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "REQUEST_TOO_LARGE",
                "Request body too large".to_string(),
            ),
            ApiError::InternalError(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg.clone())
            }
        }
    }

    /// Render the JSON error body for a known request ID
    pub fn into_response_with_id(self, request_id: String) -> Response {
        let (status, error_code, message) = self.parts();

        let error_response = ErrorResponse {
            error: message,
            error_code: error_code.to_string(),
            request_id,
            timestamp: chrono::Utc::now().to_rfc3339(),
            details: None,
        };

        (status, Json(error_response)).into_response()
    }
}

impl From<DiscoveryError> for ApiError {
    fn from(err: DiscoveryError) -> Self {
        ApiError::InternalError(err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::RequestTooLarge
        } else {
            ApiError::InvalidRequest(rejection.body_text())
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = self.clone().into_response_with_id(Uuid::new_v4().to_string());
        response.extensions_mut().insert(self);
        response
    }
}

/// Check request limits and turn the request into a core vendor
///
/// A missing or blank website is not an error; the vendor simply cannot be
/// verified.
pub fn vendor_from_request(request: VerifyRequest) -> Result<Vendor, ApiError> {
    let name = request.name.trim();

    if name.is_empty() {
        return Err(ApiError::InvalidRequest("Vendor name cannot be empty".to_string()));
    }

    if name.len() > MAX_NAME_LENGTH {
        return Err(ApiError::InvalidRequest(format!(
            "Vendor name too long (max {} characters)",
            MAX_NAME_LENGTH
        )));
    }

    if let Some(website) = &request.website {
        if website.len() > MAX_WEBSITE_LENGTH {
            return Err(ApiError::InvalidRequest(format!(
                "Website too long (max {} characters)",
                MAX_WEBSITE_LENGTH
            )));
        }
    }

    Ok(Vendor {
        name: name.to_string(),
        website: request.website,
    })
}

/// Format a timestamp as ISO 8601
pub fn format_timestamp(time: SystemTime) -> String {
    chrono::DateTime::<chrono::Utc>::from(time).to_rfc3339()
}

/// Convert a core VerificationResult to its API shape
pub fn convert_verification_result(result: VerificationResult) -> VendorResult {
    VendorResult {
        name: result.vendor_name,
        domain: result.domain,
        email: result.email,
        verified: result.verified,
        candidates_tried: result.candidates_tried,
        checked_at: format_timestamp(result.checked_at),
    }
}
