//! Single-vendor verification route handler

use crate::{
    api_handler::{
        convert_verification_result, vendor_from_request, ApiResult, VerifyRequest, VerifyResponse,
    },
    middleware::RequestId,
    AppState,
};
use axum::{
    extract::{rejection::JsonRejection, State},
    response::Json,
    Extension,
};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// POST /v1/vendor-email/verify
///
/// Body: `{ "name": "...", "website": "..." | null }`
///
/// Looks up the mail exchanger for the vendor's website domain and probes
/// the common role mailboxes one at a time. Returns the first address the
/// exchanger accepts, or `email: null`.
///
/// # Performance
/// A vendor without MX records answers within the DNS timeout. A vendor
/// whose exchanger rejects everything can take up to
/// `max_candidates * per_candidate_timeout` plus the delays between attempts.
#[instrument(skip_all, fields(request_id = %request_id.0, vendor))]
pub async fn verify_vendor_handler(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    payload: Result<Json<VerifyRequest>, JsonRejection>,
) -> ApiResult<VerifyResponse> {
    let Json(request) = payload?;
    tracing::Span::current().record("vendor", request.name.as_str());

    info!("Verifying vendor contact email");

    let start_time = std::time::Instant::now();

    let vendor = vendor_from_request(request)?;
    let result = state.discovery.verify(&vendor).await;

    debug!("Verification completed in {:?}", start_time.elapsed());

    let response = VerifyResponse {
        request_id: request_id.0,
        result: convert_verification_result(result),
    };

    info!(
        "Vendor verification completed: domain={:?}, verified={}, candidates_tried={}",
        response.result.domain, response.result.verified, response.result.candidates_tried
    );

    Ok(Json(response))
}
