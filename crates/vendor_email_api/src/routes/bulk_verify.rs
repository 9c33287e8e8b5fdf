//! Bulk verification route handler
//!
//! Vendors are verified concurrently, bounded by `discovery.bulk_concurrency`.
//! Each vendor still probes its own candidates sequentially, so one mail
//! server never sees parallel connections from a single vendor check.

use crate::{
    api_handler::{
        convert_verification_result, vendor_from_request, ApiError, ApiResult, BulkVerifyRequest,
        BulkVerifyResponse, VendorResult,
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
use tracing::{debug, info, instrument, warn};
use vendor_email_core::Vendor;

/// POST /v1/vendor-email/verify-bulk
///
/// Body: `{ "vendors": [{ "name": "...", "website": "..." }, ...] }`
#[instrument(skip_all, fields(request_id = %request_id.0, vendors))]
pub async fn verify_bulk_handler(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    payload: Result<Json<BulkVerifyRequest>, JsonRejection>,
) -> ApiResult<BulkVerifyResponse> {
    let Json(request) = payload?;
    tracing::Span::current().record("vendors", request.vendors.len());

    let limits = &state.config.discovery;

    if request.vendors.is_empty() {
        warn!("Empty bulk request");
        return Err(ApiError::InvalidRequest("At least one vendor is required".to_string()));
    }

    if request.vendors.len() > limits.max_bulk_vendors {
        warn!("Bulk request too large: {} vendors", request.vendors.len());
        return Err(ApiError::InvalidRequest(format!(
            "Too many vendors (max {} per request)",
            limits.max_bulk_vendors
        )));
    }

    let vendors = request
        .vendors
        .into_iter()
        .map(vendor_from_request)
        .collect::<Result<Vec<Vendor>, ApiError>>()?;

    info!("Verifying {} vendors", vendors.len());
    let start_time = std::time::Instant::now();

    let results: Vec<VendorResult> = state
        .discovery
        .verify_many(&vendors, limits.bulk_concurrency)
        .await
        .into_iter()
        .map(convert_verification_result)
        .collect();

    debug!("Bulk verification completed in {:?}", start_time.elapsed());

    let verified_count = results.iter().filter(|result| result.verified).count();
    info!("Bulk verification completed: {}/{} verified", verified_count, results.len());

    Ok(Json(BulkVerifyResponse {
        request_id: request_id.0,
        results,
        verified_count,
    }))
}
