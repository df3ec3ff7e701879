//! Fee preview endpoint.

use axum::{Json, Router, routing::post};
use docreq_common::AppResult;
use docreq_core::{FeeBreakdown, calculate_fees};
use docreq_db::entities::document_request::{DeliveryMethod, DocumentType};
use serde::Deserialize;

use crate::{middleware::AppState, response::ApiResponse};

/// Fee preview request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculateFeesRequest {
    pub document_type: DocumentType,
    pub copies: i32,
    pub delivery_method: DeliveryMethod,
}

/// Price a request before submitting it.
async fn calculate(Json(req): Json<CalculateFeesRequest>) -> AppResult<ApiResponse<FeeBreakdown>> {
    let fees = calculate_fees(req.document_type, req.copies, req.delivery_method)?;
    Ok(ApiResponse::ok(fees))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/calculate", post(calculate))
}
