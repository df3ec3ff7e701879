//! Student-facing request endpoints.

use axum::{
    Json, Router,
    extract::{Multipart, Path, State},
    routing::{get, post},
};
use docreq_common::AppResult;
use docreq_core::{
    CancelRequestInput, PostalAddress, RequestDetail, RequestView, SubmitPaymentInput,
    SubmitRequestInput,
};

use crate::{
    extractors::AuthActor, middleware::AppState, multipart::FormData, response::ApiResponse,
};

/// Submit a new request.
///
/// Multipart fields: `documentType`, `copies`, `purpose`, `deliveryMethod`,
/// and for postal delivery `addressLine1`, `addressLine2`, `district`,
/// `province`, `postalCode`. Supporting files go under `documents`.
async fn submit(
    AuthActor(actor): AuthActor,
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<ApiResponse<RequestView>> {
    let mut form = FormData::read(multipart).await?;

    let address = match form.text("addressLine1") {
        Some(line1) => Some(PostalAddress {
            line1,
            line2: form.text("addressLine2"),
            district: form.text("district").unwrap_or_default(),
            province: form.text("province").unwrap_or_default(),
            postal_code: form.text("postalCode").unwrap_or_default(),
        }),
        None => None,
    };

    let input = SubmitRequestInput {
        document_type: form.value("documentType")?,
        copies: form.parse("copies")?,
        purpose: form.required("purpose")?,
        delivery_method: form.value("deliveryMethod")?,
        address,
    };
    let documents = form.take_files("documents");

    let service = &state.request_service;
    let outcome = service.submit(&actor, input, documents).await?;
    Ok(ApiResponse::from_outcome(outcome, |r| RequestView::new(r, service.calendar())).into_created())
}

/// List the caller's requests.
async fn list_own(
    AuthActor(actor): AuthActor,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<Vec<RequestView>>> {
    let requests = state.request_service.list_own(&actor).await?;
    Ok(ApiResponse::ok(requests))
}

/// Get a request with its history, attachments and payments.
async fn show(
    AuthActor(actor): AuthActor,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<ApiResponse<RequestDetail>> {
    let detail = state.request_service.detail(&actor, id).await?;
    Ok(ApiResponse::ok(detail))
}

/// Get a request by its reference.
async fn show_by_reference(
    AuthActor(actor): AuthActor,
    State(state): State<AppState>,
    Path(reference): Path<String>,
) -> AppResult<ApiResponse<RequestDetail>> {
    let detail = state
        .request_service
        .detail_by_reference(&actor, &reference)
        .await?;
    Ok(ApiResponse::ok(detail))
}

/// Submit a payment slip.
///
/// Multipart fields: `paymentMethod`, `paymentReference`, `paymentDate`
/// (`YYYY-MM-DD`), `amount`, and the `slip` file.
async fn submit_payment(
    AuthActor(actor): AuthActor,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    multipart: Multipart,
) -> AppResult<ApiResponse<RequestView>> {
    let mut form = FormData::read(multipart).await?;

    let input = SubmitPaymentInput {
        payment_method: form.value("paymentMethod")?,
        payment_reference: form.required("paymentReference")?,
        payment_date: form.parse("paymentDate")?,
        amount: form.parse("amount")?,
    };
    let slip = form.take_file("slip");

    let service = &state.request_service;
    let outcome = service.submit_payment(&actor, id, input, slip).await?;
    Ok(ApiResponse::from_outcome(outcome, |r| {
        RequestView::new(r, service.calendar())
    }))
}

/// Cancel a request.
async fn cancel(
    AuthActor(actor): AuthActor,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<CancelRequestInput>,
) -> AppResult<ApiResponse<RequestView>> {
    let service = &state.request_service;
    let outcome = service.cancel(&actor, id, input).await?;
    Ok(ApiResponse::from_outcome(outcome, |r| {
        RequestView::new(r, service.calendar())
    }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(submit).get(list_own))
        .route("/{id}", get(show))
        .route("/reference/{reference}", get(show_by_reference))
        .route("/{id}/payment", post(submit_payment))
        .route("/{id}/cancel", post(cancel))
}
