//! Staff endpoints.

use axum::{
    Json, Router,
    extract::{Multipart, Path, Query, State},
    response::IntoResponse,
    routing::{delete, get, post},
};
use docreq_common::AppResult;
use docreq_core::{
    DashboardStats, DigitalDocumentInput, ListRequestsQuery, ListStudentsQuery, PickupInput,
    RejectRequestInput, RequestPage, RequestView, ShipRequestInput, StudentDetail, StudentPage,
    StudentView, UpdateStatusInput, UpdateStudentInput, VerifyPaymentInput,
};

use crate::{
    extractors::StaffActor,
    middleware::AppState,
    multipart::FormData,
    response::{self, ApiResponse},
};

/// Filtered, paginated listing of every request.
async fn list(
    StaffActor(actor): StaffActor,
    State(state): State<AppState>,
    Query(query): Query<ListRequestsQuery>,
) -> AppResult<ApiResponse<RequestPage>> {
    let page = state.request_service.list(&actor, query).await?;
    Ok(ApiResponse::ok(page))
}

/// Dashboard counters.
async fn stats(
    StaffActor(actor): StaffActor,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<DashboardStats>> {
    let stats = state.request_service.stats(&actor).await?;
    Ok(ApiResponse::ok(stats))
}

/// Approve or reject a payment slip.
async fn verify_payment(
    StaffActor(actor): StaffActor,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<VerifyPaymentInput>,
) -> AppResult<ApiResponse<RequestView>> {
    let service = &state.request_service;
    let outcome = service.verify_payment(&actor, id, input).await?;
    Ok(ApiResponse::from_outcome(outcome, |r| {
        RequestView::new(r, service.calendar())
    }))
}

/// Move a request to another status.
async fn update_status(
    StaffActor(actor): StaffActor,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<UpdateStatusInput>,
) -> AppResult<ApiResponse<RequestView>> {
    let service = &state.request_service;
    let outcome = service.update_status(&actor, id, input).await?;
    Ok(ApiResponse::from_outcome(outcome, |r| {
        RequestView::new(r, service.calendar())
    }))
}

/// Reject a request.
async fn reject(
    StaffActor(actor): StaffActor,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<RejectRequestInput>,
) -> AppResult<ApiResponse<RequestView>> {
    let service = &state.request_service;
    let outcome = service.reject(&actor, id, input).await?;
    Ok(ApiResponse::from_outcome(outcome, |r| {
        RequestView::new(r, service.calendar())
    }))
}

/// Record shipment.
async fn ship(
    StaffActor(actor): StaffActor,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<ShipRequestInput>,
) -> AppResult<ApiResponse<RequestView>> {
    let service = &state.request_service;
    let outcome = service.ship(&actor, id, input).await?;
    Ok(ApiResponse::from_outcome(outcome, |r| {
        RequestView::new(r, service.calendar())
    }))
}

/// Record pickup at the counter.
async fn pickup(
    StaffActor(actor): StaffActor,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<PickupInput>,
) -> AppResult<ApiResponse<RequestView>> {
    let service = &state.request_service;
    let outcome = service.mark_picked_up(&actor, id, input).await?;
    Ok(ApiResponse::from_outcome(outcome, |r| {
        RequestView::new(r, service.calendar())
    }))
}

/// Email the finished document and complete the request.
///
/// Multipart fields: optional `notes` and the `document` file.
async fn digital_document(
    StaffActor(actor): StaffActor,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    multipart: Multipart,
) -> AppResult<ApiResponse<RequestView>> {
    let mut form = FormData::read(multipart).await?;
    let input = DigitalDocumentInput {
        notes: form.text("notes"),
    };
    let document = form.take_file("document");

    let service = &state.request_service;
    let outcome = service
        .send_digital_document(&actor, id, input, document)
        .await?;
    Ok(ApiResponse::from_outcome(outcome, |r| {
        RequestView::new(r, service.calendar())
    }))
}

/// Delete an attachment.
async fn delete_attachment(
    StaffActor(actor): StaffActor,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    state.request_service.delete_attachment(&actor, id).await?;
    Ok(response::ok())
}

/// Search students.
async fn list_students(
    StaffActor(actor): StaffActor,
    State(state): State<AppState>,
    Query(query): Query<ListStudentsQuery>,
) -> AppResult<ApiResponse<StudentPage>> {
    let page = state.student_service.list(&actor, query).await?;
    Ok(ApiResponse::ok(page))
}

/// A student and their requests.
async fn show_student(
    StaffActor(actor): StaffActor,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<ApiResponse<StudentDetail>> {
    let detail = state.student_service.detail(&actor, id).await?;
    Ok(ApiResponse::ok(detail))
}

/// Correct a student's profile.
async fn update_student(
    StaffActor(actor): StaffActor,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<UpdateStudentInput>,
) -> AppResult<ApiResponse<StudentView>> {
    let student = state.student_service.update(&actor, id, input).await?;
    Ok(ApiResponse::ok(student))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/requests", get(list))
        .route("/requests/stats", get(stats))
        .route("/requests/{id}/verify-payment", post(verify_payment))
        .route("/requests/{id}/status", post(update_status))
        .route("/requests/{id}/reject", post(reject))
        .route("/requests/{id}/ship", post(ship))
        .route("/requests/{id}/pickup", post(pickup))
        .route("/requests/{id}/digital-document", post(digital_document))
        .route("/attachments/{id}", delete(delete_attachment))
        .route("/students", get(list_students))
        .route("/students/{id}", get(show_student).put(update_student))
}
