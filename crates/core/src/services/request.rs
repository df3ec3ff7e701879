//! Document request service.
//!
//! Every operation follows the same order: access check, input validation,
//! lifecycle transition, one guarded store write, then notification. Nothing
//! is written when any step before the store write fails, and a failed
//! notification only produces a warning.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use docreq_common::{
    AppError, AppResult, Config, IdGenerator, StorageBackend, UploadPolicy, UploadedFile,
    store_upload,
};
use docreq_db::{
    entities::{
        document_request::{self, DeliveryMethod, DocumentType, PaymentStatus, RequestStatus},
        payment_history::{self, PaymentMethod, PaymentRecordStatus},
        request_attachment::{self, AttachmentType},
        student,
    },
    repositories::{
        AppliedChange, AttachmentRepository, DeliveryUpdate, PaymentRepository, PaymentUpdate,
        PaymentWrite, RequestFilter, RequestRepository, StatusChange, StudentRepository,
    },
};
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use super::access::{Actor, ActorKind, ensure_can_mutate, ensure_can_view, ensure_kind};
use super::fees::calculate_fees;
use super::lifecycle::{Action, transition};
use super::notification::{
    DigitalDocument, Dispatcher, NewRequestAlert, RequestConfirmation, StatusUpdate,
};
use super::presentation::{
    AttachmentView, HistoryView, PaymentView, RequestDetail, RequestView, StudentView,
    delivery_method_label, document_type_label, status_label, thai_date,
};
use super::processing::ProcessingCalendar;

/// Attempts at finding an unused reference before giving up.
const MAX_REFERENCE_ATTEMPTS: usize = 10;

const NOTE_CREATED: &str = "คำขอถูกสร้างขึ้น";
const NOTE_PAYMENT_SUBMITTED: &str = "รอการตรวจสอบการชำระเงิน";
const NOTE_PAYMENT_APPROVED: &str = "การชำระเงินถูกต้อง กำลังดำเนินการจัดทำเอกสาร";
const NOTE_PAYMENT_REJECTED: &str = "การชำระเงินไม่ถูกต้อง กรุณาชำระใหม่";
const NOTE_SHIPPED: &str = "จัดส่งเอกสารแล้ว หมายเลขพัสดุ:";
const NOTE_PICKED_UP: &str = "รับเอกสารแล้ว โดย:";
const NOTE_DIGITAL_SENT: &str = "ส่งเอกสารดิจิทัลทางอีเมลแล้ว";
const NOTE_CANCELLED: &str = "ยกเลิกโดยนักศึกษา";

/// A file received with a request.
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub original_name: String,
    pub data: Vec<u8>,
}

/// Result of a mutation plus an optional notification warning.
#[derive(Debug, Clone)]
pub struct Outcome<T> {
    pub value: T,
    /// Set when the state change committed but the notification failed.
    pub warning: Option<String>,
}

/// Postal delivery address.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PostalAddress {
    #[validate(length(min = 1, max = 255))]
    pub line1: String,
    #[validate(length(max = 255))]
    pub line2: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub district: String,
    #[validate(length(min = 1, max = 100))]
    pub province: String,
    #[validate(custom(function = "validate_postal_code"))]
    pub postal_code: String,
}

impl PostalAddress {
    /// Single-line form stored on the request.
    #[must_use]
    pub fn format(&self) -> String {
        let mut parts = vec![self.line1.trim()];
        if let Some(line2) = self.line2.as_deref().map(str::trim).filter(|l| !l.is_empty()) {
            parts.push(line2);
        }
        parts.push(self.district.trim());
        parts.push(self.province.trim());
        parts.push(self.postal_code.trim());
        parts.join(" ")
    }
}

fn validate_postal_code(code: &str) -> Result<(), ValidationError> {
    if code.len() == 5 && code.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(ValidationError::new("postal_code"))
    }
}

/// Input for submitting a request.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequestInput {
    pub document_type: DocumentType,
    #[validate(range(min = 1, max = 10))]
    pub copies: i32,
    #[validate(length(min = 1, max = 1000))]
    pub purpose: String,
    pub delivery_method: DeliveryMethod,
    #[validate(nested)]
    pub address: Option<PostalAddress>,
}

/// Input for submitting a payment slip.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubmitPaymentInput {
    pub payment_method: PaymentMethod,
    #[validate(length(min = 1, max = 128))]
    pub payment_reference: String,
    pub payment_date: NaiveDate,
    pub amount: i64,
}

/// Staff decision on a payment slip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentDecision {
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPaymentInput {
    pub decision: PaymentDecision,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusInput {
    pub status: RequestStatus,
    #[validate(length(min = 1, max = 1000))]
    pub notes: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RejectRequestInput {
    #[validate(length(min = 1, max = 1000))]
    pub reason: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ShipRequestInput {
    #[validate(length(min = 1, max = 64))]
    pub tracking_number: String,
    /// Defaults to today.
    pub delivery_date: Option<NaiveDate>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PickupInput {
    #[validate(length(min = 1, max = 255))]
    pub receiver_name: String,
    #[validate(length(min = 1, max = 32))]
    pub receiver_id_card: String,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct DigitalDocumentInput {
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CancelRequestInput {
    #[validate(length(max = 1000))]
    pub reason: Option<String>,
}

/// Staff listing filters. Dates are local calendar days, both inclusive.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListRequestsQuery {
    pub status: Option<RequestStatus>,
    pub document_type: Option<DocumentType>,
    pub payment_status: Option<PaymentStatus>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub search: Option<String>,
    /// 1-indexed.
    pub page: Option<u64>,
}

/// A request row of the staff listing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListedRequest {
    #[serde(flatten)]
    pub request: RequestView,
    pub student: Option<StudentView>,
}

/// One page of the staff listing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestPage {
    pub items: Vec<ListedRequest>,
    pub total: u64,
    pub page: u64,
    pub page_size: u64,
    pub total_pages: u64,
}

/// Staff dashboard counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub today: u64,
    pub pending: u64,
    pub awaiting_verification: u64,
    pub processing: u64,
    pub ready_for_pickup: u64,
    pub completed: u64,
}

/// Tunables of the request service.
#[derive(Debug, Clone)]
pub struct RequestSettings {
    pub upload_policy: UploadPolicy,
    pub calendar: ProcessingCalendar,
    pub staff_recipients: Vec<String>,
    pub page_size: u64,
}

impl Default for RequestSettings {
    fn default() -> Self {
        Self {
            upload_policy: UploadPolicy::default(),
            calendar: ProcessingCalendar::default(),
            staff_recipients: Vec::new(),
            page_size: 20,
        }
    }
}

impl RequestSettings {
    pub fn from_config(config: &Config) -> AppResult<Self> {
        Ok(Self {
            upload_policy: UploadPolicy::from_config(&config.storage),
            calendar: ProcessingCalendar::from_config(&config.processing)?,
            staff_recipients: config.email.staff_recipients.clone(),
            page_size: config.processing.page_size.max(1),
        })
    }
}

/// Service for document requests.
#[derive(Clone)]
pub struct RequestService {
    request_repo: RequestRepository,
    student_repo: StudentRepository,
    payment_repo: PaymentRepository,
    attachment_repo: AttachmentRepository,
    storage: Arc<dyn StorageBackend>,
    dispatcher: Dispatcher,
    settings: RequestSettings,
    id_gen: IdGenerator,
}

impl RequestService {
    #[must_use]
    pub fn new(
        request_repo: RequestRepository,
        student_repo: StudentRepository,
        payment_repo: PaymentRepository,
        attachment_repo: AttachmentRepository,
        storage: Arc<dyn StorageBackend>,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            request_repo,
            student_repo,
            payment_repo,
            attachment_repo,
            storage,
            dispatcher,
            settings: RequestSettings::default(),
            id_gen: IdGenerator::new(),
        }
    }

    #[must_use]
    pub fn with_settings(mut self, settings: RequestSettings) -> Self {
        self.settings = settings;
        self
    }

    #[must_use]
    pub const fn calendar(&self) -> &ProcessingCalendar {
        &self.settings.calendar
    }

    // ==================== Student operations ====================

    /// Submit a new request.
    pub async fn submit(
        &self,
        actor: &Actor,
        input: SubmitRequestInput,
        documents: Vec<FileUpload>,
    ) -> AppResult<Outcome<document_request::Model>> {
        ensure_kind(actor, ActorKind::Student)?;
        input
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        if input.purpose.trim().is_empty() {
            return Err(AppError::Validation("purpose is required".to_string()));
        }

        let delivery_address = match (input.delivery_method, &input.address) {
            (DeliveryMethod::Postal, Some(address)) => Some(address.format()),
            (DeliveryMethod::Postal, None) => {
                return Err(AppError::Validation(
                    "A delivery address is required for postal delivery".to_string(),
                ));
            }
            _ => None,
        };

        let fees = calculate_fees(input.document_type, input.copies, input.delivery_method)?;
        for document in &documents {
            self.settings
                .upload_policy
                .check(&document.original_name, document.data.len() as u64)?;
        }

        let student = self.student_repo.get_by_id(actor.id).await?;
        let reference = self.unique_reference().await?;

        let stored = self.store_all(&documents).await?;
        let attachments = stored
            .iter()
            .map(|file| attachment_model(file, AttachmentType::SupportingDocument))
            .collect();

        let now = Utc::now();
        let model = document_request::ActiveModel {
            student_id: Set(student.id),
            reference: Set(reference),
            document_type: Set(input.document_type),
            copies: Set(input.copies),
            purpose: Set(input.purpose.trim().to_string()),
            delivery_method: Set(input.delivery_method),
            delivery_address: Set(delivery_address),
            document_fee: Set(fees.total_document_fee),
            shipping_fee: Set(fees.delivery_fee),
            total_fee: Set(fees.total_fee),
            payment_status: Set(if fees.total_fee > 0 {
                PaymentStatus::Pending
            } else {
                PaymentStatus::NotRequired
            }),
            status: Set(RequestStatus::Pending),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        };

        let request = match self
            .request_repo
            .create(
                model,
                Some(NOTE_CREATED.to_string()),
                actor.history_actor(),
                attachments,
            )
            .await
        {
            Ok(request) => request,
            Err(e) => {
                self.discard_uploads(&stored).await;
                return Err(e);
            }
        };

        let warning = self.notify_submission(&request, &student).await;
        Ok(Outcome {
            value: request,
            warning,
        })
    }

    /// Requests of the calling student, newest first.
    pub async fn list_own(&self, actor: &Actor) -> AppResult<Vec<RequestView>> {
        ensure_kind(actor, ActorKind::Student)?;
        let requests = self.request_repo.find_by_student(actor.id).await?;
        Ok(requests
            .into_iter()
            .map(|r| RequestView::new(r, &self.settings.calendar))
            .collect())
    }

    /// Submit a payment slip for a request.
    pub async fn submit_payment(
        &self,
        actor: &Actor,
        request_id: i64,
        input: SubmitPaymentInput,
        slip: Option<FileUpload>,
    ) -> AppResult<Outcome<document_request::Model>> {
        ensure_kind(actor, ActorKind::Student)?;
        let request = self.request_repo.get_by_id(request_id).await?;
        ensure_can_mutate(actor, &request)?;

        let next = transition(request.status, Action::SubmitPayment)?;
        if !matches!(
            request.payment_status,
            PaymentStatus::Pending | PaymentStatus::Rejected
        ) {
            return Err(AppError::InvalidTransition(format!(
                "Request {} does not accept a payment in payment state {:?}",
                request.reference, request.payment_status
            )));
        }

        input
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;
        if input.amount != request.total_fee {
            return Err(AppError::Validation(format!(
                "Payment amount {} does not match the fee of {}",
                input.amount, request.total_fee
            )));
        }
        if input.payment_date > self.settings.calendar.today() {
            return Err(AppError::Validation(
                "Payment date cannot be in the future".to_string(),
            ));
        }
        let slip = slip.ok_or_else(|| {
            AppError::Validation("A payment slip file is required".to_string())
        })?;
        self.settings
            .upload_policy
            .check(&slip.original_name, slip.data.len() as u64)?;

        if self
            .payment_repo
            .find_pending_by_request(request.id)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict(format!(
                "Request {} already has a payment awaiting verification",
                request.reference
            )));
        }

        let stored = self.store_one(&slip).await?;
        let payment = payment_history::ActiveModel {
            amount: Set(input.amount),
            payment_method: Set(input.payment_method),
            payment_reference: Set(input.payment_reference.clone()),
            payment_date: Set(input.payment_date),
            payment_status: Set(PaymentRecordStatus::PendingVerification),
            created_at: Set(Utc::now().into()),
            ..Default::default()
        };

        let change = StatusChange::new(request.id, request.status, next, actor.history_actor())
            .with_notes(NOTE_PAYMENT_SUBMITTED)
            .with_attachment(attachment_model(&stored, AttachmentType::PaymentSlip));
        let update = PaymentUpdate {
            status: PaymentStatus::PendingVerification,
            method: Some(input.payment_method),
            reference: Some(input.payment_reference),
            date: Some(input.payment_date),
            write: Some(PaymentWrite::Record(payment)),
        };

        let applied = match self.request_repo.update_payment(change, update).await {
            Ok(applied) => applied,
            Err(e) => {
                self.discard_uploads(std::slice::from_ref(&stored)).await;
                return Err(e);
            }
        };

        Ok(self.finish(applied, request.status, None).await)
    }

    /// Cancel a request on behalf of its student.
    pub async fn cancel(
        &self,
        actor: &Actor,
        request_id: i64,
        input: CancelRequestInput,
    ) -> AppResult<Outcome<document_request::Model>> {
        ensure_kind(actor, ActorKind::Student)?;
        let request = self.request_repo.get_by_id(request_id).await?;
        ensure_can_mutate(actor, &request)?;
        transition(request.status, Action::Cancel)?;
        input
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        let note = match input.reason.as_deref().map(str::trim) {
            Some(reason) if !reason.is_empty() => format!("{NOTE_CANCELLED}: {reason}"),
            _ => NOTE_CANCELLED.to_string(),
        };

        let applied = self
            .request_repo
            .cancel(request.id, request.status, actor.id, Some(note.clone()))
            .await?;

        Ok(self.finish(applied, request.status, Some(note)).await)
    }

    // ==================== Shared reads ====================

    /// Full detail of a request.
    pub async fn detail(&self, actor: &Actor, request_id: i64) -> AppResult<RequestDetail> {
        let request = self.request_repo.get_by_id(request_id).await?;
        ensure_can_view(actor, &request)?;
        self.assemble_detail(request).await
    }

    /// Full detail of a request looked up by reference.
    pub async fn detail_by_reference(
        &self,
        actor: &Actor,
        reference: &str,
    ) -> AppResult<RequestDetail> {
        let request = self
            .request_repo
            .find_by_reference(reference.trim())
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Request {reference} not found")))?;
        ensure_can_view(actor, &request)?;
        self.assemble_detail(request).await
    }

    // ==================== Staff operations ====================

    /// Filtered, paginated listing.
    pub async fn list(&self, actor: &Actor, query: ListRequestsQuery) -> AppResult<RequestPage> {
        ensure_kind(actor, ActorKind::Staff)?;

        let (created_from, created_before) = self
            .settings
            .calendar
            .day_range(query.date_from, query.date_to)?;
        let filter = RequestFilter {
            status: query.status,
            document_type: query.document_type,
            payment_status: query.payment_status,
            created_from,
            created_before,
            search: query.search,
        };

        let page_size = self.settings.page_size;
        let page = query.page.unwrap_or(1).max(1);
        let total = self.request_repo.count(&filter).await?;
        let requests = self
            .request_repo
            .find_all(&filter, page_size, (page - 1) * page_size)
            .await?;

        let student_ids: Vec<i64> = requests.iter().map(|r| r.student_id).collect();
        let students = self.student_repo.find_by_ids(&student_ids).await?;

        let items = requests
            .into_iter()
            .map(|request| {
                let student = students
                    .iter()
                    .find(|s| s.id == request.student_id)
                    .cloned()
                    .map(StudentView::from);
                ListedRequest {
                    request: RequestView::new(request, &self.settings.calendar),
                    student,
                }
            })
            .collect();

        Ok(RequestPage {
            items,
            total,
            page,
            page_size,
            total_pages: total.div_ceil(page_size),
        })
    }

    /// Dashboard counters.
    pub async fn stats(&self, actor: &Actor) -> AppResult<DashboardStats> {
        ensure_kind(actor, ActorKind::Staff)?;

        let today = self.settings.calendar.today();
        let (created_from, created_before) =
            self.settings.calendar.day_range(Some(today), Some(today))?;
        let today_filter = RequestFilter {
            created_from,
            created_before,
            ..Default::default()
        };

        Ok(DashboardStats {
            today: self.request_repo.count(&today_filter).await?,
            pending: self.count_status(RequestStatus::Pending).await?,
            awaiting_verification: self
                .count_status(RequestStatus::AwaitingVerification)
                .await?,
            processing: self.count_status(RequestStatus::Processing).await?,
            ready_for_pickup: self.count_status(RequestStatus::ReadyForPickup).await?,
            completed: self.count_status(RequestStatus::Completed).await?,
        })
    }

    /// Approve or reject the payment awaiting verification.
    pub async fn verify_payment(
        &self,
        actor: &Actor,
        request_id: i64,
        input: VerifyPaymentInput,
    ) -> AppResult<Outcome<document_request::Model>> {
        ensure_kind(actor, ActorKind::Staff)?;
        input
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;
        let request = self.request_repo.get_by_id(request_id).await?;

        let action = match input.decision {
            PaymentDecision::Approved => Action::ApprovePayment,
            PaymentDecision::Rejected => Action::RejectPayment,
        };
        let next = transition(request.status, action)?;

        let payment = self
            .payment_repo
            .find_pending_by_request(request.id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "Request {} has no payment awaiting verification",
                    request.reference
                ))
            })?;

        let notes = trimmed(input.notes);
        let (payment_status, record_status, note) = match input.decision {
            PaymentDecision::Approved => (
                PaymentStatus::Paid,
                PaymentRecordStatus::Paid,
                NOTE_PAYMENT_APPROVED.to_string(),
            ),
            PaymentDecision::Rejected => (
                PaymentStatus::Rejected,
                PaymentRecordStatus::Rejected,
                match &notes {
                    Some(notes) => format!("{NOTE_PAYMENT_REJECTED} ({notes})"),
                    None => NOTE_PAYMENT_REJECTED.to_string(),
                },
            ),
        };

        let change = StatusChange::new(request.id, request.status, next, actor.history_actor())
            .with_notes(note.clone());
        let update = PaymentUpdate {
            status: payment_status,
            method: None,
            reference: None,
            date: None,
            write: Some(PaymentWrite::Resolve {
                payment_id: payment.id,
                status: record_status,
                notes,
            }),
        };

        let applied = self.request_repo.update_payment(change, update).await?;
        Ok(self.finish(applied, request.status, Some(note)).await)
    }

    /// Move a request to a staff-chosen status.
    pub async fn update_status(
        &self,
        actor: &Actor,
        request_id: i64,
        input: UpdateStatusInput,
    ) -> AppResult<Outcome<document_request::Model>> {
        ensure_kind(actor, ActorKind::Staff)?;
        input
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;
        let notes = trimmed(Some(input.notes))
            .ok_or_else(|| AppError::Validation("notes are required".to_string()))?;

        let request = self.request_repo.get_by_id(request_id).await?;
        let next = transition(request.status, Action::UpdateStatus(input.status))?;

        let change = StatusChange::new(request.id, request.status, next, actor.history_actor())
            .with_notes(notes.clone());
        let applied = self.request_repo.append_status(change).await?;
        Ok(self.finish(applied, request.status, Some(notes)).await)
    }

    /// Refuse a request.
    pub async fn reject(
        &self,
        actor: &Actor,
        request_id: i64,
        input: RejectRequestInput,
    ) -> AppResult<Outcome<document_request::Model>> {
        ensure_kind(actor, ActorKind::Staff)?;
        input
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;
        let reason = trimmed(Some(input.reason))
            .ok_or_else(|| AppError::Validation("reason is required".to_string()))?;

        let request = self.request_repo.get_by_id(request_id).await?;
        let next = transition(request.status, Action::Reject)?;

        let change = StatusChange::new(request.id, request.status, next, actor.history_actor())
            .with_notes(reason.clone());
        let applied = self.request_repo.append_status(change).await?;
        Ok(self.finish(applied, request.status, Some(reason)).await)
    }

    /// Record shipment of a request.
    pub async fn ship(
        &self,
        actor: &Actor,
        request_id: i64,
        input: ShipRequestInput,
    ) -> AppResult<Outcome<document_request::Model>> {
        ensure_kind(actor, ActorKind::Staff)?;
        input
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;
        let tracking_number = trimmed(Some(input.tracking_number))
            .ok_or_else(|| AppError::Validation("tracking number is required".to_string()))?;

        let request = self.request_repo.get_by_id(request_id).await?;
        let next = transition(request.status, Action::Ship)?;

        let note = with_extra(
            format!("{NOTE_SHIPPED} {tracking_number}"),
            trimmed(input.notes),
        );
        let delivery = DeliveryUpdate {
            tracking_number,
            delivery_date: input
                .delivery_date
                .unwrap_or_else(|| self.settings.calendar.today()),
        };

        let change = StatusChange::new(request.id, request.status, next, actor.history_actor())
            .with_notes(note.clone());
        let applied = self.request_repo.update_delivery(change, delivery).await?;
        Ok(self.finish(applied, request.status, Some(note)).await)
    }

    /// Record that the student collected the document.
    pub async fn mark_picked_up(
        &self,
        actor: &Actor,
        request_id: i64,
        input: PickupInput,
    ) -> AppResult<Outcome<document_request::Model>> {
        ensure_kind(actor, ActorKind::Staff)?;
        input
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        let request = self.request_repo.get_by_id(request_id).await?;
        let next = transition(request.status, Action::PickUp)?;

        let note = with_extra(
            format!(
                "{NOTE_PICKED_UP} {} (เลขบัตร: {})",
                input.receiver_name.trim(),
                input.receiver_id_card.trim()
            ),
            trimmed(input.notes),
        );

        let change = StatusChange::new(request.id, request.status, next, actor.history_actor())
            .with_notes(note.clone());
        let applied = self.request_repo.append_status(change).await?;
        Ok(self.finish(applied, request.status, Some(note)).await)
    }

    /// Deliver the finished document by email and complete the request.
    pub async fn send_digital_document(
        &self,
        actor: &Actor,
        request_id: i64,
        input: DigitalDocumentInput,
        document: Option<FileUpload>,
    ) -> AppResult<Outcome<document_request::Model>> {
        ensure_kind(actor, ActorKind::Staff)?;
        input
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;
        let document = document
            .ok_or_else(|| AppError::Validation("A document file is required".to_string()))?;
        self.settings
            .upload_policy
            .check(&document.original_name, document.data.len() as u64)?;

        let request = self.request_repo.get_by_id(request_id).await?;
        let next = transition(request.status, Action::SendDigitalDocument)?;

        let notes = trimmed(input.notes);
        let note = match &notes {
            Some(notes) => format!("{NOTE_DIGITAL_SENT}: {notes}"),
            None => NOTE_DIGITAL_SENT.to_string(),
        };

        let stored = self.store_one(&document).await?;
        let change = StatusChange::new(request.id, request.status, next, actor.history_actor())
            .with_notes(note)
            .with_attachment(attachment_model(&stored, AttachmentType::DigitalDocument));

        let applied = match self.request_repo.append_status(change).await {
            Ok(applied) => applied,
            Err(e) => {
                self.discard_uploads(std::slice::from_ref(&stored)).await;
                return Err(e);
            }
        };

        let completed = applied
            .request
            .completed_at
            .map_or_else(|| self.settings.calendar.today(), |at| {
                self.settings.calendar.local_date(at)
            });
        let data = DigitalDocument {
            reference: applied.request.reference.clone(),
            document_type: document_type_label(applied.request.document_type).to_string(),
            copies: applied.request.copies,
            completed_date: thai_date(completed),
            message: notes,
            file_name: document.original_name,
            content_type: stored.file_type,
            content: document.data,
        };

        let warning = match self.student_repo.get_by_id(applied.request.student_id).await {
            Ok(student) => warn_on_failure(
                &applied.request,
                "digital document",
                self.dispatcher
                    .send_digital_document(&student.email, &data)
                    .await,
            ),
            Err(e) => warn_on_failure(&applied.request, "digital document", Err(e)),
        };

        Ok(Outcome {
            value: applied.request,
            warning,
        })
    }

    /// Remove an attachment and, best-effort, its stored file.
    pub async fn delete_attachment(&self, actor: &Actor, attachment_id: i64) -> AppResult<()> {
        ensure_kind(actor, ActorKind::Staff)?;
        let attachment = self.attachment_repo.get_by_id(attachment_id).await?;
        let file_path = attachment.file_path.clone();
        let request_id = attachment.request_id;

        self.attachment_repo.delete(attachment).await?;

        if let Err(e) = self.storage.delete(&file_path).await {
            tracing::warn!(
                attachment_id,
                request_id,
                file_path = %file_path,
                error = %e,
                "Failed to remove stored file"
            );
        }

        tracing::info!(attachment_id, request_id, actor_id = actor.id, "Attachment deleted");
        Ok(())
    }

    // ==================== Helpers ====================

    async fn unique_reference(&self) -> AppResult<String> {
        let today = self.settings.calendar.today();
        for attempt in 1..=MAX_REFERENCE_ATTEMPTS {
            let reference = self.id_gen.generate_reference(today);
            if !self.request_repo.reference_exists(&reference).await? {
                return Ok(reference);
            }
            tracing::debug!(reference = %reference, attempt, "Reference taken, retrying");
        }
        Err(AppError::Conflict(
            "Could not allocate a unique request reference".to_string(),
        ))
    }

    async fn count_status(&self, status: RequestStatus) -> AppResult<u64> {
        self.request_repo
            .count(&RequestFilter {
                status: Some(status),
                ..Default::default()
            })
            .await
    }

    async fn store_one(&self, upload: &FileUpload) -> AppResult<UploadedFile> {
        store_upload(
            self.storage.as_ref(),
            &self.settings.upload_policy,
            &self.id_gen,
            &upload.original_name,
            &upload.data,
        )
        .await
    }

    async fn store_all(&self, uploads: &[FileUpload]) -> AppResult<Vec<UploadedFile>> {
        let mut stored = Vec::with_capacity(uploads.len());
        for upload in uploads {
            match self.store_one(upload).await {
                Ok(file) => stored.push(file),
                Err(e) => {
                    self.discard_uploads(&stored).await;
                    return Err(e);
                }
            }
        }
        Ok(stored)
    }

    async fn discard_uploads(&self, files: &[UploadedFile]) {
        for file in files {
            if let Err(e) = self.storage.delete(&file.file_path).await {
                tracing::warn!(file_path = %file.file_path, error = %e, "Failed to discard upload");
            }
        }
    }

    async fn assemble_detail(&self, request: document_request::Model) -> AppResult<RequestDetail> {
        let calendar = &self.settings.calendar;
        let student = self.student_repo.get_by_id(request.student_id).await?;
        let history = self.request_repo.status_history(request.id).await?;
        let attachments = self.attachment_repo.find_by_request(request.id).await?;
        let payments = self.payment_repo.find_by_request(request.id).await?;

        Ok(RequestDetail {
            request: RequestView::new(request, calendar),
            student: student.into(),
            history: history
                .into_iter()
                .map(|h| HistoryView::new(h, calendar))
                .collect(),
            attachments: attachments
                .into_iter()
                .map(|a| {
                    let url = self.storage.public_url(&a.file_path);
                    AttachmentView::new(a, url)
                })
                .collect(),
            payments: payments.into_iter().map(PaymentView::from).collect(),
        })
    }

    /// Notify the student of a committed transition.
    ///
    /// The previous status is the one the guarded update expected, which is
    /// the history entry just before the one written.
    async fn finish(
        &self,
        applied: AppliedChange,
        previous: RequestStatus,
        message: Option<String>,
    ) -> Outcome<document_request::Model> {
        let request = applied.request;
        let data = StatusUpdate {
            reference: request.reference.clone(),
            document_type: document_type_label(request.document_type).to_string(),
            old_status: status_label(previous).to_string(),
            new_status: status_label(request.status).to_string(),
            update_date: thai_date(self.settings.calendar.today()),
            message,
        };

        let result = match self.student_repo.get_by_id(request.student_id).await {
            Ok(student) => self.dispatcher.send_status_update(&student.email, &data).await,
            Err(e) => Err(e),
        };
        let warning = warn_on_failure(&request, "status update", result);

        Outcome {
            value: request,
            warning,
        }
    }

    async fn notify_submission(
        &self,
        request: &document_request::Model,
        student: &student::Model,
    ) -> Option<String> {
        let calendar = &self.settings.calendar;
        let created = calendar.local_date(request.created_at);
        let estimate = calendar.estimate(request.document_type, created);

        let confirmation = RequestConfirmation {
            reference: request.reference.clone(),
            document_type: document_type_label(request.document_type).to_string(),
            copies: request.copies,
            delivery_method: delivery_method_label(request.delivery_method).to_string(),
            request_date: thai_date(created),
            estimated_days: estimate.working_days,
            estimated_date: thai_date(estimate.date),
        };
        let warning = warn_on_failure(
            request,
            "request confirmation",
            self.dispatcher
                .send_request_confirmation(&student.email, &confirmation)
                .await,
        );

        if !self.settings.staff_recipients.is_empty() {
            let alert = NewRequestAlert {
                reference: request.reference.clone(),
                student_name: student.full_name(),
                student_number: student.student_number.clone(),
                document_type: confirmation.document_type.clone(),
                copies: request.copies,
                delivery_method: confirmation.delivery_method.clone(),
                request_date: confirmation.request_date.clone(),
            };
            // Staff alerts never reach the student, so they do not produce a warning.
            let _ = warn_on_failure(
                request,
                "staff alert",
                self.dispatcher
                    .send_new_request_alert(&self.settings.staff_recipients, &alert)
                    .await,
            );
        }

        warning
    }
}

fn attachment_model(
    file: &UploadedFile,
    attachment_type: AttachmentType,
) -> request_attachment::ActiveModel {
    request_attachment::ActiveModel {
        file_name: Set(file.file_name.clone()),
        file_path: Set(file.file_path.clone()),
        file_type: Set(file.file_type.clone()),
        original_name: Set(file.original_name.clone()),
        md5: Set(file.md5.clone()),
        attachment_type: Set(attachment_type),
        created_at: Set(Utc::now().into()),
        ..Default::default()
    }
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn with_extra(note: String, extra: Option<String>) -> String {
    match extra {
        Some(extra) => format!("{note} ({extra})"),
        None => note,
    }
}

fn warn_on_failure(
    request: &document_request::Model,
    kind: &str,
    result: AppResult<()>,
) -> Option<String> {
    match result {
        Ok(()) => None,
        Err(e) => {
            tracing::warn!(
                request_id = request.id,
                reference = %request.reference,
                kind,
                error = %e,
                "Notification failed"
            );
            Some(format!("The {kind} email could not be sent"))
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::notification::NotificationDispatcher;
    use docreq_db::test_utils::fixtures::{self, STUDENT_ID};
    use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase, MockExecResult, Value};
    use std::collections::HashMap;
    use std::sync::Mutex;

    // ==================== Doubles ====================

    #[derive(Default)]
    struct RecordingDispatcher {
        fail: bool,
        confirmations: Mutex<Vec<RequestConfirmation>>,
        updates: Mutex<Vec<StatusUpdate>>,
        documents: Mutex<Vec<DigitalDocument>>,
        alerts: Mutex<Vec<NewRequestAlert>>,
    }

    impl RecordingDispatcher {
        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        fn result(&self) -> AppResult<()> {
            if self.fail {
                Err(AppError::DependencyFailure("smtp down".to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait::async_trait]
    impl NotificationDispatcher for RecordingDispatcher {
        async fn send_request_confirmation(
            &self,
            _to: &str,
            data: &RequestConfirmation,
        ) -> AppResult<()> {
            self.confirmations.lock().unwrap().push(data.clone());
            self.result()
        }

        async fn send_status_update(&self, _to: &str, data: &StatusUpdate) -> AppResult<()> {
            self.updates.lock().unwrap().push(data.clone());
            self.result()
        }

        async fn send_digital_document(&self, _to: &str, data: &DigitalDocument) -> AppResult<()> {
            self.documents.lock().unwrap().push(data.clone());
            self.result()
        }

        async fn send_new_request_alert(
            &self,
            _to: &[String],
            data: &NewRequestAlert,
        ) -> AppResult<()> {
            self.alerts.lock().unwrap().push(data.clone());
            self.result()
        }
    }

    #[derive(Default)]
    struct MemoryStorage {
        files: Mutex<HashMap<String, Vec<u8>>>,
    }

    impl MemoryStorage {
        fn len(&self) -> usize {
            self.files.lock().unwrap().len()
        }
    }

    #[async_trait::async_trait]
    impl StorageBackend for MemoryStorage {
        async fn upload(&self, key: &str, data: &[u8]) -> AppResult<()> {
            self.files
                .lock()
                .unwrap()
                .insert(key.to_string(), data.to_vec());
            Ok(())
        }

        async fn delete(&self, key: &str) -> AppResult<()> {
            self.files.lock().unwrap().remove(key);
            Ok(())
        }

        fn public_url(&self, key: &str) -> String {
            format!("/uploads/{key}")
        }
    }

    struct Harness {
        service: RequestService,
        dispatcher: Arc<RecordingDispatcher>,
        storage: Arc<MemoryStorage>,
    }

    fn harness(db: DatabaseConnection, dispatcher: RecordingDispatcher) -> Harness {
        shared_harness(Arc::new(db), dispatcher)
    }

    fn shared_harness(db: Arc<DatabaseConnection>, dispatcher: RecordingDispatcher) -> Harness {
        let dispatcher = Arc::new(dispatcher);
        let storage = Arc::new(MemoryStorage::default());
        let service = RequestService::new(
            RequestRepository::new(db.clone()),
            StudentRepository::new(db.clone()),
            PaymentRepository::new(db.clone()),
            AttachmentRepository::new(db),
            storage.clone(),
            dispatcher.clone(),
        )
        .with_settings(RequestSettings {
            staff_recipients: vec!["registrar@example.ac.th".to_string()],
            ..RequestSettings::default()
        });

        Harness {
            service,
            dispatcher,
            storage,
        }
    }

    fn exec(rows_affected: u64) -> MockExecResult {
        MockExecResult {
            last_insert_id: 0,
            rows_affected,
        }
    }

    // ==================== Fixtures ====================

    const STAFF: Actor = Actor::staff(9);
    const STUDENT: Actor = Actor::student(STUDENT_ID);

    fn with_payment(
        mut request: document_request::Model,
        payment_status: PaymentStatus,
    ) -> document_request::Model {
        request.payment_status = payment_status;
        request
    }

    fn submit_input() -> SubmitRequestInput {
        SubmitRequestInput {
            document_type: DocumentType::Transcript,
            copies: 2,
            purpose: "Scholarship".to_string(),
            delivery_method: DeliveryMethod::Pickup,
            address: None,
        }
    }

    fn payment_input(amount: i64) -> SubmitPaymentInput {
        SubmitPaymentInput {
            payment_method: PaymentMethod::BankTransfer,
            payment_reference: "TRX-001".to_string(),
            payment_date: NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
            amount,
        }
    }

    fn slip() -> FileUpload {
        FileUpload {
            original_name: "slip.png".to_string(),
            data: b"png-bytes".to_vec(),
        }
    }

    // ==================== Submission ====================

    #[tokio::test]
    async fn test_submit_transcript_pickup() {
        let request = fixtures::request(1, RequestStatus::Pending);

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[fixtures::student(STUDENT_ID)]])
            .append_query_results([Vec::<document_request::Model>::new()])
            .append_query_results([[request.clone()]])
            .append_query_results([[fixtures::history(1, 1, RequestStatus::Pending)]])
            .into_connection();
        let h = harness(db, RecordingDispatcher::default());

        let outcome = h.service.submit(&STUDENT, submit_input(), Vec::new()).await.unwrap();

        assert_eq!(outcome.value.status, RequestStatus::Pending);
        assert_eq!(outcome.value.payment_status, PaymentStatus::Pending);
        assert_eq!(outcome.value.total_fee, 200);
        assert!(outcome.warning.is_none());

        let confirmations = h.dispatcher.confirmations.lock().unwrap();
        assert_eq!(confirmations.len(), 1);
        assert_eq!(confirmations[0].estimated_days, 2);
        assert_eq!(h.dispatcher.alerts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_submit_retries_taken_reference() {
        let request = fixtures::request(1, RequestStatus::Pending);

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[fixtures::student(STUDENT_ID)]])
            .append_query_results([[fixtures::request(1, RequestStatus::Completed)]])
            .append_query_results([Vec::<document_request::Model>::new()])
            .append_query_results([[request.clone()]])
            .append_query_results([[fixtures::history(1, 1, RequestStatus::Pending)]])
            .into_connection();
        let h = harness(db, RecordingDispatcher::default());

        let outcome = h.service.submit(&STUDENT, submit_input(), Vec::new()).await.unwrap();
        assert_eq!(outcome.value.id, request.id);
    }

    #[tokio::test]
    async fn test_submit_stores_supporting_documents() {
        let request = fixtures::request(1, RequestStatus::Pending);

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[fixtures::student(STUDENT_ID)]])
            .append_query_results([Vec::<document_request::Model>::new()])
            .append_query_results([[request]])
            .append_query_results([[fixtures::attachment(3, 1, AttachmentType::SupportingDocument)]])
            .append_query_results([[fixtures::history(1, 1, RequestStatus::Pending)]])
            .into_connection();
        let h = harness(db, RecordingDispatcher::default());

        let documents = vec![FileUpload {
            original_name: "id-card.pdf".to_string(),
            data: b"%PDF".to_vec(),
        }];
        h.service.submit(&STUDENT, submit_input(), documents).await.unwrap();

        assert_eq!(h.storage.len(), 1);
    }

    #[tokio::test]
    async fn test_submit_graduation_unsupported() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let h = harness(db, RecordingDispatcher::default());

        let input = SubmitRequestInput {
            document_type: DocumentType::Graduation,
            ..submit_input()
        };
        let err = h.service.submit(&STUDENT, input, Vec::new()).await.unwrap_err();

        assert!(matches!(err, AppError::UnsupportedDocumentType(_)));
    }

    #[tokio::test]
    async fn test_submit_postal_requires_address() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let h = harness(db, RecordingDispatcher::default());

        let input = SubmitRequestInput {
            delivery_method: DeliveryMethod::Postal,
            ..submit_input()
        };
        let err = h.service.submit(&STUDENT, input, Vec::new()).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let input = SubmitRequestInput {
            delivery_method: DeliveryMethod::Postal,
            address: Some(PostalAddress {
                line1: "99 Moo 1".to_string(),
                line2: None,
                district: "Bang Kapi".to_string(),
                province: "Bangkok".to_string(),
                postal_code: "1024".to_string(),
            }),
            ..submit_input()
        };
        let err = h.service.submit(&STUDENT, input, Vec::new()).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_submit_rejects_too_many_copies() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let h = harness(db, RecordingDispatcher::default());

        let input = SubmitRequestInput {
            copies: 11,
            ..submit_input()
        };
        let err = h.service.submit(&STUDENT, input, Vec::new()).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_submit_by_staff_forbidden() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let h = harness(db, RecordingDispatcher::default());

        let err = h.service.submit(&STAFF, submit_input(), Vec::new()).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_submit_warns_when_email_fails() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[fixtures::student(STUDENT_ID)]])
            .append_query_results([Vec::<document_request::Model>::new()])
            .append_query_results([[fixtures::request(1, RequestStatus::Pending)]])
            .append_query_results([[fixtures::history(1, 1, RequestStatus::Pending)]])
            .into_connection();
        let h = harness(db, RecordingDispatcher::failing());

        let outcome = h.service.submit(&STUDENT, submit_input(), Vec::new()).await.unwrap();

        assert_eq!(outcome.value.status, RequestStatus::Pending);
        assert!(outcome.warning.is_some());
    }

    #[test]
    fn test_postal_address_format() {
        let address = PostalAddress {
            line1: "99 Moo 1".to_string(),
            line2: Some("  ".to_string()),
            district: "Bang Kapi".to_string(),
            province: "Bangkok".to_string(),
            postal_code: "10240".to_string(),
        };
        assert!(address.validate().is_ok());
        assert_eq!(address.format(), "99 Moo 1 Bang Kapi Bangkok 10240");
    }

    // ==================== Payment ====================

    #[tokio::test]
    async fn test_submit_payment_awaits_verification() {
        let updated = with_payment(
            fixtures::request(1, RequestStatus::AwaitingVerification),
            PaymentStatus::PendingVerification,
        );

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[fixtures::request(1, RequestStatus::Pending)]])
            .append_query_results([Vec::<payment_history::Model>::new()])
            .append_exec_results([exec(1)])
            .append_query_results([[fixtures::payment(5, 1, PaymentRecordStatus::PendingVerification)]])
            .append_query_results([[fixtures::attachment(3, 1, AttachmentType::PaymentSlip)]])
            .append_query_results([[fixtures::history(1, 1, 
                RequestStatus::AwaitingVerification,
            )]])
            .append_query_results([[updated]])
            .append_query_results([[fixtures::student(STUDENT_ID)]])
            .into_connection();
        let h = harness(db, RecordingDispatcher::default());

        let outcome = h
            .service
            .submit_payment(&STUDENT, 1, payment_input(200), Some(slip()))
            .await
            .unwrap();

        assert_eq!(outcome.value.status, RequestStatus::AwaitingVerification);
        assert_eq!(
            outcome.value.payment_status,
            PaymentStatus::PendingVerification
        );
        assert_eq!(h.storage.len(), 1);
        assert_eq!(h.dispatcher.updates.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_submit_payment_amount_must_match_fee() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[fixtures::request(1, RequestStatus::Pending)]])
            .into_connection();
        let h = harness(db, RecordingDispatcher::default());

        let err = h
            .service
            .submit_payment(&STUDENT, 1, payment_input(150), Some(slip()))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(h.storage.len(), 0);
    }

    #[tokio::test]
    async fn test_submit_payment_requires_slip() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[fixtures::request(1, RequestStatus::Pending)]])
            .into_connection();
        let h = harness(db, RecordingDispatcher::default());

        let err = h
            .service
            .submit_payment(&STUDENT, 1, payment_input(200), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_submit_payment_by_other_student_forbidden() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[fixtures::request(1, RequestStatus::Pending)]])
            .into_connection();
        let h = harness(db, RecordingDispatcher::default());

        let err = h
            .service
            .submit_payment(&Actor::student(2), 1, payment_input(200), Some(slip()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_submit_payment_not_required() {
        let request = with_payment(
            fixtures::request(1, RequestStatus::Pending),
            PaymentStatus::NotRequired,
        );
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[request]])
            .into_connection();
        let h = harness(db, RecordingDispatcher::default());

        let err = h
            .service
            .submit_payment(&STUDENT, 1, payment_input(200), Some(slip()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition(_)));
    }

    #[tokio::test]
    async fn test_submit_payment_cleans_up_slip_on_conflict() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[fixtures::request(1, RequestStatus::Pending)]])
            .append_query_results([Vec::<payment_history::Model>::new()])
            .append_exec_results([exec(0)])
            .into_connection();
        let h = harness(db, RecordingDispatcher::default());

        let err = h
            .service
            .submit_payment(&STUDENT, 1, payment_input(200), Some(slip()))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(h.storage.len(), 0);
    }

    #[tokio::test]
    async fn test_verify_payment_approved() {
        let updated = with_payment(
            fixtures::request(1, RequestStatus::Processing),
            PaymentStatus::Paid,
        );

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[with_payment(
                fixtures::request(1, RequestStatus::AwaitingVerification),
                PaymentStatus::PendingVerification,
            )]])
            .append_query_results([[fixtures::payment(5, 1, PaymentRecordStatus::PendingVerification)]])
            .append_exec_results([exec(1), exec(1)])
            .append_query_results([[fixtures::payment_status_entry(1, 5, PaymentRecordStatus::Paid)]])
            .append_query_results([[fixtures::history(1, 1, RequestStatus::Processing)]])
            .append_query_results([[updated]])
            .append_query_results([[fixtures::student(STUDENT_ID)]])
            .into_connection();
        let h = harness(db, RecordingDispatcher::default());

        let outcome = h
            .service
            .verify_payment(
                &STAFF,
                1,
                VerifyPaymentInput {
                    decision: PaymentDecision::Approved,
                    notes: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(outcome.value.status, RequestStatus::Processing);
        assert_eq!(outcome.value.payment_status, PaymentStatus::Paid);

        let updates = h.dispatcher.updates.lock().unwrap();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].old_status, "รอการตรวจสอบการชำระเงิน");
        assert_eq!(updates[0].new_status, "กำลังดำเนินการ");
    }

    #[tokio::test]
    async fn test_verify_payment_rejected() {
        let updated = with_payment(
            fixtures::request(1, RequestStatus::AwaitingPayment),
            PaymentStatus::Rejected,
        );

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[fixtures::request(1, RequestStatus::AwaitingVerification)]])
            .append_query_results([[fixtures::payment(5, 1, PaymentRecordStatus::PendingVerification)]])
            .append_exec_results([exec(1), exec(1)])
            .append_query_results([[fixtures::payment_status_entry(1, 5, PaymentRecordStatus::Paid)]])
            .append_query_results([[fixtures::history(1, 1, RequestStatus::AwaitingPayment)]])
            .append_query_results([[updated]])
            .append_query_results([[fixtures::student(STUDENT_ID)]])
            .into_connection();
        let h = harness(db, RecordingDispatcher::default());

        let outcome = h
            .service
            .verify_payment(
                &STAFF,
                1,
                VerifyPaymentInput {
                    decision: PaymentDecision::Rejected,
                    notes: Some("wrong amount".to_string()),
                },
            )
            .await
            .unwrap();

        assert_eq!(outcome.value.status, RequestStatus::AwaitingPayment);
        assert_eq!(outcome.value.payment_status, PaymentStatus::Rejected);

        let updates = h.dispatcher.updates.lock().unwrap();
        assert_eq!(
            updates[0].message.as_deref(),
            Some("การชำระเงินไม่ถูกต้อง กรุณาชำระใหม่ (wrong amount)")
        );
    }

    #[tokio::test]
    async fn test_verify_payment_loses_race() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[fixtures::request(1, RequestStatus::AwaitingVerification)]])
            .append_query_results([[fixtures::payment(5, 1, PaymentRecordStatus::PendingVerification)]])
            .append_exec_results([exec(0)])
            .into_connection();
        let h = harness(db, RecordingDispatcher::default());

        let err = h
            .service
            .verify_payment(
                &STAFF,
                1,
                VerifyPaymentInput {
                    decision: PaymentDecision::Approved,
                    notes: None,
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Conflict(_)));
        assert!(h.dispatcher.updates.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_verify_payment_twice_records_one_transition() {
        let pending_request = || {
            with_payment(
                fixtures::request(1, RequestStatus::AwaitingVerification),
                PaymentStatus::PendingVerification,
            )
        };
        let pending_payment = || fixtures::payment(5, 1, PaymentRecordStatus::PendingVerification);

        // The second verifier read the request before the first one committed.
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[pending_request()]])
                .append_query_results([[pending_payment()]])
                .append_exec_results([exec(1), exec(1)])
                .append_query_results([[fixtures::payment_status_entry(
                    1,
                    5,
                    PaymentRecordStatus::Paid,
                )]])
                .append_query_results([[fixtures::history(2, 1, RequestStatus::Processing)]])
                .append_query_results([[with_payment(
                    fixtures::request(1, RequestStatus::Processing),
                    PaymentStatus::Paid,
                )]])
                .append_query_results([[fixtures::student(STUDENT_ID)]])
                .append_query_results([[pending_request()]])
                .append_query_results([[pending_payment()]])
                .append_exec_results([exec(0)])
                .into_connection(),
        );
        let h = shared_harness(db.clone(), RecordingDispatcher::default());
        let approve = || VerifyPaymentInput {
            decision: PaymentDecision::Approved,
            notes: None,
        };

        let first = h.service.verify_payment(&STAFF, 1, approve()).await;
        let second = h.service.verify_payment(&Actor::staff(10), 1, approve()).await;

        assert_eq!(first.unwrap().value.status, RequestStatus::Processing);
        assert!(matches!(second.unwrap_err(), AppError::Conflict(_)));
        assert_eq!(h.dispatcher.updates.lock().unwrap().len(), 1);

        drop(h);
        let log = Arc::try_unwrap(db).unwrap().into_transaction_log();
        let history_writes: usize = log
            .iter()
            .map(|t| format!("{t:?}").matches("request_status_history").count())
            .sum();
        assert_eq!(history_writes, 1);
    }

    #[tokio::test]
    async fn test_verify_payment_requires_staff() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let h = harness(db, RecordingDispatcher::default());

        let err = h
            .service
            .verify_payment(
                &STUDENT,
                1,
                VerifyPaymentInput {
                    decision: PaymentDecision::Approved,
                    notes: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    // ==================== Staff transitions ====================

    #[tokio::test]
    async fn test_update_status_from_terminal_rejected() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[fixtures::request(1, RequestStatus::Completed)]])
            .into_connection();
        let h = harness(db, RecordingDispatcher::default());

        let err = h
            .service
            .update_status(
                &STAFF,
                1,
                UpdateStatusInput {
                    status: RequestStatus::Processing,
                    notes: "reopen".to_string(),
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::InvalidTransition(_)));
    }

    #[tokio::test]
    async fn test_update_status_keeps_payment_under_verification() {
        let request = with_payment(
            fixtures::request(1, RequestStatus::AwaitingVerification),
            PaymentStatus::PendingVerification,
        );
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[request]])
            .into_connection();
        let h = harness(db, RecordingDispatcher::default());

        let err = h
            .service
            .update_status(
                &STAFF,
                1,
                UpdateStatusInput {
                    status: RequestStatus::AwaitingPayment,
                    notes: "skip verification".to_string(),
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::InvalidTransition(_)));
        assert!(h.dispatcher.updates.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_status_requires_notes() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let h = harness(db, RecordingDispatcher::default());

        let err = h
            .service
            .update_status(
                &STAFF,
                1,
                UpdateStatusInput {
                    status: RequestStatus::Preparing,
                    notes: "   ".to_string(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_ship_records_tracking_number() {
        let mut shipped = fixtures::request(1, RequestStatus::Shipped);
        shipped.tracking_number = Some("EF123456789TH".to_string());

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[fixtures::request(1, RequestStatus::Processing)]])
            .append_exec_results([exec(1)])
            .append_query_results([[fixtures::history(1, 1, RequestStatus::Shipped)]])
            .append_query_results([[shipped]])
            .append_query_results([[fixtures::student(STUDENT_ID)]])
            .into_connection();
        let h = harness(db, RecordingDispatcher::default());

        let outcome = h
            .service
            .ship(
                &STAFF,
                1,
                ShipRequestInput {
                    tracking_number: "EF123456789TH".to_string(),
                    delivery_date: None,
                    notes: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(outcome.value.status, RequestStatus::Shipped);
        let updates = h.dispatcher.updates.lock().unwrap();
        assert_eq!(
            updates[0].message.as_deref(),
            Some("จัดส่งเอกสารแล้ว หมายเลขพัสดุ: EF123456789TH")
        );
    }

    #[tokio::test]
    async fn test_pickup_requires_ready_for_pickup() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[fixtures::request(1, RequestStatus::Processing)]])
            .into_connection();
        let h = harness(db, RecordingDispatcher::default());

        let err = h
            .service
            .mark_picked_up(
                &STAFF,
                1,
                PickupInput {
                    receiver_name: "Somchai Jaidee".to_string(),
                    receiver_id_card: "1100000000000".to_string(),
                    notes: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition(_)));
    }

    #[tokio::test]
    async fn test_send_digital_document_completes_request() {
        let mut completed = fixtures::request(1, RequestStatus::Completed);
        completed.completed_at = Some(Utc::now().into());

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[fixtures::request(1, RequestStatus::Processing)]])
            .append_exec_results([exec(1)])
            .append_query_results([[fixtures::attachment(3, 1, AttachmentType::DigitalDocument)]])
            .append_query_results([[fixtures::history(1, 1, RequestStatus::Completed)]])
            .append_query_results([[completed]])
            .append_query_results([[fixtures::student(STUDENT_ID)]])
            .into_connection();
        let h = harness(db, RecordingDispatcher::default());

        let outcome = h
            .service
            .send_digital_document(
                &STAFF,
                1,
                DigitalDocumentInput::default(),
                Some(FileUpload {
                    original_name: "transcript.pdf".to_string(),
                    data: b"%PDF-1.7".to_vec(),
                }),
            )
            .await
            .unwrap();

        assert_eq!(outcome.value.status, RequestStatus::Completed);
        assert!(outcome.value.completed_at.is_some());

        let documents = h.dispatcher.documents.lock().unwrap();
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].content, b"%PDF-1.7".to_vec());
        assert_eq!(documents[0].content_type, "application/pdf");
        assert_eq!(h.storage.len(), 1);
    }

    // ==================== Cancellation ====================

    #[tokio::test]
    async fn test_cancel_processing_rejected() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[fixtures::request(1, RequestStatus::Processing)]])
            .into_connection();
        let h = harness(db, RecordingDispatcher::default());

        let err = h
            .service
            .cancel(&STUDENT, 1, CancelRequestInput::default())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::InvalidTransition(_)));
    }

    #[tokio::test]
    async fn test_cancel_pending_notifies() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[fixtures::request(1, RequestStatus::Pending)]])
            .append_exec_results([exec(1)])
            .append_query_results([[fixtures::history(1, 1, RequestStatus::Cancelled)]])
            .append_query_results([[fixtures::request(1, RequestStatus::Cancelled)]])
            .append_query_results([[fixtures::student(STUDENT_ID)]])
            .into_connection();
        let h = harness(db, RecordingDispatcher::default());

        let outcome = h
            .service
            .cancel(
                &STUDENT,
                1,
                CancelRequestInput {
                    reason: Some("no longer needed".to_string()),
                },
            )
            .await
            .unwrap();

        assert_eq!(outcome.value.status, RequestStatus::Cancelled);
        let updates = h.dispatcher.updates.lock().unwrap();
        assert_eq!(
            updates[0].message.as_deref(),
            Some("ยกเลิกโดยนักศึกษา: no longer needed")
        );
    }

    #[tokio::test]
    async fn test_reject_records_reason() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[fixtures::request(1, RequestStatus::Processing)]])
            .append_exec_results([exec(1)])
            .append_query_results([[fixtures::history(1, 1, RequestStatus::Rejected)]])
            .append_query_results([[fixtures::request(1, RequestStatus::Rejected)]])
            .append_query_results([[fixtures::student(STUDENT_ID)]])
            .into_connection();
        let h = harness(db, RecordingDispatcher::default());

        let outcome = h
            .service
            .reject(
                &STAFF,
                1,
                RejectRequestInput {
                    reason: "  missing signature ".to_string(),
                },
            )
            .await
            .unwrap();

        assert_eq!(outcome.value.status, RequestStatus::Rejected);
        assert!(outcome.warning.is_none());
        let updates = h.dispatcher.updates.lock().unwrap();
        assert_eq!(updates[0].message.as_deref(), Some("missing signature"));
    }

    #[tokio::test]
    async fn test_reject_by_student_forbidden() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let h = harness(db, RecordingDispatcher::default());

        let err = h
            .service
            .reject(
                &STUDENT,
                1,
                RejectRequestInput {
                    reason: "nope".to_string(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_delete_attachment_removes_stored_file() {
        let attachment = fixtures::attachment(3, 1, AttachmentType::SupportingDocument);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[attachment.clone()]])
            .append_exec_results([exec(1)])
            .into_connection();
        let h = harness(db, RecordingDispatcher::default());
        h.storage
            .upload(&attachment.file_path, b"pdf")
            .await
            .unwrap();

        h.service.delete_attachment(&STAFF, 3).await.unwrap();

        assert_eq!(h.storage.len(), 0);
    }

    // ==================== Reads ====================

    #[tokio::test]
    async fn test_detail_of_other_student_forbidden() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[fixtures::request(1, RequestStatus::Pending)]])
            .into_connection();
        let h = harness(db, RecordingDispatcher::default());

        let err = h.service.detail(&Actor::student(2), 1).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_detail_assembles_view() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[fixtures::request(1, RequestStatus::AwaitingVerification)]])
            .append_query_results([[fixtures::student(STUDENT_ID)]])
            .append_query_results([[
                fixtures::history(1, 1, RequestStatus::AwaitingVerification),
                fixtures::history(1, 1, RequestStatus::Pending),
            ]])
            .append_query_results([[fixtures::attachment(3, 1, AttachmentType::PaymentSlip)]])
            .append_query_results([[fixtures::payment(5, 1, PaymentRecordStatus::PendingVerification)]])
            .into_connection();
        let h = harness(db, RecordingDispatcher::default());

        let detail = h.service.detail(&STUDENT, 1).await.unwrap();

        assert_eq!(detail.request.status_label, "รอการตรวจสอบการชำระเงิน");
        assert_eq!(detail.history[0].status, detail.request.status);
        assert_eq!(detail.student.full_name, "Somchai Jaidee");
        assert_eq!(detail.attachments[0].url, "/uploads/202510/slip.png");
        assert_eq!(detail.payments.len(), 1);
    }

    #[tokio::test]
    async fn test_submitted_request_reads_back_by_reference() {
        let created = fixtures::request(1, RequestStatus::Pending);

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[fixtures::student(STUDENT_ID)]])
            .append_query_results([Vec::<document_request::Model>::new()])
            .append_query_results([[created.clone()]])
            .append_query_results([[fixtures::history(1, 1, RequestStatus::Pending)]])
            .append_query_results([[created]])
            .append_query_results([[fixtures::student(STUDENT_ID)]])
            .append_query_results([[fixtures::history(1, 1, RequestStatus::Pending)]])
            .append_query_results([Vec::<request_attachment::Model>::new()])
            .append_query_results([Vec::<payment_history::Model>::new()])
            .into_connection();
        let h = harness(db, RecordingDispatcher::default());

        let input = submit_input();
        let submitted = h
            .service
            .submit(&STUDENT, input.clone(), Vec::new())
            .await
            .unwrap()
            .value;
        let detail = h
            .service
            .detail_by_reference(&STUDENT, &format!(" {} ", submitted.reference))
            .await
            .unwrap();

        let request = &detail.request;
        assert_eq!(request.id, submitted.id);
        assert_eq!(request.reference, submitted.reference);
        assert_eq!(request.student_id, STUDENT_ID);
        assert_eq!(request.document_type, input.document_type);
        assert_eq!(request.copies, input.copies);
        assert_eq!(request.purpose, input.purpose);
        assert_eq!(request.delivery_method, input.delivery_method);
        assert_eq!(request.total_fee, submitted.total_fee);
        assert_eq!(request.status, RequestStatus::Pending);
        assert_eq!(detail.history[0].status, request.status);
        assert!(detail.attachments.is_empty());
        assert!(detail.payments.is_empty());
    }

    #[tokio::test]
    async fn test_detail_by_unknown_reference() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<document_request::Model>::new()])
            .into_connection();
        let h = harness(db, RecordingDispatcher::default());

        let err = h
            .service
            .detail_by_reference(&STUDENT, "REQ0000000000")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_list_paginates() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[maplit::btreemap! {
                "num_items" => Value::BigInt(Some(41)),
            }]])
            .append_query_results([[fixtures::request(1, RequestStatus::Pending)]])
            .append_query_results([[fixtures::student(STUDENT_ID)]])
            .into_connection();
        let h = harness(db, RecordingDispatcher::default());

        let page = h
            .service
            .list(
                &STAFF,
                ListRequestsQuery {
                    page: Some(3),
                    search: Some("somchai".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(page.total, 41);
        assert_eq!(page.page, 3);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.items.len(), 1);
        assert_eq!(
            page.items[0].student.as_ref().map(|s| s.student_number.as_str()),
            Some("6501234567")
        );
    }

    #[tokio::test]
    async fn test_stats_counts() {
        let count = |n: i64| {
            [maplit::btreemap! {
                "num_items" => Value::BigInt(Some(n)),
            }]
        };
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([count(4)])
            .append_query_results([count(3)])
            .append_query_results([count(2)])
            .append_query_results([count(5)])
            .append_query_results([count(1)])
            .append_query_results([count(7)])
            .into_connection();
        let h = harness(db, RecordingDispatcher::default());

        let stats = h.service.stats(&STAFF).await.unwrap();

        assert_eq!(
            stats,
            DashboardStats {
                today: 4,
                pending: 3,
                awaiting_verification: 2,
                processing: 5,
                ready_for_pickup: 1,
                completed: 7,
            }
        );
    }
}
