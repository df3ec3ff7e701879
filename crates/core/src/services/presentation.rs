//! Display labels and view-models.
//!
//! Entities are never extended with display fields; views are assembled
//! here from the stored models instead.

use chrono::{Datelike, NaiveDate};
use docreq_db::entities::{
    document_request::{self, DeliveryMethod, DocumentType, PaymentStatus, RequestStatus},
    payment_history::{self, PaymentMethod, PaymentRecordStatus},
    request_attachment::{self, AttachmentType},
    request_status_history, student,
};
use sea_orm::prelude::DateTimeWithTimeZone;
use serde::Serialize;

use super::processing::ProcessingCalendar;

const THAI_MONTHS: [&str; 12] = [
    "มกราคม",
    "กุมภาพันธ์",
    "มีนาคม",
    "เมษายน",
    "พฤษภาคม",
    "มิถุนายน",
    "กรกฎาคม",
    "สิงหาคม",
    "กันยายน",
    "ตุลาคม",
    "พฤศจิกายน",
    "ธันวาคม",
];

/// Offset between the Buddhist and the Common Era.
const BUDDHIST_ERA_OFFSET: i32 = 543;

/// Format a date as `<day> <Thai month> <Buddhist year>`.
#[must_use]
pub fn thai_date(date: NaiveDate) -> String {
    format!(
        "{} {} {}",
        date.day(),
        THAI_MONTHS[date.month0() as usize],
        date.year() + BUDDHIST_ERA_OFFSET
    )
}

#[must_use]
pub const fn status_label(status: RequestStatus) -> &'static str {
    match status {
        RequestStatus::Pending => "รอดำเนินการ",
        RequestStatus::AwaitingPayment => "รอชำระเงิน",
        RequestStatus::AwaitingVerification => "รอการตรวจสอบการชำระเงิน",
        RequestStatus::Processing => "กำลังดำเนินการ",
        RequestStatus::Preparing => "กำลังจัดเตรียมเอกสาร",
        RequestStatus::ReadyForPickup => "พร้อมให้รับเอกสาร",
        RequestStatus::Shipped => "จัดส่งแล้ว",
        RequestStatus::Completed => "เสร็จสิ้น",
        RequestStatus::Rejected => "ถูกปฏิเสธ",
        RequestStatus::Cancelled => "ยกเลิก",
        RequestStatus::NeedMoreInfo => "ต้องการข้อมูลเพิ่มเติม",
    }
}

#[must_use]
pub const fn document_type_label(document_type: DocumentType) -> &'static str {
    match document_type {
        DocumentType::Transcript => "ใบแสดงผลการเรียน (Transcript)",
        DocumentType::Certificate => "หนังสือรับรองการเป็นนักศึกษา",
        DocumentType::Graduation => "หนังสือรับรองสำเร็จการศึกษา",
        DocumentType::Enrollment => "คำร้องขอลงทะเบียน",
        DocumentType::General => "คำร้องทั่วไป",
    }
}

#[must_use]
pub const fn delivery_method_label(delivery_method: DeliveryMethod) -> &'static str {
    match delivery_method {
        DeliveryMethod::Pickup => "รับด้วยตนเองที่สำนักทะเบียน",
        DeliveryMethod::Postal => "จัดส่งทางไปรษณีย์",
        DeliveryMethod::Digital => "รับเอกสารดิจิทัลทางอีเมล",
    }
}

#[must_use]
pub const fn payment_status_label(payment_status: PaymentStatus) -> &'static str {
    match payment_status {
        PaymentStatus::NotRequired => "ไม่มีค่าธรรมเนียม",
        PaymentStatus::Pending => "รอชำระเงิน",
        PaymentStatus::PendingVerification => "รอการตรวจสอบการชำระเงิน",
        PaymentStatus::Paid => "ชำระเงินแล้ว",
        PaymentStatus::Rejected => "การชำระเงินไม่ถูกต้อง",
    }
}

#[must_use]
pub const fn payment_record_status_label(status: PaymentRecordStatus) -> &'static str {
    match status {
        PaymentRecordStatus::PendingVerification => "รอการตรวจสอบ",
        PaymentRecordStatus::Paid => "ถูกต้อง",
        PaymentRecordStatus::Rejected => "ไม่ถูกต้อง",
    }
}

#[must_use]
pub const fn payment_method_label(method: PaymentMethod) -> &'static str {
    match method {
        PaymentMethod::QrPayment => "QR Payment",
        PaymentMethod::BankTransfer => "โอนเงินผ่านธนาคาร",
    }
}

#[must_use]
pub const fn attachment_type_label(attachment_type: AttachmentType) -> &'static str {
    match attachment_type {
        AttachmentType::PaymentSlip => "หลักฐานการชำระเงิน",
        AttachmentType::DigitalDocument => "เอกสารดิจิทัล",
        AttachmentType::SupportingDocument => "เอกสารประกอบ",
    }
}

/// Request summary for listings and detail pages.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestView {
    pub id: i64,
    pub reference: String,
    pub student_id: i64,
    pub document_type: DocumentType,
    pub document_type_label: &'static str,
    pub copies: i32,
    pub purpose: String,
    pub delivery_method: DeliveryMethod,
    pub delivery_method_label: &'static str,
    pub delivery_address: Option<String>,
    pub document_fee: i64,
    pub shipping_fee: i64,
    pub total_fee: i64,
    pub payment_status: PaymentStatus,
    pub payment_status_label: &'static str,
    pub status: RequestStatus,
    pub status_label: &'static str,
    pub tracking_number: Option<String>,
    pub delivery_date: Option<NaiveDate>,
    pub payment_method: Option<PaymentMethod>,
    pub payment_reference: Option<String>,
    pub payment_date: Option<NaiveDate>,
    pub completed_at: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
    pub created_at_label: String,
    pub updated_at: DateTimeWithTimeZone,
    pub estimated_working_days: u32,
    pub estimated_completion: NaiveDate,
    pub estimated_completion_label: String,
}

impl RequestView {
    #[must_use]
    pub fn new(request: document_request::Model, calendar: &ProcessingCalendar) -> Self {
        let created = calendar.local_date(request.created_at);
        let estimate = calendar.estimate(request.document_type, created);

        Self {
            id: request.id,
            reference: request.reference,
            student_id: request.student_id,
            document_type: request.document_type,
            document_type_label: document_type_label(request.document_type),
            copies: request.copies,
            purpose: request.purpose,
            delivery_method: request.delivery_method,
            delivery_method_label: delivery_method_label(request.delivery_method),
            delivery_address: request.delivery_address,
            document_fee: request.document_fee,
            shipping_fee: request.shipping_fee,
            total_fee: request.total_fee,
            payment_status: request.payment_status,
            payment_status_label: payment_status_label(request.payment_status),
            status: request.status,
            status_label: status_label(request.status),
            tracking_number: request.tracking_number,
            delivery_date: request.delivery_date,
            payment_method: request.payment_method,
            payment_reference: request.payment_reference,
            payment_date: request.payment_date,
            completed_at: request.completed_at,
            created_at: request.created_at,
            created_at_label: thai_date(created),
            updated_at: request.updated_at,
            estimated_working_days: estimate.working_days,
            estimated_completion: estimate.date,
            estimated_completion_label: thai_date(estimate.date),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentView {
    pub id: i64,
    pub student_number: String,
    pub full_name: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub faculty: Option<String>,
    pub major: Option<String>,
    pub address: Option<String>,
}

impl From<student::Model> for StudentView {
    fn from(student: student::Model) -> Self {
        Self {
            id: student.id,
            full_name: student.full_name(),
            student_number: student.student_number,
            first_name: student.first_name,
            last_name: student.last_name,
            email: student.email,
            phone: student.phone,
            faculty: student.faculty,
            major: student.major,
            address: student.address,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryView {
    pub status: RequestStatus,
    pub status_label: &'static str,
    pub notes: Option<String>,
    pub created_by: i64,
    pub created_by_staff: bool,
    pub created_at: DateTimeWithTimeZone,
    pub created_at_label: String,
}

impl HistoryView {
    #[must_use]
    pub fn new(entry: request_status_history::Model, calendar: &ProcessingCalendar) -> Self {
        Self {
            status: entry.status,
            status_label: status_label(entry.status),
            notes: entry.notes,
            created_by: entry.created_by,
            created_by_staff: entry.created_by_staff,
            created_at_label: thai_date(calendar.local_date(entry.created_at)),
            created_at: entry.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentView {
    pub id: i64,
    pub url: String,
    pub file_name: String,
    pub file_type: String,
    pub original_name: String,
    pub attachment_type: AttachmentType,
    pub attachment_type_label: &'static str,
    pub created_at: DateTimeWithTimeZone,
}

impl AttachmentView {
    #[must_use]
    pub fn new(attachment: request_attachment::Model, url: String) -> Self {
        Self {
            id: attachment.id,
            url,
            file_name: attachment.file_name,
            file_type: attachment.file_type,
            original_name: attachment.original_name,
            attachment_type: attachment.attachment_type,
            attachment_type_label: attachment_type_label(attachment.attachment_type),
            created_at: attachment.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentView {
    pub id: i64,
    pub amount: i64,
    pub payment_method: PaymentMethod,
    pub payment_method_label: &'static str,
    pub payment_reference: String,
    pub payment_date: NaiveDate,
    pub payment_date_label: String,
    pub payment_status: PaymentRecordStatus,
    pub payment_status_label: &'static str,
    pub verified_by: Option<i64>,
    pub created_at: DateTimeWithTimeZone,
}

impl From<payment_history::Model> for PaymentView {
    fn from(payment: payment_history::Model) -> Self {
        Self {
            id: payment.id,
            amount: payment.amount,
            payment_method: payment.payment_method,
            payment_method_label: payment_method_label(payment.payment_method),
            payment_reference: payment.payment_reference,
            payment_date: payment.payment_date,
            payment_date_label: thai_date(payment.payment_date),
            payment_status: payment.payment_status,
            payment_status_label: payment_record_status_label(payment.payment_status),
            verified_by: payment.updated_by,
            created_at: payment.created_at,
        }
    }
}

/// Everything shown on a request's detail page.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestDetail {
    pub request: RequestView,
    pub student: StudentView,
    /// Newest first.
    pub history: Vec<HistoryView>,
    pub attachments: Vec<AttachmentView>,
    /// Newest first.
    pub payments: Vec<PaymentView>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thai_date() {
        let date = NaiveDate::from_ymd_opt(2025, 10, 18).unwrap_or_default();
        assert_eq!(thai_date(date), "18 ตุลาคม 2568");

        let date = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap_or_default();
        assert_eq!(thai_date(date), "5 มกราคม 2567");
    }

    #[test]
    fn test_labels() {
        assert_eq!(status_label(RequestStatus::ReadyForPickup), "พร้อมให้รับเอกสาร");
        assert_eq!(
            status_label(RequestStatus::AwaitingVerification),
            "รอการตรวจสอบการชำระเงิน"
        );
        assert_eq!(
            document_type_label(DocumentType::Transcript),
            "ใบแสดงผลการเรียน (Transcript)"
        );
        assert_eq!(delivery_method_label(DeliveryMethod::Postal), "จัดส่งทางไปรษณีย์");
    }
    #[test]
    fn test_request_view_serializes_camel_case() {
        use chrono::{FixedOffset, TimeZone};
        use docreq_db::test_utils::fixtures;

        let created = FixedOffset::east_opt(7 * 3600)
            .and_then(|tz| tz.with_ymd_and_hms(2025, 10, 17, 9, 0, 0).single())
            .unwrap_or_default();
        let mut request = fixtures::request(7, RequestStatus::Pending);
        request.copies = 1;
        request.document_fee = 100;
        request.total_fee = 100;
        request.created_at = created;
        request.updated_at = created;

        let view = RequestView::new(request, &ProcessingCalendar::default());
        let json = serde_json::to_value(&view).unwrap_or_default();

        assert_eq!(json["status"], "pending");
        assert_eq!(json["documentType"], "transcript");
        assert_eq!(json["totalFee"], 100);
        assert_eq!(json["estimatedWorkingDays"], 2);
        // Friday plus two working days lands on Tuesday.
        assert_eq!(json["estimatedCompletion"], "2025-10-21");
        assert_eq!(json["createdAtLabel"], "17 ตุลาคม 2568");
    }
}
