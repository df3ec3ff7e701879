//! Fee calculator.
//!
//! Pure function of document type, copies and delivery method. The fee
//! preview endpoint and request submission both go through
//! [`calculate_fees`].

use docreq_common::{AppError, AppResult};
use docreq_db::entities::document_request::{DeliveryMethod, DocumentType};
use serde::Serialize;

/// Flat surcharge for postal delivery.
pub const POSTAL_FEE: i64 = 50;

/// Fee breakdown for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeBreakdown {
    pub base_fee: i64,
    pub total_document_fee: i64,
    pub delivery_fee: i64,
    pub total_fee: i64,
}

/// Per-copy fee of a document type.
///
/// Graduation letters have no published fee and are refused rather than
/// priced at zero.
pub fn base_fee(document_type: DocumentType) -> AppResult<i64> {
    match document_type {
        DocumentType::Transcript => Ok(100),
        DocumentType::Certificate => Ok(50),
        DocumentType::Enrollment | DocumentType::General => Ok(20),
        DocumentType::Graduation => Err(AppError::UnsupportedDocumentType(
            "No fee is configured for graduation letters".to_string(),
        )),
    }
}

/// Delivery surcharge of a delivery method.
#[must_use]
pub const fn delivery_fee(delivery_method: DeliveryMethod) -> i64 {
    match delivery_method {
        DeliveryMethod::Postal => POSTAL_FEE,
        DeliveryMethod::Pickup | DeliveryMethod::Digital => 0,
    }
}

/// Calculate the fees of a request.
pub fn calculate_fees(
    document_type: DocumentType,
    copies: i32,
    delivery_method: DeliveryMethod,
) -> AppResult<FeeBreakdown> {
    if copies < 1 {
        return Err(AppError::Validation(format!(
            "copies must be a positive integer, got {copies}"
        )));
    }

    let base_fee = base_fee(document_type)?;
    let total_document_fee = base_fee * i64::from(copies);
    let delivery_fee = delivery_fee(delivery_method);

    Ok(FeeBreakdown {
        base_fee,
        total_document_fee,
        delivery_fee,
        total_fee: total_document_fee + delivery_fee,
    })
}
