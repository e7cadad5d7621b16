use thiserror::Error;
use tracing::warn;

use crate::domain::{Cents, InvoiceUpdateError, format_cents};
use crate::storage::InconsistentInvoiceRow;

/// Broad classification of an application error, for callers that
/// dispatch on kind rather than on individual variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    InvariantViolation,
    Conflict,
    Storage,
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Student not found: {0}")]
    StudentNotFound(String),

    #[error("Student already exists: {0}")]
    StudentAlreadyExists(String),

    #[error("Class not found: {0}")]
    ClassNotFound(String),

    #[error("Class already exists: {0}")]
    ClassAlreadyExists(String),

    #[error("Subject not found: {0}")]
    SubjectNotFound(String),

    #[error("Subject already exists: {0}")]
    SubjectAlreadyExists(String),

    #[error("Exam not found: {0}")]
    ExamNotFound(String),

    #[error("Exam already exists: {0}")]
    ExamAlreadyExists(String),

    #[error("Invoice not found: {0}")]
    InvoiceNotFound(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid score {score}: must be between 0 and 100")]
    InvalidScore { score: f64 },

    #[error("Payment of {} exceeds outstanding balance of {}", format_cents(*.requested), format_cents(*.balance))]
    Overpayment { requested: Cents, balance: Cents },

    #[error("Invoice edit rejected: {0}")]
    InvalidEdit(InvoiceUpdateError),

    #[error("Invoice {invoice_id} balance is inconsistent with its totals")]
    BalanceInconsistent { invoice_id: String },

    #[error("Concurrent updates to invoice {invoice_id}: gave up after {attempts} attempts")]
    Conflict { invoice_id: String, attempts: u32 },

    #[error("Database error: {0}")]
    Database(anyhow::Error),
}

/// Storage errors fold into `Database`, except the typed
/// derived-column check from `row_to_invoice`, which is a broken
/// invariant rather than an infrastructure failure.
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<InconsistentInvoiceRow>() {
            Ok(row) => {
                warn!(
                    invoice_id = %row.invoice_id,
                    stored_balance = row.stored_balance,
                    stored_status = %row.stored_status,
                    "invoice derived columns disagree with its totals"
                );
                AppError::BalanceInconsistent {
                    invoice_id: row.invoice_id,
                }
            }
            Err(err) => AppError::Database(err),
        }
    }
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::StudentNotFound(_)
            | AppError::ClassNotFound(_)
            | AppError::SubjectNotFound(_)
            | AppError::ExamNotFound(_)
            | AppError::InvoiceNotFound(_) => ErrorKind::NotFound,

            AppError::StudentAlreadyExists(_)
            | AppError::ClassAlreadyExists(_)
            | AppError::SubjectAlreadyExists(_)
            | AppError::ExamAlreadyExists(_)
            | AppError::InvalidAmount(_)
            | AppError::InvalidScore { .. }
            | AppError::Overpayment { .. }
            | AppError::InvalidEdit(_) => ErrorKind::Validation,

            AppError::BalanceInconsistent { .. } => ErrorKind::InvariantViolation,
            AppError::Conflict { .. } => ErrorKind::Conflict,
            AppError::Database(_) => ErrorKind::Storage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            AppError::StudentNotFound("MHS-001".into()).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            AppError::Overpayment {
                requested: 20_000,
                balance: 10_000
            }
            .kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            AppError::Conflict {
                invoice_id: "x".into(),
                attempts: 3
            }
            .kind(),
            ErrorKind::Conflict
        );
    }

    #[test]
    fn test_inconsistent_row_maps_to_invariant_violation() {
        let err: AppError = anyhow::Error::new(InconsistentInvoiceRow {
            invoice_id: "273cfa02".into(),
            stored_balance: 1,
            stored_status: "unpaid".into(),
        })
        .into();
        assert!(matches!(err, AppError::BalanceInconsistent { .. }));
        assert_eq!(err.kind(), ErrorKind::InvariantViolation);
    }

    #[test]
    fn test_other_storage_errors_stay_storage() {
        let err: AppError = anyhow::anyhow!("disk on fire").into();
        assert_eq!(err.kind(), ErrorKind::Storage);
    }

    #[test]
    fn test_overpayment_message_is_human_readable() {
        let err = AppError::Overpayment {
            requested: 20_000,
            balance: 10_000,
        };
        assert_eq!(
            err.to_string(),
            "Payment of 200.00 exceeds outstanding balance of 100.00"
        );
    }
}
