use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Cents, InvoiceId, StudentId};

pub type PaymentId = Uuid;

/// A payment event against an invoice. Payments are append-only and
/// immutable; corrections are made by editing the invoice totals, never
/// by rewriting payment history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub student_id: StudentId,
    pub invoice_id: InvoiceId,
    /// Amount in cents (always positive)
    pub amount: Cents,
    /// When the money changed hands
    pub paid_at: DateTime<Utc>,
    /// When we recorded this payment in the system
    pub recorded_at: DateTime<Utc>,
    /// Receipt number, M-Pesa code, bank slip reference, etc.
    pub reference: Option<String>,
}

impl Payment {
    pub fn new(
        student_id: StudentId,
        invoice_id: InvoiceId,
        amount: Cents,
        paid_at: DateTime<Utc>,
    ) -> Self {
        assert!(amount > 0, "Payment amount must be positive");
        Self {
            id: Uuid::new_v4(),
            student_id,
            invoice_id,
            amount,
            paid_at,
            recorded_at: Utc::now(),
            reference: None,
        }
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }
}
