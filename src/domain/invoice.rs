use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Cents, StudentId, format_cents};

pub type InvoiceId = Uuid;

/// Settlement state of an invoice, derived from its totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InvoiceStatus {
    Paid,
    Partial,
    Unpaid,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Partial => "partial",
            InvoiceStatus::Unpaid => "unpaid",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "paid" => Some(InvoiceStatus::Paid),
            "partial" => Some(InvoiceStatus::Partial),
            "unpaid" => Some(InvoiceStatus::Unpaid),
            _ => None,
        }
    }
}

impl std::fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The single status rule. Every call site derives status through this
/// function; it is never reimplemented inline.
pub fn compute_status(amount: Cents, paid_amount: Cents) -> InvoiceStatus {
    let balance = amount - paid_amount;
    if balance <= 0 {
        InvoiceStatus::Paid
    } else if paid_amount > 0 {
        InvoiceStatus::Partial
    } else {
        InvoiceStatus::Unpaid
    }
}

/// A billing record for one student. A student may hold any number of
/// invoices; ledger totals sum across all of them.
///
/// Balance and status are derived from `amount` and `paid_amount` and
/// are exposed only as methods, so the struct cannot carry a stale copy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    pub student_id: StudentId,
    /// Total billed in cents (never negative)
    pub amount: Cents,
    /// Cumulative amount paid in cents, `0 <= paid_amount <= amount`
    pub paid_amount: Cents,
    pub due_date: NaiveDate,
    pub issued_at: DateTime<Utc>,
    /// Optimistic-concurrency token, incremented on every stored update
    pub version: i64,
}

impl Invoice {
    /// Issue a new invoice: nothing paid yet, status Unpaid.
    pub fn issue(student_id: StudentId, amount: Cents, due_date: NaiveDate) -> Self {
        assert!(amount >= 0, "Invoice amount must not be negative");
        Self {
            id: Uuid::new_v4(),
            student_id,
            amount,
            paid_amount: 0,
            due_date,
            issued_at: Utc::now(),
            version: 0,
        }
    }

    pub fn balance(&self) -> Cents {
        self.amount - self.paid_amount
    }

    pub fn status(&self) -> InvoiceStatus {
        compute_status(self.amount, self.paid_amount)
    }

    /// Apply a payment, returning the updated invoice. Rejects
    /// non-positive amounts and payments that would push `paid_amount`
    /// past `amount`; the ledger never clamps silently.
    pub fn apply_payment(&self, amount: Cents) -> Result<Invoice, InvoiceUpdateError> {
        if amount <= 0 {
            return Err(InvoiceUpdateError::NonPositivePayment { amount });
        }
        if self.paid_amount + amount > self.amount {
            return Err(InvoiceUpdateError::Overpayment {
                balance: self.balance(),
                requested: amount,
            });
        }
        let mut updated = self.clone();
        updated.paid_amount += amount;
        Ok(updated)
    }

    /// Manual edit of both totals (accountant correction flow).
    pub fn with_totals(
        &self,
        new_amount: Cents,
        new_paid_amount: Cents,
    ) -> Result<Invoice, InvoiceUpdateError> {
        if new_amount < 0 || new_paid_amount < 0 {
            return Err(InvoiceUpdateError::NegativeTotal {
                amount: new_amount.min(new_paid_amount),
            });
        }
        if new_paid_amount > new_amount {
            return Err(InvoiceUpdateError::PaidExceedsBilled {
                amount: new_amount,
                paid_amount: new_paid_amount,
            });
        }
        let mut updated = self.clone();
        updated.amount = new_amount;
        updated.paid_amount = new_paid_amount;
        Ok(updated)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvoiceUpdateError {
    NonPositivePayment { amount: Cents },
    Overpayment { balance: Cents, requested: Cents },
    NegativeTotal { amount: Cents },
    PaidExceedsBilled { amount: Cents, paid_amount: Cents },
}

impl std::fmt::Display for InvoiceUpdateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvoiceUpdateError::NonPositivePayment { amount } => {
                write!(f, "Payment amount must be positive, got {}", format_cents(*amount))
            }
            InvoiceUpdateError::Overpayment { balance, requested } => {
                write!(
                    f,
                    "Payment of {} exceeds outstanding balance of {}",
                    format_cents(*requested),
                    format_cents(*balance)
                )
            }
            InvoiceUpdateError::NegativeTotal { amount } => {
                write!(f, "Invoice totals must not be negative, got {}", format_cents(*amount))
            }
            InvoiceUpdateError::PaidExceedsBilled { amount, paid_amount } => {
                write!(
                    f,
                    "Paid amount {} exceeds billed amount {}",
                    format_cents(*paid_amount),
                    format_cents(*amount)
                )
            }
        }
    }
}

impl std::error::Error for InvoiceUpdateError {}
