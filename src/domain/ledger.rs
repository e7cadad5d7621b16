use std::collections::HashMap;

use super::{Cents, Invoice, Student, StudentId};

/// Aggregate fee totals across a collection of invoices. Pure reduction,
/// used for the accountant's dashboard summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FeeTotals {
    pub total_billed: Cents,
    pub total_paid: Cents,
    pub total_balance: Cents,
}

pub fn aggregate_totals(invoices: &[Invoice]) -> FeeTotals {
    invoices.iter().fold(FeeTotals::default(), |mut acc, inv| {
        acc.total_billed += inv.amount;
        acc.total_paid += inv.paid_amount;
        acc.total_balance += inv.balance();
        acc
    })
}

/// Per-student fee position, summed across all of the student's invoices.
#[derive(Debug, Clone)]
pub struct StudentBalance {
    pub student: Student,
    pub total_billed: Cents,
    pub total_paid: Cents,
    pub balance: Cents,
}

/// Sort key for balance listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceSortKey {
    Name,
    AdmissionNumber,
}

impl BalanceSortKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            BalanceSortKey::Name => "name",
            BalanceSortKey::AdmissionNumber => "admission",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "name" => Some(BalanceSortKey::Name),
            "admission" | "admission_number" | "adm" => Some(BalanceSortKey::AdmissionNumber),
            _ => None,
        }
    }
}

/// Compute each student's fee position across all their invoices.
/// Students with no invoices appear with all-zero totals.
pub fn student_balances(students: &[Student], invoices: &[Invoice]) -> Vec<StudentBalance> {
    let mut billed: HashMap<StudentId, Cents> = HashMap::new();
    let mut paid: HashMap<StudentId, Cents> = HashMap::new();

    for invoice in invoices {
        *billed.entry(invoice.student_id).or_insert(0) += invoice.amount;
        *paid.entry(invoice.student_id).or_insert(0) += invoice.paid_amount;
    }

    students
        .iter()
        .map(|student| {
            let total_billed = billed.get(&student.id).copied().unwrap_or(0);
            let total_paid = paid.get(&student.id).copied().unwrap_or(0);
            StudentBalance {
                student: student.clone(),
                total_billed,
                total_paid,
                balance: total_billed - total_paid,
            }
        })
        .collect()
}

/// Students who still owe money (balance > 0), sorted by the given key.
pub fn outstanding_balances(
    students: &[Student],
    invoices: &[Invoice],
    sort: BalanceSortKey,
) -> Vec<StudentBalance> {
    let mut entries: Vec<StudentBalance> = student_balances(students, invoices)
        .into_iter()
        .filter(|entry| entry.balance > 0)
        .collect();

    match sort {
        BalanceSortKey::Name => entries.sort_by(|a, b| a.student.name.cmp(&b.student.name)),
        BalanceSortKey::AdmissionNumber => entries.sort_by(|a, b| {
            a.student
                .admission_number
                .cmp(&b.student.admission_number)
        }),
    }

    entries
}
