use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::application::SchoolService;
use crate::domain::{
    BalanceSortKey, Exam, Invoice, Mark, Payment, ReportTable, SchoolClass, Student, Subject,
    format_cents,
};

/// Database snapshot for full export/import
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSnapshot {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub classes: Vec<SchoolClass>,
    pub students: Vec<Student>,
    pub subjects: Vec<Subject>,
    pub exams: Vec<Exam>,
    pub marks: Vec<Mark>,
    pub invoices: Vec<Invoice>,
    pub payments: Vec<Payment>,
}

/// Exporter for converting school records to various formats
pub struct Exporter<'a> {
    service: &'a SchoolService,
}

impl<'a> Exporter<'a> {
    pub fn new(service: &'a SchoolService) -> Self {
        Self { service }
    }

    /// Export per-student fee balances to CSV format
    pub async fn export_balances_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let entries = self.service.all_student_balances().await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record([
            "admission_number",
            "student_name",
            "total_billed",
            "total_paid",
            "balance",
        ])?;

        let mut count = 0;
        for entry in &entries {
            csv_writer.write_record([
                entry.student.admission_number.as_str(),
                entry.student.name.as_str(),
                &format_cents(entry.total_billed),
                &format_cents(entry.total_paid),
                &format_cents(entry.balance),
            ])?;
            count += 1;
        }

        csv_writer.flush()?;
        Ok(count)
    }

    /// Export the payment log to CSV format
    pub async fn export_payments_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let payments = self.service.list_payments(None).await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record([
            "id",
            "invoice_id",
            "student_id",
            "amount",
            "paid_at",
            "reference",
        ])?;

        let mut count = 0;
        for payment in &payments {
            csv_writer.write_record([
                payment.id.to_string(),
                payment.invoice_id.to_string(),
                payment.student_id.to_string(),
                format_cents(payment.amount),
                payment.paid_at.to_rfc3339(),
                payment.reference.clone().unwrap_or_default(),
            ])?;
            count += 1;
        }

        csv_writer.flush()?;
        Ok(count)
    }

    /// Export outstanding balances (students still owing) to CSV format
    pub async fn export_outstanding_csv<W: Write>(
        &self,
        writer: W,
        sort: BalanceSortKey,
    ) -> Result<usize> {
        let (_, table) = self.service.outstanding_balances(sort).await?;
        write_table_csv(&table, writer)
    }

    /// Export full database as JSON snapshot
    pub async fn export_full_json<W: Write>(&self, mut writer: W) -> Result<DatabaseSnapshot> {
        let repo = self.service.repository();
        let snapshot = DatabaseSnapshot {
            version: env!("CARGO_PKG_VERSION").to_string(),
            exported_at: Utc::now(),
            classes: repo.list_classes().await?,
            students: repo.list_students(None).await?,
            subjects: repo.list_subjects().await?,
            exams: repo.list_exams().await?,
            marks: repo.list_marks(None, None).await?,
            invoices: repo.list_invoices(None).await?,
            payments: repo.list_payments(None, None).await?,
        };

        let json = serde_json::to_string_pretty(&snapshot)?;
        writer.write_all(json.as_bytes())?;
        writer.flush()?;

        Ok(snapshot)
    }
}

/// Render any report table to CSV: the header row followed by the value
/// rows. Metadata travels with the JSON rendering, not the CSV.
pub fn write_table_csv<W: Write>(table: &ReportTable, writer: W) -> Result<usize> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(&table.headers)?;
    for row in &table.rows {
        csv_writer.write_record(row)?;
    }
    csv_writer.flush()?;
    Ok(table.rows.len())
}

/// Render any report table to pretty JSON, metadata included.
pub fn write_table_json<W: Write>(table: &ReportTable, mut writer: W) -> Result<()> {
    let json = serde_json::to_string_pretty(table)?;
    writer.write_all(json.as_bytes())?;
    writer.flush()?;
    Ok(())
}
