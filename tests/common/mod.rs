// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use elimu::application::SchoolService;
use tempfile::TempDir;

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(SchoolService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let service = SchoolService::init(db_path.to_str().unwrap()).await?;
    Ok((service, temp_dir))
}

/// Helper to parse a date string into DateTime<Utc>
pub fn parse_date(date_str: &str) -> DateTime<Utc> {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        .and_utc()
}

/// Helper to parse a plain calendar date
pub fn parse_day(date_str: &str) -> NaiveDate {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d").unwrap()
}

/// Test fixture: standard school setup
pub struct StandardSchool;

impl StandardSchool {
    /// Create one class (Form 1 A) with three students
    pub async fn create_basic(service: &SchoolService) -> Result<()> {
        service.add_class("Form 1".into(), Some("A".into())).await?;
        service
            .add_student(
                "MHS-001".into(),
                "Alice Wanjiku".into(),
                "Form 1",
                Some("A"),
                Some("Jane Wanjiku".into()),
                Some("+254700000001".into()),
                None,
            )
            .await?;
        service
            .add_student(
                "MHS-002".into(),
                "Brian Otieno".into(),
                "Form 1",
                Some("A"),
                None,
                None,
                None,
            )
            .await?;
        service
            .add_student(
                "MHS-003".into(),
                "Cynthia Mwende".into(),
                "Form 1",
                Some("A"),
                None,
                None,
                None,
            )
            .await?;
        Ok(())
    }

    /// Basic setup plus subjects and a term exam
    pub async fn create_with_academics(service: &SchoolService) -> Result<()> {
        Self::create_basic(service).await?;
        service.add_subject("Mathematics".into(), "121".into()).await?;
        service.add_subject("English".into(), "101".into()).await?;
        service.add_subject("Chemistry".into(), "233".into()).await?;
        service
            .add_exam("Term 1 Opener".into(), "1".into(), 2026)
            .await?;
        Ok(())
    }

    /// Issue a standard term invoice (KES 10,000.00) to one student
    pub async fn bill_student(
        service: &SchoolService,
        admission: &str,
        amount: i64,
    ) -> Result<elimu::Invoice> {
        let invoice = service
            .issue_invoice(admission, amount, parse_day("2026-09-30"))
            .await?;
        Ok(invoice)
    }
}
