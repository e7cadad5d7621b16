mod common;

use anyhow::Result;
use chrono::Utc;
use common::{StandardSchool, parse_date, parse_day, test_service};
use elimu::application::{AppError, ErrorKind, SchoolService};
use elimu::domain::{BalanceSortKey, InvoiceStatus};

#[tokio::test]
async fn test_invoice_issue_and_payment_roundtrip() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardSchool::create_basic(&service).await?;

    // Bill KES 10,000.00
    let invoice = StandardSchool::bill_student(&service, "MHS-001", 1_000_000).await?;
    assert_eq!(invoice.status(), InvoiceStatus::Unpaid);
    assert_eq!(invoice.balance(), 1_000_000);

    // First installment: 600.00
    let receipt = service
        .record_payment(invoice.id, 60_000, parse_date("2026-09-01"), None)
        .await?;
    assert_eq!(receipt.invoice.paid_amount, 60_000);
    assert_eq!(receipt.invoice.status(), InvoiceStatus::Partial);
    assert_eq!(receipt.student_name, "Alice Wanjiku");

    // Second installment settles it exactly
    let receipt = service
        .record_payment(invoice.id, 940_000, parse_date("2026-09-15"), None)
        .await?;
    assert_eq!(receipt.invoice.paid_amount, 1_000_000);
    assert_eq!(receipt.invoice.balance(), 0);
    assert_eq!(receipt.invoice.status(), InvoiceStatus::Paid);

    // The stored invoice agrees with the receipt
    let stored = service.get_invoice(invoice.id).await?;
    assert_eq!(stored.paid_amount, 1_000_000);
    assert_eq!(stored.status(), InvoiceStatus::Paid);

    // Both payments were logged
    let payments = service.list_payments(Some("MHS-001")).await?;
    assert_eq!(payments.len(), 2);

    Ok(())
}

#[tokio::test]
async fn test_overpayment_is_rejected_and_invoice_unchanged() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardSchool::create_basic(&service).await?;

    let invoice = StandardSchool::bill_student(&service, "MHS-001", 100_000).await?;
    service
        .record_payment(invoice.id, 60_000, Utc::now(), None)
        .await?;

    // Balance is 400.00; paying 500.00 must fail
    let err = service
        .record_payment(invoice.id, 50_000, Utc::now(), None)
        .await
        .unwrap_err();
    match err {
        AppError::Overpayment { requested, balance } => {
            assert_eq!(requested, 50_000);
            assert_eq!(balance, 40_000);
        }
        other => panic!("expected overpayment error, got {other}"),
    }

    // Nothing was written
    let stored = service.get_invoice(invoice.id).await?;
    assert_eq!(stored.paid_amount, 60_000);
    assert_eq!(service.list_payments(Some("MHS-001")).await?.len(), 1);

    Ok(())
}

#[tokio::test]
async fn test_zero_and_negative_payments_are_rejected() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardSchool::create_basic(&service).await?;
    let invoice = StandardSchool::bill_student(&service, "MHS-001", 100_000).await?;

    for amount in [0, -5_000] {
        let err = service
            .record_payment(invoice.id, amount, Utc::now(), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    Ok(())
}

#[tokio::test]
async fn test_negative_invoice_amount_is_rejected() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardSchool::create_basic(&service).await?;

    let err = service
        .issue_invoice("MHS-001", -100, parse_day("2026-09-30"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    Ok(())
}

#[tokio::test]
async fn test_quick_log_applies_to_oldest_open_invoice() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardSchool::create_basic(&service).await?;

    let newer = service
        .issue_invoice("MHS-001", 100_000, parse_day("2026-12-01"))
        .await?;
    let older = service
        .issue_invoice("MHS-001", 100_000, parse_day("2026-09-30"))
        .await?;

    let receipt = service
        .record_payment_for_student("MHS-001", 30_000, Utc::now(), Some("MPESA-XYZ".into()))
        .await?;
    assert_eq!(receipt.invoice.id, older.id);
    assert_eq!(receipt.payment.reference.as_deref(), Some("MPESA-XYZ"));

    // The newer invoice is untouched
    let stored_newer = service.get_invoice(newer.id).await?;
    assert_eq!(stored_newer.paid_amount, 0);

    Ok(())
}

#[tokio::test]
async fn test_quick_log_with_no_open_invoice_fails() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardSchool::create_basic(&service).await?;

    let err = service
        .record_payment_for_student("MHS-001", 10_000, Utc::now(), None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    Ok(())
}

#[tokio::test]
async fn test_edit_invoice_recomputes_balance_and_status() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardSchool::create_basic(&service).await?;

    let invoice = StandardSchool::bill_student(&service, "MHS-001", 1_000_000).await?;
    service
        .record_payment(invoice.id, 400_000, Utc::now(), None)
        .await?;

    // Fee waiver drops the bill to exactly what was paid
    let edited = service.edit_invoice(invoice.id, 400_000, None).await?;
    assert_eq!(edited.amount, 400_000);
    assert_eq!(edited.paid_amount, 400_000);
    assert_eq!(edited.balance(), 0);
    assert_eq!(edited.status(), InvoiceStatus::Paid);

    Ok(())
}

#[tokio::test]
async fn test_edit_cannot_set_paid_above_billed() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardSchool::create_basic(&service).await?;
    let invoice = StandardSchool::bill_student(&service, "MHS-001", 100_000).await?;

    let err = service
        .edit_invoice(invoice.id, 100_000, Some(150_000))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    Ok(())
}

#[tokio::test]
async fn test_status_transitions_at_boundaries() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardSchool::create_basic(&service).await?;

    // A zero-amount invoice is born settled
    let free = service
        .issue_invoice("MHS-002", 0, parse_day("2026-09-30"))
        .await?;
    assert_eq!(free.status(), InvoiceStatus::Paid);

    let invoice = StandardSchool::bill_student(&service, "MHS-001", 100_000).await?;
    assert_eq!(invoice.status(), InvoiceStatus::Unpaid);

    // The smallest possible payment flips Unpaid -> Partial
    let receipt = service.record_payment(invoice.id, 1, Utc::now(), None).await?;
    assert_eq!(receipt.invoice.status(), InvoiceStatus::Partial);

    // Settling the rest flips Partial -> Paid
    let receipt = service
        .record_payment(invoice.id, 99_999, Utc::now(), None)
        .await?;
    assert_eq!(receipt.invoice.status(), InvoiceStatus::Paid);

    Ok(())
}

#[tokio::test]
async fn test_student_ledger_spans_multiple_invoices() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardSchool::create_basic(&service).await?;

    let first = service
        .issue_invoice("MHS-001", 500_000, parse_day("2026-04-30"))
        .await?;
    service
        .issue_invoice("MHS-001", 700_000, parse_day("2026-09-30"))
        .await?;
    service
        .record_payment(first.id, 500_000, Utc::now(), None)
        .await?;

    let ledger = service.student_ledger("MHS-001").await?;
    assert_eq!(ledger.invoices.len(), 2);
    assert_eq!(ledger.payments.len(), 1);
    assert_eq!(ledger.totals.total_billed, 1_200_000);
    assert_eq!(ledger.totals.total_paid, 500_000);
    assert_eq!(ledger.totals.total_balance, 700_000);

    Ok(())
}

#[tokio::test]
async fn test_outstanding_balances_exclude_settled_students() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardSchool::create_basic(&service).await?;

    let paid_up = StandardSchool::bill_student(&service, "MHS-001", 100_000).await?;
    service
        .record_payment(paid_up.id, 100_000, Utc::now(), None)
        .await?;
    StandardSchool::bill_student(&service, "MHS-003", 200_000).await?;
    StandardSchool::bill_student(&service, "MHS-002", 300_000).await?;

    let (entries, table) = service
        .outstanding_balances(BalanceSortKey::AdmissionNumber)
        .await?;
    let adm: Vec<&str> = entries
        .iter()
        .map(|e| e.student.admission_number.as_str())
        .collect();
    assert_eq!(adm, vec!["MHS-002", "MHS-003"]);
    assert_eq!(table.rows.len(), 2);

    // Name sort reorders the same two students
    let (by_name, _) = service.outstanding_balances(BalanceSortKey::Name).await?;
    assert_eq!(by_name[0].student.name, "Brian Otieno");
    assert_eq!(by_name[1].student.name, "Cynthia Mwende");

    Ok(())
}

#[tokio::test]
async fn test_fee_summary_totals() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardSchool::create_basic(&service).await?;

    let a = StandardSchool::bill_student(&service, "MHS-001", 1_000_000).await?;
    StandardSchool::bill_student(&service, "MHS-002", 1_000_000).await?;
    service.record_payment(a.id, 250_000, Utc::now(), None).await?;

    let totals = service.fee_summary().await?;
    assert_eq!(totals.total_billed, 2_000_000);
    assert_eq!(totals.total_paid, 250_000);
    assert_eq!(totals.total_balance, 1_750_000);

    Ok(())
}

#[tokio::test]
async fn test_tampered_invoice_row_is_an_invariant_violation() -> Result<()> {
    let temp_dir = tempfile::TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let service = SchoolService::init(db_path.to_str().unwrap()).await?;
    StandardSchool::create_basic(&service).await?;
    let invoice = StandardSchool::bill_student(&service, "MHS-001", 100_000).await?;

    // Rewrite the derived balance column behind the application's back
    let pool = sqlx::SqlitePool::connect(&format!("sqlite:{}", db_path.display())).await?;
    sqlx::query("UPDATE invoices SET balance = 1 WHERE id = ?")
        .bind(invoice.id.to_string())
        .execute(&pool)
        .await?;

    let err = service.get_invoice(invoice.id).await.unwrap_err();
    assert!(matches!(err, AppError::BalanceInconsistent { .. }));
    assert_eq!(err.kind(), ErrorKind::InvariantViolation);

    Ok(())
}

#[tokio::test]
async fn test_duplicate_admission_number_rejected() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardSchool::create_basic(&service).await?;

    let err = service
        .add_student(
            "MHS-001".into(),
            "Imposter".into(),
            "Form 1",
            Some("A"),
            None,
            None,
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::StudentAlreadyExists(_)));

    Ok(())
}
