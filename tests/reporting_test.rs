mod common;

use anyhow::Result;
use common::{StandardSchool, test_service};
use elimu::application::{AppError, ErrorKind};
use elimu::domain::Grade;

#[tokio::test]
async fn test_marksheet_totals_and_grades() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardSchool::create_with_academics(&service).await?;

    service
        .enter_mark("MHS-001", "121", "Term 1 Opener", None, 78.0)
        .await?;
    service
        .enter_mark("MHS-001", "101", "Term 1 Opener", None, 82.0)
        .await?;

    let marksheet = service.marksheet("MHS-001", "Term 1 Opener", None).await?;
    assert_eq!(marksheet.report.rows.len(), 2);
    assert_eq!(marksheet.report.total, 160.0);
    assert_eq!(marksheet.report.average, 80.0);
    assert_eq!(marksheet.report.average_grade, Grade::A);

    // Printable table: one row per subject, plus total and average rows
    assert_eq!(marksheet.table.rows.len(), 4);
    assert_eq!(marksheet.table.meta[0].1, "Alice Wanjiku (MHS-001)");
    let last = marksheet.table.rows.last().unwrap();
    assert_eq!(last, &vec!["Average Score".to_string(), "80.00".into(), "A".into()]);

    Ok(())
}

#[tokio::test]
async fn test_mark_reentry_overwrites() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardSchool::create_with_academics(&service).await?;

    service
        .enter_mark("MHS-001", "121", "Term 1 Opener", None, 55.0)
        .await?;
    service
        .enter_mark("MHS-001", "121", "Term 1 Opener", None, 72.0)
        .await?;

    let marks = service.list_marks(Some("Term 1 Opener"), Some("MHS-001")).await?;
    assert_eq!(marks.len(), 1);
    assert_eq!(marks[0].score, 72.0);

    Ok(())
}

#[tokio::test]
async fn test_out_of_range_scores_rejected() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardSchool::create_with_academics(&service).await?;

    for score in [-1.0, 100.5, f64::NAN] {
        let err = service
            .enter_mark("MHS-001", "121", "Term 1 Opener", None, score)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidScore { .. }));
    }

    Ok(())
}

#[tokio::test]
async fn test_class_performance_ranking_with_tiebreak() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardSchool::create_with_academics(&service).await?;

    // MHS-001 and MHS-003 tie on total; admission order breaks the tie
    service
        .enter_mark("MHS-001", "121", "Term 1 Opener", None, 80.0)
        .await?;
    service
        .enter_mark("MHS-002", "121", "Term 1 Opener", None, 50.0)
        .await?;
    service
        .enter_mark("MHS-003", "121", "Term 1 Opener", None, 80.0)
        .await?;

    let performance = service
        .class_performance("Form 1", Some("A"), "Term 1 Opener", None)
        .await?;
    let order: Vec<&str> = performance
        .rows
        .iter()
        .map(|r| r.admission_number.as_str())
        .collect();
    assert_eq!(order, vec!["MHS-001", "MHS-003", "MHS-002"]);

    // Ranks in the table are 1-based
    assert_eq!(performance.table.rows[0][0], "1");
    assert_eq!(performance.table.rows[2][0], "3");

    Ok(())
}

#[tokio::test]
async fn test_student_without_marks_ranks_last_with_zero() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardSchool::create_with_academics(&service).await?;

    service
        .enter_mark("MHS-002", "121", "Term 1 Opener", None, 35.0)
        .await?;

    let performance = service
        .class_performance("Form 1", Some("A"), "Term 1 Opener", None)
        .await?;
    assert_eq!(performance.rows.len(), 3);
    let last = performance.rows.last().unwrap();
    assert_eq!(last.subject_count, 0);
    assert_eq!(last.total, 0.0);
    assert_eq!(last.grade, Grade::D);

    Ok(())
}

#[tokio::test]
async fn test_subject_analysis_scoped_to_exam() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardSchool::create_with_academics(&service).await?;
    service
        .add_exam("Term 1 Mid-Term".into(), "1".into(), 2026)
        .await?;

    service
        .enter_mark("MHS-001", "121", "Term 1 Opener", None, 78.0)
        .await?;
    service
        .enter_mark("MHS-002", "121", "Term 1 Opener", None, 65.0)
        .await?;
    service
        .enter_mark("MHS-003", "121", "Term 1 Opener", None, 71.0)
        .await?;
    service
        .enter_mark("MHS-001", "121", "Term 1 Mid-Term", None, 10.0)
        .await?;

    let (averages, _) = service.subject_analysis(Some("Term 1 Opener"), None).await?;
    let maths = averages.iter().find(|a| a.subject_code == "121").unwrap();
    assert_eq!(maths.average_score, 71.33);
    assert_eq!(maths.entry_count, 3);

    // School-wide analysis folds both exams in
    let (all, _) = service.subject_analysis(None, None).await?;
    let maths_all = all.iter().find(|a| a.subject_code == "121").unwrap();
    assert_eq!(maths_all.entry_count, 4);

    Ok(())
}

#[tokio::test]
async fn test_grade_distribution_counts_every_band() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardSchool::create_with_academics(&service).await?;

    service
        .enter_mark("MHS-001", "121", "Term 1 Opener", None, 85.0)
        .await?;
    service
        .enter_mark("MHS-002", "121", "Term 1 Opener", None, 45.0)
        .await?;
    service
        .enter_mark("MHS-003", "121", "Term 1 Opener", None, 62.0)
        .await?;

    let report = service
        .grade_distribution(Some("Form 1"), Some("A"), "Term 1 Opener", None)
        .await?;
    assert_eq!(report.distribution.entry_count, 3);
    assert_eq!(
        report.distribution.counts,
        vec![(Grade::A, 1), (Grade::B, 1), (Grade::C, 1), (Grade::D, 0)]
    );

    // Table carries one row per band even for empty bands
    assert_eq!(report.table.rows.len(), 4);

    Ok(())
}

#[tokio::test]
async fn test_exam_disambiguation_by_year() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardSchool::create_with_academics(&service).await?;
    service
        .add_exam("Term 1 Opener".into(), "1".into(), 2027)
        .await?;

    service
        .enter_mark("MHS-001", "121", "Term 1 Opener", Some(2027), 90.0)
        .await?;

    // 2026 sitting has no marks; 2027 sitting has one
    let m2026 = service.marksheet("MHS-001", "Term 1 Opener", Some(2026)).await?;
    assert!(m2026.report.rows.is_empty());
    let m2027 = service.marksheet("MHS-001", "Term 1 Opener", Some(2027)).await?;
    assert_eq!(m2027.report.rows.len(), 1);

    Ok(())
}

#[tokio::test]
async fn test_reports_for_unknown_references_fail() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardSchool::create_with_academics(&service).await?;

    let err = service
        .marksheet("MHS-999", "Term 1 Opener", None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = service
        .class_performance("Form 9", None, "Term 1 Opener", None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    Ok(())
}
