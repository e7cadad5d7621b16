use crate::domain::{
    ClassRow, Exam, FeeTotals, GradeDistribution, ReportTable, SchoolClass, Student,
    StudentBalance, StudentReport, SubjectAverage, format_cents,
};

/// Builders turning typed engine output into renderer-agnostic tables.
/// The CLI prints them, the exporter serializes them; a PDF renderer
/// would consume the same structure.

pub fn marksheet_table(
    student: &Student,
    class: &SchoolClass,
    exam: &Exam,
    report: &StudentReport,
) -> ReportTable {
    let mut table = ReportTable::new("Student Marksheet", vec!["Subject", "Score", "Grade"])
        .with_meta(
            "Student",
            format!("{} ({})", student.name, student.admission_number),
        )
        .with_meta("Exam", exam.label())
        .with_meta("Class", class.label());

    for row in &report.rows {
        table.push_row(vec![
            row.subject_name.clone(),
            format!("{:.0}", row.score),
            row.grade.to_string(),
        ]);
    }
    table.push_row(vec![
        "Total Marks".into(),
        format!("{:.0}", report.total),
        String::new(),
    ]);
    table.push_row(vec![
        "Average Score".into(),
        format!("{:.2}", report.average),
        report.average_grade.to_string(),
    ]);

    table
}

pub fn class_performance_table(
    class: &SchoolClass,
    exam: &Exam,
    rows: &[ClassRow],
) -> ReportTable {
    let mut table = ReportTable::new(
        "Class Performance Report",
        vec!["Rank", "Adm No", "Student Name", "Total Marks", "Average (%)", "Grade"],
    )
    .with_meta("Class", class.label())
    .with_meta("Exam", exam.label());

    for (idx, row) in rows.iter().enumerate() {
        table.push_row(vec![
            (idx + 1).to_string(),
            row.admission_number.clone(),
            row.student_name.clone(),
            format!("{:.0}", row.total),
            format!("{:.2}", row.average),
            row.grade.to_string(),
        ]);
    }

    table
}

pub fn subject_analysis_table(exam: Option<&Exam>, averages: &[SubjectAverage]) -> ReportTable {
    let mut table = ReportTable::new(
        "Subject Analysis",
        vec!["Code", "Subject", "Entries", "Average Score"],
    );
    if let Some(exam) = exam {
        table = table.with_meta("Exam", exam.label());
    }

    for avg in averages {
        table.push_row(vec![
            avg.subject_code.clone(),
            avg.subject_name.clone(),
            avg.entry_count.to_string(),
            format!("{:.2}", avg.average_score),
        ]);
    }

    table
}

pub fn grade_distribution_table(
    class: Option<&SchoolClass>,
    exam: &Exam,
    distribution: &GradeDistribution,
) -> ReportTable {
    let mut table = ReportTable::new("Grade Distribution", vec!["Grade", "Students"])
        .with_meta("Exam", exam.label());
    if let Some(class) = class {
        table = table.with_meta("Class", class.label());
    }
    table = table
        .with_meta("Entries", distribution.entry_count.to_string())
        .with_meta(
            "Mean Grade",
            distribution
                .mean_grade
                .map(|g| g.to_string())
                .unwrap_or_else(|| "-".into()),
        );

    for (grade, count) in &distribution.counts {
        table.push_row(vec![grade.to_string(), count.to_string()]);
    }

    table
}

pub fn balances_table(entries: &[StudentBalance], totals: &FeeTotals) -> ReportTable {
    let mut table = ReportTable::new(
        "Outstanding Fee Balances",
        vec!["Adm No", "Student Name", "Billed", "Paid", "Balance"],
    )
    .with_meta("Total Billed", format_cents(totals.total_billed))
    .with_meta("Total Paid", format_cents(totals.total_paid))
    .with_meta("Total Outstanding", format_cents(totals.total_balance));

    for entry in entries {
        table.push_row(vec![
            entry.student.admission_number.clone(),
            entry.student.name.clone(),
            format_cents(entry.total_billed),
            format_cents(entry.total_paid),
            format_cents(entry.balance),
        ]);
    }

    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Mark, Subject, student_report};

    #[test]
    fn test_marksheet_table_shape() {
        let class = SchoolClass::new("Form 1".into(), Some("A".into()));
        let student = Student::new("MHS-001".into(), "Alice Johnson".into(), class.id);
        let exam = Exam::new("Term 1 Opener".into(), "1".into(), 2024);
        let subjects = vec![Subject::new("Mathematics".into(), "121".into())];
        let marks = vec![Mark::new(student.id, subjects[0].id, exam.id, 78.0)];

        let report = student_report(&student, &exam, &marks, &subjects);
        let table = marksheet_table(&student, &class, &exam, &report);

        assert_eq!(table.headers, vec!["Subject", "Score", "Grade"]);
        // 1 subject row + total + average
        assert_eq!(table.rows.len(), 3);
        assert_eq!(table.meta[0].1, "Alice Johnson (MHS-001)");
        assert_eq!(table.rows[0], vec!["Mathematics", "78", "B"]);
    }
}
