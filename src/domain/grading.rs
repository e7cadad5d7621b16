use serde::{Deserialize, Serialize};

use super::{Exam, Mark, Student, Subject};

/// Letter grade on the school's 4-band scale.
/// The banding is a monotonic step function of the score: A >= 80,
/// B >= 60, C >= 40, D below that.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
}

/// All bands in display order, best first.
pub const GRADE_BANDS: [Grade; 4] = [Grade::A, Grade::B, Grade::C, Grade::D];

impl Grade {
    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
        }
    }
}

impl std::fmt::Display for Grade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Map a 0-100 score to its letter grade.
pub fn grade_for(score: f64) -> Grade {
    if score >= 80.0 {
        Grade::A
    } else if score >= 60.0 {
        Grade::B
    } else if score >= 40.0 {
        Grade::C
    } else {
        Grade::D
    }
}

/// Round to 2 decimal places for display figures.
fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// One row of a student marksheet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubjectScore {
    pub subject_name: String,
    pub subject_code: String,
    pub score: f64,
    pub grade: Grade,
}

/// A student's marksheet for one exam.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentReport {
    pub rows: Vec<SubjectScore>,
    pub total: f64,
    pub average: f64,
    pub average_grade: Grade,
}

/// Build a marksheet for one student at one exam. A student with no
/// recorded scores yields an empty report with average 0, never a
/// division by zero.
pub fn student_report(
    student: &Student,
    exam: &Exam,
    marks: &[Mark],
    subjects: &[Subject],
) -> StudentReport {
    let rows: Vec<SubjectScore> = marks
        .iter()
        .filter(|m| m.student_id == student.id && m.exam_id == exam.id)
        .map(|mark| {
            let subject = subjects.iter().find(|s| s.id == mark.subject_id);
            SubjectScore {
                subject_name: subject.map(|s| s.name.clone()).unwrap_or_else(|| "N/A".into()),
                subject_code: subject.map(|s| s.code.clone()).unwrap_or_else(|| "N/A".into()),
                score: mark.score,
                grade: grade_for(mark.score),
            }
        })
        .collect();

    let total: f64 = rows.iter().map(|r| r.score).sum();
    let average = if rows.is_empty() {
        0.0
    } else {
        total / rows.len() as f64
    };

    StudentReport {
        rows,
        total,
        average: round2(average),
        average_grade: grade_for(average),
    }
}

/// One row of a class performance report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassRow {
    pub admission_number: String,
    pub student_name: String,
    pub subject_count: usize,
    pub total: f64,
    pub average: f64,
    pub grade: Grade,
}

/// Lazily produce one performance row per student. Rows stream in roster
/// order so large cohorts never need to be materialized at once; callers
/// that want a ranking collect and sort (see `class_performance`).
pub fn class_performance_rows<'a>(
    students: &'a [Student],
    exam: &'a Exam,
    marks: &'a [Mark],
) -> impl Iterator<Item = ClassRow> + 'a {
    students.iter().map(move |student| {
        let mut total = 0.0;
        let mut count = 0usize;
        for mark in marks
            .iter()
            .filter(|m| m.student_id == student.id && m.exam_id == exam.id)
        {
            total += mark.score;
            count += 1;
        }
        let average = if count > 0 { total / count as f64 } else { 0.0 };

        ClassRow {
            admission_number: student.admission_number.clone(),
            student_name: student.name.clone(),
            subject_count: count,
            total,
            average: round2(average),
            grade: grade_for(average),
        }
    })
}

/// Ranked class performance: total descending, ties broken by admission
/// number ascending so the ordering is deterministic regardless of
/// roster insertion order.
pub fn class_performance(students: &[Student], exam: &Exam, marks: &[Mark]) -> Vec<ClassRow> {
    let mut rows: Vec<ClassRow> = class_performance_rows(students, exam, marks).collect();
    rows.sort_by(|a, b| {
        b.total
            .partial_cmp(&a.total)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.admission_number.cmp(&b.admission_number))
    });
    rows
}

/// Histogram of cohort grades, tallied over each student's average.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradeDistribution {
    /// Counts in fixed band order (A, B, C, D), zero-filled.
    pub counts: Vec<(Grade, usize)>,
    /// Grade of the mean of the cohort's averages; None for an empty cohort.
    pub mean_grade: Option<Grade>,
    pub entry_count: usize,
}

pub fn grade_distribution(rows: &[ClassRow]) -> GradeDistribution {
    let mut counts: Vec<(Grade, usize)> = GRADE_BANDS.iter().map(|g| (*g, 0)).collect();
    let mut sum_of_averages = 0.0;

    for row in rows {
        if let Some(entry) = counts.iter_mut().find(|(g, _)| *g == row.grade) {
            entry.1 += 1;
        }
        sum_of_averages += row.average;
    }

    let mean_grade = if rows.is_empty() {
        None
    } else {
        Some(grade_for(sum_of_averages / rows.len() as f64))
    };

    GradeDistribution {
        counts,
        mean_grade,
        entry_count: rows.len(),
    }
}

/// Mean score for one subject across all its entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubjectAverage {
    pub subject_name: String,
    pub subject_code: String,
    pub entry_count: usize,
    pub average_score: f64,
}

/// Per-subject mean score, optionally restricted to one exam, rounded to
/// 2 decimal places. Subjects with no entries report 0.
pub fn subject_averages(
    subjects: &[Subject],
    marks: &[Mark],
    exam: Option<&Exam>,
) -> Vec<SubjectAverage> {
    subjects
        .iter()
        .map(|subject| {
            let mut total = 0.0;
            let mut count = 0usize;
            for mark in marks.iter().filter(|m| {
                m.subject_id == subject.id && exam.is_none_or(|e| m.exam_id == e.id)
            }) {
                total += mark.score;
                count += 1;
            }
            let average = if count > 0 { total / count as f64 } else { 0.0 };

            SubjectAverage {
                subject_name: subject.name.clone(),
                subject_code: subject.code.clone(),
                entry_count: count,
                average_score: round2(average),
            }
        })
        .collect()
}
