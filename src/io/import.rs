use anyhow::Result;
use chrono::NaiveDate;
use std::io::Read;

use crate::application::{AppError, SchoolService};

/// Result of an import operation
#[derive(Debug, Clone)]
pub struct ImportResult {
    pub imported: usize,
    pub skipped: usize,
    pub errors: Vec<ImportError>,
}

/// Error that occurred during import
#[derive(Debug, Clone)]
pub struct ImportError {
    pub line: usize,
    pub field: Option<String>,
    pub error: String,
}

/// Options for import operations
#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    pub dry_run: bool,
    pub skip_duplicates: bool,
}

/// Importer for bulk-loading school records
pub struct Importer<'a> {
    service: &'a SchoolService,
}

impl<'a> Importer<'a> {
    pub fn new(service: &'a SchoolService) -> Self {
        Self { service }
    }

    /// Bulk mark entry from CSV with columns:
    /// `admission_number,subject_code,score`. All rows land in the
    /// given exam. Invalid rows are reported with their line number and
    /// do not abort the rest of the file. Re-entry overwrites unless
    /// `skip_duplicates` is set, which leaves existing scores untouched.
    pub async fn import_marks_csv<R: Read>(
        &self,
        reader: R,
        exam_name: &str,
        exam_year: Option<i32>,
        options: ImportOptions,
    ) -> Result<ImportResult> {
        let exam = self.service.get_exam(exam_name, exam_year).await?;
        let mut csv_reader = csv::Reader::from_reader(reader);
        let mut imported = 0;
        let mut skipped = 0;
        let mut errors = Vec::new();

        for (line_num, result) in csv_reader.records().enumerate() {
            let line = line_num + 2; // +2 for header and 0-indexing

            let record = match result {
                Ok(r) => r,
                Err(e) => {
                    errors.push(ImportError {
                        line,
                        field: None,
                        error: format!("CSV parse error: {}", e),
                    });
                    continue;
                }
            };

            let admission_number = record.get(0).unwrap_or("").trim();
            let subject_code = record.get(1).unwrap_or("").trim();
            let score_str = record.get(2).unwrap_or("").trim();

            let score: f64 = match score_str.parse() {
                Ok(s) => s,
                Err(_) => {
                    errors.push(ImportError {
                        line,
                        field: Some("score".to_string()),
                        error: format!("Invalid score: '{}'", score_str),
                    });
                    continue;
                }
            };

            if options.dry_run {
                // Validate references without writing
                let student_ok = self.service.get_student(admission_number).await.is_ok();
                let subject_ok = self.service.get_subject(subject_code).await.is_ok();
                let score_ok = (0.0..=100.0).contains(&score);
                if student_ok && subject_ok && score_ok {
                    imported += 1;
                } else {
                    errors.push(ImportError {
                        line,
                        field: None,
                        error: format!(
                            "Validation failed (student: {}, subject: {}, score in range: {})",
                            student_ok, subject_ok, score_ok
                        ),
                    });
                }
                continue;
            }

            if options.skip_duplicates {
                // Missing references fall through to enter_mark's own error
                let already_marked = match (
                    self.service.get_student(admission_number).await,
                    self.service.get_subject(subject_code).await,
                ) {
                    (Ok(student), Ok(subject)) => self
                        .service
                        .repository()
                        .list_marks(Some(exam.id), Some(student.id))
                        .await?
                        .iter()
                        .any(|m| m.subject_id == subject.id),
                    _ => false,
                };
                if already_marked {
                    skipped += 1;
                    continue;
                }
            }

            match self
                .service
                .enter_mark(admission_number, subject_code, exam_name, exam_year, score)
                .await
            {
                Ok(_) => imported += 1,
                Err(e) => {
                    errors.push(ImportError {
                        line,
                        field: None,
                        error: format!("Mark entry failed: {}", e),
                    });
                }
            }
        }

        Ok(ImportResult {
            imported,
            skipped,
            errors,
        })
    }

    /// Student roster import from CSV with columns:
    /// `admission_number,name,class,stream,guardian_name,guardian_phone,date_of_birth`.
    /// Trailing columns may be empty. Classes must already exist.
    pub async fn import_students_csv<R: Read>(
        &self,
        reader: R,
        options: ImportOptions,
    ) -> Result<ImportResult> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let mut imported = 0;
        let mut skipped = 0;
        let mut errors = Vec::new();

        for (line_num, result) in csv_reader.records().enumerate() {
            let line = line_num + 2;

            let record = match result {
                Ok(r) => r,
                Err(e) => {
                    errors.push(ImportError {
                        line,
                        field: None,
                        error: format!("CSV parse error: {}", e),
                    });
                    continue;
                }
            };

            let admission_number = record.get(0).unwrap_or("").trim().to_string();
            let name = record.get(1).unwrap_or("").trim().to_string();
            let class_name = record.get(2).unwrap_or("").trim();
            let stream = record.get(3).map(str::trim).filter(|s| !s.is_empty());
            let guardian_name = record
                .get(4)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from);
            let guardian_phone = record
                .get(5)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from);
            let dob_str = record.get(6).map(str::trim).filter(|s| !s.is_empty());

            if admission_number.is_empty() || name.is_empty() || class_name.is_empty() {
                errors.push(ImportError {
                    line,
                    field: None,
                    error: "admission_number, name and class are required".to_string(),
                });
                continue;
            }

            let date_of_birth = match dob_str {
                Some(s) => match NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                    Ok(d) => Some(d),
                    Err(_) => {
                        errors.push(ImportError {
                            line,
                            field: Some("date_of_birth".to_string()),
                            error: format!("Invalid date: '{}' (expected YYYY-MM-DD)", s),
                        });
                        continue;
                    }
                },
                None => None,
            };

            if options.dry_run {
                let class_ok = self.service.get_class(class_name, stream).await.is_ok();
                let new_student = self
                    .service
                    .get_student(&admission_number)
                    .await
                    .is_err();
                if class_ok && new_student {
                    imported += 1;
                } else {
                    errors.push(ImportError {
                        line,
                        field: None,
                        error: format!(
                            "Validation failed (class exists: {}, admission number free: {})",
                            class_ok, new_student
                        ),
                    });
                }
                continue;
            }

            match self
                .service
                .add_student(
                    admission_number,
                    name,
                    class_name,
                    stream,
                    guardian_name,
                    guardian_phone,
                    date_of_birth,
                )
                .await
            {
                Ok(_) => imported += 1,
                Err(AppError::StudentAlreadyExists(_)) if options.skip_duplicates => {
                    skipped += 1;
                }
                Err(e) => {
                    errors.push(ImportError {
                        line,
                        field: None,
                        error: format!("Student creation failed: {}", e),
                    });
                }
            }
        }

        Ok(ImportResult {
            imported,
            skipped,
            errors,
        })
    }
}
