use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type StudentId = Uuid;
pub type ClassId = Uuid;
pub type SubjectId = Uuid;
pub type ExamId = Uuid;

/// A student on the school roster. The admission number is the natural
/// key used everywhere a human refers to a student.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Student {
    pub id: StudentId,
    pub admission_number: String,
    pub name: String,
    pub class_id: ClassId,
    pub guardian_name: Option<String>,
    pub guardian_phone: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

impl Student {
    pub fn new(admission_number: String, name: String, class_id: ClassId) -> Self {
        Self {
            id: Uuid::new_v4(),
            admission_number,
            name,
            class_id,
            guardian_name: None,
            guardian_phone: None,
            date_of_birth: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_guardian(
        mut self,
        name: impl Into<String>,
        phone: Option<impl Into<String>>,
    ) -> Self {
        self.guardian_name = Some(name.into());
        self.guardian_phone = phone.map(Into::into);
        self
    }

    pub fn with_date_of_birth(mut self, date_of_birth: NaiveDate) -> Self {
        self.date_of_birth = Some(date_of_birth);
        self
    }
}

/// A class (form + stream), e.g. "Form 1" stream "A".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchoolClass {
    pub id: ClassId,
    pub name: String,
    pub stream: Option<String>,
}

impl SchoolClass {
    pub fn new(name: String, stream: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            stream,
        }
    }

    /// Display label combining name and stream, e.g. "Form 1 A".
    pub fn label(&self) -> String {
        match &self.stream {
            Some(stream) => format!("{} {}", self.name, stream),
            None => self.name.clone(),
        }
    }
}

/// A taught subject, unique by code (e.g. "121" for Mathematics).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subject {
    pub id: SubjectId,
    pub name: String,
    pub code: String,
}

impl Subject {
    pub fn new(name: String, code: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            code,
        }
    }
}

/// An examination sitting, e.g. "Term 1 Opener", term 1, 2024.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exam {
    pub id: ExamId,
    pub name: String,
    pub term: String,
    pub year: i32,
}

impl Exam {
    pub fn new(name: String, term: String, year: i32) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            term,
            year,
        }
    }

    /// Display label, e.g. "Term 1 Opener - 2024".
    pub fn label(&self) -> String {
        format!("{} - {}", self.name, self.year)
    }
}

/// A recorded score for one student in one subject at one exam.
/// There is at most one mark per (student, subject, exam); re-entering a
/// score is an explicit edit, not a second record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mark {
    pub student_id: StudentId,
    pub subject_id: SubjectId,
    pub exam_id: ExamId,
    pub score: f64,
    pub recorded_at: DateTime<Utc>,
}

impl Mark {
    pub fn new(student_id: StudentId, subject_id: SubjectId, exam_id: ExamId, score: f64) -> Self {
        assert!(
            (0.0..=100.0).contains(&score),
            "Mark score must be within 0-100"
        );
        Self {
            student_id,
            subject_id,
            exam_id,
            score,
            recorded_at: Utc::now(),
        }
    }
}
