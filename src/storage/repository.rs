use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{Row, SqlitePool};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{
    ClassId, Exam, ExamId, Invoice, InvoiceId, InvoiceStatus, Mark, Payment, SchoolClass, Student,
    StudentId, Subject,
};

use super::MIGRATION_001_INITIAL;

/// A stored invoice whose derived columns disagree with its totals.
/// Typed (rather than a plain message) so the application layer can
/// surface it as an invariant violation instead of a storage failure.
#[derive(Debug, Error)]
#[error("invoice {invoice_id} has inconsistent derived columns (balance {stored_balance}, status {stored_status})")]
pub struct InconsistentInvoiceRow {
    pub invoice_id: String,
    pub stored_balance: i64,
    pub stored_status: String,
}

/// Repository for persisting and querying the school records.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database at the given path.
    /// Creates the database file if it doesn't exist.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    /// Initialize a new database (connect + migrate).
    pub async fn init(database_url: &str) -> Result<Self> {
        let repo = Self::connect(database_url).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    // ========================
    // Class operations
    // ========================

    pub async fn save_class(&self, class: &SchoolClass) -> Result<()> {
        sqlx::query("INSERT INTO classes (id, name, stream) VALUES (?, ?, ?)")
            .bind(class.id.to_string())
            .bind(&class.name)
            .bind(&class.stream)
            .execute(&self.pool)
            .await
            .context("Failed to save class")?;
        Ok(())
    }

    pub async fn get_class(&self, id: ClassId) -> Result<Option<SchoolClass>> {
        let row = sqlx::query("SELECT id, name, stream FROM classes WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch class")?;

        row.as_ref().map(Self::row_to_class).transpose()
    }

    /// Look up a class by name and stream. A None stream matches only a
    /// class recorded without a stream.
    pub async fn get_class_by_name(
        &self,
        name: &str,
        stream: Option<&str>,
    ) -> Result<Option<SchoolClass>> {
        let row = sqlx::query("SELECT id, name, stream FROM classes WHERE name = ? AND stream IS ?")
            .bind(name)
            .bind(stream)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch class by name")?;

        row.as_ref().map(Self::row_to_class).transpose()
    }

    pub async fn list_classes(&self) -> Result<Vec<SchoolClass>> {
        let rows = sqlx::query("SELECT id, name, stream FROM classes ORDER BY name, stream")
            .fetch_all(&self.pool)
            .await
            .context("Failed to list classes")?;

        rows.iter().map(Self::row_to_class).collect()
    }

    fn row_to_class(row: &sqlx::sqlite::SqliteRow) -> Result<SchoolClass> {
        let id_str: String = row.get("id");
        Ok(SchoolClass {
            id: Uuid::parse_str(&id_str).context("Invalid class ID")?,
            name: row.get("name"),
            stream: row.get("stream"),
        })
    }

    // ========================
    // Student operations
    // ========================

    pub async fn save_student(&self, student: &Student) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO students (id, admission_number, name, class_id, guardian_name, guardian_phone, date_of_birth, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(student.id.to_string())
        .bind(&student.admission_number)
        .bind(&student.name)
        .bind(student.class_id.to_string())
        .bind(&student.guardian_name)
        .bind(&student.guardian_phone)
        .bind(student.date_of_birth.map(|d| d.to_string()))
        .bind(student.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to save student")?;
        Ok(())
    }

    pub async fn get_student(&self, id: StudentId) -> Result<Option<Student>> {
        let row = sqlx::query(
            "SELECT id, admission_number, name, class_id, guardian_name, guardian_phone, date_of_birth, created_at FROM students WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch student")?;

        row.as_ref().map(Self::row_to_student).transpose()
    }

    pub async fn get_student_by_admission(&self, admission_number: &str) -> Result<Option<Student>> {
        let row = sqlx::query(
            "SELECT id, admission_number, name, class_id, guardian_name, guardian_phone, date_of_birth, created_at FROM students WHERE admission_number = ?",
        )
        .bind(admission_number)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch student by admission number")?;

        row.as_ref().map(Self::row_to_student).transpose()
    }

    /// List students, optionally restricted to one class, ordered by
    /// admission number.
    pub async fn list_students(&self, class_id: Option<ClassId>) -> Result<Vec<Student>> {
        let rows = match class_id {
            Some(cid) => {
                sqlx::query(
                    "SELECT id, admission_number, name, class_id, guardian_name, guardian_phone, date_of_birth, created_at FROM students WHERE class_id = ? ORDER BY admission_number",
                )
                .bind(cid.to_string())
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query(
                    "SELECT id, admission_number, name, class_id, guardian_name, guardian_phone, date_of_birth, created_at FROM students ORDER BY admission_number",
                )
                .fetch_all(&self.pool)
                .await
            }
        }
        .context("Failed to list students")?;

        rows.iter().map(Self::row_to_student).collect()
    }

    fn row_to_student(row: &sqlx::sqlite::SqliteRow) -> Result<Student> {
        let id_str: String = row.get("id");
        let class_id_str: String = row.get("class_id");
        let dob_str: Option<String> = row.get("date_of_birth");
        let created_at_str: String = row.get("created_at");

        Ok(Student {
            id: Uuid::parse_str(&id_str).context("Invalid student ID")?,
            admission_number: row.get("admission_number"),
            name: row.get("name"),
            class_id: Uuid::parse_str(&class_id_str).context("Invalid class ID")?,
            guardian_name: row.get("guardian_name"),
            guardian_phone: row.get("guardian_phone"),
            date_of_birth: dob_str
                .map(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d"))
                .transpose()
                .context("Invalid date_of_birth")?,
            created_at: DateTime::parse_from_rfc3339(&created_at_str)
                .context("Invalid created_at timestamp")?
                .with_timezone(&Utc),
        })
    }

    // ========================
    // Subject operations
    // ========================

    pub async fn save_subject(&self, subject: &Subject) -> Result<()> {
        sqlx::query("INSERT INTO subjects (id, name, code) VALUES (?, ?, ?)")
            .bind(subject.id.to_string())
            .bind(&subject.name)
            .bind(&subject.code)
            .execute(&self.pool)
            .await
            .context("Failed to save subject")?;
        Ok(())
    }

    pub async fn get_subject_by_code(&self, code: &str) -> Result<Option<Subject>> {
        let row = sqlx::query("SELECT id, name, code FROM subjects WHERE code = ?")
            .bind(code)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch subject by code")?;

        row.as_ref().map(Self::row_to_subject).transpose()
    }

    pub async fn list_subjects(&self) -> Result<Vec<Subject>> {
        let rows = sqlx::query("SELECT id, name, code FROM subjects ORDER BY code")
            .fetch_all(&self.pool)
            .await
            .context("Failed to list subjects")?;

        rows.iter().map(Self::row_to_subject).collect()
    }

    fn row_to_subject(row: &sqlx::sqlite::SqliteRow) -> Result<Subject> {
        let id_str: String = row.get("id");
        Ok(Subject {
            id: Uuid::parse_str(&id_str).context("Invalid subject ID")?,
            name: row.get("name"),
            code: row.get("code"),
        })
    }

    // ========================
    // Exam operations
    // ========================

    pub async fn save_exam(&self, exam: &Exam) -> Result<()> {
        sqlx::query("INSERT INTO exams (id, name, term, year) VALUES (?, ?, ?, ?)")
            .bind(exam.id.to_string())
            .bind(&exam.name)
            .bind(&exam.term)
            .bind(exam.year)
            .execute(&self.pool)
            .await
            .context("Failed to save exam")?;
        Ok(())
    }

    pub async fn get_exam_by_key(&self, name: &str, term: &str, year: i32) -> Result<Option<Exam>> {
        let row =
            sqlx::query("SELECT id, name, term, year FROM exams WHERE name = ? AND term = ? AND year = ?")
                .bind(name)
                .bind(term)
                .bind(year)
                .fetch_optional(&self.pool)
                .await
                .context("Failed to fetch exam")?;

        row.as_ref().map(Self::row_to_exam).transpose()
    }

    pub async fn list_exams(&self) -> Result<Vec<Exam>> {
        let rows = sqlx::query("SELECT id, name, term, year FROM exams ORDER BY year, term, name")
            .fetch_all(&self.pool)
            .await
            .context("Failed to list exams")?;

        rows.iter().map(Self::row_to_exam).collect()
    }

    fn row_to_exam(row: &sqlx::sqlite::SqliteRow) -> Result<Exam> {
        let id_str: String = row.get("id");
        Ok(Exam {
            id: Uuid::parse_str(&id_str).context("Invalid exam ID")?,
            name: row.get("name"),
            term: row.get("term"),
            year: row.get("year"),
        })
    }

    // ========================
    // Mark operations
    // ========================

    /// Insert or replace the score for (student, subject, exam).
    pub async fn upsert_mark(&self, mark: &Mark) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO marks (student_id, subject_id, exam_id, score, recorded_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (student_id, subject_id, exam_id)
            DO UPDATE SET score = excluded.score, recorded_at = excluded.recorded_at
            "#,
        )
        .bind(mark.student_id.to_string())
        .bind(mark.subject_id.to_string())
        .bind(mark.exam_id.to_string())
        .bind(mark.score)
        .bind(mark.recorded_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to save mark")?;
        Ok(())
    }

    /// List marks with optional exam/student filters.
    pub async fn list_marks(
        &self,
        exam_id: Option<ExamId>,
        student_id: Option<StudentId>,
    ) -> Result<Vec<Mark>> {
        let mut query =
            String::from("SELECT student_id, subject_id, exam_id, score, recorded_at FROM marks WHERE 1=1");

        let exam_id_str = exam_id.map(|id| id.to_string());
        let student_id_str = student_id.map(|id| id.to_string());

        if exam_id.is_some() {
            query.push_str(" AND exam_id = ?");
        }
        if student_id.is_some() {
            query.push_str(" AND student_id = ?");
        }
        query.push_str(" ORDER BY student_id, subject_id");

        let mut sql_query = sqlx::query(&query);
        if let Some(ref eid) = exam_id_str {
            sql_query = sql_query.bind(eid);
        }
        if let Some(ref sid) = student_id_str {
            sql_query = sql_query.bind(sid);
        }

        let rows = sql_query
            .fetch_all(&self.pool)
            .await
            .context("Failed to list marks")?;

        rows.iter().map(Self::row_to_mark).collect()
    }

    fn row_to_mark(row: &sqlx::sqlite::SqliteRow) -> Result<Mark> {
        let student_id_str: String = row.get("student_id");
        let subject_id_str: String = row.get("subject_id");
        let exam_id_str: String = row.get("exam_id");
        let recorded_at_str: String = row.get("recorded_at");

        Ok(Mark {
            student_id: Uuid::parse_str(&student_id_str).context("Invalid student ID")?,
            subject_id: Uuid::parse_str(&subject_id_str).context("Invalid subject ID")?,
            exam_id: Uuid::parse_str(&exam_id_str).context("Invalid exam ID")?,
            score: row.get("score"),
            recorded_at: DateTime::parse_from_rfc3339(&recorded_at_str)
                .context("Invalid recorded_at timestamp")?
                .with_timezone(&Utc),
        })
    }

    // ========================
    // Invoice operations
    // ========================

    pub async fn save_invoice(&self, invoice: &Invoice) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO invoices (id, student_id, amount, paid_amount, balance, status, due_date, issued_at, version)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(invoice.id.to_string())
        .bind(invoice.student_id.to_string())
        .bind(invoice.amount)
        .bind(invoice.paid_amount)
        .bind(invoice.balance())
        .bind(invoice.status().as_str())
        .bind(invoice.due_date.to_string())
        .bind(invoice.issued_at.to_rfc3339())
        .bind(invoice.version)
        .execute(&self.pool)
        .await
        .context("Failed to save invoice")?;
        Ok(())
    }

    pub async fn get_invoice(&self, id: InvoiceId) -> Result<Option<Invoice>> {
        let row = sqlx::query(
            "SELECT id, student_id, amount, paid_amount, balance, status, due_date, issued_at, version FROM invoices WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch invoice")?;

        row.as_ref().map(Self::row_to_invoice).transpose()
    }

    /// List invoices, optionally for one student, ordered by due date.
    pub async fn list_invoices(&self, student_id: Option<StudentId>) -> Result<Vec<Invoice>> {
        let rows = match student_id {
            Some(sid) => {
                sqlx::query(
                    "SELECT id, student_id, amount, paid_amount, balance, status, due_date, issued_at, version FROM invoices WHERE student_id = ? ORDER BY due_date, issued_at",
                )
                .bind(sid.to_string())
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query(
                    "SELECT id, student_id, amount, paid_amount, balance, status, due_date, issued_at, version FROM invoices ORDER BY due_date, issued_at",
                )
                .fetch_all(&self.pool)
                .await
            }
        }
        .context("Failed to list invoices")?;

        rows.iter().map(Self::row_to_invoice).collect()
    }

    /// Compare-and-swap write of an invoice's totals. Returns false
    /// without writing when the stored version no longer matches (a
    /// concurrent writer got there first).
    pub async fn update_invoice_guarded(
        &self,
        invoice: &Invoice,
        expected_version: i64,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE invoices
            SET amount = ?, paid_amount = ?, balance = ?, status = ?, version = version + 1
            WHERE id = ? AND version = ?
            "#,
        )
        .bind(invoice.amount)
        .bind(invoice.paid_amount)
        .bind(invoice.balance())
        .bind(invoice.status().as_str())
        .bind(invoice.id.to_string())
        .bind(expected_version)
        .execute(&self.pool)
        .await
        .context("Failed to update invoice")?;

        Ok(result.rows_affected() == 1)
    }

    /// Atomically insert a payment and apply it to its invoice. The two
    /// writes share a transaction so no reader ever observes the payment
    /// without the updated invoice (or vice versa). Returns false, with
    /// nothing written, when the invoice version check fails.
    pub async fn record_payment_guarded(
        &self,
        payment: &Payment,
        updated_invoice: &Invoice,
        expected_version: i64,
    ) -> Result<bool> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction")?;

        let result = sqlx::query(
            r#"
            UPDATE invoices
            SET amount = ?, paid_amount = ?, balance = ?, status = ?, version = version + 1
            WHERE id = ? AND version = ?
            "#,
        )
        .bind(updated_invoice.amount)
        .bind(updated_invoice.paid_amount)
        .bind(updated_invoice.balance())
        .bind(updated_invoice.status().as_str())
        .bind(updated_invoice.id.to_string())
        .bind(expected_version)
        .execute(&mut *tx)
        .await
        .context("Failed to update invoice")?;

        if result.rows_affected() != 1 {
            tx.rollback().await.context("Failed to roll back")?;
            return Ok(false);
        }

        sqlx::query(
            r#"
            INSERT INTO payments (id, student_id, invoice_id, amount, paid_at, recorded_at, reference)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(payment.id.to_string())
        .bind(payment.student_id.to_string())
        .bind(payment.invoice_id.to_string())
        .bind(payment.amount)
        .bind(payment.paid_at.to_rfc3339())
        .bind(payment.recorded_at.to_rfc3339())
        .bind(&payment.reference)
        .execute(&mut *tx)
        .await
        .context("Failed to save payment")?;

        tx.commit().await.context("Failed to commit payment")?;
        Ok(true)
    }

    fn row_to_invoice(row: &sqlx::sqlite::SqliteRow) -> Result<Invoice> {
        let id_str: String = row.get("id");
        let student_id_str: String = row.get("student_id");
        let due_date_str: String = row.get("due_date");
        let issued_at_str: String = row.get("issued_at");

        let invoice = Invoice {
            id: Uuid::parse_str(&id_str).context("Invalid invoice ID")?,
            student_id: Uuid::parse_str(&student_id_str).context("Invalid student ID")?,
            amount: row.get("amount"),
            paid_amount: row.get("paid_amount"),
            due_date: NaiveDate::parse_from_str(&due_date_str, "%Y-%m-%d")
                .context("Invalid due_date")?,
            issued_at: DateTime::parse_from_rfc3339(&issued_at_str)
                .context("Invalid issued_at timestamp")?
                .with_timezone(&Utc),
            version: row.get("version"),
        };

        // Stored derived columns must agree with the canonical rule;
        // a mismatch (or an unknown status string) means the row was
        // written outside the application.
        let stored_balance: i64 = row.get("balance");
        let stored_status: String = row.get("status");
        if stored_balance != invoice.balance()
            || InvoiceStatus::from_str(&stored_status) != Some(invoice.status())
        {
            return Err(InconsistentInvoiceRow {
                invoice_id: invoice.id.to_string(),
                stored_balance,
                stored_status,
            }
            .into());
        }

        Ok(invoice)
    }

    // ========================
    // Payment operations
    // ========================

    /// List payments with optional student/invoice filters, newest last.
    pub async fn list_payments(
        &self,
        student_id: Option<StudentId>,
        invoice_id: Option<InvoiceId>,
    ) -> Result<Vec<Payment>> {
        let mut query = String::from(
            "SELECT id, student_id, invoice_id, amount, paid_at, recorded_at, reference FROM payments WHERE 1=1",
        );

        let student_id_str = student_id.map(|id| id.to_string());
        let invoice_id_str = invoice_id.map(|id| id.to_string());

        if student_id.is_some() {
            query.push_str(" AND student_id = ?");
        }
        if invoice_id.is_some() {
            query.push_str(" AND invoice_id = ?");
        }
        query.push_str(" ORDER BY paid_at, recorded_at");

        let mut sql_query = sqlx::query(&query);
        if let Some(ref sid) = student_id_str {
            sql_query = sql_query.bind(sid);
        }
        if let Some(ref iid) = invoice_id_str {
            sql_query = sql_query.bind(iid);
        }

        let rows = sql_query
            .fetch_all(&self.pool)
            .await
            .context("Failed to list payments")?;

        rows.iter().map(Self::row_to_payment).collect()
    }

    fn row_to_payment(row: &sqlx::sqlite::SqliteRow) -> Result<Payment> {
        let id_str: String = row.get("id");
        let student_id_str: String = row.get("student_id");
        let invoice_id_str: String = row.get("invoice_id");
        let paid_at_str: String = row.get("paid_at");
        let recorded_at_str: String = row.get("recorded_at");

        Ok(Payment {
            id: Uuid::parse_str(&id_str).context("Invalid payment ID")?,
            student_id: Uuid::parse_str(&student_id_str).context("Invalid student ID")?,
            invoice_id: Uuid::parse_str(&invoice_id_str).context("Invalid invoice ID")?,
            amount: row.get("amount"),
            paid_at: DateTime::parse_from_rfc3339(&paid_at_str)
                .context("Invalid paid_at timestamp")?
                .with_timezone(&Utc),
            recorded_at: DateTime::parse_from_rfc3339(&recorded_at_str)
                .context("Invalid recorded_at timestamp")?
                .with_timezone(&Utc),
            reference: row.get("reference"),
        })
    }
}
