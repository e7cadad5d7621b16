use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, warn};

use crate::domain::{
    BalanceSortKey, Cents, ClassRow, Exam, FeeTotals, GradeDistribution, Invoice, InvoiceId,
    InvoiceUpdateError, Mark, Payment, ReportTable, SchoolClass, Student, StudentBalance,
    StudentReport, Subject, SubjectAverage, aggregate_totals, class_performance,
    grade_distribution, outstanding_balances, student_balances, student_report, subject_averages,
};
use crate::storage::Repository;

use super::reporting;
use super::AppError;

/// How many times a guarded invoice write is retried when a concurrent
/// writer bumps the version first.
const MAX_WRITE_ATTEMPTS: u32 = 3;

/// Application service providing high-level operations over the school
/// records. This is the primary interface for any client (CLI, API,
/// importers). The repository is injected; there is no global handle.
pub struct SchoolService {
    repo: Repository,
}

/// Result of recording a payment: the event plus the invoice as updated.
#[derive(Debug)]
pub struct PaymentReceipt {
    pub payment: Payment,
    pub invoice: Invoice,
    pub student_name: String,
}

/// A student's complete fee position: every invoice, every payment.
#[derive(Debug)]
pub struct StudentLedger {
    pub student: Student,
    pub invoices: Vec<Invoice>,
    pub payments: Vec<Payment>,
    pub totals: FeeTotals,
}

/// A marksheet along with its printable table.
#[derive(Debug)]
pub struct Marksheet {
    pub student: Student,
    pub exam: Exam,
    pub report: StudentReport,
    pub table: ReportTable,
}

/// A ranked class performance report along with its printable table.
#[derive(Debug)]
pub struct ClassPerformance {
    pub class: SchoolClass,
    pub exam: Exam,
    pub rows: Vec<ClassRow>,
    pub table: ReportTable,
}

/// A grade histogram along with its printable table.
#[derive(Debug)]
pub struct DistributionReport {
    pub exam: Exam,
    pub distribution: GradeDistribution,
    pub table: ReportTable,
}

impl SchoolService {
    /// Create a new service with the given repository.
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Initialize a new database at the given path.
    pub async fn init(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}?mode=rwc", database_path);
        let repo = Repository::init(&db_url).await?;
        Ok(Self::new(repo))
    }

    /// Connect to an existing database.
    pub async fn connect(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}", database_path);
        let repo = Repository::connect(&db_url).await?;
        Ok(Self::new(repo))
    }

    // ========================
    // Roster operations
    // ========================

    /// Register a class (form + optional stream).
    pub async fn add_class(
        &self,
        name: String,
        stream: Option<String>,
    ) -> Result<SchoolClass, AppError> {
        if self
            .repo
            .get_class_by_name(&name, stream.as_deref())
            .await?
            .is_some()
        {
            let label = match &stream {
                Some(s) => format!("{} {}", name, s),
                None => name,
            };
            return Err(AppError::ClassAlreadyExists(label));
        }
        let class = SchoolClass::new(name, stream);
        self.repo.save_class(&class).await?;
        Ok(class)
    }

    pub async fn get_class(&self, name: &str, stream: Option<&str>) -> Result<SchoolClass, AppError> {
        self.repo
            .get_class_by_name(name, stream)
            .await?
            .ok_or_else(|| {
                let label = match stream {
                    Some(s) => format!("{} {}", name, s),
                    None => name.to_string(),
                };
                AppError::ClassNotFound(label)
            })
    }

    pub async fn list_classes(&self) -> Result<Vec<SchoolClass>, AppError> {
        Ok(self.repo.list_classes().await?)
    }

    /// Admit a student into a class.
    pub async fn add_student(
        &self,
        admission_number: String,
        name: String,
        class_name: &str,
        stream: Option<&str>,
        guardian_name: Option<String>,
        guardian_phone: Option<String>,
        date_of_birth: Option<NaiveDate>,
    ) -> Result<Student, AppError> {
        if self
            .repo
            .get_student_by_admission(&admission_number)
            .await?
            .is_some()
        {
            return Err(AppError::StudentAlreadyExists(admission_number));
        }
        let class = self.get_class(class_name, stream).await?;

        let mut student = Student::new(admission_number, name, class.id);
        if let Some(gname) = guardian_name {
            student = student.with_guardian(gname, guardian_phone);
        }
        if let Some(dob) = date_of_birth {
            student = student.with_date_of_birth(dob);
        }

        self.repo.save_student(&student).await?;
        Ok(student)
    }

    pub async fn get_student(&self, admission_number: &str) -> Result<Student, AppError> {
        self.repo
            .get_student_by_admission(admission_number)
            .await?
            .ok_or_else(|| AppError::StudentNotFound(admission_number.to_string()))
    }

    /// List students, optionally restricted to one class.
    pub async fn list_students(
        &self,
        class_name: Option<&str>,
        stream: Option<&str>,
    ) -> Result<Vec<Student>, AppError> {
        match class_name {
            Some(name) => {
                let class = self.get_class(name, stream).await?;
                Ok(self.repo.list_students(Some(class.id)).await?)
            }
            None => Ok(self.repo.list_students(None).await?),
        }
    }

    pub async fn add_subject(&self, name: String, code: String) -> Result<Subject, AppError> {
        if self.repo.get_subject_by_code(&code).await?.is_some() {
            return Err(AppError::SubjectAlreadyExists(code));
        }
        let subject = Subject::new(name, code);
        self.repo.save_subject(&subject).await?;
        Ok(subject)
    }

    pub async fn get_subject(&self, code: &str) -> Result<Subject, AppError> {
        self.repo
            .get_subject_by_code(code)
            .await?
            .ok_or_else(|| AppError::SubjectNotFound(code.to_string()))
    }

    pub async fn list_subjects(&self) -> Result<Vec<Subject>, AppError> {
        Ok(self.repo.list_subjects().await?)
    }

    pub async fn add_exam(
        &self,
        name: String,
        term: String,
        year: i32,
    ) -> Result<Exam, AppError> {
        if self.repo.get_exam_by_key(&name, &term, year).await?.is_some() {
            return Err(AppError::ExamAlreadyExists(format!(
                "{} (term {}, {})",
                name, term, year
            )));
        }
        let exam = Exam::new(name, term, year);
        self.repo.save_exam(&exam).await?;
        Ok(exam)
    }

    /// Find an exam by name, optionally disambiguated by year.
    pub async fn get_exam(&self, name: &str, year: Option<i32>) -> Result<Exam, AppError> {
        let exams = self.repo.list_exams().await?;
        exams
            .into_iter()
            .find(|e| e.name == name && year.is_none_or(|y| e.year == y))
            .ok_or_else(|| AppError::ExamNotFound(name.to_string()))
    }

    pub async fn list_exams(&self) -> Result<Vec<Exam>, AppError> {
        Ok(self.repo.list_exams().await?)
    }

    // ========================
    // Marks operations
    // ========================

    /// Record (or explicitly re-enter) a score. One mark per
    /// (student, subject, exam); re-entry overwrites.
    pub async fn enter_mark(
        &self,
        admission_number: &str,
        subject_code: &str,
        exam_name: &str,
        exam_year: Option<i32>,
        score: f64,
    ) -> Result<Mark, AppError> {
        if !(0.0..=100.0).contains(&score) || !score.is_finite() {
            return Err(AppError::InvalidScore { score });
        }
        let student = self.get_student(admission_number).await?;
        let subject = self.get_subject(subject_code).await?;
        let exam = self.get_exam(exam_name, exam_year).await?;

        let mark = Mark::new(student.id, subject.id, exam.id, score);
        self.repo.upsert_mark(&mark).await?;
        Ok(mark)
    }

    /// List marks, optionally filtered by exam and/or student.
    pub async fn list_marks(
        &self,
        exam_name: Option<&str>,
        admission_number: Option<&str>,
    ) -> Result<Vec<Mark>, AppError> {
        let exam_id = match exam_name {
            Some(name) => Some(self.get_exam(name, None).await?.id),
            None => None,
        };
        let student_id = match admission_number {
            Some(adm) => Some(self.get_student(adm).await?.id),
            None => None,
        };
        Ok(self.repo.list_marks(exam_id, student_id).await?)
    }

    // ========================
    // Ledger operations
    // ========================

    /// Issue an invoice to a student.
    pub async fn issue_invoice(
        &self,
        admission_number: &str,
        amount: Cents,
        due_date: NaiveDate,
    ) -> Result<Invoice, AppError> {
        if amount < 0 {
            return Err(AppError::InvalidAmount(
                "Billed amount must not be negative".to_string(),
            ));
        }
        let student = self.get_student(admission_number).await?;
        let invoice = Invoice::issue(student.id, amount, due_date);
        self.repo.save_invoice(&invoice).await?;
        Ok(invoice)
    }

    pub async fn get_invoice(&self, id: InvoiceId) -> Result<Invoice, AppError> {
        self.repo
            .get_invoice(id)
            .await?
            .ok_or_else(|| AppError::InvoiceNotFound(id.to_string()))
    }

    /// List invoices, optionally for one student.
    pub async fn list_invoices(
        &self,
        admission_number: Option<&str>,
    ) -> Result<Vec<Invoice>, AppError> {
        match admission_number {
            Some(adm) => {
                let student = self.get_student(adm).await?;
                Ok(self.repo.list_invoices(Some(student.id)).await?)
            }
            None => Ok(self.repo.list_invoices(None).await?),
        }
    }

    /// Record a payment against a specific invoice.
    ///
    /// Read-validate-write runs as one atomic unit: the payment insert
    /// and the invoice update share a transaction guarded by the invoice
    /// version. If a concurrent payment wins the race, the state is
    /// re-read and the payment reapplied, up to MAX_WRITE_ATTEMPTS.
    pub async fn record_payment(
        &self,
        invoice_id: InvoiceId,
        amount: Cents,
        paid_at: DateTime<Utc>,
        reference: Option<String>,
    ) -> Result<PaymentReceipt, AppError> {
        if amount <= 0 {
            return Err(AppError::InvalidAmount(
                "Payment amount must be positive".to_string(),
            ));
        }

        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let invoice = self.get_invoice(invoice_id).await?;
            let updated = invoice.apply_payment(amount).map_err(|err| match err {
                InvoiceUpdateError::Overpayment { balance, requested } => {
                    warn!(
                        invoice_id = %invoice_id,
                        "rejected payment exceeding balance"
                    );
                    AppError::Overpayment { requested, balance }
                }
                other => AppError::InvalidEdit(other),
            })?;

            let mut payment = Payment::new(invoice.student_id, invoice.id, amount, paid_at);
            if let Some(r) = &reference {
                payment = payment.with_reference(r.clone());
            }

            if self
                .repo
                .record_payment_guarded(&payment, &updated, invoice.version)
                .await?
            {
                debug!(invoice_id = %invoice_id, attempt, "payment recorded");
                let student = self.repo.get_student(invoice.student_id).await?;
                let mut stored = updated;
                stored.version = invoice.version + 1;
                return Ok(PaymentReceipt {
                    payment,
                    invoice: stored,
                    student_name: student.map(|s| s.name).unwrap_or_else(|| "N/A".into()),
                });
            }

            warn!(invoice_id = %invoice_id, attempt, "payment lost version race, retrying");
        }

        Err(AppError::Conflict {
            invoice_id: invoice_id.to_string(),
            attempts: MAX_WRITE_ATTEMPTS,
        })
    }

    /// Record a payment for a student without naming an invoice: it is
    /// applied to their oldest open invoice (accountant quick-log flow).
    pub async fn record_payment_for_student(
        &self,
        admission_number: &str,
        amount: Cents,
        paid_at: DateTime<Utc>,
        reference: Option<String>,
    ) -> Result<PaymentReceipt, AppError> {
        let student = self.get_student(admission_number).await?;
        let invoices = self.repo.list_invoices(Some(student.id)).await?;
        let open = invoices
            .iter()
            .filter(|inv| inv.balance() > 0)
            .min_by_key(|inv| inv.due_date)
            .ok_or_else(|| {
                AppError::InvoiceNotFound(format!(
                    "no open invoice for student {}",
                    admission_number
                ))
            })?;
        self.record_payment(open.id, amount, paid_at, reference).await
    }

    /// Manually correct an invoice's totals. Balance and status are
    /// recomputed through the canonical rule; the guarded write keeps
    /// concurrent payments from being overwritten.
    pub async fn edit_invoice(
        &self,
        invoice_id: InvoiceId,
        new_amount: Cents,
        new_paid_amount: Option<Cents>,
    ) -> Result<Invoice, AppError> {
        for _attempt in 1..=MAX_WRITE_ATTEMPTS {
            let invoice = self.get_invoice(invoice_id).await?;
            let paid = new_paid_amount.unwrap_or(invoice.paid_amount);
            let updated = invoice
                .with_totals(new_amount, paid)
                .map_err(AppError::InvalidEdit)?;

            if self
                .repo
                .update_invoice_guarded(&updated, invoice.version)
                .await?
            {
                let mut stored = updated;
                stored.version = invoice.version + 1;
                return Ok(stored);
            }
        }

        Err(AppError::Conflict {
            invoice_id: invoice_id.to_string(),
            attempts: MAX_WRITE_ATTEMPTS,
        })
    }

    /// Everything the ledger knows about one student.
    pub async fn student_ledger(&self, admission_number: &str) -> Result<StudentLedger, AppError> {
        let student = self.get_student(admission_number).await?;
        let invoices = self.repo.list_invoices(Some(student.id)).await?;
        let payments = self.repo.list_payments(Some(student.id), None).await?;
        let totals = aggregate_totals(&invoices);
        Ok(StudentLedger {
            student,
            invoices,
            payments,
            totals,
        })
    }

    pub async fn list_payments(
        &self,
        admission_number: Option<&str>,
    ) -> Result<Vec<Payment>, AppError> {
        match admission_number {
            Some(adm) => {
                let student = self.get_student(adm).await?;
                Ok(self.repo.list_payments(Some(student.id), None).await?)
            }
            None => Ok(self.repo.list_payments(None, None).await?),
        }
    }

    /// Students still owing money, plus school-wide totals and the
    /// printable table.
    pub async fn outstanding_balances(
        &self,
        sort: BalanceSortKey,
    ) -> Result<(Vec<StudentBalance>, ReportTable), AppError> {
        let students = self.repo.list_students(None).await?;
        let invoices = self.repo.list_invoices(None).await?;
        let entries = outstanding_balances(&students, &invoices, sort);
        let totals = aggregate_totals(&invoices);
        let table = reporting::balances_table(&entries, &totals);
        Ok((entries, table))
    }

    /// School-wide fee totals for the dashboard summary.
    pub async fn fee_summary(&self) -> Result<FeeTotals, AppError> {
        let invoices = self.repo.list_invoices(None).await?;
        Ok(aggregate_totals(&invoices))
    }

    /// Per-student fee positions for every student (settled included).
    pub async fn all_student_balances(&self) -> Result<Vec<StudentBalance>, AppError> {
        let students = self.repo.list_students(None).await?;
        let invoices = self.repo.list_invoices(None).await?;
        Ok(student_balances(&students, &invoices))
    }

    // ========================
    // Report operations
    // ========================

    /// A student's marksheet for one exam.
    pub async fn marksheet(
        &self,
        admission_number: &str,
        exam_name: &str,
        exam_year: Option<i32>,
    ) -> Result<Marksheet, AppError> {
        let student = self.get_student(admission_number).await?;
        let exam = self.get_exam(exam_name, exam_year).await?;
        let class = self
            .repo
            .get_class(student.class_id)
            .await?
            .ok_or_else(|| AppError::ClassNotFound(student.class_id.to_string()))?;
        let subjects = self.repo.list_subjects().await?;
        let marks = self.repo.list_marks(Some(exam.id), Some(student.id)).await?;

        let report = student_report(&student, &exam, &marks, &subjects);
        let table = reporting::marksheet_table(&student, &class, &exam, &report);
        Ok(Marksheet {
            student,
            exam,
            report,
            table,
        })
    }

    /// Ranked performance for one class at one exam.
    pub async fn class_performance(
        &self,
        class_name: &str,
        stream: Option<&str>,
        exam_name: &str,
        exam_year: Option<i32>,
    ) -> Result<ClassPerformance, AppError> {
        let class = self.get_class(class_name, stream).await?;
        let exam = self.get_exam(exam_name, exam_year).await?;
        let students = self.repo.list_students(Some(class.id)).await?;
        let marks = self.repo.list_marks(Some(exam.id), None).await?;

        let rows = class_performance(&students, &exam, &marks);
        let table = reporting::class_performance_table(&class, &exam, &rows);
        Ok(ClassPerformance {
            class,
            exam,
            rows,
            table,
        })
    }

    /// Per-subject averages, school-wide or for one exam.
    pub async fn subject_analysis(
        &self,
        exam_name: Option<&str>,
        exam_year: Option<i32>,
    ) -> Result<(Vec<SubjectAverage>, ReportTable), AppError> {
        let exam = match exam_name {
            Some(name) => Some(self.get_exam(name, exam_year).await?),
            None => None,
        };
        let subjects = self.repo.list_subjects().await?;
        let marks = self
            .repo
            .list_marks(exam.as_ref().map(|e| e.id), None)
            .await?;

        let averages = subject_averages(&subjects, &marks, exam.as_ref());
        let table = reporting::subject_analysis_table(exam.as_ref(), &averages);
        Ok((averages, table))
    }

    /// Grade histogram over student averages, for one class or the whole
    /// school.
    pub async fn grade_distribution(
        &self,
        class_name: Option<&str>,
        stream: Option<&str>,
        exam_name: &str,
        exam_year: Option<i32>,
    ) -> Result<DistributionReport, AppError> {
        let exam = self.get_exam(exam_name, exam_year).await?;
        let class = match class_name {
            Some(name) => Some(self.get_class(name, stream).await?),
            None => None,
        };
        let students = self
            .repo
            .list_students(class.as_ref().map(|c| c.id))
            .await?;
        let marks = self.repo.list_marks(Some(exam.id), None).await?;

        let rows = class_performance(&students, &exam, &marks);
        let distribution = grade_distribution(&rows);
        let table = reporting::grade_distribution_table(class.as_ref(), &exam, &distribution);
        Ok(DistributionReport {
            exam,
            distribution,
            table,
        })
    }

    /// Borrow the underlying repository (used by the io layer).
    pub fn repository(&self) -> &Repository {
        &self.repo
    }
}
