use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use uuid::Uuid;

use crate::application::SchoolService;
use crate::domain::{BalanceSortKey, ReportTable, format_cents, parse_cents};
use crate::io::{Exporter, ImportOptions, Importer, write_table_csv, write_table_json};

/// Elimu - School Records Ledger
#[derive(Parser)]
#[command(name = "elimu")]
#[command(about = "A local-first school fee ledger and marksheet tool")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(short, long, default_value = "elimu.db")]
    pub database: String,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Class management commands
    #[command(subcommand)]
    Class(ClassCommands),

    /// Student roster commands
    #[command(subcommand)]
    Student(StudentCommands),

    /// Subject management commands
    #[command(subcommand)]
    Subject(SubjectCommands),

    /// Exam management commands
    #[command(subcommand)]
    Exam(ExamCommands),

    /// Record a score for one student in one subject
    Mark {
        /// Student admission number
        student: String,

        /// Subject code
        #[arg(long)]
        subject: String,

        /// Exam name
        #[arg(long)]
        exam: String,

        /// Exam year, to disambiguate recurring exam names
        #[arg(long)]
        year: Option<i32>,

        /// Score (0-100)
        score: f64,
    },

    /// Invoice management commands
    #[command(subcommand)]
    Invoice(InvoiceCommands),

    /// Payment commands
    #[command(subcommand)]
    Payment(PaymentCommands),

    /// Show students with outstanding fee balances
    Balances {
        /// Sort key: name, admission
        #[arg(long, default_value = "admission")]
        sort: String,
    },

    /// Show school-wide fee totals
    Summary,

    /// Generate academic reports
    #[command(subcommand)]
    Report(ReportCommands),

    /// Export data to CSV or JSON
    Export {
        /// What to export: balances, payments, full
        export_type: String,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Import data from CSV
    Import {
        /// What to import: marks, students
        import_type: String,

        /// Input file
        #[arg(short, long)]
        input: String,

        /// Exam name (required for marks)
        #[arg(long)]
        exam: Option<String>,

        /// Exam year, to disambiguate recurring exam names
        #[arg(long)]
        year: Option<i32>,

        /// Preview without importing
        #[arg(long)]
        dry_run: bool,

        /// Skip rows that already exist instead of reporting errors
        #[arg(long)]
        skip_duplicates: bool,
    },
}

#[derive(Subcommand)]
pub enum ClassCommands {
    /// Register a class
    Add {
        /// Class name, e.g. "Form 1"
        name: String,

        /// Stream within the class, e.g. "A"
        #[arg(short, long)]
        stream: Option<String>,
    },

    /// List all classes
    List,
}

#[derive(Subcommand)]
pub enum StudentCommands {
    /// Admit a student
    Add {
        /// Admission number (must be unique)
        admission: String,

        /// Full name
        name: String,

        /// Class name, e.g. "Form 1"
        #[arg(long)]
        class: String,

        /// Stream within the class
        #[arg(long)]
        stream: Option<String>,

        /// Guardian name
        #[arg(long)]
        guardian: Option<String>,

        /// Guardian phone number
        #[arg(long)]
        phone: Option<String>,

        /// Date of birth (YYYY-MM-DD)
        #[arg(long)]
        dob: Option<String>,
    },

    /// List students, optionally for one class
    List {
        /// Filter by class name
        #[arg(long)]
        class: Option<String>,

        /// Filter by stream (with --class)
        #[arg(long)]
        stream: Option<String>,
    },

    /// Show a student's full fee ledger
    Ledger {
        /// Admission number
        admission: String,
    },
}

#[derive(Subcommand)]
pub enum SubjectCommands {
    /// Register a subject
    Add {
        /// Subject name, e.g. "Mathematics"
        name: String,

        /// Subject code, e.g. "121" (must be unique)
        code: String,
    },

    /// List all subjects
    List,
}

#[derive(Subcommand)]
pub enum ExamCommands {
    /// Create an exam sitting
    Add {
        /// Exam name, e.g. "Term 1 Opener"
        name: String,

        /// Term, e.g. "1"
        #[arg(short, long)]
        term: String,

        /// Calendar year
        #[arg(short, long)]
        year: i32,
    },

    /// List all exams
    List,
}

#[derive(Subcommand)]
pub enum InvoiceCommands {
    /// Issue an invoice to a student
    Issue {
        /// Student admission number
        student: String,

        /// Billed amount, e.g. "50000" or "50000.00"
        amount: String,

        /// Due date (YYYY-MM-DD)
        #[arg(long)]
        due: String,
    },

    /// Edit an invoice's totals (balance and status are recomputed)
    Edit {
        /// Invoice ID
        id: String,

        /// New billed amount
        #[arg(long)]
        amount: String,

        /// New paid amount (unchanged if omitted)
        #[arg(long)]
        paid: Option<String>,
    },

    /// List invoices, optionally for one student
    List {
        /// Filter by admission number
        #[arg(long)]
        student: Option<String>,
    },

    /// Show one invoice with its payment history
    Show {
        /// Invoice ID
        id: String,
    },
}

#[derive(Subcommand)]
pub enum PaymentCommands {
    /// Record a payment against a specific invoice
    Record {
        /// Invoice ID
        invoice: String,

        /// Amount paid, e.g. "25000" or "25000.00"
        amount: String,

        /// Payment date (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<String>,

        /// Receipt or transaction reference
        #[arg(short, long)]
        reference: Option<String>,
    },

    /// Record a payment for a student (applied to their oldest open invoice)
    Log {
        /// Student admission number
        student: String,

        /// Amount paid
        amount: String,

        /// Payment date (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<String>,

        /// Receipt or transaction reference
        #[arg(short, long)]
        reference: Option<String>,
    },

    /// List payments, optionally for one student
    List {
        /// Filter by admission number
        #[arg(long)]
        student: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum ReportCommands {
    /// A student's marksheet for one exam
    Marksheet {
        /// Student admission number
        student: String,

        /// Exam name
        #[arg(long)]
        exam: String,

        /// Exam year, to disambiguate recurring exam names
        #[arg(long)]
        year: Option<i32>,

        /// Output format: table, json, csv
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Ranked class performance for one exam
    Class {
        /// Class name
        class: String,

        /// Stream within the class
        #[arg(long)]
        stream: Option<String>,

        /// Exam name
        #[arg(long)]
        exam: String,

        /// Exam year
        #[arg(long)]
        year: Option<i32>,

        /// Output format: table, json, csv
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Per-subject average scores
    Subjects {
        /// Restrict to one exam (school-wide if omitted)
        #[arg(long)]
        exam: Option<String>,

        /// Exam year
        #[arg(long)]
        year: Option<i32>,

        /// Output format: table, json, csv
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Grade distribution over student averages
    Distribution {
        /// Exam name
        #[arg(long)]
        exam: String,

        /// Exam year
        #[arg(long)]
        year: Option<i32>,

        /// Restrict to one class (school-wide if omitted)
        #[arg(long)]
        class: Option<String>,

        /// Stream within the class
        #[arg(long)]
        stream: Option<String>,

        /// Output format: table, json, csv
        #[arg(long, default_value = "table")]
        format: String,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Commands::Init => {
                SchoolService::init(&self.database).await?;
                println!("Database initialized: {}", self.database);
            }

            Commands::Class(class_cmd) => {
                let service = SchoolService::connect(&self.database).await?;
                run_class_command(&service, class_cmd).await?;
            }

            Commands::Student(student_cmd) => {
                let service = SchoolService::connect(&self.database).await?;
                run_student_command(&service, student_cmd).await?;
            }

            Commands::Subject(subject_cmd) => {
                let service = SchoolService::connect(&self.database).await?;
                run_subject_command(&service, subject_cmd).await?;
            }

            Commands::Exam(exam_cmd) => {
                let service = SchoolService::connect(&self.database).await?;
                run_exam_command(&service, exam_cmd).await?;
            }

            Commands::Mark {
                student,
                subject,
                exam,
                year,
                score,
            } => {
                let service = SchoolService::connect(&self.database).await?;
                let mark = service
                    .enter_mark(&student, &subject, &exam, year, score)
                    .await?;
                println!(
                    "Recorded mark: {} scored {:.0} in subject {} ({})",
                    student, mark.score, subject, exam
                );
            }

            Commands::Invoice(invoice_cmd) => {
                let service = SchoolService::connect(&self.database).await?;
                run_invoice_command(&service, invoice_cmd).await?;
            }

            Commands::Payment(payment_cmd) => {
                let service = SchoolService::connect(&self.database).await?;
                run_payment_command(&service, payment_cmd).await?;
            }

            Commands::Balances { sort } => {
                let service = SchoolService::connect(&self.database).await?;
                let sort_key = BalanceSortKey::from_str(&sort)
                    .ok_or_else(|| anyhow::anyhow!("Invalid sort key '{}'. Valid keys: name, admission", sort))?;
                let (entries, table) = service.outstanding_balances(sort_key).await?;
                if entries.is_empty() {
                    println!("No outstanding balances.");
                } else {
                    print_table(&table);
                }
            }

            Commands::Summary => {
                let service = SchoolService::connect(&self.database).await?;
                let totals = service.fee_summary().await?;
                println!("Fee summary");
                println!("  Total billed:      {}", format_cents(totals.total_billed));
                println!("  Total paid:        {}", format_cents(totals.total_paid));
                println!("  Total outstanding: {}", format_cents(totals.total_balance));
            }

            Commands::Report(report_cmd) => {
                let service = SchoolService::connect(&self.database).await?;
                run_report_command(&service, report_cmd).await?;
            }

            Commands::Export {
                export_type,
                output,
            } => {
                let service = SchoolService::connect(&self.database).await?;
                run_export_command(&service, &export_type, output.as_deref()).await?;
            }

            Commands::Import {
                import_type,
                input,
                exam,
                year,
                dry_run,
                skip_duplicates,
            } => {
                let service = SchoolService::connect(&self.database).await?;
                run_import_command(
                    &service,
                    &import_type,
                    &input,
                    exam.as_deref(),
                    year,
                    dry_run,
                    skip_duplicates,
                )
                .await?;
            }
        }

        Ok(())
    }
}

async fn run_class_command(service: &SchoolService, cmd: ClassCommands) -> Result<()> {
    match cmd {
        ClassCommands::Add { name, stream } => {
            let class = service.add_class(name, stream).await?;
            println!("Created class: {}", class.label());
        }

        ClassCommands::List => {
            let classes = service.list_classes().await?;
            if classes.is_empty() {
                println!("No classes found.");
            } else {
                println!("{:<20} {:<8}", "NAME", "STREAM");
                println!("{}", "-".repeat(28));
                for class in classes {
                    println!(
                        "{:<20} {:<8}",
                        class.name,
                        class.stream.as_deref().unwrap_or("-")
                    );
                }
            }
        }
    }
    Ok(())
}

async fn run_student_command(service: &SchoolService, cmd: StudentCommands) -> Result<()> {
    match cmd {
        StudentCommands::Add {
            admission,
            name,
            class,
            stream,
            guardian,
            phone,
            dob,
        } => {
            let date_of_birth = dob
                .map(|s| parse_naive_date(&s))
                .transpose()
                .context("Invalid date of birth")?;
            let student = service
                .add_student(
                    admission,
                    name,
                    &class,
                    stream.as_deref(),
                    guardian,
                    phone,
                    date_of_birth,
                )
                .await?;
            println!(
                "Admitted student: {} ({})",
                student.name, student.admission_number
            );
        }

        StudentCommands::List { class, stream } => {
            let students = service
                .list_students(class.as_deref(), stream.as_deref())
                .await?;
            if students.is_empty() {
                println!("No students found.");
            } else {
                println!("{:<12} {:<24} {:<16}", "ADM NO", "NAME", "GUARDIAN");
                println!("{}", "-".repeat(52));
                for student in students {
                    println!(
                        "{:<12} {:<24} {:<16}",
                        student.admission_number,
                        student.name,
                        student.guardian_name.as_deref().unwrap_or("-")
                    );
                }
            }
        }

        StudentCommands::Ledger { admission } => {
            let ledger = service.student_ledger(&admission).await?;
            println!(
                "Ledger for {} ({})",
                ledger.student.name, ledger.student.admission_number
            );
            println!();
            println!("Invoices:");
            if ledger.invoices.is_empty() {
                println!("  (none)");
            } else {
                for invoice in &ledger.invoices {
                    println!(
                        "  {}  due {}  billed {:>12}  paid {:>12}  balance {:>12}  [{}]",
                        invoice.id,
                        invoice.due_date,
                        format_cents(invoice.amount),
                        format_cents(invoice.paid_amount),
                        format_cents(invoice.balance()),
                        invoice.status()
                    );
                }
            }
            println!();
            println!("Payments:");
            if ledger.payments.is_empty() {
                println!("  (none)");
            } else {
                for payment in &ledger.payments {
                    println!(
                        "  {}  {}  {:>12}  {}",
                        payment.paid_at.format("%Y-%m-%d"),
                        payment.id,
                        format_cents(payment.amount),
                        payment.reference.as_deref().unwrap_or("-")
                    );
                }
            }
            println!();
            println!(
                "Totals: billed {}, paid {}, balance {}",
                format_cents(ledger.totals.total_billed),
                format_cents(ledger.totals.total_paid),
                format_cents(ledger.totals.total_balance)
            );
        }
    }
    Ok(())
}

async fn run_subject_command(service: &SchoolService, cmd: SubjectCommands) -> Result<()> {
    match cmd {
        SubjectCommands::Add { name, code } => {
            let subject = service.add_subject(name, code).await?;
            println!("Created subject: {} ({})", subject.name, subject.code);
        }

        SubjectCommands::List => {
            let subjects = service.list_subjects().await?;
            if subjects.is_empty() {
                println!("No subjects found.");
            } else {
                println!("{:<8} {:<24}", "CODE", "NAME");
                println!("{}", "-".repeat(32));
                for subject in subjects {
                    println!("{:<8} {:<24}", subject.code, subject.name);
                }
            }
        }
    }
    Ok(())
}

async fn run_exam_command(service: &SchoolService, cmd: ExamCommands) -> Result<()> {
    match cmd {
        ExamCommands::Add { name, term, year } => {
            let exam = service.add_exam(name, term, year).await?;
            println!("Created exam: {} (term {}, {})", exam.name, exam.term, exam.year);
        }

        ExamCommands::List => {
            let exams = service.list_exams().await?;
            if exams.is_empty() {
                println!("No exams found.");
            } else {
                println!("{:<24} {:<6} {:<6}", "NAME", "TERM", "YEAR");
                println!("{}", "-".repeat(36));
                for exam in exams {
                    println!("{:<24} {:<6} {:<6}", exam.name, exam.term, exam.year);
                }
            }
        }
    }
    Ok(())
}

async fn run_invoice_command(service: &SchoolService, cmd: InvoiceCommands) -> Result<()> {
    match cmd {
        InvoiceCommands::Issue {
            student,
            amount,
            due,
        } => {
            let amount_cents =
                parse_cents(&amount).context("Invalid amount format. Use '50000' or '50000.00'")?;
            let due_date = parse_naive_date(&due).context("Invalid due date")?;
            let invoice = service.issue_invoice(&student, amount_cents, due_date).await?;
            println!(
                "Issued invoice {} to {}: {} due {}",
                invoice.id,
                student,
                format_cents(invoice.amount),
                invoice.due_date
            );
        }

        InvoiceCommands::Edit { id, amount, paid } => {
            let invoice_id =
                Uuid::parse_str(&id).context("Invalid invoice ID format (expected UUID)")?;
            let new_amount =
                parse_cents(&amount).context("Invalid amount format. Use '50000' or '50000.00'")?;
            let new_paid = paid
                .map(|p| parse_cents(&p))
                .transpose()
                .context("Invalid paid amount format")?;

            let invoice = service.edit_invoice(invoice_id, new_amount, new_paid).await?;
            println!(
                "Updated invoice {}: billed {}, paid {}, balance {} [{}]",
                invoice.id,
                format_cents(invoice.amount),
                format_cents(invoice.paid_amount),
                format_cents(invoice.balance()),
                invoice.status()
            );
        }

        InvoiceCommands::Show { id } => {
            let invoice_id =
                Uuid::parse_str(&id).context("Invalid invoice ID format (expected UUID)")?;
            let invoice = service.get_invoice(invoice_id).await?;
            println!("Invoice {}", invoice.id);
            println!("  Issued:  {}", invoice.issued_at.format("%Y-%m-%d"));
            println!("  Due:     {}", invoice.due_date);
            println!("  Billed:  {}", format_cents(invoice.amount));
            println!("  Paid:    {}", format_cents(invoice.paid_amount));
            println!("  Balance: {}", format_cents(invoice.balance()));
            println!("  Status:  {}", invoice.status());

            let payments = service
                .repository()
                .list_payments(None, Some(invoice.id))
                .await?;
            if !payments.is_empty() {
                println!();
                println!("Payments:");
                for payment in &payments {
                    println!(
                        "  {}  {:>12}  {}",
                        payment.paid_at.format("%Y-%m-%d"),
                        format_cents(payment.amount),
                        payment.reference.as_deref().unwrap_or("-")
                    );
                }
            }
        }

        InvoiceCommands::List { student } => {
            let invoices = service.list_invoices(student.as_deref()).await?;
            if invoices.is_empty() {
                println!("No invoices found.");
            } else {
                println!(
                    "{:<38} {:<12} {:>12} {:>12} {:>12} {:<8}",
                    "ID", "DUE", "BILLED", "PAID", "BALANCE", "STATUS"
                );
                println!("{}", "-".repeat(98));
                for invoice in invoices {
                    println!(
                        "{:<38} {:<12} {:>12} {:>12} {:>12} {:<8}",
                        invoice.id,
                        invoice.due_date.to_string(),
                        format_cents(invoice.amount),
                        format_cents(invoice.paid_amount),
                        format_cents(invoice.balance()),
                        invoice.status().to_string()
                    );
                }
            }
        }
    }
    Ok(())
}

async fn run_payment_command(service: &SchoolService, cmd: PaymentCommands) -> Result<()> {
    match cmd {
        PaymentCommands::Record {
            invoice,
            amount,
            date,
            reference,
        } => {
            let invoice_id =
                Uuid::parse_str(&invoice).context("Invalid invoice ID format (expected UUID)")?;
            let amount_cents =
                parse_cents(&amount).context("Invalid amount format. Use '25000' or '25000.00'")?;
            let paid_at = parse_paid_at(date.as_deref())?;

            let receipt = service
                .record_payment(invoice_id, amount_cents, paid_at, reference)
                .await?;
            print_receipt(&receipt);
        }

        PaymentCommands::Log {
            student,
            amount,
            date,
            reference,
        } => {
            let amount_cents =
                parse_cents(&amount).context("Invalid amount format. Use '25000' or '25000.00'")?;
            let paid_at = parse_paid_at(date.as_deref())?;

            let receipt = service
                .record_payment_for_student(&student, amount_cents, paid_at, reference)
                .await?;
            print_receipt(&receipt);
        }

        PaymentCommands::List { student } => {
            let payments = service.list_payments(student.as_deref()).await?;
            if payments.is_empty() {
                println!("No payments found.");
            } else {
                println!("{:<12} {:>12} {:<38} {:<16}", "DATE", "AMOUNT", "INVOICE", "REFERENCE");
                println!("{}", "-".repeat(80));
                for payment in payments {
                    println!(
                        "{:<12} {:>12} {:<38} {:<16}",
                        payment.paid_at.format("%Y-%m-%d").to_string(),
                        format_cents(payment.amount),
                        payment.invoice_id.to_string(),
                        payment.reference.as_deref().unwrap_or("-")
                    );
                }
            }
        }
    }
    Ok(())
}

fn print_receipt(receipt: &crate::application::PaymentReceipt) {
    println!(
        "Recorded payment of {} for {} (invoice {})",
        format_cents(receipt.payment.amount),
        receipt.student_name,
        receipt.invoice.id
    );
    println!(
        "Invoice now: paid {} of {}, balance {} [{}]",
        format_cents(receipt.invoice.paid_amount),
        format_cents(receipt.invoice.amount),
        format_cents(receipt.invoice.balance()),
        receipt.invoice.status()
    );
}

async fn run_report_command(service: &SchoolService, cmd: ReportCommands) -> Result<()> {
    let (table, format) = match cmd {
        ReportCommands::Marksheet {
            student,
            exam,
            year,
            format,
        } => {
            let marksheet = service.marksheet(&student, &exam, year).await?;
            (marksheet.table, format)
        }

        ReportCommands::Class {
            class,
            stream,
            exam,
            year,
            format,
        } => {
            let performance = service
                .class_performance(&class, stream.as_deref(), &exam, year)
                .await?;
            (performance.table, format)
        }

        ReportCommands::Subjects { exam, year, format } => {
            let (_, table) = service.subject_analysis(exam.as_deref(), year).await?;
            (table, format)
        }

        ReportCommands::Distribution {
            exam,
            year,
            class,
            stream,
            format,
        } => {
            let report = service
                .grade_distribution(class.as_deref(), stream.as_deref(), &exam, year)
                .await?;
            (report.table, format)
        }
    };

    match format.as_str() {
        "table" => print_table(&table),
        "json" => write_table_json(&table, std::io::stdout())?,
        "csv" => {
            write_table_csv(&table, std::io::stdout())?;
        }
        other => anyhow::bail!("Invalid format '{}'. Valid formats: table, json, csv", other),
    }
    Ok(())
}

async fn run_export_command(
    service: &SchoolService,
    export_type: &str,
    output: Option<&str>,
) -> Result<()> {
    let exporter = Exporter::new(service);

    let mut writer: Box<dyn std::io::Write> = match output {
        Some(path) => Box::new(std::fs::File::create(path).context("Failed to create output file")?),
        None => Box::new(std::io::stdout()),
    };

    match export_type {
        "balances" => {
            let count = exporter.export_balances_csv(&mut writer).await?;
            eprintln!("Exported {} balance rows", count);
        }
        "payments" => {
            let count = exporter.export_payments_csv(&mut writer).await?;
            eprintln!("Exported {} payments", count);
        }
        "full" => {
            let snapshot = exporter.export_full_json(&mut writer).await?;
            eprintln!(
                "Exported snapshot: {} students, {} marks, {} invoices, {} payments",
                snapshot.students.len(),
                snapshot.marks.len(),
                snapshot.invoices.len(),
                snapshot.payments.len()
            );
        }
        other => anyhow::bail!(
            "Invalid export type '{}'. Valid types: balances, payments, full",
            other
        ),
    }
    Ok(())
}

async fn run_import_command(
    service: &SchoolService,
    import_type: &str,
    input: &str,
    exam: Option<&str>,
    year: Option<i32>,
    dry_run: bool,
    skip_duplicates: bool,
) -> Result<()> {
    let importer = Importer::new(service);
    let file = std::fs::File::open(input).context("Failed to open input file")?;
    let options = ImportOptions {
        dry_run,
        skip_duplicates,
    };

    let result = match import_type {
        "marks" => {
            let exam_name =
                exam.ok_or_else(|| anyhow::anyhow!("--exam is required for mark import"))?;
            importer
                .import_marks_csv(file, exam_name, year, options)
                .await?
        }
        "students" => importer.import_students_csv(file, options).await?,
        other => anyhow::bail!(
            "Invalid import type '{}'. Valid types: marks, students",
            other
        ),
    };

    if dry_run {
        println!("Dry run: {} rows would be imported", result.imported);
    } else {
        println!("Imported {} rows ({} skipped)", result.imported, result.skipped);
    }
    for error in &result.errors {
        match &error.field {
            Some(field) => eprintln!("  line {} [{}]: {}", error.line, field, error.error),
            None => eprintln!("  line {}: {}", error.line, error.error),
        }
    }
    if !result.errors.is_empty() {
        anyhow::bail!("{} rows failed", result.errors.len());
    }
    Ok(())
}

/// Print a report table: title, metadata, then fixed-width columns.
fn print_table(table: &ReportTable) {
    println!("{}", table.title);
    for (key, value) in &table.meta {
        println!("{}: {}", key, value);
    }
    if !table.meta.is_empty() {
        println!();
    }

    // Column widths fit the widest cell
    let mut widths: Vec<usize> = table.headers.iter().map(String::len).collect();
    for row in &table.rows {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() && cell.len() > widths[i] {
                widths[i] = cell.len();
            }
        }
    }

    let header_line: Vec<String> = table
        .headers
        .iter()
        .zip(&widths)
        .map(|(h, w)| format!("{:<width$}", h, width = w))
        .collect();
    println!("{}", header_line.join("  "));
    println!("{}", "-".repeat(widths.iter().sum::<usize>() + 2 * (widths.len().saturating_sub(1))));

    for row in &table.rows {
        let line: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(c, w)| format!("{:<width$}", c, width = w))
            .collect();
        println!("{}", line.join("  "));
    }
}

fn parse_naive_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{}'. Use YYYY-MM-DD", s))
}

fn parse_paid_at(date: Option<&str>) -> Result<DateTime<Utc>> {
    match date {
        Some(s) => {
            let date = parse_naive_date(s)?;
            Ok(date.and_hms_opt(0, 0, 0).unwrap().and_utc())
        }
        None => Ok(Utc::now()),
    }
}
