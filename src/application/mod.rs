mod error;
pub mod reporting;
mod service;

pub use error::{AppError, ErrorKind};
pub use service::{
    ClassPerformance, DistributionReport, Marksheet, PaymentReceipt, SchoolService, StudentLedger,
};
