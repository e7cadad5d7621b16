mod grading;
mod invoice;
mod ledger;
mod money;
mod payment;
mod records;
mod report;

pub use grading::*;
pub use invoice::*;
pub use ledger::*;
pub use money::*;
pub use payment::*;
pub use records::*;
pub use report::*;
