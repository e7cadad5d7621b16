pub mod export;
pub mod import;

pub use export::{DatabaseSnapshot, Exporter, write_table_csv, write_table_json};
pub use import::{ImportError, ImportOptions, ImportResult, Importer};
