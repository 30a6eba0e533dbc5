//! Report accumulation, persistence and export.

pub mod export;
pub mod store;

pub use export::export_csv;
pub use store::ReportStore;
