//! Core data types

pub mod record;
pub mod report;

pub use record::{raw_row, CountryRecord, LocalSlope, RawRow, RawValue};
pub use report::{AnalysisReport, MergeSummary};
