//! happiness-atlas: joins internet-usage and happiness tables by country and
//! runs a small statistics pipeline over the result
//!
//! The pipeline merges the two tables on a normalized country name, then
//! computes Pearson correlation, an OLS line with R², a k-means grouping over
//! coordinates, a Gaussian-weighted local slope per country, residual
//! rankings and a short plain-language interpretation.

pub mod analysis;
pub mod config;
pub mod error;
pub mod ingestion;
pub mod pipeline;
pub mod types;

pub use config::AtlasConfig;
pub use error::{Error, Result};
pub use pipeline::{analyze, analyze_files, PipelineContext};
pub use types::{
    record::{CountryRecord, LocalSlope, RawRow, RawValue},
    report::AnalysisReport,
};
