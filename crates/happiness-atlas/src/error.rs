//! Error types for the analysis pipeline
//!
//! Dropped input rows are not errors: the merger reports them as data-quality
//! exclusions. Everything here is a genuine failure the caller has to handle.

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Pipeline errors
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Input table could not be parsed into rows
    #[error("Failed to parse table '{table}': {message}")]
    TableParse { table: String, message: String },

    /// Unsupported input format
    #[error("Unsupported table format: {0}")]
    UnsupportedFormat(String),

    /// A derived field was written a second time on the same context
    #[error("Stage '{0}' already ran on this pipeline context")]
    StageAlreadyRun(&'static str),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML decode error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML encode error
    #[error("TOML encode error: {0}")]
    TomlEncode(#[from] toml::ser::Error),

    /// Async task failed to complete
    #[error("Task error: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl Error {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a table parse error
    pub fn table_parse(table: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TableParse {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Whether the error came from bad input rather than the environment
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Error::TableParse { .. }
                | Error::UnsupportedFormat(_)
                | Error::Csv(_)
                | Error::Json(_)
        )
    }
}
