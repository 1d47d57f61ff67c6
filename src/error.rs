//! Error types shared by the analysis engine, the importer and the config loader

use thiserror::Error;

/// Errors raised by the hunter library
#[derive(Error, Debug)]
pub enum HunterError {
    /// A significance tester was handed an empty sample slice
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// A `Series` violated a construction precondition
    #[error("Invalid series: {0}")]
    InvalidSeries(String),

    #[error("Invalid analysis options: {0}")]
    InvalidOptions(String),

    #[error("Unknown metric: {0}")]
    UnknownMetric(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// A date/time string in none of the accepted formats
    #[error("Invalid datetime value: {0}")]
    InvalidDate(String),

    /// Malformed input data; `line` is 1-based and counts the header
    #[error("Import error at line {line}: {message}")]
    Import { line: usize, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl HunterError {
    pub fn insufficient_data(message: impl Into<String>) -> Self {
        Self::InsufficientData(message.into())
    }

    pub fn invalid_series(message: impl Into<String>) -> Self {
        Self::InvalidSeries(message.into())
    }

    pub fn invalid_options(message: impl Into<String>) -> Self {
        Self::InvalidOptions(message.into())
    }

    pub fn import(line: usize, message: impl Into<String>) -> Self {
        Self::Import {
            line,
            message: message.into(),
        }
    }
}

/// Result type for hunter library operations
pub type Result<T> = std::result::Result<T, HunterError>;
