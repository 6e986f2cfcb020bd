use thiserror::Error;

use crate::threshold::Health;

#[derive(Error, Debug)]
pub enum CovgateError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML parse error at position {position}: {source}")]
    Xml {
        source: quick_xml::Error,
        position: usize,
    },

    #[error("Malformed report: {0}")]
    MalformedReport(String),

    #[error("Unknown element kind: '{0}'")]
    UnknownElementKind(String),

    #[error("Element kind already registered: '{0}'")]
    DuplicateElementKind(String),

    #[error("A {child} element cannot be placed under a {parent} element")]
    InvalidHierarchy { parent: String, child: String },

    #[error("Invalid threshold: {0}")]
    InvalidThreshold(String),

    #[error("Duplicate threshold for element kind '{0}'")]
    DuplicateThreshold(String),

    #[error("Unknown coverage format: '{0}'. Supported: java, cobertura, lcov")]
    UnknownFormat(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("No coverage reports found")]
    NoReports,

    #[error("Coverage gate failed: build is {health}")]
    GateFailed { health: Health },
}

impl CovgateError {
    /// True for errors caused by the content of a single report document,
    /// as opposed to configuration or I/O problems.
    #[must_use]
    pub fn is_malformed_report(&self) -> bool {
        matches!(
            self,
            CovgateError::Xml { .. }
                | CovgateError::MalformedReport(_)
                | CovgateError::InvalidHierarchy { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, CovgateError>;
