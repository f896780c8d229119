//! Error types for the inspection-features library.
//!
//! Per-row anomalies (unresolvable ids, missing fields, unmatched joins) never
//! surface here; they are handled by exclusion or by the `Missing` marker. Only
//! structural problems that indicate a broken configuration abort a run.

use thiserror::Error;

/// Errors that can abort a feature pipeline run.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing or serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A line of a line-delimited JSON source could not be parsed
    #[error("Invalid JSON record on line {line}: {source}")]
    JsonLine {
        /// 1-based line number in the source
        line: usize,
        /// Underlying parse error
        source: serde_json::Error,
    },

    /// CSV reading or writing errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Binary serialization errors
    #[error("Binary serialization error: {0}")]
    Bincode(#[from] bincode::Error),

    /// Artifact cache errors
    #[error("Cache error: {0}")]
    Cache(String),

    /// No artifact stored for the requested role
    #[error("No cached documents for role: {0}")]
    CacheMiss(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A source does not carry the fields its mapping requires
    #[error("Schema mismatch for {source_kind} source: missing fields {missing:?}")]
    SchemaMismatch {
        /// Source whose schema was checked
        source_kind: String,
        /// Required source fields that were not found
        missing: Vec<String>,
    },

    /// The crosswalk table is absent or has no usable entries
    #[error("Crosswalk table is empty")]
    EmptyCrosswalk,

    /// A crosswalk row lists more external ids than allowed
    #[error("Crosswalk entry for {canonical} has {count} external ids (max {max})")]
    CrosswalkEntryTooWide {
        /// Canonical id of the offending row
        canonical: String,
        /// Number of external ids supplied
        count: usize,
        /// Allowed maximum
        max: usize,
    },

    /// A join stage produced no rows from a non-empty input
    #[error("Join stage '{stage}' produced zero rows from {input_rows} input rows")]
    EmptyJoin {
        /// Name of the join stage
        stage: &'static str,
        /// Rows on the left side of the join
        input_rows: usize,
    },

    /// A label row lacks a field needed to build its document
    #[error("Invalid label row {row}: {reason}")]
    InvalidLabel {
        /// 0-based row position in the label table
        row: usize,
        /// What is wrong with the row
        reason: String,
    },

    /// Label rows reference entities the crosswalk does not know
    #[error("{count} {role} label rows reference unknown restaurants (first: {first})")]
    UnresolvedLabels {
        /// Dataset role the labels belong to
        role: String,
        /// Number of unresolved rows
        count: usize,
        /// First unresolved canonical id
        first: String,
    },
}

/// Convenience type alias for Result with `PipelineError`
pub type Result<T> = std::result::Result<T, PipelineError>;

impl From<sled::Error> for PipelineError {
    fn from(err: sled::Error) -> Self {
        Self::Cache(err.to_string())
    }
}

impl From<config::ConfigError> for PipelineError {
    fn from(err: config::ConfigError) -> Self {
        Self::InvalidConfig(err.to_string())
    }
}
