//! Error types for the bicycle identification pipeline.

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while loading runs or configuring first-principles models.
///
/// Filtering and aggregation never fail; an empty subset is reported as
/// "no data" by the callers instead.
#[derive(Error, Debug)]
pub enum Error {
    /// The run matrix file or metadata table is inconsistent or incomplete.
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// The metadata table has no row for a run identifier.
    #[error("No metadata record for run {0}")]
    RecordNotFound(String),

    /// Model construction with a rider outside Charlie, Jason, Luke.
    #[error("{0} is not a valid rider")]
    InvalidRider(String),

    /// Parameter mutation on a name the model does not carry.
    #[error("{0} is not a valid parameter")]
    UnknownParameter(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON decoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV decoding error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Arrow error
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Parquet error
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),
}

impl Error {
    /// Whether the error points at a bad input file rather than a bad
    /// model configuration.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Error::MalformedInput(_)
                | Error::RecordNotFound(_)
                | Error::Io(_)
                | Error::Json(_)
                | Error::Csv(_)
                | Error::Arrow(_)
                | Error::Parquet(_)
        )
    }
}
