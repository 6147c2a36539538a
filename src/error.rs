// ⚠️ Error types
// Only structural problems are errors. Degraded inputs are substituted with
// safe defaults by the modules that read them.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Batch is missing one or more mandatory columns
    #[error("Transaction batch is missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
