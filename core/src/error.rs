use thiserror::Error;

use crate::types::Dimension;

#[derive(Error, Debug)]
pub enum CubeError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Could not replace output artifact: {0}")]
    Persist(#[from] tempfile::PersistError),

    #[error("Invalid config: {0}")]
    Config(String),

    #[error("Cannot roll up from grain {from} to {to}: target is not a subset")]
    InvalidGrain { from: String, to: String },

    #[error("Operation requires dimension '{0}' in the cube grain")]
    MissingDimension(Dimension),

    #[error("Measures overflow while summing {key}")]
    MeasureOverflow { key: String },

    #[error("Corrupt cube file at line {line}: {reason}")]
    CorruptCube { line: u64, reason: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type CubeResult<T> = Result<T, CubeError>;
