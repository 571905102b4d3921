use std::path::PathBuf;

use thiserror::Error;

use crate::types::{Label, TileKey};

#[derive(Debug, Error)]
pub enum Error {
    /// No tile is cached for the location. Callers count and skip the point.
    #[error("No embedding tile cached for {key}")]
    TileNotFound { key: TileKey },

    #[error("Insufficient training data: {resolved} occurrence(s) resolved to an embedding, need at least {required}")]
    InsufficientTrainingData { resolved: usize, required: usize },

    #[error("Degenerate training set: every example is {label}")]
    DegenerateTrainingSet { label: Label },

    #[error("No artifact at {0}")]
    ArtifactNotFound(PathBuf),

    #[error("Corrupt artifact {path}: {reason}")]
    CorruptArtifact { path: PathBuf, reason: String },

    #[error("Corrupt tile {path}: {reason}")]
    CorruptTile { path: PathBuf, reason: String },

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn is_tile_not_found(&self) -> bool {
        matches!(self, Error::TileNotFound { .. })
    }

    pub fn corrupt_artifact(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Error::CorruptArtifact { path: path.into(), reason: reason.to_string() }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
