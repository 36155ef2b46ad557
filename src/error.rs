// src/error.rs
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoachError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV export failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("store error: {0}")]
    Store(String),

    #[error("no async runtime available: {0}")]
    Runtime(String),

    #[error("unknown exercise `{0}` (expected squat, pushup or plank)")]
    UnknownExercise(String),
}

pub type Result<T> = std::result::Result<T, CoachError>;
