//! Error types for blunder-drill-core

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Input data violates board-notation grammar. Not retriable without
    /// correcting the input.
    #[error("Malformed position: {0}")]
    MalformedPosition(String),

    /// A submitted move is not legal in the current position. Recovered at
    /// the input boundary; a drill session survives it.
    #[error("Illegal move: {0}")]
    IllegalMove(String),

    /// The external analysis backend failed or timed out. Retriable;
    /// ingestion skips the position, drilling falls back to the snapshot.
    #[error("Evaluation unavailable: {0}")]
    EvaluationUnavailable(String),

    #[error("No blunder record with id {0}")]
    RecordNotFound(i64),

    /// Optimistic-lock retries exhausted on a statistics update.
    #[error("Conflicting concurrent update for record {0}")]
    UpdateConflict(i64),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("PGN parsing error: {0}")]
    Pgn(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
