//! Shared error type

use thiserror::Error;

/// Errors surfaced by core types and re-wrapped by stage crates
#[derive(Error, Debug)]
pub enum Error {
    #[error("stream open error: {0}")]
    StreamOpen(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("transcription error: {0}")]
    Transcription(String),

    #[error("llm error: {0}")]
    Llm(String),

    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
