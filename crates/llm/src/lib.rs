//! LLM callables for the highlight pipeline
//!
//! Three JSON-in/JSON-out services backed by one Messages-API client:
//! - Captioner: caption + semantic highlight score per candidate window
//! - Grouper: titles contiguous caption runs, possibly splitting them
//! - Refiner: edge-refinement plan, parsed into a strict sum type

pub mod captioner;
pub mod client;
pub mod grouper;
pub mod refiner;

pub use captioner::{CaptionScore, Captioner};
pub use client::{extract_json, ImageBlock, LlmClient, LlmConfig};
pub use grouper::{Grouper, TitledGroup};
pub use refiner::{EdgeCandidates, RefineContext, RefineDecision, RefinePlan, Refiner};

use thiserror::Error;

/// LLM errors
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("API error: {0}")]
    Api(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        LlmError::Network(err.to_string())
    }
}

impl From<LlmError> for highlight_core::Error {
    fn from(err: LlmError) -> Self {
        highlight_core::Error::Llm(err.to_string())
    }
}
