//! Concurrent stream-processing pipeline
//!
//! Stages exchange work through bounded queues and the relational store:
//! demuxer -> {video sampler, audio chunker} -> transcriber -> scorer ->
//! assembler, sequenced by the lifecycle runner.

pub mod assembler;
pub mod boundaries;
pub mod candidate;
pub mod chunker;
pub mod refine;
pub mod runner;
pub mod sampler;
pub mod scorer;
pub mod stt;
pub mod transcriber;

use std::sync::Arc;

use thiserror::Error;

use highlight_config::Settings;
use highlight_llm::{Captioner, Grouper, Refiner};
use highlight_persistence::Stores;

pub use runner::StreamRunner;
pub use stt::{HttpSpeechToText, SpeechToText, SttError};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Media(#[from] highlight_media::MediaError),

    #[error(transparent)]
    Persistence(#[from] highlight_persistence::PersistenceError),

    #[error(transparent)]
    Llm(#[from] highlight_llm::LlmError),

    #[error(transparent)]
    Stt(#[from] stt::SttError),

    #[error(transparent)]
    Core(#[from] highlight_core::Error),

    #[error("task join error: {0}")]
    Join(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Shared services, constructed once by the lifecycle controller and passed
/// down. Stages receive only the pieces they need.
pub struct Services {
    pub settings: Settings,
    pub stores: Stores,
    pub captioner: Captioner,
    pub grouper: Grouper,
    pub refiner: Refiner,
    pub stt: Arc<dyn SpeechToText>,
}

impl Services {
    /// Artifact root for one stream: `<base_dir>/<stream_id>/`.
    pub fn stream_dir(&self, stream_id: &str) -> std::path::PathBuf {
        std::path::Path::new(&self.settings.storage.base_dir).join(stream_id)
    }
}
