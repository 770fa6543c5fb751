//! Core types for the highlight pipeline
//!
//! This crate provides the foundational types used across all other crates:
//! - Transcript word items and the column sentinels
//! - Highlight records and stream status
//! - Stage latches and the demuxer stop flag
//! - Artifact naming helpers
//! - Retry/backoff policy
//! - Error types

pub mod artifacts;
pub mod backoff;
pub mod error;
pub mod highlight;
pub mod latch;
pub mod transcript;

pub use artifacts::{audio_chunk_filename, frame_filename, parse_frame_index, seconds_to_hhmmss};
pub use backoff::RetryPolicy;
pub use error::{Error, Result};
pub use highlight::{Highlight, StreamStatus};
pub use latch::{Latch, StageLatches, StopFlag};
pub use transcript::{ItemType, Transcript, WordItem, EMPTY_SENTINEL, ERROR_SENTINEL};
