//! Container demuxing and media frame types
//!
//! The demuxer is the only blocking component in the pipeline; it runs on a
//! dedicated OS thread and hands decoded frames across the thread boundary
//! into bounded tokio channels.

pub mod demuxer;
pub mod frame;
pub mod jpeg;
pub mod resample;

pub use demuxer::Demuxer;
pub use frame::{AudioFrame, VideoFrame};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MediaError {
    /// The container could not be opened or lacks a required elementary stream
    #[error("stream open error: {0}")]
    StreamOpen(String),

    /// Unrecoverable decode failure
    #[error("decode error: {0}")]
    Decode(String),

    #[error("encode error: {0}")]
    Encode(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<ffmpeg_the_third::Error> for MediaError {
    fn from(err: ffmpeg_the_third::Error) -> Self {
        MediaError::Decode(err.to_string())
    }
}

impl From<MediaError> for highlight_core::Error {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::StreamOpen(msg) => highlight_core::Error::StreamOpen(msg),
            other => highlight_core::Error::Decode(other.to_string()),
        }
    }
}
