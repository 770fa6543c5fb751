//! ScyllaDB persistence layer for the highlight pipeline
//!
//! Provides durable storage for:
//! - Frame rows written by the video sampler
//! - Audio chunk rows written by the chunker and updated by the transcriber
//! - Score rows written by the scorer
//! - The stream row with status, message and the highlight list

pub mod audio;
pub mod client;
pub mod error;
pub mod frames;
pub mod schema;
pub mod scores;
pub mod streams;

pub use audio::{AudioChunkRow, AudioChunkStore};
pub use client::{ScyllaClient, ScyllaConfig};
pub use error::PersistenceError;
pub use frames::{FrameRow, FrameStore};
pub use scores::{ScoreRow, ScoreStore};
pub use streams::{StreamRow, StreamStore};

/// Initialize the persistence layer: connect, ensure schema, build stores.
pub async fn init(config: ScyllaConfig) -> Result<Stores, PersistenceError> {
    let client = ScyllaClient::connect(config).await?;
    client.ensure_schema().await?;

    Ok(Stores {
        frames: FrameStore::new(client.clone()),
        audio: AudioChunkStore::new(client.clone()),
        scores: ScoreStore::new(client.clone()),
        streams: StreamStore::new(client),
    })
}

/// Combined persistence layer with all stores
#[derive(Clone)]
pub struct Stores {
    pub frames: FrameStore,
    pub audio: AudioChunkStore,
    pub scores: ScoreStore,
    pub streams: StreamStore,
}
