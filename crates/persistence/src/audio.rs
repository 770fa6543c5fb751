//! Audio chunk row store (`audio_metadata`)
//!
//! The chunker inserts rows with the transcript sentinel; the transcriber is
//! the only writer of the transcript column afterwards.

use chrono::Utc;

use highlight_core::EMPTY_SENTINEL;

use crate::{PersistenceError, ScyllaClient};

/// One encoded audio chunk
#[derive(Debug, Clone, PartialEq)]
pub struct AudioChunkRow {
    pub stream_id: String,
    pub chunk_index: i64,
    pub filename: String,
    pub start_timestamp: f64,
    pub end_timestamp: f64,
    pub sample_rate: i32,
    pub captured_at: i64,
    /// `!EMPTY!`, `!ERROR!`, or a JSON word list
    pub transcript: String,
}

#[derive(Clone)]
pub struct AudioChunkStore {
    client: ScyllaClient,
}

impl AudioChunkStore {
    pub fn new(client: ScyllaClient) -> Self {
        Self { client }
    }

    pub async fn insert(&self, row: &AudioChunkRow) -> Result<(), PersistenceError> {
        let query = format!(
            "INSERT INTO {}.audio_metadata (
                stream_id, chunk_index, filename, start_timestamp, end_timestamp,
                sample_rate, captured_at, transcript, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            self.client.keyspace()
        );

        self.client
            .session()
            .query_unpaged(
                query,
                (
                    &row.stream_id,
                    row.chunk_index,
                    &row.filename,
                    row.start_timestamp,
                    row.end_timestamp,
                    row.sample_rate,
                    row.captured_at,
                    &row.transcript,
                    Utc::now().timestamp_millis(),
                ),
            )
            .await?;

        Ok(())
    }

    /// Chunks with `start_chunk <= chunk_index <= end_chunk`, ordered.
    pub async fn chunks_in_range(
        &self,
        stream_id: &str,
        start_chunk: i64,
        end_chunk: i64,
    ) -> Result<Vec<AudioChunkRow>, PersistenceError> {
        let query = format!(
            "SELECT stream_id, chunk_index, filename, start_timestamp, end_timestamp,
                    sample_rate, captured_at, transcript
             FROM {}.audio_metadata
             WHERE stream_id = ? AND chunk_index >= ? AND chunk_index <= ?",
            self.client.keyspace()
        );

        let result = self
            .client
            .session()
            .query_unpaged(query, (stream_id, start_chunk, end_chunk))
            .await?;

        Self::rows_to_chunks(result.rows)
    }

    /// Every chunk of the stream, ordered by chunk_index.
    pub async fn all_chunks(&self, stream_id: &str) -> Result<Vec<AudioChunkRow>, PersistenceError> {
        let query = format!(
            "SELECT stream_id, chunk_index, filename, start_timestamp, end_timestamp,
                    sample_rate, captured_at, transcript
             FROM {}.audio_metadata
             WHERE stream_id = ?",
            self.client.keyspace()
        );

        let result = self
            .client
            .session()
            .query_unpaged(query, (stream_id,))
            .await?;

        Self::rows_to_chunks(result.rows)
    }

    /// Chunks whose transcript is still the placeholder sentinel, ordered by
    /// chunk_index, up to `limit`.
    pub async fn pending_transcripts(
        &self,
        stream_id: &str,
        limit: i32,
    ) -> Result<Vec<AudioChunkRow>, PersistenceError> {
        let query = format!(
            "SELECT stream_id, chunk_index, filename, start_timestamp, end_timestamp,
                    sample_rate, captured_at, transcript
             FROM {}.audio_metadata
             WHERE stream_id = ? AND transcript = ?
             LIMIT ? ALLOW FILTERING",
            self.client.keyspace()
        );

        let result = self
            .client
            .session()
            .query_unpaged(query, (stream_id, EMPTY_SENTINEL, limit))
            .await?;

        Self::rows_to_chunks(result.rows)
    }

    /// Fetch a single chunk row.
    pub async fn get(
        &self,
        stream_id: &str,
        chunk_index: i64,
    ) -> Result<Option<AudioChunkRow>, PersistenceError> {
        let query = format!(
            "SELECT stream_id, chunk_index, filename, start_timestamp, end_timestamp,
                    sample_rate, captured_at, transcript
             FROM {}.audio_metadata
             WHERE stream_id = ? AND chunk_index = ?",
            self.client.keyspace()
        );

        let result = self
            .client
            .session()
            .query_unpaged(query, (stream_id, chunk_index))
            .await?;

        if let Some(rows) = result.rows {
            if let Some(row) = rows.into_iter().next() {
                return Ok(Some(Self::row_to_chunk(row)?));
            }
        }
        Ok(None)
    }

    /// Overwrite the transcript column of one chunk.
    pub async fn update_transcript(
        &self,
        stream_id: &str,
        chunk_index: i64,
        transcript: &str,
    ) -> Result<(), PersistenceError> {
        let query = format!(
            "UPDATE {}.audio_metadata SET transcript = ?
             WHERE stream_id = ? AND chunk_index = ?",
            self.client.keyspace()
        );

        self.client
            .session()
            .query_unpaged(query, (transcript, stream_id, chunk_index))
            .await?;

        tracing::debug!(stream_id, chunk_index, "transcript updated");
        Ok(())
    }

    fn rows_to_chunks(
        rows: Option<Vec<scylla::frame::response::result::Row>>,
    ) -> Result<Vec<AudioChunkRow>, PersistenceError> {
        let mut out = Vec::new();
        if let Some(rows) = rows {
            for row in rows {
                out.push(Self::row_to_chunk(row)?);
            }
        }
        Ok(out)
    }

    fn row_to_chunk(
        row: scylla::frame::response::result::Row,
    ) -> Result<AudioChunkRow, PersistenceError> {
        let (
            stream_id,
            chunk_index,
            filename,
            start_timestamp,
            end_timestamp,
            sample_rate,
            captured_at,
            transcript,
        ): (String, i64, String, f64, f64, i32, i64, String) = row
            .into_typed()
            .map_err(|e| PersistenceError::InvalidData(e.to_string()))?;

        Ok(AudioChunkRow {
            stream_id,
            chunk_index,
            filename,
            start_timestamp,
            end_timestamp,
            sample_rate,
            captured_at,
            transcript,
        })
    }
}
