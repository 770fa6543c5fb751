//! Frame row store (`video_metadata`)

use chrono::Utc;

use crate::{PersistenceError, ScyllaClient};

/// One sampled frame
#[derive(Debug, Clone, PartialEq)]
pub struct FrameRow {
    pub stream_id: String,
    pub frame_index: i64,
    pub filename: String,
    pub timestamp: f64,
    pub pts: i64,
    pub width: i32,
    pub height: i32,
}

/// ScyllaDB-backed store; the video sampler is the only writer.
#[derive(Clone)]
pub struct FrameStore {
    client: ScyllaClient,
}

impl FrameStore {
    pub fn new(client: ScyllaClient) -> Self {
        Self { client }
    }

    pub async fn insert(&self, row: &FrameRow) -> Result<(), PersistenceError> {
        let query = format!(
            "INSERT INTO {}.video_metadata (
                stream_id, frame_index, filename, timestamp, pts, width, height, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            self.client.keyspace()
        );

        self.client
            .session()
            .query_unpaged(
                query,
                (
                    &row.stream_id,
                    row.frame_index,
                    &row.filename,
                    row.timestamp,
                    row.pts,
                    row.width,
                    row.height,
                    Utc::now().timestamp_millis(),
                ),
            )
            .await?;

        Ok(())
    }

    /// Frames with `frame_index >= start_frame`, ordered, up to `limit`.
    pub async fn frames_from(
        &self,
        stream_id: &str,
        start_frame: i64,
        limit: i32,
    ) -> Result<Vec<FrameRow>, PersistenceError> {
        let query = format!(
            "SELECT stream_id, frame_index, filename, timestamp, pts, width, height
             FROM {}.video_metadata
             WHERE stream_id = ? AND frame_index >= ?
             LIMIT ?",
            self.client.keyspace()
        );

        let result = self
            .client
            .session()
            .query_unpaged(query, (stream_id, start_frame, limit))
            .await?;

        let mut rows_out = Vec::new();
        if let Some(rows) = result.rows {
            for row in rows {
                rows_out.push(Self::row_to_frame(row)?);
            }
        }
        Ok(rows_out)
    }

    fn row_to_frame(
        row: scylla::frame::response::result::Row,
    ) -> Result<FrameRow, PersistenceError> {
        let (stream_id, frame_index, filename, timestamp, pts, width, height): (
            String,
            i64,
            String,
            f64,
            i64,
            i32,
            i32,
        ) = row
            .into_typed()
            .map_err(|e| PersistenceError::InvalidData(e.to_string()))?;

        Ok(FrameRow {
            stream_id,
            frame_index,
            filename,
            timestamp,
            pts,
            width,
            height,
        })
    }
}
