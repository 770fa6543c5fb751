//! Stream row store (`stream_metadata`)

use highlight_core::{Highlight, StreamStatus};

use crate::{PersistenceError, ScyllaClient};

/// The per-stream row: source URL, status, message, highlight list
#[derive(Debug, Clone, PartialEq)]
pub struct StreamRow {
    pub stream_id: String,
    pub stream_url: String,
    pub status: StreamStatus,
    pub message: Option<String>,
    /// JSON list of highlights; empty string means none yet
    pub highlights: String,
}

impl StreamRow {
    /// Parse the persisted highlight list; unparseable JSON counts as empty.
    pub fn highlight_list(&self) -> Vec<Highlight> {
        if self.highlights.is_empty() {
            return Vec::new();
        }
        serde_json::from_str(&self.highlights).unwrap_or_default()
    }
}

#[derive(Clone)]
pub struct StreamStore {
    client: ScyllaClient,
}

impl StreamStore {
    pub fn new(client: ScyllaClient) -> Self {
        Self { client }
    }

    /// Create the stream row at job admission if it does not exist yet.
    pub async fn create_if_absent(
        &self,
        stream_id: &str,
        stream_url: &str,
    ) -> Result<(), PersistenceError> {
        if self.get(stream_id).await?.is_some() {
            return Ok(());
        }

        let query = format!(
            "INSERT INTO {}.stream_metadata (stream_id, stream_url, status, message, highlights)
             VALUES (?, ?, ?, ?, ?)",
            self.client.keyspace()
        );

        self.client
            .session()
            .query_unpaged(
                query,
                (
                    stream_id,
                    stream_url,
                    StreamStatus::Submitted.as_str(),
                    "",
                    "",
                ),
            )
            .await?;

        tracing::info!(stream_id, "stream row created");
        Ok(())
    }

    pub async fn get(&self, stream_id: &str) -> Result<Option<StreamRow>, PersistenceError> {
        let query = format!(
            "SELECT stream_id, stream_url, status, message, highlights
             FROM {}.stream_metadata
             WHERE stream_id = ?",
            self.client.keyspace()
        );

        let result = self
            .client
            .session()
            .query_unpaged(query, (stream_id,))
            .await?;

        if let Some(rows) = result.rows {
            if let Some(row) = rows.into_iter().next() {
                return Ok(Some(Self::row_to_stream(row)?));
            }
        }
        Ok(None)
    }

    /// Advance the stream status; FAILED carries a message.
    pub async fn set_status(
        &self,
        stream_id: &str,
        status: StreamStatus,
        message: Option<&str>,
    ) -> Result<(), PersistenceError> {
        let query = format!(
            "UPDATE {}.stream_metadata SET status = ?, message = ?
             WHERE stream_id = ?",
            self.client.keyspace()
        );

        self.client
            .session()
            .query_unpaged(query, (status.as_str(), message.unwrap_or(""), stream_id))
            .await?;

        tracing::info!(stream_id, status = status.as_str(), "stream status updated");
        Ok(())
    }

    /// Replace the whole highlight list atomically.
    pub async fn update_highlights(
        &self,
        stream_id: &str,
        highlights: &[Highlight],
    ) -> Result<(), PersistenceError> {
        let json = serde_json::to_string(highlights)
            .map_err(|e| PersistenceError::InvalidData(e.to_string()))?;

        let query = format!(
            "UPDATE {}.stream_metadata SET highlights = ?
             WHERE stream_id = ?",
            self.client.keyspace()
        );

        self.client
            .session()
            .query_unpaged(query, (&json, stream_id))
            .await?;

        tracing::info!(stream_id, count = highlights.len(), "highlights persisted");
        Ok(())
    }

    fn row_to_stream(
        row: scylla::frame::response::result::Row,
    ) -> Result<StreamRow, PersistenceError> {
        let (stream_id, stream_url, status, message, highlights): (
            String,
            String,
            String,
            Option<String>,
            Option<String>,
        ) = row
            .into_typed()
            .map_err(|e| PersistenceError::InvalidData(e.to_string()))?;

        Ok(StreamRow {
            stream_id,
            stream_url,
            status: StreamStatus::from_str(&status),
            message: message.filter(|m| !m.is_empty()),
            highlights: highlights.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_highlight_list_parses_json() {
        let row = StreamRow {
            stream_id: "s1".to_string(),
            stream_url: "file.mp4".to_string(),
            status: StreamStatus::InProgress,
            message: None,
            highlights: r#"[{"start_time":1.0,"end_time":6.0,"title":"t","caption":"c","thumbnail":"frame_000000002.jpg","snap_reason":null}]"#.to_string(),
        };
        let list = row.highlight_list();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].start_time, 1.0);
    }

    #[test]
    fn test_highlight_list_empty_and_garbage() {
        let mut row = StreamRow {
            stream_id: "s1".to_string(),
            stream_url: "file.mp4".to_string(),
            status: StreamStatus::Submitted,
            message: None,
            highlights: String::new(),
        };
        assert!(row.highlight_list().is_empty());
        row.highlights = "not-json".to_string();
        assert!(row.highlight_list().is_empty());
    }
}
