//! Score row store (`score_metadata`)

use chrono::Utc;

use crate::{PersistenceError, ScyllaClient};

/// One scored candidate window
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreRow {
    pub stream_id: String,
    pub start_time: f64,
    pub end_time: f64,
    pub saliency_score: f64,
    pub highlight_score: f64,
    pub caption: String,
}

#[derive(Clone)]
pub struct ScoreStore {
    client: ScyllaClient,
}

impl ScoreStore {
    pub fn new(client: ScyllaClient) -> Self {
        Self { client }
    }

    pub async fn insert(&self, row: &ScoreRow) -> Result<(), PersistenceError> {
        let now = Utc::now().timestamp_millis();
        let query = format!(
            "INSERT INTO {}.score_metadata (
                stream_id, start_time, end_time, saliency_score, highlight_score,
                caption, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            self.client.keyspace()
        );

        self.client
            .session()
            .query_unpaged(
                query,
                (
                    &row.stream_id,
                    row.start_time,
                    row.end_time,
                    row.saliency_score,
                    row.highlight_score,
                    &row.caption,
                    now,
                    now,
                ),
            )
            .await?;

        Ok(())
    }

    /// Score rows with `from_time <= start_time < to_time`, ordered by
    /// start_time.
    pub async fn scores_in_window(
        &self,
        stream_id: &str,
        from_time: f64,
        to_time: f64,
    ) -> Result<Vec<ScoreRow>, PersistenceError> {
        let query = format!(
            "SELECT stream_id, start_time, end_time, saliency_score, highlight_score, caption
             FROM {}.score_metadata
             WHERE stream_id = ? AND start_time >= ? AND start_time < ?",
            self.client.keyspace()
        );

        let result = self
            .client
            .session()
            .query_unpaged(query, (stream_id, from_time, to_time))
            .await?;

        let mut out = Vec::new();
        if let Some(rows) = result.rows {
            for row in rows {
                out.push(Self::row_to_score(row)?);
            }
        }
        Ok(out)
    }

    /// True if any score row starts after `after_time`.
    pub async fn has_more_after(
        &self,
        stream_id: &str,
        after_time: f64,
    ) -> Result<bool, PersistenceError> {
        let query = format!(
            "SELECT start_time FROM {}.score_metadata
             WHERE stream_id = ? AND start_time > ?
             LIMIT 1",
            self.client.keyspace()
        );

        let result = self
            .client
            .session()
            .query_unpaged(query, (stream_id, after_time))
            .await?;

        Ok(result.rows.map(|rows| !rows.is_empty()).unwrap_or(false))
    }

    fn row_to_score(
        row: scylla::frame::response::result::Row,
    ) -> Result<ScoreRow, PersistenceError> {
        let (stream_id, start_time, end_time, saliency_score, highlight_score, caption): (
            String,
            f64,
            f64,
            f64,
            f64,
            String,
        ) = row
            .into_typed()
            .map_err(|e| PersistenceError::InvalidData(e.to_string()))?;

        Ok(ScoreRow {
            stream_id,
            start_time,
            end_time,
            saliency_score,
            highlight_score,
            caption,
        })
    }
}
