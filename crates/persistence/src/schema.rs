//! ScyllaDB schema creation

use crate::error::PersistenceError;
use scylla::Session;

/// Create the keyspace if it doesn't exist
pub async fn create_keyspace(
    session: &Session,
    keyspace: &str,
    replication_factor: u8,
) -> Result<(), PersistenceError> {
    let query = format!(
        "CREATE KEYSPACE IF NOT EXISTS {} WITH replication = {{'class': 'SimpleStrategy', 'replication_factor': {}}}",
        keyspace, replication_factor
    );

    session
        .query_unpaged(query, &[])
        .await
        .map_err(|e| PersistenceError::SchemaError(format!("Failed to create keyspace: {}", e)))?;

    Ok(())
}

/// Create all required tables
pub async fn create_tables(session: &Session, keyspace: &str) -> Result<(), PersistenceError> {
    // One row per sampled frame, clustered by frame_index
    let video_table = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {}.video_metadata (
            stream_id TEXT,
            frame_index BIGINT,
            filename TEXT,
            timestamp DOUBLE,
            pts BIGINT,
            width INT,
            height INT,
            created_at BIGINT,
            PRIMARY KEY ((stream_id), frame_index)
        ) WITH CLUSTERING ORDER BY (frame_index ASC)
    "#,
        keyspace
    );

    session.query_unpaged(video_table, &[]).await.map_err(|e| {
        PersistenceError::SchemaError(format!("Failed to create video_metadata table: {}", e))
    })?;

    // One row per audio chunk, clustered by chunk_index
    let audio_table = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {}.audio_metadata (
            stream_id TEXT,
            chunk_index BIGINT,
            filename TEXT,
            start_timestamp DOUBLE,
            end_timestamp DOUBLE,
            sample_rate INT,
            captured_at BIGINT,
            transcript TEXT,
            created_at BIGINT,
            PRIMARY KEY ((stream_id), chunk_index)
        ) WITH CLUSTERING ORDER BY (chunk_index ASC)
    "#,
        keyspace
    );

    session.query_unpaged(audio_table, &[]).await.map_err(|e| {
        PersistenceError::SchemaError(format!("Failed to create audio_metadata table: {}", e))
    })?;

    // One row per candidate window, clustered by start_time
    let score_table = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {}.score_metadata (
            stream_id TEXT,
            start_time DOUBLE,
            end_time DOUBLE,
            saliency_score DOUBLE,
            highlight_score DOUBLE,
            caption TEXT,
            created_at BIGINT,
            updated_at BIGINT,
            PRIMARY KEY ((stream_id), start_time)
        ) WITH CLUSTERING ORDER BY (start_time ASC)
    "#,
        keyspace
    );

    session.query_unpaged(score_table, &[]).await.map_err(|e| {
        PersistenceError::SchemaError(format!("Failed to create score_metadata table: {}", e))
    })?;

    // One row per stream with the evolving highlight list
    let stream_table = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {}.stream_metadata (
            stream_id TEXT,
            stream_url TEXT,
            status TEXT,
            message TEXT,
            highlights TEXT,
            PRIMARY KEY ((stream_id))
        )
    "#,
        keyspace
    );

    session.query_unpaged(stream_table, &[]).await.map_err(|e| {
        PersistenceError::SchemaError(format!("Failed to create stream_metadata table: {}", e))
    })?;

    Ok(())
}
