//! Highlight pipeline worker entry point
//!
//! Reads one job message from the environment, constructs the shared
//! services, and runs the pipeline for that stream to completion. A missing
//! or malformed job message is a no-op exit without error.

mod probe;

use std::sync::Arc;
use std::time::Instant;

use serde::Deserialize;
use tracing_subscriber::EnvFilter;

use highlight_config::Settings;
use highlight_core::{seconds_to_hhmmss, StreamStatus};
use highlight_llm::{Captioner, Grouper, LlmClient, LlmConfig, Refiner};
use highlight_persistence::ScyllaConfig;
use highlight_pipeline::{HttpSpeechToText, Services, StreamRunner};

const JOB_ENV_VAR: &str = "HIGHLIGHT_JOB";

/// The job message delivered through the environment.
#[derive(Debug, Deserialize)]
struct JobMessage {
    stream_id: String,
    stream_url: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let Some(job) = read_job_message() else {
        return Ok(());
    };

    tracing::info!(
        stream_id = %job.stream_id,
        stream_url = %job.stream_url,
        version = env!("CARGO_PKG_VERSION"),
        "highlight worker starting"
    );

    let settings = match Settings::load(std::env::var("HIGHLIGHT_CONFIG").ok().as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            tracing::warn!(error = %e, "failed to load config, using defaults");
            Settings::default()
        }
    };

    let stores = highlight_persistence::init(ScyllaConfig {
        hosts: settings.persistence.hosts.clone(),
        keyspace: settings.persistence.keyspace.clone(),
        replication_factor: settings.persistence.replication_factor,
    })
    .await?;

    stores
        .streams
        .create_if_absent(&job.stream_id, &job.stream_url)
        .await?;

    // Reject sources that do not serve video before opening the container.
    if job.stream_url.starts_with("http://") || job.stream_url.starts_with("https://") {
        if !probe::is_video_url(&job.stream_url).await {
            let message = format!("{} does not serve video content", job.stream_url);
            tracing::error!(stream_url = %job.stream_url, "admission probe failed");
            stores
                .streams
                .set_status(&job.stream_id, StreamStatus::Failed, Some(&message))
                .await?;
            anyhow::bail!(message);
        }
    }

    let llm_client = LlmClient::new(LlmConfig::from_settings(&settings.llm))?;
    let services = Arc::new(Services {
        captioner: Captioner::new(llm_client.clone()),
        grouper: Grouper::new(llm_client.clone()),
        refiner: Refiner::new(llm_client),
        stt: Arc::new(HttpSpeechToText::new(
            settings.stt.endpoint.clone(),
            settings.stt.language_code.clone(),
        )),
        stores,
        settings,
    });

    let started = Instant::now();
    let runner = StreamRunner::new(services);
    let result = runner.run(&job.stream_id, &job.stream_url).await;

    let elapsed = seconds_to_hhmmss(started.elapsed().as_secs());
    match &result {
        Ok(()) => tracing::info!(stream_id = %job.stream_id, %elapsed, "pipeline completed"),
        Err(e) => {
            tracing::error!(stream_id = %job.stream_id, %elapsed, error = %e, "pipeline failed")
        }
    }

    result?;
    Ok(())
}

/// Parse the job message; anything missing or malformed is a no-op.
fn read_job_message() -> Option<JobMessage> {
    let raw = match std::env::var(JOB_ENV_VAR) {
        Ok(raw) => raw,
        Err(_) => {
            tracing::warn!("no {JOB_ENV_VAR} message in environment, nothing to do");
            return None;
        }
    };
    match serde_json::from_str::<JobMessage>(&raw) {
        Ok(job) if !job.stream_id.is_empty() && !job.stream_url.is_empty() => Some(job),
        Ok(_) => {
            tracing::warn!("job message has empty fields, nothing to do");
            None
        }
        Err(e) => {
            tracing::warn!(error = %e, "malformed job message, nothing to do");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_message_parses() {
        let job: JobMessage = serde_json::from_str(
            r#"{"stream_id": "abc-123", "stream_url": "https://cdn.example.com/v.mp4"}"#,
        )
        .unwrap();
        assert_eq!(job.stream_id, "abc-123");
        assert_eq!(job.stream_url, "https://cdn.example.com/v.mp4");
    }

    #[test]
    fn test_malformed_job_message_rejected() {
        assert!(serde_json::from_str::<JobMessage>("{\"stream_id\": 5}").is_err());
        assert!(serde_json::from_str::<JobMessage>("not json").is_err());
    }
}
