//! Lifecycle controller
//!
//! Sequences startup, translates process signals into cooperative shutdown,
//! awaits drain ordering (demuxer -> modality workers -> transcriber ->
//! scorer -> assembler), and records the terminal stream status.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use highlight_config::constants::FRAME_QUEUE_CAPACITY;
use highlight_core::{StageLatches, StopFlag, StreamStatus};
use highlight_media::Demuxer;

use crate::assembler::HighlightAssembler;
use crate::chunker::AudioChunker;
use crate::sampler::VideoSampler;
use crate::scorer::ClipScorer;
use crate::transcriber::Transcriber;
use crate::{PipelineError, Services};

/// Owns queues, latches and stage tasks for one stream run.
pub struct StreamRunner {
    services: Arc<Services>,
}

impl StreamRunner {
    pub fn new(services: Arc<Services>) -> Self {
        Self { services }
    }

    /// Run the whole pipeline for one stream to completion.
    ///
    /// The terminal stream status (`COMPLETED` or `FAILED` with a message)
    /// is written before this returns.
    pub async fn run(&self, stream_id: &str, stream_url: &str) -> Result<(), PipelineError> {
        let outcome = self.run_stages(stream_id, stream_url).await;

        match &outcome {
            Ok(()) => {
                self.services
                    .stores
                    .streams
                    .set_status(stream_id, StreamStatus::Completed, None)
                    .await?;
            }
            Err(e) => {
                self.services
                    .stores
                    .streams
                    .set_status(stream_id, StreamStatus::Failed, Some(&e.to_string()))
                    .await?;
            }
        }
        outcome
    }

    async fn run_stages(&self, stream_id: &str, stream_url: &str) -> Result<(), PipelineError> {
        let services = &self.services;
        let settings = &services.settings;
        let stream_dir = services.stream_dir(stream_id);

        services
            .stores
            .streams
            .set_status(stream_id, StreamStatus::InProgress, None)
            .await?;

        let stop = StopFlag::new();
        let latches = StageLatches::new();

        let (video_tx, video_rx) = mpsc::channel(FRAME_QUEUE_CAPACITY);
        let (audio_tx, audio_rx) = mpsc::channel(FRAME_QUEUE_CAPACITY);

        // The decoder is blocking; it gets a dedicated OS thread and posts
        // frames to the cooperative side with blocking_send.
        let demuxer = Demuxer::new(
            stream_url,
            settings.media.max_stream_duration_secs,
            video_tx,
            audio_tx,
            stop.clone(),
        );
        let demux_thread = std::thread::Builder::new()
            .name("demuxer".to_string())
            .spawn(move || demuxer.run())
            .map_err(PipelineError::Io)?;

        let sampler = VideoSampler::new(
            services.stores.frames.clone(),
            stream_dir.join("frames"),
            settings.media.video_frame_sample_rate,
        );
        let sampler_task: JoinHandle<Result<(), PipelineError>> = tokio::spawn(sampler.run(
            stream_id.to_string(),
            video_rx,
            latches.video_processor.clone(),
            stop.clone(),
        ));

        let chunker = AudioChunker::new(
            services.stores.audio.clone(),
            stream_dir.join("audio_chunks"),
            settings.media.audio_chunk_secs,
            settings.media.target_sample_rate,
        );
        let chunker_task: JoinHandle<Result<(), PipelineError>> = tokio::spawn(chunker.run(
            stream_id.to_string(),
            audio_rx,
            latches.audio_processor.clone(),
            stop.clone(),
        ));

        let transcriber = Transcriber::new(
            services.stores.audio.clone(),
            services.stt.clone(),
            stream_dir.join("audio_chunks"),
            highlight_core::RetryPolicy {
                max_attempts: settings.stt.max_attempts,
                ..highlight_core::RetryPolicy::default()
            },
        );
        let transcriber_task: JoinHandle<Result<(), PipelineError>> = {
            let latch = latches.audio_processor.clone();
            let stream_id = stream_id.to_string();
            tokio::spawn(async move { transcriber.run(stream_id, latch).await })
        };

        let scorer = ClipScorer::new(
            services.stores.clone(),
            services.captioner.clone(),
            Transcriber::new(
                services.stores.audio.clone(),
                services.stt.clone(),
                stream_dir.join("audio_chunks"),
                highlight_core::RetryPolicy {
                    max_attempts: settings.stt.max_attempts,
                    ..highlight_core::RetryPolicy::default()
                },
            ),
            stream_dir.clone(),
            settings.media.clone(),
            settings.scoring.clone(),
        );
        let scorer_task: JoinHandle<Result<(), PipelineError>> = {
            let done = latches.clip_scorer.clone();
            let producers = latches.clone();
            let stream_id = stream_id.to_string();
            tokio::spawn(async move { scorer.run(stream_id, done, producers).await })
        };

        let assembler = HighlightAssembler::new(
            services.stores.clone(),
            services.grouper.clone(),
            services.refiner.clone(),
            stream_dir.clone(),
            settings.media.clone(),
            settings.scoring.clone(),
            settings.assembly.clone(),
            settings.scene.clone(),
            settings.text_tiling.clone(),
        );
        let assembler_task: JoinHandle<Result<(), PipelineError>> = {
            let scorer_done = latches.clip_scorer.clone();
            let stream_id = stream_id.to_string();
            tokio::spawn(async move { assembler.run(stream_id, scorer_done).await })
        };

        // Signals translate into cooperative shutdown: the demuxer stops and
        // the modality workers drain, which cascades downstream.
        let signal_task = spawn_signal_listener(stop.clone(), latches.clone());

        // Await in drain order. The demuxer thread finishes first by
        // construction (it owns the senders).
        let demux_result = tokio::task::spawn_blocking(move || demux_thread.join())
            .await
            .map_err(|e| PipelineError::Join(e.to_string()))?;
        let demux_result = demux_result.map_err(|_| {
            PipelineError::Join("demuxer thread panicked".to_string())
        })?;

        join_stage("video sampler", sampler_task).await?;
        join_stage("audio chunker", chunker_task).await?;
        join_stage("transcriber", transcriber_task).await?;
        join_stage("clip scorer", scorer_task).await?;
        join_stage("assembler", assembler_task).await?;

        signal_task.abort();

        // A structural demuxer failure fails the run even after the
        // downstream stages drained cleanly.
        demux_result.map_err(PipelineError::Media)?;

        Ok(())
    }
}

async fn join_stage(
    name: &str,
    task: JoinHandle<Result<(), PipelineError>>,
) -> Result<(), PipelineError> {
    match task.await {
        Ok(result) => {
            if let Err(e) = &result {
                tracing::error!(stage = name, error = %e, "stage failed");
            }
            result
        }
        Err(e) => Err(PipelineError::Join(format!("{name}: {e}"))),
    }
}

fn spawn_signal_listener(stop: StopFlag, latches: StageLatches) -> JoinHandle<()> {
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            let mut sigterm = match tokio::signal::unix::signal(
                tokio::signal::unix::SignalKind::terminate(),
            ) {
                Ok(sigterm) => sigterm,
                Err(e) => {
                    tracing::warn!(error = %e, "cannot install SIGTERM handler");
                    return;
                }
            };
            tokio::select! {
                _ = ctrl_c => {}
                _ = sigterm.recv() => {}
            }
        }
        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
        }

        tracing::info!("received shutdown signal, initiating cooperative shutdown");
        stop.set();
        latches.video_processor.set();
        latches.audio_processor.set();
    })
}
