//! Candidate scorer: one score row per fixed-length window

use std::path::PathBuf;
use std::time::Duration;

use highlight_analysis::SaliencyScorer;
use highlight_config::constants::SCORER_RETRY_MS;
use highlight_config::{MediaConfig, ScoringConfig};
use highlight_core::{Latch, StageLatches, Transcript};
use highlight_llm::{Captioner, ImageBlock};
use highlight_persistence::{AudioChunkRow, ScoreRow, Stores};

use crate::candidate::CandidateClip;
use crate::transcriber::Transcriber;
use crate::PipelineError;

/// Iterates candidate windows, gathering co-temporal audio, frames and
/// transcript, and writes one score row per window.
pub struct ClipScorer {
    stores: Stores,
    captioner: Captioner,
    transcriber: Transcriber,
    saliency: SaliencyScorer,
    base_path: PathBuf,
    media: MediaConfig,
    scoring: ScoringConfig,
}

impl ClipScorer {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        stores: Stores,
        captioner: Captioner,
        transcriber: Transcriber,
        base_path: PathBuf,
        media: MediaConfig,
        scoring: ScoringConfig,
    ) -> Self {
        let saliency = SaliencyScorer::new(scoring.alpha_motion, scoring.alpha_audio);
        Self {
            stores,
            captioner,
            transcriber,
            saliency,
            base_path,
            media,
            scoring,
        }
    }

    pub async fn run(
        &self,
        stream_id: String,
        done: Latch,
        producers: StageLatches,
    ) -> Result<(), PipelineError> {
        tracing::info!(stream_id = %stream_id, "clip scorer started");
        let slice = self.scoring.candidate_slice_secs;
        let chunk_duration = self.media.audio_chunk_secs;

        let mut i: u64 = 0;
        let mut should_break = false;
        // Chunks already given their one recovery attempt.
        let mut retried: std::collections::HashSet<i64> = std::collections::HashSet::new();
        loop {
            if should_break {
                tracing::info!(stream_id = %stream_id, windows = i, "clip scorer exiting");
                done.set();
                return Ok(());
            }

            let start_time = i as f64 * slice;
            let end_time = start_time + slice;
            let clip = CandidateClip::new(&self.base_path, start_time, end_time);
            let chunk_indexes = clip.audio_chunk_indexes(chunk_duration);

            let mut audio_rows = match (chunk_indexes.first(), chunk_indexes.last()) {
                (Some(&first), Some(&last)) => {
                    self.stores
                        .audio
                        .chunks_in_range(&stream_id, first, last)
                        .await?
                }
                _ => Vec::new(),
            };

            // Error sentinels get one targeted re-transcription; empty
            // transcripts mean the transcriber has not caught up yet.
            if !self.transcripts_ready(&audio_rows, &mut retried).await? {
                if producers.producers_done()
                    && self.transcripts_unrecoverable(&stream_id, &chunk_indexes).await?
                {
                    // Nothing more will arrive for this window; pick up
                    // whatever the recovery attempt managed to write.
                    if let (Some(&first), Some(&last)) =
                        (chunk_indexes.first(), chunk_indexes.last())
                    {
                        audio_rows = self
                            .stores
                            .audio
                            .chunks_in_range(&stream_id, first, last)
                            .await?;
                    }
                } else {
                    tokio::time::sleep(Duration::from_millis(SCORER_RETRY_MS)).await;
                    continue;
                }
            }

            let start_frame = (start_time * self.media.video_frame_sample_rate).floor() as i64;
            let frame_budget =
                ((end_time - start_time) * self.media.video_frame_sample_rate).ceil() as i32;
            let frame_rows = self
                .stores
                .frames
                .frames_from(&stream_id, start_frame, frame_budget.max(1))
                .await?;

            if frame_rows.is_empty() || audio_rows.len() != chunk_indexes.len() {
                if producers.producers_done() {
                    should_break = true;
                    if frame_rows.is_empty() || audio_rows.is_empty() {
                        continue;
                    }
                    // Fall through: emit the final partial window.
                } else {
                    tokio::time::sleep(Duration::from_millis(SCORER_RETRY_MS)).await;
                    continue;
                }
            }

            tracing::info!(stream_id = %stream_id, start_time, end_time, "scoring window");

            let segment = clip.load_audio_segment(chunk_duration);
            let frames = clip.load_gray_frames(self.media.video_frame_sample_rate);
            let saliency_score = self.saliency.compute_saliency(&frames, &segment.samples);

            let transcript = clip.transcript_text(&audio_rows);
            let images: Vec<ImageBlock> = clip
                .load_frame_bytes(self.media.video_frame_sample_rate)
                .into_iter()
                .map(|jpeg| ImageBlock { jpeg })
                .collect();

            match self.captioner.caption_and_score(&transcript, images).await {
                Ok(caption) => {
                    self.stores
                        .scores
                        .insert(&ScoreRow {
                            stream_id: stream_id.clone(),
                            start_time,
                            end_time,
                            saliency_score,
                            highlight_score: caption.highlight_score,
                            caption: caption.caption,
                        })
                        .await?;
                }
                Err(e) => {
                    tracing::error!(
                        stream_id = %stream_id,
                        start_time,
                        error = %e,
                        "captioner failed permanently, skipping window"
                    );
                }
            }

            i += 1;
        }
    }

    /// True when every fetched row carries a usable transcript.
    ///
    /// A row with the error sentinel gets exactly one recovery attempt.
    async fn transcripts_ready(
        &self,
        rows: &[AudioChunkRow],
        retried: &mut std::collections::HashSet<i64>,
    ) -> Result<bool, PipelineError> {
        let mut ready = true;
        for row in rows {
            match Transcript::from_column(&row.transcript) {
                Transcript::Words(_) => {}
                Transcript::Error => {
                    if retried.insert(row.chunk_index) {
                        tracing::info!(
                            chunk = %row.filename,
                            "re-transcribing chunk with error sentinel"
                        );
                        self.transcriber.transcribe_row(row).await?;
                        ready = false;
                    }
                    // An error that survived its recovery attempt counts as
                    // final; the window proceeds without this transcript.
                }
                Transcript::Empty => {
                    ready = false;
                }
            }
        }
        Ok(ready)
    }

    /// After the producers are done: true when the window's chunks are all
    /// finalized (words or a still-standing error sentinel after the re-run)
    /// so waiting longer cannot help.
    async fn transcripts_unrecoverable(
        &self,
        stream_id: &str,
        chunk_indexes: &[i64],
    ) -> Result<bool, PipelineError> {
        for &index in chunk_indexes {
            match self.stores.audio.get(stream_id, index).await? {
                Some(row) => {
                    if !Transcript::from_column(&row.transcript).is_finalized() {
                        return Ok(false);
                    }
                }
                // A missing row past the end of the stream is final too.
                None => {}
            }
        }
        Ok(true)
    }
}
