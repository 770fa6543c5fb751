//! Boundary caches owned by the assembler
//!
//! Scene cuts are computed once per stream from the persisted frames; topic
//! boundaries are recomputed as the transcript grows and once more when the
//! scorer has finished.

use std::path::PathBuf;

use highlight_analysis::{detect_scene_boundaries, text_tiling_boundaries, TilingParams};
use highlight_config::constants::TOPIC_REFRESH_WORDS;
use highlight_config::{SceneConfig, TextTilingConfig};
use highlight_core::{Latch, Transcript, WordItem};
use highlight_persistence::AudioChunkStore;

use crate::PipelineError;

/// Per-stream boundary caches and the word-count watermark.
pub struct BoundaryCache {
    store: AudioChunkStore,
    frames_dir: PathBuf,
    fps: f64,
    scene_config: SceneConfig,
    tiling: TilingParams,
    scenes: Option<Vec<f64>>,
    topics: Vec<f64>,
    topics_computed: bool,
    topic_words_count: usize,
    final_recompute_done: bool,
}

impl BoundaryCache {
    pub fn new(
        store: AudioChunkStore,
        frames_dir: PathBuf,
        fps: f64,
        scene_config: SceneConfig,
        tiling_config: &TextTilingConfig,
    ) -> Self {
        Self {
            store,
            frames_dir,
            fps,
            scene_config,
            tiling: TilingParams {
                block_size: tiling_config.block_size,
                step: tiling_config.step,
                smoothing_width: tiling_config.smoothing_width,
                cutoff_std: tiling_config.cutoff_std,
            },
            scenes: None,
            topics: Vec::new(),
            topics_computed: false,
            topic_words_count: 0,
            final_recompute_done: false,
        }
    }

    pub fn scenes(&self) -> &[f64] {
        self.scenes.as_deref().unwrap_or(&[])
    }

    pub fn topics(&self) -> &[f64] {
        &self.topics
    }

    /// Ensure both caches are present and current enough.
    pub async fn ensure(&mut self, stream_id: &str, scorer_done: &Latch) -> Result<(), PipelineError> {
        if self.scenes.is_none() {
            let cuts = detect_scene_boundaries(
                &self.frames_dir,
                self.fps,
                self.scene_config.threshold,
                self.scene_config.min_scene_len_secs,
            );
            tracing::info!(stream_id = %stream_id, cuts = cuts.len(), "scene boundaries detected");
            self.scenes = Some(cuts);
        }

        let words = self.flatten_transcript_words(stream_id).await?;
        let grew = words.len().saturating_sub(self.topic_words_count) >= TOPIC_REFRESH_WORDS;
        let scorer_finished = scorer_done.is_set() && !self.final_recompute_done;
        if !self.topics_computed || grew || scorer_finished {
            self.topics = text_tiling_boundaries(&words, &self.tiling);
            self.topics_computed = true;
            self.topic_words_count = words.len();
            if scorer_done.is_set() {
                self.final_recompute_done = true;
            }
            tracing::info!(
                stream_id,
                boundaries = self.topics.len(),
                words = self.topic_words_count,
                "topic boundaries recomputed"
            );
        }
        Ok(())
    }

    /// All spoken words of the stream so far, shifted onto the media
    /// timeline by each chunk's start timestamp.
    async fn flatten_transcript_words(
        &self,
        stream_id: &str,
    ) -> Result<Vec<WordItem>, PipelineError> {
        let rows = self.store.all_chunks(stream_id).await?;
        let mut words = Vec::new();
        for row in rows {
            let transcript = Transcript::from_column(&row.transcript);
            for item in transcript.words() {
                if !item.is_spoken() {
                    continue;
                }
                words.push(WordItem {
                    content: item.content.clone(),
                    start_time: item.start_time + row.start_timestamp,
                    end_time: item.end_time + row.start_timestamp,
                    item_type: item.item_type,
                });
            }
        }
        Ok(words)
    }
}
