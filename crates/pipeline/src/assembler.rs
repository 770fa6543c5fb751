//! Highlight assembler
//!
//! Reads blocks of score rows, thresholds them into highlight groups, titles
//! each group, refines edges, and persists the evolving highlight list.

use std::path::PathBuf;
use std::time::Duration;

use highlight_config::constants::ASSEMBLER_WAIT_MS;
use highlight_config::{AssemblyConfig, MediaConfig, SceneConfig, ScoringConfig, TextTilingConfig};
use highlight_core::{frame_filename, Highlight, Latch};
use highlight_llm::{Grouper, Refiner, RefinePlan, TitledGroup};
use highlight_persistence::{ScoreRow, Stores};

use crate::boundaries::BoundaryCache;
use crate::candidate::CandidateClip;
use crate::refine::{
    build_context, clamp_to_edge_budget, execute_plan, gather_edge_frames, snap_generous,
};
use crate::PipelineError;

use highlight_analysis::Priority;

/// Groups contiguous high-scoring slices into titled, refined highlights.
pub struct HighlightAssembler {
    stores: Stores,
    grouper: Grouper,
    refiner: Refiner,
    base_path: PathBuf,
    media: MediaConfig,
    scoring: ScoringConfig,
    assembly: AssemblyConfig,
    scene: SceneConfig,
    tiling: TextTilingConfig,
}

impl HighlightAssembler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        stores: Stores,
        grouper: Grouper,
        refiner: Refiner,
        base_path: PathBuf,
        media: MediaConfig,
        scoring: ScoringConfig,
        assembly: AssemblyConfig,
        scene: SceneConfig,
        tiling: TextTilingConfig,
    ) -> Self {
        Self {
            stores,
            grouper,
            refiner,
            base_path,
            media,
            scoring,
            assembly,
            scene,
            tiling,
        }
    }

    pub async fn run(&self, stream_id: String, scorer_done: Latch) -> Result<(), PipelineError> {
        tracing::info!(stream_id = %stream_id, "assembler started");

        let mut caches = BoundaryCache::new(
            self.stores.audio.clone(),
            self.base_path.join("frames"),
            self.media.video_frame_sample_rate,
            self.scene.clone(),
            &self.tiling,
        );

        let chunk_secs = self.assembly.highlight_chunk_secs;
        let full_batch = (chunk_secs / self.scoring.candidate_slice_secs) as usize;

        let mut cursor = 0.0f64;
        let mut should_break = false;
        loop {
            if should_break {
                tracing::info!(stream_id = %stream_id, "assembler exiting");
                return Ok(());
            }

            let rows = self
                .stores
                .scores
                .scores_in_window(&stream_id, cursor, cursor + chunk_secs)
                .await?;

            if rows.len() < full_batch {
                if scorer_done.is_set() {
                    if rows.is_empty() {
                        should_break = true;
                        continue;
                    }
                    let last_end = rows.last().map(|r| r.end_time).unwrap_or(cursor);
                    if self.stores.scores.has_more_after(&stream_id, last_end).await? {
                        tracing::info!(
                            stream_id = %stream_id,
                            "scorer has exited but more rows remain, fetching them"
                        );
                        continue;
                    }
                    tracing::info!(stream_id = %stream_id, "final score batch, exiting after this cycle");
                    should_break = true;
                    // Fall through and process the final partial batch.
                } else {
                    tracing::debug!(stream_id = %stream_id, "waiting for score rows");
                    tokio::time::sleep(Duration::from_millis(ASSEMBLER_WAIT_MS)).await;
                    continue;
                }
            }

            self.assemble_batch(&stream_id, &rows, &scorer_done, &mut caches)
                .await?;
            cursor += chunk_secs;
        }
    }

    async fn assemble_batch(
        &self,
        stream_id: &str,
        rows: &[ScoreRow],
        scorer_done: &Latch,
        caches: &mut BoundaryCache,
    ) -> Result<(), PipelineError> {
        let mask = build_mask(rows);
        let groups = consolidate_runs(&one_runs(&mask));
        if groups.is_empty() {
            return Ok(());
        }

        let mut highlights = match self.stores.streams.get(stream_id).await? {
            Some(row) => row.highlight_list(),
            None => Vec::new(),
        };

        for (block_start, block_end) in groups {
            let captions: Vec<String> = rows[block_start..=block_end]
                .iter()
                .map(|r| r.caption.clone())
                .collect();

            // A grouper failure is bypassed with one group spanning the block.
            let titled = match self.grouper.group_and_title(&captions).await {
                Ok(groups) => groups,
                Err(e) => {
                    tracing::warn!(error = %e, "grouper failed, emitting one whole-block group");
                    vec![TitledGroup {
                        title: fallback_title(&captions),
                        indexes: (0..captions.len()).collect(),
                    }]
                }
            };

            for group in titled {
                let (Some(&min_idx), Some(&max_idx)) =
                    (group.indexes.iter().min(), group.indexes.iter().max())
                else {
                    continue;
                };
                // Tolerate out-of-range or non-contiguous index lists.
                let l = (block_start + min_idx).min(block_end);
                let r = (block_start + max_idx).min(block_end);

                let orig_start = rows[l].start_time;
                let orig_end = rows[r].end_time;
                let caption = rows[l..=r]
                    .iter()
                    .map(|row| row.caption.as_str())
                    .collect::<Vec<_>>()
                    .join(" ");

                let highlight = if self.assembly.agentic_refinement_enabled {
                    self.refine_highlight(
                        stream_id,
                        orig_start,
                        orig_end,
                        group.title,
                        caption,
                        scorer_done,
                        caches,
                    )
                    .await?
                } else {
                    Highlight {
                        start_time: orig_start,
                        end_time: orig_end,
                        title: group.title,
                        caption,
                        thumbnail: frame_filename(
                            (orig_start * self.media.video_frame_sample_rate).floor() as u64,
                        ),
                        snap_reason: None,
                    }
                };
                highlights.push(highlight);
            }
        }

        // Replace the whole list atomically, preserving earlier entries.
        self.stores
            .streams
            .update_highlights(stream_id, &highlights)
            .await?;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn refine_highlight(
        &self,
        stream_id: &str,
        orig_start: f64,
        orig_end: f64,
        title: String,
        caption: String,
        scorer_done: &Latch,
        caches: &mut BoundaryCache,
    ) -> Result<Highlight, PipelineError> {
        caches.ensure(stream_id, scorer_done).await?;
        let scenes = caches.scenes().to_vec();
        let topics = caches.topics().to_vec();
        let max_shift = self.assembly.max_edge_shift_seconds;

        let snapped = snap_generous(
            orig_start,
            orig_end,
            &scenes,
            &topics,
            Priority::TopicFirst,
            max_shift,
        );
        let (snapped_start, snapped_end) = clamp_to_edge_budget(
            orig_start,
            orig_end,
            snapped.start,
            snapped.end,
            max_shift,
            self.assembly.highlight_min_len,
            self.assembly.highlight_max_len,
            (orig_start, orig_end),
        );

        let context = build_context(
            snapped_start,
            snapped_end,
            &scenes,
            &topics,
            self.media.video_frame_sample_rate,
            &self.assembly,
        );
        let clip = CandidateClip::new(&self.base_path, snapped_start, snapped_end);
        let chunk_indexes = clip.audio_chunk_indexes(self.media.audio_chunk_secs);
        let transcript = match (chunk_indexes.first(), chunk_indexes.last()) {
            (Some(&first), Some(&last)) => {
                let rows = self.stores.audio.chunks_in_range(stream_id, first, last).await?;
                clip.transcript_text(&rows)
            }
            _ => String::new(),
        };
        let images = gather_edge_frames(
            &self.base_path.join("frames"),
            snapped_start,
            snapped_end,
            self.media.video_frame_sample_rate,
        );

        let decision = self.refiner.refine(&context, &transcript, images).await;
        tracing::info!(
            stream_id,
            plan = decision.plan.action_name(),
            confidence = decision.confidence,
            "edge refiner decision"
        );

        let refined = execute_plan(
            &decision,
            (orig_start, orig_end),
            (snapped_start, snapped_end),
            &scenes,
            &topics,
            &self.assembly,
        );

        // No reason when nothing moved at all; otherwise prefer the plan
        // summary, falling back to the snap-source summary.
        let nothing_moved = decision.plan == RefinePlan::Keep
            && (snapped_start, snapped_end) == (orig_start, orig_end)
            && (refined.start, refined.end) == (orig_start, orig_end);
        let snap_reason = if nothing_moved {
            None
        } else {
            refined.snap_reason.clone().or_else(|| {
                Some(format!(
                    "Snapped to {}/{} boundaries; shifts: start {:+.2}s, end {:+.2}s",
                    snapped.start_source.as_str(),
                    snapped.end_source.as_str(),
                    snapped_start - orig_start,
                    snapped_end - orig_end,
                ))
            })
        };

        let thumbnail_index = (refined.start * self.media.video_frame_sample_rate).floor() as u64;
        Ok(Highlight {
            start_time: refined.start,
            end_time: refined.end,
            title,
            caption,
            thumbnail: frame_filename(thumbnail_index),
            snap_reason,
        })
    }
}

/// 1 iff the row clears the highlight thresholds.
pub fn build_mask(rows: &[ScoreRow]) -> Vec<u8> {
    rows.iter()
        .map(|row| {
            let hit = row.highlight_score >= 0.7
                || (row.saliency_score >= 0.7 && row.highlight_score >= 0.6);
            u8::from(hit)
        })
        .collect()
}

/// Contiguous runs of ones as inclusive `(l, r)` index pairs.
pub fn one_runs(mask: &[u8]) -> Vec<(usize, usize)> {
    let mut runs = Vec::new();
    let mut start: Option<usize> = None;
    for (i, &value) in mask.iter().enumerate() {
        match (value, start) {
            (1, None) => start = Some(i),
            (0, Some(s)) => {
                runs.push((s, i - 1));
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        runs.push((s, mask.len() - 1));
    }
    runs
}

/// Merge runs separated by exactly one zero slice; wider gaps stay split.
pub fn consolidate_runs(runs: &[(usize, usize)]) -> Vec<(usize, usize)> {
    let mut consolidated: Vec<(usize, usize)> = Vec::new();
    for &(start, end) in runs {
        match consolidated.last_mut() {
            Some((_, prev_end)) if start - *prev_end == 2 => *prev_end = end,
            _ => consolidated.push((start, end)),
        }
    }
    consolidated
}

fn fallback_title(captions: &[String]) -> String {
    captions
        .first()
        .map(|c| c.split_whitespace().take(6).collect::<Vec<_>>().join(" "))
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "Highlight".to_string())
}
