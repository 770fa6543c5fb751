//! Edge refinement controller
//!
//! Assembles the refiner's context (numeric summary, transcript excerpt,
//! edge/mid frames), asks for a plan, and re-executes the chosen plan
//! deterministically with midpoint guards, the edge-budget clamp against the
//! original window, and duration reverts.

use std::path::Path;

use highlight_analysis::{snap_window, Priority, ShiftBudgets, SnapRequest, SnappedWindow};
use highlight_config::constants::{END_DELTA_RANGE, REFINER_MAX_MID_FRAMES, START_DELTA_RANGE};
use highlight_config::AssemblyConfig;
use highlight_core::frame_filename;
use highlight_llm::{EdgeCandidates, ImageBlock, RefineContext, RefineDecision, RefinePlan};

/// A window chosen by the controller, with the human-readable reason.
#[derive(Debug, Clone, PartialEq)]
pub struct RefinedWindow {
    pub start: f64,
    pub end: f64,
    pub snap_reason: Option<String>,
}

/// Snap with generous duration bounds; the `max_edge_shift` clamp against
/// the original window is applied separately afterwards.
pub fn snap_generous(
    orig_start: f64,
    orig_end: f64,
    scenes: &[f64],
    topics: &[f64],
    priority: Priority,
    max_edge_shift: f64,
) -> SnappedWindow {
    let generous_min = 1.0;
    let generous_max = (generous_min + 0.5).max((orig_end - orig_start) + 2.0 * max_edge_shift);
    snap_window(&SnapRequest {
        start: orig_start,
        end: orig_end,
        scenes,
        topics,
        budgets: ShiftBudgets {
            scene_start: max_edge_shift,
            scene_end: max_edge_shift,
            topic: max_edge_shift,
        },
        min_len: generous_min,
        max_len: generous_max,
        priority,
    })
}

/// Clamp each edge to within `max_shift` of the original window.
///
/// Falls back to `(fallback_start, fallback_end)` when the clamped window
/// violates the duration guards or collapses.
pub fn clamp_to_edge_budget(
    orig_start: f64,
    orig_end: f64,
    new_start: f64,
    new_end: f64,
    max_shift: f64,
    min_len: f64,
    max_len: f64,
    fallback: (f64, f64),
) -> (f64, f64) {
    let clamped_start = new_start.clamp(orig_start - max_shift, orig_start + max_shift);
    let clamped_end = new_end.clamp(orig_end - max_shift, orig_end + max_shift);

    let duration = clamped_end - clamped_start;
    if duration < min_len || duration > max_len || clamped_start >= clamped_end {
        return fallback;
    }
    (clamped_start, clamped_end)
}

/// Execute a refinement plan deterministically.
///
/// `orig` is the pre-snap window from the score rows; `snapped` is the
/// clamped snap baseline shown to the model.
pub fn execute_plan(
    decision: &RefineDecision,
    orig: (f64, f64),
    snapped: (f64, f64),
    scenes: &[f64],
    topics: &[f64],
    assembly: &AssemblyConfig,
) -> RefinedWindow {
    let (orig_start, orig_end) = orig;
    let (snapped_start, snapped_end) = snapped;
    let max_shift = assembly.max_edge_shift_seconds;
    let min_len = assembly.highlight_min_len;
    let max_len = assembly.highlight_max_len;

    let (chosen_start, chosen_end) = match decision.plan {
        RefinePlan::Keep => (snapped_start, snapped_end),
        RefinePlan::UseTopic | RefinePlan::UseScene => {
            let priority = if decision.plan == RefinePlan::UseTopic {
                Priority::TopicFirst
            } else {
                Priority::SceneFirst
            };
            let resnapped = snap_generous(orig_start, orig_end, scenes, topics, priority, max_shift);
            clamp_to_edge_budget(
                orig_start,
                orig_end,
                resnapped.start,
                resnapped.end,
                max_shift,
                min_len,
                max_len,
                (snapped_start, snapped_end),
            )
        }
        RefinePlan::MicroAdjust {
            start_delta,
            end_delta,
        } => {
            let mid = (snapped_start + snapped_end) / 2.0;
            let mut new_start = snapped_start + start_delta;
            let mut new_end = snapped_end + end_delta;
            // Midpoint guards revert the offending edge only.
            if new_start > mid {
                new_start = snapped_start;
            }
            if new_end < mid {
                new_end = snapped_end;
            }
            let (s, e) = clamp_to_edge_budget(
                orig_start,
                orig_end,
                new_start,
                new_end,
                max_shift,
                min_len,
                max_len,
                (snapped_start, snapped_end),
            );
            if e <= s {
                (snapped_start, snapped_end)
            } else {
                (s, e)
            }
        }
    };

    let snap_reason = format!(
        "plan={}; applied deltas start {:+.2}s, end {:+.2}s; {}",
        decision.plan.action_name(),
        chosen_start - snapped_start,
        chosen_end - snapped_end,
        decision.reason
    );

    RefinedWindow {
        start: chosen_start,
        end: chosen_end,
        snap_reason: Some(snap_reason.trim_end_matches("; ").to_string()),
    }
}

/// Build the numeric context block for the model.
pub fn build_context(
    snapped_start: f64,
    snapped_end: f64,
    scenes: &[f64],
    topics: &[f64],
    fps: f64,
    assembly: &AssemblyConfig,
) -> RefineContext {
    let (start_topic, start_topic_delta) = nearest_with_delta(snapped_start, topics);
    let (start_scene, start_scene_delta) = nearest_with_delta(snapped_start, scenes);
    let (end_topic, end_topic_delta) = nearest_with_delta(snapped_end, topics);
    let (end_scene, end_scene_delta) = nearest_with_delta(snapped_end, scenes);

    RefineContext {
        snapped_start: round3(snapped_start),
        snapped_end: round3(snapped_end),
        duration: round3(snapped_end - snapped_start),
        min_len: assembly.highlight_min_len,
        max_len: assembly.highlight_max_len,
        fps,
        start: EdgeCandidates {
            topic_candidate_sec: start_topic,
            topic_delta_sec: start_topic_delta,
            scene_candidate_sec: start_scene,
            scene_delta_sec: start_scene_delta,
        },
        end: EdgeCandidates {
            topic_candidate_sec: end_topic,
            topic_delta_sec: end_topic_delta,
            scene_candidate_sec: end_scene,
            scene_delta_sec: end_scene_delta,
        },
        start_delta_range_sec: START_DELTA_RANGE,
        end_delta_range_sec: END_DELTA_RANGE,
    }
}

fn nearest_with_delta(t: f64, candidates: &[f64]) -> (Option<f64>, Option<f64>) {
    let mut best: Option<f64> = None;
    for &c in candidates {
        if best.map(|b| (c - t).abs() < (b - t).abs()).unwrap_or(true) {
            best = Some(c);
        }
    }
    match best {
        Some(c) => (Some(round3(c)), Some(round3(c - t))),
        None => (None, None),
    }
}

fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

/// Collect the refiner's frames: just-before-start, start, up to three
/// evenly spaced mids, end-minus-one, just-after-end. Missing files are
/// skipped.
pub fn gather_edge_frames(frames_dir: &Path, start: f64, end: f64, fps: f64) -> Vec<ImageBlock> {
    let start_idx = (start * fps).floor() as i64;
    let end_idx = (end * fps).floor() as i64;

    let mut indices: Vec<i64> = vec![start_idx - 1, start_idx];

    let total = (end_idx - start_idx).max(0);
    if total > 2 {
        for k in 1..=(REFINER_MAX_MID_FRAMES as i64) {
            let pos = start_idx + (k * total) / (REFINER_MAX_MID_FRAMES as i64 + 1);
            if pos > start_idx && pos < end_idx {
                indices.push(pos);
            }
        }
    }
    indices.push(end_idx - 1);
    indices.push(end_idx);

    let mut images = Vec::new();
    for idx in indices {
        if idx < 0 {
            continue;
        }
        let path = frames_dir.join(frame_filename(idx as u64));
        if let Ok(jpeg) = std::fs::read(&path) {
            images.push(ImageBlock { jpeg });
        }
    }
    images
}
