//! Deterministic analysis passes over persisted artifacts
//!
//! Everything in this crate is pure or filesystem-read-only and idempotent:
//! the same inputs always produce the same boundaries and scores.

pub mod saliency;
pub mod scene;
pub mod snap;
pub mod tiling;

pub use saliency::SaliencyScorer;
pub use scene::detect_scene_boundaries;
pub use snap::{snap_window, EdgeSource, Priority, ShiftBudgets, SnapRequest, SnappedWindow};
pub use tiling::{text_tiling_boundaries, TilingParams};
