//! Scene-cut detection over sampled frame artifacts
//!
//! Works on the frames the sampler already persisted instead of re-opening
//! the source container, so repeated runs over the same directory return the
//! same boundary list.

use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use image::RgbImage;

use highlight_core::parse_frame_index;

const HIST_BINS: usize = 32;
const DOWNSCALE_W: u32 = 160;
const DOWNSCALE_H: u32 = 90;

/// Detect scene boundaries from `frame_<idx>.jpg` files in `frames_dir`.
///
/// For each adjacent pair of frames a normalized hue/saturation histogram is
/// compared with the Bhattacharyya distance; a boundary is emitted at the
/// later frame's timestamp when the distance exceeds `threshold` and at
/// least `min_scene_len_secs * fps` frames passed since the last boundary.
///
/// Returns a sorted list of boundary timestamps in seconds.
pub fn detect_scene_boundaries(
    frames_dir: &Path,
    fps: f64,
    threshold: f64,
    min_scene_len_secs: f64,
) -> Vec<f64> {
    let pairs = sorted_frame_files(frames_dir);
    if pairs.len() < 2 {
        return Vec::new();
    }

    let min_gap_frames = ((min_scene_len_secs * fps).ceil() as u64).max(1);

    let (first_idx, first_path) = &pairs[0];
    let first = match image::open(first_path) {
        Ok(img) => img.to_rgb8(),
        Err(e) => {
            tracing::warn!(path = %first_path.display(), error = %e, "unable to read first frame");
            return Vec::new();
        }
    };
    let mut prev_hist = hue_saturation_histogram(&first);
    let mut last_cut_idx = *first_idx;

    let mut boundaries = Vec::new();
    for (idx, path) in &pairs[1..] {
        let img = match image::open(path) {
            Ok(img) => img.to_rgb8(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "unreadable frame, skipping");
                continue;
            }
        };
        let hist = hue_saturation_histogram(&img);

        let dist = bhattacharyya_distance(&prev_hist, &hist);
        if dist > threshold && idx - last_cut_idx >= min_gap_frames {
            let t = *idx as f64 / fps;
            boundaries.push((t * 1000.0).round() / 1000.0);
            last_cut_idx = *idx;
        }

        prev_hist = hist;
    }

    boundaries
}

fn sorted_frame_files(frames_dir: &Path) -> Vec<(u64, PathBuf)> {
    let mut files = Vec::new();
    let entries = match std::fs::read_dir(frames_dir) {
        Ok(entries) => entries,
        Err(_) => return files,
    };
    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if let Some(idx) = parse_frame_index(name) {
            files.push((idx, entry.path()));
        }
    }
    files.sort_by_key(|(idx, _)| *idx);
    files
}

/// Normalized 32x32 hue/saturation histogram of a downscaled frame.
fn hue_saturation_histogram(img: &RgbImage) -> Vec<f64> {
    let small = image::imageops::resize(img, DOWNSCALE_W, DOWNSCALE_H, FilterType::Triangle);

    let mut hist = vec![0.0f64; HIST_BINS * HIST_BINS];
    for pixel in small.pixels() {
        let (h, s) = hue_saturation(pixel.0[0], pixel.0[1], pixel.0[2]);
        let h_bin = ((h / 360.0) * HIST_BINS as f64).min(HIST_BINS as f64 - 1.0) as usize;
        let s_bin = (s * HIST_BINS as f64).min(HIST_BINS as f64 - 1.0) as usize;
        hist[h_bin * HIST_BINS + s_bin] += 1.0;
    }

    let total: f64 = hist.iter().sum();
    if total > 0.0 {
        for v in &mut hist {
            *v /= total;
        }
    }
    hist
}

/// Hue in [0, 360), saturation in [0, 1].
fn hue_saturation(r: u8, g: u8, b: u8) -> (f64, f64) {
    let r = r as f64 / 255.0;
    let g = g as f64 / 255.0;
    let b = b as f64 / 255.0;

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let hue = if delta == 0.0 {
        0.0
    } else if max == r {
        60.0 * (((g - b) / delta).rem_euclid(6.0))
    } else if max == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };

    let saturation = if max == 0.0 { 0.0 } else { delta / max };
    (hue, saturation)
}

/// Bhattacharyya distance between two sum-normalized histograms.
/// 0 = identical, 1 = fully disjoint.
fn bhattacharyya_distance(a: &[f64], b: &[f64]) -> f64 {
    let coefficient: f64 = a.iter().zip(b.iter()).map(|(x, y)| (x * y).sqrt()).sum();
    (1.0 - coefficient.min(1.0)).max(0.0).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use highlight_core::frame_filename;
    use std::path::Path;

    fn write_solid_frame(dir: &Path, idx: u64, rgb: [u8; 3]) {
        let mut img = RgbImage::new(64, 36);
        for pixel in img.pixels_mut() {
            pixel.0 = rgb;
        }
        img.save(dir.join(frame_filename(idx))).unwrap();
    }

    #[test]
    fn test_cut_between_color_blocks() {
        let dir = tempfile::tempdir().unwrap();
        for idx in 0..3 {
            write_solid_frame(dir.path(), idx, [220, 20, 20]);
        }
        for idx in 3..6 {
            write_solid_frame(dir.path(), idx, [20, 20, 220]);
        }

        let cuts = detect_scene_boundaries(dir.path(), 2.0, 0.5, 1.0);
        assert_eq!(cuts, vec![1.5]);
    }

    #[test]
    fn test_uniform_frames_have_no_cuts() {
        let dir = tempfile::tempdir().unwrap();
        for idx in 0..6 {
            write_solid_frame(dir.path(), idx, [80, 160, 40]);
        }
        assert!(detect_scene_boundaries(dir.path(), 2.0, 0.5, 1.0).is_empty());
    }

    #[test]
    fn test_min_scene_gap_suppresses_rapid_cuts() {
        let dir = tempfile::tempdir().unwrap();
        // Alternating colors every frame; with a 1s minimum at 2 fps only
        // every second flip can register.
        for idx in 0..8 {
            let color = if idx % 2 == 0 { [220, 20, 20] } else { [20, 20, 220] };
            write_solid_frame(dir.path(), idx, color);
        }
        let cuts = detect_scene_boundaries(dir.path(), 2.0, 0.5, 1.0);
        for pair in cuts.windows(2) {
            assert!(pair[1] - pair[0] >= 1.0 - 1e-9);
        }
        assert!(!cuts.is_empty());
    }

    #[test]
    fn test_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        for idx in 0..4 {
            let color = if idx < 2 { [200, 200, 20] } else { [20, 200, 200] };
            write_solid_frame(dir.path(), idx, color);
        }
        let first = detect_scene_boundaries(dir.path(), 2.0, 0.5, 1.0);
        let second = detect_scene_boundaries(dir.path(), 2.0, 0.5, 1.0);
        assert_eq!(first, second);
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(detect_scene_boundaries(&missing, 2.0, 0.5, 1.0).is_empty());
    }

    #[test]
    fn test_strictly_increasing() {
        let dir = tempfile::tempdir().unwrap();
        for idx in 0..12 {
            let color = match idx / 3 {
                0 => [220, 20, 20],
                1 => [20, 220, 20],
                2 => [20, 20, 220],
                _ => [220, 220, 20],
            };
            write_solid_frame(dir.path(), idx, color);
        }
        let cuts = detect_scene_boundaries(dir.path(), 2.0, 0.5, 1.0);
        for pair in cuts.windows(2) {
            assert!(pair[1] > pair[0]);
        }
    }
}
