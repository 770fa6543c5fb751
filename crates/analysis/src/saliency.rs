//! Mechanical saliency: motion magnitude + audio loudness
//!
//! Motion is estimated with block matching between consecutive downscaled
//! grayscale frames; loudness is the mean windowed RMS of the PCM samples.
//! Both terms are squashed with tanh and mixed with fixed weights.

use image::imageops::FilterType;
use image::GrayImage;

const MOTION_DOWNSCALE_W: u32 = 160;
const BLOCK: u32 = 8;
const SEARCH_RADIUS: i32 = 4;

const RMS_FRAME: usize = 2048;
const RMS_HOP: usize = 512;

/// Combines inter-frame motion and audio RMS into one score in [0, 1].
#[derive(Debug, Clone, Copy)]
pub struct SaliencyScorer {
    pub alpha_motion: f64,
    pub alpha_audio: f64,
}

impl Default for SaliencyScorer {
    fn default() -> Self {
        Self {
            alpha_motion: 0.7,
            alpha_audio: 0.3,
        }
    }
}

impl SaliencyScorer {
    pub fn new(alpha_motion: f64, alpha_audio: f64) -> Self {
        Self {
            alpha_motion,
            alpha_audio,
        }
    }

    /// Mean block-displacement magnitude across consecutive frame pairs,
    /// in pixels of the downscaled image. Fewer than two frames scores 0.
    pub fn compute_motion_score(&self, frames: &[GrayImage]) -> f64 {
        if frames.len() < 2 {
            return 0.0;
        }

        let small: Vec<GrayImage> = frames.iter().map(downscale).collect();
        let mut magnitudes = Vec::with_capacity(small.len() - 1);
        for pair in small.windows(2) {
            magnitudes.push(mean_flow_magnitude(&pair[0], &pair[1]));
        }
        magnitudes.iter().sum::<f64>() / magnitudes.len() as f64
    }

    /// Mean windowed RMS of normalized samples in [-1, 1].
    pub fn compute_audio_rms(&self, samples: &[f32]) -> f64 {
        if samples.is_empty() {
            return 0.0;
        }
        let mut rms_values = Vec::new();
        let mut start = 0;
        while start < samples.len() {
            let end = (start + RMS_FRAME).min(samples.len());
            let window = &samples[start..end];
            let energy: f64 = window.iter().map(|&s| (s as f64).powi(2)).sum();
            rms_values.push((energy / window.len() as f64).sqrt());
            if end == samples.len() {
                break;
            }
            start += RMS_HOP;
        }
        rms_values.iter().sum::<f64>() / rms_values.len() as f64
    }

    /// `alpha_motion * tanh(motion) + alpha_audio * tanh(rms)`, in [0, 1].
    pub fn compute_saliency(&self, frames: &[GrayImage], samples: &[f32]) -> f64 {
        let motion = self.compute_motion_score(frames);
        let rms = self.compute_audio_rms(samples);

        let score = self.alpha_motion * motion.tanh() + self.alpha_audio * rms.tanh();
        score.clamp(0.0, 1.0)
    }
}

fn downscale(img: &GrayImage) -> GrayImage {
    if img.width() <= MOTION_DOWNSCALE_W {
        return img.clone();
    }
    let h = ((img.height() as u64 * MOTION_DOWNSCALE_W as u64) / img.width() as u64).max(1) as u32;
    image::imageops::resize(img, MOTION_DOWNSCALE_W, h, FilterType::Triangle)
}

/// Mean displacement magnitude of 8x8 blocks matched within a small search
/// window. Deterministic; ties resolve to the smallest displacement.
fn mean_flow_magnitude(prev: &GrayImage, next: &GrayImage) -> f64 {
    let width = prev.width().min(next.width());
    let height = prev.height().min(next.height());
    if width < BLOCK || height < BLOCK {
        return 0.0;
    }

    let mut magnitudes = Vec::new();
    let mut by = 0;
    while by + BLOCK <= height {
        let mut bx = 0;
        while bx + BLOCK <= width {
            let (dx, dy) = best_block_match(prev, next, bx, by, width, height);
            magnitudes.push(((dx * dx + dy * dy) as f64).sqrt());
            bx += BLOCK;
        }
        by += BLOCK;
    }

    if magnitudes.is_empty() {
        return 0.0;
    }
    magnitudes.iter().sum::<f64>() / magnitudes.len() as f64
}

fn best_block_match(
    prev: &GrayImage,
    next: &GrayImage,
    bx: u32,
    by: u32,
    width: u32,
    height: u32,
) -> (i32, i32) {
    let mut best = (0i32, 0i32);
    let mut best_cost = u64::MAX;

    for dy in -SEARCH_RADIUS..=SEARCH_RADIUS {
        for dx in -SEARCH_RADIUS..=SEARCH_RADIUS {
            let nx = bx as i64 + dx as i64;
            let ny = by as i64 + dy as i64;
            if nx < 0
                || ny < 0
                || nx + BLOCK as i64 > width as i64
                || ny + BLOCK as i64 > height as i64
            {
                continue;
            }
            let cost = block_sad(prev, next, bx, by, nx as u32, ny as u32);
            let displacement = (dx * dx + dy * dy) as u64;
            let best_displacement =
                (best.0 * best.0 + best.1 * best.1) as u64;
            if cost < best_cost || (cost == best_cost && displacement < best_displacement) {
                best_cost = cost;
                best = (dx, dy);
            }
        }
    }
    best
}

fn block_sad(prev: &GrayImage, next: &GrayImage, bx: u32, by: u32, nx: u32, ny: u32) -> u64 {
    let mut sad = 0u64;
    for row in 0..BLOCK {
        for col in 0..BLOCK {
            let a = prev.get_pixel(bx + col, by + row).0[0] as i64;
            let b = next.get_pixel(nx + col, ny + row).0[0] as i64;
            sad += (a - b).unsigned_abs();
        }
    }
    sad
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_frame(width: u32, height: u32, shift: u32) -> GrayImage {
        GrayImage::from_fn(width, height, |x, _| {
            image::Luma([(((x + shift) * 8) % 256) as u8])
        })
    }

    #[test]
    fn test_single_frame_has_no_motion() {
        let scorer = SaliencyScorer::default();
        let frames = vec![gradient_frame(64, 32, 0)];
        assert_eq!(scorer.compute_motion_score(&frames), 0.0);
    }

    #[test]
    fn test_identical_frames_have_no_motion() {
        let scorer = SaliencyScorer::default();
        let frames = vec![gradient_frame(64, 32, 0), gradient_frame(64, 32, 0)];
        assert_eq!(scorer.compute_motion_score(&frames), 0.0);
    }

    #[test]
    fn test_shifted_frames_have_motion() {
        let scorer = SaliencyScorer::default();
        let frames = vec![gradient_frame(64, 32, 0), gradient_frame(64, 32, 2)];
        assert!(scorer.compute_motion_score(&frames) > 0.5);
    }

    #[test]
    fn test_silence_has_zero_rms() {
        let scorer = SaliencyScorer::default();
        assert_eq!(scorer.compute_audio_rms(&[]), 0.0);
        assert_eq!(scorer.compute_audio_rms(&vec![0.0f32; 4096]), 0.0);
    }

    #[test]
    fn test_loud_audio_has_high_rms() {
        let scorer = SaliencyScorer::default();
        let loud = vec![0.8f32; 8192];
        let rms = scorer.compute_audio_rms(&loud);
        assert!((rms - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_saliency_bounds() {
        let scorer = SaliencyScorer::default();
        let frames = vec![gradient_frame(64, 32, 0), gradient_frame(64, 32, 3)];
        let loud = vec![1.0f32; 8192];
        let score = scorer.compute_saliency(&frames, &loud);
        assert!((0.0..=1.0).contains(&score));
        assert!(score > 0.3);

        let quiet = scorer.compute_saliency(&[], &[]);
        assert_eq!(quiet, 0.0);
    }

    #[test]
    fn test_weights_mix() {
        let audio_only = SaliencyScorer::new(0.0, 1.0);
        let loud = vec![0.8f32; 4096];
        let score = audio_only.compute_saliency(&[], &loud);
        assert!((score - 0.8f64.tanh()).abs() < 1e-6);
    }
}
