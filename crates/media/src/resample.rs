//! Chunk resampling
//!
//! High-quality FFT resampling via rubato, with a linear-interpolation
//! fallback for buffers too short for the FFT window.

use rubato::{FftFixedIn, Resampler};

const FFT_CHUNK: usize = 1024;
const MIN_FFT_INPUT: usize = 64;

/// Resample interleaved f32 audio to `to_rate`, preserving channel layout.
pub fn resample_interleaved(
    samples: &[f32],
    channels: u16,
    from_rate: u32,
    to_rate: u32,
) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() || channels == 0 {
        return samples.to_vec();
    }

    let channels = channels as usize;
    let frames = samples.len() / channels;
    if frames < MIN_FFT_INPUT {
        return resample_linear(samples, channels, from_rate, to_rate);
    }

    // Deinterleave into per-channel f64 lanes for rubato.
    let mut lanes: Vec<Vec<f64>> = vec![Vec::with_capacity(frames); channels];
    for frame in samples.chunks_exact(channels) {
        for (ch, &sample) in frame.iter().enumerate() {
            lanes[ch].push(sample as f64);
        }
    }

    let mut resampler =
        match FftFixedIn::<f64>::new(from_rate as usize, to_rate as usize, FFT_CHUNK, 2, channels) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = %e, "rubato init failed, using linear fallback");
                return resample_linear(samples, channels, from_rate, to_rate);
            }
        };

    let mut out_lanes: Vec<Vec<f64>> = vec![Vec::new(); channels];
    let mut position = 0;
    while position < frames {
        let end = (position + FFT_CHUNK).min(frames);
        // rubato wants exactly FFT_CHUNK input frames; zero-pad the tail.
        let mut input: Vec<Vec<f64>> = Vec::with_capacity(channels);
        for lane in &lanes {
            let mut chunk = lane[position..end].to_vec();
            chunk.resize(FFT_CHUNK, 0.0);
            input.push(chunk);
        }

        match resampler.process(&input, None) {
            Ok(output) => {
                for (ch, lane) in output.into_iter().enumerate() {
                    out_lanes[ch].extend(lane);
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "rubato processing failed, using linear fallback");
                return resample_linear(samples, channels, from_rate, to_rate);
            }
        }
        position = end;
    }

    // Trim the zero-pad overshoot to the expected output length.
    let expected = (frames as f64 * to_rate as f64 / from_rate as f64).round() as usize;
    for lane in &mut out_lanes {
        lane.truncate(expected);
    }

    let out_frames = out_lanes.iter().map(Vec::len).min().unwrap_or(0);
    let mut interleaved = Vec::with_capacity(out_frames * channels);
    for i in 0..out_frames {
        for lane in &out_lanes {
            interleaved.push(lane[i] as f32);
        }
    }
    interleaved
}

fn resample_linear(samples: &[f32], channels: usize, from_rate: u32, to_rate: u32) -> Vec<f32> {
    let frames = samples.len() / channels;
    if frames == 0 {
        return Vec::new();
    }
    let ratio = to_rate as f64 / from_rate as f64;
    let out_frames = (frames as f64 * ratio).round() as usize;

    let mut out = Vec::with_capacity(out_frames * channels);
    for i in 0..out_frames {
        let src = i as f64 / ratio;
        let lo = src.floor() as usize;
        let hi = (lo + 1).min(frames - 1);
        let frac = (src - lo as f64) as f32;
        for ch in 0..channels {
            let a = samples[lo * channels + ch];
            let b = samples[hi * channels + ch];
            out.push(a * (1.0 - frac) + b * frac);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_rate_is_identity() {
        let samples = vec![0.1f32, 0.2, 0.3];
        assert_eq!(resample_interleaved(&samples, 1, 16_000, 16_000), samples);
    }

    #[test]
    fn test_downsample_halves_length() {
        let samples: Vec<f32> = (0..32_000).map(|i| (i as f32 * 0.001).sin()).collect();
        let out = resample_interleaved(&samples, 1, 32_000, 16_000);
        let expected = 16_000usize;
        assert!(
            (out.len() as i64 - expected as i64).unsigned_abs() < 64,
            "got {} samples",
            out.len()
        );
    }

    #[test]
    fn test_short_buffer_uses_linear_path() {
        let samples = vec![0.0f32, 1.0, 0.0, -1.0];
        let out = resample_interleaved(&samples, 1, 8_000, 16_000);
        assert_eq!(out.len(), 8);
    }

    #[test]
    fn test_stereo_preserves_channels() {
        let mut samples = Vec::new();
        for i in 0..8_192 {
            samples.push((i as f32 * 0.01).sin()); // left
            samples.push(0.0); // right stays silent
        }
        let out = resample_interleaved(&samples, 2, 48_000, 16_000);
        assert_eq!(out.len() % 2, 0);
        let right_energy: f32 = out.chunks_exact(2).map(|f| f[1].abs()).sum();
        let left_energy: f32 = out.chunks_exact(2).map(|f| f[0].abs()).sum();
        assert!(right_energy < left_energy * 0.05);
    }
}
