//! Decoded frame types exchanged between the demuxer and the workers

/// One decoded video frame, already converted to packed RGB24.
#[derive(Clone)]
pub struct VideoFrame {
    /// Presentation time in seconds of media time
    pub media_time: f64,
    /// Raw presentation timestamp in stream time-base units
    pub pts: i64,
    pub width: u32,
    pub height: u32,
    /// `width * height * 3` bytes, row-major, no padding
    pub rgb: Vec<u8>,
}

impl std::fmt::Debug for VideoFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoFrame")
            .field("media_time", &self.media_time)
            .field("pts", &self.pts)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("rgb_len", &self.rgb.len())
            .finish()
    }
}

/// One decoded audio frame with interleaved f32 samples in [-1, 1].
#[derive(Clone)]
pub struct AudioFrame {
    /// Presentation time in seconds of media time
    pub media_time: f64,
    pub sample_rate: u32,
    pub channels: u16,
    /// Interleaved, `frames * channels` values
    pub samples: Vec<f32>,
}

impl std::fmt::Debug for AudioFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioFrame")
            .field("media_time", &self.media_time)
            .field("sample_rate", &self.sample_rate)
            .field("channels", &self.channels)
            .field("samples_len", &self.samples.len())
            .finish()
    }
}

impl AudioFrame {
    /// Duration of this frame in seconds.
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 || self.channels == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / (self.sample_rate as f64 * self.channels as f64)
    }

    /// Convert to signed 16-bit little-endian PCM bytes.
    pub fn to_pcm16(&self) -> Vec<u8> {
        const PCM16_SCALE: f32 = 32767.0;

        self.samples
            .iter()
            .flat_map(|&sample| {
                let clamped = sample.clamp(-1.0, 1.0);
                let pcm16 = (clamped * PCM16_SCALE) as i16;
                pcm16.to_le_bytes()
            })
            .collect()
    }

    /// Build a frame from signed 16-bit little-endian PCM bytes.
    pub fn from_pcm16(bytes: &[u8], sample_rate: u32, channels: u16, media_time: f64) -> Self {
        const PCM16_NORMALIZE: f32 = 32768.0;

        let samples: Vec<f32> = bytes
            .chunks_exact(2)
            .map(|chunk| {
                let sample = i16::from_le_bytes([chunk[0], chunk[1]]);
                sample as f32 / PCM16_NORMALIZE
            })
            .collect();

        Self {
            media_time,
            sample_rate,
            channels,
            samples,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pcm16_round_trip() {
        let frame = AudioFrame {
            media_time: 0.0,
            sample_rate: 16_000,
            channels: 1,
            samples: vec![0.0, 0.5, -0.5, 1.0, -1.0],
        };
        let bytes = frame.to_pcm16();
        assert_eq!(bytes.len(), 10);
        let back = AudioFrame::from_pcm16(&bytes, 16_000, 1, 0.0);
        for (a, b) in frame.samples.iter().zip(back.samples.iter()) {
            assert!((a - b).abs() < 1e-3, "{a} vs {b}");
        }
    }

    #[test]
    fn test_duration() {
        let frame = AudioFrame {
            media_time: 0.0,
            sample_rate: 16_000,
            channels: 2,
            samples: vec![0.0; 32_000],
        };
        assert!((frame.duration_secs() - 1.0).abs() < 1e-9);
    }
}
