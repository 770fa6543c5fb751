//! Candidate clip view over persisted artifacts
//!
//! Lazily loads the audio bytes, frames and transcript that cover one
//! candidate window. Missing artifacts degrade to empty modalities instead
//! of failing the pipeline.

use std::path::{Path, PathBuf};

use image::GrayImage;

use highlight_core::{audio_chunk_filename, frame_filename, Transcript};
use highlight_persistence::AudioChunkRow;

/// One candidate window rooted at `<base_path>` (`frames/`, `audio_chunks/`).
#[derive(Debug, Clone)]
pub struct CandidateClip {
    pub base_path: PathBuf,
    pub start_time: f64,
    pub end_time: f64,
}

/// Audio samples cropped to the window.
#[derive(Debug, Clone, Default)]
pub struct AudioSegment {
    /// Interleaved f32 samples in [-1, 1]
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl CandidateClip {
    pub fn new(base_path: impl Into<PathBuf>, start_time: f64, end_time: f64) -> Self {
        Self {
            base_path: base_path.into(),
            start_time,
            end_time,
        }
    }

    /// Indices of the audio chunks this window overlaps.
    ///
    /// A window ending exactly on a chunk boundary has no audio inside the
    /// following chunk, so the right endpoint is exclusive there.
    pub fn audio_chunk_indexes(&self, chunk_duration: f64) -> Vec<i64> {
        let start_chunk = (self.start_time / chunk_duration).floor() as i64;
        let mut end_chunk = (self.end_time / chunk_duration).floor() as i64;

        if self.end_time % chunk_duration == 0.0 && self.end_time != 0.0 {
            end_chunk -= 1;
        }

        (start_chunk..=end_chunk).collect()
    }

    /// Load and crop the overlapping audio chunks to the exact window.
    ///
    /// Missing chunk files are logged and skipped; fully missing audio
    /// yields an empty segment.
    pub fn load_audio_segment(&self, chunk_duration: f64) -> AudioSegment {
        let chunks = self.audio_chunk_indexes(chunk_duration);
        let Some(&first_chunk) = chunks.first() else {
            return AudioSegment::default();
        };

        let mut samples: Vec<f32> = Vec::new();
        let mut sample_rate = 0u32;
        let mut channels = 0u16;
        for index in &chunks {
            let path = self
                .base_path
                .join("audio_chunks")
                .join(audio_chunk_filename(*index as u64));
            match read_wav(&path) {
                Some((chunk_samples, rate, ch)) => {
                    sample_rate = rate;
                    channels = ch;
                    samples.extend(chunk_samples);
                }
                None => {
                    tracing::warn!(path = %path.display(), "audio chunk does not exist");
                }
            }
        }

        if samples.is_empty() || sample_rate == 0 || channels == 0 {
            return AudioSegment::default();
        }

        // Crop to the exact window inside the concatenated chunks.
        let channels_usize = channels as usize;
        let start_frame =
            ((self.start_time - first_chunk as f64 * chunk_duration) * sample_rate as f64) as usize;
        let frame_count = ((self.end_time - self.start_time) * sample_rate as f64) as usize;
        let start = (start_frame * channels_usize).min(samples.len());
        let end = (start + frame_count * channels_usize).min(samples.len());

        AudioSegment {
            samples: samples[start..end].to_vec(),
            sample_rate,
            channels,
        }
    }

    /// Frame indices the window covers at the sampling rate.
    pub fn frame_indexes(&self, fps: f64) -> Vec<u64> {
        let first = (self.start_time * fps).floor().max(0.0) as u64;
        let last = (self.end_time * fps).ceil() as u64;
        (first..last).collect()
    }

    /// Load the window's frames as grayscale for motion analysis.
    pub fn load_gray_frames(&self, fps: f64) -> Vec<GrayImage> {
        let frames_dir = self.base_path.join("frames");
        let mut frames = Vec::new();
        for index in self.frame_indexes(fps) {
            let path = frames_dir.join(frame_filename(index));
            match image::open(&path) {
                Ok(img) => frames.push(img.to_luma8()),
                Err(_) => {
                    tracing::warn!(path = %path.display(), "video frame does not exist");
                }
            }
        }
        frames
    }

    /// Raw JPEG bytes of the window's frames for the captioner.
    pub fn load_frame_bytes(&self, fps: f64) -> Vec<Vec<u8>> {
        let frames_dir = self.base_path.join("frames");
        let mut frames = Vec::new();
        for index in self.frame_indexes(fps) {
            let path = frames_dir.join(frame_filename(index));
            if let Ok(bytes) = std::fs::read(&path) {
                frames.push(bytes);
            }
        }
        frames
    }

    /// Spoken words inside the window, joined with spaces.
    ///
    /// Word timings are chunk-relative; each row's start_timestamp shifts
    /// them onto the media timeline.
    pub fn transcript_text(&self, rows: &[AudioChunkRow]) -> String {
        let mut words: Vec<String> = Vec::new();
        for row in rows {
            let transcript = Transcript::from_column(&row.transcript);
            for item in transcript.words() {
                if !item.is_spoken() {
                    continue;
                }
                let abs_start = item.start_time + row.start_timestamp;
                let abs_end = item.end_time + row.start_timestamp;
                if abs_start >= self.start_time && abs_end <= self.end_time {
                    words.push(item.content.clone());
                }
            }
        }
        words.join(" ")
    }
}

fn read_wav(path: &Path) -> Option<(Vec<f32>, u32, u16)> {
    let mut reader = hound::WavReader::open(path).ok()?;
    let spec = reader.spec();
    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Int => reader
            .samples::<i16>()
            .filter_map(Result::ok)
            .map(|s| s as f32 / 32768.0)
            .collect(),
        hound::SampleFormat::Float => reader.samples::<f32>().filter_map(Result::ok).collect(),
    };
    Some((samples, spec.sample_rate, spec.channels))
}

#[cfg(test)]
mod tests {
    use super::*;
    use highlight_core::{ItemType, WordItem, EMPTY_SENTINEL};

    fn clip(start: f64, end: f64) -> CandidateClip {
        CandidateClip::new("/tmp/does-not-matter", start, end)
    }

    #[test]
    fn test_chunk_indexes_single_chunk() {
        assert_eq!(clip(0.0, 5.0).audio_chunk_indexes(5.0), vec![0]);
        assert_eq!(clip(1.0, 4.0).audio_chunk_indexes(5.0), vec![0]);
    }

    #[test]
    fn test_chunk_indexes_span() {
        assert_eq!(clip(4.0, 11.0).audio_chunk_indexes(5.0), vec![0, 1, 2]);
        assert_eq!(clip(5.0, 10.5).audio_chunk_indexes(5.0), vec![1, 2]);
    }

    #[test]
    fn test_chunk_indexes_right_endpoint_on_boundary() {
        // A window ending exactly at 10.0 has no audio in chunk 2.
        assert_eq!(clip(5.0, 10.0).audio_chunk_indexes(5.0), vec![1]);
        assert_eq!(clip(0.0, 10.0).audio_chunk_indexes(5.0), vec![0, 1]);
    }

    #[test]
    fn test_frame_indexes() {
        assert_eq!(clip(0.0, 5.0).frame_indexes(2.0), (0..10).collect::<Vec<_>>());
        assert_eq!(clip(2.5, 5.0).frame_indexes(2.0), (5..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_missing_audio_yields_empty_segment() {
        let segment = clip(0.0, 5.0).load_audio_segment(5.0);
        assert!(segment.samples.is_empty());
    }

    #[test]
    fn test_audio_crop_to_window() {
        let dir = tempfile::tempdir().unwrap();
        let chunk_dir = dir.path().join("audio_chunks");
        std::fs::create_dir_all(&chunk_dir).unwrap();

        // Chunk 0: 5s of mono 1kHz-rate audio whose sample value encodes the
        // frame index, so the crop offsets are observable.
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 1000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer =
            hound::WavWriter::create(chunk_dir.join(audio_chunk_filename(0)), spec).unwrap();
        for i in 0..5000i32 {
            writer.write_sample((i % 1000) as i16).unwrap();
        }
        writer.finalize().unwrap();

        let clip = CandidateClip::new(dir.path(), 1.0, 3.0);
        let segment = clip.load_audio_segment(5.0);
        assert_eq!(segment.sample_rate, 1000);
        assert_eq!(segment.channels, 1);
        assert_eq!(segment.samples.len(), 2000);
        // First sample corresponds to t=1.0s, i.e. source sample 1000 -> 0.
        assert!((segment.samples[0] - 0.0).abs() < 1e-4);
    }

    #[test]
    fn test_transcript_text_filters_window_and_type() {
        let words = vec![
            WordItem {
                content: "inside".to_string(),
                start_time: 1.0,
                end_time: 1.4,
                item_type: ItemType::Pronunciation,
            },
            WordItem {
                content: ",".to_string(),
                start_time: 1.4,
                end_time: 1.4,
                item_type: ItemType::Punctuation,
            },
            WordItem {
                content: "outside".to_string(),
                start_time: 4.8,
                end_time: 5.3,
                item_type: ItemType::Pronunciation,
            },
        ];
        let row = AudioChunkRow {
            stream_id: "s1".to_string(),
            chunk_index: 1,
            filename: audio_chunk_filename(1),
            start_timestamp: 5.0,
            end_timestamp: 10.0,
            sample_rate: 16_000,
            captured_at: 0,
            transcript: Transcript::Words(words).to_column(),
        };

        // Window [5.5, 8.0]: "inside" lands at 6.0-6.4, "outside" at 9.8-10.3.
        let clip = clip(5.5, 8.0);
        assert_eq!(clip.transcript_text(&[row]), "inside");
    }

    #[test]
    fn test_transcript_text_ignores_sentinels() {
        let row = AudioChunkRow {
            stream_id: "s1".to_string(),
            chunk_index: 0,
            filename: audio_chunk_filename(0),
            start_timestamp: 0.0,
            end_timestamp: 5.0,
            sample_rate: 16_000,
            captured_at: 0,
            transcript: EMPTY_SENTINEL.to_string(),
        };
        assert_eq!(clip(0.0, 5.0).transcript_text(&[row]), "");
    }
}
