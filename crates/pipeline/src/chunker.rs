//! Audio chunker: fixed-duration resampled PCM chunks

use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc::Receiver;

use highlight_config::constants::QUEUE_POLL_MS;
use highlight_core::{audio_chunk_filename, Latch, StopFlag, EMPTY_SENTINEL};
use highlight_media::{resample, AudioFrame};
use highlight_persistence::{AudioChunkRow, AudioChunkStore};

use crate::PipelineError;

/// Accumulates decoded audio frames into `chunk_duration`-second chunks,
/// resampled to the target rate and written as 16-bit PCM WAV artifacts.
pub struct AudioChunker {
    store: AudioChunkStore,
    chunk_dir: PathBuf,
    chunk_duration: f64,
    target_sample_rate: u32,
    buffer: Vec<AudioFrame>,
    start_ts: Option<f64>,
    chunk_index: u64,
}

impl AudioChunker {
    pub fn new(
        store: AudioChunkStore,
        chunk_dir: PathBuf,
        chunk_duration: f64,
        target_sample_rate: u32,
    ) -> Self {
        Self {
            store,
            chunk_dir,
            chunk_duration,
            target_sample_rate,
            buffer: Vec::new(),
            start_ts: None,
            chunk_index: 0,
        }
    }

    pub async fn run(
        mut self,
        stream_id: String,
        mut frames: Receiver<AudioFrame>,
        done: Latch,
        demuxer_stopped: StopFlag,
    ) -> Result<(), PipelineError> {
        tracing::info!(stream_id = %stream_id, "audio chunker started");
        std::fs::create_dir_all(&self.chunk_dir)?;

        let result = self.chunk_loop(&stream_id, &mut frames, &done, &demuxer_stopped).await;

        // Flush whatever is buffered, even below the target duration.
        if let Err(e) = self.flush_chunk(&stream_id).await {
            tracing::error!(error = %e, "error flushing final chunk on shutdown");
        }

        done.set();
        tracing::info!(stream_id = %stream_id, chunks = self.chunk_index, "audio chunker exiting");
        result
    }

    async fn chunk_loop(
        &mut self,
        stream_id: &str,
        frames: &mut Receiver<AudioFrame>,
        done: &Latch,
        demuxer_stopped: &StopFlag,
    ) -> Result<(), PipelineError> {
        loop {
            if done.is_set() {
                return Ok(());
            }
            let frame = match tokio::time::timeout(
                Duration::from_millis(QUEUE_POLL_MS),
                frames.recv(),
            )
            .await
            {
                Ok(Some(frame)) => frame,
                Ok(None) => return Ok(()),
                Err(_) => {
                    if demuxer_stopped.is_set() && frames.is_empty() {
                        return Ok(());
                    }
                    continue;
                }
            };

            self.handle_frame(stream_id, frame).await?;
        }
    }

    async fn handle_frame(
        &mut self,
        stream_id: &str,
        frame: AudioFrame,
    ) -> Result<(), PipelineError> {
        let ts = frame.media_time;
        if self.start_ts.is_none() {
            self.start_ts = Some(ts);
        }
        self.buffer.push(frame);

        if let Some(start) = self.start_ts {
            if ts - start >= self.chunk_duration {
                self.flush_chunk(stream_id).await?;
            }
        }
        Ok(())
    }

    /// Encode the buffered frames to one WAV artifact and insert the row.
    async fn flush_chunk(&mut self, stream_id: &str) -> Result<(), PipelineError> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        let start_ts = self.start_ts.unwrap_or(0.0);
        let last = &self.buffer[self.buffer.len() - 1];
        let end_ts = last.media_time + last.duration_secs();

        let source_rate = self.buffer[0].sample_rate;
        let channels = self.buffer[0].channels.max(1);

        let mut samples: Vec<f32> = Vec::new();
        for frame in &self.buffer {
            if frame.sample_rate != source_rate || frame.channels != channels {
                // Layout changes mid-stream are rare; resample the outlier
                // frame onto the chunk's layout rather than dropping it.
                samples.extend(resample::resample_interleaved(
                    &frame.samples,
                    frame.channels,
                    frame.sample_rate,
                    source_rate,
                ));
                continue;
            }
            samples.extend_from_slice(&frame.samples);
        }

        let resampled = resample::resample_interleaved(
            &samples,
            channels,
            source_rate,
            self.target_sample_rate,
        );

        let filename = audio_chunk_filename(self.chunk_index);
        let path = self.chunk_dir.join(&filename);
        write_pcm16_wav(&path, &resampled, self.target_sample_rate, channels)?;

        self.store
            .insert(&AudioChunkRow {
                stream_id: stream_id.to_string(),
                chunk_index: self.chunk_index as i64,
                filename: filename.clone(),
                start_timestamp: (start_ts * 1000.0).round() / 1000.0,
                end_timestamp: (end_ts * 1000.0).round() / 1000.0,
                sample_rate: self.target_sample_rate as i32,
                captured_at: Utc::now().timestamp(),
                transcript: EMPTY_SENTINEL.to_string(),
            })
            .await?;

        tracing::info!(stream_id = %stream_id, chunk = %filename, "wrote audio chunk");

        self.chunk_index += 1;
        self.buffer.clear();
        self.start_ts = None;
        Ok(())
    }
}

/// Write interleaved f32 samples as signed 16-bit little-endian PCM.
fn write_pcm16_wav(
    path: &std::path::Path,
    samples: &[f32],
    sample_rate: u32,
    channels: u16,
) -> Result<(), PipelineError> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)
        .map_err(|e| PipelineError::Io(std::io::Error::other(e.to_string())))?;
    for &sample in samples {
        let pcm = (sample.clamp(-1.0, 1.0) * 32767.0) as i16;
        writer
            .write_sample(pcm)
            .map_err(|e| PipelineError::Io(std::io::Error::other(e.to_string())))?;
    }
    writer
        .finalize()
        .map_err(|e| PipelineError::Io(std::io::Error::other(e.to_string())))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_pcm16_wav_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(audio_chunk_filename(0));
        let samples = vec![0.0f32, 0.25, -0.25, 1.0];
        write_pcm16_wav(&path, &samples, 16_000, 1).unwrap();

        let mut reader = hound::WavReader::open(&path).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, 16_000);
        assert_eq!(spec.bits_per_sample, 16);

        let back: Vec<i16> = reader.samples::<i16>().map(Result::unwrap).collect();
        assert_eq!(back.len(), 4);
        assert_eq!(back[0], 0);
        assert!((back[1] as f32 / 32767.0 - 0.25).abs() < 1e-3);
        assert_eq!(back[3], 32767);
    }

    #[test]
    fn test_flush_threshold() {
        // A frame stream at 1s spacing crosses the 5s chunk threshold on the
        // frame whose timestamp is 5s past the chunk start.
        let chunk_duration = 5.0;
        let mut start: Option<f64> = None;
        let mut flushed_at = Vec::new();
        for i in 0..12 {
            let ts = i as f64;
            if start.is_none() {
                start = Some(ts);
            }
            if ts - start.unwrap() >= chunk_duration {
                flushed_at.push(ts);
                start = None;
            }
        }
        assert_eq!(flushed_at, vec![5.0, 11.0]);
    }
}
