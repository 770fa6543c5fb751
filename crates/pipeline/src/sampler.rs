//! Video sampler: persist at most one frame per sampling interval

use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::mpsc::Receiver;

use highlight_config::constants::QUEUE_POLL_MS;
use highlight_core::{frame_filename, Latch, StopFlag};
use highlight_media::{jpeg, VideoFrame};
use highlight_persistence::{FrameRow, FrameStore};

use crate::PipelineError;

/// Downsamples the decoded video stream to a fixed frames-per-second rate,
/// writing one JPEG artifact and one frame row per kept frame.
pub struct VideoSampler {
    store: FrameStore,
    frames_dir: PathBuf,
    sample_rate: f64,
    frame_index: u64,
    last_saved_ts: Option<f64>,
}

impl VideoSampler {
    pub fn new(store: FrameStore, frames_dir: PathBuf, sample_rate: f64) -> Self {
        Self {
            store,
            frames_dir,
            sample_rate,
            frame_index: 0,
            last_saved_ts: None,
        }
    }

    pub async fn run(
        mut self,
        stream_id: String,
        mut frames: Receiver<VideoFrame>,
        done: Latch,
        demuxer_stopped: StopFlag,
    ) -> Result<(), PipelineError> {
        tracing::info!(stream_id = %stream_id, "video sampler started");
        std::fs::create_dir_all(&self.frames_dir)?;

        let result = self.sample_loop(&stream_id, &mut frames, &done, &demuxer_stopped).await;

        done.set();
        tracing::info!(
            stream_id = %stream_id,
            frames = self.frame_index,
            "video sampler exiting"
        );
        result
    }

    async fn sample_loop(
        &mut self,
        stream_id: &str,
        frames: &mut Receiver<VideoFrame>,
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
                // Channel closed and drained: the demuxer is gone.
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
        frame: VideoFrame,
    ) -> Result<(), PipelineError> {
        let ts = (frame.media_time * 1000.0).round() / 1000.0;
        if !keeps_frame(self.last_saved_ts, ts, self.sample_rate) {
            return Ok(());
        }

        let filename = frame_filename(self.frame_index);
        let path = self.frames_dir.join(&filename);
        // Encoding is CPU-light relative to the surrounding I/O; run inline.
        if let Err(e) = jpeg::save_rgb_jpeg(&path, &frame.rgb, frame.width, frame.height) {
            tracing::error!(error = %e, path = %path.display(), "failed to save frame");
            return Err(e.into());
        }

        self.store
            .insert(&FrameRow {
                stream_id: stream_id.to_string(),
                frame_index: self.frame_index as i64,
                filename,
                timestamp: ts,
                pts: frame.pts,
                width: frame.width as i32,
                height: frame.height as i32,
            })
            .await?;

        self.frame_index += 1;
        self.last_saved_ts = Some(ts);
        Ok(())
    }
}

/// At most one frame per `1/rate` seconds of media time.
fn keeps_frame(last_saved: Option<f64>, ts: f64, rate: f64) -> bool {
    match last_saved {
        Some(last) => ts - last >= 1.0 / rate,
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sampling_interval_skips_close_frames() {
        let rate = 2.0;
        let mut last_saved: Option<f64> = None;
        let mut kept = Vec::new();
        for i in 0..20 {
            let ts = i as f64 / 10.0; // 10 fps input
            if keeps_frame(last_saved, ts, rate) {
                kept.push(ts);
                last_saved = Some(ts);
            }
        }
        // 2 seconds of media at 2 fps -> 4 kept frames.
        assert_eq!(kept, vec![0.0, 0.5, 1.0, 1.5]);
    }

    #[test]
    fn test_first_frame_always_kept() {
        assert!(keeps_frame(None, 0.0, 2.0));
        assert!(!keeps_frame(Some(0.0), 0.25, 2.0));
        assert!(keeps_frame(Some(0.0), 0.5, 2.0));
    }
}
