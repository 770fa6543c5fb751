//! Demuxer: container URL -> two timestamped frame streams
//!
//! Runs on a dedicated OS thread because the decoder is blocking. Frames are
//! handed to the cooperative side through bounded tokio channels with
//! `blocking_send`, which is the only source of backpressure in the pipeline.

use std::sync::Once;

use ffmpeg_the_third as ffmpeg;

use ffmpeg::format::sample::Type as SampleKind;
use ffmpeg::format::{input, Pixel, Sample};
use ffmpeg::media::Type;
use ffmpeg::software::scaling::{context::Context as SwsContext, flag::Flags};
use tokio::sync::mpsc::Sender;

use highlight_core::StopFlag;

use crate::frame::{AudioFrame, VideoFrame};
use crate::MediaError;

static FFMPEG_INIT: Once = Once::new();

/// Splits one media container into timestamped audio and video frame streams.
pub struct Demuxer {
    url: String,
    max_stream_duration: f64,
    video_tx: Sender<VideoFrame>,
    audio_tx: Sender<AudioFrame>,
    stop: StopFlag,
}

impl Demuxer {
    pub fn new(
        url: impl Into<String>,
        max_stream_duration: f64,
        video_tx: Sender<VideoFrame>,
        audio_tx: Sender<AudioFrame>,
        stop: StopFlag,
    ) -> Self {
        Self {
            url: url.into(),
            max_stream_duration,
            video_tx,
            audio_tx,
            stop,
        }
    }

    /// Demux and decode until end of stream, the configured media-time bound,
    /// or the stop flag. Always sets the stop flag on return so downstream
    /// workers drain.
    pub fn run(self) -> Result<(), MediaError> {
        FFMPEG_INIT.call_once(|| {
            if let Err(e) = ffmpeg::init() {
                tracing::error!(error = %e, "ffmpeg init failed");
            }
        });

        tracing::info!(url = %self.url, "demuxer starting");
        let result = self.demux();
        self.stop.set();
        match &result {
            Ok(()) => tracing::info!("demuxer finished, stop flag set"),
            Err(e) => tracing::error!(error = %e, "demuxer exiting on error"),
        }
        result
    }

    fn demux(&self) -> Result<(), MediaError> {
        let mut ictx = input(&self.url)
            .map_err(|e| MediaError::StreamOpen(format!("cannot open {}: {e}", self.url)))?;

        let video_idx = ictx
            .streams()
            .best(Type::Video)
            .ok_or_else(|| MediaError::StreamOpen("stream does not have a video stream".into()))?
            .index();

        // Default-dispositioned audio stream, first audio stream otherwise.
        let mut audio_idx = None;
        for stream in ictx.streams() {
            if stream.parameters().medium() != Type::Audio {
                continue;
            }
            if stream
                .disposition()
                .contains(ffmpeg::format::stream::Disposition::DEFAULT)
            {
                audio_idx = Some(stream.index());
                break;
            }
            if audio_idx.is_none() {
                audio_idx = Some(stream.index());
            }
        }
        let audio_idx = audio_idx
            .ok_or_else(|| MediaError::StreamOpen("stream does not have an audio stream".into()))?;

        let (video_tb, audio_tb) = {
            let vtb = ictx
                .stream(video_idx)
                .map(|s| s.time_base())
                .unwrap_or_else(|| ffmpeg::Rational::new(1, 1000));
            let atb = ictx
                .stream(audio_idx)
                .map(|s| s.time_base())
                .unwrap_or_else(|| ffmpeg::Rational::new(1, 1000));
            (
                vtb.numerator() as f64 / vtb.denominator() as f64,
                atb.numerator() as f64 / atb.denominator() as f64,
            )
        };

        let mut video_decoder = {
            let stream = ictx
                .stream(video_idx)
                .ok_or_else(|| MediaError::StreamOpen("video stream vanished".into()))?;
            ffmpeg::codec::context::Context::from_parameters(stream.parameters())?
                .decoder()
                .video()?
        };
        let mut audio_decoder = {
            let stream = ictx
                .stream(audio_idx)
                .ok_or_else(|| MediaError::StreamOpen("audio stream vanished".into()))?;
            ffmpeg::codec::context::Context::from_parameters(stream.parameters())?
                .decoder()
                .audio()?
        };

        let mut scaler = SwsContext::get(
            video_decoder.format(),
            video_decoder.width(),
            video_decoder.height(),
            Pixel::RGB24,
            video_decoder.width(),
            video_decoder.height(),
            Flags::BILINEAR,
        )?;

        let mut packets = ictx.packets();
        loop {
            if self.stop.is_set() {
                return Ok(());
            }
            let (stream, packet) = match packets.next() {
                Some(Ok(pair)) => pair,
                Some(Err(e)) => {
                    // Transient packet errors are logged and skipped.
                    tracing::warn!(error = %e, "error reading packet, skipping");
                    continue;
                }
                None => break,
            };

            let index = stream.index();
            if index == video_idx {
                if video_decoder.send_packet(&packet).is_err() {
                    tracing::warn!("error decoding video packet, skipping");
                    continue;
                }
                if !self.drain_video(&mut video_decoder, &mut scaler, video_tb)? {
                    return Ok(());
                }
            } else if index == audio_idx {
                if audio_decoder.send_packet(&packet).is_err() {
                    tracing::warn!("error decoding audio packet, skipping");
                    continue;
                }
                if !self.drain_audio(&mut audio_decoder, audio_tb)? {
                    return Ok(());
                }
            }
        }

        // Flush both decoders at end of stream.
        let _ = video_decoder.send_eof();
        self.drain_video(&mut video_decoder, &mut scaler, video_tb)?;
        let _ = audio_decoder.send_eof();
        self.drain_audio(&mut audio_decoder, audio_tb)?;

        Ok(())
    }

    /// Returns false once the media-time bound was crossed or the consumer
    /// went away.
    fn drain_video(
        &self,
        decoder: &mut ffmpeg::decoder::Video,
        scaler: &mut SwsContext,
        time_base: f64,
    ) -> Result<bool, MediaError> {
        let mut decoded = ffmpeg::util::frame::video::Video::empty();
        while decoder.receive_frame(&mut decoded).is_ok() {
            let pts = decoded.pts().unwrap_or(0);
            let media_time = pts as f64 * time_base;
            if media_time > self.max_stream_duration {
                self.stop.set();
                return Ok(false);
            }

            let mut rgb = ffmpeg::util::frame::video::Video::empty();
            if scaler.run(&decoded, &mut rgb).is_err() {
                tracing::warn!(pts, "scaling failed for frame, skipping");
                continue;
            }

            let width = rgb.width();
            let height = rgb.height();
            let stride = rgb.stride(0);
            let raw = rgb.data(0);
            let row_bytes = width as usize * 3;
            let mut data = Vec::with_capacity(row_bytes * height as usize);
            for row in 0..height as usize {
                let offset = row * stride;
                data.extend_from_slice(&raw[offset..offset + row_bytes]);
            }

            let frame = VideoFrame {
                media_time,
                pts,
                width,
                height,
                rgb: data,
            };
            if self.video_tx.blocking_send(frame).is_err() {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn drain_audio(
        &self,
        decoder: &mut ffmpeg::decoder::Audio,
        time_base: f64,
    ) -> Result<bool, MediaError> {
        let mut decoded = ffmpeg::util::frame::audio::Audio::empty();
        while decoder.receive_frame(&mut decoded).is_ok() {
            let pts = decoded.pts().unwrap_or(0);
            let media_time = pts as f64 * time_base;
            if media_time > self.max_stream_duration {
                self.stop.set();
                return Ok(false);
            }

            let samples = match interleaved_f32(&decoded) {
                Some(samples) => samples,
                None => {
                    tracing::warn!(format = ?decoded.format(), "unsupported sample format, skipping frame");
                    continue;
                }
            };

            let frame = AudioFrame {
                media_time,
                sample_rate: decoded.rate(),
                channels: decoded.channels(),
                samples,
            };
            if self.audio_tx.blocking_send(frame).is_err() {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// Convert a decoded audio frame to interleaved f32 regardless of layout.
///
/// Reads the raw plane bytes; plane line sizes include padding, so only the
/// leading `samples * channels` (packed) or `samples` (planar) values count.
fn interleaved_f32(frame: &ffmpeg::util::frame::audio::Audio) -> Option<Vec<f32>> {
    let channels = frame.channels() as usize;
    let samples = frame.samples();
    if channels == 0 || samples == 0 {
        return Some(Vec::new());
    }

    let (decode, sample_bytes, kind): (fn(&[u8]) -> f32, usize, SampleKind) = match frame.format() {
        Sample::I16(kind) => (
            |b| i16::from_ne_bytes([b[0], b[1]]) as f32 / 32768.0,
            2,
            kind,
        ),
        Sample::I32(kind) => (
            |b| i32::from_ne_bytes([b[0], b[1], b[2], b[3]]) as f32 / 2_147_483_648.0,
            4,
            kind,
        ),
        Sample::F32(kind) => (
            |b| f32::from_ne_bytes([b[0], b[1], b[2], b[3]]),
            4,
            kind,
        ),
        Sample::F64(kind) => (
            |b| f64::from_ne_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]) as f32,
            8,
            kind,
        ),
        _ => return None,
    };

    match kind {
        SampleKind::Packed => {
            let needed = samples * channels * sample_bytes;
            let data = frame.data(0);
            if data.len() < needed {
                return None;
            }
            Some(
                data[..needed]
                    .chunks_exact(sample_bytes)
                    .map(decode)
                    .collect(),
            )
        }
        SampleKind::Planar => {
            let needed = samples * sample_bytes;
            let mut out = vec![0.0f32; samples * channels];
            for ch in 0..channels {
                let data = frame.data(ch);
                if data.len() < needed {
                    return None;
                }
                for (i, b) in data[..needed].chunks_exact(sample_bytes).enumerate() {
                    out[i * channels + ch] = decode(b);
                }
            }
            Some(out)
        }
    }
}
