//! Streaming speech-to-text contract and transport
//!
//! The service consumes a send-only stream of raw PCM audio events at a
//! declared sample rate and produces an event stream of transcription
//! results; only non-partial items are consumed downstream. End-of-input is
//! explicit. `HttpSpeechToText` implements the contract as a chunked POST
//! with a newline-delimited JSON event response.

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Error, Debug)]
pub enum SttError {
    #[error("session error: {0}")]
    Session(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("event decode error: {0}")]
    Decode(String),
}

impl From<SttError> for highlight_core::Error {
    fn from(err: SttError) -> Self {
        highlight_core::Error::Transcription(err.to_string())
    }
}

/// One event from the service; may carry zero or more results.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TranscriptEvent {
    #[serde(default)]
    pub results: Vec<TranscriptResult>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TranscriptResult {
    pub is_partial: bool,
    #[serde(default)]
    pub alternatives: Vec<TranscriptAlternative>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TranscriptAlternative {
    #[serde(default)]
    pub items: Vec<TranscriptItem>,
}

/// Word-level item with per-word timings relative to the chunk start.
#[derive(Debug, Clone, Deserialize)]
pub struct TranscriptItem {
    pub start_time: f64,
    pub end_time: f64,
    pub content: String,
    pub item_type: String,
}

/// One bidirectional transcription session.
#[async_trait]
pub trait TranscribeSession: Send {
    /// Send one audio event of raw PCM bytes.
    async fn send_audio(&mut self, chunk: &[u8]) -> Result<(), SttError>;

    /// Signal end-of-input. No more audio may be sent afterwards.
    async fn end_input(&mut self) -> Result<(), SttError>;

    /// Next event, or `None` once the result stream is exhausted.
    async fn next_event(&mut self) -> Result<Option<TranscriptEvent>, SttError>;
}

/// Streaming speech-to-text client contract.
#[async_trait]
pub trait SpeechToText: Send + Sync + 'static {
    /// Open a session declaring the media encoding (PCM) sample rate.
    async fn start_session(
        &self,
        sample_rate: u32,
    ) -> Result<Box<dyn TranscribeSession>, SttError>;
}

/// Reqwest-backed implementation: chunked request body carries the audio
/// events, the response body is newline-delimited JSON transcript events.
pub struct HttpSpeechToText {
    client: reqwest::Client,
    endpoint: String,
    language_code: String,
}

impl HttpSpeechToText {
    pub fn new(endpoint: impl Into<String>, language_code: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            language_code: language_code.into(),
        }
    }
}

#[async_trait]
impl SpeechToText for HttpSpeechToText {
    async fn start_session(
        &self,
        sample_rate: u32,
    ) -> Result<Box<dyn TranscribeSession>, SttError> {
        let (audio_tx, audio_rx) = mpsc::channel::<Result<Bytes, std::io::Error>>(16);
        let (event_tx, event_rx) = mpsc::channel::<Result<TranscriptEvent, SttError>>(64);

        let url = format!("{}/v1/streaming-transcription", self.endpoint);
        let request = self
            .client
            .post(url)
            .query(&[
                ("language-code", self.language_code.clone()),
                ("sample-rate", sample_rate.to_string()),
            ])
            .header("content-type", "application/octet-stream")
            .body(reqwest::Body::wrap_stream(
                tokio_stream::wrappers::ReceiverStream::new(audio_rx),
            ));

        // Drive the request and decode response lines concurrently with the
        // caller feeding audio.
        tokio::spawn(async move {
            let response = match request.send().await {
                Ok(response) => response,
                Err(e) => {
                    let _ = event_tx.send(Err(SttError::Transport(e.to_string()))).await;
                    return;
                }
            };
            if !response.status().is_success() {
                let _ = event_tx
                    .send(Err(SttError::Session(format!(
                        "HTTP {}",
                        response.status()
                    ))))
                    .await;
                return;
            }

            let mut stream = response.bytes_stream();
            let mut buffer = String::new();
            while let Some(chunk) = stream.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        let _ = event_tx.send(Err(SttError::Transport(e.to_string()))).await;
                        return;
                    }
                };
                buffer.push_str(&String::from_utf8_lossy(&chunk));
                while let Some(line_end) = buffer.find('\n') {
                    let line = buffer[..line_end].trim().to_string();
                    buffer.drain(..=line_end);
                    if line.is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<TranscriptEvent>(&line) {
                        Ok(event) => {
                            if event_tx.send(Ok(event)).await.is_err() {
                                return;
                            }
                        }
                        Err(e) => {
                            let _ = event_tx.send(Err(SttError::Decode(e.to_string()))).await;
                            return;
                        }
                    }
                }
            }
            // Trailing event without a final newline.
            let line = buffer.trim();
            if !line.is_empty() {
                match serde_json::from_str::<TranscriptEvent>(line) {
                    Ok(event) => {
                        let _ = event_tx.send(Ok(event)).await;
                    }
                    Err(e) => {
                        let _ = event_tx.send(Err(SttError::Decode(e.to_string()))).await;
                    }
                }
            }
        });

        Ok(Box::new(HttpSession {
            audio_tx: Some(audio_tx),
            event_rx,
        }))
    }
}

struct HttpSession {
    audio_tx: Option<mpsc::Sender<Result<Bytes, std::io::Error>>>,
    event_rx: mpsc::Receiver<Result<TranscriptEvent, SttError>>,
}

#[async_trait]
impl TranscribeSession for HttpSession {
    async fn send_audio(&mut self, chunk: &[u8]) -> Result<(), SttError> {
        let tx = self
            .audio_tx
            .as_ref()
            .ok_or_else(|| SttError::Session("input already ended".to_string()))?;
        tx.send(Ok(Bytes::copy_from_slice(chunk)))
            .await
            .map_err(|_| SttError::Transport("audio stream closed".to_string()))
    }

    async fn end_input(&mut self) -> Result<(), SttError> {
        // Dropping the sender closes the request body.
        self.audio_tx.take();
        Ok(())
    }

    async fn next_event(&mut self) -> Result<Option<TranscriptEvent>, SttError> {
        match self.event_rx.recv().await {
            Some(Ok(event)) => Ok(Some(event)),
            Some(Err(e)) => Err(e),
            None => Ok(None),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_decoding() {
        let json = r#"{
            "results": [{
                "is_partial": false,
                "alternatives": [{
                    "items": [
                        {"start_time": 0.1, "end_time": 0.4, "content": "what", "item_type": "pronunciation"},
                        {"start_time": 0.4, "end_time": 0.4, "content": ",", "item_type": "punctuation"}
                    ]
                }]
            }]
        }"#;
        let event: TranscriptEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.results.len(), 1);
        assert!(!event.results[0].is_partial);
        assert_eq!(event.results[0].alternatives[0].items.len(), 2);
    }

    #[test]
    fn test_empty_event_decodes() {
        let event: TranscriptEvent = serde_json::from_str("{}").unwrap();
        assert!(event.results.is_empty());
    }

    #[tokio::test]
    async fn test_scripted_backend_yields_events() {
        use testing::{ScriptedSpeechToText, SessionScript};

        let event: TranscriptEvent = serde_json::from_str(
            r#"{"results":[{"is_partial":false,"alternatives":[{"items":[
                {"start_time":0.0,"end_time":0.2,"content":"hi","item_type":"pronunciation"}
            ]}]}]}"#,
        )
        .unwrap();
        let stt = ScriptedSpeechToText::new(vec![SessionScript::Events(vec![event])]);

        let mut session = stt.start_session(16_000).await.unwrap();
        session.send_audio(&[0u8; 4]).await.unwrap();
        session.end_input().await.unwrap();

        let first = session.next_event().await.unwrap().unwrap();
        assert_eq!(first.results.len(), 1);
        assert!(session.next_event().await.unwrap().is_none());
    }
}
