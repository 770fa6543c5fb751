//! Transcription coordinator
//!
//! Polls for chunks whose transcript is still the placeholder sentinel,
//! drives one streaming speech-to-text session per chunk, and upgrades the
//! row to a word-item list or the error sentinel.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use highlight_config::constants::{STT_AUDIO_EVENT_BYTES, TRANSCRIBER_BATCH_SIZE, TRANSCRIBER_IDLE_MS};
use highlight_core::{ItemType, Latch, RetryPolicy, Transcript, WordItem};
use highlight_persistence::{AudioChunkRow, AudioChunkStore};

use crate::stt::{SpeechToText, SttError, TranscriptEvent};
use crate::PipelineError;

/// Drives the speech-to-text contract over pending audio chunks.
pub struct Transcriber {
    store: AudioChunkStore,
    stt: Arc<dyn SpeechToText>,
    chunk_dir: PathBuf,
    retry: RetryPolicy,
}

impl Transcriber {
    pub fn new(
        store: AudioChunkStore,
        stt: Arc<dyn SpeechToText>,
        chunk_dir: PathBuf,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            store,
            stt,
            chunk_dir,
            retry,
        }
    }

    /// Driver loop: batches of pending chunks until the chunker is done and
    /// nothing is left.
    pub async fn run(&self, stream_id: String, chunker_done: Latch) -> Result<(), PipelineError> {
        tracing::info!(stream_id = %stream_id, "transcriber started");
        loop {
            let pending = self
                .store
                .pending_transcripts(&stream_id, TRANSCRIBER_BATCH_SIZE)
                .await?;

            if pending.is_empty() {
                if chunker_done.is_set() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(TRANSCRIBER_IDLE_MS)).await;
                continue;
            }

            for chunk in &pending {
                self.transcribe_row(chunk).await?;
            }
        }
        tracing::info!(stream_id = %stream_id, "transcriber exiting");
        Ok(())
    }

    /// Transcribe one chunk row and persist the outcome.
    ///
    /// Idempotent: rows that are already finalized are left untouched.
    /// Permanent failure writes the error sentinel instead of failing the
    /// pipeline.
    pub async fn transcribe_row(&self, chunk: &AudioChunkRow) -> Result<(), PipelineError> {
        if Transcript::from_column(&chunk.transcript).is_usable() {
            return Ok(());
        }

        let path = self.chunk_dir.join(&chunk.filename);
        let outcome = self
            .retry
            .run("stt", || {
                transcribe_file(
                    self.stt.as_ref(),
                    path.clone(),
                    chunk.sample_rate.max(1) as u32,
                )
            })
            .await;

        let transcript = match outcome {
            Ok(words) => Transcript::Words(words),
            Err(e) => {
                tracing::error!(
                    chunk = %chunk.filename,
                    error = %e,
                    "transcription failed permanently"
                );
                Transcript::Error
            }
        };

        self.store
            .update_transcript(&chunk.stream_id, chunk.chunk_index, &transcript.to_column())
            .await?;
        Ok(())
    }
}

/// One streaming session over one chunk file.
async fn transcribe_file(
    stt: &dyn SpeechToText,
    path: PathBuf,
    sample_rate: u32,
) -> Result<Vec<WordItem>, SttError> {
    let data = tokio::fs::read(&path)
        .await
        .map_err(|e| SttError::Session(format!("cannot read {}: {e}", path.display())))?;

    let mut session = stt.start_session(sample_rate).await?;
    for chunk in data.chunks(STT_AUDIO_EVENT_BYTES) {
        session.send_audio(chunk).await?;
    }
    session.end_input().await?;

    let mut words = Vec::new();
    while let Some(event) = session.next_event().await? {
        collect_final_words(&event, &mut words);
    }
    Ok(words)
}

/// Append word items from every finalized (non-partial) result alternative.
fn collect_final_words(event: &TranscriptEvent, words: &mut Vec<WordItem>) {
    for result in &event.results {
        if result.is_partial {
            continue;
        }
        for alternative in &result.alternatives {
            for item in &alternative.items {
                words.push(WordItem {
                    content: item.content.clone(),
                    start_time: item.start_time,
                    end_time: item.end_time,
                    item_type: if item.item_type == "pronunciation" {
                        ItemType::Pronunciation
                    } else {
                        ItemType::Punctuation
                    },
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stt::testing::{ScriptedSpeechToText, SessionScript};

    fn event(json: &str) -> TranscriptEvent {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_collect_final_words_skips_partials() {
        let e = event(
            r#"{"results":[
                {"is_partial":true,"alternatives":[{"items":[
                    {"start_time":0.0,"end_time":0.2,"content":"wha","item_type":"pronunciation"}
                ]}]},
                {"is_partial":false,"alternatives":[{"items":[
                    {"start_time":0.0,"end_time":0.3,"content":"what","item_type":"pronunciation"},
                    {"start_time":0.3,"end_time":0.3,"content":"!","item_type":"punctuation"}
                ]}]}
            ]}"#,
        );
        let mut words = Vec::new();
        collect_final_words(&e, &mut words);
        assert_eq!(words.len(), 2);
        assert_eq!(words[0].content, "what");
        assert_eq!(words[0].item_type, ItemType::Pronunciation);
        assert_eq!(words[1].item_type, ItemType::Punctuation);
    }

    #[tokio::test]
    async fn test_transcribe_file_collects_words() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audio_000000.wav");
        std::fs::write(&path, vec![0u8; 40 * 1024]).unwrap();

        let stt = ScriptedSpeechToText::new(vec![SessionScript::Events(vec![event(
            r#"{"results":[{"is_partial":false,"alternatives":[{"items":[
                {"start_time":0.1,"end_time":0.5,"content":"goal","item_type":"pronunciation"}
            ]}]}]}"#,
        )])]);

        let words = transcribe_file(stt.as_ref(), path, 16_000).await.unwrap();
        assert_eq!(words.len(), 1);
        assert_eq!(words[0].content, "goal");
    }

    #[tokio::test]
    async fn test_transcribe_file_propagates_session_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audio_000000.wav");
        std::fs::write(&path, vec![0u8; 128]).unwrap();

        let stt = ScriptedSpeechToText::new(vec![SessionScript::Fail("boom".to_string())]);
        assert!(transcribe_file(stt.as_ref(), path, 16_000).await.is_err());
    }

    #[tokio::test]
    async fn test_missing_file_is_session_error() {
        let stt = ScriptedSpeechToText::new(vec![]);
        let missing = PathBuf::from("/definitely/not/here.wav");
        assert!(transcribe_file(stt.as_ref(), missing, 16_000).await.is_err());
    }
}
