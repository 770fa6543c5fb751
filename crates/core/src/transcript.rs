//! Transcript word items and the audio-chunk transcript column

use serde::{Deserialize, Serialize};

/// Column value for a chunk that has not been transcribed yet.
pub const EMPTY_SENTINEL: &str = "!EMPTY!";

/// Column value for a chunk whose transcription failed permanently.
pub const ERROR_SENTINEL: &str = "!ERROR!";

/// Word item kind as reported by the speech-to-text service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    /// A spoken word
    Pronunciation,
    /// Punctuation inserted by the recognizer
    Punctuation,
}

/// One finalized word with timings, relative to the chunk start
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordItem {
    pub content: String,
    pub start_time: f64,
    pub end_time: f64,
    #[serde(rename = "type")]
    pub item_type: ItemType,
}

impl WordItem {
    pub fn is_spoken(&self) -> bool {
        self.item_type == ItemType::Pronunciation
    }
}

/// The transcript column of an audio chunk row.
///
/// The column holds one of two well-known sentinels or a JSON array of
/// [`WordItem`]s. The chunker writes `Empty`, the transcriber upgrades it to
/// `Words` or `Error`, and nothing ever downgrades it.
#[derive(Debug, Clone, PartialEq)]
pub enum Transcript {
    Empty,
    Error,
    Words(Vec<WordItem>),
}

impl Transcript {
    /// Parse the raw column value.
    ///
    /// Anything that is neither sentinel nor valid JSON is treated as `Error`
    /// so a corrupt row cannot wedge the scorer.
    pub fn from_column(raw: &str) -> Self {
        match raw {
            EMPTY_SENTINEL => Transcript::Empty,
            ERROR_SENTINEL => Transcript::Error,
            other => match serde_json::from_str::<Vec<WordItem>>(other) {
                Ok(words) => Transcript::Words(words),
                Err(e) => {
                    tracing::warn!(error = %e, "unparseable transcript column, treating as error");
                    Transcript::Error
                }
            },
        }
    }

    /// Serialize back to the column representation.
    pub fn to_column(&self) -> String {
        match self {
            Transcript::Empty => EMPTY_SENTINEL.to_string(),
            Transcript::Error => ERROR_SENTINEL.to_string(),
            Transcript::Words(words) => {
                serde_json::to_string(words).unwrap_or_else(|_| ERROR_SENTINEL.to_string())
            }
        }
    }

    /// A chunk is finalized once it is no longer `Empty`.
    pub fn is_finalized(&self) -> bool {
        !matches!(self, Transcript::Empty)
    }

    pub fn is_usable(&self) -> bool {
        matches!(self, Transcript::Words(_))
    }

    pub fn words(&self) -> &[WordItem] {
        match self {
            Transcript::Words(words) => words,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(content: &str, start: f64, end: f64) -> WordItem {
        WordItem {
            content: content.to_string(),
            start_time: start,
            end_time: end,
            item_type: ItemType::Pronunciation,
        }
    }

    #[test]
    fn test_sentinel_round_trip() {
        assert_eq!(Transcript::from_column(EMPTY_SENTINEL), Transcript::Empty);
        assert_eq!(Transcript::from_column(ERROR_SENTINEL), Transcript::Error);
        assert_eq!(Transcript::Empty.to_column(), EMPTY_SENTINEL);
        assert_eq!(Transcript::Error.to_column(), ERROR_SENTINEL);
    }

    #[test]
    fn test_words_round_trip() {
        let t = Transcript::Words(vec![word("hello", 0.12, 0.4), word("world", 0.5, 0.9)]);
        let column = t.to_column();
        assert_eq!(Transcript::from_column(&column), t);
    }

    #[test]
    fn test_item_type_serde_names() {
        let json = r#"{"content":"goal","start_time":1.0,"end_time":1.4,"type":"pronunciation"}"#;
        let item: WordItem = serde_json::from_str(json).unwrap();
        assert!(item.is_spoken());

        let back = serde_json::to_value(&item).unwrap();
        assert_eq!(back["type"], "pronunciation");
    }

    #[test]
    fn test_garbage_column_degrades_to_error() {
        assert_eq!(Transcript::from_column("not json at all"), Transcript::Error);
    }

    #[test]
    fn test_finalized_states() {
        assert!(!Transcript::Empty.is_finalized());
        assert!(Transcript::Error.is_finalized());
        assert!(Transcript::Words(vec![]).is_finalized());
        assert!(!Transcript::Error.is_usable());
    }
}
