//! Highlight records and stream status

use serde::{Deserialize, Serialize};

/// Lifecycle status of a stream row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StreamStatus {
    Submitted,
    InProgress,
    Completed,
    Failed,
}

impl StreamStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Submitted => "SUBMITTED",
            Self::InProgress => "IN_PROGRESS",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "IN_PROGRESS" => Self::InProgress,
            "COMPLETED" => Self::Completed,
            "FAILED" => Self::Failed,
            _ => Self::Submitted,
        }
    }

    /// FAILED is terminal; everything else can still advance.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// One emitted highlight, stored as part of the stream row's JSON list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Highlight {
    pub start_time: f64,
    pub end_time: f64,
    pub title: String,
    pub caption: String,
    /// Frame artifact used as the thumbnail, `frame_<idx>.jpg`
    pub thumbnail: String,
    /// Why the edges moved, when refinement ran
    pub snap_reason: Option<String>,
}

impl Highlight {
    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [
            StreamStatus::Submitted,
            StreamStatus::InProgress,
            StreamStatus::Completed,
            StreamStatus::Failed,
        ] {
            assert_eq!(StreamStatus::from_str(status.as_str()), status);
        }
        assert_eq!(StreamStatus::from_str("bogus"), StreamStatus::Submitted);
    }

    #[test]
    fn test_highlight_json_shape() {
        let h = Highlight {
            start_time: 9.9,
            end_time: 20.3,
            title: "Stunning comeback goal".to_string(),
            caption: "Late equalizer".to_string(),
            thumbnail: "frame_000000019.jpg".to_string(),
            snap_reason: None,
        };
        let value = serde_json::to_value(&h).unwrap();
        assert_eq!(value["start_time"], 9.9);
        assert!(value["snap_reason"].is_null());
        let back: Highlight = serde_json::from_value(value).unwrap();
        assert_eq!(back, h);
    }
}
