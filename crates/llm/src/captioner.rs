//! Captioner: caption + semantic highlight score for one candidate window

use serde::Deserialize;

use crate::client::{ImageBlock, LlmClient};
use crate::LlmError;

const CAPTION_MAX_TOKENS: usize = 500;

const CAPTION_AND_SCORE_PROMPT: &str = r#"
You are an expert video editor and content curator.
Your task is to judge if a given set of video frames (images) and the corresponding audio transcript represent a highlight-worthy moment.

## You should analyze:
    1. What's visually happening in the frames (motion, emotion, action, etc.)
    2. The spoken content in the transcript (emotion, importance, excitement, etc.)

## Then return:
    1. A caption (a short, descriptive summary of what's happening)
    2. A highlight_score between 0 and 1 (with 1 decimal place), where:
        - 1.0 -> Extremely highlight-worthy (exciting, emotional, visually or contextually important)
        - 0.0 -> Not a highlight at all (irrelevant, static, repetitive, or dull)

## Examples:

    Example 1:
        Frames description: [Image of soccer player dribbling, Image of goal kick, Image of cheering crowd]
        Transcript: "And he shoots - what a goal! Unbelievable finish from Ronaldo!"
        Output:
        {
            "caption": "Ronaldo scores a spectacular goal after dribbling past defenders",
            "highlight_score": 1.0
        }

    Example 2:
        Frames description: [Image of players walking off the field, Image of empty stadium seats]
        Transcript: "We'll be back after the break."
        Output:
        {
            "caption": "Players taking a break before the next round",
            "highlight_score": 0.1
        }

    Example 3:
        Frames description: [Image of presenter on stage, Image of confetti, Image of cheering crowd]
        Transcript: "And the winner is... Team Alpha!"
        Output:
        {
            "caption": "Team Alpha announced as the winner amid cheers",
            "highlight_score": 0.9
        }

## Output format (JSON):
    {
        "caption": "...",
        "highlight_score": ...
    }
**Note**: Do not add anything extra to the output.
"#;

/// Parsed captioner reply
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CaptionScore {
    pub caption: String,
    pub highlight_score: f64,
}

impl CaptionScore {
    fn validate(self) -> Result<Self, LlmError> {
        if !(0.0..=1.0).contains(&self.highlight_score) {
            return Err(LlmError::InvalidResponse(format!(
                "highlight_score {} outside [0, 1]",
                self.highlight_score
            )));
        }
        Ok(self)
    }
}

/// Captioner service over the shared client
#[derive(Clone)]
pub struct Captioner {
    client: LlmClient,
}

impl Captioner {
    pub fn new(client: LlmClient) -> Self {
        Self { client }
    }

    /// Caption the window and score its highlight-worthiness.
    pub async fn caption_and_score(
        &self,
        transcript: &str,
        images: Vec<ImageBlock>,
    ) -> Result<CaptionScore, LlmError> {
        let queries = vec![transcript.to_string()];
        let value = self
            .client
            .invoke_json(CAPTION_AND_SCORE_PROMPT, &queries, &images, CAPTION_MAX_TOKENS)
            .await?;

        let parsed: CaptionScore = serde_json::from_value(value)
            .map_err(|e| LlmError::InvalidResponse(format!("captioner reply: {e}")))?;
        parsed.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_reply() {
        let value: serde_json::Value =
            serde_json::from_str(r#"{"caption": "Late equalizer", "highlight_score": 0.9}"#)
                .unwrap();
        let parsed: CaptionScore = serde_json::from_value(value).unwrap();
        let parsed = parsed.validate().unwrap();
        assert_eq!(parsed.caption, "Late equalizer");
        assert_eq!(parsed.highlight_score, 0.9);
    }

    #[test]
    fn test_out_of_range_score_rejected() {
        let parsed = CaptionScore {
            caption: "x".to_string(),
            highlight_score: 1.2,
        };
        assert!(parsed.validate().is_err());
    }

    #[test]
    fn test_missing_fields_rejected() {
        let value: serde_json::Value = serde_json::from_str(r#"{"caption": "x"}"#).unwrap();
        assert!(serde_json::from_value::<CaptionScore>(value).is_err());
    }
}
