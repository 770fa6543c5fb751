//! Edge refiner: bounded arbitration over a snapped highlight window
//!
//! The model chooses exactly one of keep / use_topic / use_scene /
//! micro_adjust. Replies are parsed into a strict sum type; anything
//! malformed, unknown, or out of the configured delta ranges degrades to
//! `Keep`. Execution of the chosen plan is deterministic and happens in the
//! pipeline crate, not here.

use serde::Serialize;

use highlight_config::constants::{END_DELTA_RANGE, START_DELTA_RANGE};

use crate::client::{ImageBlock, LlmClient};
use crate::LlmError;

const REFINER_MAX_TOKENS: usize = 400;

const EDGE_REFINER_PROMPT: &str = r#"
You are an expert highlight refiner.

You are given a snapped highlight window, the nearest topic and scene boundary
candidates for each edge, a transcript excerpt restricted to the window, and a
small set of frames around the edges.

Decide on exactly one action:
- "keep": the snapped window is already right.
- "use_topic": both edges should follow transcript/topic boundaries.
- "use_scene": both edges should follow scene-cut boundaries.
- "micro_adjust": nudge the edges by small deltas within the allowed ranges.

Return only strict JSON:
{"action": "...", "start_delta": 0.0, "end_delta": 0.0, "reason": "...", "confidence": 0.0}

Do not perform snapping or clamping - those are handled downstream.
Prefer transcript coherence; use scene cues if the transcript is weak.
**Note**: Do not add anything extra to the output.
"#;

/// What the controller should do with the snapped window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RefinePlan {
    Keep,
    UseTopic,
    UseScene,
    MicroAdjust { start_delta: f64, end_delta: f64 },
}

impl RefinePlan {
    pub fn action_name(&self) -> &'static str {
        match self {
            Self::Keep => "keep",
            Self::UseTopic => "use_topic",
            Self::UseScene => "use_scene",
            Self::MicroAdjust { .. } => "micro_adjust",
        }
    }
}

/// Parsed refiner reply.
#[derive(Debug, Clone, PartialEq)]
pub struct RefineDecision {
    pub plan: RefinePlan,
    pub reason: String,
    pub confidence: f64,
}

impl RefineDecision {
    pub fn fallback_keep(reason: &str) -> Self {
        Self {
            plan: RefinePlan::Keep,
            reason: reason.to_string(),
            confidence: 0.0,
        }
    }
}

/// Nearest boundary candidate for one edge, with its signed delta.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct EdgeCandidates {
    pub topic_candidate_sec: Option<f64>,
    pub topic_delta_sec: Option<f64>,
    pub scene_candidate_sec: Option<f64>,
    pub scene_delta_sec: Option<f64>,
}

/// Numeric context block shown to the model.
#[derive(Debug, Clone, Serialize)]
pub struct RefineContext {
    pub snapped_start: f64,
    pub snapped_end: f64,
    pub duration: f64,
    pub min_len: f64,
    pub max_len: f64,
    pub fps: f64,
    pub start: EdgeCandidates,
    pub end: EdgeCandidates,
    pub start_delta_range_sec: (f64, f64),
    pub end_delta_range_sec: (f64, f64),
}

/// Refiner service over the shared client.
#[derive(Clone)]
pub struct Refiner {
    client: LlmClient,
}

impl Refiner {
    pub fn new(client: LlmClient) -> Self {
        Self { client }
    }

    /// Ask for a plan. Any failure degrades to `Keep`.
    pub async fn refine(
        &self,
        context: &RefineContext,
        transcript_excerpt: &str,
        images: Vec<ImageBlock>,
    ) -> RefineDecision {
        let context_json = match serde_json::to_string(context) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialize refine context");
                return RefineDecision::fallback_keep("fallback-keep");
            }
        };
        let queries = vec![
            context_json,
            format!("Transcript (inside window):\n{transcript_excerpt}"),
        ];

        match self
            .client
            .invoke_json(EDGE_REFINER_PROMPT, &queries, &images, REFINER_MAX_TOKENS)
            .await
        {
            Ok(value) => parse_decision(&value),
            Err(e) => {
                tracing::warn!(error = %e, "edge refiner failed, keeping snapped window");
                RefineDecision::fallback_keep("fallback-keep")
            }
        }
    }
}

/// Strict plan parsing. Unknown actions, missing deltas, non-finite values
/// and deltas outside the configured ranges all degrade to `Keep`.
pub fn parse_decision(value: &serde_json::Value) -> RefineDecision {
    let reason = value
        .get("reason")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();
    let confidence = value
        .get("confidence")
        .and_then(|v| v.as_f64())
        .unwrap_or(0.0)
        .clamp(0.0, 1.0);

    let action = value
        .get("action")
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_lowercase())
        .unwrap_or_default();

    let plan = match action.as_str() {
        "keep" => RefinePlan::Keep,
        "use_topic" => RefinePlan::UseTopic,
        "use_scene" => RefinePlan::UseScene,
        "micro_adjust" => {
            let start_delta = value.get("start_delta").and_then(|v| v.as_f64());
            let end_delta = value.get("end_delta").and_then(|v| v.as_f64());
            match (start_delta, end_delta) {
                (Some(sd), Some(ed))
                    if sd.is_finite()
                        && ed.is_finite()
                        && (START_DELTA_RANGE.0..=START_DELTA_RANGE.1).contains(&sd)
                        && (END_DELTA_RANGE.0..=END_DELTA_RANGE.1).contains(&ed) =>
                {
                    RefinePlan::MicroAdjust {
                        start_delta: sd,
                        end_delta: ed,
                    }
                }
                _ => {
                    tracing::warn!(?start_delta, ?end_delta, "micro_adjust deltas rejected");
                    RefinePlan::Keep
                }
            }
        }
        other => {
            if !other.is_empty() {
                tracing::warn!(action = other, "unknown refiner action");
            }
            RefinePlan::Keep
        }
    };

    RefineDecision {
        plan,
        reason,
        confidence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> RefineDecision {
        parse_decision(&serde_json::from_str(json).unwrap())
    }

    #[test]
    fn test_parse_keep() {
        let decision = parse(r#"{"action": "keep", "reason": "clean cut", "confidence": 0.8}"#);
        assert_eq!(decision.plan, RefinePlan::Keep);
        assert_eq!(decision.reason, "clean cut");
        assert_eq!(decision.confidence, 0.8);
    }

    #[test]
    fn test_parse_use_topic_and_scene() {
        assert_eq!(parse(r#"{"action": "use_topic"}"#).plan, RefinePlan::UseTopic);
        assert_eq!(parse(r#"{"action": "USE_SCENE"}"#).plan, RefinePlan::UseScene);
    }

    #[test]
    fn test_parse_micro_adjust() {
        let decision =
            parse(r#"{"action": "micro_adjust", "start_delta": -0.5, "end_delta": 1.2}"#);
        assert_eq!(
            decision.plan,
            RefinePlan::MicroAdjust {
                start_delta: -0.5,
                end_delta: 1.2
            }
        );
    }

    #[test]
    fn test_out_of_range_deltas_degrade_to_keep() {
        let decision =
            parse(r#"{"action": "micro_adjust", "start_delta": 5.0, "end_delta": 0.0}"#);
        assert_eq!(decision.plan, RefinePlan::Keep);

        let decision =
            parse(r#"{"action": "micro_adjust", "start_delta": 0.0, "end_delta": -2.0}"#);
        assert_eq!(decision.plan, RefinePlan::Keep);
    }

    #[test]
    fn test_missing_deltas_degrade_to_keep() {
        assert_eq!(parse(r#"{"action": "micro_adjust"}"#).plan, RefinePlan::Keep);
    }

    #[test]
    fn test_unknown_action_degrades_to_keep() {
        assert_eq!(parse(r#"{"action": "split"}"#).plan, RefinePlan::Keep);
        assert_eq!(parse(r#"{"confidence": 1.0}"#).plan, RefinePlan::Keep);
    }

    #[test]
    fn test_confidence_clamped() {
        let decision = parse(r#"{"action": "keep", "confidence": 7.5}"#);
        assert_eq!(decision.confidence, 1.0);
    }

    #[test]
    fn test_context_serializes_for_prompt() {
        let context = RefineContext {
            snapped_start: 10.0,
            snapped_end: 20.0,
            duration: 10.0,
            min_len: 4.0,
            max_len: 12.0,
            fps: 2.0,
            start: EdgeCandidates {
                topic_candidate_sec: Some(9.9),
                topic_delta_sec: Some(-0.1),
                scene_candidate_sec: None,
                scene_delta_sec: None,
            },
            end: EdgeCandidates {
                topic_candidate_sec: Some(20.3),
                topic_delta_sec: Some(0.3),
                scene_candidate_sec: Some(18.6),
                scene_delta_sec: Some(-1.4),
            },
            start_delta_range_sec: START_DELTA_RANGE,
            end_delta_range_sec: END_DELTA_RANGE,
        };
        let json = serde_json::to_value(&context).unwrap();
        assert_eq!(json["snapped_start"], 10.0);
        assert!(json["start"]["scene_candidate_sec"].is_null());
    }
}
