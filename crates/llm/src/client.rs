//! Messages-API client
//!
//! One user turn of text plus base64 JPEG image blocks, a system prompt, and
//! temperature 0. The reply text is scanned for the first JSON value, with
//! markdown fences tolerated.

use std::time::Duration;

use base64::Engine;
use serde::{Deserialize, Serialize};

use highlight_core::RetryPolicy;

use crate::LlmError;

/// Configuration for the Messages-API client
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// API key (from ANTHROPIC_API_KEY or direct)
    pub api_key: String,
    pub model: String,
    pub endpoint: String,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: std::env::var("ANTHROPIC_API_KEY").unwrap_or_default(),
            model: "claude-3-7-sonnet-20250219".to_string(),
            endpoint: "https://api.anthropic.com".to_string(),
            timeout: Duration::from_secs(300),
            retry: RetryPolicy::default(),
        }
    }
}

impl LlmConfig {
    pub fn from_settings(settings: &highlight_config::LlmSettings) -> Self {
        Self {
            api_key: settings.api_key.clone(),
            model: settings.model.clone(),
            endpoint: settings.endpoint.clone(),
            timeout: Duration::from_secs(settings.timeout_secs),
            retry: RetryPolicy {
                max_attempts: settings.max_attempts,
                ..RetryPolicy::default()
            },
        }
    }
}

/// A JPEG image attached to the user turn.
#[derive(Debug, Clone)]
pub struct ImageBlock {
    pub jpeg: Vec<u8>,
}

/// Thin Messages-API wrapper shared by the captioner, grouper and refiner.
#[derive(Clone)]
pub struct LlmClient {
    config: LlmConfig,
    client: reqwest::Client,
}

impl LlmClient {
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        if config.api_key.is_empty() {
            return Err(LlmError::Configuration(
                "ANTHROPIC_API_KEY not set. Set it via environment or config.".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Network(e.to_string()))?;

        Ok(Self { config, client })
    }

    /// Invoke once with retries and parse the reply text as JSON.
    pub async fn invoke_json(
        &self,
        system_prompt: &str,
        queries: &[String],
        images: &[ImageBlock],
        max_tokens: usize,
    ) -> Result<serde_json::Value, LlmError> {
        let text = self
            .config
            .retry
            .run("llm", || {
                self.invoke_once(system_prompt, queries, images, max_tokens)
            })
            .await?;
        extract_json(&text)
    }

    async fn invoke_once(
        &self,
        system_prompt: &str,
        queries: &[String],
        images: &[ImageBlock],
        max_tokens: usize,
    ) -> Result<String, LlmError> {
        let mut content: Vec<ContentBlock> = queries
            .iter()
            .map(|q| ContentBlock::Text { text: q.clone() })
            .collect();
        for image in images {
            content.push(ContentBlock::Image {
                source: ImageSource {
                    source_type: "base64".to_string(),
                    media_type: "image/jpeg".to_string(),
                    data: base64::engine::general_purpose::STANDARD.encode(&image.jpeg),
                },
            });
        }

        let request = MessagesRequest {
            model: self.config.model.clone(),
            max_tokens,
            messages: vec![Message {
                role: "user".to_string(),
                content,
            }],
            system: Some(system_prompt.to_string()),
            temperature: Some(0.0),
        };

        let response = self
            .client
            .post(format!("{}/v1/messages", self.config.endpoint))
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(LlmError::Api(format!("HTTP {status}: {error_text}")));
        }

        let response: MessagesResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        let mut text = String::new();
        for block in response.content {
            if let ResponseBlock::Text { text: t } = block {
                text.push_str(&t);
            }
        }
        Ok(text)
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }
}

/// Extract the first JSON object or array embedded in a model reply.
///
/// Tolerates ```json fences and leading prose; rejects replies with no JSON.
pub fn extract_json(text: &str) -> Result<serde_json::Value, LlmError> {
    let cleaned = text.trim();
    let cleaned = cleaned
        .strip_prefix("```json")
        .or_else(|| cleaned.strip_prefix("```"))
        .unwrap_or(cleaned);
    let cleaned = cleaned.strip_suffix("```").unwrap_or(cleaned).trim();

    let start = cleaned
        .char_indices()
        .find(|(_, c)| *c == '{' || *c == '[')
        .map(|(i, _)| i)
        .ok_or_else(|| LlmError::InvalidResponse("no JSON value in reply".to_string()))?;

    let mut deserializer = serde_json::Deserializer::from_str(&cleaned[start..]);
    serde_json::Value::deserialize(&mut deserializer)
        .map_err(|e| LlmError::InvalidResponse(format!("malformed JSON in reply: {e}")))
}

// =============================================================================
// Messages API types
// =============================================================================

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: usize,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: Vec<ContentBlock>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text { text: String },
    Image { source: ImageSource },
}

#[derive(Debug, Serialize)]
struct ImageSource {
    #[serde(rename = "type")]
    source_type: String,
    media_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ResponseBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponseBlock {
    Text { text: String },
    #[serde(other)]
    Other,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_plain_json() {
        let value = extract_json(r#"{"caption": "goal", "highlight_score": 0.9}"#).unwrap();
        assert_eq!(value["highlight_score"], 0.9);
    }

    #[test]
    fn test_extract_fenced_json() {
        let value = extract_json("```json\n{\"groups\": []}\n```").unwrap();
        assert!(value["groups"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_extract_json_with_prose_prefix() {
        let value = extract_json("Here is the result: {\"a\": 1} trailing").unwrap();
        assert_eq!(value["a"], 1);
    }

    #[test]
    fn test_extract_json_array() {
        let value = extract_json("[1, 2, 3]").unwrap();
        assert_eq!(value.as_array().unwrap().len(), 3);
    }

    #[test]
    fn test_no_json_is_error() {
        assert!(extract_json("no structured output here").is_err());
    }

    #[test]
    fn test_missing_api_key_is_configuration_error() {
        let config = LlmConfig {
            api_key: String::new(),
            ..LlmConfig::default()
        };
        assert!(matches!(
            LlmClient::new(config),
            Err(LlmError::Configuration(_))
        ));
    }

    #[test]
    fn test_request_serialization() {
        let request = MessagesRequest {
            model: "claude-3-7-sonnet-20250219".to_string(),
            max_tokens: 500,
            messages: vec![Message {
                role: "user".to_string(),
                content: vec![ContentBlock::Text {
                    text: "Transcript".to_string(),
                }],
            }],
            system: Some("You are an expert video editor".to_string()),
            temperature: Some(0.0),
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("claude-3-7-sonnet"));
        assert!(json.contains("\"temperature\":0.0"));
        assert!(json.contains("\"type\":\"text\""));
    }

    #[test]
    fn test_response_parsing_ignores_unknown_blocks() {
        let json = r#"{"content":[{"type":"text","text":"{\"x\":1}"},{"type":"tool_use"}]}"#;
        let response: MessagesResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.content.len(), 2);
    }
}
