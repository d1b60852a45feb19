//! HTTP client for the Gemini `generateContent` endpoint.
//!
//! API Documentation: https://ai.google.dev/api/generate-content
//!
//! One POST per call with the prompt as a single text part and the sampling
//! temperature in `generationConfig`. The reply envelope nests the generated
//! text under `candidates[0].content.parts[*].text`.

use std::time::Duration;

use serde_json::{Value, json};

use crate::config::InferenceConfig;
use crate::model::InferenceError;

use super::TextGenerationClient;

pub struct GeminiClient {
    http: reqwest::blocking::Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl GeminiClient {
    /// Builds a client from configuration.
    ///
    /// Returns `InferenceError::Disabled` when no API key was resolved, so
    /// callers can substitute a [`DisabledClient`](super::DisabledClient).
    pub fn new(cfg: &InferenceConfig) -> Result<Self, InferenceError> {
        let api_key = cfg
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| InferenceError::Disabled(format!("{} is not set", cfg.api_key_env)))?;

        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            endpoint: cfg.endpoint.trim_end_matches('/').to_string(),
            model: cfg.model.clone(),
            api_key,
        })
    }

    pub fn generate_url(&self) -> String {
        build_generate_url(&self.endpoint, &self.model)
    }
}

impl TextGenerationClient for GeminiClient {
    fn generate(&self, prompt: &str, temperature: f32) -> Result<String, InferenceError> {
        let response = self
            .http
            .post(self.generate_url())
            .header("x-goog-api-key", &self.api_key)
            .header("Accept", "application/json")
            .json(&build_request_body(prompt, temperature))
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(InferenceError::HttpStatus(status.as_u16()));
        }

        let envelope: Value = response.json()?;
        extract_text(&envelope)
    }
}

// ============================================================================
// Request / Response Helpers
// ============================================================================

pub fn build_generate_url(endpoint: &str, model: &str) -> String {
    format!(
        "{}/models/{}:generateContent",
        endpoint.trim_end_matches('/'),
        model
    )
}

pub fn build_request_body(prompt: &str, temperature: f32) -> Value {
    json!({
        "contents": [
            { "parts": [ { "text": prompt } ] }
        ],
        "generationConfig": { "temperature": temperature }
    })
}

/// Pulls the generated text out of a `generateContent` reply.
///
/// Multiple text parts are concatenated. A reply without candidates reports
/// the block reason when the service gave one.
pub fn extract_text(envelope: &Value) -> Result<String, InferenceError> {
    let Some(candidate) = envelope
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|c| c.first())
    else {
        return match envelope
            .pointer("/promptFeedback/blockReason")
            .and_then(Value::as_str)
        {
            Some(reason) => Err(InferenceError::Schema(format!("prompt blocked: {}", reason))),
            None => Err(InferenceError::EmptyResponse),
        };
    };

    let text: String = candidate
        .pointer("/content/parts")
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p.get("text").and_then(Value::as_str))
                .collect()
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(InferenceError::EmptyResponse);
    }
    Ok(text)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_url_trims_trailing_slash() {
        assert_eq!(
            build_generate_url("https://generativelanguage.googleapis.com/v1beta/", "gemini-1.5-flash"),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:generateContent"
        );
    }

    #[test]
    fn test_request_body_carries_prompt_and_temperature() {
        let body = build_request_body("classify this", 0.2);
        assert_eq!(body["contents"][0]["parts"][0]["text"], "classify this");
        let t = body["generationConfig"]["temperature"].as_f64().unwrap();
        assert!((t - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_extract_text_joins_parts() {
        let envelope = json!({
            "candidates": [{
                "content": {"parts": [{"text": "**Stay alert**\n"}, {"text": "- Move valuables up"}]},
                "finishReason": "STOP"
            }]
        });
        assert_eq!(
            extract_text(&envelope).unwrap(),
            "**Stay alert**\n- Move valuables up"
        );
    }

    #[test]
    fn test_extract_text_empty_candidates() {
        assert_eq!(
            extract_text(&json!({"candidates": []})),
            Err(InferenceError::EmptyResponse)
        );
        assert_eq!(
            extract_text(&json!({"candidates": [{"content": {"parts": [{"text": "  "}]}}]})),
            Err(InferenceError::EmptyResponse)
        );
    }

    #[test]
    fn test_extract_text_reports_block_reason() {
        let result = extract_text(&json!({"promptFeedback": {"blockReason": "SAFETY"}}));
        assert_eq!(
            result,
            Err(InferenceError::Schema("prompt blocked: SAFETY".into()))
        );
    }

    #[test]
    fn test_missing_api_key_is_disabled() {
        let cfg = InferenceConfig {
            api_key: None,
            ..InferenceConfig::default()
        };
        assert!(matches!(
            GeminiClient::new(&cfg),
            Err(InferenceError::Disabled(_))
        ));
    }
}
