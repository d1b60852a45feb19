//! Remote inference gateway.
//!
//! The pipeline talks to a text-generation service through one narrow
//! capability, [`TextGenerationClient`]. Parsing and schema checks stay with
//! the callers (risk scorer, summary composer) so the client itself is
//! reusable and the parsing contract is testable without a network.
//!
//! Both callers share the same control flow: one remote attempt, no retry,
//! and a deterministic local result on any failure. That flow lives in
//! [`remote_or_fallback`].

pub mod gemini;

use crate::config::InferenceConfig;
use crate::logging::{self, Component};
use crate::model::{Composed, InferenceError, Provenance};

pub use gemini::GeminiClient;

/// Soft advisory shown to the user whenever a local estimate replaces the
/// remote answer.
pub const FALLBACK_ADVISORY: &str = "AI assistant temporarily unavailable — showing local estimate";

/// Capability to turn a prompt into generated text.
///
/// Implementations make a single attempt and report every failure as an
/// [`InferenceError`]; they never retry.
pub trait TextGenerationClient {
    fn generate(&self, prompt: &str, temperature: f32) -> Result<String, InferenceError>;
}

impl<T: TextGenerationClient + ?Sized> TextGenerationClient for &T {
    fn generate(&self, prompt: &str, temperature: f32) -> Result<String, InferenceError> {
        (**self).generate(prompt, temperature)
    }
}

impl<T: TextGenerationClient + ?Sized> TextGenerationClient for Box<T> {
    fn generate(&self, prompt: &str, temperature: f32) -> Result<String, InferenceError> {
        (**self).generate(prompt, temperature)
    }
}

/// Client used when inference is switched off or no API key is configured.
/// Every call fails immediately, so callers always take the local path.
#[derive(Debug, Clone)]
pub struct DisabledClient {
    reason: String,
}

impl DisabledClient {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl TextGenerationClient for DisabledClient {
    fn generate(&self, _prompt: &str, _temperature: f32) -> Result<String, InferenceError> {
        Err(InferenceError::Disabled(self.reason.clone()))
    }
}

/// Builds the client the pipeline should use for this configuration.
///
/// Inference switched off, a missing API key, or a client that cannot be
/// constructed all yield a [`DisabledClient`]; the pipeline then runs on
/// local fallbacks only.
pub fn client_from_config(cfg: &InferenceConfig) -> Box<dyn TextGenerationClient> {
    if !cfg.enabled {
        logging::info(Component::Gateway, None, "remote inference disabled by configuration");
        return Box::new(DisabledClient::new("disabled by configuration"));
    }
    match GeminiClient::new(cfg) {
        Ok(client) => {
            logging::info(
                Component::Gateway,
                None,
                &format!("remote inference via {}", client.generate_url()),
            );
            Box::new(client)
        }
        Err(err) => {
            logging::warn(
                Component::Gateway,
                None,
                &format!("remote inference unavailable, using local estimates: {}", err),
            );
            Box::new(DisabledClient::new(err.to_string()))
        }
    }
}

/// Removes surrounding triple-backtick fences, with an optional `json` tag,
/// from a model reply. Unfenced text is returned trimmed.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(body) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = body
        .strip_prefix("json")
        .or_else(|| body.strip_prefix("JSON"))
        .unwrap_or(body);
    let body = body.strip_suffix("```").unwrap_or(body);
    body.trim()
}

/// Tries the remote service once, parses the reply with `parse`, and falls
/// back to `fallback` on any failure along the way.
pub fn remote_or_fallback<C, T, P, F>(
    client: &C,
    component: Component,
    prompt: &str,
    temperature: f32,
    parse: P,
    fallback: F,
) -> Composed<T>
where
    C: TextGenerationClient + ?Sized,
    P: FnOnce(&str) -> Result<T, InferenceError>,
    F: FnOnce() -> T,
{
    let attempt = client
        .generate(prompt, temperature)
        .and_then(|text| parse(&text));

    match attempt {
        Ok(output) => Composed {
            output,
            provenance: Provenance::Remote,
            advisory: None,
        },
        Err(err) => {
            logging::log_inference_failure(component, None, "remote inference", &err);
            Composed {
                output: fallback(),
                provenance: Provenance::Fallback,
                advisory: Some(FALLBACK_ADVISORY.to_string()),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
