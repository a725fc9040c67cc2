//! Minimal OpenAI adapter for the generation client.
//!
//! We only call chat.completions and request a strict JSON object.
//! Calls are instrumented and log model names, latencies, and response sizes (not contents).
//!
//! NOTE: We never log the API key. Retries live in `GenerationClient`, not here:
//! one `generate` call is exactly one HTTP request.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::client::{GenerationService, ProviderRequest};
use crate::config::{validate_api_key, GenerationSettings};
use crate::error::{ConfigurationError, GenerationError};
use crate::prompt::SYSTEM_PROMPT;

const HTTP_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub struct OpenAI {
  client: reqwest::Client,
  api_key: String,
  pub base_url: String,
}

impl std::fmt::Debug for OpenAI {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("OpenAI").field("base_url", &self.base_url).finish_non_exhaustive()
  }
}

impl OpenAI {
  /// Fails eagerly when the API key is absent or malformed.
  pub fn new(settings: &GenerationSettings) -> Result<Self, ConfigurationError> {
    let api_key = validate_api_key(settings.api_key.as_deref())?.to_string();
    let client = reqwest::Client::builder()
      .timeout(HTTP_TIMEOUT)
      .build()
      .map_err(|e| ConfigurationError::Invalid { field: "http_client", reason: e.to_string() })?;
    Ok(Self { client, api_key, base_url: settings.base_url.trim_end_matches('/').to_string() })
  }
}

#[async_trait]
impl GenerationService for OpenAI {
  #[instrument(level = "info", skip(self, req), fields(model = %req.model, prompt_len = req.prompt.len()))]
  async fn generate(&self, req: &ProviderRequest) -> Result<String, GenerationError> {
    let url = format!("{}/chat/completions", self.base_url);
    let body = ChatCompletionRequest {
      model: req.model.clone(),
      messages: vec![
        ChatMessageReq { role: "system".into(), content: SYSTEM_PROMPT.into() },
        ChatMessageReq { role: "user".into(), content: req.prompt.clone() },
      ],
      temperature: req.temperature,
      response_format: Some(ResponseFormat { r#type: "json_object".into() }),
      max_tokens: Some(req.max_tokens),
    };

    let start = Instant::now();
    let res = self.client.post(&url)
      .header(USER_AGENT, "lesson-content-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(&body).send().await.map_err(|e| GenerationError::Provider(e.to_string()))?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      let msg = extract_openai_error(&body).unwrap_or(body);
      return Err(GenerationError::Provider(format!("OpenAI HTTP {}: {}", status, msg)));
    }

    let body: ChatCompletionResponse = res.json().await.map_err(|e| GenerationError::Provider(e.to_string()))?;
    if let Some(usage) = &body.usage {
      info!(target: "provider", prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, "OpenAI usage");
    }
    let text = first_choice_text(body);
    debug!(target: "provider", elapsed = ?start.elapsed(), response_len = text.len(), "OpenAI response received");
    Ok(text)
  }
}

fn first_choice_text(body: ChatCompletionResponse) -> String {
  body.choices.into_iter().next()
    .and_then(|c| c.message.content)
    .unwrap_or_default()
    .trim()
    .to_string()
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessageReq>,
  temperature: f32,
  #[serde(skip_serializing_if = "Option::is_none")]
  response_format: Option<ResponseFormat>,
  #[serde(skip_serializing_if = "Option::is_none")]
  max_tokens: Option<u32>,
}
#[derive(Serialize)]
struct ChatMessageReq { role: String, content: String }
#[derive(Serialize)]
struct ResponseFormat { #[serde(rename = "type")] r#type: String }

#[derive(Deserialize)]
struct ChatCompletionResponse {
  choices: Vec<ChatChoice>,
  #[serde(default)] usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice { message: ChatMessageResp }
#[derive(Deserialize)]
struct ChatMessageResp { content: Option<String> }
#[derive(Deserialize)]
struct Usage {
  #[serde(default)] prompt_tokens: Option<u32>,
  #[serde(default)] completion_tokens: Option<u32>,
  #[serde(default)] total_tokens: Option<u32>,
}

/// Try to extract a clean error message from OpenAI error body.
fn extract_openai_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  serde_json::from_str::<EWrap>(body).ok().map(|w| w.error.message)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn construction_requires_an_api_key() {
    let settings = GenerationSettings::default();
    assert_eq!(OpenAI::new(&settings).unwrap_err(), ConfigurationError::MissingApiKey);

    let settings = GenerationSettings { api_key: Some("sk-test".into()), base_url: "http://localhost:9/v1/".into(), ..Default::default() };
    let oa = OpenAI::new(&settings).unwrap();
    assert_eq!(oa.base_url, "http://localhost:9/v1");
    assert!(!format!("{oa:?}").contains("sk-test"));
  }

  #[test]
  fn request_body_asks_for_json_object() {
    let body = ChatCompletionRequest {
      model: "m".into(),
      messages: vec![ChatMessageReq { role: "user".into(), content: "p".into() }],
      temperature: 0.5,
      response_format: Some(ResponseFormat { r#type: "json_object".into() }),
      max_tokens: Some(100),
    };
    let v = serde_json::to_value(&body).unwrap();
    assert_eq!(v["response_format"]["type"], "json_object");
    assert_eq!(v["max_tokens"], 100);
  }

  #[test]
  fn extracts_first_choice_and_error_messages() {
    let body: ChatCompletionResponse =
      serde_json::from_str(r#"{"choices":[{"message":{"content":"  {\"a\":1} \n"}}]}"#).unwrap();
    assert_eq!(first_choice_text(body), "{\"a\":1}");

    let empty: ChatCompletionResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
    assert_eq!(first_choice_text(empty), "");

    assert_eq!(
      extract_openai_error(r#"{"error":{"message":"Rate limit reached"}}"#).as_deref(),
      Some("Rate limit reached")
    );
    assert_eq!(extract_openai_error("<html>"), None);
  }
}
