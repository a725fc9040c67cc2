//! HTTP endpoint handlers. These are thin wrappers that forward to the orchestrator.
//! Each handler is instrumented and logs parameters and basic result info.

use std::sync::Arc;

use axum::{
  extract::{Path, State},
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use tracing::{info, instrument, warn};

use crate::domain::{ContentKind, GenerationMode, GenerationRequest};
use crate::error::ContentError;
use crate::orchestrator::ContentOrchestrator;
use crate::protocol::*;
use crate::state::AppState;

/// JSON error reply: `{error: CODE, message}` with a matching status.
#[derive(Debug)]
pub struct ApiError {
  status: StatusCode,
  code: &'static str,
  message: String,
}

impl ApiError {
  fn bad_request(message: impl Into<String>) -> Self {
    Self { status: StatusCode::BAD_REQUEST, code: "BAD_REQUEST", message: message.into() }
  }
}

impl From<ContentError> for ApiError {
  fn from(e: ContentError) -> Self {
    let code = e.code();
    let status = match code {
      "NOT_FOUND" => StatusCode::NOT_FOUND,
      "LESSON_MISMATCH" => StatusCode::CONFLICT,
      "MALFORMED_JSON" | "SCHEMA_VIOLATION" => StatusCode::UNPROCESSABLE_ENTITY,
      "EXHAUSTED" | "EMPTY_RESPONSE" | "PROVIDER" => StatusCode::BAD_GATEWAY,
      "TIMEOUT" => StatusCode::GATEWAY_TIMEOUT,
      "CANCELLED" => StatusCode::SERVICE_UNAVAILABLE,
      _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    Self { status, code, message: e.to_string() }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    (self.status, Json(ErrorOut { error: self.code, message: self.message })).into_response()
  }
}

fn parse_kind(raw: &str) -> Result<ContentKind, ApiError> {
  ContentKind::parse(raw)
    .ok_or_else(|| ApiError::bad_request(format!("unknown content kind `{raw}` (expected vocabulary, grammar or exercises)")))
}

fn orchestrator(state: &AppState) -> Result<&ContentOrchestrator, ApiError> {
  state.orchestrator.as_ref().ok_or_else(|| ApiError {
    status: StatusCode::SERVICE_UNAVAILABLE,
    code: "GENERATION_DISABLED",
    message: "content generation is not configured (set OPENAI_API_KEY)".into(),
  })
}

#[instrument(level = "info", skip(state))]
pub async fn http_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(HealthOut { ok: true, generation: state.orchestrator.is_some() })
}

#[instrument(level = "info", skip(state, body), fields(level_id = %body.level_id, topic_id = %body.topic_id, lesson_id = %body.lesson_id))]
pub async fn http_post_generate(
  State(state): State<Arc<AppState>>,
  Path(kind): Path<String>,
  Json(body): Json<GenerateIn>,
) -> Result<Json<ContentOut>, ApiError> {
  let kind = parse_kind(&kind)?;
  if body.lesson_id.trim().is_empty() {
    return Err(ApiError::bad_request("lessonId must not be empty; use the preview endpoint for unsaved content"));
  }
  let orch = orchestrator(&state)?;
  let request = GenerationRequest {
    level_id: body.level_id,
    topic_id: body.topic_id,
    mode: GenerationMode::Persist(body.lesson_id),
  };
  let items = orch.generate(kind, request).await?;
  info!(target: "lesson_content_backend", %kind, count = items.len(), "HTTP content generated and saved");
  Ok(Json(ContentOut { kind, mode: "persist", items }))
}

#[instrument(level = "info", skip(state, body), fields(level_id = %body.level_id, topic_id = %body.topic_id))]
pub async fn http_post_preview(
  State(state): State<Arc<AppState>>,
  Path(kind): Path<String>,
  Json(body): Json<PreviewIn>,
) -> Result<Json<ContentOut>, ApiError> {
  let kind = parse_kind(&kind)?;
  let orch = orchestrator(&state)?;
  let items = orch.preview(kind, &body.level_id, &body.topic_id).await?;
  info!(target: "lesson_content_backend", %kind, count = items.len(), "HTTP content preview served");
  Ok(Json(ContentOut { kind, mode: "preview", items }))
}

#[instrument(level = "info", skip(state))]
pub async fn http_post_regenerate(
  State(state): State<Arc<AppState>>,
  Path((lesson_id, kind)): Path<(String, String)>,
) -> Result<Json<ContentOut>, ApiError> {
  let kind = parse_kind(&kind)?;
  let orch = orchestrator(&state)?;
  let items = orch.regenerate(kind, &lesson_id).await?;
  info!(target: "lesson_content_backend", %kind, %lesson_id, count = items.len(), "HTTP content regenerated");
  Ok(Json(ContentOut { kind, mode: "persist", items }))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_lesson_content(
  State(state): State<Arc<AppState>>,
  Path((lesson_id, kind)): Path<(String, String)>,
) -> Result<Json<ContentOut>, ApiError> {
  let kind = parse_kind(&kind)?;
  if !state.store.has_lesson(&lesson_id).await {
    warn!(target: "lesson_content_backend", %lesson_id, "Unknown lesson requested");
    return Err(ApiError { status: StatusCode::NOT_FOUND, code: "NOT_FOUND", message: format!("lesson `{lesson_id}` not found") });
  }
  let items = state.store.content_for(&lesson_id, kind).await;
  Ok(Json(ContentOut { kind, mode: "persist", items }))
}
