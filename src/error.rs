//! Error taxonomy for the generation pipeline.
//!
//! Lower layers raise their own typed error; the orchestrator wraps whatever
//! escaped a run in `ContentError`, which names the content kind and the stage
//! the run died in. Nothing here is ever downgraded to a default value.

use std::time::Duration;

use thiserror::Error;

use crate::domain::ContentKind;

/// Bad or missing generation settings. Raised at construction, never retried.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigurationError {
  #[error("generation API key is not configured")]
  MissingApiKey,

  #[error("generation API key is invalid: {0}")]
  InvalidApiKey(&'static str),

  #[error("invalid configuration for `{field}`: {reason}")]
  Invalid { field: &'static str, reason: String },
}

/// Provider/network failures. Retried by the client until exhausted.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GenerationError {
  #[error("provider returned an empty response")]
  EmptyResponse,

  #[error("provider call failed: {0}")]
  Provider(String),

  #[error("generation exhausted after {attempts} attempts: {last_cause}")]
  Exhausted { attempts: u32, last_cause: Box<GenerationError> },

  #[error("generation timed out after {after:?}")]
  Timeout { after: Duration },

  #[error("generation was cancelled")]
  Cancelled,
}

impl GenerationError {
  pub fn code(&self) -> &'static str {
    match self {
      GenerationError::EmptyResponse => "EMPTY_RESPONSE",
      GenerationError::Provider(_) => "PROVIDER",
      GenerationError::Exhausted { .. } => "EXHAUSTED",
      GenerationError::Timeout { .. } => "TIMEOUT",
      GenerationError::Cancelled => "CANCELLED",
    }
  }

  /// Whether another attempt may fix this failure.
  pub fn is_retryable(&self) -> bool {
    matches!(self, GenerationError::EmptyResponse | GenerationError::Provider(_))
  }
}

/// Provider output that broke the structural contract.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
  #[error("provider output is not valid JSON: {0}")]
  MalformedJson(String),

  #[error("provider output violates the {kind} schema: {}", .details.join("; "))]
  SchemaViolation { kind: ContentKind, details: Vec<String> },
}

impl ValidationError {
  pub fn code(&self) -> &'static str {
    match self {
      ValidationError::MalformedJson(_) => "MALFORMED_JSON",
      ValidationError::SchemaViolation { .. } => "SCHEMA_VIOLATION",
    }
  }
}

/// Which reference entity a lookup missed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
  Level,
  Topic,
  Lesson,
}

impl std::fmt::Display for Entity {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(match self {
      Entity::Level => "level",
      Entity::Topic => "topic",
      Entity::Lesson => "lesson",
    })
  }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DomainError {
  #[error("{entity} `{id}` not found")]
  NotFound { entity: Entity, id: String },

  #[error("lesson `{lesson_id}` belongs to level `{level_id}` and topic `{topic_id}`")]
  LessonMismatch { lesson_id: String, level_id: String, topic_id: String },
}

impl DomainError {
  pub fn not_found(entity: Entity, id: impl Into<String>) -> Self {
    DomainError::NotFound { entity, id: id.into() }
  }
}

/// Repository failure. Fatal for the call; the orchestrator never retries it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("persistence failed: {0}")]
pub struct PersistenceError(pub String);

/// Everything a single pipeline run can fail with.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PipelineError {
  #[error(transparent)]
  Generation(#[from] GenerationError),

  #[error(transparent)]
  Validation(#[from] ValidationError),

  #[error(transparent)]
  Domain(#[from] DomainError),

  #[error(transparent)]
  Persistence(#[from] PersistenceError),
}

impl PipelineError {
  /// Stable machine code for the failure, used by the HTTP layer and in logs.
  pub fn code(&self) -> &'static str {
    match self {
      PipelineError::Generation(e) => e.code(),
      PipelineError::Validation(e) => e.code(),
      PipelineError::Domain(DomainError::NotFound { .. }) => "NOT_FOUND",
      PipelineError::Domain(DomainError::LessonMismatch { .. }) => "LESSON_MISMATCH",
      PipelineError::Persistence(_) => "PERSISTENCE",
    }
  }
}

/// Stages of one generation call. A failed call records where it stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
  FetchingContext,
  Prompting,
  Generating,
  Validating,
  Persisting,
}

impl std::fmt::Display for Stage {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(match self {
      Stage::FetchingContext => "fetching_context",
      Stage::Prompting => "prompting",
      Stage::Generating => "generating",
      Stage::Validating => "validating",
      Stage::Persisting => "persisting",
    })
  }
}

/// Terminal FAILED state of a generation call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("failed generating {kind}: {source}")]
pub struct ContentError {
  pub kind: ContentKind,
  pub stage: Stage,
  #[source]
  pub source: PipelineError,
}

impl ContentError {
  pub fn code(&self) -> &'static str {
    self.source.code()
  }
}
