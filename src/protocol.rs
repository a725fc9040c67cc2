//! Public protocol structs for the HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use serde::{Deserialize, Serialize};

use crate::domain::{ContentKind, ContentRecord};

/// Body of `POST /api/v1/content/:kind/generate`.
#[derive(Debug, Deserialize)]
pub struct GenerateIn {
  #[serde(rename = "levelId")]
  pub level_id: String,
  #[serde(rename = "topicId")]
  pub topic_id: String,
  #[serde(rename = "lessonId")]
  pub lesson_id: String,
}

/// Body of `POST /api/v1/content/:kind/preview`. No lesson: nothing is stored.
#[derive(Debug, Deserialize)]
pub struct PreviewIn {
  #[serde(rename = "levelId")]
  pub level_id: String,
  #[serde(rename = "topicId")]
  pub topic_id: String,
}

#[derive(Debug, Serialize)]
pub struct ContentOut {
  pub kind: ContentKind,
  /// "persist" or "preview".
  pub mode: &'static str,
  pub items: Vec<ContentRecord>,
}

#[derive(Debug, Serialize)]
pub struct ErrorOut {
  pub error: &'static str,
  pub message: String,
}

#[derive(Serialize)]
pub struct HealthOut {
  pub ok: bool,
  pub generation: bool,
}
