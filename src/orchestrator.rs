//! Lesson-content generation use-cases.
//!
//! One flow serves every kind and both modes:
//!
//!   fetch level + topic (concurrently, fail-fast)
//!     -> build prompt -> generate (retrying) -> validate
//!     -> Persist(lesson): one repository `save` for the whole batch
//!     -> Preview: return transient items, no repository call at all
//!
//! Any failure ends the call with a `ContentError` naming the kind and the stage
//! it stopped in. There is no resume; callers retry the whole call.

use std::sync::Arc;

use tracing::{debug, error, info, instrument};

use crate::client::{CallContext, GenerationClient};
use crate::domain::{ContentKind, ContentRecord, GenerationMode, GenerationRequest, Level, NewContentRecord, Topic};
use crate::error::{ContentError, DomainError, Entity, PipelineError, Stage};
use crate::prompt::{build_prompt, expected_count};
use crate::store::{LessonContentRepository, LessonLookup, LevelLookup, TopicLookup};
use crate::util::trunc_for_log;
use crate::validator;

#[derive(Clone)]
pub struct ContentOrchestrator {
  client: GenerationClient,
  levels: Arc<dyn LevelLookup>,
  topics: Arc<dyn TopicLookup>,
  lessons: Arc<dyn LessonLookup>,
  repository: Arc<dyn LessonContentRepository>,
}

impl ContentOrchestrator {
  pub fn new(
    client: GenerationClient,
    levels: Arc<dyn LevelLookup>,
    topics: Arc<dyn TopicLookup>,
    lessons: Arc<dyn LessonLookup>,
    repository: Arc<dyn LessonContentRepository>,
  ) -> Self {
    Self { client, levels, topics, lessons, repository }
  }

  // --- Use-cases ---
  // The HTTP layer goes through `generate`/`preview` with a parsed kind; these
  // are the per-kind entry points for in-process callers.

  #[allow(dead_code)]
  pub async fn generate_vocabulary(&self, level_id: &str, topic_id: &str, lesson_id: &str) -> Result<Vec<ContentRecord>, ContentError> {
    self.generate(ContentKind::Vocabulary, persist(level_id, topic_id, lesson_id)).await
  }

  #[allow(dead_code)]
  pub async fn generate_grammar(&self, level_id: &str, topic_id: &str, lesson_id: &str) -> Result<Vec<ContentRecord>, ContentError> {
    self.generate(ContentKind::Grammar, persist(level_id, topic_id, lesson_id)).await
  }

  #[allow(dead_code)]
  pub async fn generate_exercises(&self, level_id: &str, topic_id: &str, lesson_id: &str) -> Result<Vec<ContentRecord>, ContentError> {
    self.generate(ContentKind::Exercises, persist(level_id, topic_id, lesson_id)).await
  }

  #[allow(dead_code)]
  pub async fn preview_vocabulary(&self, level_id: &str, topic_id: &str) -> Result<Vec<ContentRecord>, ContentError> {
    self.preview(ContentKind::Vocabulary, level_id, topic_id).await
  }

  #[allow(dead_code)]
  pub async fn preview_grammar(&self, level_id: &str, topic_id: &str) -> Result<Vec<ContentRecord>, ContentError> {
    self.preview(ContentKind::Grammar, level_id, topic_id).await
  }

  #[allow(dead_code)]
  pub async fn preview_exercises(&self, level_id: &str, topic_id: &str) -> Result<Vec<ContentRecord>, ContentError> {
    self.preview(ContentKind::Exercises, level_id, topic_id).await
  }

  /// The generic flow with the lesson id left out.
  pub async fn preview(&self, kind: ContentKind, level_id: &str, topic_id: &str) -> Result<Vec<ContentRecord>, ContentError> {
    let request = GenerationRequest { level_id: level_id.into(), topic_id: topic_id.into(), mode: GenerationMode::Preview };
    self.generate(kind, request).await
  }

  /// Generate again for an existing lesson. Whether the new batch replaces or
  /// extends the old one is up to the repository.
  #[instrument(level = "info", skip(self), fields(%kind, %lesson_id))]
  pub async fn regenerate(&self, kind: ContentKind, lesson_id: &str) -> Result<Vec<ContentRecord>, ContentError> {
    let lesson = self
      .lessons
      .lesson_by_id(lesson_id)
      .await
      .map_err(PipelineError::from)
      .and_then(|l| l.ok_or_else(|| DomainError::not_found(Entity::Lesson, lesson_id).into()))
      .map_err(|source| fail(kind, Stage::FetchingContext, source))?;
    self.generate(kind, persist(&lesson.level_id, &lesson.topic_id, lesson_id)).await
  }

  /// Run one request under the configured per-call timeout.
  pub async fn generate(&self, kind: ContentKind, request: GenerationRequest) -> Result<Vec<ContentRecord>, ContentError> {
    let ctx = self.client.call_context();
    self.generate_with(kind, request, &ctx).await
  }

  #[instrument(
    level = "info",
    skip(self, request, ctx),
    fields(%kind, level_id = %request.level_id, topic_id = %request.topic_id, mode = request.mode.as_str())
  )]
  pub async fn generate_with(
    &self,
    kind: ContentKind,
    request: GenerationRequest,
    ctx: &CallContext,
  ) -> Result<Vec<ContentRecord>, ContentError> {
    let result = self.run(kind, request, ctx).await;
    match &result {
      Ok(items) => info!(target: "content", %kind, count = items.len(), "Content generation done"),
      Err(e) => error!(target: "content", %kind, stage = %e.stage, code = e.code(), error = %e.source, "Content generation failed"),
    }
    result
  }

  async fn run(&self, kind: ContentKind, request: GenerationRequest, ctx: &CallContext) -> Result<Vec<ContentRecord>, ContentError> {
    let GenerationRequest { level_id, topic_id, mode } = request;

    debug!(target: "content", stage = %Stage::FetchingContext, "Pipeline stage");
    let (level, topic) = self
      .fetch_context(&level_id, &topic_id, &mode)
      .await
      .map_err(|e| fail(kind, Stage::FetchingContext, e))?;

    debug!(target: "content", stage = %Stage::Prompting, level = %level.title, topic = %topic.title, "Pipeline stage");
    let prompt = build_prompt(kind, &level, &topic);

    debug!(target: "content", stage = %Stage::Generating, prompt_len = prompt.len(), "Pipeline stage");
    let raw = self
      .client
      .generate_text(&prompt, ctx)
      .await
      .map_err(|e| fail(kind, Stage::Generating, e.into()))?;

    debug!(target: "content", stage = %Stage::Validating, raw_preview = %trunc_for_log(&raw, 120), "Pipeline stage");
    let items = validator::validate(kind, &raw).map_err(|e| fail(kind, Stage::Validating, e.into()))?;
    if items.len() != expected_count(kind) {
      debug!(target: "content", %kind, got = items.len(), asked = expected_count(kind), "Provider returned a different item count");
    }

    match mode {
      GenerationMode::Preview => Ok(items.into_iter().map(ContentRecord::preview).collect()),
      GenerationMode::Persist(lesson_id) => {
        debug!(target: "content", stage = %Stage::Persisting, %lesson_id, count = items.len(), "Pipeline stage");
        let records = items
          .into_iter()
          .map(|item| NewContentRecord { lesson_id: lesson_id.clone(), item })
          .collect();
        self.repository
          .save(kind, records)
          .await
          .map_err(|e| fail(kind, Stage::Persisting, e.into()))
      }
    }
  }

  /// All lookups run concurrently; the first miss or failure wins. A persist
  /// target must exist and be built on the requested level and topic.
  async fn fetch_context(&self, level_id: &str, topic_id: &str, mode: &GenerationMode) -> Result<(Level, Topic), PipelineError> {
    let target = async {
      match mode {
        GenerationMode::Persist(lesson_id) => self.check_lesson(lesson_id, level_id, topic_id).await,
        GenerationMode::Preview => Ok(()),
      }
    };
    let (level, topic, ()) = tokio::try_join!(self.fetch_level(level_id), self.fetch_topic(topic_id), target)?;
    Ok((level, topic))
  }

  async fn check_lesson(&self, lesson_id: &str, level_id: &str, topic_id: &str) -> Result<(), PipelineError> {
    let lesson = self
      .lessons
      .lesson_by_id(lesson_id)
      .await?
      .ok_or_else(|| DomainError::not_found(Entity::Lesson, lesson_id))?;
    if lesson.level_id != level_id || lesson.topic_id != topic_id {
      return Err(
        DomainError::LessonMismatch { lesson_id: lesson_id.into(), level_id: lesson.level_id, topic_id: lesson.topic_id }.into(),
      );
    }
    Ok(())
  }

  async fn fetch_level(&self, id: &str) -> Result<Level, PipelineError> {
    self.levels
      .level_by_id(id)
      .await?
      .ok_or_else(|| DomainError::not_found(Entity::Level, id).into())
  }

  async fn fetch_topic(&self, id: &str) -> Result<Topic, PipelineError> {
    self.topics
      .topic_by_id(id)
      .await?
      .ok_or_else(|| DomainError::not_found(Entity::Topic, id).into())
  }
}

fn persist(level_id: &str, topic_id: &str, lesson_id: &str) -> GenerationRequest {
  GenerationRequest {
    level_id: level_id.into(),
    topic_id: topic_id.into(),
    mode: GenerationMode::Persist(lesson_id.into()),
  }
}

fn fail(kind: ContentKind, stage: Stage, source: PipelineError) -> ContentError {
  ContentError { kind, stage, source }
}
