//! Collaborator seams (reference lookups, content repository) and the
//! in-memory store that implements all of them.
//!
//! The store owns:
//!   - levels, topics and lessons (reference data; read-only for the pipeline)
//!   - persisted content, keyed by (lesson id, kind)
//!
//! `save` is all-or-nothing: the whole batch is checked before the single write
//! lock is taken, and a batch replaces whatever the lesson held for that kind.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::domain::{ContentKind, ContentRecord, LessonRef, Level, NewContentRecord, Topic};
use crate::error::PersistenceError;

#[async_trait]
pub trait LevelLookup: Send + Sync {
  async fn level_by_id(&self, id: &str) -> Result<Option<Level>, PersistenceError>;
}

#[async_trait]
pub trait TopicLookup: Send + Sync {
  async fn topic_by_id(&self, id: &str) -> Result<Option<Topic>, PersistenceError>;
}

#[async_trait]
pub trait LessonLookup: Send + Sync {
  async fn lesson_by_id(&self, lesson_id: &str) -> Result<Option<LessonRef>, PersistenceError>;
}

/// Durable home of generated content. Assigns `id`/`created_at`.
/// One `save` call must persist every record or none of them.
#[async_trait]
pub trait LessonContentRepository: Send + Sync {
  async fn save(&self, kind: ContentKind, records: Vec<NewContentRecord>) -> Result<Vec<ContentRecord>, PersistenceError>;
}

pub struct InMemoryStore {
  levels: RwLock<HashMap<String, Level>>,
  topics: RwLock<HashMap<String, Topic>>,
  lessons: RwLock<HashMap<String, LessonRef>>,
  content: RwLock<HashMap<(String, ContentKind), Vec<ContentRecord>>>,
}

impl InMemoryStore {
  /// Build from reference data. Lessons pointing at unknown levels/topics are
  /// kept (the lookups will report NotFound when they are used) but logged.
  pub fn with_reference_data(
    levels: impl IntoIterator<Item = Level>,
    topics: impl IntoIterator<Item = Topic>,
    lessons: impl IntoIterator<Item = (String, LessonRef)>,
  ) -> Self {
    let levels: HashMap<_, _> = levels.into_iter().map(|l| (l.id.clone(), l)).collect();
    let topics: HashMap<_, _> = topics.into_iter().map(|t| (t.id.clone(), t)).collect();
    let lessons: HashMap<_, _> = lessons.into_iter().collect();
    for (id, l) in &lessons {
      if !levels.contains_key(&l.level_id) || !topics.contains_key(&l.topic_id) {
        warn!(target: "content", lesson_id = %id, level_id = %l.level_id, topic_id = %l.topic_id, "Lesson references unknown level or topic");
      }
    }
    info!(target: "content", levels = levels.len(), topics = topics.len(), lessons = lessons.len(), "Reference data loaded");
    Self {
      levels: RwLock::new(levels),
      topics: RwLock::new(topics),
      lessons: RwLock::new(lessons),
      content: RwLock::new(HashMap::new()),
    }
  }

  /// Persisted content of one kind for a lesson, in generation order.
  #[instrument(level = "debug", skip(self), fields(%lesson_id, %kind))]
  pub async fn content_for(&self, lesson_id: &str, kind: ContentKind) -> Vec<ContentRecord> {
    self.content
      .read()
      .await
      .get(&(lesson_id.to_string(), kind))
      .cloned()
      .unwrap_or_default()
  }

  pub async fn has_lesson(&self, lesson_id: &str) -> bool {
    self.lessons.read().await.contains_key(lesson_id)
  }
}

#[async_trait]
impl LevelLookup for InMemoryStore {
  async fn level_by_id(&self, id: &str) -> Result<Option<Level>, PersistenceError> {
    Ok(self.levels.read().await.get(id).cloned())
  }
}

#[async_trait]
impl TopicLookup for InMemoryStore {
  async fn topic_by_id(&self, id: &str) -> Result<Option<Topic>, PersistenceError> {
    Ok(self.topics.read().await.get(id).cloned())
  }
}

#[async_trait]
impl LessonLookup for InMemoryStore {
  async fn lesson_by_id(&self, lesson_id: &str) -> Result<Option<LessonRef>, PersistenceError> {
    Ok(self.lessons.read().await.get(lesson_id).cloned())
  }
}

#[async_trait]
impl LessonContentRepository for InMemoryStore {
  #[instrument(level = "info", skip(self, records), fields(%kind, count = records.len()))]
  async fn save(&self, kind: ContentKind, records: Vec<NewContentRecord>) -> Result<Vec<ContentRecord>, PersistenceError> {
    let lesson_id = match records.first() {
      Some(r) => r.lesson_id.clone(),
      None => return Err(PersistenceError("refusing to save an empty batch".into())),
    };
    if let Some(bad) = records.iter().find(|r| r.lesson_id != lesson_id) {
      return Err(PersistenceError(format!("batch mixes lessons `{}` and `{}`", lesson_id, bad.lesson_id)));
    }
    if let Some(bad) = records.iter().find(|r| r.item.kind() != kind) {
      return Err(PersistenceError(format!("batch for {} contains a {} item", kind, bad.item.kind())));
    }
    if !self.has_lesson(&lesson_id).await {
      return Err(PersistenceError(format!("lesson `{}` does not exist", lesson_id)));
    }

    let now = Utc::now();
    let persisted: Vec<ContentRecord> = records
      .into_iter()
      .map(|r| ContentRecord {
        id: Uuid::new_v4().to_string(),
        lesson_id: r.lesson_id,
        created_at: Some(now),
        item: r.item,
      })
      .collect();

    let replaced = self
      .content
      .write()
      .await
      .insert((lesson_id.clone(), kind), persisted.clone())
      .map(|old| old.len())
      .unwrap_or(0);
    info!(target: "content", %lesson_id, %kind, saved = persisted.len(), replaced, "Lesson content saved");
    Ok(persisted)
  }
}
