//! Domain models: reference entities, content kinds, generated items and the
//! persist/preview mode switch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Proficiency tier. Owned by an external collaborator; read-only here.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Level {
  pub id: String,
  pub title: String,
  #[serde(default)] pub description: String,
}

/// Subject-matter entity. Owned by an external collaborator; read-only here.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Topic {
  pub id: String,
  pub title: String,
  #[serde(default)] pub description: String,
}

/// The (level, topic) pair a lesson was built for. Used by regenerate.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LessonRef {
  #[serde(rename = "levelId")]
  pub level_id: String,
  #[serde(rename = "topicId")]
  pub topic_id: String,
}

/// Which of the three content families a run produces.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
  Vocabulary,
  Grammar,
  Exercises,
}

impl ContentKind {
  pub const ALL: [ContentKind; 3] = [ContentKind::Vocabulary, ContentKind::Grammar, ContentKind::Exercises];

  /// Top-level key of the provider's JSON object for this kind.
  pub fn as_str(self) -> &'static str {
    match self {
      ContentKind::Vocabulary => "vocabulary",
      ContentKind::Grammar => "grammar",
      ContentKind::Exercises => "exercises",
    }
  }

  pub fn parse(s: &str) -> Option<Self> {
    Self::ALL.into_iter().find(|k| k.as_str() == s)
  }
}

impl std::fmt::Display for ContentKind {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PartOfSpeech {
  Noun,
  Verb,
  Adjective,
  Adverb,
  Preposition,
  Other,
}

impl PartOfSpeech {
  pub const ALL: [PartOfSpeech; 6] = [
    PartOfSpeech::Noun,
    PartOfSpeech::Verb,
    PartOfSpeech::Adjective,
    PartOfSpeech::Adverb,
    PartOfSpeech::Preposition,
    PartOfSpeech::Other,
  ];

  pub fn as_str(self) -> &'static str {
    match self {
      PartOfSpeech::Noun => "noun",
      PartOfSpeech::Verb => "verb",
      PartOfSpeech::Adjective => "adjective",
      PartOfSpeech::Adverb => "adverb",
      PartOfSpeech::Preposition => "preposition",
      PartOfSpeech::Other => "other",
    }
  }

  pub fn parse(s: &str) -> Option<Self> {
    Self::ALL.into_iter().find(|p| p.as_str() == s)
  }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ExerciseType {
  FillBlank,
  MultipleChoice,
  Translation,
  Matching,
  Ordering,
}

impl ExerciseType {
  pub const ALL: [ExerciseType; 5] = [
    ExerciseType::FillBlank,
    ExerciseType::MultipleChoice,
    ExerciseType::Translation,
    ExerciseType::Matching,
    ExerciseType::Ordering,
  ];

  pub fn as_str(self) -> &'static str {
    match self {
      ExerciseType::FillBlank => "fill-blank",
      ExerciseType::MultipleChoice => "multiple-choice",
      ExerciseType::Translation => "translation",
      ExerciseType::Matching => "matching",
      ExerciseType::Ordering => "ordering",
    }
  }

  pub fn parse(s: &str) -> Option<Self> {
    Self::ALL.into_iter().find(|t| t.as_str() == s)
  }
}

/// Integer difficulty, always within 1..=5 once validated.
pub type Difficulty = u8;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VocabularyItem {
  pub word: String,
  pub pronunciation: String,
  pub translation: String,
  pub definition: String,
  pub example: String,
  pub part_of_speech: PartOfSpeech,
  pub difficulty: Difficulty,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GrammarConcept {
  pub title: String,
  pub explanation: String,
  pub rule: String,
  pub examples: Vec<String>,
  pub common_mistakes: Vec<String>,
  pub tips: Vec<String>,
}

/// A single expected answer, or several (matching/ordering).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum CorrectAnswer {
  One(String),
  Many(Vec<String>),
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ExerciseItem {
  #[serde(rename = "type")]
  pub exercise_type: ExerciseType,
  pub question: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub options: Option<Vec<String>>,
  pub correct_answer: CorrectAnswer,
  pub explanation: String,
  pub difficulty: Difficulty,
}

/// Validated provider output, tagged by kind. Exactly one kind per run.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GeneratedItem {
  Vocabulary(VocabularyItem),
  Grammar(GrammarConcept),
  Exercises(ExerciseItem),
}

impl GeneratedItem {
  pub fn kind(&self) -> ContentKind {
    match self {
      GeneratedItem::Vocabulary(_) => ContentKind::Vocabulary,
      GeneratedItem::Grammar(_) => ContentKind::Grammar,
      GeneratedItem::Exercises(_) => ContentKind::Exercises,
    }
  }
}

/// Where a run's output goes. Replaces branching on an optional lesson id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GenerationMode {
  /// Return transient items; nothing is written anywhere.
  Preview,
  /// Persist the whole batch against this lesson.
  Persist(String),
}

impl GenerationMode {
  pub fn as_str(&self) -> &'static str {
    match self {
      GenerationMode::Preview => "preview",
      GenerationMode::Persist(_) => "persist",
    }
  }
}

/// Per-call input. Built for one call and dropped right after.
#[derive(Clone, Debug)]
pub struct GenerationRequest {
  pub level_id: String,
  pub topic_id: String,
  pub mode: GenerationMode,
}

/// A validated item ready to be handed to the repository for one lesson.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewContentRecord {
  pub lesson_id: String,
  pub item: GeneratedItem,
}

/// Item as returned to callers. Persisted records carry repository-assigned
/// `id`/`created_at`; preview records carry an empty `id` and `lesson_id`.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ContentRecord {
  pub id: String,
  pub lesson_id: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub created_at: Option<DateTime<Utc>>,
  #[serde(flatten)]
  pub item: GeneratedItem,
}

impl ContentRecord {
  pub fn preview(item: GeneratedItem) -> Self {
    Self { id: String::new(), lesson_id: String::new(), created_at: None, item }
  }

  #[allow(dead_code)]
  pub fn is_persisted(&self) -> bool {
    !self.id.is_empty() && !self.lesson_id.is_empty()
  }
}
