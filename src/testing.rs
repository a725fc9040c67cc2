//! Test doubles and fixtures shared by the unit tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::client::{GenerationClient, GenerationService, ProviderRequest};
use crate::config::GenerationSettings;
use crate::domain::{
  ContentKind, ContentRecord, GrammarConcept, LessonRef, Level, NewContentRecord, PartOfSpeech, Topic, VocabularyItem,
};
use crate::error::{GenerationError, PersistenceError};
use crate::orchestrator::ContentOrchestrator;
use crate::store::{InMemoryStore, LessonContentRepository, LessonLookup, LevelLookup, TopicLookup};

pub fn test_settings() -> GenerationSettings {
  GenerationSettings { api_key: Some("sk-test".into()), ..GenerationSettings::default() }
}

/// Provider fake: replays a script, then keeps answering with the last entry.
pub struct ScriptedService {
  script: Mutex<VecDeque<Result<String, GenerationError>>>,
  fallback: Result<String, GenerationError>,
  latency: Option<Duration>,
  cancel_on: Option<(usize, watch::Sender<bool>)>,
  calls: Mutex<Vec<(Instant, ProviderRequest)>>,
}

impl ScriptedService {
  pub fn always(text: &str) -> Self {
    Self::script(vec![Ok(text.to_string())])
  }

  pub fn script(entries: Vec<Result<String, GenerationError>>) -> Self {
    let fallback = entries.last().cloned().unwrap_or_else(|| Ok(String::new()));
    Self {
      script: Mutex::new(entries.into()),
      fallback,
      latency: None,
      cancel_on: None,
      calls: Mutex::new(Vec::new()),
    }
  }

  pub fn with_latency(mut self, latency: Duration) -> Self {
    self.latency = Some(latency);
    self
  }

  /// Publish cancellation from inside the `n`-th call (1-based).
  pub fn cancel_on_call(mut self, n: usize, tx: watch::Sender<bool>) -> Self {
    self.cancel_on = Some((n, tx));
    self
  }

  pub fn invocations(&self) -> usize {
    self.calls.lock().unwrap().len()
  }

  pub fn call_times(&self) -> Vec<Instant> {
    self.calls.lock().unwrap().iter().map(|(t, _)| *t).collect()
  }

  pub fn requests(&self) -> Vec<ProviderRequest> {
    self.calls.lock().unwrap().iter().map(|(_, r)| r.clone()).collect()
  }
}

#[async_trait]
impl GenerationService for ScriptedService {
  async fn generate(&self, req: &ProviderRequest) -> Result<String, GenerationError> {
    let n = {
      let mut calls = self.calls.lock().unwrap();
      calls.push((Instant::now(), req.clone()));
      calls.len()
    };
    if let Some((at, tx)) = &self.cancel_on {
      if *at == n {
        let _ = tx.send(true);
      }
    }
    if let Some(latency) = self.latency {
      tokio::time::sleep(latency).await;
    }
    let next = self.script.lock().unwrap().pop_front();
    next.unwrap_or_else(|| self.fallback.clone())
  }
}

/// Repository fake that records every `save` call.
#[derive(Default)]
pub struct RecordingRepository {
  saves: Mutex<Vec<(ContentKind, Vec<NewContentRecord>)>>,
  failing: Mutex<bool>,
}

impl RecordingRepository {
  pub fn saves(&self) -> Vec<(ContentKind, Vec<NewContentRecord>)> {
    self.saves.lock().unwrap().clone()
  }

  pub fn save_calls(&self) -> usize {
    self.saves.lock().unwrap().len()
  }

  pub fn fail_next_saves(&self) {
    *self.failing.lock().unwrap() = true;
  }
}

#[async_trait]
impl LessonContentRepository for RecordingRepository {
  async fn save(&self, kind: ContentKind, records: Vec<NewContentRecord>) -> Result<Vec<ContentRecord>, PersistenceError> {
    self.saves.lock().unwrap().push((kind, records.clone()));
    if *self.failing.lock().unwrap() {
      return Err(PersistenceError("backend unavailable".into()));
    }
    let now = Utc::now();
    Ok(
      records
        .into_iter()
        .enumerate()
        .map(|(i, r)| ContentRecord { id: format!("rec-{i}"), lesson_id: r.lesson_id, created_at: Some(now), item: r.item })
        .collect(),
    )
  }
}

/// Reference lookups that answer from `inner` after a fixed delay.
pub struct SlowLookups {
  pub inner: InMemoryStore,
  pub latency: Duration,
}

#[async_trait]
impl LevelLookup for SlowLookups {
  async fn level_by_id(&self, id: &str) -> Result<Option<Level>, PersistenceError> {
    tokio::time::sleep(self.latency).await;
    self.inner.level_by_id(id).await
  }
}

#[async_trait]
impl TopicLookup for SlowLookups {
  async fn topic_by_id(&self, id: &str) -> Result<Option<Topic>, PersistenceError> {
    tokio::time::sleep(self.latency).await;
    self.inner.topic_by_id(id).await
  }
}

#[async_trait]
impl LessonLookup for SlowLookups {
  async fn lesson_by_id(&self, lesson_id: &str) -> Result<Option<LessonRef>, PersistenceError> {
    tokio::time::sleep(self.latency).await;
    self.inner.lesson_by_id(lesson_id).await
  }
}

/// Store with Level L1 "Beginner", Topic T1 "Family" and lesson LES1 over them.
pub fn reference_store() -> InMemoryStore {
  InMemoryStore::with_reference_data(
    [Level { id: "L1".into(), title: "Beginner".into(), description: String::new() }],
    [Topic { id: "T1".into(), title: "Family".into(), description: String::new() }],
    [("LES1".to_string(), LessonRef { level_id: "L1".into(), topic_id: "T1".into() })],
  )
}

/// Orchestrator over `reference_store` lookups, a recording repository and `service`.
pub fn orchestrator_with(service: ScriptedService) -> (ContentOrchestrator, Arc<RecordingRepository>, Arc<ScriptedService>) {
  let service = Arc::new(service);
  let store = Arc::new(reference_store());
  let repo = Arc::new(RecordingRepository::default());
  let client = GenerationClient::new(&test_settings(), service.clone()).unwrap();
  let orch = ContentOrchestrator::new(client, store.clone(), store.clone(), store, repo.clone());
  (orch, repo, service)
}

pub fn sample_vocabulary(i: usize) -> VocabularyItem {
  VocabularyItem {
    word: format!("word{i}"),
    pronunciation: format!("/wɜːd{i}/"),
    translation: format!("palabra{i}"),
    definition: format!("definition {i}"),
    example: format!("This is word{i} in a sentence."),
    part_of_speech: PartOfSpeech::ALL[i % PartOfSpeech::ALL.len()],
    difficulty: (i % 5 + 1) as u8,
  }
}

pub fn sample_grammar(i: usize) -> GrammarConcept {
  GrammarConcept {
    title: format!("Concept {i}"),
    explanation: "Explains the concept.".into(),
    rule: "Subject + verb + object".into(),
    examples: vec!["My mother cooks dinner.".into()],
    common_mistakes: vec!["My mother cook dinner.".into()],
    tips: vec!["Watch the third-person -s.".into()],
  }
}

pub fn vocabulary_payload(n: usize) -> String {
  let items: Vec<_> = (0..n).map(sample_vocabulary).collect();
  json!({ "vocabulary": items }).to_string()
}

pub fn grammar_payload(n: usize) -> String {
  let items: Vec<_> = (0..n).map(sample_grammar).collect();
  json!({ "grammar": items }).to_string()
}

/// Two fill-blank, two multiple-choice and one translation exercise.
pub fn exercises_payload() -> String {
  json!({
    "exercises": [
      { "type": "fill-blank", "question": "My ___ is a doctor.", "options": ["father", "table"], "correctAnswer": "father", "explanation": "A person.", "difficulty": 1 },
      { "type": "fill-blank", "question": "She ___ two brothers.", "correctAnswer": "has", "explanation": "Third person.", "difficulty": 2 },
      { "type": "multiple-choice", "question": "Who is your mother's sister?", "options": ["aunt", "uncle", "cousin"], "correctAnswer": "aunt", "explanation": "Female sibling of a parent.", "difficulty": 2 },
      { "type": "multiple-choice", "question": "Pick the plural of child.", "options": ["childs", "children"], "correctAnswer": "children", "explanation": "Irregular plural.", "difficulty": 3 },
      { "type": "translation", "question": "Translate: Tengo una hermana.", "correctAnswer": ["I have a sister.", "I've got a sister."], "explanation": "tener = to have.", "difficulty": 3 }
    ]
  })
  .to_string()
}
