//! Application state: reference data + content store, and the orchestrator.
//!
//! The orchestrator is optional. Without a usable API key the client refuses to
//! build, the server still starts, and generation endpoints answer 503.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::client::GenerationClient;
use crate::config::{load_file_config_from_env, FileConfig, GenerationSettings};
use crate::domain::{LessonRef, Level, Topic};
use crate::error::ConfigurationError;
use crate::orchestrator::ContentOrchestrator;
use crate::seeds::{seed_lessons, seed_levels, seed_topics};
use crate::store::InMemoryStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<InMemoryStore>,
    pub orchestrator: Option<ContentOrchestrator>,
}

impl AppState {
    pub fn new(store: Arc<InMemoryStore>, orchestrator: Option<ContentOrchestrator>) -> Self {
        Self { store, orchestrator }
    }

    /// Build state from env: load config, seed reference data, init the generation client.
    /// Malformed generation settings are fatal; a missing API key only disables generation.
    #[instrument(level = "info", skip_all)]
    pub fn from_env() -> Result<Self, ConfigurationError> {
        let file = load_file_config_from_env().unwrap_or_default();
        let settings = GenerationSettings::from_env(&file.generation)?;
        let store = Arc::new(build_store(&file));

        let orchestrator = match GenerationClient::from_settings(&settings) {
            Ok(client) => {
                info!(target: "lesson_content_backend", model = %client.model(), max_retries = client.max_retries(), retry_delay_ms = settings.retry_delay.as_millis() as u64, "Generation enabled.");
                Some(ContentOrchestrator::new(client, store.clone(), store.clone(), store.clone(), store.clone()))
            }
            Err(e) => {
                warn!(target: "lesson_content_backend", error = %e, "Generation disabled.");
                None
            }
        };

        Ok(Self::new(store, orchestrator))
    }
}

/// File entries first; built-in seeds fill in ids the file didn't define.
fn build_store(file: &FileConfig) -> InMemoryStore {
    let mut levels: HashMap<String, Level> = HashMap::new();
    let mut topics: HashMap<String, Topic> = HashMap::new();
    let mut lessons: HashMap<String, LessonRef> = HashMap::new();

    for l in file.levels.iter().cloned().chain(seed_levels()) {
        levels.entry(l.id.clone()).or_insert(l);
    }
    for t in file.topics.iter().cloned().chain(seed_topics()) {
        topics.entry(t.id.clone()).or_insert(t);
    }
    let configured = file
        .lessons
        .iter()
        .map(|l| (l.id.clone(), LessonRef { level_id: l.level_id.clone(), topic_id: l.topic_id.clone() }));
    for (id, lesson) in configured.chain(seed_lessons()) {
        lessons.entry(id).or_insert(lesson);
    }

    InMemoryStore::with_reference_data(levels.into_values(), topics.into_values(), lessons)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LessonCfg;
    use crate::store::{LessonLookup, LevelLookup};

    #[tokio::test]
    async fn file_entries_override_seeds_by_id() {
        let file = FileConfig {
            levels: vec![Level { id: "L1".into(), title: "Starter".into(), description: String::new() }],
            lessons: vec![LessonCfg { id: "LES7".into(), level_id: "L2".into(), topic_id: "T3".into() }],
            ..Default::default()
        };
        let store = build_store(&file);
        assert_eq!(store.level_by_id("L1").await.unwrap().unwrap().title, "Starter");
        assert_eq!(store.level_by_id("L5").await.unwrap().unwrap().title, "Advanced");
        assert!(store.lesson_by_id("LES7").await.unwrap().is_some());
        assert!(store.lesson_by_id("LES1").await.unwrap().is_some());
    }
}
