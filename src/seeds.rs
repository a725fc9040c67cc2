//! Built-in reference data so the service is usable without a config file.

use crate::domain::{LessonRef, Level, Topic};

fn level(id: &str, title: &str, description: &str) -> Level {
  Level { id: id.into(), title: title.into(), description: description.into() }
}

fn topic(id: &str, title: &str, description: &str) -> Topic {
  Topic { id: id.into(), title: title.into(), description: description.into() }
}

/// CEFR-style proficiency tiers.
pub fn seed_levels() -> Vec<Level> {
  vec![
    level("L1", "Beginner", "A1: everyday expressions and very basic phrases."),
    level("L2", "Elementary", "A2: simple, routine exchanges on familiar matters."),
    level("L3", "Intermediate", "B1: main points of clear standard input."),
    level("L4", "Upper Intermediate", "B2: complex text on concrete and abstract topics."),
    level("L5", "Advanced", "C1: demanding, longer texts and implicit meaning."),
  ]
}

pub fn seed_topics() -> Vec<Topic> {
  vec![
    topic("T1", "Family", "Relatives, relationships and home life."),
    topic("T2", "Travel", "Transport, directions and accommodation."),
    topic("T3", "Food", "Meals, cooking and ordering at a restaurant."),
    topic("T4", "Work", "Jobs, the office and meetings."),
    topic("T5", "Health", "The body, illness and seeing a doctor."),
  ]
}

/// One demo lesson so persist/regenerate work out of the box.
pub fn seed_lessons() -> Vec<(String, LessonRef)> {
  vec![("LES1".into(), LessonRef { level_id: "L1".into(), topic_id: "T1".into() })]
}
