//! Instruction strings for the generation provider.
//!
//! Pure and deterministic: the same (kind, level, topic) always yields the same
//! prompt. Level and topic titles are embedded verbatim.

use crate::domain::{ContentKind, Level, Topic};
use crate::util::fill_template;

pub const VOCABULARY_COUNT: usize = 15;
pub const GRAMMAR_COUNT: usize = 3;
pub const EXERCISE_COUNT: usize = 5;

/// System message sent alongside every prompt.
pub const SYSTEM_PROMPT: &str =
  "You are an English-learning content generator. Respond ONLY with a single strict JSON object. No prose, no markdown fences.";

const VOCABULARY_TEMPLATE: &str = r#"Create English vocabulary for learners at level "{level}" studying the topic "{topic}".

Generate exactly {count} vocabulary items.

Return a single JSON object and nothing else, with this exact shape:
{
  "vocabulary": [
    {
      "word": string,
      "pronunciation": string (IPA),
      "translation": string,
      "definition": string,
      "example": string (one sentence using the word),
      "partOfSpeech": "noun" | "verb" | "adjective" | "adverb" | "preposition" | "other",
      "difficulty": integer from 1 to 5
    }
  ]
}

Every string must be non-empty. Do not wrap the JSON in text or code fences."#;

const GRAMMAR_TEMPLATE: &str = r#"Create English grammar lessons for learners at level "{level}" studying the topic "{topic}".

Generate exactly {count} grammar concepts.

Return a single JSON object and nothing else, with this exact shape:
{
  "grammar": [
    {
      "title": string,
      "explanation": string,
      "rule": string,
      "examples": [string, ...] (at least one),
      "commonMistakes": [string, ...] (at least one),
      "tips": [string, ...] (at least one)
    }
  ]
}

Every string must be non-empty. Do not wrap the JSON in text or code fences."#;

const EXERCISES_TEMPLATE: &str = r#"Create English practice exercises for learners at level "{level}" studying the topic "{topic}".

Generate exactly {count} exercises: 2 of type "fill-blank", 2 of type "multiple-choice" and 1 of type "translation".

Return a single JSON object and nothing else, with this exact shape:
{
  "exercises": [
    {
      "type": "fill-blank" | "multiple-choice" | "translation" | "matching" | "ordering",
      "question": string,
      "options": [string, ...] (required for multiple-choice, otherwise optional),
      "correctAnswer": string or [string, ...] (never empty),
      "explanation": string,
      "difficulty": integer from 1 to 5
    }
  ]
}

Every string must be non-empty. Do not wrap the JSON in text or code fences."#;

/// Number of items the prompt asks for.
pub fn expected_count(kind: ContentKind) -> usize {
  match kind {
    ContentKind::Vocabulary => VOCABULARY_COUNT,
    ContentKind::Grammar => GRAMMAR_COUNT,
    ContentKind::Exercises => EXERCISE_COUNT,
  }
}

pub fn build_prompt(kind: ContentKind, level: &Level, topic: &Topic) -> String {
  let tpl = match kind {
    ContentKind::Vocabulary => VOCABULARY_TEMPLATE,
    ContentKind::Grammar => GRAMMAR_TEMPLATE,
    ContentKind::Exercises => EXERCISES_TEMPLATE,
  };
  let count = expected_count(kind).to_string();
  // Titles go in last so a title containing `{count}` is left alone.
  let tpl = fill_template(tpl, &[("count", &count)]);
  fill_template(&tpl, &[("level", &level.title), ("topic", &topic.title)])
}

#[cfg(test)]
mod tests {
  use super::*;

  fn level() -> Level {
    Level { id: "L1".into(), title: "Beginner".into(), description: String::new() }
  }

  fn topic() -> Topic {
    Topic { id: "T1".into(), title: "Family".into(), description: String::new() }
  }

  #[test]
  fn embeds_titles_verbatim() {
    for kind in ContentKind::ALL {
      let p = build_prompt(kind, &level(), &topic());
      assert!(p.contains("\"Beginner\""), "{kind}");
      assert!(p.contains("\"Family\""), "{kind}");
      assert!(p.contains(&format!("\"{}\"", kind.as_str())), "{kind}");
    }
  }

  #[test]
  fn states_exact_counts() {
    assert!(build_prompt(ContentKind::Vocabulary, &level(), &topic()).contains("exactly 15 vocabulary items"));
    assert!(build_prompt(ContentKind::Grammar, &level(), &topic()).contains("exactly 3 grammar concepts"));
    let ex = build_prompt(ContentKind::Exercises, &level(), &topic());
    assert!(ex.contains("exactly 5 exercises"));
    assert!(ex.contains("2 of type \"fill-blank\", 2 of type \"multiple-choice\" and 1 of type \"translation\""));
  }

  #[test]
  fn is_deterministic() {
    let a = build_prompt(ContentKind::Grammar, &level(), &topic());
    let b = build_prompt(ContentKind::Grammar, &level(), &topic());
    assert_eq!(a, b);
  }

  #[test]
  fn titles_with_braces_survive() {
    let mut lvl = level();
    lvl.title = "A1 {count}".into();
    let p = build_prompt(ContentKind::Vocabulary, &lvl, &topic());
    assert!(p.contains("\"A1 {count}\""));
  }
}
