//! Structural validation of raw provider output.
//!
//! The provider's text is untrusted. It is parsed as JSON and checked field by
//! field against the contract for the requested kind; anything off is rejected,
//! never coerced. All violations are collected so a single rejection explains
//! everything that was wrong. Unknown extra fields are ignored.

use serde_json::{Map, Value};

use crate::domain::{
  ContentKind, CorrectAnswer, Difficulty, ExerciseItem, ExerciseType, GeneratedItem, GrammarConcept,
  PartOfSpeech, VocabularyItem,
};
use crate::error::ValidationError;

const MIN_DIFFICULTY: u64 = 1;
const MAX_DIFFICULTY: u64 = 5;

/// Parse and validate `raw` as a payload of `kind`. On success returns at least one item.
pub fn validate(kind: ContentKind, raw: &str) -> Result<Vec<GeneratedItem>, ValidationError> {
  let root: Value = serde_json::from_str(raw).map_err(|e| ValidationError::MalformedJson(e.to_string()))?;

  let mut ck = Checker::default();
  let items = match root_items(&mut ck, &root, kind) {
    Some(entries) => entries
      .iter()
      .enumerate()
      .filter_map(|(i, entry)| {
        let path = format!("{}[{}]", kind.as_str(), i);
        let obj = ck.object(entry, &path)?;
        match kind {
          ContentKind::Vocabulary => vocabulary_item(&mut ck, obj, &path).map(GeneratedItem::Vocabulary),
          ContentKind::Grammar => grammar_concept(&mut ck, obj, &path).map(GeneratedItem::Grammar),
          ContentKind::Exercises => exercise_item(&mut ck, obj, &path).map(GeneratedItem::Exercises),
        }
      })
      .collect::<Vec<_>>(),
    None => Vec::new(),
  };

  if !ck.details.is_empty() {
    return Err(ValidationError::SchemaViolation { kind, details: ck.details });
  }
  Ok(items)
}

fn root_items<'a>(ck: &mut Checker, root: &'a Value, kind: ContentKind) -> Option<&'a Vec<Value>> {
  let Some(obj) = root.as_object() else {
    ck.fail("$", "expected a JSON object");
    return None;
  };
  let key = kind.as_str();
  match obj.get(key) {
    None => {
      ck.fail(key, "is required");
      None
    }
    Some(Value::Array(entries)) if entries.is_empty() => {
      ck.fail(key, "must contain at least one item");
      None
    }
    Some(Value::Array(entries)) => Some(entries),
    Some(_) => {
      ck.fail(key, "must be an array");
      None
    }
  }
}

fn vocabulary_item(ck: &mut Checker, obj: &Map<String, Value>, path: &str) -> Option<VocabularyItem> {
  let word = ck.text(obj, path, "word");
  let pronunciation = ck.text(obj, path, "pronunciation");
  let translation = ck.text(obj, path, "translation");
  let definition = ck.text(obj, path, "definition");
  let example = ck.text(obj, path, "example");
  let part_of_speech = ck.one_of(obj, path, "partOfSpeech", PartOfSpeech::parse);
  let difficulty = ck.difficulty(obj, path, "difficulty");
  Some(VocabularyItem {
    word: word?,
    pronunciation: pronunciation?,
    translation: translation?,
    definition: definition?,
    example: example?,
    part_of_speech: part_of_speech?,
    difficulty: difficulty?,
  })
}

fn grammar_concept(ck: &mut Checker, obj: &Map<String, Value>, path: &str) -> Option<GrammarConcept> {
  let title = ck.text(obj, path, "title");
  let explanation = ck.text(obj, path, "explanation");
  let rule = ck.text(obj, path, "rule");
  let examples = ck.text_list(obj, path, "examples");
  let common_mistakes = ck.text_list(obj, path, "commonMistakes");
  let tips = ck.text_list(obj, path, "tips");
  Some(GrammarConcept {
    title: title?,
    explanation: explanation?,
    rule: rule?,
    examples: examples?,
    common_mistakes: common_mistakes?,
    tips: tips?,
  })
}

fn exercise_item(ck: &mut Checker, obj: &Map<String, Value>, path: &str) -> Option<ExerciseItem> {
  let exercise_type = ck.one_of(obj, path, "type", ExerciseType::parse);
  let question = ck.text(obj, path, "question");
  let options = match obj.get("options") {
    None | Some(Value::Null) => Some(None),
    Some(_) => ck.string_list(obj, path, "options", false).map(Some),
  };
  let correct_answer = ck.correct_answer(obj, path, "correctAnswer");
  let explanation = ck.text(obj, path, "explanation");
  let difficulty = ck.difficulty(obj, path, "difficulty");
  Some(ExerciseItem {
    exercise_type: exercise_type?,
    question: question?,
    options: options?,
    correct_answer: correct_answer?,
    explanation: explanation?,
    difficulty: difficulty?,
  })
}

/// Collects violations while extracting typed fields.
#[derive(Default)]
struct Checker {
  details: Vec<String>,
}

impl Checker {
  fn fail(&mut self, path: &str, msg: &str) {
    self.details.push(format!("{path}: {msg}"));
  }

  fn object<'a>(&mut self, v: &'a Value, path: &str) -> Option<&'a Map<String, Value>> {
    let obj = v.as_object();
    if obj.is_none() {
      self.fail(path, "expected an object");
    }
    obj
  }

  fn required<'a>(&mut self, obj: &'a Map<String, Value>, path: &str, key: &str) -> Option<&'a Value> {
    match obj.get(key) {
      None | Some(Value::Null) => {
        self.fail(&format!("{path}.{key}"), "is required");
        None
      }
      v => v,
    }
  }

  /// Non-empty string (whitespace-only counts as empty).
  fn text(&mut self, obj: &Map<String, Value>, path: &str, key: &str) -> Option<String> {
    let v = self.required(obj, path, key)?;
    match v.as_str() {
      Some(s) if !s.trim().is_empty() => Some(s.to_string()),
      Some(_) => {
        self.fail(&format!("{path}.{key}"), "must not be empty");
        None
      }
      None => {
        self.fail(&format!("{path}.{key}"), "must be a string");
        None
      }
    }
  }

  /// Array of non-empty strings, itself non-empty.
  fn text_list(&mut self, obj: &Map<String, Value>, path: &str, key: &str) -> Option<Vec<String>> {
    self.required(obj, path, key)?;
    self.string_list(obj, path, key, true)
  }

  /// `strict` lists must be non-empty and hold non-blank strings; otherwise
  /// any array of strings passes (`options` entries are free-form).
  fn string_list(&mut self, obj: &Map<String, Value>, path: &str, key: &str, strict: bool) -> Option<Vec<String>> {
    let field = format!("{path}.{key}");
    let Some(arr) = obj.get(key).and_then(Value::as_array) else {
      self.fail(&field, "must be an array of strings");
      return None;
    };
    if strict && arr.is_empty() {
      self.fail(&field, "must contain at least one entry");
      return None;
    }
    let mut out = Vec::with_capacity(arr.len());
    let mut ok = true;
    for (i, v) in arr.iter().enumerate() {
      match v.as_str() {
        Some(s) if !strict || !s.trim().is_empty() => out.push(s.to_string()),
        _ => {
          self.fail(&format!("{field}[{i}]"), if strict { "must be a non-empty string" } else { "must be a string" });
          ok = false;
        }
      }
    }
    ok.then_some(out)
  }

  fn one_of<T>(&mut self, obj: &Map<String, Value>, path: &str, key: &str, parse: fn(&str) -> Option<T>) -> Option<T> {
    let v = self.required(obj, path, key)?;
    let parsed = v.as_str().and_then(parse);
    if parsed.is_none() {
      self.fail(&format!("{path}.{key}"), &format!("unsupported value {v}"));
    }
    parsed
  }

  /// Integer in 1..=5. A float with no fractional part (`3.0`) is the same number.
  fn difficulty(&mut self, obj: &Map<String, Value>, path: &str, key: &str) -> Option<Difficulty> {
    let v = self.required(obj, path, key)?;
    let n = v.as_u64().or_else(|| {
      v.as_f64()
        .filter(|f| f.fract() == 0.0 && *f >= 0.0 && *f <= u64::MAX as f64)
        .map(|f| f as u64)
    });
    match n {
      Some(n) if (MIN_DIFFICULTY..=MAX_DIFFICULTY).contains(&n) => Some(n as Difficulty),
      _ => {
        self.fail(
          &format!("{path}.{key}"),
          &format!("must be an integer between {MIN_DIFFICULTY} and {MAX_DIFFICULTY}, got {v}"),
        );
        None
      }
    }
  }

  fn correct_answer(&mut self, obj: &Map<String, Value>, path: &str, key: &str) -> Option<CorrectAnswer> {
    let v = self.required(obj, path, key)?;
    match v {
      Value::String(s) if !s.trim().is_empty() => Some(CorrectAnswer::One(s.clone())),
      Value::Array(_) => self.string_list(obj, path, key, true).map(CorrectAnswer::Many),
      _ => {
        self.fail(&format!("{path}.{key}"), "must be a non-empty string or a non-empty array of strings");
        None
      }
    }
  }
}
