//! Equipment instruction normalizer.
//!
//! Instruction lists have been persisted in three shapes over time: a JSON
//! array of `{id, text}` records, a string holding that array JSON-encoded,
//! and free text with one step per line. [`RawSteps`] tags those shapes at
//! the storage or request boundary and [`normalize`] turns any of them into
//! the canonical `Vec<Step>`. Nothing past the boundary sees the untagged
//! form.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Step
// ---------------------------------------------------------------------------

/// One instruction in an equipment item. Order is the sequence order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub id: String,
    pub text: String,
}

impl Step {
    /// Create a step with a freshly assigned id.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: fresh_id(),
            text: text.into(),
        }
    }
}

fn fresh_id() -> String {
    Uuid::new_v4().to_string()
}

// ---------------------------------------------------------------------------
// Raw representations
// ---------------------------------------------------------------------------

/// Every stored representation of an instruction list.
#[derive(Debug, Clone, PartialEq)]
pub enum RawSteps {
    /// Null or absent.
    Empty,
    /// A JSON array of step-like records (or plain strings).
    CanonicalList(Vec<Value>),
    /// A string whose content parsed as a JSON array.
    JsonEncodedString(Vec<Value>),
    /// Anything else: one step per non-blank line.
    FreeText(String),
}

impl RawSteps {
    /// Tag an arbitrary JSON value.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Null => Self::Empty,
            Value::Array(items) => Self::CanonicalList(items),
            Value::String(text) => Self::from_text(text),
            record @ Value::Object(_) => Self::CanonicalList(vec![record]),
            scalar => Self::FreeText(scalar.to_string()),
        }
    }

    /// Tag a string. Text that looks like a JSON array but does not parse
    /// as one is treated as free text.
    pub fn from_text(text: String) -> Self {
        if text.trim_start().starts_with('[') {
            if let Ok(Value::Array(items)) = serde_json::from_str::<Value>(&text) {
                return Self::JsonEncodedString(items);
            }
        }
        Self::FreeText(text)
    }
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Convert any raw representation into canonical steps.
///
/// Total and idempotent: ids are kept when present and only missing ids are
/// generated, text is trimmed, and empty steps are dropped.
pub fn normalize(raw: RawSteps) -> Vec<Step> {
    match raw {
        RawSteps::Empty => Vec::new(),
        RawSteps::CanonicalList(items) | RawSteps::JsonEncodedString(items) => {
            items.into_iter().filter_map(step_from_record).collect()
        }
        RawSteps::FreeText(text) => split_lines(&text).map(Step::new).collect(),
    }
}

/// Normalize a JSON value read from storage or a request body.
pub fn normalize_value(value: Value) -> Vec<Step> {
    normalize(RawSteps::from_value(value))
}

/// Re-normalize already typed steps (trim, prune, fill missing ids).
pub fn normalize_steps(steps: Vec<Step>) -> Vec<Step> {
    steps
        .into_iter()
        .filter_map(|step| {
            let text = step.text.trim();
            if text.is_empty() {
                return None;
            }
            let id = if step.id.trim().is_empty() {
                fresh_id()
            } else {
                step.id
            };
            Some(Step {
                id,
                text: text.to_string(),
            })
        })
        .collect()
}

/// Serde adapter: accept any historical shape for a `steps` field.
pub fn deserialize_steps<'de, D>(deserializer: D) -> Result<Vec<Step>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?.unwrap_or(Value::Null);
    Ok(normalize_value(value))
}

fn split_lines(text: &str) -> impl Iterator<Item = &str> {
    text.split(['\n', '\r'])
        .map(str::trim)
        .filter(|line| !line.is_empty())
}

fn step_from_record(value: Value) -> Option<Step> {
    match value {
        Value::String(text) => {
            let text = text.trim();
            (!text.is_empty()).then(|| Step::new(text))
        }
        Value::Object(record) => {
            let text = record.get("text").and_then(Value::as_str)?.trim();
            if text.is_empty() {
                return None;
            }
            let id = match record.get("id") {
                Some(Value::String(id)) if !id.trim().is_empty() => id.clone(),
                Some(Value::Number(n)) => n.to_string(),
                _ => fresh_id(),
            };
            Some(Step {
                id,
                text: text.to_string(),
            })
        }
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn texts(steps: &[Step]) -> Vec<&str> {
        steps.iter().map(|s| s.text.as_str()).collect()
    }

    // -- Tagging --

    #[test]
    fn tags_each_historical_shape() {
        assert_eq!(RawSteps::from_value(Value::Null), RawSteps::Empty);
        assert!(matches!(
            RawSteps::from_value(json!([{"id": "a", "text": "x"}])),
            RawSteps::CanonicalList(_)
        ));
        assert!(matches!(
            RawSteps::from_value(json!(r#"[{"text": "x"}]"#)),
            RawSteps::JsonEncodedString(_)
        ));
        assert!(matches!(
            RawSteps::from_value(json!("Turn on\nWait")),
            RawSteps::FreeText(_)
        ));
    }

    #[test]
    fn broken_json_falls_through_to_free_text() {
        let raw = RawSteps::from_text("[not json\nsecond line".to_string());
        assert!(matches!(raw, RawSteps::FreeText(_)));

        let steps = normalize(raw);
        assert_eq!(texts(&steps), vec!["[not json", "second line"]);
    }

    #[test]
    fn json_that_is_not_an_array_is_free_text() {
        let steps = normalize(RawSteps::from_text(r#"{"text": "x"}"#.to_string()));
        assert_eq!(texts(&steps), vec![r#"{"text": "x"}"#]);
    }

    // -- Canonical lists --

    #[test]
    fn canonical_list_is_identity() {
        let input = vec![
            Step {
                id: "s1".into(),
                text: "Open the lid".into(),
            },
            Step {
                id: "s2".into(),
                text: "Add water".into(),
            },
        ];
        let value = serde_json::to_value(&input).unwrap();
        assert_eq!(normalize_value(value), input);
    }

    #[test]
    fn missing_ids_are_assigned_and_present_ids_kept() {
        let steps = normalize_value(json!([
            {"id": "keep-me", "text": "first"},
            {"text": "second"},
            {"id": "", "text": "third"},
        ]));
        assert_eq!(steps[0].id, "keep-me");
        assert!(!steps[1].id.is_empty());
        assert!(!steps[2].id.is_empty());
        assert_ne!(steps[1].id, steps[2].id);
    }

    #[test]
    fn empty_and_non_record_entries_are_pruned() {
        let steps = normalize_value(json!([
            {"id": "a", "text": "  "},
            {"id": "b"},
            42,
            null,
            "  plain string step  ",
            {"id": "c", "text": "  padded  "},
        ]));
        assert_eq!(texts(&steps), vec!["plain string step", "padded"]);
        assert_eq!(steps[1].id, "c");
    }

    #[test]
    fn numeric_ids_are_preserved_as_strings() {
        let steps = normalize_value(json!([{"id": 7, "text": "legacy"}]));
        assert_eq!(steps[0].id, "7");
    }

    // -- JSON-encoded strings --

    #[test]
    fn json_encoded_string_is_recursively_normalized() {
        let encoded = r#"[{"id":"x1","text":" Preheat "},{"text":""},{"text":"Bake"}]"#;
        let steps = normalize_value(json!(encoded));
        assert_eq!(texts(&steps), vec!["Preheat", "Bake"]);
        assert_eq!(steps[0].id, "x1");
    }

    // -- Free text --

    #[test]
    fn oven_scenario_drops_blank_trailing_line() {
        let steps = normalize_value(json!("Turn on\nSet to 180\n"));
        assert_eq!(texts(&steps), vec!["Turn on", "Set to 180"]);
        assert_eq!(steps.len(), 2);
    }

    #[test]
    fn free_text_handles_crlf_and_blank_lines() {
        let steps = normalize_value(json!("  one \r\n\r\n two\rthree\n\n"));
        assert_eq!(texts(&steps), vec!["one", "two", "three"]);
    }

    #[test]
    fn free_text_matches_prefiltered_lines() {
        let samples = [
            "a\n\nb\n",
            "  leading\ntrailing  \n\n\n",
            "single",
            "\n\n\n",
            "tab\tinside\nx",
        ];
        for s in samples {
            let direct = normalize_value(json!(s));
            let prefiltered: Vec<&str> = s.lines().filter(|l| !l.trim().is_empty()).collect();
            let joined = normalize_value(json!(prefiltered.join("\n")));
            assert_eq!(texts(&direct), texts(&joined), "input {s:?}");
        }
    }

    #[test]
    fn scalars_become_text() {
        assert_eq!(texts(&normalize_value(json!(180))), vec!["180"]);
        assert_eq!(texts(&normalize_value(json!(true))), vec!["true"]);
    }

    // -- Totality and idempotence --

    #[test]
    fn never_panics_on_odd_input() {
        let inputs = [
            json!(""),
            json!("["),
            json!("[]"),
            json!("[[[]]]"),
            json!([[], {}, {"text": null}, {"text": 5}]),
            json!({"id": "solo", "text": "single record"}),
            json!("\u{0}\u{1}"),
        ];
        for input in inputs {
            let _ = normalize_value(input);
        }
    }

    #[test]
    fn normalize_is_idempotent() {
        let inputs = [
            json!("Turn on\nSet to 180\n"),
            json!([{"text": " a "}, {"id": "b", "text": "b"}]),
            json!(r#"[{"text":"encoded"}]"#),
        ];
        for input in inputs {
            let once = normalize_value(input);
            let twice = normalize_value(serde_json::to_value(&once).unwrap());
            assert_eq!(once, twice);
            assert_eq!(normalize_steps(once.clone()), once);
        }
    }

    #[test]
    fn deserialize_steps_accepts_every_shape() {
        #[derive(Deserialize)]
        struct Item {
            #[serde(default, deserialize_with = "deserialize_steps")]
            steps: Vec<Step>,
        }

        let from_text: Item = serde_json::from_value(json!({"steps": "a\nb"})).unwrap();
        assert_eq!(from_text.steps.len(), 2);

        let from_null: Item = serde_json::from_value(json!({"steps": null})).unwrap();
        assert!(from_null.steps.is_empty());

        let missing: Item = serde_json::from_value(json!({})).unwrap();
        assert!(missing.steps.is_empty());
    }
}
