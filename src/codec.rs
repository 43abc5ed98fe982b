//! Text encoding of a day's task list.
//!
//! The stored value is a JSON array of `{ id, isDone, taskText, isPrio }`
//! objects. Reads are lenient: anything that is not an array yields an empty
//! list and individual records that do not have that shape are dropped.

use crate::model::{TaskList, TaskRecord};
use serde_json::Value;
use std::collections::HashSet;
use tracing::warn;

pub fn decode(raw: Option<&str>) -> TaskList {
    let raw = match raw {
        Some(r) => r,
        None => return Vec::new(),
    };
    let items = match serde_json::from_str::<Value>(raw) {
        Ok(Value::Array(items)) => items,
        Ok(other) => {
            warn!(kind = value_kind(&other), "stored task list is not an array");
            return Vec::new();
        }
        Err(err) => {
            warn!(%err, "stored task list is not valid JSON");
            return Vec::new();
        }
    };

    let mut seen = HashSet::new();
    let mut tasks = Vec::with_capacity(items.len());
    for (idx, item) in items.into_iter().enumerate() {
        let record: TaskRecord = match serde_json::from_value(item) {
            Ok(record) => record,
            Err(err) => {
                warn!(index = idx, %err, "skipping malformed task record");
                continue;
            }
        };
        if record.text.trim().is_empty() {
            warn!(index = idx, id = record.id, "skipping task record with blank text");
            continue;
        }
        if !seen.insert(record.id) {
            warn!(index = idx, id = record.id, "skipping task record with duplicate id");
            continue;
        }
        tasks.push(record);
    }
    tasks
}

pub fn encode(tasks: &[TaskRecord]) -> Result<String, serde_json::Error> {
    serde_json::to_string(tasks)
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TaskList {
        vec![
            TaskRecord {
                id: 1_700_000_000_000,
                is_done: true,
                text: "buy milk".into(),
                is_priority: false,
            },
            TaskRecord {
                id: 1_700_000_000_001,
                is_done: false,
                text: "call \"mom\" ✆".into(),
                is_priority: true,
            },
        ]
    }

    #[test]
    fn round_trip_preserves_fields_and_order() {
        let tasks = sample();
        let encoded = encode(&tasks).unwrap();
        assert_eq!(decode(Some(&encoded)), tasks);
        assert_eq!(decode(Some(&encode(&[]).unwrap())), Vec::new());
    }

    #[test]
    fn absent_or_garbage_is_empty() {
        assert!(decode(None).is_empty());
        assert!(decode(Some("")).is_empty());
        assert!(decode(Some("{not json")).is_empty());
        assert!(decode(Some("null")).is_empty());
        assert!(decode(Some(r#"{"id":1,"isDone":false,"taskText":"x","isPrio":false}"#)).is_empty());
    }

    #[test]
    fn malformed_records_are_skipped() {
        let raw = r#"[
            {"id": 1, "isDone": false, "taskText": "keep", "isPrio": false},
            {"isDone": false, "taskText": "no id", "isPrio": false},
            {"id": 2, "isDone": "yes", "taskText": "bad flag", "isPrio": false},
            {"id": 3, "isDone": false, "taskText": "   ", "isPrio": false},
            {"id": 1, "isDone": true, "taskText": "dup", "isPrio": true},
            42,
            {"id": 4, "isDone": true, "taskText": "also keep", "isPrio": true}
        ]"#;
        let tasks = decode(Some(raw));
        let ids: Vec<_> = tasks.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![1, 4]);
        assert_eq!(tasks[0].text, "keep");
    }

    #[test]
    fn wire_shape_matches_existing_data() {
        let raw = r#"[{"id":12,"isDone":true,"taskText":"x","isPrio":true}]"#;
        let tasks = decode(Some(raw));
        assert_eq!(encode(&tasks).unwrap(), raw);
    }
}
