#![forbid(unsafe_code)]
#![deny(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
#![deny(missing_docs, unused_must_use)]

//! Best-effort conversion of chat history JSON into [`Turn`]s.
//!
//! Chat front-ends hand history over in several layouts. The layout is picked
//! from the first element and every element is then converted on its own, so a
//! malformed element is skipped instead of failing the whole history.
//!
//! Contract: never errors; absent or empty history -> no turns.

use prompt::Turn;
use serde_json::{Map, Value};

/// Layout of a history array, detected from its first element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HistoryShape<'a> {
    /// `[{"role": "user", "content": ..}, {"role": "assistant", ..}, ..]`
    Messages(&'a [Value]),
    /// `[{"user": .., "assistant": ..}, ..]`
    Records(&'a [Value]),
    /// `[[user, assistant], ..]`
    Pairs(&'a [Value]),
}

impl<'a> HistoryShape<'a> {
    /// Detect the layout of `items`. `None` when there is nothing to inspect.
    pub fn detect(items: &'a [Value]) -> Option<Self> {
        let first = items.first()?;
        let shape = match first.as_object() {
            Some(obj) if obj.contains_key("role") => Self::Messages(items),
            Some(obj) if obj.contains_key("user") || obj.contains_key("assistant") => {
                Self::Records(items)
            }
            _ => Self::Pairs(items),
        };
        Some(shape)
    }

    /// Convert the elements into turns, skipping what does not fit the layout.
    pub fn into_turns(self) -> Vec<Turn> {
        match self {
            Self::Messages(items) => from_messages(items),
            Self::Records(items) => from_records(items),
            Self::Pairs(items) => from_pairs(items),
        }
    }
}

/// Normalize any supported history value into chronological turns.
///
/// `None`, `null`, non-array values and empty arrays all yield an empty vec.
pub fn normalize(history: Option<&Value>) -> Vec<Turn> {
    history
        .and_then(Value::as_array)
        .and_then(|items| HistoryShape::detect(items))
        .map(HistoryShape::into_turns)
        .unwrap_or_default()
}

/// Pair role-tagged messages. A user message waits for the next assistant
/// message; one that is never answered is dropped.
fn from_messages(items: &[Value]) -> Vec<Turn> {
    let mut turns = Vec::with_capacity(items.len() / 2);
    let mut pending: Option<String> = None;
    for (index, item) in items.iter().enumerate() {
        let Some(message) = item.as_object() else {
            tracing::debug!(index, "skipping history message that is not an object");
            continue;
        };
        let content = text_of(message.get("content"));
        match message.get("role").and_then(Value::as_str) {
            Some("user") => pending = Some(content),
            Some("assistant") => {
                if let Some(user) = pending.take() {
                    turns.push(Turn::new(user, content));
                }
            }
            _ => {}
        }
    }
    turns
}

fn from_records(items: &[Value]) -> Vec<Turn> {
    items
        .iter()
        .enumerate()
        .filter_map(|(index, item)| match item.as_object() {
            Some(record) => Some(record_turn(record)),
            None => {
                tracing::debug!(index, "skipping history record that is not an object");
                None
            }
        })
        .collect()
}

fn record_turn(record: &Map<String, Value>) -> Turn {
    Turn::new(text_of(record.get("user")), text_of(record.get("assistant")))
}

fn from_pairs(items: &[Value]) -> Vec<Turn> {
    items
        .iter()
        .enumerate()
        .filter_map(|(index, item)| {
            let pair = item.as_array().and_then(|p| Some((p.first()?, p.get(1)?)));
            if pair.is_none() {
                tracing::debug!(index, "skipping history element that is not a pair");
            }
            pair.map(|(user, assistant)| Turn::new(text_of(Some(user)), text_of(Some(assistant))))
        })
        .collect()
}

/// Text of a JSON field: strings verbatim, `null`/missing as empty, anything
/// else as compact JSON.
fn text_of(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn absent_or_empty_history_is_empty() {
        assert!(normalize(None).is_empty());
        assert!(normalize(Some(&Value::Null)).is_empty());
        assert!(normalize(Some(&json!([]))).is_empty());
        assert!(normalize(Some(&json!({"user": "hi"}))).is_empty());
        assert!(normalize(Some(&json!("hello"))).is_empty());
    }

    #[test]
    fn detects_shape_from_first_element() {
        let messages = [json!({"role": "user", "content": "a"}), json!(["x", "y"])];
        let records = [json!({"assistant": "b"})];
        let pairs = [json!(["a", "b"])];
        let unknown = [json!({"question": "a"})];

        assert!(matches!(HistoryShape::detect(&messages), Some(HistoryShape::Messages(_))));
        assert!(matches!(HistoryShape::detect(&records), Some(HistoryShape::Records(_))));
        assert!(matches!(HistoryShape::detect(&pairs), Some(HistoryShape::Pairs(_))));
        assert!(matches!(HistoryShape::detect(&unknown), Some(HistoryShape::Pairs(_))));
        assert_eq!(HistoryShape::detect(&[]), None);
    }

    #[test]
    fn messages_are_paired_in_order() {
        let history = json!([
            {"role": "user", "content": "hi"},
            {"role": "assistant", "content": "hello"},
            {"role": "user", "content": "refund?"},
            {"role": "assistant", "content": "sure"},
        ]);
        assert_eq!(
            normalize(Some(&history)),
            vec![Turn::new("hi", "hello"), Turn::new("refund?", "sure")]
        );
    }

    #[test]
    fn unanswered_trailing_user_message_is_dropped() {
        let history = json!([
            {"role": "user", "content": "hi"},
            {"role": "assistant", "content": "hello"},
            {"role": "user", "content": "still there?"},
        ]);
        assert_eq!(normalize(Some(&history)), vec![Turn::new("hi", "hello")]);
    }

    #[test]
    fn later_user_message_replaces_pending_one() {
        let history = json!([
            {"role": "user", "content": "first"},
            {"role": "user", "content": "second"},
            {"role": "assistant", "content": "reply"},
            {"role": "assistant", "content": "orphan"},
        ]);
        assert_eq!(normalize(Some(&history)), vec![Turn::new("second", "reply")]);
    }

    #[test]
    fn messages_ignore_other_roles_and_non_objects() {
        let history = json!([
            {"role": "system", "content": "be nice"},
            {"role": "user", "content": "hi"},
            42,
            {"role": "assistant"},
        ]);
        assert_eq!(normalize(Some(&history)), vec![Turn::new("hi", "")]);
    }

    #[test]
    fn records_default_missing_keys() {
        let history = json!([
            {"user": "hi", "assistant": "hello"},
            {"user": "only user"},
            {"assistant": "only assistant"},
            "not a record",
        ]);
        assert_eq!(
            normalize(Some(&history)),
            vec![
                Turn::new("hi", "hello"),
                Turn::new("only user", ""),
                Turn::new("", "only assistant"),
            ]
        );
    }

    #[test]
    fn pairs_skip_elements_that_are_not_pairs() {
        let history = json!([
            ["hi", "hello"],
            ["lonely"],
            7,
            {"0": "x", "1": "y"},
            ["refund?", "sure", "extra"],
        ]);
        assert_eq!(
            normalize(Some(&history)),
            vec![Turn::new("hi", "hello"), Turn::new("refund?", "sure")]
        );
    }

    #[test]
    fn non_string_content_is_rendered() {
        let history = json!([["count", 3], ["pending", null]]);
        assert_eq!(
            normalize(Some(&history)),
            vec![Turn::new("count", "3"), Turn::new("pending", "")]
        );
    }

    proptest! {
        #[test]
        fn pairs_keep_everything_indexable(
            pairs in prop::collection::vec(("[a-z]{0,8}", "[a-z]{0,8}"), 0..10),
            junk_at in 0usize..10,
        ) {
            let mut items: Vec<Value> = pairs.iter().map(|(u, a)| json!([u, a])).collect();
            let at = junk_at.min(items.len());
            items.insert(at, json!(["no partner"]));
            // a leading single-item array still selects the pair layout
            let turns = normalize(Some(&Value::Array(items)));
            let expected: Vec<Turn> = pairs.iter().map(|(u, a)| Turn::new(u.as_str(), a.as_str())).collect();
            prop_assert_eq!(turns, expected);
        }
    }
}
