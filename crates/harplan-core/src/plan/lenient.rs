//! Tolerant field deserializers for model-authored JSON.
//!
//! Model replies routinely put `null` where a string belongs, send numbers
//! as strings, or inline an object where the schema asks for text. These
//! helpers accept the common variants so one sloppy field does not discard
//! an otherwise usable batch.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::warn;

/// Render any JSON value as plain text. `null` becomes the empty string and
/// structured values are serialized compactly.
pub(crate) fn value_to_text(value: Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s,
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

pub fn string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(value_to_text(Value::deserialize(deserializer)?))
}

pub fn opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let text = value_to_text(Value::deserialize(deserializer)?);
    Ok(if text.is_empty() { None } else { Some(text) })
}

/// Accept an array of scalars, a single string, or `null`.
pub fn string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => Vec::new(),
        Value::Array(items) => items
            .into_iter()
            .map(value_to_text)
            .filter(|s| !s.is_empty())
            .collect(),
        other => {
            let text = value_to_text(other);
            if text.is_empty() { Vec::new() } else { vec![text] }
        }
    })
}

/// Accept an array of objects, a single object, or `null`. Elements that do
/// not fit `T` are dropped with a warning.
pub fn seq<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .filter_map(|(index, item)| element(index, item))
            .collect(),
        Value::Null => Vec::new(),
        other => element(0, other).into_iter().collect(),
    })
}

fn element<T: DeserializeOwned>(index: usize, item: Value) -> Option<T> {
    match serde_json::from_value(item) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(
                index,
                element = std::any::type_name::<T>(),
                error = %e,
                "dropping malformed element"
            );
            None
        }
    }
}

/// Decode `T`, falling back to its default when the value is `null` or has
/// the wrong shape.
pub fn or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

/// Accept a JSON number or a numeric string (e.g. `"201"`).
pub fn opt_number<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Accept a `{name: value}` object with scalar values, or `null`.
pub fn string_map<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Object(map) => map
            .into_iter()
            .map(|(k, v)| (k, value_to_text(v)))
            .collect(),
        _ => BTreeMap::new(),
    })
}

/// Accept `{requirement: [ids]}` where each value may also be a single id.
pub fn list_map<'de, D>(deserializer: D) -> Result<BTreeMap<String, Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Object(map) => map
            .into_iter()
            .map(|(k, v)| {
                let ids = match v {
                    Value::Array(items) => items.into_iter().map(value_to_text).collect(),
                    Value::Null => Vec::new(),
                    other => vec![value_to_text(other)],
                };
                (k, ids)
            })
            .collect(),
        _ => BTreeMap::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Loose {
        #[serde(default, deserialize_with = "string")]
        text: String,
        #[serde(default, deserialize_with = "string_list")]
        list: Vec<String>,
        #[serde(default, deserialize_with = "opt_number")]
        status: Option<u32>,
    }

    #[test]
    fn null_and_numbers_become_text() {
        let p: Loose = serde_json::from_str(r#"{"text": null, "list": ["a", 2, null]}"#).unwrap();
        assert_eq!(p.text, "");
        assert_eq!(p.list, vec!["a", "2"]);
    }

    #[test]
    fn numeric_string_status_is_parsed() {
        let p: Loose = serde_json::from_str(r#"{"status": "201"}"#).unwrap();
        assert_eq!(p.status, Some(201));
    }

    #[test]
    fn single_string_becomes_one_element_list() {
        let p: Loose = serde_json::from_str(r#"{"list": "only"}"#).unwrap();
        assert_eq!(p.list, vec!["only"]);
    }

    #[derive(Debug, Deserialize)]
    struct Named {
        name: String,
    }

    #[derive(Debug, Deserialize)]
    struct Holder {
        #[serde(default, deserialize_with = "seq")]
        items: Vec<Named>,
    }

    #[test]
    fn seq_keeps_fitting_elements() {
        let h: Holder =
            serde_json::from_str(r#"{"items": [{"name": "a"}, 42, {"name": "b"}]}"#).unwrap();
        let names: Vec<_> = h.items.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, ["a", "b"]);

        let single: Holder = serde_json::from_str(r#"{"items": {"name": "solo"}}"#).unwrap();
        assert_eq!(single.items.len(), 1);
        let none: Holder = serde_json::from_str(r#"{"items": null}"#).unwrap();
        assert!(none.items.is_empty());
    }

    #[test]
    fn object_text_is_serialized() {
        let p: Loose = serde_json::from_str(r#"{"text": {"a": 1}}"#).unwrap();
        assert_eq!(p.text, r#"{"a":1}"#);
    }
}
