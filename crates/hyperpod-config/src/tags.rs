// Cluster tag parsing
//
// CLUSTER_TAGS accepts three shapes:
// - JSON list:   [{"Key":"Environment","Value":"Production"}]
// - JSON object: {"Environment":"Production"}
// - Pairs:       Environment=Production,Team=MLOps

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    #[serde(rename = "Key")]
    pub key: String,
    #[serde(rename = "Value")]
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

pub fn parse_tags(raw: &str) -> Vec<Tag> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Array(items)) => {
            match items.iter().map(tag_from_entry).collect::<Option<Vec<_>>>() {
                Some(tags) => tags,
                None => {
                    warn!("CLUSTER_TAGS list entries must be {{Key, Value}} objects; ignoring");
                    Vec::new()
                }
            }
        }
        Ok(Value::Object(map)) => map
            .into_iter()
            .map(|(key, value)| Tag::new(key, tag_text(value)))
            .collect(),
        Ok(_) => {
            warn!("CLUSTER_TAGS is valid JSON but neither a list nor an object; ignoring");
            Vec::new()
        }
        Err(_) => parse_pairs(raw),
    }
}

/// `{Key, Value}` with scalar values rendered as text
fn tag_from_entry(entry: &Value) -> Option<Tag> {
    let fields = entry.as_object()?;
    let key = fields.get("Key")?;
    let value = fields.get("Value")?;
    Some(Tag::new(tag_text(key.clone()), tag_text(value.clone())))
}

fn tag_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

fn parse_pairs(raw: &str) -> Vec<Tag> {
    raw.split(',')
        .filter_map(|pair| pair.split_once('='))
        .filter(|(key, _)| !key.trim().is_empty())
        .map(|(key, value)| Tag::new(key.trim(), value.trim()))
        .collect()
}
