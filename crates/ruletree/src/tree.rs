//! Rule tree storage and value helpers

use crate::error::{Error, Result};
use crate::keys::{ONCE_MATCH_PREFIX, match_attribute};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// A hierarchical rule mapping.
///
/// Keys iterate in lexicographic order, so every traversal of the tree
/// (and therefore every resolution) is reproducible.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleTree(Map<String, Value>);

impl RuleTree {
    /// Create an empty tree
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Build a tree from a parsed document.
    ///
    /// `null` is treated as an empty tree; any other non-mapping value is
    /// rejected.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            Value::Null => Ok(Self::new()),
            other => Err(Error::NotAMapping {
                found: value_kind(&other),
            }),
        }
    }

    /// Wrap an existing mapping
    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// Borrow the underlying mapping
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Mutably borrow the underlying mapping
    pub fn as_map_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.0
    }

    /// Consume the tree, returning the mapping
    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    /// Get a top-level value
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Check whether a top-level key is present
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Set a top-level value, returning the previous one
    pub fn set(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    /// Remove a top-level key
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    /// Iterate top-level entries in key order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Number of top-level keys
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the tree has no keys
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Shallow update: every top-level key of `other` overwrites ours.
    pub fn overlay(&mut self, other: RuleTree) {
        for (key, value) in other.0 {
            self.0.insert(key, value);
        }
    }

    /// Move every `once_by_<attr>` section out of the tree.
    ///
    /// Sections whose value is not a mapping are dropped with a warning.
    pub fn split_once_rules(&mut self) -> BTreeMap<String, RuleTree> {
        let once_keys: Vec<String> = self
            .0
            .keys()
            .filter(|k| k.starts_with(ONCE_MATCH_PREFIX) && match_attribute(k).is_some())
            .cloned()
            .collect();

        let mut once = BTreeMap::new();
        for key in once_keys {
            if let Some(value) = self.0.remove(&key) {
                match RuleTree::from_value(value) {
                    Ok(tree) => {
                        once.insert(key, tree);
                    }
                    Err(e) => log::warn!("ignoring once rule '{key}': {e}"),
                }
            }
        }
        once
    }
}

impl From<Map<String, Value>> for RuleTree {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Wrap a rule value into a list.
///
/// Lists are returned element-wise, `null` yields an empty list and any
/// other value becomes a one-element list.
pub fn as_list(value: &Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items.clone(),
        Value::Null => Vec::new(),
        other => vec![other.clone()],
    }
}

/// Canonical string form used for matching and filtering.
///
/// `"ready"`, `true` and `3` compare as `ready`, `true` and `3`; `null` has
/// no form and never matches.
pub fn canonical(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(_) | Value::Object(_) => Some(value.to_string()),
    }
}

/// Canonical tokens of a value, after list wrapping.
pub fn tokens(value: &Value) -> Vec<String> {
    as_list(value).iter().filter_map(canonical).collect()
}

pub(crate) fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "mapping",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_value_rejects_scalars() {
        assert!(RuleTree::from_value(json!({"a": 1})).is_ok());
        assert!(RuleTree::from_value(Value::Null).unwrap().is_empty());
        let err = RuleTree::from_value(json!([1, 2])).unwrap_err();
        assert!(err.to_string().contains("list"));
    }

    #[test]
    fn test_as_list_wraps() {
        assert_eq!(as_list(&json!("x")), vec![json!("x")]);
        assert_eq!(as_list(&json!(["a", "b"])).len(), 2);
        assert!(as_list(&Value::Null).is_empty());
        assert_eq!(as_list(&json!({"df": "df -h"})), vec![json!({"df": "df -h"})]);
    }

    #[test]
    fn test_tokens_are_canonical() {
        assert_eq!(tokens(&json!([1, "ready", true])), vec!["1", "ready", "true"]);
        assert!(tokens(&Value::Null).is_empty());
    }

    #[test]
    fn test_split_once_rules() {
        let mut tree = RuleTree::from_value(json!({
            "commands": {"df": "df -h"},
            "once_by_roles": {"controller": {"commands": {"crm": "crm status"}}},
            "once_by_": {"x": {}},
        }))
        .unwrap();

        let once = tree.split_once_rules();
        assert_eq!(once.len(), 1);
        assert!(once.contains_key("once_by_roles"));
        assert!(!tree.contains("once_by_roles"));
        assert!(tree.contains("commands"));
        assert!(tree.contains("once_by_"));
    }

    #[test]
    fn test_overlay_is_shallow() {
        let mut base = RuleTree::from_value(json!({"a": {"x": 1}, "b": 2})).unwrap();
        let top = RuleTree::from_value(json!({"a": {"y": 1}})).unwrap();
        base.overlay(top);
        assert_eq!(base.get("a"), Some(&json!({"y": 1})));
        assert_eq!(base.get("b"), Some(&json!(2)));
    }
}
