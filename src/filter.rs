//! Node filters
//!
//! A filter maps attribute names to allowed values. A `no_` prefix turns the
//! rule into a set of disallowed values for the unprefixed attribute.

use crate::node::Node;
use ruletree::tokens;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Attribute name (optionally `no_`-prefixed) to a value or list of values
pub type FilterSpec = BTreeMap<String, Value>;

/// Prefix of a disallow rule
pub const EXCLUDE_PREFIX: &str = "no_";

/// Whether `node` passes every rule of `spec`.
///
/// Rules naming an attribute the node lacks are ignored, as are allow rules
/// with an empty value. The master is exempt from allow rules but not from
/// disallow rules, and never passes in shell mode.
pub fn passes(node: &Node, spec: &FilterSpec, shell_mode: bool) -> bool {
    if shell_mode && node.is_master() {
        return false;
    }

    for (key, rule) in spec {
        if let Some(attr) = key.strip_prefix(EXCLUDE_PREFIX) {
            let Some(value) = node.attribute(attr) else {
                continue;
            };
            if !token_set(&value).is_disjoint(&token_set(rule)) {
                log::debug!("node-{}: {attr} matches exclusion {rule}", node.id);
                return false;
            }
        } else {
            if node.is_master() || is_empty(rule) {
                continue;
            }
            let Some(value) = node.attribute(key) else {
                continue;
            };
            if token_set(&value).is_disjoint(&token_set(rule)) {
                log::debug!("node-{}: {key} not in {rule}", node.id);
                return false;
            }
        }
    }
    true
}

fn token_set(value: &Value) -> BTreeSet<String> {
    tokens(value).into_iter().collect()
}

/// `null`, `[]` and `""` disable an allow rule; `false` does not.
fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Array(items) => items.is_empty(),
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}
