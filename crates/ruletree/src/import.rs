//! Import of attribute-first rule documents
//!
//! An rq document groups rules by attribute first:
//!
//! ```yaml
//! commands:
//!   __default: {df: df -h}
//!   by_roles:
//!     controller: {crm: crm status}
//! ```
//!
//! Importing turns it inside out so the attribute ends up at the leaves,
//! which is the shape resolution works on:
//!
//! ```yaml
//! commands: {df: df -h}
//! by_roles:
//!   controller:
//!     commands: {crm: crm status}
//! ```

use crate::error::{Error, Result};
use crate::keys::{DEFAULT_KEY, MATCH_PREFIX, ONCE_MATCH_PREFIX};
use crate::tree::{RuleTree, value_kind};
use serde_json::{Map, Value};

/// Merge an attribute-first document into `dst`.
///
/// Existing sections of `dst` are extended, never dropped. Fails when a
/// match section in `rq` is not a mapping, or when a section would have to
/// be written over a non-mapping value already in `dst`.
pub fn import_rq(dst: &mut RuleTree, rq: &RuleTree) -> Result<()> {
    for (attr, value) in rq.iter() {
        match value {
            Value::Object(section) => {
                if let Some(default) = section.get(DEFAULT_KEY) {
                    dst.set(attr.clone(), default.clone());
                }
                for (key, sub) in section.iter().filter(|(k, v)| *k != DEFAULT_KEY && !v.is_null()) {
                    import_entry(attr, key, sub, dst.as_map_mut(), attr)?;
                }
            }
            Value::Null => {}
            other => {
                dst.set(attr.clone(), other.clone());
            }
        }
    }
    Ok(())
}

fn import_entry(
    attr: &str,
    key: &str,
    value: &Value,
    dst: &mut Map<String, Value>,
    parent: &str,
) -> Result<()> {
    let path = format!("{parent}.{key}");
    let is_section = is_section_key(key);
    let body = value.as_object();
    let slot = object_slot(dst, key, &path)?;

    if let Some(default) = body.and_then(|b| b.get(DEFAULT_KEY)) {
        if is_section {
            object_slot(slot, DEFAULT_KEY, &path)?.insert(attr.to_string(), default.clone());
        } else {
            slot.insert(attr.to_string(), default.clone());
        }
    }

    if !is_section && !body.is_some_and(is_section_body) {
        slot.insert(attr.to_string(), value.clone());
        return Ok(());
    }

    let Some(body) = body else {
        return Err(Error::InvalidSection {
            key: path,
            message: format!("expected a mapping, found {}", value_kind(value)),
        });
    };

    for (sub_key, sub_value) in body.iter().filter(|(k, v)| *k != DEFAULT_KEY && !v.is_null()) {
        import_entry(attr, sub_key, sub_value, slot, &path)?;
    }
    Ok(())
}

fn is_section_key(key: &str) -> bool {
    key.starts_with(MATCH_PREFIX) || key.starts_with(ONCE_MATCH_PREFIX)
}

/// A mapping made only of defaults and match sections is walked like one.
fn is_section_body(body: &Map<String, Value>) -> bool {
    body.keys().all(|k| k == DEFAULT_KEY || is_section_key(k))
}

fn object_slot<'a>(
    map: &'a mut Map<String, Value>,
    key: &str,
    path: &str,
) -> Result<&'a mut Map<String, Value>> {
    match map
        .entry(key.to_string())
        .or_insert_with(|| Value::Object(Map::new()))
    {
        Value::Object(slot) => Ok(slot),
        other => Err(Error::InvalidSection {
            key: path.to_string(),
            message: format!("'{key}' already holds a {}", value_kind(other)),
        }),
    }
}
