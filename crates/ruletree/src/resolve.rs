//! Resolution of a rule tree onto a target
//!
//! A pass walks the tree from its root. At each level it applies, in order:
//! 1. the level's `__default` sub-tree
//! 2. plain keys
//! 3. match sections (`by_<attr>`), in key order
//! 4. the priority section (`by_id`), which always wins
//!
//! Actionable keys are merged according to the "touched" set, which is
//! threaded through the recursion explicitly and returned to the caller.

use crate::keys::{ActionKey, DEFAULT_KEY, PRIORITY_SECTION, is_match_section, is_plain, match_attribute};
use crate::tree::{RuleTree, as_list, value_kind};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// Set of action keys written during the current pass
pub type Touched = BTreeSet<ActionKey>;

/// How a value is written into the target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeMode {
    /// Overwrite unconditionally
    Replace,
    /// Replace or append depending on the touched set
    Merge,
}

/// Something a rule tree can be resolved onto.
///
/// Implementors own their attributes and action lists; the resolver only
/// reads attributes through [`RuleTarget::attribute_tokens`] and writes
/// through the two mutators.
pub trait RuleTarget {
    /// Key identifying this target inside a `by_id` section
    fn priority_key(&self) -> String;

    /// Current value of `name` as canonical match tokens.
    ///
    /// Returns `None` when the target has no such attribute, which makes
    /// any `by_<name>` section inert for it.
    fn attribute_tokens(&self, name: &str) -> Option<Vec<String>>;

    /// Mutable access to one of the action lists
    fn actions_mut(&mut self, key: ActionKey) -> &mut Vec<Value>;

    /// Store a non-actionable attribute
    fn set_attribute(&mut self, name: &str, value: Value);
}

/// Resolve `tree` onto `target`.
///
/// With `clean`, every reset-on-clean list is emptied first and root-level
/// keys overwrite the target, which makes repeated clean passes produce
/// identical lists. Without it the tree is layered on top of whatever the
/// target already holds.
pub fn apply_config<T>(target: &mut T, tree: &RuleTree, clean: bool) -> Touched
where
    T: RuleTarget + ?Sized,
{
    let mode = if clean {
        for key in ActionKey::ALL.into_iter().filter(ActionKey::resets_on_clean) {
            target.actions_mut(key).clear();
        }
        MergeMode::Replace
    } else {
        MergeMode::Merge
    };

    apply_level(target, tree.as_map(), mode, Touched::new())
}

/// Apply one level of a tree and recurse into its matching sections.
///
/// `mode` only governs this level's plain keys; defaults, match sections and
/// nested levels always merge.
pub fn apply_level<T>(
    target: &mut T,
    level: &Map<String, Value>,
    mode: MergeMode,
    mut touched: Touched,
) -> Touched
where
    T: RuleTarget + ?Sized,
{
    if let Some(default) = level.get(DEFAULT_KEY) {
        touched = apply_default(target, default, touched);
    }

    for (key, value) in level.iter().filter(|(k, _)| is_plain(k)) {
        apply_value(target, key, value, mode, &mut touched);
    }

    for (key, section) in level.iter().filter(|(k, _)| is_match_section(k)) {
        let Some(attr) = match_attribute(key) else {
            continue;
        };
        let Some(values) = target.attribute_tokens(attr) else {
            log::trace!("no attribute '{attr}' for section '{key}'");
            continue;
        };
        let Value::Object(section) = section else {
            log::warn!(
                "match section '{key}' is a {}, expected a mapping",
                value_kind(section)
            );
            continue;
        };

        for value in values.iter().filter(|v| v.as_str() != DEFAULT_KEY) {
            let Some(matched) = section.get(value) else {
                continue;
            };
            if let Some(default) = section.get(DEFAULT_KEY) {
                touched = apply_default(target, default, touched);
            }
            match matched {
                Value::Object(sub) => {
                    touched = apply_level(target, sub, MergeMode::Merge, touched);
                }
                Value::Null => {}
                other => log::warn!(
                    "'{key}.{value}' is a {}, expected a mapping",
                    value_kind(other)
                ),
            }
        }
    }

    if let Some(Value::Object(priority)) = level.get(PRIORITY_SECTION) {
        touched = apply_priority(target, priority, touched);
    }

    touched
}

fn apply_priority<T>(target: &mut T, section: &Map<String, Value>, mut touched: Touched) -> Touched
where
    T: RuleTarget + ?Sized,
{
    let Some(Value::Object(entry)) = section.get(&target.priority_key()) else {
        return touched;
    };

    if let Some(default) = section.get(DEFAULT_KEY) {
        touched = apply_default(target, default, touched);
    }
    if let Some(default) = entry.get(DEFAULT_KEY) {
        touched = apply_default(target, default, touched);
    }

    for (key, value) in entry {
        if is_plain(key) {
            apply_value(target, key, value, MergeMode::Replace, &mut touched);
        } else if key != DEFAULT_KEY {
            log::debug!("ignoring nested section '{key}' inside {PRIORITY_SECTION}");
        }
    }

    touched
}

fn apply_default<T>(target: &mut T, default: &Value, touched: Touched) -> Touched
where
    T: RuleTarget + ?Sized,
{
    match default {
        Value::Object(sub) => apply_level(target, sub, MergeMode::Merge, touched),
        Value::Null => touched,
        other => {
            log::warn!("'{DEFAULT_KEY}' is a {}, expected a mapping", value_kind(other));
            touched
        }
    }
}

fn apply_value<T>(target: &mut T, key: &str, value: &Value, mode: MergeMode, touched: &mut Touched)
where
    T: RuleTarget + ?Sized,
{
    let Some(action) = ActionKey::from_key(key) else {
        target.set_attribute(key, value.clone());
        return;
    };

    let items = as_list(value);
    let first_write = !touched.contains(&action) && !action.resets_on_clean();
    let list = target.actions_mut(action);
    let replace = match mode {
        MergeMode::Replace => true,
        MergeMode::Merge => first_write || list.is_empty(),
    };

    if replace {
        *list = items;
    } else {
        list.extend(items);
    }
    touched.insert(action);
}
