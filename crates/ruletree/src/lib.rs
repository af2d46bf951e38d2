//! # Ruletree
//!
//! Hierarchical rule trees resolved onto targets by attribute matching.
//!
//! A rule tree mixes plain keys with match sections. Plain keys apply to
//! every target; a `by_<attr>` section applies its sub-trees to targets
//! whose `<attr>` takes one of the section's keys; `by_id` pins values to a
//! single target and always wins.
//!
//! ## Example
//!
//! ```ignore
//! use ruletree::{RuleTree, apply_config};
//!
//! let tree = RuleTree::from_value(serde_json::json!({
//!     "commands": {"df": "df -h"},
//!     "by_roles": {"controller": {"commands": {"uptime": "uptime"}}},
//! }))?;
//!
//! // `node` implements `RuleTarget`
//! apply_config(&mut node, &tree, true);
//! ```
//!
//! ## Actionable keys
//!
//! `commands`, `scripts`, `files`, `filelists`, `logs` and `put` hold lists
//! which accumulate across matching sections (see [`ActionKey`]). Every
//! other key is a scalar attribute that the last writer sets.

#![warn(missing_docs)]

pub mod error;
pub mod import;
pub mod keys;
pub mod resolve;
pub mod tree;

pub use error::{Error, Result};
pub use import::import_rq;
pub use keys::{
    ActionKey, DEFAULT_KEY, MATCH_PREFIX, ONCE_MATCH_PREFIX, ONCE_PREFIX, PRIORITY_SECTION,
    match_attribute,
};
pub use resolve::{MergeMode, RuleTarget, Touched, apply_config, apply_level};
pub use tree::{RuleTree, as_list, canonical, tokens};
