//! Reserved rule keys and the actionable key set

use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix of a match section (`by_roles`, `by_os_platform`, ...)
pub const MATCH_PREFIX: &str = "by_";

/// Prefix of a fleet-exclusive rule (`once_by_roles`, ...)
pub const ONCE_PREFIX: &str = "once_";

/// Full prefix of a fleet-exclusive match section
pub const ONCE_MATCH_PREFIX: &str = "once_by_";

/// Key whose sub-tree is applied before its siblings
pub const DEFAULT_KEY: &str = "__default";

/// The priority section, keyed by node id and always evaluated last
pub const PRIORITY_SECTION: &str = "by_id";

/// Keys holding ordered lists of actions.
///
/// Every actionable value is a list; a scalar or mapping in a rule is
/// wrapped into a one-element list before it is merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKey {
    /// Named shell commands, `{name: text}`
    Commands,
    /// Script names or paths, optionally with per-script env vars
    Scripts,
    /// Remote file paths to collect
    Files,
    /// Names of local files listing remote paths to collect
    Filelists,
    /// Log collection rules
    Logs,
    /// `(src, dst)` pairs copied to the node
    Put,
}

impl ActionKey {
    /// All actionable keys, in declaration order.
    pub const ALL: [ActionKey; 6] = [
        Self::Commands,
        Self::Scripts,
        Self::Files,
        Self::Filelists,
        Self::Logs,
        Self::Put,
    ];

    /// Parse a rule key into an actionable key.
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "commands" => Some(Self::Commands),
            "scripts" => Some(Self::Scripts),
            "files" => Some(Self::Files),
            "filelists" => Some(Self::Filelists),
            "logs" => Some(Self::Logs),
            "put" => Some(Self::Put),
            _ => None,
        }
    }

    /// The rule key for this action list.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Commands => "commands",
            Self::Scripts => "scripts",
            Self::Files => "files",
            Self::Filelists => "filelists",
            Self::Logs => "logs",
            Self::Put => "put",
        }
    }

    /// Whether the list is emptied at the start of a clean pass.
    ///
    /// `logs` and `put` keep their content between passes; a root-level
    /// value replaces them instead.
    pub fn resets_on_clean(&self) -> bool {
        matches!(
            self,
            Self::Commands | Self::Scripts | Self::Files | Self::Filelists
        )
    }
}

impl fmt::Display for ActionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether `key` opens a generic match section.
///
/// The priority section shares the prefix but is never a generic match.
pub fn is_match_section(key: &str) -> bool {
    key.starts_with(MATCH_PREFIX) && key != PRIORITY_SECTION
}

/// Whether `key` is a plain attribute or action key.
pub fn is_plain(key: &str) -> bool {
    !key.starts_with(MATCH_PREFIX) && !key.starts_with(ONCE_MATCH_PREFIX) && key != DEFAULT_KEY
}

/// Attribute name of a `by_<attr>` or `once_by_<attr>` key.
pub fn match_attribute(key: &str) -> Option<&str> {
    key.strip_prefix(ONCE_MATCH_PREFIX)
        .or_else(|| key.strip_prefix(MATCH_PREFIX))
        .filter(|attr| !attr.is_empty())
}
