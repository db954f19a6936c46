//! Snapshot policy for update events
//!
//! Update events can carry a copy of the model taken before the patch. Copies
//! cost a clone per dispatch, so they are opt-out per event name, and disabled
//! by default for the high-frequency ones.

use std::collections::BTreeSet;

use serde::Deserialize;

/// Events with snapshots disabled unless configured otherwise
pub const DEFAULT_DISABLED: &[&str] = &["messageUpdate", "presenceUpdate"];

/// Which update events take a `before` snapshot
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SnapshotPolicy {
    /// Disable every snapshot
    #[serde(default)]
    pub disable_all: bool,
    /// Event names (e.g. `guildUpdate`) with snapshots disabled
    #[serde(default)]
    pub disabled: BTreeSet<String>,
}

impl Default for SnapshotPolicy {
    fn default() -> Self {
        Self {
            disable_all: false,
            disabled: DEFAULT_DISABLED.iter().map(|s| (*s).to_string()).collect(),
        }
    }
}

impl SnapshotPolicy {
    /// Snapshot every update event
    #[must_use]
    pub fn all() -> Self {
        Self {
            disable_all: false,
            disabled: BTreeSet::new(),
        }
    }

    /// Never snapshot
    #[must_use]
    pub fn none() -> Self {
        Self {
            disable_all: true,
            disabled: BTreeSet::new(),
        }
    }

    /// Parse the `DISABLE_SNAPSHOTS` syntax: `all`, `none`, or a comma list of
    /// event names.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "all" => Self::none(),
            "none" | "" => Self::all(),
            list => Self {
                disable_all: false,
                disabled: list
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect(),
            },
        }
    }

    /// Whether `event` should take a snapshot before patching
    #[must_use]
    pub fn is_enabled(&self, event: &str) -> bool {
        !self.disable_all && !self.disabled.contains(event)
    }
}
