use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::core::errors::{AccessDeskError, Result};

/// The two top-level collections of the access-control store.
///
/// The remote paths are fixed by the badge reader and must be used verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    /// Student records keyed by card id.
    Authorized,
    /// Access events keyed by `YYYYMMDD_HHMMSS`.
    Events,
}

impl Collection {
    /// Path of this collection inside the store.
    pub fn path(&self) -> &'static str {
        match self {
            Collection::Authorized => "autorizados",
            Collection::Events => "registros",
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.path())
    }
}

/// Full contents of one collection, ordered by key.
///
/// `BTreeMap` iteration matches the store's own key ordering, which is what
/// the event feed relies on for chronological order.
pub type Snapshot = BTreeMap<String, Value>;

/// Something a subscription delivers to its consumer.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreNotification {
    /// The complete current state of a collection after a change.
    Snapshot {
        collection: Collection,
        entries: Snapshot,
    },
    /// The subscription failed; no more snapshots will follow from it.
    Failed {
        collection: Collection,
        reason: String,
    },
}

impl StoreNotification {
    /// Collection this notification is about.
    pub fn collection(&self) -> Collection {
        match self {
            StoreNotification::Snapshot { collection, .. }
            | StoreNotification::Failed { collection, .. } => *collection,
        }
    }
}

static FORBIDDEN_KEY_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.$#\[\]/\x00-\x1F\x7F]").expect("static pattern is valid"));

/// Check that `key` can be used as a child name in the store.
pub fn validate_key(key: &str, field: &str) -> Result<()> {
    if key.is_empty() {
        return Err(AccessDeskError::validation(field, "must not be empty"));
    }
    if FORBIDDEN_KEY_CHARS.is_match(key) {
        return Err(AccessDeskError::validation(
            field,
            format!("'{key}' contains a character the store does not allow in keys (. $ # [ ] / or control characters)"),
        ));
    }
    Ok(())
}

/// Keep only the `limit` greatest keys of a snapshot.
pub fn limit_to_last(mut entries: Snapshot, limit: Option<usize>) -> Snapshot {
    if let Some(limit) = limit
        && entries.len() > limit
    {
        let cut = entries.len() - limit;
        let first_kept = entries.keys().nth(cut).cloned();
        if let Some(first_kept) = first_kept {
            entries = entries.split_off(&first_kept);
        }
    }
    entries
}
