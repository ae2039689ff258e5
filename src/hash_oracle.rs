//! Process-wide read-only `hash -> label` lookup, treated as an external collaborator.
//!
//! The real implementation lives outside this crate's scope: a reverse-lookup database
//! built from the game's string tables. What this crate needs from it is exactly one operation,
//! [`HashLabelOracle::try_get_string`], with a documented fallback when the hash is unknown.

use std::collections::HashMap;
use std::sync::OnceLock;

/// A read-only `u32 -> String` lookup. Unknown hashes fall back to their own hex representation
/// (8 lowercase digits, no prefix), so callers always get a usable path component.
#[derive(Debug, Default)]
pub struct HashLabelOracle {
    table: HashMap<u32, String>,
}

impl HashLabelOracle {
    pub fn new() -> Self {
        HashLabelOracle { table: HashMap::new() }
    }

    pub fn with_entries(entries: impl IntoIterator<Item = (u32, String)>) -> Self {
        HashLabelOracle { table: entries.into_iter().collect() }
    }

    pub fn insert(&mut self, hash: u32, label: String) {
        self.table.insert(hash, label);
    }

    /// Resolves `hash` to its original string, or its lowercase hex form when unknown.
    pub fn try_get_string(&self, hash: u32) -> String {
        match self.table.get(&hash) {
            Some(s) => s.clone(),
            None => format!("{hash:08x}"),
        }
    }
}

/// The case-sensitive process-wide instance.
pub fn case_sensitive() -> &'static HashLabelOracle {
    static INSTANCE: OnceLock<HashLabelOracle> = OnceLock::new();
    INSTANCE.get_or_init(HashLabelOracle::new)
}

/// The lowercase-folded process-wide instance.
pub fn lowercase_folded() -> &'static HashLabelOracle {
    static INSTANCE: OnceLock<HashLabelOracle> = OnceLock::new();
    INSTANCE.get_or_init(HashLabelOracle::new)
}
