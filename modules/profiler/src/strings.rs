use idstring::{Hash64, SymbolTable};
use std::collections::HashMap;

/// Names announced by the engine over the profiler socket, keyed by hash.
#[derive(Debug, Clone, Default)]
pub struct StringIndex {
    names: HashMap<Hash64, String>,
}

impl StringIndex {
    /// Merge a `profiler_strings` table. Keys that are not 16 hex digits are
    /// skipped. Returns how many names were added or replaced.
    pub fn update(&mut self, strings: &HashMap<String, String>) -> usize {
        let mut merged = 0;
        for (key, name) in strings {
            match key.parse::<Hash64>() {
                Ok(hash) => {
                    self.names.insert(hash, name.clone());
                    merged += 1;
                }
                Err(e) => tracing::warn!(%key, error = %e, "skipping malformed string key"),
            }
        }
        merged
    }

    pub fn get(&self, hash: Hash64) -> Option<&str> {
        self.names.get(&hash).map(String::as_str)
    }

    /// Look in this index first, then in an on-disk string table.
    pub fn resolve<'a>(&'a self, hash: Hash64, fallback: Option<&'a SymbolTable>) -> Option<&'a str> {
        self.get(hash).or_else(|| fallback.and_then(|t| t.get(hash)))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
