use bridge::ThreadEntry;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThreadInfo {
    /// Hex key as sent by the engine.
    pub key: String,
    pub id: Option<u32>,
    pub name: String,
}

/// Every thread the engine has announced over the session. Rosters add to
/// what is already known; a thread is never forgotten.
#[derive(Debug, Clone, Default)]
pub struct ThreadDirectory {
    names: HashMap<String, String>,
}

impl ThreadDirectory {
    pub fn update(&mut self, roster: &[ThreadEntry]) {
        for t in roster {
            self.names.insert(t.id.clone(), t.name.clone());
        }
    }

    pub fn name(&self, thread_id: u32) -> Option<&str> {
        self.names
            .iter()
            .find(|(key, _)| u32::from_str_radix(key, 16).ok() == Some(thread_id))
            .map(|(_, name)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Ordered by name, then by numeric id.
    pub fn sorted(&self) -> Vec<ThreadInfo> {
        let mut out: Vec<_> = self
            .names
            .iter()
            .map(|(key, name)| ThreadInfo { key: key.clone(), id: u32::from_str_radix(key, 16).ok(), name: name.clone() })
            .collect();
        out.sort_by(order);
        out
    }
}

fn order(a: &ThreadInfo, b: &ThreadInfo) -> Ordering {
    a.name.cmp(&b.name).then(a.id.cmp(&b.id)).then_with(|| a.key.cmp(&b.key))
}
