use crate::decode::Snapshot;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;

pub const DEFAULT_CAPACITY: usize = 1000;

/// How a frame time compares with the 60 and 30 fps budgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameBudget {
    /// Fits in a 60 fps frame.
    Smooth,
    /// Fits in a 30 fps frame.
    Acceptable,
    Slow,
}

impl FrameBudget {
    pub const SIXTY_FPS: f64 = 1.0 / 60.0;
    pub const THIRTY_FPS: f64 = 1.0 / 30.0;

    pub fn classify(frame_time: f64) -> Self {
        if frame_time > Self::THIRTY_FPS {
            FrameBudget::Slow
        } else if frame_time > Self::SIXTY_FPS {
            FrameBudget::Acceptable
        } else {
            FrameBudget::Smooth
        }
    }
}

#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub snapshot: Arc<Snapshot>,
    /// Seconds.
    pub frame_time: f64,
}

impl HistoryEntry {
    pub fn new(snapshot: Snapshot) -> Self {
        let frame_time = snapshot.frame_time();
        HistoryEntry { snapshot: Arc::new(snapshot), frame_time }
    }

    pub fn budget(&self) -> FrameBudget {
        FrameBudget::classify(self.frame_time)
    }
}

/// The most recent snapshots, oldest first.
#[derive(Debug, Clone)]
pub struct HistoryRing {
    entries: VecDeque<HistoryEntry>,
    capacity: usize,
}

impl HistoryRing {
    /// A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        HistoryRing { entries: VecDeque::with_capacity(capacity), capacity }
    }

    /// Append an entry, returning the one evicted to make room.
    pub fn push(&mut self, entry: HistoryEntry) -> Option<HistoryEntry> {
        let evicted = if self.entries.len() == self.capacity { self.entries.pop_front() } else { None };
        self.entries.push_back(entry);
        evicted
    }

    pub fn select(&self, index: usize) -> Option<&HistoryEntry> {
        self.entries.get(index)
    }

    pub fn latest(&self) -> Option<&HistoryEntry> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> + '_ {
        self.entries.iter()
    }

    pub fn frame_times(&self) -> impl Iterator<Item = f64> + '_ {
        self.entries.iter().map(|e| e.frame_time)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for HistoryRing {
    fn default() -> Self {
        HistoryRing::new(DEFAULT_CAPACITY)
    }
}
