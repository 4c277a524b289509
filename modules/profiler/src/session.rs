//! State of one profiler view: what the engine has told us about its
//! threads and names, plus the decoded frame history.

use crate::decode::decode;
use crate::history::{HistoryEntry, HistoryRing};
use crate::strings::StringIndex;
use crate::threads::ThreadDirectory;
use crate::DecodeError;
use bridge::{BridgeError, Connection, EngineMessage, Frame, Outbound};
use srtool_core::Endpoint;

pub const PROFILER_PATH: &str = "/profiler";

pub fn profiler_url(endpoint: &Endpoint) -> String {
    endpoint.ws_url(PROFILER_PATH)
}

/// Open the profiler socket of an engine.
pub fn connect(endpoint: &Endpoint) -> Connection {
    Connection::connect(&profiler_url(endpoint))
}

/// Console command that stops the engine sending snapshots.
pub fn pause_command() -> Outbound {
    Outbound::command("profiler pause")
}

pub fn resume_command() -> Outbound {
    Outbound::command("profiler unpause")
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

/// What a frame changed.
#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    Threads,
    Strings { merged: usize },
    /// A snapshot was appended at `index`.
    Frame { index: usize, frame_time: f64 },
    Ignored,
}

#[derive(Debug, Default)]
pub struct ProfilerSession {
    threads: ThreadDirectory,
    strings: StringIndex,
    history: HistoryRing,
    /// `None` follows the newest frame.
    selected: Option<usize>,
}

impl ProfilerSession {
    pub fn new(history_capacity: usize) -> Self {
        ProfilerSession { history: HistoryRing::new(history_capacity), ..Default::default() }
    }

    /// Apply one inbound frame. A bad frame is reported and leaves the
    /// session as it was.
    pub fn handle(&mut self, frame: &Frame) -> Result<Update, SessionError> {
        match frame {
            Frame::Binary(bytes) => {
                let entry = HistoryEntry::new(decode(bytes)?);
                let frame_time = entry.frame_time;
                if self.history.push(entry).is_some() {
                    // Keep a pinned selection on the same frame.
                    self.selected = self.selected.and_then(|i| i.checked_sub(1));
                }
                Ok(Update::Frame { index: self.history.len() - 1, frame_time })
            }
            Frame::Message(msg) => Ok(match msg.classify()? {
                EngineMessage::ProfilerThreads(roster) => {
                    self.threads.update(&roster);
                    tracing::debug!(threads = self.threads.len(), "thread roster");
                    Update::Threads
                }
                EngineMessage::ProfilerStrings(strings) => Update::Strings { merged: self.strings.update(&strings) },
                other => {
                    tracing::trace!(?other, "ignoring message");
                    Update::Ignored
                }
            }),
        }
    }

    /// Pin the view to a history index. Out-of-range indices are rejected.
    pub fn select(&mut self, index: usize) -> Option<&HistoryEntry> {
        let entry = self.history.select(index)?;
        self.selected = Some(index);
        Some(entry)
    }

    /// Go back to following the newest frame.
    pub fn follow_latest(&mut self) {
        self.selected = None;
    }

    pub fn selected_index(&self) -> Option<usize> {
        match self.selected {
            Some(i) => Some(i),
            None => self.history.len().checked_sub(1),
        }
    }

    /// The frame currently being viewed.
    pub fn viewed(&self) -> Option<&HistoryEntry> {
        self.selected_index().and_then(|i| self.history.select(i))
    }

    pub fn history(&self) -> &HistoryRing {
        &self.history
    }

    pub fn threads(&self) -> &ThreadDirectory {
        &self.threads
    }

    pub fn strings(&self) -> &StringIndex {
        &self.strings
    }
}
