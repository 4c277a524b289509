//! Profiler snapshots: decoding the engine's binary event stream into a
//! span tree, and the per-view state built around it.

mod decode;
pub mod format;
mod history;
mod session;
mod strings;
mod threads;

pub use decode::{decode, Children, Snapshot, Span, SpanId, TimeRange, Walk, NONE, ROOT};
pub use format::Format;
pub use history::{FrameBudget, HistoryEntry, HistoryRing, DEFAULT_CAPACITY};
pub use session::{connect, pause_command, profiler_url, resume_command, ProfilerSession, SessionError, Update, PROFILER_PATH};
pub use strings::StringIndex;
pub use threads::{ThreadDirectory, ThreadInfo};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("snapshot has no NUL-terminated header")]
    MissingHeader,
    #[error("invalid snapshot header: {0}")]
    InvalidHeader(String),
    #[error("unexpected snapshot type {0:?}")]
    UnexpectedKind(String),
    #[error("snapshot truncated: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },
    #[error("{bytes} payload bytes is not a whole number of {record}-byte events")]
    CountMismatch { bytes: usize, record: usize },
}
