//! Wire layout of binary profiler snapshots.
//!
//! A snapshot starts with a NUL-terminated JSON header. Without a `count`
//! the events follow as packed 22-byte records (v1). With a `count` they
//! follow as one column per field (v2), each column starting on an 8-byte
//! boundary of the buffer.

use crate::DecodeError;
use idstring::Hash64;
use serde::Deserialize;

pub const SNAPSHOT_KIND: &str = "profiler_data";

/// Size of one packed v1 record: type(1) name(8) time(8) thread(4) core(1).
pub const RECORD_SIZE: usize = 22;

pub const BEGIN: u8 = 0;
pub const END: u8 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Packed records, count implied by the payload length.
    V1,
    /// Columnar runs with an explicit event count.
    V2,
}

#[derive(Debug, Deserialize)]
struct Header {
    #[serde(rename = "type")]
    kind: String,
    count: Option<u64>,
}

/// One event as stored on the wire.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawEvent {
    pub kind: u8,
    pub name: Hash64,
    pub timestamp: f64,
    pub thread_id: u32,
    pub core_id: u8,
}

/// Parse the header and read every event that follows it.
pub fn read_events(buf: &[u8]) -> Result<(Format, Vec<RawEvent>), DecodeError> {
    let nul = buf.iter().position(|&b| b == 0).ok_or(DecodeError::MissingHeader)?;
    let header: Header =
        serde_json::from_slice(&buf[..nul]).map_err(|e| DecodeError::InvalidHeader(e.to_string()))?;
    if header.kind != SNAPSHOT_KIND {
        return Err(DecodeError::UnexpectedKind(header.kind));
    }
    let start = nul + 1;
    match header.count {
        None => read_packed(buf, start).map(|events| (Format::V1, events)),
        Some(count) => {
            let count = usize::try_from(count).map_err(|_| DecodeError::InvalidHeader(format!("count {count} too large")))?;
            read_columns(buf, start, count).map(|events| (Format::V2, events))
        }
    }
}

fn read_packed(buf: &[u8], start: usize) -> Result<Vec<RawEvent>, DecodeError> {
    let payload = &buf[start..];
    if payload.len() % RECORD_SIZE != 0 {
        return Err(DecodeError::CountMismatch { bytes: payload.len(), record: RECORD_SIZE });
    }
    Ok(payload
        .chunks_exact(RECORD_SIZE)
        .map(|r| RawEvent {
            kind: r[0],
            name: Hash64(u64::from_le_bytes(array(&r[1..9]))),
            timestamp: f64::from_le_bytes(array(&r[9..17])),
            thread_id: u32::from_le_bytes(array(&r[17..21])),
            core_id: r[21],
        })
        .collect())
}

const fn align8(offset: usize) -> usize {
    (offset + 7) & !7
}

fn read_columns(buf: &[u8], start: usize, n: usize) -> Result<Vec<RawEvent>, DecodeError> {
    let too_large = || DecodeError::Truncated { needed: usize::MAX, available: buf.len() };
    let types = start;
    let names = align8(types.checked_add(n).ok_or_else(too_large)?);
    let times = align8(n.checked_mul(8).and_then(|w| names.checked_add(w)).ok_or_else(too_large)?);
    let threads = align8(n.checked_mul(8).and_then(|w| times.checked_add(w)).ok_or_else(too_large)?);
    let cores = align8(n.checked_mul(4).and_then(|w| threads.checked_add(w)).ok_or_else(too_large)?);
    let end = cores.checked_add(n).ok_or_else(too_large)?;
    if end > buf.len() {
        return Err(DecodeError::Truncated { needed: end, available: buf.len() });
    }

    Ok((0..n)
        .map(|i| RawEvent {
            kind: buf[types + i],
            name: Hash64(u64::from_le_bytes(array(&buf[names + i * 8..names + i * 8 + 8]))),
            timestamp: f64::from_le_bytes(array(&buf[times + i * 8..times + i * 8 + 8])),
            thread_id: u32::from_le_bytes(array(&buf[threads + i * 4..threads + i * 4 + 4])),
            core_id: buf[cores + i],
        })
        .collect())
}

fn array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(bytes);
    out
}
