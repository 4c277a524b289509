//! Text, JSON and CSV renderings of engine data.

use bridge::LogLine;
use idstring::{Hash64, SymbolTable};
use profiler::{HistoryEntry, HistoryRing, Snapshot, StringIndex};
use std::io::Write;

/// Span name from the session's strings or the string table, else the hash.
pub fn span_name(hash: Hash64, strings: &StringIndex, table: Option<&SymbolTable>) -> String {
    strings.resolve(hash, table).map_or_else(|| format!("#ID[{hash}]"), str::to_string)
}

pub fn tree_lines(snapshot: &Snapshot, name: impl Fn(Hash64) -> String) -> Vec<String> {
    snapshot
        .walk()
        .map(|(depth, _, span)| {
            format!(
                "{:indent$}{} {:.3} ms [thread {:x} core {}]",
                "",
                name(span.name),
                span.elapsed * 1000.0,
                span.thread_id,
                span.core_id,
                indent = depth * 2
            )
        })
        .collect()
}

pub fn log_line(line: &LogLine, table: Option<&SymbolTable>) -> String {
    let message = match table {
        Some(t) => t.substitute(&line.message).into_owned(),
        None => line.message.clone(),
    };
    match (&line.level, &line.system) {
        (Some(level), Some(system)) => format!("[{level}] {system}: {message}"),
        (Some(level), None) => format!("[{level}] {message}"),
        (None, Some(system)) => format!("{system}: {message}"),
        (None, None) => message,
    }
}

pub fn frame_text(index: usize, entry: &HistoryEntry) -> String {
    format!(
        "frame {}: {:.1} ms ({:?}), {} spans on {} threads",
        index,
        entry.frame_time * 1000.0,
        entry.budget(),
        entry.snapshot.len(),
        entry.snapshot.threads().len()
    )
}

pub fn frame_json(index: usize, entry: &HistoryEntry) -> serde_json::Value {
    let range = entry.snapshot.time_range();
    serde_json::json!({
        "index": index,
        "frame_time_ms": entry.frame_time * 1000.0,
        "budget": entry.budget(),
        "spans": entry.snapshot.len(),
        "threads": entry.snapshot.threads(),
        "start": range.map(|r| r.start),
        "end": range.map(|r| r.end),
    })
}

pub fn write_history_csv<W: Write>(w: W, history: &HistoryRing) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_writer(w);
    wtr.write_record(["index", "frame_time_ms", "budget", "spans", "threads", "start", "end"])?;
    for (i, entry) in history.iter().enumerate() {
        let range = entry.snapshot.time_range();
        wtr.write_record([
            i.to_string(),
            format!("{:.3}", entry.frame_time * 1000.0),
            format!("{:?}", entry.budget()).to_lowercase(),
            entry.snapshot.len().to_string(),
            entry.snapshot.threads().len().to_string(),
            range.map(|r| r.start.to_string()).unwrap_or_default(),
            range.map(|r| r.end.to_string()).unwrap_or_default(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}
