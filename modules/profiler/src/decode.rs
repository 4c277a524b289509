//! Rebuilds the span tree of a snapshot from its flat event list.

use crate::format::{self, Format, RawEvent, BEGIN, END};
use crate::DecodeError;
use idstring::Hash64;

/// Arena index of a span. `NONE` marks a missing link.
pub type SpanId = usize;

pub const NONE: SpanId = 0;
/// Synthetic root every top-level span hangs off.
pub const ROOT: SpanId = 1;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Span {
    pub name: Hash64,
    /// Seconds.
    pub start: f64,
    /// Zero until the matching end event is seen.
    pub elapsed: f64,
    pub thread_id: u32,
    pub core_id: u8,
    pub parent: SpanId,
    pub first_child: SpanId,
    pub last_child: SpanId,
    pub prev_sibling: SpanId,
    pub next_sibling: SpanId,
}

impl Span {
    pub fn end(&self) -> f64 {
        self.start + self.elapsed
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeRange {
    pub start: f64,
    pub end: f64,
}

impl TimeRange {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// One decoded snapshot. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    format: Format,
    spans: Vec<Span>,
    threads: Vec<u32>,
    range: Option<TimeRange>,
}

/// Decode a binary snapshot.
pub fn decode(buf: &[u8]) -> Result<Snapshot, DecodeError> {
    let (format, events) = format::read_events(buf)?;
    let snapshot = Snapshot::build(format, &events);
    tracing::debug!(?format, events = events.len(), spans = snapshot.len(), "decoded snapshot");
    Ok(snapshot)
}

impl Snapshot {
    /// Events are nested through a single stack in buffer order, across all
    /// threads. Unmatched end events are ignored.
    fn build(format: Format, events: &[RawEvent]) -> Snapshot {
        let begins = events.iter().filter(|e| e.kind == BEGIN).count();
        let mut spans = Vec::with_capacity((begins + 2).div_ceil(8) * 8);
        spans.resize(2, Span::default());
        let mut threads = Vec::new();
        let mut stack = vec![ROOT];

        for event in events {
            match event.kind {
                BEGIN => {
                    let id = spans.len();
                    let parent = stack.last().copied().unwrap_or(ROOT);
                    let prev = spans[parent].last_child;
                    spans.push(Span {
                        name: event.name,
                        start: event.timestamp,
                        thread_id: event.thread_id,
                        core_id: event.core_id,
                        parent,
                        prev_sibling: prev,
                        ..Span::default()
                    });
                    if prev != NONE {
                        spans[prev].next_sibling = id;
                    } else {
                        spans[parent].first_child = id;
                    }
                    spans[parent].last_child = id;
                    stack.push(id);
                    if !threads.contains(&event.thread_id) {
                        threads.push(event.thread_id);
                    }
                }
                END => {
                    // The root can be popped too; later begins then reuse it
                    // as the parent.
                    if let Some(id) = stack.pop() {
                        spans[id].elapsed = event.timestamp - spans[id].start;
                    }
                }
                other => tracing::trace!(kind = other, "skipping unknown event"),
            }
        }

        let mut snapshot = Snapshot { format, spans, threads, range: None };
        snapshot.range = snapshot.compute_range();
        snapshot
    }

    fn compute_range(&self) -> Option<TimeRange> {
        self.children(ROOT).fold(None, |acc: Option<TimeRange>, (_, span)| {
            Some(match acc {
                None => TimeRange { start: span.start, end: span.end() },
                Some(r) => TimeRange { start: r.start.min(span.start), end: r.end.max(span.end()) },
            })
        })
    }

    pub fn format(&self) -> Format {
        self.format
    }

    /// Number of real spans, excluding the sentinel and the root.
    pub fn len(&self) -> usize {
        self.spans.len() - 2
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn span(&self, id: SpanId) -> Option<&Span> {
        if id == NONE {
            return None;
        }
        self.spans.get(id)
    }

    /// Direct children of `id` in start order.
    pub fn children(&self, id: SpanId) -> Children<'_> {
        let next = self.span(id).map_or(NONE, |s| s.first_child);
        Children { snapshot: self, next }
    }

    /// Every span depth-first, with top-level spans at depth 0.
    pub fn walk(&self) -> Walk<'_> {
        Walk { snapshot: self, next: self.spans[ROOT].first_child, depth: 0 }
    }

    /// Thread ids in order of first appearance.
    pub fn threads(&self) -> &[u32] {
        &self.threads
    }

    /// Earliest start to latest end over the top-level spans. `None` for a
    /// snapshot without events.
    pub fn time_range(&self) -> Option<TimeRange> {
        self.range
    }

    /// Seconds covered by the snapshot; zero when empty.
    pub fn frame_time(&self) -> f64 {
        self.range.map_or(0.0, |r| r.duration())
    }
}

pub struct Children<'a> {
    snapshot: &'a Snapshot,
    next: SpanId,
}

impl<'a> Iterator for Children<'a> {
    type Item = (SpanId, &'a Span);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.next;
        let span = self.snapshot.span(id)?;
        self.next = span.next_sibling;
        Some((id, span))
    }
}

pub struct Walk<'a> {
    snapshot: &'a Snapshot,
    next: SpanId,
    depth: usize,
}

impl<'a> Iterator for Walk<'a> {
    /// (depth, id, span)
    type Item = (usize, SpanId, &'a Span);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.next;
        let span = self.snapshot.span(id)?;
        let depth = self.depth;

        if span.first_child != NONE {
            self.next = span.first_child;
            self.depth += 1;
            return Some((depth, id, span));
        }
        let (mut cur, mut d) = (span, depth);
        self.next = loop {
            if cur.next_sibling != NONE {
                self.depth = d;
                break cur.next_sibling;
            }
            if cur.parent == ROOT || d == 0 {
                break NONE;
            }
            match self.snapshot.span(cur.parent) {
                Some(parent) => cur = parent,
                None => break NONE,
            }
            d -= 1;
        };
        Some((depth, id, span))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::build::*;

    #[test]
    fn single_span() {
        let snap = decode(&v1(&[begin(0xabc, 10.0, 5, 2), end(25.0)])).unwrap();
        let top: Vec<_> = snap.children(ROOT).collect();
        assert_eq!(top.len(), 1);
        let span = top[0].1;
        assert_eq!(span.start, 10.0);
        assert_eq!(span.elapsed, 15.0);
        assert_eq!(span.thread_id, 5);
        assert_eq!(span.core_id, 2);
        assert_eq!(span.name, Hash64(0xabc));
        assert_eq!(snap.time_range(), Some(TimeRange { start: 10.0, end: 25.0 }));
        assert_eq!(snap.frame_time(), 15.0);
    }

    #[test]
    fn nested_spans() {
        let events = [begin(0xa, 0.0, 1, 0), begin(0xb, 1.0, 1, 0), end(5.0), end(10.0)];
        for buf in [v1(&events), v2(&events)] {
            let snap = decode(&buf).unwrap();
            let (a_id, a) = snap.children(ROOT).next().unwrap();
            assert_eq!(a.name, Hash64(0xa));
            assert_eq!(a.elapsed, 10.0);
            let (b_id, b) = snap.children(a_id).next().unwrap();
            assert_eq!(b.name, Hash64(0xb));
            assert_eq!(b.elapsed, 4.0);
            assert_eq!(b.parent, a_id);
            assert_eq!(snap.span(b_id).unwrap().first_child, NONE);
        }
    }

    #[test]
    fn siblings_are_linked_both_ways() {
        let events = [begin(1, 0.0, 1, 0), end(1.0), begin(2, 2.0, 1, 0), end(3.0), begin(3, 4.0, 2, 0), end(6.0)];
        let snap = decode(&v1(&events)).unwrap();
        let ids: Vec<_> = snap.children(ROOT).map(|(id, _)| id).collect();
        assert_eq!(ids, vec![2, 3, 4]);
        assert_eq!(snap.span(3).unwrap().prev_sibling, 2);
        assert_eq!(snap.span(3).unwrap().next_sibling, 4);
        assert_eq!(snap.span(2).unwrap().prev_sibling, NONE);
        assert_eq!(snap.time_range(), Some(TimeRange { start: 0.0, end: 6.0 }));
        assert_eq!(snap.threads(), &[1, 2]);
    }

    #[test]
    fn one_stack_across_threads() {
        // A span from another thread opened inside an open span becomes its child.
        let events = [begin(1, 0.0, 1, 0), begin(2, 0.5, 2, 1), end(0.7), end(1.0)];
        let snap = decode(&v1(&events)).unwrap();
        let (outer, _) = snap.children(ROOT).next().unwrap();
        let (_, inner) = snap.children(outer).next().unwrap();
        assert_eq!(inner.thread_id, 2);
    }

    #[test]
    fn stray_end_events_are_ignored() {
        let events = [end(1.0), end(2.0), begin(1, 3.0, 1, 0), end(4.0), end(5.0)];
        let snap = decode(&v1(&events)).unwrap();
        assert_eq!(snap.len(), 1);
    }

    #[test]
    fn unclosed_span_has_zero_elapsed() {
        let snap = decode(&v1(&[begin(1, 3.0, 1, 0)])).unwrap();
        let (_, span) = snap.children(ROOT).next().unwrap();
        assert_eq!(span.elapsed, 0.0);
        assert_eq!(snap.time_range(), Some(TimeRange { start: 3.0, end: 3.0 }));
    }

    #[test]
    fn empty_snapshot_has_no_range() {
        let snap = decode(&v2(&[])).unwrap();
        assert!(snap.is_empty());
        assert_eq!(snap.time_range(), None);
        assert_eq!(snap.frame_time(), 0.0);
        assert_eq!(snap.walk().count(), 0);
    }

    #[test]
    fn arena_is_rounded_to_eight() {
        let events: Vec<_> = (0..7).flat_map(|i| [begin(i, i as f64, 0, 0), end(i as f64 + 0.5)]).collect();
        let snap = decode(&v1(&events)).unwrap();
        assert_eq!(snap.len(), 7);
        assert_eq!(snap.spans.capacity() % 8, 0);
        assert!(snap.spans.capacity() >= 9);
    }

    #[test]
    fn walk_is_depth_first() {
        // a { b { c } d } e
        let events = [
            begin(0xa, 0.0, 0, 0),
            begin(0xb, 1.0, 0, 0),
            begin(0xc, 2.0, 0, 0),
            end(3.0),
            end(4.0),
            begin(0xd, 5.0, 0, 0),
            end(6.0),
            end(7.0),
            begin(0xe, 8.0, 0, 0),
            end(9.0),
        ];
        let snap = decode(&v1(&events)).unwrap();
        let order: Vec<_> = snap.walk().map(|(depth, _, s)| (depth, s.name.0)).collect();
        assert_eq!(order, vec![(0, 0xa), (1, 0xb), (2, 0xc), (1, 0xd), (0, 0xe)]);
    }
}
