use crate::PortEvent;
use std::collections::{BTreeSet, HashSet};
use std::ops::RangeInclusive;

/// Scanner-owned port state: which ports are known open. Closed ports are
/// never stored.
#[derive(Debug, Default)]
pub(crate) struct PortTracker {
    open: BTreeSet<u16>,
}

impl PortTracker {
    /// Record a finished probe, returning the transition it caused, if any.
    pub fn complete(&mut self, port: u16, reachable: bool) -> Option<PortEvent> {
        if reachable {
            self.open.insert(port).then(|| PortEvent::opened(port))
        } else {
            self.open.remove(&port).then(|| PortEvent::closed(port))
        }
    }

    pub fn open_ports(&self) -> impl Iterator<Item = u16> + '_ {
        self.open.iter().copied()
    }
}

/// Ports with a probe outstanding. Owned by a single poll task and dropped
/// with it, together with the probes it started.
#[derive(Debug)]
pub(crate) struct InFlight {
    range: RangeInclusive<u16>,
    ports: HashSet<u16>,
}

impl InFlight {
    pub fn new(range: RangeInclusive<u16>) -> Self {
        InFlight { range, ports: HashSet::new() }
    }

    /// Ports to probe on this tick; each is marked in flight. Ports still
    /// being probed from an earlier tick are skipped.
    pub fn begin_tick(&mut self) -> Vec<u16> {
        let mut ports = Vec::new();
        for port in self.range.clone() {
            if self.ports.insert(port) {
                ports.push(port);
            }
        }
        ports
    }

    pub fn finish(&mut self, port: u16) {
        self.ports.remove(&port);
    }
}
