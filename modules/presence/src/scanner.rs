//! Shared polling scanner with subscribe/unsubscribe semantics.
//!
//! One poll loop runs while at least one [`Subscription`] is alive. Every
//! subscriber sees the same transitions; a late subscriber is first told
//! about every port already known to be open.

use crate::tracker::{InFlight, PortTracker};
use crate::{bounded, connect, PortEvent};
use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{interval, MissedTickBehavior};

const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Checks whether something is listening on a port.
pub trait Prober: Send + Sync + 'static {
    fn probe(&self, port: u16) -> BoxFuture<'static, bool>;
}

/// TCP connect probe. The scanner bounds each attempt by
/// [`ScanOptions::probe_timeout`].
#[derive(Debug, Clone)]
pub struct TcpProber {
    host: String,
}

impl TcpProber {
    pub fn new(host: impl Into<String>) -> Self {
        TcpProber { host: host.into() }
    }
}

impl Prober for TcpProber {
    fn probe(&self, port: u16) -> BoxFuture<'static, bool> {
        let host = self.host.clone();
        Box::pin(async move { connect(&host, port).await })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ScanOptions {
    pub interval: Duration,
    pub probe_timeout: Duration,
}

impl Default for ScanOptions {
    fn default() -> Self {
        ScanOptions { interval: Duration::from_millis(1000), probe_timeout: Duration::from_millis(500) }
    }
}

struct State {
    tracker: PortTracker,
    subscribers: Vec<(u64, mpsc::UnboundedSender<PortEvent>)>,
    next_id: u64,
    poller: Option<JoinHandle<()>>,
}

struct Shared {
    state: Mutex<State>,
    prober: Arc<dyn Prober>,
    ports: RangeInclusive<u16>,
    options: ScanOptions,
}

impl Shared {
    fn complete(&self, port: u16, reachable: bool) {
        let mut state = self.state.lock();
        if let Some(event) = state.tracker.complete(port, reachable) {
            tracing::info!(port, status = ?event.status, "port state changed");
            for (_, tx) in &state.subscribers {
                let _ = tx.send(event);
            }
        }
    }

    fn unsubscribe(&self, id: u64) {
        let mut state = self.state.lock();
        state.subscribers.retain(|(sid, _)| *sid != id);
        if state.subscribers.is_empty() {
            if let Some(poller) = state.poller.take() {
                tracing::debug!("last subscriber left, stopping port poll");
                poller.abort();
            }
        }
    }
}

/// Watches a range of ports on one host and reports open/closed transitions.
#[derive(Clone)]
pub struct PresenceScanner {
    shared: Arc<Shared>,
}

impl PresenceScanner {
    /// Scanner probing `host` over TCP.
    pub fn new(host: impl Into<String>, ports: RangeInclusive<u16>, options: ScanOptions) -> Self {
        Self::with_prober(ports, options, TcpProber::new(host))
    }

    /// Scanner using a custom prober. Each check is still bounded by
    /// `options.probe_timeout`; a zero interval is raised to one millisecond.
    pub fn with_prober(ports: RangeInclusive<u16>, options: ScanOptions, prober: impl Prober) -> Self {
        let options = ScanOptions { interval: options.interval.max(MIN_INTERVAL), ..options };
        let state = State { tracker: PortTracker::default(), subscribers: Vec::new(), next_id: 0, poller: None };
        let shared = Shared { state: Mutex::new(state), prober: Arc::new(prober), ports, options };
        PresenceScanner { shared: Arc::new(shared) }
    }

    /// Subscribe to port transitions. Must be called from within a tokio runtime;
    /// the first subscriber starts polling.
    pub fn observe(&self) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.shared.state.lock();
        for port in state.tracker.open_ports() {
            let _ = tx.send(PortEvent::opened(port));
        }
        let id = state.next_id;
        state.next_id += 1;
        state.subscribers.push((id, tx));
        if state.poller.is_none() {
            tracing::debug!("first subscriber, starting port poll");
            state.poller = Some(tokio::spawn(poll(self.shared.clone())));
        }
        Subscription { id, rx, shared: self.shared.clone() }
    }
}

/// A live stream of port transitions. Dropping it unsubscribes.
pub struct Subscription {
    id: u64,
    rx: mpsc::UnboundedReceiver<PortEvent>,
    shared: Arc<Shared>,
}

impl Subscription {
    pub async fn recv(&mut self) -> Option<PortEvent> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<PortEvent> {
        self.rx.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.shared.unsubscribe(self.id);
    }
}

async fn poll(shared: Arc<Shared>) {
    let ScanOptions { interval: period, probe_timeout } = shared.options;
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // Both die with this task when it is aborted, abandoning outstanding probes.
    let mut in_flight = InFlight::new(shared.ports.clone());
    let mut probes = JoinSet::new();
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                for port in in_flight.begin_tick() {
                    let probe = shared.prober.probe(port);
                    probes.spawn(async move { (port, bounded(port, probe_timeout, probe).await) });
                }
            }
            Some(done) = probes.join_next(), if !probes.is_empty() => {
                if let Ok((port, reachable)) = done {
                    in_flight.finish(port);
                    shared.complete(port, reachable);
                }
            }
        }
    }
}
