//! Discovery of running engine instances by polling local TCP ports.

mod scanner;
mod tracker;

pub use scanner::{PresenceScanner, Prober, ScanOptions, Subscription, TcpProber};

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use srtool_core::Endpoint;
use std::future::Future;
use std::ops::RangeInclusive;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortStatus {
    Opened,
    Closed,
}

/// A port changing state. Only transitions are ever reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortEvent {
    pub port: u16,
    pub status: PortStatus,
}

impl PortEvent {
    pub fn opened(port: u16) -> Self {
        PortEvent { port, status: PortStatus::Opened }
    }

    pub fn closed(port: u16) -> Self {
        PortEvent { port, status: PortStatus::Closed }
    }

    pub fn endpoint(&self, host: &str) -> Endpoint {
        Endpoint::new(host, self.port)
    }
}

/// Parse a comma-separated list of ports/ranges (e.g., "14000-14030,14032") into inclusive ranges.
pub fn parse_port_ranges(spec: &str) -> Result<Vec<RangeInclusive<u16>>> {
    let mut ranges = Vec::new();
    for part in spec.split(',').map(|s| s.trim()).filter(|s| !s.is_empty()) {
        if let Some((start, end)) = part.split_once('-') {
            let s: u16 = start.trim().parse()?;
            let e: u16 = end.trim().parse()?;
            if s == 0 || e == 0 || s > e {
                return Err(anyhow!("invalid port range: {}", part));
            }
            ranges.push(s..=e);
        } else {
            let p: u16 = part.parse()?;
            if p == 0 {
                return Err(anyhow!("invalid port: {}", part));
            }
            ranges.push(p..=p);
        }
    }
    if ranges.is_empty() {
        return Err(anyhow!("no ports given"));
    }
    Ok(ranges)
}

/// Attempt a single TCP connection. Errors and timeouts both count as closed.
pub async fn probe(endpoint: &Endpoint, timeout_per_probe: Duration) -> bool {
    bounded(endpoint.port, timeout_per_probe, connect(&endpoint.host, endpoint.port)).await
}

pub(crate) async fn connect(host: &str, port: u16) -> bool {
    match TcpStream::connect((host, port)).await {
        Ok(_stream) => true,
        Err(e) => {
            tracing::trace!(host, port, error = %e, "probe refused");
            false
        }
    }
}

/// Run a reachability check, reporting the port closed if it outlives `limit`.
pub(crate) async fn bounded(port: u16, limit: Duration, check: impl Future<Output = bool>) -> bool {
    match timeout(limit, check).await {
        Ok(reachable) => reachable,
        Err(_) => {
            tracing::trace!(port, "probe timed out");
            false
        }
    }
}
