//! Core utilities and shared types for talking to running engine instances.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

pub const fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Default port of the engine console.
pub const CONSOLE_PORT: u16 = 14030;
/// Port the asset server listens on.
pub const ASSET_SERVER_PORT: u16 = 14032;
/// Console port used by Xbox One dev kits.
pub const XB1_CONSOLE_PORT: u16 = 4601;
/// Range that locally running engine instances bind their console to.
pub const LOCAL_CONSOLE_PORTS: RangeInclusive<u16> = 14000..=CONSOLE_PORT;

pub const LOCALHOST: &str = "127.0.0.1";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EndpointError {
    #[error("empty endpoint")]
    Empty,
    #[error("invalid port in endpoint: {0}")]
    InvalidPort(String),
}

/// A candidate engine or asset-server process.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Endpoint { host: host.into(), port }
    }

    pub fn localhost(port: u16) -> Self {
        Endpoint::new(LOCALHOST, port)
    }

    /// WebSocket URL for this endpoint. `path` may be empty or start with '/'.
    pub fn ws_url(&self, path: &str) -> String {
        if path.is_empty() || path.starts_with('/') {
            format!("ws://{}:{}{}", self.host, self.port, path)
        } else {
            format!("ws://{}:{}/{}", self.host, self.port, path)
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Accepts `host:port` or a bare port, which means localhost.
impl FromStr for Endpoint {
    type Err = EndpointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(EndpointError::Empty);
        }
        let parse_port = |p: &str| p.parse::<u16>().map_err(|_| EndpointError::InvalidPort(s.to_string()));
        match s.rsplit_once(':') {
            Some((host, port)) => {
                let host = if host.is_empty() { LOCALHOST } else { host };
                Ok(Endpoint::new(host, parse_port(port)?))
            }
            None => Ok(Endpoint::localhost(parse_port(s)?)),
        }
    }
}

impl From<u16> for Endpoint {
    fn from(port: u16) -> Self {
        Endpoint::localhost(port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_set() {
        assert!(!version().is_empty());
    }

    #[test]
    fn parse_host_and_port() {
        let e: Endpoint = "10.0.0.2:4601".parse().unwrap();
        assert_eq!(e, Endpoint::new("10.0.0.2", XB1_CONSOLE_PORT));
        assert_eq!(e.to_string(), "10.0.0.2:4601");
    }

    #[test]
    fn bare_port_is_localhost() {
        let e: Endpoint = "14030".parse().unwrap();
        assert_eq!(e, Endpoint::localhost(CONSOLE_PORT));
        let e: Endpoint = ":14032".parse().unwrap();
        assert_eq!(e.host, LOCALHOST);
    }

    #[test]
    fn reject_invalid() {
        assert_eq!("".parse::<Endpoint>(), Err(EndpointError::Empty));
        assert!("host:notaport".parse::<Endpoint>().is_err());
        assert!("host:70000".parse::<Endpoint>().is_err());
    }

    #[test]
    fn ws_urls() {
        let e = Endpoint::localhost(14030);
        assert_eq!(e.ws_url(""), "ws://127.0.0.1:14030");
        assert_eq!(e.ws_url("/profiler"), "ws://127.0.0.1:14030/profiler");
        assert_eq!(e.ws_url("profiler"), "ws://127.0.0.1:14030/profiler");
    }

    #[test]
    fn serializes_as_object() {
        let v = serde_json::to_value(Endpoint::localhost(1)).unwrap();
        assert_eq!(v, serde_json::json!({"host": "127.0.0.1", "port": 1}));
    }
}
