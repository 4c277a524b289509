//! Message bridge to a running engine: a WebSocket connection carrying JSON
//! control messages and binary profiler snapshots.

mod backoff;
mod connection;
mod message;
mod request;

pub use backoff::Backoff;
pub use connection::{Connection, ConnectionState, Frame, Subscription};
pub use message::{EngineMessage, LogLine, Message, Outbound, ThreadEntry};
pub use request::REQUEST_TIMEOUT;

use std::time::Duration;
use tokio::time::timeout;

/// Close codes that end a connection without error: normal closure,
/// no status received, and abnormal (dropped) closure.
pub const GRACEFUL_CLOSE_CODES: [u16; 3] = [1000, 1005, 1006];

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BridgeError {
    #[error("failed to connect to {url}: {reason}")]
    Connect { url: String, reason: String },
    #[error("socket error: {0}")]
    Transport(String),
    #[error("socket exception '{code}': {reason}")]
    Closed { code: u16, reason: String },
    #[error("malformed frame: {0}")]
    Decode(String),
    #[error("request {id} timed out after {after:?}")]
    Timeout { id: String, after: Duration },
    #[error("connection is closed")]
    Disconnected,
}

impl BridgeError {
    /// Whether the error ends the inbound stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, BridgeError::Connect { .. } | BridgeError::Transport(_) | BridgeError::Closed { .. })
    }
}

/// Check whether a WebSocket server accepts a handshake at `url`.
pub async fn is_responding(url: &str, within: Duration) -> bool {
    match timeout(within, tokio_tungstenite::connect_async(url)).await {
        Ok(Ok((mut ws, _))) => {
            let _ = ws.close(None).await;
            true
        }
        Ok(Err(e)) => {
            tracing::debug!(url, error = %e, "handshake failed");
            false
        }
        Err(_) => false,
    }
}

/// Whether an asset server is answering on `host`.
pub async fn asset_server_running(host: &str, within: Duration) -> bool {
    let endpoint = srtool_core::Endpoint::new(host, srtool_core::ASSET_SERVER_PORT);
    is_responding(&endpoint.ws_url(""), within).await
}
