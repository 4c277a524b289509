//! A WebSocket connection that queues outbound messages until the socket is
//! open and fans inbound frames out to any number of subscribers.

use crate::message::Message;
use crate::{BridgeError, GRACEFUL_CLOSE_CODES};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::error::ProtocolError;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
    Failed,
}

/// One inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Message(Message),
    /// Binary frames are profiler snapshots; passed through untouched.
    Binary(Vec<u8>),
}

type Item = Result<Frame, BridgeError>;

#[derive(Default)]
struct Hub {
    subscribers: Vec<mpsc::UnboundedSender<Item>>,
    /// Set once the connection has ended; `Some(None)` is a graceful end.
    outcome: Option<Option<BridgeError>>,
}

impl Hub {
    fn publish(&mut self, item: Item) {
        self.subscribers.retain(|tx| tx.send(item.clone()).is_ok());
    }

    /// Record the outcome and end every subscriber's stream. The state is
    /// published before the streams end so readers never see a stale one.
    fn finish(&mut self, failure: Option<BridgeError>, state: &watch::Sender<ConnectionState>) {
        let next = if failure.is_some() { ConnectionState::Failed } else { ConnectionState::Closed };
        if let Some(e) = &failure {
            self.publish(Err(e.clone()));
        }
        self.outcome = Some(failure);
        state.send_replace(next);
        self.subscribers.clear();
    }
}

/// Connection to an engine console or profiler endpoint.
///
/// `send` may be called at any time; messages sent before the socket opens
/// are queued and flushed, in order, as soon as it does. Dropping the
/// connection disposes it.
pub struct Connection {
    url: String,
    outbound: Mutex<Option<mpsc::UnboundedSender<String>>>,
    shutdown: watch::Sender<bool>,
    state: watch::Receiver<ConnectionState>,
    hub: Arc<Mutex<Hub>>,
    primary: Subscription,
}

impl Connection {
    /// Start connecting to `url`. Must be called from within a tokio runtime.
    pub fn connect(url: &str) -> Connection {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (shutdown, shutdown_rx) = watch::channel(false);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);
        let hub = Arc::new(Mutex::new(Hub::default()));
        let primary = subscribe(&hub);

        match url::Url::parse(url) {
            Ok(parsed) if matches!(parsed.scheme(), "ws" | "wss") => {
                tokio::spawn(drive(url.to_string(), out_rx, shutdown_rx, state_tx, hub.clone()));
            }
            Ok(parsed) => {
                let reason = format!("unsupported scheme '{}'", parsed.scheme());
                fail_early(url, reason, &state_tx, &hub);
            }
            Err(e) => fail_early(url, e.to_string(), &state_tx, &hub),
        }

        Connection {
            url: url.to_string(),
            outbound: Mutex::new(Some(out_tx)),
            shutdown,
            state: state_rx,
            hub,
            primary,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Wait until the socket is open. Fails if it ends before opening.
    pub async fn opened(&self) -> Result<(), BridgeError> {
        let mut state = self.state.clone();
        loop {
            let current = *state.borrow_and_update();
            match current {
                ConnectionState::Open => return Ok(()),
                ConnectionState::Closed => return Err(BridgeError::Disconnected),
                ConnectionState::Failed => {
                    let outcome = self.hub.lock().outcome.clone().flatten();
                    return Err(outcome.unwrap_or(BridgeError::Disconnected));
                }
                ConnectionState::Connecting => {}
            }
            if state.changed().await.is_err() {
                return Err(BridgeError::Disconnected);
            }
        }
    }

    /// Queue a text frame for sending.
    pub fn send(&self, text: impl Into<String>) -> Result<(), BridgeError> {
        match self.outbound.lock().as_ref() {
            Some(tx) => tx.send(text.into()).map_err(|_| BridgeError::Disconnected),
            None => Err(BridgeError::Disconnected),
        }
    }

    /// Next inbound frame on the connection's own stream.
    ///
    /// `None` means the connection ended gracefully. A terminal error is
    /// yielded once, followed by `None`.
    pub async fn recv(&mut self) -> Option<Result<Frame, BridgeError>> {
        self.primary.recv().await
    }

    /// An additional stream of inbound frames arriving from now on.
    pub fn subscribe(&self) -> Subscription {
        subscribe(&self.hub)
    }

    /// Force-close the socket and drop anything still queued. Safe to call
    /// more than once.
    pub fn close(&self) {
        self.outbound.lock().take();
        self.shutdown.send_replace(true);
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}

pub struct Subscription {
    rx: mpsc::UnboundedReceiver<Item>,
}

impl Subscription {
    pub async fn recv(&mut self) -> Option<Result<Frame, BridgeError>> {
        self.rx.recv().await
    }
}

fn subscribe(hub: &Arc<Mutex<Hub>>) -> Subscription {
    let (tx, rx) = mpsc::unbounded_channel();
    let mut hub = hub.lock();
    match &hub.outcome {
        None => hub.subscribers.push(tx),
        Some(Some(e)) => {
            let _ = tx.send(Err(e.clone()));
        }
        Some(None) => {}
    }
    Subscription { rx }
}

fn fail_early(url: &str, reason: String, state: &watch::Sender<ConnectionState>, hub: &Arc<Mutex<Hub>>) {
    tracing::warn!(url, %reason, "cannot connect");
    hub.lock().finish(Some(BridgeError::Connect { url: url.to_string(), reason }), state);
}

fn finish(state: &watch::Sender<ConnectionState>, hub: &Arc<Mutex<Hub>>, failure: Option<BridgeError>) {
    hub.lock().finish(failure, state);
}

async fn drive(
    url: String,
    mut outbound: mpsc::UnboundedReceiver<String>,
    mut shutdown: watch::Receiver<bool>,
    state: watch::Sender<ConnectionState>,
    hub: Arc<Mutex<Hub>>,
) {
    let connected = tokio::select! {
        res = tokio_tungstenite::connect_async(url.as_str()) => res,
        _ = shutdown.changed() => {
            tracing::debug!(%url, "disposed while connecting");
            return finish(&state, &hub, None);
        }
    };
    let mut ws = match connected {
        Ok((ws, _resp)) => ws,
        Err(e) => {
            tracing::warn!(%url, error = %e, "connect failed");
            return finish(&state, &hub, Some(BridgeError::Connect { url, reason: e.to_string() }));
        }
    };

    // Flush what was queued while connecting before anything sent later.
    let mut flushed = 0usize;
    while let Ok(text) = outbound.try_recv() {
        if let Err(e) = ws.send(WsMessage::Text(text)).await {
            return finish(&state, &hub, Some(BridgeError::Transport(e.to_string())));
        }
        flushed += 1;
    }
    tracing::info!(%url, flushed, "connection open");
    state.send_replace(ConnectionState::Open);

    let failure = pump(&mut ws, &mut outbound, &mut shutdown, &hub).await;
    match &failure {
        Some(e) => tracing::warn!(%url, error = %e, "connection failed"),
        None => tracing::info!(%url, "connection closed"),
    }
    finish(&state, &hub, failure);
}

/// Move frames both ways until the socket closes or the connection is disposed.
/// Messages accepted by `send` before disposal are still written.
async fn pump(
    ws: &mut Socket,
    outbound: &mut mpsc::UnboundedReceiver<String>,
    shutdown: &mut watch::Receiver<bool>,
    hub: &Arc<Mutex<Hub>>,
) -> Option<BridgeError> {
    loop {
        tokio::select! {
            biased;
            next = outbound.recv() => match next {
                Some(text) => {
                    if let Err(e) = ws.send(WsMessage::Text(text)).await {
                        return Some(BridgeError::Transport(e.to_string()));
                    }
                }
                None => {
                    let _ = ws.close(None).await;
                    return None;
                }
            },
            _ = shutdown.changed() => {
                outbound.close();
                let _ = ws.close(None).await;
                return None;
            }
            incoming = ws.next() => match incoming {
                Some(Ok(WsMessage::Text(text))) => {
                    let item = Message::from_text(&text).map(Frame::Message);
                    if let Err(e) = &item {
                        tracing::warn!(error = %e, "dropping malformed frame");
                    }
                    hub.lock().publish(item);
                }
                Some(Ok(WsMessage::Binary(bytes))) => {
                    tracing::debug!(len = bytes.len(), "binary frame");
                    hub.lock().publish(Ok(Frame::Binary(bytes)));
                }
                Some(Ok(WsMessage::Close(frame))) => {
                    let _ = ws.close(None).await;
                    return close_outcome(frame);
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return error_outcome(e),
                None => return None,
            },
        }
    }
}

fn close_outcome(frame: Option<CloseFrame<'_>>) -> Option<BridgeError> {
    let (code, reason) = match frame {
        Some(f) => (u16::from(f.code), f.reason.to_string()),
        None => (1005, String::new()),
    };
    if GRACEFUL_CLOSE_CODES.contains(&code) {
        None
    } else {
        Some(BridgeError::Closed { code, reason })
    }
}

fn error_outcome(e: WsError) -> Option<BridgeError> {
    match e {
        // Peer went away without a close handshake: an abnormal (1006) close.
        WsError::ConnectionClosed | WsError::AlreadyClosed | WsError::Protocol(ProtocolError::ResetWithoutClosingHandshake) => None,
        other => Some(BridgeError::Transport(other.to_string())),
    }
}
