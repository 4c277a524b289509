//! Request/response correlation over a shared connection.

use crate::connection::{Connection, Frame};
use crate::message::Message;
use crate::BridgeError;
use serde_json::{Map, Value};
use std::time::Duration;

pub const REQUEST_TIMEOUT: Duration = Duration::from_millis(1000);

impl Connection {
    /// Send `body` tagged with a fresh id and wait for the first inbound
    /// message carrying the same id. Other traffic is left to the
    /// connection's other subscribers.
    pub async fn request(&self, mut body: Map<String, Value>, within: Duration) -> Result<Message, BridgeError> {
        let id = uuid::Uuid::new_v4().to_string();
        body.insert("id".to_string(), Value::String(id.clone()));

        // Subscribe first so a fast reply cannot slip past.
        let mut replies = self.subscribe();
        self.send(Value::Object(body).to_string())?;
        tracing::debug!(%id, "request sent");

        let wait = async {
            while let Some(item) = replies.recv().await {
                match item {
                    Ok(Frame::Message(msg)) if msg.id() == Some(id.as_str()) => return Ok(msg),
                    Ok(_) => {}
                    Err(e) if e.is_terminal() => return Err(e),
                    Err(_) => {}
                }
            }
            Err(BridgeError::Disconnected)
        };
        match tokio::time::timeout(within, wait).await {
            Ok(res) => res,
            Err(_) => {
                tracing::warn!(%id, ?within, "request timed out");
                Err(BridgeError::Timeout { id, after: within })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::{SinkExt, StreamExt};
    use serde_json::json;
    use tokio::net::TcpListener;
    use tokio_tungstenite::tungstenite::Message as WsMessage;

    fn body(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            _ => unreachable!(),
        }
    }

    /// Echo server that answers each request after an unrelated message,
    /// or never answers when `silent`.
    async fn spawn_server(silent: bool) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            while let Some(Ok(WsMessage::Text(text))) = ws.next().await {
                if silent {
                    continue;
                }
                let req: Value = serde_json::from_str(&text).unwrap();
                let noise = json!({"type": "message", "id": "someone-else"});
                ws.send(WsMessage::Text(noise.to_string())).await.unwrap();
                let reply = json!({"type": "reply", "id": req["id"], "echo": req["value"]});
                ws.send(WsMessage::Text(reply.to_string())).await.unwrap();
            }
        });
        url
    }

    #[tokio::test]
    async fn reply_matched_by_id() {
        let url = spawn_server(false).await;
        let conn = Connection::connect(&url);
        let reply = conn.request(body(json!({"type": "ping", "value": 7})), Duration::from_secs(5)).await.unwrap();
        assert_eq!(reply.kind(), Some("reply"));
        assert_eq!(reply.get("echo"), Some(&json!(7)));
    }

    #[tokio::test]
    async fn concurrent_requests_share_connection() {
        let url = spawn_server(false).await;
        let conn = Connection::connect(&url);
        let (a, b) = tokio::join!(
            conn.request(body(json!({"value": "a"})), Duration::from_secs(5)),
            conn.request(body(json!({"value": "b"})), Duration::from_secs(5)),
        );
        assert_eq!(a.unwrap().get("echo"), Some(&json!("a")));
        assert_eq!(b.unwrap().get("echo"), Some(&json!("b")));
    }

    #[tokio::test]
    async fn silence_is_a_timeout_not_a_close() {
        let url = spawn_server(true).await;
        let conn = Connection::connect(&url);
        let err = conn.request(body(json!({"value": 1})), Duration::from_millis(100)).await.unwrap_err();
        assert!(matches!(err, BridgeError::Timeout { .. }), "{err:?}");
    }

    #[tokio::test]
    async fn closed_connection_refuses_requests() {
        let url = spawn_server(false).await;
        let conn = Connection::connect(&url);
        conn.close();
        let err = conn.request(body(json!({})), REQUEST_TIMEOUT).await.unwrap_err();
        assert_eq!(err, BridgeError::Disconnected);
    }
}
