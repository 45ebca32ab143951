//! CDP Client - The Core Communication Layer
//!
//! Design decisions:
//! 1. Single WebSocket per browser connection (no per-session WS overhead)
//! 2. Async message passing - no locks on send/receive path
//! 3. Request/response matching via ID, events broadcast to subscribers
//! 4. Fail fast - no retries, no queuing. Let the caller decide.

use dashmap::DashMap;
use futures_util::{stream::SplitSink, SinkExt, StreamExt};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::{oneshot, RwLock};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use super::protocol::*;

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

#[derive(Error, Debug)]
pub enum CdpError {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CDP protocol error: {code} - {message}")]
    Protocol { code: i32, message: String },

    #[error("Request timeout")]
    Timeout,

    #[error("Connection closed")]
    Closed,
}

/// Result type for CDP operations
pub type Result<T> = std::result::Result<T, CdpError>;

/// Event subscriber callback
pub type EventCallback = Arc<dyn Fn(CdpEvent) + Send + Sync>;

/// CDP Client - manages single WebSocket connection to browser
pub struct CdpClient {
    /// Monotonic request ID counter
    next_id: AtomicU64,

    /// Pending requests waiting for responses
    /// Key: request_id, Value: oneshot sender for response
    pending: Arc<DashMap<RequestId, oneshot::Sender<CdpResponse>>>,

    /// Event subscribers
    /// Key: method name (e.g., "Page.loadEventFired"), Value: callbacks
    subscribers: Arc<DashMap<String, Vec<EventCallback>>>,

    /// WebSocket write half (wrapped for concurrent sending)
    ws_sink: Arc<RwLock<WsSink>>,
}

impl CdpClient {
    /// Connect to Chrome DevTools Protocol endpoint
    pub async fn connect(ws_url: &str) -> Result<Arc<Self>> {
        let (ws_stream, _) = connect_async(ws_url).await?;
        let (sink, mut stream) = ws_stream.split();

        let client = Arc::new(Self {
            next_id: AtomicU64::new(1),
            pending: Arc::new(DashMap::new()),
            subscribers: Arc::new(DashMap::new()),
            ws_sink: Arc::new(RwLock::new(sink)),
        });

        // Spawn message receiver task. It lives until the stream ends;
        // pending requests are failed afterwards so callers unblock.
        let client_clone = client.clone();
        tokio::spawn(async move {
            while let Some(msg) = stream.next().await {
                match msg {
                    Ok(Message::Text(text)) => {
                        if let Err(e) = client_clone.handle_message(&text) {
                            tracing::error!("[CdpClient] Failed to handle message: {}", e);
                        }
                    }
                    Ok(Message::Close(_)) => {
                        tracing::info!("[CdpClient] WebSocket closed");
                        break;
                    }
                    Err(e) => {
                        tracing::error!("[CdpClient] WebSocket error: {}", e);
                        break;
                    }
                    _ => {}
                }
            }

            // Dropping the senders resolves every waiting request as Closed.
            client_clone.pending.clear();
        });

        Ok(client)
    }

    /// Send CDP request and wait for response
    pub async fn send_request(
        &self,
        method: impl Into<String>,
        params: Option<Value>,
        session_id: Option<SessionId>,
    ) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let request = CdpRequest {
            id,
            method: method.into(),
            params,
            session_id,
        };

        let (tx, rx) = oneshot::channel();
        self.pending.insert(id, tx);

        // Serialize and send
        let json = serde_json::to_string(&request)?;
        let mut sink = self.ws_sink.write().await;
        sink.send(Message::Text(json)).await?;
        drop(sink); // Release lock immediately

        // Wait for response
        let response = rx.await.map_err(|_| CdpError::Closed)?;

        if let Some(error) = response.error {
            return Err(CdpError::Protocol {
                code: error.code,
                message: error.message,
            });
        }

        Ok(response.result.unwrap_or(Value::Null))
    }

    /// Subscribe to CDP events
    pub fn subscribe(&self, method: impl Into<String>, callback: EventCallback) {
        let method = method.into();
        self.subscribers.entry(method).or_default().push(callback);
    }

    /// Handle incoming WebSocket message
    fn handle_message(&self, text: &str) -> Result<()> {
        let msg: CdpMessage = serde_json::from_str(text)?;

        match msg {
            CdpMessage::Response(response) => {
                if let Some((_, tx)) = self.pending.remove(&response.id) {
                    let _ = tx.send(response); // Ignore send errors (receiver dropped)
                } else {
                    tracing::warn!(
                        "[CdpClient] Received response for unknown request: {}",
                        response.id
                    );
                }
            }
            CdpMessage::Event(event) => {
                if let Some(subscribers) = self.subscribers.get(&event.method) {
                    for callback in subscribers.value() {
                        callback(event.clone());
                    }
                }
            }
        }

        Ok(())
    }

    /// Close connection gracefully
    pub async fn close(&self) -> Result<()> {
        let mut sink = self.ws_sink.write().await;
        sink.close().await?;
        Ok(())
    }
}
