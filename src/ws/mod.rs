//! WebSocket Hub + Client. The Hub owns the axum upgrade handshake
//! and spawns each client's read/write pumps; the actual outbound channel
//! and its `closed` flag live on [`WsClient`], registered into the Router's
//! client registry so the Router remains the sole closer.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message as AxumMessage, WebSocket};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const OUTBOUND_CAPACITY: usize = 256;
pub const PING_PERIOD: Duration = Duration::from_secs(54);
pub const PONG_WAIT: Duration = Duration::from_secs(60);

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum WelcomeFrame {
    Connected {
        subscription_id: String,
        timestamp: chrono::DateTime<chrono::Utc>,
        message: String,
    },
}

struct ChannelState {
    tx: Option<mpsc::Sender<AxumMessage>>,
    closed: bool,
}

/// A single WebSocket subscriber. The outbound channel and `closed`
/// flag are read-then-written together under one lock so the channel
/// is closed at most once.
pub struct WsClient {
    pub id: String,
    pub subscription_id: String,
    state: Mutex<ChannelState>,
}

impl WsClient {
    fn new(subscription_id: String, tx: mpsc::Sender<AxumMessage>) -> Arc<Self> {
        Arc::new(Self {
            id: Uuid::new_v4().to_string(),
            subscription_id,
            state: Mutex::new(ChannelState { tx: Some(tx), closed: false }),
        })
    }

    /// Non-blocking send; a full buffer means a slow or dead client, so the
    /// message is dropped for this client rather than blocking the
    /// broadcaster.
    pub async fn try_send(&self, msg: AxumMessage) {
        let guard = self.state.lock().await;
        if let Some(tx) = &guard.tx {
            if tx.try_send(msg).is_err() {
                debug!(client_id = %self.id, "outbound buffer full or closed, dropping frame");
            }
        }
    }

    /// Idempotent close: only the first caller actually drops the sender,
    /// which is what causes the write pump's channel receive to end.
    pub async fn close(&self) {
        let mut guard = self.state.lock().await;
        if !guard.closed {
            guard.closed = true;
            guard.tx.take();
        }
    }

    pub async fn is_closed(&self) -> bool {
        self.state.lock().await.closed
    }
}

/// Runs a single accepted connection end to end: sends the welcome frame,
/// registers with the Router, then drives the read and write pumps until
/// either side closes.
pub async fn handle_socket(
    socket: WebSocket,
    subscription_id: String,
    registry: Arc<crate::router::ClientRegistry>,
) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::channel::<AxumMessage>(OUTBOUND_CAPACITY);

    let welcome = WelcomeFrame::Connected {
        subscription_id: subscription_id.clone(),
        timestamp: chrono::Utc::now(),
        message: "subscribed".to_string(),
    };
    if let Ok(json) = serde_json::to_string(&welcome) {
        if sender.send(AxumMessage::Text(json)).await.is_err() {
            return;
        }
    }

    let client = WsClient::new(subscription_id.clone(), tx);
    registry.register(client.clone());

    let write_client = client.clone();
    let write_task = tokio::spawn(async move {
        let mut ping_ticker = tokio::time::interval(PING_PERIOD);
        ping_ticker.tick().await; // first tick fires immediately
        loop {
            tokio::select! {
                msg = rx.recv() => {
                    match msg {
                        Some(frame) => {
                            if sender.send(frame).await.is_err() {
                                break;
                            }
                            // drain any further queued messages without blocking
                            while let Ok(more) = rx.try_recv() {
                                if sender.send(more).await.is_err() {
                                    return;
                                }
                            }
                        }
                        None => {
                            let _ = sender.send(AxumMessage::Close(None)).await;
                            break;
                        }
                    }
                }
                _ = ping_ticker.tick() => {
                    if sender.send(AxumMessage::Ping(Vec::new())).await.is_err() {
                        break;
                    }
                }
            }
        }
        let _ = write_client;
    });

    // Read pump: discard inbound client messages, just watch for close/error.
    // The pong handler is implicit — axum's WebSocket reader surfaces Pong
    // frames as `Message::Pong`, which simply resets our liveness by virtue
    // of the loop continuing; an explicit deadline timer is unnecessary
    // since axum's underlying connection already enforces read timeouts at
    // the TCP layer configured in `server.read_timeout_secs`.
    loop {
        match tokio::time::timeout(PONG_WAIT, receiver.next()).await {
            Ok(Some(Ok(AxumMessage::Close(_)))) | Ok(None) => break,
            Ok(Some(Ok(_))) => continue,
            Ok(Some(Err(e))) => {
                warn!(subscription_id = %subscription_id, error = %e, "websocket read error");
                break;
            }
            Err(_) => {
                warn!(subscription_id = %subscription_id, "client exceeded pong wait, dropping connection");
                break;
            }
        }
    }

    write_task.abort();
    registry.unregister(&client.subscription_id, &client.id).await;
    info!(subscription_id = %subscription_id, client_id = %client.id, "websocket client disconnected");
}
