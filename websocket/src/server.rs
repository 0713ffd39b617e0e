//! WebSocket server implementation.
//!
//! Accepts connections at `/ws` (and `/sensorhub`, the path dashboards
//! historically used) and pushes every published reading to every connected
//! client. Each connection gets its own broadcast receiver and forwarder task.

use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::State,
    response::IntoResponse,
    routing::get,
    Router,
};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use srt_types::Reading;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, Mutex};
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};

use crate::events::FanoutEvent;
use crate::FanoutError;

/// Default number of frames buffered per subscriber before it starts lagging.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

type WsSink = Arc<Mutex<SplitSink<WebSocket, Message>>>;

/// Shared fanout state: one broadcast channel of serialized `NewReading` frames.
pub struct WsState {
    reading_tx: broadcast::Sender<String>,
    next_connection_id: AtomicU64,
}

impl WsState {
    pub fn new(channel_capacity: usize) -> Self {
        let (reading_tx, _) = broadcast::channel(channel_capacity);
        Self {
            reading_tx,
            next_connection_id: AtomicU64::new(1),
        }
    }

    /// Push a reading to every connected client.
    ///
    /// Returns the number of subscribers the frame was queued for. Having no
    /// subscribers is not an error.
    pub fn publish_reading(&self, reading: &Reading) -> Result<usize, FanoutError> {
        let frame = serde_json::to_string(&FanoutEvent::new_reading(reading))?;
        Ok(self.reading_tx.send(frame).unwrap_or(0))
    }

    /// Number of live connections.
    pub fn subscriber_count(&self) -> usize {
        self.reading_tx.receiver_count()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.reading_tx.subscribe()
    }

    fn next_connection_id(&self) -> u64 {
        self.next_connection_id.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for WsState {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

/// The WebSocket server, configured with a port and shared state.
pub struct WebSocketServer {
    pub port: u16,
    pub state: Arc<WsState>,
}

impl WebSocketServer {
    pub fn new(port: u16) -> Self {
        Self::with_state(port, Arc::new(WsState::default()))
    }

    pub fn with_state(port: u16, state: Arc<WsState>) -> Self {
        Self { port, state }
    }

    /// WebSocket routes with a permissive CORS policy.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/ws", get(ws_handler))
            .route("/sensorhub", get(ws_handler))
            .with_state(self.state.clone())
            .layer(CorsLayer::permissive())
    }

    /// Bind `0.0.0.0:port` and serve until the task is dropped.
    pub async fn start(&self) -> Result<(), FanoutError> {
        let addr = format!("0.0.0.0:{}", self.port);
        let listener = TcpListener::bind(&addr).await?;
        self.serve(listener, Router::new()).await
    }

    /// Serve on an already bound listener, alongside `extra` routes.
    pub async fn serve(&self, listener: TcpListener, extra: Router) -> Result<(), FanoutError> {
        let app = self.router().merge(extra);
        info!(addr = %listener.local_addr()?, "WebSocket server listening");
        axum::serve(listener, app).await?;
        Ok(())
    }
}

/// Upgrade handler. The receiver is created before the upgrade completes so a
/// client sees every frame published after its handshake.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<WsState>>) -> impl IntoResponse {
    let rx = state.subscribe();
    let connection_id = state.next_connection_id();
    ws.on_upgrade(move |socket| handle_socket(socket, rx, connection_id))
}

async fn handle_socket(socket: WebSocket, rx: broadcast::Receiver<String>, connection_id: u64) {
    let (ws_sender, mut ws_receiver) = socket.split();
    let ws_sender: WsSink = Arc::new(Mutex::new(ws_sender));

    info!(connection_id, "WebSocket client connected");

    let forwarder = tokio::spawn(forward_events(rx, ws_sender.clone(), connection_id));

    while let Some(msg_result) = ws_receiver.next().await {
        let msg = match msg_result {
            Ok(msg) => msg,
            Err(e) => {
                warn!(connection_id, error = %e, "WebSocket receive error");
                break;
            }
        };

        match msg {
            Message::Close(_) => {
                debug!(connection_id, "client sent close frame");
                break;
            }
            Message::Ping(data) => {
                let mut sender = ws_sender.lock().await;
                let _ = sender.send(Message::Pong(data)).await;
            }
            // Clients only listen; anything else they send is ignored.
            _ => {}
        }
    }

    forwarder.abort();
    info!(connection_id, "WebSocket client disconnected");
}

/// Forwarder task: copies frames from the broadcast channel to one client.
async fn forward_events(mut rx: broadcast::Receiver<String>, ws_sender: WsSink, connection_id: u64) {
    loop {
        match rx.recv().await {
            Ok(frame) => {
                let mut sender = ws_sender.lock().await;
                if sender.send(Message::Text(frame)).await.is_err() {
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!(connection_id, skipped = n, "client lagged behind, readings dropped");
            }
            Err(broadcast::error::RecvError::Closed) => {
                debug!(connection_id, "broadcast channel closed");
                break;
            }
        }
    }
}
