//! Mock key-value store speaking both benchmark transports.
//!
//! - `GET /ws?password=...` upgrades to a WebSocket carrying text commands
//! - `POST /?password=...` takes one command as a `text/plain` body
//!
//! `ADD`/`DEL` mutate an in-memory map, `GET` answers with the value.
//! Every accepted command is also kept in arrival order for inspection.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use bytes::Bytes;
use dashmap::DashMap;
use rand::Rng;
use serde::Deserialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tower_http::trace::TraceLayer;

use super::config::MockServerConfig;
use crate::command::Command;

#[derive(Debug, Deserialize)]
struct AuthParams {
    password: Option<String>,
}

/// Shared state behind the mock store's handlers
struct MockState {
    config: MockServerConfig,
    store: DashMap<String, String>,
    received: Mutex<Vec<String>>,
    posts: AtomicUsize,
}

impl MockState {
    fn check_password(&self, params: &AuthParams) -> Result<(), Response> {
        match &params.password {
            None => Err((StatusCode::BAD_REQUEST, "Password required").into_response()),
            Some(password) if *password != self.config.password => {
                Err((StatusCode::UNAUTHORIZED, "Invalid password").into_response())
            }
            Some(_) => Ok(()),
        }
    }

    /// Apply one command line; returns the reply text, if the command has one
    fn apply(&self, line: &str) -> Result<Option<String>, &'static str> {
        let command = Command::parse(line).ok_or("Invalid command")?;

        if let Ok(mut received) = self.received.lock() {
            received.push(line.to_string());
        }

        let reply = match command {
            Command::Add { key, value } => {
                self.store.insert(key, value);
                None
            }
            Command::Get { key } => Some(
                self.store
                    .get(&key)
                    .map(|entry| entry.value().clone())
                    .unwrap_or_else(|| "Key not found".to_string()),
            ),
            Command::Delete { key } => {
                self.store.remove(&key);
                None
            }
        };

        Ok(reply)
    }
}

/// Mock store server for benchmarking
pub struct MockStoreServer {
    state: Arc<MockState>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    port: u16,
}

impl MockStoreServer {
    /// Create a new mock store with the given configuration
    pub fn new(config: MockServerConfig) -> Self {
        Self {
            state: Arc::new(MockState {
                config,
                store: DashMap::new(),
                received: Mutex::new(Vec::new()),
                posts: AtomicUsize::new(0),
            }),
            shutdown_tx: None,
            port: 0,
        }
    }

    /// Start the mock store and return the actual port
    pub async fn start(&mut self) -> anyhow::Result<u16> {
        let addr = format!("127.0.0.1:{}", self.state.config.port);
        let listener = TcpListener::bind(&addr).await?;
        let port = listener.local_addr()?.port();
        self.port = port;

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        self.shutdown_tx = Some(shutdown_tx);

        let app = router(self.state.clone());

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .ok();
        });

        tracing::info!(port, "Mock store listening");

        Ok(port)
    }

    /// Get the server's port
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn password(&self) -> &str {
        &self.state.config.password
    }

    /// Commands received so far, in arrival order
    pub fn received_commands(&self) -> Vec<String> {
        self.state
            .received
            .lock()
            .map(|received| received.clone())
            .unwrap_or_default()
    }

    /// Current value stored under `key`
    pub fn value(&self, key: &str) -> Option<String> {
        self.state.store.get(key).map(|entry| entry.value().clone())
    }

    /// Poll until at least `count` commands arrived or `timeout` passed.
    ///
    /// Streaming sends are not acknowledged, so callers that need to see
    /// them land have to wait.
    pub async fn wait_for_commands(&self, count: usize, timeout: Duration) -> Vec<String> {
        let deadline = Instant::now() + timeout;
        loop {
            let received = self.received_commands();
            if received.len() >= count || Instant::now() >= deadline {
                return received;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Stop the mock store
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockStoreServer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn router(state: Arc<MockState>) -> Router {
    Router::new()
        .route("/ws", get(handle_upgrade))
        .route("/", post(handle_post))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn handle_upgrade(
    ws: WebSocketUpgrade,
    Query(params): Query<AuthParams>,
    State(state): State<Arc<MockState>>,
) -> Response {
    if let Err(rejection) = state.check_password(&params) {
        return rejection;
    }

    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: Arc<MockState>) {
    while let Some(msg) = socket.recv().await {
        let text = match msg {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => continue,
        };

        let reply = match state.apply(&text) {
            Ok(reply) => reply,
            Err(message) => Some(message.to_string()),
        };

        if let Some(reply) = reply {
            if socket.send(Message::Text(reply)).await.is_err() {
                break;
            }
        }
    }

    tracing::debug!("Mock store WebSocket client disconnected");
}

async fn handle_post(
    Query(params): Query<AuthParams>,
    State(state): State<Arc<MockState>>,
    body: Bytes,
) -> Response {
    if let Err(rejection) = state.check_password(&params) {
        return rejection;
    }

    let config = &state.config;
    let nth = state.posts.fetch_add(1, Ordering::Relaxed) + 1;

    if config.latency_ms > 0 {
        tokio::time::sleep(Duration::from_millis(config.latency_ms)).await;
    }

    // Simulated failures
    if config.fail_every.is_some_and(|every| every > 0 && nth % every == 0) {
        return (StatusCode::INTERNAL_SERVER_ERROR, "Simulated error").into_response();
    }
    if config.error_rate > 0.0 && rand::thread_rng().gen::<f64>() < config.error_rate {
        return (StatusCode::INTERNAL_SERVER_ERROR, "Simulated error").into_response();
    }

    let line = String::from_utf8_lossy(&body);
    match state.apply(line.trim_end()) {
        Ok(Some(reply)) => (StatusCode::OK, reply).into_response(),
        Ok(None) => (StatusCode::OK, "OK").into_response(),
        Err(message) => (StatusCode::BAD_REQUEST, message).into_response(),
    }
}
