// WebSocket transport: one persistent connection, unacknowledged sends.
//
// A send completes once the frame is written to the socket. The store may not
// have read it yet, so per-item timings on this transport measure local call
// overhead, not remote processing latency.

use async_trait::async_trait;
use futures::SinkExt;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use super::{Outcome, SendError, Transport};
use crate::bench::config::TransportKind;
use crate::command::Command;
use crate::error::{BenchError, Result};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Fire-and-forget WebSocket transport
pub struct StreamingTransport {
    socket: Option<Socket>,
    frames_sent: u64,
}

impl StreamingTransport {
    /// Open the connection. Unreachable targets and rejected handshakes
    /// (for example a wrong password) are `Connection` errors.
    pub async fn connect(url: &str, timeout: Duration) -> Result<Self> {
        let (socket, response) = tokio::time::timeout(timeout, connect_async(url))
            .await
            .map_err(|_| {
                BenchError::Connection(format!("handshake timed out after {:?}", timeout))
            })?
            .map_err(describe_handshake_error)?;

        tracing::info!(status = %response.status(), "WebSocket connection established");

        Ok(Self {
            socket: Some(socket),
            frames_sent: 0,
        })
    }

    pub fn frames_sent(&self) -> u64 {
        self.frames_sent
    }

    pub fn is_open(&self) -> bool {
        self.socket.is_some()
    }
}

#[async_trait]
impl Transport for StreamingTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Streaming
    }

    async fn send(&mut self, command: &Command) -> std::result::Result<Outcome, SendError> {
        let socket = self
            .socket
            .as_mut()
            .ok_or_else(|| SendError::Connection("connection already closed".to_string()))?;

        socket
            .send(Message::Text(command.to_string()))
            .await
            .map_err(|e| SendError::Connection(format!("write failed: {}", e)))?;

        self.frames_sent += 1;
        Ok(Outcome::Dispatched)
    }

    async fn close(&mut self) -> Result<()> {
        let Some(mut socket) = self.socket.take() else {
            return Ok(());
        };

        match socket.close(None).await {
            Ok(())
            | Err(tungstenite::Error::ConnectionClosed)
            | Err(tungstenite::Error::AlreadyClosed) => {
                tracing::info!(frames = self.frames_sent, "WebSocket connection closed");
                Ok(())
            }
            Err(e) => Err(BenchError::Connection(format!("close failed: {}", e))),
        }
    }
}

fn describe_handshake_error(error: tungstenite::Error) -> BenchError {
    match error {
        tungstenite::Error::Http(response) => BenchError::Connection(format!(
            "handshake rejected with status {}",
            response.status()
        )),
        other => BenchError::Connection(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bench::config::MockServerConfig;
    use crate::bench::mock_server::MockStoreServer;

    async fn start_store() -> MockStoreServer {
        let mut server = MockStoreServer::new(MockServerConfig {
            password: "secret".to_string(),
            ..Default::default()
        });
        server.start().await.unwrap();
        server
    }

    #[tokio::test]
    async fn test_frames_arrive_in_order() {
        let server = start_store().await;
        let url = format!("ws://127.0.0.1:{}/ws?password=secret", server.port());

        let mut transport = StreamingTransport::connect(&url, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(
            transport.send(&Command::add("a", "1")).await.unwrap(),
            Outcome::Dispatched
        );
        transport.send(&Command::add("b", "2")).await.unwrap();
        assert_eq!(transport.frames_sent(), 2);

        let received = server
            .wait_for_commands(2, Duration::from_secs(5))
            .await;
        assert_eq!(received, vec!["ADD a 1", "ADD b 2"]);

        transport.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_wrong_password_is_connection_error() {
        let server = start_store().await;
        let url = format!("ws://127.0.0.1:{}/ws?password=wrong", server.port());

        let err = StreamingTransport::connect(&url, Duration::from_secs(5))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, BenchError::Connection(_)));
        assert!(err.to_string().contains("401"));
    }

    #[tokio::test]
    async fn test_close_twice_and_send_after_close() {
        let server = start_store().await;
        let url = format!("ws://127.0.0.1:{}/ws?password=secret", server.port());

        let mut transport = StreamingTransport::connect(&url, Duration::from_secs(5))
            .await
            .unwrap();
        transport.close().await.unwrap();
        assert!(!transport.is_open());
        transport.close().await.unwrap();

        let err = transport.send(&Command::add("a", "1")).await.unwrap_err();
        assert!(matches!(err, SendError::Connection(_)));
    }
}
