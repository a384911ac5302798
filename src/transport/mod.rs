//! Transports that carry commands to the store.
//!
//! Two implementations sit behind [`Transport`]:
//! - [`StreamingTransport`]: one WebSocket, fire-and-forget text frames
//! - [`RequestResponseTransport`]: one awaited HTTP POST per command
//!
//! The variant is picked once at startup by [`connect`].

mod http;
mod streaming;

pub use http::RequestResponseTransport;
pub use streaming::StreamingTransport;

use async_trait::async_trait;

use crate::bench::config::{BenchmarkConfig, TransportKind};
use crate::command::Command;
use crate::error::{BenchError, RequestFailure, Result};

/// What a successful send tells the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Handed to the socket; nothing is known about the store's side
    Dispatched,
    /// Store answered with this success status
    Acknowledged { status: u16 },
}

/// Failure of a single send, before it is tied to a unit index
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendError {
    /// The persistent connection is unusable
    Connection(String),
    /// One request/response cycle failed
    Request(RequestFailure),
}

impl SendError {
    pub fn into_bench_error(self, index: usize) -> BenchError {
        match self {
            SendError::Connection(msg) => BenchError::Connection(msg),
            SendError::Request(kind) => BenchError::Request { index, kind },
        }
    }
}

/// A way of delivering commands to the store
#[async_trait]
pub trait Transport: Send {
    fn kind(&self) -> TransportKind;

    /// Deliver one command
    async fn send(&mut self, command: &Command) -> std::result::Result<Outcome, SendError>;

    /// Release the connection. Calling it again is a no-op.
    async fn close(&mut self) -> Result<()>;
}

/// Open the transport selected by `config`
pub async fn connect(config: &BenchmarkConfig) -> Result<Box<dyn Transport>> {
    tracing::info!(
        transport = %config.transport,
        target = %config.display_target(),
        "Connecting to store"
    );

    let transport: Box<dyn Transport> = match config.transport {
        TransportKind::Streaming => Box::new(
            StreamingTransport::connect(&config.streaming_url()?, config.connect_timeout()).await?,
        ),
        TransportKind::RequestResponse => Box::new(RequestResponseTransport::new(
            config.request_url()?,
            config.connect_timeout(),
            config.request_timeout(),
        )?),
    };

    Ok(transport)
}
