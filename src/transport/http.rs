use async_trait::async_trait;
use reqwest::{header, Client};
use std::time::Duration;

use super::{Outcome, SendError, Transport};
use crate::bench::config::TransportKind;
use crate::command::Command;
use crate::error::{BenchError, RequestFailure, Result};

/// One awaited `POST` per command
pub struct RequestResponseTransport {
    client: Client,
    url: String,
}

impl RequestResponseTransport {
    /// Create the client. No connection is opened until the first send.
    pub fn new(url: String, connect_timeout: Duration, request_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .build()
            .map_err(|e| BenchError::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self { client, url })
    }
}

#[async_trait]
impl Transport for RequestResponseTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::RequestResponse
    }

    async fn send(&mut self, command: &Command) -> std::result::Result<Outcome, SendError> {
        let response = self
            .client
            .post(&self.url)
            .header(header::CONTENT_TYPE, "text/plain")
            .body(command.to_string())
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!(status = %status, "Store rejected command");
            return Err(SendError::Request(RequestFailure::Status(status.as_u16())));
        }

        // Body is ignored, but drain it so the connection can be reused
        response.bytes().await.map_err(classify)?;

        Ok(Outcome::Acknowledged {
            status: status.as_u16(),
        })
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

fn classify(error: reqwest::Error) -> SendError {
    if error.is_timeout() {
        SendError::Request(RequestFailure::Timeout)
    } else {
        SendError::Request(RequestFailure::Network(error.to_string()))
    }
}
