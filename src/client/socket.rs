//! Socket side of the client.
//!
//! One connection is kept open and reused; any failure drops it so the next
//! call reconnects.

use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tokio_util::codec::Framed;
use tracing::debug;

use crate::error::{Error, Result};
use crate::mcp::protocol::{JsonRpcRequest, JsonRpcResponse};
use crate::mcp::transport::{Frame, JsonLineCodec};

type Connection = Framed<TcpStream, JsonLineCodec>;

/// Client for the newline-delimited socket transport.
#[derive(Debug)]
pub struct SocketClient {
    addr: String,
    connect_timeout: Duration,
    response_timeout: Duration,
    connection: Mutex<Option<Connection>>,
}

impl SocketClient {
    pub fn new(addr: impl Into<String>, connect_timeout: Duration, response_timeout: Duration) -> Self {
        Self {
            addr: addr.into(),
            connect_timeout,
            response_timeout,
            connection: Mutex::new(None),
        }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    async fn connect(&self) -> Result<Connection> {
        let stream = timeout(self.connect_timeout, TcpStream::connect(&self.addr))
            .await
            .map_err(|_| Error::Transport(format!("Timed out connecting to {}", self.addr)))?
            .map_err(|e| Error::Transport(format!("Failed to connect to {}: {}", self.addr, e)))?;
        debug!("Connected to socket server at {}", self.addr);
        Ok(Framed::new(stream, JsonLineCodec::new()))
    }

    /// Whether the server accepts connections within the connect timeout.
    pub async fn probe(&self) -> bool {
        self.connect().await.is_ok()
    }

    /// Send one request and wait for its response line.
    pub async fn send(&self, request: &JsonRpcRequest) -> Result<JsonRpcResponse> {
        let mut guard = self.connection.lock().await;
        let mut connection = match guard.take() {
            Some(connection) => connection,
            None => self.connect().await?,
        };

        let result = self.exchange(&mut connection, request).await;
        if result.is_ok() {
            *guard = Some(connection);
        }
        result
    }

    async fn exchange(&self, connection: &mut Connection, request: &JsonRpcRequest) -> Result<JsonRpcResponse> {
        connection.send(request).await?;

        let frame = timeout(self.response_timeout, connection.next())
            .await
            .map_err(|_| Error::Timeout {
                seconds: self.response_timeout.as_secs(),
            })?;

        match frame {
            Some(Ok(Frame::Message(raw))) => serde_json::from_slice(&raw)
                .map_err(|e| Error::Transport(format!("Malformed response: {}", e))),
            Some(Ok(Frame::Oversized)) => {
                Err(Error::Transport("Response exceeds maximum frame length".to_string()))
            }
            Some(Err(e)) => Err(e.into()),
            None => Err(Error::Transport("Connection closed by server".to_string())),
        }
    }

    /// Drop the cached connection.
    pub async fn reset(&self) {
        self.connection.lock().await.take();
    }
}
