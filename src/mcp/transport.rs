//! Newline-delimited JSON socket transport.
//!
//! Each frame is one JSON document terminated by `\n`. Bytes after a newline
//! are kept as the start of the next frame.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tokio_util::codec::{Decoder, Encoder, Framed};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::mcp::protocol::{error_codes, JsonRpcResponse};
use crate::mcp::server::Dispatcher;
use crate::metrics::Metrics;

/// Default socket host.
pub const DEFAULT_SOCKET_HOST: &str = "localhost";

/// Default socket port.
pub const DEFAULT_SOCKET_PORT: u16 = 9876;

/// Largest accepted frame. Image payloads travel base64-encoded inside frames.
pub const DEFAULT_MAX_FRAME_LENGTH: usize = 64 * 1024 * 1024;

/// A decoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// One complete message, without its terminating newline.
    Message(Bytes),
    /// A message exceeded the maximum frame length and was discarded.
    Oversized,
}

/// Codec for newline-delimited JSON.
///
/// Malformed frames are not the codec's concern: it hands every line to the
/// caller, which answers parse failures and moves on to the next line.
#[derive(Debug, Clone)]
pub struct JsonLineCodec {
    max_length: usize,
    next_index: usize,
    discarding: bool,
}

impl JsonLineCodec {
    pub fn new() -> Self {
        Self::with_max_length(DEFAULT_MAX_FRAME_LENGTH)
    }

    pub fn with_max_length(max_length: usize) -> Self {
        Self {
            max_length,
            next_index: 0,
            discarding: false,
        }
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }
}

impl Default for JsonLineCodec {
    fn default() -> Self {
        Self::new()
    }
}

fn trim_line(mut line: BytesMut) -> BytesMut {
    while matches!(line.last(), Some(b'\n' | b'\r')) {
        line.truncate(line.len() - 1);
    }
    line
}

impl Decoder for JsonLineCodec {
    type Item = Frame;
    type Error = io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> io::Result<Option<Frame>> {
        loop {
            let newline = buf[self.next_index..]
                .iter()
                .position(|b| *b == b'\n')
                .map(|offset| self.next_index + offset);

            match (self.discarding, newline) {
                (true, Some(pos)) => {
                    buf.advance(pos + 1);
                    self.next_index = 0;
                    self.discarding = false;
                }
                (true, None) => {
                    buf.clear();
                    self.next_index = 0;
                    return Ok(None);
                }
                (false, Some(pos)) if pos > self.max_length => {
                    buf.advance(pos + 1);
                    self.next_index = 0;
                    return Ok(Some(Frame::Oversized));
                }
                (false, Some(pos)) => {
                    let line = trim_line(buf.split_to(pos + 1));
                    self.next_index = 0;
                    if line.iter().all(u8::is_ascii_whitespace) {
                        continue;
                    }
                    return Ok(Some(Frame::Message(line.freeze())));
                }
                (false, None) if buf.len() > self.max_length => {
                    buf.clear();
                    self.next_index = 0;
                    self.discarding = true;
                    return Ok(Some(Frame::Oversized));
                }
                (false, None) => {
                    self.next_index = buf.len();
                    return Ok(None);
                }
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> io::Result<Option<Frame>> {
        if let Some(frame) = self.decode(buf)? {
            return Ok(Some(frame));
        }

        self.next_index = 0;
        if self.discarding || buf.iter().all(u8::is_ascii_whitespace) {
            buf.clear();
            self.discarding = false;
            return Ok(None);
        }

        // An unterminated final message is still a message.
        let line = buf.split_to(buf.len());
        Ok(Some(Frame::Message(trim_line(line).freeze())))
    }
}

impl<T: Serialize> Encoder<T> for JsonLineCodec {
    type Error = io::Error;

    fn encode(&mut self, item: T, dst: &mut BytesMut) -> io::Result<()> {
        let json = serde_json::to_vec(&item)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        dst.reserve(json.len() + 1);
        dst.put_slice(&json);
        dst.put_u8(b'\n');
        Ok(())
    }
}

/// TCP server speaking newline-delimited JSON-RPC.
///
/// Each connection is served by its own task and handles one request at a time.
pub struct SocketServer {
    listener: TcpListener,
    dispatcher: Arc<Dispatcher>,
    metrics: Arc<Metrics>,
    cancel: CancellationToken,
    max_frame_length: usize,
}

impl SocketServer {
    /// Bind the listening socket.
    pub async fn bind(addr: &str, dispatcher: Arc<Dispatcher>) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let metrics = dispatcher.metrics().clone();
        Ok(Self {
            listener,
            dispatcher,
            metrics,
            cancel: CancellationToken::new(),
            max_frame_length: DEFAULT_MAX_FRAME_LENGTH,
        })
    }

    /// Stop serving when `cancel` fires.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_max_frame_length(mut self, max_frame_length: usize) -> Self {
        self.max_frame_length = max_frame_length;
        self
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Token that stops the server when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Accept connections until cancelled.
    ///
    /// Open connections are closed on shutdown without draining in-flight requests.
    pub async fn run(self) -> Result<()> {
        info!("MCP socket server started on {}", self.local_addr()?);
        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        info!("New connection from {}", peer);
                        connections.spawn(serve_connection(
                            stream,
                            peer,
                            self.dispatcher.clone(),
                            self.metrics.clone(),
                            self.max_frame_length,
                        ));
                    }
                    Err(e) => error!("Error accepting connection: {}", e),
                },
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
            }
        }

        connections.abort_all();
        while connections.join_next().await.is_some() {}
        info!("Socket server stopped");
        Ok(())
    }
}

struct ConnectionGuard(Arc<Metrics>);

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.0.connection_closed();
    }
}

async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    dispatcher: Arc<Dispatcher>,
    metrics: Arc<Metrics>,
    max_frame_length: usize,
) {
    metrics.connection_opened();
    let _guard = ConnectionGuard(metrics);
    let mut framed = Framed::new(stream, JsonLineCodec::with_max_length(max_frame_length));

    while let Some(frame) = framed.next().await {
        let response = match frame {
            Ok(Frame::Message(raw)) => dispatcher.handle_message(&raw).await,
            Ok(Frame::Oversized) => {
                warn!("Discarded oversized message from {}", peer);
                dispatcher.metrics().inc_protocol_errors();
                JsonRpcResponse::failure(
                    None,
                    error_codes::PARSE_ERROR,
                    format!("Parse error: message exceeds {} bytes", max_frame_length),
                )
            }
            Err(e) if e.kind() == io::ErrorKind::ConnectionReset => {
                info!("Connection reset by client {}", peer);
                return;
            }
            Err(e) => {
                error!("Error reading from client {}: {}", peer, e);
                return;
            }
        };

        if let Err(e) = framed.send(response).await {
            error!("Error writing to client {}: {}", peer, e);
            return;
        }
    }

    debug!("Client {} disconnected", peer);
}
