//! Client for the GIMP MCP server.
//!
//! Requests go over the socket transport when it is reachable and fall back
//! to HTTP on any socket failure.

pub mod http;
pub mod socket;

use rand::Rng;
use serde_json::Value;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::mcp::progress::TaskProgress;
use crate::mcp::protocol::{JsonRpcRequest, JsonRpcResponse, Params, RequestId};
use crate::mcp::transport::{DEFAULT_SOCKET_HOST, DEFAULT_SOCKET_PORT};
pub use http::HttpClient;
pub use socket::SocketClient;

/// Default JSON-RPC endpoint.
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8000/jsonrpc";

/// Socket connect probe timeout.
pub const SOCKET_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Upper bound on a single call. Image operations can be slow.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(300);

/// Interval between progress polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// How long a progress monitor waits for a task to finish.
pub const DEFAULT_MONITOR_TIMEOUT: Duration = Duration::from_secs(300);

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server_url: String,
    pub socket_host: String,
    pub socket_port: u16,
    pub prefer_socket: bool,
    pub api_key: Option<String>,
    pub call_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            socket_host: DEFAULT_SOCKET_HOST.to_string(),
            socket_port: DEFAULT_SOCKET_PORT,
            prefer_socket: true,
            api_key: None,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

impl ClientConfig {
    /// Read `MCP_SERVER_URL`, `MCP_SOCKET_HOST`, `MCP_SOCKET_PORT`,
    /// `MCP_PREFER_SOCKET` and `MCP_API_KEY` from the environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(url) = lookup("MCP_SERVER_URL") {
            config.server_url = url;
        }
        if let Some(host) = lookup("MCP_SOCKET_HOST") {
            config.socket_host = host;
        }
        if let Some(port) = lookup("MCP_SOCKET_PORT") {
            config.socket_port = port
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("Invalid MCP_SOCKET_PORT: {}", port)))?;
        }
        if let Some(prefer) = lookup("MCP_PREFER_SOCKET") {
            config.prefer_socket = parse_flag(&prefer);
        }
        config.api_key = lookup("MCP_API_KEY").filter(|k| !k.is_empty());
        Ok(config)
    }

    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.socket_host, self.socket_port)
    }
}

/// Socket-first JSON-RPC client.
#[derive(Debug)]
pub struct McpClient {
    http: HttpClient,
    socket: Option<SocketClient>,
}

impl McpClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = HttpClient::new(&config.server_url, config.api_key.clone(), config.call_timeout)?;
        let socket = config.prefer_socket.then(|| {
            SocketClient::new(config.socket_addr(), SOCKET_CONNECT_TIMEOUT, config.call_timeout)
        });
        Ok(Self { http, socket })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(ClientConfig::from_env()?)
    }

    pub fn http(&self) -> &HttpClient {
        &self.http
    }

    /// Call `method` and return its result.
    pub async fn call(&self, method: &str, params: Params) -> Result<Value> {
        let id = RequestId::Number(rand::thread_rng().gen_range(1..=10_000));
        let request = JsonRpcRequest::new(method, params, id.clone());

        if let Some(socket) = &self.socket {
            debug!("Sending {} over socket {}", method, socket.addr());
            match socket.send(&request).await.and_then(|r| into_result(r, &id)) {
                Ok(value) => return Ok(value),
                Err(e) => warn!("Socket call failed ({}), falling back to HTTP", e),
            }
        }

        debug!("Sending {} to {}", method, self.http.rpc_url());
        let response = self.http.send(&request).await?;
        into_result(response, &id)
    }

    /// Whether the HTTP server answers its health check.
    pub async fn check_server_status(&self) -> bool {
        self.http.server_status().await.is_ok()
    }

    /// Whether the socket server accepts connections.
    pub async fn check_socket_server_status(&self) -> bool {
        match &self.socket {
            Some(socket) => socket.probe().await,
            None => false,
        }
    }

    /// Poll a task's progress in the background.
    ///
    /// `on_update` sees every polled record. Polling stops once the task
    /// finishes, or after `timeout` with a synthetic timed-out error record.
    pub fn monitor_progress<F>(
        &self,
        task_id: impl Into<String>,
        interval: Duration,
        timeout: Duration,
        mut on_update: F,
    ) -> JoinHandle<()>
    where
        F: FnMut(TaskProgress) + Send + 'static,
    {
        let http = self.http.clone();
        let task_id = task_id.into();

        tokio::spawn(async move {
            let started = Instant::now();
            loop {
                if started.elapsed() > timeout {
                    on_update(TaskProgress::new(1.0, "error: operation timed out"));
                    break;
                }
                match http.task_progress(&task_id).await {
                    Ok(record) => {
                        let finished = record.is_terminal();
                        on_update(record);
                        if finished {
                            break;
                        }
                    }
                    Err(e) => warn!("Error checking progress for {}: {}", task_id, e),
                }
                tokio::time::sleep(interval).await;
            }
        })
    }
}

/// Extract the result of a response to the request with id `expected`.
fn into_result(response: JsonRpcResponse, expected: &RequestId) -> Result<Value> {
    if let Some(error) = response.error {
        return Err(Error::Rpc {
            code: error.code,
            message: error.message,
        });
    }
    match &response.id {
        Some(id) if id == expected => Ok(response.result.unwrap_or(Value::Null)),
        other => Err(Error::ResponseIdMismatch {
            expected: expected.to_string(),
            actual: other
                .as_ref()
                .map_or_else(|| "null".to_string(), ToString::to_string),
        }),
    }
}
