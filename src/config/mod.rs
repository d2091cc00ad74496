//! Configuration management for the GIMP MCP server.

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::mcp::transport::{DEFAULT_SOCKET_HOST, DEFAULT_SOCKET_PORT};

/// Command-line arguments for the GIMP MCP server.
#[derive(Parser, Debug, Clone)]
#[command(name = "gimp-mcp")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "JSON-RPC server exposing AI image operations to the GIMP plugin")]
pub struct Args {
    /// Transport mode: http, socket or both
    #[arg(short, long, default_value = "both", env = "MCP_TRANSPORT")]
    pub transport: Transport,

    /// Socket server host
    #[arg(long, default_value = DEFAULT_SOCKET_HOST, env = "MCP_SOCKET_HOST")]
    pub host: String,

    /// Socket server port
    #[arg(short, long, default_value_t = DEFAULT_SOCKET_PORT, env = "MCP_SOCKET_PORT")]
    pub port: u16,

    /// HTTP server host
    #[arg(long, default_value = "127.0.0.1", env = "MCP_SERVER_HOST")]
    pub http_host: String,

    /// HTTP server port
    #[arg(long, default_value = "8000", env = "MCP_SERVER_PORT")]
    pub http_port: u16,

    /// Require an X-API-Key header on HTTP requests
    #[arg(long, env = "MCP_ENABLE_AUTH")]
    pub enable_auth: bool,

    /// Deployment environment; `production` disables key generation over HTTP
    #[arg(long, default_value = "development", env = "MCP_ENV")]
    pub environment: String,

    /// Allowed CORS origins, comma separated
    #[arg(long, default_value = "*", env = "MCP_ALLOW_ORIGINS", value_delimiter = ',')]
    pub allow_origins: Vec<String>,

    /// Seconds a finished task's progress record is kept
    #[arg(long, default_value = "3600", env = "MCP_PROGRESS_TTL_SECS")]
    pub progress_ttl_secs: u64,

    /// Enable debug logging
    #[arg(short, long, env = "MCP_DEBUG")]
    pub debug: bool,
}

/// Which listeners to start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    Http,
    Socket,
    #[default]
    Both,
}

impl Transport {
    pub fn serves_http(self) -> bool {
        matches!(self, Transport::Http | Transport::Both)
    }

    pub fn serves_socket(self) -> bool {
        matches!(self, Transport::Socket | Transport::Both)
    }
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Transport mode
    pub transport: Transport,
    /// Socket server host
    pub socket_host: String,
    /// Socket server port
    pub socket_port: u16,
    /// HTTP server host
    pub http_host: String,
    /// HTTP server port
    pub http_port: u16,
    /// API key authentication enabled
    pub enable_auth: bool,
    /// Deployment environment
    pub environment: String,
    /// Allowed CORS origins
    pub allow_origins: Vec<String>,
    /// Progress record TTL in seconds
    pub progress_ttl_secs: u64,
    /// Debug mode
    pub debug: bool,
}

impl Config {
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.socket_host, self.socket_port)
    }

    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.http_host, self.http_port)
    }

    pub fn progress_ttl(&self) -> Duration {
        Duration::from_secs(self.progress_ttl_secs)
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        Self {
            transport: args.transport,
            socket_host: args.host,
            socket_port: args.port,
            http_host: args.http_host,
            http_port: args.http_port,
            enable_auth: args.enable_auth,
            environment: args.environment,
            allow_origins: args.allow_origins,
            progress_ttl_secs: args.progress_ttl_secs,
            debug: args.debug,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            transport: Transport::Both,
            socket_host: DEFAULT_SOCKET_HOST.to_string(),
            socket_port: DEFAULT_SOCKET_PORT,
            http_host: "127.0.0.1".to_string(),
            http_port: 8000,
            enable_auth: false,
            environment: "development".to_string(),
            allow_origins: vec!["*".to_string()],
            progress_ttl_secs: 3600,
            debug: false,
        }
    }
}
