//! GIMP AI Integration MCP Server
//!
//! A JSON-RPC 2.0 server exposing AI image operations (background removal,
//! inpainting, style transfer, upscaling) to the GIMP plugin, plus the client
//! the plugin side uses to reach it.
//!
//! # Architecture
//!
//! 1. **MCP Layer** (`mcp`) - Protocol types, method registry, dispatcher,
//!    progress store and the newline-delimited socket transport
//! 2. **Methods** (`methods`) - The registered JSON-RPC methods
//! 3. **Models** (`models`) - Image codecs and the placeholder image models
//! 4. **HTTP Layer** (`http`) - JSON-RPC over POST, progress polling and SSE,
//!    API key authentication
//! 5. **Client** (`client`) - Socket-first client with HTTP fallback
//!
//! Both transports share one dispatcher, so a method behaves identically
//! whichever way it is reached.

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod mcp;
pub mod methods;
pub mod metrics;
pub mod models;

pub use error::{Error, Result};

/// Server version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Name reported by `initialize`.
pub const SERVER_NAME: &str = "GIMP AI Integration MCP Server";

/// Implementation id reported by `initialize`.
pub const SERVER_IMPLEMENTATION: &str = "GIMP-AI-Integration";
