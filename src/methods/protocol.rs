//! Session methods: `initialize`, `shutdown` and `hello_world`.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::info;

use crate::error::Result;
use crate::mcp::handler::{optional_str, MethodHandler};
use crate::mcp::protocol::Params;
use crate::{SERVER_IMPLEMENTATION, SERVER_NAME, VERSION};

/// Capability handshake.
pub struct InitializeMethod {
    supported_methods: Vec<String>,
}

impl InitializeMethod {
    pub fn new(supported_methods: Vec<String>) -> Self {
        Self { supported_methods }
    }
}

#[async_trait]
impl MethodHandler for InitializeMethod {
    fn name(&self) -> &'static str {
        "initialize"
    }

    async fn call(&self, params: Params) -> Result<Value> {
        let protocol_version =
            optional_str(&params, "protocolVersion").unwrap_or_else(|| "unknown".to_string());
        let client = params.get("clientInfo");
        let client_field = |field: &str| {
            client
                .and_then(|c| c.get(field))
                .and_then(|v| v.as_str())
                .unwrap_or("unknown")
                .to_string()
        };
        info!(
            "Client: {} {}, Protocol: {}",
            client_field("name"),
            client_field("version"),
            protocol_version
        );

        Ok(json!({
            "protocolVersion": protocol_version,
            "serverInfo": {
                "name": SERVER_NAME,
                "version": VERSION,
                "implementation": SERVER_IMPLEMENTATION,
            },
            "capabilities": {
                "supportsImageProcessing": true,
                "supportsStyleTransfer": true,
                "supportsInpainting": true,
                "supportsBackgroundRemoval": true,
                "supportsUpscaling": true,
            },
            "supportedMethods": self.supported_methods,
        }))
    }
}

pub struct ShutdownMethod;

#[async_trait]
impl MethodHandler for ShutdownMethod {
    fn name(&self) -> &'static str {
        "shutdown"
    }

    async fn call(&self, _params: Params) -> Result<Value> {
        info!("Client requested shutdown");
        Ok(json!({ "shutdown": "acknowledged" }))
    }
}

/// Connectivity check.
pub struct HelloWorldMethod;

#[async_trait]
impl MethodHandler for HelloWorldMethod {
    fn name(&self) -> &'static str {
        "hello_world"
    }

    async fn call(&self, params: Params) -> Result<Value> {
        let name = optional_str(&params, "name").unwrap_or_else(|| "World".to_string());
        Ok(json!({
            "message": format!("Hello, {}! Welcome to the GIMP AI Integration MCP Server.", name),
            "status": "success",
        }))
    }
}
