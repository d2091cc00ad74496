//! Error types for the GIMP MCP server and client.

use thiserror::Error;

use crate::mcp::protocol::error_codes;

/// Result type alias for GIMP MCP operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the GIMP MCP server.
#[derive(Error, Debug)]
pub enum Error {
    // ===== Dispatch Errors =====
    #[error("Method '{0}' not found")]
    MethodNotFound(String),

    #[error("{0}")]
    InvalidParams(String),

    #[error("{operation} failed: {message}")]
    OperationFailed {
        operation: &'static str,
        message: String,
    },

    #[error("Handler panicked: {0}")]
    HandlerPanicked(String),

    // ===== Progress Errors =====
    #[error("Task '{0}' is already being processed")]
    TaskBusy(String),

    // ===== Imaging Errors =====
    #[error("Invalid image data: {0}")]
    InvalidImage(String),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    // ===== Client Errors =====
    #[error("JSON-RPC error {code}: {message}")]
    Rpc { code: i32, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Unexpected response id: expected {expected}, got {actual}")]
    ResponseIdMismatch { expected: String, actual: String },

    // ===== I/O Errors =====
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    // ===== Internal Errors =====
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Timeout: operation timed out after {seconds} seconds")]
    Timeout { seconds: u64 },
}

impl Error {
    /// Wrap an error raised inside a named operation.
    pub fn operation(operation: &'static str, source: impl std::fmt::Display) -> Self {
        Self::OperationFailed {
            operation,
            message: source.to_string(),
        }
    }

    /// JSON-RPC error code reported for this error.
    pub fn rpc_code(&self) -> i32 {
        match self {
            Self::MethodNotFound(_) => error_codes::METHOD_NOT_FOUND,
            Self::Rpc { code, .. } => *code,
            _ => error_codes::SERVER_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let not_found = Error::MethodNotFound("nonexistent_method".to_string());
        assert_eq!(
            not_found.to_string(),
            "Method 'nonexistent_method' not found"
        );

        let params = Error::InvalidParams("Missing required parameter: image_data".to_string());
        assert_eq!(params.to_string(), "Missing required parameter: image_data");

        let busy = Error::TaskBusy("task-1".to_string());
        assert_eq!(busy.to_string(), "Task 'task-1' is already being processed");
    }

    #[test]
    fn test_operation_failed() {
        let err = Error::operation(
            "Background removal",
            Error::InvalidParams("Missing required parameter: image_data".to_string()),
        );
        assert_eq!(
            err.to_string(),
            "Background removal failed: Missing required parameter: image_data"
        );
    }

    #[test]
    fn test_rpc_codes() {
        assert_eq!(Error::MethodNotFound("x".to_string()).rpc_code(), -32601);
        assert_eq!(Error::Internal("boom".to_string()).rpc_code(), -32000);
        assert_eq!(
            Error::Rpc {
                code: -32600,
                message: "bad".to_string()
            }
            .rpc_code(),
            -32600
        );
    }

    #[test]
    fn test_timeout_display() {
        let timeout = Error::Timeout { seconds: 300 };
        assert_eq!(
            timeout.to_string(),
            "Timeout: operation timed out after 300 seconds"
        );
    }
}
