//! JSON-RPC 2.0 message types shared by the HTTP and socket transports.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// JSON-RPC version.
pub const JSONRPC_VERSION: &str = "2.0";

/// Method parameters. Always a JSON object.
pub type Params = Map<String, Value>;

// ===== JSON-RPC Base Types =====

/// A JSON-RPC request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Params,
    #[serde(default)]
    pub id: Option<RequestId>,
}

impl JsonRpcRequest {
    /// Create a request for `method` with the given id.
    pub fn new(method: impl Into<String>, params: Params, id: RequestId) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
            id: Some(id),
        }
    }
}

/// A JSON-RPC response.
///
/// `id` is serialized as `null` when the request id could not be determined.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    #[serde(default)]
    pub id: Option<RequestId>,
}

impl JsonRpcResponse {
    /// Build a success response.
    pub fn success(id: Option<RequestId>, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    /// Build an error response.
    pub fn failure(id: Option<RequestId>, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
            id,
        }
    }

    /// Whether this response carries an error.
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// A JSON-RPC error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Request ID (can be string or number).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(untagged)]
pub enum RequestId {
    String(String),
    Number(i64),
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "{}", s),
            Self::Number(n) => write!(f, "{}", n),
        }
    }
}

impl RequestId {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(Self::String(s.clone())),
            Value::Number(n) => n.as_i64().map(Self::Number),
            _ => None,
        }
    }
}

// ===== Error Codes =====

/// Standard JSON-RPC error codes.
pub mod error_codes {
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;
    /// Raised by a handler during execution.
    pub const SERVER_ERROR: i32 = -32000;
}

// ===== Validation =====

/// Parse and validate one raw JSON-RPC message.
///
/// On failure the returned response is the `-32700` or `-32600` error that
/// should be sent back to the peer; the dispatcher is never involved.
pub fn parse_request(raw: &[u8]) -> std::result::Result<JsonRpcRequest, JsonRpcResponse> {
    let value: Value = serde_json::from_slice(raw).map_err(|e| {
        JsonRpcResponse::failure(
            None,
            error_codes::PARSE_ERROR,
            format!("Parse error: {}", e),
        )
    })?;

    let Value::Object(mut message) = value else {
        return Err(JsonRpcResponse::failure(
            None,
            error_codes::INVALID_REQUEST,
            "Invalid Request: not a JSON object",
        ));
    };

    let id = message.get("id").and_then(RequestId::from_value);

    if message.get("jsonrpc").and_then(Value::as_str) != Some(JSONRPC_VERSION) {
        return Err(JsonRpcResponse::failure(
            id,
            error_codes::INVALID_REQUEST,
            "Invalid Request: not a JSON-RPC 2.0 request",
        ));
    }

    let method = match message.get("method").and_then(Value::as_str) {
        Some(method) if !method.is_empty() => method.to_string(),
        _ => {
            return Err(JsonRpcResponse::failure(
                id,
                error_codes::INVALID_REQUEST,
                "Invalid Request: method not specified",
            ))
        }
    };

    let params = match message.remove("params") {
        None | Some(Value::Null) => Params::new(),
        Some(Value::Object(params)) => params,
        Some(_) => {
            return Err(JsonRpcResponse::failure(
                id,
                error_codes::INVALID_REQUEST,
                "Invalid Request: params must be an object",
            ))
        }
    };

    Ok(JsonRpcRequest {
        jsonrpc: JSONRPC_VERSION.to_string(),
        method,
        params,
        id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn error_of(raw: &str) -> JsonRpcError {
        parse_request(raw.as_bytes()).unwrap_err().error.unwrap()
    }

    #[test]
    fn test_parse_valid_request() {
        let req = parse_request(
            br#"{"jsonrpc":"2.0","method":"hello_world","params":{"name":"Test"},"id":1}"#,
        )
        .unwrap();

        assert_eq!(req.method, "hello_world");
        assert_eq!(req.params["name"], json!("Test"));
        assert_eq!(req.id, Some(RequestId::Number(1)));
    }

    #[test]
    fn test_parse_missing_params_defaults_to_empty() {
        let req = parse_request(br#"{"jsonrpc":"2.0","method":"shutdown","id":"a"}"#).unwrap();
        assert!(req.params.is_empty());
        assert_eq!(req.id, Some(RequestId::String("a".to_string())));
    }

    #[test]
    fn test_parse_malformed_json() {
        let response = parse_request(b"{not json").unwrap_err();
        let error = response.error.unwrap();
        assert_eq!(error.code, error_codes::PARSE_ERROR);
        assert!(error.message.starts_with("Parse error:"));
        assert!(response.id.is_none());
    }

    #[test]
    fn test_parse_rejects_non_object() {
        let error = error_of("[1, 2, 3]");
        assert_eq!(error.code, error_codes::INVALID_REQUEST);
        assert_eq!(error.message, "Invalid Request: not a JSON object");
    }

    #[test]
    fn test_parse_rejects_wrong_version() {
        let response = parse_request(br#"{"jsonrpc":"1.0","method":"x","id":7}"#).unwrap_err();
        assert_eq!(response.id, Some(RequestId::Number(7)));
        let error = response.error.unwrap();
        assert_eq!(error.code, error_codes::INVALID_REQUEST);
        assert_eq!(error.message, "Invalid Request: not a JSON-RPC 2.0 request");

        let error = error_of(r#"{"method":"x","id":7}"#);
        assert_eq!(error.code, error_codes::INVALID_REQUEST);
    }

    #[test]
    fn test_parse_rejects_missing_method() {
        let error = error_of(r#"{"jsonrpc":"2.0","id":3}"#);
        assert_eq!(error.code, error_codes::INVALID_REQUEST);
        assert_eq!(error.message, "Invalid Request: method not specified");

        let error = error_of(r#"{"jsonrpc":"2.0","method":"","id":3}"#);
        assert_eq!(error.message, "Invalid Request: method not specified");
    }

    #[test]
    fn test_parse_rejects_non_object_params() {
        let error = error_of(r#"{"jsonrpc":"2.0","method":"x","params":[1],"id":3}"#);
        assert_eq!(error.code, error_codes::INVALID_REQUEST);
    }

    #[test]
    fn test_success_response_wire_format() {
        let response = JsonRpcResponse::success(
            Some(RequestId::Number(1)),
            json!({
                "message": "Hello, Test! Welcome to the GIMP AI Integration MCP Server.",
                "status": "success"
            }),
        );

        assert_eq!(
            serde_json::to_string(&response).unwrap(),
            r#"{"jsonrpc":"2.0","result":{"message":"Hello, Test! Welcome to the GIMP AI Integration MCP Server.","status":"success"},"id":1}"#
        );
    }

    #[test]
    fn test_error_response_wire_format() {
        let response = JsonRpcResponse::failure(
            Some(RequestId::Number(2)),
            error_codes::METHOD_NOT_FOUND,
            "Method 'nonexistent_method' not found",
        );

        assert_eq!(
            serde_json::to_string(&response).unwrap(),
            r#"{"jsonrpc":"2.0","error":{"code":-32601,"message":"Method 'nonexistent_method' not found"},"id":2}"#
        );
    }

    #[test]
    fn test_error_response_with_unknown_id() {
        let response = JsonRpcResponse::failure(None, error_codes::PARSE_ERROR, "Parse error");
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.ends_with(r#""id":null}"#));
        assert!(response.is_error());
    }

    #[test]
    fn test_request_id_variants() {
        let id_num = RequestId::Number(42);
        let id_str = RequestId::String("request-1".to_string());

        assert_eq!(serde_json::to_string(&id_num).unwrap(), "42");
        assert_eq!(serde_json::to_string(&id_str).unwrap(), "\"request-1\"");
        assert_eq!(id_num.to_string(), "42");
    }
}
