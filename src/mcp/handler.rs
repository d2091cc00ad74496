//! Method handlers and the registry that maps method names onto them.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::mcp::protocol::Params;

/// Handler for a single JSON-RPC method.
#[async_trait]
pub trait MethodHandler: Send + Sync {
    /// The method name this handler is registered under.
    fn name(&self) -> &'static str;

    /// Execute the method with the given parameters.
    async fn call(&self, params: Params) -> Result<Value>;
}

/// Registry of method handlers.
///
/// Populated once at startup and shared read-only afterwards.
pub struct MethodRegistry {
    methods: HashMap<String, Arc<dyn MethodHandler>>,
}

impl MethodRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            methods: HashMap::new(),
        }
    }

    /// Register a method handler.
    pub fn register<T: MethodHandler + 'static>(&mut self, handler: T) {
        self.register_arc(Arc::new(handler));
    }

    /// Register a method handler (Arc version).
    pub fn register_arc(&mut self, handler: Arc<dyn MethodHandler>) {
        self.methods.insert(handler.name().to_string(), handler);
    }

    /// Look up a handler by method name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn MethodHandler>> {
        self.methods.get(name).cloned()
    }

    /// Check if a method exists.
    pub fn contains(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    /// Registered method names, sorted.
    pub fn method_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.methods.keys().cloned().collect();
        names.sort();
        names
    }

    /// Get the number of registered methods.
    pub fn len(&self) -> usize {
        self.methods.len()
    }

    /// Whether no methods are registered.
    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

impl Default for MethodRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn missing(name: &str) -> Error {
    Error::InvalidParams(format!("Missing required parameter: {}", name))
}

/// Helper to extract a required, non-empty string parameter.
pub fn required_str(params: &Params, name: &str) -> Result<String> {
    params
        .get(name)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(String::from)
        .ok_or_else(|| missing(name))
}

/// Helper to extract an optional string parameter.
pub fn optional_str(params: &Params, name: &str) -> Option<String> {
    params.get(name).and_then(|v| v.as_str()).map(String::from)
}

/// Helper to extract a float parameter. Numeric strings are accepted.
pub fn f64_or(params: &Params, name: &str, default: f64) -> Result<f64> {
    match params.get(name) {
        None | Some(Value::Null) => Ok(default),
        Some(Value::Number(n)) => n
            .as_f64()
            .ok_or_else(|| Error::InvalidParams(format!("Parameter '{}' must be a number", name))),
        Some(Value::String(s)) => s
            .trim()
            .parse()
            .map_err(|_| Error::InvalidParams(format!("Parameter '{}' must be a number", name))),
        Some(_) => Err(Error::InvalidParams(format!(
            "Parameter '{}' must be a number",
            name
        ))),
    }
}

/// Helper to extract an integer parameter. Numeric strings are accepted.
pub fn i64_or(params: &Params, name: &str, default: i64) -> Result<i64> {
    let invalid = || Error::InvalidParams(format!("Parameter '{}' must be an integer", name));
    match params.get(name) {
        None | Some(Value::Null) => Ok(default),
        Some(Value::Number(n)) => n.as_i64().ok_or_else(invalid),
        Some(Value::String(s)) => s.trim().parse().map_err(|_| invalid()),
        Some(_) => Err(invalid()),
    }
}

/// Helper to extract a boolean parameter.
pub fn bool_or(params: &Params, name: &str, default: bool) -> bool {
    params.get(name).and_then(|v| v.as_bool()).unwrap_or(default)
}
