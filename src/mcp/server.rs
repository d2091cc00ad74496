//! Request dispatcher shared by every transport.

use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::error::Error;
use crate::mcp::handler::MethodRegistry;
use crate::mcp::protocol::*;
use crate::metrics::{Metrics, Timer};

/// Turns requests into responses.
///
/// Every request produces exactly one response; handler failures are
/// reported as `-32000` errors and never reach the transport.
pub struct Dispatcher {
    registry: Arc<MethodRegistry>,
    metrics: Arc<Metrics>,
}

impl Dispatcher {
    pub fn new(registry: Arc<MethodRegistry>, metrics: Arc<Metrics>) -> Self {
        Self { registry, metrics }
    }

    pub fn registry(&self) -> &MethodRegistry {
        &self.registry
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Parse, validate and dispatch one raw message.
    pub async fn handle_message(&self, raw: &[u8]) -> JsonRpcResponse {
        match parse_request(raw) {
            Ok(req) => self.dispatch(req).await,
            Err(response) => {
                self.metrics.inc_protocol_errors();
                if let Some(err) = &response.error {
                    warn!("Rejected message: {}", err.message);
                }
                response
            }
        }
    }

    /// Dispatch a validated request.
    pub async fn dispatch(&self, req: JsonRpcRequest) -> JsonRpcResponse {
        info!("Received JSON-RPC request: {}", req.method);
        self.metrics.inc_requests();

        let Some(handler) = self.registry.get(&req.method) else {
            warn!("Handler not found for method: {}", req.method);
            self.metrics.inc_method_not_found();
            let err = Error::MethodNotFound(req.method);
            return JsonRpcResponse::failure(req.id, err.rpc_code(), err.to_string());
        };

        let timer = Timer::start();
        let outcome = AssertUnwindSafe(handler.call(req.params))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(Error::HandlerPanicked(panic_message(panic.as_ref()))));

        match outcome {
            Ok(value) => {
                debug!("{} completed in {}ms", req.method, timer.elapsed_ms());
                self.metrics.inc_success();
                JsonRpcResponse::success(req.id, value)
            }
            Err(e) => {
                error!("Error handling request {}: {}", req.method, e);
                self.metrics.inc_failed();
                JsonRpcResponse::failure(req.id, error_codes::SERVER_ERROR, e.to_string())
            }
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::mcp::handler::MethodHandler;
    use async_trait::async_trait;
    use serde_json::{json, Value};

    struct HelloMethod;

    #[async_trait]
    impl MethodHandler for HelloMethod {
        fn name(&self) -> &'static str {
            "hello"
        }

        async fn call(&self, _params: Params) -> Result<Value> {
            Ok(json!({"status": "success"}))
        }
    }

    struct FailingMethod;

    #[async_trait]
    impl MethodHandler for FailingMethod {
        fn name(&self) -> &'static str {
            "fail"
        }

        async fn call(&self, _params: Params) -> Result<Value> {
            Err(Error::InvalidParams("Missing required parameter: image_data".to_string()))
        }
    }

    struct PanickingMethod;

    #[async_trait]
    impl MethodHandler for PanickingMethod {
        fn name(&self) -> &'static str {
            "panic"
        }

        async fn call(&self, _params: Params) -> Result<Value> {
            panic!("model exploded")
        }
    }

    fn dispatcher() -> Dispatcher {
        let mut registry = MethodRegistry::new();
        registry.register(HelloMethod);
        registry.register(FailingMethod);
        registry.register(PanickingMethod);
        Dispatcher::new(Arc::new(registry), Metrics::new())
    }

    fn request(method: &str, id: i64) -> JsonRpcRequest {
        JsonRpcRequest::new(method, Params::new(), RequestId::Number(id))
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let response = dispatcher().dispatch(request("nonexistent_method", 2)).await;

        assert!(response.result.is_none());
        let error = response.error.unwrap();
        assert_eq!(error.code, error_codes::METHOD_NOT_FOUND);
        assert_eq!(error.message, "Method 'nonexistent_method' not found");
        assert_eq!(response.id, Some(RequestId::Number(2)));
    }

    #[tokio::test]
    async fn test_handler_error_is_isolated() {
        let dispatcher = dispatcher();
        let response = dispatcher.dispatch(request("fail", 3)).await;

        let error = response.error.unwrap();
        assert_eq!(error.code, error_codes::SERVER_ERROR);
        assert!(error.message.contains("Missing required parameter: image_data"));

        let next = dispatcher.dispatch(request("hello", 4)).await;
        assert_eq!(next.result.unwrap()["status"], "success");
    }

    #[tokio::test]
    async fn test_handler_panic_is_isolated() {
        let dispatcher = dispatcher();
        let response = dispatcher.dispatch(request("panic", 5)).await;

        let error = response.error.unwrap();
        assert_eq!(error.code, error_codes::SERVER_ERROR);
        assert!(error.message.contains("model exploded"));

        let next = dispatcher.dispatch(request("hello", 6)).await;
        assert!(next.error.is_none());
    }

    #[tokio::test]
    async fn test_handle_message_rejects_before_dispatch() {
        let dispatcher = dispatcher();
        let response = dispatcher.handle_message(b"{oops").await;

        assert_eq!(response.error.unwrap().code, error_codes::PARSE_ERROR);
        let snapshot = dispatcher.metrics().snapshot();
        assert_eq!(snapshot.protocol_errors, 1);
        assert_eq!(snapshot.requests_total, 0);
    }

    #[tokio::test]
    async fn test_metrics_are_recorded() {
        let dispatcher = dispatcher();
        dispatcher.dispatch(request("hello", 1)).await;
        dispatcher.dispatch(request("fail", 2)).await;
        dispatcher.dispatch(request("missing", 3)).await;

        let snapshot = dispatcher.metrics().snapshot();
        assert_eq!(snapshot.requests_total, 3);
        assert_eq!(snapshot.requests_success, 1);
        assert_eq!(snapshot.requests_failed, 1);
        assert_eq!(snapshot.method_not_found, 1);
    }
}
