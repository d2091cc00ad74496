//! Client tests against in-process servers.

use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use gimp_mcp::client::{ClientConfig, McpClient};
use gimp_mcp::error::Error;
use gimp_mcp::http::{self, auth::ApiKeyStore, HttpState};
use gimp_mcp::mcp::handler::MethodRegistry;
use gimp_mcp::mcp::progress::ProgressStore;
use gimp_mcp::mcp::server::Dispatcher;
use gimp_mcp::mcp::transport::SocketServer;
use gimp_mcp::mcp::Params;
use gimp_mcp::methods;
use gimp_mcp::metrics::Metrics;

struct TestServers {
    http_port: u16,
    socket_port: Option<u16>,
    progress: Arc<ProgressStore>,
    shutdown: CancellationToken,
}

impl Drop for TestServers {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn start(with_socket: bool, auth: ApiKeyStore) -> TestServers {
    let progress = Arc::new(ProgressStore::new());
    let mut registry = MethodRegistry::new();
    methods::register_all(&mut registry, progress.clone());
    let dispatcher = Arc::new(Dispatcher::new(Arc::new(registry), Metrics::new()));
    let shutdown = CancellationToken::new();

    let socket_port = if with_socket {
        let server = SocketServer::bind("127.0.0.1:0", dispatcher.clone())
            .await
            .unwrap()
            .with_cancellation(shutdown.clone());
        let port = server.local_addr().unwrap().port();
        tokio::spawn(server.run());
        Some(port)
    } else {
        None
    };

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let http_port = listener.local_addr().unwrap().port();
    let state = HttpState::new(dispatcher, progress.clone(), Arc::new(auth))
        .with_shutdown(shutdown.clone());
    let app = http::router(state, &["*".to_string()]);
    tokio::spawn(http::serve(listener, app, shutdown.clone()));

    TestServers {
        http_port,
        socket_port,
        progress,
        shutdown,
    }
}

/// A port nothing listens on.
async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

fn config(servers: &TestServers, socket_port: u16) -> ClientConfig {
    ClientConfig {
        server_url: format!("http://127.0.0.1:{}/jsonrpc", servers.http_port),
        socket_host: "127.0.0.1".to_string(),
        socket_port,
        ..ClientConfig::default()
    }
}

fn params(value: Value) -> Params {
    value.as_object().cloned().unwrap_or_default()
}

#[tokio::test]
async fn test_call_over_socket() {
    let servers = start(true, ApiKeyStore::new(false)).await;
    let client = McpClient::new(config(&servers, servers.socket_port.unwrap())).unwrap();

    assert!(client.check_socket_server_status().await);
    for name in ["A", "B"] {
        let result = client
            .call("hello_world", params(json!({ "name": name })))
            .await
            .unwrap();
        assert_eq!(
            result["message"],
            format!("Hello, {}! Welcome to the GIMP AI Integration MCP Server.", name)
        );
    }
}

#[tokio::test]
async fn test_falls_back_to_http() {
    let servers = start(false, ApiKeyStore::new(false)).await;
    let client = McpClient::new(config(&servers, closed_port().await)).unwrap();

    assert!(!client.check_socket_server_status().await);
    assert!(client.check_server_status().await);

    let result = client.call("shutdown", Params::new()).await.unwrap();
    assert_eq!(result, json!({"shutdown": "acknowledged"}));
}

#[tokio::test]
async fn test_rpc_error_surfaces() {
    let servers = start(true, ApiKeyStore::new(false)).await;
    let client = McpClient::new(config(&servers, servers.socket_port.unwrap())).unwrap();

    let err = client
        .call("nonexistent_method", Params::new())
        .await
        .unwrap_err();
    match err {
        Error::Rpc { code, message } => {
            assert_eq!(code, -32601);
            assert_eq!(message, "Method 'nonexistent_method' not found");
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[tokio::test]
async fn test_api_key_header() {
    let auth = ApiKeyStore::new(true);
    auth.insert("plugin-key", "plugin", None);
    let servers = start(false, auth).await;

    let mut without_key = config(&servers, closed_port().await);
    without_key.prefer_socket = false;
    let client = McpClient::new(without_key.clone()).unwrap();
    assert!(client.call("hello_world", Params::new()).await.is_err());

    let with_key = ClientConfig {
        api_key: Some("plugin-key".to_string()),
        ..without_key
    };
    let client = McpClient::new(with_key).unwrap();
    let result = client.call("hello_world", Params::new()).await.unwrap();
    assert_eq!(result["status"], "success");
}

#[tokio::test]
async fn test_monitor_progress_until_complete() {
    let servers = start(false, ApiKeyStore::new(false)).await;
    let client = McpClient::new(config(&servers, closed_port().await)).unwrap();
    servers.progress.set("job-1", 0.4, "processing");

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let monitor = client.monitor_progress(
        "job-1",
        Duration::from_millis(20),
        Duration::from_secs(10),
        move |record| sink.lock().unwrap().push(record),
    );

    tokio::time::sleep(Duration::from_millis(100)).await;
    servers.progress.set("job-1", 1.0, "completed");
    tokio::time::timeout(Duration::from_secs(5), monitor)
        .await
        .unwrap()
        .unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.first().unwrap().status, "processing");
    assert_eq!(seen.last().unwrap().status, "completed");
}

#[tokio::test]
async fn test_monitor_progress_times_out() {
    let servers = start(false, ApiKeyStore::new(false)).await;
    let client = McpClient::new(config(&servers, closed_port().await)).unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let monitor = client.monitor_progress(
        "stuck",
        Duration::from_millis(20),
        Duration::from_millis(100),
        move |record| sink.lock().unwrap().push(record),
    );
    tokio::time::timeout(Duration::from_secs(5), monitor)
        .await
        .unwrap()
        .unwrap();

    let seen = seen.lock().unwrap();
    let last = seen.last().unwrap();
    assert_eq!(last.progress, 1.0);
    assert_eq!(last.status, "error: operation timed out");
    assert!(seen[..seen.len() - 1]
        .iter()
        .all(|r| r.status == "initializing"));
}
