//! GIMP AI Integration MCP Server
//!
//! Serves the JSON-RPC methods over HTTP, the newline-delimited socket
//! transport, or both.

use clap::Parser;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use gimp_mcp::config::{Args, Config};
use gimp_mcp::error::Result;
use gimp_mcp::http::{self, auth::ApiKeyStore, HttpState};
use gimp_mcp::mcp::handler::MethodRegistry;
use gimp_mcp::mcp::progress::{ProgressStore, DEFAULT_SWEEP_INTERVAL};
use gimp_mcp::mcp::server::Dispatcher;
use gimp_mcp::mcp::transport::SocketServer;
use gimp_mcp::methods;
use gimp_mcp::metrics::Metrics;
use gimp_mcp::VERSION;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    // Initialize logging
    let default_level = if args.debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    let config: Config = args.into();

    info!("GIMP AI Integration MCP Server v{}", VERSION);
    info!("Transport: {:?}", config.transport);

    let progress = Arc::new(ProgressStore::new());
    let mut registry = MethodRegistry::new();
    methods::register_all(&mut registry, progress.clone());
    info!("Registered {} methods", registry.len());
    let dispatcher = Arc::new(Dispatcher::new(Arc::new(registry), Metrics::new()));

    let shutdown = CancellationToken::new();
    let sweeper = progress.clone().spawn_sweeper(
        config.progress_ttl(),
        DEFAULT_SWEEP_INTERVAL,
        shutdown.clone(),
    );

    let mut servers = JoinSet::new();

    if config.transport.serves_socket() {
        let server = SocketServer::bind(&config.socket_addr(), dispatcher.clone())
            .await?
            .with_cancellation(shutdown.clone());
        servers.spawn(server.run());
    }

    if config.transport.serves_http() {
        let auth = Arc::new(ApiKeyStore::from_env(config.enable_auth));
        if config.enable_auth {
            info!("API key authentication enabled, {} keys loaded", auth.active_keys());
        }
        let state = HttpState::new(dispatcher.clone(), progress.clone(), auth)
            .with_production(config.is_production())
            .with_shutdown(shutdown.clone());
        let http_config = config.clone();
        servers.spawn(async move { http::start_server(&http_config, state).await });
    }

    let mut outcome = Ok(());
    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("Shutdown signal received"),
        Some(joined) = servers.join_next() => {
            if let Ok(Err(e)) = joined {
                error!("Server exited: {}", e);
                outcome = Err(e);
            }
        }
    }

    shutdown.cancel();
    while let Some(joined) = servers.join_next().await {
        match joined {
            Ok(Err(e)) => error!("Server exited with error: {}", e),
            Err(e) => error!("Server task failed: {}", e),
            Ok(Ok(())) => {}
        }
    }
    let _ = sweeper.await;

    info!("Shutdown complete");
    outcome
}
