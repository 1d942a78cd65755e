//! Codex Naturalis match server.
//!
//! Runs one match coordinator behind two transports: the stream transport
//! and the WebSocket remote-object transport, which also serves the
//! health check.

use std::{net::SocketAddr, sync::Arc};

use anyhow::{Error, anyhow};
use codex::{
    Coordinator, CoordinatorActor, SessionRegistry, StandardRules, StreamServer,
    net::connection::SharedSink,
};
use codex_server::{
    api,
    config::ServerConfig,
    logging,
    metrics::{self, MeteredSink},
};
use pico_args::Arguments;
use tracing::{error, info};

const HELP: &str = "\
Run a Codex Naturalis match server

USAGE:
  codex_server [OPTIONS]

OPTIONS:
  --stream-bind   IP:PORT  Stream transport address     [default: env STREAM_BIND or 0.0.0.0:5033]
  --remote-bind   IP:PORT  Remote-object transport address [default: env REMOTE_BIND or 0.0.0.0:1099]
  --metrics-bind  IP:PORT  Prometheus exporter address  [default: env METRICS_BIND, disabled if unset]

FLAGS:
  -h, --help               Print help information

ENVIRONMENT:
  REMOTE_OBJECT_NAME       Name of the remote object [default: CodexNaturalisServer]
  LIVENESS_WINDOW_MS       Silence allowed before a connection is dropped [default: 10000]
  WINNING_THRESHOLD        Score that starts the last lap [default: 20]
  MIN_PLAYERS              Smallest match the host may pick [default: 2]
  MAX_PLAYERS              Largest match the host may pick [default: 4]
  RUST_LOG                 Log filter [default: info]
";

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let stream_bind: Option<SocketAddr> = pargs.opt_value_from_str("--stream-bind")?;
    let remote_bind: Option<SocketAddr> = pargs.opt_value_from_str("--remote-bind")?;
    let metrics_bind: Option<SocketAddr> = pargs.opt_value_from_str("--metrics-bind")?;

    logging::init();

    let config = ServerConfig::from_env(stream_bind, remote_bind, metrics_bind)?;
    config.validate()?;

    if let Some(addr) = config.metrics_bind {
        metrics::init_metrics(addr).map_err(|e| anyhow!(e))?;
        info!("Metrics exported on http://{addr}/metrics");
    }

    let registry = Arc::new(SessionRegistry::new());
    let coordinator = Coordinator::new(config.match_config, registry.clone(), StandardRules::new);
    let (actor, handle) = CoordinatorActor::new(coordinator);
    tokio::spawn(actor.run());
    metrics::spawn_sampler(handle.clone(), metrics::SAMPLE_INTERVAL);

    let stream_sink: SharedSink = Arc::new(MeteredSink::new(
        Arc::new(handle.clone()),
        registry.clone(),
        "stream",
    ));
    let stream = StreamServer::bind(config.stream_bind, config.transport, stream_sink)
        .await
        .map_err(|e| anyhow!("Failed to bind stream transport to {}: {e}", config.stream_bind))?;
    let stream_task = tokio::spawn(stream.run());

    let remote_sink: SharedSink = Arc::new(MeteredSink::new(
        Arc::new(handle.clone()),
        registry,
        "remote",
    ));
    let state = api::AppState {
        coordinator: handle,
        sink: remote_sink,
        transport: config.transport,
        object_name: config.object_name.as_str().into(),
    };
    let app = api::create_router(state);

    let listener = tokio::net::TcpListener::bind(config.remote_bind)
        .await
        .map_err(|e| anyhow!("Failed to bind remote transport to {}: {e}", config.remote_bind))?;

    info!(
        "Server is running: stream on {}, remote object ws://{}/{}. Press Ctrl+C to stop.",
        config.stream_bind, config.remote_bind, config.object_name
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| anyhow!("Server error: {e}"))?;

    info!("Shutting down server...");
    stream_task.abort();

    Ok(())
}

/// Graceful shutdown signal
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {e}");
        std::future::pending::<()>().await;
    }
}
