//! auth-gate demo server.
//!
//! Serves a protected identity echo endpoint behind the configured verifier
//! chain, plus open health and metrics endpoints.

use auth_gate::bootstrap::build_chain;
use auth_gate::config::Config;
use auth_gate::observability::metrics::init_metrics_recorder;
use auth_gate::routes::{self, AppState};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration first so AUTH_LOG_JSON can pick the log format
    let config = Config::from_env().map_err(|e| {
        eprintln!("Failed to load configuration: {e}");
        e
    })?;

    let fmt_layer = if config.log_json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "auth_gate=debug,tower_http=debug".into()),
        )
        .with(fmt_layer)
        .init();

    info!("Starting auth-gate");
    info!(
        bind_address = %config.bind_address,
        handlers = ?config.handlers,
        "Configuration loaded successfully"
    );

    let metrics_handle = init_metrics_recorder().map_err(|e| {
        error!("Failed to initialize metrics: {}", e);
        e
    })?;

    let cancel = CancellationToken::new();

    let built = build_chain(&config, cancel.clone()).await.map_err(|e| {
        error!("Failed to build verifier chain: {}", e);
        e
    })?;

    let state = AppState {
        chain: Arc::new(built.chain),
        metrics_handle,
    };
    let app = routes::build_routes(state);

    let addr: SocketAddr = config.bind_address.parse().map_err(|e| {
        error!("Invalid bind address: {}", e);
        e
    })?;

    info!("auth-gate listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel.clone()))
        .await?;

    if let Some(cache) = built.jwks_cache {
        cache.shutdown();
    }

    info!("auth-gate shutdown complete");

    Ok(())
}

/// Listens for shutdown signals (SIGTERM, SIGINT) and cancels `cancel`,
/// which stops JWKS fetches and the background refresher.
async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    cancel.cancel();
}
