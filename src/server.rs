//! HTTP server assembly: mounts the Protocol Serving Layer and the Admin
//! Control Plane behind one `axum::Router`, with graceful shutdown shared
//! by the Background Job Engine's polling loop.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::decompression::RequestDecompressionLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::cache::Cache;
use crate::state::AppState;

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Runs the server until shutdown, driving the job engine's polling loop
/// and the cache's expiry sweep alongside it. Returns once the listener
/// and background tasks have both wound down.
pub async fn run(address: SocketAddr, state: Arc<AppState>) -> Result<(), AnyError> {
    let shutdown = CancellationToken::new();

    let job_engine_handle = Arc::clone(&state.job_engine).spawn(shutdown.clone());
    let sweep_handle = spawn_cache_sweep(Arc::clone(&state.cache), shutdown.clone());

    let app = Router::new()
        .route("/health", get(health))
        .merge(crate::protocol::router(Arc::clone(&state)))
        .merge(crate::admin::router(Arc::clone(&state)))
        .layer(RequestDecompressionLayer::new())
        .layer(TraceLayer::new_for_http());

    let listener = TcpListener::bind(address).await?;
    info!(%address, "tfmirror listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    job_engine_handle.await?;
    sweep_handle.await?;

    Ok(())
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

fn spawn_cache_sweep(cache: Arc<Cache>, shutdown: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            tokio::select! {
                _ = interval.tick() => cache.sweep_expired().await,
                _ = shutdown.cancelled() => break,
            }
        }
    })
}

async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).expect("failed to install signal handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
    shutdown.cancel();
}
