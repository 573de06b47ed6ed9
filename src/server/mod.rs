//! HTTP surface: health check and `POST /remove-bg`

pub mod error;
pub mod handlers;

use crate::{config::ServerConfig, error::Result, remover::BackgroundRemover};
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio::{net::TcpListener, signal};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use self::error::ApiError;

#[derive(Clone)]
pub struct AppState {
    pub remover: Arc<dyn BackgroundRemover>,
}

/// Build the application router around a shared remover
pub fn router(remover: Arc<dyn BackgroundRemover>) -> Router {
    Router::new()
        .route("/", get(handlers::health_check))
        .route("/remove-bg", post(handlers::remove_background))
        .layer(DefaultBodyLimit::disable())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::very_permissive())
        .with_state(AppState { remover })
}

/// Bind `config` and serve until SIGINT or SIGTERM
pub async fn serve(config: &ServerConfig, remover: Arc<dyn BackgroundRemover>) -> Result<()> {
    let addr = config.socket_addr()?;
    let listener = TcpListener::bind(addr).await.map_err(|e| {
        tracing::error!("Failed to bind TCP listener to {}: {}", addr, e);
        e
    })?;

    tracing::info!(address = %listener.local_addr()?, "Listening");

    axum::serve(listener, router(remover))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            },
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
