//! HTTP surface of the gateway.

pub mod error;
pub mod form;
pub mod handlers;

use crate::{config::Config, gateway::Gateway};
use anyhow::{Context, Result};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub type AppState = Arc<Gateway>;

pub fn router(gateway: AppState) -> Router {
    let cfg = gateway.config();
    let file_parse = match cfg.server.variant {
        crate::config::Variant::Text => post(handlers::file_parse_text),
        crate::config::Variant::Pipeline => post(handlers::file_parse_pipeline),
    };

    let mut app = Router::new()
        .route("/ping", get(handlers::ping))
        .route("/file_parse", file_parse)
        .route("/text/file_parse", post(handlers::file_parse_text))
        .route("/pipeline/file_parse", post(handlers::file_parse_pipeline))
        .layer(DefaultBodyLimit::max(cfg.server.max_upload_bytes))
        .layer(TraceLayer::new_for_http());

    if cfg.server.cors_allow_any {
        app = app.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }

    app.with_state(gateway)
}

pub fn bind_addr(cfg: &Config, override_addr: Option<&str>) -> Result<SocketAddr> {
    let raw = match override_addr {
        Some(addr) => addr.to_string(),
        None => format!("{}:{}", cfg.server.host, cfg.server.port),
    };
    raw.parse()
        .with_context(|| format!("invalid bind address: {raw}"))
}

pub async fn serve(gateway: AppState, addr: SocketAddr) -> Result<()> {
    let app = router(gateway);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!("pdf-gateway listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .with_context(|| "server error")?;

    tracing::info!("server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::warn!("failed to install Ctrl+C handler: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                tracing::warn!("failed to install SIGTERM handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
