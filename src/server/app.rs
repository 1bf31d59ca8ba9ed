use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::Router;
use axum::http::HeaderValue;
use axum::routing::{get, post};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::config::CorsConfig;
use crate::server::routes;
use crate::server::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let cors_layer = build_cors_layer(state.server_config.cors.as_ref());
    let body_limit = state.server_config.max_body_bytes();

    Router::new()
        .route("/health", get(routes::health))
        .route("/monday/automation", post(routes::monday_webhook))
        .route("/monday/action", post(routes::monday_webhook))
        .route("/nimba/dlr", post(routes::delivery_report))
        .route("/nimba/senders", post(routes::list_senders))
        .route("/sendernames", post(routes::list_senders))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(RequestBodyLimitLayer::new(body_limit))
                .layer(TraceLayer::new_for_http()),
        )
        .layer(cors_layer)
}

pub fn bind_address(state: &AppState) -> SocketAddr {
    state
        .server_config
        .bind_address()
        .parse()
        .unwrap_or_else(|_| SocketAddr::from(([127, 0, 0, 1], 8080)))
}

pub async fn serve(state: AppState) -> Result<()> {
    let addr = bind_address(&state);
    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "listening");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server failed")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

fn build_cors_layer(config: Option<&CorsConfig>) -> CorsLayer {
    let Some(config) = config else {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    };
    if config.allowed_origins.is_empty() {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }
    let origins = config
        .allowed_origins
        .iter()
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect::<Vec<_>>();
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}
