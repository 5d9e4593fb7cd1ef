mod frames;
mod page;
mod stream;
mod types;

use anyhow::Context;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderValue, Method};
use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

use crate::state::AppState;

/// Origins allowed to call the API: the local dashboard itself plus the
/// analytics server, whose pages post messages on behalf of their frames.
fn allowed_origins(state: &AppState) -> Vec<HeaderValue> {
    let mut origins = vec![
        "http://localhost".to_string(),
        "http://127.0.0.1".to_string(),
        format!("http://localhost:{}", state.config.port),
        format!("http://127.0.0.1:{}", state.config.port),
    ];
    if let Ok(base) = url::Url::parse(&state.config.analytics_base_url) {
        origins.push(base.origin().ascii_serialization());
    }
    origins
        .into_iter()
        .filter_map(|o| HeaderValue::from_str(&o).ok())
        .collect()
}

/// Build the router (exposed for testing).
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(allowed_origins(&state))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE]);

    Router::new()
        .route("/", get(page::serve_dashboard))
        .route("/health", get(frames::health))
        .route("/api/config", get(frames::get_config))
        .route("/api/frames", get(frames::list_frames))
        .route("/api/messages", axum::routing::post(frames::post_message))
        .route("/api/stream", get(stream::ws_stream))
        .layer(cors)
        .with_state(state)
}

/// Bind the configured address and serve until shutdown.
pub async fn start_server(state: Arc<AppState>) -> anyhow::Result<()> {
    let addr = state.config.socket_addr().map_err(anyhow::Error::msg)?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    serve(listener, state).await
}

/// Serve on an already-bound listener. Stops on Ctrl-C or when
/// [`AppState::shutdown`] is called.
pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> anyhow::Result<()> {
    let addr = listener.local_addr().context("failed to get local address")?;
    tracing::info!(%addr, "analytics dashboard listening");

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    *state.server_shutdown.lock() = Some(shutdown_tx);

    let app = build_router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::select! {
                _ = shutdown_rx => {}
                _ = tokio::signal::ctrl_c() => tracing::info!("interrupt received, shutting down"),
            }
        })
        .await
        .context("dashboard server error")?;

    tracing::info!("analytics dashboard stopped");
    Ok(())
}
