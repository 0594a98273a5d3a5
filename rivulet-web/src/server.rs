//! Router construction and the server loop.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use rivulet_core::config::RivuletConfig;
use rivulet_core::{RivuletError, TorrentRegistry};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::handlers::{
    delete_torrent, get_torrent, list_torrents, pause_torrent, resume_torrent, serve_file,
    start_all, start_file, stop_all, stop_file, torrent_stats,
};

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub registry: TorrentRegistry,
    pub config: Arc<RivuletConfig>,
}

impl AppState {
    pub fn new(registry: TorrentRegistry, config: RivuletConfig) -> Self {
        Self {
            registry,
            config: Arc::new(config),
        }
    }
}

/// Builds the HTTP router. `get` routes answer `HEAD` as well.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/torrents", get(list_torrents))
        .route("/torrents/{info_hash}", get(get_torrent).delete(delete_torrent))
        .route("/torrents/{info_hash}/stats", get(torrent_stats))
        .route("/torrents/{info_hash}/start", post(start_all))
        .route("/torrents/{info_hash}/start/{index}", post(start_file))
        .route("/torrents/{info_hash}/stop", post(stop_all))
        .route("/torrents/{info_hash}/stop/{index}", post(stop_file))
        .route("/torrents/{info_hash}/pause", post(pause_torrent))
        .route("/torrents/{info_hash}/resume", post(resume_torrent))
        .route("/torrents/{info_hash}/files/{*path}", get(serve_file))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serves the registry until Ctrl-C, then closes every torrent.
///
/// # Errors
///
/// - `RivuletError::Io` - If the listener cannot bind or the server fails
pub async fn run_server(
    config: RivuletConfig,
    registry: TorrentRegistry,
) -> Result<(), RivuletError> {
    let addr = config.server.socket_addr();
    let app = router(AppState::new(registry.clone(), config));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, torrents = registry.len(), "Rivulet server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    for torrent in registry.list() {
        registry.remove(&torrent.info_hash());
    }
    info!("Rivulet server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}
