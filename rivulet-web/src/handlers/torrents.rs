//! Torrent listing and selection control.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use rivulet_core::torrent::{SelectionTarget, TorrentStats, TorrentSummary};
use tracing::info;

use crate::error::ApiError;
use crate::server::AppState;

pub async fn list_torrents(State(state): State<AppState>) -> Json<Vec<TorrentSummary>> {
    let summaries = state
        .registry
        .list()
        .iter()
        .map(|torrent| torrent.summary())
        .collect();
    Json(summaries)
}

/// # Errors
///
/// - `ApiError::NotFound` - If the torrent is unknown
pub async fn get_torrent(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<TorrentSummary>, ApiError> {
    let torrent = state.registry.lookup(&id)?;
    Ok(Json(torrent.summary()))
}

/// Removes a torrent; its open streams end with an error.
///
/// # Errors
///
/// - `ApiError::NotFound` - If the torrent is unknown
pub async fn delete_torrent(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let torrent = state.registry.lookup(&id)?;
    state.registry.remove(&torrent.info_hash());
    Ok(StatusCode::OK)
}

/// # Errors
///
/// - `ApiError::NotFound` - If the torrent is unknown
pub async fn torrent_stats(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<TorrentStats>, ApiError> {
    let torrent = state.registry.lookup(&id)?;
    Ok(Json(torrent.stats()))
}

/// Selects every file.
///
/// # Errors
///
/// - `ApiError::NotFound` - If the torrent is unknown
pub async fn start_all(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    apply_selection(&state, &id, None, true)
}

/// Selects one file; an unparsable or out-of-range index selects every file.
///
/// # Errors
///
/// - `ApiError::NotFound` - If the torrent is unknown
pub async fn start_file(
    State(state): State<AppState>,
    Path((id, index)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    apply_selection(&state, &id, Some(&index), true)
}

/// Deselects every file.
///
/// # Errors
///
/// - `ApiError::NotFound` - If the torrent is unknown
pub async fn stop_all(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    apply_selection(&state, &id, None, false)
}

/// Deselects one file; an unparsable or out-of-range index deselects every file.
///
/// # Errors
///
/// - `ApiError::NotFound` - If the torrent is unknown
pub async fn stop_file(
    State(state): State<AppState>,
    Path((id, index)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    apply_selection(&state, &id, Some(&index), false)
}

/// # Errors
///
/// - `ApiError::NotFound` - If the torrent is unknown
pub async fn pause_torrent(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let torrent = state.registry.lookup(&id)?;
    torrent.selection().pause();
    Ok(StatusCode::OK)
}

/// # Errors
///
/// - `ApiError::NotFound` - If the torrent is unknown
pub async fn resume_torrent(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let torrent = state.registry.lookup(&id)?;
    torrent.selection().resume();
    Ok(StatusCode::OK)
}

fn apply_selection(
    state: &AppState,
    id: &str,
    index: Option<&str>,
    select: bool,
) -> Result<StatusCode, ApiError> {
    let torrent = state.registry.lookup(id)?;
    let selection = torrent.selection();
    let target = SelectionTarget::parse(index, selection.file_count());

    let changed = if select {
        selection.select(target)?
    } else {
        selection.deselect(target)?
    };
    info!(info_hash = %torrent.info_hash(), %target, select, changed, "Selection request");
    Ok(StatusCode::OK)
}
