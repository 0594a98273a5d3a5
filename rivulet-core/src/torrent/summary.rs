//! JSON views of a torrent for the HTTP API.

use serde::Serialize;

use super::{InfoHash, TorrentFile};

/// Torrent description served by `GET /torrents` and `GET /torrents/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TorrentSummary {
    pub info_hash: InfoHash,
    pub name: String,
    pub length: u64,
    pub piece_length: u32,
    /// Layout known and storage open; false once the torrent is closed
    pub ready: bool,
    /// Some wanted piece is still missing and fetching is not paused
    pub interested: bool,
    pub paused: bool,
    pub files: Vec<FileSummary>,
    pub progress: f64,
}

/// One file entry of a [`TorrentSummary`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSummary {
    pub name: String,
    pub path: String,
    /// Streaming URL of the file
    pub link: String,
    pub length: u64,
    pub offset: u64,
    pub selected: bool,
}

impl FileSummary {
    pub fn new(info_hash: InfoHash, file: &TorrentFile, selected: bool) -> Self {
        Self {
            name: file.name.clone(),
            path: file.path.clone(),
            link: file_link(info_hash, &file.path),
            length: file.length,
            offset: file.offset,
            selected,
        }
    }
}

/// Counters served by `GET /torrents/{id}/stats`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TorrentStats {
    pub pieces: u32,
    pub pieces_present: u32,
    pub progress: f64,
    pub paused: bool,
    /// Active file selections
    pub selections: usize,
    /// Open streams holding a read interest
    pub streams: usize,
}

/// Streaming URL for a file, with the path percent-encoded as one segment.
pub fn file_link(info_hash: InfoHash, path: &str) -> String {
    format!("/torrents/{info_hash}/files/{}", urlencoding::encode(path))
}
