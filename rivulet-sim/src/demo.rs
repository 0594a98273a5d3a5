//! Demo torrents built from local directories.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::BytesMut;
use rivulet_core::config::SimulationConfig;
use rivulet_core::torrent::{InfoHash, MemoryPieceStore, TorrentFile, TorrentLayout};
use rivulet_core::{RivuletError, Torrent};
use sha1::{Digest, Sha1};
use tracing::info;

use crate::swarm::SimulatedSwarm;

/// A regular file found under the scanned directory.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ScannedFile {
    /// Path relative to the root, `/`-separated
    relative: String,
    absolute: PathBuf,
    length: u64,
}

/// Torrent over a local directory, served through a [`SimulatedSwarm`].
#[derive(Debug, Clone)]
pub struct DemoTorrent {
    pub torrent: Arc<Torrent>,
    pub swarm: Arc<SimulatedSwarm>,
}

impl DemoTorrent {
    /// Reads every regular file under `root` into memory and wires the
    /// resulting torrent to a fresh simulated swarm. Nothing is present until
    /// something is selected or streamed.
    ///
    /// # Errors
    ///
    /// - `RivuletError::Io` - If the directory or a file cannot be read
    /// - `RivuletError::Torrent` - If the directory holds no content
    pub async fn from_directory(
        root: &Path,
        config: &SimulationConfig,
    ) -> Result<Self, RivuletError> {
        let files = scan_directory(root).await?;
        let layout = build_layout(&files, config.piece_length)?;

        let mut content = BytesMut::with_capacity(layout.total_length() as usize);
        for file in &files {
            content.extend_from_slice(&tokio::fs::read(&file.absolute).await?);
        }
        if content.len() as u64 != layout.total_length() {
            return Err(RivuletError::Configuration {
                reason: format!("{} changed while being read", root.display()),
            });
        }

        let name = directory_name(root);
        let info_hash = info_hash_for(&name, &layout);
        let store = Arc::new(MemoryPieceStore::for_layout(&layout));
        let swarm = SimulatedSwarm::spawn(&layout, store.clone(), content.freeze(), config)?;

        info!(
            %info_hash,
            name = %name,
            files = layout.files().len(),
            pieces = layout.piece_count(),
            "Demo torrent created"
        );
        let torrent = Torrent::new(info_hash, name, layout, store, swarm.clone())?;

        Ok(Self {
            torrent: Arc::new(torrent),
            swarm,
        })
    }
}

/// Piece layout a directory would get, without reading file contents.
///
/// # Errors
///
/// - `RivuletError::Io` - If the directory cannot be walked
/// - `RivuletError::Torrent` - If the directory holds no content
pub async fn layout_for_directory(
    root: &Path,
    piece_length: u32,
) -> Result<TorrentLayout, RivuletError> {
    let files = scan_directory(root).await?;
    Ok(build_layout(&files, piece_length)?)
}

fn build_layout(
    files: &[ScannedFile],
    piece_length: u32,
) -> Result<TorrentLayout, rivulet_core::TorrentError> {
    let mut offset = 0u64;
    let entries = files
        .iter()
        .map(|file| {
            let entry = TorrentFile::new(file.relative.clone(), offset, file.length);
            offset += file.length;
            entry
        })
        .collect();
    TorrentLayout::new(piece_length, entries)
}

/// Regular files below `root`, sorted by relative path.
async fn scan_directory(root: &Path) -> Result<Vec<ScannedFile>, RivuletError> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let file_type = entry.file_type().await?;
            let path = entry.path();
            if file_type.is_dir() {
                pending.push(path);
            } else if file_type.is_file() {
                let length = entry.metadata().await?.len();
                files.push(ScannedFile {
                    relative: relative_path(root, &path),
                    absolute: path,
                    length,
                });
            }
        }
    }

    files.sort_by(|a, b| a.relative.cmp(&b.relative));
    Ok(files)
}

fn relative_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn directory_name(root: &Path) -> String {
    root.file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("torrent")
        .to_string()
}

/// SHA-1 over the name and layout. Stable for an unchanged directory.
fn info_hash_for(name: &str, layout: &TorrentLayout) -> InfoHash {
    let mut hasher = Sha1::new();
    hasher.update(name.as_bytes());
    hasher.update(layout.piece_length().to_be_bytes());
    for file in layout.files() {
        hasher.update(file.path.as_bytes());
        hasher.update([0u8]);
        hasher.update(file.length.to_be_bytes());
    }
    let digest = hasher.finalize();
    let mut hash = [0u8; 20];
    hash.copy_from_slice(&digest[..20]);
    InfoHash::new(hash)
}
