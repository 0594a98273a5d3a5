//! Registry of live torrents keyed by info hash.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use super::{InfoHash, Torrent, TorrentError};

/// Shared, read-mostly map of every torrent currently served.
#[derive(Debug, Clone, Default)]
pub struct TorrentRegistry {
    torrents: Arc<RwLock<HashMap<InfoHash, Arc<Torrent>>>>,
}

impl TorrentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a torrent. A previous torrent with the same info hash is closed
    /// and returned.
    pub fn insert(&self, torrent: Arc<Torrent>) -> Option<Arc<Torrent>> {
        let info_hash = torrent.info_hash();
        let replaced = self.torrents.write().insert(info_hash, torrent);
        if let Some(previous) = &replaced {
            previous.close();
        }
        info!(%info_hash, replaced = replaced.is_some(), "Torrent registered");
        replaced
    }

    pub fn get(&self, info_hash: &InfoHash) -> Option<Arc<Torrent>> {
        self.torrents.read().get(info_hash).cloned()
    }

    /// Resolves a hex id from a request path.
    ///
    /// # Errors
    ///
    /// - `TorrentError::TorrentNotFound` - If the id is malformed or unknown
    pub fn lookup(&self, id: &str) -> Result<Arc<Torrent>, TorrentError> {
        let info_hash = InfoHash::from_hex(id)?;
        self.get(&info_hash)
            .ok_or_else(|| TorrentError::TorrentNotFound { id: id.to_string() })
    }

    /// All torrents ordered by name, then info hash.
    pub fn list(&self) -> Vec<Arc<Torrent>> {
        let mut torrents: Vec<_> = self.torrents.read().values().cloned().collect();
        torrents.sort_by(|a, b| {
            a.name()
                .cmp(b.name())
                .then_with(|| a.info_hash().cmp(&b.info_hash()))
        });
        torrents
    }

    /// Removes and closes a torrent, invalidating its outstanding streams.
    pub fn remove(&self, info_hash: &InfoHash) -> Option<Arc<Torrent>> {
        let removed = self.torrents.write().remove(info_hash);
        if let Some(torrent) = &removed {
            torrent.close();
            info!(%info_hash, "Torrent removed");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.torrents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.torrents.read().is_empty()
    }
}
