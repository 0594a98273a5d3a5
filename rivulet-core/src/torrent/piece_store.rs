//! Piece storage boundary
//!
//! The storage/network layer owns piece bytes and the presence bitfield. The
//! streaming core only reads from it; verification and persistence happen on
//! the other side of this trait.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;

use super::{Bitfield, PieceIndex, TorrentError, TorrentLayout};

/// Abstract interface for piece retrieval.
///
/// Implementations must only flip a bitfield entry after the piece bytes are
/// readable through [`PieceStore::read`].
#[async_trait]
pub trait PieceStore: Send + Sync {
    /// Reads `length` bytes starting at `offset` inside a present piece.
    ///
    /// # Errors
    ///
    /// - `TorrentError::PieceUnavailable` - If the piece is not present yet
    /// - `TorrentError::InvalidRead` - If the slice exceeds the piece
    /// - `TorrentError::Storage` - If the backend fails
    async fn read(&self, index: PieceIndex, offset: u32, length: u32)
    -> Result<Bytes, TorrentError>;

    /// Presence bitfield maintained by this store.
    fn bitfield(&self) -> Arc<Bitfield>;
}

/// Piece store keeping verified pieces in memory.
///
/// Used by the simulated swarm and by tests; a disk-backed store would expose
/// the same contract.
#[derive(Debug)]
pub struct MemoryPieceStore {
    piece_length: u32,
    total_length: u64,
    pieces: RwLock<HashMap<u32, Bytes>>,
    bitfield: Arc<Bitfield>,
}

impl MemoryPieceStore {
    /// Creates an empty store sized for a layout.
    pub fn for_layout(layout: &TorrentLayout) -> Self {
        Self {
            piece_length: layout.piece_length(),
            total_length: layout.total_length(),
            pieces: RwLock::new(HashMap::new()),
            bitfield: Arc::new(Bitfield::new(layout.piece_count())),
        }
    }

    fn expected_size(&self, index: PieceIndex) -> Option<u32> {
        if index.0 >= self.bitfield.len() {
            return None;
        }
        let start = u64::from(index.0) * u64::from(self.piece_length);
        Some((self.total_length - start).min(u64::from(self.piece_length)) as u32)
    }

    /// Stores a verified piece and marks it present.
    ///
    /// Returns `true` if the piece was not stored before.
    ///
    /// # Errors
    ///
    /// - `TorrentError::PieceOutOfRange` - If index exceeds piece count
    /// - `TorrentError::InvalidPieceData` - If data length differs from piece size
    pub fn store_piece(&self, index: PieceIndex, data: Bytes) -> Result<bool, TorrentError> {
        let expected = self
            .expected_size(index)
            .ok_or(TorrentError::PieceOutOfRange {
                index,
                piece_count: self.bitfield.len(),
            })?;
        if data.len() != expected as usize {
            return Err(TorrentError::InvalidPieceData {
                index,
                expected,
                actual: data.len(),
            });
        }

        if self.bitfield.has(index) {
            return Ok(false);
        }

        self.pieces.write().insert(index.0, data);
        self.bitfield.mark_present(index)
    }

    /// Stores every piece of `content`, which must span the whole torrent.
    ///
    /// # Errors
    ///
    /// - `TorrentError::InvalidPieceData` - If content length differs from torrent length
    pub fn store_all(&self, content: &Bytes) -> Result<(), TorrentError> {
        if content.len() as u64 != self.total_length {
            return Err(TorrentError::InvalidPieceData {
                index: PieceIndex(0),
                expected: self.piece_length,
                actual: content.len(),
            });
        }
        for index in 0..self.bitfield.len() {
            let start = index as usize * self.piece_length as usize;
            let end = (start + self.piece_length as usize).min(content.len());
            self.store_piece(PieceIndex(index), content.slice(start..end))?;
        }
        Ok(())
    }
}

#[async_trait]
impl PieceStore for MemoryPieceStore {
    async fn read(
        &self,
        index: PieceIndex,
        offset: u32,
        length: u32,
    ) -> Result<Bytes, TorrentError> {
        if !self.bitfield.has(index) {
            return Err(TorrentError::PieceUnavailable { index });
        }

        let pieces = self.pieces.read();
        let piece = pieces
            .get(&index.0)
            .ok_or(TorrentError::PieceUnavailable { index })?;

        let start = offset as usize;
        let end = start + length as usize;
        if end > piece.len() {
            return Err(TorrentError::InvalidRead {
                index,
                offset,
                length,
            });
        }
        Ok(piece.slice(start..end))
    }

    fn bitfield(&self) -> Arc<Bitfield> {
        self.bitfield.clone()
    }
}
