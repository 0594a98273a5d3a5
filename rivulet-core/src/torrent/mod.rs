//! Torrent model: piece layout, presence bitfield, storage and swarm boundaries,
//! selections and the registry of live torrents.

pub mod bitfield;
pub mod layout;
pub mod piece_store;
pub mod progress;
pub mod registry;
pub mod selection;
pub mod session;
pub mod summary;
pub mod swarm;

use std::fmt;
use std::str::FromStr;

pub use bitfield::{Bitfield, BitfieldState};
pub use layout::{PieceSpan, TorrentFile, TorrentLayout, piece_range};
pub use piece_store::{MemoryPieceStore, PieceStore};
pub use progress::{progress, progress_of};
pub use registry::TorrentRegistry;
pub use selection::{
    InterestGuard, Priority, Selection, SelectionManager, SelectionSnapshot, SelectionTarget,
};
pub use session::Torrent;
pub use summary::{FileSummary, TorrentStats, TorrentSummary};
pub use swarm::{IdleSwarm, Swarm};

/// SHA-1 hash identifying a unique torrent.
///
/// 20-byte SHA-1 hash of the info dictionary from a torrent file.
/// Rendered and parsed as 40 lowercase hex characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InfoHash([u8; 20]);

impl InfoHash {
    /// Creates InfoHash from 20-byte SHA-1 hash.
    pub fn new(hash: [u8; 20]) -> Self {
        Self(hash)
    }

    /// Returns reference to underlying 20-byte hash.
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Parses a 40 character hex string.
    ///
    /// # Errors
    ///
    /// - `TorrentError::TorrentNotFound` - If the string is not a valid info hash;
    ///   an unparsable id can never name a registered torrent
    pub fn from_hex(hex_str: &str) -> Result<Self, TorrentError> {
        let not_found = || TorrentError::TorrentNotFound {
            id: hex_str.to_string(),
        };
        let bytes = hex::decode(hex_str).map_err(|_| not_found())?;
        let hash: [u8; 20] = bytes.try_into().map_err(|_| not_found())?;
        Ok(Self(hash))
    }
}

impl fmt::Display for InfoHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl FromStr for InfoHash {
    type Err = TorrentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl serde::Serialize for InfoHash {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Zero-based index of a piece within a torrent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PieceIndex(pub u32);

impl PieceIndex {
    /// Creates PieceIndex from zero-based index.
    pub fn new(index: u32) -> Self {
        Self(index)
    }

    /// Returns the underlying piece index as u32.
    pub fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for PieceIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Errors that can occur during torrent operations.
#[derive(Debug, thiserror::Error)]
pub enum TorrentError {
    #[error("Invalid torrent layout: {reason}")]
    InvalidLayout { reason: String },

    #[error("Torrent {id} not found")]
    TorrentNotFound { id: String },

    #[error("File index {index} out of range for {file_count} files")]
    FileIndexOutOfRange { index: usize, file_count: usize },

    #[error("Piece {index} out of range for {piece_count} pieces")]
    PieceOutOfRange { index: PieceIndex, piece_count: u32 },

    #[error("Piece {index} is not present")]
    PieceUnavailable { index: PieceIndex },

    #[error("Piece {index} has {actual} bytes, expected {expected}")]
    InvalidPieceData {
        index: PieceIndex,
        expected: u32,
        actual: usize,
    },

    #[error("Read of {length} bytes at offset {offset} exceeds piece {index}")]
    InvalidRead {
        index: PieceIndex,
        offset: u32,
        length: u32,
    },

    #[error("Torrent has been closed")]
    Closed,

    #[error("Storage error: {reason}")]
    Storage { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_info_hash_display() {
        let hash = [
            0x01, 0x23, 0x45, 0x67, 0x89, 0xab, 0xcd, 0xef, 0x01, 0x23, 0x45, 0x67, 0x89, 0xab,
            0xcd, 0xef, 0x01, 0x23, 0x45, 0x67,
        ];
        let info_hash = InfoHash::new(hash);
        assert_eq!(
            info_hash.to_string(),
            "0123456789abcdef0123456789abcdef01234567"
        );
        assert_eq!(InfoHash::from_hex(&info_hash.to_string()).unwrap(), info_hash);
    }

    #[test]
    fn test_info_hash_rejects_bad_hex() {
        assert!(matches!(
            InfoHash::from_hex("not-a-hash"),
            Err(TorrentError::TorrentNotFound { .. })
        ));
        // Valid hex, wrong length
        assert!("abcd".parse::<InfoHash>().is_err());
    }

    #[test]
    fn test_info_hash_serializes_as_hex() {
        let info_hash = InfoHash::new([0xff; 20]);
        let json = serde_json::to_string(&info_hash).unwrap();
        assert_eq!(json, format!("\"{}\"", "ff".repeat(20)));
    }

    #[test]
    fn test_piece_index_ordering() {
        let piece1 = PieceIndex::new(5);
        let piece2 = PieceIndex::new(10);
        assert!(piece1 < piece2);
        assert_eq!(piece1.as_u32(), 5);
        assert_eq!(piece2.to_string(), "10");
    }
}
