//! Rivulet Core - selective streaming of partially downloaded torrents
//!
//! Maps file byte ranges onto piece-addressed storage, tracks which pieces are
//! wanted, and turns HTTP-style range requests into byte streams that suspend
//! until the covering pieces arrive.

pub mod config;
pub mod streaming;
pub mod torrent;
pub mod tracing_setup;

// Re-export main types for convenient access
pub use config::RivuletConfig;
pub use streaming::{ByteRange, RangeRequest, StreamReader, StreamingError};
pub use torrent::{
    Bitfield, InfoHash, MemoryPieceStore, PieceIndex, PieceSpan, PieceStore, SelectionManager,
    SelectionTarget, Swarm, Torrent, TorrentError, TorrentFile, TorrentLayout, TorrentRegistry,
};

/// Core errors that can bubble up from any Rivulet subsystem.
#[derive(Debug, thiserror::Error)]
pub enum RivuletError {
    #[error("Torrent error: {0}")]
    Torrent(#[from] TorrentError),

    #[error("Streaming error: {0}")]
    Streaming(#[from] StreamingError),

    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RivuletError {
    /// Returns a user-friendly error message suitable for display.
    pub fn user_message(&self) -> String {
        match self {
            RivuletError::Torrent(e) => match e {
                TorrentError::InvalidLayout { reason } => {
                    format!("Invalid torrent layout: {reason}")
                }
                TorrentError::TorrentNotFound { id } => format!("Torrent {id} not found"),
                TorrentError::Closed => "Torrent was removed".to_string(),
                _ => "Torrent error occurred".to_string(),
            },
            RivuletError::Streaming(StreamingError::FileNotFound { path }) => {
                format!("File {path} not found")
            }
            RivuletError::Streaming(_) => "Streaming error occurred".to_string(),
            RivuletError::Configuration { reason } => format!("Configuration error: {reason}"),
            RivuletError::Io(_) => "File system error occurred".to_string(),
        }
    }

    /// Checks if this error is due to user input validation.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            RivuletError::Configuration { .. }
                | RivuletError::Torrent(TorrentError::InvalidLayout { .. })
        )
    }
}

pub type Result<T> = std::result::Result<T, RivuletError>;
