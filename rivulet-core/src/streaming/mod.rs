//! Byte streaming over partially downloaded torrents.
//!
//! [`range`] turns request headers into byte ranges; [`reader`] turns a byte
//! range into a body stream that suspends on missing pieces instead of polling.

pub mod range;
pub mod reader;

use std::time::Duration;

pub use range::{ByteRange, RangeRequest, resolve_range, unsatisfied_content_range};
pub use reader::StreamReader;

use crate::torrent::{PieceIndex, TorrentError};

/// Errors raised while opening or pulling a file stream.
#[derive(Debug, thiserror::Error)]
pub enum StreamingError {
    #[error("File {path} not found")]
    FileNotFound { path: String },

    #[error("Requested range not satisfiable for {length} byte file")]
    RangeNotSatisfiable { length: u64 },

    #[error("Upstream read failed: {0}")]
    Upstream(#[from] TorrentError),

    #[error("Piece {piece} did not arrive within {timeout:?}")]
    IdleTimeout { piece: PieceIndex, timeout: Duration },
}
