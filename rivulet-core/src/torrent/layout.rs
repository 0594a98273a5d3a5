//! Byte to piece mapping for files inside a torrent
//!
//! A torrent is one contiguous byte space cut into fixed-size pieces (only the
//! last may be shorter). Files partition that space in declared order, so every
//! file maps onto an inclusive range of piece indices.

use std::ops::RangeInclusive;

use serde::Serialize;

use super::{PieceIndex, TorrentError};

/// A file within the torrent's byte space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TorrentFile {
    /// Display name (last path component)
    pub name: String,
    /// Path relative to the torrent root, `/` separated
    pub path: String,
    /// Byte offset of the file's first byte within the torrent
    pub offset: u64,
    /// Length of the file in bytes
    pub length: u64,
}

impl TorrentFile {
    /// Creates a file entry, deriving the display name from the path.
    pub fn new(path: impl Into<String>, offset: u64, length: u64) -> Self {
        let path = path.into();
        let name = path.rsplit('/').next().unwrap_or(&path).to_string();
        Self {
            name,
            path,
            offset,
            length,
        }
    }

    /// Torrent offset one past the file's last byte.
    pub fn end_offset(&self) -> u64 {
        self.offset + self.length
    }
}

/// Inclusive range of piece indices `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct PieceSpan {
    pub start: u32,
    pub end: u32,
}

impl PieceSpan {
    /// Creates a span; `end` is clamped so the span is never inverted.
    pub fn new(start: u32, end: u32) -> Self {
        Self {
            start,
            end: end.max(start),
        }
    }

    /// Checks if `other` lies entirely inside this span.
    pub fn contains_span(&self, other: PieceSpan) -> bool {
        self.start <= other.start && self.end >= other.end
    }

    pub fn contains(&self, index: PieceIndex) -> bool {
        self.start <= index.0 && index.0 <= self.end
    }

    /// Number of pieces covered.
    pub fn len(&self) -> u32 {
        self.end - self.start + 1
    }

    /// Always false: a span covers at least one piece.
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn indices(&self) -> RangeInclusive<u32> {
        self.start..=self.end
    }
}

/// Maps a file onto the pieces covering it.
///
/// Piece range is `[floor(offset / piece_length), floor((offset + length - 1) / piece_length)]`.
/// A zero-length file maps to the single piece holding its offset.
pub fn piece_range(file: &TorrentFile, piece_length: u32) -> PieceSpan {
    let piece_length = u64::from(piece_length.max(1));
    let start = file.offset / piece_length;
    let last_byte = (file.offset + file.length).saturating_sub(1).max(file.offset);
    let end = last_byte / piece_length;
    PieceSpan::new(saturate(start), saturate(end))
}

fn saturate(value: u64) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

/// Geometry of a torrent: piece length, total length and file partition.
#[derive(Debug, Clone)]
pub struct TorrentLayout {
    piece_length: u32,
    total_length: u64,
    piece_count: u32,
    files: Vec<TorrentFile>,
}

impl TorrentLayout {
    /// Builds a layout after checking the files partition `[0, total_length)`.
    ///
    /// # Errors
    ///
    /// - `TorrentError::InvalidLayout` - Zero piece length, no content, gaps or
    ///   overlaps between files, or more pieces than fit in a `u32`
    pub fn new(piece_length: u32, files: Vec<TorrentFile>) -> Result<Self, TorrentError> {
        if piece_length == 0 {
            return Err(invalid("piece length must be positive"));
        }

        let mut expected_offset = 0u64;
        for file in &files {
            if file.offset != expected_offset {
                return Err(invalid(format!(
                    "file {} starts at {} but previous file ends at {}",
                    file.path, file.offset, expected_offset
                )));
            }
            expected_offset = file
                .offset
                .checked_add(file.length)
                .ok_or_else(|| invalid(format!("file {} overflows torrent length", file.path)))?;
        }

        let total_length = expected_offset;
        if total_length == 0 {
            return Err(invalid("torrent has no content"));
        }

        let piece_count = u32::try_from(total_length.div_ceil(u64::from(piece_length)))
            .map_err(|_| invalid("too many pieces"))?;

        Ok(Self {
            piece_length,
            total_length,
            piece_count,
            files,
        })
    }

    /// Builds a layout from `(path, length)` pairs laid out back to back.
    ///
    /// # Errors
    ///
    /// - `TorrentError::InvalidLayout` - Same conditions as [`TorrentLayout::new`]
    pub fn from_lengths<P: Into<String>>(
        piece_length: u32,
        entries: impl IntoIterator<Item = (P, u64)>,
    ) -> Result<Self, TorrentError> {
        let mut offset = 0u64;
        let files = entries
            .into_iter()
            .map(|(path, length)| {
                let file = TorrentFile::new(path, offset, length);
                offset = offset.saturating_add(length);
                file
            })
            .collect();
        Self::new(piece_length, files)
    }

    pub fn piece_length(&self) -> u32 {
        self.piece_length
    }

    pub fn total_length(&self) -> u64 {
        self.total_length
    }

    pub fn piece_count(&self) -> u32 {
        self.piece_count
    }

    pub fn files(&self) -> &[TorrentFile] {
        &self.files
    }

    pub fn file(&self, index: usize) -> Option<&TorrentFile> {
        self.files.get(index)
    }

    /// Finds a file by its relative path.
    pub fn find_file(&self, path: &str) -> Option<(usize, &TorrentFile)> {
        self.files.iter().enumerate().find(|(_, f)| f.path == path)
    }

    /// Actual size of a specific piece; the last piece may be short.
    pub fn piece_size(&self, index: PieceIndex) -> u32 {
        if index.0 >= self.piece_count {
            return 0;
        }
        let piece_start = u64::from(index.0) * u64::from(self.piece_length);
        let remaining = self.total_length - piece_start;
        remaining.min(u64::from(self.piece_length)) as u32
    }

    /// Piece range of the file at `index`.
    pub fn file_span(&self, index: usize) -> Option<PieceSpan> {
        self.files.get(index).map(|f| self.span_of(f))
    }

    /// Piece ranges of all files in declared order.
    pub fn file_spans(&self) -> Vec<PieceSpan> {
        self.files.iter().map(|f| self.span_of(f)).collect()
    }

    /// [`piece_range`] bounded to existing pieces.
    ///
    /// An empty file sitting at the very end of the torrent has an offset one
    /// past the last byte; it belongs to the last piece.
    fn span_of(&self, file: &TorrentFile) -> PieceSpan {
        let last = self.piece_count - 1;
        let span = piece_range(file, self.piece_length);
        PieceSpan::new(span.start.min(last), span.end.min(last))
    }

    /// Piece containing an absolute torrent byte offset, with the offset inside it.
    pub fn locate(&self, torrent_offset: u64) -> Option<(PieceIndex, u32)> {
        if torrent_offset >= self.total_length {
            return None;
        }
        let piece_length = u64::from(self.piece_length);
        let index = (torrent_offset / piece_length) as u32;
        let offset = (torrent_offset % piece_length) as u32;
        Some((PieceIndex(index), offset))
    }

    /// Pieces covering `[start, end]` (inclusive) bytes of the file at `file_index`.
    pub fn span_for_file_bytes(&self, file_index: usize, start: u64, end: u64) -> Option<PieceSpan> {
        let file = self.files.get(file_index)?;
        if file.length == 0 || start > end || end >= file.length {
            return None;
        }
        let piece_length = u64::from(self.piece_length);
        let first = (file.offset + start) / piece_length;
        let last = (file.offset + end) / piece_length;
        Some(PieceSpan::new(first as u32, last as u32))
    }
}

fn invalid(reason: impl Into<String>) -> TorrentError {
    TorrentError::InvalidLayout {
        reason: reason.into(),
    }
}
