//! Range reads that wait for pieces to arrive.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::stream::{self, Stream};
use tracing::{debug, trace};

use super::{ByteRange, StreamingError};
use crate::config::StreamingConfig;
use crate::torrent::{InterestGuard, PieceIndex, Torrent, TorrentError, TorrentFile};

/// Reader over one byte range of one file.
///
/// Opening registers a critical interest over the covering pieces; the
/// interest lives exactly as long as the reader or the stream made from it.
#[derive(Debug)]
pub struct StreamReader {
    torrent: Arc<Torrent>,
    file_index: usize,
    range: Option<ByteRange>,
    interest: Option<InterestGuard>,
    chunk_size: u32,
    idle_timeout: Duration,
}

impl StreamReader {
    /// Opens a reader over `range` of the file at `file_index`, or over the
    /// whole file when `range` is `None`.
    ///
    /// # Errors
    ///
    /// - `StreamingError::Upstream` - If the file index is unknown or the torrent is closed
    /// - `StreamingError::RangeNotSatisfiable` - If the range leaves the file
    pub fn open(
        torrent: Arc<Torrent>,
        file_index: usize,
        range: Option<ByteRange>,
        config: &StreamingConfig,
    ) -> Result<Self, StreamingError> {
        if torrent.is_closed() {
            return Err(TorrentError::Closed.into());
        }
        let file = torrent
            .layout()
            .file(file_index)
            .ok_or(TorrentError::FileIndexOutOfRange {
                index: file_index,
                file_count: torrent.files().len(),
            })?;

        let length = file.length;
        let range = match range {
            Some(range) if range.start > range.end || range.end >= length => {
                return Err(StreamingError::RangeNotSatisfiable { length });
            }
            Some(range) => Some(range),
            None => ByteRange::full(length),
        };

        let interest = range
            .and_then(|r| torrent.layout().span_for_file_bytes(file_index, r.start, r.end))
            .map(|span| torrent.selection().register_interest(span));

        debug!(
            info_hash = %torrent.info_hash(),
            file = %file.path,
            start = range.map(|r| r.start),
            end = range.map(|r| r.end),
            "Opened stream"
        );

        Ok(Self {
            torrent,
            file_index,
            range,
            interest,
            chunk_size: config.chunk_size.max(1),
            idle_timeout: config.idle_timeout,
        })
    }

    pub fn file(&self) -> &TorrentFile {
        &self.torrent.files()[self.file_index]
    }

    /// Bytes this reader will produce; `None` for an empty file.
    pub fn range(&self) -> Option<ByteRange> {
        self.range
    }

    /// Total body length in bytes.
    pub fn content_length(&self) -> u64 {
        self.range.map_or(0, |r| r.len())
    }

    /// Converts the reader into a body stream of at most `chunk_size` chunks.
    ///
    /// The stream yields at most one error and then ends. Dropping it early
    /// releases this reader's interest and nothing else.
    pub fn into_stream(self) -> impl Stream<Item = Result<Bytes, StreamingError>> + Send + 'static {
        let file_offset = self.file().offset;
        let (position, end) = match self.range {
            Some(range) => (file_offset + range.start, file_offset + range.end + 1),
            None => (file_offset, file_offset),
        };

        let state = ReadState {
            torrent: self.torrent,
            position,
            end,
            chunk_size: self.chunk_size,
            idle_timeout: self.idle_timeout,
            failed: false,
            _interest: self.interest,
        };

        stream::unfold(state, |mut state| async move {
            if state.failed || state.position >= state.end {
                return None;
            }
            match state.next_chunk().await {
                Ok(bytes) => Some((Ok(bytes), state)),
                Err(e) => {
                    debug!(error = %e, position = state.position, "Stream aborted");
                    state.failed = true;
                    Some((Err(e), state))
                }
            }
        })
    }
}

struct ReadState {
    torrent: Arc<Torrent>,
    /// Absolute torrent offset of the next byte
    position: u64,
    /// Absolute torrent offset one past the last byte
    end: u64,
    chunk_size: u32,
    idle_timeout: Duration,
    failed: bool,
    _interest: Option<InterestGuard>,
}

impl ReadState {
    async fn next_chunk(&mut self) -> Result<Bytes, StreamingError> {
        if self.torrent.is_closed() {
            return Err(TorrentError::Closed.into());
        }

        let layout = self.torrent.layout();
        let piece_length = u64::from(layout.piece_length());
        let piece = PieceIndex((self.position / piece_length) as u32);
        let offset = (self.position % piece_length) as u32;
        let in_piece = u64::from(layout.piece_size(piece).saturating_sub(offset));
        let length = in_piece
            .min(self.end - self.position)
            .min(u64::from(self.chunk_size)) as u32;

        self.ensure_piece(piece).await?;

        let bytes = self.torrent.store().read(piece, offset, length).await?;
        if bytes.len() != length as usize {
            return Err(TorrentError::InvalidRead {
                index: piece,
                offset,
                length,
            }
            .into());
        }

        trace!(%piece, offset, length, "Read chunk");
        self.position += u64::from(length);
        Ok(bytes)
    }

    async fn ensure_piece(&self, piece: PieceIndex) -> Result<(), StreamingError> {
        let bitfield = self.torrent.bitfield();
        if bitfield.has(piece) {
            return Ok(());
        }

        debug!(%piece, position = self.position, "Suspending stream until piece arrives");
        match tokio::time::timeout(self.idle_timeout, bitfield.wait_for(piece)).await {
            Ok(arrived) => {
                arrived?;
                debug!(%piece, "Resuming stream");
                Ok(())
            }
            Err(_) => Err(StreamingError::IdleTimeout {
                piece,
                timeout: self.idle_timeout,
            }),
        }
    }
}

impl Drop for ReadState {
    fn drop(&mut self) {
        debug!(
            info_hash = %self.torrent.info_hash(),
            remaining = self.end.saturating_sub(self.position),
            "Stream closed"
        );
    }
}

#[cfg(test)]
mod tests {
    use std::pin::pin;

    use futures::StreamExt;

    use super::*;
    use crate::torrent::MemoryPieceStore;
    use crate::torrent::SelectionTarget;
    use crate::torrent::session::tests::create_torrent;

    fn content(length: usize) -> Bytes {
        (0..length).map(|i| (i % 251) as u8).collect::<Vec<_>>().into()
    }

    fn config(chunk_size: u32) -> StreamingConfig {
        StreamingConfig {
            chunk_size,
            ..StreamingConfig::default()
        }
    }

    fn store_piece(store: &MemoryPieceStore, data: &Bytes, index: u32, piece_length: usize) {
        let start = index as usize * piece_length;
        let end = (start + piece_length).min(data.len());
        store
            .store_piece(PieceIndex(index), data.slice(start..end))
            .unwrap();
    }

    async fn read_all(reader: StreamReader) -> Result<Vec<u8>, StreamingError> {
        let mut stream = pin!(reader.into_stream());
        let mut body = Vec::new();
        while let Some(chunk) = stream.next().await {
            body.extend_from_slice(&chunk?);
        }
        Ok(body)
    }

    #[tokio::test]
    async fn test_reads_range_in_chunks() {
        let (torrent, store, _) = create_torrent(100, &[("movie.mp4", 1000)]);
        let data = content(1000);
        store.store_all(&data).unwrap();

        let reader =
            StreamReader::open(torrent, 0, Some(ByteRange::new(0, 99)), &config(64)).unwrap();
        assert_eq!(reader.content_length(), 100);

        let chunks: Vec<_> = reader.into_stream().collect().await;
        let sizes: Vec<_> = chunks.iter().map(|c| c.as_ref().unwrap().len()).collect();
        assert_eq!(sizes, vec![64, 36]);

        let body: Vec<u8> = chunks.into_iter().flat_map(|c| c.unwrap()).collect();
        assert_eq!(body, data[..100]);
    }

    #[tokio::test]
    async fn test_reads_file_at_unaligned_offset() {
        let (torrent, store, _) = create_torrent(100, &[("a.mkv", 150), ("b.srt", 275)]);
        let data = content(425);
        store.store_all(&data).unwrap();

        let reader = StreamReader::open(torrent.clone(), 1, None, &config(1024)).unwrap();
        assert_eq!(read_all(reader).await.unwrap(), data[150..]);

        let reader =
            StreamReader::open(torrent, 1, Some(ByteRange::new(40, 60)), &config(8)).unwrap();
        assert_eq!(read_all(reader).await.unwrap(), data[190..=210]);
    }

    #[tokio::test]
    async fn test_suspends_until_piece_arrives() {
        let (torrent, store, swarm) = create_torrent(100, &[("movie.mp4", 1000)]);
        let data = content(1000);
        store_piece(&store, &data, 0, 100);

        let reader =
            StreamReader::open(torrent.clone(), 0, Some(ByteRange::new(50, 149)), &config(64))
                .unwrap();
        let handle = tokio::spawn(read_all(reader));

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!handle.is_finished());
        let wanted = swarm.last.lock().clone().unwrap();
        assert_eq!(wanted.interest_count(), 1);

        store_piece(&store, &data, 1, 100);
        let body = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(body, data[50..150]);
        assert_eq!(torrent.selection().snapshot().interest_count(), 0);
    }

    #[tokio::test]
    async fn test_blocked_stream_does_not_block_others() {
        let (torrent, store, _) = create_torrent(100, &[("a.mkv", 500), ("b.srt", 500)]);
        let data = content(1000);
        for index in 5..10 {
            store_piece(&store, &data, index, 100);
        }

        let blocked = StreamReader::open(torrent.clone(), 0, None, &config(64)).unwrap();
        let blocked = tokio::spawn(read_all(blocked));

        let ready = StreamReader::open(torrent, 1, None, &config(64)).unwrap();
        let body = tokio::time::timeout(Duration::from_secs(1), read_all(ready))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(body, data[500..]);
        assert!(!blocked.is_finished());
        blocked.abort();
    }

    #[tokio::test]
    async fn test_dropping_stream_releases_only_its_interest() {
        let (torrent, _, _) = create_torrent(100, &[("movie.mp4", 1000)]);
        torrent.selection().select(SelectionTarget::Single(0)).unwrap();

        let first = StreamReader::open(torrent.clone(), 0, None, &config(64)).unwrap();
        let second =
            StreamReader::open(torrent.clone(), 0, Some(ByteRange::new(500, 599)), &config(64))
                .unwrap();
        assert_eq!(torrent.selection().snapshot().interest_count(), 2);

        let stream = first.into_stream();
        drop(stream);
        let snapshot = torrent.selection().snapshot();
        assert_eq!(snapshot.interest_count(), 1);
        assert_eq!(snapshot.selection_count(), 1);

        drop(second);
        let snapshot = torrent.selection().snapshot();
        assert_eq!(snapshot.interest_count(), 0);
        assert!(torrent.summary().files[0].selected);
    }

    #[tokio::test]
    async fn test_close_ends_waiting_stream() {
        let (torrent, _, _) = create_torrent(100, &[("movie.mp4", 1000)]);
        let reader = StreamReader::open(torrent.clone(), 0, None, &config(64)).unwrap();
        let handle = tokio::spawn(read_all(reader));

        tokio::time::sleep(Duration::from_millis(20)).await;
        torrent.close();

        let result = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(
            result,
            Err(StreamingError::Upstream(TorrentError::Closed))
        ));
        assert!(matches!(
            StreamReader::open(torrent, 0, None, &config(64)),
            Err(StreamingError::Upstream(TorrentError::Closed))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_timeout_ends_stream() {
        let (torrent, _, _) = create_torrent(100, &[("movie.mp4", 1000)]);
        let config = StreamingConfig {
            chunk_size: 64,
            idle_timeout: Duration::from_secs(5),
        };
        let reader = StreamReader::open(torrent, 0, Some(ByteRange::new(0, 9)), &config).unwrap();

        let result = read_all(reader).await;
        assert!(matches!(
            result,
            Err(StreamingError::IdleTimeout { piece: PieceIndex(0), .. })
        ));
    }

    #[tokio::test]
    async fn test_open_rejects_bad_input() {
        let (torrent, _, _) = create_torrent(100, &[("movie.mp4", 1000)]);

        assert!(matches!(
            StreamReader::open(torrent.clone(), 3, None, &config(64)),
            Err(StreamingError::Upstream(TorrentError::FileIndexOutOfRange { .. }))
        ));
        assert!(matches!(
            StreamReader::open(torrent.clone(), 0, Some(ByteRange::new(900, 1000)), &config(64)),
            Err(StreamingError::RangeNotSatisfiable { length: 1000 })
        ));
        assert_eq!(torrent.selection().snapshot().interest_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_file_streams_nothing() {
        let (torrent, _, _) = create_torrent(100, &[("empty.txt", 0), ("movie.mp4", 100)]);
        let reader = StreamReader::open(torrent.clone(), 0, None, &config(64)).unwrap();
        assert_eq!(reader.range(), None);
        assert_eq!(torrent.selection().snapshot().interest_count(), 0);
        assert!(read_all(reader).await.unwrap().is_empty());
    }
}
