//! A live torrent: layout, storage, presence and selections in one place.

use std::fmt;
use std::sync::Arc;

use tracing::info;

use super::{
    Bitfield, FileSummary, InfoHash, PieceIndex, PieceStore, SelectionManager, SelectionSnapshot,
    Swarm, TorrentError, TorrentFile, TorrentLayout, TorrentStats, TorrentSummary, progress,
};

/// One torrent shared by every request handler.
///
/// Handlers only read through it; selection changes go through
/// [`Torrent::selection`] and presence changes come from the store.
pub struct Torrent {
    info_hash: InfoHash,
    name: String,
    layout: TorrentLayout,
    store: Arc<dyn PieceStore>,
    bitfield: Arc<Bitfield>,
    selection: Arc<SelectionManager>,
    swarm: Arc<dyn Swarm>,
}

impl fmt::Debug for Torrent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Torrent")
            .field("info_hash", &self.info_hash)
            .field("name", &self.name)
            .field("layout", &self.layout)
            .finish_non_exhaustive()
    }
}

impl Torrent {
    /// Wires a layout to its piece store and swarm.
    ///
    /// # Errors
    ///
    /// - `TorrentError::InvalidLayout` - If the store's bitfield size differs from
    ///   the layout's piece count
    pub fn new(
        info_hash: InfoHash,
        name: impl Into<String>,
        layout: TorrentLayout,
        store: Arc<dyn PieceStore>,
        swarm: Arc<dyn Swarm>,
    ) -> Result<Self, TorrentError> {
        let bitfield = store.bitfield();
        if bitfield.len() != layout.piece_count() {
            return Err(TorrentError::InvalidLayout {
                reason: format!(
                    "store tracks {} pieces, layout has {}",
                    bitfield.len(),
                    layout.piece_count()
                ),
            });
        }

        let selection = Arc::new(SelectionManager::new(layout.file_spans(), swarm.clone()));
        let name = name.into();
        info!(%info_hash, %name, pieces = layout.piece_count(), files = layout.files().len(), "Torrent created");

        Ok(Self {
            info_hash,
            name,
            layout,
            store,
            bitfield,
            selection,
            swarm,
        })
    }

    pub fn info_hash(&self) -> InfoHash {
        self.info_hash
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn layout(&self) -> &TorrentLayout {
        &self.layout
    }

    pub fn files(&self) -> &[TorrentFile] {
        self.layout.files()
    }

    pub fn store(&self) -> &Arc<dyn PieceStore> {
        &self.store
    }

    pub fn bitfield(&self) -> &Arc<Bitfield> {
        &self.bitfield
    }

    pub fn selection(&self) -> &Arc<SelectionManager> {
        &self.selection
    }

    /// Share of present pieces over the whole torrent.
    pub fn progress(&self) -> f64 {
        progress(&self.bitfield)
    }

    /// JSON-ready description of the torrent and its files.
    pub fn summary(&self) -> TorrentSummary {
        let snapshot = self.selection.snapshot();
        let files = self
            .layout
            .files()
            .iter()
            .zip(self.layout.file_spans())
            .map(|(file, span)| FileSummary::new(self.info_hash, file, snapshot.is_selected(span)))
            .collect();

        TorrentSummary {
            info_hash: self.info_hash,
            name: self.name.clone(),
            length: self.layout.total_length(),
            piece_length: self.layout.piece_length(),
            ready: !self.is_closed(),
            interested: self.is_interested(&snapshot),
            paused: snapshot.is_paused(),
            files,
            progress: self.progress(),
        }
    }

    fn is_interested(&self, snapshot: &SelectionSnapshot) -> bool {
        !snapshot.is_paused()
            && snapshot
                .wants()
                .iter()
                .flat_map(|selection| selection.span().indices())
                .any(|piece| !self.bitfield.has(PieceIndex(piece)))
    }

    /// Piece and selection counters.
    pub fn stats(&self) -> TorrentStats {
        let snapshot = self.selection.snapshot();
        TorrentStats {
            pieces: self.bitfield.len(),
            pieces_present: self.bitfield.present_count(),
            progress: self.progress(),
            paused: snapshot.is_paused(),
            selections: snapshot.selection_count(),
            streams: snapshot.interest_count(),
        }
    }

    /// Releases storage and network resources.
    ///
    /// Suspended streams wake up and end with `TorrentError::Closed`.
    pub fn close(&self) {
        self.bitfield.close();
        self.swarm.shutdown();
        info!(info_hash = %self.info_hash, "Torrent closed");
    }

    pub fn is_closed(&self) -> bool {
        self.bitfield.is_closed()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::atomic::Ordering;

    use bytes::Bytes;

    use super::*;
    use crate::torrent::selection::tests::RecordingSwarm;
    use crate::torrent::{MemoryPieceStore, PieceIndex, SelectionTarget};

    /// Builds a torrent over a memory store with a recording swarm.
    pub(crate) fn create_torrent(
        piece_length: u32,
        files: &[(&str, u64)],
    ) -> (Arc<Torrent>, Arc<MemoryPieceStore>, Arc<RecordingSwarm>) {
        let layout = TorrentLayout::from_lengths(piece_length, files.iter().copied()).unwrap();
        let store = Arc::new(MemoryPieceStore::for_layout(&layout));
        let swarm = Arc::new(RecordingSwarm::default());
        let torrent = Torrent::new(
            InfoHash::new([7u8; 20]),
            "fixture",
            layout,
            store.clone(),
            swarm.clone(),
        )
        .unwrap();
        (Arc::new(torrent), store, swarm)
    }

    #[test]
    fn test_rejects_mismatched_store() {
        let layout = TorrentLayout::from_lengths(10, [("a", 100)]).unwrap();
        let other = TorrentLayout::from_lengths(10, [("a", 50)]).unwrap();
        let store = Arc::new(MemoryPieceStore::for_layout(&other));
        let result = Torrent::new(
            InfoHash::new([0u8; 20]),
            "bad",
            layout,
            store,
            Arc::new(crate::torrent::IdleSwarm),
        );
        assert!(matches!(result, Err(TorrentError::InvalidLayout { .. })));
    }

    #[test]
    fn test_summary_reports_selection_and_progress() {
        let (torrent, store, _) = create_torrent(100, &[("dir/a.mkv", 250), ("dir/b c.srt", 150)]);
        torrent.selection().select(SelectionTarget::Single(1)).unwrap();
        store.store_piece(PieceIndex(0), Bytes::from(vec![0u8; 100])).unwrap();

        let summary = torrent.summary();
        assert_eq!(summary.length, 400);
        assert_eq!(summary.progress, 0.25);
        assert!(!summary.files[0].selected);
        assert!(summary.files[1].selected);
        assert_eq!(
            summary.files[1].link,
            format!("/torrents/{}/files/dir%2Fb%20c.srt", "07".repeat(20))
        );
    }

    #[test]
    fn test_summary_ready_and_interested() {
        let (torrent, store, _) = create_torrent(100, &[("a", 150), ("b", 50)]);
        let summary = torrent.summary();
        assert!(summary.ready);
        assert!(!summary.interested);

        torrent.selection().select(SelectionTarget::Single(1)).unwrap();
        assert!(torrent.summary().interested);

        torrent.selection().pause();
        assert!(!torrent.summary().interested);
        torrent.selection().resume();

        store.store_piece(PieceIndex(1), Bytes::from(vec![0u8; 100])).unwrap();
        assert!(!torrent.summary().interested);

        torrent.close();
        assert!(!torrent.summary().ready);
    }

    #[test]
    fn test_stats_and_close() {
        let (torrent, store, swarm) = create_torrent(100, &[("a", 300)]);
        store.store_piece(PieceIndex(2), Bytes::from(vec![1u8; 100])).unwrap();
        torrent.selection().select(SelectionTarget::All).unwrap();
        torrent.selection().pause();

        let stats = torrent.stats();
        assert_eq!(stats.pieces, 3);
        assert_eq!(stats.pieces_present, 1);
        assert_eq!(stats.selections, 1);
        assert!(stats.paused);

        torrent.close();
        assert!(torrent.is_closed());
        assert_eq!(swarm.shutdowns.load(Ordering::SeqCst), 1);
    }
}
