//! Rate-limited piece delivery driven by the current wants.

use std::collections::BTreeSet;
use std::sync::Arc;

use bytes::Bytes;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rivulet_core::PieceStore;
use rivulet_core::config::SimulationConfig;
use rivulet_core::torrent::{
    Bitfield, MemoryPieceStore, PieceIndex, SelectionSnapshot, Swarm, TorrentError, TorrentLayout,
};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};

#[derive(Debug, Clone, Default)]
struct SwarmControl {
    wants: Arc<SelectionSnapshot>,
    paused: bool,
    shutdown: bool,
}

/// Swarm that "downloads" pieces from content it already holds.
///
/// A background task wakes every tick and stores up to `pieces_per_tick`
/// wanted pieces. Candidates are ordered critical interests first, then file
/// selections, each ascending; a seeded `ChaCha8Rng` picks among the first
/// `arrival_window` of them so pieces can land out of order.
#[derive(Debug)]
pub struct SimulatedSwarm {
    control: watch::Sender<SwarmControl>,
}

struct Delivery {
    store: Arc<MemoryPieceStore>,
    bitfield: Arc<Bitfield>,
    content: Bytes,
    piece_length: u32,
    pieces_per_tick: u32,
    arrival_window: u32,
    rng: ChaCha8Rng,
}

impl SimulatedSwarm {
    /// Starts the delivery task. Must be called within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// - `TorrentError::InvalidPieceData` - If `content` does not span the layout
    pub fn spawn(
        layout: &TorrentLayout,
        store: Arc<MemoryPieceStore>,
        content: Bytes,
        config: &SimulationConfig,
    ) -> Result<Arc<Self>, TorrentError> {
        if content.len() as u64 != layout.total_length() {
            return Err(TorrentError::InvalidPieceData {
                index: PieceIndex(0),
                expected: layout.piece_length(),
                actual: content.len(),
            });
        }

        let seed = config.seed.unwrap_or_else(rand::random);
        let (control, receiver) = watch::channel(SwarmControl::default());
        let delivery = Delivery {
            bitfield: store.bitfield(),
            store,
            content,
            piece_length: layout.piece_length(),
            pieces_per_tick: config.pieces_per_tick.max(1),
            arrival_window: config.arrival_window.max(1),
            rng: ChaCha8Rng::seed_from_u64(seed),
        };

        info!(
            seed,
            tick_ms = config.tick_interval.as_millis() as u64,
            pieces_per_tick = delivery.pieces_per_tick,
            "Simulated swarm started"
        );
        tokio::spawn(delivery.run(receiver, config.tick_interval));

        Ok(Arc::new(Self { control }))
    }

    fn send(&self, edit: impl FnOnce(&mut SwarmControl)) {
        self.control.send_modify(edit);
    }
}

impl Swarm for SimulatedSwarm {
    fn update_wants(&self, wants: Arc<SelectionSnapshot>) {
        self.send(|control| control.wants = wants);
    }

    fn pause(&self) {
        self.send(|control| control.paused = true);
    }

    fn resume(&self) {
        self.send(|control| control.paused = false);
    }

    fn shutdown(&self) {
        self.send(|control| control.shutdown = true);
    }
}

impl Delivery {
    async fn run(mut self, mut control: watch::Receiver<SwarmControl>, tick: std::time::Duration) {
        let mut ticker = tokio::time::interval(tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                changed = control.changed() => {
                    if changed.is_err() || control.borrow_and_update().shutdown {
                        break;
                    }
                    continue;
                }
            }

            let (wants, paused, shutdown) = {
                let state = control.borrow_and_update();
                (state.wants.clone(), state.paused, state.shutdown)
            };
            if shutdown {
                break;
            }
            if paused {
                trace!("Swarm paused, skipping round");
                continue;
            }
            self.deliver_round(&wants);
        }

        debug!("Simulated swarm stopped");
    }

    fn deliver_round(&mut self, wants: &SelectionSnapshot) {
        let mut candidates = self.candidates(wants);
        for _ in 0..self.pieces_per_tick {
            if candidates.is_empty() {
                break;
            }
            let window = candidates.len().min(self.arrival_window as usize);
            let piece = candidates.remove(self.rng.random_range(0..window));

            match self.store.store_piece(piece, self.piece_bytes(piece)) {
                Ok(_) => trace!(%piece, "Piece arrived"),
                Err(e) => warn!(%piece, error = %e, "Failed to store simulated piece"),
            }
        }
    }

    /// Missing wanted pieces, interests first.
    fn candidates(&self, wants: &SelectionSnapshot) -> Vec<PieceIndex> {
        let missing = |span: rivulet_core::PieceSpan| {
            span.indices()
                .map(PieceIndex)
                .filter(|&piece| !self.bitfield.has(piece))
        };

        let critical: BTreeSet<PieceIndex> =
            wants.interests().flat_map(|s| missing(s.span())).collect();
        let normal: BTreeSet<PieceIndex> = wants
            .selections()
            .flat_map(|s| missing(s.span()))
            .filter(|piece| !critical.contains(piece))
            .collect();

        critical.into_iter().chain(normal).collect()
    }

    fn piece_bytes(&self, piece: PieceIndex) -> Bytes {
        let start = piece.as_u32() as usize * self.piece_length as usize;
        let end = (start + self.piece_length as usize).min(self.content.len());
        self.content.slice(start..end)
    }
}
