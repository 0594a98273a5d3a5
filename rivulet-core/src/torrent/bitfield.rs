//! Monotonic per-piece presence vector with arrival notifications.
//!
//! Bits only ever flip from absent to present. Readers check bits through
//! atomics; waiters subscribe to a watch channel that is bumped on every
//! arrival and when the torrent is closed, so a suspended stream never polls.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::watch;

use super::{PieceIndex, TorrentError};

/// Published state of a bitfield.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BitfieldState {
    /// Number of pieces currently present
    pub present: u32,
    /// Set once the owning torrent is removed
    pub closed: bool,
}

/// Presence flags for every piece of a torrent.
#[derive(Debug)]
pub struct Bitfield {
    bits: Vec<AtomicBool>,
    state: watch::Sender<BitfieldState>,
}

impl Bitfield {
    /// Creates a bitfield with every piece absent.
    pub fn new(piece_count: u32) -> Self {
        let (state, _) = watch::channel(BitfieldState::default());
        Self {
            bits: (0..piece_count).map(|_| AtomicBool::new(false)).collect(),
            state,
        }
    }

    /// Number of pieces tracked.
    pub fn len(&self) -> u32 {
        self.bits.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// Checks if a piece is present. Out-of-range indices are never present.
    pub fn has(&self, index: PieceIndex) -> bool {
        self.bits
            .get(index.0 as usize)
            .is_some_and(|bit| bit.load(Ordering::Acquire))
    }

    /// Number of present pieces.
    pub fn present_count(&self) -> u32 {
        self.state.borrow().present
    }

    /// Copies the flags into a plain vector.
    pub fn snapshot(&self) -> Vec<bool> {
        self.bits.iter().map(|b| b.load(Ordering::Acquire)).collect()
    }

    /// Marks a piece present and wakes waiters.
    ///
    /// Returns `true` if the piece was newly marked.
    ///
    /// # Errors
    ///
    /// - `TorrentError::PieceOutOfRange` - If index exceeds piece count
    pub fn mark_present(&self, index: PieceIndex) -> Result<bool, TorrentError> {
        let bit = self
            .bits
            .get(index.0 as usize)
            .ok_or(TorrentError::PieceOutOfRange {
                index,
                piece_count: self.len(),
            })?;

        if bit.swap(true, Ordering::AcqRel) {
            return Ok(false);
        }

        self.state.send_modify(|state| state.present += 1);
        tracing::trace!(piece = index.0, "Piece marked present");
        Ok(true)
    }

    /// Marks the bitfield closed, waking every waiter with `TorrentError::Closed`.
    pub fn close(&self) {
        self.state.send_modify(|state| state.closed = true);
    }

    pub fn is_closed(&self) -> bool {
        self.state.borrow().closed
    }

    /// Subscribes to presence and close notifications.
    pub fn subscribe(&self) -> watch::Receiver<BitfieldState> {
        self.state.subscribe()
    }

    /// Suspends until the piece is present.
    ///
    /// Returns immediately if it already is. Holds no lock while suspended.
    ///
    /// # Errors
    ///
    /// - `TorrentError::PieceOutOfRange` - If index exceeds piece count
    /// - `TorrentError::Closed` - If the torrent is closed before the piece arrives
    pub async fn wait_for(&self, index: PieceIndex) -> Result<(), TorrentError> {
        if index.0 >= self.len() {
            return Err(TorrentError::PieceOutOfRange {
                index,
                piece_count: self.len(),
            });
        }

        let mut receiver = self.state.subscribe();
        receiver
            .wait_for(|state| state.closed || self.has(index))
            .await
            .map_err(|_| TorrentError::Closed)
            .map(|_| ())?;

        if self.has(index) {
            Ok(())
        } else {
            Err(TorrentError::Closed)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_mark_present_is_monotonic() {
        let bitfield = Bitfield::new(4);
        assert_eq!(bitfield.present_count(), 0);

        assert!(bitfield.mark_present(PieceIndex(2)).unwrap());
        assert!(!bitfield.mark_present(PieceIndex(2)).unwrap());
        assert!(bitfield.has(PieceIndex(2)));
        assert_eq!(bitfield.present_count(), 1);
        assert_eq!(bitfield.snapshot(), vec![false, false, true, false]);
    }

    #[test]
    fn test_mark_out_of_range() {
        let bitfield = Bitfield::new(2);
        assert!(matches!(
            bitfield.mark_present(PieceIndex(2)),
            Err(TorrentError::PieceOutOfRange { .. })
        ));
        assert!(!bitfield.has(PieceIndex(7)));
    }

    #[tokio::test]
    async fn test_wait_for_present_piece_returns_immediately() {
        let bitfield = Bitfield::new(1);
        bitfield.mark_present(PieceIndex(0)).unwrap();
        bitfield.wait_for(PieceIndex(0)).await.unwrap();
    }

    #[tokio::test]
    async fn test_wait_for_wakes_on_arrival() {
        let bitfield = Arc::new(Bitfield::new(3));
        let waiter = {
            let bitfield = bitfield.clone();
            tokio::spawn(async move { bitfield.wait_for(PieceIndex(1)).await })
        };

        tokio::task::yield_now().await;
        // An unrelated arrival must not release the waiter
        bitfield.mark_present(PieceIndex(0)).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        bitfield.mark_present(PieceIndex(1)).unwrap();
        let result = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }

    #[test]
    fn test_wait_for_sleeps_until_woken() {
        let bitfield = Bitfield::new(2);
        let mut wait = tokio_test::task::spawn(bitfield.wait_for(PieceIndex(1)));
        tokio_test::assert_pending!(wait.poll());

        bitfield.mark_present(PieceIndex(0)).unwrap();
        tokio_test::assert_pending!(wait.poll());

        bitfield.mark_present(PieceIndex(1)).unwrap();
        assert!(wait.is_woken());
        tokio_test::assert_ready_ok!(wait.poll());
    }

    #[tokio::test]
    async fn test_close_releases_waiters() {
        let bitfield = Arc::new(Bitfield::new(2));
        let waiter = {
            let bitfield = bitfield.clone();
            tokio::spawn(async move { bitfield.wait_for(PieceIndex(1)).await })
        };

        tokio::task::yield_now().await;
        bitfield.close();

        let result = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(result, Err(TorrentError::Closed)));
        assert!(bitfield.is_closed());
    }
}
