//! Swarm control boundary
//!
//! The peer-to-peer side is external. The core only tells it which pieces are
//! wanted and whether fetching is paused; it never waits on it.

use std::sync::Arc;

use super::SelectionSnapshot;

/// Control surface of the network activity feeding one torrent.
///
/// Calls are made while the selection set is being swapped, so implementations
/// must return promptly and must not call back into the selection manager.
pub trait Swarm: Send + Sync {
    /// Replaces the set of wanted pieces and their priorities.
    fn update_wants(&self, wants: Arc<SelectionSnapshot>);

    /// Suspends fetching for the whole torrent.
    fn pause(&self);

    /// Restarts fetching after [`Swarm::pause`].
    fn resume(&self);

    /// Releases network resources when the torrent is removed.
    fn shutdown(&self) {}
}

/// Swarm that never fetches anything.
///
/// Useful when pieces are fed into the store by other means, such as a fully
/// seeded local torrent or a test driving arrivals by hand.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdleSwarm;

impl Swarm for IdleSwarm {
    fn update_wants(&self, _wants: Arc<SelectionSnapshot>) {}

    fn pause(&self) {}

    fn resume(&self) {}
}
