//! Selection management
//!
//! Tracks which piece ranges are wanted. File selections are keyed by file
//! index, so repeating `select`/`deselect` never piles up duplicates. Streams
//! add short-lived critical interests of their own, released by an RAII guard.
//!
//! The whole set lives in an immutable [`SelectionSnapshot`] that mutations
//! clone, edit and swap under a short write lock. Readers clone the `Arc` and
//! never observe a half-applied change.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use super::{PieceIndex, PieceSpan, Swarm, TorrentError};

/// Fetch priority attached to a selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Selected by the user, fetched in piece order
    Normal,
    /// Needed by an open stream, fetched ahead of everything else
    Critical,
}

/// Inclusive piece-index range marked as wanted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Selection {
    pub from: u32,
    pub to: u32,
    pub priority: Priority,
}

impl Selection {
    pub fn new(span: PieceSpan, priority: Priority) -> Self {
        Self {
            from: span.start,
            to: span.end,
            priority,
        }
    }

    pub fn span(&self) -> PieceSpan {
        PieceSpan::new(self.from, self.to)
    }

    /// Checks if this selection alone contains the whole span.
    pub fn covers(&self, span: PieceSpan) -> bool {
        self.from <= span.start && self.to >= span.end
    }
}

/// What a select/deselect call applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionTarget {
    /// One file by index
    Single(usize),
    /// Every file of the torrent
    All,
}

impl SelectionTarget {
    /// Normalises an optional index: absent or out-of-range means all files.
    pub fn from_index(index: Option<usize>, file_count: usize) -> Self {
        match index {
            Some(index) if index < file_count => SelectionTarget::Single(index),
            _ => SelectionTarget::All,
        }
    }

    /// Normalises a raw path segment. Anything that is not a valid file index,
    /// negative numbers and garbage included, means all files.
    pub fn parse(raw: Option<&str>, file_count: usize) -> Self {
        let index = raw.and_then(|raw| raw.trim().parse::<usize>().ok());
        Self::from_index(index, file_count)
    }
}

impl fmt::Display for SelectionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionTarget::Single(index) => write!(f, "file {index}"),
            SelectionTarget::All => write!(f, "all files"),
        }
    }
}

/// Immutable view of every active selection and the pause flag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionSnapshot {
    files: BTreeMap<usize, Selection>,
    interests: BTreeMap<Uuid, Selection>,
    paused: bool,
}

impl SelectionSnapshot {
    /// File selections in file order.
    pub fn selections(&self) -> impl Iterator<Item = &Selection> + '_ {
        self.files.values()
    }

    /// Stream interests, in no particular order.
    pub fn interests(&self) -> impl Iterator<Item = &Selection> + '_ {
        self.interests.values()
    }

    /// Indices of files with an active selection.
    pub fn selected_files(&self) -> impl Iterator<Item = usize> + '_ {
        self.files.keys().copied()
    }

    pub fn selection_count(&self) -> usize {
        self.files.len()
    }

    pub fn interest_count(&self) -> usize {
        self.interests.len()
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Selected-status rule for a file's piece span.
    ///
    /// True only if one single file selection contains the whole span. Partial
    /// overlap, or coverage by the union of several selections, is not enough.
    /// Stream interests are not considered.
    pub fn is_selected(&self, span: PieceSpan) -> bool {
        self.files.values().any(|selection| selection.covers(span))
    }

    /// Highest priority of any selection or interest covering the piece.
    pub fn priority_of(&self, index: PieceIndex) -> Option<Priority> {
        self.interests
            .values()
            .chain(self.files.values())
            .filter(|selection| selection.span().contains(index))
            .map(|selection| selection.priority)
            .max()
    }

    /// Every wanted range, critical interests first, each group by starting piece.
    pub fn wants(&self) -> Vec<Selection> {
        let mut interests: Vec<Selection> = self.interests.values().copied().collect();
        interests.sort_by_key(|selection| (selection.from, selection.to));
        interests.extend(self.files.values().copied());
        interests
    }
}

/// Owner of the selection set of one torrent.
pub struct SelectionManager {
    file_spans: Vec<PieceSpan>,
    current: RwLock<Arc<SelectionSnapshot>>,
    swarm: Arc<dyn Swarm>,
}

impl fmt::Debug for SelectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectionManager")
            .field("file_spans", &self.file_spans)
            .field("current", &self.current.read())
            .finish_non_exhaustive()
    }
}

impl SelectionManager {
    /// Creates a manager with nothing selected and fetching running.
    pub fn new(file_spans: Vec<PieceSpan>, swarm: Arc<dyn Swarm>) -> Self {
        Self {
            file_spans,
            current: RwLock::new(Arc::new(SelectionSnapshot::default())),
            swarm,
        }
    }

    /// Current selection state.
    pub fn snapshot(&self) -> Arc<SelectionSnapshot> {
        self.current.read().clone()
    }

    pub fn file_count(&self) -> usize {
        self.file_spans.len()
    }

    /// Marks the target's pieces as wanted.
    ///
    /// Returns `true` if the selection set changed. Selecting an already
    /// selected file is a no-op.
    ///
    /// # Errors
    ///
    /// - `TorrentError::FileIndexOutOfRange` - If a `Single` target names no file;
    ///   normalise raw input with [`SelectionTarget::parse`] first
    pub fn select(&self, target: SelectionTarget) -> Result<bool, TorrentError> {
        let indices = self.resolve(target)?;
        let changed = self.mutate(|snapshot| {
            let mut changed = false;
            for &index in &indices {
                if !snapshot.files.contains_key(&index) {
                    let selection = Selection::new(self.file_spans[index], Priority::Normal);
                    snapshot.files.insert(index, selection);
                    changed = true;
                }
            }
            changed
        });

        info!(%target, changed, "Select");
        Ok(changed)
    }

    /// Removes the target's file selections.
    ///
    /// Returns `true` if the selection set changed. Stream interests and other
    /// files' selections over shared pieces are left alone. Selections are not
    /// counted, so this drops a file selected any number of times before.
    ///
    /// # Errors
    ///
    /// - `TorrentError::FileIndexOutOfRange` - If a `Single` target names no file
    pub fn deselect(&self, target: SelectionTarget) -> Result<bool, TorrentError> {
        let indices = self.resolve(target)?;
        let changed = self.mutate(|snapshot| {
            let before = snapshot.files.len();
            for index in &indices {
                snapshot.files.remove(index);
            }
            snapshot.files.len() != before
        });

        info!(%target, changed, "Deselect");
        Ok(changed)
    }

    /// Suspends fetching without touching the selection set.
    ///
    /// Returns `true` if the torrent was running.
    pub fn pause(&self) -> bool {
        let changed = self.set_paused(true);
        info!(changed, "Pause");
        changed
    }

    /// Restarts fetching.
    ///
    /// Returns `true` if the torrent was paused.
    pub fn resume(&self) -> bool {
        let changed = self.set_paused(false);
        info!(changed, "Resume");
        changed
    }

    /// Registers a critical interest in `span` for the lifetime of the guard.
    pub fn register_interest(self: &Arc<Self>, span: PieceSpan) -> InterestGuard {
        let id = Uuid::new_v4();
        self.mutate(|snapshot| {
            snapshot
                .interests
                .insert(id, Selection::new(span, Priority::Critical));
            true
        });
        debug!(%id, from = span.start, to = span.end, "Stream interest registered");

        InterestGuard {
            id,
            manager: Arc::clone(self),
        }
    }

    fn release_interest(&self, id: Uuid) {
        let released = self.mutate(|snapshot| snapshot.interests.remove(&id).is_some());
        debug!(%id, released, "Stream interest released");
    }

    fn resolve(&self, target: SelectionTarget) -> Result<Vec<usize>, TorrentError> {
        match target {
            SelectionTarget::All => Ok((0..self.file_spans.len()).collect()),
            SelectionTarget::Single(index) if index < self.file_spans.len() => Ok(vec![index]),
            SelectionTarget::Single(index) => Err(TorrentError::FileIndexOutOfRange {
                index,
                file_count: self.file_spans.len(),
            }),
        }
    }

    /// Applies `edit` to a copy of the current snapshot and swaps it in.
    ///
    /// The swarm sees snapshots in the same order they are installed.
    fn mutate(&self, edit: impl FnOnce(&mut SelectionSnapshot) -> bool) -> bool {
        let mut current = self.current.write();
        let mut next = SelectionSnapshot::clone(&current);
        if !edit(&mut next) {
            return false;
        }

        let next = Arc::new(next);
        *current = Arc::clone(&next);
        self.swarm.update_wants(next);
        true
    }

    fn set_paused(&self, paused: bool) -> bool {
        let mut current = self.current.write();
        if current.paused == paused {
            return false;
        }

        let mut next = SelectionSnapshot::clone(&current);
        next.paused = paused;
        *current = Arc::new(next);

        if paused {
            self.swarm.pause();
        } else {
            self.swarm.resume();
        }
        true
    }
}

/// Keeps a stream's critical interest registered until dropped.
#[derive(Debug)]
pub struct InterestGuard {
    id: Uuid,
    manager: Arc<SelectionManager>,
}

impl Drop for InterestGuard {
    fn drop(&mut self) {
        self.manager.release_interest(self.id);
    }
}
