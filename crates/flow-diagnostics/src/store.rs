//! Diagnostic store: the current index of one open document plus its
//! staleness.

use crate::diagnostic::{Diagnostic, DiagnosticIndex};
use camino::Utf8Path;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Edit counter. Bumped by every [`DiagnosticStore::mark_stale`].
pub type Epoch = u64;

/// Holds the latest diagnostic index for a document.
///
/// The index is never patched: a refresh swaps in a whole new
/// `Arc<DiagnosticIndex>`, so a reader sees either the old index or the new
/// one.
#[derive(Debug)]
pub struct DiagnosticStore {
    state: RwLock<StoreState>,
}

#[derive(Debug)]
struct StoreState {
    index: Arc<DiagnosticIndex>,
    stale: bool,
    epoch: Epoch,
    /// Cleared on edit so a dirty buffer shows no markers until the next
    /// applied cycle.
    visible: bool,
}

impl Default for DiagnosticStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DiagnosticStore {
    /// Creates an empty store. A new store is stale: it has never been
    /// checked.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(StoreState {
                index: Arc::new(DiagnosticIndex::new()),
                stale: true,
                epoch: 0,
                visible: true,
            }),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Diagnostics attributed to `path`, ordered by line.
    ///
    /// The index may hold diagnostics for other files (whole-project
    /// checks); those are never returned here.
    pub fn current_diagnostics_for(&self, path: &Utf8Path) -> Vec<(u32, Diagnostic)> {
        let index = {
            let state = self.read();
            if !state.visible {
                return Vec::new();
            }
            Arc::clone(&state.index)
        };
        index.for_path(path)
    }

    /// The whole current index, regardless of path or visibility.
    pub fn index(&self) -> Arc<DiagnosticIndex> {
        Arc::clone(&self.read().index)
    }

    pub fn is_stale(&self) -> bool {
        self.read().stale
    }

    /// Current edit epoch. Read it before starting a refresh and pass it to
    /// [`DiagnosticStore::apply`].
    pub fn epoch(&self) -> Epoch {
        self.read().epoch
    }

    /// Records that the document changed since the index was built.
    pub fn mark_stale(&self) {
        let mut state = self.write();
        state.stale = true;
        state.epoch = state.epoch.wrapping_add(1);
    }

    /// Hides the current diagnostics until the next index is applied.
    /// Staleness is left untouched.
    pub fn clear_visible(&self) {
        self.write().visible = false;
    }

    /// Swaps in `index` and clears staleness.
    pub fn replace(&self, index: DiagnosticIndex) {
        let mut state = self.write();
        state.index = Arc::new(index);
        state.stale = false;
        state.visible = true;
    }

    /// Swaps in `index`, built from a check that started at `started_at`.
    ///
    /// The index is always applied. Staleness is cleared, and hidden
    /// diagnostics shown again, only if no edit was recorded after
    /// `started_at`. Returns whether the store is now fresh.
    pub fn apply(&self, index: DiagnosticIndex, started_at: Epoch) -> bool {
        let mut state = self.write();
        let fresh = state.epoch == started_at;
        state.index = Arc::new(index);
        state.stale = !fresh;
        if fresh {
            state.visible = true;
        }
        fresh
    }
}
