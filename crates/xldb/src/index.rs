use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{RwLock, RwLockReadGuard};

use crate::tree::{Tree, ROOT};

pub(crate) struct State {
    pub(crate) tree: Tree,
    /// Mirrors the set of package names that own the root as `Dir` (I6).
    pub(crate) pkgs: HashMap<String, String>,
}

/// Owns the tree, the package table, and the freshness tag, all mediated by
/// one reader-writer lock so a single read-lock acquisition sees a
/// consistent (tree, pkgs) pair. `last_modified` lives behind its own lock
/// and is only ever written after every mutation of `state` for a given
/// reload has completed and that write lock has been released — so a
/// reader that reads a tag and then traverses under one read-lock
/// acquisition always sees a tree consistent with that tag.
pub struct Index {
    pub(crate) state: RwLock<State>,
    pub(crate) last_modified: RwLock<Option<String>>,
    pub(crate) loading: AtomicI32,
}

impl Index {
    pub fn new() -> Self {
        Index {
            state: RwLock::new(State {
                tree: Tree::new(),
                pkgs: HashMap::new(),
            }),
            last_modified: RwLock::new(None),
            loading: AtomicI32::new(0),
        }
    }

    /// Acquires the read lock for the duration of the returned guard. Every
    /// query in [`crate::query`] is a method on [`ReadTxn`], so a caller
    /// can't accidentally query without holding the lock — the idiomatic
    /// translation of the original's explicit `read_lock()`/`read_unlock()`
    /// pair into an RAII guard (see DESIGN.md).
    pub fn read(&self) -> ReadTxn<'_> {
        ReadTxn {
            guard: self.state.read().unwrap(),
        }
    }

    /// The opaque snapshot tag published after the most recent successful
    /// reload, or `None` before the first load.
    pub fn last_modified(&self) -> Option<String> {
        self.last_modified.read().unwrap().clone()
    }

    pub(crate) fn begin_load(&self) -> LoadGuard<'_> {
        let already = self.loading.fetch_add(1, Ordering::SeqCst) > 0;
        LoadGuard {
            counter: &self.loading,
            already_loading: already,
        }
    }
}

impl Default for Index {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard for the overlap-suppression counter. Incremented on entry,
/// decremented on drop, regardless of whether this caller actually ran a
/// reload or bailed out early because one was already in flight.
pub(crate) struct LoadGuard<'a> {
    counter: &'a AtomicI32,
    already_loading: bool,
}

impl LoadGuard<'_> {
    pub(crate) fn already_loading(&self) -> bool {
        self.already_loading
    }
}

impl Drop for LoadGuard<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A read-locked view of the index. Every query method requires `&self`
/// here, so the read lock is held for as long as the caller holds the
/// `ReadTxn` — one lock acquisition per logical query, matching the
/// concurrency contract in spec.md §5.
pub struct ReadTxn<'a> {
    pub(crate) guard: RwLockReadGuard<'a, State>,
}

impl ReadTxn<'_> {
    pub fn root(&self) -> crate::tree::NodeId {
        ROOT
    }

    /// A snapshot of the current `name -> version` package table.
    pub fn pkgs(&self) -> HashMap<String, String> {
        self.guard.pkgs.clone()
    }
}
