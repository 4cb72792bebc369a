#![forbid(unsafe_code)]

//! Immutable controller snapshots for pull-based consumers.
//!
//! Some rendering layers read state through a `subscribe` + `get_snapshot`
//! pair and skip work when two reads return the same reference. This module
//! provides the snapshot type, the cache that keeps its reference stable,
//! and the [`ExternalStore`] contract.
//!
//! # Invariants
//!
//! 1. A snapshot never changes after construction.
//! 2. [`SnapshotCell::refresh`] swaps in a new `Rc` only if the active flag,
//!    the ordered list of window handles, or a window's closed flag differs
//!    from the cached one.
//! 3. Reads never recompute; only `refresh` does.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::emitter::Subscription;
use crate::window::ModalWindow;

/// Read-only view of controller state at one point in time.
pub struct ModalSnapshot<V> {
    active: bool,
    windows: Vec<ModalWindow<V>>,
    /// `is_closed` of each window when the snapshot was taken.
    closed: Vec<bool>,
}

impl<V> ModalSnapshot<V> {
    pub(crate) fn new(active: bool, windows: Vec<ModalWindow<V>>) -> Self {
        let closed = windows.iter().map(ModalWindow::is_closed).collect();
        Self {
            active,
            windows,
            closed,
        }
    }

    /// An inactive snapshot with no windows.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(false, Vec::new())
    }

    /// Whether at least one window is meant to be visible.
    #[inline]
    #[must_use]
    pub fn active(&self) -> bool {
        self.active
    }

    /// Windows in insertion order (oldest first).
    #[must_use]
    pub fn windows(&self) -> &[ModalWindow<V>] {
        &self.windows
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// Most recently inserted window, if any.
    #[must_use]
    pub fn top(&self) -> Option<&ModalWindow<V>> {
        self.windows.last()
    }

    /// Focused window of each layer, in ascending layer order.
    #[must_use]
    pub fn layers(&self) -> Vec<(i32, &ModalWindow<V>)> {
        let mut focused: BTreeMap<i32, &ModalWindow<V>> = BTreeMap::new();
        for window in &self.windows {
            focused.insert(window.layer(), window);
        }
        focused.into_iter().collect()
    }

    /// Focused (most recent) window of `layer`.
    #[must_use]
    pub fn focused(&self, layer: i32) -> Option<&ModalWindow<V>> {
        self.windows.iter().rev().find(|w| w.layer() == layer)
    }

    /// Whether `window` is the focused window of its layer.
    #[must_use]
    pub fn is_focused(&self, window: &ModalWindow<V>) -> bool {
        self.focused(window.layer())
            .is_some_and(|focused| focused.ptr_eq(window))
    }

    fn matches(&self, active: bool, windows: &[ModalWindow<V>]) -> bool {
        self.active == active
            && self.windows.len() == windows.len()
            && self
                .windows
                .iter()
                .zip(&self.closed)
                .zip(windows)
                .all(|((a, &was_closed), b)| a.ptr_eq(b) && was_closed == b.is_closed())
    }
}

impl<V> fmt::Debug for ModalSnapshot<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModalSnapshot")
            .field("active", &self.active)
            .field("windows", &self.windows)
            .finish()
    }
}

/// Cache holding the latest snapshot.
pub struct SnapshotCell<V> {
    current: RefCell<Rc<ModalSnapshot<V>>>,
    version: Cell<u64>,
}

impl<V> Default for SnapshotCell<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> SnapshotCell<V> {
    /// Start with the empty snapshot at version 0.
    #[must_use]
    pub fn new() -> Self {
        Self {
            current: RefCell::new(Rc::new(ModalSnapshot::empty())),
            version: Cell::new(0),
        }
    }

    /// The cached snapshot.
    #[must_use]
    pub fn get(&self) -> Rc<ModalSnapshot<V>> {
        Rc::clone(&self.current.borrow())
    }

    /// Number of times the snapshot reference changed.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version.get()
    }

    /// Replace the snapshot if the state differs. Returns whether it did.
    pub fn refresh(&self, active: bool, windows: &[ModalWindow<V>]) -> bool {
        if self.current.borrow().matches(active, windows) {
            return false;
        }
        *self.current.borrow_mut() = Rc::new(ModalSnapshot::new(active, windows.to_vec()));
        self.version.set(self.version.get() + 1);
        true
    }
}

impl<V> fmt::Debug for SnapshotCell<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnapshotCell")
            .field("version", &self.version.get())
            .finish()
    }
}

/// Pull-based store contract: invalidation callbacks plus a cached read.
pub trait ExternalStore {
    type Snapshot;

    /// Call `invalidate` after every state change until the guard is dropped.
    fn subscribe_store(&self, invalidate: Box<dyn Fn()>) -> Subscription;

    /// Latest snapshot; the same `Rc` until the state changes.
    fn get_snapshot(&self) -> Rc<Self::Snapshot>;
}
