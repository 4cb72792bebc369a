#![forbid(unsafe_code)]

//! Modal controller: the state machine that owns the window collection.
//!
//! # States
//!
//! ```text
//! (active=false, windows=∅) ──open──▶ (active=true, windows≠∅)
//!          ▲                               │  ▲
//!          └──────── close_all ────────────┘  │ show
//!                                          ▼  │
//!                          (active=false, windows≠∅)
//! ```
//!
//! The last state is reached by closing the last window (its data is kept
//! so an exit transition can still read it) or by [`ModalController::hide`].
//! The next `open` clears such stale windows before inserting.
//!
//! # Invariants
//!
//! 1. `active` is true iff at least one open window is meant to be visible.
//! 2. Within a layer the most recently inserted window is the focused one.
//! 3. Opening a window structurally identical to the focused window of its
//!    layer, while active, returns that window and changes nothing.
//! 4. Closing a window not in the collection does nothing and emits nothing.
//! 5. `show`/`hide` emit `Update` only when the flag actually changes.
//!
//! # Notification timing
//!
//! Every mutating call refreshes the snapshot and delivers its event to all
//! listeners synchronously, before returning. Continuations waiting on a
//! window (`.await`, [`ModalWindow::then`]) run later, when their executor
//! polls them.
//!
//! # Failure Modes
//!
//! - A panicking listener propagates out of the mutating call. State was
//!   already updated and no borrow is held, so the controller stays usable.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::component::Component;
use crate::config::ModalConfig;
use crate::emitter::{EventEmitter, Subscription};
use crate::params::{ModalParams, ParamId, ParamsPatch};
use crate::snapshot::{ExternalStore, ModalSnapshot, SnapshotCell};
use crate::window::ModalWindow;

/// Event channel names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModalEventKind {
    /// A window was inserted.
    Add,
    /// A window was closed, removed, or superseded.
    Remove,
    /// Visibility changed or the collection was cleared.
    Update,
}

impl ModalEventKind {
    /// Every channel, in declaration order.
    pub const ALL: [Self; 3] = [Self::Add, Self::Remove, Self::Update];
}

/// Payload delivered on the controller's channels.
pub enum ModalEvent<V> {
    Add(ModalWindow<V>),
    Remove(ModalWindow<V>),
    Update,
}

impl<V> ModalEvent<V> {
    /// The channel this event is delivered on.
    #[must_use]
    pub fn kind(&self) -> ModalEventKind {
        match self {
            Self::Add(_) => ModalEventKind::Add,
            Self::Remove(_) => ModalEventKind::Remove,
            Self::Update => ModalEventKind::Update,
        }
    }

    /// The window the event is about, if any.
    #[must_use]
    pub fn window(&self) -> Option<&ModalWindow<V>> {
        match self {
            Self::Add(w) | Self::Remove(w) => Some(w),
            Self::Update => None,
        }
    }
}

impl<V> Clone for ModalEvent<V> {
    fn clone(&self) -> Self {
        match self {
            Self::Add(w) => Self::Add(w.clone()),
            Self::Remove(w) => Self::Remove(w.clone()),
            Self::Update => Self::Update,
        }
    }
}

impl<V> fmt::Debug for ModalEvent<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Add(w) => f.debug_tuple("Add").field(&w.id()).finish(),
            Self::Remove(w) => f.debug_tuple("Remove").field(&w.id()).finish(),
            Self::Update => f.write_str("Update"),
        }
    }
}

struct State<V> {
    active: bool,
    /// Insertion order, oldest first.
    windows: Vec<ModalWindow<V>>,
    /// The sole remaining window was closed and is kept for its data.
    retained: bool,
}

impl<V> State<V> {
    fn focused(&self, layer: i32) -> Option<&ModalWindow<V>> {
        self.windows.iter().rev().find(|w| w.layer() == layer)
    }

    fn has_open_window(&self) -> bool {
        self.windows.iter().any(|w| !w.is_closed())
    }
}

struct ControllerInner<V> {
    config: ModalConfig,
    state: RefCell<State<V>>,
    events: Rc<EventEmitter<ModalEventKind, ModalEvent<V>>>,
    snapshot: SnapshotCell<V>,
}

impl<V> ControllerInner<V> {
    fn refresh_snapshot(&self) {
        let state = self.state.borrow();
        self.snapshot.refresh(state.active, &state.windows);
    }
}

/// Owns an ordered collection of modal windows and their visibility.
///
/// Cloning yields another handle to the same controller.
pub struct ModalController<V: 'static> {
    inner: Rc<ControllerInner<V>>,
}

impl<V: 'static> Clone for ModalController<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<V: 'static> Default for ModalController<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: 'static> fmt::Debug for ModalController<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.borrow();
        f.debug_struct("ModalController")
            .field("active", &state.active)
            .field("windows", &state.windows.len())
            .field("snapshot_version", &self.inner.snapshot.version())
            .finish()
    }
}

impl<V: 'static> ModalController<V> {
    /// Controller with built-in defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(ModalConfig::default())
    }

    /// Controller with the given configuration.
    #[must_use]
    pub fn with_config(config: ModalConfig) -> Self {
        let inner = Rc::new(ControllerInner {
            config,
            state: RefCell::new(State {
                active: false,
                windows: Vec::new(),
                retained: false,
            }),
            events: Rc::new(EventEmitter::new()),
            snapshot: SnapshotCell::new(),
        });

        // Registered first, so every other listener reads a fresh snapshot.
        let weak = Rc::downgrade(&inner);
        inner
            .events
            .subscribe(&ModalEventKind::ALL, move |_| {
                if let Some(inner) = weak.upgrade() {
                    inner.refresh_snapshot();
                }
            })
            .detach();

        Self { inner }
    }

    /// Construction options.
    #[must_use]
    pub fn config(&self) -> &ModalConfig {
        &self.inner.config
    }

    // --- Opening ---

    /// Open `component` with `patch` layered over the defaults.
    ///
    /// Returns the focused window of the target layer unchanged if it is
    /// structurally identical and the controller is active.
    pub fn open(&self, component: &Component<V>, patch: ParamsPatch) -> ModalWindow<V> {
        #[cfg(feature = "tracing")]
        let _span = tracing::debug_span!("modal_open", component = component.name()).entered();
        self.open_inner(component, &patch).0
    }

    /// Supersede the topmost window, then [`open`](Self::open).
    ///
    /// The superseded window is detached without being closed: its
    /// lifecycle signal stays pending until someone closes its handle.
    pub fn replace(&self, component: &Component<V>, patch: ParamsPatch) -> ModalWindow<V> {
        #[cfg(feature = "tracing")]
        let _span =
            tracing::debug_span!("modal_replace", component = component.name()).entered();
        let superseded = {
            let mut state = self.inner.state.borrow_mut();
            if state.active {
                state.windows.pop()
            } else {
                None
            }
        };
        #[cfg(feature = "tracing")]
        if let Some(old) = &superseded {
            tracing::trace!(id = %old.id(), "superseding topmost window");
        }

        let (window, inserted) = self.open_inner(component, &patch);
        if let Some(old) = superseded
            && !inserted
        {
            self.emit(ModalEvent::Remove(old));
        }
        window
    }

    fn open_inner(&self, component: &Component<V>, patch: &ParamsPatch) -> (ModalWindow<V>, bool) {
        let params = self.resolve_params(patch);
        let candidate = ModalWindow::new(component.clone(), params);

        let stale = {
            let mut state = self.inner.state.borrow_mut();
            if state.active
                && let Some(existing) = state.focused(candidate.layer())
                && !existing.is_closed()
                && existing.same_identity(&candidate)
            {
                #[cfg(feature = "tracing")]
                tracing::trace!(id = %existing.id(), "identical window already focused");
                return (existing.clone(), false);
            }

            let stale = if state.active {
                Vec::new()
            } else {
                std::mem::take(&mut state.windows)
            };
            state.windows.push(candidate.clone());
            state.active = true;
            state.retained = false;
            stale
        };

        #[cfg(feature = "tracing")]
        if !stale.is_empty() {
            tracing::trace!(count = stale.len(), "cleared stale windows");
        }
        // Already out of the collection, so their bound listeners are no-ops.
        for window in &stale {
            window.close();
        }

        self.bind(&candidate);
        #[cfg(feature = "tracing")]
        tracing::debug!(id = %candidate.id(), layer = candidate.layer(), "window opened");
        self.emit(ModalEvent::Add(candidate.clone()));
        (candidate, true)
    }

    fn resolve_params(&self, patch: &ParamsPatch) -> ModalParams {
        let defaults = &self.inner.config.default_params;
        let mut params = self.merge_params(Some(patch));

        if defaults.is_weak() || patch.is_weak() {
            #[cfg(feature = "tracing")]
            tracing::warn!("`weak` is deprecated and ignored; use distinct `id` values instead");
        }
        if defaults.is_fork() || patch.is_fork() {
            let state = self.inner.state.borrow();
            let highest = if state.active {
                state.windows.iter().map(ModalWindow::layer).max()
            } else {
                None
            };
            if let Some(highest) = highest {
                params.layer = highest.max(params.layer).saturating_add(1);
            }
            #[cfg(feature = "tracing")]
            tracing::trace!(layer = params.layer, "`fork` mapped to layer");
        }
        params
    }

    fn merge_params(&self, patch: Option<&ParamsPatch>) -> ModalParams {
        let mut params = ModalParams::default();
        params.apply(&self.inner.config.default_params);
        if let Some(patch) = patch {
            params.apply(patch);
        }
        params
    }

    fn bind(&self, window: &ModalWindow<V>) {
        let weak = Rc::downgrade(&self.inner);
        window.on_close(move |closed| {
            if let Some(inner) = weak.upgrade() {
                ModalController { inner }.detach(closed);
            }
        });
    }

    // --- Closing ---

    /// Close `window` and remove it from the collection.
    ///
    /// The last remaining window is kept (closed) with `active = false`
    /// until the next `open` or `close_all`.
    pub fn close(&self, window: &ModalWindow<V>) {
        window.close();
        self.detach(window);
    }

    fn detach(&self, window: &ModalWindow<V>) {
        let changed = {
            let mut state = self.inner.state.borrow_mut();
            let Some(index) = state.windows.iter().position(|w| w.ptr_eq(window)) else {
                return;
            };
            if state.windows.len() == 1 {
                if state.retained {
                    false
                } else {
                    state.retained = true;
                    state.active = false;
                    true
                }
            } else {
                state.windows.remove(index);
                true
            }
        };
        if changed {
            #[cfg(feature = "tracing")]
            tracing::debug!(id = %window.id(), "window closed");
            self.emit(ModalEvent::Remove(window.clone()));
        }
    }

    /// Close every window whose `params.id` equals `id`, topmost first.
    pub fn close_by_id(&self, id: impl Into<ParamId>) {
        let id = id.into();
        let targets = self.matching(|w| w.params().id == id);
        for window in targets.iter().rev() {
            self.close(window);
        }
    }

    /// Close every window opened with `component`, topmost first.
    ///
    /// With `patch`, only windows whose params equal `patch` merged over the
    /// defaults are closed.
    pub fn close_by_component(&self, component: &Component<V>, patch: Option<&ParamsPatch>) {
        let expected = patch.map(|p| self.merge_params(Some(p)).canonical());
        let targets = self.matching(|w| {
            w.component() == component
                && expected
                    .as_deref()
                    .is_none_or(|canonical| w.canonical() == canonical)
        });
        for window in targets.iter().rev() {
            self.close(window);
        }
    }

    /// Close every window (topmost first), then clear the collection.
    pub fn close_all(&self) {
        #[cfg(feature = "tracing")]
        let _span = tracing::debug_span!("modal_close_all").entered();
        let targets = self.windows();
        for window in targets.iter().rev() {
            window.close();
        }

        let changed = {
            let mut state = self.inner.state.borrow_mut();
            let before = state.windows.len();
            let was_active = state.active;
            state
                .windows
                .retain(|w| !targets.iter().any(|t| t.ptr_eq(w)));
            state.retained = false;
            state.active = state.has_open_window();
            before != state.windows.len() || was_active != state.active
        };
        if changed {
            self.emit(ModalEvent::Update);
        }
    }

    fn matching(&self, predicate: impl Fn(&ModalWindow<V>) -> bool) -> Vec<ModalWindow<V>> {
        self.inner
            .state
            .borrow()
            .windows
            .iter()
            .filter(|&w| predicate(w))
            .cloned()
            .collect()
    }

    // --- Visibility ---

    /// Reveal the retained windows. No-op if already active or if no open
    /// window remains.
    pub fn show(&self) {
        let changed = {
            let mut state = self.inner.state.borrow_mut();
            if state.active || !state.has_open_window() {
                false
            } else {
                state.active = true;
                true
            }
        };
        if changed {
            self.emit(ModalEvent::Update);
        }
    }

    /// Hide without touching the collection. No-op if already hidden.
    pub fn hide(&self) {
        let changed = std::mem::replace(&mut self.inner.state.borrow_mut().active, false);
        if changed {
            self.emit(ModalEvent::Update);
        }
    }

    // --- Observation ---

    /// Call `callback` after every change (any channel).
    pub fn subscribe(&self, callback: impl Fn() + 'static) -> Subscription {
        self.inner
            .events
            .subscribe(&ModalEventKind::ALL, move |_| callback())
    }

    /// Listen on a single channel with access to the event payload.
    pub fn on(
        &self,
        kind: ModalEventKind,
        listener: impl Fn(&ModalEvent<V>) + 'static,
    ) -> Subscription {
        self.inner.events.subscribe(&[kind], listener)
    }

    /// Call `callback` now with the current snapshot, then after every change.
    pub fn observe(&self, callback: impl Fn(&ModalSnapshot<V>) + 'static) -> Subscription {
        callback(&self.get_snapshot());
        let weak = Rc::downgrade(&self.inner);
        self.subscribe(move || {
            if let Some(inner) = weak.upgrade() {
                callback(&inner.snapshot.get());
            }
        })
    }

    /// Latest snapshot. Same `Rc` until the state changes.
    #[must_use]
    pub fn get_snapshot(&self) -> Rc<ModalSnapshot<V>> {
        self.inner.snapshot.get()
    }

    /// Number of times the snapshot changed.
    #[must_use]
    pub fn snapshot_version(&self) -> u64 {
        self.inner.snapshot.version()
    }

    fn emit(&self, event: ModalEvent<V>) {
        self.inner.events.emit(event.kind(), &event);
    }

    // --- State Queries ---

    /// Whether at least one window is meant to be visible.
    #[inline]
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.inner.state.borrow().active
    }

    /// Number of windows in the collection (including a retained one).
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.state.borrow().windows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.state.borrow().windows.is_empty()
    }

    /// Windows in insertion order.
    #[must_use]
    pub fn windows(&self) -> Vec<ModalWindow<V>> {
        self.inner.state.borrow().windows.clone()
    }

    /// Most recently inserted window.
    #[must_use]
    pub fn top(&self) -> Option<ModalWindow<V>> {
        self.inner.state.borrow().windows.last().cloned()
    }

    /// Whether this exact window handle is in the collection.
    #[must_use]
    pub fn contains(&self, window: &ModalWindow<V>) -> bool {
        self.inner
            .state
            .borrow()
            .windows
            .iter()
            .any(|w| w.ptr_eq(window))
    }
}

impl<V: 'static> ExternalStore for ModalController<V> {
    type Snapshot = ModalSnapshot<V>;

    fn subscribe_store(&self, invalidate: Box<dyn Fn()>) -> Subscription {
        self.subscribe(move || invalidate())
    }

    fn get_snapshot(&self) -> Rc<ModalSnapshot<V>> {
        ModalController::get_snapshot(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn stub() -> Component<()> {
        Component::new("Stub", |_| ())
    }

    #[test]
    fn empty_controller() {
        let modal: ModalController<()> = ModalController::new();
        assert!(!modal.is_active());
        assert!(modal.is_empty());
        assert!(modal.top().is_none());
        assert!(!modal.get_snapshot().active());
        assert_eq!(modal.snapshot_version(), 0);
    }

    #[test]
    fn open_activates_and_emits_add() {
        let modal = ModalController::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let _sub = {
            let log = Rc::clone(&log);
            modal.on(ModalEventKind::Add, move |e| log.borrow_mut().push(e.kind()))
        };

        let w = modal.open(&stub(), ParamsPatch::new());
        assert!(modal.is_active());
        assert!(modal.contains(&w));
        assert_eq!(*log.borrow(), vec![ModalEventKind::Add]);
    }

    #[test]
    fn close_on_empty_controller_is_noop() {
        let a: ModalController<()> = ModalController::new();
        let b: ModalController<()> = ModalController::new();
        let foreign = b.open(&stub(), ParamsPatch::new());

        let hits = Rc::new(Cell::new(0));
        let _sub = {
            let hits = Rc::clone(&hits);
            a.subscribe(move || hits.set(hits.get() + 1))
        };
        a.close(&foreign);
        a.close_by_id(3);
        a.close_all();
        a.hide();
        assert_eq!(hits.get(), 0);
        assert!(foreign.is_closed());
    }

    #[test]
    fn hide_and_show_toggle_without_duplicates() {
        let modal = ModalController::new();
        modal.open(&stub(), ParamsPatch::new());

        let updates = Rc::new(Cell::new(0));
        let _sub = {
            let updates = Rc::clone(&updates);
            modal.on(ModalEventKind::Update, move |_| updates.set(updates.get() + 1))
        };

        modal.hide();
        modal.hide();
        assert!(!modal.is_active());
        assert_eq!(modal.len(), 1);

        modal.show();
        modal.show();
        assert!(modal.is_active());
        assert_eq!(updates.get(), 2);
    }

    #[test]
    fn show_without_open_windows_is_noop() {
        let modal = ModalController::new();
        modal.show();
        assert!(!modal.is_active());

        let w = modal.open(&stub(), ParamsPatch::new());
        w.close();
        modal.show();
        assert!(!modal.is_active());
    }

    #[test]
    fn closing_retained_window_again_emits_nothing() {
        let modal = ModalController::new();
        let w = modal.open(&stub(), ParamsPatch::new());
        w.close();

        let hits = Rc::new(Cell::new(0));
        let _sub = {
            let hits = Rc::clone(&hits);
            modal.subscribe(move || hits.set(hits.get() + 1))
        };
        modal.close(&w);
        w.close();
        assert_eq!(hits.get(), 0);
        assert_eq!(modal.len(), 1);
    }

    #[test]
    fn listener_may_reenter_controller() {
        let modal = ModalController::new();
        let seen = Rc::new(Cell::new(0usize));
        let _sub = {
            let handle = modal.clone();
            let seen = Rc::clone(&seen);
            modal.on(ModalEventKind::Add, move |_| {
                seen.set(handle.len());
                handle.hide();
            })
        };

        modal.open(&stub(), ParamsPatch::new());
        assert_eq!(seen.get(), 1);
        assert!(!modal.is_active());
    }

    #[test]
    fn dropping_controller_leaves_window_handles_usable() {
        let modal = ModalController::new();
        let w = modal.open(&stub(), ParamsPatch::new());
        drop(modal);
        w.close();
        assert!(w.is_closed());
    }

    #[test]
    fn event_debug_names_channel() {
        let modal = ModalController::new();
        let w = modal.open(&stub(), ParamsPatch::new());
        let rendered = format!("{:?}", ModalEvent::Add(w));
        assert!(rendered.starts_with("Add("));
        assert_eq!(format!("{:?}", ModalEvent::<()>::Update), "Update");
    }
}
