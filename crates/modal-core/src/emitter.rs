#![forbid(unsafe_code)]

//! Typed event emitter with named channels.
//!
//! Each channel (identified by a `K` value, usually a small `Copy` enum) owns
//! an ordered list of listeners. Listeners are stored as `Rc<dyn Fn(&E)>` so
//! taking a snapshot at emit time only bumps reference counts.
//!
//! Snapshot-on-emit semantics:
//!   - A listener removed *during* emission is still called in that round.
//!   - A listener added *during* emission is not called until the next emit.
//!
//! A panicking listener propagates to the caller of [`EventEmitter::emit`];
//! there is no isolation at this level. No `RefCell` borrow is held while
//! listeners run, so they may freely call `on`/`off`/`emit` on the same
//! emitter.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::hash::Hash;
use std::rc::{Rc, Weak};

use ahash::AHashMap;

/// Identifier returned by [`EventEmitter::on`], accepted by [`EventEmitter::off`].
pub type ListenerId = u64;

type Listener<E> = Rc<dyn Fn(&E)>;

/// Single-threaded typed event emitter.
pub struct EventEmitter<K, E> {
    channels: RefCell<AHashMap<K, Vec<(ListenerId, Listener<E>)>>>,
    next_id: Cell<ListenerId>,
}

impl<K, E> Default for EventEmitter<K, E>
where
    K: Copy + Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, E> fmt::Debug for EventEmitter<K, E>
where
    K: Copy + Eq + Hash + fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let channels = self.channels.borrow();
        let mut map = f.debug_map();
        for (kind, listeners) in channels.iter() {
            map.entry(kind, &listeners.len());
        }
        map.finish()
    }
}

impl<K, E> EventEmitter<K, E>
where
    K: Copy + Eq + Hash,
{
    /// Create an emitter with no listeners.
    #[must_use]
    pub fn new() -> Self {
        Self {
            channels: RefCell::new(AHashMap::new()),
            next_id: Cell::new(1),
        }
    }

    /// Register `listener` on `channel` and return its id.
    pub fn on(&self, channel: K, listener: impl Fn(&E) + 'static) -> ListenerId {
        self.on_shared(channel, Rc::new(listener))
    }

    fn on_shared(&self, channel: K, listener: Listener<E>) -> ListenerId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.channels
            .borrow_mut()
            .entry(channel)
            .or_default()
            .push((id, listener));
        id
    }

    /// Remove listener `id` from `channel`. Returns whether it was present.
    ///
    /// Safe to call any number of times.
    pub fn off(&self, channel: K, id: ListenerId) -> bool {
        let mut channels = self.channels.borrow_mut();
        let Some(listeners) = channels.get_mut(&channel) else {
            return false;
        };
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        let removed = listeners.len() != before;
        if listeners.is_empty() {
            channels.remove(&channel);
        }
        removed
    }

    /// Deliver `event` to every listener currently registered on `channel`,
    /// in registration order.
    pub fn emit(&self, channel: K, event: &E) {
        let snapshot: Vec<Listener<E>> = {
            let channels = self.channels.borrow();
            match channels.get(&channel) {
                Some(listeners) => listeners.iter().map(|(_, l)| Rc::clone(l)).collect(),
                None => return,
            }
        };
        for listener in snapshot {
            listener(event);
        }
    }

    /// Number of listeners on `channel`.
    #[must_use]
    pub fn listener_count(&self, channel: K) -> usize {
        self.channels.borrow().get(&channel).map_or(0, Vec::len)
    }

    /// Whether no channel has any listener.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.channels.borrow().values().all(Vec::is_empty)
    }
}

impl<K, E> EventEmitter<K, E>
where
    K: Copy + Eq + Hash + 'static,
    E: 'static,
{
    /// Register one listener on several channels and return a guard that
    /// removes it from all of them.
    pub fn subscribe(
        self: &Rc<Self>,
        channels: &[K],
        listener: impl Fn(&E) + 'static,
    ) -> Subscription {
        let listener: Listener<E> = Rc::new(listener);
        let ids: Vec<(K, ListenerId)> = channels
            .iter()
            .map(|&channel| (channel, self.on_shared(channel, Rc::clone(&listener))))
            .collect();
        let emitter: Weak<Self> = Rc::downgrade(self);
        Subscription::new(move || {
            if let Some(emitter) = emitter.upgrade() {
                for (channel, id) in ids {
                    emitter.off(channel, id);
                }
            }
        })
    }
}

/// Guard for a registered listener.
///
/// Dropping the guard unsubscribes. [`Subscription::unsubscribe`] does the
/// same eagerly and is idempotent. [`Subscription::detach`] keeps the
/// listener registered for the emitter's lifetime.
#[must_use = "dropping a Subscription unsubscribes its listener"]
pub struct Subscription {
    release: RefCell<Option<Box<dyn FnOnce()>>>,
}

impl Subscription {
    /// Wrap an unsubscribe action.
    pub fn new(release: impl FnOnce() + 'static) -> Self {
        Self {
            release: RefCell::new(Some(Box::new(release))),
        }
    }

    /// Remove the listener now. Later calls (and drop) do nothing.
    pub fn unsubscribe(&self) {
        let release = self.release.borrow_mut().take();
        if let Some(release) = release {
            release();
        }
    }

    /// Whether the listener is still registered through this guard.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.release.borrow().is_some()
    }

    /// Keep the listener registered and discard the guard.
    pub fn detach(self) {
        self.release.borrow_mut().take();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}
