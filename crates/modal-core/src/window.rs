#![forbid(unsafe_code)]

//! A single modal request: component, effective params, and lifecycle.
//!
//! `ModalWindow` is a cheap handle; clones share state. Its lifecycle has
//! two observation paths that both fire exactly once:
//!
//! - **close listeners** ([`ModalWindow::on_close`]) run synchronously
//!   inside the first [`ModalWindow::close`] call, in registration order.
//!   The controller uses one to detach the window.
//! - **waiters** ([`ModalWindow::closed`], `.await`, [`ModalWindow::then`])
//!   are woken by that call and run on their executor afterwards.
//!
//! A window has no reference to the controller that opened it.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use crate::component::Component;
use crate::deferred::{Deferred, Wait};
use crate::params::{ModalParams, identity_hash};

/// Identity hash of a window: `(component, params)` fingerprint.
///
/// Not the same as `params.id`, which is a caller correlation key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowId(u64);

impl WindowId {
    /// Raw hash value.
    #[inline]
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

type CloseListener<V> = Box<dyn FnOnce(&ModalWindow<V>)>;

struct WindowInner<V> {
    id: WindowId,
    canonical: String,
    component: Component<V>,
    params: ModalParams,
    closed: Cell<bool>,
    listeners: RefCell<Vec<CloseListener<V>>>,
    lifecycle: Deferred<()>,
}

/// Handle to one modal window.
pub struct ModalWindow<V> {
    inner: Rc<WindowInner<V>>,
}

impl<V> Clone for ModalWindow<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<V> ModalWindow<V> {
    /// Build a window. Identity is computed here, once.
    pub(crate) fn new(component: Component<V>, params: ModalParams) -> Self {
        let canonical = params.canonical();
        let id = WindowId(identity_hash(component.key(), &canonical));
        Self {
            inner: Rc::new(WindowInner {
                id,
                canonical,
                component,
                params,
                closed: Cell::new(false),
                listeners: RefCell::new(Vec::new()),
                lifecycle: Deferred::new(),
            }),
        }
    }

    /// Identity hash.
    #[inline]
    #[must_use]
    pub fn id(&self) -> WindowId {
        self.inner.id
    }

    #[must_use]
    pub fn component(&self) -> &Component<V> {
        &self.inner.component
    }

    #[must_use]
    pub fn params(&self) -> &ModalParams {
        &self.inner.params
    }

    /// Stacking layer (shorthand for `params().layer`).
    #[inline]
    #[must_use]
    pub fn layer(&self) -> i32 {
        self.inner.params.layer
    }

    /// Whether [`close`](Self::close) has been called. Never reverts.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.get()
    }

    /// Render this window's component with its params.
    pub fn render(&self) -> V {
        self.inner.component.render(&self.inner.params)
    }

    /// Close the window. Only the first call has an effect.
    pub fn close(&self) {
        if self.inner.closed.replace(true) {
            return;
        }
        self.inner.lifecycle.resolve(());
        let listeners = std::mem::take(&mut *self.inner.listeners.borrow_mut());
        for listener in listeners {
            listener(self);
        }
    }

    /// Run `listener` once when the window closes.
    ///
    /// Runs immediately if the window is already closed.
    pub fn on_close(&self, listener: impl FnOnce(&ModalWindow<V>) + 'static) {
        if self.is_closed() {
            listener(self);
        } else {
            self.inner.listeners.borrow_mut().push(Box::new(listener));
        }
    }

    /// Future completing once the window is closed.
    #[must_use]
    pub fn closed(&self) -> Closed {
        Closed(self.inner.lifecycle.wait())
    }

    /// Run `on_closed` after the window closes.
    ///
    /// The continuation runs when the returned future is polled, never
    /// inside `close()`.
    pub fn then<U, F>(&self, on_closed: F) -> impl Future<Output = U> + use<V, U, F>
    where
        F: FnOnce() -> U,
    {
        let closed = self.closed();
        async move {
            closed.await;
            on_closed()
        }
    }

    /// Whether both handles refer to the same window instance.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Structural identity: same component and structurally equal params.
    #[must_use]
    pub fn same_identity(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
            && self.inner.component == other.inner.component
            && self.inner.canonical == other.inner.canonical
    }

    pub(crate) fn canonical(&self) -> &str {
        &self.inner.canonical
    }
}

impl<V> PartialEq for ModalWindow<V> {
    fn eq(&self, other: &Self) -> bool {
        self.same_identity(other)
    }
}

impl<V> fmt::Debug for ModalWindow<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModalWindow")
            .field("id", &self.inner.id)
            .field("component", &self.inner.component.name())
            .field("params", &self.inner.params)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl<V> IntoFuture for ModalWindow<V> {
    type Output = ();
    type IntoFuture = Closed;

    fn into_future(self) -> Closed {
        self.closed()
    }
}

impl<V> IntoFuture for &ModalWindow<V> {
    type Output = ();
    type IntoFuture = Closed;

    fn into_future(self) -> Closed {
        self.closed()
    }
}

/// Future returned by [`ModalWindow::closed`].
#[derive(Debug)]
#[must_use = "futures do nothing unless polled"]
pub struct Closed(Wait<(), std::convert::Infallible>);

impl Future for Closed {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        match Pin::new(&mut self.0).poll(cx) {
            Poll::Ready(Ok(())) => Poll::Ready(()),
            Poll::Ready(Err(never)) => match never {},
            Poll::Pending => Poll::Pending,
        }
    }
}
