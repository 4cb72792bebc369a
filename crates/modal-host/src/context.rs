#![forbid(unsafe_code)]

//! Window context: which modal window is currently being rendered.
//!
//! A render pass enters a scope for each window it renders
//! ([`WindowContext::enter`]); code running inside the component reads the
//! window back with [`WindowContext::require`]. Scopes nest and are
//! thread-local. Dropping the guard restores the enclosing scope.

use std::any::Any;
use std::cell::RefCell;
use std::marker::PhantomData;

use modal_core::ModalWindow;

use crate::error::HostError;

thread_local! {
    static WINDOW_SCOPES: RefCell<Vec<Box<dyn Any>>> = RefCell::new(Vec::new());
}

/// Accessor for the window currently in scope.
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowContext;

impl WindowContext {
    /// Make `window` the current window until the guard is dropped.
    #[must_use = "dropping this guard leaves the window scope"]
    pub fn enter<V: 'static>(window: &ModalWindow<V>) -> WindowScope {
        let depth = WINDOW_SCOPES.with(|scopes| {
            let mut scopes = scopes.borrow_mut();
            scopes.push(Box::new(window.clone()));
            scopes.len()
        });
        WindowScope {
            depth,
            _not_send: PhantomData,
        }
    }

    /// Run `f` with `window` in scope.
    pub fn scoped<V: 'static, R>(window: &ModalWindow<V>, f: impl FnOnce() -> R) -> R {
        let _scope = Self::enter(window);
        f()
    }

    /// Innermost window of view type `V`, if any.
    #[must_use]
    pub fn current<V: 'static>() -> Option<ModalWindow<V>> {
        WINDOW_SCOPES.with(|scopes| {
            scopes
                .borrow()
                .iter()
                .rev()
                .find_map(|entry| entry.downcast_ref::<ModalWindow<V>>().cloned())
        })
    }

    /// Innermost window of view type `V`.
    ///
    /// # Errors
    ///
    /// [`HostError::NoActiveWindow`] when called outside any window scope.
    pub fn require<V: 'static>() -> Result<ModalWindow<V>, HostError> {
        Self::current().ok_or(HostError::NoActiveWindow)
    }

    /// Like [`require`](Self::require), but also rejects a closed window.
    ///
    /// # Errors
    ///
    /// [`HostError::NoActiveWindow`] outside any scope,
    /// [`HostError::WindowClosed`] if the window in scope is closed.
    pub fn require_open<V: 'static>() -> Result<ModalWindow<V>, HostError> {
        let window = Self::require::<V>()?;
        if window.is_closed() {
            return Err(HostError::WindowClosed);
        }
        Ok(window)
    }

    /// Close the window in scope.
    ///
    /// # Errors
    ///
    /// [`HostError::NoActiveWindow`] when called outside any window scope.
    pub fn close_current<V: 'static>() -> Result<(), HostError> {
        Self::require::<V>()?.close();
        Ok(())
    }

    /// Number of nested scopes on this thread.
    #[must_use]
    pub fn depth() -> usize {
        WINDOW_SCOPES.with(|scopes| scopes.borrow().len())
    }
}

/// RAII guard returned by [`WindowContext::enter`].
#[must_use = "dropping this guard leaves the window scope"]
pub struct WindowScope {
    /// Stack depth right after this guard's push.
    depth: usize,
    _not_send: PhantomData<*const ()>,
}

impl Drop for WindowScope {
    fn drop(&mut self) {
        let popped = WINDOW_SCOPES.try_with(|scopes| {
            let mut scopes = scopes.borrow_mut();
            debug_assert_eq!(
                scopes.len(),
                self.depth,
                "window scopes dropped out of order"
            );
            scopes.pop()
        });
        // Drop the window handle after the borrow is released.
        drop(popped);
    }
}

impl std::fmt::Debug for WindowScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WindowScope")
            .field("depth", &self.depth)
            .finish()
    }
}
