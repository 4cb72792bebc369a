#![forbid(unsafe_code)]

//! Opaque renderable unit handed to the controller.
//!
//! The core never looks inside a component. It only needs a stable key for
//! identity hashing and reference equality: clones of one `Component` are
//! equal, two separately constructed components never are, even if they
//! wrap the same function.

use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::params::ModalParams;

/// Global counter for component keys.
static COMPONENT_KEY_COUNTER: AtomicU64 = AtomicU64::new(1);

/// A renderable unit producing `V` from a window's params.
pub struct Component<V> {
    key: u64,
    name: Rc<str>,
    render: Rc<dyn Fn(&ModalParams) -> V>,
}

impl<V> Component<V> {
    /// Wrap a render function under a diagnostic `name`.
    pub fn new(name: impl Into<Rc<str>>, render: impl Fn(&ModalParams) -> V + 'static) -> Self {
        Self {
            key: COMPONENT_KEY_COUNTER.fetch_add(1, Ordering::Relaxed),
            name: name.into(),
            render: Rc::new(render),
        }
    }

    /// Key shared by all clones of this component.
    #[inline]
    #[must_use]
    pub const fn key(&self) -> u64 {
        self.key
    }

    /// Diagnostic name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Render with the given params.
    pub fn render(&self, params: &ModalParams) -> V {
        (self.render)(params)
    }
}

impl<V> Clone for Component<V> {
    fn clone(&self) -> Self {
        Self {
            key: self.key,
            name: Rc::clone(&self.name),
            render: Rc::clone(&self.render),
        }
    }
}

impl<V> PartialEq for Component<V> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl<V> Eq for Component<V> {}

impl<V> fmt::Debug for Component<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("name", &self.name)
            .field("key", &self.key)
            .finish()
    }
}
