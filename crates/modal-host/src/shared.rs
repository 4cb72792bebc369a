#![forbid(unsafe_code)]

//! Optional per-thread default controller.
//!
//! Applications that want a single modal controller without threading one
//! through their code can use [`default_controller`]. There is one default
//! per view type `V` per thread; nothing in `modal-core` depends on it.

use std::any::{Any, TypeId};
use std::cell::RefCell;

use ahash::AHashMap;
use modal_core::ModalController;

thread_local! {
    static DEFAULT_CONTROLLERS: RefCell<AHashMap<TypeId, Box<dyn Any>>> =
        RefCell::new(AHashMap::new());
}

/// The thread's default controller for view type `V`, created on first use.
#[must_use]
pub fn default_controller<V: 'static>() -> ModalController<V> {
    DEFAULT_CONTROLLERS.with(|controllers| {
        let mut controllers = controllers.borrow_mut();
        let entry = controllers
            .entry(TypeId::of::<V>())
            .or_insert_with(|| Box::new(ModalController::<V>::new()) as Box<dyn Any>);
        if let Some(controller) = entry.downcast_ref::<ModalController<V>>() {
            return controller.clone();
        }
        let controller = ModalController::<V>::new();
        *entry = Box::new(controller.clone());
        controller
    })
}

/// Replace the thread's default controller for `V`. Returns the previous one.
pub fn install_default_controller<V: 'static>(
    controller: ModalController<V>,
) -> Option<ModalController<V>> {
    let previous = DEFAULT_CONTROLLERS.with(|controllers| {
        controllers
            .borrow_mut()
            .insert(TypeId::of::<V>(), Box::new(controller))
    });
    previous.and_then(|boxed| boxed.downcast::<ModalController<V>>().ok().map(|c| *c))
}

/// Drop the thread's default controller for `V`, if any.
pub fn reset_default_controller<V: 'static>() {
    let removed = DEFAULT_CONTROLLERS.with(|controllers| {
        controllers.borrow_mut().remove(&TypeId::of::<V>())
    });
    if removed.is_some() {
        #[cfg(feature = "tracing")]
        tracing::debug!(view = std::any::type_name::<V>(), "default controller reset");
    }
}
