#![forbid(unsafe_code)]

//! Framework-agnostic modal window orchestration.
//!
//! A [`ModalController`] owns an ordered collection of [`ModalWindow`]s and a
//! visibility flag. Rendering layers observe it through events
//! ([`ModalController::subscribe`], [`ModalController::on`]) or through
//! immutable snapshots ([`ModalController::get_snapshot`]), and callers wait
//! for a window to close by awaiting its handle.
//!
//! # Identity and dedup
//!
//! A window's identity is its component plus its structurally compared
//! params (see [`params`] for the canonical form). Opening a window identical
//! to the focused window of its layer returns the existing handle.
//!
//! # Layers
//!
//! Windows are partitioned by [`ModalParams::layer`]. Each layer focuses its
//! most recently opened window independently of the others.
//!
//! # Example
//!
//! ```
//! use modal_core::{Component, ModalController, ParamsPatch};
//!
//! let confirm = Component::new("Confirm", |p| p.label.clone());
//! let modal = ModalController::new();
//!
//! let window = modal.open(&confirm, ParamsPatch::new().label("Delete file?"));
//! assert!(modal.is_active());
//! assert_eq!(window.render(), "Delete file?");
//!
//! window.close();
//! assert!(!modal.is_active());
//! ```

pub mod component;
pub mod config;
pub mod controller;
pub mod deferred;
pub mod emitter;
pub mod params;
pub mod snapshot;
pub mod window;

pub use component::Component;
pub use config::ModalConfig;
pub use controller::{ModalController, ModalEvent, ModalEventKind};
pub use deferred::{Deferred, Wait};
pub use emitter::{EventEmitter, ListenerId, Subscription};
pub use params::{
    Callback, DEFAULT_LABEL, ModalParams, ParamId, ParamsPatch, PropObject, PropValue, Props,
    identity_hash,
};
pub use snapshot::{ExternalStore, ModalSnapshot, SnapshotCell};
pub use window::{Closed, ModalWindow, WindowId};
