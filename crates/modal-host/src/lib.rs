#![forbid(unsafe_code)]

//! Rendering-side helpers for [`modal_core`].
//!
//! - [`RenderPlan`]: per-frame layered view of a controller snapshot, with
//!   the backdrop dismissal policy.
//! - [`WindowContext`]: lets a component find the window it is rendered in.
//! - [`default_controller`]: optional per-thread default controller.
//!
//! # Example
//!
//! ```
//! use modal_core::{Component, ParamsPatch};
//! use modal_host::{OverlayHit, RenderPlan, WindowContext, default_controller};
//!
//! let greeting = Component::new("Greeting", |_| {
//!     let window = WindowContext::require::<String>().expect("rendered in a window");
//!     format!("hello from layer {}", window.layer())
//! });
//!
//! let modal = default_controller::<String>();
//! modal.open(&greeting, ParamsPatch::new().layer(1));
//!
//! let plan = RenderPlan::from_store(&modal);
//! assert_eq!(plan.render(), vec![(1, "hello from layer 1".to_owned())]);
//!
//! assert!(plan.dismiss_top(OverlayHit::Backdrop));
//! assert!(!modal.is_active());
//! ```

pub mod context;
pub mod error;
pub mod plan;
pub mod shared;

pub use context::{WindowContext, WindowScope};
pub use error::HostError;
pub use plan::{LayerSlot, OverlayHit, PlanCache, RenderPlan};
pub use shared::{default_controller, install_default_controller, reset_default_controller};
