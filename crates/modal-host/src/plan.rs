#![forbid(unsafe_code)]

//! Layered render plan derived from a controller snapshot.
//!
//! The plan is what a rendering layer walks each frame:
//!
//! ```text
//! RenderPlan { active, aria_hidden }
//!   └─ LayerSlot (ascending layer)
//!        ├─ mounted: covered keep_mounted windows, oldest first
//!        └─ window:  focused window of the layer (rendered last)
//! ```
//!
//! # Dismissal
//!
//! A click on the overlay backdrop closes the slot's window if its params
//! allow it. Clicks on content never dismiss.

use std::rc::Rc;

use modal_core::{ExternalStore, ModalSnapshot, ModalWindow};

use crate::context::WindowContext;

/// Where a pointer interaction landed within a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayHit {
    /// The dimmed area around the content.
    Backdrop,
    /// The window's own content.
    Content,
}

/// One layer of the plan.
pub struct LayerSlot<V> {
    layer: i32,
    window: ModalWindow<V>,
    mounted: Vec<ModalWindow<V>>,
}

impl<V: 'static> LayerSlot<V> {
    #[inline]
    #[must_use]
    pub fn layer(&self) -> i32 {
        self.layer
    }

    /// Focused window of this layer.
    #[must_use]
    pub fn window(&self) -> &ModalWindow<V> {
        &self.window
    }

    /// Covered windows that asked to stay mounted, oldest first.
    #[must_use]
    pub fn mounted(&self) -> &[ModalWindow<V>] {
        &self.mounted
    }

    /// Accessibility label of the focused window.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.window.params().label
    }

    /// Render the focused window with it in [`WindowContext`].
    pub fn render(&self) -> V {
        WindowContext::scoped(&self.window, || self.window.render())
    }

    /// Render covered keep-mounted windows, then the focused one.
    pub fn render_all(&self) -> Vec<V> {
        self.mounted
            .iter()
            .chain(std::iter::once(&self.window))
            .map(|window| WindowContext::scoped(window, || window.render()))
            .collect()
    }

    /// Apply a pointer interaction. Returns whether the window was closed.
    pub fn dismiss(&self, hit: OverlayHit) -> bool {
        if hit != OverlayHit::Backdrop || self.window.is_closed() {
            return false;
        }
        if !self.window.params().closable {
            #[cfg(feature = "tracing")]
            tracing::trace!(id = %self.window.id(), "backdrop click ignored: not closable");
            return false;
        }
        #[cfg(feature = "tracing")]
        tracing::debug!(id = %self.window.id(), layer = self.layer, "dismissed from backdrop");
        self.window.close();
        true
    }
}

impl<V> std::fmt::Debug for LayerSlot<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayerSlot")
            .field("layer", &self.layer)
            .field("window", &self.window.id())
            .field("mounted", &self.mounted.len())
            .finish()
    }
}

/// Everything needed to draw the modal overlay for one snapshot.
pub struct RenderPlan<V> {
    active: bool,
    slots: Vec<LayerSlot<V>>,
}

impl<V: 'static> RenderPlan<V> {
    /// Build the plan for `snapshot`.
    #[must_use]
    pub fn from_snapshot(snapshot: &ModalSnapshot<V>) -> Self {
        let slots = snapshot
            .layers()
            .into_iter()
            .map(|(layer, focused)| {
                let mounted = snapshot
                    .windows()
                    .iter()
                    .take_while(|w| !w.ptr_eq(focused))
                    .filter(|w| w.layer() == layer && w.params().keep_mounted && !w.is_closed())
                    .cloned()
                    .collect();
                LayerSlot {
                    layer,
                    window: focused.clone(),
                    mounted,
                }
            })
            .collect();
        Self {
            active: snapshot.active(),
            slots,
        }
    }

    /// Build the plan from the store's current snapshot.
    #[must_use]
    pub fn from_store<S>(store: &S) -> Self
    where
        S: ExternalStore<Snapshot = ModalSnapshot<V>>,
    {
        Self::from_snapshot(&store.get_snapshot())
    }

    /// Whether the overlay should be shown.
    #[inline]
    #[must_use]
    pub fn active(&self) -> bool {
        self.active
    }

    /// Value for the overlay's `aria-hidden` attribute.
    #[inline]
    #[must_use]
    pub fn aria_hidden(&self) -> bool {
        !self.active
    }

    /// Slots in ascending layer order.
    #[must_use]
    pub fn slots(&self) -> &[LayerSlot<V>] {
        &self.slots
    }

    #[must_use]
    pub fn slot(&self, layer: i32) -> Option<&LayerSlot<V>> {
        self.slots.iter().find(|slot| slot.layer == layer)
    }

    /// Highest layer, which receives input first.
    #[must_use]
    pub fn topmost(&self) -> Option<&LayerSlot<V>> {
        self.slots.last()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Render every slot's focused window, bottom layer first.
    pub fn render(&self) -> Vec<(i32, V)> {
        self.slots
            .iter()
            .map(|slot| (slot.layer, slot.render()))
            .collect()
    }

    /// Route a pointer interaction to the topmost slot.
    pub fn dismiss_top(&self, hit: OverlayHit) -> bool {
        self.active && self.topmost().is_some_and(|slot| slot.dismiss(hit))
    }
}

impl<V> std::fmt::Debug for RenderPlan<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderPlan")
            .field("active", &self.active)
            .field("slots", &self.slots)
            .finish()
    }
}

/// Caches a [`RenderPlan`] and rebuilds it only when the store hands out a
/// different snapshot.
pub struct PlanCache<V> {
    snapshot: Option<Rc<ModalSnapshot<V>>>,
    plan: Option<RenderPlan<V>>,
    rebuilds: u64,
}

impl<V: 'static> Default for PlanCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: 'static> PlanCache<V> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            snapshot: None,
            plan: None,
            rebuilds: 0,
        }
    }

    /// Plan for the store's current snapshot.
    pub fn plan<S>(&mut self, store: &S) -> &RenderPlan<V>
    where
        S: ExternalStore<Snapshot = ModalSnapshot<V>>,
    {
        let snapshot = store.get_snapshot();
        let stale = self
            .snapshot
            .as_ref()
            .is_none_or(|cached| !Rc::ptr_eq(cached, &snapshot));
        if stale {
            self.rebuilds += 1;
            self.snapshot = Some(Rc::clone(&snapshot));
            self.plan = None;
        }
        self.plan
            .get_or_insert_with(|| RenderPlan::from_snapshot(&snapshot))
    }

    /// Number of times the plan was rebuilt.
    #[must_use]
    pub fn rebuilds(&self) -> u64 {
        self.rebuilds
    }
}

impl<V> std::fmt::Debug for PlanCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlanCache")
            .field("rebuilds", &self.rebuilds)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modal_core::{Component, ModalController, ParamsPatch};

    fn labelled() -> Component<String> {
        Component::new("Label", |p| p.label.clone())
    }

    #[test]
    fn empty_controller_yields_empty_hidden_plan() {
        let modal: ModalController<String> = ModalController::new();
        let plan = RenderPlan::from_store(&modal);
        assert!(plan.is_empty());
        assert!(plan.aria_hidden());
        assert!(plan.topmost().is_none());
        assert!(!plan.dismiss_top(OverlayHit::Backdrop));
    }

    #[test]
    fn one_slot_per_layer_ascending() {
        let modal = ModalController::new();
        let c = labelled();
        modal.open(&c, ParamsPatch::new().layer(2).label("high"));
        modal.open(&c, ParamsPatch::new().layer(0).label("low"));
        modal.open(&c, ParamsPatch::new().layer(2).label("high2"));

        let plan = RenderPlan::from_store(&modal);
        let rendered = plan.render();
        assert_eq!(rendered, vec![(0, "low".to_owned()), (2, "high2".to_owned())]);
        assert_eq!(plan.slot(2).map(LayerSlot::label), Some("high2"));
    }

    #[test]
    fn keep_mounted_windows_render_under_the_focused_one() {
        let modal = ModalController::new();
        let c = labelled();
        modal.open(&c, ParamsPatch::new().label("a").keep_mounted(true));
        modal.open(&c, ParamsPatch::new().label("b"));
        modal.open(&c, ParamsPatch::new().label("c"));

        let plan = RenderPlan::from_store(&modal);
        let slot = plan.slot(0).expect("layer 0");
        assert_eq!(slot.mounted().len(), 1);
        assert_eq!(slot.render_all(), vec!["a".to_owned(), "c".to_owned()]);
    }

    #[test]
    fn content_clicks_never_dismiss() {
        let modal = ModalController::new();
        let w = modal.open(&labelled(), ParamsPatch::new());
        let plan = RenderPlan::from_store(&modal);
        assert!(!plan.dismiss_top(OverlayHit::Content));
        assert!(!w.is_closed());
    }

    #[test]
    fn non_closable_ignores_backdrop() {
        let modal = ModalController::new();
        let w = modal.open(&labelled(), ParamsPatch::new().closable(false));
        let plan = RenderPlan::from_store(&modal);
        assert!(!plan.dismiss_top(OverlayHit::Backdrop));
        assert!(!w.is_closed());
    }

    #[test]
    fn backdrop_closes_closable_window() {
        let modal = ModalController::new();
        let w = modal.open(&labelled(), ParamsPatch::new());
        let plan = RenderPlan::from_store(&modal);
        assert!(plan.dismiss_top(OverlayHit::Backdrop));
        assert!(w.is_closed());
        assert!(!modal.is_active());
        assert!(!plan.slots()[0].dismiss(OverlayHit::Backdrop));
    }

    #[test]
    fn cache_rebuilds_only_on_new_snapshot() {
        let modal = ModalController::new();
        let c = labelled();
        let mut cache = PlanCache::new();

        assert!(cache.plan(&modal).is_empty());
        assert!(cache.plan(&modal).is_empty());
        assert_eq!(cache.rebuilds(), 1);

        modal.open(&c, ParamsPatch::new());
        assert_eq!(cache.plan(&modal).slots().len(), 1);
        modal.open(&c, ParamsPatch::new());
        let _ = cache.plan(&modal);
        assert_eq!(cache.rebuilds(), 2);
    }

    #[test]
    fn render_puts_window_in_context() {
        let modal = ModalController::new();
        let c = Component::new("Ctx", |_| {
            WindowContext::require::<bool>().is_ok_and(|w| w.params().label == "inside")
        });
        modal.open(&c, ParamsPatch::new().label("inside"));
        let plan = RenderPlan::from_store(&modal);
        assert_eq!(plan.render(), vec![(0, true)]);
        assert!(WindowContext::require::<bool>().is_err());
    }
}
