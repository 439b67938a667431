//! Canvas activation state machine
//!
//! Creating and destroying a GPU context per navigation flickers and is
//! expensive, so the canvas is allocated at most once per session and merely
//! hidden when no page needs it. Three phases:
//!
//! ```text
//! Dormant --[PageMounted]--> Active
//! Active  --[PageUnmounted]--> Inactive
//! Inactive --[PageMounted]--> Active
//! ```
//!
//! The dormant → activated edge is one-shot: it allocates the tunnel pair
//! and is never walked back. `Active` toggles per page view and gates the
//! render loop and pointer events. All mutation goes through
//! [`ActivationStore::transition`] so the monotonicity invariant stays
//! checkable in one place.

use crate::tunnel::{BridgedContext, Payload, Tunnel, TunnelEntry, TunnelPair};
use std::sync::Arc;
use veil_core::store::{global_store, Store, Unsubscriber};

/// Phase of the canvas activation machine
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ActivationPhase {
    /// No page has needed the canvas this session
    #[default]
    Dormant,
    /// The canvas exists but the current page does not use it
    Inactive,
    /// The canvas exists and the current page is rendering through it
    Active,
}

/// Events driving the activation machine
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActivationEvent {
    /// A page that needs the GPU canvas mounted
    PageMounted,
    /// The page that needed the GPU canvas unmounted
    PageUnmounted,
}

/// Process-wide activation state
///
/// Lives in a global store with no teardown; it resets only on a full
/// reload of the process.
#[derive(Clone, Default)]
pub struct ActivationState {
    phase: ActivationPhase,
    tunnels: Option<TunnelPair>,
}

impl ActivationState {
    /// A GPU page was visited at least once this session (sticky)
    pub fn is_activated(&self) -> bool {
        self.phase != ActivationPhase::Dormant
    }

    /// The current page is rendering through the canvas
    pub fn is_active(&self) -> bool {
        self.phase == ActivationPhase::Active
    }

    pub fn phase(&self) -> ActivationPhase {
        self.phase
    }
}

/// Handle to the activation state machine
#[derive(Clone)]
pub struct ActivationStore {
    store: Arc<Store<ActivationState>>,
}

impl ActivationStore {
    /// The process-wide activation singleton
    pub fn global() -> Self {
        Self {
            store: global_store::<ActivationState>("veil-activation"),
        }
    }

    /// An isolated instance, independent of the global singleton
    ///
    /// Hosts embedding more than one canvas, and tests, use this.
    pub fn isolated() -> Self {
        Self {
            store: Arc::new(Store::new(ActivationState::default())),
        }
    }

    /// Apply an activation event
    ///
    /// The only mutation path. The first `PageMounted` allocates the tunnel
    /// pair; later transitions reuse it. Toggling active never reallocates
    /// tunnels or the GPU context.
    pub fn transition(&self, event: ActivationEvent) {
        self.store.update(|state| match event {
            ActivationEvent::PageMounted => {
                if state.tunnels.is_none() {
                    tracing::debug!("canvas activated; allocating tunnel pair");
                    state.tunnels = Some(TunnelPair::new());
                }
                state.phase = ActivationPhase::Active;
            }
            ActivationEvent::PageUnmounted => {
                if state.phase == ActivationPhase::Active {
                    state.phase = ActivationPhase::Inactive;
                }
            }
        });
    }

    pub fn snapshot(&self) -> ActivationState {
        self.store.get()
    }

    pub fn is_activated(&self) -> bool {
        self.store.get().is_activated()
    }

    pub fn is_active(&self) -> bool {
        self.store.get().is_active()
    }

    /// The tunnel pair, if the canvas has been activated
    pub fn tunnels(&self) -> Option<TunnelPair> {
        self.store.get().tunnels
    }

    /// Subscribe to activation changes
    pub fn subscribe<F>(&self, callback: F) -> Unsubscriber
    where
        F: Fn(&ActivationState) + Send + Sync + 'static,
    {
        self.store.subscribe(callback)
    }
}

/// Injection facade over the activation-owned tunnels
///
/// Pages declare GPU content through this bridge without caring whether the
/// canvas has been activated yet: before activation every operation is a
/// no-op that renders nothing, never an error.
#[derive(Clone)]
pub struct TunnelBridge {
    activation: ActivationStore,
}

impl TunnelBridge {
    pub fn new(activation: ActivationStore) -> Self {
        Self { activation }
    }

    /// Inject host-declared content into the GPU scene tree
    pub fn inject_scene(&self, slot: impl Into<String>, content: Payload, context: BridgedContext) {
        if let Some(tunnels) = self.activation.tunnels() {
            tunnels.to_scene.inject(slot, content, context);
        }
    }

    /// Inject GPU-tree content into the overlay layer above the canvas
    pub fn inject_overlay(
        &self,
        slot: impl Into<String>,
        content: Payload,
        context: BridgedContext,
    ) {
        if let Some(tunnels) = self.activation.tunnels() {
            tunnels.to_overlay.inject(slot, content, context);
        }
    }

    /// Re-key both tunnels for a route change
    pub fn route_changed(&self, route: &str) {
        if let Some(tunnels) = self.activation.tunnels() {
            tunnels.set_route(route);
        }
    }

    /// Entries currently injected into the scene tree
    pub fn scene_contents(&self) -> Vec<TunnelEntry<Payload>> {
        self.activation
            .tunnels()
            .map(|t| t.to_scene.contents())
            .unwrap_or_default()
    }

    /// Entries currently injected into the overlay
    pub fn overlay_contents(&self) -> Vec<TunnelEntry<Payload>> {
        self.activation
            .tunnels()
            .map(|t| t.to_overlay.contents())
            .unwrap_or_default()
    }

    /// The scene-side tunnel, if activated
    pub fn scene_tunnel(&self) -> Option<Tunnel<Payload>> {
        self.activation.tunnels().map(|t| t.to_scene)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ActivationEvent::{PageMounted, PageUnmounted};

    #[test]
    fn starts_dormant() {
        let store = ActivationStore::isolated();
        assert!(!store.is_activated());
        assert!(!store.is_active());
        assert!(store.tunnels().is_none());
    }

    #[test]
    fn first_mount_activates_and_allocates_tunnels() {
        let store = ActivationStore::isolated();
        store.transition(PageMounted);

        assert!(store.is_activated());
        assert!(store.is_active());
        assert!(store.tunnels().is_some());
    }

    #[test]
    fn activation_is_sticky_across_unmounts() {
        let store = ActivationStore::isolated();

        // Arbitrary mount/unmount sequence: activated stays true after the
        // first mount, active tracks mount state
        store.transition(PageMounted);
        store.transition(PageUnmounted);
        assert!(store.is_activated());
        assert!(!store.is_active());

        store.transition(PageMounted);
        assert!(store.is_active());

        store.transition(PageUnmounted);
        store.transition(PageUnmounted);
        assert!(store.is_activated());
        assert!(!store.is_active());
    }

    #[test]
    fn active_implies_activated() {
        let store = ActivationStore::isolated();
        // Unmount before any mount must not produce active state
        store.transition(PageUnmounted);
        assert!(!store.is_active());
        assert!(!store.is_activated());

        for event in [
            PageMounted,
            PageUnmounted,
            PageMounted,
            PageMounted,
            PageUnmounted,
        ] {
            store.transition(event);
            let state = store.snapshot();
            assert!(!state.is_active() || state.is_activated());
        }
    }

    #[test]
    fn tunnels_survive_deactivation() {
        let store = ActivationStore::isolated();
        store.transition(PageMounted);
        let first = store.tunnels().unwrap();
        first.to_scene.set_route("/home");

        store.transition(PageUnmounted);
        store.transition(PageMounted);

        // Same pair, not a reallocation
        let second = store.tunnels().unwrap();
        assert_eq!(second.to_scene.route(), "/home");
    }

    #[test]
    fn bridge_is_noop_while_dormant() {
        let store = ActivationStore::isolated();
        let bridge = TunnelBridge::new(store.clone());

        bridge.inject_scene("hero", Arc::new(1u32), BridgedContext::default());
        assert!(bridge.scene_contents().is_empty());

        store.transition(PageMounted);
        bridge.inject_scene("hero", Arc::new(1u32), BridgedContext::default());
        assert_eq!(bridge.scene_contents().len(), 1);
    }

    #[test]
    fn subscribers_see_transitions() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        let store = ActivationStore::isolated();
        let seen = Arc::new(AtomicUsize::new(0));

        let seen_clone = seen.clone();
        let _sub = store.subscribe(move |state| {
            if state.is_active() {
                seen_clone.fetch_add(1, Ordering::SeqCst);
            }
        });

        store.transition(PageMounted);
        store.transition(PageUnmounted);
        store.transition(PageMounted);
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }
}
