//! Cross-render-tree tunnels
//!
//! A tunnel is a keyed injection channel: content declared while building
//! one render tree is collected and rendered by the other. The pair of
//! tunnels (host tree to GPU scene, GPU tree to HTML-style overlay) is
//! allocated once per canvas activation and shared for the session.
//!
//! The GPU tree is reconciled independently, so ambient context values do
//! not cross the boundary on their own. A fixed allow-list of them
//! ([`BridgedContext`]) is copied into every injected entry at the portal
//! boundary instead of relying on implicit tree inheritance.

use crate::transform::AmbientTransform;
use std::any::Any;
use std::sync::{Arc, Mutex};

/// Handle to an animation timeline provided by the host
///
/// Purely additive: GPU content that wants authored keyframe values reads
/// them through this handle; everything works without one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TimelineHandle(pub u64);

/// Context values re-provided across the reconciler boundary
///
/// This is a closed set by design: the portal copies exactly these values,
/// nothing else leaks through.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BridgedContext {
    /// Current global pan/zoom applied to host content
    pub ambient: AmbientTransform,
    /// Current animation timeline, if the host provides one
    pub timeline: Option<TimelineHandle>,
}

/// Type-erased tunnel payload
pub type Payload = Arc<dyn Any + Send + Sync>;

/// Identity of an injected entry: the route it was injected under plus a
/// caller-chosen slot name
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct EntryKey {
    pub route: String,
    pub slot: String,
}

/// One injected piece of content with its boundary-copied context
#[derive(Clone)]
pub struct TunnelEntry<T> {
    pub key: EntryKey,
    pub content: T,
    pub context: BridgedContext,
}

impl TunnelEntry<Payload> {
    /// Downcast the payload to a concrete content type
    pub fn content_as<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.content.clone().downcast::<T>().ok()
    }
}

struct TunnelState<T> {
    entries: Vec<TunnelEntry<T>>,
    route: String,
    revision: u64,
}

/// A keyed cross-tree injection channel
pub struct Tunnel<T> {
    state: Arc<Mutex<TunnelState<T>>>,
}

impl<T> Clone for Tunnel<T> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
        }
    }
}

impl<T: Clone> Tunnel<T> {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(TunnelState {
                entries: Vec::new(),
                route: String::new(),
                revision: 0,
            })),
        }
    }

    /// Inject content under the current route, replacing any previous
    /// content in the same slot
    pub fn inject(&self, slot: impl Into<String>, content: T, context: BridgedContext) {
        let slot = slot.into();
        let mut state = self.state.lock().unwrap();
        let key = EntryKey {
            route: state.route.clone(),
            slot,
        };
        state.entries.retain(|e| e.key != key);
        state.entries.push(TunnelEntry {
            key,
            content,
            context,
        });
        state.revision += 1;
    }

    /// Remove the content in a slot under the current route
    pub fn remove(&self, slot: &str) {
        let mut state = self.state.lock().unwrap();
        let route = state.route.clone();
        let before = state.entries.len();
        state
            .entries
            .retain(|e| !(e.key.route == route && e.key.slot == slot));
        if state.entries.len() != before {
            state.revision += 1;
        }
    }

    /// Switch to a new route, tearing down everything injected under the
    /// previous one
    ///
    /// Keys embed the route, so nothing built for the old route can be
    /// reached once the new route's content is injected: the consuming
    /// tree remounts rather than patches.
    pub fn set_route(&self, route: impl Into<String>) {
        let route = route.into();
        let mut state = self.state.lock().unwrap();
        if state.route == route {
            return;
        }
        tracing::debug!(from = %state.route, to = %route, "tunnel route change");
        state.route = route;
        state.entries.clear();
        state.revision += 1;
    }

    /// Snapshot of the injected entries in insertion order
    pub fn contents(&self) -> Vec<TunnelEntry<T>> {
        self.state.lock().unwrap().entries.clone()
    }

    /// The route entries are currently keyed under
    pub fn route(&self) -> String {
        self.state.lock().unwrap().route.clone()
    }

    /// Bumped on every mutation; consumers compare it to detect change
    pub fn revision(&self) -> u64 {
        self.state.lock().unwrap().revision
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().unwrap().entries.is_empty()
    }
}

impl<T: Clone> Default for Tunnel<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// The tunnel singletons for one canvas activation
///
/// Exactly one pair exists per canvas; its lifetime is the lifetime of the
/// activation (the session, in practice).
#[derive(Clone)]
pub struct TunnelPair {
    /// Host tree → GPU scene graph
    pub to_scene: Tunnel<Payload>,
    /// GPU tree → HTML-style overlay stacked on the canvas
    pub to_overlay: Tunnel<Payload>,
}

impl TunnelPair {
    pub fn new() -> Self {
        Self {
            to_scene: Tunnel::new(),
            to_overlay: Tunnel::new(),
        }
    }

    /// Re-key both directions for a new route
    pub fn set_route(&self, route: &str) {
        self.to_scene.set_route(route);
        self.to_overlay.set_route(route);
    }
}

impl Default for TunnelPair {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct MeshContent(&'static str);

    fn payload(content: MeshContent) -> Payload {
        Arc::new(content)
    }

    #[test]
    fn inject_and_collect() {
        let tunnel: Tunnel<Payload> = Tunnel::new();
        tunnel.set_route("/home");
        tunnel.inject("hero", payload(MeshContent("hero-mesh")), BridgedContext::default());

        let contents = tunnel.contents();
        assert_eq!(contents.len(), 1);
        assert_eq!(contents[0].key.route, "/home");
        assert_eq!(contents[0].key.slot, "hero");
        assert_eq!(
            *contents[0].content_as::<MeshContent>().unwrap(),
            MeshContent("hero-mesh")
        );
    }

    #[test]
    fn inject_replaces_same_slot() {
        let tunnel: Tunnel<Payload> = Tunnel::new();
        tunnel.inject("hero", payload(MeshContent("a")), BridgedContext::default());
        tunnel.inject("hero", payload(MeshContent("b")), BridgedContext::default());

        let contents = tunnel.contents();
        assert_eq!(contents.len(), 1);
        assert_eq!(
            *contents[0].content_as::<MeshContent>().unwrap(),
            MeshContent("b")
        );
    }

    #[test]
    fn route_change_tears_down_previous_content() {
        let tunnel: Tunnel<Payload> = Tunnel::new();
        tunnel.set_route("/home");
        tunnel.inject("hero", payload(MeshContent("old")), BridgedContext::default());
        tunnel.inject("footer", payload(MeshContent("old-footer")), BridgedContext::default());

        tunnel.set_route("/about");
        assert!(tunnel.is_empty());

        tunnel.inject("hero", payload(MeshContent("new")), BridgedContext::default());
        let contents = tunnel.contents();
        assert_eq!(contents.len(), 1);
        assert_eq!(contents[0].key.route, "/about");
        assert!(contents.iter().all(|e| e.key.route != "/home"));
    }

    #[test]
    fn context_is_copied_at_the_boundary() {
        let tunnel: Tunnel<Payload> = Tunnel::new();
        let context = BridgedContext {
            ambient: AmbientTransform::default(),
            timeline: Some(TimelineHandle(7)),
        };
        tunnel.inject("hero", payload(MeshContent("m")), context);

        let contents = tunnel.contents();
        assert_eq!(contents[0].context.timeline, Some(TimelineHandle(7)));
    }

    #[test]
    fn revision_tracks_mutations() {
        let tunnel: Tunnel<Payload> = Tunnel::new();
        let r0 = tunnel.revision();

        tunnel.inject("a", payload(MeshContent("x")), BridgedContext::default());
        let r1 = tunnel.revision();
        assert!(r1 > r0);

        tunnel.remove("a");
        assert!(tunnel.revision() > r1);

        // Removing a missing slot is not a change
        let r2 = tunnel.revision();
        tunnel.remove("missing");
        assert_eq!(tunnel.revision(), r2);
    }
}
