//! Veil Bridge
//!
//! The host-facing half of the Veil viewport bridge: rect observation,
//! rect-to-transform synchronization, cross-tree tunnels, and the canvas
//! activation state machine.
//!
//! A page mounts an element, attaches a [`RectObserver`] through one
//! [`ElementBinding`], and wraps its GPU content in the [`TunnelBridge`].
//! The bridge only carries content once the [`ActivationStore`] reports the
//! canvas activated; each GPU object keeps itself aligned with its element
//! via [`sync_transform`] on every scroll tick.
//!
//! # Example
//!
//! ```rust
//! use veil_bridge::{ActivationEvent, ActivationStore, TunnelBridge};
//!
//! let activation = ActivationStore::isolated();
//! let bridge = TunnelBridge::new(activation.clone());
//!
//! // First GPU page mount this session: allocates the tunnel pair
//! activation.transition(ActivationEvent::PageMounted);
//! assert!(activation.is_active());
//! ```

pub mod activation;
pub mod rect;
pub mod transform;
pub mod tunnel;

pub use activation::{
    ActivationEvent, ActivationPhase, ActivationState, ActivationStore, TunnelBridge,
};
pub use rect::{ElementBinding, ObserverOptions, Rect, RectObserver, Viewport};
pub use transform::{
    resolve_scroll, sync_transform, AmbientTransform, NativeScroll, ScrollSource, SmoothScroll,
    Transform, TransformBinding, TransformGetter,
};
pub use tunnel::{
    BridgedContext, EntryKey, Payload, TimelineHandle, Tunnel, TunnelEntry, TunnelPair,
};
