//! Veil Core
//!
//! Foundational primitives for the Veil viewport bridge:
//!
//! - **Reactive signals**: fine-grained change propagation used to publish
//!   element rects, visibility flags, and scroll state to per-frame consumers
//! - **Global stores**: process-wide singleton state with subscriptions, used
//!   for state that must survive page navigations (canvas activation)
//! - **Math**: small vector value types shared by the bridge and scene crates
//!
//! # Example
//!
//! ```rust
//! use veil_core::reactive::SignalGraph;
//!
//! let mut graph = SignalGraph::new();
//! let scroll = graph.create_signal(0.0f32);
//!
//! let _effect = graph.create_effect(move |g| {
//!     let _ = g.get(scroll);
//! });
//!
//! graph.set(scroll, 120.0);
//! ```

pub mod math;
pub mod reactive;
pub mod store;

pub use math::{Vec2, Vec3};
pub use reactive::{
    Effect, EffectId, Observed, SharedSignalGraph, Signal, SignalGraph, SignalId,
};
pub use store::{global_store, Store, Unsubscriber};
