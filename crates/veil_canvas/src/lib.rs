//! Veil Canvas
//!
//! The persistent rendering runtime behind the viewport bridge. One
//! [`CanvasRuntime`] outlives every page: it resolves a GPU backend once,
//! renders while a bridged page is mounted, pauses (without releasing
//! anything) while none is, and tears down exactly once when the host
//! shuts the canvas off for good.
//!
//! - [`backend`] probes modern APIs first and falls back to GL
//! - [`frame`] runs registered callbacks through fixed, ordered stages
//!   with per-callback panic isolation
//! - [`post`] chains post effects over the finished scene with ping-pong
//!   routing
//! - [`runtime`] owns phase transitions, debounced resizes, and the MSAA
//!   policy

pub mod backend;
pub mod error;
pub mod frame;
pub mod post;
pub mod runtime;

pub use backend::{BackendKind, SelectedBackend};
pub use error::CanvasError;
pub use frame::{CallbackId, FrameContext, FrameDriver, FrameStage};
pub use post::{ChainTargets, PostEffect, PostStack, ScreenAntialias, Vignette};
pub use runtime::{
    attach_activation, sample_count, AntialiasPolicy, CanvasConfig, CanvasRuntime, PowerPolicy,
    RuntimePhase,
};
