//! Veil Scene
//!
//! The GPU-side half of the viewport bridge: a scene-node tree whose nodes
//! shadow host-layout elements, and the resource lifecycle that keeps GPU
//! memory from leaking across page navigations.
//!
//! - [`Resources`] owns every geometry, material, texture, and render
//!   target; disposal is explicit and idempotent
//! - [`dispose_tree`] releases everything a subtree owns when its page
//!   unmounts, with a visited-set guard for textures shared between
//!   materials
//! - [`TextureCache`] hands out shared textures that only the cache itself
//!   may release
//! - [`ScopedResource`] binds a resource to a scope with
//!   dispose-exactly-once semantics
//! - [`PendingLoad`] makes async asset loads safe against unmount races

pub mod cache;
pub mod dispose;
pub mod loader;
pub mod node;
pub mod resources;
pub mod scoped;

pub use cache::{CacheStats, TextureCache};
pub use dispose::{dispose_tree, unmount_tree};
pub use loader::{CancelHandle, LoadError, PendingLoad};
pub use node::{NodeId, Scene, SceneNode};
pub use resources::{
    DecodedImage, Disposable, DisposalStats, Geometry, GeometryId, GpuGeometry, Material,
    MaterialId, RenderTarget, RenderTargetId, Resources, Texture, TextureId, TextureSlot,
};
pub use scoped::ScopedResource;
