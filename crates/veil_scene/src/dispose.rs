//! Recursive subtree disposal
//!
//! When a page's GPU subtree unmounts, every resource that subtree owns must
//! be released: geometry, each material (multi-material meshes included),
//! every texture-valued slot on each material, and each texture's decoded
//! image. A visited set guards textures referenced from more than one
//! material in the same tree against double release; cache-owned textures
//! are skipped entirely since the cache is their only disposer.
//!
//! Disposal completes synchronously before this function returns; no frame
//! can observe a half-disposed subtree.

use crate::node::{NodeId, Scene};
use crate::resources::{Resources, TextureId};
use rustc_hash::FxHashSet;

/// Release every resource owned by `root` and its descendants
///
/// Idempotent: a second call over the same subtree releases nothing further
/// and never panics.
pub fn dispose_tree(resources: &mut Resources, scene: &Scene, root: NodeId) {
    let mut visited: FxHashSet<TextureId> = FxHashSet::default();

    for id in scene.subtree(root) {
        let Some(node) = scene.node(id) else {
            continue;
        };

        if let Some(geometry) = node.geometry() {
            resources.dispose_geometry(geometry);
        }

        for &material_id in node.materials() {
            let slots: Vec<TextureId> = resources
                .material(material_id)
                .map(|m| m.texture_slots().iter().map(|s| s.texture).collect())
                .unwrap_or_default();

            for texture in slots {
                if visited.insert(texture) {
                    resources.dispose_texture(texture);
                }
            }
            resources.dispose_material(material_id);
        }
    }
}

/// Dispose a subtree's resources and remove its nodes from the scene
pub fn unmount_tree(resources: &mut Resources, scene: &mut Scene, root: NodeId) {
    dispose_tree(resources, scene, root);
    scene.remove_subtree(root);
}
