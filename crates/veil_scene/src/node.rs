//! Scene-node arena
//!
//! Nodes form the GPU-side tree: each carries a local transform, a
//! visibility flag, and optional resource attachments (one geometry, one or
//! more materials for multi-material meshes). Ownership is tree-shaped (a
//! composite node such as a loaded model owns its children), which is what
//! lets disposal walk top-down.

use crate::resources::{GeometryId, MaterialId};
use slotmap::{new_key_type, SlotMap};
use smallvec::SmallVec;
use veil_bridge::Transform;
use veil_core::Vec3;

new_key_type! {
    /// Key for a node in the scene
    pub struct NodeId;
}

/// A node in the GPU scene tree
#[derive(Clone, Debug)]
pub struct SceneNode {
    /// Local position
    pub position: Vec3,
    /// Local rotation as Euler angles (radians)
    pub rotation: Vec3,
    /// Local scale
    pub scale: Vec3,
    /// Visibility flag; a culling hint, not a hard skip
    pub visible: bool,
    /// Draw order (higher renders later)
    pub render_order: i32,
    geometry: Option<GeometryId>,
    materials: SmallVec<[MaterialId; 1]>,
    children: Vec<NodeId>,
    parent: Option<NodeId>,
}

impl Default for SceneNode {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
            visible: true,
            render_order: 0,
            geometry: None,
            materials: SmallVec::new(),
            children: Vec::new(),
            parent: None,
        }
    }
}

impl SceneNode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_geometry(mut self, geometry: GeometryId) -> Self {
        self.geometry = Some(geometry);
        self
    }

    pub fn with_material(mut self, material: MaterialId) -> Self {
        self.materials.push(material);
        self
    }

    /// Replace the full material list (multi-material meshes)
    pub fn with_materials(mut self, materials: impl IntoIterator<Item = MaterialId>) -> Self {
        self.materials = materials.into_iter().collect();
        self
    }

    pub fn geometry(&self) -> Option<GeometryId> {
        self.geometry
    }

    pub fn materials(&self) -> &[MaterialId] {
        &self.materials
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Adopt a synchronized transform computed from an element rect
    pub fn apply_transform(&mut self, transform: &Transform) {
        self.position = transform.position;
        self.rotation = transform.rotation;
        self.scale = transform.scale;
        self.visible = transform.visible;
    }
}

/// The scene tree for one canvas
pub struct Scene {
    nodes: SlotMap<NodeId, SceneNode>,
}

impl Scene {
    pub fn new() -> Self {
        Self {
            nodes: SlotMap::with_key(),
        }
    }

    /// Insert a root-level node
    pub fn spawn(&mut self, node: SceneNode) -> NodeId {
        self.nodes.insert(node)
    }

    /// Insert a node as a child of `parent`
    pub fn spawn_child(&mut self, parent: NodeId, mut node: SceneNode) -> NodeId {
        node.parent = Some(parent);
        let id = self.nodes.insert(node);
        if let Some(parent_node) = self.nodes.get_mut(parent) {
            parent_node.children.push(id);
        }
        id
    }

    pub fn node(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut SceneNode> {
        self.nodes.get_mut(id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Depth-first ids of `root` and every descendant
    pub fn subtree(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if let Some(node) = self.nodes.get(id) {
                out.push(id);
                stack.extend(node.children.iter().rev().copied());
            }
        }
        out
    }

    /// Remove a subtree from the scene, returning the removed nodes
    ///
    /// Resource disposal is a separate concern; see
    /// [`dispose_tree`](crate::dispose::dispose_tree).
    pub fn remove_subtree(&mut self, root: NodeId) -> Vec<SceneNode> {
        let ids = self.subtree(root);
        if let Some(parent) = self.nodes.get(root).and_then(|n| n.parent) {
            if let Some(parent_node) = self.nodes.get_mut(parent) {
                parent_node.children.retain(|c| *c != root);
            }
        }
        ids.into_iter()
            .filter_map(|id| self.nodes.remove(id))
            .collect()
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subtree_walks_depth_first() {
        let mut scene = Scene::new();
        let root = scene.spawn(SceneNode::new());
        let a = scene.spawn_child(root, SceneNode::new());
        let b = scene.spawn_child(root, SceneNode::new());
        let a1 = scene.spawn_child(a, SceneNode::new());

        assert_eq!(scene.subtree(root), vec![root, a, a1, b]);
    }

    #[test]
    fn remove_subtree_detaches_from_parent() {
        let mut scene = Scene::new();
        let root = scene.spawn(SceneNode::new());
        let child = scene.spawn_child(root, SceneNode::new());
        let grandchild = scene.spawn_child(child, SceneNode::new());

        let removed = scene.remove_subtree(child);
        assert_eq!(removed.len(), 2);
        assert!(!scene.contains(child));
        assert!(!scene.contains(grandchild));
        assert!(scene.node(root).unwrap().children().is_empty());
    }

    #[test]
    fn apply_transform_copies_placement_and_visibility() {
        let mut node = SceneNode::new();
        let transform = Transform {
            position: Vec3::new(-350.0, 250.0, 0.0),
            rotation: Vec3::ZERO,
            scale: Vec3::new(200.0, 100.0, 1.0),
            visible: true,
        };

        node.apply_transform(&transform);
        assert_eq!(node.position, Vec3::new(-350.0, 250.0, 0.0));
        assert_eq!(node.scale.x, 200.0);
        assert!(node.visible);
    }
}
