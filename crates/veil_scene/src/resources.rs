//! GPU resource registry
//!
//! GPU memory is not garbage collected: geometries, materials, textures,
//! and render targets must be released explicitly. The registry is the
//! authoritative owner of every resource; scene nodes and materials refer
//! to resources by key, never by value, so ownership stays tree-shaped and
//! disposal can be driven from the owning side.
//!
//! `dispose` is idempotent on every resource. Cache-owned textures carry a
//! marker so tree disposal never releases them; the cache is their only
//! disposer.

use slotmap::{new_key_type, SlotMap};
use smallvec::SmallVec;

new_key_type! {
    /// Key for a geometry in the registry
    pub struct GeometryId;
    /// Key for a material in the registry
    pub struct MaterialId;
    /// Key for a texture in the registry
    pub struct TextureId;
    /// Key for a render target in the registry
    pub struct RenderTargetId;
}

/// A resource that owns releasable GPU memory
pub trait Disposable {
    /// Release the underlying GPU memory; safe to call more than once
    fn dispose(&mut self);

    fn is_disposed(&self) -> bool;
}

/// CPU-side decoded image backing a texture
///
/// Kept alive after upload only when the host asks for it; releasing it is
/// separate from releasing the GPU texture.
#[derive(Clone, Debug, Default)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

/// Vertex data plus its GPU buffers
pub struct Geometry {
    pub label: String,
    pub vertex_count: u32,
    pub index_count: u32,
    gpu: Option<GpuGeometry>,
    disposed: bool,
}

/// Buffers uploaded for a geometry
pub struct GpuGeometry {
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: Option<wgpu::Buffer>,
}

impl Geometry {
    pub fn new(label: impl Into<String>, vertex_count: u32, index_count: u32) -> Self {
        Self {
            label: label.into(),
            vertex_count,
            index_count,
            gpu: None,
            disposed: false,
        }
    }

    pub fn with_gpu(mut self, gpu: GpuGeometry) -> Self {
        self.gpu = Some(gpu);
        self
    }
}

impl Disposable for Geometry {
    fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        if let Some(gpu) = self.gpu.take() {
            gpu.vertex_buffer.destroy();
            if let Some(index) = gpu.index_buffer {
                index.destroy();
            }
        }
        self.disposed = true;
    }

    fn is_disposed(&self) -> bool {
        self.disposed
    }
}

/// A named texture binding on a material
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextureSlot {
    /// Property name ("map", "normal_map", ...)
    pub name: String,
    pub texture: TextureId,
}

/// Shading parameters plus texture bindings
pub struct Material {
    pub label: String,
    slots: SmallVec<[TextureSlot; 2]>,
    disposed: bool,
}

impl Material {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            slots: SmallVec::new(),
            disposed: false,
        }
    }

    /// Bind a texture to a named slot
    pub fn with_texture(mut self, name: impl Into<String>, texture: TextureId) -> Self {
        self.slots.push(TextureSlot {
            name: name.into(),
            texture,
        });
        self
    }

    /// Every texture-valued property on this material
    pub fn texture_slots(&self) -> &[TextureSlot] {
        &self.slots
    }
}

impl Disposable for Material {
    fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        // Texture slots are keys; the referenced textures are released by
        // the tree walk, which owns the shared-reference bookkeeping
        self.slots.clear();
        self.disposed = true;
    }

    fn is_disposed(&self) -> bool {
        self.disposed
    }
}

/// A sampled image plus optional CPU-side decode
pub struct Texture {
    pub label: String,
    image: Option<DecodedImage>,
    gpu: Option<wgpu::Texture>,
    /// Owned by the texture cache; tree disposal must skip it
    cache_owned: bool,
    disposed: bool,
}

impl Texture {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            image: None,
            gpu: None,
            cache_owned: false,
            disposed: false,
        }
    }

    pub fn with_image(mut self, image: DecodedImage) -> Self {
        self.image = Some(image);
        self
    }

    pub fn with_gpu(mut self, gpu: wgpu::Texture) -> Self {
        self.gpu = Some(gpu);
        self
    }

    pub fn image(&self) -> Option<&DecodedImage> {
        self.image.as_ref()
    }

    pub fn is_cache_owned(&self) -> bool {
        self.cache_owned
    }

    pub(crate) fn mark_cache_owned(&mut self) {
        self.cache_owned = true;
    }

    pub(crate) fn force_dispose(&mut self) {
        self.cache_owned = false;
        self.dispose();
    }
}

impl Disposable for Texture {
    fn dispose(&mut self) {
        if self.disposed || self.cache_owned {
            return;
        }
        if let Some(gpu) = self.gpu.take() {
            gpu.destroy();
        }
        // The decoded image is a separately tracked release
        self.image = None;
        self.disposed = true;
    }

    fn is_disposed(&self) -> bool {
        self.disposed
    }
}

/// An offscreen color target
pub struct RenderTarget {
    pub label: String,
    pub width: u32,
    pub height: u32,
    gpu: Option<wgpu::Texture>,
    disposed: bool,
}

impl RenderTarget {
    pub fn new(label: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            label: label.into(),
            width,
            height,
            gpu: None,
            disposed: false,
        }
    }

    pub fn with_gpu(mut self, gpu: wgpu::Texture) -> Self {
        self.gpu = Some(gpu);
        self
    }
}

impl Disposable for RenderTarget {
    fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        if let Some(gpu) = self.gpu.take() {
            gpu.destroy();
        }
        self.disposed = true;
    }

    fn is_disposed(&self) -> bool {
        self.disposed
    }
}

/// Counts of actual releases performed by the registry
///
/// Disposing an already-disposed resource does not count, which is what
/// makes double-release regressions visible in tests.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DisposalStats {
    pub geometries: usize,
    pub materials: usize,
    pub textures: usize,
    pub images: usize,
    pub render_targets: usize,
}

/// Owner of all GPU resources for one canvas
pub struct Resources {
    geometries: SlotMap<GeometryId, Geometry>,
    materials: SlotMap<MaterialId, Material>,
    textures: SlotMap<TextureId, Texture>,
    render_targets: SlotMap<RenderTargetId, RenderTarget>,
    stats: DisposalStats,
}

impl Resources {
    pub fn new() -> Self {
        Self {
            geometries: SlotMap::with_key(),
            materials: SlotMap::with_key(),
            textures: SlotMap::with_key(),
            render_targets: SlotMap::with_key(),
            stats: DisposalStats::default(),
        }
    }

    pub fn add_geometry(&mut self, geometry: Geometry) -> GeometryId {
        self.geometries.insert(geometry)
    }

    pub fn add_material(&mut self, material: Material) -> MaterialId {
        self.materials.insert(material)
    }

    pub fn add_texture(&mut self, texture: Texture) -> TextureId {
        self.textures.insert(texture)
    }

    pub fn add_render_target(&mut self, target: RenderTarget) -> RenderTargetId {
        self.render_targets.insert(target)
    }

    pub fn geometry(&self, id: GeometryId) -> Option<&Geometry> {
        self.geometries.get(id)
    }

    pub fn material(&self, id: MaterialId) -> Option<&Material> {
        self.materials.get(id)
    }

    pub fn texture(&self, id: TextureId) -> Option<&Texture> {
        self.textures.get(id)
    }

    pub fn render_target(&self, id: RenderTargetId) -> Option<&RenderTarget> {
        self.render_targets.get(id)
    }

    /// Release a geometry's GPU memory (idempotent)
    pub fn dispose_geometry(&mut self, id: GeometryId) {
        if let Some(geometry) = self.geometries.get_mut(id) {
            if !geometry.is_disposed() {
                geometry.dispose();
                self.stats.geometries += 1;
            }
        }
    }

    /// Release a material (idempotent); does not touch its textures
    pub fn dispose_material(&mut self, id: MaterialId) {
        if let Some(material) = self.materials.get_mut(id) {
            if !material.is_disposed() {
                material.dispose();
                self.stats.materials += 1;
            }
        }
    }

    /// Release a texture and its decoded image (idempotent)
    ///
    /// Cache-owned textures are skipped: the cache is their only disposer.
    pub fn dispose_texture(&mut self, id: TextureId) {
        if let Some(texture) = self.textures.get_mut(id) {
            if texture.is_cache_owned() {
                tracing::trace!(label = %texture.label, "skipping cache-owned texture");
                return;
            }
            if !texture.is_disposed() {
                let had_image = texture.image.is_some();
                texture.dispose();
                self.stats.textures += 1;
                if had_image {
                    self.stats.images += 1;
                }
            }
        }
    }

    /// Release a render target (idempotent)
    pub fn dispose_render_target(&mut self, id: RenderTargetId) {
        if let Some(target) = self.render_targets.get_mut(id) {
            if !target.is_disposed() {
                target.dispose();
                self.stats.render_targets += 1;
            }
        }
    }

    pub(crate) fn mark_cache_owned(&mut self, id: TextureId) {
        if let Some(texture) = self.textures.get_mut(id) {
            texture.mark_cache_owned();
        }
    }

    /// Cache-internal release path for a cache-owned texture
    pub(crate) fn dispose_cached_texture(&mut self, id: TextureId) {
        if let Some(texture) = self.textures.get_mut(id) {
            if !texture.is_disposed() {
                let had_image = texture.image.is_some();
                texture.force_dispose();
                self.stats.textures += 1;
                if had_image {
                    self.stats.images += 1;
                }
            }
        }
    }

    /// Actual-release counters since creation
    pub fn disposal_stats(&self) -> DisposalStats {
        self.stats
    }
}

impl Default for Resources {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image() -> DecodedImage {
        DecodedImage {
            width: 2,
            height: 2,
            data: vec![0; 16],
        }
    }

    #[test]
    fn dispose_geometry_is_idempotent() {
        let mut resources = Resources::new();
        let id = resources.add_geometry(Geometry::new("quad", 4, 6));

        resources.dispose_geometry(id);
        resources.dispose_geometry(id);

        assert!(resources.geometry(id).unwrap().is_disposed());
        assert_eq!(resources.disposal_stats().geometries, 1);
    }

    #[test]
    fn texture_image_release_is_counted_separately() {
        let mut resources = Resources::new();
        let with_image = resources.add_texture(Texture::new("a").with_image(image()));
        let without = resources.add_texture(Texture::new("b"));

        resources.dispose_texture(with_image);
        resources.dispose_texture(without);

        let stats = resources.disposal_stats();
        assert_eq!(stats.textures, 2);
        assert_eq!(stats.images, 1);
    }

    #[test]
    fn cache_owned_texture_survives_direct_dispose() {
        let mut resources = Resources::new();
        let id = resources.add_texture(Texture::new("shared").with_image(image()));
        resources.mark_cache_owned(id);

        resources.dispose_texture(id);
        assert!(!resources.texture(id).unwrap().is_disposed());
        assert_eq!(resources.disposal_stats().textures, 0);

        // Only the cache path releases it
        resources.dispose_cached_texture(id);
        assert!(resources.texture(id).unwrap().is_disposed());
        assert_eq!(resources.disposal_stats().textures, 1);
    }

    #[test]
    fn material_dispose_leaves_textures_alone() {
        let mut resources = Resources::new();
        let texture = resources.add_texture(Texture::new("map"));
        let material = resources.add_material(Material::new("basic").with_texture("map", texture));

        resources.dispose_material(material);
        assert!(resources.material(material).unwrap().is_disposed());
        assert!(!resources.texture(texture).unwrap().is_disposed());
    }
}
