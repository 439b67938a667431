//! Rect-to-transform synchronization
//!
//! Converts a document-space [`Rect`] plus the current scroll offset and
//! ambient 2D transform into a 3D placement for the GPU object that shadows
//! the element. The mapping targets an orthographic camera sized to the
//! viewport in pixels: origin at the viewport center, Y up.
//!
//! The transform is recomputed in place: one recompute per trigger, no
//! per-frame allocation.

use crate::rect::{Rect, Viewport};
use std::sync::{Arc, Mutex};
use veil_core::{Vec2, Vec3};

/// Placement of a GPU object shadowing a layout element
///
/// Owned exclusively by the object that requested it. `visible` is a culling
/// hint, not a hard skip: consumers decide whether to skip work when false.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Vec3,
    pub scale: Vec3,
    pub visible: bool,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
            visible: false,
        }
    }
}

/// Global pan/zoom applied to host content (e.g. during a page transition)
///
/// GPU objects must respect it to stay aligned with their host-layout
/// counterparts.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AmbientTransform {
    pub translate: Vec2,
    pub scale: Vec2,
}

impl Default for AmbientTransform {
    fn default() -> Self {
        Self {
            translate: Vec2::ZERO,
            scale: Vec2::ONE,
        }
    }
}

/// Source of the current scroll offset
///
/// A smooth-scroll engine is preferred when one is driving the page; the
/// native viewport offset is the fallback.
pub trait ScrollSource {
    fn scroll_offset(&self) -> f32;
}

/// State reported by a smooth-scroll engine
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SmoothScroll {
    pub scroll: f32,
    pub limit: f32,
    pub velocity: f32,
}

impl ScrollSource for SmoothScroll {
    fn scroll_offset(&self) -> f32 {
        self.scroll
    }
}

/// Native scroll position read from the viewport
#[derive(Clone, Copy, Debug, Default)]
pub struct NativeScroll;

impl NativeScroll {
    pub fn offset(viewport: &Viewport) -> f32 {
        viewport.scroll
    }
}

/// Resolve the effective scroll offset, preferring a smooth-scroll engine
pub fn resolve_scroll(smooth: Option<&SmoothScroll>, viewport: &Viewport) -> f32 {
    match smooth {
        Some(engine) => engine.scroll_offset(),
        None => NativeScroll::offset(viewport),
    }
}

/// Recompute `transform` from the element rect and scroll state, in place
///
/// Visibility holds while the element's scroll-space vertical extent
/// overlaps the viewport extended by one viewport height on each side; the
/// interval is open at both bounds. Rotation is left untouched; it belongs
/// to the consumer.
pub fn sync_transform(
    transform: &mut Transform,
    rect: &Rect,
    viewport: &Viewport,
    scroll: f32,
    ambient: &AmbientTransform,
) {
    let ty = ambient.translate.y;

    transform.visible =
        scroll > rect.top - viewport.height + ty && scroll < rect.top + ty + rect.height;

    transform.position.x = -viewport.width / 2.0 + (rect.left + rect.width / 2.0);
    transform.position.y = viewport.height / 2.0 - (rect.top + rect.height / 2.0) + scroll - ty;

    transform.scale.x = rect.width * ambient.scale.x;
    transform.scale.y = rect.height * ambient.scale.y;
}

type UpdateCallback = Box<dyn Fn(&Transform) + Send>;

/// Binds a rect to a continuously synchronized transform
///
/// The host wires its triggers to this binding: every smooth-scroll tick
/// goes to [`scroll_tick`](Self::scroll_tick), every ambient-transform
/// change to [`ambient_changed`](Self::ambient_changed), and (when no
/// external tick source exists) native scroll events to
/// [`native_scroll`](Self::native_scroll), whose registration fires an
/// immediate first recompute. Each trigger performs exactly one recompute
/// and invokes the update callback once.
pub struct TransformBinding {
    transform: Arc<Mutex<Transform>>,
    rect: Rect,
    viewport: Viewport,
    ambient: AmbientTransform,
    scroll: f32,
    on_update: Option<UpdateCallback>,
}

impl TransformBinding {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            transform: Arc::new(Mutex::new(Transform::default())),
            rect: Rect::default(),
            viewport,
            ambient: AmbientTransform::default(),
            scroll: NativeScroll::offset(&viewport),
            on_update: None,
        }
    }

    /// Register the per-recompute callback
    pub fn on_update<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Transform) + Send + 'static,
    {
        self.on_update = Some(Box::new(callback));
        self
    }

    /// Getter handle for the latest computed transform
    pub fn getter(&self) -> TransformGetter {
        TransformGetter {
            transform: self.transform.clone(),
        }
    }

    /// The observed element rect changed
    pub fn rect_changed(&mut self, rect: Rect) {
        self.rect = rect;
        self.recompute();
    }

    /// A smooth-scroll engine reported a new offset
    pub fn scroll_tick(&mut self, smooth: &SmoothScroll) {
        self.scroll = smooth.scroll_offset();
        self.recompute();
    }

    /// The ambient 2D transform changed
    pub fn ambient_changed(&mut self, ambient: AmbientTransform) {
        self.ambient = ambient;
        self.recompute();
    }

    /// A native scroll event fired (fallback when no smooth-scroll engine
    /// is active); also used for the immediate first call on registration
    pub fn native_scroll(&mut self, viewport: Viewport) {
        self.viewport = viewport;
        self.scroll = NativeScroll::offset(&viewport);
        self.recompute();
    }

    /// Latest computed transform
    pub fn get(&self) -> Transform {
        *self.transform.lock().unwrap()
    }

    fn recompute(&mut self) {
        let mut transform = self.transform.lock().unwrap();
        sync_transform(
            &mut transform,
            &self.rect,
            &self.viewport,
            self.scroll,
            &self.ambient,
        );
        let snapshot = *transform;
        drop(transform);

        if let Some(ref callback) = self.on_update {
            callback(&snapshot);
        }
    }
}

/// Cheap handle reading the latest transform computed by a binding
#[derive(Clone)]
pub struct TransformGetter {
    transform: Arc<Mutex<Transform>>,
}

impl TransformGetter {
    pub fn get(&self) -> Transform {
        *self.transform.lock().unwrap()
    }
}
