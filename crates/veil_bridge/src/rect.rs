//! Element rect and visibility observation
//!
//! [`RectObserver`] tracks the bounding box of a host-layout element and
//! whether that element is within a configurable margin of the viewport.
//! It composes two watchers, a layout watcher producing the rect and an
//! intersection watcher producing the visibility flag, behind a single
//! [`ElementBinding`] handle, so a caller attaches both to the same element
//! without juggling two handles.
//!
//! There is no browser here: the host layout engine pushes rect and viewport
//! updates through the binding, the same way Blinc pushes element bounds
//! through its bounds callbacks.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use veil_core::reactive::{Observed, SharedSignalGraph};

/// An element's bounding box in document-flow pixel coordinates
///
/// `top`/`left` are relative to the document, not the viewport; the rect is
/// never viewport-clipped. The observer mutates it in place as layout
/// changes; GPU-side consumers only ever read it.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rect {
    pub top: f32,
    pub left: f32,
    pub width: f32,
    pub height: f32,
    pub right: f32,
    pub bottom: f32,
    pub x: f32,
    pub y: f32,
}

impl Rect {
    /// Build a rect from its layout edge and size, deriving the rest
    pub fn from_layout(top: f32, left: f32, width: f32, height: f32) -> Self {
        let mut rect = Rect::default();
        rect.set_layout(top, left, width, height);
        rect
    }

    /// Overwrite all fields in place from a new layout result
    pub fn set_layout(&mut self, top: f32, left: f32, width: f32, height: f32) {
        self.top = top;
        self.left = left;
        self.width = width;
        self.height = height;
        self.right = left + width;
        self.bottom = top + height;
        self.x = left;
        self.y = top;
    }
}

/// Host viewport state fed to observers by the layout engine
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    /// Viewport width in pixels
    pub width: f32,
    /// Viewport height in pixels
    pub height: f32,
    /// Native vertical scroll offset in pixels
    pub scroll: f32,
    /// Device pixel ratio (physical / logical)
    pub device_pixel_ratio: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 0.0,
            height: 0.0,
            scroll: 0.0,
            device_pixel_ratio: 1.0,
        }
    }
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            ..Default::default()
        }
    }
}

/// Options for the intersection watcher
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObserverOptions {
    /// Pre-activation margin in pixels: the element counts as in view while
    /// within this distance of the viewport. Large enough to activate GPU
    /// content before it scrolls on screen; nothing depends on the exact
    /// value.
    pub margin: f32,
    /// Optional fraction of the element that must overlap the extended
    /// viewport before it counts as in view
    pub threshold: Option<f32>,
}

impl Default for ObserverOptions {
    fn default() -> Self {
        Self {
            margin: 200.0,
            threshold: None,
        }
    }
}

/// Intersection predicate over a rect and the extended viewport
///
/// Rebuilt (not patched) whenever options change, so a stale margin or
/// threshold can never linger.
struct IntersectionWatcher {
    options: ObserverOptions,
}

impl IntersectionWatcher {
    fn new(options: ObserverOptions) -> Self {
        Self { options }
    }

    fn evaluate(&self, rect: &Rect, viewport: &Viewport) -> bool {
        let margin = self.options.margin;
        let view_top = viewport.scroll - margin;
        let view_bottom = viewport.scroll + viewport.height + margin;
        let view_left = -margin;
        let view_right = viewport.width + margin;

        let v_overlap = rect.bottom.min(view_bottom) - rect.top.max(view_top);
        let h_overlap = rect.right.min(view_right) - rect.left.max(view_left);
        if v_overlap <= 0.0 || h_overlap <= 0.0 {
            return false;
        }

        match self.options.threshold {
            Some(threshold) => {
                let area = rect.width * rect.height;
                if area <= 0.0 {
                    return true;
                }
                (v_overlap * h_overlap) / area >= threshold
            }
            None => true,
        }
    }
}

struct ObserverInner {
    viewport: Viewport,
    rect: Rect,
    /// None once detached; both watchers are gone at that point
    intersection: Option<IntersectionWatcher>,
    /// Bumped every time the intersection watcher is rebuilt
    watcher_generation: u64,
    connected: bool,
}

/// Tracks an element's rect and proximity to the viewport
pub struct RectObserver {
    inner: Arc<Mutex<ObserverInner>>,
    rect: Observed<Rect>,
    in_view: Observed<bool>,
}

impl RectObserver {
    pub fn new(graph: SharedSignalGraph, viewport: Viewport, options: ObserverOptions) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ObserverInner {
                viewport,
                rect: Rect::default(),
                intersection: Some(IntersectionWatcher::new(options)),
                watcher_generation: 0,
                connected: true,
            })),
            rect: Observed::new(graph.clone(), Rect::default()),
            in_view: Observed::new(graph, false),
        }
    }

    /// The continuously updated rect
    pub fn rect(&self) -> Observed<Rect> {
        self.rect.clone()
    }

    /// Whether the element is within the margin of the viewport
    pub fn is_in_view(&self) -> Observed<bool> {
        self.in_view.clone()
    }

    /// The single handle the host layout engine drives
    pub fn binding(&self) -> ElementBinding {
        ElementBinding {
            inner: self.inner.clone(),
            rect: self.rect.clone(),
            in_view: self.in_view.clone(),
        }
    }

    /// Replace observer options, rebuilding the intersection watcher and
    /// re-evaluating immediately
    pub fn set_options(&self, options: ObserverOptions) {
        let mut inner = self.inner.lock().unwrap();
        if !inner.connected {
            return;
        }
        inner.intersection = Some(IntersectionWatcher::new(options));
        inner.watcher_generation += 1;
        let visible = inner
            .intersection
            .as_ref()
            .map(|w| w.evaluate(&inner.rect, &inner.viewport))
            .unwrap_or(false);
        drop(inner);
        self.in_view.set(visible);
    }

    /// Whether the watchers are still attached to an element
    pub fn is_connected(&self) -> bool {
        self.inner.lock().unwrap().connected
    }

    /// How many times the intersection watcher has been rebuilt
    pub fn watcher_generation(&self) -> u64 {
        self.inner.lock().unwrap().watcher_generation
    }
}

/// Handle through which the host pushes layout and viewport updates
///
/// One binding serves both the rect and the visibility tracker. Calling
/// [`ElementBinding::detach`] disconnects both watchers; forgetting to do so
/// on element teardown is a leak, so hosts should tie the detach to element
/// drop.
#[derive(Clone)]
pub struct ElementBinding {
    inner: Arc<Mutex<ObserverInner>>,
    rect: Observed<Rect>,
    in_view: Observed<bool>,
}

impl ElementBinding {
    /// The element's layout changed; update the rect and re-evaluate
    /// visibility
    pub fn layout_changed(&self, top: f32, left: f32, width: f32, height: f32) {
        let mut inner = self.inner.lock().unwrap();
        if !inner.connected {
            return;
        }
        inner.rect.set_layout(top, left, width, height);
        let rect = inner.rect;
        let visible = inner
            .intersection
            .as_ref()
            .map(|w| w.evaluate(&rect, &inner.viewport))
            .unwrap_or(false);
        drop(inner);

        self.rect.set(rect);
        self.in_view.set(visible);
    }

    /// The viewport scrolled or resized; re-evaluate visibility
    pub fn viewport_changed(&self, viewport: Viewport) {
        let mut inner = self.inner.lock().unwrap();
        if !inner.connected {
            return;
        }
        inner.viewport = viewport;
        let visible = inner
            .intersection
            .as_ref()
            .map(|w| w.evaluate(&inner.rect, &viewport))
            .unwrap_or(false);
        drop(inner);

        self.in_view.set(visible);
    }

    /// The element left the tree; disconnect both watchers
    pub fn detach(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.connected = false;
        inner.intersection = None;
        drop(inner);
        self.in_view.set(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use veil_core::reactive::shared_graph;

    fn observer(viewport: Viewport) -> RectObserver {
        RectObserver::new(shared_graph(), viewport, ObserverOptions::default())
    }

    #[test]
    fn rect_derives_edges() {
        let rect = Rect::from_layout(100.0, 50.0, 200.0, 100.0);
        assert_eq!(rect.right, 250.0);
        assert_eq!(rect.bottom, 200.0);
        assert_eq!(rect.x, 50.0);
        assert_eq!(rect.y, 100.0);
    }

    #[test]
    fn layout_updates_flow_to_rect_value() {
        let obs = observer(Viewport::new(1000.0, 800.0));
        let binding = obs.binding();

        binding.layout_changed(100.0, 50.0, 200.0, 100.0);
        let rect = obs.rect().get();
        assert_eq!(rect.top, 100.0);
        assert_eq!(rect.right, 250.0);
    }

    #[test]
    fn in_view_respects_margin() {
        let obs = observer(Viewport::new(1000.0, 800.0));
        let binding = obs.binding();

        // Element just below the viewport but inside the 200px margin
        binding.layout_changed(950.0, 0.0, 100.0, 100.0);
        assert!(obs.is_in_view().get());

        // Well past the margin
        binding.layout_changed(1100.0, 0.0, 100.0, 100.0);
        assert!(!obs.is_in_view().get());

        // Scrolling brings it back within range
        let mut viewport = Viewport::new(1000.0, 800.0);
        viewport.scroll = 200.0;
        binding.viewport_changed(viewport);
        assert!(obs.is_in_view().get());
    }

    #[test]
    fn threshold_requires_overlap_fraction() {
        let obs = RectObserver::new(
            shared_graph(),
            Viewport::new(1000.0, 800.0),
            ObserverOptions {
                margin: 0.0,
                threshold: Some(0.5),
            },
        );
        let binding = obs.binding();

        // Only 100 of 200 px rows inside the viewport: exactly 0.5
        binding.layout_changed(700.0, 0.0, 100.0, 200.0);
        assert!(obs.is_in_view().get());

        // 60 of 200 px rows inside: 0.3 < 0.5
        binding.layout_changed(740.0, 0.0, 100.0, 200.0);
        assert!(!obs.is_in_view().get());
    }

    #[test]
    fn set_options_rebuilds_watcher_and_reevaluates() {
        let obs = observer(Viewport::new(1000.0, 800.0));
        let binding = obs.binding();

        binding.layout_changed(950.0, 0.0, 100.0, 100.0);
        assert!(obs.is_in_view().get());
        assert_eq!(obs.watcher_generation(), 0);

        // Shrinking the margin must take effect immediately
        obs.set_options(ObserverOptions {
            margin: 0.0,
            threshold: None,
        });
        assert_eq!(obs.watcher_generation(), 1);
        assert!(!obs.is_in_view().get());
    }

    #[test]
    fn detach_disconnects_both_watchers() {
        let obs = observer(Viewport::new(1000.0, 800.0));
        let binding = obs.binding();

        binding.layout_changed(100.0, 0.0, 100.0, 100.0);
        assert!(obs.is_in_view().get());

        binding.detach();
        assert!(!obs.is_connected());
        assert!(!obs.is_in_view().get());

        // Updates after detachment are ignored
        let before = obs.rect().get();
        binding.layout_changed(500.0, 0.0, 50.0, 50.0);
        assert_eq!(obs.rect().get(), before);
    }
}
