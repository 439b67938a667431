//! Canvas runtime
//!
//! The long-lived owner of the rendering surface. It selects a backend
//! once, drives frames while the bridge is active, pauses without
//! releasing anything while it is not, and tears everything down exactly
//! once on disposal. Disposal is terminal; a disposed runtime refuses all
//! further work.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use veil_bridge::activation::ActivationStore;
use veil_core::store::Unsubscriber;

use crate::backend::{self, BackendKind, SelectedBackend};
use crate::error::CanvasError;
use crate::frame::FrameDriver;
use crate::post::PostStack;

/// Lifecycle phases of a canvas runtime
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RuntimePhase {
    Uninitialized,
    SelectingBackend,
    /// Backend resolved, not yet rendering
    Ready,
    Rendering,
    Paused,
    /// Terminal
    Disposed,
}

/// MSAA selection strategy
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AntialiasPolicy {
    /// MSAA off on high-dpi displays and whenever post-processing runs,
    /// 4x otherwise
    Auto,
    /// Fixed sample count
    Msaa(u32),
    Off,
}

/// GPU power preference, mirrored from the adapter request
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerPolicy {
    #[default]
    HighPerformance,
    LowPower,
}

impl PowerPolicy {
    fn to_wgpu(self) -> wgpu::PowerPreference {
        match self {
            PowerPolicy::HighPerformance => wgpu::PowerPreference::HighPerformance,
            PowerPolicy::LowPower => wgpu::PowerPreference::LowPower,
        }
    }
}

/// Host-tunable canvas settings
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasConfig {
    /// Run the post-processing chain each frame
    pub post_processing: bool,
    /// Skip the modern probe and go straight to GL
    pub force_legacy: bool,
    /// Transparent canvas composited over host content
    pub alpha: bool,
    pub antialias: AntialiasPolicy,
    /// Frames still tick but nothing is presented when false
    pub render_enabled: bool,
    /// Quiet period before a staged resize is applied
    pub resize_debounce_ms: u64,
    pub power: PowerPolicy,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            post_processing: false,
            force_legacy: false,
            alpha: true,
            antialias: AntialiasPolicy::Auto,
            render_enabled: true,
            resize_debounce_ms: 500,
            power: PowerPolicy::default(),
        }
    }
}

/// Resolve the MSAA sample count for a display
///
/// High-dpi output already supersamples at the physical-pixel level, and
/// post-processing reads a resolved texture anyway, so both force MSAA
/// off under the auto policy.
pub fn sample_count(policy: AntialiasPolicy, post_processing: bool, device_pixel_ratio: f32) -> u32 {
    match policy {
        AntialiasPolicy::Off => 1,
        AntialiasPolicy::Msaa(samples) => samples.max(1),
        AntialiasPolicy::Auto => {
            if device_pixel_ratio >= 2.0 || post_processing {
                1
            } else {
                4
            }
        }
    }
}

/// Persistent rendering runtime behind the bridge
pub struct CanvasRuntime {
    phase: RuntimePhase,
    config: CanvasConfig,
    backend: Option<SelectedBackend>,
    device: Option<wgpu::Device>,
    queue: Option<wgpu::Queue>,
    size: (u32, u32),
    device_pixel_ratio: f32,
    pending_resize: Option<(u32, u32, Instant)>,
    driver: FrameDriver,
    post: PostStack,
}

impl CanvasRuntime {
    pub fn new(config: CanvasConfig) -> Self {
        Self {
            phase: RuntimePhase::Uninitialized,
            config,
            backend: None,
            device: None,
            queue: None,
            size: (0, 0),
            device_pixel_ratio: 1.0,
            pending_resize: None,
            driver: FrameDriver::new(),
            post: PostStack::new(),
        }
    }

    /// A runtime in [`RuntimePhase::Ready`] with no GPU behind it
    ///
    /// Used when backend selection failed and the host chose to keep the
    /// page alive with a blank canvas. Frames tick, nothing is drawn.
    pub fn headless(config: CanvasConfig) -> Self {
        let mut runtime = Self::new(config);
        runtime.phase = RuntimePhase::Ready;
        runtime
    }

    /// Probe a backend and acquire a device
    ///
    /// Runs once; calling it from any phase other than
    /// [`RuntimePhase::Uninitialized`] is an error.
    pub fn initialize(&mut self) -> Result<(), CanvasError> {
        if self.phase != RuntimePhase::Uninitialized {
            return Err(self.wrong_phase(RuntimePhase::Uninitialized));
        }
        self.phase = RuntimePhase::SelectingBackend;

        let selected = match backend::probe(self.config.force_legacy, self.config.power.to_wgpu()) {
            Ok(selected) => selected,
            Err(err) => {
                // Stay alive with no device; the host decides what to show
                self.phase = RuntimePhase::Ready;
                return Err(err);
            }
        };

        let (device, queue) = pollster::block_on(selected.adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("veil-canvas"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_webgl2_defaults()
                    .using_resolution(selected.adapter.limits()),
                memory_hints: wgpu::MemoryHints::default(),
            },
            None,
        ))?;

        self.backend = Some(selected);
        self.device = Some(device);
        self.queue = Some(queue);
        self.phase = RuntimePhase::Ready;
        Ok(())
    }

    pub fn phase(&self) -> RuntimePhase {
        self.phase
    }

    pub fn backend_kind(&self) -> Option<BackendKind> {
        self.backend.as_ref().map(|b| b.kind)
    }

    pub fn has_device(&self) -> bool {
        self.device.is_some()
    }

    pub fn config(&self) -> &CanvasConfig {
        &self.config
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    pub fn device_pixel_ratio(&self) -> f32 {
        self.device_pixel_ratio
    }

    pub fn set_device_pixel_ratio(&mut self, ratio: f32) {
        self.device_pixel_ratio = ratio;
    }

    /// Sample count for this runtime's current display settings
    pub fn sample_count(&self) -> u32 {
        sample_count(
            self.config.antialias,
            self.config.post_processing,
            self.device_pixel_ratio,
        )
    }

    pub fn driver_mut(&mut self) -> &mut FrameDriver {
        &mut self.driver
    }

    pub fn post_mut(&mut self) -> &mut PostStack {
        &mut self.post
    }

    pub fn post(&self) -> &PostStack {
        &self.post
    }

    /// Start or stop rendering as bridge activation changes
    ///
    /// Pausing keeps the device, surface, and every registered callback;
    /// resuming is instant. No-op before initialization and after
    /// disposal.
    pub fn set_active(&mut self, active: bool) {
        self.phase = match (self.phase, active) {
            (RuntimePhase::Ready, true) | (RuntimePhase::Paused, true) => RuntimePhase::Rendering,
            (RuntimePhase::Rendering, false) => RuntimePhase::Paused,
            (phase, _) => phase,
        };
    }

    /// Stage a resize; it is applied after the debounce window elapses
    pub fn request_resize(&mut self, width: u32, height: u32) {
        self.stage_resize(width, height, Instant::now());
    }

    fn stage_resize(&mut self, width: u32, height: u32, now: Instant) {
        if self.phase == RuntimePhase::Disposed {
            return;
        }
        self.pending_resize = Some((width, height, now));
    }

    fn apply_pending_resize(&mut self, now: Instant) {
        let Some((width, height, staged_at)) = self.pending_resize else {
            return;
        };
        let debounce = Duration::from_millis(self.config.resize_debounce_ms);
        if now.duration_since(staged_at) < debounce {
            return;
        }
        self.pending_resize = None;
        if (width, height) != self.size {
            tracing::debug!(width, height, "applying debounced resize");
            self.size = (width, height);
        }
    }

    /// Tick one frame
    ///
    /// Applies any matured resize first. Frames only run while the phase
    /// is [`RuntimePhase::Rendering`] and rendering is enabled.
    pub fn advance(&mut self, dt: f32) {
        self.tick(Instant::now(), dt);
    }

    pub(crate) fn tick(&mut self, now: Instant, dt: f32) {
        if self.phase == RuntimePhase::Disposed {
            return;
        }
        self.apply_pending_resize(now);
        if self.phase == RuntimePhase::Rendering && self.config.render_enabled {
            self.driver.advance(dt);
        }
    }

    /// Release the device and enter the terminal phase
    ///
    /// Idempotent. Everything GPU-side is dropped; the runtime accepts no
    /// further frames, resizes, or activation changes.
    pub fn dispose(&mut self) {
        if self.phase == RuntimePhase::Disposed {
            return;
        }
        tracing::info!(frames = self.driver.frame(), "disposing canvas runtime");
        self.queue = None;
        self.device = None;
        self.backend = None;
        self.pending_resize = None;
        self.phase = RuntimePhase::Disposed;
    }

    fn wrong_phase(&self, required: RuntimePhase) -> CanvasError {
        if self.phase == RuntimePhase::Disposed {
            CanvasError::Disposed
        } else {
            CanvasError::WrongPhase {
                required,
                actual: self.phase,
            }
        }
    }
}

/// Drive a runtime's pause state from the bridge activation store
///
/// The runtime renders exactly while a bridged page is mounted. The
/// returned [`Unsubscriber`] detaches the link without touching either
/// side.
pub fn attach_activation(
    runtime: Arc<Mutex<CanvasRuntime>>,
    store: &ActivationStore,
) -> Unsubscriber {
    // Align with the current state before listening for changes
    {
        let snapshot = store.snapshot();
        runtime.lock().unwrap().set_active(snapshot.is_active());
    }
    store.subscribe(move |state| {
        runtime.lock().unwrap().set_active(state.is_active());
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameStage;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use veil_bridge::activation::{ActivationEvent, ActivationStore};

    fn counting_runtime() -> (CanvasRuntime, Arc<AtomicUsize>) {
        let mut runtime = CanvasRuntime::headless(CanvasConfig::default());
        let frames = Arc::new(AtomicUsize::new(0));
        {
            let frames = frames.clone();
            runtime.driver_mut().register(FrameStage::Scene, "count", move |_| {
                frames.fetch_add(1, Ordering::SeqCst);
            });
        }
        (runtime, frames)
    }

    #[test]
    fn auto_msaa_policy() {
        assert_eq!(sample_count(AntialiasPolicy::Auto, false, 1.0), 4);
        assert_eq!(sample_count(AntialiasPolicy::Auto, false, 2.0), 1);
        assert_eq!(sample_count(AntialiasPolicy::Auto, true, 1.0), 1);
        assert_eq!(sample_count(AntialiasPolicy::Msaa(8), true, 2.0), 8);
        assert_eq!(sample_count(AntialiasPolicy::Msaa(0), false, 1.0), 1);
        assert_eq!(sample_count(AntialiasPolicy::Off, false, 1.0), 1);
    }

    #[test]
    fn frames_run_only_while_rendering() {
        let (mut runtime, frames) = counting_runtime();

        runtime.advance(0.016);
        assert_eq!(frames.load(Ordering::SeqCst), 0);

        runtime.set_active(true);
        assert_eq!(runtime.phase(), RuntimePhase::Rendering);
        runtime.advance(0.016);
        runtime.advance(0.016);
        assert_eq!(frames.load(Ordering::SeqCst), 2);

        runtime.set_active(false);
        assert_eq!(runtime.phase(), RuntimePhase::Paused);
        runtime.advance(0.016);
        assert_eq!(frames.load(Ordering::SeqCst), 2);

        // Resuming keeps everything that was registered
        runtime.set_active(true);
        runtime.advance(0.016);
        assert_eq!(frames.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn render_enabled_false_suppresses_frames() {
        let mut runtime = CanvasRuntime::headless(CanvasConfig {
            render_enabled: false,
            ..Default::default()
        });
        let frames = Arc::new(AtomicUsize::new(0));
        {
            let frames = frames.clone();
            runtime.driver_mut().register(FrameStage::Scene, "count", move |_| {
                frames.fetch_add(1, Ordering::SeqCst);
            });
        }
        runtime.set_active(true);
        runtime.advance(0.016);
        assert_eq!(frames.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn resize_waits_out_the_debounce_window() {
        let mut runtime = CanvasRuntime::headless(CanvasConfig::default());
        runtime.set_active(true);

        let start = Instant::now();
        runtime.stage_resize(800, 600, start);

        runtime.tick(start + Duration::from_millis(100), 0.016);
        assert_eq!(runtime.size(), (0, 0));

        // A fresh event during the window restarts the clock
        runtime.stage_resize(1024, 768, start + Duration::from_millis(400));
        runtime.tick(start + Duration::from_millis(700), 0.016);
        assert_eq!(runtime.size(), (0, 0));

        runtime.tick(start + Duration::from_millis(950), 0.016);
        assert_eq!(runtime.size(), (1024, 768));
    }

    #[test]
    fn dispose_is_terminal_and_idempotent() {
        let (mut runtime, frames) = counting_runtime();
        runtime.set_active(true);
        runtime.advance(0.016);

        runtime.dispose();
        runtime.dispose();
        assert_eq!(runtime.phase(), RuntimePhase::Disposed);
        assert!(!runtime.has_device());

        runtime.set_active(true);
        runtime.advance(0.016);
        runtime.request_resize(640, 480);
        assert_eq!(runtime.phase(), RuntimePhase::Disposed);
        assert_eq!(frames.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn initialize_rejects_wrong_phase() {
        let mut runtime = CanvasRuntime::headless(CanvasConfig::default());
        match runtime.initialize() {
            Err(CanvasError::WrongPhase { actual, .. }) => {
                assert_eq!(actual, RuntimePhase::Ready)
            }
            other => panic!("expected WrongPhase, got {other:?}"),
        }
    }

    #[test]
    fn activation_store_drives_pause_state() {
        let store = ActivationStore::isolated();
        let runtime = Arc::new(Mutex::new(CanvasRuntime::headless(CanvasConfig::default())));

        let _link = attach_activation(runtime.clone(), &store);
        assert_eq!(runtime.lock().unwrap().phase(), RuntimePhase::Ready);

        store.transition(ActivationEvent::PageMounted);
        assert_eq!(runtime.lock().unwrap().phase(), RuntimePhase::Rendering);

        store.transition(ActivationEvent::PageUnmounted);
        assert_eq!(runtime.lock().unwrap().phase(), RuntimePhase::Paused);

        store.transition(ActivationEvent::PageMounted);
        assert_eq!(runtime.lock().unwrap().phase(), RuntimePhase::Rendering);
    }

    #[test]
    fn config_round_trips_through_serde() {
        let config = CanvasConfig {
            post_processing: true,
            antialias: AntialiasPolicy::Msaa(4),
            resize_debounce_ms: 250,
            ..Default::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let back: CanvasConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.antialias, AntialiasPolicy::Msaa(4));
        assert_eq!(back.resize_debounce_ms, 250);
        assert!(back.post_processing);
    }
}
