//! Post-processing stack
//!
//! Effects form an ordered chain over the finished scene texture. The
//! stack owns the ping-pong routing: the first enabled effect reads the
//! scene color target, intermediate effects bounce between two offscreen
//! textures, and the last enabled effect writes the final output. Effect
//! parameters are plain uniform structs; the pipelines that consume them
//! are attached by the host renderer.

use bytemuck::{Pod, Zeroable};

/// Where a pass reads from or writes to within the chain
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Slot {
    /// The resolved scene color target
    Scene,
    /// First intermediate texture
    Ping,
    /// Second intermediate texture
    Pong,
    /// The final presentation target
    Output,
}

/// (source, destination) routing for each enabled effect, in order
///
/// Pure function of the enabled-effect count, so hosts can size their
/// intermediate textures before any encoding happens. Zero effects means
/// the scene target is presented directly and no intermediates are needed.
pub fn chain_plan(enabled: usize) -> Vec<(Slot, Slot)> {
    let mut plan = Vec::with_capacity(enabled);
    let mut source = Slot::Scene;
    for index in 0..enabled {
        let last = index + 1 == enabled;
        let destination = if last {
            Slot::Output
        } else if source == Slot::Ping {
            Slot::Pong
        } else {
            Slot::Ping
        };
        plan.push((source, destination));
        source = destination;
    }
    plan
}

/// Everything an effect needs to record its pass
pub struct EffectFrame<'a> {
    pub device: &'a wgpu::Device,
    pub queue: &'a wgpu::Queue,
    pub encoder: &'a mut wgpu::CommandEncoder,
    pub source: &'a wgpu::TextureView,
    pub destination: &'a wgpu::TextureView,
    pub width: u32,
    pub height: u32,
}

/// A fullscreen pipeline prepared by the host renderer
pub struct FullscreenPass {
    pub pipeline: wgpu::RenderPipeline,
    pub bind_group: wgpu::BindGroup,
}

impl FullscreenPass {
    /// Record a single fullscreen-triangle draw into `frame.destination`
    pub fn encode(&self, frame: &mut EffectFrame<'_>) {
        let mut pass = frame
            .encoder
            .begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("post-effect"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: frame.destination,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.bind_group, &[]);
        pass.draw(0..3, 0..1);
    }
}

/// One link in the post chain
pub trait PostEffect: Send {
    fn name(&self) -> &'static str;

    fn is_enabled(&self) -> bool {
        true
    }

    fn encode(&self, frame: &mut EffectFrame<'_>);
}

/// Shader-side parameters for [`ScreenAntialias`]
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct AntialiasUniforms {
    pub inverse_resolution: [f32; 2],
    pub edge_threshold: f32,
    pub edge_threshold_min: f32,
}

/// Screen-space antialiasing, used when MSAA is off
pub struct ScreenAntialias {
    pub enabled: bool,
    pub edge_threshold: f32,
    pub edge_threshold_min: f32,
    pass: Option<FullscreenPass>,
}

impl ScreenAntialias {
    pub fn new() -> Self {
        Self {
            enabled: true,
            edge_threshold: 0.125,
            edge_threshold_min: 0.0312,
            pass: None,
        }
    }

    pub fn attach_pass(&mut self, pass: FullscreenPass) {
        self.pass = Some(pass);
    }

    pub fn uniforms(&self, width: u32, height: u32) -> AntialiasUniforms {
        AntialiasUniforms {
            inverse_resolution: [1.0 / width.max(1) as f32, 1.0 / height.max(1) as f32],
            edge_threshold: self.edge_threshold,
            edge_threshold_min: self.edge_threshold_min,
        }
    }
}

impl Default for ScreenAntialias {
    fn default() -> Self {
        Self::new()
    }
}

impl PostEffect for ScreenAntialias {
    fn name(&self) -> &'static str {
        "screen-antialias"
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn encode(&self, frame: &mut EffectFrame<'_>) {
        match &self.pass {
            Some(pass) => pass.encode(frame),
            None => tracing::trace!(effect = self.name(), "no pipeline attached; pass skipped"),
        }
    }
}

/// Shader-side parameters for [`Vignette`]
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct VignetteUniforms {
    pub intensity: f32,
    pub smoothness: f32,
    pub _pad: [f32; 2],
}

/// Darkened-corners vignette
pub struct Vignette {
    pub enabled: bool,
    pub intensity: f32,
    pub smoothness: f32,
    pass: Option<FullscreenPass>,
}

impl Vignette {
    pub fn new(intensity: f32) -> Self {
        Self {
            enabled: true,
            intensity,
            smoothness: 0.5,
            pass: None,
        }
    }

    pub fn attach_pass(&mut self, pass: FullscreenPass) {
        self.pass = Some(pass);
    }

    pub fn uniforms(&self) -> VignetteUniforms {
        VignetteUniforms {
            intensity: self.intensity,
            smoothness: self.smoothness,
            _pad: [0.0; 2],
        }
    }
}

impl PostEffect for Vignette {
    fn name(&self) -> &'static str {
        "vignette"
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn encode(&self, frame: &mut EffectFrame<'_>) {
        match &self.pass {
            Some(pass) => pass.encode(frame),
            None => tracing::trace!(effect = self.name(), "no pipeline attached; pass skipped"),
        }
    }
}

/// Ordered chain of post effects
pub struct PostStack {
    effects: Vec<Box<dyn PostEffect>>,
}

impl PostStack {
    pub fn new() -> Self {
        Self {
            effects: Vec::new(),
        }
    }

    pub fn push(&mut self, effect: Box<dyn PostEffect>) {
        self.effects.push(effect);
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    /// Count of effects that will actually run this frame
    pub fn enabled_count(&self) -> usize {
        self.effects.iter().filter(|e| e.is_enabled()).count()
    }

    /// Whether the scene can be presented directly, skipping the chain
    pub fn is_passthrough(&self) -> bool {
        self.enabled_count() == 0
    }

    fn view_for<'a>(slot: Slot, targets: &ChainTargets<'a>) -> &'a wgpu::TextureView {
        match slot {
            Slot::Scene => targets.scene,
            Slot::Ping => targets.ping,
            Slot::Pong => targets.pong,
            Slot::Output => targets.output,
        }
    }

    /// Record every enabled effect into `encoder`, routed per [`chain_plan`]
    pub fn encode(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        targets: ChainTargets<'_>,
        width: u32,
        height: u32,
    ) {
        let plan = chain_plan(self.enabled_count());
        let mut passes = plan.iter();
        for effect in self.effects.iter().filter(|e| e.is_enabled()) {
            let Some(&(source, destination)) = passes.next() else {
                break;
            };
            let mut frame = EffectFrame {
                device,
                queue,
                encoder,
                source: Self::view_for(source, &targets),
                destination: Self::view_for(destination, &targets),
                width,
                height,
            };
            effect.encode(&mut frame);
        }
    }
}

impl Default for PostStack {
    fn default() -> Self {
        Self::new()
    }
}

/// The four textures a chain may touch
pub struct ChainTargets<'a> {
    pub scene: &'a wgpu::TextureView,
    pub ping: &'a wgpu::TextureView,
    pub pong: &'a wgpu::TextureView,
    pub output: &'a wgpu::TextureView,
}
