//! Frame driver
//!
//! One callback list, four fixed stages. Simulation always runs before the
//! scene draws, post-processing reads the finished scene, and the overlay
//! composites last. Within a stage, callbacks run in registration order.
//!
//! A panicking callback is caught, logged, and skipped for that frame; the
//! rest of the frame still runs. One broken animation must not take the
//! whole canvas down.

use std::panic::{catch_unwind, AssertUnwindSafe};

/// Fixed per-frame stages, in execution order
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FrameStage {
    /// Animation and physics ticks
    Simulation,
    /// Main scene render
    Scene,
    /// Post-processing over the finished scene
    PostProcess,
    /// UI overlay composited on top
    Overlay,
}

/// Per-frame timing handed to every callback
#[derive(Clone, Copy, Debug)]
pub struct FrameContext {
    /// Seconds since the previous frame
    pub dt: f32,
    /// Seconds since the driver started
    pub elapsed: f32,
    /// Monotonic frame counter
    pub frame: u64,
}

/// Handle for unregistering a frame callback
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CallbackId(u64);

struct StageCallback {
    id: CallbackId,
    stage: FrameStage,
    seq: u64,
    name: &'static str,
    run: Box<dyn FnMut(&FrameContext) + Send>,
}

/// Ordered frame-callback registry
pub struct FrameDriver {
    callbacks: Vec<StageCallback>,
    next_id: u64,
    elapsed: f32,
    frame: u64,
}

impl FrameDriver {
    pub fn new() -> Self {
        Self {
            callbacks: Vec::new(),
            next_id: 0,
            elapsed: 0.0,
            frame: 0,
        }
    }

    /// Register a callback for `stage`; `name` shows up in panic logs
    pub fn register<F>(&mut self, stage: FrameStage, name: &'static str, run: F) -> CallbackId
    where
        F: FnMut(&FrameContext) + Send + 'static,
    {
        let id = CallbackId(self.next_id);
        let seq = self.next_id;
        self.next_id += 1;
        self.callbacks.push(StageCallback {
            id,
            stage,
            seq,
            name,
            run: Box::new(run),
        });
        // Stable order: stage first, registration order within a stage
        self.callbacks.sort_by_key(|cb| (cb.stage, cb.seq));
        id
    }

    pub fn unregister(&mut self, id: CallbackId) {
        self.callbacks.retain(|cb| cb.id != id);
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Run one frame through all stages
    pub fn advance(&mut self, dt: f32) {
        self.elapsed += dt;
        self.frame += 1;
        let ctx = FrameContext {
            dt,
            elapsed: self.elapsed,
            frame: self.frame,
        };
        for cb in &mut self.callbacks {
            let result = catch_unwind(AssertUnwindSafe(|| (cb.run)(&ctx)));
            if result.is_err() {
                tracing::error!(
                    stage = ?cb.stage,
                    callback = cb.name,
                    frame = ctx.frame,
                    "frame callback panicked; skipping for this frame"
                );
            }
        }
    }
}

impl Default for FrameDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn recorder(log: &Arc<Mutex<Vec<&'static str>>>, tag: &'static str) -> impl FnMut(&FrameContext) + Send {
        let log = log.clone();
        move |_| log.lock().unwrap().push(tag)
    }

    #[test]
    fn stages_run_in_fixed_order_regardless_of_registration() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut driver = FrameDriver::new();

        driver.register(FrameStage::Overlay, "overlay", recorder(&log, "overlay"));
        driver.register(FrameStage::Simulation, "sim", recorder(&log, "sim"));
        driver.register(FrameStage::PostProcess, "post", recorder(&log, "post"));
        driver.register(FrameStage::Scene, "scene", recorder(&log, "scene"));

        driver.advance(0.016);
        assert_eq!(*log.lock().unwrap(), vec!["sim", "scene", "post", "overlay"]);
    }

    #[test]
    fn same_stage_runs_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut driver = FrameDriver::new();

        driver.register(FrameStage::Simulation, "a", recorder(&log, "a"));
        driver.register(FrameStage::Simulation, "b", recorder(&log, "b"));
        driver.register(FrameStage::Simulation, "c", recorder(&log, "c"));

        driver.advance(0.016);
        assert_eq!(*log.lock().unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn panicking_callback_does_not_stop_the_frame() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut driver = FrameDriver::new();

        driver.register(FrameStage::Simulation, "before", recorder(&log, "before"));
        driver.register(FrameStage::Scene, "boom", |_| panic!("broken animation"));
        driver.register(FrameStage::Overlay, "after", recorder(&log, "after"));

        driver.advance(0.016);
        driver.advance(0.016);

        assert_eq!(
            *log.lock().unwrap(),
            vec!["before", "after", "before", "after"]
        );
        assert_eq!(driver.frame(), 2);
    }

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for LogBuffer {
        type Writer = LogBuffer;

        fn make_writer(&'a self) -> LogBuffer {
            self.clone()
        }
    }

    #[test]
    fn panic_is_reported_at_error_level() {
        let logs = LogBuffer::default();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::ERROR)
            .with_writer(logs.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            let mut driver = FrameDriver::new();
            driver.register(FrameStage::Scene, "broken-animation", |_| panic!("boom"));
            driver.advance(0.016);
        });

        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("frame callback panicked"));
        assert!(output.contains("broken-animation"));
    }

    #[test]
    fn unregister_removes_the_callback() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut driver = FrameDriver::new();

        let id = driver.register(FrameStage::Scene, "scene", recorder(&log, "scene"));
        driver.advance(0.016);
        driver.unregister(id);
        driver.advance(0.016);

        assert_eq!(log.lock().unwrap().len(), 1);
        assert!(driver.is_empty());
    }

    #[test]
    fn context_accumulates_time_and_frames() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut driver = FrameDriver::new();
        {
            let seen = seen.clone();
            driver.register(FrameStage::Simulation, "probe", move |ctx| {
                seen.lock().unwrap().push((ctx.frame, ctx.elapsed));
            });
        }

        driver.advance(0.5);
        driver.advance(0.25);

        let seen = seen.lock().unwrap();
        assert_eq!(seen[0].0, 1);
        assert_eq!(seen[1].0, 2);
        assert!((seen[1].1 - 0.75).abs() < 1e-6);
    }
}
