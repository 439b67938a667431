//! Fine-grained reactive signal system
//!
//! A push-pull reactive graph: signals push invalidation to subscribed
//! effects, effects re-run from a pending queue. Writes made inside a batch
//! flush effects once at batch end, which is what keeps per-frame consumers
//! (transform sync, visibility flags) from recomputing more than once per
//! trigger.
//!
//! The graph itself is single-threaded; [`Observed<T>`] wraps a signal with
//! a shared handle to the graph for use at component seams.

use slotmap::{new_key_type, SlotMap};
use smallvec::SmallVec;
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

new_key_type! {
    /// Unique identifier for a signal
    pub struct SignalId;
    /// Unique identifier for an effect
    pub struct EffectId;
}

/// A reactive signal handle (cheap to copy)
#[derive(Debug)]
pub struct Signal<T> {
    id: SignalId,
    _marker: std::marker::PhantomData<T>,
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Signal<T> {}

impl<T> Signal<T> {
    pub fn id(&self) -> SignalId {
        self.id
    }
}

/// An effect handle
#[derive(Debug, Clone, Copy)]
pub struct Effect {
    id: EffectId,
}

impl Effect {
    pub fn id(&self) -> EffectId {
        self.id
    }
}

struct SignalNode {
    /// The signal value (type-erased)
    value: Box<dyn Any + Send>,
    /// Version counter for change detection
    version: u64,
    /// Effects to notify on change
    subscribers: SmallVec<[EffectId; 4]>,
}

struct EffectNode {
    /// The effect function; taken out of the node while running so the
    /// graph can be borrowed by the closure without aliasing
    run: Option<Box<dyn FnMut(&SignalGraph) + Send>>,
    /// Signals this effect read during its last run
    dependencies: SmallVec<[SignalId; 4]>,
    /// Whether the effect is queued to run
    dirty: Cell<bool>,
}

/// The reactive graph that manages all signals and effects
pub struct SignalGraph {
    signals: SlotMap<SignalId, SignalNode>,
    effects: SlotMap<EffectId, EffectNode>,
    /// Effects waiting to run
    pending: RefCell<VecDeque<EffectId>>,
    /// > 0 while inside a batch
    batch_depth: Cell<u32>,
    /// Dependency accumulator while an effect runs
    tracking: RefCell<Option<Vec<SignalId>>>,
}

impl SignalGraph {
    pub fn new() -> Self {
        Self {
            signals: SlotMap::with_key(),
            effects: SlotMap::with_key(),
            pending: RefCell::new(VecDeque::new()),
            batch_depth: Cell::new(0),
            tracking: RefCell::new(None),
        }
    }

    /// Create a new signal with an initial value
    pub fn create_signal<T: Send + 'static>(&mut self, initial: T) -> Signal<T> {
        let id = self.signals.insert(SignalNode {
            value: Box::new(initial),
            version: 0,
            subscribers: SmallVec::new(),
        });
        Signal {
            id,
            _marker: std::marker::PhantomData,
        }
    }

    /// Get the current value of a signal
    ///
    /// If called while an effect is running, the signal is recorded as a
    /// dependency of that effect.
    pub fn get<T: Clone + 'static>(&self, signal: Signal<T>) -> Option<T> {
        if let Some(ref mut deps) = *self.tracking.borrow_mut() {
            if !deps.contains(&signal.id) {
                deps.push(signal.id);
            }
        }
        self.signals
            .get(signal.id)
            .and_then(|node| node.value.downcast_ref::<T>().cloned())
    }

    /// Get the current value without recording a dependency
    pub fn get_untracked<T: Clone + 'static>(&self, signal: Signal<T>) -> Option<T> {
        self.signals
            .get(signal.id)
            .and_then(|node| node.value.downcast_ref::<T>().cloned())
    }

    /// Set the value of a signal, scheduling subscribed effects
    pub fn set<T: Send + 'static>(&mut self, signal: Signal<T>, value: T) {
        let Some(node) = self.signals.get_mut(signal.id) else {
            return;
        };
        node.value = Box::new(value);
        node.version += 1;

        let subscribers: SmallVec<[EffectId; 4]> = node.subscribers.clone();
        for id in subscribers {
            self.schedule_effect(id);
        }

        if self.batch_depth.get() == 0 {
            self.flush();
        }
    }

    /// Update a signal using a function
    pub fn update<T: Clone + Send + 'static, F: FnOnce(T) -> T>(
        &mut self,
        signal: Signal<T>,
        f: F,
    ) {
        if let Some(current) = self.get_untracked(signal) {
            self.set(signal, f(current));
        }
    }

    /// Get the version of a signal (for change detection)
    pub fn version(&self, id: SignalId) -> Option<u64> {
        self.signals.get(id).map(|n| n.version)
    }

    /// Create an effect that runs immediately and again whenever any signal
    /// it read changes
    pub fn create_effect<F>(&mut self, run: F) -> Effect
    where
        F: FnMut(&SignalGraph) + Send + 'static,
    {
        let id = self.effects.insert(EffectNode {
            run: Some(Box::new(run)),
            dependencies: SmallVec::new(),
            dirty: Cell::new(true),
        });
        self.pending.borrow_mut().push_back(id);

        if self.batch_depth.get() == 0 {
            self.flush();
        }
        Effect { id }
    }

    /// Dispose of an effect, unsubscribing it from all dependencies
    pub fn dispose_effect(&mut self, effect: Effect) {
        if let Some(node) = self.effects.remove(effect.id) {
            tracing::trace!(
                effect = ?effect.id,
                dependencies = node.dependencies.len(),
                "disposing effect"
            );
            for &dep in &node.dependencies {
                if let Some(sig) = self.signals.get_mut(dep) {
                    sig.subscribers.retain(|s| *s != effect.id);
                }
            }
        }
    }

    /// Start a batch; effects are deferred until the outermost batch ends
    pub fn batch_start(&self) {
        self.batch_depth.set(self.batch_depth.get() + 1);
    }

    /// End a batch, flushing pending effects if this was the outermost one
    pub fn batch_end(&mut self) {
        let depth = self.batch_depth.get();
        if depth > 0 {
            self.batch_depth.set(depth - 1);
            if depth == 1 {
                self.flush();
            }
        }
    }

    /// Run a function in a batch context
    pub fn batch<F, R>(&mut self, f: F) -> R
    where
        F: FnOnce(&mut Self) -> R,
    {
        self.batch_start();
        let result = f(self);
        self.batch_end();
        result
    }

    fn schedule_effect(&mut self, id: EffectId) {
        if let Some(node) = self.effects.get(id) {
            if !node.dirty.get() {
                node.dirty.set(true);
                self.pending.borrow_mut().push_back(id);
            }
        }
    }

    fn flush(&mut self) {
        // Effects scheduled while flushing are picked up in the same pass
        loop {
            let next = self.pending.borrow_mut().pop_front();
            match next {
                Some(id) => self.run_effect(id),
                None => break,
            }
        }
    }

    fn run_effect(&mut self, effect_id: EffectId) {
        let mut run = {
            let Some(node) = self.effects.get_mut(effect_id) else {
                return;
            };
            if !node.dirty.get() {
                return;
            }
            node.dirty.set(false);
            match node.run.take() {
                Some(run) => run,
                // Re-entrant schedule while already running; skip
                None => return,
            }
        };

        self.tracking.replace(Some(Vec::new()));
        run(self);
        let deps = self.tracking.take().unwrap_or_default();

        if let Some(node) = self.effects.get_mut(effect_id) {
            node.run = Some(run);

            for &dep in &node.dependencies {
                if let Some(sig) = self.signals.get_mut(dep) {
                    sig.subscribers.retain(|s| *s != effect_id);
                }
            }
            for &dep in &deps {
                if let Some(sig) = self.signals.get_mut(dep) {
                    if !sig.subscribers.contains(&effect_id) {
                        sig.subscribers.push(effect_id);
                    }
                }
            }
            node.dependencies = deps.into_iter().collect();
        }
    }
}

impl Default for SignalGraph {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared signal graph for use across component seams
pub type SharedSignalGraph = Arc<Mutex<SignalGraph>>;

/// Create a new shared signal graph
pub fn shared_graph() -> SharedSignalGraph {
    Arc::new(Mutex::new(SignalGraph::new()))
}

/// A signal bound to its graph, with direct get/set methods
///
/// This is the form in which reactive values cross crate boundaries: the
/// rect observer hands out `Observed<Rect>` and `Observed<bool>`, per-frame
/// consumers read them without holding the graph themselves.
#[derive(Clone)]
pub struct Observed<T> {
    signal: Signal<T>,
    graph: SharedSignalGraph,
}

impl<T: Clone + Send + 'static> Observed<T> {
    /// Create a new observed value on the given graph
    pub fn new(graph: SharedSignalGraph, initial: T) -> Self {
        let signal = graph.lock().unwrap().create_signal(initial);
        Self { signal, graph }
    }

    /// Get the current value
    pub fn get(&self) -> T
    where
        T: Default,
    {
        self.graph
            .lock()
            .unwrap()
            .get_untracked(self.signal)
            .unwrap_or_default()
    }

    /// Get the current value, or `None` if the signal was removed
    pub fn try_get(&self) -> Option<T> {
        self.graph.lock().unwrap().get_untracked(self.signal)
    }

    /// Set a new value, scheduling subscribed effects
    pub fn set(&self, value: T) {
        self.graph.lock().unwrap().set(self.signal, value);
    }

    /// Update the value in place
    pub fn update(&self, f: impl FnOnce(&mut T))
    where
        T: Default,
    {
        let mut value = self.get();
        f(&mut value);
        self.set(value);
    }

    /// The underlying signal handle
    pub fn signal(&self) -> Signal<T> {
        self.signal
    }

    /// The graph this value lives on
    pub fn graph(&self) -> &SharedSignalGraph {
        &self.graph
    }
}
