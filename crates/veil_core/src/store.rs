//! Global store registry
//!
//! Process-wide singleton state that lives outside the reactive graph.
//! Stores are created lazily, cached for the lifetime of the process, and
//! never torn down: this is where state that must survive page navigations
//! belongs (most importantly the canvas activation state, which resets only
//! on a full reload).
//!
//! Unlike reactive signals, store writes notify subscribers synchronously
//! and do not participate in dependency tracking.

use rustc_hash::FxHashMap;
use std::any::{Any, TypeId};
use std::sync::{Arc, Mutex, RwLock};

type Subscriber<T> = Box<dyn Fn(&T) + Send + Sync>;

/// A typed store holding a single value with change subscriptions
pub struct Store<T: Clone + Send + Sync + 'static> {
    value: RwLock<T>,
    subscribers: RwLock<Vec<(u64, Subscriber<T>)>>,
    next_token: Mutex<u64>,
}

impl<T: Clone + Send + Sync + 'static> Store<T> {
    pub fn new(initial: T) -> Self {
        Self {
            value: RwLock::new(initial),
            subscribers: RwLock::new(Vec::new()),
            next_token: Mutex::new(0),
        }
    }

    /// Get a clone of the current value
    pub fn get(&self) -> T {
        self.value.read().unwrap().clone()
    }

    /// Replace the value and notify subscribers
    pub fn set(&self, value: T) {
        {
            let mut guard = self.value.write().unwrap();
            *guard = value;
        }
        self.notify();
    }

    /// Update the value through a closure and notify subscribers
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut T),
    {
        {
            let mut guard = self.value.write().unwrap();
            f(&mut guard);
        }
        self.notify();
    }

    /// Update the value and return something computed from it
    pub fn update_with<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut T) -> R,
    {
        let result = {
            let mut guard = self.value.write().unwrap();
            f(&mut guard)
        };
        self.notify();
        result
    }

    /// Subscribe to changes; the returned handle unsubscribes when used
    pub fn subscribe<F>(&self, callback: F) -> Unsubscriber
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let token = {
            let mut next = self.next_token.lock().unwrap();
            *next += 1;
            *next
        };
        self.subscribers
            .write()
            .unwrap()
            .push((token, Box::new(callback)));
        Unsubscriber { token }
    }

    /// Remove a subscription
    pub fn unsubscribe(&self, handle: Unsubscriber) {
        self.subscribers
            .write()
            .unwrap()
            .retain(|(token, _)| *token != handle.token);
    }

    fn notify(&self) {
        let value = self.value.read().unwrap().clone();
        let subscribers = self.subscribers.read().unwrap();
        for (_, callback) in subscribers.iter() {
            callback(&value);
        }
    }
}

/// Token identifying a store subscription
#[derive(Debug)]
pub struct Unsubscriber {
    token: u64,
}

/// Registry of global stores keyed by type and name
static REGISTRY: std::sync::LazyLock<
    Mutex<FxHashMap<(TypeId, &'static str), Arc<dyn Any + Send + Sync>>>,
> = std::sync::LazyLock::new(|| Mutex::new(FxHashMap::default()));

/// Get or create the global store for a type and name
///
/// The first caller creates the store from `T::default()`; every later
/// caller receives the same instance. Stores live until process exit.
pub fn global_store<T: Clone + Send + Sync + Default + 'static>(
    name: &'static str,
) -> Arc<Store<T>> {
    let key = (TypeId::of::<T>(), name);
    let mut registry = REGISTRY.lock().unwrap();

    if let Some(store) = registry.get(&key) {
        if let Ok(typed) = store.clone().downcast::<Store<T>>() {
            return typed;
        }
    }

    tracing::debug!(
        name,
        value_type = std::any::type_name::<T>(),
        "creating global store"
    );
    let store = Arc::new(Store::<T>::new(T::default()));
    registry.insert(key, store.clone() as Arc<dyn Any + Send + Sync>);
    store
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone, Default, Debug, PartialEq)]
    struct Counter {
        value: i32,
    }

    #[test]
    fn store_get_set_update() {
        let store = Store::new(Counter { value: 0 });

        store.set(Counter { value: 42 });
        assert_eq!(store.get().value, 42);

        store.update(|c| c.value += 8);
        assert_eq!(store.get().value, 50);

        let old = store.update_with(|c| {
            let old = c.value;
            c.value = 0;
            old
        });
        assert_eq!(old, 50);
        assert_eq!(store.get().value, 0);
    }

    #[test]
    fn store_subscribe_and_unsubscribe() {
        let store = Store::new(Counter { value: 0 });
        let calls = Arc::new(AtomicUsize::new(0));

        let calls_clone = calls.clone();
        let handle = store.subscribe(move |c: &Counter| {
            assert!(c.value >= 0);
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });

        store.set(Counter { value: 1 });
        store.update(|c| c.value = 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        store.unsubscribe(handle);
        store.set(Counter { value: 3 });
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn global_store_is_shared() {
        let a = global_store::<Counter>("store-test");
        a.set(Counter { value: 11 });

        let b = global_store::<Counter>("store-test");
        assert_eq!(b.get().value, 11);
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
    fn global_store_creation_is_logged_once() {
        let logs = LogBuffer::default();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(logs.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            let _ = global_store::<Counter>("store-log-test");
            // Second lookup reuses the instance
            let _ = global_store::<Counter>("store-log-test");
        });

        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert_eq!(output.matches("creating global store").count(), 1);
        assert!(output.contains("store-log-test"));
    }
}
