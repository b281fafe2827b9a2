//! Observer lists with explicit disposer handles
//!
//! Callbacks run outside the observer lock, so they may subscribe or
//! unsubscribe freely. One-shot observers are detached before their callback
//! runs and therefore fire at most once.

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Observer<T> {
    id: u64,
    once: bool,
    callback: Callback<T>,
}

struct Registry<T> {
    next_id: u64,
    observers: Vec<Observer<T>>,
}

/// Type-erased view of a registry used by [`Subscription`]
trait Detach: Send + Sync {
    fn detach(&self, id: u64) -> bool;
    fn contains(&self, id: u64) -> bool;
}

impl<T: 'static> Detach for Mutex<Registry<T>> {
    fn detach(&self, id: u64) -> bool {
        let mut registry = self.lock();
        let before = registry.observers.len();
        registry.observers.retain(|o| o.id != id);
        registry.observers.len() != before
    }

    fn contains(&self, id: u64) -> bool {
        self.lock().observers.iter().any(|o| o.id == id)
    }
}

/// An event source that notifies registered callbacks
pub struct Observable<T> {
    registry: Arc<Mutex<Registry<T>>>,
}

impl<T: 'static> Observable<T> {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry {
                next_id: 0,
                observers: Vec::new(),
            })),
        }
    }

    /// Register a callback for every notification
    pub fn add<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.register(Arc::new(callback), false)
    }

    /// Register a callback for the next notification only
    pub fn add_once<F>(&self, callback: F) -> Subscription
    where
        F: FnOnce(&T) + Send + 'static,
    {
        let slot = Mutex::new(Some(callback));
        self.register(
            Arc::new(move |value: &T| {
                if let Some(callback) = slot.lock().take() {
                    callback(value);
                }
            }),
            true,
        )
    }

    fn register(&self, callback: Callback<T>, once: bool) -> Subscription {
        let id = {
            let mut registry = self.registry.lock();
            let id = registry.next_id;
            registry.next_id += 1;
            registry.observers.push(Observer { id, once, callback });
            id
        };

        let registry: Weak<dyn Detach> = Arc::downgrade(&self.registry) as Weak<Mutex<Registry<T>>>;
        Subscription { id, registry }
    }

    /// Invoke every registered callback with `value`
    ///
    /// Observers removed by a callback during this call still receive the
    /// current notification.
    pub fn notify(&self, value: &T) {
        let callbacks: Vec<Callback<T>> = {
            let mut registry = self.registry.lock();
            let callbacks = registry
                .observers
                .iter()
                .map(|o| Arc::clone(&o.callback))
                .collect();
            registry.observers.retain(|o| !o.once);
            callbacks
        };

        for callback in callbacks {
            callback(value);
        }
    }

    pub fn observer_count(&self) -> usize {
        self.registry.lock().observers.len()
    }

    pub fn has_observers(&self) -> bool {
        self.observer_count() > 0
    }

    /// Remove every observer
    pub fn clear(&self) {
        self.registry.lock().observers.clear();
    }
}

impl<T: 'static> Default for Observable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observable")
            .field("observers", &self.registry.lock().observers.len())
            .finish()
    }
}

/// Disposer for a registered observer
///
/// Dropping a subscription leaves the observer registered; call
/// [`Subscription::unsubscribe`] to remove it.
#[derive(Clone)]
pub struct Subscription {
    id: u64,
    registry: Weak<dyn Detach>,
}

impl Subscription {
    /// Remove the observer. Returns `false` if it was already gone.
    pub fn unsubscribe(&self) -> bool {
        self.registry
            .upgrade()
            .is_some_and(|registry| registry.detach(self.id))
    }

    /// Whether the observer is still registered
    pub fn is_active(&self) -> bool {
        self.registry
            .upgrade()
            .is_some_and(|registry| registry.contains(self.id))
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}
