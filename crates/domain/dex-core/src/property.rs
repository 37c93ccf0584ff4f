//! Observable value cells that UI controls and background tasks bind to.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use uuid::Uuid;

pub type PropertyId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener<T> = Arc<dyn Fn(&T, &T) + Send + Sync>;

struct Inner<T> {
    id: PropertyId,
    value: Mutex<T>,
    listeners: Mutex<Vec<(ListenerId, Listener<T>)>>,
    next_listener: AtomicU64,
}

/// A shared value with change listeners.
///
/// Listeners receive `(old, new)` and run on the thread that called [`Property::set`],
/// after the value lock has been released, so a listener may read or write the
/// property again.
pub struct Property<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Property<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Property<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let value = self.inner.value.lock().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("Property")
            .field("id", &self.inner.id)
            .field("value", &*value)
            .finish()
    }
}

impl<T> Property<T>
where
    T: Clone + PartialEq + Send + 'static,
{
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(Inner {
                id: Uuid::new_v4(),
                value: Mutex::new(value),
                listeners: Mutex::new(Vec::new()),
                next_listener: AtomicU64::new(1),
            }),
        }
    }

    pub fn id(&self) -> PropertyId {
        self.inner.id
    }

    pub fn get(&self) -> T {
        self.inner
            .value
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Store `value`; returns `false` (and notifies nobody) when it equals the current value.
    pub fn set(&self, value: T) -> bool {
        let old = {
            let mut guard = self
                .inner
                .value
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if *guard == value {
                return false;
            }
            std::mem::replace(&mut *guard, value.clone())
        };

        let listeners: Vec<Listener<T>> = self
            .inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, l)| l.clone())
            .collect();
        for listener in listeners {
            listener(&old, &value);
        }
        true
    }

    pub fn add_listener(&self, f: impl Fn(&T, &T) + Send + Sync + 'static) -> ListenerId {
        let id = ListenerId(self.inner.next_listener.fetch_add(1, Ordering::Relaxed));
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(f)));
        id
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self
            .inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// One-way binding: `self` takes the current value of `source` and follows it.
    /// The returned listener id belongs to `source`.
    pub fn bind_to(&self, source: &Property<T>) -> ListenerId {
        self.set(source.get());
        let target = self.downgrade();
        source.add_listener(move |_, new| {
            if let Some(target) = target.upgrade() {
                target.set(new.clone());
            }
        })
    }

    pub fn downgrade(&self) -> WeakProperty<T> {
        WeakProperty {
            inner: Arc::downgrade(&self.inner),
        }
    }
}

/// Non-owning handle to a [`Property`], for listeners that must not keep it alive.
pub struct WeakProperty<T> {
    inner: Weak<Inner<T>>,
}

impl<T> Clone for WeakProperty<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> WeakProperty<T> {
    pub fn upgrade(&self) -> Option<Property<T>> {
        self.inner.upgrade().map(|inner| Property { inner })
    }
}
