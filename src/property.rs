use std::{
    collections::hash_map::RandomState,
    fmt::Debug,
    hash::{BuildHasher, Hash},
    ops::{Deref, DerefMut},
    sync::{Arc, Mutex, MutexGuard, PoisonError, Weak},
};

use crate::WatchHandle;

type Observer<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Observers<T> {
    next_id: u64,
    entries: Vec<(u64, Observer<T>)>,
}

impl<T> Default for Observers<T> {
    fn default() -> Self {
        Self {
            next_id: 0,
            entries: vec![],
        }
    }
}

/// Thread safe observed cell.
///
/// `Property` is a shared handle: clones read and write the same cell, and a
/// watch registered through one clone fires for writes made through any other.
/// This is the building block [`watchable!`](crate::watchable) uses for every field.
///
/// # Examples
/// ```
/// use watchbox::Property;
/// use std::sync::{Arc, Mutex};
///
/// let p = Property::new(1);
/// let seen: Arc<Mutex<Vec<i32>>> = Default::default();
///
/// let _watch = p.watch({
///     let seen = seen.clone();
///     move |val| seen.lock().unwrap().push(*val)
/// });
///
/// p.set(2);
/// p.update(|n| n * 10);
///
/// assert_eq!(vec![2, 20], seen.lock().unwrap().clone());
/// ```
#[derive(Clone, Default)]
pub struct Property<T> {
    value: Arc<Mutex<T>>,
    observers: Arc<Mutex<Observers<T>>>,
}

impl<T> Property<T> {
    pub fn new(value: T) -> Self {
        Self {
            value: Arc::new(Mutex::new(value)),
            observers: Default::default(),
        }
    }

    /// Returns a clone/copy of the value inside the property
    pub fn value(&self) -> T
    where
        T: Clone,
    {
        self.acq_val_lock().clone()
    }

    /// Perform some action with the reference to the inner value.
    ///
    /// The property is locked while `f` runs, so `f` must not touch this property again.
    pub fn with_value(&self, f: impl FnOnce(&T)) {
        f(self.acq_val_lock().deref());
    }

    /// Registers `f` to be called with the new value after every notifying write.
    ///
    /// Observers run after the property's locks are released, so they may read,
    /// write or unwatch this property.
    pub fn watch(&self, f: impl Fn(&T) + Send + Sync + 'static) -> WatchHandle
    where
        T: 'static,
    {
        let id = {
            let mut observers = self.acq_obs_lock();
            let id = observers.next_id;
            observers.next_id += 1;
            observers.entries.push((id, Arc::new(f)));
            id
        };

        let observers: Weak<Mutex<Observers<T>>> = Arc::downgrade(&self.observers);
        WatchHandle::new(move || {
            if let Some(observers) = observers.upgrade() {
                observers
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .entries
                    .retain(|(entry, _)| *entry != id);
            }
        })
    }

    pub fn observer_count(&self) -> usize {
        self.acq_obs_lock().entries.len()
    }

    /// Returns `true` when both handles refer to the same cell.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.value, &other.value)
    }

    fn acq_val_lock(&self) -> MutexGuard<'_, T> {
        self.value.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn acq_obs_lock(&self) -> MutexGuard<'_, Observers<T>> {
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Clone> Property<T> {
    /// Set the value to something new and notify all the observers
    /// in the sequence they were added (even if the value didn't change)
    pub fn set(&self, val: T) {
        let current = {
            let mut guard = self.acq_val_lock();
            *guard.deref_mut() = val;
            guard.deref().clone()
        };
        self.call_observers(&current);
    }

    /// Update the value and notify all the observers
    /// without checking if the value is changed after applying the provided function
    pub fn update_unchecked(&self, f: impl FnOnce(&T) -> T) {
        let current = {
            let mut guard = self.acq_val_lock();
            *guard.deref_mut() = f(guard.deref());
            guard.deref().clone()
        };
        self.call_observers(&current);
    }

    /// Update the value in place and notify all the observers
    /// without checking if the value is changed after applying the provided function
    pub fn update_inplace_unchecked(&self, f: impl FnOnce(&mut T)) {
        let current = {
            let mut guard = self.acq_val_lock();
            f(guard.deref_mut());
            guard.deref().clone()
        };
        self.call_observers(&current);
    }

    /// Update the value and notify the observers
    /// **ONLY** if the value changes after applying the provided function
    ///
    /// ```
    /// use watchbox::Property;
    /// use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
    ///
    /// let p = Property::new(String::from("a"));
    /// let calls = Arc::new(AtomicUsize::new(0));
    /// let _watch = p.watch({
    ///     let calls = calls.clone();
    ///     move |_| { calls.fetch_add(1, Ordering::SeqCst); }
    /// });
    ///
    /// p.update(|_| String::from("a"));
    /// p.update(|_| String::from("b"));
    ///
    /// assert_eq!(1, calls.load(Ordering::SeqCst));
    /// ```
    pub fn update(&self, f: impl FnOnce(&T) -> T)
    where
        T: PartialEq,
    {
        let changed = {
            let mut guard = self.acq_val_lock();
            let new_val = f(guard.deref());
            if &new_val != guard.deref() {
                *guard.deref_mut() = new_val;
                Some(guard.deref().clone())
            } else {
                None
            }
        };

        if let Some(current) = changed {
            self.call_observers(&current);
        }
    }

    /// Update the value in place and notify the observers
    /// **ONLY** if its hash changes after applying the provided function.
    ///
    /// Prefer this when the datatype inside is expensive to compare, like a vector.
    pub fn update_inplace(&self, f: impl FnOnce(&mut T))
    where
        T: Hash,
    {
        let random_state = RandomState::new();
        let changed = {
            let mut guard = self.acq_val_lock();

            let old_hash = random_state.hash_one(guard.deref());
            f(guard.deref_mut());
            let new_hash = random_state.hash_one(guard.deref());

            (old_hash != new_hash).then(|| guard.deref().clone())
        };

        if let Some(current) = changed {
            self.call_observers(&current);
        }
    }

    /// Notify all the observers of the current value
    pub fn notify(&self) {
        let current = self.value();
        self.call_observers(&current);
    }

    fn call_observers(&self, val: &T) {
        let snapshot: Vec<Observer<T>> = self
            .acq_obs_lock()
            .entries
            .iter()
            .map(|(_, obs)| obs.clone())
            .collect();

        for obs in snapshot {
            obs(val);
        }
    }
}

impl<T: Debug> Debug for Property<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Property")
            .field(self.acq_val_lock().deref())
            .finish()
    }
}
