use std::{
    fmt::Debug,
    sync::{Arc, Mutex, MutexGuard, PoisonError, Weak},
};

use tracing::{debug, trace};

use crate::{
    stream::WeakValueStream, KeyPath, OnChange, Result, Subscription, ValueStream, WatchHandle,
    Watchable,
};

struct BoxState<V: Watchable> {
    value: V,
    paths: Vec<V::Path>,
    watches: Vec<WatchHandle>,
    generation: u64,
    destroyed: bool,
    this: Weak<Mutex<BoxState<V>>>,
    stream: WeakValueStream<V>,
}

impl<V> BoxState<V>
where
    V: Watchable + Clone + Send + 'static,
{
    fn install_watches(&mut self) {
        let generation = self.generation;
        let watches: Vec<WatchHandle> = self
            .paths
            .iter()
            .map(|path| {
                let state = self.this.clone();
                let stream = self.stream.clone();
                let on_change: OnChange = Arc::new(move || republish(&state, &stream, generation));
                self.value.watch(path, on_change)
            })
            .collect();
        self.watches = watches;
    }
}

impl<V: Watchable> BoxState<V> {
    fn cancel_watches(&mut self) {
        for mut watch in self.watches.drain(..) {
            watch.cancel();
        }
    }
}

/// Re-reads the box's value and pushes it, unless the callback outlived the
/// value it was registered against.
fn republish<V>(state: &Weak<Mutex<BoxState<V>>>, stream: &WeakValueStream<V>, generation: u64)
where
    V: Watchable + Clone,
{
    let (Some(state), Some(stream)) = (state.upgrade(), stream.upgrade()) else {
        return;
    };

    let value = {
        let state = state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.destroyed || state.generation != generation {
            trace!(generation, "ignoring change from a replaced value");
            return;
        }
        state.value.clone()
    };

    trace!(generation, "watched property changed, republishing value");
    stream.push(value);
}

/// A value container that publishes the whole value whenever it is replaced
/// *or* whenever one of the watched key paths changes inside it.
///
/// `V` is expected to be a handle type (cloning it yields another reference to
/// the same object), so that code outside the box can mutate the very object
/// the box holds. Types declared with [`watchable!`](crate::watchable) are such handles.
///
/// Pushes triggered by a watched property happen *after* the property changed,
/// so subscribers always see the post mutation value.
///
/// Calling [`set`](Self::set) concurrently from several threads is not
/// synchronized by the box; callers that need it must serialize those calls.
///
/// # Examples
/// ```
/// use watchbox::{watchable, ObservableBox};
/// use std::sync::{Arc, Mutex};
///
/// watchable! {
///     pub struct Counter {
///         count: i64,
///     }
/// }
///
/// let counter = Counter::new(0);
/// let boxed = ObservableBox::with_path(counter.clone(), "count").unwrap();
///
/// let seen: Arc<Mutex<Vec<i64>>> = Default::default();
/// let _subscription = boxed.subscribe({
///     let seen = seen.clone();
///     move |c: &Counter| seen.lock().unwrap().push(c.count())
/// });
///
/// counter.set_count(1);
/// counter.set_count(2);
/// boxed.emit();
/// boxed.send(Counter::new(99));
///
/// assert_eq!(vec![0, 1, 2, 2, 99], seen.lock().unwrap().clone());
/// assert_eq!(2, boxed.get().count());
/// ```
pub struct ObservableBox<V: Watchable> {
    state: Arc<Mutex<BoxState<V>>>,
    stream: ValueStream<V>,
}

impl<V> ObservableBox<V>
where
    V: Watchable + Clone + Send + 'static,
{
    /// Creates a box holding `value` and watches each of `paths` on it.
    ///
    /// Fails without registering anything if one of the paths is malformed or
    /// does not resolve on `V`. An empty `paths` is allowed; then only
    /// [`set`](Self::set) publishes.
    #[tracing::instrument(level = "debug", skip_all, fields(paths = paths.len()))]
    pub fn new(value: V, paths: &[&str]) -> Result<Self> {
        let paths = paths
            .iter()
            .map(|text| KeyPath::parse(text).and_then(|path| V::resolve(&path)))
            .collect::<Result<Vec<_>>>()?;

        let stream = ValueStream::new(value.clone());
        let state = Arc::new_cyclic(|this| {
            Mutex::new(BoxState {
                value,
                paths,
                watches: vec![],
                generation: 0,
                destroyed: false,
                this: this.clone(),
                stream: stream.downgrade(),
            })
        });

        {
            let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
            state.install_watches();
            debug!(watches = state.watches.len(), "observable box created");
        }

        Ok(Self { state, stream })
    }

    /// Creates a box watching a single key path.
    pub fn with_path(value: V, path: &str) -> Result<Self> {
        Self::new(value, &[path])
    }

    /// Returns a clone of (a handle to) the current value.
    pub fn get(&self) -> V {
        self.acq_lock().value.clone()
    }

    /// Replaces the value and publishes it, even if nothing inside it differs.
    ///
    /// Watches on the previous value are cancelled before the replacement and
    /// re-registered on the new value before it is published.
    pub fn set(&self, value: V) {
        {
            let mut state = self.acq_lock();
            state.cancel_watches();
            state.value = value.clone();
            state.generation += 1;
            if !state.destroyed {
                state.install_watches();
            }
            debug!(
                generation = state.generation,
                watches = state.watches.len(),
                "value replaced"
            );
        }
        self.stream.push(value);
    }

    /// The subscribable side of this box; clones share state with it.
    pub fn stream(&self) -> ValueStream<V> {
        self.stream.clone()
    }

    pub fn subscribe(&self, f: impl FnMut(&V) + Send + 'static) -> Subscription<V> {
        self.stream.subscribe(f)
    }

    pub fn emit(&self) {
        self.stream.emit();
    }

    pub fn send(&self, value: V) {
        self.stream.send(value);
    }
}

impl<V: Watchable> ObservableBox<V> {
    /// Cancels every watch. Idempotent; also runs when the box is dropped.
    ///
    /// The box and any [`ValueStream`] taken from it keep working, but changes
    /// inside the value are no longer published.
    pub fn destroy(&self) {
        let mut state = self.acq_lock();
        if state.destroyed {
            return;
        }
        state.destroyed = true;
        state.cancel_watches();
        debug!("observable box destroyed");
    }

    pub fn is_destroyed(&self) -> bool {
        self.acq_lock().destroyed
    }

    /// Number of registrations currently held against the value.
    pub fn active_watches(&self) -> usize {
        self.acq_lock().watches.len()
    }

    fn acq_lock(&self) -> MutexGuard<'_, BoxState<V>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<V: Watchable> Drop for ObservableBox<V> {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl<V: Watchable + Debug> Debug for ObservableBox<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ObservableBox")
            .field(&self.acq_lock().value)
            .finish()
    }
}
