use std::{
    collections::VecDeque,
    fmt::Debug,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard, PoisonError, Weak,
    },
    thread,
};

use tracing::trace;

type Callback<T> = Box<dyn FnMut(&T) + Send>;

struct Subscriber<T> {
    id: u64,
    active: AtomicBool,
    callback: Mutex<Callback<T>>,
}

impl<T> Subscriber<T> {
    fn deliver(&self, value: &T) {
        if !self.active.load(Ordering::Acquire) {
            return;
        }
        let mut callback = self.callback.lock().unwrap_or_else(PoisonError::into_inner);
        (*callback)(value);
    }
}

struct StreamState<T> {
    last_value: T,
    subscribers: Vec<Arc<Subscriber<T>>>,
    pending: VecDeque<T>,
    delivering: bool,
    next_id: u64,
}

/// The subscribable side of an [`ObservableBox`](crate::ObservableBox).
///
/// A `ValueStream` always holds a latest value. Subscribing replays it right
/// away, and every push afterwards is delivered to every subscriber in the
/// order they subscribed. Pushes are never merged: N pushes mean N calls per
/// subscriber, in push order, even when a subscriber pushes again while it is
/// being notified.
///
/// Clones share the same subscribers and latest value, so a stream taken from
/// a box keeps working after the box is gone (it just stops receiving watch
/// triggered pushes).
///
/// # Examples
/// ```
/// use watchbox::ValueStream;
/// use std::sync::{Arc, Mutex};
///
/// let stream = ValueStream::new(String::from("🦀"));
/// let log: Arc<Mutex<Vec<String>>> = Default::default();
///
/// let subscription = stream.subscribe({
///     let log = log.clone();
///     move |val| log.lock().unwrap().push(val.clone())
/// });
///
/// stream.send(String::from("🦞"));
/// stream.emit();
/// subscription.cancel();
/// stream.send(String::from("🐙"));
///
/// assert_eq!(
///     vec![String::from("🦀"), String::from("🦞"), String::from("🦞")],
///     log.lock().unwrap().clone()
/// );
/// ```
#[derive(Clone)]
pub struct ValueStream<T> {
    inner: Arc<Mutex<StreamState<T>>>,
}

impl<T> ValueStream<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(Mutex::new(StreamState {
                last_value: value,
                subscribers: vec![],
                pending: VecDeque::new(),
                delivering: false,
                next_id: 0,
            })),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.acq_lock().subscribers.len()
    }

    pub(crate) fn downgrade(&self) -> WeakValueStream<T> {
        WeakValueStream {
            inner: Arc::downgrade(&self.inner),
        }
    }

    fn acq_lock(&self) -> MutexGuard<'_, StreamState<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Clone> ValueStream<T> {
    /// Returns a clone of the latest value, the one a new subscriber would be replayed.
    pub fn value(&self) -> T {
        self.acq_lock().last_value.clone()
    }

    /// Adds `f` as the last subscriber and calls it with the latest value
    /// before returning.
    ///
    /// The returned [`Subscription`] cancels the subscriber when dropped; use
    /// [`Subscription::detach`] to keep it for the lifetime of the stream.
    pub fn subscribe(&self, f: impl FnMut(&T) + Send + 'static) -> Subscription<T> {
        let mut state = self.acq_lock();
        let id = state.next_id;
        state.next_id += 1;

        let subscription = Subscription {
            subscriber: Arc::new(Subscriber {
                id,
                active: AtomicBool::new(true),
                callback: Mutex::new(Box::new(f)),
            }),
            stream: Arc::downgrade(&self.inner),
            detached: false,
        };

        // Holding the callback across registration keeps a concurrent delivery
        // from reaching this subscriber before its replay.
        let mut callback = subscription
            .subscriber
            .callback
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        state.subscribers.push(subscription.subscriber.clone());
        let replay = state.last_value.clone();

        // Pushes made by the replay itself must queue rather than reach this
        // subscriber while its callback is still locked.
        let owns_delivery = !state.delivering;
        state.delivering = true;
        drop(state);

        let _unwind = owns_delivery.then(|| ResetOnUnwind { stream: self });
        trace!(subscriber = id, "subscribed, replaying latest value");
        (*callback)(&replay);
        drop(callback);

        if owns_delivery {
            self.drain();
        }

        subscription
    }

    /// Pushes `value` to every subscriber, bypassing whatever produced the stream's values so far.
    pub fn send(&self, value: T) {
        self.push(value);
    }

    /// Re-delivers the latest value to every subscriber without any underlying change.
    pub fn emit(&self) {
        let latest = {
            let state = self.acq_lock();
            state
                .pending
                .back()
                .unwrap_or(&state.last_value)
                .clone()
        };
        self.push(latest);
    }

    pub(crate) fn push(&self, value: T) {
        {
            let mut state = self.acq_lock();
            state.pending.push_back(value);
            if state.delivering {
                trace!(queued = state.pending.len(), "push queued behind in-flight delivery");
                return;
            }
            state.delivering = true;
        }

        self.drain();
    }

    /// Delivers queued values until the queue is empty. Only the caller that
    /// set `delivering` may drain.
    fn drain(&self) {
        let _unwind = ResetOnUnwind { stream: self };
        loop {
            let (value, snapshot) = {
                let mut state = self.acq_lock();
                match state.pending.pop_front() {
                    Some(value) => {
                        state.last_value = value.clone();
                        (value, state.subscribers.clone())
                    }
                    None => {
                        state.delivering = false;
                        return;
                    }
                }
            };

            trace!(subscribers = snapshot.len(), "delivering value");
            for subscriber in &snapshot {
                subscriber.deliver(&value);
            }
        }
    }
}

impl<T: Debug> Debug for ValueStream<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ValueStream")
            .field(&self.acq_lock().last_value)
            .finish()
    }
}

/// Clears the in-flight flag when a subscriber panics mid-delivery or
/// mid-replay, so the next push drains whatever is still queued.
struct ResetOnUnwind<'a, T> {
    stream: &'a ValueStream<T>,
}

impl<T> Drop for ResetOnUnwind<'_, T> {
    fn drop(&mut self) {
        if thread::panicking() {
            self.stream.acq_lock().delivering = false;
        }
    }
}

pub(crate) struct WeakValueStream<T> {
    inner: Weak<Mutex<StreamState<T>>>,
}

impl<T> Clone for WeakValueStream<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> WeakValueStream<T> {
    pub(crate) fn upgrade(&self) -> Option<ValueStream<T>> {
        self.inner.upgrade().map(|inner| ValueStream { inner })
    }
}

/// Handle returned by [`ValueStream::subscribe`].
#[must_use = "dropping a Subscription cancels it"]
pub struct Subscription<T> {
    subscriber: Arc<Subscriber<T>>,
    stream: Weak<Mutex<StreamState<T>>>,
    detached: bool,
}

impl<T> Subscription<T> {
    /// Removes the subscriber. Idempotent, and safe to call from inside any subscriber,
    /// including this one. A cancelled subscriber is skipped even by a delivery
    /// that is already running.
    pub fn cancel(&self) {
        if !self.subscriber.active.swap(false, Ordering::AcqRel) {
            return;
        }

        if let Some(inner) = self.stream.upgrade() {
            inner
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .subscribers
                .retain(|s| s.id != self.subscriber.id);
        }
        trace!(subscriber = self.subscriber.id, "subscription cancelled");
    }

    pub fn is_active(&self) -> bool {
        self.subscriber.active.load(Ordering::Acquire)
    }

    /// Gives up the handle without cancelling; the subscriber stays registered
    /// for as long as the stream lives.
    pub fn detach(mut self) {
        self.detached = true;
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        if !self.detached {
            self.cancel();
        }
    }
}

impl<T> Debug for Subscription<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.subscriber.id)
            .field("active", &self.is_active())
            .finish()
    }
}
