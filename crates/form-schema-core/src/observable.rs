//! Single-threaded change-notification primitives.
//!
//! - [`State`]: a writable, deduplicating cell. Subscribers receive the current
//!   value immediately and every distinct value after that.
//! - [`Observable`]: a read-only handle on a [`State`].
//! - [`Emitter`] / [`EventStream`]: a hot event stream without replay.
//! - [`Subscription`]: RAII guard that unsubscribes on drop.
//!
//! # Invariants
//!
//! 1. Setting a value equal to the current one notifies nobody.
//! 2. Subscribers are notified in registration order.
//! 3. No internal borrow is held while a callback runs, so callbacks may read,
//!    write or subscribe to the same cell.
//! 4. A write made from inside a callback supersedes the one being delivered:
//!    remaining subscribers see only the newer value.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

type Callback<T> = Rc<dyn Fn(&T)>;

struct Subscribers<T> {
    next_id: Cell<u64>,
    entries: RefCell<Vec<(u64, Callback<T>)>>,
}

impl<T> Default for Subscribers<T> {
    fn default() -> Self {
        Self {
            next_id: Cell::new(0),
            entries: RefCell::new(Vec::new()),
        }
    }
}

impl<T: 'static> Subscribers<T> {
    fn add(self: &Rc<Self>, callback: Callback<T>) -> Subscription {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.entries.borrow_mut().push((id, callback));

        let weak: Weak<Self> = Rc::downgrade(self);
        Subscription::new(move || {
            if let Some(subscribers) = weak.upgrade() {
                subscribers.entries.borrow_mut().retain(|(i, _)| *i != id);
            }
        })
    }

    fn snapshot(&self) -> Vec<Callback<T>> {
        self.entries
            .borrow()
            .iter()
            .map(|(_, cb)| Rc::clone(cb))
            .collect()
    }

    fn notify(&self, value: &T) {
        for callback in self.snapshot() {
            callback(value);
        }
    }

    fn len(&self) -> usize {
        self.entries.borrow().len()
    }
}

/// Unsubscribes its callback when dropped.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    fn new(cancel: impl FnOnce() + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Unsubscribes now. Equivalent to dropping the guard.
    pub fn unsubscribe(mut self) {
        self.cancel_now();
    }

    fn cancel_now(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel_now();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

// ──── State / Observable ────

struct StateInner<T> {
    value: RefCell<T>,
    version: Cell<u64>,
    subscribers: Rc<Subscribers<T>>,
}

/// A writable value cell with replay-on-subscribe and deduplication.
pub struct State<T> {
    inner: Rc<StateInner<T>>,
}

impl<T: Clone + PartialEq + 'static> State<T> {
    /// Creates a cell holding `initial`.
    #[must_use]
    pub fn new(initial: T) -> Self {
        Self {
            inner: Rc::new(StateInner {
                value: RefCell::new(initial),
                version: Cell::new(0),
                subscribers: Rc::new(Subscribers::default()),
            }),
        }
    }

    /// Returns a clone of the current value.
    #[must_use]
    pub fn get(&self) -> T {
        self.inner.value.borrow().clone()
    }

    /// Stores `value` and notifies subscribers if it differs from the current
    /// value. Returns whether it changed.
    pub fn set(&self, value: T) -> bool {
        let version = {
            let mut current = self.inner.value.borrow_mut();
            if *current == value {
                return false;
            }
            *current = value.clone();
            let version = self.inner.version.get() + 1;
            self.inner.version.set(version);
            version
        };
        for callback in self.inner.subscribers.snapshot() {
            if self.inner.version.get() != version {
                break;
            }
            callback(&value);
        }
        true
    }

    /// Returns a read-only handle sharing this cell.
    #[must_use]
    pub fn observable(&self) -> Observable<T> {
        Observable {
            inner: Rc::clone(&self.inner),
        }
    }

    /// See [`Observable::subscribe`].
    pub fn subscribe(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        self.observable().subscribe(callback)
    }
}

impl<T> Clone for State<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for State<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("State").field(&*self.inner.value.borrow()).finish()
    }
}

/// Read-only view of a [`State`].
pub struct Observable<T> {
    inner: Rc<StateInner<T>>,
}

impl<T: Clone + PartialEq + 'static> Observable<T> {
    /// Returns a clone of the current value.
    #[must_use]
    pub fn get(&self) -> T {
        self.inner.value.borrow().clone()
    }

    /// Calls `callback` with the current value right away, then with every
    /// distinct value stored afterwards, until the returned guard is dropped.
    pub fn subscribe(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        let callback: Callback<T> = Rc::new(callback);
        let subscription = self.inner.subscribers.add(Rc::clone(&callback));
        callback(&self.get());
        subscription
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.len()
    }
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Observable")
            .field(&*self.inner.value.borrow())
            .finish()
    }
}

// ──── Emitter / EventStream ────

/// Publishing side of a hot event stream. Late subscribers see only events
/// emitted after they subscribed.
pub struct Emitter<T> {
    subscribers: Rc<Subscribers<T>>,
}

impl<T: 'static> Emitter<T> {
    /// Creates an emitter with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            subscribers: Rc::new(Subscribers::default()),
        }
    }

    /// Delivers `event` to every current subscriber.
    pub fn emit(&self, event: &T) {
        self.subscribers.notify(event);
    }

    /// Returns true if anyone is listening.
    #[must_use]
    pub fn has_subscribers(&self) -> bool {
        self.subscribers.len() > 0
    }

    /// Returns the subscribe-only side of this emitter.
    #[must_use]
    pub fn stream(&self) -> EventStream<T> {
        EventStream {
            subscribers: Rc::clone(&self.subscribers),
        }
    }
}

impl<T: 'static> Default for Emitter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Emitter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Emitter")
            .field("subscribers", &self.subscribers.entries.borrow().len())
            .finish()
    }
}

/// Subscribe-only side of an [`Emitter`].
pub struct EventStream<T> {
    subscribers: Rc<Subscribers<T>>,
}

impl<T: 'static> EventStream<T> {
    /// Calls `callback` for every subsequent event until the guard is dropped.
    pub fn subscribe(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        self.subscribers.add(Rc::new(callback))
    }
}

impl<T> Clone for EventStream<T> {
    fn clone(&self) -> Self {
        Self {
            subscribers: Rc::clone(&self.subscribers),
        }
    }
}

impl<T> fmt::Debug for EventStream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("subscribers", &self.subscribers.entries.borrow().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder<T: Clone + 'static>() -> (Rc<RefCell<Vec<T>>>, impl Fn(&T) + 'static) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        (seen, move |v: &T| sink.borrow_mut().push(v.clone()))
    }

    #[test]
    fn test_write_from_callback_supersedes_delivery() {
        let state = State::new(0);
        let clamp = state.clone();
        let _clamp = state.subscribe(move |v| {
            if *v > 10 {
                clamp.set(10);
            }
        });
        let (seen, cb) = recorder();
        let _log = state.subscribe(cb);

        assert!(state.set(42));
        assert_eq!(state.get(), 10);
        assert_eq!(*seen.borrow(), vec![0, 10]);
    }

    #[test]
    fn test_subscribe_replays_current_value() {
        let state = State::new(1);
        let (seen, cb) = recorder();
        let _sub = state.observable().subscribe(cb);
        assert_eq!(*seen.borrow(), vec![1]);
    }

    #[test]
    fn test_set_deduplicates() {
        let state = State::new(false);
        let (seen, cb) = recorder();
        let _sub = state.subscribe(cb);
        assert!(state.set(true));
        assert!(!state.set(true));
        assert!(state.set(false));
        assert_eq!(*seen.borrow(), vec![false, true, false]);
    }

    #[test]
    fn test_drop_unsubscribes() {
        let state = State::new(0);
        let (seen, cb) = recorder();
        let sub = state.subscribe(cb);
        assert_eq!(state.observable().subscriber_count(), 1);
        drop(sub);
        state.set(5);
        assert_eq!(*seen.borrow(), vec![0]);
        assert_eq!(state.observable().subscriber_count(), 0);
    }

    #[test]
    fn test_callback_may_write_back() {
        let state = State::new(0);
        let writer = state.clone();
        let _sub = state.subscribe(move |v| {
            if *v < 3 {
                writer.set(v + 1);
            }
        });
        assert_eq!(state.get(), 3);
    }

    #[test]
    fn test_emitter_does_not_replay() {
        let emitter = Emitter::new();
        emitter.emit(&"early");
        assert!(!emitter.has_subscribers());

        let (seen, cb) = recorder();
        let sub = emitter.stream().subscribe(cb);
        assert!(emitter.has_subscribers());
        emitter.emit(&"late");
        sub.unsubscribe();
        emitter.emit(&"after");
        assert_eq!(*seen.borrow(), vec!["late"]);
        assert!(!emitter.has_subscribers());
    }

    #[test]
    fn test_subscription_outliving_state_is_harmless() {
        let state = State::new(1);
        let sub = state.subscribe(|_| {});
        drop(state);
        drop(sub);
    }
}
