//! Channel Implementation
//!
//! A Channel is a discrete event port. Unlike a [`Node`](super::Node), a put
//! is an action rather than an assignment:
//!
//! - putting a value equal to the current one notifies listeners again
//! - there is no reentrancy guard: a listener that puts back into its own
//!   channel is delivered to again, nested inside the outer put, and must
//!   bound the recursion itself
//!
//! The last value put is kept so late readers can look at it, but it is
//! never re-delivered on its own.

use std::fmt::Debug;
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::Mutex;
use smallvec::SmallVec;

use super::ids::{ChannelId, ListenerId};

/// Type-erased view of a channel, as seen by its listeners.
pub trait Port: Send + Sync {
    /// ID of the underlying channel.
    fn channel_id(&self) -> ChannelId;

    /// Register a listener. Returns false if it was already registered.
    fn attach(&self, listener: &Listener) -> bool;

    /// Unregister a listener. Unknown IDs are ignored.
    fn detach(&self, id: ListenerId);

    /// Check whether a listener is registered.
    fn is_listening(&self, id: ListenerId) -> bool;
}

/// Anything a listener can be registered on.
pub trait Listenable {
    /// Shared handle to the channel behind this value.
    fn port(&self) -> Arc<dyn Port>;
}

struct ListenerInner {
    id: ListenerId,
    ports: SmallVec<[Weak<dyn Port>; 4]>,
    reaction: Box<dyn Fn() + Send + Sync>,
}

/// A function registered on one or more channels.
#[derive(Clone)]
pub struct Listener {
    inner: Arc<ListenerInner>,
}

impl Listener {
    /// Get the listener's unique ID.
    pub fn id(&self) -> ListenerId {
        self.inner.id
    }

    /// Remove this listener from every channel it was registered on.
    pub fn unlisten(&self) {
        for port in self.inner.ports.iter().filter_map(Weak::upgrade) {
            port.detach(self.inner.id);
        }
    }

    /// True if the listener is still registered on at least one live channel.
    pub fn is_listening(&self) -> bool {
        self.inner
            .ports
            .iter()
            .filter_map(Weak::upgrade)
            .any(|port| port.is_listening(self.inner.id))
    }
}

impl Debug for Listener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listener")
            .field("id", &self.inner.id)
            .field("channels", &self.inner.ports.len())
            .finish()
    }
}

struct ChannelInner<T> {
    id: ChannelId,
    current: Mutex<Option<T>>,
    listeners: Mutex<IndexMap<ListenerId, Listener>>,
}

impl<T: Send + 'static> Port for ChannelInner<T> {
    fn channel_id(&self) -> ChannelId {
        self.id
    }

    fn attach(&self, listener: &Listener) -> bool {
        let mut listeners = self.listeners.lock();
        if listeners.contains_key(&listener.id()) {
            return false;
        }
        listeners.insert(listener.id(), listener.clone());
        true
    }

    fn detach(&self, id: ListenerId) {
        self.listeners.lock().shift_remove(&id);
    }

    fn is_listening(&self, id: ListenerId) -> bool {
        self.listeners.lock().contains_key(&id)
    }
}

/// A discrete event port carrying values of type `T`.
///
/// Cloning yields another handle to the same channel.
pub struct Channel<T> {
    inner: Arc<ChannelInner<T>>,
}

impl<T: Clone + Send + Sync + 'static> Channel<T> {
    /// Create a channel with no current value.
    pub fn new() -> Self {
        Self::from_option(None)
    }

    /// Create a channel whose current value is `value`.
    ///
    /// Nothing is delivered; listeners only run on [`put`](Self::put).
    pub fn with_value(value: T) -> Self {
        Self::from_option(Some(value))
    }

    fn from_option(current: Option<T>) -> Self {
        Self {
            inner: Arc::new(ChannelInner {
                id: ChannelId::new(),
                current: Mutex::new(current),
                listeners: Mutex::new(IndexMap::new()),
            }),
        }
    }

    /// Get the channel's unique ID.
    pub fn id(&self) -> ChannelId {
        self.inner.id
    }

    /// The last value put into the channel.
    pub fn current(&self) -> Option<T> {
        self.inner.current.lock().clone()
    }

    /// Store `value` and notify every listener, in registration order.
    pub fn put(&self, value: T) {
        *self.inner.current.lock() = Some(value);

        let listeners: SmallVec<[Listener; 8]> =
            self.inner.listeners.lock().values().cloned().collect();
        tracing::trace!(
            channel = %self.inner.id,
            listeners = listeners.len(),
            "channel put"
        );

        for listener in listeners {
            if !self.inner.is_listening(listener.id()) {
                continue;
            }
            (listener.inner.reaction)();
        }
    }

    /// Number of listeners registered on this channel.
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.lock().len()
    }

    /// Create a handle that does not keep the channel alive.
    pub fn downgrade(&self) -> WeakChannel<T> {
        WeakChannel {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Derive a channel by applying `f` to every value put here.
    ///
    /// `None` results are not forwarded.
    pub fn map<U, F>(&self, f: F) -> Channel<U>
    where
        U: Clone + Send + Sync + 'static,
        F: Fn(T) -> Option<U> + Send + Sync + 'static,
    {
        let input = self.downgrade();
        derive_channel(&[self], move || input.current().and_then(&f))
    }

    /// Derive a channel that only forwards values satisfying `predicate`.
    pub fn filter<P>(&self, predicate: P) -> Channel<T>
    where
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.map(move |value| predicate(&value).then_some(value))
    }
}

/// A non-owning handle to a channel, for listeners that read the channel
/// they are registered on.
pub struct WeakChannel<T> {
    inner: Weak<ChannelInner<T>>,
}

impl<T: Clone + Send + Sync + 'static> WeakChannel<T> {
    /// Get a strong handle, if the channel is still alive.
    pub fn upgrade(&self) -> Option<Channel<T>> {
        self.inner.upgrade().map(|inner| Channel { inner })
    }

    /// The last value put, or `None` once the channel is gone.
    pub fn current(&self) -> Option<T> {
        self.inner
            .upgrade()
            .and_then(|inner| inner.current.lock().clone())
    }

    /// True while some handle or derived listener keeps the channel.
    pub fn is_alive(&self) -> bool {
        self.inner.strong_count() > 0
    }
}

impl<T> Clone for WeakChannel<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Default for Channel<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Channel<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Listenable for Channel<T> {
    fn port(&self) -> Arc<dyn Port> {
        self.inner.clone()
    }
}

impl<T: Clone + Send + Sync + Debug + 'static> Debug for Channel<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("id", &self.inner.id)
            .field("current", &self.current())
            .field("listener_count", &self.listener_count())
            .finish()
    }
}

fn register(chans: &[&dyn Listenable], reaction: Box<dyn Fn() + Send + Sync>) -> Listener {
    let strong: SmallVec<[Arc<dyn Port>; 4]> = chans.iter().map(|c| c.port()).collect();
    let listener = Listener {
        inner: Arc::new(ListenerInner {
            id: ListenerId::new(),
            ports: strong.iter().map(Arc::downgrade).collect(),
            reaction,
        }),
    };
    for port in &strong {
        port.attach(&listener);
    }
    listener
}

/// Register `f` on every channel in `chans`.
pub fn listen<F>(chans: &[&dyn Listenable], f: F) -> Listener
where
    F: Fn() + Send + Sync + 'static,
{
    register(chans, Box::new(f))
}

/// Like [`listen`], but the listener removes itself after its first run.
pub fn listen_once<F>(chans: &[&dyn Listenable], f: F) -> Listener
where
    F: Fn() + Send + Sync + 'static,
{
    let this: Arc<Mutex<Option<Weak<ListenerInner>>>> = Arc::default();
    let slot = this.clone();
    let listener = register(
        chans,
        Box::new(move || {
            f();
            let inner = slot.lock().as_ref().and_then(Weak::upgrade);
            if let Some(inner) = inner {
                Listener { inner }.unlisten();
            }
        }),
    );
    *this.lock() = Some(Arc::downgrade(&listener.inner));
    listener
}

/// Remove `listener` from every channel it was registered on.
pub fn unlisten(listener: &Listener) {
    listener.unlisten();
}

/// Create a channel fed by `f` whenever any of `chans` receives a value.
///
/// Only `Some` results are put into the new channel.
pub fn derive_channel<U, F>(chans: &[&dyn Listenable], f: F) -> Channel<U>
where
    U: Clone + Send + Sync + 'static,
    F: Fn() -> Option<U> + Send + Sync + 'static,
{
    let output = Channel::new();
    let target = output.clone();
    listen(chans, move || {
        if let Some(value) = f() {
            target.put(value);
        }
    });
    output
}

/// Derive a channel from the current values of `chans`, passed positionally.
pub fn map_channels<T, U, F>(chans: &[Channel<T>], f: F) -> Channel<U>
where
    T: Clone + Send + Sync + 'static,
    U: Clone + Send + Sync + 'static,
    F: Fn(Vec<Option<T>>) -> Option<U> + Send + Sync + 'static,
{
    let ports: Vec<&dyn Listenable> = chans.iter().map(|c| c as &dyn Listenable).collect();
    let inputs: Vec<WeakChannel<T>> = chans.iter().map(Channel::downgrade).collect();
    derive_channel(&ports, move || f(inputs.iter().map(WeakChannel::current).collect()))
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};

    #[test]
    fn put_stores_value() {
        let chan = Channel::new();
        assert_eq!(chan.current(), None);

        chan.put(3);
        assert_eq!(chan.current(), Some(3));
    }

    #[test]
    fn equal_puts_are_redelivered() {
        let chan = Channel::new();
        let calls = Arc::new(AtomicI32::new(0));
        let calls_clone = calls.clone();

        listen(&[&chan], move || {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });

        chan.put("click");
        chan.put("click");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn with_value_does_not_notify() {
        let chan = Channel::with_value(1);
        let calls = Arc::new(AtomicI32::new(0));
        let calls_clone = calls.clone();
        listen(&[&chan], move || {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(chan.current(), Some(1));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn listener_spans_channels() {
        let a: Channel<i32> = Channel::new();
        let b: Channel<String> = Channel::new();
        let calls = Arc::new(AtomicI32::new(0));
        let calls_clone = calls.clone();

        let listener = listen(&[&a, &b], move || {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });
        a.put(1);
        b.put("x".into());
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        unlisten(&listener);
        assert!(!listener.is_listening());
        a.put(2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(a.listener_count(), 0);
        assert_eq!(b.listener_count(), 0);
    }

    #[test]
    fn listen_once_fires_once() {
        let a: Channel<i32> = Channel::new();
        let b: Channel<i32> = Channel::new();
        let calls = Arc::new(AtomicI32::new(0));
        let calls_clone = calls.clone();

        listen_once(&[&a, &b], move || {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });
        a.put(1);
        a.put(2);
        b.put(3);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(a.listener_count(), 0);
        assert_eq!(b.listener_count(), 0);
    }

    #[test]
    fn listeners_run_in_registration_order() {
        let chan = Channel::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for tag in 0..3 {
            let order = order.clone();
            listen(&[&chan], move || order.lock().push(tag));
        }
        chan.put(());
        assert_eq!(*order.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn map_forwards_transformed_values() {
        let clicks: Channel<i32> = Channel::new();
        let doubled = clicks.map(|v| Some(v * 2));

        clicks.put(4);
        assert_eq!(doubled.current(), Some(8));
    }

    #[test]
    fn filter_suppresses_puts() {
        let numbers: Channel<i32> = Channel::new();
        let evens = numbers.filter(|v| v % 2 == 0);
        let calls = Arc::new(AtomicI32::new(0));
        let calls_clone = calls.clone();
        listen(&[&evens], move || {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });

        numbers.put(1);
        assert_eq!(evens.current(), None);
        numbers.put(2);
        numbers.put(3);
        assert_eq!(evens.current(), Some(2));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn map_channels_sees_all_current_values() {
        let a: Channel<i32> = Channel::new();
        let b: Channel<i32> = Channel::new();
        let sum = map_channels(&[a.clone(), b.clone()], |vs| {
            Some(vs.into_iter().flatten().sum::<i32>())
        });

        a.put(2);
        assert_eq!(sum.current(), Some(2));
        b.put(5);
        assert_eq!(sum.current(), Some(7));
    }

    #[test]
    fn puts_from_a_listener_are_delivered_nested() {
        let chan: Channel<i32> = Channel::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (seen_clone, weak) = (seen.clone(), chan.downgrade());

        listen(&[&chan], move || {
            let Some(value) = weak.current() else {
                return;
            };
            seen_clone.lock().push(value);
            if value < 3 {
                if let Some(chan) = weak.upgrade() {
                    chan.put(value + 1);
                }
            }
        });

        chan.put(0);
        // A node would have dropped the nested writes.
        assert_eq!(*seen.lock(), vec![0, 1, 2, 3]);
        assert_eq!(chan.current(), Some(3));
    }

    #[test]
    fn derived_channels_are_freed_with_their_source() {
        let clicks: Channel<i32> = Channel::new();
        let doubled = clicks.map(|v| Some(v * 2));
        let other: Channel<i32> = Channel::new();
        let sum = map_channels(&[clicks.clone(), other.clone()], |vs| {
            Some(vs.into_iter().flatten().sum::<i32>())
        });

        let weak_clicks = clicks.downgrade();
        let (weak_doubled, weak_sum) = (doubled.downgrade(), sum.downgrade());
        drop((doubled, sum));
        clicks.put(2);
        assert_eq!(weak_doubled.current(), Some(4));

        drop(clicks);
        drop(other);
        assert!(!weak_clicks.is_alive());
        assert!(!weak_doubled.is_alive());
        assert!(!weak_sum.is_alive());
    }
}
