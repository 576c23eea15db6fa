//! Reactive primitives
//!
//! Two small building blocks shared by the loading service and its observers:
//!
//! - [`Subject`] - multicast stream with no replay. Late subscribers only see
//!   values published after they subscribed.
//! - [`ObservableCell`] - a current value plus change notifications. Every new
//!   subscriber first receives the current value, then every replacement.
//!
//! Both support two kinds of listeners: channel receivers (polled from async
//! code) and callbacks (invoked synchronously on the publishing task).
//! Callbacks run after the internal lock has been released, so a callback may
//! freely publish to other subjects or read the cell it is attached to.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::mpsc;

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

enum Sink<T> {
    Channel(mpsc::UnboundedSender<T>),
    Callback(Callback<T>),
}

struct Listener<T> {
    id: u64,
    sink: Sink<T>,
}

/// Listener list shared by subjects and cells
struct Listeners<T> {
    entries: Vec<Listener<T>>,
    next_id: u64,
}

impl<T: Clone> Listeners<T> {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_id: 1,
        }
    }

    fn add(&mut self, sink: Sink<T>) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.push(Listener { id, sink });
        id
    }

    fn remove(&mut self, id: u64) {
        self.entries.retain(|listener| listener.id != id);
    }

    /// Send to channel listeners, pruning closed ones, and hand back the
    /// callbacks so they can be invoked outside the lock.
    fn dispatch(&mut self, value: &T) -> Vec<Callback<T>> {
        let mut callbacks = Vec::new();
        self.entries.retain(|listener| match &listener.sink {
            Sink::Channel(tx) => tx.send(value.clone()).is_ok(),
            Sink::Callback(callback) => {
                callbacks.push(Arc::clone(callback));
                true
            }
        });
        callbacks
    }
}

/// Anything a [`Subscription`] can detach itself from
trait ListenerOwner: Send + Sync {
    fn remove_listener(&self, id: u64);
}

/// Handle to a callback listener
///
/// Dropping the subscription removes the listener. Use [`Subscription::detach`]
/// to keep the callback attached for the lifetime of the source.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    owner: Option<Weak<dyn ListenerOwner>>,
    id: u64,
}

impl Subscription {
    fn new(owner: Arc<dyn ListenerOwner>, id: u64) -> Self {
        Self {
            owner: Some(Arc::downgrade(&owner)),
            id,
        }
    }

    /// Remove the listener now
    pub fn unsubscribe(self) {
        drop(self);
    }

    /// Leave the listener attached until the source is dropped or cleared
    pub fn detach(mut self) {
        self.owner = None;
    }

    /// Whether the source this subscription points at still exists
    pub fn is_active(&self) -> bool {
        self.owner
            .as_ref()
            .map(|owner| owner.strong_count() > 0)
            .unwrap_or(false)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(owner) = self.owner.take().and_then(|weak| weak.upgrade()) {
            owner.remove_listener(self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

/// Receiving end of a channel subscription
#[derive(Debug)]
pub struct Receiver<T> {
    rx: mpsc::UnboundedReceiver<T>,
}

impl<T> Receiver<T> {
    /// Wait for the next value. Returns `None` once the source is gone.
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    /// Take the next queued value without waiting
    pub fn try_recv(&mut self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    /// Take every value queued so far
    pub fn drain(&mut self) -> Vec<T> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}

// ============================================================================
// Subject
// ============================================================================

struct SubjectInner<T> {
    listeners: Mutex<Listeners<T>>,
}

impl<T: Clone + Send + 'static> ListenerOwner for SubjectInner<T> {
    fn remove_listener(&self, id: u64) {
        self.listeners.lock().remove(id);
    }
}

/// Multicast stream without replay
pub struct Subject<T> {
    inner: Arc<SubjectInner<T>>,
}

impl<T: Clone + Send + 'static> Subject<T> {
    /// Create a subject with no listeners
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SubjectInner {
                listeners: Mutex::new(Listeners::new()),
            }),
        }
    }

    /// Deliver a value to every current listener
    pub fn publish(&self, value: T) {
        let callbacks = self.inner.listeners.lock().dispatch(&value);
        for callback in callbacks {
            callback(&value);
        }
    }

    /// Subscribe with a channel receiver
    pub fn subscribe(&self) -> Receiver<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.listeners.lock().add(Sink::Channel(tx));
        Receiver { rx }
    }

    /// Subscribe with a callback invoked on the publishing task
    pub fn subscribe_fn<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = self.inner.listeners.lock().add(Sink::Callback(Arc::new(callback)));
        let owner: Arc<dyn ListenerOwner> = self.inner.clone();
        Subscription::new(owner, id)
    }

    /// Number of attached listeners (closed receivers are pruned lazily)
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.lock().entries.len()
    }

    /// Drop every listener. Idempotent.
    pub fn clear(&self) {
        self.inner.listeners.lock().entries.clear();
    }
}

impl<T: Clone + Send + 'static> Default for Subject<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Subject<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> std::fmt::Debug for Subject<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subject").finish_non_exhaustive()
    }
}

// ============================================================================
// ObservableCell
// ============================================================================

struct CellState<T> {
    value: T,
    listeners: Listeners<T>,
}

struct CellInner<T> {
    state: Mutex<CellState<T>>,
}

impl<T: Clone + Send + 'static> ListenerOwner for CellInner<T> {
    fn remove_listener(&self, id: u64) {
        self.state.lock().listeners.remove(id);
    }
}

/// Current value plus change notifications
///
/// The value is replaced wholesale on every [`set`](Self::set); subscribers
/// never observe a partially updated value. Replacement and delivery to channel
/// subscribers happen under one lock, so a receiver sees every transition in
/// the order it was made.
pub struct ObservableCell<T> {
    inner: Arc<CellInner<T>>,
}

impl<T: Clone + Send + 'static> ObservableCell<T> {
    /// Create a cell holding `value`
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(CellInner {
                state: Mutex::new(CellState {
                    value,
                    listeners: Listeners::new(),
                }),
            }),
        }
    }

    /// Snapshot of the current value
    pub fn get(&self) -> T {
        self.inner.state.lock().value.clone()
    }

    /// Replace the value and notify every subscriber
    pub fn set(&self, value: T) {
        let callbacks = {
            let mut state = self.inner.state.lock();
            state.value = value.clone();
            state.listeners.dispatch(&value)
        };
        for callback in callbacks {
            callback(&value);
        }
    }

    /// Subscribe with a channel receiver; the current value is queued first
    pub fn subscribe(&self) -> Receiver<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.inner.state.lock();
        let _ = tx.send(state.value.clone());
        state.listeners.add(Sink::Channel(tx));
        Receiver { rx }
    }

    /// Subscribe with a callback; it is invoked immediately with the current value
    pub fn subscribe_fn<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let callback: Callback<T> = Arc::new(callback);
        let (current, id) = {
            let mut state = self.inner.state.lock();
            let id = state.listeners.add(Sink::Callback(Arc::clone(&callback)));
            (state.value.clone(), id)
        };
        callback(&current);

        let owner: Arc<dyn ListenerOwner> = self.inner.clone();
        Subscription::new(owner, id)
    }

    /// Number of attached listeners
    pub fn listener_count(&self) -> usize {
        self.inner.state.lock().listeners.entries.len()
    }
}

impl<T: Clone + PartialEq + Send + 'static> ObservableCell<T> {
    /// Replace the value only if it differs. Returns whether it changed.
    pub fn set_if_changed(&self, value: T) -> bool {
        if self.inner.state.lock().value == value {
            return false;
        }
        self.set(value);
        true
    }
}

impl<T> Clone for ObservableCell<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for ObservableCell<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObservableCell")
            .field("value", &self.inner.state.lock().value)
            .finish()
    }
}
