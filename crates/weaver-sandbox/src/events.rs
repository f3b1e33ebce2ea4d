//! Fan-out of sandbox events to listeners.
//!
//! Listeners are a multiset per [`EventKind`]: registering the same closure
//! twice delivers every event twice. Delivery happens on the transport's
//! reader task, in arrival order.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::broadcast;
use tracing::trace;
use weaver_protocol::{EventKind, SandboxEvent};

/// Default capacity of the wildcard channel.
const DEFAULT_CAPACITY: usize = 256;

type Listener = Arc<dyn Fn(&SandboxEvent) + Send + Sync>;

/// Registry of event listeners.
pub struct EventHub {
    inner: Mutex<HubInner>,
    /// Wildcard subscribers (receive every event).
    wildcard: broadcast::Sender<SandboxEvent>,
}

#[derive(Default)]
struct HubInner {
    next_id: u64,
    listeners: HashMap<EventKind, Vec<(u64, Listener)>>,
}

impl EventHub {
    pub fn new() -> Arc<Self> {
        let (wildcard, _) = broadcast::channel(DEFAULT_CAPACITY);
        Arc::new(Self {
            inner: Mutex::new(HubInner::default()),
            wildcard,
        })
    }

    /// Register a listener for one event kind.
    ///
    /// The listener stays registered until the returned [`Subscription`] is
    /// unsubscribed or dropped.
    pub fn on<F>(self: &Arc<Self>, kind: EventKind, listener: F) -> Subscription
    where
        F: Fn(&SandboxEvent) + Send + Sync + 'static,
    {
        let mut inner = self.lock();
        inner.next_id += 1;
        let id = inner.next_id;
        inner
            .listeners
            .entry(kind)
            .or_default()
            .push((id, Arc::new(listener)));

        Subscription {
            hub: Arc::downgrade(self),
            kind,
            id,
            active: true,
        }
    }

    /// Subscribe to every event as an async stream.
    pub fn subscribe_all(&self) -> broadcast::Receiver<SandboxEvent> {
        self.wildcard.subscribe()
    }

    /// Number of listeners registered for a kind.
    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.lock().listeners.get(&kind).map_or(0, Vec::len)
    }

    /// Deliver an event to every listener of its kind.
    pub fn emit(&self, event: &SandboxEvent) {
        let kind = event.kind();
        // Snapshot so listeners may (un)subscribe re-entrantly.
        let listeners: Vec<Listener> = self
            .lock()
            .listeners
            .get(&kind)
            .map(|entries| entries.iter().map(|(_, l)| Arc::clone(l)).collect())
            .unwrap_or_default();

        trace!(event = %kind, listeners = listeners.len(), "Dispatching sandbox event");
        for listener in listeners {
            listener(event);
        }

        // Ignore send errors (no receivers)
        let _ = self.wildcard.send(event.clone());
    }

    fn remove(&self, kind: EventKind, id: u64) {
        let mut inner = self.lock();
        if let Some(entries) = inner.listeners.get_mut(&kind) {
            entries.retain(|(entry_id, _)| *entry_id != id);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HubInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Handle returned by [`EventHub::on`].
#[must_use = "dropping a Subscription unregisters its listener"]
pub struct Subscription {
    hub: Weak<EventHub>,
    kind: EventKind,
    id: u64,
    active: bool,
}

impl Subscription {
    /// Unregister the listener.
    pub fn unsubscribe(mut self) {
        self.release();
    }

    /// Keep the listener registered for the lifetime of the hub.
    pub fn detach(mut self) {
        self.active = false;
    }

    fn release(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        if let Some(hub) = self.hub.upgrade() {
            hub.remove(self.kind, self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}
