//! In-process event bus.
//!
//! Handlers are registered per [`EventKind`] and invoked synchronously on the
//! emitter's thread, in registration order. Registering returns a
//! [`ListenerHandle`] that detaches the handler again.

use crate::event::EventKind;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak};

/// Callback invoked with the raw event payload.
pub type Handler = Arc<dyn Fn(&Value) + Send + Sync>;

type HandlerMap = HashMap<EventKind, Vec<(u64, Handler)>>;

#[derive(Default)]
struct BusInner {
    handlers: RwLock<HandlerMap>,
    next_id: AtomicU64,
}

impl BusInner {
    fn remove(&self, kind: EventKind, id: u64) -> bool {
        let mut handlers = self
            .handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let Some(list) = handlers.get_mut(&kind) else {
            return false;
        };
        let before = list.len();
        list.retain(|(handler_id, _)| *handler_id != id);
        before != list.len()
    }
}

/// Publish/subscribe hub for build events. Cheap to clone.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for events of `kind`.
    pub fn on<F>(&self, kind: EventKind, handler: F) -> ListenerHandle
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(kind)
            .or_default()
            .push((id, Arc::new(handler)));

        tracing::debug!(event = %kind, listener_id = id, "Listener registered");

        ListenerHandle {
            kind,
            id,
            bus: Arc::downgrade(&self.inner),
        }
    }

    /// Deliver `payload` to every handler registered for `kind`.
    ///
    /// Handlers are snapshotted first, so a handler may register or cancel
    /// listeners without deadlocking. Returns the number of handlers invoked.
    pub fn emit(&self, kind: EventKind, payload: &Value) -> usize {
        let snapshot: Vec<Handler> = self
            .inner
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .map(|list| list.iter().map(|(_, h)| Arc::clone(h)).collect())
            .unwrap_or_default();

        if snapshot.is_empty() {
            tracing::trace!(event = %kind, "No listeners for event");
        }

        for handler in &snapshot {
            handler(payload);
        }
        snapshot.len()
    }

    /// Number of handlers currently registered for `kind`.
    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.inner
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .map_or(0, Vec::len)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let counts: Vec<(EventKind, usize)> = EventKind::ALL
            .iter()
            .map(|kind| (*kind, self.listener_count(*kind)))
            .collect();
        f.debug_struct("EventBus")
            .field("listeners", &counts)
            .finish()
    }
}

/// Registration handle returned by [`EventBus::on`].
///
/// Dropping the handle keeps the handler registered; call
/// [`cancel`](Self::cancel) to detach it.
#[derive(Debug, Clone)]
pub struct ListenerHandle {
    kind: EventKind,
    id: u64,
    bus: Weak<BusInner>,
}

impl ListenerHandle {
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Detach the handler. Returns false if it was already removed or the
    /// bus is gone.
    pub fn cancel(&self) -> bool {
        match self.bus.upgrade() {
            Some(bus) => {
                let removed = bus.remove(self.kind, self.id);
                if removed {
                    tracing::debug!(event = %self.kind, listener_id = self.id, "Listener cancelled");
                }
                removed
            }
            None => false,
        }
    }

    /// Whether the handler is still registered.
    pub fn is_active(&self) -> bool {
        self.bus.upgrade().is_some_and(|bus| {
            bus.handlers
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .get(&self.kind)
                .is_some_and(|list| list.iter().any(|(id, _)| *id == self.id))
        })
    }
}
