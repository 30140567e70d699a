//! Event handler registry.
//!
//! Registrations are additive: registering the same closure twice makes it
//! run twice per event. Callers keep the returned [`HandlerId`] to remove a
//! single handler later.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use taskboard_proto::{EventKind, ServerEvent};

/// Handle for one registered handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

type Handler = Arc<dyn Fn(&ServerEvent) + Send + Sync>;

/// Handlers keyed by event kind, in registration order.
#[derive(Default)]
pub struct HandlerRegistry {
    next_id: AtomicU64,
    handlers: Mutex<HashMap<EventKind, Vec<(HandlerId, Handler)>>>,
}

impl HandlerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for events of `kind`.
    pub fn add<F>(&self, kind: EventKind, handler: F) -> HandlerId
    where
        F: Fn(&ServerEvent) + Send + Sync + 'static,
    {
        let id = HandlerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.handlers
            .lock()
            .entry(kind)
            .or_default()
            .push((id, Arc::new(handler)));
        id
    }

    /// Removes one handler, or every handler of `kind` when `id` is `None`.
    ///
    /// Returns how many handlers were removed.
    pub fn remove(&self, kind: EventKind, id: Option<HandlerId>) -> usize {
        let mut handlers = self.handlers.lock();
        let Some(list) = handlers.get_mut(&kind) else {
            return 0;
        };
        let before = list.len();
        match id {
            Some(id) => list.retain(|(h, _)| *h != id),
            None => list.clear(),
        }
        before - list.len()
    }

    /// Number of handlers registered for `kind`.
    #[must_use]
    pub fn count(&self, kind: EventKind) -> usize {
        self.handlers.lock().get(&kind).map_or(0, Vec::len)
    }

    /// Invokes every handler registered for the event's kind.
    ///
    /// The lock is released before handlers run, so a handler may register
    /// or remove handlers without deadlocking.
    pub fn dispatch(&self, event: &ServerEvent) -> usize {
        let snapshot: Vec<Handler> = self
            .handlers
            .lock()
            .get(&event.kind())
            .map(|list| list.iter().map(|(_, h)| Arc::clone(h)).collect())
            .unwrap_or_default();
        for handler in &snapshot {
            handler(event);
        }
        snapshot.len()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let handlers = self.handlers.lock();
        let counts: HashMap<_, _> = handlers.iter().map(|(k, v)| (*k, v.len())).collect();
        f.debug_struct("HandlerRegistry")
            .field("handlers", &counts)
            .finish_non_exhaustive()
    }
}
