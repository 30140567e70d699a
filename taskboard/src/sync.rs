//! Wires realtime task events into a [`TaskStore`].

use std::sync::Arc;

use taskboard_proto::{EventKind, ServerEvent};

use crate::api::TaskApi;
use crate::realtime::{HandlerId, RealtimeClient};
use crate::store::{Notifier, TaskStore};

/// The handlers one store registered on one client.
///
/// Call [`detach`](Self::detach) before attaching again, otherwise every
/// event is merged twice.
#[derive(Debug)]
#[must_use = "dropping the binding leaks its handlers; call detach"]
pub struct SyncBinding {
    handlers: Vec<(EventKind, HandlerId)>,
}

impl SyncBinding {
    /// Forwards the four task events from `client` into `store`.
    pub fn attach<A: TaskApi, N: Notifier>(
        client: &RealtimeClient,
        store: Arc<TaskStore<A, N>>,
    ) -> Self {
        Self::attach_with(client, store, |_| {})
    }

    /// Like [`attach`](Self::attach), also calling `on_applied` for each
    /// event that changed the store.
    pub fn attach_with<A, N, F>(
        client: &RealtimeClient,
        store: Arc<TaskStore<A, N>>,
        on_applied: F,
    ) -> Self
    where
        A: TaskApi,
        N: Notifier,
        F: Fn(&ServerEvent) + Send + Sync + 'static,
    {
        let on_applied = Arc::new(on_applied);
        let handlers = EventKind::ALL
            .into_iter()
            .filter(|kind| kind.is_task_event())
            .map(|kind| {
                let store = Arc::clone(&store);
                let on_applied = Arc::clone(&on_applied);
                let id = client.on(kind, move |event| {
                    if store.apply_remote(event) {
                        on_applied(event);
                    }
                });
                (kind, id)
            })
            .collect();
        Self { handlers }
    }

    /// Removes exactly the handlers this binding registered.
    pub fn detach(self, client: &RealtimeClient) {
        for (kind, id) in self.handlers {
            client.off(kind, Some(id));
        }
    }

    /// Number of registered handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
