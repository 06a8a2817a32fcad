//! # Domain event bus.
//!
//! [`EventBus`] is the subscription seam every dispatcher binds against.
//! [`DomainEvents`] is the in-process implementation used by the server.
//!
//! ## Rules
//! - **Fan-out per handler**: `publish()` spawns one task per subscribed
//!   handler, so a slow or failing handler never delays another.
//! - **No ordering** across handlers, even for the same event. Tasks are
//!   spawned in registration order but may complete in any order.
//! - **No persistence**: events published with no subscriber are dropped.
//! - **No deduplication**: subscribing the same handler twice delivers every
//!   event to it twice.
//!
//! ```text
//! publish(event) ──► [handler 1 task]
//!                ├─► [handler 2 task]
//!                └─► [handler N task]
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use futures_util::future::BoxFuture;
use tokio::task::JoinHandle;

use crate::event::{Event, EventKind};

/// Future returned by a bus handler. Resolves to `()`: there is no channel
/// for a handler to hand an error back to the bus.
pub type HandlerFuture = BoxFuture<'static, ()>;

/// A handler bound to an event identifier.
pub type Handler = Arc<dyn Fn(Arc<Event>) -> HandlerFuture + Send + Sync>;

/// Subscription interface of the process-wide event bus.
pub trait EventBus: Send + Sync {
    /// Binds `handler` to every future event delivered under `kind`.
    fn subscribe(&self, kind: EventKind, handler: Handler);
}

/// In-process event bus backed by spawned tokio tasks.
///
/// Uses `std::sync` locks: every acquisition is a short map or vector
/// operation that never spans an `.await`.
#[derive(Default)]
pub struct DomainEvents {
    handlers: RwLock<HashMap<EventKind, Vec<Handler>>>,
    in_flight: Mutex<Vec<JoinHandle<()>>>,
}

impl DomainEvents {
    /// Creates an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers `event` to every handler subscribed to its kind.
    ///
    /// Returns immediately with the number of handlers scheduled. Must be
    /// called from within a tokio runtime.
    pub fn publish(&self, event: Event) -> usize {
        let kind = event.kind();
        let handlers: Vec<Handler> = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .cloned()
            .unwrap_or_default();

        if handlers.is_empty() {
            tracing::trace!(event = %kind, "no subscribers for event");
            return 0;
        }

        let event = Arc::new(event);
        let spawned: Vec<JoinHandle<()>> = handlers
            .iter()
            .map(|handler| tokio::spawn((**handler)(Arc::clone(&event))))
            .collect();

        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        in_flight.retain(|task| !task.is_finished());
        in_flight.extend(spawned);

        tracing::debug!(event = %kind, handlers = handlers.len(), "published event");
        handlers.len()
    }

    /// Waits until every handler task spawned so far has finished,
    /// including tasks spawned by handlers while waiting.
    pub async fn settled(&self) {
        loop {
            let pending = std::mem::take(
                &mut *self.in_flight.lock().unwrap_or_else(PoisonError::into_inner),
            );
            if pending.is_empty() {
                return;
            }
            for task in pending {
                if let Err(err) = task.await {
                    tracing::warn!(error = %err, "event handler task did not complete");
                }
            }
        }
    }

    /// Number of handlers currently bound to `kind`.
    pub fn subscriber_count(&self, kind: &EventKind) -> usize {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(kind)
            .map_or(0, Vec::len)
    }
}

impl EventBus for DomainEvents {
    fn subscribe(&self, kind: EventKind, handler: Handler) {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(kind)
            .or_default()
            .push(handler);
    }
}
