//! Test broker — records dispatched events for deterministic assertions.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use blacar_core::broker::DomainEventBroker;
use blacar_core::event::{DomainEvent, EventListener};
use uuid::Uuid;

/// A domain event broker backed by an in-memory record of everything
/// dispatched through it. Listeners are only invoked when explicitly
/// enabled, so tests can assert "was event X dispatched?" without wiring
/// subscribers.
#[derive(Default)]
pub struct InMemoryDomainEventBroker {
    listeners: Mutex<HashMap<TypeId, Vec<EventListener>>>,
    dispatched: Mutex<Vec<Arc<dyn DomainEvent>>>,
    call_listeners: bool,
}

impl InMemoryDomainEventBroker {
    /// Creates a recording broker that does not invoke listeners.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a recording broker that also invokes registered listeners.
    #[must_use]
    pub fn with_listener_calls() -> Self {
        Self {
            call_listeners: true,
            ..Self::default()
        }
    }

    /// Whether an event with the given id was dispatched.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn dispatched(&self, event_id: Uuid) -> bool {
        self.dispatched
            .lock()
            .unwrap()
            .iter()
            .any(|event| event.event_id() == event_id)
    }

    /// Snapshot of all dispatched events, in dispatch order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn dispatched_events(&self) -> Vec<Arc<dyn DomainEvent>> {
        self.dispatched.lock().unwrap().clone()
    }
}

impl std::fmt::Debug for InMemoryDomainEventBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryDomainEventBroker")
            .field("call_listeners", &self.call_listeners)
            .finish()
    }
}

impl DomainEventBroker for InMemoryDomainEventBroker {
    fn register_listener(&self, event_type: TypeId, listener: EventListener) {
        self.listeners
            .lock()
            .unwrap()
            .entry(event_type)
            .or_default()
            .push(listener);
    }

    fn dispatch(&self, events: &[Arc<dyn DomainEvent>]) {
        for event in events {
            self.dispatched.lock().unwrap().push(Arc::clone(event));
            if !self.call_listeners {
                continue;
            }
            let registry = self.listeners.lock().unwrap();
            if let Some(listeners) = registry.get(&event.as_any().type_id()) {
                for listener in listeners {
                    if let Err(error) = listener(event.as_ref()) {
                        tracing::error!(
                            event_type = event.event_type(),
                            event_id = %event.event_id(),
                            %error,
                            "event listener failed; continuing dispatch"
                        );
                    }
                }
            }
        }
    }
}
