//! Domain event broker.
//!
//! The broker is constructed once during process initialization and
//! handed to collaborators as `Arc<dyn DomainEventBroker>`; there is no
//! implicit global resolution. The listener registry is populated at
//! startup and read-mostly afterwards.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::event::{DomainEvent, EventListener, ListenerError};

/// Publish/subscribe bus for domain events.
pub trait DomainEventBroker: Send + Sync {
    /// Associates a listener with an event type. Multiple listeners per
    /// type are allowed and are called in registration order.
    fn register_listener(&self, event_type: TypeId, listener: EventListener);

    /// Delivers each event to all listeners registered for its exact
    /// runtime type. A listener failure is logged and skipped; it never
    /// aborts delivery of the remaining listeners or events.
    fn dispatch(&self, events: &[Arc<dyn DomainEvent>]);
}

/// Typed registration sugar over the object-safe broker contract.
pub trait DomainEventBrokerExt: DomainEventBroker {
    /// Registers a listener for the concrete event type `E`.
    fn listen<E, F>(&self, listener: F)
    where
        E: DomainEvent + 'static,
        F: Fn(&E) -> Result<(), ListenerError> + Send + Sync + 'static,
    {
        self.register_listener(
            TypeId::of::<E>(),
            Arc::new(move |event: &dyn DomainEvent| {
                match event.as_any().downcast_ref::<E>() {
                    Some(typed) => listener(typed),
                    // Registry keys by TypeId, so this cannot be reached
                    // through dispatch; ignore rather than fail.
                    None => Ok(()),
                }
            }),
        );
    }
}

impl<B: DomainEventBroker + ?Sized> DomainEventBrokerExt for B {}

/// Production broker delivering events synchronously to registered
/// listeners, in registration order.
#[derive(Default)]
pub struct SignalDomainEventBroker {
    listeners: RwLock<HashMap<TypeId, Vec<EventListener>>>,
}

impl SignalDomainEventBroker {
    /// Creates an empty broker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl std::fmt::Debug for SignalDomainEventBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalDomainEventBroker").finish()
    }
}

impl DomainEventBroker for SignalDomainEventBroker {
    fn register_listener(&self, event_type: TypeId, listener: EventListener) {
        let mut registry = self
            .listeners
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        registry.entry(event_type).or_default().push(listener);
    }

    fn dispatch(&self, events: &[Arc<dyn DomainEvent>]) {
        let registry = self
            .listeners
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        for event in events {
            let type_id = event.as_any().type_id();
            let Some(listeners) = registry.get(&type_id).filter(|l| !l.is_empty()) else {
                tracing::warn!(
                    event_type = event.event_type(),
                    event_id = %event.event_id(),
                    "no listener registered for event"
                );
                continue;
            };
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
