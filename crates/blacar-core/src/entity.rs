//! Entity and aggregate-root abstractions.

use std::sync::Arc;

use uuid::Uuid;

use crate::event::DomainEvent;
use crate::value::FieldValue;

/// Generates a fresh entity identifier.
#[must_use]
pub fn new_id() -> Uuid {
    Uuid::new_v4()
}

/// A persisted, identity-bearing object.
pub trait Entity: Send + Sync {
    /// The globally unique identifier, assigned at creation and never
    /// reassigned.
    fn id(&self) -> Uuid;

    /// Resolves a flattened field path against this entity, including one
    /// level of relation traversal (a prefixed path is delegated to the
    /// related entity). Returns `None` when the path is not supported.
    fn field_value(&self, field: &str) -> Option<FieldValue>;
}

/// The append-only pending-event buffer an aggregate root embeds.
#[derive(Debug, Clone, Default)]
pub struct RecordedEvents {
    events: Vec<Arc<dyn DomainEvent>>,
}

impl RecordedEvents {
    /// Creates an empty buffer.
    #[must_use]
    pub const fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Appends an event.
    pub fn record<E: DomainEvent + 'static>(&mut self, event: E) {
        self.events.push(Arc::new(event));
    }

    /// Returns the pending events in append order and empties the buffer.
    /// A second pull returns an empty sequence.
    pub fn pull(&mut self) -> Vec<Arc<dyn DomainEvent>> {
        std::mem::take(&mut self.events)
    }

    /// Number of pending events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether no events are pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// An entity that is the unit of consistency and the sole point through
/// which domain events are captured before commit.
pub trait AggregateRoot: Entity {
    /// Drains the pending events exactly once: the current sequence is
    /// returned in append order and the buffer is left empty.
    fn pull_events(&mut self) -> Vec<Arc<dyn DomainEvent>>;
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    #[derive(Debug)]
    struct Noted {
        event_id: Uuid,
        occurred_at: chrono::DateTime<Utc>,
    }

    impl Noted {
        fn new() -> Self {
            Self {
                event_id: new_id(),
                occurred_at: Utc::now(),
            }
        }
    }

    impl DomainEvent for Noted {
        fn event_id(&self) -> Uuid {
            self.event_id
        }

        fn occurred_at(&self) -> chrono::DateTime<Utc> {
            self.occurred_at
        }

        fn event_type(&self) -> &'static str {
            "test.noted"
        }

        fn as_any(&self) -> &dyn std::any::Any {
            self
        }
    }

    #[test]
    fn test_pull_drains_exactly_once() {
        let mut events = RecordedEvents::new();
        let first = Noted::new();
        let second = Noted::new();
        let expected = vec![first.event_id, second.event_id];
        events.record(first);
        events.record(second);

        let pulled: Vec<Uuid> = events.pull().iter().map(|e| e.event_id()).collect();
        assert_eq!(pulled, expected);
        assert!(events.pull().is_empty());
    }
}
