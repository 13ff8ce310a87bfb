//! Domain event abstractions.

use std::any::Any;
use std::error::Error;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Trait that all domain events implement.
///
/// A domain event is an immutable fact produced by an aggregate during a
/// state transition. It is owned by the aggregate until pulled and is
/// never persisted by this layer: it is either dispatched or dropped.
pub trait DomainEvent: Send + Sync + std::fmt::Debug {
    /// Unique event identifier.
    fn event_id(&self) -> Uuid;

    /// Timestamp of event creation.
    fn occurred_at(&self) -> DateTime<Utc>;

    /// Event type name, used in diagnostics.
    fn event_type(&self) -> &'static str;

    /// Upcast used for exact runtime-type listener dispatch.
    fn as_any(&self) -> &dyn Any;
}

/// Error a listener may report; logged by the broker and never propagated.
pub type ListenerError = Box<dyn Error + Send + Sync>;

/// A listener callable registered for one event type.
pub type EventListener = Arc<dyn Fn(&dyn DomainEvent) -> Result<(), ListenerError> + Send + Sync>;
