//! Repository contract for aggregate roots.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::broker::DomainEventBroker;
use crate::entity::AggregateRoot;
use crate::error::DomainError;
use crate::event::DomainEvent;
use crate::filters::BoundFilters;
use crate::pagination::{Paged, Pagination};

/// Events pulled from an aggregate by a committed store operation, not
/// yet delivered to listeners.
///
/// A `store` implementation returns this only after the write durably
/// committed; the transaction-boundary caller then invokes
/// [`PendingDispatch::dispatch`]. A failed or rolled-back store returns
/// `Err` instead, so dispatch can never happen for a discarded write.
#[must_use = "pending events are not delivered until dispatched"]
#[derive(Debug)]
pub struct PendingDispatch {
    events: Vec<Arc<dyn DomainEvent>>,
}

impl PendingDispatch {
    /// Wraps the events pulled from a stored aggregate.
    #[must_use]
    pub const fn new(events: Vec<Arc<dyn DomainEvent>>) -> Self {
        Self { events }
    }

    /// The undispatched events, in append order.
    #[must_use]
    pub fn events(&self) -> &[Arc<dyn DomainEvent>] {
        &self.events
    }

    /// Whether the store produced no events.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Delivers the events through the broker, in append order.
    ///
    /// Best-effort: the broker logs and skips failing listeners, so a
    /// downstream subscriber fault can never surface to the caller of an
    /// already-committed write.
    pub fn dispatch(self, broker: &dyn DomainEventBroker) {
        if !self.events.is_empty() {
            broker.dispatch(&self.events);
        }
    }
}

/// Contract for loading, searching, and persisting aggregate roots.
///
/// Criteria arrive pre-bound ([`BoundFilters`]); implementations turn
/// the bound expressions into their native query form.
#[async_trait]
pub trait Repository<A: AggregateRoot>: Send + Sync {
    /// Returns the single aggregate matching `criteria`.
    ///
    /// `for_update` requests a write-intent lock on the matched record
    /// for the duration of the enclosing transaction.
    ///
    /// # Errors
    ///
    /// `NotFound` when `criteria` is empty (a single-result lookup must
    /// constrain something) or when nothing matches.
    async fn get(&self, criteria: &BoundFilters, for_update: bool) -> Result<A, DomainError>;

    /// Direct identity lookup.
    ///
    /// # Errors
    ///
    /// `NotFound` when no record carries `id`.
    async fn get_by_id(&self, id: Uuid, for_update: bool) -> Result<A, DomainError>;

    /// Applies the criteria's predicates (empty criteria means "no
    /// filter"), then its ordering (which takes precedence over the
    /// repository default), then pagination. Zero matches is an empty
    /// success, never `NotFound`.
    ///
    /// # Errors
    ///
    /// `Storage` for store-level failures; `Validation` for unusable
    /// pagination input.
    async fn find(
        &self,
        criteria: &BoundFilters,
        pagination: &Pagination,
    ) -> Result<Paged<A>, DomainError>;

    /// Persists the aggregate with create-or-update semantics, then pulls
    /// its pending events into the returned [`PendingDispatch`].
    ///
    /// # Errors
    ///
    /// `Conflict` for uniqueness violations, `Storage` otherwise; on any
    /// error the aggregate keeps its pending events.
    async fn store(&self, aggregate: &mut A) -> Result<PendingDispatch, DomainError>;
}
