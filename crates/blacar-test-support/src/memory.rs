//! In-memory repository — the second implementation of the repository
//! contract, evaluating predicates in-process over an ordered collection.
//!
//! Single-threaded and test-only: `for_update` is accepted for contract
//! compatibility but takes no lock, and there are no concurrent-access
//! guarantees beyond the internal mutex.

use std::sync::Mutex;

use async_trait::async_trait;
use blacar_core::criteria::{Direction, Ordering};
use blacar_core::entity::{AggregateRoot, Entity};
use blacar_core::error::DomainError;
use blacar_core::filters::{BoundFilters, FilterExpr};
use blacar_core::pagination::{
    Continuation, CursorToken, Paged, Pagination, effective_ordering, is_after, ordering_key,
    slice_page,
};
use blacar_core::repository::{PendingDispatch, Repository};
use blacar_core::value::FieldValue;
use uuid::Uuid;

/// An in-memory collection adapted to the repository contract.
pub struct InMemoryRepository<A> {
    instances: Mutex<Vec<A>>,
    default_ordering: Ordering,
}

impl<A> Default for InMemoryRepository<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> InMemoryRepository<A> {
    /// Creates an empty repository ordered by id by default.
    #[must_use]
    pub fn new() -> Self {
        Self {
            instances: Mutex::new(Vec::new()),
            default_ordering: Ordering::asc("id"),
        }
    }

    /// Creates a repository seeded with the given instances, preserving
    /// their order.
    #[must_use]
    pub fn with_instances(instances: Vec<A>) -> Self {
        Self {
            instances: Mutex::new(instances),
            default_ordering: Ordering::asc("id"),
        }
    }

    /// Overrides the default ordering used by cursor pagination when the
    /// criteria declares none.
    #[must_use]
    pub fn with_default_ordering(mut self, ordering: Ordering) -> Self {
        self.default_ordering = ordering;
        self
    }

    /// Number of stored instances.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.instances.lock().unwrap().len()
    }

    /// Whether the repository holds no instances.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn value_of<A: Entity>(instance: &A, field: &str) -> Option<FieldValue> {
    if field == "id" {
        Some(FieldValue::Uuid(instance.id()))
    } else {
        instance.field_value(field)
    }
}

impl<A: AggregateRoot + Clone> InMemoryRepository<A> {
    fn matches(instance: &A, expr: &FilterExpr) -> bool {
        let Some(field_value) = value_of(instance, &expr.field) else {
            tracing::warn!(
                field = expr.field,
                "filter field is not supported by this entity; treating as no match"
            );
            return false;
        };
        match expr.op.evaluate(&field_value, &expr.value) {
            Some(matched) => matched,
            None => {
                tracing::warn!(
                    field = expr.field,
                    op = ?expr.op,
                    "filter expression is not supported in-memory; treating as no match"
                );
                false
            }
        }
    }

    fn filtered(&self, criteria: &BoundFilters) -> Vec<A> {
        self.instances
            .lock()
            .unwrap()
            .iter()
            .filter(|instance| {
                criteria
                    .expressions()
                    .iter()
                    .all(|expr| Self::matches(instance, expr))
            })
            .cloned()
            .collect()
    }

    // Stable sorts applied in reverse field order, so earlier ordering
    // keys take precedence over later ones.
    fn sort(items: &mut [A], ordering: &Ordering) {
        for key in ordering.fields().iter().rev() {
            items.sort_by(|a, b| {
                let cmp = match (value_of(a, &key.field), value_of(b, &key.field)) {
                    (Some(left), Some(right)) => {
                        left.compare(&right).unwrap_or(std::cmp::Ordering::Equal)
                    }
                    _ => std::cmp::Ordering::Equal,
                };
                match key.direction {
                    Direction::Asc => cmp,
                    Direction::Desc => cmp.reverse(),
                }
            });
        }
    }
}

#[async_trait]
impl<A: AggregateRoot + Clone + 'static> Repository<A> for InMemoryRepository<A> {
    async fn get(&self, criteria: &BoundFilters, _for_update: bool) -> Result<A, DomainError> {
        if criteria.is_empty() {
            return Err(DomainError::not_found());
        }
        self.filtered(criteria)
            .into_iter()
            .next()
            .ok_or_else(|| DomainError::not_found_with(criteria.to_details()))
    }

    async fn get_by_id(&self, id: Uuid, _for_update: bool) -> Result<A, DomainError> {
        self.instances
            .lock()
            .unwrap()
            .iter()
            .find(|instance| instance.id() == id)
            .cloned()
            .ok_or(DomainError::not_found())
    }

    async fn find(
        &self,
        criteria: &BoundFilters,
        pagination: &Pagination,
    ) -> Result<Paged<A>, DomainError> {
        let mut matched = self.filtered(criteria);
        match pagination {
            Pagination::Page { page, size } => {
                if let Some(order) = criteria.order() {
                    Self::sort(&mut matched, order);
                }
                Ok(slice_page(matched, *page, *size))
            }
            Pagination::Cursor { after, limit } => {
                let ordering = effective_ordering(criteria.order(), &self.default_ordering);
                Self::sort(&mut matched, &ordering);
                if let Some(token) = after {
                    if token.keys().len() != ordering.fields().len() {
                        return Err(DomainError::validation_on(
                            "cursor",
                            "cursor token does not match the query ordering",
                        ));
                    }
                    matched.retain(|instance| {
                        ordering_key(instance, &ordering)
                            .is_some_and(|keys| is_after(&keys, token, &ordering))
                    });
                }
                let limit = *limit as usize;
                let mut items = matched;
                let next = if items.len() > limit {
                    items.truncate(limit);
                    items
                        .last()
                        .and_then(|last| ordering_key(last, &ordering))
                        .map(|keys| Continuation::Cursor(CursorToken::new(keys)))
                } else {
                    None
                };
                Ok(Paged { items, next })
            }
        }
    }

    async fn store(&self, aggregate: &mut A) -> Result<PendingDispatch, DomainError> {
        let events = aggregate.pull_events();
        let mut instances = self.instances.lock().unwrap();
        match instances
            .iter_mut()
            .find(|instance| instance.id() == aggregate.id())
        {
            Some(existing) => *existing = aggregate.clone(),
            None => instances.push(aggregate.clone()),
        }
        Ok(PendingDispatch::new(events))
    }
}
