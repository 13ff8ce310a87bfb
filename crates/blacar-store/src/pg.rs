//! `PostgreSQL` repository: compiled criteria render to parameterized SQL.
//!
//! Queries are constructed at runtime (not compile-time checked) so no
//! live database is required at build time. Column and table names come
//! from aggregate bindings and are validated before interpolation; every
//! value is bound as a parameter.

use std::marker::PhantomData;

use async_trait::async_trait;
use blacar_core::criteria::{Direction, Ordering};
use blacar_core::entity::AggregateRoot;
use blacar_core::error::DomainError;
use blacar_core::filters::BoundFilters;
use blacar_core::pagination::{
    Continuation, CursorToken, Paged, Pagination, effective_ordering, ordering_key,
};
use blacar_core::repository::{PendingDispatch, Repository};
use blacar_core::value::{CompareOp, FieldValue};
use sqlx::postgres::PgRow;
use sqlx::{PgExecutor, PgPool, Postgres, QueryBuilder, Transaction};
use uuid::Uuid;

/// Binds an aggregate root to its `PostgreSQL` table.
///
/// Compiled filter field paths double as column names, so flattened
/// relation paths (for example `driver_rating`) must exist as columns on
/// the table, denormalized or projected by a view.
pub trait PgAggregate: AggregateRoot + Sized {
    /// Table name.
    const TABLE: &'static str;

    /// Column names selected for hydration, `id` first.
    const COLUMNS: &'static [&'static str];

    /// Hydrates an aggregate from a row, without pending events.
    ///
    /// # Errors
    ///
    /// Returns a storage error when the row does not match [`Self::COLUMNS`].
    fn from_row(row: &PgRow) -> Result<Self, DomainError>;

    /// The column values to persist, `id` first. `None` renders as SQL
    /// `NULL`.
    fn column_values(&self) -> Vec<(&'static str, Option<FieldValue>)>;

    /// Ordering applied by cursor pagination when the criteria declares
    /// none.
    #[must_use]
    fn default_ordering() -> Ordering {
        Ordering::asc("id")
    }
}

fn check_ident(name: &str) -> Result<(), DomainError> {
    let valid = !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_');
    if valid {
        Ok(())
    } else {
        Err(DomainError::storage(format!(
            "invalid SQL identifier: {name}"
        )))
    }
}

fn storage_error(error: sqlx::Error) -> DomainError {
    DomainError::storage(error.to_string())
}

/// Extracts the violated field from a uniqueness constraint named by the
/// `<table>_<field>_key` convention.
fn constraint_field(table: &str, constraint: &str) -> Option<String> {
    constraint
        .strip_prefix(table)?
        .strip_prefix('_')?
        .strip_suffix("_key")
        .map(str::to_owned)
}

fn map_store_error(table: &str, error: sqlx::Error) -> DomainError {
    if let sqlx::Error::Database(db) = &error
        && db.is_unique_violation()
    {
        let field = db
            .constraint()
            .and_then(|name| constraint_field(table, name))
            .unwrap_or_else(|| "id".to_owned());
        return DomainError::conflict(field);
    }
    storage_error(error)
}

fn push_scalar(
    query: &mut QueryBuilder<'static, Postgres>,
    value: &FieldValue,
) -> Result<(), DomainError> {
    match value {
        FieldValue::Str(v) => query.push_bind(v.clone()),
        FieldValue::Uuid(v) => query.push_bind(*v),
        FieldValue::Bool(v) => query.push_bind(*v),
        FieldValue::Int(v) => query.push_bind(*v),
        FieldValue::Float(v) => query.push_bind(*v),
        FieldValue::Date(v) => query.push_bind(*v),
        FieldValue::DateTime(v) => query.push_bind(*v),
        FieldValue::List(_) => {
            return Err(DomainError::storage(
                "list values only bind inside IN predicates",
            ));
        }
    };
    Ok(())
}

/// Renders the criteria's predicates as a `WHERE` conjunction. Returns
/// whether a `WHERE` clause was emitted.
fn push_predicates(
    query: &mut QueryBuilder<'static, Postgres>,
    criteria: &BoundFilters,
) -> Result<bool, DomainError> {
    let mut any = false;
    for expr in criteria.expressions() {
        check_ident(&expr.field)?;
        query.push(if any { " AND " } else { " WHERE " });
        any = true;
        if expr.op == CompareOp::In {
            match &expr.value {
                // An empty membership list matches nothing.
                FieldValue::List(values) if values.is_empty() => {
                    query.push("FALSE");
                }
                FieldValue::List(values) => {
                    query.push(expr.field.clone());
                    query.push(" IN (");
                    for (index, value) in values.iter().enumerate() {
                        if index > 0 {
                            query.push(", ");
                        }
                        push_scalar(query, value)?;
                    }
                    query.push(")");
                }
                value => {
                    query.push(expr.field.clone());
                    query.push(" IN (");
                    push_scalar(query, value)?;
                    query.push(")");
                }
            }
        } else {
            query.push(expr.field.clone());
            query.push(" ");
            query.push(expr.op.sql());
            query.push(" ");
            push_scalar(query, &expr.value)?;
        }
    }
    Ok(any)
}

fn push_ordering(
    query: &mut QueryBuilder<'static, Postgres>,
    ordering: &Ordering,
) -> Result<(), DomainError> {
    if ordering.fields().is_empty() {
        return Ok(());
    }
    query.push(" ORDER BY ");
    for (index, key) in ordering.fields().iter().enumerate() {
        check_ident(&key.field)?;
        if index > 0 {
            query.push(", ");
        }
        query.push(key.field.clone());
        query.push(match key.direction {
            Direction::Asc => " ASC",
            Direction::Desc => " DESC",
        });
    }
    Ok(())
}

/// Renders the keyset seek predicate: a row-comparison expansion that
/// stays correct under mixed sort directions.
///
/// For ordering keys `k1..kn` this produces
/// `((k1 after v1) OR (k1 = v1 AND k2 after v2) OR ...)` where `after`
/// is `>` for ascending keys and `<` for descending ones.
fn push_seek(
    query: &mut QueryBuilder<'static, Postgres>,
    ordering: &Ordering,
    token: &CursorToken,
    where_started: bool,
) -> Result<(), DomainError> {
    let keys = ordering.fields();
    if token.keys().len() != keys.len() {
        return Err(DomainError::validation_on(
            "cursor",
            "cursor token does not match the query ordering",
        ));
    }
    query.push(if where_started { " AND (" } else { " WHERE (" });
    for (index, key) in keys.iter().enumerate() {
        if index > 0 {
            query.push(" OR ");
        }
        query.push("(");
        for (prior, value) in keys.iter().zip(token.keys()).take(index) {
            check_ident(&prior.field)?;
            query.push(prior.field.clone());
            query.push(" = ");
            push_scalar(query, value)?;
            query.push(" AND ");
        }
        check_ident(&key.field)?;
        query.push(key.field.clone());
        query.push(match key.direction {
            Direction::Asc => " > ",
            Direction::Desc => " < ",
        });
        push_scalar(query, &token.keys()[index])?;
        query.push(")");
    }
    query.push(")");
    Ok(())
}

fn select_from<A: PgAggregate>() -> Result<QueryBuilder<'static, Postgres>, DomainError> {
    check_ident(A::TABLE)?;
    let mut query = QueryBuilder::new("SELECT ");
    for (index, column) in A::COLUMNS.iter().enumerate() {
        check_ident(column)?;
        if index > 0 {
            query.push(", ");
        }
        query.push(*column);
    }
    query.push(" FROM ");
    query.push(A::TABLE);
    Ok(query)
}

fn build_get<A: PgAggregate>(
    criteria: &BoundFilters,
    for_update: bool,
) -> Result<QueryBuilder<'static, Postgres>, DomainError> {
    let mut query = select_from::<A>()?;
    push_predicates(&mut query, criteria)?;
    query.push(" LIMIT 1");
    if for_update {
        query.push(" FOR UPDATE");
    }
    Ok(query)
}

fn build_get_by_id<A: PgAggregate>(
    id: Uuid,
    for_update: bool,
) -> Result<QueryBuilder<'static, Postgres>, DomainError> {
    let mut query = select_from::<A>()?;
    query.push(" WHERE id = ");
    query.push_bind(id);
    if for_update {
        query.push(" FOR UPDATE");
    }
    Ok(query)
}

fn build_find_page<A: PgAggregate>(
    criteria: &BoundFilters,
    page: u32,
    size: u32,
) -> Result<QueryBuilder<'static, Postgres>, DomainError> {
    let mut query = select_from::<A>()?;
    push_predicates(&mut query, criteria)?;
    if let Some(order) = criteria.order() {
        push_ordering(&mut query, order)?;
    }
    // One surplus row signals continuation without a count query.
    query.push(" LIMIT ");
    query.push_bind(i64::from(size) + 1);
    query.push(" OFFSET ");
    query.push_bind(i64::from(page) * i64::from(size));
    Ok(query)
}

fn build_find_cursor<A: PgAggregate>(
    criteria: &BoundFilters,
    ordering: &Ordering,
    after: Option<&CursorToken>,
    limit: u32,
) -> Result<QueryBuilder<'static, Postgres>, DomainError> {
    let mut query = select_from::<A>()?;
    let has_where = push_predicates(&mut query, criteria)?;
    if let Some(token) = after {
        push_seek(&mut query, ordering, token, has_where)?;
    }
    push_ordering(&mut query, ordering)?;
    query.push(" LIMIT ");
    query.push_bind(i64::from(limit) + 1);
    Ok(query)
}

fn build_upsert<A: PgAggregate>(
    aggregate: &A,
) -> Result<QueryBuilder<'static, Postgres>, DomainError> {
    check_ident(A::TABLE)?;
    let values = aggregate.column_values();
    let mut query = QueryBuilder::new("INSERT INTO ");
    query.push(A::TABLE);
    query.push(" (");
    for (index, (column, _)) in values.iter().enumerate() {
        check_ident(column)?;
        if index > 0 {
            query.push(", ");
        }
        query.push(*column);
    }
    query.push(") VALUES (");
    for (index, (_, value)) in values.iter().enumerate() {
        if index > 0 {
            query.push(", ");
        }
        match value {
            Some(value) => push_scalar(&mut query, value)?,
            None => {
                query.push("NULL");
            }
        }
    }
    if values.len() > 1 {
        query.push(") ON CONFLICT (id) DO UPDATE SET ");
        let mut first = true;
        for (column, _) in &values {
            if *column == "id" {
                continue;
            }
            if !first {
                query.push(", ");
            }
            first = false;
            query.push(*column);
            query.push(" = EXCLUDED.");
            query.push(*column);
        }
    } else {
        query.push(") ON CONFLICT (id) DO NOTHING");
    }
    Ok(query)
}

/// A `PostgreSQL`-backed repository for one aggregate type.
pub struct PgRepository<A> {
    pool: PgPool,
    default_ordering: Ordering,
    _marker: PhantomData<fn() -> A>,
}

impl<A> std::fmt::Debug for PgRepository<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgRepository")
            .field("default_ordering", &self.default_ordering)
            .finish_non_exhaustive()
    }
}

impl<A: PgAggregate> PgRepository<A> {
    /// Creates a repository over the given pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            default_ordering: A::default_ordering(),
            _marker: PhantomData,
        }
    }

    async fn fetch_get(
        &self,
        executor: impl PgExecutor<'_>,
        criteria: &BoundFilters,
        for_update: bool,
    ) -> Result<A, DomainError> {
        if criteria.is_empty() {
            return Err(DomainError::not_found());
        }
        let mut query = build_get::<A>(criteria, for_update)?;
        let row = query
            .build()
            .fetch_optional(executor)
            .await
            .map_err(storage_error)?;
        match row {
            Some(row) => A::from_row(&row),
            None => Err(DomainError::not_found_with(criteria.to_details())),
        }
    }

    async fn fetch_get_by_id(
        &self,
        executor: impl PgExecutor<'_>,
        id: Uuid,
        for_update: bool,
    ) -> Result<A, DomainError> {
        let mut query = build_get_by_id::<A>(id, for_update)?;
        let row = query
            .build()
            .fetch_optional(executor)
            .await
            .map_err(storage_error)?;
        match row {
            Some(row) => A::from_row(&row),
            None => Err(DomainError::not_found()),
        }
    }

    async fn fetch_find(
        &self,
        executor: impl PgExecutor<'_>,
        criteria: &BoundFilters,
        pagination: &Pagination,
    ) -> Result<Paged<A>, DomainError> {
        match pagination {
            Pagination::Page { page, size } => {
                let mut query = build_find_page::<A>(criteria, *page, *size)?;
                let rows = query
                    .build()
                    .fetch_all(executor)
                    .await
                    .map_err(storage_error)?;
                let mut items = rows
                    .iter()
                    .map(A::from_row)
                    .collect::<Result<Vec<_>, _>>()?;
                let next = if items.len() > *size as usize {
                    items.truncate(*size as usize);
                    Some(Continuation::Page(page + 1))
                } else {
                    None
                };
                Ok(Paged { items, next })
            }
            Pagination::Cursor { after, limit } => {
                let ordering = effective_ordering(criteria.order(), &self.default_ordering);
                let mut query =
                    build_find_cursor::<A>(criteria, &ordering, after.as_ref(), *limit)?;
                let rows = query
                    .build()
                    .fetch_all(executor)
                    .await
                    .map_err(storage_error)?;
                let mut items = rows
                    .iter()
                    .map(A::from_row)
                    .collect::<Result<Vec<_>, _>>()?;
                let next = if items.len() > *limit as usize {
                    items.truncate(*limit as usize);
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

    async fn upsert(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        aggregate: &A,
    ) -> Result<(), DomainError> {
        let mut query = build_upsert::<A>(aggregate)?;
        query
            .build()
            .execute(&mut **tx)
            .await
            .map_err(|error| map_store_error(A::TABLE, error))?;
        Ok(())
    }

    /// [`Repository::get`] composed into a caller-owned transaction, so a
    /// `for_update` row lock spans the caller's unit of work.
    ///
    /// # Errors
    ///
    /// Same contract as [`Repository::get`].
    pub async fn get_in(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        criteria: &BoundFilters,
        for_update: bool,
    ) -> Result<A, DomainError> {
        self.fetch_get(&mut **tx, criteria, for_update).await
    }

    /// [`Repository::get_by_id`] composed into a caller-owned transaction.
    ///
    /// # Errors
    ///
    /// Same contract as [`Repository::get_by_id`].
    pub async fn get_by_id_in(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        for_update: bool,
    ) -> Result<A, DomainError> {
        self.fetch_get_by_id(&mut **tx, id, for_update).await
    }

    /// [`Repository::store`] composed into a caller-owned transaction.
    /// The returned [`PendingDispatch`] must only be dispatched after the
    /// caller commits; dropping the transaction discards the write and
    /// the pulled events with it.
    ///
    /// # Errors
    ///
    /// Same contract as [`Repository::store`].
    pub async fn store_in(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        aggregate: &mut A,
    ) -> Result<PendingDispatch, DomainError> {
        self.upsert(tx, aggregate).await?;
        Ok(PendingDispatch::new(aggregate.pull_events()))
    }
}

#[async_trait]
impl<A: PgAggregate + 'static> Repository<A> for PgRepository<A> {
    async fn get(&self, criteria: &BoundFilters, for_update: bool) -> Result<A, DomainError> {
        self.fetch_get(&self.pool, criteria, for_update).await
    }

    async fn get_by_id(&self, id: Uuid, for_update: bool) -> Result<A, DomainError> {
        self.fetch_get_by_id(&self.pool, id, for_update).await
    }

    async fn find(
        &self,
        criteria: &BoundFilters,
        pagination: &Pagination,
    ) -> Result<Paged<A>, DomainError> {
        self.fetch_find(&self.pool, criteria, pagination).await
    }

    async fn store(&self, aggregate: &mut A) -> Result<PendingDispatch, DomainError> {
        let mut tx = self.pool.begin().await.map_err(storage_error)?;
        self.upsert(&mut tx, aggregate).await?;
        tx.commit().await.map_err(storage_error)?;
        tracing::debug!(table = A::TABLE, id = %aggregate.id(), "stored aggregate");
        // Events surface only after the write is durable.
        Ok(PendingDispatch::new(aggregate.pull_events()))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::{Arc, LazyLock};

    use blacar_core::criteria::CriteriaSchema;
    use blacar_core::entity::Entity;
    use blacar_core::event::DomainEvent;
    use blacar_core::filters::CompiledFilters;
    use blacar_core::value::ScalarKind;
    use sqlx::Row as _;

    use super::*;

    struct Venue {
        id: Uuid,
        name: String,
        capacity: i64,
        rating: Option<f64>,
    }

    impl Entity for Venue {
        fn id(&self) -> Uuid {
            self.id
        }

        fn field_value(&self, field: &str) -> Option<FieldValue> {
            match field {
                "name" => Some(FieldValue::Str(self.name.clone())),
                "capacity" => Some(FieldValue::Int(self.capacity)),
                "rating" => self.rating.map(FieldValue::Float),
                _ => None,
            }
        }
    }

    impl AggregateRoot for Venue {
        fn pull_events(&mut self) -> Vec<Arc<dyn DomainEvent>> {
            Vec::new()
        }
    }

    impl PgAggregate for Venue {
        const TABLE: &'static str = "venues";
        const COLUMNS: &'static [&'static str] = &["id", "name", "capacity", "rating"];

        fn from_row(row: &PgRow) -> Result<Self, DomainError> {
            Ok(Self {
                id: row.try_get("id").map_err(storage_error)?,
                name: row.try_get("name").map_err(storage_error)?,
                capacity: row.try_get("capacity").map_err(storage_error)?,
                rating: row.try_get("rating").map_err(storage_error)?,
            })
        }

        fn column_values(&self) -> Vec<(&'static str, Option<FieldValue>)> {
            vec![
                ("id", Some(FieldValue::Uuid(self.id))),
                ("name", Some(FieldValue::Str(self.name.clone()))),
                ("capacity", Some(FieldValue::Int(self.capacity))),
                ("rating", self.rating.map(FieldValue::Float)),
            ]
        }
    }

    static VENUE_CRITERIA: LazyLock<CriteriaSchema> = LazyLock::new(|| {
        CriteriaSchema::builder("VenueCriteria")
            .string("name")
            .integer("capacity_min")
            .list("status", ScalarKind::Str)
            .with_ordering()
            .build()
    });

    static VENUE_FILTERS: LazyLock<CompiledFilters> = LazyLock::new(|| {
        CompiledFilters::compile(LazyLock::force(&VENUE_CRITERIA)).unwrap()
    });

    fn bind(entries: &[(&str, &str)]) -> BoundFilters {
        let raw: BTreeMap<String, String> = entries
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        VENUE_FILTERS.bind(&raw).unwrap()
    }

    fn sample_venue() -> Venue {
        Venue {
            id: Uuid::nil(),
            name: "teatro".to_owned(),
            capacity: 120,
            rating: None,
        }
    }

    #[test]
    fn test_get_renders_conjunction_and_lock() {
        let criteria = bind(&[("name", "teatro"), ("capacity_min", "100")]);
        let sql = build_get::<Venue>(&criteria, false).unwrap().into_sql();
        assert_eq!(
            sql,
            "SELECT id, name, capacity, rating FROM venues \
             WHERE capacity >= $1 AND name = $2 LIMIT 1"
        );

        let sql = build_get::<Venue>(&criteria, true).unwrap().into_sql();
        assert!(sql.ends_with("LIMIT 1 FOR UPDATE"));
    }

    #[test]
    fn test_get_by_id_binds_the_id() {
        let sql = build_get_by_id::<Venue>(Uuid::nil(), true)
            .unwrap()
            .into_sql();
        assert_eq!(
            sql,
            "SELECT id, name, capacity, rating FROM venues WHERE id = $1 FOR UPDATE"
        );
    }

    #[test]
    fn test_membership_renders_in_list() {
        let criteria = bind(&[("status", "draft,published")]);
        let sql = build_get::<Venue>(&criteria, false).unwrap().into_sql();
        assert_eq!(
            sql,
            "SELECT id, name, capacity, rating FROM venues \
             WHERE status IN ($1, $2) LIMIT 1"
        );
    }

    #[test]
    fn test_empty_membership_matches_nothing() {
        let criteria = bind(&[("status", "")]);
        let sql = build_get::<Venue>(&criteria, false).unwrap().into_sql();
        assert_eq!(
            sql,
            "SELECT id, name, capacity, rating FROM venues WHERE FALSE LIMIT 1"
        );
    }

    #[test]
    fn test_page_mode_orders_only_when_asked() {
        let criteria = bind(&[("capacity_min", "100"), ("order", "-capacity")]);
        let sql = build_find_page::<Venue>(&criteria, 2, 10).unwrap().into_sql();
        assert_eq!(
            sql,
            "SELECT id, name, capacity, rating FROM venues \
             WHERE capacity >= $1 ORDER BY capacity DESC LIMIT $2 OFFSET $3"
        );

        let unordered = bind(&[("capacity_min", "100")]);
        let sql = build_find_page::<Venue>(&unordered, 0, 10)
            .unwrap()
            .into_sql();
        assert!(!sql.contains("ORDER BY"));
    }

    #[test]
    fn test_cursor_mode_renders_seek_expansion() {
        let criteria = bind(&[("order", "-capacity")]);
        let ordering = effective_ordering(criteria.order(), &Ordering::asc("id"));
        let token = CursorToken::new(vec![
            FieldValue::Int(120),
            FieldValue::Uuid(Uuid::nil()),
        ]);
        let sql = build_find_cursor::<Venue>(&criteria, &ordering, Some(&token), 5)
            .unwrap()
            .into_sql();
        assert_eq!(
            sql,
            "SELECT id, name, capacity, rating FROM venues \
             WHERE ((capacity < $1) OR (capacity = $2 AND id > $3)) \
             ORDER BY capacity DESC, id ASC LIMIT $4"
        );
    }

    #[test]
    fn test_cursor_token_must_match_the_ordering() {
        let criteria = bind(&[("order", "-capacity")]);
        let ordering = effective_ordering(criteria.order(), &Ordering::asc("id"));
        let token = CursorToken::new(vec![FieldValue::Int(120)]);
        let Err(err) = build_find_cursor::<Venue>(&criteria, &ordering, Some(&token), 5) else {
            panic!("expected a validation error");
        };
        assert_eq!(err.code(), "validation_error");
    }

    #[test]
    fn test_upsert_renders_null_and_excluded_columns() {
        let sql = build_upsert::<Venue>(&sample_venue()).unwrap().into_sql();
        assert_eq!(
            sql,
            "INSERT INTO venues (id, name, capacity, rating) VALUES ($1, $2, $3, NULL) \
             ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name, \
             capacity = EXCLUDED.capacity, rating = EXCLUDED.rating"
        );
    }

    #[test]
    fn test_constraint_name_parsing() {
        assert_eq!(
            constraint_field("users", "users_email_key"),
            Some("email".to_owned())
        );
        assert_eq!(constraint_field("users", "users_pkey"), None);
        assert_eq!(constraint_field("users", "trips_email_key"), None);
    }

    #[test]
    fn test_identifiers_are_validated_before_interpolation() {
        assert!(check_ident("driver_rating").is_ok());
        assert!(check_ident("id").is_ok());
        assert!(check_ident("").is_err());
        assert!(check_ident("name; DROP TABLE users").is_err());
        assert!(check_ident("Name").is_err());
    }
}
