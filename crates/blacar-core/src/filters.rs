//! The criteria-to-filter compiler.
//!
//! [`CompiledFilters`] is built once per criteria type and reused across
//! requests; [`BoundFilters`] carries the values bound for one request.
//!
//! Compilation flattens nested schemas into the parent namespace with a
//! `<field>_` prefix and derives one predicate builder per leaf. Declared
//! names ending in a recognized suffix map to a range operator on the
//! unsuffixed base field:
//!
//! - numeric: `_min` → `>=`, `_max` → `<=`, `_emin` → `>`, `_emax` → `<`
//! - temporal: `_after` → `>`, `_before` → `<`, `_iafter` → `>=`,
//!   `_ibefore` → `<=`

use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

use crate::criteria::{CriteriaSchema, FieldShape, Ordering};
use crate::error::DomainError;
use crate::value::{CompareOp, FieldValue, ScalarKind};

/// Reserved name of the ordering pseudo-field.
pub const ORDER_FIELD: &str = "order";

const NUMERIC_SUFFIXES: [(&str, CompareOp); 4] = [
    ("_min", CompareOp::Gte),
    ("_max", CompareOp::Lte),
    ("_emin", CompareOp::Gt),
    ("_emax", CompareOp::Lt),
];

const TEMPORAL_SUFFIXES: [(&str, CompareOp); 4] = [
    ("_after", CompareOp::Gt),
    ("_before", CompareOp::Lt),
    ("_iafter", CompareOp::Gte),
    ("_ibefore", CompareOp::Lte),
];

/// Splits a declared field name into its unsuffixed base and the derived
/// comparison operator. At most one suffix applies; names without a
/// recognized suffix compare for equality on the name itself.
#[must_use]
pub fn split_range_suffix(kind: ScalarKind, name: &str) -> (String, CompareOp) {
    let table: &[(&str, CompareOp)] = if kind.is_numeric() {
        &NUMERIC_SUFFIXES
    } else if kind.is_temporal() {
        &TEMPORAL_SUFFIXES
    } else {
        &[]
    };
    for (suffix, op) in table {
        if let Some(base) = name.strip_suffix(suffix) {
            if !base.is_empty() {
                return (base.to_owned(), *op);
            }
        }
    }
    (name.to_owned(), CompareOp::Eq)
}

/// A compiled predicate builder for one declared filter key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredicateBuilder {
    /// Unsuffixed field path the predicate targets.
    pub field: String,
    /// Derived comparison operator.
    pub op: CompareOp,
    /// Scalar kind raw values parse as.
    pub kind: ScalarKind,
    /// Whether the raw value is a comma-separated list.
    pub list: bool,
}

/// One executable predicate: field path, operator, and bound value.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterExpr {
    /// Unsuffixed field path.
    pub field: String,
    /// Comparison operator.
    pub op: CompareOp,
    /// Validated value.
    pub value: FieldValue,
}

/// The reusable compiled filter set for one criteria type.
///
/// Immutable once built; safe to share across concurrent requests.
#[derive(Debug)]
pub struct CompiledFilters {
    schema: &'static CriteriaSchema,
    builders: BTreeMap<String, PredicateBuilder>,
    ordering_fields: Option<BTreeSet<String>>,
}

impl CompiledFilters {
    /// Compiles a criteria schema into its predicate builders.
    ///
    /// # Errors
    ///
    /// Returns a validation error for structural problems: duplicate
    /// flattened keys, a field named `order` alongside a declared
    /// ordering, or an ordering declared on a schema with no fields.
    /// These are construction-time failures, never per request.
    pub fn compile(schema: &'static CriteriaSchema) -> Result<Self, DomainError> {
        let mut builders = BTreeMap::new();
        Self::compile_fields(schema, "", &mut builders)?;

        let ordering_fields = if schema.has_ordering() {
            if builders.contains_key(ORDER_FIELD) {
                return Err(DomainError::validation(format!(
                    "criteria '{}' declares both an ordering and a field named '{ORDER_FIELD}'",
                    schema.name()
                )));
            }
            if builders.is_empty() {
                return Err(DomainError::validation(format!(
                    "criteria '{}' declares an ordering but no filterable fields",
                    schema.name()
                )));
            }
            Some(builders.values().map(|b| b.field.clone()).collect())
        } else {
            None
        };

        Ok(Self {
            schema,
            builders,
            ordering_fields,
        })
    }

    fn compile_fields(
        schema: &'static CriteriaSchema,
        prefix: &str,
        builders: &mut BTreeMap<String, PredicateBuilder>,
    ) -> Result<(), DomainError> {
        for descriptor in schema.fields() {
            let key = format!("{prefix}{}", descriptor.name);
            match descriptor.shape {
                FieldShape::Scalar(kind) => {
                    let (field, op) = split_range_suffix(kind, &key);
                    Self::insert_builder(
                        builders,
                        key,
                        PredicateBuilder {
                            field,
                            op,
                            kind,
                            list: false,
                        },
                    )?;
                }
                FieldShape::List(kind) => {
                    Self::insert_builder(
                        builders,
                        key.clone(),
                        PredicateBuilder {
                            field: key,
                            op: CompareOp::In,
                            kind,
                            list: true,
                        },
                    )?;
                }
                FieldShape::Nested(nested) => {
                    Self::compile_fields(nested, &format!("{key}_"), builders)?;
                }
            }
        }
        Ok(())
    }

    fn insert_builder(
        builders: &mut BTreeMap<String, PredicateBuilder>,
        key: String,
        builder: PredicateBuilder,
    ) -> Result<(), DomainError> {
        if builders.contains_key(&key) {
            return Err(DomainError::validation(format!(
                "duplicate flattened filter key '{key}'"
            )));
        }
        builders.insert(key, builder);
        Ok(())
    }

    /// The compiled builders, keyed by caller-visible filter key.
    #[must_use]
    pub const fn builders(&self) -> &BTreeMap<String, PredicateBuilder> {
        &self.builders
    }

    /// Binds caller-supplied raw values against the compiled builders.
    ///
    /// Keys absent from the input leave their filters unbound; unknown
    /// keys are ignored. Binding is side-effect-free.
    ///
    /// # Errors
    ///
    /// Returns a validation error naming the offending field when a raw
    /// value fails type coercion, or when the ordering references a field
    /// outside the compiled set.
    pub fn bind(&self, raw: &BTreeMap<String, String>) -> Result<BoundFilters, DomainError> {
        let mut bound = BTreeMap::new();
        let mut order = None;

        for (key, raw_value) in raw {
            if key == ORDER_FIELD {
                if let Some(allowed) = &self.ordering_fields {
                    let parsed = Ordering::parse(raw_value)?;
                    for order_field in parsed.fields() {
                        if !allowed.contains(&order_field.field) {
                            return Err(DomainError::validation_on(
                                ORDER_FIELD,
                                format!("cannot order by unknown field '{}'", order_field.field),
                            ));
                        }
                    }
                    order = Some(parsed);
                }
                continue;
            }
            let Some(builder) = self.builders.get(key) else {
                continue;
            };
            let value = if builder.list {
                // An empty raw value binds an empty membership list,
                // which matches nothing.
                let items = if raw_value.is_empty() {
                    Vec::new()
                } else {
                    raw_value
                        .split(',')
                        .map(|item| builder.kind.parse(item))
                        .collect::<Result<Vec<_>, _>>()
                        .map_err(|message| DomainError::validation_on(key.clone(), message))?
                };
                FieldValue::List(items)
            } else {
                builder
                    .kind
                    .parse(raw_value)
                    .map_err(|message| DomainError::validation_on(key.clone(), message))?
            };
            bound.insert(
                key.clone(),
                BoundPredicate {
                    field: builder.field.clone(),
                    op: builder.op,
                    value,
                },
            );
        }

        Ok(BoundFilters {
            schema: self.schema,
            bound,
            order,
            expressions: OnceLock::new(),
            values: OnceLock::new(),
        })
    }

    /// Binds an empty input: no constraints, no ordering.
    #[must_use]
    pub fn bind_none(&self) -> BoundFilters {
        BoundFilters {
            schema: self.schema,
            bound: BTreeMap::new(),
            order: None,
            expressions: OnceLock::new(),
            values: OnceLock::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct BoundPredicate {
    field: String,
    op: CompareOp,
    value: FieldValue,
}

/// A node of the reconstructed criteria value tree.
#[derive(Debug, Clone, PartialEq)]
pub enum CriteriaNode {
    /// A bound leaf value, keyed by the declared (suffixed) field name.
    Value(FieldValue),
    /// A nested criteria with at least one bound leaf.
    Nested(CriteriaValues),
}

/// The typed criteria instance reconstructed from bound values, shaped
/// like the original (possibly nested) schema.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CriteriaValues {
    fields: BTreeMap<String, CriteriaNode>,
}

impl CriteriaValues {
    /// Looks up a direct child node by declared field name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&CriteriaNode> {
        self.fields.get(name)
    }

    /// Looks up a leaf value by declared field name.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<&FieldValue> {
        match self.fields.get(name) {
            Some(CriteriaNode::Value(value)) => Some(value),
            _ => None,
        }
    }

    /// Looks up a nested criteria by declared field name.
    #[must_use]
    pub fn nested(&self, name: &str) -> Option<&Self> {
        match self.fields.get(name) {
            Some(CriteriaNode::Nested(nested)) => Some(nested),
            _ => None,
        }
    }

    /// Whether no leaf was bound anywhere under this node.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Criteria values bound for one request.
///
/// Immutable; the derived expression list and value tree are computed
/// lazily and cached, so repeated reads observe identical results.
#[derive(Debug)]
pub struct BoundFilters {
    schema: &'static CriteriaSchema,
    bound: BTreeMap<String, BoundPredicate>,
    order: Option<Ordering>,
    expressions: OnceLock<Vec<FilterExpr>>,
    values: OnceLock<CriteriaValues>,
}

impl BoundFilters {
    /// Whether nothing was bound: no constraint values and no ordering.
    ///
    /// Single-result lookups reject empty criteria to prevent accidental
    /// full-table reads.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bound.is_empty() && self.order.is_none()
    }

    /// The bound ordering, if any.
    #[must_use]
    pub const fn order(&self) -> Option<&Ordering> {
        self.order.as_ref()
    }

    /// The flattened `(field, operator, value)` predicates, excluding the
    /// ordering pseudo-field.
    #[must_use]
    pub fn expressions(&self) -> &[FilterExpr] {
        self.expressions.get_or_init(|| {
            self.bound
                .values()
                .map(|predicate| FilterExpr {
                    field: predicate.field.clone(),
                    op: predicate.op,
                    value: predicate.value.clone(),
                })
                .collect()
        })
    }

    /// The typed criteria tree, reconstructed by walking the original
    /// schema shape. A nested node is present only if at least one of its
    /// leaves was bound.
    #[must_use]
    pub fn values(&self) -> &CriteriaValues {
        self.values
            .get_or_init(|| Self::reconstruct(self.schema, "", &self.bound))
    }

    fn reconstruct(
        schema: &CriteriaSchema,
        prefix: &str,
        bound: &BTreeMap<String, BoundPredicate>,
    ) -> CriteriaValues {
        let mut fields = BTreeMap::new();
        for descriptor in schema.fields() {
            let key = format!("{prefix}{}", descriptor.name);
            match descriptor.shape {
                FieldShape::Scalar(_) | FieldShape::List(_) => {
                    if let Some(predicate) = bound.get(&key) {
                        fields.insert(
                            descriptor.name.to_owned(),
                            CriteriaNode::Value(predicate.value.clone()),
                        );
                    }
                }
                FieldShape::Nested(nested) => {
                    let child = Self::reconstruct(nested, &format!("{key}_"), bound);
                    if !child.is_empty() {
                        fields.insert(descriptor.name.to_owned(), CriteriaNode::Nested(child));
                    }
                }
            }
        }
        CriteriaValues { fields }
    }

    /// Diagnostic JSON rendering of the bound values, keyed by declared
    /// filter key, used as the not-found detail payload.
    #[must_use]
    pub fn to_details(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        for (key, predicate) in &self.bound {
            map.insert(key.clone(), predicate.value.to_json());
        }
        if let Some(order) = &self.order {
            map.insert(
                ORDER_FIELD.to_owned(),
                serde_json::Value::String(order.to_string()),
            );
        }
        serde_json::Value::Object(map)
    }
}
