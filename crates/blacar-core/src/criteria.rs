//! Declarative criteria schemas.
//!
//! A criteria type is described by an explicit descriptor tree built at
//! startup, typically held in a `LazyLock` static. The filter compiler
//! consumes the tree; nothing here inspects live types at request time.

use std::fmt;

use crate::error::DomainError;
use crate::value::ScalarKind;

/// Declared shape of a single criteria field.
#[derive(Debug, Clone, Copy)]
pub enum FieldShape {
    /// A scalar leaf.
    Scalar(ScalarKind),
    /// A homogeneous list of scalars, compiled to a membership predicate.
    List(ScalarKind),
    /// A nested criteria, flattened into the parent namespace.
    Nested(&'static CriteriaSchema),
}

/// One declared criteria field.
#[derive(Debug, Clone, Copy)]
pub struct FieldDescriptor {
    /// Declared field name (suffixed names are declared as-is).
    pub name: &'static str,
    /// Declared shape.
    pub shape: FieldShape,
}

/// Immutable description of a criteria type: its named constraint fields
/// and whether it declares an ordering field.
#[derive(Debug)]
pub struct CriteriaSchema {
    name: &'static str,
    fields: Vec<FieldDescriptor>,
    ordering: bool,
}

impl CriteriaSchema {
    /// Starts building a schema.
    #[must_use]
    pub const fn builder(name: &'static str) -> CriteriaSchemaBuilder {
        CriteriaSchemaBuilder {
            name,
            fields: Vec::new(),
            ordering: false,
        }
    }

    /// Schema name, used in diagnostics.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Declared fields, in declaration order.
    #[must_use]
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Whether the criteria declares an `order` field.
    #[must_use]
    pub const fn has_ordering(&self) -> bool {
        self.ordering
    }
}

/// Builder for [`CriteriaSchema`].
#[derive(Debug)]
pub struct CriteriaSchemaBuilder {
    name: &'static str,
    fields: Vec<FieldDescriptor>,
    ordering: bool,
}

impl CriteriaSchemaBuilder {
    fn field(mut self, name: &'static str, shape: FieldShape) -> Self {
        self.fields.push(FieldDescriptor { name, shape });
        self
    }

    /// Declares a string equality field.
    #[must_use]
    pub fn string(self, name: &'static str) -> Self {
        self.field(name, FieldShape::Scalar(ScalarKind::Str))
    }

    /// Declares a UUID equality field.
    #[must_use]
    pub fn uuid(self, name: &'static str) -> Self {
        self.field(name, FieldShape::Scalar(ScalarKind::Uuid))
    }

    /// Declares a boolean equality field.
    #[must_use]
    pub fn boolean(self, name: &'static str) -> Self {
        self.field(name, FieldShape::Scalar(ScalarKind::Bool))
    }

    /// Declares an integer field (range suffixes apply).
    #[must_use]
    pub fn integer(self, name: &'static str) -> Self {
        self.field(name, FieldShape::Scalar(ScalarKind::Int))
    }

    /// Declares a float field (range suffixes apply).
    #[must_use]
    pub fn float(self, name: &'static str) -> Self {
        self.field(name, FieldShape::Scalar(ScalarKind::Float))
    }

    /// Declares a date field (temporal suffixes apply).
    #[must_use]
    pub fn date(self, name: &'static str) -> Self {
        self.field(name, FieldShape::Scalar(ScalarKind::Date))
    }

    /// Declares a UTC timestamp field (temporal suffixes apply).
    #[must_use]
    pub fn datetime(self, name: &'static str) -> Self {
        self.field(name, FieldShape::Scalar(ScalarKind::DateTime))
    }

    /// Declares a list-of-scalars field, compiled to a membership predicate.
    #[must_use]
    pub fn list(self, name: &'static str, kind: ScalarKind) -> Self {
        self.field(name, FieldShape::List(kind))
    }

    /// Declares a nested criteria, flattened as `<name>_<leaf>`.
    #[must_use]
    pub fn nested(self, name: &'static str, schema: &'static CriteriaSchema) -> Self {
        self.field(name, FieldShape::Nested(schema))
    }

    /// Declares the optional `order` field.
    #[must_use]
    pub const fn with_ordering(mut self) -> Self {
        self.ordering = true;
        self
    }

    /// Finishes the schema. Structural problems (duplicate flattened
    /// paths, reserved names) are reported by the filter compiler, which
    /// sees the fully flattened namespace.
    #[must_use]
    pub fn build(self) -> CriteriaSchema {
        CriteriaSchema {
            name: self.name,
            fields: self.fields,
            ordering: self.ordering,
        }
    }
}

/// Sort direction of one ordering key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Ascending.
    Asc,
    /// Descending.
    Desc,
}

/// One ordering key: a field path plus a direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderField {
    /// Flattened field path.
    pub field: String,
    /// Sort direction.
    pub direction: Direction,
}

/// An ordered sequence of ordering keys.
///
/// The text form is comma-separated field names, each optionally prefixed
/// with `-` for descending direction (`-price,departs_at`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ordering(Vec<OrderField>);

impl Ordering {
    /// A single ascending key.
    #[must_use]
    pub fn asc(field: impl Into<String>) -> Self {
        Self(vec![OrderField {
            field: field.into(),
            direction: Direction::Asc,
        }])
    }

    /// A single descending key.
    #[must_use]
    pub fn desc(field: impl Into<String>) -> Self {
        Self(vec![OrderField {
            field: field.into(),
            direction: Direction::Desc,
        }])
    }

    /// Parses the comma-separated text form.
    ///
    /// # Errors
    ///
    /// Returns a validation error for empty segments.
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let mut fields = Vec::new();
        for segment in raw.split(',') {
            let segment = segment.trim();
            let (direction, name) = match segment.strip_prefix('-') {
                Some(rest) => (Direction::Desc, rest),
                None => (Direction::Asc, segment.trim_start_matches('+')),
            };
            if name.is_empty() {
                return Err(DomainError::validation_on(
                    "order",
                    format!("empty ordering segment in '{raw}'"),
                ));
            }
            fields.push(OrderField {
                field: name.to_owned(),
                direction,
            });
        }
        Ok(Self(fields))
    }

    /// The ordering keys, highest precedence first.
    #[must_use]
    pub fn fields(&self) -> &[OrderField] {
        &self.0
    }

    /// Returns this ordering extended with an ascending `id` tie-break,
    /// unless `id` is already one of the keys. Cursor pagination requires
    /// the resulting determinism.
    #[must_use]
    pub fn with_id_tiebreak(&self) -> Self {
        if self.0.iter().any(|f| f.field == "id") {
            return self.clone();
        }
        let mut fields = self.0.clone();
        fields.push(OrderField {
            field: "id".to_owned(),
            direction: Direction::Asc,
        });
        Self(fields)
    }
}

impl fmt::Display for Ordering {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, key) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            if key.direction == Direction::Desc {
                write!(f, "-")?;
            }
            write!(f, "{}", key.field)?;
        }
        Ok(())
    }
}
