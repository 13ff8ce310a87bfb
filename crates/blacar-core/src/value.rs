//! Typed scalar values shared by the criteria compiler and repositories.

use std::cmp::Ordering as CmpOrdering;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Scalar kinds a criteria field may declare.
///
/// Every kind knows how to parse the raw string form supplied by callers.
/// The set is closed: a criteria shape can only be built from these
/// kinds, so "unsupported scalar type" cannot surface at request time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    /// UTF-8 string.
    Str,
    /// UUID identifier.
    Uuid,
    /// Boolean flag.
    Bool,
    /// Signed 64-bit integer.
    Int,
    /// 64-bit float.
    Float,
    /// Calendar date (no time component).
    Date,
    /// UTC timestamp.
    DateTime,
}

impl ScalarKind {
    /// Whether suffix-derived range operators apply to this kind.
    #[must_use]
    pub const fn is_numeric(self) -> bool {
        matches!(self, Self::Int | Self::Float)
    }

    /// Whether temporal range suffixes apply to this kind.
    #[must_use]
    pub const fn is_temporal(self) -> bool {
        matches!(self, Self::Date | Self::DateTime)
    }

    /// Parses a raw string into a [`FieldValue`] of this kind.
    ///
    /// # Errors
    ///
    /// Returns a human-readable message when the raw value does not parse
    /// as this kind; callers wrap it into a validation error naming the
    /// offending field.
    pub fn parse(self, raw: &str) -> Result<FieldValue, String> {
        let raw = raw.trim();
        match self {
            Self::Str => Ok(FieldValue::Str(raw.to_owned())),
            Self::Uuid => Uuid::parse_str(raw)
                .map(FieldValue::Uuid)
                .map_err(|_| format!("'{raw}' is not a valid UUID")),
            Self::Bool => match raw.to_ascii_lowercase().as_str() {
                "true" | "1" => Ok(FieldValue::Bool(true)),
                "false" | "0" => Ok(FieldValue::Bool(false)),
                _ => Err(format!("'{raw}' is not a valid boolean")),
            },
            Self::Int => raw
                .parse::<i64>()
                .map(FieldValue::Int)
                .map_err(|_| format!("'{raw}' is not a valid integer")),
            Self::Float => raw
                .parse::<f64>()
                .map(FieldValue::Float)
                .map_err(|_| format!("'{raw}' is not a valid number")),
            Self::Date => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map(FieldValue::Date)
                .map_err(|_| format!("'{raw}' is not a valid date (expected YYYY-MM-DD)")),
            Self::DateTime => DateTime::parse_from_rfc3339(raw)
                .map(|dt| FieldValue::DateTime(dt.with_timezone(&Utc)))
                .map_err(|_| format!("'{raw}' is not a valid RFC 3339 timestamp")),
        }
    }
}

/// A typed criteria value.
///
/// Serialization is tagged so cursor tokens round-trip losslessly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    /// UTF-8 string.
    Str(String),
    /// UUID identifier.
    Uuid(Uuid),
    /// Boolean flag.
    Bool(bool),
    /// Signed 64-bit integer.
    Int(i64),
    /// 64-bit float.
    Float(f64),
    /// Calendar date.
    Date(NaiveDate),
    /// UTC timestamp.
    DateTime(DateTime<Utc>),
    /// Homogeneous list of scalars (set-membership predicates).
    List(Vec<FieldValue>),
}

impl FieldValue {
    /// Compares two values of the same kind.
    ///
    /// Returns `None` for cross-kind comparisons and for lists, which
    /// support only equality and membership.
    #[must_use]
    pub fn compare(&self, other: &Self) -> Option<CmpOrdering> {
        match (self, other) {
            (Self::Str(a), Self::Str(b)) => Some(a.cmp(b)),
            (Self::Uuid(a), Self::Uuid(b)) => Some(a.cmp(b)),
            (Self::Bool(a), Self::Bool(b)) => Some(a.cmp(b)),
            (Self::Int(a), Self::Int(b)) => Some(a.cmp(b)),
            (Self::Float(a), Self::Float(b)) => a.partial_cmp(b),
            (Self::Date(a), Self::Date(b)) => Some(a.cmp(b)),
            (Self::DateTime(a), Self::DateTime(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Whether `self` is a list containing `candidate`.
    #[must_use]
    pub fn contains(&self, candidate: &Self) -> bool {
        match self {
            Self::List(items) => items.contains(candidate),
            _ => false,
        }
    }

    /// Untagged JSON rendering for diagnostics and error details.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Str(v) => serde_json::Value::String(v.clone()),
            Self::Uuid(v) => serde_json::Value::String(v.to_string()),
            Self::Bool(v) => serde_json::Value::Bool(*v),
            Self::Int(v) => serde_json::Value::from(*v),
            Self::Float(v) => serde_json::Value::from(*v),
            Self::Date(v) => serde_json::Value::String(v.to_string()),
            Self::DateTime(v) => serde_json::Value::String(v.to_rfc3339()),
            Self::List(items) => {
                serde_json::Value::Array(items.iter().map(Self::to_json).collect())
            }
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

/// Comparison operator a predicate applies to a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// Equality.
    Eq,
    /// Strictly less than.
    Lt,
    /// Less than or equal.
    Lte,
    /// Strictly greater than.
    Gt,
    /// Greater than or equal.
    Gte,
    /// Set membership.
    In,
}

impl CompareOp {
    /// SQL rendering of the operator.
    #[must_use]
    pub const fn sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::In => "IN",
        }
    }

    /// Evaluates the operator in-process against two typed values.
    ///
    /// Returns `None` when the values cannot be compared (kind mismatch,
    /// or a range operator applied to a list).
    #[must_use]
    pub fn evaluate(self, field_value: &FieldValue, filter_value: &FieldValue) -> Option<bool> {
        match self {
            Self::Eq => Some(field_value == filter_value),
            Self::In => match filter_value {
                FieldValue::List(_) => Some(filter_value.contains(field_value)),
                _ => None,
            },
            Self::Lt => field_value
                .compare(filter_value)
                .map(|ord| ord == CmpOrdering::Less),
            Self::Lte => field_value
                .compare(filter_value)
                .map(|ord| ord != CmpOrdering::Greater),
            Self::Gt => field_value
                .compare(filter_value)
                .map(|ord| ord == CmpOrdering::Greater),
            Self::Gte => field_value
                .compare(filter_value)
                .map(|ord| ord != CmpOrdering::Less),
        }
    }
}
