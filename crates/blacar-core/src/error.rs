//! Domain error types.

use thiserror::Error;

/// Top-level domain error type.
///
/// Every expected, recoverable condition is returned as a value of this
/// type; the repository and filter layers never let a raw store error
/// escape to callers.
#[derive(Debug, Clone, Error)]
pub enum DomainError {
    /// A lookup yielded zero results, or a single-result lookup was given
    /// an empty criteria.
    #[error("not found")]
    NotFound {
        /// Optional diagnostic payload describing the failed lookup.
        details: Option<serde_json::Value>,
    },

    /// A raw criteria value failed type coercion, a criteria shape is
    /// malformed, or an aggregate violated a domain invariant.
    #[error("validation error: {message}")]
    Validation {
        /// The field the error relates to, when known.
        field: Option<String>,
        /// Human-readable description.
        message: String,
    },

    /// A uniqueness constraint was violated during store.
    #[error("already exists on field {field}")]
    Conflict {
        /// The field carrying the uniqueness constraint.
        field: String,
    },

    /// An unclassified storage-level failure.
    #[error("storage error: {message}")]
    Storage {
        /// Description of the underlying failure.
        message: String,
    },
}

impl DomainError {
    /// A bare not-found error with no diagnostic payload.
    #[must_use]
    pub const fn not_found() -> Self {
        Self::NotFound { details: None }
    }

    /// A not-found error carrying the criteria that failed to match.
    #[must_use]
    pub const fn not_found_with(details: serde_json::Value) -> Self {
        Self::NotFound {
            details: Some(details),
        }
    }

    /// A validation error not tied to a single field.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            field: None,
            message: message.into(),
        }
    }

    /// A validation error on a specific field.
    #[must_use]
    pub fn validation_on(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: Some(field.into()),
            message: message.into(),
        }
    }

    /// A uniqueness conflict on the given field.
    #[must_use]
    pub fn conflict(field: impl Into<String>) -> Self {
        Self::Conflict {
            field: field.into(),
        }
    }

    /// An unclassified storage failure.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Stable machine-readable code for the API layer.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::Validation { .. } => "validation_error",
            Self::Conflict { .. } => "conflict",
            Self::Storage { .. } => "storage_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(DomainError::not_found().code(), "not_found");
        assert_eq!(DomainError::validation("bad").code(), "validation_error");
        assert_eq!(DomainError::conflict("email").code(), "conflict");
        assert_eq!(DomainError::storage("down").code(), "storage_error");
    }

    #[test]
    fn test_conflict_message_names_the_field() {
        assert_eq!(
            DomainError::conflict("email").to_string(),
            "already exists on field email"
        );
    }
}
