//! Result-set slicing: page-number and cursor pagination.
//!
//! Cursor pagination is keyset-based: the opaque token carries the
//! ordering-key values of the last row returned, and the next call
//! resumes strictly after that position. This is only safe under a
//! deterministic ordering, so the effective ordering always carries an
//! `id` tie-break.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::criteria::{Direction, Ordering};
use crate::entity::Entity;
use crate::error::DomainError;
use crate::value::FieldValue;

/// How a result set should be sliced.
#[derive(Debug, Clone)]
pub enum Pagination {
    /// Skip/limit by zero-based page index.
    Page {
        /// Zero-based page index.
        page: u32,
        /// Page size.
        size: u32,
    },
    /// Resume after an opaque position token.
    Cursor {
        /// Position to resume after; `None` starts from the beginning.
        after: Option<CursorToken>,
        /// Maximum number of items to return.
        limit: u32,
    },
}

/// Continuation metadata for the next slice.
#[derive(Debug, Clone, PartialEq)]
pub enum Continuation {
    /// The next page index.
    Page(u32),
    /// The cursor resuming after the last returned row.
    Cursor(CursorToken),
}

/// An ordered, bounded slice of results plus continuation metadata.
#[derive(Debug, Clone)]
pub struct Paged<T> {
    /// The items of this slice.
    pub items: Vec<T>,
    /// Continuation for the next slice; `None` when exhausted.
    pub next: Option<Continuation>,
}

#[derive(Debug, Serialize, Deserialize)]
struct TokenPayload {
    k: Vec<FieldValue>,
}

/// Opaque cursor position: the ordering-key values (id included) of the
/// last row returned.
#[derive(Debug, Clone, PartialEq)]
pub struct CursorToken {
    keys: Vec<FieldValue>,
}

impl CursorToken {
    /// Builds a token from an ordering-key vector.
    #[must_use]
    pub const fn new(keys: Vec<FieldValue>) -> Self {
        Self { keys }
    }

    /// The ordering-key values, aligned with the effective ordering.
    #[must_use]
    pub fn keys(&self) -> &[FieldValue] {
        &self.keys
    }

    /// Encodes the token into its opaque text form.
    #[must_use]
    pub fn encode(&self) -> String {
        let payload = TokenPayload {
            k: self.keys.clone(),
        };
        // Serialization of plain value enums cannot fail.
        let json = serde_json::to_vec(&payload).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(json)
    }

    /// Decodes an opaque token.
    ///
    /// # Errors
    ///
    /// Returns a validation error when the token is not one this system
    /// produced.
    pub fn decode(raw: &str) -> Result<Self, DomainError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(raw)
            .map_err(|_| DomainError::validation_on("cursor", "malformed cursor token"))?;
        let payload: TokenPayload = serde_json::from_slice(&bytes)
            .map_err(|_| DomainError::validation_on("cursor", "malformed cursor token"))?;
        Ok(Self { keys: payload.k })
    }
}

/// Computes the ordering a query must use: the criteria's declared order
/// when present, the repository default otherwise, always extended with
/// the `id` tie-break.
#[must_use]
pub fn effective_ordering(criteria_order: Option<&Ordering>, default: &Ordering) -> Ordering {
    criteria_order.unwrap_or(default).with_id_tiebreak()
}

/// Materializes an entity's ordering-key vector for the given ordering.
///
/// The `id` pseudo-field resolves through [`Entity::id`]; all other
/// fields resolve through [`Entity::field_value`]. Returns `None` when
/// the entity cannot resolve one of the fields.
#[must_use]
pub fn ordering_key<E: Entity + ?Sized>(entity: &E, ordering: &Ordering) -> Option<Vec<FieldValue>> {
    ordering
        .fields()
        .iter()
        .map(|key| {
            if key.field == "id" {
                Some(FieldValue::Uuid(entity.id()))
            } else {
                entity.field_value(&key.field)
            }
        })
        .collect()
}

/// Whether a candidate ordering-key vector sorts strictly after the token
/// position under the given ordering. Unresolvable comparisons are
/// treated as "not after".
#[must_use]
pub fn is_after(candidate: &[FieldValue], token: &CursorToken, ordering: &Ordering) -> bool {
    if candidate.len() != token.keys().len() || candidate.len() != ordering.fields().len() {
        return false;
    }
    for ((value, position), key) in candidate.iter().zip(token.keys()).zip(ordering.fields()) {
        match value.compare(position) {
            Some(std::cmp::Ordering::Equal) => {}
            Some(cmp) => {
                let greater = cmp == std::cmp::Ordering::Greater;
                return match key.direction {
                    Direction::Asc => greater,
                    Direction::Desc => !greater,
                };
            }
            None => return false,
        }
    }
    // Equal to the token position: not after it.
    false
}

/// Slices an in-memory result set by page index, detecting continuation
/// without counting the full set.
#[must_use]
pub fn slice_page<T>(mut items: Vec<T>, page: u32, size: u32) -> Paged<T> {
    let start = (page as usize).saturating_mul(size as usize);
    let size = size as usize;
    if start >= items.len() {
        return Paged {
            items: Vec::new(),
            next: None,
        };
    }
    let mut items = items.split_off(start);
    let next = if items.len() > size {
        items.truncate(size);
        Some(Continuation::Page(page + 1))
    } else {
        None
    };
    Paged { items, next }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_token_round_trip() {
        let token = CursorToken::new(vec![
            FieldValue::Float(24.5),
            FieldValue::Uuid(Uuid::new_v4()),
        ]);
        let decoded = CursorToken::decode(&token.encode()).unwrap();
        assert_eq!(decoded, token);
    }

    #[test]
    fn test_cursor_decode_rejects_garbage() {
        assert!(CursorToken::decode("not a token").is_err());
        assert!(CursorToken::decode(&URL_SAFE_NO_PAD.encode(b"{}")).is_err());
    }

    #[test]
    fn test_is_after_honors_direction() {
        let ordering = Ordering::desc("price").with_id_tiebreak();
        let low = Uuid::nil();
        let token = CursorToken::new(vec![FieldValue::Float(30.0), FieldValue::Uuid(low)]);

        // Descending price: smaller prices come after the token.
        assert!(is_after(
            &[FieldValue::Float(10.0), FieldValue::Uuid(low)],
            &token,
            &ordering,
        ));
        assert!(!is_after(
            &[FieldValue::Float(40.0), FieldValue::Uuid(low)],
            &token,
            &ordering,
        ));
        // Equal price: the ascending id tie-break decides.
        assert!(is_after(
            &[FieldValue::Float(30.0), FieldValue::Uuid(Uuid::max())],
            &token,
            &ordering,
        ));
        // Exactly the token position is not after it.
        assert!(!is_after(
            &[FieldValue::Float(30.0), FieldValue::Uuid(low)],
            &token,
            &ordering,
        ));
    }

    #[test]
    fn test_slice_page_detects_continuation() {
        let sliced = slice_page(vec![1, 2, 3, 4, 5], 0, 2);
        assert_eq!(sliced.items, vec![1, 2]);
        assert_eq!(sliced.next, Some(Continuation::Page(1)));

        let sliced = slice_page(vec![1, 2, 3, 4, 5], 2, 2);
        assert_eq!(sliced.items, vec![5]);
        assert_eq!(sliced.next, None);

        let sliced = slice_page(vec![1, 2, 3], 5, 2);
        assert!(sliced.items.is_empty());
        assert_eq!(sliced.next, None);
    }
}
