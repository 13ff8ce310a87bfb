//! Account search criteria.

use std::sync::LazyLock;

use blacar_core::criteria::CriteriaSchema;
use blacar_core::filters::CompiledFilters;

static ACCOUNT_CRITERIA: LazyLock<CriteriaSchema> = LazyLock::new(|| {
    CriteriaSchema::builder("UserAccountCriteria")
        .string("email")
        .boolean("is_active")
        .boolean("is_staff")
        .datetime("date_joined_after")
        .datetime("date_joined_before")
        .datetime("date_joined_iafter")
        .datetime("date_joined_ibefore")
        .with_ordering()
        .build()
});

static ACCOUNT_FILTERS: LazyLock<CompiledFilters> = LazyLock::new(|| {
    CompiledFilters::compile(LazyLock::force(&ACCOUNT_CRITERIA))
        .expect("account criteria is well formed")
});

/// The compiled account filters, shared process-wide.
#[must_use]
pub fn account_filters() -> &'static CompiledFilters {
    LazyLock::force(&ACCOUNT_FILTERS)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use blacar_core::value::{CompareOp, FieldValue};

    use super::*;

    fn raw(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn test_temporal_suffixes_target_date_joined() {
        let bound = account_filters()
            .bind(&raw(&[
                ("date_joined_after", "2026-01-01T00:00:00Z"),
                ("date_joined_ibefore", "2026-02-01T00:00:00Z"),
            ]))
            .unwrap();
        let expressions = bound.expressions();
        assert_eq!(expressions.len(), 2);
        assert!(expressions
            .iter()
            .all(|expr| expr.field == "date_joined"));
        let ops: Vec<CompareOp> = expressions.iter().map(|expr| expr.op).collect();
        assert!(ops.contains(&CompareOp::Gt));
        assert!(ops.contains(&CompareOp::Lte));
    }

    #[test]
    fn test_email_binds_as_typed_equality() {
        let bound = account_filters()
            .bind(&raw(&[("email", "ada@example.com")]))
            .unwrap();
        let expr = &bound.expressions()[0];
        assert_eq!(expr.field, "email");
        assert_eq!(expr.op, CompareOp::Eq);
        assert_eq!(expr.value, FieldValue::Str("ada@example.com".to_owned()));
    }

    #[test]
    fn test_ordering_is_validated_against_the_schema() {
        let bound = account_filters()
            .bind(&raw(&[("order", "-date_joined")]))
            .unwrap();
        assert!(bound.order().is_some());

        let err = account_filters()
            .bind(&raw(&[("order", "password_hash")]))
            .unwrap_err();
        assert_eq!(err.code(), "validation_error");
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let bound = account_filters()
            .bind(&raw(&[("nickname", "ada"), ("is_active", "true")]))
            .unwrap();
        assert_eq!(bound.expressions().len(), 1);
    }

    #[test]
    fn test_coercion_failures_name_the_field() {
        let err = account_filters()
            .bind(&raw(&[("date_joined_after", "not a date")]))
            .unwrap_err();
        assert_eq!(err.code(), "validation_error");
    }
}
