//! `PostgreSQL` binding for the `User` aggregate.

use blacar_core::entity::Entity;
use blacar_core::error::DomainError;
use blacar_core::value::FieldValue;
use blacar_store::PgAggregate;
use sqlx::Row as _;
use sqlx::postgres::PgRow;

use crate::domain::user::{User, UserRecord};

fn column_error(error: sqlx::Error) -> DomainError {
    DomainError::storage(error.to_string())
}

impl PgAggregate for User {
    const TABLE: &'static str = "users";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "email",
        "password_hash",
        "is_active",
        "is_staff",
        "is_superuser",
        "date_joined",
        "last_login",
    ];

    fn from_row(row: &PgRow) -> Result<Self, DomainError> {
        Ok(Self::hydrate(UserRecord {
            id: row.try_get("id").map_err(column_error)?,
            email: row.try_get("email").map_err(column_error)?,
            password_hash: row.try_get("password_hash").map_err(column_error)?,
            is_active: row.try_get("is_active").map_err(column_error)?,
            is_staff: row.try_get("is_staff").map_err(column_error)?,
            is_superuser: row.try_get("is_superuser").map_err(column_error)?,
            date_joined: row.try_get("date_joined").map_err(column_error)?,
            last_login: row.try_get("last_login").map_err(column_error)?,
        }))
    }

    fn column_values(&self) -> Vec<(&'static str, Option<FieldValue>)> {
        vec![
            ("id", Some(FieldValue::Uuid(self.id()))),
            ("email", Some(FieldValue::Str(self.email().to_owned()))),
            (
                "password_hash",
                self.password_hash().map(|hash| FieldValue::Str(hash.to_owned())),
            ),
            ("is_active", Some(FieldValue::Bool(self.is_active()))),
            ("is_staff", Some(FieldValue::Bool(self.is_staff()))),
            ("is_superuser", Some(FieldValue::Bool(self.is_superuser()))),
            ("date_joined", Some(FieldValue::DateTime(self.date_joined()))),
            ("last_login", self.last_login().map(FieldValue::DateTime)),
        ]
    }
}

#[cfg(test)]
mod tests {
    use blacar_test_support::FixedClock;
    use chrono::{TimeZone, Utc};

    use super::*;

    #[test]
    fn test_column_values_align_with_the_selected_columns() {
        let clock = FixedClock(Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap());
        let user = User::create("ada@example.com", &clock).unwrap();
        let names: Vec<&str> = User::COLUMNS.to_vec();
        let value_names: Vec<&str> = user
            .column_values()
            .iter()
            .map(|(name, _)| *name)
            .collect();
        assert_eq!(value_names, names);
        assert_eq!(names[0], "id");
    }

    #[test]
    fn test_absent_optionals_persist_as_null() {
        let clock = FixedClock(Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap());
        let user = User::create("ada@example.com", &clock).unwrap();
        let values = user.column_values();
        let hash = values.iter().find(|(name, _)| *name == "password_hash");
        assert!(matches!(hash, Some((_, None))));
        let login = values.iter().find(|(name, _)| *name == "last_login");
        assert!(matches!(login, Some((_, None))));
    }
}
