//! The `User` aggregate root.

use std::sync::Arc;

use blacar_core::clock::Clock;
use blacar_core::entity::{AggregateRoot, Entity, RecordedEvents, new_id};
use blacar_core::error::DomainError;
use blacar_core::event::DomainEvent;
use blacar_core::value::FieldValue;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::events::UserRegistered;

/// The persisted state of a user, used to rehydrate an aggregate from
/// storage without replaying its history.
#[derive(Debug, Clone)]
pub struct UserRecord {
    /// Aggregate identifier.
    pub id: Uuid,
    /// Normalized, unique email address.
    pub email: String,
    /// Password hash, absent for passwordless accounts.
    pub password_hash: Option<String>,
    /// Whether the account can authenticate.
    pub is_active: bool,
    /// Staff flag.
    pub is_staff: bool,
    /// Superuser flag.
    pub is_superuser: bool,
    /// When the account was registered.
    pub date_joined: DateTime<Utc>,
    /// Last successful login, if any.
    pub last_login: Option<DateTime<Utc>>,
}

/// A user account. The email is normalized and validated at creation, so
/// a structurally invalid aggregate can never reach storage.
#[derive(Debug, Clone)]
pub struct User {
    id: Uuid,
    email: String,
    password_hash: Option<String>,
    is_active: bool,
    is_staff: bool,
    is_superuser: bool,
    date_joined: DateTime<Utc>,
    last_login: Option<DateTime<Utc>>,
    events: RecordedEvents,
}

fn normalize_email(raw: &str) -> Result<String, DomainError> {
    let email = raw.trim().to_lowercase();
    let valid = matches!(
        email.split_once('@'),
        Some((local, domain)) if !local.is_empty() && domain.contains('.') && !domain.starts_with('.')
    );
    if valid {
        Ok(email)
    } else {
        Err(DomainError::validation_on(
            "email",
            "not a valid email address",
        ))
    }
}

impl User {
    /// Registers a regular account.
    ///
    /// The email is trimmed and lowercased, and a [`UserRegistered`]
    /// event is recorded for dispatch after the first store commits.
    ///
    /// # Errors
    ///
    /// Returns a validation error when the email is not structurally
    /// valid.
    pub fn create(email: &str, clock: &dyn Clock) -> Result<Self, DomainError> {
        Self::register(email, false, false, clock)
    }

    /// Registers a superuser account (staff and superuser flags set).
    ///
    /// # Errors
    ///
    /// Returns a validation error when the email is not structurally
    /// valid.
    pub fn create_superuser(email: &str, clock: &dyn Clock) -> Result<Self, DomainError> {
        Self::register(email, true, true, clock)
    }

    fn register(
        email: &str,
        is_staff: bool,
        is_superuser: bool,
        clock: &dyn Clock,
    ) -> Result<Self, DomainError> {
        let email = normalize_email(email)?;
        let now = clock.now();
        let mut user = Self {
            id: new_id(),
            email: email.clone(),
            password_hash: None,
            is_active: true,
            is_staff,
            is_superuser,
            date_joined: now,
            last_login: None,
            events: RecordedEvents::new(),
        };
        user.events.record(UserRegistered {
            event_id: new_id(),
            occurred_at: now,
            user_id: user.id,
            email,
        });
        Ok(user)
    }

    /// Rehydrates a stored user. No events are recorded.
    #[must_use]
    pub fn hydrate(record: UserRecord) -> Self {
        Self {
            id: record.id,
            email: record.email,
            password_hash: record.password_hash,
            is_active: record.is_active,
            is_staff: record.is_staff,
            is_superuser: record.is_superuser,
            date_joined: record.date_joined,
            last_login: record.last_login,
            events: RecordedEvents::new(),
        }
    }

    /// Normalized email address.
    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    /// Password hash, if one is set.
    #[must_use]
    pub fn password_hash(&self) -> Option<&str> {
        self.password_hash.as_deref()
    }

    /// Whether the account can authenticate.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.is_active
    }

    /// Staff flag.
    #[must_use]
    pub const fn is_staff(&self) -> bool {
        self.is_staff
    }

    /// Superuser flag.
    #[must_use]
    pub const fn is_superuser(&self) -> bool {
        self.is_superuser
    }

    /// When the account was registered.
    #[must_use]
    pub const fn date_joined(&self) -> DateTime<Utc> {
        self.date_joined
    }

    /// Last successful login, if any.
    #[must_use]
    pub const fn last_login(&self) -> Option<DateTime<Utc>> {
        self.last_login
    }

    /// Replaces the stored password hash.
    pub fn set_password_hash(&mut self, hash: String) {
        self.password_hash = Some(hash);
    }

    /// Marks a successful login at the clock's current time.
    pub fn record_login(&mut self, clock: &dyn Clock) {
        self.last_login = Some(clock.now());
    }
}

impl Entity for User {
    fn id(&self) -> Uuid {
        self.id
    }

    fn field_value(&self, field: &str) -> Option<FieldValue> {
        match field {
            "email" => Some(FieldValue::Str(self.email.clone())),
            "is_active" => Some(FieldValue::Bool(self.is_active)),
            "is_staff" => Some(FieldValue::Bool(self.is_staff)),
            "is_superuser" => Some(FieldValue::Bool(self.is_superuser)),
            "date_joined" => Some(FieldValue::DateTime(self.date_joined)),
            "last_login" => self.last_login.map(FieldValue::DateTime),
            _ => None,
        }
    }
}

impl AggregateRoot for User {
    fn pull_events(&mut self) -> Vec<Arc<dyn DomainEvent>> {
        self.events.pull()
    }
}

#[cfg(test)]
mod tests {
    use blacar_test_support::FixedClock;
    use chrono::TimeZone;

    use super::*;

    fn clock() -> FixedClock {
        FixedClock(Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap())
    }

    #[test]
    fn test_create_normalizes_the_email() {
        let user = User::create("  Ada@Example.COM ", &clock()).unwrap();
        assert_eq!(user.email(), "ada@example.com");
        assert!(user.is_active());
        assert!(!user.is_staff());
        assert!(!user.is_superuser());
        assert_eq!(user.date_joined(), clock().0);
        assert!(user.last_login().is_none());
    }

    #[test]
    fn test_create_rejects_malformed_emails() {
        for raw in ["", "ada", "@example.com", "ada@", "ada@nodot"] {
            let err = User::create(raw, &clock()).unwrap_err();
            assert_eq!(err.code(), "validation_error", "accepted {raw:?}");
        }
    }

    #[test]
    fn test_create_superuser_sets_both_flags() {
        let user = User::create_superuser("root@example.com", &clock()).unwrap();
        assert!(user.is_staff());
        assert!(user.is_superuser());
    }

    #[test]
    fn test_registration_records_a_user_registered_event() {
        let mut user = User::create("ada@example.com", &clock()).unwrap();
        let events = user.pull_events();
        assert_eq!(events.len(), 1);
        let event = events[0]
            .as_any()
            .downcast_ref::<UserRegistered>()
            .expect("a UserRegistered event");
        assert_eq!(event.user_id, user.id());
        assert_eq!(event.email, "ada@example.com");
        assert_eq!(event.occurred_at, clock().0);

        // The buffer drains exactly once.
        assert!(user.pull_events().is_empty());
    }

    #[test]
    fn test_hydrate_records_no_events() {
        let mut user = User::hydrate(UserRecord {
            id: new_id(),
            email: "ada@example.com".to_owned(),
            password_hash: Some("hash".to_owned()),
            is_active: true,
            is_staff: false,
            is_superuser: false,
            date_joined: clock().0,
            last_login: None,
        });
        assert!(user.pull_events().is_empty());
    }

    #[test]
    fn test_field_values_cover_the_filterable_fields() {
        let user = User::create("ada@example.com", &clock()).unwrap();
        assert_eq!(
            user.field_value("email"),
            Some(FieldValue::Str("ada@example.com".to_owned()))
        );
        assert_eq!(user.field_value("is_active"), Some(FieldValue::Bool(true)));
        assert_eq!(
            user.field_value("date_joined"),
            Some(FieldValue::DateTime(clock().0))
        );
        assert_eq!(user.field_value("last_login"), None);
        assert_eq!(user.field_value("password_hash"), None);
    }
}
