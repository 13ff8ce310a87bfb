//! Account registration use case.

use std::collections::BTreeMap;
use std::sync::Arc;

use blacar_core::broker::DomainEventBroker;
use blacar_core::clock::Clock;
use blacar_core::entity::Entity;
use blacar_core::error::DomainError;
use blacar_core::repository::Repository;

use crate::criteria::account_filters;
use crate::domain::user::User;

/// Hashes raw passwords before they reach the aggregate. Hashing itself
/// lives outside this context.
pub trait PasswordHasher: Send + Sync {
    /// Hashes a raw password.
    fn hash(&self, raw: &str) -> String;
}

/// Registers a new account: rejects duplicate emails, creates the
/// aggregate, stores it, and dispatches the recorded events after the
/// store commits.
pub struct RegisterAccount {
    users: Arc<dyn Repository<User>>,
    broker: Arc<dyn DomainEventBroker>,
    hasher: Arc<dyn PasswordHasher>,
}

impl RegisterAccount {
    /// Wires the use case to its collaborators.
    #[must_use]
    pub fn new(
        users: Arc<dyn Repository<User>>,
        broker: Arc<dyn DomainEventBroker>,
        hasher: Arc<dyn PasswordHasher>,
    ) -> Self {
        Self {
            users,
            broker,
            hasher,
        }
    }

    /// Executes the registration.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a malformed email, or a conflict on
    /// the `email` field when an account with that email already exists.
    /// A uniqueness race that slips past the lookup still surfaces as the
    /// same typed conflict from the store layer.
    pub async fn execute(
        &self,
        email: &str,
        password: &str,
        clock: &dyn Clock,
    ) -> Result<User, DomainError> {
        let lookup = BTreeMap::from([("email".to_owned(), email.trim().to_lowercase())]);
        let criteria = account_filters().bind(&lookup)?;
        match self.users.get(&criteria, false).await {
            Ok(_) => return Err(DomainError::conflict("email")),
            Err(DomainError::NotFound { .. }) => {}
            Err(other) => return Err(other),
        }

        let mut user = User::create(email, clock)?;
        user.set_password_hash(self.hasher.hash(password));

        let pending = self.users.store(&mut user).await?;
        tracing::info!(user_id = %user.id(), "account registered");
        pending.dispatch(self.broker.as_ref());
        Ok(user)
    }
}
