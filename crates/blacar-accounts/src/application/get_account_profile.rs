//! Account profile lookup use case.

use std::sync::Arc;

use blacar_core::error::DomainError;
use blacar_core::repository::Repository;
use uuid::Uuid;

use crate::domain::user::User;

/// Returns the account profile for a given user id.
pub struct GetAccountProfile {
    users: Arc<dyn Repository<User>>,
}

impl GetAccountProfile {
    /// Wires the use case to the accounts repository.
    #[must_use]
    pub fn new(users: Arc<dyn Repository<User>>) -> Self {
        Self { users }
    }

    /// Looks up the account.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when no account has this id.
    pub async fn execute(&self, user_id: Uuid) -> Result<User, DomainError> {
        self.users.get_by_id(user_id, false).await
    }
}
