//! Domain events for the accounts context.

use std::any::Any;

use blacar_core::event::DomainEvent;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Raised when a new account is registered.
#[derive(Debug, Clone)]
pub struct UserRegistered {
    /// Event identifier.
    pub event_id: Uuid,
    /// When the registration happened.
    pub occurred_at: DateTime<Utc>,
    /// The registered user's id.
    pub user_id: Uuid,
    /// The normalized email the account was registered with.
    pub email: String,
}

impl DomainEvent for UserRegistered {
    fn event_id(&self) -> Uuid {
        self.event_id
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    fn event_type(&self) -> &'static str {
        "accounts.user_registered"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
