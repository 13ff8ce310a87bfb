//! Domain model for the accounts context.

pub mod events;
pub mod user;
