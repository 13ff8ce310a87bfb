//! Application-level use cases for the accounts context.

pub mod get_account_profile;
pub mod register_account;
