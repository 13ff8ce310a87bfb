//! Blacar backend — user accounts bounded context.
//!
//! Responsible for account registration, account profiles, and the
//! account search criteria exposed to callers.

pub mod application;
pub mod criteria;
pub mod domain;
pub mod pg;
