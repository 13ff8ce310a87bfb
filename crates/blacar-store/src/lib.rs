//! Blacar Store — `PostgreSQL`-backed repository implementations.
//!
//! Builds on the abstractions in `blacar-core`: compiled criteria render
//! to parameterized SQL predicates, the repository contract is fulfilled
//! against a [`sqlx::PgPool`], and aggregate upserts run inside a
//! transaction so pending events are only surfaced after commit.

pub mod config;
pub mod pg;

pub use config::PgStoreConfig;
pub use pg::{PgAggregate, PgRepository};
