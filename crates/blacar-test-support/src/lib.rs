//! Shared test doubles and in-memory adapters for the Blacar backend.
//!
//! The in-memory repository implements the same contract as the durable
//! store and is the second repository implementation: single-threaded,
//! test-only, with no concurrent-access guarantees.

mod broker;
mod clock;
mod listeners;
mod memory;

pub use broker::InMemoryDomainEventBroker;
pub use clock::FixedClock;
pub use listeners::{FailingListener, RecordingListener};
pub use memory::InMemoryRepository;
