//! Time source used wherever the domain stamps an instant.

use chrono::{DateTime, Utc};

/// Supplies the current instant. Injected as a collaborator so event
/// timestamps and audit fields stay controllable in tests.
pub trait Clock: Send + Sync {
    /// The current moment in UTC.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock implementation for everything outside of tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
