//! Listener doubles for dispatch tests.

use std::sync::{Arc, Mutex};

use blacar_core::event::EventListener;
use uuid::Uuid;

/// A listener that records the id of every event it receives.
#[derive(Debug, Clone, Default)]
pub struct RecordingListener {
    seen: Arc<Mutex<Vec<Uuid>>>,
}

impl RecordingListener {
    /// Creates an empty recording listener.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The listener callable to register with a broker.
    #[must_use]
    pub fn listener(&self) -> EventListener {
        let seen = Arc::clone(&self.seen);
        Arc::new(move |event| {
            seen.lock().unwrap().push(event.event_id());
            Ok(())
        })
    }

    /// Ids of the events received, in delivery order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn seen(&self) -> Vec<Uuid> {
        self.seen.lock().unwrap().clone()
    }

    /// Number of events received.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn count(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

/// A listener that always fails. Useful for testing that one subscriber's
/// fault never aborts dispatch of the remaining listeners and events.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingListener;

impl FailingListener {
    /// The always-failing listener callable.
    #[must_use]
    pub fn listener() -> EventListener {
        Arc::new(|_| Err("listener failure".into()))
    }
}
