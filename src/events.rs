//! Event fan-out
//!
//! The core emits trip and daily events over plain mpsc channels so that
//! transport collaborators (persistence, push notification, UI refresh)
//! subscribe to computation results instead of being called back ad hoc.

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Mutex;

use crate::types::{DailyRecord, TripSummary};

/// Event published by the engine.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// A trip closed and produced its summary
    TripClosed(TripSummary),
    /// A daily record was finalized for a caller
    DailyFinalized(DailyRecord),
}

/// Fan-out bus over mpsc senders.
///
/// A subscriber that drops its receiver is silently pruned on the next
/// publish; delivery is never an error for the computing side.
#[derive(Debug, Default)]
pub struct EventBus {
    senders: Mutex<Vec<Sender<EngineEvent>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber and return its receiving end.
    pub fn subscribe(&self) -> Receiver<EngineEvent> {
        let (tx, rx) = mpsc::channel();
        self.senders
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(tx);
        rx
    }

    /// Deliver an event to every live subscriber.
    pub fn publish(&self, event: EngineEvent) {
        let mut senders = self.senders.lock().unwrap_or_else(|e| e.into_inner());
        senders.retain(|tx| tx.send(event.clone()).is_ok());
    }
}
