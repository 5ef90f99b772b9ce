//! Result Emitter - Outbound event sinks
//!
//! The controller's dispatcher hands every StreamEvent to a `ResultEmitter`.
//! The bundled emitters never block and never fail the caller. A full or
//! subscriber-less sink drops the event and counts it.

use std::sync::atomic::{AtomicU64, Ordering};
use chrono::Local;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};

use crate::logic::model::DetectionResult;

// ============================================================================
// STREAM EVENT
// ============================================================================

/// One timestamped batch of per-model verdicts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamEvent {
    /// Wall clock, `HH:MM:SS`
    pub timestamp: String,
    /// One entry per model, in registration order
    pub results: Vec<DetectionResult>,
}

impl StreamEvent {
    /// Stamp results with the current local time
    pub fn now(results: Vec<DetectionResult>) -> Self {
        Self {
            timestamp: Local::now().format("%H:%M:%S").to_string(),
            results,
        }
    }

    pub fn malicious_count(&self) -> usize {
        self.results.iter().filter(|r| r.verdict.is_malicious()).count()
    }
}

// ============================================================================
// EMITTER TRAIT
// ============================================================================

pub trait ResultEmitter: Send + Sync {
    /// Fire-and-forget handoff
    fn publish(&self, event: StreamEvent);
}

/// Delivery counters shared by the emitters
#[derive(Debug, Default)]
struct Counters {
    published: AtomicU64,
    dropped: AtomicU64,
}

impl Counters {
    fn delivered(&self) {
        self.published.fetch_add(1, Ordering::Relaxed);
    }

    fn dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }
}

// ============================================================================
// BROADCAST EMITTER
// ============================================================================

/// Fan-out to any number of subscribers.
///
/// Slow subscribers lag and lose the oldest events; they never slow
/// down the loop.
pub struct BroadcastEmitter {
    tx: broadcast::Sender<StreamEvent>,
    counters: Counters,
}

impl BroadcastEmitter {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx, counters: Counters::default() }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StreamEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn published(&self) -> u64 {
        self.counters.published.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.counters.dropped.load(Ordering::Relaxed)
    }
}

impl ResultEmitter for BroadcastEmitter {
    fn publish(&self, event: StreamEvent) {
        match self.tx.send(event) {
            Ok(_) => self.counters.delivered(),
            Err(_) => {
                // No subscriber yet
                self.counters.dropped();
                log::debug!("No subscriber, detection event dropped");
            }
        }
    }
}

// ============================================================================
// CHANNEL EMITTER
// ============================================================================

/// Single consumer, bounded queue
pub struct ChannelEmitter {
    tx: mpsc::Sender<StreamEvent>,
    counters: Counters,
}

impl ChannelEmitter {
    pub fn bounded(capacity: usize) -> (Self, mpsc::Receiver<StreamEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx, counters: Counters::default() }, rx)
    }

    pub fn published(&self) -> u64 {
        self.counters.published.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.counters.dropped.load(Ordering::Relaxed)
    }
}

impl ResultEmitter for ChannelEmitter {
    fn publish(&self, event: StreamEvent) {
        match self.tx.try_send(event) {
            Ok(()) => self.counters.delivered(),
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.counters.dropped();
                log::warn!("Event channel full, dropping detection event");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.counters.dropped();
                log::debug!("Event receiver gone, dropping detection event");
            }
        }
    }
}
