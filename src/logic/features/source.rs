//! Packet Sources
//!
//! Where the detection loop gets its next flow from: a synthesizer for
//! demos and tests, or a bounded channel fed by a capture pipeline.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};

use super::layout::{FeatureRange, SYNTHESIS_TABLE};
use super::vector::FeatureVector;
use crate::constants::COMBINED_SCORE_FEATURE;
use crate::logic::artifacts::ArtifactStore;
use crate::logic::error::LoopFatalError;

// ============================================================================
// SOURCE TRAIT
// ============================================================================

pub trait PacketSource: Send {
    /// Next packet, or `None` when nothing is available this tick
    fn next_packet(&mut self) -> Result<Option<FeatureVector>, LoopFatalError>;
}

// ============================================================================
// SYNTHETIC SOURCE
// ============================================================================

/// Draws plausible flows from the synthesis table
pub struct SyntheticSource {
    rng: StdRng,
    /// Model-referenced features outside the synthesis table
    fill: Vec<String>,
}

impl SyntheticSource {
    pub fn new(store: &ArtifactStore) -> Self {
        Self::with_rng(store, StdRng::from_entropy())
    }

    /// Deterministic source for tests and replays
    pub fn with_seed(store: &ArtifactStore, seed: u64) -> Self {
        Self::with_rng(store, StdRng::seed_from_u64(seed))
    }

    fn with_rng(store: &ArtifactStore, rng: StdRng) -> Self {
        let mut fill: Vec<String> = Vec::new();
        let referenced = store.weights().names().iter().chain(store.selected_features());
        for name in referenced {
            let known = SYNTHESIS_TABLE.iter().any(|(n, _)| n == name);
            if !known && name != COMBINED_SCORE_FEATURE && !fill.contains(name) {
                fill.push(name.clone());
            }
        }

        if !fill.is_empty() {
            log::debug!("Synthesizer fills {} unknown features with 0.0", fill.len());
        }

        Self { rng, fill }
    }

    /// Generate one packet
    pub fn synthesize(&mut self) -> FeatureVector {
        let mut packet = FeatureVector::new();

        for (name, range) in SYNTHESIS_TABLE {
            let value = match *range {
                FeatureRange::Uniform { low, high } => self.rng.gen_range(low..high),
                FeatureRange::Integer { low, high } => self.rng.gen_range(low..high) as f64,
                FeatureRange::Flag => {
                    if self.rng.gen_bool(0.5) { 1.0 } else { 0.0 }
                }
            };
            packet.set(*name, value);
        }

        for name in &self.fill {
            packet.fill_default(name);
        }

        packet
    }
}

impl PacketSource for SyntheticSource {
    fn next_packet(&mut self) -> Result<Option<FeatureVector>, LoopFatalError> {
        Ok(Some(self.synthesize()))
    }
}

// ============================================================================
// CHANNEL SOURCE
// ============================================================================

/// Receiving end of an external packet feed
pub struct ChannelSource {
    rx: mpsc::Receiver<FeatureVector>,
}

/// Sending end handed to the capture pipeline
#[derive(Clone)]
pub struct PacketFeed {
    tx: mpsc::Sender<FeatureVector>,
}

impl ChannelSource {
    /// Create a bounded feed and its source
    pub fn bounded(capacity: usize) -> (PacketFeed, ChannelSource) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (PacketFeed { tx }, ChannelSource { rx })
    }
}

impl PacketSource for ChannelSource {
    fn next_packet(&mut self) -> Result<Option<FeatureVector>, LoopFatalError> {
        match self.rx.try_recv() {
            Ok(packet) => Ok(Some(packet)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(LoopFatalError::SourceClosed),
        }
    }
}

impl PacketFeed {
    /// Queue a packet without blocking. Returns false if it was dropped.
    pub fn submit(&self, packet: FeatureVector) -> bool {
        match self.tx.try_send(packet) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                log::warn!("Packet feed full, dropping packet");
                false
            }
            Err(TrySendError::Closed(_)) => {
                log::debug!("Packet feed closed, dropping packet");
                false
            }
        }
    }
}
