//! Flow Sentinel - ensemble detection engine for network flows
//!
//! Loads pre-trained artifacts once, then scores flows either in a
//! controllable background loop or in batches.

pub mod constants;
pub mod logic;

pub use constants::EngineConfig;
pub use logic::artifacts::ArtifactStore;
pub use logic::detection_loop::{DetectionController, EngineStatus};
pub use logic::events::{BroadcastEmitter, ChannelEmitter, ResultEmitter, StreamEvent};
pub use logic::features::{FeatureVector, PacketSource};
pub use logic::model::{DetectionResult, Model, Verdict};
