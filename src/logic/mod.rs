//! Logic Module - Detection engine
//!
//! ## Layout
//! - `artifacts/` - weight table, normalizer, selected features, models
//! - `features/` - flow vectors, synthesis, transformer
//! - `model/` - model capability, threshold, ensemble scorer
//! - `detection_loop` - start/stop controller around the background loop
//! - `events` - result emitters
//! - `batch` - scoring of finite flow sets

pub mod error;
pub mod artifacts;
pub mod features;
pub mod model;
pub mod events;
pub mod detection_loop;
pub mod batch;

#[cfg(test)]
pub(crate) mod testing;

use artifacts::ArtifactStore;
use error::TransformError;
use features::FeatureVector;
use model::DetectionResult;

/// Transform one packet and score it with the whole ensemble
pub fn process_packet(
    packet: &FeatureVector,
    store: &ArtifactStore,
) -> Result<Vec<DetectionResult>, TransformError> {
    let input = features::transform(packet, store)?;
    Ok(model::score(&input, store.models()))
}
