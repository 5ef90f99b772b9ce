//! Features Module - From raw flow to model input
//!
//! Flow representation, synthesis layout, packet sources and the
//! transformer that feeds the ensemble.

pub mod vector;
pub mod layout;
pub mod source;
pub mod transform;

#[cfg(test)]
mod tests;

// Re-export common types
pub use vector::FeatureVector;
pub use source::{ChannelSource, PacketFeed, PacketSource, SyntheticSource};
pub use transform::{transform, ModelInput};
