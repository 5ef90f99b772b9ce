//! Central Configuration Constants
//!
//! Single source of truth for all configuration defaults.
//! Every default can be overridden through the environment.

use std::path::PathBuf;
use std::time::Duration;

/// Default artifact directory (relative to the working directory)
pub const DEFAULT_ARTIFACT_DIR: &str = "artifacts";

/// Default detection loop interval (milliseconds)
pub const DEFAULT_INTERVAL_MS: u64 = 2_000;

/// Default number of events buffered by an emitter
pub const DEFAULT_EMITTER_CAPACITY: usize = 64;

/// How long `stop()` waits for a sink call in flight before detaching it (milliseconds)
pub const DISPATCH_GRACE_MS: u64 = 250;

/// Derived feature appended by the transformer before projection
pub const COMBINED_SCORE_FEATURE: &str = "Combined_Importance_Score";

/// Probability above which a model verdict is malicious
pub const MALICIOUS_THRESHOLD: f64 = 0.5;

/// App version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// App name
pub const APP_NAME: &str = "Flow Sentinel";

// ============================================
// Helper functions to read from env with fallback
// ============================================

/// Get artifact directory from environment or use default
pub fn get_artifact_dir() -> PathBuf {
    std::env::var("FLOW_SENTINEL_ARTIFACT_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_ARTIFACT_DIR))
}

/// Get loop interval from environment or use default
pub fn get_interval_ms() -> u64 {
    std::env::var("FLOW_SENTINEL_INTERVAL_MS")
        .ok()
        .and_then(|s| s.parse().ok())
        .filter(|ms| *ms > 0)
        .unwrap_or(DEFAULT_INTERVAL_MS)
}

/// Get emitter capacity from environment or use default
pub fn get_emitter_capacity() -> usize {
    std::env::var("FLOW_SENTINEL_EMITTER_CAPACITY")
        .ok()
        .and_then(|s| s.parse().ok())
        .filter(|cap| *cap > 0)
        .unwrap_or(DEFAULT_EMITTER_CAPACITY)
}

/// Engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Directory holding weight table, normalizer, selected features and models
    pub artifact_dir: PathBuf,

    /// Pause between two detection iterations
    pub interval: Duration,

    /// Bounded emitter buffer size
    pub emitter_capacity: usize,
}

impl EngineConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            artifact_dir: get_artifact_dir(),
            interval: Duration::from_millis(get_interval_ms()),
            emitter_capacity: get_emitter_capacity(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            artifact_dir: PathBuf::from(DEFAULT_ARTIFACT_DIR),
            interval: Duration::from_millis(DEFAULT_INTERVAL_MS),
            emitter_capacity: DEFAULT_EMITTER_CAPACITY,
        }
    }
}
