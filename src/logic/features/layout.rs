//! Synthesis Layout - Reference value ranges for flow features
//!
//! Used to fabricate plausible flows when no capture feed is wired in.
//! Ranges mirror what CIC-style flow exporters report for ordinary traffic.

/// How a single feature is drawn
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FeatureRange {
    /// Uniform real in `[low, high)`
    Uniform { low: f64, high: f64 },
    /// Uniform integer in `[low, high)`
    Integer { low: i64, high: i64 },
    /// 0 or 1 with equal probability
    Flag,
}

impl FeatureRange {
    /// Whether `value` could have been drawn from this range
    pub fn contains(&self, value: f64) -> bool {
        match *self {
            FeatureRange::Uniform { low, high } => value >= low && value < high,
            FeatureRange::Integer { low, high } => {
                value.fract() == 0.0 && value >= low as f64 && value < high as f64
            }
            FeatureRange::Flag => value == 0.0 || value == 1.0,
        }
    }
}

const fn uniform(low: f64, high: f64) -> FeatureRange {
    FeatureRange::Uniform { low, high }
}

const fn integer(low: i64, high: i64) -> FeatureRange {
    FeatureRange::Integer { low, high }
}

/// Features the synthesizer knows how to draw, in a stable order
pub const SYNTHESIS_TABLE: &[(&str, FeatureRange)] = &[
    // === Flow ===
    ("Flow Duration", integer(1_000, 1_000_000)),
    ("Flow Bytes/s", uniform(1_000.0, 1_000_000.0)),
    ("Flow Packets/s", uniform(10.0, 500.0)),

    // === Forward direction ===
    ("Total Fwd Packets", integer(1, 50)),
    ("Fwd Packet Length Mean", uniform(50.0, 500.0)),
    ("Fwd Packet Length Std", uniform(0.0, 5.0)),
    ("Fwd Packet Length Min", uniform(0.0, 100.0)),
    ("Fwd Packet Length Max", uniform(100.0, 600.0)),
    ("Fwd Header Length", integer(20, 100)),
    ("Fwd Act Data Packets", integer(0, 20)),
    ("Fwd IAT Mean", uniform(0.0, 1_000.0)),
    ("Fwd IAT Max", uniform(0.0, 5_000.0)),
    ("Fwd IAT Std", uniform(0.0, 1_000.0)),
    ("Fwd IAT Total", uniform(0.0, 10_000.0)),
    ("Subflow Fwd Packets", integer(0, 10)),

    // === Backward direction ===
    ("Total Backward Packets", integer(0, 30)),
    ("Bwd Packet Length Mean", uniform(40.0, 450.0)),
    ("Bwd Packet Length Std", uniform(0.0, 5.0)),
    ("Bwd Packet Length Min", uniform(0.0, 50.0)),
    ("Bwd Packets/s", uniform(0.0, 500.0)),
    ("Avg Bwd Segment Size", uniform(0.0, 100.0)),
    ("Subflow Bwd Packets", integer(0, 10)),

    // === Sizes / timing ===
    ("Avg Packet Size", uniform(50.0, 300.0)),
    ("Pkt Len Mean", uniform(100.0, 400.0)),
    ("Idle Mean", uniform(0.0, 10_000.0)),

    // === TCP flags ===
    ("FIN Flag Count", FeatureRange::Flag),
    ("SYN Flag Count", FeatureRange::Flag),
    ("ACK Flag Count", FeatureRange::Flag),
];

/// Look up the synthesis range of a feature
pub fn feature_range(name: &str) -> Option<FeatureRange> {
    SYNTHESIS_TABLE
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, range)| *range)
}
