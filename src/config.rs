//! Application configuration and constants

// === Detection Defaults ===
pub const DEFAULT_COMPONENTS: usize = 5;
pub const DEFAULT_CLUSTER_CUTOFF: f32 = 0.05;
pub const DEFAULT_DENSITY_PERCENTILE: f32 = 0.05;
pub const DEFAULT_BASE_BANDWIDTH: f32 = 1.0;
pub const DEFAULT_SEED: u64 = 0;

// === Mixture Fitting ===
pub const EM_MAX_ITERATIONS: usize = 200;
pub const EM_TOLERANCE: f64 = 1e-4;
pub const VARIANCE_FLOOR: f64 = 1e-6;

// === Fusion ===
pub const DEFAULT_REDUCTION_RATIO: usize = 16;

// === Storage ===
pub const MSGPACK_EXT: &str = "msgpack";

// === Inspect ===
pub const PAIRWISE_SAMPLE_CAP: usize = 512;
