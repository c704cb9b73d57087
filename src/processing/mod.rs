//! Numeric analysis passes over embedding populations

pub mod density;
pub mod detect;
pub mod fuse;
pub mod mixture;

pub use detect::detect_rare;
pub use fuse::{fuse, fuse_with_weights, AttentionScorer, GateMatrix, SqueezeExcitation};
pub use mixture::{GaussianMixture, MixtureFit};
