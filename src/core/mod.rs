//! Core domain types

pub mod detection;
pub mod embedding;

pub use detection::{DetectParams, DetectionReport, Fraction, RareMember};
pub use embedding::Embedding;
