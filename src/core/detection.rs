//! Detection parameters and report structures

use serde::Serialize;

use crate::config;
use crate::core::Embedding;

/// Type-safe parameter constrained to the open interval (0, 1)
///
/// Used for the cluster-membership cutoff and the density percentile,
/// which the detector tunes independently.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Fraction(f32);

impl Fraction {
	/// Creates a new fraction, returning error if out of range
	pub fn new(value: f32) -> Result<Self, String> {
		if value > 0.0 && value < 1.0 {
			Ok(Self(value))
		} else {
			Err(format!("value must be in (0.0, 1.0), got {}", value))
		}
	}

	/// Returns the inner value
	pub fn value(&self) -> f32 {
		self.0
	}
}

/// Parameters for one rare-embedding detection pass
#[derive(Debug, Clone, Serialize)]
pub struct DetectParams {
	/// Number of mixture components to fit
	pub components: usize,
	/// Components whose population-mean membership falls below this are low-density
	pub cluster_cutoff: Fraction,
	/// Percentile of the KDE log-densities below which a point is rare
	pub density_percentile: Fraction,
	/// Base bandwidth, scaled per point by mean neighbor distance
	pub base_bandwidth: f32,
	/// Seed for mixture initialization
	pub seed: u64,
}

impl Default for DetectParams {
	fn default() -> Self {
		Self {
			components: config::DEFAULT_COMPONENTS,
			cluster_cutoff: Fraction::new(config::DEFAULT_CLUSTER_CUTOFF).unwrap(),
			density_percentile: Fraction::new(config::DEFAULT_DENSITY_PERCENTILE).unwrap(),
			base_bandwidth: config::DEFAULT_BASE_BANDWIDTH,
			seed: config::DEFAULT_SEED,
		}
	}
}

/// One population member classified as rare
#[derive(Debug, Clone, Serialize)]
pub struct RareMember {
	/// Index into the original population ordering
	pub index: usize,
	/// KDE log-density at this point (None when the subset was too small to estimate)
	pub log_density: Option<f64>,
}

/// Complete result of a detection pass
#[derive(Debug, Serialize)]
pub struct DetectionReport {
	/// Crate version that produced this
	pub version: String,
	/// When detection ran
	pub timestamp: String,
	/// Parameters used
	pub params: DetectParams,
	/// Population size
	pub population: usize,
	/// Population-mean membership per mixture component
	pub component_membership: Vec<f64>,
	/// Components flagged as low-density
	pub low_density_components: Vec<usize>,
	/// Number of embeddings assigned to flagged components
	pub subset_size: usize,
	/// Log-density percentile threshold (None when the filter never ran)
	pub log_density_threshold: Option<f64>,
	/// Members classified as rare, in population order
	pub rare: Vec<RareMember>,
}

impl DetectionReport {
	/// Resolve the rare members back to their embeddings
	///
	/// Every returned embedding is bit-identical to a row of the population
	/// the report was produced from.
	pub fn rare_embeddings(&self, population: &[Embedding]) -> Vec<Embedding> {
		self.rare
			.iter()
			.map(|m| population[m.index].clone())
			.collect()
	}
}
