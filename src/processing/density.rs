//! Adaptive-bandwidth kernel density estimation over a low-density subset

use anyhow::{bail, Result};
use rayon::prelude::*;

use crate::core::Embedding;

const LN_2PI: f64 = 1.837_877_066_409_345_3;

/// Bandwidth for one subset point: base bandwidth scaled by the mean
/// Euclidean distance to the other subset members
///
/// The point itself is excluded from the average.
pub fn adaptive_bandwidth(index: usize, subset: &[Embedding], base: f32) -> Result<f32> {
	if subset.len() < 2 {
		bail!("Bandwidth needs at least 2 points, got {}", subset.len());
	}
	if base <= 0.0 {
		bail!("Base bandwidth must be positive, got {}", base);
	}

	let point = &subset[index];
	let total: f32 = subset
		.iter()
		.enumerate()
		.filter(|(j, _)| *j != index)
		.map(|(_, other)| point.distance(other))
		.sum();
	let mean_distance = total / (subset.len() - 1) as f32;

	let bandwidth = base * mean_distance;
	if bandwidth <= 0.0 || !bandwidth.is_finite() {
		bail!("Degenerate bandwidth {} at point {} (duplicate embeddings?)", bandwidth, index);
	}

	Ok(bandwidth)
}

/// Gaussian-kernel log-density of one subset point, evaluated over the
/// whole subset with the given bandwidth
///
/// Stays in log space; raw densities underflow in high dimensions.
pub fn log_density(index: usize, subset: &[Embedding], bandwidth: f32) -> f64 {
	let point = &subset[index];
	let dim = point.dim() as f64;
	let h = bandwidth as f64;
	let m = subset.len() as f64;

	let exponents: Vec<f64> = subset
		.iter()
		.map(|other| {
			let d = point.distance(other) as f64;
			-(d * d) / (2.0 * h * h)
		})
		.collect();

	log_sum_exp(&exponents) - m.ln() - dim * h.ln() - 0.5 * dim * LN_2PI
}

/// Per-point adaptive bandwidths and log-densities for a whole subset
pub fn log_densities(subset: &[Embedding], base_bandwidth: f32) -> Result<Vec<f64>> {
	let bandwidths: Vec<f32> = subset
		.iter()
		.enumerate()
		.map(|(i, _)| adaptive_bandwidth(i, subset, base_bandwidth))
		.collect::<Result<_>>()?;

	Ok((0..subset.len())
		.into_par_iter()
		.map(|i| log_density(i, subset, bandwidths[i]))
		.collect())
}

fn log_sum_exp(values: &[f64]) -> f64 {
	let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
	if max == f64::NEG_INFINITY {
		return f64::NEG_INFINITY;
	}
	max + values.iter().map(|v| (v - max).exp()).sum::<f64>().ln()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_bandwidth_excludes_self() {
		let subset = vec![
			Embedding::raw(vec![0.0, 0.0]),
			Embedding::raw(vec![3.0, 4.0]),
		];
		// Mean distance to the single other point is exactly 5
		let bw = adaptive_bandwidth(0, &subset, 2.0).unwrap();
		assert!((bw - 10.0).abs() < 1e-6);
	}

	#[test]
	fn test_duplicate_points_are_an_error() {
		let subset = vec![
			Embedding::raw(vec![1.0, 1.0]),
			Embedding::raw(vec![1.0, 1.0]),
		];
		assert!(adaptive_bandwidth(0, &subset, 1.0).is_err());
	}

	#[test]
	fn test_singleton_subset_is_an_error() {
		let subset = vec![Embedding::raw(vec![1.0, 1.0])];
		assert!(adaptive_bandwidth(0, &subset, 1.0).is_err());
	}

	#[test]
	fn test_isolated_point_has_lowest_density() {
		let mut subset: Vec<Embedding> = (0..8)
			.map(|i| Embedding::raw(vec![(i as f32) * 0.2, 0.0]))
			.collect();
		subset.push(Embedding::raw(vec![100.0, 0.0]));

		let densities = log_densities(&subset, 1.0).unwrap();
		let lowest = densities
			.iter()
			.enumerate()
			.min_by(|a, b| a.1.partial_cmp(b.1).unwrap())
			.map(|(i, _)| i)
			.unwrap();
		assert_eq!(lowest, 8);
	}

	#[test]
	fn test_log_density_is_finite_in_high_dimensions() {
		let subset: Vec<Embedding> = (0..4)
			.map(|i| Embedding::raw(vec![i as f32; 1024]))
			.collect();
		let densities = log_densities(&subset, 1.0).unwrap();
		assert!(densities.iter().all(|d| d.is_finite()));
	}
}
