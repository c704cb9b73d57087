//! Seeded Gaussian mixture fitting for soft population clustering

use anyhow::{bail, Result};
use rand::rngs::StdRng;
use rand::{RngExt, SeedableRng};
use rayon::prelude::*;

use crate::config::{EM_MAX_ITERATIONS, EM_TOLERANCE, VARIANCE_FLOOR};
use crate::core::Embedding;

const LN_2PI: f64 = 1.837_877_066_409_345_3;

/// Diagonal-covariance Gaussian mixture fitted with expectation-maximization
///
/// The first mean is a seeded random draw from the population; the remaining
/// means are greedy farthest-point picks, so a well-separated point seeds its
/// own component instead of being absorbed by a neighbor.
pub struct GaussianMixture {
	components: usize,
	max_iterations: usize,
	tolerance: f64,
	seed: u64,
}

/// Fitted mixture state: parameters plus per-point soft memberships
pub struct MixtureFit {
	/// Component means (k x d)
	pub means: Vec<Vec<f64>>,
	/// Per-dimension variances (k x d), floored to keep log-densities finite
	pub variances: Vec<Vec<f64>>,
	/// Mixing weights (k), sum to 1
	pub weights: Vec<f64>,
	/// Soft membership per point (n x k), rows sum to 1
	pub responsibilities: Vec<Vec<f64>>,
	/// Hard assignment per point (argmax of its membership row)
	pub labels: Vec<usize>,
	/// EM iterations actually run
	pub iterations: usize,
	/// Final mean log-likelihood
	pub log_likelihood: f64,
}

impl MixtureFit {
	/// Population-average membership of one component
	pub fn mean_membership(&self, component: usize) -> f64 {
		let n = self.responsibilities.len();
		if n == 0 {
			return 0.0;
		}
		self.responsibilities.iter().map(|r| r[component]).sum::<f64>() / n as f64
	}
}

impl GaussianMixture {
	pub fn new(components: usize, seed: u64) -> Self {
		Self {
			components,
			max_iterations: EM_MAX_ITERATIONS,
			tolerance: EM_TOLERANCE,
			seed,
		}
	}

	/// Fit the mixture to a population
	pub fn fit(&self, population: &[Embedding]) -> Result<MixtureFit> {
		let n = population.len();
		let k = self.components;

		if k == 0 {
			bail!("Mixture needs at least one component");
		}
		if n == 0 {
			bail!("No embeddings to cluster");
		}
		if n < k {
			bail!("Population of {} is smaller than {} mixture components", n, k);
		}

		let dim = population[0].dim();
		if dim == 0 {
			bail!("Embeddings have zero dimensions");
		}
		if let Some(bad) = population.iter().position(|e| e.dim() != dim) {
			bail!("Embedding {} has {} dimensions, expected {}", bad, population[bad].dim(), dim);
		}

		let data: Vec<Vec<f64>> = population
			.iter()
			.map(|e| e.as_slice().iter().map(|&v| v as f64).collect())
			.collect();

		let mut means = initial_means(&data, k, self.seed);
		let mut variances = vec![initial_variance(&data, dim); k];
		let mut weights = vec![1.0 / k as f64; k];

		let mut responsibilities = vec![vec![0.0; k]; n];
		let mut previous_ll = f64::NEG_INFINITY;
		let mut log_likelihood = f64::NEG_INFINITY;
		let mut iterations = 0;

		for iter in 0..self.max_iterations {
			iterations = iter + 1;

			// E-step: soft memberships in log space
			let log_weights: Vec<f64> = weights.iter().map(|w| w.max(f64::MIN_POSITIVE).ln()).collect();
			let e_step: Vec<(Vec<f64>, f64)> = data
				.par_iter()
				.map(|point| {
					let log_joint: Vec<f64> = (0..k)
						.map(|c| log_weights[c] + log_gaussian_diag(point, &means[c], &variances[c]))
						.collect();
					let norm = log_sum_exp(&log_joint);
					let row: Vec<f64> = log_joint.iter().map(|lj| (lj - norm).exp()).collect();
					(row, norm)
				})
				.collect();

			log_likelihood = e_step.iter().map(|(_, norm)| norm).sum::<f64>() / n as f64;
			for (row, (resp, _)) in responsibilities.iter_mut().zip(e_step.iter()) {
				row.clone_from(resp);
			}

			// M-step
			for c in 0..k {
				let nc: f64 = responsibilities.iter().map(|r| r[c]).sum();
				if nc <= f64::EPSILON {
					// Component lost all its mass; leave its parameters in place
					weights[c] = 0.0;
					continue;
				}

				weights[c] = nc / n as f64;

				let mut mean = vec![0.0; dim];
				for (point, resp) in data.iter().zip(responsibilities.iter()) {
					for (m, &x) in mean.iter_mut().zip(point.iter()) {
						*m += resp[c] * x;
					}
				}
				for m in &mut mean {
					*m /= nc;
				}

				let mut variance = vec![0.0; dim];
				for (point, resp) in data.iter().zip(responsibilities.iter()) {
					for ((v, &x), &m) in variance.iter_mut().zip(point.iter()).zip(mean.iter()) {
						let d = x - m;
						*v += resp[c] * d * d;
					}
				}
				for v in &mut variance {
					*v = (*v / nc).max(VARIANCE_FLOOR);
				}

				means[c] = mean;
				variances[c] = variance;
			}

			if (log_likelihood - previous_ll).abs() < self.tolerance {
				break;
			}
			previous_ll = log_likelihood;
		}

		let labels: Vec<usize> = responsibilities
			.iter()
			.map(|row| {
				row.iter()
					.enumerate()
					.max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
					.map(|(c, _)| c)
					.unwrap_or(0)
			})
			.collect();

		Ok(MixtureFit {
			means,
			variances,
			weights,
			responsibilities,
			labels,
			iterations,
			log_likelihood,
		})
	}
}

/// Seeded first pick, then greedy farthest-point picks for the rest
fn initial_means(data: &[Vec<f64>], k: usize, seed: u64) -> Vec<Vec<f64>> {
	let mut rng = StdRng::seed_from_u64(seed);
	let first = rng.random_range(0..data.len());

	let mut chosen = vec![first];
	let mut min_dist_sq: Vec<f64> = data.iter().map(|p| dist_sq(p, &data[first])).collect();

	while chosen.len() < k {
		let next = min_dist_sq
			.iter()
			.enumerate()
			.max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
			.map(|(i, _)| i)
			.unwrap_or(0);
		chosen.push(next);
		for (d, p) in min_dist_sq.iter_mut().zip(data.iter()) {
			*d = d.min(dist_sq(p, &data[next]));
		}
	}

	chosen.into_iter().map(|i| data[i].clone()).collect()
}

/// Per-dimension variance of the whole population, floored
fn initial_variance(data: &[Vec<f64>], dim: usize) -> Vec<f64> {
	let n = data.len() as f64;
	let mut mean = vec![0.0; dim];
	for point in data {
		for (m, &x) in mean.iter_mut().zip(point.iter()) {
			*m += x;
		}
	}
	for m in &mut mean {
		*m /= n;
	}

	let mut variance = vec![0.0; dim];
	for point in data {
		for ((v, &x), &m) in variance.iter_mut().zip(point.iter()).zip(mean.iter()) {
			let d = x - m;
			*v += d * d;
		}
	}
	for v in &mut variance {
		*v = (*v / n).max(VARIANCE_FLOOR);
	}
	variance
}

fn dist_sq(a: &[f64], b: &[f64]) -> f64 {
	a.iter()
		.zip(b.iter())
		.map(|(x, y)| {
			let d = x - y;
			d * d
		})
		.sum()
}

fn log_gaussian_diag(point: &[f64], mean: &[f64], variance: &[f64]) -> f64 {
	let mut acc = 0.0;
	for ((&x, &m), &v) in point.iter().zip(mean.iter()).zip(variance.iter()) {
		let d = x - m;
		acc += LN_2PI + v.ln() + d * d / v;
	}
	-0.5 * acc
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

	fn two_blobs() -> Vec<Embedding> {
		let mut points = Vec::new();
		for i in 0..10 {
			let offset = (i as f32) * 0.1;
			points.push(Embedding::raw(vec![offset, 0.0, 0.0]));
			points.push(Embedding::raw(vec![50.0 + offset, 0.0, 0.0]));
		}
		points
	}

	#[test]
	fn test_rejects_population_smaller_than_components() {
		let points = vec![Embedding::raw(vec![0.0, 1.0]); 3];
		let result = GaussianMixture::new(5, 0).fit(&points);
		assert!(result.is_err());
	}

	#[test]
	fn test_rejects_mismatched_dimensions() {
		let points = vec![
			Embedding::raw(vec![0.0, 1.0]),
			Embedding::raw(vec![0.0, 1.0, 2.0]),
		];
		let result = GaussianMixture::new(2, 0).fit(&points);
		assert!(result.is_err());
	}

	#[test]
	fn test_responsibilities_are_distributions() {
		let fit = GaussianMixture::new(2, 0).fit(&two_blobs()).unwrap();
		for row in &fit.responsibilities {
			let sum: f64 = row.iter().sum();
			assert!((sum - 1.0).abs() < 1e-9, "membership row sums to {}", sum);
		}
		for &label in &fit.labels {
			assert!(label < 2);
		}
	}

	#[test]
	fn test_separates_two_blobs() {
		let points = two_blobs();
		let fit = GaussianMixture::new(2, 0).fit(&points).unwrap();

		// Points of the same blob must share a label, blobs must differ
		let left = fit.labels[0];
		let right = fit.labels[1];
		assert_ne!(left, right);
		for (i, &label) in fit.labels.iter().enumerate() {
			if i % 2 == 0 {
				assert_eq!(label, left);
			} else {
				assert_eq!(label, right);
			}
		}
	}

	#[test]
	fn test_deterministic_for_fixed_seed() {
		let points = two_blobs();
		let a = GaussianMixture::new(2, 7).fit(&points).unwrap();
		let b = GaussianMixture::new(2, 7).fit(&points).unwrap();
		assert_eq!(a.labels, b.labels);
		assert_eq!(a.means, b.means);
		assert_eq!(a.iterations, b.iterations);
	}

	#[test]
	fn test_mean_membership_sums_to_one() {
		let fit = GaussianMixture::new(2, 0).fit(&two_blobs()).unwrap();
		let total: f64 = (0..2).map(|c| fit.mean_membership(c)).sum();
		assert!((total - 1.0).abs() < 1e-9);
	}
}
