//! Rare-embedding detection pipeline

use anyhow::Result;

use crate::core::{DetectParams, DetectionReport, Embedding, RareMember};
use crate::processing::density::log_densities;
use crate::processing::mixture::GaussianMixture;

/// Detect rare members of an embedding population
///
/// Fits a seeded Gaussian mixture, flags components whose population-mean
/// membership falls below the cluster cutoff, then filters the flagged
/// subset by adaptive-bandwidth KDE against the density percentile.
pub fn detect_rare(population: &[Embedding], params: &DetectParams) -> Result<DetectionReport> {
	let mixture = GaussianMixture::new(params.components, params.seed);
	let fit = mixture.fit(population)?;

	let component_membership: Vec<f64> = (0..params.components)
		.map(|c| fit.mean_membership(c))
		.collect();

	let cutoff = params.cluster_cutoff.value() as f64;
	let low_density_components: Vec<usize> = component_membership
		.iter()
		.enumerate()
		.filter(|(_, &membership)| membership < cutoff)
		.map(|(c, _)| c)
		.collect();

	let subset_indices: Vec<usize> = fit
		.labels
		.iter()
		.enumerate()
		.filter(|(_, label)| low_density_components.contains(*label))
		.map(|(i, _)| i)
		.collect();

	let (threshold, rare) = classify_subset(population, &subset_indices, params)?;

	Ok(DetectionReport {
		version: env!("CARGO_PKG_VERSION").to_string(),
		timestamp: chrono::Utc::now().to_rfc3339(),
		params: params.clone(),
		population: population.len(),
		component_membership,
		low_density_components,
		subset_size: subset_indices.len(),
		log_density_threshold: threshold,
		rare,
	})
}

/// KDE-filter the low-density subset; too-small subsets are rare wholesale
fn classify_subset(
	population: &[Embedding],
	subset_indices: &[usize],
	params: &DetectParams,
) -> Result<(Option<f64>, Vec<RareMember>)> {
	if subset_indices.is_empty() {
		return Ok((None, Vec::new()));
	}

	if subset_indices.len() < 2 {
		// Too small for a density estimate
		let rare = subset_indices
			.iter()
			.map(|&index| RareMember { index, log_density: None })
			.collect();
		return Ok((None, rare));
	}

	let subset: Vec<Embedding> = subset_indices
		.iter()
		.map(|&i| population[i].clone())
		.collect();

	let densities = log_densities(&subset, params.base_bandwidth)?;
	let threshold = percentile(&densities, params.density_percentile.value() as f64);

	let rare: Vec<RareMember> = subset_indices
		.iter()
		.zip(densities.iter())
		.filter(|(_, &density)| density < threshold)
		.map(|(&index, &density)| RareMember {
			index,
			log_density: Some(density),
		})
		.collect();

	Ok((Some(threshold), rare))
}

/// Linear-interpolation percentile of an unsorted sample, fraction in (0, 1)
fn percentile(values: &[f64], fraction: f64) -> f64 {
	let mut sorted = values.to_vec();
	sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

	let rank = fraction * (sorted.len() - 1) as f64;
	let lower = rank.floor() as usize;
	let upper = rank.ceil() as usize;
	if lower == upper {
		return sorted[lower];
	}
	let weight = rank - lower as f64;
	sorted[lower] * (1.0 - weight) + sorted[upper] * weight
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::core::Fraction;

	fn params(components: usize) -> DetectParams {
		DetectParams {
			components,
			cluster_cutoff: Fraction::new(0.05).unwrap(),
			density_percentile: Fraction::new(0.05).unwrap(),
			base_bandwidth: 1.0,
			seed: 0,
		}
	}

	/// Five tight 20-point clusters along one axis plus one separated outlier
	fn clustered_population_with_outlier() -> Vec<Embedding> {
		let mut points = Vec::new();
		for cluster in 0..5 {
			let center = 100.0 * cluster as f32;
			for i in 0..20 {
				let mut v = vec![center; 8];
				// Small deterministic jitter so no two points coincide
				v[i % 8] += 0.01 * (i + 1) as f32;
				v[(i + 3) % 8] -= 0.02 * (i + 1) as f32;
				points.push(Embedding::raw(v));
			}
		}
		points.push(Embedding::raw(vec![1200.0; 8]));
		points
	}

	#[test]
	fn test_detects_separated_outlier() {
		let population = clustered_population_with_outlier();
		let report = detect_rare(&population, &params(5)).unwrap();

		assert!(
			report.rare.iter().any(|m| m.index == 100),
			"outlier not in rare set: {:?}",
			report.rare
		);
	}

	#[test]
	fn test_rare_set_is_subset_of_population() {
		let population = clustered_population_with_outlier();
		let report = detect_rare(&population, &params(5)).unwrap();

		for member in report.rare_embeddings(&population) {
			assert!(population.iter().any(|e| e == &member));
		}
	}

	#[test]
	fn test_deterministic_for_fixed_seed() {
		let population = clustered_population_with_outlier();
		let a = detect_rare(&population, &params(5)).unwrap();
		let b = detect_rare(&population, &params(5)).unwrap();

		assert_eq!(a.low_density_components, b.low_density_components);
		assert_eq!(a.subset_size, b.subset_size);
		assert_eq!(
			a.rare.iter().map(|m| m.index).collect::<Vec<_>>(),
			b.rare.iter().map(|m| m.index).collect::<Vec<_>>()
		);
	}

	#[test]
	fn test_population_smaller_than_components_is_an_error() {
		let population: Vec<Embedding> = (0..3)
			.map(|i| Embedding::raw(vec![i as f32, 0.0]))
			.collect();
		assert!(detect_rare(&population, &params(5)).is_err());
	}

	#[test]
	fn test_uniform_population_yields_no_rare_members() {
		// One dense blob: every component keeps healthy membership
		let population: Vec<Embedding> = (0..40)
			.map(|i| Embedding::raw(vec![(i as f32) * 0.1, (i % 7) as f32 * 0.1]))
			.collect();
		let report = detect_rare(&population, &params(2)).unwrap();
		assert!(report.low_density_components.is_empty());
		assert!(report.rare.is_empty());
	}

	#[test]
	fn test_percentile_interpolates() {
		let values = vec![4.0, 1.0, 3.0, 2.0];
		assert!((percentile(&values, 0.5) - 2.5).abs() < 1e-12);
		let single = vec![2.0];
		assert!((percentile(&single, 0.05) - 2.0).abs() < 1e-12);
	}
}
