//! # Detect Command
//!
//! Flag rare embeddings in a population by mixture membership and
//! adaptive kernel density.

use std::path::Path;
use std::time::Instant;

use anyhow::Result;
use colored::*;

use crate::core::{DetectParams, Fraction};
use crate::processing::detect_rare;
use crate::storage;
use crate::ui;

#[allow(clippy::too_many_arguments)]
pub fn run(
	input: &Path,
	components: usize,
	cluster_cutoff: f32,
	density_percentile: f32,
	bandwidth: f32,
	seed: u64,
	export: Option<&Path>,
) -> Result<()> {
	let start = Instant::now();

	ui::info(&format!("Loading population from {}", ui::path_link(input, 40)));

	let population_file = storage::population::load(input)?;
	let population = population_file.embeddings();

	if population.len() <= components {
		ui::warn(&format!(
			"Not enough embeddings ({}) for {} mixture components. Need at least {}.",
			population.len(),
			components,
			components + 1
		));
		return Ok(());
	}

	ui::success(&format!(
		"Loaded {} embeddings of dimension {}",
		population.len(),
		population_file.dim()
	));

	let params = DetectParams {
		components,
		cluster_cutoff: Fraction::new(cluster_cutoff).map_err(anyhow::Error::msg)?,
		density_percentile: Fraction::new(density_percentile).map_err(anyhow::Error::msg)?,
		base_bandwidth: bandwidth,
		seed,
	};

	ui::debug(&format!(
		"Fitting {} components, cutoff {}, percentile {}, bandwidth {}, seed {}",
		components, cluster_cutoff, density_percentile, bandwidth, seed
	));

	let report = detect_rare(&population, &params)?;

	let duration = start.elapsed();

	// Handle --export flag
	if let Some(export_path) = export {
		let json = serde_json::to_string_pretty(&report)?;
		if export_path.to_str() == Some("-") || export_path.as_os_str().is_empty() {
			println!("{}", json);
		} else {
			std::fs::write(export_path, json)?;
			ui::success(&format!("Exported to {}", export_path.display()));
		}
		return Ok(());
	}

	// Print results
	ui::header("Component membership");
	for (c, membership) in report.component_membership.iter().enumerate() {
		let flagged = report.low_density_components.contains(&c);
		let marker = if flagged { "low".bright_yellow().bold().to_string() } else { String::new() };
		println!(
			"{}. {} {}",
			format!("{:2}", c).bright_blue().bold(),
			format!("{:.4}", membership).bright_white(),
			marker
		);
	}

	ui::header("Rare embeddings");
	if report.rare.is_empty() {
		ui::info("No rare embeddings found");
	} else {
		let densities: Vec<f64> = report.rare.iter().filter_map(|m| m.log_density).collect();
		let min = densities.iter().copied().fold(f64::INFINITY, f64::min);
		let max = densities.iter().copied().fold(f64::NEG_INFINITY, f64::max);

		for (i, member) in report.rare.iter().enumerate() {
			let label = population_file.id(member.index);
			let score = match member.log_density {
				Some(d) => ui::log::color_gradient(d, min, max, true),
				None => "isolated".bright_red().to_string(),
			};
			println!(
				"{}. {} log-density: {}",
				format!("{:2}", i + 1).bright_blue().bold(),
				label.bright_white(),
				score
			);
		}
	}

	println!();
	ui::success(&format!(
		"Found {} rare embeddings in {:.1}s",
		report.rare.len(),
		duration.as_secs_f32()
	));
	ui::debug("Lower log-densities indicate more unusual embeddings");

	Ok(())
}
