//! # Inspect Command
//!
//! Summarize a population file without running any analysis.

use std::path::Path;
use std::time::Instant;

use anyhow::Result;
use colored::*;
use rayon::prelude::*;

use crate::config;
use crate::storage;
use crate::ui;

pub fn run(input: &Path) -> Result<()> {
	let start = Instant::now();

	ui::info(&format!("Loading population from {}", ui::path_link(input, 40)));

	let population_file = storage::population::load(input)?;
	let embeddings = population_file.embeddings();

	ui::header("Population");
	println!("{}  {}", "Rows:".bright_blue().bold(), embeddings.len());
	println!("{}  {}", "Dims:".bright_blue().bold(), population_file.dim());
	println!(
		"{}  {}",
		"Ids: ".bright_blue().bold(),
		if population_file.ids.is_some() { "caller-supplied" } else { "positional" }
	);
	println!(
		"{}  {}",
		"From:".bright_blue().bold(),
		format!("v{} at {}", population_file.version, population_file.created).dimmed()
	);

	let norms: Vec<f32> = embeddings.iter().map(|e| e.norm()).collect();
	let min_norm = norms.iter().copied().fold(f32::INFINITY, f32::min);
	let max_norm = norms.iter().copied().fold(f32::NEG_INFINITY, f32::max);
	let mean_norm = norms.iter().sum::<f32>() / norms.len() as f32;

	ui::header("Norms");
	println!(
		"{}  {:.4}  {}  {:.4}  {}  {:.4}",
		"min".bright_blue().bold(),
		min_norm,
		"mean".bright_blue().bold(),
		mean_norm,
		"max".bright_blue().bold(),
		max_norm
	);

	// Pairwise spread over at most PAIRWISE_SAMPLE_CAP rows
	let sample = embeddings.len().min(config::PAIRWISE_SAMPLE_CAP);
	if sample >= 2 {
		let total: f64 = (0..sample)
			.into_par_iter()
			.map(|i| {
				(i + 1..sample)
					.map(|j| embeddings[i].distance(&embeddings[j]) as f64)
					.sum::<f64>()
			})
			.sum();
		let pairs = (sample * (sample - 1) / 2) as f64;
		ui::header("Spread");
		println!(
			"{}  {:.4} {}",
			"mean pairwise distance".bright_blue().bold(),
			total / pairs,
			format!("(over {} rows)", sample).dimmed()
		);
	}

	println!();
	ui::success(&format!("Inspected in {:.1}s", start.elapsed().as_secs_f32()));

	Ok(())
}
