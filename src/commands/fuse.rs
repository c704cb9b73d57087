//! # Fuse Command
//!
//! Fuse one population row with its peers using trained attention and
//! gating parameters.

use std::path::Path;
use std::time::Instant;

use anyhow::{bail, Result};
use colored::*;
use serde::{Deserialize, Serialize};

use crate::processing::fuse_with_weights;
use crate::storage;
use crate::ui;

#[derive(Debug, Serialize, Deserialize)]
struct FuseExport {
	version: String,
	target: usize,
	peers: usize,
	attention_weights: Vec<f32>,
	fused: Vec<f32>,
}

pub fn run(input: &Path, target: usize, params_path: &Path, export: Option<&Path>) -> Result<()> {
	let start = Instant::now();

	ui::info(&format!("Loading population from {}", ui::path_link(input, 40)));

	let population_file = storage::population::load(input)?;
	let embeddings = population_file.embeddings();

	if target >= embeddings.len() {
		bail!(
			"Target index {} is out of range for a population of {}",
			target,
			embeddings.len()
		);
	}

	ui::success(&format!(
		"Loaded {} embeddings of dimension {}",
		embeddings.len(),
		population_file.dim()
	));

	ui::debug(&format!("Loading fusion parameters from {}", params_path.display()));
	let params = storage::params::load(params_path)?;
	let scorer = params.scorer()?;
	let gate = params.gate_matrix()?;

	let target_embedding = &embeddings[target];
	let peers: Vec<_> = embeddings
		.iter()
		.enumerate()
		.filter(|(i, _)| *i != target)
		.map(|(_, e)| e.clone())
		.collect();

	let (fused, weights) = fuse_with_weights(target_embedding, &peers, &scorer, &gate)?;

	let duration = start.elapsed();

	// Handle --export flag
	if let Some(export_path) = export {
		let export_data = FuseExport {
			version: env!("CARGO_PKG_VERSION").to_string(),
			target,
			peers: peers.len(),
			attention_weights: weights,
			fused: fused.as_slice().to_vec(),
		};

		let json = serde_json::to_string_pretty(&export_data)?;
		if export_path.to_str() == Some("-") || export_path.as_os_str().is_empty() {
			println!("{}", json);
		} else {
			std::fs::write(export_path, json)?;
			ui::success(&format!("Exported to {}", export_path.display()));
		}
		return Ok(());
	}

	// Print results
	ui::header("Attention weights");
	let min = weights.iter().copied().fold(f32::INFINITY, f32::min) as f64;
	let max = weights.iter().copied().fold(f32::NEG_INFINITY, f32::max) as f64;

	for (i, weight) in weights.iter().enumerate() {
		let index = if i == 0 { target } else if i <= target { i - 1 } else { i };
		let label = population_file.id(index);
		let role = if i == 0 { "target".bright_yellow().bold().to_string() } else { String::new() };
		println!(
			"{}. {} {} {}",
			format!("{:2}", i).bright_blue().bold(),
			label.bright_white(),
			ui::log::color_gradient(*weight as f64, min, max, true),
			role
		);
	}

	ui::header("Fused embedding");
	println!(
		"{}  {}  {}  {:.4}",
		"dim".bright_blue().bold(),
		fused.dim(),
		"norm".bright_blue().bold(),
		fused.norm()
	);

	println!();
	ui::success(&format!(
		"Fused {} with {} peers in {:.1}s",
		population_file.id(target),
		peers.len(),
		duration.as_secs_f32()
	));
	ui::debug("Higher attention weights contribute more to the fused output");

	Ok(())
}
