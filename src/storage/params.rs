//! Fusion parameter file format and I/O

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::processing::{GateMatrix, SqueezeExcitation};
use crate::storage::is_msgpack;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Trained squeeze-and-excitation parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttentionParams {
	pub w_reduce: Vec<f32>,
	pub b_reduce: Vec<f32>,
	pub w_expand: Vec<f32>,
	pub b_expand: f32,
}

/// Fusion parameters on disk: attention weights plus a d x d gating matrix
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusionParamsFile {
	pub version: String,
	pub dim: usize,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub reduction_ratio: Option<usize>,
	pub attention: AttentionParams,
	pub gate: Vec<Vec<f32>>,
}

impl FusionParamsFile {
	pub fn new(dim: usize, attention: AttentionParams, gate: Vec<Vec<f32>>) -> Self {
		Self {
			version: VERSION.to_string(),
			dim,
			reduction_ratio: None,
			attention,
			gate,
		}
	}

	/// Attention scorer built from the stored parameters
	pub fn scorer(&self) -> Result<SqueezeExcitation> {
		SqueezeExcitation::from_parts(
			self.attention.w_reduce.clone(),
			self.attention.b_reduce.clone(),
			self.attention.w_expand.clone(),
			self.attention.b_expand,
		)
	}

	/// Gating matrix built from the stored rows
	pub fn gate_matrix(&self) -> Result<GateMatrix> {
		GateMatrix::from_rows(self.gate.clone())
	}

	pub fn validate(&self) -> Result<()> {
		if self.dim == 0 {
			bail!("Fusion parameters declare zero dimensions");
		}
		if self.gate.len() != self.dim {
			bail!("Gating matrix has {} rows, expected {}", self.gate.len(), self.dim);
		}
		if let Some(bad) = self.gate.iter().position(|row| row.len() != self.dim) {
			bail!("Gating row {} has {} columns, expected {}", bad, self.gate[bad].len(), self.dim);
		}
		let scorer = self.scorer()?;
		if let Some(ratio) = self.reduction_ratio {
			if ratio == 0 {
				bail!("Reduction ratio must be positive");
			}
			let expected = (self.dim / ratio).max(1);
			if scorer.hidden_width() != expected {
				bail!(
					"Attention hidden width {} does not match dim {} / ratio {}",
					scorer.hidden_width(),
					self.dim,
					ratio
				);
			}
		}
		Ok(())
	}
}

/// Load a fusion parameter file, JSON or MessagePack by extension
pub fn load(path: &Path) -> Result<FusionParamsFile> {
	let bytes = fs::read(path)
		.with_context(|| format!("Failed to read parameter file {}", path.display()))?;

	let params: FusionParamsFile = if is_msgpack(path) {
		rmp_serde::from_slice(&bytes).context("Failed to deserialize fusion parameters")?
	} else {
		serde_json::from_slice(&bytes).context("Failed to deserialize fusion parameters")?
	};

	params.validate()?;
	Ok(params)
}

/// Save a fusion parameter file, JSON or MessagePack by extension
pub fn save(params: &FusionParamsFile, path: &Path) -> Result<()> {
	let bytes = if is_msgpack(path) {
		rmp_serde::to_vec(params).context("Failed to serialize fusion parameters")?
	} else {
		serde_json::to_vec_pretty(params).context("Failed to serialize fusion parameters")?
	};
	fs::write(path, bytes)
		.with_context(|| format!("Failed to write parameter file {}", path.display()))?;
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	fn sample(dim: usize, hidden: usize) -> FusionParamsFile {
		FusionParamsFile::new(
			dim,
			AttentionParams {
				w_reduce: vec![0.5; hidden],
				b_reduce: vec![0.0; hidden],
				w_expand: vec![0.5; hidden],
				b_expand: 0.0,
			},
			(0..dim)
				.map(|i| (0..dim).map(|j| if i == j { 1.0 } else { 0.0 }).collect())
				.collect(),
		)
	}

	#[test]
	fn test_valid_params_build_both_halves() {
		let params = sample(4, 2);
		params.validate().unwrap();
		assert_eq!(params.scorer().unwrap().hidden_width(), 2);
		assert_eq!(params.gate_matrix().unwrap().dim(), 4);
	}

	#[test]
	fn test_gate_dim_mismatch_is_rejected() {
		let mut params = sample(4, 2);
		params.gate.pop();
		assert!(params.validate().is_err());
	}

	#[test]
	fn test_reduction_ratio_must_match_hidden_width() {
		let mut params = sample(8, 2);
		params.reduction_ratio = Some(4);
		params.validate().unwrap();

		params.reduction_ratio = Some(2);
		assert!(params.validate().is_err());
	}

	#[test]
	fn test_json_round_trip() {
		let dir = std::env::temp_dir().join("relict-params-test");
		std::fs::create_dir_all(&dir).unwrap();
		let path = dir.join("params.json");

		let params = sample(3, 1);
		save(&params, &path).unwrap();
		let loaded = load(&path).unwrap();
		assert_eq!(loaded.dim, 3);
		assert_eq!(loaded.gate, params.gate);

		std::fs::remove_file(&path).ok();
	}
}
