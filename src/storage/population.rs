//! Population file format and I/O

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::core::Embedding;
use crate::storage::is_msgpack;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// An embedding population on disk: n rows of equal dimension,
/// optionally labeled with caller-supplied ids
#[derive(Debug, Serialize, Deserialize)]
pub struct PopulationFile {
	pub version: String,
	pub created: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub ids: Option<Vec<String>>,
	pub embeddings: Vec<Vec<f32>>,
}

impl PopulationFile {
	pub fn new(embeddings: Vec<Vec<f32>>, ids: Option<Vec<String>>) -> Self {
		Self {
			version: VERSION.to_string(),
			created: chrono::Utc::now().to_rfc3339(),
			ids,
			embeddings,
		}
	}

	/// Rows as embeddings, taken as-is
	pub fn embeddings(&self) -> Vec<Embedding> {
		self.embeddings.iter().cloned().map(Embedding::raw).collect()
	}

	/// Display id for one row (caller-supplied or positional)
	pub fn id(&self, index: usize) -> String {
		self.ids
			.as_ref()
			.and_then(|ids| ids.get(index).cloned())
			.unwrap_or_else(|| format!("#{}", index))
	}

	pub fn len(&self) -> usize {
		self.embeddings.len()
	}

	pub fn is_empty(&self) -> bool {
		self.embeddings.is_empty()
	}

	pub fn dim(&self) -> usize {
		self.embeddings.first().map(|row| row.len()).unwrap_or(0)
	}

	pub fn validate(&self) -> Result<()> {
		if self.embeddings.is_empty() {
			bail!("Population file contains no embeddings");
		}
		let dim = self.dim();
		if dim == 0 {
			bail!("Population rows have zero dimensions");
		}
		if let Some(bad) = self.embeddings.iter().position(|row| row.len() != dim) {
			bail!("Row {} has {} dimensions, expected {}", bad, self.embeddings[bad].len(), dim);
		}
		if let Some(ids) = &self.ids {
			if ids.len() != self.embeddings.len() {
				bail!("{} ids for {} embeddings", ids.len(), self.embeddings.len());
			}
		}
		Ok(())
	}
}

/// Load a population file, JSON or MessagePack by extension
pub fn load(path: &Path) -> Result<PopulationFile> {
	let bytes = fs::read(path)
		.with_context(|| format!("Failed to read population file {}", path.display()))?;

	let population: PopulationFile = if is_msgpack(path) {
		rmp_serde::from_slice(&bytes).context("Failed to deserialize population")?
	} else {
		serde_json::from_slice(&bytes).context("Failed to deserialize population")?
	};

	population.validate()?;
	Ok(population)
}

/// Save a population file, JSON or MessagePack by extension
pub fn save(population: &PopulationFile, path: &Path) -> Result<()> {
	let bytes = if is_msgpack(path) {
		rmp_serde::to_vec(population).context("Failed to serialize population")?
	} else {
		serde_json::to_vec_pretty(population).context("Failed to serialize population")?
	};
	fs::write(path, bytes)
		.with_context(|| format!("Failed to write population file {}", path.display()))?;
	Ok(())
}
