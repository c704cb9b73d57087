//! Attention-weighted, gated fusion of a target embedding with its peers

use anyhow::{bail, Context, Result};
use ndarray::{aview1, Array2};
use serde::{Deserialize, Serialize};

use crate::core::Embedding;

/// Scoring capability injected into the fusion step
///
/// Implementations carry externally trained parameters; fusion itself never
/// trains or mutates them.
pub trait AttentionScorer {
	/// Bounded [0, 1] importance score for one embedding
	fn score(&self, embedding: &Embedding) -> f32;
}

/// Squeeze-and-excitation attention scorer
///
/// Pools the embedding to a scalar, runs it through a reduce/expand pair
/// (ReLU then sigmoid) and returns the bounded scalar score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqueezeExcitation {
	w_reduce: Vec<f32>,
	b_reduce: Vec<f32>,
	w_expand: Vec<f32>,
	b_expand: f32,
}

impl SqueezeExcitation {
	/// Build from trained parameter vectors
	pub fn from_parts(
		w_reduce: Vec<f32>,
		b_reduce: Vec<f32>,
		w_expand: Vec<f32>,
		b_expand: f32,
	) -> Result<Self> {
		if w_reduce.is_empty() {
			bail!("Attention hidden layer is empty");
		}
		if w_reduce.len() != b_reduce.len() || w_reduce.len() != w_expand.len() {
			bail!(
				"Attention parameter widths disagree: reduce {}, bias {}, expand {}",
				w_reduce.len(),
				b_reduce.len(),
				w_expand.len()
			);
		}
		Ok(Self { w_reduce, b_reduce, w_expand, b_expand })
	}

	/// Hidden width of the reduce/expand pair
	pub fn hidden_width(&self) -> usize {
		self.w_reduce.len()
	}
}

impl AttentionScorer for SqueezeExcitation {
	fn score(&self, embedding: &Embedding) -> f32 {
		let pooled: f32 = embedding.as_slice().iter().sum::<f32>() / embedding.dim().max(1) as f32;

		let mut excited = self.b_expand;
		for ((&w_r, &b_r), &w_e) in self
			.w_reduce
			.iter()
			.zip(self.b_reduce.iter())
			.zip(self.w_expand.iter())
		{
			let hidden = (w_r * pooled + b_r).max(0.0);
			excited += w_e * hidden;
		}

		sigmoid(excited)
	}
}

/// Learned d x d gating weights applied as `sigmoid(W . e)`
#[derive(Debug, Clone)]
pub struct GateMatrix(Array2<f32>);

impl GateMatrix {
	pub fn new(weights: Array2<f32>) -> Result<Self> {
		if weights.nrows() != weights.ncols() {
			bail!("Gating matrix must be square, got {}x{}", weights.nrows(), weights.ncols());
		}
		if weights.nrows() == 0 {
			bail!("Gating matrix is empty");
		}
		Ok(Self(weights))
	}

	/// Build from row vectors (file deserialization)
	pub fn from_rows(rows: Vec<Vec<f32>>) -> Result<Self> {
		let d = rows.len();
		if rows.iter().any(|row| row.len() != d) {
			bail!("Gating matrix rows must all have length {}", d);
		}
		let flat: Vec<f32> = rows.into_iter().flatten().collect();
		let weights = Array2::from_shape_vec((d, d), flat).context("Failed to shape gating matrix")?;
		Self::new(weights)
	}

	/// Embedding dimension the gate expects
	pub fn dim(&self) -> usize {
		self.0.nrows()
	}

	/// Element-wise multiplicative mask for one embedding
	pub fn gate(&self, embedding: &Embedding) -> Result<Vec<f32>> {
		if embedding.dim() != self.dim() {
			bail!(
				"Embedding has {} dimensions, gating matrix expects {}",
				embedding.dim(),
				self.dim()
			);
		}
		let product = self.0.dot(&aview1(embedding.as_slice()));
		Ok(product.iter().map(|&v| sigmoid(v)).collect())
	}
}

/// Fuse a target embedding with its peers
///
/// Attention scores (target at index 0) are softmax-normalized into weights;
/// each embedding is gated element-wise before the weighted sum. The output
/// keeps the input dimensionality and is not renormalized.
pub fn fuse(
	target: &Embedding,
	peers: &[Embedding],
	scorer: &dyn AttentionScorer,
	gate: &GateMatrix,
) -> Result<Embedding> {
	Ok(fuse_with_weights(target, peers, scorer, gate)?.0)
}

/// Fusion that also reports the softmax attention weights (target first)
pub fn fuse_with_weights(
	target: &Embedding,
	peers: &[Embedding],
	scorer: &dyn AttentionScorer,
	gate: &GateMatrix,
) -> Result<(Embedding, Vec<f32>)> {
	let dim = gate.dim();
	if target.dim() != dim {
		bail!("Target has {} dimensions, gating matrix expects {}", target.dim(), dim);
	}
	if let Some(bad) = peers.iter().position(|p| p.dim() != dim) {
		bail!("Peer {} has {} dimensions, expected {}", bad, peers[bad].dim(), dim);
	}

	let mut scores = Vec::with_capacity(peers.len() + 1);
	scores.push(scorer.score(target));
	for peer in peers {
		scores.push(scorer.score(peer));
	}

	let weights = softmax(&scores);

	let mut fused = vec![0.0f32; dim];
	for (weight, embedding) in weights.iter().zip(std::iter::once(target).chain(peers.iter())) {
		let mask = gate.gate(embedding)?;
		for ((out, &g), &v) in fused.iter_mut().zip(mask.iter()).zip(embedding.as_slice().iter()) {
			*out += weight * g * v;
		}
	}

	Ok((Embedding::raw(fused), weights))
}

/// Numerically stable softmax
pub fn softmax(scores: &[f32]) -> Vec<f32> {
	let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
	let exps: Vec<f32> = scores.iter().map(|s| (s - max).exp()).collect();
	let sum: f32 = exps.iter().sum();
	exps.into_iter().map(|e| e / sum).collect()
}

fn sigmoid(x: f32) -> f32 {
	1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
	use super::*;

	fn identity_gate(dim: usize) -> GateMatrix {
		let rows: Vec<Vec<f32>> = (0..dim)
			.map(|i| (0..dim).map(|j| if i == j { 1.0 } else { 0.0 }).collect())
			.collect();
		GateMatrix::from_rows(rows).unwrap()
	}

	fn zero_bias_scorer(hidden: usize) -> SqueezeExcitation {
		SqueezeExcitation::from_parts(vec![0.5; hidden], vec![0.0; hidden], vec![0.5; hidden], 0.0)
			.unwrap()
	}

	#[test]
	fn test_weights_sum_to_one() {
		let target = Embedding::raw(vec![1.0, 2.0, 3.0, 4.0]);
		let peers = vec![
			Embedding::raw(vec![4.0, 3.0, 2.0, 1.0]),
			Embedding::raw(vec![0.5, 0.5, 0.5, 0.5]),
		];
		let (fused, weights) =
			fuse_with_weights(&target, &peers, &zero_bias_scorer(2), &identity_gate(4)).unwrap();

		assert_eq!(fused.dim(), 4);
		assert_eq!(weights.len(), 3);
		let sum: f32 = weights.iter().sum();
		assert!((sum - 1.0).abs() < 1e-6);
	}

	#[test]
	fn test_empty_peer_set_degenerates_to_gated_target() {
		let target = Embedding::raw(vec![2.0, -2.0, 4.0]);
		let gate = identity_gate(3);
		let (fused, weights) =
			fuse_with_weights(&target, &[], &zero_bias_scorer(2), &gate).unwrap();

		assert_eq!(weights, vec![1.0]);
		let mask = gate.gate(&target).unwrap();
		for ((&f, &g), &t) in fused.as_slice().iter().zip(mask.iter()).zip(target.as_slice().iter()) {
			assert!((f - g * t).abs() < 1e-6);
		}
	}

	#[test]
	fn test_zero_inputs_fuse_to_zero() {
		let target = Embedding::raw(vec![0.0; 6]);
		let peers = vec![Embedding::raw(vec![0.0; 6]); 3];
		let fused = fuse(&target, &peers, &zero_bias_scorer(4), &identity_gate(6)).unwrap();

		assert!(fused.as_slice().iter().all(|&v| v == 0.0));
	}

	#[test]
	fn test_dimension_mismatch_is_an_error() {
		let target = Embedding::raw(vec![1.0, 2.0]);
		let peers = vec![Embedding::raw(vec![1.0, 2.0, 3.0])];
		let result = fuse(&target, &peers, &zero_bias_scorer(2), &identity_gate(2));
		assert!(result.is_err());
	}

	#[test]
	fn test_scores_are_bounded() {
		let scorer = SqueezeExcitation::from_parts(
			vec![3.0, -2.0, 1.5],
			vec![0.1, 0.2, -0.3],
			vec![2.0, 2.0, 2.0],
			-0.5,
		)
		.unwrap();
		for scale in [-100.0f32, -1.0, 0.0, 1.0, 100.0] {
			let s = scorer.score(&Embedding::raw(vec![scale; 16]));
			assert!((0.0..=1.0).contains(&s), "score {} out of bounds", s);
		}
	}

	#[test]
	fn test_softmax_is_uniform_for_equal_scores() {
		let weights = softmax(&[0.5, 0.5, 0.5, 0.5]);
		for w in weights {
			assert!((w - 0.25).abs() < 1e-6);
		}
	}

	#[test]
	fn test_gate_matrix_rejects_ragged_rows() {
		let rows = vec![vec![1.0, 2.0], vec![3.0]];
		assert!(GateMatrix::from_rows(rows).is_err());
	}
}
