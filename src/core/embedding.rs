//! Embedding vectors and the metrics the analysis pipeline needs

#[derive(Debug, Clone, PartialEq)]
pub struct Embedding(pub Vec<f32>);

impl Embedding {
	/// Create normalized embedding from raw data
	pub fn new(data: Vec<f32>) -> Self {
		Self(normalize(&data))
	}

	/// Create from data that should be taken as-is (deserialization, fusion output)
	pub fn raw(data: Vec<f32>) -> Self {
		Self(data)
	}

	/// Get raw vector
	pub fn as_slice(&self) -> &[f32] {
		&self.0
	}

	/// Number of dimensions
	pub fn dim(&self) -> usize {
		self.0.len()
	}

	/// L2 norm
	pub fn norm(&self) -> f32 {
		self.0.iter().map(|x| x * x).sum::<f32>().sqrt()
	}

	/// Euclidean distance to another embedding
	pub fn distance(&self, other: &Self) -> f32 {
		self.0
			.iter()
			.zip(other.0.iter())
			.map(|(a, b)| {
				let d = a - b;
				d * d
			})
			.sum::<f32>()
			.sqrt()
	}

	/// Dot-product similarity
	pub fn similarity(&self, other: &Self) -> f32 {
		self.0.iter().zip(other.0.iter()).map(|(a, b)| a * b).sum()
	}
}

fn normalize(v: &[f32]) -> Vec<f32> {
	let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
	if norm > 0.0 {
		v.iter().map(|x| x / norm).collect()
	} else {
		v.to_vec()
	}
}
