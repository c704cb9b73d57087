//! Population and parameter file storage

pub mod params;
pub mod population;

pub use params::FusionParamsFile;
pub use population::PopulationFile;

use std::path::Path;

use crate::config;

/// Whether a path selects the MessagePack format by extension
pub fn is_msgpack(path: &Path) -> bool {
	path.extension()
		.and_then(|ext| ext.to_str())
		.map(|ext| ext.eq_ignore_ascii_case(config::MSGPACK_EXT))
		.unwrap_or(false)
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::path::PathBuf;

	#[test]
	fn test_msgpack_by_extension() {
		assert!(is_msgpack(&PathBuf::from("pop.msgpack")));
		assert!(is_msgpack(&PathBuf::from("pop.MSGPACK")));
		assert!(!is_msgpack(&PathBuf::from("pop.json")));
		assert!(!is_msgpack(&PathBuf::from("pop")));
	}
}
