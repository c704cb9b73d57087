//! Unified logging system

use colored::*;
use std::sync::atomic::{AtomicBool, Ordering};

static VERBOSE: AtomicBool = AtomicBool::new(false);

pub struct Log;

impl Log {
	pub fn set_verbose(enabled: bool) {
		VERBOSE.store(enabled, Ordering::Relaxed);
	}

	pub fn is_verbose() -> bool {
		VERBOSE.load(Ordering::Relaxed)
	}
}

pub fn info(msg: &str) {
	println!("{} {}", "ℹ".bright_blue().bold(), msg.bright_white());
}

pub fn success(msg: &str) {
	println!("{} {}", "✓".bright_green().bold(), msg.bright_white());
}

pub fn warn(msg: &str) {
	println!("{} {}", "⚠".bright_yellow().bold(), msg.bright_white());
}

pub fn error(msg: &str) {
	println!("{} {}", "✗".bright_red().bold(), msg.bright_white());
}

pub fn debug(msg: &str) {
	if Log::is_verbose() {
		println!("{} {}", "⚙".bright_black().bold(), msg.dimmed());
	}
}

pub fn header(text: &str) {
	println!("\n{}", text.bright_blue().bold());
}

/// Clickable file path (OSC 8 terminal hyperlink)
pub fn path_link(path: &std::path::Path, max_len: usize) -> String {
	let absolute = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());

	let uri = if cfg!(windows) {
		let path_str = absolute.to_string_lossy();
		let cleaned = path_str.strip_prefix(r"\\?\").unwrap_or(&path_str);
		format!("file:///{}", cleaned.replace('\\', "/"))
	} else {
		format!("file://{}", absolute.display())
	};

	let filename = path
		.file_name()
		.and_then(|n| n.to_str())
		.unwrap_or("unknown");

	let display_name = if filename.len() > max_len {
		format!(
			"{}...{}",
			&filename[..max_len / 2],
			&filename[filename.len() - (max_len / 2 - 3)..]
		)
	} else {
		filename.to_string()
	};

	format!("\x1b]8;;{}\x1b\\{}\x1b]8;;\x1b\\", uri, display_name)
}

/// Green-to-red colored score within [min, max]
///
/// With `higher_is_better` false, low values render green and high
/// values red; otherwise the ramp is reversed.
pub fn color_gradient(value: f64, min: f64, max: f64, higher_is_better: bool) -> String {
	let range = max - min;
	let mut t = if range.abs() < f64::EPSILON {
		0.5
	} else {
		((value - min) / range).clamp(0.0, 1.0)
	};
	if higher_is_better {
		t = 1.0 - t;
	}

	let text = format!("{:.4}", value);
	if t < 0.33 {
		text.bright_green().to_string()
	} else if t < 0.66 {
		text.bright_yellow().to_string()
	} else {
		text.bright_red().to_string()
	}
}
