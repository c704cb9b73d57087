use clap::{builder::Styles, Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use crate::config;

fn parse_fraction(s: &str) -> Result<f32, String> {
	let val: f32 = s.parse().map_err(|_| format!("'{}' is not a valid number", s))?;
	if val <= 0.0 || val >= 1.0 {
		Err(format!("fraction must be strictly between 0.0 and 1.0, got {}", val))
	} else {
		Ok(val)
	}
}

fn parse_bandwidth(s: &str) -> Result<f32, String> {
	let val: f32 = s.parse().map_err(|_| format!("'{}' is not a valid number", s))?;
	if val <= 0.0 {
		Err(format!("bandwidth must be positive, got {}", val))
	} else {
		Ok(val)
	}
}

fn styles() -> Styles {
	Styles::styled()
		.header(anstyle::Style::new().bold().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Blue))))
		.usage(anstyle::Style::new().bold().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Blue))))
		.literal(anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Blue))))
		.placeholder(anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Yellow))))
		.valid(anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Blue))))
		.invalid(anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Red))))
}

#[derive(Parser, Debug)]
#[command(
	name = "relict",
	author,
	version,
	about = "Rare-embedding detection and attention-weighted fusion",
	styles = styles(),
	disable_help_subcommand = true,
	after_help = format!(
		"{title}
  {relict} {detect}  {detect_args}   {detect_desc}
  {relict} {detect}  {detect_exp_args}   {detect_exp_desc}
  {relict} {fuse}    {fuse_args}   {fuse_desc}
  {relict} {inspect} {inspect_args}            {inspect_desc}
  {relict} {help}    {help_args}                     {help_desc}",
		title = "Examples:".bright_blue().bold(),
		relict = "relict".bright_blue(),
		detect = "detect".yellow(),
		detect_args = "-i pop.json -k 5",
		detect_desc = "Flag rare embeddings".dimmed(),
		detect_exp_args = "-i pop.json -e -",
		detect_exp_desc = "Report as JSON on stdout".dimmed(),
		fuse = "fuse".yellow(),
		fuse_args = "-i pop.json -t 0 -p se.json",
		fuse_desc = "Fuse row 0 with its peers".dimmed(),
		inspect = "inspect".yellow(),
		inspect_args = "-i pop.msgpack",
		inspect_desc = "Summarize a population".dimmed(),
		help = "help".yellow(),
		help_args = "detect",
		help_desc = "Show help for detect".dimmed(),
	),
)]
pub struct Cli {
	/// Enable verbose debug output
	#[arg(short = 'v', long = "verbose", global = true)]
	pub verbose: bool,

	#[command(subcommand)]
	pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
	/// Detect rare embeddings in a population
	Detect {
		/// Population file (.json or .msgpack)
		#[arg(short = 'i', long = "input")]
		input: PathBuf,

		/// Number of mixture components
		#[arg(short = 'k', long = "components", default_value_t = config::DEFAULT_COMPONENTS)]
		components: usize,

		/// Population-mean membership below which a component is low density
		#[arg(long = "cluster-cutoff", default_value_t = config::DEFAULT_CLUSTER_CUTOFF, value_parser = parse_fraction)]
		cluster_cutoff: f32,

		/// Density percentile below which a subset member is rare
		#[arg(long = "density-percentile", default_value_t = config::DEFAULT_DENSITY_PERCENTILE, value_parser = parse_fraction)]
		density_percentile: f32,

		/// Base kernel bandwidth before per-point adaptation
		#[arg(short = 'b', long = "bandwidth", default_value_t = config::DEFAULT_BASE_BANDWIDTH, value_parser = parse_bandwidth)]
		bandwidth: f32,

		/// Mixture initialization seed
		#[arg(short = 's', long = "seed", default_value_t = config::DEFAULT_SEED)]
		seed: u64,

		/// Export the report as JSON ("-" for stdout)
		#[arg(short = 'e', long = "export", value_name = "PATH")]
		export: Option<PathBuf>,
	},

	/// Fuse a target embedding with its peers
	Fuse {
		/// Population file (.json or .msgpack)
		#[arg(short = 'i', long = "input")]
		input: PathBuf,

		/// Row index of the target embedding
		#[arg(short = 't', long = "target", default_value_t = 0)]
		target: usize,

		/// Fusion parameter file (attention + gating weights)
		#[arg(short = 'p', long = "params")]
		params: PathBuf,

		/// Export the fused embedding as JSON ("-" for stdout)
		#[arg(short = 'e', long = "export", value_name = "PATH")]
		export: Option<PathBuf>,
	},

	/// Summarize a population file
	Inspect {
		/// Population file (.json or .msgpack)
		#[arg(short = 'i', long = "input")]
		input: PathBuf,
	},

	/// Show help for a subcommand
	Help {
		/// Subcommand name
		subcommand: Option<String>,
	},
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_fraction_parser_bounds() {
		assert!(parse_fraction("0.05").is_ok());
		assert!(parse_fraction("0.0").is_err());
		assert!(parse_fraction("1.0").is_err());
		assert!(parse_fraction("nope").is_err());
	}

	#[test]
	fn test_bandwidth_parser_rejects_non_positive() {
		assert!(parse_bandwidth("1.5").is_ok());
		assert!(parse_bandwidth("0").is_err());
		assert!(parse_bandwidth("-1").is_err());
	}

	#[test]
	fn test_detect_defaults() {
		let cli = Cli::try_parse_from(["relict", "detect", "-i", "pop.json"]).unwrap();
		match cli.command {
			Command::Detect { components, seed, export, .. } => {
				assert_eq!(components, config::DEFAULT_COMPONENTS);
				assert_eq!(seed, config::DEFAULT_SEED);
				assert!(export.is_none());
			}
			_ => panic!("expected detect"),
		}
	}
}
