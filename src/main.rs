//! Relict - rare-embedding detection and attention-weighted fusion
//!
//! A command-line tool for analyzing numeric embedding populations:
//! mixture-based rarity detection and gated attention fusion.

use anyhow::Result;
use clap::{CommandFactory, Parser};
use colored::Colorize;

use relict::cli::{Cli, Command};
use relict::commands;
use relict::ui;

fn main() -> Result<()> {
	let cli = Cli::parse();

	ui::Log::set_verbose(cli.verbose);

	match cli.command {
		Command::Detect {
			input,
			components,
			cluster_cutoff,
			density_percentile,
			bandwidth,
			seed,
			export,
		} => {
			print_header();
			commands::detect::run(
				&input,
				components,
				cluster_cutoff,
				density_percentile,
				bandwidth,
				seed,
				export.as_deref(),
			)
		}
		Command::Fuse { input, target, params, export } => {
			print_header();
			commands::fuse::run(&input, target, &params, export.as_deref())
		}
		Command::Inspect { input } => {
			print_header();
			commands::inspect::run(&input)
		}
		Command::Help { subcommand } => {
			let mut cmd = Cli::command();
			if let Some(sub) = subcommand {
				if let Some(sub_cmd) = cmd.find_subcommand_mut(&sub) {
					sub_cmd.print_help()?;
				} else {
					eprintln!("Unknown subcommand: {}", sub);
					cmd.print_help()?;
				}
			} else {
				cmd.print_help()?;
			}
			Ok(())
		}
	}
}

fn print_header() {
	println!();
	println!(
		"{}",
		format!("─── Relict v{} ───", env!("CARGO_PKG_VERSION"))
			.bright_blue()
			.bold()
	);
}
