//! CLI frontend for the ngscribe script compiler.

mod commands;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use colored::Colorize;

#[derive(Parser)]
#[command(
    name = "ngs",
    about = "ngscribe — compiles level-editor scripts into script.dat and language.dat",
    version,
    propagate_version = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Only report errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Report compile statistics as well
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile the project and write script.dat plus one .dat per language
    Build {
        /// Project directory containing script/script.txt
        #[arg(default_value = ".")]
        dir: PathBuf,

        /// Pin the security-chunk RNG for reproducible output
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Run the full pipeline without writing any file
    Check {
        /// Project directory containing script/script.txt
        #[arg(default_value = ".")]
        dir: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    let opts = commands::Options {
        quiet: cli.quiet,
        verbose: cli.verbose,
    };
    let result = match cli.command {
        Commands::Build { dir, seed } => commands::build::run(&dir, seed, &opts),
        Commands::Check { dir } => commands::check::run(&dir, &opts),
    };
    if let Err(message) = result {
        eprintln!("{} {message}", "error:".red());
        process::exit(1);
    }
}
