//! Subcommand implementations and the shared compile pipeline.

pub mod build;
pub mod check;

use std::path::{Path, PathBuf};

use colored::Colorize;
use rand::rngs::StdRng;
use rand::SeedableRng;

use ngs_core::{Collector, Severity};

/// Global output switches.
pub struct Options {
    pub quiet: bool,
    pub verbose: bool,
}

/// Where the script sources actually live: `<dir>/script/` when present,
/// otherwise the directory itself.
pub fn script_dir(dir: &Path) -> PathBuf {
    let nested = dir.join("script");
    if nested.is_dir() {
        nested
    } else {
        dir.to_path_buf()
    }
}

/// Run parser and compiler; returns the artifacts unless a fatal
/// diagnostic stops the pipeline. Diagnostics are printed either way.
pub fn compile_project(
    dir: &Path,
    seed: Option<u64>,
    opts: &Options,
) -> Result<ngs_dat::Artifacts, String> {
    let sources = script_dir(dir);
    let mut diag = Collector::new();
    let parsed = ngs_dsl::parse_project(&sources, &mut diag);

    let artifacts = if diag.has_fatal() {
        None
    } else {
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        ngs_dat::compile(
            &parsed.model,
            &parsed.languages,
            &parsed.symbols,
            &mut rng,
            &mut diag,
        )
    };

    print_diagnostics(&diag, opts);
    match artifacts {
        Some(artifacts) => {
            if opts.verbose {
                println!("  {}", ngs_dsl::summarize(&parsed.model));
            }
            Ok(artifacts)
        }
        None => Err(format!(
            "compilation failed: {} error(s), {} warning(s)",
            diag.error_count(),
            diag.warning_count()
        )),
    }
}

/// Errors first (red), then warnings (yellow), insertion order within each.
pub fn print_diagnostics(diag: &Collector, opts: &Options) {
    for d in diag.for_display() {
        match d.severity {
            Severity::Error => eprintln!("  {}", d.to_string().red()),
            Severity::Warning if !opts.quiet => eprintln!("  {}", d.to_string().yellow()),
            Severity::Warning => {}
        }
    }
}
