use std::path::Path;

use super::Options;

pub fn run(dir: &Path, opts: &Options) -> Result<(), String> {
    // A pinned seed keeps check output deterministic; nothing is written.
    let artifacts = super::compile_project(dir, Some(0), opts)?;

    if !opts.quiet {
        println!(
            "  All checks passed: script.dat ({} bytes) and {} language file(s).",
            artifacts.script_body.len() + artifacts.script_trailer.len(),
            artifacts.languages.len()
        );
    }
    Ok(())
}
