use std::path::Path;

use super::Options;

pub fn run(dir: &Path, seed: Option<u64>, opts: &Options) -> Result<(), String> {
    let artifacts = super::compile_project(dir, seed, opts)?;

    // Outputs land next to the sources and are copied up to the project
    // directory, which is where the engine looks for them.
    let sources = super::script_dir(dir);
    let mut written = artifacts
        .write_to(&sources)
        .map_err(|e| format!("cannot write outputs: {e}"))?;
    if sources.as_path() != dir {
        written.extend(
            artifacts
                .write_to(dir)
                .map_err(|e| format!("cannot write outputs: {e}"))?,
        );
    }

    if !opts.quiet {
        println!(
            "  Compiled script.dat and {} language file(s).",
            artifacts.languages.len()
        );
        if opts.verbose {
            for path in &written {
                println!("    {}", path.display());
            }
        }
    }
    Ok(())
}
