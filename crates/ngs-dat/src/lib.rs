//! Binary back end of the ngscribe compiler.
//!
//! Consumes the parsed [`ScriptModel`] and language tables, runs the
//! classic and NG compilers, and assembles the `script.dat` and
//! `language.dat` images. Everything up to the file write is pure byte
//! vectors so each layer stays unit-testable.

pub mod classic;
pub mod container;
pub mod crypt;
pub mod ng;
pub mod trailer;

use std::io;
use std::path::{Path, PathBuf};

use rand::rngs::StdRng;

use ngs_core::diagnostics::Collector;
use ngs_core::language::LanguageTable;
use ngs_core::model::ScriptModel;
use ngs_core::symbols::SymbolTable;

/// Encode text to CP-1252 bytes. Model strings were decoded from CP-1252,
/// so the round trip is byte-exact.
pub fn cp1252_bytes(text: &str) -> Vec<u8> {
    encoding_rs::WINDOWS_1252.encode(text).0.into_owned()
}

/// One compiled language file.
#[derive(Debug, Clone)]
pub struct LanguageArtifact {
    /// Output base name, e.g. `english.dat`.
    pub file_name: String,
    pub body: Vec<u8>,
    /// Present only when the table carries extra-NG strings.
    pub trailer: Option<Vec<u8>>,
}

/// The compiled output images, ready to be written.
#[derive(Debug, Clone)]
pub struct Artifacts {
    pub script_body: Vec<u8>,
    pub script_trailer: Vec<u8>,
    /// Whether the finished `script.dat` gets its header encrypted.
    pub protect_header: bool,
    pub languages: Vec<LanguageArtifact>,
}

impl Artifacts {
    /// The full `script.dat` image as it will land on disk.
    pub fn script_bytes(&self) -> Vec<u8> {
        let mut out = self.script_body.clone();
        out.extend_from_slice(&self.script_trailer);
        if self.protect_header {
            crypt::encrypt_header(&mut out);
        }
        out
    }

    /// Write every artifact into `dir`, returning the written paths.
    /// Each file goes through the body / append-trailer / encrypt phases.
    pub fn write_to(&self, dir: &Path) -> io::Result<Vec<PathBuf>> {
        let mut written = Vec::new();
        let script = dir.join("script.dat");
        container::write_phased(
            &script,
            &self.script_body,
            Some(&self.script_trailer),
            self.protect_header,
        )?;
        written.push(script);
        for lang in &self.languages {
            let path = dir.join(&lang.file_name);
            container::write_phased(&path, &lang.body, lang.trailer.as_deref(), false)?;
            written.push(path);
        }
        Ok(written)
    }
}

/// Run the back end. Returns `None` (emitting nothing) when any stage
/// records a fatal diagnostic; the collector holds the details either way.
pub fn compile(
    model: &ScriptModel,
    languages: &[LanguageTable],
    symbols: &SymbolTable,
    rng: &mut StdRng,
    diag: &mut Collector,
) -> Option<Artifacts> {
    let lang0 = languages.first();

    let mut section_payloads = Vec::with_capacity(model.sections.len());
    for (index, section) in model.sections.iter().enumerate() {
        section_payloads.push(classic::compile_section(section, index, symbols, lang0, diag));
    }

    let mut occurrences = ng::Occurrences::new();
    let options_words = ng::encode_group(&model.ng.options, &mut occurrences, diag);
    let mut level_words = Vec::with_capacity(model.sections.len());
    for section in &model.sections {
        occurrences.reset_level();
        level_words.push((ng::encode_group(&section.ng, &mut occurrences, diag), section.ng.flags));
    }

    if diag.has_fatal() {
        return None;
    }

    let script_body = container::build_script_body(model, &section_payloads, diag);
    let script_trailer = trailer::build_script_trailer(
        model,
        &options_words,
        model.ng.options.flags,
        &level_words,
        rng,
        diag,
    );

    let mut language_artifacts = Vec::with_capacity(languages.len());
    for (table, name) in languages.iter().zip(&model.language_files) {
        let body = container::build_language_body(table, diag);
        let trailer = (!table.extras.is_empty())
            .then(|| trailer::build_language_trailer(&table.extras));
        language_artifacts.push(LanguageArtifact {
            file_name: output_name(name),
            body,
            trailer,
        });
    }

    if diag.has_fatal() {
        return None;
    }
    Some(Artifacts {
        script_body,
        script_trailer,
        protect_header: model.ng.protect_header(),
        languages: language_artifacts,
    })
}

/// Output file name for a declared language file (`english.txt` →
/// `english.dat`).
fn output_name(language_file: &str) -> String {
    let stem = Path::new(language_file)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| language_file.to_string());
    format!("{stem}.dat")
}

#[cfg(test)]
mod tests {
    use super::*;
    use ngs_core::model::{Section, SectionKind, OPT_LOADSAVE};
    use rand::SeedableRng;

    fn title_model() -> (ScriptModel, Vec<LanguageTable>) {
        let mut model = ScriptModel::default();
        model.options_flags = OPT_LOADSAVE;
        model.language_files.push("english.txt".into());
        let mut title = Section::new(SectionKind::Title);
        title.lines.push(ngs_core::model::RawLine {
            command: "LoadCamera=".into(),
            args: vec!["0".into(); 7],
            loc: ngs_core::model::SourceLoc { file: "script.txt".into(), line: 5 },
        });
        model.sections.push(title);
        let table = LanguageTable {
            strings: vec!["INVENTORY".into()],
            offsets: vec![0],
            section_sizes: [10, 0, 0, 0],
            ..LanguageTable::default()
        };
        (model, vec![table])
    }

    #[test]
    fn empty_project_end_to_end() {
        let (model, languages) = title_model();
        let symbols = SymbolTable::new();
        let mut rng = StdRng::seed_from_u64(11);
        let mut diag = Collector::new();
        let artifacts = compile(&model, &languages, &symbols, &mut rng, &mut diag)
            .unwrap_or_else(|| panic!("{:?}", diag.items()));

        let script = artifacts.script_bytes();
        // Body prefix per the format: flags, timeout, security, counts.
        assert_eq!(&script[..10], &[0x02, 0, 0, 0, 0, 0, 0, 0, 0, 0x01]);
        // The single Title payload ends with 0x82 … 0x83 right before the
        // language list.
        let body = &artifacts.script_body;
        let list_len = "ENGLISH.DAT\0".len();
        assert_eq!(body[body.len() - list_len - 1], 0x83);
        // Trailer framing.
        assert_eq!(&artifacts.script_trailer[..2], &[0x4E, 0x47]);
        let n = artifacts.script_trailer.len();
        assert_eq!(&artifacts.script_trailer[n - 8..n - 4], b"NGLE");
        let size =
            u32::from_le_bytes(artifacts.script_trailer[n - 4..].try_into().unwrap());
        assert!(size as usize == n && size > 0);

        assert_eq!(artifacts.languages.len(), 1);
        assert_eq!(artifacts.languages[0].file_name, "english.dat");
        assert!(artifacts.languages[0].trailer.is_none());
    }

    #[test]
    fn identical_seeds_give_identical_bytes() {
        // Two compiles under the same seed must agree byte for byte.
        let (model, languages) = title_model();
        let symbols = SymbolTable::new();
        let mut diag_a = Collector::new();
        let mut diag_b = Collector::new();
        let a = compile(&model, &languages, &symbols, &mut StdRng::seed_from_u64(7), &mut diag_a)
            .unwrap();
        let b = compile(&model, &languages, &symbols, &mut StdRng::seed_from_u64(7), &mut diag_b)
            .unwrap();
        assert_eq!(a.script_bytes(), b.script_bytes());

        let c = compile(&model, &languages, &symbols, &mut StdRng::seed_from_u64(8), &mut diag_b)
            .unwrap();
        assert_ne!(a.script_bytes(), c.script_bytes());
    }

    #[test]
    fn fatal_diagnostics_suppress_artifacts() {
        let (mut model, languages) = title_model();
        // A Level without Name= or LoadCamera= is fatal in the classic pass.
        model.sections.push(Section::new(SectionKind::Level));
        let symbols = SymbolTable::new();
        let mut rng = StdRng::seed_from_u64(1);
        let mut diag = Collector::new();
        assert!(compile(&model, &languages, &symbols, &mut rng, &mut diag).is_none());
        assert!(diag.has_fatal());
    }

    #[test]
    fn extras_bring_a_language_trailer() {
        let (model, mut languages) = title_model();
        languages[0].extras.push((1, "extra".into()));
        let symbols = SymbolTable::new();
        let mut rng = StdRng::seed_from_u64(2);
        let mut diag = Collector::new();
        let artifacts = compile(&model, &languages, &symbols, &mut rng, &mut diag).unwrap();
        let trailer = artifacts.languages[0].trailer.as_ref().unwrap();
        assert_eq!(&trailer[..2], &[0x4E, 0x47]);
    }
}
