//! Container layout of the two output files.
//!
//! Builds the classic `script.dat` body (header fields, extension blocks,
//! offset tables, section payloads, language list) and the `language.dat`
//! body (totals, section sizes, offsets, masked strings). File writing is
//! deliberately three-phased: body, appended trailer, then the optional
//! in-place header encryption.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use byteorder::{LittleEndian, WriteBytesExt};

use ngs_core::diagnostics::{Collector, DiagnosticKind};
use ngs_core::language::LanguageTable;
use ngs_core::model::{ScriptModel, SectionKind};

use crate::cp1252_bytes;
use crate::crypt;

/// Byte width of each platform extension block.
const EXTENSION_BLOCK: usize = 20;

/// Assemble the `script.dat` body from the model and the per-section
/// classic payloads.
pub fn build_script_body(
    model: &ScriptModel,
    section_payloads: &[Vec<u8>],
    diag: &mut Collector,
) -> Vec<u8> {
    let mut out = Vec::new();

    let level_paths: Vec<Vec<u8>> = model
        .sections
        .iter()
        .filter(|s| s.kind == SectionKind::Level)
        .map(|s| {
            let mut bytes = cp1252_bytes(s.path.as_deref().unwrap_or_default());
            bytes.push(0);
            bytes
        })
        .collect();
    let path_total: usize = level_paths.iter().map(Vec::len).sum();
    let payload_total: usize = section_payloads.iter().map(Vec::len).sum();

    if model.sections.len() > 255 {
        diag.error(
            DiagnosticKind::Range,
            "script.txt",
            0,
            format!("{} sections exceed the format limit of 255", model.sections.len()),
        );
    }
    for (what, total) in [("level paths", path_total), ("section payloads", payload_total)] {
        if total > usize::from(u16::MAX) {
            diag.error(
                DiagnosticKind::Range,
                "script.txt",
                0,
                format!("{what} of {total} bytes exceed the 16-bit size field"),
            );
        }
    }

    out.write_u32::<LittleEndian>(model.options_flags).expect("vec write");
    out.write_u32::<LittleEndian>(model.input_timeout).expect("vec write");
    out.push(model.security);
    out.push(model.sections.len() as u8);
    out.write_u16::<LittleEndian>(model.level_count() as u16).expect("vec write");
    out.write_u16::<LittleEndian>(path_total as u16).expect("vec write");
    out.write_u16::<LittleEndian>(payload_total as u16).expect("vec write");

    out.extend(extension_block(&model.psx_extensions, diag));
    out.extend(extension_block(&model.pc_extensions, diag));

    let mut offset = 0u16;
    for path in &level_paths {
        out.write_u16::<LittleEndian>(offset).expect("vec write");
        offset = offset.wrapping_add(path.len() as u16);
    }
    for path in &level_paths {
        out.extend(path);
    }

    let mut offset = 0u16;
    for payload in section_payloads {
        out.write_u16::<LittleEndian>(offset).expect("vec write");
        offset = offset.wrapping_add(payload.len() as u16);
    }
    for payload in section_payloads {
        out.extend(payload);
    }

    for name in &model.language_files {
        out.extend(cp1252_bytes(&dat_name(name)));
        out.push(0);
    }
    out
}

/// Up to four NUL-separated extensions padded to exactly 20 bytes.
///
/// Slot position is what tells the runtime which extension is which
/// (Level, Cut, FMV, Demo), so an unset slot still contributes its own
/// terminator instead of letting later slots slide forward.
fn extension_block(extensions: &[String], diag: &mut Collector) -> Vec<u8> {
    let mut block = Vec::with_capacity(EXTENSION_BLOCK);
    for ext in extensions.iter().take(4) {
        block.extend(cp1252_bytes(ext));
        block.push(0);
    }
    if block.len() > EXTENSION_BLOCK {
        diag.error(
            DiagnosticKind::Range,
            "script.txt",
            0,
            "platform extensions exceed their 20-byte block",
        );
        block.truncate(EXTENSION_BLOCK);
    }
    block.resize(EXTENSION_BLOCK, 0);
    block
}

/// The uppercased basename with the extension forced to `.DAT`, as listed
/// in the script body and used for the output file itself.
pub fn dat_name(language_file: &str) -> String {
    let stem = Path::new(language_file)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| language_file.to_string());
    format!("{}.DAT", stem.to_ascii_uppercase())
}

/// Assemble a `language.dat` body.
pub fn build_language_body(table: &LanguageTable, diag: &mut Collector) -> Vec<u8> {
    let mut out = Vec::new();
    out.write_u16::<LittleEndian>(table.total_strings() as u16).expect("vec write");
    out.write_u16::<LittleEndian>(table.psx_strings.len() as u16).expect("vec write");
    out.write_u16::<LittleEndian>(table.pc_strings.len() as u16).expect("vec write");
    for size in table.section_sizes {
        if size > u32::from(u16::MAX) {
            diag.error(
                DiagnosticKind::Range,
                "language",
                0,
                format!("string section of {size} bytes exceeds the 16-bit size field"),
            );
        }
        out.write_u16::<LittleEndian>(size as u16).expect("vec write");
    }
    for offset in &table.offsets {
        out.write_u16::<LittleEndian>(*offset).expect("vec write");
    }
    let all = table
        .strings
        .iter()
        .chain(table.psx_strings.iter())
        .chain(table.pc_strings.iter());
    for s in all {
        for b in cp1252_bytes(s) {
            out.push(b ^ crypt::STRING_MASK);
        }
        out.push(0);
    }
    out
}

/// Write body then trailer to the same path, then encrypt the header in
/// place when asked. The phases are observable on disk and the trailer's
/// size field depends on the committed body, so the order is fixed.
pub fn write_phased(
    path: &Path,
    body: &[u8],
    trailer: Option<&[u8]>,
    encrypt: bool,
) -> std::io::Result<()> {
    fs::write(path, body)?;
    if let Some(trailer) = trailer {
        let mut file = OpenOptions::new().append(true).open(path)?;
        file.write_all(trailer)?;
    }
    if encrypt {
        let mut contents = fs::read(path)?;
        crypt::encrypt_header(&mut contents);
        fs::write(path, contents)?;
    }
    Ok(())
}
