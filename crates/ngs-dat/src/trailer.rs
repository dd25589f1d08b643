//! NG trailer assembly.
//!
//! The trailer is a word stream framed by the "NG" marker and the "NGLE"
//! end record: options chunk, security chunk, one chunk per level, one
//! chunk per import file, two zero words, then the end record with the
//! total trailer byte count.

use byteorder::{LittleEndian, WriteBytesExt};
use rand::rngs::StdRng;

use ngs_core::diagnostics::{Collector, DiagnosticKind};
use ngs_core::model::{ImportEntry, ScriptModel};
use ngs_core::schema::{FLAGS_LEVEL_TAG, FLAGS_OPTION_TAG};

use crate::cp1252_bytes;
use crate::crypt;

/// 16-bit "NG" marker that opens the trailer.
pub const NG_MARKER: u16 = 0x474E;
/// 32-bit "NGLE" signature of the end record.
pub const NGLE_SIGNATURE: u32 = 0x454C_474E;

/// Chunk tags.
pub const CHUNK_OPTIONS: u16 = 0x800B;
pub const CHUNK_LEVEL: u16 = 0x800C;
pub const CHUNK_SECURITY: u16 = 0x8016;
pub const CHUNK_IMPORT: u16 = 0x801F;
/// Extra-string chunk of a language trailer.
pub const CHUNK_EXTRA_STRINGS: u16 = 0x800A;

/// Hard cap on a single level chunk payload.
pub const MAX_LEVEL_WORDS: usize = 0x7FFF;

/// Words in the padded import filename field (80 bytes).
const IMPORT_NAME_WORDS: usize = 40;

/// Append one chunk with the single-word count, or the DWORD escape when
/// the total would not fit in 15 bits. The count covers the count word(s)
/// themselves, the tag word and the payload.
pub fn push_chunk(out: &mut Vec<u16>, tag: u16, payload: &[u16]) {
    let total = payload.len() + 2;
    if total <= 0x7FFF {
        out.push(total as u16);
    } else {
        push_chunk_dword(out, tag, payload);
        return;
    }
    out.push(tag);
    out.extend_from_slice(payload);
}

/// Append one chunk with the forced two-word length escape.
pub fn push_chunk_dword(out: &mut Vec<u16>, tag: u16, payload: &[u16]) {
    let total = (payload.len() + 3) as u32;
    out.push(0x8000 | (total >> 16) as u16);
    out.push((total & 0xFFFF) as u16);
    out.push(tag);
    out.extend_from_slice(payload);
}

/// Close a word stream into trailer bytes: marker, words, two zero words,
/// end record with the byte count from the marker to the end of the file.
pub fn frame(words: &[u16]) -> Vec<u8> {
    let mut out = Vec::with_capacity(words.len() * 2 + 14);
    out.write_u16::<LittleEndian>(NG_MARKER).expect("vec write");
    for w in words {
        out.write_u16::<LittleEndian>(*w).expect("vec write");
    }
    out.write_u16::<LittleEndian>(0).expect("vec write");
    out.write_u16::<LittleEndian>(0).expect("vec write");
    let total = out.len() as u32 + 8;
    out.write_u32::<LittleEndian>(NGLE_SIGNATURE).expect("vec write");
    out.write_u32::<LittleEndian>(total).expect("vec write");
    out
}

/// Build the whole `script.dat` trailer. `options_words` and each entry of
/// `level_words` are the already-encoded command streams (no flags record
/// yet); the flags records and terminators are appended here.
pub fn build_script_trailer(
    model: &ScriptModel,
    options_words: &[u16],
    options_flags: u16,
    level_words: &[(Vec<u16>, u16)],
    rng: &mut StdRng,
    diag: &mut Collector,
) -> Vec<u8> {
    let mut words = Vec::new();

    let mut options_payload = options_words.to_vec();
    options_payload.push((u16::from(FLAGS_OPTION_TAG) << 8) | 1);
    options_payload.push(options_flags);
    options_payload.push(0);
    push_chunk(&mut words, CHUNK_OPTIONS, &options_payload);

    let security = crypt::security_data(
        rng,
        model.level_count() as u8,
        (model.options_flags & 0xFF) as u8,
        (model.ng.settings & 0xFF) as u8,
    );
    let security_words: Vec<u16> = security
        .chunks(2)
        .map(|pair| u16::from(pair[0]) | (u16::from(pair[1]) << 8))
        .collect();
    push_chunk(&mut words, CHUNK_SECURITY, &security_words);

    for (commands, flags) in level_words {
        let mut payload = commands.clone();
        payload.push((u16::from(FLAGS_LEVEL_TAG) << 8) | 1);
        payload.push(*flags);
        payload.push(0);
        if payload.len() > MAX_LEVEL_WORDS {
            diag.error(
                DiagnosticKind::Range,
                "script.txt",
                0,
                format!(
                    "level chunk of {} words exceeds {MAX_LEVEL_WORDS}",
                    payload.len()
                ),
            );
            continue;
        }
        push_chunk(&mut words, CHUNK_LEVEL, &payload);
    }

    for import in &model.ng.imports {
        push_chunk_dword(&mut words, CHUNK_IMPORT, &import_payload(import, diag));
    }

    frame(&words)
}

/// Fixed-layout import prelude followed by the raw file words.
fn import_payload(import: &ImportEntry, diag: &mut Collector) -> Vec<u16> {
    let mut payload = vec![import.id, import.mode, import.file_type, import.number];

    let mut name_bytes = cp1252_bytes(&import.name);
    if name_bytes.len() > IMPORT_NAME_WORDS * 2 {
        diag.error(
            DiagnosticKind::Range,
            &import.name,
            0,
            "import file name longer than 80 bytes",
        );
        name_bytes.truncate(IMPORT_NAME_WORDS * 2);
    }
    name_bytes.resize(IMPORT_NAME_WORDS * 2, 0);
    for pair in name_bytes.chunks(2) {
        payload.push(u16::from(pair[0]) | (u16::from(pair[1]) << 8));
    }

    let size = import.bytes.len() as u32;
    payload.push((size & 0xFFFF) as u16);
    payload.push((size >> 16) as u16);

    let mut data = import.bytes.clone();
    if data.len() % 2 != 0 {
        data.push(0);
    }
    for pair in data.chunks(2) {
        payload.push(u16::from(pair[0]) | (u16::from(pair[1]) << 8));
    }
    payload
}

/// Build the extra-string trailer of a `language.dat`: one chunk holding
/// the extras count, then per extra the declared index, the packed word
/// count and the masked text.
pub fn build_language_trailer(extras: &[(u16, String)]) -> Vec<u8> {
    let mut payload = vec![extras.len() as u16];
    for (index, text) in extras {
        let mut bytes = cp1252_bytes(text);
        bytes.push(0);
        if bytes.len() % 2 != 0 {
            bytes.push(0);
        }
        // NUL bytes stay in the clear; everything else is masked.
        for b in bytes.iter_mut() {
            if *b != 0 {
                *b ^= crypt::STRING_MASK;
            }
        }
        payload.push(*index);
        payload.push((bytes.len() / 2) as u16);
        for pair in bytes.chunks(2) {
            payload.push(u16::from(pair[0]) | (u16::from(pair[1]) << 8));
        }
    }
    let mut words = Vec::new();
    push_chunk(&mut words, CHUNK_EXTRA_STRINGS, &payload);
    frame(&words)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn small_chunk_uses_a_single_count_word() {
        let mut out = Vec::new();
        push_chunk(&mut out, CHUNK_OPTIONS, &[1, 2, 3]);
        assert_eq!(out, vec![5, CHUNK_OPTIONS, 1, 2, 3]);
    }

    #[test]
    fn dword_escape_carries_a_32_bit_count() {
        let payload = vec![0u16; 0x8000];
        let mut out = Vec::new();
        push_chunk(&mut out, CHUNK_IMPORT, &payload);
        let total = 0x8000u32 + 3;
        assert_eq!(out[0], 0x8000 | (total >> 16) as u16);
        assert_eq!(out[1], (total & 0xFFFF) as u16);
        assert_eq!(out[2], CHUNK_IMPORT);
        assert_eq!(out.len(), payload.len() + 3);
    }

    #[test]
    fn frame_opens_with_ng_and_closes_with_ngle() {
        let bytes = frame(&[0x1234]);
        assert_eq!(&bytes[..2], &[0x4E, 0x47]);
        let n = bytes.len();
        assert_eq!(&bytes[n - 8..n - 4], b"NGLE");
        let size = u32::from_le_bytes(bytes[n - 4..].try_into().unwrap());
        assert_eq!(size as usize, n);
    }

    #[test]
    fn chunk_counts_are_self_describing() {
        // Walk the chunks of a built trailer and land exactly on the
        // two terminating zero words.
        let model = ScriptModel::default();
        let mut rng = StdRng::seed_from_u64(9);
        let mut diag = Collector::new();
        let bytes =
            build_script_trailer(&model, &[0x2901, 30], 0x0001, &[(vec![], 0)], &mut rng, &mut diag);
        assert!(!diag.has_fatal());

        let words: Vec<u16> = bytes[2..bytes.len() - 8]
            .chunks(2)
            .map(|p| u16::from_le_bytes(p.try_into().unwrap()))
            .collect();
        let mut i = 0usize;
        let mut chunks = 0;
        while words[i] != 0 {
            let count = words[i] as usize;
            assert!(count >= 2, "undersized chunk at word {i}");
            i += count;
            chunks += 1;
        }
        // Options, security and one level chunk.
        assert_eq!(chunks, 3);
        assert_eq!(&words[i..], &[0, 0]);
    }

    #[test]
    fn trailer_size_matches_reality() {
        // The NGLE size field equals the byte count from the marker on.
        let model = ScriptModel::default();
        let mut rng = StdRng::seed_from_u64(3);
        let mut diag = Collector::new();
        let bytes = build_script_trailer(&model, &[], 0, &[], &mut rng, &mut diag);
        let size = u32::from_le_bytes(bytes[bytes.len() - 4..].try_into().unwrap());
        assert_eq!(size as usize, bytes.len());
    }

    #[test]
    fn oversized_level_chunk_is_fatal() {
        let model = ScriptModel::default();
        let mut rng = StdRng::seed_from_u64(3);
        let mut diag = Collector::new();
        build_script_trailer(
            &model,
            &[],
            0,
            &[(vec![0u16; 0x7FFD], 0)],
            &mut rng,
            &mut diag,
        );
        assert!(diag.has_fatal());
    }

    #[test]
    fn import_chunks_always_use_the_escape() {
        let mut model = ScriptModel::default();
        model.ng.imports.push(ImportEntry {
            id: 1,
            mode: 0,
            file_type: 2,
            number: 42,
            name: "audio42.bin".into(),
            bytes: vec![0xAA, 0xBB, 0xCC],
        });
        let mut rng = StdRng::seed_from_u64(3);
        let mut diag = Collector::new();
        let bytes = build_script_trailer(&model, &[], 0, &[], &mut rng, &mut diag);
        let words: Vec<u16> = bytes[2..bytes.len() - 8]
            .chunks(2)
            .map(|p| u16::from_le_bytes(p.try_into().unwrap()))
            .collect();
        // Skip options and security chunks.
        let mut i = words[0] as usize;
        i += words[i] as usize;
        assert_eq!(words[i] & 0x8000, 0x8000);
        let total = (u32::from(words[i] & 0x7FFF) << 16) | u32::from(words[i + 1]);
        // Prelude (4) + name (40) + size (2) + data (2) + framing (3).
        assert_eq!(total, 4 + 40 + 2 + 2 + 3);
        assert_eq!(words[i + 2], CHUNK_IMPORT);
        assert_eq!(words[i + 3], 1);
        assert_eq!(words[i + 6], 42);
        // File size and first data word.
        assert_eq!(words[i + 7 + 40], 3);
        assert_eq!(words[i + 8 + 40], 0);
        assert_eq!(words[i + 9 + 40], 0xBBAA);
    }

    #[test]
    fn language_trailer_masks_text_but_not_nuls() {
        let bytes = build_language_trailer(&[(2, "hi".into())]);
        let words: Vec<u16> = bytes[2..bytes.len() - 8]
            .chunks(2)
            .map(|p| u16::from_le_bytes(p.try_into().unwrap()))
            .collect();
        // count word, tag, extras count, index, word count, data words, 0, 0.
        assert_eq!(words[1], CHUNK_EXTRA_STRINGS);
        assert_eq!(words[2], 1);
        assert_eq!(words[3], 2);
        assert_eq!(words[4], 2);
        let lo = (words[5] & 0xFF) as u8;
        let hi = (words[5] >> 8) as u8;
        assert_eq!(lo ^ crypt::STRING_MASK, b'h');
        assert_eq!(hi ^ crypt::STRING_MASK, b'i');
        // "hi\0" padded to 4 bytes; both trailing bytes stay NUL.
        assert_eq!(words[6], 0);
    }
}
