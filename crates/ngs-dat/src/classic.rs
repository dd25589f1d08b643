//! The classic section compiler.
//!
//! Emits the byte-tag dialect for each `[Level]`/`[Title]` section: lines
//! are stably sorted by a fixed tag-order key, encoded individually, then
//! closed with the section tag block and the terminator.

use byteorder::{LittleEndian, WriteBytesExt};

use ngs_core::diagnostics::{Collector, DiagnosticKind};
use ngs_core::language::{resolve_string_ref, LanguageTable};
use ngs_core::literal::parse_int;
use ngs_core::model::{RawLine, Section, SectionKind};
use ngs_core::symbols::SymbolTable;

const TAG_LEVEL: u8 = 0x81;
const TAG_TITLE: u8 = 0x82;
const TAG_END: u8 = 0x83;

/// Fixed emission order; the sort key is 1000 × position here.
const TAG_ORDER: &[&str] = &[
    "FMV",
    "Cut",
    "ResidentCut",
    "Layer1",
    "Layer2",
    "UVRotate",
    "Legend",
    "LensFlare",
    "Mirror",
    "Fog",
    "AnimatingMIP",
    "LoadCamera",
    "ResetHUB",
    "Key",
    "Puzzle",
    "Pickup",
    "Examine",
    "KeyCombo",
    "PuzzleCombo",
    "PickupCombo",
];

/// Key for lines whose command is not in the fixed table.
const KEY_UNKNOWN: u32 = 9999;

/// Compile one section to its byte payload. `index` is the section's
/// position in the model, emitted into the closing block.
pub fn compile_section(
    section: &Section,
    index: usize,
    symbols: &SymbolTable,
    lang: Option<&LanguageTable>,
    diag: &mut Collector,
) -> Vec<u8> {
    let src = section
        .lines
        .first()
        .map(|l| l.loc.file.clone())
        .unwrap_or_else(|| "script.txt".to_string());
    let mut enc = SectionEncoder { symbols, lang, diag, src };

    if !section.lines.iter().any(|l| l.is("LoadCamera")) {
        let src = enc.src.clone();
        enc.diag.error(
            DiagnosticKind::Parse,
            &src,
            0,
            "section without a LoadCamera= directive",
        );
    }

    // Encode in textual order, then stable-sort by key so equal keys keep
    // their declaration order.
    let mut pieces: Vec<(u32, Vec<u8>)> = Vec::with_capacity(section.lines.len());
    for line in &section.lines {
        let bytes = enc.encode_line(line).unwrap_or_default();
        pieces.push((enc.sort_key(line), bytes));
    }
    pieces.sort_by_key(|(key, _)| *key);

    let mut out = Vec::new();
    for (_, bytes) in pieces {
        out.extend(bytes);
    }
    enc.close_section(section, index, &mut out);
    out
}

/// Strip one pair of enclosing double quotes.
fn unquote(arg: &str) -> &str {
    let t = arg.trim();
    if t.len() >= 2 && t.starts_with('"') && t.ends_with('"') {
        &t[1..t.len() - 1]
    } else {
        t
    }
}

struct SectionEncoder<'a> {
    symbols: &'a SymbolTable,
    lang: Option<&'a LanguageTable>,
    diag: &'a mut Collector,
    /// File the section's lines came from, for section-level diagnostics.
    src: String,
}

impl SectionEncoder<'_> {
    fn sort_key(&mut self, line: &RawLine) -> u32 {
        let Some(pos) = TAG_ORDER
            .iter()
            .position(|n| n.eq_ignore_ascii_case(line.name()))
        else {
            return KEY_UNKNOWN;
        };
        let mut key = pos as u32 * 1000;
        match TAG_ORDER[pos] {
            "Key" | "Puzzle" | "Pickup" | "Examine" => {
                key += 10 * self.quiet_num(line, 0).unwrap_or(0).max(0) as u32;
            }
            "KeyCombo" | "PuzzleCombo" | "PickupCombo" => {
                key += 10 * self.quiet_num(line, 0).unwrap_or(0).max(0) as u32;
                key += self.quiet_num(line, 1).unwrap_or(0).clamp(0, 2) as u32;
            }
            _ => {}
        }
        key
    }

    /// Numeric lookup for sort keys; resolution problems stay silent here
    /// because the encoder reports them once.
    fn quiet_num(&self, line: &RawLine, index: usize) -> Option<i64> {
        let t = line.args.get(index)?.trim();
        if t.eq_ignore_ascii_case("IGNORE") {
            return Some(-1);
        }
        parse_int(t).or_else(|| {
            self.symbols
                .resolve(t, &line.loc.file)
                .map(|r| i64::from(r.value))
        })
    }

    fn encode_line(&mut self, line: &RawLine) -> Option<Vec<u8>> {
        match line.name().to_ascii_uppercase().as_str() {
            "FMV" => self.encode_fmv(line),
            "CUT" => {
                let cut = self.num_in(line, 0, 0, 31)?;
                Some(vec![0x84, cut as u8])
            }
            "RESIDENTCUT" => {
                let slot = self.num_in(line, 0, 1, 4)?;
                let cut = self.num_in(line, 1, 0, 255)?;
                Some(vec![0x85 + slot as u8 - 1, cut as u8])
            }
            "LAYER1" => self.encode_layer(line, 0x89),
            "LAYER2" => self.encode_layer(line, 0x8A),
            "UVROTATE" => {
                let speed = self.num_in(line, 0, -128, 255)?;
                Some(vec![0x8B, speed as u8])
            }
            "LEGEND" => {
                let index = self.string_ref(line, 0);
                if index > 0xFF {
                    self.range_error(line, "legend string index", i64::from(index));
                    return None;
                }
                Some(vec![0x8C, index as u8])
            }
            "LENSFLARE" => self.encode_lens_flare(line),
            "MIRROR" => {
                let room = self.num_in(line, 0, 0, 255)?;
                let surface = self.num_in(line, 1, i64::from(i32::MIN), i64::from(u32::MAX))?;
                let mut out = vec![0x8E, room as u8];
                out.write_u32::<LittleEndian>(surface as u32).ok()?;
                Some(out)
            }
            "FOG" => {
                let mut out = vec![0x8F];
                for i in 0..3 {
                    out.push(self.num_in(line, i, 0, 255)? as u8);
                }
                Some(out)
            }
            "ANIMATINGMIP" => {
                let slot = self.num_in(line, 0, 1, 16)?;
                let distance = self.num_in(line, 1, 0, 15)?;
                Some(vec![0x90, (distance * 16 + (slot - 1)) as u8])
            }
            "LOADCAMERA" => self.encode_load_camera(line),
            "RESETHUB" => {
                let level = self.num_in(line, 0, 0, 255)?;
                Some(vec![0x92, level as u8])
            }
            "KEY" => self.encode_inventory(line, 0x93, 12),
            "PUZZLE" => self.encode_inventory(line, 0x9F, 12),
            "PICKUP" => self.encode_inventory(line, 0xAB, 4),
            "EXAMINE" => self.encode_inventory(line, 0xAF, 3),
            "KEYCOMBO" => self.encode_combo(line, 0xB2, 8),
            "PUZZLECOMBO" => self.encode_combo(line, 0xC2, 8),
            "PICKUPCOMBO" => self.encode_combo(line, 0xD2, 4),
            _ => {
                // Unknown flag-style commands pass with a warning.
                self.diag.warning(
                    DiagnosticKind::Parse,
                    &line.loc.file,
                    line.loc.line,
                    format!("unknown level directive: {}", line.command),
                );
                None
            }
        }
    }

    fn encode_fmv(&mut self, line: &RawLine) -> Option<Vec<u8>> {
        let index = self.num_in(line, 0, 0, 0x7F)?;
        let trigger = self.num_in(line, 1, 0, 1)?;
        let mut byte = index as u8;
        if trigger == 1 {
            byte |= 0x80;
        }
        Some(vec![0x80, byte])
    }

    fn encode_layer(&mut self, line: &RawLine, tag: u8) -> Option<Vec<u8>> {
        let mut out = vec![tag];
        for i in 0..3 {
            out.push(self.num_in(line, i, 0, 255)? as u8);
        }
        // Scroll speed is signed.
        out.push(self.num_in(line, 3, -128, 127)? as u8);
        Some(out)
    }

    fn encode_lens_flare(&mut self, line: &RawLine) -> Option<Vec<u8>> {
        let mut out = vec![0x8D];
        for i in 0..3 {
            let coord = self.num(line, i)?;
            out.write_u16::<LittleEndian>(((coord / 256) & 0xFFFF) as u16).ok()?;
        }
        for i in 3..6 {
            out.push(self.num_in(line, i, 0, 255)? as u8);
        }
        Some(out)
    }

    fn encode_load_camera(&mut self, line: &RawLine) -> Option<Vec<u8>> {
        let mut out = vec![0x91];
        for i in 0..6 {
            let v = self.num_in(line, i, i64::from(i32::MIN), i64::from(i32::MAX))?;
            out.write_i32::<LittleEndian>(v as i32).ok()?;
        }
        out.push(self.num_in(line, 6, 0, 255)? as u8);
        Some(out)
    }

    /// `Key= item, name, six words` and friends.
    fn encode_inventory(&mut self, line: &RawLine, base: u8, max_item: i64) -> Option<Vec<u8>> {
        if line.args.len() != 8 {
            self.schema_error(line, "an item number, a name and six values");
            return None;
        }
        let item = self.num_in(line, 0, 1, max_item)?;
        let mut out = vec![base + item as u8 - 1];
        out.write_u16::<LittleEndian>(self.string_ref(line, 1)).ok()?;
        for i in 2..8 {
            out.write_u16::<LittleEndian>(self.word(line, i)?).ok()?;
        }
        Some(out)
    }

    /// `KeyCombo= item, piece, name, six words` and friends.
    fn encode_combo(&mut self, line: &RawLine, base: u8, max_item: i64) -> Option<Vec<u8>> {
        if line.args.len() != 9 {
            self.schema_error(line, "an item number, a piece, a name and six values");
            return None;
        }
        let item = self.num_in(line, 0, 1, max_item)?;
        let piece = self.num_in(line, 1, 1, 2)?;
        let mut out = vec![base + 2 * (item as u8 - 1) + piece as u8 - 1];
        out.write_u16::<LittleEndian>(self.string_ref(line, 2)).ok()?;
        for i in 3..9 {
            out.write_u16::<LittleEndian>(self.word(line, i)?).ok()?;
        }
        Some(out)
    }

    fn close_section(&mut self, section: &Section, index: usize, out: &mut Vec<u8>) {
        match section.kind {
            SectionKind::Level => {
                out.push(TAG_LEVEL);
                out.push(self.name_index(section));
            }
            SectionKind::Title => out.push(TAG_TITLE),
        }
        out.write_u16::<LittleEndian>(section.flags).expect("vec write");
        out.push(index as u8);
        out.push(section.cd);
        out.push(TAG_END);
    }

    /// Display-name string index for the level block; unresolved names are
    /// fatal here, unlike ordinary string references.
    fn name_index(&mut self, section: &Section) -> u8 {
        let src = self.src.clone();
        let Some(name) = section.name.as_deref() else {
            self.diag.error(
                DiagnosticKind::Parse,
                &src,
                0,
                "level section without a Name= directive",
            );
            return 0;
        };
        match resolve_string_ref(name, self.lang) {
            Some(i) if i <= 0xFF => i as u8,
            Some(i) => {
                self.diag.error(
                    DiagnosticKind::Range,
                    &src,
                    0,
                    format!("level name index {i} does not fit in a byte"),
                );
                0
            }
            None => {
                self.diag.error(
                    DiagnosticKind::Reference,
                    &src,
                    0,
                    format!("level name not found in the language table: \"{name}\""),
                );
                0
            }
        }
    }

    // -- argument helpers -------------------------------------------------

    /// Classic numeric argument: literal in any base, `IGNORE`, or a name.
    fn num(&mut self, line: &RawLine, index: usize) -> Option<i64> {
        let Some(text) = line.args.get(index) else {
            self.schema_error(line, "more arguments");
            return None;
        };
        let t = text.trim();
        if t.eq_ignore_ascii_case("IGNORE") {
            return Some(-1);
        }
        if let Some(v) = parse_int(t) {
            return Some(v);
        }
        match self.symbols.resolve(t, &line.loc.file) {
            Some(r) => Some(i64::from(r.value)),
            None => {
                self.diag.error(
                    DiagnosticKind::Reference,
                    &line.loc.file,
                    line.loc.line,
                    format!("unknown symbol: \"{t}\""),
                );
                None
            }
        }
    }

    fn num_in(&mut self, line: &RawLine, index: usize, min: i64, max: i64) -> Option<i64> {
        let v = self.num(line, index)?;
        if !(min..=max).contains(&v) {
            self.range_error(line, &line.args[index].clone(), v);
            return None;
        }
        Some(v)
    }

    /// A 16-bit word argument; `IGNORE` becomes 0xFFFF.
    fn word(&mut self, line: &RawLine, index: usize) -> Option<u16> {
        let v = self.num(line, index)?;
        if v == -1 {
            return Some(0xFFFF);
        }
        if !(0..=0xFFFF).contains(&v) {
            self.range_error(line, &line.args[index].clone(), v);
            return None;
        }
        Some(v as u16)
    }

    /// String reference argument; a miss warns and falls back to index 0.
    fn string_ref(&mut self, line: &RawLine, index: usize) -> u16 {
        let text = line.args.get(index).map(String::as_str).unwrap_or("");
        let text = unquote(text);
        match resolve_string_ref(text, self.lang) {
            Some(i) => i,
            None => {
                self.diag.warning(
                    DiagnosticKind::Reference,
                    &line.loc.file,
                    line.loc.line,
                    format!("string not found: \"{text}\""),
                );
                0
            }
        }
    }

    fn schema_error(&mut self, line: &RawLine, expected: &str) {
        self.diag.error(
            DiagnosticKind::Schema,
            &line.loc.file,
            line.loc.line,
            format!("{} expects {expected}", line.command),
        );
    }

    fn range_error(&mut self, line: &RawLine, what: &str, value: i64) {
        self.diag.error(
            DiagnosticKind::Range,
            &line.loc.file,
            line.loc.line,
            format!("value {value} out of range for \"{what}\""),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ngs_core::model::SourceLoc;

    fn loc() -> SourceLoc {
        SourceLoc { file: "script.txt".into(), line: 1 }
    }

    fn line(command: &str, args: &[&str]) -> RawLine {
        RawLine {
            command: format!("{command}="),
            args: args.iter().map(|s| s.to_string()).collect(),
            loc: loc(),
        }
    }

    fn lang() -> LanguageTable {
        LanguageTable {
            strings: vec!["INVENTORY".into(), "Playable Tutorial Level".into(), "Gate Key".into()],
            ..LanguageTable::default()
        }
    }

    fn level_with(lines: Vec<RawLine>) -> Section {
        let mut s = Section::new(SectionKind::Level);
        s.name = Some("Playable Tutorial Level".into());
        s.lines = lines;
        s.lines.insert(0, line("LoadCamera", &["0", "0", "0", "0", "0", "0", "0"]));
        s
    }

    fn compile(section: &Section) -> (Vec<u8>, Collector) {
        let symbols = SymbolTable::new();
        let table = lang();
        let mut diag = Collector::new();
        let bytes = compile_section(section, 0, &symbols, Some(&table), &mut diag);
        (bytes, diag)
    }

    #[test]
    fn fmv_trigger_sets_the_high_bit() {
        let (bytes, diag) = compile(&level_with(vec![line("FMV", &["3", "1"])]));
        assert!(!diag.has_fatal(), "{:?}", diag.items());
        assert_eq!(&bytes[..2], &[0x80, 0x83]);
    }

    #[test]
    fn animating_mip_packs_distance_and_slot() {
        let (bytes, diag) = compile(&level_with(vec![line("AnimatingMIP", &["5", "2"])]));
        assert!(!diag.has_fatal(), "{:?}", diag.items());
        assert_eq!(&bytes[..2], &[0x90, 0x24]);
    }

    #[test]
    fn empty_title_section_block() {
        let mut s = Section::new(SectionKind::Title);
        s.cd = 104;
        s.lines.push(line("LoadCamera", &["0", "0", "0", "0", "0", "0", "0"]));
        let (bytes, diag) = compile(&s);
        assert!(!diag.has_fatal(), "{:?}", diag.items());
        // LoadCamera (1 + 24 + 1 bytes), then 0x82, flags, index, CD, 0x83.
        assert_eq!(bytes.len(), 26 + 6);
        assert_eq!(&bytes[26..], &[0x82, 0x00, 0x00, 0x00, 104, 0x83]);
    }

    #[test]
    fn level_block_carries_the_name_index() {
        let (bytes, diag) = compile(&level_with(vec![]));
        assert!(!diag.has_fatal(), "{:?}", diag.items());
        let tail = &bytes[bytes.len() - 7..];
        assert_eq!(tail, &[0x81, 1, 0x00, 0x00, 0, 0, 0x83]);
    }

    #[test]
    fn missing_load_camera_is_fatal() {
        let mut s = Section::new(SectionKind::Level);
        s.name = Some("Playable Tutorial Level".into());
        let (_, diag) = compile(&s);
        assert!(diag.has_fatal());
    }

    #[test]
    fn unresolved_level_name_is_fatal() {
        let mut s = level_with(vec![]);
        s.name = Some("No Such Level".into());
        let (_, diag) = compile(&s);
        assert!(diag.has_fatal());
    }

    #[test]
    fn lines_sort_by_fixed_tag_order() {
        // Fog is declared before FMV but must be emitted after it.
        let (bytes, diag) = compile(&level_with(vec![
            line("Fog", &["10", "20", "30"]),
            line("FMV", &["1", "0"]),
        ]));
        assert!(!diag.has_fatal(), "{:?}", diag.items());
        assert_eq!(&bytes[..2], &[0x80, 0x01]);
        assert_eq!(&bytes[2..6], &[0x8F, 10, 20, 30]);
    }

    #[test]
    fn inventory_lines_sort_by_item_then_piece() {
        let (bytes, diag) = compile(&level_with(vec![
            line("Puzzle", &["2", "Gate Key", "0", "0", "0", "0", "0", "0"]),
            line("Puzzle", &["1", "Gate Key", "0", "0", "0", "0", "0", "0"]),
            line("PuzzleCombo", &["1", "2", "Gate Key", "0", "0", "0", "0", "0", "0"]),
            line("PuzzleCombo", &["1", "1", "Gate Key", "0", "0", "0", "0", "0", "0"]),
        ]));
        assert!(!diag.has_fatal(), "{:?}", diag.items());
        // Skip LoadCamera (26 bytes): Puzzle1 (0x9F), Puzzle2 (0xA0),
        // then combo piece 1 (0xC2), combo piece 2 (0xC3).
        let tags: Vec<u8> = vec![bytes[26], bytes[26 + 15], bytes[26 + 30], bytes[26 + 45]];
        assert_eq!(tags, vec![0x9F, 0xA0, 0xC2, 0xC3]);
    }

    #[test]
    fn equal_keys_keep_declaration_order() {
        let (bytes, diag) = compile(&level_with(vec![
            line("FMV", &["2", "0"]),
            line("FMV", &["1", "0"]),
        ]));
        assert!(!diag.has_fatal(), "{:?}", diag.items());
        assert_eq!(&bytes[..4], &[0x80, 0x02, 0x80, 0x01]);
    }

    #[test]
    fn cut_range_is_enforced() {
        let (_, diag) = compile(&level_with(vec![line("Cut", &["32"])]));
        assert!(diag.has_fatal());
    }
}
