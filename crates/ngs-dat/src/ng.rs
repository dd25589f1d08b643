//! The NG command compiler.
//!
//! Schema-driven encoding of parsed NG commands into 16-bit words: a
//! header word `(tag << 8) | payload_word_count`, then the payload in
//! argument order. Occurrence caps are enforced here, and TriggerGroup
//! commands whose values all fit in 16 bits are downgraded to
//! TriggerGroupWord.

use std::collections::HashMap;

use ngs_core::diagnostics::{Collector, DiagnosticKind};
use ngs_core::model::{ArgValue, NgCommand, NgGroup, NgLong};
use ngs_core::schema;

const TRIGGER_GROUP_TAG: u8 = 21;
const TRIGGER_GROUP_WORD_TAG: u8 = 46;

/// Running occurrence counts. Options-scoped counts persist for the whole
/// run; level-scoped counts are reset at every section start.
#[derive(Debug, Default)]
pub struct Occurrences {
    options: HashMap<String, i32>,
    level: HashMap<String, i32>,
}

impl Occurrences {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start of a `[Level]`/`[Title]` section.
    pub fn reset_level(&mut self) {
        self.level.clear();
    }

    /// Count one emission; `false` means the cap is exceeded.
    fn admit(&mut self, name: &str, options_scope: bool, cap: i32) -> bool {
        let map = if options_scope { &mut self.options } else { &mut self.level };
        let count = map.entry(name.to_string()).or_insert(0);
        *count += 1;
        cap < 0 || *count <= cap
    }
}

/// Encode one group of commands. The returned words do not include the
/// flags record or the chunk framing; the trailer builder adds those.
pub fn encode_group(group: &NgGroup, occ: &mut Occurrences, diag: &mut Collector) -> Vec<u16> {
    let mut words = Vec::new();
    for cmd in &group.commands {
        let Some(s) = schema::find(&cmd.name) else {
            diag.error(
                DiagnosticKind::Internal,
                &cmd.loc.file,
                cmd.loc.line,
                format!("command \"{}\" has no schema", cmd.name),
            );
            continue;
        };
        if !occ.admit(s.name, s.options_only, s.max_occurrences) {
            diag.error(
                DiagnosticKind::Occurrence,
                &cmd.loc.file,
                cmd.loc.line,
                format!(
                    "{} used more than {} time(s)",
                    s.name, s.max_occurrences
                ),
            );
            continue;
        }
        if let Some(w) = encode_command(cmd, diag) {
            words.extend(w);
        }
    }
    words
}

/// Encode a single command, or `None` (with a diagnostic) when its payload
/// cannot be represented.
pub fn encode_command(cmd: &NgCommand, diag: &mut Collector) -> Option<Vec<u16>> {
    let cmd = match downgrade_trigger_group(cmd) {
        Some(downgraded) => return encode_plain(&downgraded, diag),
        None => cmd,
    };
    encode_plain(cmd, diag)
}

fn encode_plain(cmd: &NgCommand, diag: &mut Collector) -> Option<Vec<u16>> {
    let mut payload = Vec::new();
    for (pos, arg) in cmd.args.iter().enumerate() {
        match arg {
            ArgValue::Word(w) => payload.push(*w),
            ArgValue::Int(i) => payload.push(*i as u16),
            ArgValue::Slot(s) => payload.push(*s),
            ArgValue::Str(i) => payload.push(*i),
            ArgValue::Import(n) => payload.push(*n),
            ArgValue::Long(l) => push_long(&mut payload, pack_plugin(cmd, pos, *l)),
            ArgValue::Array(words) => payload.extend_from_slice(words),
            ArgValue::ArrayByte(bytes) => push_counted_bytes(&mut payload, bytes),
            ArgValue::ArrayNybble(nybbles) => {
                let mut packed = Vec::with_capacity(nybbles.len().div_ceil(2));
                for pair in nybbles.chunks(2) {
                    let low = pair[0] & 0x0F;
                    let high = pair.get(1).map(|n| n & 0x0F).unwrap_or(0);
                    packed.push(low | (high << 4));
                }
                push_counted_bytes_with_len(&mut payload, &packed, nybbles.len());
            }
            ArgValue::ArrayLong(longs) => {
                for l in longs {
                    push_long(&mut payload, l.value as u32);
                }
            }
        }
    }
    if payload.len() > 0xFF {
        diag.error(
            DiagnosticKind::Range,
            &cmd.loc.file,
            cmd.loc.line,
            format!("{} payload of {} words exceeds 255", cmd.name, payload.len()),
        );
        return None;
    }
    let mut words = Vec::with_capacity(payload.len() + 1);
    words.push((u16::from(cmd.tag) << 8) | payload.len() as u16);
    words.extend(payload);
    Some(words)
}

/// High-word plugin packing: AssignSlot packs into its second argument,
/// Customize and Parameters into their first.
fn pack_plugin(cmd: &NgCommand, pos: usize, long: NgLong) -> u32 {
    let packs = match cmd.name.as_str() {
        "AssignSlot" => pos == 1,
        "Customize" | "Parameters" => pos == 0,
        _ => false,
    };
    if packs && long.plugin != 0 {
        (u32::from(long.plugin) << 16) | (long.value as u32 & 0xFFFF)
    } else {
        long.value as u32
    }
}

fn push_long(payload: &mut Vec<u16>, value: u32) {
    payload.push((value & 0xFFFF) as u16);
    payload.push((value >> 16) as u16);
}

fn push_counted_bytes(payload: &mut Vec<u16>, bytes: &[u8]) {
    push_counted_bytes_with_len(payload, bytes, bytes.len());
}

/// Leading count byte, then data, padded to an even byte total and packed
/// low-byte-first into words.
fn push_counted_bytes_with_len(payload: &mut Vec<u16>, bytes: &[u8], count: usize) {
    let mut raw = Vec::with_capacity(1 + bytes.len() + 1);
    raw.push(count as u8);
    raw.extend_from_slice(bytes);
    if raw.len() % 2 != 0 {
        raw.push(0);
    }
    for pair in raw.chunks(2) {
        payload.push(u16::from(pair[0]) | (u16::from(pair[1]) << 8));
    }
}

/// Whether a 32-bit value survives a cut to 16 bits (high half all zeros
/// or all ones).
fn fits_word(value: i32) -> bool {
    let high = value as u32 & 0xFFFF_0000;
    high == 0 || high == 0xFFFF_0000
}

/// A TriggerGroup whose three fixed longs and every array element fit in
/// 16 bits is re-encoded under the TriggerGroupWord schema.
fn downgrade_trigger_group(cmd: &NgCommand) -> Option<NgCommand> {
    if cmd.tag != TRIGGER_GROUP_TAG {
        return None;
    }
    let mut args = Vec::with_capacity(cmd.args.len());
    for arg in &cmd.args {
        match arg {
            ArgValue::Word(w) => args.push(ArgValue::Word(*w)),
            ArgValue::Long(l) if fits_word(l.value) => {
                args.push(ArgValue::Word((l.value as u32 & 0xFFFF) as u16));
            }
            ArgValue::ArrayLong(longs) if longs.iter().all(|l| fits_word(l.value)) => {
                args.push(ArgValue::Array(
                    longs
                        .iter()
                        .map(|l| (l.value as u32 & 0xFFFF) as u16)
                        .collect(),
                ));
            }
            _ => return None,
        }
    }
    Some(NgCommand {
        name: "TriggerGroupWord".to_string(),
        tag: TRIGGER_GROUP_WORD_TAG,
        args,
        loc: cmd.loc.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ngs_core::model::SourceLoc;

    fn loc() -> SourceLoc {
        SourceLoc { file: "script.txt".into(), line: 1 }
    }

    fn long(value: i32) -> ArgValue {
        ArgValue::Long(NgLong { value, plugin: 0 })
    }

    fn cmd(name: &str, tag: u8, args: Vec<ArgValue>) -> NgCommand {
        NgCommand { name: name.into(), tag, args, loc: loc() }
    }

    #[test]
    fn assign_slot_word_image() {
        // AssignSlot= 100, 200 → 0x0103, 0x0064, 0x00C8, 0x0000.
        let mut diag = Collector::new();
        let words = encode_command(
            &cmd("AssignSlot", 1, vec![ArgValue::Slot(100), long(200)]),
            &mut diag,
        )
        .unwrap();
        assert_eq!(words, vec![0x0103, 0x0064, 0x00C8, 0x0000]);
    }

    #[test]
    fn plugin_id_packs_into_the_high_word() {
        let mut diag = Collector::new();
        let words = encode_command(
            &cmd(
                "Customize",
                13,
                vec![
                    ArgValue::Long(NgLong { value: 0x0005, plugin: 3 }),
                    ArgValue::Array(vec![7]),
                ],
            ),
            &mut diag,
        )
        .unwrap();
        assert_eq!(words, vec![0x0D03, 0x0005, 0x0003, 0x0007]);
    }

    #[test]
    fn trigger_group_downgrades_when_values_fit() {
        // TriggerGroup= 5, 1, 2, 3 → header (46<<8)|4 and word payload.
        let mut diag = Collector::new();
        let words = encode_command(
            &cmd(
                "TriggerGroup",
                21,
                vec![
                    ArgValue::Word(5),
                    long(1),
                    long(2),
                    long(3),
                    ArgValue::ArrayLong(vec![]),
                ],
            ),
            &mut diag,
        )
        .unwrap();
        assert_eq!(words, vec![0x2E04, 5, 1, 2, 3]);
    }

    #[test]
    fn trigger_group_keeps_longs_when_any_value_overflows() {
        let mut diag = Collector::new();
        let words = encode_command(
            &cmd(
                "TriggerGroup",
                21,
                vec![
                    ArgValue::Word(5),
                    long(1),
                    long(0x10000),
                    long(3),
                    ArgValue::ArrayLong(vec![]),
                ],
            ),
            &mut diag,
        )
        .unwrap();
        assert_eq!(words, vec![0x1507, 5, 1, 0, 0, 1, 3, 0]);
    }

    #[test]
    fn negative_small_longs_still_downgrade() {
        let mut diag = Collector::new();
        let words = encode_command(
            &cmd(
                "TriggerGroup",
                21,
                vec![
                    ArgValue::Word(1),
                    long(-1),
                    long(0),
                    long(0),
                    ArgValue::ArrayLong(vec![NgLong { value: -2, plugin: 0 }]),
                ],
            ),
            &mut diag,
        )
        .unwrap();
        assert_eq!(words, vec![0x2E05, 1, 0xFFFF, 0, 0, 0xFFFE]);
    }

    #[test]
    fn byte_array_gets_count_and_padding() {
        let mut diag = Collector::new();
        let words = encode_command(
            &cmd(
                "Detector",
                18,
                vec![ArgValue::Word(9), ArgValue::ArrayByte(vec![0x11, 0x22, 0x33])],
            ),
            &mut diag,
        )
        .unwrap();
        // Count byte 3 + 3 data bytes = 4 bytes = 2 words.
        assert_eq!(words, vec![0x1203, 9, 0x1103, 0x3322]);
    }

    #[test]
    fn nybble_array_packs_low_first() {
        let mut diag = Collector::new();
        let words = encode_command(
            &cmd(
                "LightCycle",
                19,
                vec![ArgValue::Word(2), ArgValue::ArrayNybble(vec![1, 2, 3])],
            ),
            &mut diag,
        )
        .unwrap();
        // Count byte 3, packed bytes [0x21, 0x03], padded to 4 bytes.
        assert_eq!(words, vec![0x1303, 2, 0x2103, 0x0003]);
    }

    #[test]
    fn occurrence_cap_is_fatal_and_emits_nothing() {
        let mut diag = Collector::new();
        let mut occ = Occurrences::new();
        let snow = cmd("Snow", 29, vec![ArgValue::Word(30)]);
        let group = NgGroup {
            commands: vec![snow.clone(), snow],
            flags: 0,
        };
        let words = encode_group(&group, &mut occ, &mut diag);
        // First emission survives; the second is refused.
        assert_eq!(words, vec![0x1D01, 30]);
        assert!(diag.has_fatal());
    }

    #[test]
    fn level_counters_reset_but_options_counters_persist() {
        let mut diag = Collector::new();
        let mut occ = Occurrences::new();
        let snow = NgGroup {
            commands: vec![cmd("Snow", 29, vec![ArgValue::Word(1)])],
            flags: 0,
        };
        encode_group(&snow, &mut occ, &mut diag);
        occ.reset_level();
        encode_group(&snow, &mut occ, &mut diag);
        assert!(!diag.has_fatal());

        let title = NgGroup {
            commands: vec![cmd("WindowTitle", 38, vec![ArgValue::Str(0)])],
            flags: 0,
        };
        encode_group(&title, &mut occ, &mut diag);
        occ.reset_level();
        encode_group(&title, &mut occ, &mut diag);
        assert!(diag.has_fatal());
    }
}
