//! The NG command schema catalog.
//!
//! One entry per extended directive: its tag code, argument kind sequence,
//! whether it may only appear in `[Options]`, and its occurrence cap. The
//! catalog is the single authority the parser routes by and the NG compiler
//! encodes by.

/// Highest valid moveable slot number.
pub const ITEM_SLOT_MAX: u16 = 464;

/// Pseudo-tag of the options-flags record embedded in the options chunk.
pub const FLAGS_OPTION_TAG: u8 = 200;
/// Pseudo-tag of the level-flags record embedded in each level chunk.
pub const FLAGS_LEVEL_TAG: u8 = 201;

/// NG options-flag bits, set by bool-only options commands.
pub const NGOPT_DIAGNOSTIC: u16 = 0x0001;
pub const NGOPT_LARA_IN_TITLE: u16 = 0x0002;
pub const NGOPT_NEW_SOUND_ENGINE: u16 = 0x0004;
pub const NGOPT_BUMP_MAPPING: u16 = 0x0008;

/// NG level-flag bits, set by bool-only level commands.
pub const NGLVL_TURBO: u16 = 0x0001;
pub const NGLVL_VOLUMETRIC_FX: u16 = 0x0002;
pub const NGLVL_PRESERVE_INVENTORY: u16 = 0x0004;

/// Argument kinds an NG command schema can require.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    /// Unsigned 16-bit value, one word.
    Word,
    /// Signed 16-bit value, one word.
    Int,
    /// Moveable slot number, 0–[`ITEM_SLOT_MAX`], one word.
    Slot,
    /// 32-bit value, two words low-first.
    Long,
    /// `ENABLED`/`DISABLED`; only valid as the sole argument of a
    /// flag-setting command, which emits no words.
    Bool,
    /// String-table reference, one word.
    Str,
    /// Import-file reference, one word (the file number).
    Import,
    /// Trailing run of words.
    Array,
    /// Trailing run of bytes (count byte + data, even-padded).
    ArrayByte,
    /// Trailing run of 4-bit values (count byte + packed nibbles).
    ArrayNybble,
    /// Trailing run of 32-bit values, two words each.
    ArrayLong,
}

impl ArgKind {
    /// Whether this kind swallows all remaining actual arguments.
    pub fn is_array(self) -> bool {
        matches!(
            self,
            Self::Array | Self::ArrayByte | Self::ArrayNybble | Self::ArrayLong
        )
    }
}

/// Schema of one NG command.
#[derive(Debug, Clone, Copy)]
pub struct NgSchema {
    pub name: &'static str,
    /// Tag code, the high byte of the emitted header word.
    pub tag: u8,
    pub args: &'static [ArgKind],
    /// May only appear in `[Options]`; its words go to the options chunk
    /// and its occurrence count persists for the whole run.
    pub options_only: bool,
    /// Occurrence cap; -1 is unlimited. Level-scoped counts reset at each
    /// section start.
    pub max_occurrences: i32,
    /// For bool-only commands, the bit set in the surrounding flags word.
    pub flag_bit: u16,
}

impl NgSchema {
    /// Whether this command only toggles a flag bit and emits no words.
    pub fn is_flag(&self) -> bool {
        self.flag_bit != 0
    }
}

macro_rules! schema {
    ($name:literal, $tag:literal, flag $bit:expr, $opts:literal) => {
        NgSchema {
            name: $name,
            tag: $tag,
            args: &[ArgKind::Bool],
            options_only: $opts,
            max_occurrences: -1,
            flag_bit: $bit,
        }
    };
    ($name:literal, $tag:literal, $args:expr, $opts:literal, $max:literal) => {
        NgSchema {
            name: $name,
            tag: $tag,
            args: $args,
            options_only: $opts,
            max_occurrences: $max,
            flag_bit: 0,
        }
    };
}

use ArgKind::*;

/// Every known NG directive. Tag codes are part of the on-disk format and
/// must never be renumbered.
pub const CATALOG: &[NgSchema] = &[
    schema!("AssignSlot", 1, &[Slot, Long], false, -1),
    schema!("Customize", 13, &[Long, Array], false, -1),
    schema!("Parameters", 14, &[Long, Array], false, -1),
    schema!("Equipment", 15, &[Slot, Word], false, -1),
    schema!("CombineItems", 16, &[Slot, Slot, Slot], false, -1),
    schema!("KeyPad", 17, &[Word, Word, Word], false, -1),
    schema!("Detector", 18, &[Word, ArrayByte], false, 1),
    schema!("LightCycle", 19, &[Word, ArrayNybble], false, -1),
    schema!("TextFormat", 20, &[Word, Word, Word, Word], true, 1),
    schema!("TriggerGroup", 21, &[Word, Long, Long, Long, ArrayLong], false, -1),
    schema!("GlobalTrigger", 23, &[Word, Word, Long, Long, Long, Long], false, -1),
    schema!("Organizer", 25, &[Word, Word, Word, Array], false, -1),
    schema!("ItemGroup", 26, &[Word, Array], false, -1),
    schema!("MultEnvCondition", 27, &[Word, ArrayLong], false, -1),
    schema!("TestPosition", 28, &[Word, Word, Slot, Array], false, -1),
    schema!("Snow", 29, &[Word], false, 1),
    schema!("Rain", 30, &[Word], false, 1),
    schema!("LevelFarView", 31, &[Word], false, 1),
    schema!("WorldFarView", 32, &[Word], true, 1),
    schema!("FogRange", 33, &[Word, Word], false, 1),
    schema!("DistanceFog", 34, &[Word, Word, Word], false, 1),
    schema!("SoundSettings", 35, &[Word, Word, Word], true, 1),
    schema!("Plugin", 36, &[Word], true, -1),
    schema!("Settings", 37, &[Word], true, 1),
    schema!("WindowTitle", 38, &[Str], true, 1),
    schema!("WindowsFont", 39, &[Word, Str, Array], true, -1),
    schema!("StandBy", 40, &[Word, Int, Int, Int, Word, Word], false, 1),
    schema!("Elevator", 41, &[Word, Word, Array], false, -1),
    schema!("Demo", 42, &[Import], false, 1),
    schema!("LogItem", 43, &[Slot], false, -1),
    schema!("ColorRGB", 44, &[Word, Word, Word, Word], false, -1),
    schema!("AddEffect", 45, &[Word, Word, Word, Array], false, -1),
    schema!("TriggerGroupWord", 46, &[Word, Word, Word, Word, Array], false, -1),
    schema!("ImportFile", 47, &[Word, Import, Word, Word], true, -1),
    schema!("Turbo", 48, flag NGLVL_TURBO, false),
    schema!("ForceVolumetricFX", 49, flag NGLVL_VOLUMETRIC_FX, false),
    schema!("PreserveInventory", 50, flag NGLVL_PRESERVE_INVENTORY, false),
    schema!("Diagnostic", 51, flag NGOPT_DIAGNOSTIC, true),
    schema!("ShowLaraInTitle", 52, flag NGOPT_LARA_IN_TITLE, true),
    schema!("NewSoundEngine", 53, flag NGOPT_NEW_SOUND_ENGINE, true),
    schema!("ForceBumpMapping", 54, flag NGOPT_BUMP_MAPPING, true),
];

/// Classic directives that stay classic even though a catalog name might
/// shadow them one day. Routing checks this list before the catalog.
pub const CLASSIC_RESERVED: &[&str] = &[
    "Name", "Level", "LoadCamera", "FMV", "Cut", "ResidentCut", "Layer1", "Layer2",
    "UVRotate", "Legend", "LensFlare", "Mirror", "Fog", "AnimatingMIP", "ResetHUB",
    "Key", "Puzzle", "Pickup", "Examine", "KeyCombo", "PuzzleCombo", "PickupCombo",
    "YoungLara", "Horizon", "Lightning", "Train", "Pulse", "ColAddHorizon",
    "StarField", "Timer", "NoLevel", "RemoveAmulet", "Weather",
];

/// Find a schema by command name (case-insensitive, trailing `=` ignored).
pub fn find(name: &str) -> Option<&'static NgSchema> {
    let name = name.strip_suffix('=').unwrap_or(name);
    CATALOG.iter().find(|s| s.name.eq_ignore_ascii_case(name))
}

/// Whether a command name is reserved for the classic encoders.
pub fn is_classic_reserved(name: &str) -> bool {
    let name = name.strip_suffix('=').unwrap_or(name);
    CLASSIC_RESERVED.iter().any(|r| r.eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pinned_tags_are_stable() {
        assert_eq!(find("AssignSlot").unwrap().tag, 1);
        assert_eq!(find("TriggerGroup").unwrap().tag, 21);
        assert_eq!(find("TriggerGroupWord").unwrap().tag, 46);
    }

    #[test]
    fn lookup_ignores_case_and_equals() {
        assert!(find("assignslot=").is_some());
        assert!(find("SNOW").is_some());
        assert!(find("NoSuchCommand").is_none());
    }

    #[test]
    fn array_kinds_are_last_and_unique() {
        for schema in CATALOG {
            let arrays = schema.args.iter().filter(|k| k.is_array()).count();
            assert!(arrays <= 1, "{}: more than one array argument", schema.name);
            if arrays == 1 {
                assert!(
                    schema.args.last().unwrap().is_array(),
                    "{}: array argument not last",
                    schema.name
                );
            }
        }
    }

    #[test]
    fn tags_are_unique() {
        let mut tags: Vec<u8> = CATALOG.iter().map(|s| s.tag).collect();
        tags.sort_unstable();
        tags.dedup();
        assert_eq!(tags.len(), CATALOG.len());
    }

    #[test]
    fn flag_commands_are_bool_only() {
        for schema in CATALOG.iter().filter(|s| s.is_flag()) {
            assert_eq!(schema.args, &[ArgKind::Bool], "{}", schema.name);
        }
    }

    #[test]
    fn classic_names_stay_classic() {
        assert!(is_classic_reserved("loadcamera="));
        assert!(!is_classic_reserved("TriggerGroup"));
    }
}
