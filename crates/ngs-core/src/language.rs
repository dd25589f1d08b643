//! The in-memory string tables of one parsed language file.

/// Index returned for an extra-NG hit: high bit set over the declared index.
pub const EXTRA_NG_BIT: u16 = 0x8000;

/// Four string sections of a language file plus the bookkeeping the
/// container writer needs (offsets, cumulative section sizes).
///
/// Offsets and sizes are computed by the language parser while it still has
/// the CP-1252 byte lengths at hand; this type only stores them.
#[derive(Debug, Clone, Default)]
pub struct LanguageTable {
    /// `[Strings]` in insertion order.
    pub strings: Vec<String>,
    /// `[PSX Strings]` in insertion order.
    pub psx_strings: Vec<String>,
    /// `[PC Strings]` in insertion order.
    pub pc_strings: Vec<String>,
    /// `[ExtraNG]` entries as `(declared index, text)`.
    pub extras: Vec<(u16, String)>,
    /// Byte offset of each plain string (all three sections, insertion
    /// order). `offsets[i + 1] == offsets[i] + bytelen(string) + 1`.
    pub offsets: Vec<u16>,
    /// Cumulative byte sizes of the four sections, in section order.
    pub section_sizes: [u32; 4],
}

impl LanguageTable {
    /// Total number of plain strings across the three main sections.
    pub fn total_strings(&self) -> usize {
        self.strings.len() + self.psx_strings.len() + self.pc_strings.len()
    }

    /// Look up a display string: `[Strings]` first (plain index), then the
    /// extra-NG entries (declared index with the high bit set).
    pub fn lookup(&self, text: &str) -> Option<u16> {
        if let Some(i) = self.strings.iter().position(|s| s == text) {
            return Some(i as u16);
        }
        self.extras
            .iter()
            .find(|(_, s)| s == text)
            .map(|(index, _)| EXTRA_NG_BIT | index)
    }
}

/// Resolve a string reference in any of its source notations: `#n` is a
/// literal index, `!n` an extra-NG index (stored with the high bit set),
/// `&hex` a raw index, anything else a table lookup.
///
/// `None` means the reference could not be resolved; the caller decides
/// whether that warns (most emitters substitute index 0) or aborts.
pub fn resolve_string_ref(text: &str, table: Option<&LanguageTable>) -> Option<u16> {
    let t = text.trim();
    if let Some(n) = t.strip_prefix('#') {
        return n.trim().parse::<u16>().ok();
    }
    if let Some(n) = t.strip_prefix('!') {
        return n.trim().parse::<u16>().ok().map(|n| EXTRA_NG_BIT | n);
    }
    if let Some(hex) = t.strip_prefix('&') {
        return u16::from_str_radix(hex.trim(), 16).ok();
    }
    table?.lookup(t)
}
