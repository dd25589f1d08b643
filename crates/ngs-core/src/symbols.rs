//! Layered symbol resolution.
//!
//! Lookup precedence is fixed: user `#define`s scoped to the querying file,
//! engine constants, the slot enum, the static enum, then each plugin's
//! constant table in discovery order. Only a plugin hit carries a nonzero
//! plugin id.

use std::collections::HashMap;

use crate::error::{NgsError, NgsResult};

/// A `#define NAME value` entry, visible only to lines of the same file.
#[derive(Debug, Clone)]
pub struct UserDefine {
    pub name: String,
    pub value: i32,
    /// Base name of the file the define appeared in.
    pub file: String,
}

/// Constants contributed by one plugin descriptor.
#[derive(Debug, Clone)]
pub struct PluginTable {
    /// Plugin base name (descriptor file stem).
    pub name: String,
    /// Uppercased constant name to value.
    pub constants: HashMap<String, i32>,
    /// False for synthetic tables created from a bare shared library.
    pub has_descriptor: bool,
}

/// A successful lookup: the value and the owning plugin id (0 = none).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolved {
    pub value: i32,
    pub plugin: u16,
}

/// Outcome of a `#define @name id` binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindOutcome {
    Bound,
    /// The name was already bound to the same id; first binding kept.
    AlreadyBound,
}

/// The process-wide symbol table, mutated only by the directive parser.
#[derive(Debug, Default)]
pub struct SymbolTable {
    defines: Vec<UserDefine>,
    engine: HashMap<String, i32>,
    slots: HashMap<String, i32>,
    statics: HashMap<String, i32>,
    /// Plugin tables in discovery order (descriptor mtime ascending).
    plugins: Vec<PluginTable>,
    /// Declared plugin ids, keyed by uppercased plugin name.
    bindings: HashMap<String, u16>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the engine constant catalog (replaces any previous one).
    pub fn set_engine_constants(&mut self, entries: impl IntoIterator<Item = (String, i32)>) {
        self.engine = upper_map(entries);
    }

    /// Install the moveable-slot enum.
    pub fn set_slots(&mut self, entries: impl IntoIterator<Item = (String, i32)>) {
        self.slots = upper_map(entries);
    }

    /// Install the static-object enum.
    pub fn set_statics(&mut self, entries: impl IntoIterator<Item = (String, i32)>) {
        self.statics = upper_map(entries);
    }

    /// Add a user `#define`, scoped to `file`. A redefinition in the same
    /// file shadows the earlier value.
    pub fn define(&mut self, name: &str, value: i32, file: &str) {
        self.defines.push(UserDefine {
            name: name.to_string(),
            value,
            file: file.to_string(),
        });
    }

    /// Append a plugin constant table (discovery order is caller-enforced).
    pub fn add_plugin_table(&mut self, table: PluginTable) {
        self.plugins.push(table);
    }

    /// Whether a plugin table with this name is already present.
    pub fn has_plugin(&self, name: &str) -> bool {
        self.plugins.iter().any(|p| p.name.eq_ignore_ascii_case(name))
    }

    /// Bind a plugin name to its declared id (`#define @name id` or
    /// `Plugin= id, name`). Rebinding to a different id is an error.
    pub fn bind_plugin(&mut self, name: &str, id: u16) -> NgsResult<BindOutcome> {
        let key = name.to_ascii_uppercase();
        match self.bindings.get(&key) {
            Some(&bound) if bound == id => Ok(BindOutcome::AlreadyBound),
            Some(&bound) => Err(NgsError::PluginRebound {
                name: name.to_string(),
                bound,
                requested: id,
            }),
            None => {
                self.bindings.insert(key, id);
                Ok(BindOutcome::Bound)
            }
        }
    }

    /// Drop every plugin binding (`#define @plugins clear`).
    pub fn clear_plugin_bindings(&mut self) {
        self.bindings.clear();
    }

    /// Declared id of a plugin, 0 when unbound.
    pub fn plugin_id(&self, name: &str) -> u16 {
        self.bindings
            .get(&name.to_ascii_uppercase())
            .copied()
            .unwrap_or(0)
    }

    /// Resolve a name for a line of `current_file`, walking the layers in
    /// precedence order. Case-insensitive throughout.
    pub fn resolve(&self, name: &str, current_file: &str) -> Option<Resolved> {
        let key = name.trim().to_ascii_uppercase();
        if key.is_empty() {
            return None;
        }
        // Last matching define wins, so later redefinitions shadow.
        if let Some(d) = self
            .defines
            .iter()
            .rev()
            .find(|d| d.file.eq_ignore_ascii_case(current_file) && d.name.eq_ignore_ascii_case(&key))
        {
            return Some(Resolved { value: d.value, plugin: 0 });
        }
        for table in [&self.engine, &self.slots, &self.statics] {
            if let Some(&value) = table.get(&key) {
                return Some(Resolved { value, plugin: 0 });
            }
        }
        for plugin in &self.plugins {
            if let Some(&value) = plugin.constants.get(&key) {
                return Some(Resolved {
                    value,
                    plugin: self.plugin_id(&plugin.name),
                });
            }
        }
        None
    }
}

fn upper_map(entries: impl IntoIterator<Item = (String, i32)>) -> HashMap<String, i32> {
    entries
        .into_iter()
        .map(|(name, value)| (name.to_ascii_uppercase(), value))
        .collect()
}
