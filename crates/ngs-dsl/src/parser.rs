//! The directive parser — the driver of the front end.
//!
//! Walks the main script (and its includes, depth-first) as CP-1252 text,
//! recognizes section headers, maintains the symbol table, routes each line
//! to the classic or NG path and accumulates the [`ScriptModel`].

use std::fs;
use std::path::{Path, PathBuf};

use ngs_core::catalogs;
use ngs_core::diagnostics::{Collector, DiagnosticKind};
use ngs_core::language::{resolve_string_ref, LanguageTable};
use ngs_core::literal::parse_int;
use ngs_core::model::*;
use ngs_core::schema::{self, ArgKind, NgSchema, ITEM_SLOT_MAX};
use ngs_core::symbols::{BindOutcome, PluginTable, SymbolTable};

use crate::cp1252;
use crate::eval::evaluate;
use crate::language::parse_language;
use crate::lexer::{logical_lines, split_directive, unquote};

/// Deepest allowed include nesting.
const MAX_INCLUDE_DEPTH: usize = 8;

/// Everything the front end hands to the binary back end.
#[derive(Debug, Default)]
pub struct ParsedProject {
    pub model: ScriptModel,
    pub symbols: SymbolTable,
    /// One table per declared language file, in slot order.
    pub languages: Vec<LanguageTable>,
}

/// Parse the project under `script_dir` (the directory holding
/// `script.txt`, the language files and the constant catalogs).
pub fn parse_project(script_dir: &Path, diag: &mut Collector) -> ParsedProject {
    let mut symbols = SymbolTable::new();
    load_catalogs(script_dir, &mut symbols, diag);
    discover_plugins(script_dir, &mut symbols, diag);

    let Some(main) = find_file(script_dir, "script.txt") else {
        diag.error(
            DiagnosticKind::Resource,
            "script.txt",
            0,
            format!("no script.txt in {}", script_dir.display()),
        );
        return ParsedProject::default();
    };

    let mut parser = DirectiveParser {
        dir: script_dir.to_path_buf(),
        diag,
        symbols,
        model: ScriptModel::default(),
        context: Context::Prelude,
        current: None,
        lang0: None,
        options_seen: false,
        open_files: Vec::new(),
    };
    parser.process_file(&main);
    parser.finish()
}

/// Case-insensitive file lookup within one directory.
pub fn find_file(dir: &Path, name: &str) -> Option<PathBuf> {
    let direct = dir.join(name);
    if direct.is_file() {
        return Some(direct);
    }
    let entries = fs::read_dir(dir).ok()?;
    for entry in entries.flatten() {
        if entry
            .file_name()
            .to_string_lossy()
            .eq_ignore_ascii_case(name)
        {
            return Some(entry.path());
        }
    }
    None
}

fn load_catalogs(dir: &Path, symbols: &mut SymbolTable, diag: &mut Collector) {
    match find_file(dir, "scripter_constants.txt") {
        Some(path) => match fs::read(&path) {
            Ok(bytes) => {
                symbols.set_engine_constants(catalogs::parse_constant_lines(&cp1252::decode(&bytes)));
            }
            Err(e) => diag.warning(
                DiagnosticKind::Resource,
                "scripter_constants.txt",
                0,
                format!("cannot read constant catalog: {e}"),
            ),
        },
        None => diag.warning(
            DiagnosticKind::Resource,
            "scripter_constants.txt",
            0,
            "engine constant catalog not found; names will not resolve",
        ),
    }
    match find_file(dir, "Objects.h") {
        Some(path) => match fs::read(&path) {
            Ok(bytes) => {
                let (slots, statics) = catalogs::parse_objects_header(&cp1252::decode(&bytes));
                symbols.set_slots(slots);
                symbols.set_statics(statics);
            }
            Err(e) => diag.warning(
                DiagnosticKind::Resource,
                "Objects.h",
                0,
                format!("cannot read object header: {e}"),
            ),
        },
        None => diag.warning(
            DiagnosticKind::Resource,
            "Objects.h",
            0,
            "object header not found; slot names will not resolve",
        ),
    }
}

/// Load every `<name>.script` descriptor in the directory, oldest first.
fn discover_plugins(dir: &Path, symbols: &mut SymbolTable, diag: &mut Collector) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    let mut found: Vec<(std::time::SystemTime, PathBuf)> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| {
            p.extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("script"))
        })
        .map(|p| {
            let mtime = fs::metadata(&p)
                .and_then(|m| m.modified())
                .unwrap_or(std::time::SystemTime::UNIX_EPOCH);
            (mtime, p)
        })
        .collect();
    found.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

    for (_, path) in found {
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        match fs::read(&path) {
            Ok(bytes) => {
                let constants = catalogs::parse_descriptor(&cp1252::decode(&bytes));
                symbols.add_plugin_table(PluginTable {
                    name,
                    constants: constants
                        .into_iter()
                        .map(|(n, v)| (n.to_ascii_uppercase(), v))
                        .collect(),
                    has_descriptor: true,
                });
            }
            Err(e) => diag.warning(
                DiagnosticKind::Resource,
                &name,
                0,
                format!("cannot read plugin descriptor: {e}"),
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Context {
    Prelude,
    PsxExtensions,
    PcExtensions,
    Language,
    Options,
    Section,
}

struct DirectiveParser<'a> {
    dir: PathBuf,
    diag: &'a mut Collector,
    symbols: SymbolTable,
    model: ScriptModel,
    context: Context,
    current: Option<Section>,
    /// Lazily parsed first language file, reused for the final output pass.
    lang0: Option<LanguageTable>,
    options_seen: bool,
    open_files: Vec<String>,
}

impl DirectiveParser<'_> {
    fn process_file(&mut self, path: &Path) {
        let base = path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        if self.open_files.iter().any(|f| f.eq_ignore_ascii_case(&base)) {
            self.diag.error(
                DiagnosticKind::Parse,
                &base,
                0,
                "include cycle detected",
            );
            return;
        }
        let bytes = match fs::read(path) {
            Ok(b) => b,
            Err(e) => {
                self.diag.error(
                    DiagnosticKind::Resource,
                    &base,
                    0,
                    format!("cannot read source file: {e}"),
                );
                return;
            }
        };
        self.open_files.push(base.clone());
        let raw = cp1252::decode_lines(&bytes);
        for logical in logical_lines(&raw) {
            let loc = SourceLoc {
                file: base.clone(),
                line: logical.line,
            };
            self.handle_line(&logical.text, loc);
        }
        self.open_files.pop();
    }

    fn handle_line(&mut self, text: &str, loc: SourceLoc) {
        if text.starts_with('[') {
            self.switch_section(text, &loc);
            return;
        }
        let first = text.split_whitespace().next().unwrap_or("");
        if first.eq_ignore_ascii_case("#define") {
            self.handle_define(text[first.len()..].trim(), &loc);
            return;
        }
        if first.eq_ignore_ascii_case("#include") {
            self.handle_include(text[first.len()..].trim(), &loc);
            return;
        }
        let Some((command, args)) = split_directive(text) else {
            self.diag.error(
                DiagnosticKind::Parse,
                &loc.file,
                loc.line,
                format!("missing '=' in directive: \"{text}\""),
            );
            return;
        };
        let line = RawLine { command, args, loc };
        match self.context {
            Context::Prelude => self.diag.warning(
                DiagnosticKind::Parse,
                &line.loc.file,
                line.loc.line,
                "directive before any section header",
            ),
            Context::PsxExtensions => self.handle_extension(line, true),
            Context::PcExtensions => self.handle_extension(line, false),
            Context::Language => self.handle_language(line),
            Context::Options => self.handle_options(line),
            Context::Section => self.handle_section_line(line),
        }
    }

    // -- sections --------------------------------------------------------

    fn switch_section(&mut self, header: &str, loc: &SourceLoc) {
        let key: String = header
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect::<String>()
            .to_ascii_uppercase();
        self.close_section();
        match key.as_str() {
            "[PSXEXTENSIONS]" => self.context = Context::PsxExtensions,
            "[PCEXTENSIONS]" => self.context = Context::PcExtensions,
            "[LANGUAGE]" => self.context = Context::Language,
            "[OPTIONS]" => {
                self.context = Context::Options;
                if !self.options_seen {
                    self.options_seen = true;
                    self.load_first_language();
                }
            }
            "[TITLE]" => {
                self.context = Context::Section;
                self.current = Some(Section::new(SectionKind::Title));
            }
            "[LEVEL]" => {
                self.context = Context::Section;
                self.current = Some(Section::new(SectionKind::Level));
            }
            _ => {
                self.context = Context::Prelude;
                self.diag.error(
                    DiagnosticKind::Parse,
                    &loc.file,
                    loc.line,
                    format!("unknown section header: {header}"),
                );
            }
        }
    }

    fn close_section(&mut self) {
        if let Some(section) = self.current.take() {
            self.model.sections.push(section);
        }
    }

    /// First `[Options]` entry loads language file 0 so string-typed NG
    /// arguments can resolve from here on.
    fn load_first_language(&mut self) {
        let Some(name) = self.model.language_files.first().cloned() else {
            return;
        };
        match find_file(&self.dir, &name) {
            Some(path) => match fs::read(&path) {
                Ok(bytes) => {
                    let table = parse_language(&cp1252::decode(&bytes), &name, self.diag);
                    self.lang0 = Some(table);
                }
                Err(e) => self.diag.error(
                    DiagnosticKind::Resource,
                    &name,
                    0,
                    format!("cannot read language file: {e}"),
                ),
            },
            None => self.diag.error(
                DiagnosticKind::Resource,
                &name,
                0,
                "language file not found",
            ),
        }
    }

    // -- defines and includes -------------------------------------------

    fn handle_define(&mut self, rest: &str, loc: &SourceLoc) {
        let Some(name) = rest.split_whitespace().next() else {
            self.diag.error(
                DiagnosticKind::Parse,
                &loc.file,
                loc.line,
                "malformed #define: missing name",
            );
            return;
        };
        let value_text = rest[name.len()..].trim();
        if let Some(plugin) = name.strip_prefix('@') {
            self.handle_plugin_define(plugin, value_text, loc);
            return;
        }
        match evaluate(value_text, &self.symbols, &loc.file) {
            Ok(out) => self.symbols.define(name, out.value as i32, &loc.file),
            Err(e) => self.diag.error(
                DiagnosticKind::Parse,
                &loc.file,
                loc.line,
                format!("malformed #define {name}: {e}"),
            ),
        }
    }

    fn handle_plugin_define(&mut self, plugin: &str, value: &str, loc: &SourceLoc) {
        if plugin.eq_ignore_ascii_case("plugins") {
            if value.eq_ignore_ascii_case("clear") {
                self.symbols.clear_plugin_bindings();
            } else {
                self.diag.error(
                    DiagnosticKind::Parse,
                    &loc.file,
                    loc.line,
                    format!("unknown @plugins directive: \"{value}\""),
                );
            }
            return;
        }
        let id = match parse_int(value) {
            Some(id) if (1..=0xFFFF).contains(&id) => id as u16,
            _ => {
                self.diag.error(
                    DiagnosticKind::Parse,
                    &loc.file,
                    loc.line,
                    format!("bad plugin id for @{plugin}: \"{value}\""),
                );
                return;
            }
        };
        self.bind_plugin(plugin, id, loc);
    }

    fn bind_plugin(&mut self, name: &str, id: u16, loc: &SourceLoc) {
        match self.symbols.bind_plugin(name, id) {
            Ok(BindOutcome::Bound) => {}
            Ok(BindOutcome::AlreadyBound) => self.diag.warning(
                DiagnosticKind::Parse,
                &loc.file,
                loc.line,
                format!("plugin \"{name}\" already bound to id {id}; second binding ignored"),
            ),
            Err(e) => self.diag.error(
                DiagnosticKind::Parse,
                &loc.file,
                loc.line,
                e.to_string(),
            ),
        }
    }

    fn handle_include(&mut self, rest: &str, loc: &SourceLoc) {
        let name = unquote(rest);
        if name.is_empty() {
            self.diag.error(
                DiagnosticKind::Parse,
                &loc.file,
                loc.line,
                "#include without a file name",
            );
            return;
        }
        if self.open_files.len() >= MAX_INCLUDE_DEPTH {
            self.diag.error(
                DiagnosticKind::Parse,
                &loc.file,
                loc.line,
                "includes nested too deeply",
            );
            return;
        }
        match find_file(&self.dir, name) {
            Some(path) => self.process_file(&path),
            None => self.diag.error(
                DiagnosticKind::Resource,
                &loc.file,
                loc.line,
                format!("include not found: {name}"),
            ),
        }
    }

    // -- per-context directive handling ---------------------------------

    fn handle_extension(&mut self, line: RawLine, psx: bool) {
        let slot = match line.name().to_ascii_uppercase().as_str() {
            "LEVEL" => 0,
            "CUT" => 1,
            "FMV" => 2,
            "DEMO" => 3,
            _ => {
                self.diag.warning(
                    DiagnosticKind::Parse,
                    &line.loc.file,
                    line.loc.line,
                    format!("unknown extension directive: {}", line.command),
                );
                return;
            }
        };
        let Some(ext) = line.args.first() else {
            self.diag.warning(
                DiagnosticKind::Parse,
                &line.loc.file,
                line.loc.line,
                format!("{} without an extension value", line.command),
            );
            return;
        };
        let list = if psx {
            &mut self.model.psx_extensions
        } else {
            &mut self.model.pc_extensions
        };
        if list.len() < 4 {
            list.resize(4, String::new());
        }
        list[slot] = ext.clone();
    }

    fn handle_language(&mut self, line: RawLine) {
        if !line.is("File") {
            self.diag.warning(
                DiagnosticKind::Parse,
                &line.loc.file,
                line.loc.line,
                format!("unknown [Language] directive: {}", line.command),
            );
            return;
        }
        if line.args.len() < 2 {
            self.diag.error(
                DiagnosticKind::Parse,
                &line.loc.file,
                line.loc.line,
                "File= needs an index and a file name",
            );
            return;
        }
        let expected = self.model.language_files.len() as i64;
        match parse_int(&line.args[0]) {
            Some(n) if n == expected => {}
            Some(n) => {
                self.diag.error(
                    DiagnosticKind::Parse,
                    &line.loc.file,
                    line.loc.line,
                    format!("language file index {n} out of order (expected {expected})"),
                );
                return;
            }
            None => {
                self.diag.error(
                    DiagnosticKind::Parse,
                    &line.loc.file,
                    line.loc.line,
                    format!("bad language file index: \"{}\"", line.args[0]),
                );
                return;
            }
        }
        let name = unquote(&line.args[1]).to_string();
        if !name.contains('.') {
            self.diag.error(
                DiagnosticKind::Parse,
                &line.loc.file,
                line.loc.line,
                format!("language file \"{name}\" has no extension"),
            );
            return;
        }
        self.model.language_files.push(name);
    }

    fn handle_options(&mut self, line: RawLine) {
        let flag = match line.name().to_ascii_uppercase().as_str() {
            "FLYCHEAT" => Some(OPT_FLYCHEAT),
            "LOADSAVE" => Some(OPT_LOADSAVE),
            "TITLE" => Some(OPT_TITLE),
            "PLAYANYLEVEL" => Some(OPT_PLAY_ANY_LEVEL),
            "DEMODISC" => Some(OPT_DEMO_DISC),
            _ => None,
        };
        if let Some(bit) = flag {
            match self.parse_enabled(&line) {
                Some(true) => self.model.options_flags |= bit,
                Some(false) => self.model.options_flags &= !bit,
                None => {}
            }
            return;
        }
        if line.is("InputTimeout") {
            if let Some(v) = self.eval_arg(&line, 0) {
                self.model.input_timeout = v as u32;
            }
            return;
        }
        if line.is("Security") {
            if let Some(v) = self.eval_arg(&line, 0) {
                self.model.security = (v & 0xFF) as u8;
            }
            return;
        }
        if line.is("Plugin") {
            self.handle_plugin_directive(line);
            return;
        }
        match schema::find(line.name()) {
            Some(s) if s.options_only => {
                if let Some(cmd) = self.parse_ng_command(s, &line, true) {
                    self.model.ng.options.commands.push(cmd);
                }
            }
            Some(s) => self.diag.error(
                DiagnosticKind::Schema,
                &line.loc.file,
                line.loc.line,
                format!("{} is not allowed in [Options]", s.name),
            ),
            None => self.diag.warning(
                DiagnosticKind::Parse,
                &line.loc.file,
                line.loc.line,
                format!("unknown [Options] directive: {}", line.command),
            ),
        }
    }

    fn handle_plugin_directive(&mut self, line: RawLine) {
        if line.args.len() < 2 {
            self.diag.error(
                DiagnosticKind::Parse,
                &line.loc.file,
                line.loc.line,
                "Plugin= needs an id and a name",
            );
            return;
        }
        let Some(id) = self.eval_arg(&line, 0) else {
            return;
        };
        if !(1..=0xFFFF).contains(&id) {
            self.diag.error(
                DiagnosticKind::Range,
                &line.loc.file,
                line.loc.line,
                format!("plugin id {id} out of range"),
            );
            return;
        }
        let name = unquote(&line.args[1]).to_string();
        self.bind_plugin(&name, id as u16, &line.loc);
        if !self.symbols.has_plugin(&name) {
            // No descriptor was discovered; a bare shared library still
            // earns a synthetic constant-less table.
            if self.dir.join(format!("{name}.dll")).is_file() {
                self.symbols.add_plugin_table(PluginTable {
                    name: name.clone(),
                    constants: Default::default(),
                    has_descriptor: false,
                });
            } else {
                self.diag.warning(
                    DiagnosticKind::Resource,
                    &line.loc.file,
                    line.loc.line,
                    format!("no descriptor or library found for plugin \"{name}\""),
                );
            }
        }
        let schema = schema::find("Plugin").expect("Plugin schema");
        self.model.ng.options.commands.push(NgCommand {
            name: schema.name.to_string(),
            tag: schema.tag,
            args: vec![ArgValue::Word(id as u16)],
            loc: line.loc,
        });
    }

    fn handle_section_line(&mut self, line: RawLine) {
        let flag = match line.name().to_ascii_uppercase().as_str() {
            "YOUNGLARA" => Some(LVL_YOUNG_LARA),
            "WEATHER" => Some(LVL_WEATHER),
            "HORIZON" => Some(LVL_HORIZON),
            "LIGHTNING" => Some(LVL_LIGHTNING),
            "TRAIN" => Some(LVL_TRAIN),
            "PULSE" => Some(LVL_PULSE),
            "COLADDHORIZON" => Some(LVL_COLADDHORIZON),
            "TIMER" => Some(LVL_TIMER),
            "STARFIELD" => Some(LVL_STARFIELD),
            "REMOVEAMULET" => Some(LVL_REMOVE_AMULET),
            "NOLEVEL" => Some(LVL_NOLEVEL),
            _ => None,
        };
        if let Some(bit) = flag {
            let enabled = self.parse_enabled(&line);
            let section = self.current.as_mut().expect("open section");
            match enabled {
                Some(true) => section.flags |= bit,
                Some(false) => section.flags &= !bit,
                None => {}
            }
            return;
        }
        if line.is("Name") {
            let Some(arg) = line.args.first() else {
                self.diag.error(
                    DiagnosticKind::Parse,
                    &line.loc.file,
                    line.loc.line,
                    "Name= without a value",
                );
                return;
            };
            let name = unquote(arg).to_string();
            self.current.as_mut().expect("open section").name = Some(name);
            return;
        }
        if line.is("Level") {
            if line.args.len() < 2 {
                self.diag.error(
                    DiagnosticKind::Parse,
                    &line.loc.file,
                    line.loc.line,
                    "Level= needs a path and an audio track",
                );
                return;
            }
            let path = line.args[0].clone();
            let cd = self.eval_arg(&line, 1).unwrap_or(0);
            if !(0..=255).contains(&cd) {
                self.diag.error(
                    DiagnosticKind::Range,
                    &line.loc.file,
                    line.loc.line,
                    format!("audio track {cd} out of range"),
                );
                return;
            }
            let section = self.current.as_mut().expect("open section");
            section.path = Some(path);
            section.cd = cd as u8;
            return;
        }
        if !schema::is_classic_reserved(line.name()) {
            if let Some(s) = schema::find(line.name()) {
                if s.options_only {
                    self.diag.error(
                        DiagnosticKind::Schema,
                        &line.loc.file,
                        line.loc.line,
                        format!("{} is only allowed in [Options]", s.name),
                    );
                    return;
                }
                if let Some(cmd) = self.parse_ng_command(s, &line, false) {
                    self.current
                        .as_mut()
                        .expect("open section")
                        .ng
                        .commands
                        .push(cmd);
                }
                return;
            }
        }
        // Classic directive; encoding and validation happen in the
        // section compiler, which still has the source annotations.
        self.current.as_mut().expect("open section").lines.push(line);
    }

    // -- NG argument conversion -----------------------------------------

    /// Build an [`NgCommand`] from a directive line. Flag-setting commands
    /// return `None` after toggling their bit; conversion failures return
    /// `None` after recording a fatal diagnostic, so nothing is emitted.
    fn parse_ng_command(&mut self, s: &'static NgSchema, line: &RawLine, options: bool) -> Option<NgCommand> {
        if s.is_flag() {
            match self.parse_enabled(line) {
                Some(true) => {
                    if options {
                        self.model.ng.options.flags |= s.flag_bit;
                    } else {
                        self.current.as_mut().expect("open section").ng.flags |= s.flag_bit;
                    }
                }
                Some(false) => {
                    if options {
                        self.model.ng.options.flags &= !s.flag_bit;
                    } else {
                        self.current.as_mut().expect("open section").ng.flags &= !s.flag_bit;
                    }
                }
                None => {}
            }
            return None;
        }

        let has_array = s.args.last().is_some_and(|k| k.is_array());
        let fixed = if has_array { s.args.len() - 1 } else { s.args.len() };
        if line.args.len() < fixed || (!has_array && line.args.len() > fixed) {
            self.diag.error(
                DiagnosticKind::Schema,
                &line.loc.file,
                line.loc.line,
                format!(
                    "{} takes {}{} argument(s), got {}",
                    s.name,
                    fixed,
                    if has_array { "+" } else { "" },
                    line.args.len()
                ),
            );
            return None;
        }

        let mut args = Vec::with_capacity(s.args.len());
        for (i, kind) in s.args.iter().enumerate().take(fixed) {
            args.push(self.convert_arg(*kind, &line.args[i], line)?);
        }
        if has_array {
            let kind = *s.args.last().unwrap();
            args.push(self.convert_array(kind, &line.args[fixed..], line)?);
        }

        if s.name == "Settings" {
            if let Some(ArgValue::Word(w)) = args.first() {
                self.model.ng.settings = *w;
            }
        }
        if s.name == "ImportFile" {
            self.register_import(&args, line);
        }

        Some(NgCommand {
            name: s.name.to_string(),
            tag: s.tag,
            args,
            loc: line.loc.clone(),
        })
    }

    fn convert_arg(&mut self, kind: ArgKind, text: &str, line: &RawLine) -> Option<ArgValue> {
        match kind {
            ArgKind::Word => self.word_value(text, line).map(ArgValue::Word),
            ArgKind::Int => {
                let v = self.eval_text(text, line)?;
                if !(-32768..=32767).contains(&v) {
                    self.range_error(line, text, v);
                    return None;
                }
                Some(ArgValue::Int(v as i16))
            }
            ArgKind::Slot => {
                let v = self.eval_text(text, line)?;
                if v == -1 {
                    return Some(ArgValue::Slot(0xFFFF));
                }
                if !(0..=i64::from(ITEM_SLOT_MAX)).contains(&v) {
                    self.diag.error(
                        DiagnosticKind::Range,
                        &line.loc.file,
                        line.loc.line,
                        format!("slot {v} outside 0..={ITEM_SLOT_MAX}"),
                    );
                    return None;
                }
                Some(ArgValue::Slot(v as u16))
            }
            ArgKind::Long => self.long_value(text, line).map(ArgValue::Long),
            ArgKind::Str => {
                let index = self.string_index(unquote(text), line);
                Some(ArgValue::Str(index))
            }
            ArgKind::Import => Some(ArgValue::Import(file_number(unquote(text)))),
            ArgKind::Bool => {
                self.diag.error(
                    DiagnosticKind::Internal,
                    &line.loc.file,
                    line.loc.line,
                    "bool argument outside a flag command",
                );
                None
            }
            _ => {
                self.diag.error(
                    DiagnosticKind::Internal,
                    &line.loc.file,
                    line.loc.line,
                    "array kind in fixed position",
                );
                None
            }
        }
    }

    fn convert_array(&mut self, kind: ArgKind, rest: &[String], line: &RawLine) -> Option<ArgValue> {
        match kind {
            ArgKind::Array => {
                let mut words = Vec::with_capacity(rest.len());
                for a in rest {
                    words.push(self.word_value(a, line)?);
                }
                Some(ArgValue::Array(words))
            }
            ArgKind::ArrayByte => {
                let mut bytes = Vec::with_capacity(rest.len());
                for a in rest {
                    let v = self.eval_text(a, line)?;
                    if !(0..=255).contains(&v) {
                        self.range_error(line, a, v);
                        return None;
                    }
                    bytes.push(v as u8);
                }
                Some(ArgValue::ArrayByte(bytes))
            }
            ArgKind::ArrayNybble => {
                let mut nybbles = Vec::with_capacity(rest.len());
                for a in rest {
                    let v = self.eval_text(a, line)?;
                    if !(0..=15).contains(&v) {
                        self.range_error(line, a, v);
                        return None;
                    }
                    nybbles.push(v as u8);
                }
                Some(ArgValue::ArrayNybble(nybbles))
            }
            ArgKind::ArrayLong => {
                let mut longs = Vec::with_capacity(rest.len());
                for a in rest {
                    longs.push(self.long_value(a, line)?);
                }
                Some(ArgValue::ArrayLong(longs))
            }
            _ => None,
        }
    }

    fn word_value(&mut self, text: &str, line: &RawLine) -> Option<u16> {
        let v = self.eval_text(text, line)?;
        if v == -1 {
            return Some(0xFFFF);
        }
        if !(0..=0xFFFF).contains(&v) {
            self.range_error(line, text, v);
            return None;
        }
        Some(v as u16)
    }

    fn long_value(&mut self, text: &str, line: &RawLine) -> Option<NgLong> {
        match evaluate(text, &self.symbols, &line.loc.file) {
            Ok(out) => {
                if !(i64::from(i32::MIN)..=i64::from(u32::MAX)).contains(&out.value) {
                    self.range_error(line, text, out.value);
                    return None;
                }
                Some(NgLong {
                    value: out.value as i32,
                    plugin: out.plugin,
                })
            }
            Err(e) => {
                self.reference_error(line, &e.to_string());
                None
            }
        }
    }

    fn eval_text(&mut self, text: &str, line: &RawLine) -> Option<i64> {
        match evaluate(text, &self.symbols, &line.loc.file) {
            Ok(out) => Some(out.value),
            Err(e) => {
                self.reference_error(line, &e.to_string());
                None
            }
        }
    }

    /// Eagerly resolve a string-typed argument; before any language table
    /// is loaded this yields 0 with a warning.
    fn string_index(&mut self, text: &str, line: &RawLine) -> u16 {
        match resolve_string_ref(text, self.lang0.as_ref()) {
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

    fn register_import(&mut self, args: &[ArgValue], line: &RawLine) {
        let (Some(ArgValue::Word(id)), Some(ArgValue::Import(number))) =
            (args.first(), args.get(1))
        else {
            return;
        };
        let (mode, file_type) = match (args.get(2), args.get(3)) {
            (Some(ArgValue::Word(m)), Some(ArgValue::Word(t))) => (*m, *t),
            _ => (0, 0),
        };
        let name = unquote(&line.args[1]).to_string();
        let bytes = match find_file(&self.dir, &name).map(fs::read) {
            Some(Ok(bytes)) => bytes,
            _ => {
                self.diag.error(
                    DiagnosticKind::Resource,
                    &line.loc.file,
                    line.loc.line,
                    format!("import file not found: {name}"),
                );
                return;
            }
        };
        self.model.ng.imports.push(ImportEntry {
            id: *id,
            mode,
            file_type,
            number: *number,
            name,
            bytes,
        });
    }

    // -- shared helpers --------------------------------------------------

    fn parse_enabled(&mut self, line: &RawLine) -> Option<bool> {
        let text = line.args.first().map(String::as_str).unwrap_or("");
        if text.eq_ignore_ascii_case("ENABLED") {
            Some(true)
        } else if text.eq_ignore_ascii_case("DISABLED") {
            Some(false)
        } else {
            self.diag.warning(
                DiagnosticKind::Parse,
                &line.loc.file,
                line.loc.line,
                format!("{} expects ENABLED or DISABLED", line.command),
            );
            None
        }
    }

    fn eval_arg(&mut self, line: &RawLine, index: usize) -> Option<i64> {
        let Some(text) = line.args.get(index) else {
            self.diag.error(
                DiagnosticKind::Parse,
                &line.loc.file,
                line.loc.line,
                format!("{} missing argument {}", line.command, index + 1),
            );
            return None;
        };
        let text = text.clone();
        self.eval_text(&text, line)
    }

    fn range_error(&mut self, line: &RawLine, text: &str, value: i64) {
        self.diag.error(
            DiagnosticKind::Range,
            &line.loc.file,
            line.loc.line,
            format!("value {value} out of range for \"{text}\""),
        );
    }

    fn reference_error(&mut self, line: &RawLine, message: &str) {
        self.diag.error(
            DiagnosticKind::Reference,
            &line.loc.file,
            line.loc.line,
            message.to_string(),
        );
    }

    // -- finalization ----------------------------------------------------

    fn finish(mut self) -> ParsedProject {
        self.close_section();
        let mut languages = Vec::with_capacity(self.model.language_files.len());
        for (i, name) in self.model.language_files.clone().iter().enumerate() {
            if i == 0 {
                if let Some(table) = self.lang0.take() {
                    languages.push(table);
                    continue;
                }
            }
            match find_file(&self.dir, name).map(fs::read) {
                Some(Ok(bytes)) => {
                    languages.push(parse_language(&cp1252::decode(&bytes), name, self.diag));
                }
                _ => {
                    self.diag.error(
                        DiagnosticKind::Resource,
                        name,
                        0,
                        "language file not found",
                    );
                    languages.push(LanguageTable::default());
                }
            }
        }
        ParsedProject {
            model: self.model,
            symbols: self.symbols,
            languages,
        }
    }
}

/// Trailing digit run of a file's stem; 0 when there is none.
fn file_number(name: &str) -> u16 {
    let stem = Path::new(name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let digits: String = stem
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_digit())
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    digits.parse::<u32>().map(|v| v as u16).unwrap_or(0)
}
