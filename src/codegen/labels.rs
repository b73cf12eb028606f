//! Assembly label generation, sanitization, and collision resolution
//! (spec.md §4.6).

use rustc_hash::FxHashMap;

/// The kind of thing a label names, which determines its prefix and
/// whether it carries a function context.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum LabelCategory {
    Function,
    Global,
    Local,
    Temp,
    Block,
    Data,
}

/// A single allocated label: its assembly text plus bookkeeping used by
/// debug-symbol export and the source mapper.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LabelEntry {
    pub label: String,
    pub category: LabelCategory,
    pub original_name: String,
    pub address: Option<u16>,
    pub source_file: Option<String>,
    pub source_line: Option<u32>,
}

/// Allocates and tracks every assembly label codegen emits.
#[derive(Default)]
pub struct LabelGenerator {
    entries: Vec<LabelEntry>,
    by_label: FxHashMap<String, usize>,
    by_name: FxHashMap<(LabelCategory, String), Vec<usize>>,
    seen_labels: FxHashMap<String, u32>,
    temp_counter: u32,
    current_function: Option<String>,
}

impl LabelGenerator {
    pub fn new() -> Self {
        LabelGenerator::default()
    }

    /// Reset all counters and entries (spec.md §4.11, re-entrancy).
    pub fn reset(&mut self) {
        *self = LabelGenerator::default();
    }

    pub fn set_current_function(&mut self, label: impl Into<String>) {
        self.current_function = Some(label.into());
    }

    /// Sanitize `name`: replace every character outside `[A-Za-z0-9_]` with
    /// `_`; prefix a leading digit with `_`; empty becomes `_empty`.
    pub fn sanitize(name: &str) -> String {
        if name.is_empty() {
            return "_empty".to_string();
        }
        let mut out: String = name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
            .collect();
        if out.chars().next().map(|c| c.is_ascii_digit()).unwrap_or(false) {
            out.insert(0, '_');
        }
        out
    }

    fn resolve_collision(&mut self, candidate: String) -> String {
        let count = self.seen_labels.entry(candidate.clone()).or_insert(0);
        let label = if *count == 0 {
            candidate.clone()
        } else {
            format!("{candidate}_{count}")
        };
        *count += 1;
        label
    }

    fn insert(&mut self, label: String, category: LabelCategory, original_name: String) -> String {
        let idx = self.entries.len();
        self.entries.push(LabelEntry {
            label: label.clone(),
            category,
            original_name: original_name.clone(),
            address: None,
            source_file: None,
            source_line: None,
        });
        self.by_label.insert(label.clone(), idx);
        self.by_name
            .entry((category, original_name))
            .or_default()
            .push(idx);
        label
    }

    /// `_<sanitized-name>`, used for functions, globals, and data.
    pub fn make_named(&mut self, category: LabelCategory, name: &str) -> String {
        let sanitized = Self::sanitize(name);
        let candidate = format!("_{sanitized}");
        let label = self.resolve_collision(candidate);
        self.insert(label.clone(), category, name.to_string());
        label
    }

    /// `.<sanitized-name>`, used for function-local labels.
    pub fn make_local(&mut self, name: &str) -> String {
        let sanitized = Self::sanitize(name);
        let candidate = format!(".{sanitized}");
        let label = self.resolve_collision(candidate);
        self.insert(label.clone(), LabelCategory::Local, name.to_string());
        label
    }

    /// `.L_NNNN`, or `.{prefix}_NNNN` with a user-supplied prefix.
    pub fn make_temp(&mut self, prefix: Option<&str>) -> String {
        let n = self.temp_counter;
        self.temp_counter += 1;
        let name = match prefix {
            Some(p) => format!(".{}_{:04}", Self::sanitize(p), n),
            None => format!(".L_{n:04}"),
        };
        self.insert(name.clone(), LabelCategory::Temp, name.clone());
        name
    }

    /// `.block_<sanitized-name>`, or `.block_NNNN` for an anonymous block.
    pub fn make_block(&mut self, name: Option<&str>, block_id: u32) -> String {
        let candidate = match name {
            Some(n) if !n.is_empty() => format!(".block_{}", Self::sanitize(n)),
            _ => format!(".block_{block_id:04}"),
        };
        let label = self.resolve_collision(candidate);
        self.insert(
            label.clone(),
            LabelCategory::Block,
            name.unwrap_or_default().to_string(),
        );
        label
    }

    pub fn lookup_by_label(&self, label: &str) -> Option<&LabelEntry> {
        self.by_label.get(label).map(|&i| &self.entries[i])
    }

    pub fn lookup_by_name(&self, category: Option<LabelCategory>, name: &str) -> Vec<&LabelEntry> {
        match category {
            Some(cat) => self
                .by_name
                .get(&(cat, name.to_string()))
                .map(|idxs| idxs.iter().map(|&i| &self.entries[i]).collect())
                .unwrap_or_default(),
            None => self
                .entries
                .iter()
                .filter(|e| e.original_name == name)
                .collect(),
        }
    }

    pub fn all(&self) -> &[LabelEntry] {
        &self.entries
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn by_category(&self, category: LabelCategory) -> Vec<&LabelEntry> {
        self.entries.iter().filter(|e| e.category == category).collect()
    }

    pub fn update_address(&mut self, label: &str, address: u16) {
        if let Some(&idx) = self.by_label.get(label) {
            self.entries[idx].address = Some(address);
        }
    }

    pub fn update_source(&mut self, label: &str, file: impl Into<String>, line: u32) {
        if let Some(&idx) = self.by_label.get(label) {
            self.entries[idx].source_file = Some(file.into());
            self.entries[idx].source_line = Some(line);
        }
    }

    /// VICE `.lbl` symbol file content: `al C:<4-hex-addr> .<label>`, sorted
    /// ascending by address, omitting labels without a known address
    /// (spec.md §4.6).
    pub fn export_vice_symbols(&self) -> String {
        let mut addressed: Vec<&LabelEntry> =
            self.entries.iter().filter(|e| e.address.is_some()).collect();
        addressed.sort_by_key(|e| e.address.unwrap());
        let mut out = String::new();
        for e in addressed {
            let addr = e.address.unwrap();
            let dotted = format!(".{}", e.label);
            out.push_str(&format!("al C:{addr:04X} {dotted}\n"));
        }
        out
    }
}
