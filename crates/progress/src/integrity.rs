use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::PathBuf;

use sha2::{Digest, Sha256};

use crate::layout::{ActivatableDef, SourceLocation};

const GENERATED_SUFFIX_HEX_LEN: usize = 8;

/// Where a def lives, for reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefRef {
    pub label: String,
    pub file_path: PathBuf,
    pub index_in_file: usize,
    pub location: Option<SourceLocation>,
}

impl DefRef {
    fn from_def(def: &ActivatableDef) -> Self {
        Self {
            label: def.config.label.clone(),
            file_path: def.file_path.clone(),
            index_in_file: def.index_in_file,
            location: def.location,
        }
    }
}

impl fmt::Display for DefRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.location {
            Some(loc) => write!(
                f,
                "'{}' ({}:{}:{})",
                self.label,
                self.file_path.display(),
                loc.line,
                loc.column
            ),
            None => write!(
                f,
                "'{}' ({} #{})",
                self.label,
                self.file_path.display(),
                self.index_in_file
            ),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntegrityReport {
    pub total: usize,
    pub missing_ids: Vec<DefRef>,
    pub duplicate_ids: BTreeMap<String, Vec<DefRef>>,
}

impl IntegrityReport {
    pub fn is_clean(&self) -> bool {
        self.missing_ids.is_empty() && self.duplicate_ids.is_empty()
    }

    pub fn render_human_readable(&self) -> String {
        let mut lines = vec![format!("activatable defs scanned: {}", self.total)];
        if self.is_clean() {
            lines.push("all identifiers present and unique".to_string());
            return lines.join("\n");
        }
        if !self.missing_ids.is_empty() {
            lines.push(format!("missing id ({}):", self.missing_ids.len()));
            for def in &self.missing_ids {
                lines.push(format!("  - {def}"));
            }
        }
        if !self.duplicate_ids.is_empty() {
            lines.push(format!("duplicate ids ({}):", self.duplicate_ids.len()));
            for (id, defs) in &self.duplicate_ids {
                lines.push(format!("  - {id} used {} times", defs.len()));
                for def in defs {
                    lines.push(format!("      {def}"));
                }
            }
        }
        lines.join("\n")
    }
}

/// Finds defs without an identifier and identifiers shared by several defs.
///
/// The runtime never checks this itself; run it before trusting save files.
pub fn audit(defs: &[ActivatableDef]) -> IntegrityReport {
    let mut missing_ids = Vec::new();
    let mut by_id = BTreeMap::<String, Vec<DefRef>>::new();
    for def in defs {
        let id = def.config.id.trim();
        if id.is_empty() {
            missing_ids.push(DefRef::from_def(def));
        } else {
            by_id
                .entry(id.to_string())
                .or_default()
                .push(DefRef::from_def(def));
        }
    }
    by_id.retain(|_, refs| refs.len() > 1);

    IntegrityReport {
        total: defs.len(),
        missing_ids,
        duplicate_ids: by_id,
    }
}

/// Derives `<label_slug>_<8 hex>` from the label and a counter, retrying until
/// the result is not in `existing`.
pub fn generate_unique_id(label: &str, existing: &HashSet<String>) -> String {
    let slug = slugify(label);
    let mut attempt = 0u64;
    loop {
        let mut hasher = Sha256::new();
        hasher.update(label.as_bytes());
        hasher.update([0u8]);
        hasher.update(attempt.to_le_bytes());
        let digest = hasher.finalize();
        let suffix = to_hex_lower(&digest);
        let candidate = format!("{slug}_{}", &suffix[..GENERATED_SUFFIX_HEX_LEN]);
        if !existing.contains(&candidate) {
            return candidate;
        }
        attempt = attempt.wrapping_add(1);
    }
}

fn slugify(label: &str) -> String {
    let mut slug = String::with_capacity(label.len());
    let mut last_was_sep = true;
    for ch in label.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
            last_was_sep = false;
        } else if !last_was_sep {
            slug.push('_');
            last_was_sep = true;
        }
    }
    while slug.ends_with('_') {
        slug.pop();
    }
    if slug.is_empty() {
        "entity".to_string()
    } else {
        slug
    }
}

fn to_hex_lower(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(HEX[(byte >> 4) as usize] as char);
        out.push(HEX[(byte & 0x0f) as usize] as char);
    }
    out
}
