//! Identifier normalization
//!
//! Turns spreadsheet headers and file names into lower-case ASCII
//! identifiers that are safe to use (quoted or not) in both SQL dialects.

use std::collections::HashSet;
use std::path::Path;

use unicode_normalization::UnicodeNormalization;

/// Identifier used when normalization leaves nothing behind
pub const FALLBACK_IDENTIFIER: &str = "coluna";

/// Column name of the surrogate primary key every target table carries
pub const SURROGATE_KEY: &str = "id";

const SEPARATORS: [char; 15] = [
    ' ', '-', '.', ',', ';', '/', '\\', ':', '?', '!', '%', '(', ')', '[', ']',
];

/// Normalize arbitrary text into a canonical identifier
///
/// ```
/// use sheetload_ingest::normalize::normalize_identifier;
///
/// assert_eq!(normalize_identifier("  Preço Unitário (R$) "), "preco_unitario_r");
/// assert_eq!(normalize_identifier("???"), "coluna");
/// ```
pub fn normalize_identifier(text: &str) -> String {
    let lowered = text.trim().to_lowercase();

    let mut out = String::with_capacity(lowered.len());
    for ch in lowered.nfkd().filter(char::is_ascii) {
        let ch = if SEPARATORS.contains(&ch) { '_' } else { ch };
        if !(ch.is_ascii_alphanumeric() || ch == '_') {
            continue;
        }
        // collapse runs of underscores as we go
        if ch == '_' && out.ends_with('_') {
            continue;
        }
        out.push(ch.to_ascii_lowercase());
    }

    let trimmed = out.trim_matches('_');
    if trimmed.is_empty() {
        FALLBACK_IDENTIFIER.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Table name for a spreadsheet: the normalized file stem
pub fn table_name_from_path(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    normalize_identifier(&stem)
}

/// Normalize a header row, resolving collisions with `_2`, `_3`, ...
///
/// The surrogate key name is treated as taken, so a source column called
/// `ID` becomes `id_2`.
pub fn unique_identifiers<I, S>(headers: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut used: HashSet<String> = HashSet::from([SURROGATE_KEY.to_string()]);
    let mut names = Vec::new();

    for header in headers {
        let base = normalize_identifier(header.as_ref());
        let mut name = base.clone();
        let mut suffix = 2;
        while used.contains(&name) {
            name = format!("{}_{}", base, suffix);
            suffix += 1;
        }
        used.insert(name.clone());
        names.push(name);
    }

    names
}
