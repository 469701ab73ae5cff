//! Ignore directives.
//!
//! The ignore file lists signature tags to skip, one `Ignore <tag>` per line.

use crate::store::SignatureStore;
use std::collections::HashSet;
use tracing::debug;

/// Tags whose signatures are skipped for an evaluation.
pub type IgnoreSet = HashSet<String>;

const DIRECTIVE: &str = "Ignore ";

/// Convert CRLF and lone CR line endings to LF.
pub fn normalize_line_endings(text: &str) -> String {
    if text.contains("\r\n") {
        text.replace('\r', "")
    } else {
        text.replace('\r', "\n")
    }
}

/// Parse `Ignore <tag>` directives.
pub fn parse_ignores(text: &str) -> IgnoreSet {
    normalize_line_endings(text)
        .split('\n')
        .filter_map(|line| line.strip_prefix(DIRECTIVE))
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect()
}

/// Read the ignore file from the vault. A missing file ignores nothing.
pub fn fetch_ignores(store: &SignatureStore, file: &str) -> IgnoreSet {
    let ignores = store
        .read_uncached(file)
        .map(|text| parse_ignores(&text))
        .unwrap_or_default();
    debug!(file = %file, tags = ignores.len(), "Ignore directives loaded");
    ignores
}
