use indexmap::IndexMap;

use crate::common::{MessageKind, ProgressSink, fancy_message};
use crate::workbook::{Payload, SourceSheet};

/// Normalizes a match key. A missing cell becomes the literal token "None"
/// so it still participates in equality comparisons predictably; the text
/// is trimmed and, when `fold_case` is set, lower-cased.
pub fn normalize_key(raw: Option<&str>, fold_case: bool) -> String {
    let text = raw.unwrap_or("None");
    let trimmed = text.trim();
    if fold_case {
        trimmed.to_lowercase()
    } else {
        trimmed.to_string()
    }
}

/// Match key -> payload mapping built from the source document. Keys keep
/// their insertion order, so fuzzy scans iterate candidates in source-row
/// order and the last-wins tie-break stays reproducible.
#[derive(Debug, Default)]
pub struct SourceIndex {
    entries: IndexMap<String, Payload>,
}

impl SourceIndex {
    pub fn new() -> Self {
        SourceIndex {
            entries: IndexMap::new(),
        }
    }

    /// Later inserts overwrite the payload for an existing key while keeping
    /// the key's original position. Duplicate keys are accepted ambiguity:
    /// the highest source row wins.
    pub fn insert(&mut self, key: String, payload: Payload) {
        self.entries.insert(key, payload);
    }

    pub fn get(&self, key: &str) -> Option<&Payload> {
        self.entries.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

/// Scans `min_row..=max_row` of the source document and maps each
/// normalized match-column key to the verbatim data-column payload of the
/// same row. An inverted range yields an empty index.
pub fn build_index(
    source: &SourceSheet,
    match_column: u32,
    data_column: u32,
    min_row: u32,
    max_row: u32,
    fold_case: bool,
    progress: &mut dyn ProgressSink,
) -> SourceIndex {
    let mut index = SourceIndex::new();
    for row in min_row..=max_row {
        progress.row_update(&fancy_message(
            MessageKind::General,
            &format!("Source document: reading row {row}"),
        ));
        let key = normalize_key(source.raw_text(match_column, row).as_deref(), fold_case);
        index.insert(key, source.payload(data_column, row));
    }
    index
}
