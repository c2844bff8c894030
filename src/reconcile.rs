use anyhow::Result;

use crate::common::{MessageKind, ProgressSink, fancy_message};
use crate::index::{SourceIndex, normalize_key};
use crate::score::Comparator;
use crate::workbook::{DestSheet, Payload};

pub const COLOR_LITERAL_MATCH: &str = "90EE90";
pub const COLOR_FUZZY_HIGH_SCORE: &str = "FCE883";
pub const COLOR_FUZZY_LOW_SCORE: &str = "FF91A4";

/// How a destination key is resolved against the source index.
///
/// `Exact` is a binary present-or-not lookup with an optional single
/// highlight color. `Fuzzy` falls back to a similarity scan over every
/// index key when the literal lookup misses.
pub enum MatchPolicy {
    Exact {
        fold_case: bool,
        highlight: Option<String>,
    },
    Fuzzy {
        threshold: u32,
        comparator: Comparator,
    },
}

impl MatchPolicy {
    /// Key folding must match the policy the index was built with.
    fn fold_case(&self) -> bool {
        matches!(
            self,
            MatchPolicy::Exact {
                fold_case: true,
                ..
            }
        )
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcileStats {
    pub rows_scanned: u32,
    pub literal_updates: u32,
    pub fuzzy_high_updates: u32,
    pub fuzzy_low_updates: u32,
    pub already_current: u32,
    pub unmatched: u32,
}

impl ReconcileStats {
    pub fn updates(&self) -> u32 {
        self.literal_updates + self.fuzzy_high_updates + self.fuzzy_low_updates
    }
}

fn tag_for_score(score: u32) -> &'static str {
    if score >= 99 {
        COLOR_FUZZY_HIGH_SCORE
    } else {
        COLOR_FUZZY_LOW_SCORE
    }
}

/// Scores `needle` against every index key and keeps the maximum. Ties are
/// broken toward the later key: the index iterates in source-row order, so
/// the winner is reproducible for a given source document.
fn find_best_match<'a>(
    needle: &str,
    index: &'a SourceIndex,
    comparator: Comparator,
) -> Option<(&'a str, u32)> {
    let mut best: Option<(&str, u32)> = None;
    for key in index.keys() {
        let score = comparator.score(needle, key);
        match best {
            Some((_, top)) if score < top => {}
            _ => best = Some((key, score)),
        }
    }
    best
}

/// Writes the payload only when the cell's current value differs, tagging
/// the cell on write. Re-running over an already-correct cell is a no-op
/// and does not re-tag.
fn write_if_changed(
    dest: &mut DestSheet,
    column: u32,
    row: u32,
    payload: &Payload,
    tag: Option<&str>,
) -> Result<bool> {
    if dest.value_at(column, row) == payload.render() {
        return Ok(false);
    }
    dest.write_value(column, row, payload)?;
    if let Some(rgb) = tag {
        dest.tag(column, row, rgb)?;
    }
    Ok(true)
}

/// Sweeps destination rows `min_row..=max_row`, resolving each row's match
/// key against the index per the policy and copying the payload into the
/// destination column.
pub fn reconcile(
    dest: &mut DestSheet,
    match_column: u32,
    dest_column: u32,
    min_row: u32,
    max_row: u32,
    index: &SourceIndex,
    policy: &MatchPolicy,
    progress: &mut dyn ProgressSink,
) -> Result<ReconcileStats> {
    let mut stats = ReconcileStats::default();

    for row in min_row..=max_row {
        progress.row_update(&fancy_message(
            MessageKind::General,
            &format!("Destination document: updating row {row}"),
        ));
        stats.rows_scanned += 1;

        let key = normalize_key(
            dest.raw_text(match_column, row).as_deref(),
            policy.fold_case(),
        );

        let literal = if key.is_empty() { None } else { index.get(&key) };
        if let Some(payload) = literal {
            let tag = match policy {
                MatchPolicy::Exact { highlight, .. } => highlight.as_deref(),
                MatchPolicy::Fuzzy { .. } => Some(COLOR_LITERAL_MATCH),
            };
            if write_if_changed(dest, dest_column, row, payload, tag)? {
                stats.literal_updates += 1;
            } else {
                stats.already_current += 1;
            }
            continue;
        }

        let MatchPolicy::Fuzzy {
            threshold,
            comparator,
        } = policy
        else {
            stats.unmatched += 1;
            continue;
        };

        let Some((best_key, score)) = find_best_match(&key, index, *comparator) else {
            stats.unmatched += 1;
            continue;
        };
        if score < *threshold {
            stats.unmatched += 1;
            continue;
        }
        let Some(payload) = index.get(best_key) else {
            stats.unmatched += 1;
            continue;
        };
        if write_if_changed(dest, dest_column, row, payload, Some(tag_for_score(score)))? {
            if score >= 99 {
                stats.fuzzy_high_updates += 1;
            } else {
                stats.fuzzy_low_updates += 1;
            }
        } else {
            stats.already_current += 1;
        }
    }

    Ok(stats)
}
