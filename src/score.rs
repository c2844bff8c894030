use std::collections::BTreeSet;

use strsim::normalized_levenshtein;

/// Similarity strategy used by the fuzzy tier. `Simple` is a strict
/// full-sequence ratio; `Weighted` also credits word reordering and
/// partial/substring overlap.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Comparator {
    Simple,
    Weighted,
}

impl Comparator {
    /// Scores two strings into [0, 100]; 100 means identical after
    /// pre-processing.
    pub fn score(self, left: &str, right: &str) -> u32 {
        match self {
            Comparator::Simple => simple_ratio(left, right),
            Comparator::Weighted => weighted_ratio(left, right),
        }
    }
}

/// Lower-cases, maps non-alphanumerics to spaces, and collapses whitespace,
/// so the scoring itself absorbs case and punctuation noise.
fn full_process(raw: &str) -> String {
    let lowered = raw.to_lowercase();
    let cleaned: String = lowered
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn ratio(a: &str, b: &str) -> f64 {
    normalized_levenshtein(a, b)
}

fn as_score(value: f64) -> u32 {
    (value.clamp(0.0, 1.0) * 100.0).round() as u32
}

pub fn simple_ratio(left: &str, right: &str) -> u32 {
    let a = full_process(left);
    let b = full_process(right);
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    as_score(ratio(&a, &b))
}

/// Best full-sequence ratio of the shorter string against every
/// equal-length character window of the longer one.
fn partial_ratio(a: &str, b: &str) -> f64 {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let (short, long) = if a_chars.len() <= b_chars.len() {
        (&a_chars, &b_chars)
    } else {
        (&b_chars, &a_chars)
    };
    if short.is_empty() {
        return 0.0;
    }
    if short.len() == long.len() {
        return ratio(a, b);
    }

    let needle: String = short.iter().collect();
    let mut best = 0.0f64;
    for start in 0..=(long.len() - short.len()) {
        let window: String = long[start..start + short.len()].iter().collect();
        let score = ratio(&needle, &window);
        if score > best {
            best = score;
        }
        if best >= 1.0 {
            break;
        }
    }
    best
}

fn sorted_tokens(s: &str) -> String {
    let mut tokens: Vec<&str> = s.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

fn token_sort_ratio(a: &str, b: &str) -> f64 {
    ratio(&sorted_tokens(a), &sorted_tokens(b))
}

fn token_set_ratio(a: &str, b: &str) -> f64 {
    let set_a: BTreeSet<&str> = a.split_whitespace().collect();
    let set_b: BTreeSet<&str> = b.split_whitespace().collect();

    let intersection: Vec<&str> = set_a.intersection(&set_b).copied().collect();
    let diff_a: Vec<&str> = set_a.difference(&set_b).copied().collect();
    let diff_b: Vec<&str> = set_b.difference(&set_a).copied().collect();

    let base = intersection.join(" ");
    let combined_a = join_parts(&base, &diff_a.join(" "));
    let combined_b = join_parts(&base, &diff_b.join(" "));

    ratio(&base, &combined_a)
        .max(ratio(&base, &combined_b))
        .max(ratio(&combined_a, &combined_b))
}

fn join_parts(base: &str, rest: &str) -> String {
    if base.is_empty() {
        rest.to_string()
    } else if rest.is_empty() {
        base.to_string()
    } else {
        format!("{base} {rest}")
    }
}

pub fn weighted_ratio(left: &str, right: &str) -> u32 {
    let a = full_process(left);
    let b = full_process(right);
    if a.is_empty() || b.is_empty() {
        return 0;
    }

    let len_a = a.chars().count();
    let len_b = b.chars().count();
    let len_ratio = len_a.max(len_b) as f64 / len_a.min(len_b) as f64;

    let mut best = ratio(&a, &b);
    if len_ratio < 1.5 {
        best = best
            .max(token_sort_ratio(&a, &b) * 0.95)
            .max(token_set_ratio(&a, &b) * 0.95);
    } else {
        // Length disparity: favor substring-style evidence, discounted the
        // further apart the lengths are.
        let partial_scale = if len_ratio < 8.0 { 0.90 } else { 0.60 };
        best = best
            .max(partial_ratio(&a, &b) * partial_scale)
            .max(partial_ratio(&sorted_tokens(&a), &sorted_tokens(&b)) * 0.95 * partial_scale)
            .max(token_set_ratio(&a, &b) * 0.95 * partial_scale);
    }
    as_score(best)
}
