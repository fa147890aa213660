//! Text diff engine: LCS match ratio plus added/removed/changed spans.
//!
//! Inputs are capped at 5,000 characters before diffing; the match ratio and
//! spans describe the compared prefixes, not the full texts.

use serde::{Deserialize, Serialize};
use similar::{DiffOp, TextDiff};
use tracing::debug;

/// Characters of each input considered by the diff.
const DIFF_PREFIX_CHARS: usize = 5_000;

/// Spans reported per category, at most.
const MAX_SPANS: usize = 10;

/// Character-level diff between the texts of one mapped section pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextDifference {
    pub section: String,
    /// LCS similarity of the compared prefixes, 0.0 to 1.0.
    pub match_ratio: f64,
    pub added_text: Vec<String>,
    pub removed_text: Vec<String>,
    /// `(before, after)` pairs for replaced spans.
    pub changed_text: Vec<(String, String)>,
}

impl TextDifference {
    pub fn has_changes(&self) -> bool {
        !self.added_text.is_empty()
            || !self.removed_text.is_empty()
            || !self.changed_text.is_empty()
    }
}

fn char_prefix(text: &str) -> String {
    text.chars().take(DIFF_PREFIX_CHARS).collect()
}

/// Diff two section texts character by character.
///
/// Insertions land in `added_text`, deletions in `removed_text`, and
/// replacements in `changed_text` as before/after pairs; each list is capped
/// at ten spans.
pub fn diff_texts(section: &str, text1: &str, text2: &str) -> TextDifference {
    let prefix1 = char_prefix(text1);
    let prefix2 = char_prefix(text2);

    let chars1: Vec<char> = prefix1.chars().collect();
    let chars2: Vec<char> = prefix2.chars().collect();
    let diff = TextDiff::from_chars(prefix1.as_str(), prefix2.as_str());

    let slice = |chars: &[char], range: std::ops::Range<usize>| -> String {
        chars[range].iter().collect()
    };

    let mut added_text = Vec::new();
    let mut removed_text = Vec::new();
    let mut changed_text = Vec::new();

    for op in diff.ops() {
        match op {
            DiffOp::Insert { .. } if added_text.len() < MAX_SPANS => {
                added_text.push(slice(&chars2, op.new_range()));
            }
            DiffOp::Delete { .. } if removed_text.len() < MAX_SPANS => {
                removed_text.push(slice(&chars1, op.old_range()));
            }
            DiffOp::Replace { .. } if changed_text.len() < MAX_SPANS => {
                changed_text.push((slice(&chars1, op.old_range()), slice(&chars2, op.new_range())));
            }
            _ => {}
        }
    }

    let match_ratio = f64::from(diff.ratio());
    debug!(
        section,
        match_ratio,
        added = added_text.len(),
        removed = removed_text.len(),
        changed = changed_text.len(),
        "text diff computed"
    );

    TextDifference {
        section: section.to_string(),
        match_ratio,
        added_text,
        removed_text,
        changed_text,
    }
}
