//! Comparison-mode classification.
//!
//! Two documents from the same company but of different filing types get a
//! consistency check; otherwise the pair is a diff analysis across companies
//! or across fiscal years. Company names are normalised before comparison
//! because filings write the same issuer many ways (株式会社ABC,
//! ＡＢＣ株式会社, ABC Co., Ltd., ...).

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::document::DocumentDescriptor;

/// How two (or more) documents should be compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonMode {
    /// Same company, different filing type: hunt for contradictions.
    ConsistencyCheck,
    /// Different companies, same filing type.
    DiffAnalysisCompany,
    /// Same company and filing type, different fiscal year.
    DiffAnalysisYear,
    /// Three or more documents.
    MultiDocument,
}

#[derive(Debug, Error)]
pub enum ModeError {
    #[error("comparison requires at least two documents, got {0}")]
    InsufficientDocuments(usize),
}

/// Legal-entity markers stripped from company names before comparison.
const ENTITY_MARKERS: &[&str] = &[
    "株式会社",
    "有限会社",
    "合同会社",
    "合資会社",
    "合名会社",
    "(株)",
    "㈱",
    "co., ltd.",
    "co.,ltd.",
    "co., ltd",
    "co ltd",
    "corporation",
    "company",
    "limited",
    "holdings",
    "inc.",
    "inc",
    "corp.",
    "corp",
    "ltd.",
    "ltd",
    "k.k.",
];

/// Fold full-width ASCII (Ａ-ｚ, ０-９, punctuation) to half-width.
fn fold_ascii_width(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '\u{ff01}'..='\u{ff5e}' => char::from_u32(c as u32 - 0xfee0).unwrap_or(c),
            '\u{3000}' => ' ',
            other => other,
        })
        .collect()
}

/// Drop bracketed segments: （...）, (...), 【...】, ［...］.
fn strip_brackets(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut depth = 0usize;
    for c in s.chars() {
        match c {
            '(' | '（' | '【' | '［' | '[' => depth += 1,
            ')' | '）' | '】' | '］' | ']' => depth = depth.saturating_sub(1),
            _ if depth == 0 => out.push(c),
            _ => {}
        }
    }
    out
}

/// Normalise a company name for equality/substring comparison.
///
/// Folds full-width ASCII, lowercases, drops bracketed text, strips
/// legal-entity markers, then removes punctuation and whitespace.
pub fn normalize_company_name(name: &str) -> String {
    let mut s = fold_ascii_width(name).to_lowercase();
    s = strip_brackets(&s);
    for marker in ENTITY_MARKERS {
        s = s.replace(marker, "");
    }
    s.chars()
        .filter(|c| c.is_alphanumeric())
        .collect()
}

/// Whether two descriptors name the same company after normalisation.
///
/// Substring containment counts as a match: "ABCホールディングス" still
/// refers to the issuer "ABC" names.
fn same_company(a: &DocumentDescriptor, b: &DocumentDescriptor) -> bool {
    let (Some(name_a), Some(name_b)) = (&a.company_name, &b.company_name) else {
        return false;
    };
    let na = normalize_company_name(name_a);
    let nb = normalize_company_name(name_b);
    if na.is_empty() || nb.is_empty() {
        return false;
    }
    na == nb || na.contains(&nb) || nb.contains(&na)
}

fn same_type(a: &DocumentDescriptor, b: &DocumentDescriptor) -> bool {
    matches!(
        (&a.document_type, &b.document_type),
        (Some(ta), Some(tb)) if ta == tb
    )
}

fn same_year(a: &DocumentDescriptor, b: &DocumentDescriptor) -> bool {
    matches!(
        (a.fiscal_year, b.fiscal_year),
        (Some(ya), Some(yb)) if ya == yb
    )
}

/// Select the comparison mode for a set of documents.
///
/// Fewer than two documents is an input error. Three or more selects
/// [`ComparisonMode::MultiDocument`] without any per-pair logic.
pub fn classify_mode(docs: &[DocumentDescriptor]) -> Result<ComparisonMode, ModeError> {
    if docs.len() < 2 {
        return Err(ModeError::InsufficientDocuments(docs.len()));
    }
    if docs.len() >= 3 {
        info!(count = docs.len(), "selected multi-document mode");
        return Ok(ComparisonMode::MultiDocument);
    }

    let (a, b) = (&docs[0], &docs[1]);
    let mode = if same_company(a, b) && !same_type(a, b) {
        ComparisonMode::ConsistencyCheck
    } else if !same_company(a, b) && same_type(a, b) {
        ComparisonMode::DiffAnalysisCompany
    } else if same_company(a, b) && same_type(a, b) && !same_year(a, b) {
        ComparisonMode::DiffAnalysisYear
    } else {
        ComparisonMode::DiffAnalysisCompany
    };

    info!(
        ?mode,
        doc1 = %a.document_id,
        doc2 = %b.document_id,
        "selected comparison mode"
    );
    Ok(mode)
}
