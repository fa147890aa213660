//! Numeric diff engine: value/unit extraction, unit normalisation, and
//! tolerance-based table comparison.
//!
//! # Japanese financial units
//!
//! Disclosure tables quote the same figure at different scales: 千円
//! (thousand yen), 百万円 (million yen), 十億円 (billion yen). Values are
//! normalised to 円 before comparison so that `1,234千円` and `1,234,500円`
//! differ by 500, not by 1,233,266.

use serde::{Deserialize, Serialize};

/// Default tolerance, in percent, below which two values are considered equal.
pub const DEFAULT_TOLERANCE_PCT: f64 = 0.01;

/// A significant numeric difference between two mapped table cells.
///
/// `value1`/`value2` and `difference` are in normalised units;
/// `unit1`/`unit2` preserve the original cell units.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NumericalDifference {
    pub section: String,
    pub item_name: String,
    pub value1: f64,
    pub value2: f64,
    /// `value2 - value1` in normalised units.
    pub difference: f64,
    /// Difference relative to `|value1|`, in percent.
    pub difference_pct: Option<f64>,
    pub unit1: Option<String>,
    pub unit2: Option<String>,
    pub normalized_unit: String,
    pub is_significant: bool,
}

/// Extract the first signed numeric token and the trailing unit from a cell.
///
/// Commas (half- and full-width) are removed first. Returns `None` when the
/// cell carries no numeric token.
pub fn extract_number_and_unit(text: &str) -> Option<(f64, Option<String>)> {
    let cleaned: String = text
        .trim()
        .chars()
        .filter(|c| *c != ',' && *c != '，')
        .collect();

    let bytes = cleaned.as_bytes();
    let mut start = None;
    for (i, b) in bytes.iter().enumerate() {
        if b.is_ascii_digit() {
            // Back up over an immediately preceding minus sign.
            start = if i > 0 && bytes[i - 1] == b'-' {
                Some(i - 1)
            } else {
                Some(i)
            };
            break;
        }
    }
    let start = start?;

    let mut end = start;
    if bytes[end] == b'-' {
        end += 1;
    }
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    // Optional fractional part.
    if end < bytes.len()
        && bytes[end] == b'.'
        && end + 1 < bytes.len()
        && bytes[end + 1].is_ascii_digit()
    {
        end += 1;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
    }

    let value: f64 = cleaned[start..end].parse().ok()?;
    let unit = cleaned[end..].trim();
    let unit = if unit.is_empty() {
        None
    } else {
        Some(unit.to_string())
    };
    Some((value, unit))
}

/// Normalise a value to 円 when the unit carries a known scale marker.
///
/// Unrecognised units pass through unchanged; a missing unit defaults to 円.
pub fn normalize_unit(value: f64, unit: Option<&str>) -> (f64, String) {
    let Some(unit) = unit else {
        return (value, "円".to_string());
    };
    let compact: String = unit
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();

    if compact.contains("十億") {
        (value * 1_000_000_000.0, "円".to_string())
    } else if compact.contains("百万") {
        (value * 1_000_000.0, "円".to_string())
    } else if compact.contains('千') {
        (value * 1_000.0, "円".to_string())
    } else {
        (value, unit.to_string())
    }
}

/// Whether two values agree within `tolerance_pct` percent.
///
/// Both zero is agreement; exactly one zero is not.
pub fn is_within_tolerance(v1: f64, v2: f64, tolerance_pct: f64) -> bool {
    if v1 == 0.0 && v2 == 0.0 {
        return true;
    }
    if v1 == 0.0 || v2 == 0.0 {
        return false;
    }
    let diff_pct = (v1 - v2).abs() / v1.abs().max(v2.abs()) * 100.0;
    diff_pct <= tolerance_pct
}

/// Compare two tables cell by cell, emitting only significant differences.
///
/// Rows and columns pair positionally up to the shorter dimension; column 0
/// is the row label. Cells without a numeric token are skipped.
pub fn compare_tables(
    section: &str,
    table1: &[Vec<String>],
    table2: &[Vec<String>],
    tolerance_pct: f64,
) -> Vec<NumericalDifference> {
    let mut differences = Vec::new();

    for (row_idx, (row1, row2)) in table1.iter().zip(table2).enumerate() {
        let item_name = row1
            .first()
            .filter(|label| !label.is_empty())
            .cloned()
            .unwrap_or_else(|| format!("row {}", row_idx + 1));

        let cols = row1.len().min(row2.len());
        for col_idx in 1..cols {
            let Some((raw1, unit1)) = extract_number_and_unit(&row1[col_idx]) else {
                continue;
            };
            let Some((raw2, unit2)) = extract_number_and_unit(&row2[col_idx]) else {
                continue;
            };

            let (value1, norm_unit) = normalize_unit(raw1, unit1.as_deref());
            let (value2, _) = normalize_unit(raw2, unit2.as_deref());

            if is_within_tolerance(value1, value2, tolerance_pct) {
                continue;
            }

            let difference = value2 - value1;
            let difference_pct = if value1 != 0.0 {
                Some(difference / value1.abs() * 100.0)
            } else {
                None
            };
            differences.push(NumericalDifference {
                section: section.to_string(),
                item_name: item_name.clone(),
                value1,
                value2,
                difference,
                difference_pct,
                unit1,
                unit2,
                normalized_unit: norm_unit,
                is_significant: true,
            });
        }
    }

    differences
}
