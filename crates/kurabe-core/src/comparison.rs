//! Comparison output model: section mappings, per-section analysis records,
//! and the assembled result.
//!
//! Field names follow the response schema consumed downstream
//! (`doc1_info`, `doc1_section`, `section_detailed_comparisons`, ...), so a
//! serialised [`ComparisonResult`] is a drop-in result document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::document::DocumentDescriptor;
use crate::mode::ComparisonMode;
use crate::numeric::NumericalDifference;
use crate::textdiff::TextDifference;

/// Backend tone assessment; shape varies by comparison mode, kept loose.
pub type ToneAnalysis = Value;

/// How a section pair was aligned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingMethod {
    /// Same section name in both documents.
    Exact,
    /// Embedding nearest-neighbour match across differing structures.
    Semantic,
}

/// One aligned section pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionMapping {
    pub doc1_section: String,
    pub doc2_section: String,
    pub confidence_score: f64,
    pub mapping_method: MappingMethod,
}

/// Analyst-facing importance of a per-section difference.
///
/// Ordered so that `max` escalates: `Low < Medium < High`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Importance {
    Low,
    #[default]
    Medium,
    High,
}

/// A before/after pair for a modified passage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModifiedSpan {
    pub before: String,
    pub after: String,
}

/// One aspect where two companies disclose differently.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApproachDifference {
    pub aspect: String,
    pub company1_approach: String,
    pub company2_approach: String,
}

/// Mode-dependent shape of the narrative text-change analysis.
///
/// Untagged: the payload's own keys select the variant. `Consistency` fields
/// all default, so it must stay last or it would shadow the others.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TextChanges {
    /// Year-over-year (and same-type) comparison.
    Temporal {
        added: Vec<String>,
        removed: Vec<String>,
        modified: Vec<ModifiedSpan>,
    },
    /// Company-vs-company comparison.
    Company {
        only_in_company1: Vec<String>,
        only_in_company2: Vec<String>,
        different_approaches: Vec<ApproachDifference>,
    },
    /// Cross-type consistency check for one company.
    Consistency {
        #[serde(default)]
        contradictions: Vec<String>,
        #[serde(default)]
        normal_differences: Vec<String>,
        #[serde(default)]
        complementary_info: Vec<String>,
        #[serde(default)]
        consistency_score: Option<f64>,
    },
}

impl TextChanges {
    /// The empty shape appropriate for a comparison mode.
    pub fn empty_for(mode: ComparisonMode) -> Self {
        match mode {
            ComparisonMode::ConsistencyCheck => TextChanges::Consistency {
                contradictions: Vec::new(),
                normal_differences: Vec::new(),
                complementary_info: Vec::new(),
                consistency_score: None,
            },
            ComparisonMode::DiffAnalysisCompany => TextChanges::Company {
                only_in_company1: Vec::new(),
                only_in_company2: Vec::new(),
                different_approaches: Vec::new(),
            },
            ComparisonMode::DiffAnalysisYear | ComparisonMode::MultiDocument => {
                TextChanges::Temporal {
                    added: Vec::new(),
                    removed: Vec::new(),
                    modified: Vec::new(),
                }
            }
        }
    }

    /// Contradictions found by a consistency check, if any.
    pub fn contradictions(&self) -> &[String] {
        match self {
            TextChanges::Consistency { contradictions, .. } => contradictions,
            _ => &[],
        }
    }
}

/// A related section surfaced by one iterative-search round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoundSection {
    pub doc1_section: String,
    pub doc2_section: String,
    pub similarity: f64,
}

/// Outcome of re-analysing a section with additional context.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecondaryAnalysis {
    #[serde(default)]
    pub new_findings: Vec<String>,
    #[serde(default)]
    pub resolved_contradictions: Vec<String>,
    #[serde(default)]
    pub additional_contradictions: Vec<String>,
    #[serde(default)]
    pub enhanced_understanding: Option<String>,
    #[serde(default)]
    pub importance_update: Option<Importance>,
}

/// One completed iterative-search round for a section record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdditionalSearchResult {
    pub iteration: u32,
    pub search_keywords: Vec<String>,
    pub found_sections: Vec<FoundSection>,
    #[serde(default)]
    pub analysis: SecondaryAnalysis,
}

/// Detailed analysis of one mapped section pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionDetailedComparison {
    pub section_name: String,
    pub doc1_page_range: String,
    pub doc2_page_range: String,
    pub text_changes: TextChanges,
    #[serde(default)]
    pub numerical_changes: Vec<Value>,
    #[serde(default)]
    pub tone_analysis: ToneAnalysis,
    pub importance: Importance,
    pub importance_reason: String,
    pub summary: String,
    pub doc1_section_name: String,
    pub doc2_section_name: String,
    pub mapping_confidence: f64,
    pub mapping_method: MappingMethod,
    #[serde(default)]
    pub additional_searches: Vec<AdditionalSearchResult>,
    #[serde(default)]
    pub has_additional_context: bool,
}

/// The assembled comparison, serialised as one JSON document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub comparison_id: String,
    pub mode: ComparisonMode,
    pub doc1_info: DocumentDescriptor,
    pub doc2_info: DocumentDescriptor,
    #[serde(default)]
    pub section_mappings: Vec<SectionMapping>,
    #[serde(default)]
    pub numerical_differences: Vec<NumericalDifference>,
    #[serde(default)]
    pub text_differences: Vec<TextDifference>,
    #[serde(default)]
    pub section_detailed_comparisons: Vec<SectionDetailedComparison>,
    pub priority: Importance,
    pub created_at: DateTime<Utc>,
}

impl ComparisonResult {
    /// Highest importance across section records, floored at `Medium`.
    pub fn derive_priority(records: &[SectionDetailedComparison]) -> Importance {
        records
            .iter()
            .map(|r| r.importance)
            .max()
            .unwrap_or_default()
            .max(Importance::Medium)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn importance_ordering_escalates() {
        assert!(Importance::Low < Importance::Medium);
        assert!(Importance::Medium < Importance::High);
        assert_eq!(
            [Importance::Low, Importance::High, Importance::Medium]
                .into_iter()
                .max(),
            Some(Importance::High)
        );
    }

    #[test]
    fn importance_serializes_lowercase() {
        assert_eq!(serde_json::to_value(Importance::High).unwrap(), json!("high"));
        assert_eq!(
            serde_json::from_value::<Importance>(json!("medium")).unwrap(),
            Importance::Medium
        );
    }

    #[test]
    fn text_changes_variants_deserialize_by_shape() {
        let temporal: TextChanges = serde_json::from_value(json!({
            "added": ["a"],
            "removed": [],
            "modified": [{"before": "x", "after": "y"}],
        }))
        .unwrap();
        assert!(matches!(temporal, TextChanges::Temporal { .. }));

        let company: TextChanges = serde_json::from_value(json!({
            "only_in_company1": ["a"],
            "only_in_company2": [],
            "different_approaches": [],
        }))
        .unwrap();
        assert!(matches!(company, TextChanges::Company { .. }));

        let consistency: TextChanges = serde_json::from_value(json!({
            "contradictions": ["c"],
            "consistency_score": 0.8,
        }))
        .unwrap();
        assert_eq!(consistency.contradictions(), ["c".to_string()]);
    }

    #[test]
    fn empty_shapes_follow_mode() {
        assert!(matches!(
            TextChanges::empty_for(ComparisonMode::ConsistencyCheck),
            TextChanges::Consistency { .. }
        ));
        assert!(matches!(
            TextChanges::empty_for(ComparisonMode::DiffAnalysisCompany),
            TextChanges::Company { .. }
        ));
        assert!(matches!(
            TextChanges::empty_for(ComparisonMode::DiffAnalysisYear),
            TextChanges::Temporal { .. }
        ));
        assert!(
            TextChanges::empty_for(ComparisonMode::ConsistencyCheck)
                .contradictions()
                .is_empty()
        );
    }

    #[test]
    fn priority_is_max_importance_floored_at_medium() {
        fn record(importance: Importance) -> SectionDetailedComparison {
            SectionDetailedComparison {
                section_name: "s".to_string(),
                doc1_page_range: "1-2".to_string(),
                doc2_page_range: "1-2".to_string(),
                text_changes: TextChanges::empty_for(ComparisonMode::DiffAnalysisYear),
                numerical_changes: Vec::new(),
                tone_analysis: Value::Null,
                importance,
                importance_reason: String::new(),
                summary: String::new(),
                doc1_section_name: "s".to_string(),
                doc2_section_name: "s".to_string(),
                mapping_confidence: 1.0,
                mapping_method: MappingMethod::Exact,
                additional_searches: Vec::new(),
                has_additional_context: false,
            }
        }

        assert_eq!(
            ComparisonResult::derive_priority(&[record(Importance::Low)]),
            Importance::Medium
        );
        assert_eq!(
            ComparisonResult::derive_priority(&[
                record(Importance::Low),
                record(Importance::High)
            ]),
            Importance::High
        );
        assert_eq!(ComparisonResult::derive_priority(&[]), Importance::Medium);
    }

    #[test]
    fn additional_search_round_trips() {
        let round = AdditionalSearchResult {
            iteration: 1,
            search_keywords: vec!["減損".to_string()],
            found_sections: vec![FoundSection {
                doc1_section: "固定資産".to_string(),
                doc2_section: "固定資産の状況".to_string(),
                similarity: 0.85,
            }],
            analysis: SecondaryAnalysis {
                new_findings: vec!["f".to_string()],
                importance_update: Some(Importance::High),
                ..Default::default()
            },
        };
        let v = serde_json::to_value(&round).unwrap();
        assert_eq!(v["search_keywords"][0], "減損");
        assert_eq!(v["found_sections"][0]["similarity"], 0.85);
        let back: AdditionalSearchResult = serde_json::from_value(v).unwrap();
        assert_eq!(back.analysis.importance_update, Some(Importance::High));
    }
}
