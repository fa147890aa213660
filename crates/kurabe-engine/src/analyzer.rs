//! Per-section analysis with bounded iterative-search refinement.
//!
//! Each mapped section pair goes through: resolve inputs → initial backend
//! analysis → contradiction floor → search gate → at most
//! `max_search_iterations` sequential search rounds → reassessment → one
//! immutable [`SectionDetailedComparison`]. Transport failures yield no
//! record; unparseable analysis output yields a low-importance placeholder.

use std::collections::HashSet;

use kurabe_ai::{AiError, ChatBackend, EmbeddingBackend, similarity};
use kurabe_core::ComparisonMode;
use kurabe_core::comparison::{
    AdditionalSearchResult, FoundSection, Importance, ModifiedSpan, SecondaryAnalysis,
    SectionDetailedComparison, SectionMapping, TextChanges,
};
use kurabe_core::document::{
    DocumentDescriptor, SectionInfo, StructuredDocument, section_digest, summarize_tables,
};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::{EngineConfig, SearchMode};
use crate::prompts::{self, SectionPromptInput};

/// Related sections pulled in per search round, at most.
const SEARCH_TOP_K: usize = 3;

/// Characters of each found section quoted as secondary-analysis context.
const CONTEXT_EXCERPT_CHARS: usize = 500;

/// Everything a worker needs to analyse one mapping. Shared immutably
/// across the worker pool.
pub struct SectionAnalyzer<'a, C, E> {
    pub chat: &'a C,
    pub embedder: &'a E,
    pub mode: ComparisonMode,
    pub doc1_info: &'a DocumentDescriptor,
    pub doc2_info: &'a DocumentDescriptor,
    pub doc1: &'a StructuredDocument,
    pub doc2: &'a StructuredDocument,
    pub mappings: &'a [SectionMapping],
    pub config: &'a EngineConfig,
}

/// The backend's request for more context, parsed from the initial reply.
#[derive(Debug, Default)]
struct SearchDecision {
    needed: bool,
    search_phrases: Vec<String>,
}

/// Phase-one output, before refinement and finalisation.
struct InitialAnalysis {
    text_changes: TextChanges,
    numerical_changes: Vec<Value>,
    tone_analysis: Value,
    importance: Importance,
    importance_reason: String,
    summary: String,
    search: SearchDecision,
}

fn string_list(v: &Value) -> Vec<String> {
    v.as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

fn parse_importance(v: &Value) -> Option<Importance> {
    serde_json::from_value(v.clone()).ok()
}

/// Build the mode's `TextChanges` shape from a loose payload. Missing or
/// mistyped fields fall back to empty, never to another mode's shape.
fn parse_text_changes(mode: ComparisonMode, v: &Value) -> TextChanges {
    match mode {
        ComparisonMode::DiffAnalysisYear | ComparisonMode::MultiDocument => TextChanges::Temporal {
            added: string_list(&v["added"]),
            removed: string_list(&v["removed"]),
            modified: serde_json::from_value::<Vec<ModifiedSpan>>(v["modified"].clone())
                .unwrap_or_default(),
        },
        ComparisonMode::DiffAnalysisCompany => TextChanges::Company {
            only_in_company1: string_list(&v["only_in_company1"]),
            only_in_company2: string_list(&v["only_in_company2"]),
            different_approaches: serde_json::from_value(v["different_approaches"].clone())
                .unwrap_or_default(),
        },
        ComparisonMode::ConsistencyCheck => TextChanges::Consistency {
            contradictions: string_list(&v["contradictions"]),
            normal_differences: string_list(&v["normal_differences"]),
            complementary_info: string_list(&v["complementary_info"]),
            consistency_score: v["consistency_score"].as_f64(),
        },
    }
}

fn parse_initial(mode: ComparisonMode, payload: &Value) -> InitialAnalysis {
    let decision = &payload["additional_search"];
    InitialAnalysis {
        text_changes: parse_text_changes(mode, &payload["text_changes"]),
        numerical_changes: payload["numerical_changes"]
            .as_array()
            .cloned()
            .unwrap_or_default(),
        tone_analysis: payload["tone_analysis"].clone(),
        importance: parse_importance(&payload["importance"]).unwrap_or_default(),
        importance_reason: payload["importance_reason"]
            .as_str()
            .unwrap_or_default()
            .to_string(),
        summary: payload["summary"].as_str().unwrap_or_default().to_string(),
        search: SearchDecision {
            needed: decision["needed"].as_bool().unwrap_or(false),
            search_phrases: string_list(&decision["search_phrases"]),
        },
    }
}

fn parse_secondary(payload: &Value) -> SecondaryAnalysis {
    SecondaryAnalysis {
        new_findings: string_list(&payload["new_findings"]),
        resolved_contradictions: string_list(&payload["resolved_contradictions"]),
        additional_contradictions: string_list(&payload["additional_contradictions"]),
        enhanced_understanding: payload["enhanced_understanding"]
            .as_str()
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        importance_update: parse_importance(&payload["importance_update"]),
    }
}

/// Whether the gated policy lets this section run iterative search.
fn search_allowed(mode: SearchMode, importance: Importance, decision: &SearchDecision) -> bool {
    if decision.search_phrases.is_empty() {
        return false;
    }
    match mode {
        SearchMode::Off => false,
        SearchMode::HighOnly => importance == Importance::High && decision.needed,
        SearchMode::All => decision.needed,
    }
}

impl<C: ChatBackend, E: EmbeddingBackend> SectionAnalyzer<'_, C, E> {
    /// Analyse one mapping. `None` means skip: missing or empty inputs, or a
    /// transport failure. The record count invariant downstream relies on
    /// skips being omissions, not placeholders.
    pub async fn analyze(&self, mapping: &SectionMapping) -> Option<SectionDetailedComparison> {
        let Some(sec1) = self.doc1.sections.get(&mapping.doc1_section) else {
            info!(section = %mapping.doc1_section, "skipping mapping: section missing in document 1");
            return None;
        };
        let Some(sec2) = self.doc2.sections.get(&mapping.doc2_section) else {
            info!(section = %mapping.doc2_section, "skipping mapping: section missing in document 2");
            return None;
        };

        // Extracted digest preferred, raw page text as the fallback.
        let text1 = self.doc1.section_content(sec1);
        let text2 = self.doc2.section_content(sec2);
        let tables1 = self.doc1.section_tables(sec1);
        let tables2 = self.doc2.section_tables(sec2);
        if (text1.is_empty() && tables1.is_empty()) || (text2.is_empty() && tables2.is_empty()) {
            info!(section = %mapping.doc1_section, "skipping mapping: no content on one side");
            return None;
        }

        let with_search = self.config.search_mode != SearchMode::Off;
        let input = SectionPromptInput {
            section_name: &mapping.doc1_section,
            text1: &text1,
            text2: &text2,
            tables1_summary: &summarize_tables(&tables1),
            tables2_summary: &summarize_tables(&tables2),
            doc1_page_range: &sec1.page_range(),
            doc2_page_range: &sec2.page_range(),
        };
        let prompt =
            prompts::initial_prompt(self.mode, self.doc1_info, self.doc2_info, &input, with_search);

        let payload = match self.chat.complete_json(prompts::SYSTEM_PROMPT, &prompt).await {
            Ok(payload) => payload,
            Err(err) if err.is_transport() => {
                warn!(section = %mapping.doc1_section, error = %err, "section analysis failed");
                return None;
            }
            Err(err) => {
                warn!(section = %mapping.doc1_section, error = %err, "unparseable analysis output");
                return Some(self.placeholder(mapping, sec1, sec2, &err));
            }
        };

        let mut initial = parse_initial(self.mode, &payload);

        // Contradiction floor: reported contradictions always rank high.
        let contradiction_count = initial.text_changes.contradictions().len();
        if contradiction_count > 0 {
            initial.importance = Importance::High;
            initial.importance_reason = format!(
                "{} ({contradiction_count} contradictions found)",
                initial.importance_reason
            );
        }

        let rounds = if search_allowed(self.config.search_mode, initial.importance, &initial.search)
        {
            self.run_search_loop(mapping, &initial).await
        } else {
            Vec::new()
        };

        let (importance, importance_reason, summary) = reassess(&initial, &rounds);
        Some(SectionDetailedComparison {
            section_name: mapping.doc1_section.clone(),
            doc1_page_range: sec1.page_range(),
            doc2_page_range: sec2.page_range(),
            text_changes: initial.text_changes,
            numerical_changes: initial.numerical_changes,
            tone_analysis: initial.tone_analysis,
            importance,
            importance_reason,
            summary,
            doc1_section_name: mapping.doc1_section.clone(),
            doc2_section_name: mapping.doc2_section.clone(),
            mapping_confidence: mapping.confidence_score,
            mapping_method: mapping.mapping_method,
            has_additional_context: !rounds.is_empty(),
            additional_searches: rounds,
        })
    }

    fn placeholder(
        &self,
        mapping: &SectionMapping,
        sec1: &SectionInfo,
        sec2: &SectionInfo,
        err: &AiError,
    ) -> SectionDetailedComparison {
        SectionDetailedComparison {
            section_name: mapping.doc1_section.clone(),
            doc1_page_range: sec1.page_range(),
            doc2_page_range: sec2.page_range(),
            text_changes: TextChanges::empty_for(self.mode),
            numerical_changes: Vec::new(),
            tone_analysis: Value::Null,
            importance: Importance::Low,
            importance_reason: format!("analysis output could not be parsed: {err}"),
            summary: "analysis unavailable for this section".to_string(),
            doc1_section_name: mapping.doc1_section.clone(),
            doc2_section_name: mapping.doc2_section.clone(),
            mapping_confidence: mapping.confidence_score,
            mapping_method: mapping.mapping_method,
            additional_searches: Vec::new(),
            has_additional_context: false,
        }
    }

    /// Sequential refinement rounds; never more than
    /// `max_search_iterations`, never revisiting a section.
    async fn run_search_loop(
        &self,
        mapping: &SectionMapping,
        initial: &InitialAnalysis,
    ) -> Vec<AdditionalSearchResult> {
        let mut rounds: Vec<AdditionalSearchResult> = Vec::new();
        let mut excluded: HashSet<String> = HashSet::new();
        excluded.insert(mapping.doc1_section.clone());
        let mut phrases = initial.search.search_phrases.clone();

        for iteration in 1..=self.config.max_search_iterations {
            if iteration > 1 {
                match self.regenerate_phrases(mapping, &rounds).await {
                    Some(next) if !next.is_empty() => phrases = next,
                    _ => break,
                }
            }

            let Some(found) = self.find_related_sections(&phrases, &excluded).await else {
                break;
            };
            if found.is_empty() {
                break;
            }
            for section in &found {
                excluded.insert(section.doc1_section.clone());
            }
            debug!(
                section = %mapping.doc1_section,
                iteration,
                found = found.len(),
                "iterative search round"
            );

            let context = self.render_context(&found);
            let analysis = match self
                .chat
                .complete_json(
                    prompts::SYSTEM_PROMPT,
                    &prompts::secondary_prompt(&mapping.doc1_section, &initial.summary, &context),
                )
                .await
            {
                Ok(payload) => parse_secondary(&payload),
                Err(err) => {
                    warn!(section = %mapping.doc1_section, error = %err, "secondary analysis failed");
                    SecondaryAnalysis::default()
                }
            };

            rounds.push(AdditionalSearchResult {
                iteration,
                search_keywords: phrases.clone(),
                found_sections: found,
                analysis,
            });
        }
        rounds
    }

    /// Rank not-yet-examined document-1 sections against the phrase set.
    ///
    /// `None` means the embedding call failed; the caller ends the loop.
    async fn find_related_sections(
        &self,
        phrases: &[String],
        excluded: &HashSet<String>,
    ) -> Option<Vec<FoundSection>> {
        let candidates: Vec<&String> = self
            .doc1
            .sections
            .keys()
            .filter(|name| !excluded.contains(*name))
            .collect();
        if candidates.is_empty() {
            return Some(Vec::new());
        }

        let mut texts = Vec::with_capacity(candidates.len() + 1);
        texts.push(phrases.join(" "));
        for name in &candidates {
            texts.push(section_digest(name, &self.doc1.sections[*name]));
        }

        let vectors = match self.embedder.embed_batch(&texts).await {
            Ok(vectors) => vectors,
            Err(err) => {
                warn!(error = %err, "search embedding failed");
                return None;
            }
        };
        let (query, sections) = vectors.split_first()?;

        let ranked = similarity::rank(query, sections);
        Some(
            ranked
                .into_iter()
                .take(SEARCH_TOP_K)
                .map(|(idx, score)| {
                    let name = candidates[idx].clone();
                    let doc2_section = self
                        .mappings
                        .iter()
                        .find(|m| m.doc1_section == name)
                        .map(|m| m.doc2_section.clone())
                        .unwrap_or_else(|| name.clone());
                    FoundSection {
                        doc1_section: name,
                        doc2_section,
                        similarity: f64::from(score),
                    }
                })
                .collect(),
        )
    }

    fn render_context(&self, found: &[FoundSection]) -> String {
        found
            .iter()
            .filter_map(|f| {
                let section = self.doc1.sections.get(&f.doc1_section)?;
                let text: String = self
                    .doc1
                    .section_text(section)
                    .chars()
                    .take(CONTEXT_EXCERPT_CHARS)
                    .collect();
                Some(format!(
                    "[{}] (pages {})\n{}",
                    f.doc1_section,
                    section.page_range(),
                    text
                ))
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    async fn regenerate_phrases(
        &self,
        mapping: &SectionMapping,
        rounds: &[AdditionalSearchResult],
    ) -> Option<Vec<String>> {
        let mut context: Vec<String> = Vec::new();
        for round in rounds {
            context.extend(round.analysis.new_findings.iter().cloned());
            if let Some(understanding) = &round.analysis.enhanced_understanding {
                context.push(understanding.clone());
            }
        }
        let prompt =
            prompts::regenerate_phrases_prompt(&mapping.doc1_section, &context.join("\n"));
        match self.chat.complete_json(prompts::SYSTEM_PROMPT, &prompt).await {
            Ok(payload) => Some(string_list(&payload["search_phrases"])),
            Err(err) => {
                warn!(section = %mapping.doc1_section, error = %err, "phrase regeneration failed");
                None
            }
        }
    }
}

/// Final importance, reason, and summary from the base analysis plus the
/// accumulated search rounds.
fn reassess(
    initial: &InitialAnalysis,
    rounds: &[AdditionalSearchResult],
) -> (Importance, String, String) {
    let additional: usize = rounds
        .iter()
        .map(|r| r.analysis.additional_contradictions.len())
        .sum();
    let resolved: usize = rounds
        .iter()
        .map(|r| r.analysis.resolved_contradictions.len())
        .sum();

    let (importance, reason) = if additional > 0 {
        (
            Importance::High,
            format!("additional searches found {additional} further contradictions"),
        )
    } else if let Some(update) = rounds
        .iter()
        .rev()
        .find_map(|r| r.analysis.importance_update)
    {
        let reason = if resolved > 0 {
            format!("importance revised after search: {resolved} contradictions resolved")
        } else {
            rounds
                .iter()
                .rev()
                .find_map(|r| r.analysis.enhanced_understanding.clone())
                .unwrap_or_else(|| "importance revised after additional context".to_string())
        };
        (update, reason)
    } else {
        (initial.importance, initial.importance_reason.clone())
    };

    let findings: Vec<&str> = rounds
        .iter()
        .flat_map(|r| &r.analysis.new_findings)
        .take(3)
        .map(String::as_str)
        .collect();
    let summary = if !findings.is_empty() {
        format!("{} Additional context: {}", initial.summary, findings.join("; "))
    } else if !rounds.is_empty() {
        format!("{} (additional searches found no new findings)", initial.summary)
    } else {
        initial.summary.clone()
    };

    (importance, reason, summary)
}
