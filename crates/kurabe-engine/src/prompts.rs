//! Prompt builders for the analysis backend.
//!
//! One builder per comparison mode, plus the iterative-search prompts. The
//! JSON schemas embedded here are what `analyzer` parses back out.

use kurabe_core::ComparisonMode;
use kurabe_core::document::DocumentDescriptor;

/// Characters of section text quoted per document.
const EXCERPT_CHARS: usize = 3_000;

pub const SYSTEM_PROMPT: &str = "You are an analyst of Japanese corporate disclosure documents. \
     Answer with exactly one JSON object and nothing else.";

fn excerpt(text: &str) -> String {
    text.chars().take(EXCERPT_CHARS).collect()
}

/// Inputs shared by every initial-analysis prompt.
pub struct SectionPromptInput<'a> {
    pub section_name: &'a str,
    pub text1: &'a str,
    pub text2: &'a str,
    pub tables1_summary: &'a str,
    pub tables2_summary: &'a str,
    pub doc1_page_range: &'a str,
    pub doc2_page_range: &'a str,
}

/// Build the initial-analysis prompt for a mapped section pair.
pub fn initial_prompt(
    mode: ComparisonMode,
    doc1_info: &DocumentDescriptor,
    doc2_info: &DocumentDescriptor,
    input: &SectionPromptInput<'_>,
    with_search: bool,
) -> String {
    let mut prompt = match mode {
        ComparisonMode::DiffAnalysisCompany => company_prompt(doc1_info, doc2_info, input),
        ComparisonMode::ConsistencyCheck => consistency_prompt(doc1_info, doc2_info, input),
        ComparisonMode::DiffAnalysisYear | ComparisonMode::MultiDocument => {
            temporal_prompt(doc1_info, input)
        }
    };
    if with_search {
        prompt.push_str(SEARCH_ADDENDUM);
    }
    prompt
}

fn document_blocks(input: &SectionPromptInput<'_>, label1: &str, label2: &str) -> String {
    format!(
        "[{label1}]\npages: {}\ntext (excerpt):\n{}\n\ntables:\n{}\n\n\
         [{label2}]\npages: {}\ntext (excerpt):\n{}\n\ntables:\n{}\n",
        input.doc1_page_range,
        excerpt(input.text1),
        input.tables1_summary,
        input.doc2_page_range,
        excerpt(input.text2),
        input.tables2_summary,
    )
}

fn temporal_prompt(doc1_info: &DocumentDescriptor, input: &SectionPromptInput<'_>) -> String {
    let doc_label = doc1_info.document_type_label.as_deref().unwrap_or("document");
    format!(
        "Compare the \"{section}\" section of two \"{doc_label}\" filings from \
         different periods.\n\n{blocks}\
         Analyse: important added content (max 5), removed content (max 5), \
         modified content (max 5), the main numeric changes, the tone of each \
         document, the importance of the differences, and a 1-2 sentence summary.\n\n\
         Reply with JSON:\n\
         {{\n\
         \x20 \"text_changes\": {{\"added\": [], \"removed\": [], \
         \"modified\": [{{\"before\": \"\", \"after\": \"\"}}]}},\n\
         \x20 \"numerical_changes\": [{{\"item\": \"\", \"value1\": 0, \"value2\": 0, \
         \"change_pct\": 0, \"is_significant\": true}}],\n\
         \x20 \"tone_analysis\": {{\"tone1\": \"positive/neutral/negative\", \
         \"tone2\": \"positive/neutral/negative\", \"negativity_score1\": 1.0, \
         \"negativity_score2\": 1.0, \"difference\": \"\"}},\n\
         \x20 \"importance\": \"high/medium/low\",\n\
         \x20 \"importance_reason\": \"\",\n\
         \x20 \"summary\": \"\"\n\
         }}",
        section = input.section_name,
        blocks = document_blocks(input, "document 1", "document 2"),
    )
}

fn company_prompt(
    doc1_info: &DocumentDescriptor,
    doc2_info: &DocumentDescriptor,
    input: &SectionPromptInput<'_>,
) -> String {
    let company1 = doc1_info.company_name.as_deref().unwrap_or("company A");
    let company2 = doc2_info.company_name.as_deref().unwrap_or("company B");
    format!(
        "Compare the \"{section}\" section as disclosed by two companies, \
         {company1} and {company2}.\n\n{blocks}\
         Analyse: important content only {company1} discloses (max 5), content \
         only {company2} discloses (max 5), aspects where their approaches \
         differ (max 5), the main numeric differences, each company's \
         disclosure detail level and tone, the importance of the differences, \
         and a 1-2 sentence summary.\n\n\
         Reply with JSON:\n\
         {{\n\
         \x20 \"text_changes\": {{\"only_in_company1\": [], \"only_in_company2\": [], \
         \"different_approaches\": [{{\"aspect\": \"\", \"company1_approach\": \"\", \
         \"company2_approach\": \"\"}}]}},\n\
         \x20 \"numerical_changes\": [{{\"metric\": \"\", \"company1_value\": 0, \
         \"company2_value\": 0, \"difference_pct\": 0, \"context\": \"\"}}],\n\
         \x20 \"tone_analysis\": {{\"company1_detail_level\": \"\", \
         \"company2_detail_level\": \"\", \"company1_tone\": \"\", \
         \"company2_tone\": \"\", \"style_difference\": \"\"}},\n\
         \x20 \"importance\": \"high/medium/low\",\n\
         \x20 \"importance_reason\": \"\",\n\
         \x20 \"summary\": \"\"\n\
         }}",
        section = input.section_name,
        blocks = document_blocks(input, company1, company2),
    )
}

fn consistency_prompt(
    doc1_info: &DocumentDescriptor,
    doc2_info: &DocumentDescriptor,
    input: &SectionPromptInput<'_>,
) -> String {
    let label1 = doc1_info.document_type_label.as_deref().unwrap_or("document 1");
    let label2 = doc2_info.document_type_label.as_deref().unwrap_or("document 2");
    format!(
        "The same company published a \"{label1}\" and a \"{label2}\". Check the \
         \"{section}\" section of both for consistency.\n\n{blocks}\
         Distinguish genuine contradictions (statements that cannot both be \
         true) from normal differences in granularity or emphasis, and note \
         complementary information each document adds. Rate overall consistency \
         from 0.0 to 1.0, judge the importance of any contradictions, and give \
         a 1-2 sentence summary.\n\n\
         Reply with JSON:\n\
         {{\n\
         \x20 \"text_changes\": {{\"contradictions\": [], \"normal_differences\": [], \
         \"complementary_info\": [], \"consistency_score\": 1.0}},\n\
         \x20 \"numerical_changes\": [{{\"item\": \"\", \"value1\": 0, \"value2\": 0, \
         \"change_pct\": 0, \"is_significant\": true}}],\n\
         \x20 \"tone_analysis\": {{\"tone1\": \"\", \"tone2\": \"\", \"difference\": \"\"}},\n\
         \x20 \"importance\": \"high/medium/low\",\n\
         \x20 \"importance_reason\": \"\",\n\
         \x20 \"summary\": \"\"\n\
         }}",
        section = input.section_name,
        blocks = document_blocks(input, label1, label2),
    )
}

const SEARCH_ADDENDUM: &str = "\n\nAdditionally decide whether examining other sections of the document \
     would materially improve this analysis. Add to the JSON object:\n\
     \"additional_search\": {\"needed\": false, \"reason\": \"\", \
     \"search_phrases\": [], \"expected_findings\": \"\"}\n\
     Set \"needed\" to true only when specific other sections would resolve an \
     open question, and give 1-3 short search phrases.";

/// Prompt for regenerating search phrases after the first search round.
pub fn regenerate_phrases_prompt(section_name: &str, context_summary: &str) -> String {
    format!(
        "While analysing the \"{section_name}\" section, earlier searches \
         produced this context:\n\n{context_summary}\n\n\
         If further sections are still worth examining, reply with JSON \
         {{\"search_phrases\": [\"...\"]}} (1-3 short phrases). If nothing \
         more is needed, reply with {{\"search_phrases\": []}}."
    )
}

/// Prompt for re-analysing a section with searched-up context.
pub fn secondary_prompt(section_name: &str, base_summary: &str, context_sections: &str) -> String {
    format!(
        "The analysis of the \"{section_name}\" section concluded:\n\
         {base_summary}\n\n\
         Related sections found by search:\n{context_sections}\n\n\
         Re-assess in light of this context. Reply with JSON:\n\
         {{\n\
         \x20 \"new_findings\": [],\n\
         \x20 \"resolved_contradictions\": [],\n\
         \x20 \"additional_contradictions\": [],\n\
         \x20 \"enhanced_understanding\": \"\",\n\
         \x20 \"importance_update\": \"high/medium/low or omit\"\n\
         }}"
    )
}
