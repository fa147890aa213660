//! Input data model: document descriptors and structured extraction output.
//!
//! Upstream extraction has already segmented each document into named
//! sections with page lists and an optional semantic digest. The comparison
//! core consumes that output as-is; nothing here touches PDFs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Identity and classification metadata for one document in a comparison.
///
/// Immutable for the duration of a comparison run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentDescriptor {
    pub document_id: String,
    pub filename: String,
    pub document_type: Option<String>,
    pub document_type_label: Option<String>,
    pub company_name: Option<String>,
    pub fiscal_year: Option<i32>,
    pub extraction_confidence: Option<f64>,
}

/// One extracted page of text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    pub page_number: u32,
    pub text: String,
}

/// One extracted table and the page it was found on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    pub page: u32,
    /// Row-major cells; column 0 is conventionally the row label.
    pub data: Vec<Vec<String>>,
}

/// A financial line item from the per-section digest.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FinancialItem {
    #[serde(default)]
    pub item: String,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub period: Option<String>,
}

/// An accounting-policy note from the per-section digest.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountingNote {
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub content: String,
}

/// A categorised factual statement from the per-section digest.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FactualItem {
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub item: String,
}

/// A narrative message (strategy, policy, risk, outlook) from the digest.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub tone: Option<String>,
}

/// Semantic digest of one section, produced by the upstream extractor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractedContent {
    #[serde(default)]
    pub financial_data: Vec<FinancialItem>,
    #[serde(default)]
    pub accounting_notes: Vec<AccountingNote>,
    #[serde(default)]
    pub factual_info: Vec<FactualItem>,
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl ExtractedContent {
    pub fn is_empty(&self) -> bool {
        self.financial_data.is_empty()
            && self.accounting_notes.is_empty()
            && self.factual_info.is_empty()
            && self.messages.is_empty()
    }

    /// Render the digest as line-per-item text for analysis prompts.
    pub fn render(&self) -> String {
        let mut lines = Vec::new();
        for item in &self.financial_data {
            let mut line = item.item.clone();
            if let Some(value) = &item.value {
                line.push_str(": ");
                line.push_str(value);
            }
            if let Some(unit) = &item.unit {
                line.push_str(unit);
            }
            if let Some(period) = &item.period {
                line.push_str(" (");
                line.push_str(period);
                line.push(')');
            }
            lines.push(line);
        }
        for note in &self.accounting_notes {
            lines.push(format!("{}: {}", note.topic, note.content));
        }
        for fact in &self.factual_info {
            lines.push(format!("{}: {}", fact.category, fact.item));
        }
        for message in &self.messages {
            lines.push(format!("[{}] {}", message.kind, message.content));
        }
        lines.join("\n")
    }
}

/// One named section: the pages it spans and its optional digest.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SectionInfo {
    #[serde(default)]
    pub pages: Vec<u32>,
    #[serde(default)]
    pub extracted_content: Option<ExtractedContent>,
}

impl SectionInfo {
    /// Render the page span as `"first-last"`, or `"?"` when unknown.
    pub fn page_range(&self) -> String {
        match (self.pages.iter().min(), self.pages.iter().max()) {
            (Some(first), Some(last)) => format!("{first}-{last}"),
            _ => "?".to_string(),
        }
    }
}

/// Everything extraction produced for one document.
///
/// Sections are keyed by name in a `BTreeMap` so that iteration order is
/// deterministic (sorted by section name).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StructuredDocument {
    #[serde(default)]
    pub full_text: String,
    #[serde(default)]
    pub pages: Vec<Page>,
    #[serde(default)]
    pub tables: Vec<Table>,
    #[serde(default)]
    pub sections: BTreeMap<String, SectionInfo>,
}

impl StructuredDocument {
    /// Concatenated text of the pages a section spans.
    pub fn section_text(&self, section: &SectionInfo) -> String {
        let mut texts = Vec::new();
        for page_num in &section.pages {
            if let Some(page) = self.pages.iter().find(|p| p.page_number == *page_num) {
                texts.push(page.text.as_str());
            }
        }
        texts.join("\n")
    }

    /// Analysis input for a section: the extracted digest when present,
    /// raw page text otherwise.
    pub fn section_content(&self, section: &SectionInfo) -> String {
        match &section.extracted_content {
            Some(content) if !content.is_empty() => content.render(),
            _ => self.section_text(section),
        }
    }

    /// Tables that fall on the pages a section spans.
    pub fn section_tables(&self, section: &SectionInfo) -> Vec<&Table> {
        self.tables
            .iter()
            .filter(|t| section.pages.contains(&t.page))
            .collect()
    }
}

/// Compact text rendering of a section for embedding-based matching.
///
/// Combines the section name with digest highlights (financial items,
/// accounting topics, facts, message kinds) so that semantically equivalent
/// sections from differently structured documents embed close together.
pub fn section_digest(name: &str, section: &SectionInfo) -> String {
    let mut parts = vec![format!("Section: {name}")];

    if let Some(content) = &section.extracted_content {
        if !content.financial_data.is_empty() {
            let items: Vec<&str> = content
                .financial_data
                .iter()
                .take(10)
                .map(|f| f.item.as_str())
                .collect();
            parts.push(format!("Financial items: {}", items.join(", ")));
        }
        if !content.accounting_notes.is_empty() {
            let topics: Vec<&str> = content
                .accounting_notes
                .iter()
                .take(5)
                .map(|n| n.topic.as_str())
                .collect();
            parts.push(format!("Accounting topics: {}", topics.join(", ")));
        }
        if !content.factual_info.is_empty() {
            let facts: Vec<String> = content
                .factual_info
                .iter()
                .take(10)
                .map(|f| format!("{}: {}", f.category, f.item))
                .collect();
            parts.push(format!("Facts: {}", facts.join(", ")));
        }
        if !content.messages.is_empty() {
            let kinds: Vec<&str> = content
                .messages
                .iter()
                .take(10)
                .map(|m| m.kind.as_str())
                .collect();
            parts.push(format!("Message kinds: {}", kinds.join(", ")));

            let previews: Vec<String> = content
                .messages
                .iter()
                .take(3)
                .map(|m| m.content.chars().take(100).collect())
                .collect();
            if previews.iter().any(|p| !p.is_empty()) {
                parts.push(format!("Messages: {}", previews.join(" | ")));
            }
        }
    }

    parts.join("\n")
}

/// Summarise tables for prompt context: at most 5 tables, 3 preview rows each.
pub fn summarize_tables(tables: &[&Table]) -> String {
    if tables.is_empty() {
        return "no tables".to_string();
    }

    let mut summaries = Vec::new();
    for (i, table) in tables.iter().take(5).enumerate() {
        let rows = table.data.len();
        let cols = table.data.first().map_or(0, Vec::len);
        let preview: Vec<String> = table
            .data
            .iter()
            .take(3)
            .map(|row| row.join(" | "))
            .collect();
        summaries.push(format!(
            "table {} (page {}): {rows} rows x {cols} cols\n{}",
            i + 1,
            table.page,
            preview.join("\n"),
        ));
    }
    if tables.len() > 5 {
        summaries.push(format!("... {} more tables", tables.len() - 5));
    }

    summaries.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(n: u32, text: &str) -> Page {
        Page {
            page_number: n,
            text: text.to_string(),
        }
    }

    fn table(page: u32, rows: &[&[&str]]) -> Table {
        Table {
            page,
            data: rows
                .iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        }
    }

    #[test]
    fn page_range_spans_min_to_max() {
        let section = SectionInfo {
            pages: vec![7, 3, 5],
            extracted_content: None,
        };
        assert_eq!(section.page_range(), "3-7");
    }

    #[test]
    fn page_range_unknown_when_empty() {
        assert_eq!(SectionInfo::default().page_range(), "?");
    }

    #[test]
    fn section_text_joins_matching_pages() {
        let doc = StructuredDocument {
            pages: vec![page(1, "first"), page(2, "second"), page(3, "third")],
            ..Default::default()
        };
        let section = SectionInfo {
            pages: vec![1, 3],
            extracted_content: None,
        };
        assert_eq!(doc.section_text(&section), "first\nthird");
    }

    #[test]
    fn section_text_ignores_missing_pages() {
        let doc = StructuredDocument {
            pages: vec![page(1, "only")],
            ..Default::default()
        };
        let section = SectionInfo {
            pages: vec![1, 99],
            extracted_content: None,
        };
        assert_eq!(doc.section_text(&section), "only");
    }

    #[test]
    fn section_content_prefers_extracted_digest() {
        let doc = StructuredDocument {
            pages: vec![page(1, "raw page text")],
            ..Default::default()
        };
        let digested = SectionInfo {
            pages: vec![1],
            extracted_content: Some(ExtractedContent {
                financial_data: vec![FinancialItem {
                    item: "売上高".to_string(),
                    value: Some("1,234".to_string()),
                    unit: Some("百万円".to_string()),
                    period: Some("当期".to_string()),
                }],
                ..Default::default()
            }),
        };
        let content = doc.section_content(&digested);
        assert_eq!(content, "売上高: 1,234百万円 (当期)");

        // An empty digest falls back to the pages.
        let undigested = SectionInfo {
            pages: vec![1],
            extracted_content: Some(ExtractedContent::default()),
        };
        assert_eq!(doc.section_content(&undigested), "raw page text");
    }

    #[test]
    fn section_content_works_without_pages() {
        let doc = StructuredDocument::default();
        let section = SectionInfo {
            pages: Vec::new(),
            extracted_content: Some(ExtractedContent {
                messages: vec![Message {
                    kind: "リスク".to_string(),
                    content: "為替変動の影響".to_string(),
                    tone: None,
                }],
                ..Default::default()
            }),
        };
        assert_eq!(doc.section_content(&section), "[リスク] 為替変動の影響");
    }

    #[test]
    fn section_tables_filters_by_page() {
        let doc = StructuredDocument {
            tables: vec![table(1, &[&["a"]]), table(2, &[&["b"]]), table(5, &[&["c"]])],
            ..Default::default()
        };
        let section = SectionInfo {
            pages: vec![2, 5],
            extracted_content: None,
        };
        let found = doc.section_tables(&section);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].page, 2);
        assert_eq!(found[1].page, 5);
    }

    #[test]
    fn digest_without_content_is_name_only() {
        let section = SectionInfo::default();
        assert_eq!(section_digest("事業等のリスク", &section), "Section: 事業等のリスク");
    }

    #[test]
    fn digest_includes_financial_items_and_message_kinds() {
        let content = ExtractedContent {
            financial_data: vec![FinancialItem {
                item: "売上高".to_string(),
                ..Default::default()
            }],
            messages: vec![Message {
                kind: "リスク".to_string(),
                content: "為替変動の影響".to_string(),
                tone: None,
            }],
            ..Default::default()
        };
        let section = SectionInfo {
            pages: vec![1],
            extracted_content: Some(content),
        };
        let digest = section_digest("経営成績", &section);
        assert!(digest.contains("Financial items: 売上高"));
        assert!(digest.contains("Message kinds: リスク"));
        assert!(digest.contains("為替変動の影響"));
    }

    #[test]
    fn summarize_no_tables() {
        assert_eq!(summarize_tables(&[]), "no tables");
    }

    #[test]
    fn summarize_caps_tables_and_rows() {
        let tables: Vec<Table> = (0..7)
            .map(|i| {
                table(
                    i,
                    &[&["r1"], &["r2"], &["r3"], &["r4"], &["r5"]],
                )
            })
            .collect();
        let refs: Vec<&Table> = tables.iter().collect();
        let summary = summarize_tables(&refs);
        assert!(summary.contains("table 5"));
        assert!(!summary.contains("table 6 ("));
        assert!(summary.contains("... 2 more tables"));
        assert!(summary.contains("r3"));
        assert!(!summary.contains("r4"));
    }
}
