//! End-to-end comparison: classify → map → diff → analyse → assemble.
//!
//! Section analyses run on a bounded worker pool and complete in arbitrary
//! order; results are re-slotted to mapping order before assembly because
//! consumers display sections in filing order.

use chrono::Utc;
use futures::StreamExt;
use kurabe_ai::{ChatBackend, EmbeddingBackend};
use kurabe_core::comparison::{ComparisonResult, SectionDetailedComparison, SectionMapping};
use kurabe_core::document::{DocumentDescriptor, StructuredDocument};
use kurabe_core::numeric::{NumericalDifference, compare_tables};
use kurabe_core::textdiff::{TextDifference, diff_texts};
use kurabe_core::{ComparisonMode, classify_mode};
use tracing::info;
use uuid::Uuid;

use crate::analyzer::SectionAnalyzer;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::mapper;

/// Progress callback: `(current_section, completed, total)`, invoked in
/// completion order. Lifetime-generic so callers can pass closures that
/// borrow locals.
pub type ProgressFn<'a> = dyn Fn(&str, usize, usize) + Send + Sync + 'a;

/// Runs complete comparisons against a chat and an embedding backend.
pub struct Orchestrator<C, E> {
    chat: C,
    embedder: E,
    config: EngineConfig,
}

impl<C: ChatBackend, E: EmbeddingBackend> Orchestrator<C, E> {
    pub fn new(chat: C, embedder: E, config: EngineConfig) -> Self {
        Self {
            chat,
            embedder,
            config,
        }
    }

    /// Compare two documents and assemble the result.
    ///
    /// Three or more documents classify as multi-document, which this engine
    /// does not analyse.
    pub async fn compare(
        &self,
        documents: &[(DocumentDescriptor, StructuredDocument)],
        progress: Option<&ProgressFn<'_>>,
    ) -> Result<ComparisonResult, EngineError> {
        let descriptors: Vec<DocumentDescriptor> =
            documents.iter().map(|(d, _)| d.clone()).collect();
        let mode = classify_mode(&descriptors)?;
        if mode == ComparisonMode::MultiDocument {
            return Err(EngineError::MultiDocumentUnsupported);
        }

        let (doc1_info, doc1) = &documents[0];
        let (doc2_info, doc2) = &documents[1];
        let same_type = matches!(
            (&doc1_info.document_type, &doc2_info.document_type),
            (Some(a), Some(b)) if a == b
        );

        let mappings = mapper::map_sections(
            &self.embedder,
            same_type,
            doc1,
            doc2,
            self.config.similarity_threshold,
        )
        .await;

        let numerical_differences = self.numeric_diffs(doc1, doc2, &mappings);
        let text_differences = self.text_diffs(doc1, doc2, &mappings);
        let section_detailed_comparisons = self
            .analyze_all(mode, doc1_info, doc2_info, doc1, doc2, &mappings, progress)
            .await;

        info!(
            mode = ?mode,
            mappings = mappings.len(),
            numeric = numerical_differences.len(),
            records = section_detailed_comparisons.len(),
            "comparison complete"
        );

        let priority = ComparisonResult::derive_priority(&section_detailed_comparisons);
        Ok(ComparisonResult {
            comparison_id: Uuid::new_v4().to_string(),
            mode,
            doc1_info: doc1_info.clone(),
            doc2_info: doc2_info.clone(),
            section_mappings: mappings,
            numerical_differences,
            text_differences,
            section_detailed_comparisons,
            priority,
            created_at: Utc::now(),
        })
    }

    /// Tables pair positionally within each mapped section's page span.
    fn numeric_diffs(
        &self,
        doc1: &StructuredDocument,
        doc2: &StructuredDocument,
        mappings: &[SectionMapping],
    ) -> Vec<NumericalDifference> {
        let mut differences = Vec::new();
        for mapping in mappings {
            let (Some(sec1), Some(sec2)) = (
                doc1.sections.get(&mapping.doc1_section),
                doc2.sections.get(&mapping.doc2_section),
            ) else {
                continue;
            };
            let tables1 = doc1.section_tables(sec1);
            let tables2 = doc2.section_tables(sec2);
            for (t1, t2) in tables1.iter().zip(&tables2) {
                differences.extend(compare_tables(
                    &mapping.doc1_section,
                    &t1.data,
                    &t2.data,
                    self.config.tolerance_pct,
                ));
            }
        }
        differences
    }

    fn text_diffs(
        &self,
        doc1: &StructuredDocument,
        doc2: &StructuredDocument,
        mappings: &[SectionMapping],
    ) -> Vec<TextDifference> {
        mappings
            .iter()
            .filter_map(|mapping| {
                let sec1 = doc1.sections.get(&mapping.doc1_section)?;
                let sec2 = doc2.sections.get(&mapping.doc2_section)?;
                Some(diff_texts(
                    &mapping.doc1_section,
                    &doc1.section_text(sec1),
                    &doc2.section_text(sec2),
                ))
            })
            .collect()
    }

    #[allow(clippy::too_many_arguments)]
    async fn analyze_all(
        &self,
        mode: ComparisonMode,
        doc1_info: &DocumentDescriptor,
        doc2_info: &DocumentDescriptor,
        doc1: &StructuredDocument,
        doc2: &StructuredDocument,
        mappings: &[SectionMapping],
        progress: Option<&ProgressFn<'_>>,
    ) -> Vec<SectionDetailedComparison> {
        let analyzer = SectionAnalyzer {
            chat: &self.chat,
            embedder: &self.embedder,
            mode,
            doc1_info,
            doc2_info,
            doc1,
            doc2,
            mappings,
            config: &self.config,
        };

        let total = mappings.len();
        let analyzer = &analyzer;
        let mut stream = futures::stream::iter(mappings.iter().enumerate().map(
            |(idx, mapping)| async move {
                (idx, mapping.doc1_section.clone(), analyzer.analyze(mapping).await)
            },
        ))
        .buffer_unordered(self.config.max_workers.max(1));

        // Completion order is arbitrary; slots restore mapping order.
        let mut slots: Vec<Option<SectionDetailedComparison>> = vec![None; total];
        let mut completed = 0;
        while let Some((idx, section, record)) = stream.next().await {
            completed += 1;
            if let Some(callback) = progress {
                callback(&section, completed, total);
            }
            slots[idx] = record;
        }
        slots.into_iter().flatten().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    use kurabe_ai::AiError;
    use kurabe_core::comparison::{Importance, MappingMethod};
    use kurabe_core::document::{Page, SectionInfo, Table};
    use serde_json::{Value, json};

    /// Replies with a canned analysis; sections listed in `slow` finish
    /// later, and sections listed in `high` rate as high importance.
    struct CannedChat {
        slow: Vec<&'static str>,
        high: Vec<&'static str>,
    }

    impl ChatBackend for CannedChat {
        async fn complete_json(&self, _system: &str, user: &str) -> Result<Value, AiError> {
            if self.slow.iter().any(|s| user.contains(s)) {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            let importance = if self.high.iter().any(|s| user.contains(s)) {
                "high"
            } else {
                "medium"
            };
            Ok(json!({
                "text_changes": {"added": [], "removed": [], "modified": []},
                "numerical_changes": [],
                "tone_analysis": {},
                "importance": importance,
                "importance_reason": "r",
                "summary": "s",
            }))
        }
    }

    struct NullEmbedder;

    impl EmbeddingBackend for NullEmbedder {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, AiError> {
            Ok(texts.iter().map(|_| vec![1.0]).collect())
        }
    }

    fn descriptor(id: &str, company: &str, doc_type: &str, year: i32) -> DocumentDescriptor {
        DocumentDescriptor {
            document_id: id.to_string(),
            filename: format!("{id}.pdf"),
            document_type: Some(doc_type.to_string()),
            document_type_label: Some(doc_type.to_string()),
            company_name: Some(company.to_string()),
            fiscal_year: Some(year),
            extraction_confidence: None,
        }
    }

    fn doc_with_sections(sections: &[&str]) -> StructuredDocument {
        let mut doc = StructuredDocument::default();
        for (i, name) in sections.iter().enumerate() {
            let page_number = (i + 1) as u32;
            doc.pages.push(Page {
                page_number,
                text: format!("{name}の本文"),
            });
            doc.sections.insert(
                name.to_string(),
                SectionInfo {
                    pages: vec![page_number],
                    extracted_content: None,
                },
            );
        }
        doc
    }

    fn year_pair(
        sections1: &[&str],
        sections2: &[&str],
    ) -> Vec<(DocumentDescriptor, StructuredDocument)> {
        vec![
            (
                descriptor("d1", "ABC", "securities_report", 2023),
                doc_with_sections(sections1),
            ),
            (
                descriptor("d2", "ABC", "securities_report", 2024),
                doc_with_sections(sections2),
            ),
        ]
    }

    #[tokio::test]
    async fn records_follow_mapping_order_despite_completion_order() {
        let sections = ["a事業", "b財務", "c株式", "d設備", "e役員"];
        let docs = year_pair(&sections, &sections);
        // The first two mappings finish last.
        let orchestrator = Orchestrator::new(
            CannedChat {
                slow: vec!["a事業", "b財務"],
                high: vec![],
            },
            NullEmbedder,
            EngineConfig::default(),
        );
        let result = orchestrator.compare(&docs, None).await.unwrap();
        let order: Vec<&str> = result
            .section_detailed_comparisons
            .iter()
            .map(|r| r.section_name.as_str())
            .collect();
        assert_eq!(order, sections);
        assert_eq!(result.section_mappings.len(), sections.len());
    }

    #[tokio::test]
    async fn progress_reports_completion_order_with_fixed_total() {
        let sections = ["a事業", "b財務", "c株式"];
        let docs = year_pair(&sections, &sections);
        let orchestrator = Orchestrator::new(
            CannedChat {
                slow: vec!["a事業"],
                high: vec![],
            },
            NullEmbedder,
            EngineConfig::default(),
        );

        let events: Mutex<Vec<(String, usize, usize)>> = Mutex::new(Vec::new());
        let callback = |section: &str, completed: usize, total: usize| {
            events.lock().unwrap().push((section.to_string(), completed, total));
        };
        orchestrator.compare(&docs, Some(&callback)).await.unwrap();

        let events = events.into_inner().unwrap();
        assert_eq!(events.len(), 3);
        for (i, (_, completed, total)) in events.iter().enumerate() {
            assert_eq!(*completed, i + 1);
            assert_eq!(*total, 3);
        }
        // The slow section completes last even though it was submitted first.
        assert_eq!(events[2].0, "a事業");
    }

    #[tokio::test]
    async fn empty_section_is_omitted_with_order_preserved() {
        let docs = {
            let mut docs = year_pair(
                &["a事業", "b財務", "c株式"],
                &["a事業", "b財務", "c株式"],
            );
            // Strip document 2's "b財務" content; the mapping survives but
            // the analysis must skip it.
            docs[1].1.sections.insert(
                "b財務".to_string(),
                SectionInfo {
                    pages: Vec::new(),
                    extracted_content: None,
                },
            );
            docs
        };
        let orchestrator = Orchestrator::new(
            CannedChat {
                slow: vec![],
                high: vec![],
            },
            NullEmbedder,
            EngineConfig::default(),
        );
        let result = orchestrator.compare(&docs, None).await.unwrap();
        let order: Vec<&str> = result
            .section_detailed_comparisons
            .iter()
            .map(|r| r.section_name.as_str())
            .collect();
        assert_eq!(order, vec!["a事業", "c株式"]);
        assert_eq!(result.section_mappings.len(), 3);
    }

    #[tokio::test]
    async fn priority_escalates_with_any_high_section() {
        let sections = ["a事業", "b財務"];
        let docs = year_pair(&sections, &sections);
        let orchestrator = Orchestrator::new(
            CannedChat {
                slow: vec![],
                high: vec!["b財務"],
            },
            NullEmbedder,
            EngineConfig::default(),
        );
        let result = orchestrator.compare(&docs, None).await.unwrap();
        assert_eq!(result.priority, Importance::High);
        assert_eq!(result.mode, ComparisonMode::DiffAnalysisYear);
    }

    #[tokio::test]
    async fn numeric_and_text_diffs_cover_each_mapping() {
        let mut docs = year_pair(&["a事業"], &["a事業"]);
        docs[0].1.tables.push(Table {
            page: 1,
            data: vec![vec!["売上高".to_string(), "1,234千円".to_string()]],
        });
        docs[1].1.tables.push(Table {
            page: 1,
            data: vec![vec!["売上高".to_string(), "1,234,500円".to_string()]],
        });
        let orchestrator = Orchestrator::new(
            CannedChat {
                slow: vec![],
                high: vec![],
            },
            NullEmbedder,
            EngineConfig::default(),
        );
        let result = orchestrator.compare(&docs, None).await.unwrap();
        assert_eq!(result.numerical_differences.len(), 1);
        assert_eq!(result.numerical_differences[0].difference, 500.0);
        assert_eq!(result.text_differences.len(), 1);
        assert_eq!(result.text_differences[0].section, "a事業");
    }

    #[tokio::test]
    async fn semantic_mapping_used_across_document_types() {
        let mut docs = year_pair(&["a事業"], &["a事業"]);
        docs[1].0 = descriptor("d2", "ABC", "earnings_summary", 2023);
        let orchestrator = Orchestrator::new(
            CannedChat {
                slow: vec![],
                high: vec![],
            },
            NullEmbedder,
            EngineConfig::default(),
        );
        let result = orchestrator.compare(&docs, None).await.unwrap();
        assert_eq!(result.mode, ComparisonMode::ConsistencyCheck);
        assert_eq!(result.section_mappings.len(), 1);
        assert_eq!(
            result.section_mappings[0].mapping_method,
            MappingMethod::Semantic
        );
    }

    #[tokio::test]
    async fn multi_document_is_rejected() {
        let mut docs = year_pair(&["a"], &["a"]);
        docs.push((
            descriptor("d3", "XYZ", "securities_report", 2024),
            doc_with_sections(&["a"]),
        ));
        let orchestrator = Orchestrator::new(
            CannedChat {
                slow: vec![],
                high: vec![],
            },
            NullEmbedder,
            EngineConfig::default(),
        );
        assert!(matches!(
            orchestrator.compare(&docs, None).await,
            Err(EngineError::MultiDocumentUnsupported)
        ));
    }

    #[tokio::test]
    async fn fewer_than_two_documents_is_an_input_error() {
        let docs = vec![(
            descriptor("d1", "ABC", "securities_report", 2024),
            doc_with_sections(&["a"]),
        )];
        let orchestrator = Orchestrator::new(
            CannedChat {
                slow: vec![],
                high: vec![],
            },
            NullEmbedder,
            EngineConfig::default(),
        );
        assert!(matches!(
            orchestrator.compare(&docs, None).await,
            Err(EngineError::InsufficientDocuments(1))
        ));
    }
}
