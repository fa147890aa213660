//! Section mapping across two documents.
//!
//! Same filing type: exact name intersection. Different filing types:
//! embedding nearest-neighbour over per-section digest texts. Cardinality is
//! not forced to 1:1; each side may appear in several mappings.

use kurabe_ai::{EmbeddingBackend, embed_resilient, similarity};
use kurabe_core::comparison::{MappingMethod, SectionMapping};
use kurabe_core::document::{StructuredDocument, section_digest};
use tracing::{info, warn};

/// Map sections by name intersection, sorted, confidence 1.0.
pub fn map_sections_exact(
    doc1: &StructuredDocument,
    doc2: &StructuredDocument,
) -> Vec<SectionMapping> {
    let mappings: Vec<SectionMapping> = doc1
        .sections
        .keys()
        .filter(|name| doc2.sections.contains_key(*name))
        .map(|name| SectionMapping {
            doc1_section: name.clone(),
            doc2_section: name.clone(),
            confidence_score: 1.0,
            mapping_method: MappingMethod::Exact,
        })
        .collect();
    info!(count = mappings.len(), "exact section mapping");
    mappings
}

/// Map sections across differing structures via digest embeddings.
///
/// Each document-1 section takes its single best document-2 match with
/// similarity strictly above `threshold`; no match above threshold means no
/// mapping. Sections whose embedding batch failed are excluded rather than
/// failing the comparison.
pub async fn map_sections_semantic<E: EmbeddingBackend>(
    embedder: &E,
    doc1: &StructuredDocument,
    doc2: &StructuredDocument,
    threshold: f32,
) -> Vec<SectionMapping> {
    let (names1, digests1) = digest_texts(doc1);
    let (names2, digests2) = digest_texts(doc2);
    if names1.is_empty() || names2.is_empty() {
        return Vec::new();
    }

    let vecs1 = embed_resilient(embedder, &digests1).await;
    let vecs2 = embed_resilient(embedder, &digests2).await;

    // Candidates keep document-2 section order so ties resolve to the
    // first-encountered section.
    let (cand_idx, cand_vecs): (Vec<usize>, Vec<Vec<f32>>) = vecs2
        .iter()
        .enumerate()
        .filter_map(|(j, v)| v.as_ref().map(|v| (j, v.clone())))
        .unzip();

    let mut mappings = Vec::new();
    for (i, vec1) in vecs1.iter().enumerate() {
        let Some(vec1) = vec1 else {
            warn!(section = %names1[i], "section excluded from mapping: no embedding");
            continue;
        };
        if let Some((k, score)) = similarity::best_match(vec1, &cand_vecs)
            && score > threshold
        {
            mappings.push(SectionMapping {
                doc1_section: names1[i].clone(),
                doc2_section: names2[cand_idx[k]].clone(),
                confidence_score: f64::from(score),
                mapping_method: MappingMethod::Semantic,
            });
        }
    }

    info!(count = mappings.len(), threshold, "semantic section mapping");
    mappings
}

/// Map sections with the strategy matching the documents' filing types.
pub async fn map_sections<E: EmbeddingBackend>(
    embedder: &E,
    same_document_type: bool,
    doc1: &StructuredDocument,
    doc2: &StructuredDocument,
    threshold: f32,
) -> Vec<SectionMapping> {
    if same_document_type {
        map_sections_exact(doc1, doc2)
    } else {
        map_sections_semantic(embedder, doc1, doc2, threshold).await
    }
}

fn digest_texts(doc: &StructuredDocument) -> (Vec<String>, Vec<String>) {
    doc.sections
        .iter()
        .map(|(name, section)| (name.clone(), section_digest(name, section)))
        .unzip()
}
