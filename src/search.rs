use serde::Serialize;
use tracing::debug;

use crate::{
    config::SearchParams,
    document::Document,
    embedding::{Embedding, Encoders, Modality},
};

/// A document together with the score it ranked by.
#[derive(Debug, Clone, Copy)]
pub struct RankedDocument<'a> {
    pub document: &'a Document,
    pub score: f32,
}

/// Cosine similarity of two vectors.
///
/// Zero-magnitude vectors, mismatched lengths and non-finite results all
/// score 0, so a degenerate embedding can never produce NaN.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    let similarity = dot / (norm_a.sqrt() * norm_b.sqrt());
    if similarity.is_finite() { similarity } else { 0.0 }
}

/// Ranks documents against free-text queries in both modalities.
///
/// The query is embedded once with the text encoder and once with the image
/// encoder's text input. Each document scores the best similarity among all
/// its embeddings, with image similarities scaled by
/// [`SearchParams::image_weight`] first.
#[derive(Debug, Clone)]
pub struct SearchEngine {
    encoders: Encoders,
}

impl SearchEngine {
    pub fn new(encoders: Encoders) -> Self {
        Self { encoders }
    }

    /// Documents ranked best first, at most `params.top_k` of them.
    ///
    /// Documents without embeddings never appear. Equal scores keep the
    /// order of `documents`. Never fails: an empty query, an empty document
    /// set or a query no encoder can embed yields an empty list.
    pub fn rank<'a>(
        &self,
        query: &str,
        documents: &'a [Document],
        params: &SearchParams,
    ) -> Vec<RankedDocument<'a>> {
        let query = query.trim();
        if query.is_empty() || params.top_k == 0 || documents.is_empty() {
            return Vec::new();
        }

        let text_query = self.embed_query(Modality::Text, query);
        let image_query = self.embed_query(Modality::Image, query);

        let mut ranked: Vec<RankedDocument<'a>> = documents
            .iter()
            .filter(|document| !document.is_empty())
            .filter_map(|document| {
                let text_scores = best_match(
                    text_query.as_deref(),
                    &document.text_embeddings,
                    1.0,
                );
                let image_scores = best_match(
                    image_query.as_deref(),
                    &document.image_embeddings,
                    params.image_weight,
                );
                let score = match (text_scores, image_scores) {
                    (Some(t), Some(i)) => t.max(i),
                    (Some(s), None) | (None, Some(s)) => s,
                    (None, None) => return None,
                };
                Some(RankedDocument { document, score })
            })
            .collect();

        // Stable, so ties keep input order.
        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
        ranked.truncate(params.top_k);

        debug!(query, results = ranked.len(), "ranked documents");
        ranked
    }

    /// [`SearchEngine::rank`] without the scores.
    pub fn search<'a>(
        &self,
        query: &str,
        documents: &'a [Document],
        params: &SearchParams,
    ) -> Vec<&'a Document> {
        self.rank(query, documents, params)
            .into_iter()
            .map(|r| r.document)
            .collect()
    }

    fn embed_query(
        &self,
        modality: Modality,
        query: &str,
    ) -> Option<Embedding> {
        let result = match modality {
            Modality::Text => self.encoders.text.encode_text(query),
            Modality::Image => self.encoders.image.encode_text(query),
        };
        match result {
            Ok(embedding) => Some(embedding),
            Err(e) => {
                debug!(%modality, error = %e, "query not embedded");
                None
            }
        }
    }
}

/// Best weighted similarity of `query` against `candidates`, if there is
/// anything to compare.
fn best_match(
    query: Option<&[f32]>,
    candidates: &[Embedding],
    weight: f32,
) -> Option<f32> {
    let query = query?;
    candidates
        .iter()
        .map(|candidate| cosine_similarity(query, candidate) * weight)
        .reduce(f32::max)
}

#[derive(Serialize)]
struct JsonResult<'a> {
    rank: usize,
    score: f32,
    path: &'a std::path::Path,
}

#[derive(Serialize)]
struct JsonOutput<'a> {
    query: &'a str,
    result_count: usize,
    results: Vec<JsonResult<'a>>,
}

/// Format results for human-readable terminal output.
pub fn format_human(results: &[RankedDocument<'_>]) {
    if results.is_empty() {
        println!("No results found.");
        return;
    }

    for (i, r) in results.iter().enumerate() {
        println!(
            "{:>3}. [{:.3}] {}",
            i + 1,
            r.score,
            r.document.path.display()
        );
    }
    println!("\n{} result(s)", results.len());
}

/// Render results as a JSON document.
pub fn to_json(
    results: &[RankedDocument<'_>],
    query: &str,
) -> serde_json::Result<String> {
    let output = JsonOutput {
        query,
        result_count: results.len(),
        results: results
            .iter()
            .enumerate()
            .map(|(i, r)| JsonResult {
                rank: i + 1,
                score: r.score,
                path: &r.document.path,
            })
            .collect(),
    };
    serde_json::to_string(&output)
}
