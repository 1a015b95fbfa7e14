//! Hybrid re-ranking: lexical BM25 dominates, an optional dense-vector
//! signal refines, small quality boosts break ties, and the archive penalty
//! can eject a result on its own.
//!
//! Weights are deliberate: keeping the vector share capped means a missing
//! or failed embedder still yields a usable ordering.

use crate::core::types::Hit;
use crate::nlp::bm25::{tokenize, Bm25};
use crate::nlp::embed::cosine_similarity;
use model2vec_rs::model::StaticModel;
use std::sync::Arc;
use tracing::debug;

const W_BM25: f64 = 0.45;
const W_VEC: f64 = 0.30;
const W_QUAL: f64 = 0.15;
const W_PENALTY: f64 = 0.50;

#[derive(Clone, Default)]
pub struct HybridRanker {
    embedder: Option<Arc<StaticModel>>,
}

impl HybridRanker {
    pub fn new(embedder: Option<Arc<StaticModel>>) -> Self {
        Self { embedder }
    }

    /// Re-rank in place. Input order is the tiebreaker: the sort is stable,
    /// so equal-scoring hits keep their insertion order.
    pub fn rank(&self, mut hits: Vec<Hit>, query: &str) -> Vec<Hit> {
        if hits.is_empty() {
            return hits;
        }

        let corpus: Vec<String> = hits
            .iter()
            .map(|h| format!("{} {}", h.title, h.snippet))
            .collect();
        let tokenized: Vec<Vec<String>> = corpus.iter().map(|d| tokenize(d)).collect();

        let bm25 = Bm25::new(&tokenized);
        let norm_bm25 = min_max_normalize(&bm25.scores(&tokenize(query)));
        let norm_vector = self.vector_scores(&corpus, query);

        let query_lower = query.to_lowercase();
        for (i, hit) in hits.iter_mut().enumerate() {
            let s_bm25 = norm_bm25[i];
            let s_vec = norm_vector[i];

            let mut s_qual = 0.0;
            let host = url::Url::parse(&hit.url)
                .ok()
                .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()))
                .unwrap_or_default();
            if query_lower.contains("site:.edu") || host.ends_with(".edu") {
                s_qual += 0.5;
            }
            if query_lower.contains("site:.org") || host.ends_with(".org") {
                s_qual += 0.3;
            }
            if hit.snippet.len() > 50 {
                s_qual += 0.2;
            }

            let mut s_penalty = 0.0;
            if hit.title.to_lowercase().contains("archives") {
                s_penalty += 1.0;
            }

            let hybrid = W_BM25 * s_bm25 + W_VEC * s_vec + W_QUAL * s_qual - W_PENALTY * s_penalty;

            hit.scores.bm25 = s_bm25;
            hit.scores.vector = s_vec;
            hit.scores.quality = s_qual;
            hit.scores.penalty = s_penalty;
            hit.scores.hybrid = hybrid;
            hit.debug_score = Some(hybrid);
        }

        hits.sort_by(|a, b| {
            b.scores
                .hybrid
                .partial_cmp(&a.scores.hybrid)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        if let Some(top) = hits.first() {
            debug!(
                "ranked {} hits, top score {:.3}",
                hits.len(),
                top.scores.hybrid
            );
        }
        hits
    }

    /// Dense similarity per document, min-max normalized. Zeroes in
    /// keyword-only mode.
    fn vector_scores(&self, corpus: &[String], query: &str) -> Vec<f64> {
        let Some(model) = &self.embedder else {
            return vec![0.0; corpus.len()];
        };

        let q_vec = model.encode_single(query);
        let raw: Vec<f64> = corpus
            .iter()
            .map(|doc| cosine_similarity(&q_vec, &model.encode_single(doc)))
            .collect();
        min_max_normalize(&raw)
    }
}

fn min_max_normalize(scores: &[f64]) -> Vec<f64> {
    if scores.is_empty() {
        return Vec::new();
    }
    let min = scores.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = scores.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if (max - min).abs() < f64::EPSILON {
        return vec![1.0; scores.len()];
    }
    scores.iter().map(|s| (s - min) / (max - min)).collect()
}
