//! Optional dense-embedding support for the hybrid ranker.
//!
//! The model is loaded once at startup when `EMBED_MODEL` points at a
//! model2vec model; otherwise the ranker runs keyword-only and the vector
//! component contributes zero.

use anyhow::{Context, Result};
use model2vec_rs::model::StaticModel;
use std::sync::Arc;
use tracing::info;

pub fn load_embedder(model_id: &str) -> Result<Arc<StaticModel>> {
    let model = StaticModel::from_pretrained(model_id, None, None, None)
        .with_context(|| format!("failed to load embedding model '{}'", model_id))?;
    let dim = model.encode_single("dimension probe").len();
    info!("embedding model '{}' loaded ({} dims)", model_id, dim);
    Ok(Arc::new(model))
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let mut dot = 0.0f64;
    let mut na = 0.0f64;
    let mut nb = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += (*x as f64) * (*y as f64);
        na += (*x as f64) * (*x as f64);
        nb += (*y as f64) * (*y as f64);
    }
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot / (na.sqrt() * nb.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_bounds() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-9);
        assert!((cosine_similarity(&[1.0, 0.0], &[0.0, 1.0])).abs() < 1e-9);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
    }
}
