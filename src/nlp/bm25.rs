//! Okapi BM25 over a small in-request candidate set.
//!
//! Parameters match the classic formulation (k1 = 1.5, b = 0.75) with the
//! negative-IDF floor: rare-term IDFs below zero are clamped to
//! `epsilon * average_idf` so common query words cannot subtract score.

use std::collections::HashMap;

const K1: f64 = 1.5;
const B: f64 = 0.75;
const EPSILON: f64 = 0.25;

/// Whitespace tokenizer over lowercased text. The ranker scores exactly
/// what the filter saw, so both share this.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(|s| s.to_string())
        .collect()
}

pub struct Bm25 {
    doc_freqs: Vec<HashMap<String, usize>>,
    idf: HashMap<String, f64>,
    doc_len: Vec<usize>,
    avgdl: f64,
}

impl Bm25 {
    pub fn new(corpus: &[Vec<String>]) -> Self {
        let doc_count = corpus.len();
        let mut doc_freqs: Vec<HashMap<String, usize>> = Vec::with_capacity(doc_count);
        let mut df: HashMap<String, usize> = HashMap::new();
        let mut doc_len = Vec::with_capacity(doc_count);

        for doc in corpus {
            doc_len.push(doc.len());
            let mut freqs: HashMap<String, usize> = HashMap::new();
            for tok in doc {
                *freqs.entry(tok.clone()).or_insert(0) += 1;
            }
            for term in freqs.keys() {
                *df.entry(term.clone()).or_insert(0) += 1;
            }
            doc_freqs.push(freqs);
        }

        let avgdl = if doc_count == 0 {
            0.0
        } else {
            doc_len.iter().sum::<usize>() as f64 / doc_count as f64
        };

        // IDF with floor: ln((N - df + 0.5) / (df + 0.5)), negatives clamped.
        let n = doc_count as f64;
        let mut idf: HashMap<String, f64> = HashMap::with_capacity(df.len());
        let mut idf_sum = 0.0;
        let mut negative: Vec<String> = Vec::new();
        for (term, freq) in &df {
            let val = ((n - *freq as f64 + 0.5) / (*freq as f64 + 0.5)).ln();
            idf_sum += val;
            if val < 0.0 {
                negative.push(term.clone());
            }
            idf.insert(term.clone(), val);
        }
        let average_idf = if idf.is_empty() { 0.0 } else { idf_sum / idf.len() as f64 };
        let floor = EPSILON * average_idf;
        for term in negative {
            idf.insert(term, floor);
        }

        Self {
            doc_freqs,
            idf,
            doc_len,
            avgdl,
        }
    }

    /// Score every document against the query tokens.
    pub fn scores(&self, query: &[String]) -> Vec<f64> {
        let mut out = vec![0.0; self.doc_freqs.len()];
        if self.avgdl == 0.0 {
            return out;
        }
        for (i, freqs) in self.doc_freqs.iter().enumerate() {
            let dl = self.doc_len[i] as f64;
            for term in query {
                let Some(&f) = freqs.get(term) else { continue };
                let idf = self.idf.get(term).copied().unwrap_or(0.0);
                let f = f as f64;
                out[i] += idf * (f * (K1 + 1.0)) / (f + K1 * (1.0 - B + B * dl / self.avgdl));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_doc_outscores_unrelated_doc() {
        let corpus = vec![
            tokenize("church choir festival in chennai"),
            tokenize("quarterly smartphone shipment numbers"),
            tokenize("gospel concert brings church groups together"),
        ];
        let bm25 = Bm25::new(&corpus);
        let scores = bm25.scores(&tokenize("church gospel"));
        assert!(scores[2] > scores[1]);
        assert!(scores[0] > scores[1]);
    }

    #[test]
    fn empty_corpus_yields_no_scores() {
        let bm25 = Bm25::new(&[]);
        assert!(bm25.scores(&tokenize("anything")).is_empty());
    }

    #[test]
    fn scores_len_matches_corpus_len() {
        for n in [1usize, 5, 100] {
            let corpus: Vec<Vec<String>> =
                (0..n).map(|i| tokenize(&format!("doc number {}", i))).collect();
            let bm25 = Bm25::new(&corpus);
            assert_eq!(bm25.scores(&tokenize("doc")).len(), n);
        }
    }
}
