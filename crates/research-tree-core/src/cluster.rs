//! Similarity functions and greedy topic clustering.
//!
//! A [`Similarity`] scores two strings in `[0, 1]`, higher meaning more
//! alike. Two implementations ship here:
//!
//! - [`LexicalRatio`]: `2·M / T` over characters, where `M` is the length of
//!   the longest common subsequence and `T` the combined length, computed on
//!   trimmed, lowercased text.
//! - [`EmbeddingCosine`]: cosine similarity over vectors supplied by an
//!   external embedder, clamped to `[0, 1]`.
//!
//! [`group_similar`] is a single pass over the input: each item joins the
//! existing cluster holding its most similar member when that score reaches
//! the threshold, otherwise it starts a new cluster. The result depends on
//! input order; callers that need stable output must fix the order.

use std::collections::HashMap;

use similar::TextDiff;

use crate::ids::normalize_question;

/// Pairwise similarity in `[0, 1]`.
pub trait Similarity: Send + Sync {
    fn score(&self, a: &str, b: &str) -> f64;
}

impl<F> Similarity for F
where
    F: Fn(&str, &str) -> f64 + Send + Sync,
{
    fn score(&self, a: &str, b: &str) -> f64 {
        self(a, b)
    }
}

/// Character-level matching ratio over normalized text.
#[derive(Debug, Clone, Copy, Default)]
pub struct LexicalRatio;

impl Similarity for LexicalRatio {
    fn score(&self, a: &str, b: &str) -> f64 {
        let a = normalize_question(a);
        let b = normalize_question(b);
        if a.is_empty() && b.is_empty() {
            return 1.0;
        }
        if a == b {
            return 1.0;
        }
        TextDiff::from_chars(a.as_str(), b.as_str()).ratio() as f64
    }
}

/// Cosine similarity over precomputed embeddings, keyed by normalized text.
/// Texts without an embedding score 0 against everything.
#[derive(Debug, Clone, Default)]
pub struct EmbeddingCosine {
    vectors: HashMap<String, Vec<f32>>,
}

impl EmbeddingCosine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, text: &str, vector: Vec<f32>) {
        self.vectors.insert(normalize_question(text), vector);
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }
}

impl FromIterator<(String, Vec<f32>)> for EmbeddingCosine {
    fn from_iter<I: IntoIterator<Item = (String, Vec<f32>)>>(iter: I) -> Self {
        let mut out = Self::new();
        for (text, vector) in iter {
            out.insert(&text, vector);
        }
        out
    }
}

impl Similarity for EmbeddingCosine {
    fn score(&self, a: &str, b: &str) -> f64 {
        match (
            self.vectors.get(&normalize_question(a)),
            self.vectors.get(&normalize_question(b)),
        ) {
            (Some(va), Some(vb)) => (cosine_similarity(va, vb) as f64).clamp(0.0, 1.0),
            _ => 0.0,
        }
    }
}

/// Cosine similarity of two vectors. Zero-norm or mismatched vectors give 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut na = 0.0f32;
    let mut nb = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    let denom = na.sqrt() * nb.sqrt();
    if denom == 0.0 {
        0.0
    } else {
        dot / denom
    }
}

/// Greedy single-pass clustering over arbitrary items.
///
/// `text` extracts the string each item is compared on. Items whose text is
/// blank are dropped. Ties between clusters go to the earliest cluster.
pub fn group_similar_by<T, F>(
    items: impl IntoIterator<Item = T>,
    text: F,
    sim: &dyn Similarity,
    threshold: f64,
) -> Vec<Vec<T>>
where
    F: Fn(&T) -> &str,
{
    let mut clusters: Vec<Vec<T>> = Vec::new();
    for item in items {
        let candidate = text(&item);
        if candidate.trim().is_empty() {
            continue;
        }
        let mut best: Option<(usize, f64)> = None;
        for (idx, cluster) in clusters.iter().enumerate() {
            let score = cluster
                .iter()
                .map(|member| sim.score(candidate, text(member)))
                .fold(0.0f64, f64::max);
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((idx, score));
            }
        }
        match best {
            Some((idx, score)) if score >= threshold => clusters[idx].push(item),
            _ => clusters.push(vec![item]),
        }
    }
    clusters
}

/// [`group_similar_by`] over plain strings.
pub fn group_similar(items: &[String], sim: &dyn Similarity, threshold: f64) -> Vec<Vec<String>> {
    group_similar_by(items.iter().cloned(), |s| s.as_str(), sim, threshold)
}
