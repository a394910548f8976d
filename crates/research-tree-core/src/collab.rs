//! Collaborator interfaces.
//!
//! The engine never searches, prompts, or embeds by itself. It receives
//! already-retrieved chunks and already-generated strings through these
//! traits. Timeouts and retries are the implementation's business; the
//! engine only decides what a failure leaves behind.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::RetrievedChunk;
use crate::tree::ResearchNode;

/// Evidence search.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Up to `top_k` hits for `query`, best first.
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<RetrievedChunk>>;
}

/// Question generation from evidence.
#[async_trait]
pub trait QuestionGenerator: Send + Sync {
    async fn generate_questions(&self, evidence: &[String], topic: &str) -> Result<Vec<String>>;
}

/// What a writer sees of a node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SectionContext {
    pub title: String,
    pub goals: Option<String>,
    pub questions: Vec<String>,
    pub evidence: Vec<String>,
    /// Already-written prose, used by summary and conclusion writers.
    pub content: Option<String>,
}

impl SectionContext {
    pub fn from_node(node: &ResearchNode) -> Self {
        Self {
            title: node.title.clone(),
            goals: node.goals.clone(),
            questions: node.question_texts(),
            evidence: node.chunk_texts(),
            content: node.content().map(str::to_string),
        }
    }
}

/// Prose generation.
#[async_trait]
pub trait ContentWriter: Send + Sync {
    async fn write_section(&self, ctx: &SectionContext) -> Result<String>;
    async fn write_summary(&self, ctx: &SectionContext) -> Result<String>;
    async fn write_conclusion(&self, ctx: &SectionContext) -> Result<String>;
}

/// Naming a new sub-section after the questions it groups.
#[async_trait]
pub trait TitleGenerator: Send + Sync {
    async fn title_from_cluster(&self, cluster: &[String]) -> Result<String>;
}

const MAX_TITLE_CHARS: usize = 120;

/// Deterministic title: the shortest question, trailing `?.:;` removed,
/// first letter upper-cased and the rest lower-cased, capped at 120 chars.
pub fn heuristic_title(cluster: &[String]) -> String {
    let Some(shortest) = cluster
        .iter()
        .map(|q| q.trim())
        .filter(|q| !q.is_empty())
        .min_by_key(|q| q.chars().count())
    else {
        return "Untitled Section".to_string();
    };
    let stripped = shortest.trim_end_matches(['?', '.', ':', ';']);
    let mut chars = stripped.chars();
    let titled: String = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => return "Untitled Section".to_string(),
    };
    titled.chars().take(MAX_TITLE_CHARS).collect()
}

/// [`TitleGenerator`] backed by [`heuristic_title`]. Never fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicTitler;

#[async_trait]
impl TitleGenerator for HeuristicTitler {
    async fn title_from_cluster(&self, cluster: &[String]) -> Result<String> {
        Ok(heuristic_title(cluster))
    }
}
