//! Core data models shared by the engine, the store backends, and the CLI.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::ids;

/// Identifies one research tree (one user query / session).
pub type SessionId = Uuid;
/// Identifies a node within a research tree.
pub type NodeId = Uuid;
/// Identifies a registered question.
pub type QuestionId = Uuid;

/// A retrieved evidence fragment.
///
/// Immutable once created. `id` is the upstream search id when one was
/// supplied, otherwise the SHA-256 of `text`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub text: String,
    pub page: Option<i64>,
    pub source: Option<String>,
}

impl Chunk {
    /// A chunk with no provenance, identified by its content hash.
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            id: ids::chunk_id(&text),
            text,
            page: None,
            source: None,
        }
    }
}

impl From<RetrievedChunk> for Chunk {
    fn from(hit: RetrievedChunk) -> Self {
        Self {
            id: ids::resolve_chunk_id(hit.id.as_deref(), &hit.text),
            text: hit.text,
            page: hit.page,
            source: hit.source,
        }
    }
}

/// One hit returned by the retrieval collaborator, before id resolution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub text: String,
    #[serde(default)]
    pub page: Option<i64>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
}

/// Where a question came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionSource {
    /// Sub-questions generated from the root query's evidence.
    RootSubq,
    /// Questions that came with an outline section.
    Outline,
    /// Questions generated while expanding a node with new evidence.
    Expansion,
}

impl QuestionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionSource::RootSubq => "root_subq",
            QuestionSource::Outline => "outline",
            QuestionSource::Expansion => "expansion",
        }
    }
}

impl fmt::Display for QuestionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuestionSource {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "root_subq" => Ok(QuestionSource::RootSubq),
            "outline" => Ok(QuestionSource::Outline),
            "expansion" => Ok(QuestionSource::Expansion),
            other => anyhow::bail!(
                "Unknown question source: '{}'. Must be root_subq, outline, or expansion.",
                other
            ),
        }
    }
}

/// Question lifecycle. The ordering is the lifecycle order and transitions
/// only ever move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionStatus {
    Proposed,
    Assigned,
    Consumed,
}

impl QuestionStatus {
    /// Storage code; preserves the lifecycle order.
    pub fn code(&self) -> i64 {
        match self {
            QuestionStatus::Proposed => 0,
            QuestionStatus::Assigned => 1,
            QuestionStatus::Consumed => 2,
        }
    }

    pub fn from_code(code: i64) -> anyhow::Result<Self> {
        match code {
            0 => Ok(QuestionStatus::Proposed),
            1 => Ok(QuestionStatus::Assigned),
            2 => Ok(QuestionStatus::Consumed),
            other => anyhow::bail!("Invalid question status code: {}", other),
        }
    }

    /// The later of two statuses.
    pub fn advance(self, to: QuestionStatus) -> QuestionStatus {
        self.max(to)
    }
}

impl fmt::Display for QuestionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            QuestionStatus::Proposed => "proposed",
            QuestionStatus::Assigned => "assigned",
            QuestionStatus::Consumed => "consumed",
        };
        f.write_str(s)
    }
}

/// A registered question, unique per session by normalized text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub session_id: SessionId,
    pub text: String,
    pub source: QuestionSource,
    pub status: QuestionStatus,
}

impl Question {
    /// A fresh `Proposed` question.
    pub fn proposed(session_id: SessionId, text: &str, source: QuestionSource) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id,
            text: text.trim().to_string(),
            source,
            status: QuestionStatus::Proposed,
        }
    }

    /// Dedup key.
    pub fn key(&self) -> String {
        ids::normalize_question(&self.text)
    }
}

/// Session metadata row: one per research tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionRow {
    pub id: SessionId,
    pub query: String,
    pub created_at: i64,
}

/// Flat storage form of a node: scalar fields plus the parent link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRow {
    pub id: NodeId,
    pub session_id: SessionId,
    pub parent_id: Option<NodeId>,
    pub title: String,
    pub goals: Option<String>,
    pub content: Option<String>,
    pub summary: Option<String>,
    pub conclusion: Option<String>,
    pub rank: u32,
    pub level: u32,
    pub is_final: bool,
}
