//! Storage abstraction for research trees.
//!
//! The [`Store`] trait covers the two registries (questions and chunks) and
//! the flat node table that trees are saved into and rebuilt from. Backends
//! are pluggable: [`memory::InMemoryStore`] here, a SQLite store in the
//! application crate.
//!
//! Registry writes are idempotent and safe to retry. Attaching an id the
//! registry does not know is logged and skipped rather than failing, so a
//! partially retried save never errors on its own earlier work.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Chunk, NodeId, NodeRow, Question, QuestionId, QuestionSource, SessionId, SessionRow};
use crate::tree::ResearchTree;

/// Abstract storage backend.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`upsert_questions`](Store::upsert_questions) | Register question texts, dedup on normalized text |
/// | [`attach_questions`](Store::attach_questions) | Link questions to a node, `Proposed` → `Assigned` |
/// | [`mark_questions_consumed`](Store::mark_questions_consumed) | `Assigned` → `Consumed` |
/// | [`questions_for_node`](Store::questions_for_node) | A node's questions in attachment order |
/// | [`upsert_chunks`](Store::upsert_chunks) | Insert-if-absent by chunk id |
/// | [`attach_chunks`](Store::attach_chunks) | Link chunks to a node |
/// | [`chunks_for_node`](Store::chunks_for_node) | A node's chunks in attachment order |
/// | [`save_tree`](Store::save_tree) | Persist a whole tree in one unit |
/// | [`session`](Store::session) / [`node_rows`](Store::node_rows) | Raw rows for loading |
/// | [`question_links`](Store::question_links) / [`chunk_links`](Store::chunk_links) | Bulk association fetch |
/// | [`list_sessions`](Store::list_sessions) | Every stored tree |
#[async_trait]
pub trait Store: Send + Sync {
    /// Register question texts for a session.
    ///
    /// Returns one registry record per non-blank input, in input order.
    /// Texts whose normalized form is already registered return the
    /// existing record with its status untouched.
    async fn upsert_questions(
        &self,
        session: SessionId,
        texts: &[String],
        source: QuestionSource,
    ) -> Result<Vec<Question>>;

    /// Link questions to a node, ignoring links that already exist, and
    /// move every linked `Proposed` question to `Assigned`.
    ///
    /// Returns the number of new links.
    async fn attach_questions(&self, node: NodeId, ids: &[QuestionId]) -> Result<usize>;

    /// Move `Assigned` questions to `Consumed`. Other statuses are left as
    /// they are. Returns the number of questions that changed.
    async fn mark_questions_consumed(&self, ids: &[QuestionId]) -> Result<usize>;

    async fn questions_for_node(&self, node: NodeId) -> Result<Vec<Question>>;

    /// Insert chunks that are not stored yet. Existing chunks are never
    /// updated. Returns the number inserted.
    async fn upsert_chunks(&self, chunks: &[Chunk]) -> Result<usize>;

    /// Link chunks to a node, ignoring links that already exist.
    async fn attach_chunks(&self, node: NodeId, ids: &[String]) -> Result<usize>;

    async fn chunks_for_node(&self, node: NodeId) -> Result<Vec<Chunk>>;

    /// Persist `tree` as one unit: session metadata, every node (parents
    /// first), every hydrated chunk and question, and every association.
    /// Question statuses only ever move forward.
    async fn save_tree(&self, tree: &ResearchTree) -> Result<()>;

    async fn session(&self, id: SessionId) -> Result<Option<SessionRow>>;

    /// All node rows of a session, in storage order.
    async fn node_rows(&self, session: SessionId) -> Result<Vec<NodeRow>>;

    /// Every `(node, question)` association of a session, in attachment order.
    async fn question_links(&self, session: SessionId) -> Result<Vec<(NodeId, Question)>>;

    /// Every `(node, chunk)` association of a session, in attachment order.
    async fn chunk_links(&self, session: SessionId) -> Result<Vec<(NodeId, Chunk)>>;

    /// Every session, oldest first.
    async fn list_sessions(&self) -> Result<Vec<SessionRow>>;
}
