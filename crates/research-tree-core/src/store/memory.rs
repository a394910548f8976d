//! In-memory [`Store`] implementation for tests and embedding.
//!
//! Everything lives behind one `std::sync::RwLock`, so each operation is
//! atomic with respect to the others. Insertion order is kept for node rows
//! and associations to mirror `rowid` order in the SQLite backend.

use std::collections::{HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::ids::normalize_question;
use crate::models::{
    Chunk, NodeId, NodeRow, Question, QuestionId, QuestionSource, QuestionStatus, SessionId,
    SessionRow,
};
use crate::tree::ResearchTree;

use super::Store;

#[derive(Default)]
struct Inner {
    sessions: Vec<SessionRow>,
    nodes: Vec<NodeRow>,
    node_index: HashMap<NodeId, usize>,
    questions: HashMap<QuestionId, Question>,
    question_keys: HashMap<(SessionId, String), QuestionId>,
    chunks: HashMap<String, Chunk>,
    node_questions: Vec<(NodeId, QuestionId)>,
    node_question_set: HashSet<(NodeId, QuestionId)>,
    node_chunks: Vec<(NodeId, String)>,
    node_chunk_set: HashSet<(NodeId, String)>,
}

impl Inner {
    fn register_question(&mut self, session: SessionId, text: &str, source: QuestionSource) -> Question {
        let key = (session, normalize_question(text));
        if let Some(q) = self.question_keys.get(&key).and_then(|id| self.questions.get(id)) {
            return q.clone();
        }
        let q = Question::proposed(session, text, source);
        self.question_keys.insert(key, q.id);
        self.questions.insert(q.id, q.clone());
        q
    }

    fn link_question(&mut self, node: NodeId, id: QuestionId) -> bool {
        if !self.node_index.contains_key(&node) {
            warn!(node = %node, question = %id, "attach to unknown node skipped");
            return false;
        }
        let Some(q) = self.questions.get_mut(&id) else {
            warn!(node = %node, question = %id, "attach of unknown question skipped");
            return false;
        };
        q.status = q.status.advance(QuestionStatus::Assigned);
        if self.node_question_set.insert((node, id)) {
            self.node_questions.push((node, id));
            true
        } else {
            false
        }
    }

    fn link_chunk(&mut self, node: NodeId, chunk_id: &str) -> bool {
        if !self.node_index.contains_key(&node) {
            warn!(node = %node, chunk = chunk_id, "attach to unknown node skipped");
            return false;
        }
        if !self.chunks.contains_key(chunk_id) {
            warn!(node = %node, chunk = chunk_id, "attach of unknown chunk skipped");
            return false;
        }
        let pair = (node, chunk_id.to_string());
        if self.node_chunk_set.insert(pair.clone()) {
            self.node_chunks.push(pair);
            true
        } else {
            false
        }
    }

    fn upsert_node(&mut self, row: NodeRow) {
        match self.node_index.get(&row.id) {
            Some(&idx) => self.nodes[idx] = row,
            None => {
                self.node_index.insert(row.id, self.nodes.len());
                self.nodes.push(row);
            }
        }
    }

    /// Store a question carried by a saved tree and return the registry id
    /// it maps to. A text already registered under another id resolves to
    /// that id.
    fn merge_question(&mut self, q: &Question) -> QuestionId {
        if let Some(existing) = self.questions.get_mut(&q.id) {
            existing.status = existing.status.advance(q.status);
            return q.id;
        }
        let key = (q.session_id, q.key());
        if let Some(&id) = self.question_keys.get(&key) {
            warn!(question = %q.id, registered = %id, "question text already registered under another id");
            if let Some(existing) = self.questions.get_mut(&id) {
                existing.status = existing.status.advance(q.status);
            }
            return id;
        }
        self.question_keys.insert(key, q.id);
        self.questions.insert(q.id, q.clone());
        q.id
    }

    fn session_nodes(&self, session: SessionId) -> HashSet<NodeId> {
        self.nodes
            .iter()
            .filter(|n| n.session_id == session)
            .map(|n| n.id)
            .collect()
    }
}

/// In-memory store.
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Inner>> {
        self.inner.read().map_err(|_| anyhow!("in-memory store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>> {
        self.inner.write().map_err(|_| anyhow!("in-memory store lock poisoned"))
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn upsert_questions(
        &self,
        session: SessionId,
        texts: &[String],
        source: QuestionSource,
    ) -> Result<Vec<Question>> {
        let mut inner = self.write()?;
        let out: Vec<Question> = texts
            .iter()
            .filter(|t| !t.trim().is_empty())
            .map(|t| inner.register_question(session, t, source))
            .collect();
        debug!(session = %session, count = out.len(), source = %source, "questions upserted");
        Ok(out)
    }

    async fn attach_questions(&self, node: NodeId, ids: &[QuestionId]) -> Result<usize> {
        let mut inner = self.write()?;
        Ok(ids.iter().filter(|id| inner.link_question(node, **id)).count())
    }

    async fn mark_questions_consumed(&self, ids: &[QuestionId]) -> Result<usize> {
        let mut inner = self.write()?;
        let mut changed = 0;
        for id in ids {
            if let Some(q) = inner.questions.get_mut(id) {
                if q.status == QuestionStatus::Assigned {
                    q.status = QuestionStatus::Consumed;
                    changed += 1;
                }
            }
        }
        Ok(changed)
    }

    async fn questions_for_node(&self, node: NodeId) -> Result<Vec<Question>> {
        let inner = self.read()?;
        Ok(inner
            .node_questions
            .iter()
            .filter(|(n, _)| *n == node)
            .filter_map(|(_, q)| inner.questions.get(q).cloned())
            .collect())
    }

    async fn upsert_chunks(&self, chunks: &[Chunk]) -> Result<usize> {
        let mut inner = self.write()?;
        let mut inserted = 0;
        for c in chunks {
            if !inner.chunks.contains_key(&c.id) {
                inner.chunks.insert(c.id.clone(), c.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    async fn attach_chunks(&self, node: NodeId, ids: &[String]) -> Result<usize> {
        let mut inner = self.write()?;
        Ok(ids.iter().filter(|id| inner.link_chunk(node, id)).count())
    }

    async fn chunks_for_node(&self, node: NodeId) -> Result<Vec<Chunk>> {
        let inner = self.read()?;
        Ok(inner
            .node_chunks
            .iter()
            .filter(|(n, _)| *n == node)
            .filter_map(|(_, c)| inner.chunks.get(c).cloned())
            .collect())
    }

    async fn save_tree(&self, tree: &ResearchTree) -> Result<()> {
        let mut inner = self.write()?;
        match inner.sessions.iter().position(|s| s.id == tree.id) {
            Some(idx) => inner.sessions[idx].query = tree.query.clone(),
            None => inner.sessions.push(SessionRow {
                id: tree.id,
                query: tree.query.clone(),
                created_at: chrono::Utc::now().timestamp(),
            }),
        }

        for node in tree.nodes() {
            inner.upsert_node(node.to_row(tree.id));
            for chunk in node.chunks() {
                if !inner.chunks.contains_key(&chunk.id) {
                    inner.chunks.insert(chunk.id.clone(), chunk.clone());
                }
                inner.link_chunk(node.id, &chunk.id);
            }
            for q in node.questions() {
                let id = inner.merge_question(q);
                inner.link_question(node.id, id);
            }
        }
        debug!(session = %tree.id, nodes = tree.len(), "tree saved");
        Ok(())
    }

    async fn session(&self, id: SessionId) -> Result<Option<SessionRow>> {
        Ok(self.read()?.sessions.iter().find(|s| s.id == id).cloned())
    }

    async fn node_rows(&self, session: SessionId) -> Result<Vec<NodeRow>> {
        Ok(self
            .read()?
            .nodes
            .iter()
            .filter(|n| n.session_id == session)
            .cloned()
            .collect())
    }

    async fn question_links(&self, session: SessionId) -> Result<Vec<(NodeId, Question)>> {
        let inner = self.read()?;
        let nodes = inner.session_nodes(session);
        Ok(inner
            .node_questions
            .iter()
            .filter(|(n, _)| nodes.contains(n))
            .filter_map(|(n, q)| inner.questions.get(q).map(|q| (*n, q.clone())))
            .collect())
    }

    async fn chunk_links(&self, session: SessionId) -> Result<Vec<(NodeId, Chunk)>> {
        let inner = self.read()?;
        let nodes = inner.session_nodes(session);
        Ok(inner
            .node_chunks
            .iter()
            .filter(|(n, _)| nodes.contains(n))
            .filter_map(|(n, c)| inner.chunks.get(c).map(|c| (*n, c.clone())))
            .collect())
    }

    async fn list_sessions(&self) -> Result<Vec<SessionRow>> {
        Ok(self.read()?.sessions.clone())
    }
}

/// Test helper: insert a raw node row without going through a tree.
#[cfg(test)]
impl InMemoryStore {
    pub(crate) fn insert_raw(&self, session: SessionRow, rows: Vec<NodeRow>) {
        let mut inner = self.inner.write().unwrap();
        if !inner.sessions.iter().any(|s| s.id == session.id) {
            inner.sessions.push(session);
        }
        for row in rows {
            inner.upsert_node(row);
        }
    }

    pub(crate) fn question_count(&self) -> usize {
        self.inner.read().unwrap().questions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::ResearchNode;
    use uuid::Uuid;

    async fn saved_tree(store: &InMemoryStore) -> (ResearchTree, NodeId) {
        let mut tree = ResearchTree::new("Black holes");
        let root = tree.root_id();
        let section = tree.add_child(root, ResearchNode::new("Formation")).unwrap();
        store.save_tree(&tree).await.unwrap();
        (tree, section)
    }

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_upsert_questions_dedups_on_normalized_text() {
        let store = InMemoryStore::new();
        let session = Uuid::new_v4();
        let first = store
            .upsert_questions(session, &texts(&["Why?", "How?"]), QuestionSource::Outline)
            .await
            .unwrap();
        let second = store
            .upsert_questions(session, &texts(&["  why? ", "", "When?"]), QuestionSource::Expansion)
            .await
            .unwrap();
        assert_eq!(second.len(), 2);
        assert_eq!(second[0].id, first[0].id);
        assert_eq!(second[0].source, QuestionSource::Outline);
        assert_eq!(store.question_count(), 3);

        // a different session has its own dedup scope
        let other = store
            .upsert_questions(Uuid::new_v4(), &texts(&["Why?"]), QuestionSource::Outline)
            .await
            .unwrap();
        assert_ne!(other[0].id, first[0].id);
    }

    #[tokio::test]
    async fn test_status_moves_forward_only() {
        let store = InMemoryStore::new();
        let (tree, section) = saved_tree(&store).await;
        let qs = store
            .upsert_questions(tree.id, &texts(&["Why?", "How?"]), QuestionSource::Expansion)
            .await
            .unwrap();
        let ids: Vec<QuestionId> = qs.iter().map(|q| q.id).collect();

        // proposed questions are not consumed
        assert_eq!(store.mark_questions_consumed(&ids).await.unwrap(), 0);

        assert_eq!(store.attach_questions(section, &ids).await.unwrap(), 2);
        assert_eq!(store.attach_questions(section, &ids).await.unwrap(), 0);
        assert_eq!(store.mark_questions_consumed(&ids[..1]).await.unwrap(), 1);

        // re-attaching a consumed question leaves it consumed
        store.attach_questions(tree.root_id(), &ids).await.unwrap();
        let listed = store.questions_for_node(section).await.unwrap();
        assert_eq!(listed[0].status, QuestionStatus::Consumed);
        assert_eq!(listed[1].status, QuestionStatus::Assigned);

        // saving a stale in-memory view does not move it back
        store.save_tree(&tree).await.unwrap();
        let listed = store.questions_for_node(section).await.unwrap();
        assert_eq!(listed[0].status, QuestionStatus::Consumed);
    }

    #[tokio::test]
    async fn test_chunk_upsert_is_idempotent() {
        let store = InMemoryStore::new();
        let (_, section) = saved_tree(&store).await;
        let chunks = vec![Chunk::new("alpha"), Chunk::new("beta"), Chunk::new("alpha")];
        assert_eq!(store.upsert_chunks(&chunks).await.unwrap(), 2);
        assert_eq!(store.upsert_chunks(&chunks).await.unwrap(), 0);

        let ids: Vec<String> = chunks.iter().map(|c| c.id.clone()).collect();
        assert_eq!(store.attach_chunks(section, &ids).await.unwrap(), 2);
        assert_eq!(store.attach_chunks(section, &ids).await.unwrap(), 0);
        let listed = store.chunks_for_node(section).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].text, "alpha");
    }

    #[tokio::test]
    async fn test_unknown_ids_are_skipped() {
        let store = InMemoryStore::new();
        let (_, section) = saved_tree(&store).await;
        assert_eq!(store.attach_questions(section, &[Uuid::new_v4()]).await.unwrap(), 0);
        assert_eq!(
            store.attach_chunks(section, &["missing".to_string()]).await.unwrap(),
            0
        );
        assert_eq!(
            store
                .attach_chunks(Uuid::new_v4(), &[Chunk::new("x").id])
                .await
                .unwrap(),
            0
        );
    }
}
