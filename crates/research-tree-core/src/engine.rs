//! The research engine: the operations the service layer calls.
//!
//! Every operation loads the tree from the [`Store`], works on the
//! in-memory arena, and writes back through the registries or a whole-tree
//! save. Collaborators are passed per call so one engine can serve callers
//! with different backends.
//!
//! Operations on one node are expected to be serialized by the caller. The
//! engine takes no locks of its own.

use std::collections::BTreeMap;

use anyhow::Result;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cluster::{LexicalRatio, Similarity};
use crate::collab::{
    heuristic_title, ContentWriter, QuestionGenerator, Retriever, SectionContext, TitleGenerator,
};
use crate::deepen::{apply_deepen, plan_deepen, DeepenPlan, DeepenPolicy};
use crate::error::TreeError;
use crate::models::{
    Chunk, NodeId, Question, QuestionId, QuestionSource, QuestionStatus, SessionId, SessionRow,
};
use crate::outline::{self, Outline};
use crate::render;
use crate::repository;
use crate::selector::NodeSelector;
use crate::serialize::{serialize_tree, SerializedTree};
use crate::store::Store;
use crate::tree::ResearchTree;

/// Tunables for growing trees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EnginePolicy {
    pub deepen: DeepenPolicy,
    /// Default number of chunks requested per expand.
    pub top_k: usize,
}

impl Default for EnginePolicy {
    fn default() -> Self {
        Self {
            deepen: DeepenPolicy::default(),
            top_k: 5,
        }
    }
}

/// Result of an expand. Chunks stay committed even when question
/// generation fails; the failure is reported in `question_error`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExpandOutcome {
    pub node_id: Option<NodeId>,
    pub new_chunks: Vec<Chunk>,
    pub new_questions: Vec<Question>,
    pub question_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeepenOutcome {
    Deepened { created: Vec<(NodeId, String)> },
    Skipped { reason: String },
}

impl DeepenOutcome {
    pub fn created_titles(&self) -> Vec<&str> {
        match self {
            DeepenOutcome::Deepened { created } => created.iter().map(|(_, t)| t.as_str()).collect(),
            DeepenOutcome::Skipped { .. } => Vec::new(),
        }
    }
}

/// Summary and conclusion written by [`ResearchEngine::complete_section`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletedSection {
    pub node_id: NodeId,
    pub summary: String,
    pub conclusion: String,
}

pub struct ResearchEngine<S: Store> {
    store: S,
    similarity: Box<dyn Similarity>,
    policy: EnginePolicy,
}

impl<S: Store> ResearchEngine<S> {
    /// An engine with lexical similarity and default thresholds.
    pub fn new(store: S) -> Self {
        Self {
            store,
            similarity: Box::new(LexicalRatio),
            policy: EnginePolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: EnginePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_similarity(mut self, similarity: impl Similarity + 'static) -> Self {
        self.similarity = Box::new(similarity);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn policy(&self) -> &EnginePolicy {
        &self.policy
    }

    /// A new root-only tree for `query`, saved immediately.
    pub async fn create_tree(&self, query: &str) -> Result<ResearchTree> {
        let query = query.trim();
        if query.is_empty() {
            anyhow::bail!("Query must not be empty");
        }
        let tree = ResearchTree::new(query);
        self.save(&tree).await?;
        info!(session = %tree.id, "tree created");
        Ok(tree)
    }

    pub async fn load(&self, session: SessionId) -> Result<ResearchTree> {
        repository::load_tree(&self.store, session).await
    }

    pub async fn save(&self, tree: &ResearchTree) -> Result<()> {
        repository::save_tree(&self.store, tree).await
    }

    pub async fn list_sessions(&self) -> Result<Vec<SessionRow>> {
        self.store.list_sessions().await
    }

    /// Fetch evidence for a node and register the questions it raises.
    ///
    /// Hits whose chunk id is already used anywhere in the tree are dropped.
    /// Questions are only generated when at least one new chunk arrived.
    pub async fn expand(
        &self,
        session: SessionId,
        selector: &NodeSelector,
        top_k: Option<usize>,
        retriever: &dyn Retriever,
        generator: &dyn QuestionGenerator,
    ) -> Result<ExpandOutcome> {
        let mut tree = self.load(session).await?;
        let node_id = tree.select(selector)?;
        let (query, topic) = {
            let node = tree.get(node_id)?;
            let mut parts = vec![node.title.clone()];
            parts.extend(node.question_texts());
            (parts.join(" "), node.title.clone())
        };
        let top_k = top_k.unwrap_or(self.policy.top_k);

        let hits = retriever.search(&query, top_k).await?;
        let mut fresh: Vec<Chunk> = Vec::new();
        for hit in hits {
            if hit.text.trim().is_empty() {
                continue;
            }
            let chunk = Chunk::from(hit);
            if tree.used_chunk_ids.contains(&chunk.id) || fresh.iter().any(|c| c.id == chunk.id) {
                continue;
            }
            fresh.push(chunk);
        }

        let mut outcome = ExpandOutcome {
            node_id: Some(node_id),
            ..Default::default()
        };
        if fresh.is_empty() {
            info!(session = %session, node = %node_id, "expand found no new evidence");
            return Ok(outcome);
        }

        self.store.upsert_chunks(&fresh).await?;
        let ids: Vec<String> = fresh.iter().map(|c| c.id.clone()).collect();
        self.store.attach_chunks(node_id, &ids).await?;
        for chunk in &fresh {
            tree.attach_chunk(node_id, chunk.clone())?;
        }
        info!(session = %session, node = %node_id, chunks = fresh.len(), "evidence attached");
        outcome.new_chunks = fresh;

        let evidence: Vec<String> = outcome.new_chunks.iter().map(|c| c.text.clone()).collect();
        match generator.generate_questions(&evidence, &topic).await {
            Ok(texts) => {
                let before = tree.get(node_id)?.question_ids().clone();
                outcome.new_questions = self
                    .register_on_node(&mut tree, node_id, &texts, QuestionSource::Expansion)
                    .await?
                    .into_iter()
                    .filter(|q| !before.contains(&q.id))
                    .collect();
            }
            Err(err) => {
                warn!(session = %session, node = %node_id, error = %format!("{:#}", err), "question generation failed");
                outcome.question_error = Some(format!("{:#}", err));
            }
        }
        Ok(outcome)
    }

    /// Whether [`deepen`](Self::deepen) would create children right now.
    pub async fn should_deepen(&self, session: SessionId, selector: &NodeSelector) -> Result<bool> {
        let tree = self.load(session).await?;
        let node_id = tree.select(selector)?;
        Ok(plan_deepen(&tree, node_id, self.similarity.as_ref(), &self.policy.deepen)?.is_ready())
    }

    /// Turn clusters of novel expansion questions into sub-sections.
    ///
    /// Titles come from `titler`; a failed or blank title falls back to the
    /// heuristic title of the cluster.
    pub async fn deepen(
        &self,
        session: SessionId,
        selector: &NodeSelector,
        titler: &dyn TitleGenerator,
    ) -> Result<DeepenOutcome> {
        let mut tree = self.load(session).await?;
        let node_id = tree.select(selector)?;
        let clusters = match plan_deepen(&tree, node_id, self.similarity.as_ref(), &self.policy.deepen)? {
            DeepenPlan::Ready { clusters } => clusters,
            DeepenPlan::Skipped { reason } => {
                info!(session = %session, node = %node_id, reason = %reason, "deepen skipped");
                return Ok(DeepenOutcome::Skipped { reason });
            }
        };

        let mut titled = Vec::with_capacity(clusters.len());
        for cluster in clusters {
            let texts: Vec<String> = cluster.iter().map(|q| q.text.clone()).collect();
            let title = match titler.title_from_cluster(&texts).await {
                Ok(t) if !t.trim().is_empty() => t.trim().to_string(),
                Ok(_) => heuristic_title(&texts),
                Err(err) => {
                    warn!(error = %format!("{:#}", err), "title generation failed, using heuristic title");
                    heuristic_title(&texts)
                }
            };
            titled.push((title, cluster));
        }

        let created = apply_deepen(&mut tree, node_id, titled)?;
        self.save(&tree).await?;
        Ok(DeepenOutcome::Deepened { created })
    }

    /// Re-stamp ranks and levels from tree shape and save.
    pub async fn assign_rank_and_level(&self, session: SessionId) -> Result<ResearchTree> {
        let mut tree = self.load(session).await?;
        tree.assign_rank_and_level();
        self.save(&tree).await?;
        Ok(tree)
    }

    pub async fn serialize(&self, session: SessionId) -> Result<SerializedTree> {
        Ok(serialize_tree(&self.load(session).await?))
    }

    pub async fn render_markdown(&self, session: SessionId) -> Result<String> {
        Ok(render::to_markdown(&self.load(session).await?))
    }

    /// Append an outline's sections under the root and register their
    /// questions. Returns the created node ids in depth-first order.
    pub async fn apply_outline(&self, session: SessionId, outline: &Outline) -> Result<Vec<NodeId>> {
        let mut tree = self.load(session).await?;
        let created = outline::apply_outline(&mut tree, outline)?;
        for (node_id, texts) in &created {
            let registered = self
                .store
                .upsert_questions(session, texts, QuestionSource::Outline)
                .await?;
            for mut q in registered {
                q.status = q.status.advance(QuestionStatus::Assigned);
                tree.attach_question(*node_id, q)?;
            }
        }
        self.save(&tree).await?;
        info!(session = %session, sections = created.len(), "outline applied");
        Ok(created.into_iter().map(|(id, _)| id).collect())
    }

    /// Register root sub-questions and route each to the top-level section
    /// whose title is most similar, or to the root when there are none.
    pub async fn add_root_questions(
        &self,
        session: SessionId,
        texts: &[String],
    ) -> Result<Vec<(NodeId, Question)>> {
        let mut tree = self.load(session).await?;
        let registered = self
            .store
            .upsert_questions(session, texts, QuestionSource::RootSubq)
            .await?;

        let mut routed: BTreeMap<NodeId, Vec<QuestionId>> = BTreeMap::new();
        let mut out = Vec::with_capacity(registered.len());
        for q in registered {
            let target = self.best_section_for(&tree, &q.text);
            routed.entry(target).or_default().push(q.id);
            out.push((target, q));
        }
        for (node_id, ids) in &routed {
            self.store.attach_questions(*node_id, ids).await?;
            self.refresh_questions(&mut tree, *node_id).await?;
        }
        for (node_id, q) in out.iter_mut() {
            if let Some(fresh) = tree
                .node(*node_id)
                .and_then(|n| n.questions().iter().find(|x| x.id == q.id))
            {
                q.status = fresh.status;
            }
        }
        Ok(out)
    }

    /// Register questions directly on one node. Texts already registered in
    /// the session resolve to their existing question.
    pub async fn attach_questions(
        &self,
        session: SessionId,
        selector: &NodeSelector,
        texts: &[String],
        source: QuestionSource,
    ) -> Result<Vec<Question>> {
        let mut tree = self.load(session).await?;
        let node_id = tree.select(selector)?;
        self.register_on_node(&mut tree, node_id, texts, source).await
    }

    /// Write a node's prose, mark it final, and consume its questions.
    pub async fn write_section(
        &self,
        session: SessionId,
        selector: &NodeSelector,
        writer: &dyn ContentWriter,
    ) -> Result<String> {
        let mut tree = self.load(session).await?;
        let node_id = tree.select(selector)?;
        let node = tree.get(node_id)?;
        if node.is_final() {
            return Err(TreeError::NodeFinalized(node_id).into());
        }
        let ctx = SectionContext::from_node(node);
        let assigned: Vec<QuestionId> = node
            .questions()
            .iter()
            .filter(|q| q.status == QuestionStatus::Assigned)
            .map(|q| q.id)
            .collect();

        let text = writer.write_section(&ctx).await?.trim().to_string();
        {
            let node = tree.get_mut(node_id)?;
            node.set_content(text.clone())?;
            node.mark_final();
        }
        self.save(&tree).await?;
        // Only after the content is stored: Consumed never moves back.
        let consumed = self.store.mark_questions_consumed(&assigned).await?;
        info!(session = %session, node = %node_id, consumed, "section written");
        Ok(text)
    }

    /// Write a node's summary and conclusion and mark it final. Content is
    /// left as it is.
    pub async fn complete_section(
        &self,
        session: SessionId,
        selector: &NodeSelector,
        writer: &dyn ContentWriter,
    ) -> Result<CompletedSection> {
        let mut tree = self.load(session).await?;
        let node_id = tree.select(selector)?;
        let ctx = SectionContext::from_node(tree.get(node_id)?);
        let summary = writer.write_summary(&ctx).await?.trim().to_string();
        let conclusion = writer.write_conclusion(&ctx).await?.trim().to_string();
        {
            let node = tree.get_mut(node_id)?;
            node.summary = Some(summary.clone());
            node.conclusion = Some(conclusion.clone());
            node.mark_final();
        }
        self.save(&tree).await?;
        info!(session = %session, node = %node_id, "section completed");
        Ok(CompletedSection {
            node_id,
            summary,
            conclusion,
        })
    }

    /// Upsert `texts`, link them to `node_id` in the registry, and refresh
    /// the node's view. Returns every resolved question once, in input
    /// order, with its registry id and current status.
    async fn register_on_node(
        &self,
        tree: &mut ResearchTree,
        node_id: NodeId,
        texts: &[String],
        source: QuestionSource,
    ) -> Result<Vec<Question>> {
        let registered = self.store.upsert_questions(tree.id, texts, source).await?;
        let mut ids: Vec<QuestionId> = Vec::new();
        for q in &registered {
            if !ids.contains(&q.id) {
                ids.push(q.id);
            }
        }
        let linked = self.store.attach_questions(node_id, &ids).await?;
        debug!(node = %node_id, linked, source = %source, "questions attached");
        self.refresh_questions(tree, node_id).await?;
        let node = tree.get(node_id)?;
        Ok(ids
            .iter()
            .filter_map(|id| node.questions().iter().find(|q| q.id == *id).cloned())
            .collect())
    }

    async fn refresh_questions(&self, tree: &mut ResearchTree, node_id: NodeId) -> Result<()> {
        let questions = self.store.questions_for_node(node_id).await?;
        tree.set_node_questions(node_id, questions)?;
        Ok(())
    }

    fn best_section_for(&self, tree: &ResearchTree, text: &str) -> NodeId {
        let mut best: Option<(NodeId, f64)> = None;
        for child in tree.root().children() {
            if let Some(node) = tree.node(*child) {
                let score = self.similarity.score(text, &node.title);
                if best.map_or(true, |(_, s)| score > s) {
                    best = Some((node.id, score));
                }
            }
        }
        best.map(|(id, _)| id).unwrap_or_else(|| tree.root_id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RetrievedChunk;
    use crate::store::memory::InMemoryStore;
    use crate::models::NodeRow;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    struct FixedRetriever(Vec<&'static str>);

    #[async_trait]
    impl Retriever for FixedRetriever {
        async fn search(&self, _query: &str, top_k: usize) -> Result<Vec<RetrievedChunk>> {
            Ok(self
                .0
                .iter()
                .take(top_k)
                .map(|t| RetrievedChunk {
                    text: t.to_string(),
                    ..Default::default()
                })
                .collect())
        }
    }

    #[derive(Default)]
    struct RecordingRetriever {
        queries: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Retriever for RecordingRetriever {
        async fn search(&self, query: &str, _top_k: usize) -> Result<Vec<RetrievedChunk>> {
            self.queries.lock().unwrap().push(query.to_string());
            Ok(Vec::new())
        }
    }

    /// Delegates to [`InMemoryStore`]; `save_tree` fails once `fail_saves` is set.
    #[derive(Default)]
    struct FlakyStore {
        inner: InMemoryStore,
        fail_saves: AtomicBool,
    }

    #[async_trait]
    impl Store for FlakyStore {
        async fn upsert_questions(
            &self,
            session: SessionId,
            texts: &[String],
            source: QuestionSource,
        ) -> Result<Vec<Question>> {
            self.inner.upsert_questions(session, texts, source).await
        }
        async fn attach_questions(&self, node: NodeId, ids: &[QuestionId]) -> Result<usize> {
            self.inner.attach_questions(node, ids).await
        }
        async fn mark_questions_consumed(&self, ids: &[QuestionId]) -> Result<usize> {
            self.inner.mark_questions_consumed(ids).await
        }
        async fn questions_for_node(&self, node: NodeId) -> Result<Vec<Question>> {
            self.inner.questions_for_node(node).await
        }
        async fn upsert_chunks(&self, chunks: &[Chunk]) -> Result<usize> {
            self.inner.upsert_chunks(chunks).await
        }
        async fn attach_chunks(&self, node: NodeId, ids: &[String]) -> Result<usize> {
            self.inner.attach_chunks(node, ids).await
        }
        async fn chunks_for_node(&self, node: NodeId) -> Result<Vec<Chunk>> {
            self.inner.chunks_for_node(node).await
        }
        async fn save_tree(&self, tree: &ResearchTree) -> Result<()> {
            if self.fail_saves.load(Ordering::SeqCst) {
                anyhow::bail!("disk full");
            }
            self.inner.save_tree(tree).await
        }
        async fn session(&self, id: SessionId) -> Result<Option<SessionRow>> {
            self.inner.session(id).await
        }
        async fn node_rows(&self, session: SessionId) -> Result<Vec<NodeRow>> {
            self.inner.node_rows(session).await
        }
        async fn question_links(&self, session: SessionId) -> Result<Vec<(NodeId, Question)>> {
            self.inner.question_links(session).await
        }
        async fn chunk_links(&self, session: SessionId) -> Result<Vec<(NodeId, Chunk)>> {
            self.inner.chunk_links(session).await
        }
        async fn list_sessions(&self) -> Result<Vec<SessionRow>> {
            self.inner.list_sessions().await
        }
    }

    struct FixedQuestions(Vec<&'static str>);

    #[async_trait]
    impl QuestionGenerator for FixedQuestions {
        async fn generate_questions(&self, _evidence: &[String], _topic: &str) -> Result<Vec<String>> {
            Ok(self.0.iter().map(|s| s.to_string()).collect())
        }
    }

    struct FailingQuestions;

    #[async_trait]
    impl QuestionGenerator for FailingQuestions {
        async fn generate_questions(&self, _evidence: &[String], _topic: &str) -> Result<Vec<String>> {
            anyhow::bail!("generator timed out")
        }
    }

    #[derive(Default)]
    struct RecordingWriter {
        seen: Mutex<Vec<SectionContext>>,
    }

    #[async_trait]
    impl ContentWriter for RecordingWriter {
        async fn write_section(&self, ctx: &SectionContext) -> Result<String> {
            self.seen.lock().unwrap().push(ctx.clone());
            Ok(format!("About {}.", ctx.title))
        }
        async fn write_summary(&self, ctx: &SectionContext) -> Result<String> {
            Ok(format!("Summary of {}", ctx.title))
        }
        async fn write_conclusion(&self, ctx: &SectionContext) -> Result<String> {
            Ok(format!("Conclusion of {}", ctx.title))
        }
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_create_tree_is_root_only() {
        let engine = ResearchEngine::new(InMemoryStore::new());
        let tree = engine.create_tree("What is a black hole?").await.unwrap();
        let loaded = engine.load(tree.id).await.unwrap();
        let root = loaded.root();
        assert_eq!((root.rank, root.level), (1, 1));
        assert!(root.parent_id().is_none());
        assert!(root.chunk_ids().is_empty() && root.question_ids().is_empty());
        assert!(engine.create_tree("   ").await.is_err());
    }

    #[tokio::test]
    async fn test_expand_twice_attaches_each_chunk_once() {
        let engine = ResearchEngine::new(InMemoryStore::new());
        let tree = engine.create_tree("Black holes").await.unwrap();
        let root = NodeSelector::root();
        let no_questions = FixedQuestions(vec![]);

        let first = engine
            .expand(tree.id, &root, None, &FixedRetriever(vec!["alpha", "beta", "alpha"]), &no_questions)
            .await
            .unwrap();
        assert_eq!(first.new_chunks.len(), 2);

        let second = engine
            .expand(tree.id, &root, None, &FixedRetriever(vec!["beta", "gamma"]), &no_questions)
            .await
            .unwrap();
        assert_eq!(second.new_chunks.len(), 1);
        assert_eq!(second.new_chunks[0].text, "gamma");

        let loaded = engine.load(tree.id).await.unwrap();
        assert_eq!(loaded.root().chunks().len(), 3);
    }

    #[tokio::test]
    async fn test_expand_keeps_chunks_when_generation_fails() {
        let engine = ResearchEngine::new(InMemoryStore::new());
        let tree = engine.create_tree("Black holes").await.unwrap();
        let outcome = engine
            .expand(tree.id, &NodeSelector::root(), Some(1), &FixedRetriever(vec!["alpha", "beta"]), &FailingQuestions)
            .await
            .unwrap();
        assert_eq!(outcome.new_chunks.len(), 1);
        assert!(outcome.question_error.unwrap().contains("timed out"));
        let loaded = engine.load(tree.id).await.unwrap();
        assert_eq!(loaded.root().chunks().len(), 1);
    }

    #[tokio::test]
    async fn test_expand_registers_expansion_questions() {
        let engine = ResearchEngine::new(InMemoryStore::new());
        let tree = engine.create_tree("Black holes").await.unwrap();
        let gen = FixedQuestions(vec!["How do black holes form?", "how do black holes form? ", ""]);
        let outcome = engine
            .expand(tree.id, &NodeSelector::root(), None, &FixedRetriever(vec!["alpha"]), &gen)
            .await
            .unwrap();
        assert_eq!(outcome.new_questions.len(), 1);
        let q = &outcome.new_questions[0];
        assert_eq!(q.source, QuestionSource::Expansion);
        assert_eq!(q.status, QuestionStatus::Assigned);
    }

    #[tokio::test]
    async fn test_deepen_skips_then_creates_children() {
        let engine = ResearchEngine::new(InMemoryStore::new());
        let tree = engine.create_tree("Black holes").await.unwrap();
        let root = NodeSelector::root();

        engine
            .attach_questions(tree.id, &root, &strings(&["How do black holes form?"]), QuestionSource::Expansion)
            .await
            .unwrap();
        let outcome = engine.deepen(tree.id, &root, &crate::collab::HeuristicTitler).await.unwrap();
        assert_eq!(
            outcome,
            DeepenOutcome::Skipped {
                reason: "Not enough novel expansion questions".into()
            }
        );
        assert!(!engine.should_deepen(tree.id, &root).await.unwrap());

        engine
            .attach_questions(
                tree.id,
                &root,
                &strings(&[
                    "What is Hawking radiation?",
                    "How do black holes evaporate?",
                    "What is Hawking radiation made of?",
                ]),
                QuestionSource::Expansion,
            )
            .await
            .unwrap();
        assert!(engine.should_deepen(tree.id, &root).await.unwrap());

        let outcome = engine.deepen(tree.id, &root, &crate::collab::HeuristicTitler).await.unwrap();
        assert_eq!(
            outcome.created_titles(),
            vec!["How do black holes form", "What is hawking radiation"]
        );
        let loaded = engine.load(tree.id).await.unwrap();
        assert_eq!(loaded.root().children().len(), 2);
        loaded.assert_invariants();

        let again = engine.deepen(tree.id, &root, &crate::collab::HeuristicTitler).await.unwrap();
        assert!(matches!(again, DeepenOutcome::Skipped { .. }));
    }

    #[tokio::test]
    async fn test_outline_then_root_questions_routing() {
        let engine = ResearchEngine::new(InMemoryStore::new());
        let tree = engine.create_tree("Black holes").await.unwrap();
        let outline = Outline::from_json(
            r#"{"sections": [
                {"heading": "Formation of black holes", "questions": ["How do stars collapse?"]},
                {"heading": "Hawking radiation", "questions": ["What is emitted?"]}
            ]}"#,
        )
        .unwrap();
        let created = engine.apply_outline(tree.id, &outline).await.unwrap();
        assert_eq!(created.len(), 2);

        let routed = engine
            .add_root_questions(tree.id, &strings(&["What is Hawking radiation?"]))
            .await
            .unwrap();
        assert_eq!(routed[0].0, created[1]);
        assert_eq!(routed[0].1.status, QuestionStatus::Assigned);

        let loaded = engine.load(tree.id).await.unwrap();
        let section = loaded.node(created[1]).unwrap();
        assert_eq!(section.questions().len(), 2);
        assert_eq!(section.questions()[0].source, QuestionSource::Outline);
    }

    #[tokio::test]
    async fn test_write_section_consumes_questions_and_finalizes() {
        let engine = ResearchEngine::new(InMemoryStore::new());
        let tree = engine.create_tree("Black holes").await.unwrap();
        let root = NodeSelector::root();
        engine
            .attach_questions(tree.id, &root, &strings(&["Why?"]), QuestionSource::Outline)
            .await
            .unwrap();
        let writer = RecordingWriter::default();

        let text = engine.write_section(tree.id, &root, &writer).await.unwrap();
        assert_eq!(text, "About Black holes.");
        assert_eq!(writer.seen.lock().unwrap()[0].questions, strings(&["Why?"]));

        let loaded = engine.load(tree.id).await.unwrap();
        assert!(loaded.root().is_final());
        assert_eq!(loaded.root().questions()[0].status, QuestionStatus::Consumed);

        let err = engine.write_section(tree.id, &root, &writer).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TreeError>(),
            Some(TreeError::NodeFinalized(_))
        ));

        let done = engine.complete_section(tree.id, &root, &writer).await.unwrap();
        assert_eq!(done.summary, "Summary of Black holes");
        let md = engine.render_markdown(tree.id).await.unwrap();
        assert!(md.contains("**Executive Summary**\n\nSummary of Black holes"));
        assert!(md.contains("**Abstract**\n\nAbout Black holes."));
    }

    #[tokio::test]
    async fn test_write_section_failed_save_leaves_questions_assigned() {
        let engine = ResearchEngine::new(FlakyStore::default());
        let tree = engine.create_tree("Black holes").await.unwrap();
        let root = NodeSelector::root();
        engine
            .attach_questions(tree.id, &root, &strings(&["Why?"]), QuestionSource::Outline)
            .await
            .unwrap();

        engine.store().fail_saves.store(true, Ordering::SeqCst);
        let err = engine
            .write_section(tree.id, &root, &RecordingWriter::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("disk full"));

        let questions = engine.store().questions_for_node(tree.root_id()).await.unwrap();
        assert_eq!(questions[0].status, QuestionStatus::Assigned);
        let loaded = engine.load(tree.id).await.unwrap();
        assert!(!loaded.root().is_final());
        assert_eq!(loaded.root().content(), None);

        // The retry after recovery writes and consumes as usual.
        engine.store().fail_saves.store(false, Ordering::SeqCst);
        engine
            .write_section(tree.id, &root, &RecordingWriter::default())
            .await
            .unwrap();
        let questions = engine.store().questions_for_node(tree.root_id()).await.unwrap();
        assert_eq!(questions[0].status, QuestionStatus::Consumed);
    }

    #[tokio::test]
    async fn test_attach_questions_returns_existing_registry_entries() {
        let engine = ResearchEngine::new(InMemoryStore::new());
        let a = engine.create_tree("A").await.unwrap();
        let b = engine.create_tree("B").await.unwrap();
        let root = NodeSelector::root();

        let first = engine
            .attach_questions(a.id, &root, &strings(&["Why?", "How?"]), QuestionSource::Outline)
            .await
            .unwrap();
        let again = engine
            .attach_questions(a.id, &root, &strings(&["how? ", "When?", "WHY?"]), QuestionSource::Outline)
            .await
            .unwrap();
        let ids: Vec<QuestionId> = again.iter().map(|q| q.id).collect();
        assert_eq!(ids[0], first[1].id);
        assert_eq!(ids[2], first[0].id);
        assert_eq!(again.len(), 3);
        assert!(again.iter().all(|q| q.status == QuestionStatus::Assigned));
        assert_eq!(engine.load(a.id).await.unwrap().root().questions().len(), 3);

        let other = engine
            .attach_questions(b.id, &root, &strings(&["Why?"]), QuestionSource::Outline)
            .await
            .unwrap();
        assert_ne!(other[0].id, first[0].id);
    }

    #[tokio::test]
    async fn test_expand_queries_with_title_and_questions() {
        let engine = ResearchEngine::new(InMemoryStore::new());
        let tree = engine.create_tree("Black holes").await.unwrap();
        let root = NodeSelector::root();
        engine
            .attach_questions(tree.id, &root, &strings(&["Why?", "How?"]), QuestionSource::Outline)
            .await
            .unwrap();

        let retriever = RecordingRetriever::default();
        engine
            .expand(tree.id, &root, Some(3), &retriever, &FixedQuestions(vec![]))
            .await
            .unwrap();
        assert_eq!(*retriever.queries.lock().unwrap(), strings(&["Black holes Why? How?"]));
    }

    #[tokio::test]
    async fn test_selector_out_of_range() {
        let engine = ResearchEngine::new(InMemoryStore::new());
        let tree = engine.create_tree("Black holes").await.unwrap();
        let err = engine
            .should_deepen(tree.id, &NodeSelector::Section(0))
            .await
            .unwrap_err();
        assert!(err.downcast_ref::<TreeError>().unwrap().is_not_found());
    }
}
