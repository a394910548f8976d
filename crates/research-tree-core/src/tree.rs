//! The research tree aggregate.
//!
//! Nodes live in an arena keyed by [`NodeId`]. Each node stores its parent's
//! id and an ordered list of child ids; there are no object pointers in
//! either direction, so the tree can be rebuilt from flat rows without
//! forward references (see [`crate::repository`]).
//!
//! # Invariants
//!
//! - The root has `level = 1`, `rank = 1`, and no parent.
//! - For every other node, `level = parent.level + 1`.
//! - Sibling ranks are `1..=N` in child order.
//! - Every node in the arena is reachable from the root exactly once.
//!
//! Structural edits ([`ResearchTree::add_child`], [`ResearchTree::reparent`])
//! keep these invariants; [`ResearchTree::assign_rank_and_level`] re-stamps
//! them from tree shape alone.

use std::collections::{BTreeSet, HashMap};

use uuid::Uuid;

use crate::error::TreeError;
use crate::ids;
use crate::models::{Chunk, NodeId, NodeRow, Question, QuestionId, SessionId};
use crate::selector::NodeSelector;

/// A section or sub-section of the article in progress.
#[derive(Debug, Clone, PartialEq)]
pub struct ResearchNode {
    pub id: NodeId,
    pub title: String,
    pub goals: Option<String>,
    content: Option<String>,
    pub summary: Option<String>,
    pub conclusion: Option<String>,
    pub rank: u32,
    pub level: u32,
    is_final: bool,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    chunk_ids: BTreeSet<String>,
    question_ids: BTreeSet<QuestionId>,
    chunks: Vec<Chunk>,
    questions: Vec<Question>,
}

impl ResearchNode {
    /// A detached node with a fresh id. Rank and level are stamped when it
    /// is added to a tree.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            goals: None,
            content: None,
            summary: None,
            conclusion: None,
            rank: 0,
            level: 0,
            is_final: false,
            parent: None,
            children: Vec::new(),
            chunk_ids: BTreeSet::new(),
            question_ids: BTreeSet::new(),
            chunks: Vec::new(),
            questions: Vec::new(),
        }
    }

    pub fn with_goals(mut self, goals: Option<String>) -> Self {
        self.goals = goals;
        self
    }

    /// Rebuild a node shell from its storage row. Children and attachments
    /// are linked afterwards.
    pub fn from_row(row: &NodeRow) -> Self {
        Self {
            id: row.id,
            title: row.title.clone(),
            goals: row.goals.clone(),
            content: row.content.clone(),
            summary: row.summary.clone(),
            conclusion: row.conclusion.clone(),
            rank: row.rank,
            level: row.level,
            is_final: row.is_final,
            parent: row.parent_id,
            children: Vec::new(),
            chunk_ids: BTreeSet::new(),
            question_ids: BTreeSet::new(),
            chunks: Vec::new(),
            questions: Vec::new(),
        }
    }

    pub fn to_row(&self, session_id: SessionId) -> NodeRow {
        NodeRow {
            id: self.id,
            session_id,
            parent_id: self.parent,
            title: self.title.clone(),
            goals: self.goals.clone(),
            content: self.content.clone(),
            summary: self.summary.clone(),
            conclusion: self.conclusion.clone(),
            rank: self.rank,
            level: self.level,
            is_final: self.is_final,
        }
    }

    pub fn parent_id(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub(crate) fn push_child(&mut self, child: NodeId) {
        self.children.push(child);
    }

    pub fn content(&self) -> Option<&str> {
        self.content.as_deref()
    }

    pub fn is_final(&self) -> bool {
        self.is_final
    }

    /// Overwrite the prose content. Refused once the node is final.
    pub fn set_content(&mut self, content: impl Into<String>) -> Result<(), TreeError> {
        if self.is_final {
            return Err(TreeError::NodeFinalized(self.id));
        }
        self.content = Some(content.into());
        Ok(())
    }

    pub fn mark_final(&mut self) {
        self.is_final = true;
    }

    pub fn chunk_ids(&self) -> &BTreeSet<String> {
        &self.chunk_ids
    }

    pub fn question_ids(&self) -> &BTreeSet<QuestionId> {
        &self.question_ids
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    /// Returns `false` if the chunk was already attached.
    pub fn attach_chunk(&mut self, chunk: Chunk) -> bool {
        if !self.chunk_ids.insert(chunk.id.clone()) {
            return false;
        }
        self.chunks.push(chunk);
        true
    }

    /// Attach a question, or move an already-attached one's status forward.
    /// Returns `false` if the question was already attached.
    pub fn attach_question(&mut self, question: Question) -> bool {
        if self.question_ids.insert(question.id) {
            self.questions.push(question);
            return true;
        }
        if let Some(existing) = self.questions.iter_mut().find(|q| q.id == question.id) {
            existing.status = existing.status.advance(question.status);
        }
        false
    }

    /// Replace the hydrated question view with a fresh registry listing.
    pub fn set_questions(&mut self, questions: Vec<Question>) {
        self.question_ids = questions.iter().map(|q| q.id).collect();
        self.questions = questions;
    }

    /// Replace the hydrated chunk view with a fresh registry listing.
    pub fn set_chunks(&mut self, chunks: Vec<Chunk>) {
        self.chunk_ids = chunks.iter().map(|c| c.id.clone()).collect();
        self.chunks = chunks;
    }

    pub fn question_texts(&self) -> Vec<String> {
        self.questions.iter().map(|q| q.text.clone()).collect()
    }

    pub fn chunk_texts(&self) -> Vec<String> {
        self.chunks.iter().map(|c| c.text.clone()).collect()
    }
}

/// The whole article in progress, rooted at one node and scoped to one
/// user query. Chunk and question dedup is scoped to a tree.
#[derive(Debug, Clone)]
pub struct ResearchTree {
    pub id: SessionId,
    pub query: String,
    root: NodeId,
    nodes: HashMap<NodeId, ResearchNode>,
    /// Normalized texts of every question attached anywhere in the tree.
    pub used_questions: BTreeSet<String>,
    /// Every chunk id attached anywhere in the tree.
    pub used_chunk_ids: BTreeSet<String>,
}

impl ResearchTree {
    /// A new tree whose only node is a root titled with the query.
    pub fn new(query: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4(), query)
    }

    pub fn with_id(id: SessionId, query: impl Into<String>) -> Self {
        let query = query.into();
        let mut root = ResearchNode::new(query.clone());
        root.rank = 1;
        root.level = 1;
        let root_id = root.id;
        let mut nodes = HashMap::new();
        nodes.insert(root_id, root);
        Self {
            id,
            query,
            root: root_id,
            nodes,
            used_questions: BTreeSet::new(),
            used_chunk_ids: BTreeSet::new(),
        }
    }

    /// Assemble a tree from already-linked nodes. The caller is
    /// responsible for checking structure (see [`crate::repository`]).
    pub(crate) fn from_parts(
        id: SessionId,
        query: String,
        root: NodeId,
        nodes: HashMap<NodeId, ResearchNode>,
    ) -> Self {
        let mut tree = Self {
            id,
            query,
            root,
            nodes,
            used_questions: BTreeSet::new(),
            used_chunk_ids: BTreeSet::new(),
        };
        tree.refresh_used_sets();
        tree
    }

    pub fn root_id(&self) -> NodeId {
        self.root
    }

    pub fn root(&self) -> &ResearchNode {
        &self.nodes[&self.root]
    }

    pub fn node(&self, id: NodeId) -> Option<&ResearchNode> {
        self.nodes.get(&id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut ResearchNode> {
        self.nodes.get_mut(&id)
    }

    /// Like [`node`](Self::node) but as a `NodeNotFound` error.
    pub fn get(&self, id: NodeId) -> Result<&ResearchNode, TreeError> {
        self.nodes
            .get(&id)
            .ok_or_else(|| TreeError::NodeNotFound(id.to_string()))
    }

    pub fn get_mut(&mut self, id: NodeId) -> Result<&mut ResearchNode, TreeError> {
        self.nodes
            .get_mut(&id)
            .ok_or_else(|| TreeError::NodeNotFound(id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn parent(&self, id: NodeId) -> Option<&ResearchNode> {
        self.nodes
            .get(&id)
            .and_then(|n| n.parent)
            .and_then(|p| self.nodes.get(&p))
    }

    /// Depth-first pre-order ids, children in rank order.
    pub fn walk(&self) -> Vec<NodeId> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            out.push(id);
            if let Some(node) = self.nodes.get(&id) {
                stack.extend(node.children.iter().rev().copied());
            }
        }
        out
    }

    /// Nodes in [`walk`](Self::walk) order.
    pub fn nodes(&self) -> impl Iterator<Item = &ResearchNode> + '_ {
        self.walk().into_iter().filter_map(move |id| self.nodes.get(&id))
    }

    /// Append `node` as the last child of `parent`, stamping its rank and
    /// level. Returns the new node's id.
    pub fn add_child(&mut self, parent: NodeId, mut node: ResearchNode) -> Result<NodeId, TreeError> {
        let (parent_level, next_rank) = {
            let p = self.get(parent)?;
            (p.level, p.children.len() as u32 + 1)
        };
        if self.nodes.contains_key(&node.id) {
            return Err(TreeError::InvalidStructure(format!(
                "node {} is already in the tree",
                node.id
            )));
        }
        node.parent = Some(parent);
        node.level = parent_level + 1;
        node.rank = next_rank;
        node.children.clear();
        let id = node.id;
        for chunk_id in &node.chunk_ids {
            self.used_chunk_ids.insert(chunk_id.clone());
        }
        for q in &node.questions {
            self.used_questions.insert(q.key());
        }
        self.nodes.insert(id, node);
        self.get_mut(parent)?.children.push(id);
        Ok(id)
    }

    /// Move `node` under `new_parent` at `position` (appended when `None`)
    /// and re-stamp ranks and levels.
    pub fn reparent(
        &mut self,
        node: NodeId,
        new_parent: NodeId,
        position: Option<usize>,
    ) -> Result<(), TreeError> {
        if node == self.root {
            return Err(TreeError::InvalidStructure("the root cannot be moved".into()));
        }
        self.get(new_parent)?;
        if self.is_ancestor_or_self(node, new_parent) {
            return Err(TreeError::InvalidStructure(format!(
                "cannot move {} under its own descendant {}",
                node, new_parent
            )));
        }
        let old_parent = self
            .get(node)?
            .parent
            .ok_or_else(|| TreeError::InvalidStructure(format!("node {} has no parent", node)))?;

        self.get_mut(old_parent)?.children.retain(|c| *c != node);
        let siblings = &mut self.get_mut(new_parent)?.children;
        let at = position.unwrap_or(siblings.len()).min(siblings.len());
        siblings.insert(at, node);
        self.get_mut(node)?.parent = Some(new_parent);

        self.assign_rank_and_level();
        Ok(())
    }

    fn is_ancestor_or_self(&self, ancestor: NodeId, mut node: NodeId) -> bool {
        loop {
            if node == ancestor {
                return true;
            }
            match self.nodes.get(&node).and_then(|n| n.parent) {
                Some(p) => node = p,
                None => return false,
            }
        }
    }

    /// Recompute `level` and `rank` for every node in one top-down pass.
    ///
    /// Root gets level 1, rank 1; each child's rank is its 1-based position
    /// in its parent's child list and its level is the parent's plus one.
    /// Content, chunks, and questions are never touched.
    pub fn assign_rank_and_level(&mut self) {
        let root = self.root;
        if let Some(r) = self.nodes.get_mut(&root) {
            r.parent = None;
            r.rank = 1;
            r.level = 1;
        }
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let (level, children) = match self.nodes.get(&id) {
                Some(n) => (n.level, n.children.clone()),
                None => continue,
            };
            for (i, child) in children.iter().enumerate() {
                if let Some(c) = self.nodes.get_mut(child) {
                    c.parent = Some(id);
                    c.rank = i as u32 + 1;
                    c.level = level + 1;
                }
                stack.push(*child);
            }
        }
    }

    /// Dotted rank path from the root, e.g. `"1.2.1"`.
    pub fn display_rank(&self, id: NodeId) -> String {
        let mut parts = Vec::new();
        let mut cursor = Some(id);
        while let Some(cur) = cursor {
            match self.nodes.get(&cur) {
                Some(n) => {
                    parts.push(n.rank.max(1).to_string());
                    cursor = n.parent;
                }
                None => break,
            }
        }
        parts.reverse();
        parts.join(".")
    }

    /// Resolve a selector to a node id.
    pub fn select(&self, selector: &NodeSelector) -> Result<NodeId, TreeError> {
        let not_found = || TreeError::NodeNotFound(selector.to_string());
        match selector {
            NodeSelector::Id(id) => self.nodes.get(id).map(|n| n.id).ok_or_else(not_found),
            NodeSelector::Section(index) => {
                self.root().children.get(*index).copied().ok_or_else(not_found)
            }
            NodeSelector::Rank(path) => {
                let (first, rest) = path.split_first().ok_or_else(not_found)?;
                if *first != 1 {
                    return Err(not_found());
                }
                let mut cursor = self.root;
                for rank in rest {
                    let node = self.get(cursor)?;
                    let idx = (*rank as usize).checked_sub(1).ok_or_else(not_found)?;
                    cursor = *node.children.get(idx).ok_or_else(not_found)?;
                }
                Ok(cursor)
            }
        }
    }

    /// Attach a chunk to a node and record it in the tree-wide set.
    pub fn attach_chunk(&mut self, node: NodeId, chunk: Chunk) -> Result<bool, TreeError> {
        let chunk_id = chunk.id.clone();
        let added = self.get_mut(node)?.attach_chunk(chunk);
        self.used_chunk_ids.insert(chunk_id);
        Ok(added)
    }

    /// Attach a question to a node and record it in the tree-wide set.
    ///
    /// A question whose normalized text is already used elsewhere in the
    /// tree takes over the existing question's id and text, so every node
    /// refers to the single registry entry for that text.
    pub fn attach_question(&mut self, node: NodeId, mut question: Question) -> Result<bool, TreeError> {
        self.get(node)?;
        let key = question.key();
        if self.used_questions.contains(&key) {
            let existing = self
                .nodes
                .values()
                .flat_map(|n| n.questions.iter())
                .find(|q| q.key() == key);
            if let Some(existing) = existing {
                question.id = existing.id;
                question.text = existing.text.clone();
                question.source = existing.source;
                question.status = question.status.advance(existing.status);
            }
            // One registry entry means one status on every node holding it.
            for q in self.nodes.values_mut().flat_map(|n| n.questions.iter_mut()) {
                if q.id == question.id {
                    q.status = q.status.advance(question.status);
                }
            }
        }
        let added = self.get_mut(node)?.attach_question(question);
        self.used_questions.insert(key);
        Ok(added)
    }

    /// Replace a node's hydrated question view (after a registry write).
    pub fn set_node_questions(&mut self, node: NodeId, questions: Vec<Question>) -> Result<(), TreeError> {
        for q in &questions {
            self.used_questions.insert(q.key());
        }
        self.get_mut(node)?.set_questions(questions);
        Ok(())
    }

    /// Replace a node's hydrated chunk view (after a registry write).
    pub fn set_node_chunks(&mut self, node: NodeId, chunks: Vec<Chunk>) -> Result<(), TreeError> {
        for c in &chunks {
            self.used_chunk_ids.insert(c.id.clone());
        }
        self.get_mut(node)?.set_chunks(chunks);
        Ok(())
    }

    /// Rebuild `used_questions` and `used_chunk_ids` from the nodes.
    pub fn refresh_used_sets(&mut self) {
        self.used_questions = self
            .nodes
            .values()
            .flat_map(|n| n.questions.iter().map(|q| ids::normalize_question(&q.text)))
            .collect();
        self.used_chunk_ids = self
            .nodes
            .values()
            .flat_map(|n| n.chunk_ids.iter().cloned())
            .collect();
    }

    /// Check every structural invariant, reporting the first violation.
    pub fn check_invariants(&self) -> Result<(), String> {
        let root = self
            .nodes
            .get(&self.root)
            .ok_or_else(|| "root node missing from arena".to_string())?;
        if root.parent.is_some() {
            return Err("root has a parent".into());
        }
        if root.level != 1 || root.rank != 1 {
            return Err(format!(
                "root has level {} and rank {}, expected 1 and 1",
                root.level, root.rank
            ));
        }

        let mut seen = 0usize;
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            seen += 1;
            if seen > self.nodes.len() {
                return Err("child links contain a cycle".into());
            }
            let node = self
                .nodes
                .get(&id)
                .ok_or_else(|| format!("child {} missing from arena", id))?;
            for (i, child_id) in node.children.iter().enumerate() {
                let child = self
                    .nodes
                    .get(child_id)
                    .ok_or_else(|| format!("child {} missing from arena", child_id))?;
                if child.parent != Some(id) {
                    return Err(format!("node {} does not point back to parent {}", child_id, id));
                }
                if child.level != node.level + 1 {
                    return Err(format!(
                        "node {} has level {}, expected {}",
                        child_id,
                        child.level,
                        node.level + 1
                    ));
                }
                if child.rank != i as u32 + 1 {
                    return Err(format!(
                        "node {} has rank {}, expected {}",
                        child_id,
                        child.rank,
                        i + 1
                    ));
                }
                stack.push(*child_id);
            }
        }
        if seen != self.nodes.len() {
            return Err(format!(
                "{} node(s) unreachable from the root",
                self.nodes.len() - seen
            ));
        }
        Ok(())
    }

    /// Panic on any invariant violation. A violation here is a bug in the
    /// caller, never a data condition.
    pub fn assert_invariants(&self) {
        if let Err(violation) = self.check_invariants() {
            panic!("research tree invariant violated: {}", violation);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{QuestionSource, QuestionStatus};

    fn sample() -> (ResearchTree, NodeId, NodeId, NodeId) {
        let mut tree = ResearchTree::new("What is a black hole?");
        let root = tree.root_id();
        let a = tree.add_child(root, ResearchNode::new("Formation")).unwrap();
        let b = tree.add_child(root, ResearchNode::new("Evaporation")).unwrap();
        let a1 = tree.add_child(a, ResearchNode::new("Stellar collapse")).unwrap();
        (tree, a, b, a1)
    }

    #[test]
    fn test_new_tree_root_only() {
        let tree = ResearchTree::new("What is a black hole?");
        let root = tree.root();
        assert_eq!(root.rank, 1);
        assert_eq!(root.level, 1);
        assert!(root.parent_id().is_none());
        assert!(root.chunk_ids().is_empty());
        assert!(root.question_ids().is_empty());
        assert_eq!(root.title, "What is a black hole?");
        assert_eq!(tree.len(), 1);
        tree.assert_invariants();
    }

    #[test]
    fn test_add_child_stamps_rank_and_level() {
        let (tree, a, b, a1) = sample();
        assert_eq!(tree.node(a).unwrap().rank, 1);
        assert_eq!(tree.node(b).unwrap().rank, 2);
        assert_eq!(tree.node(a1).unwrap().level, 3);
        assert_eq!(tree.display_rank(a1), "1.1.1");
        assert_eq!(tree.display_rank(b), "1.2");
        tree.assert_invariants();
    }

    #[test]
    fn test_walk_is_depth_first_in_rank_order() {
        let (tree, a, b, a1) = sample();
        assert_eq!(tree.walk(), vec![tree.root_id(), a, a1, b]);
    }

    #[test]
    fn test_reparent_restamps_ranks() {
        let (mut tree, a, b, a1) = sample();
        tree.reparent(a1, tree.root_id(), Some(0)).unwrap();
        assert_eq!(tree.root().children(), &[a1, a, b]);
        assert_eq!(tree.node(a1).unwrap().level, 2);
        assert_eq!(tree.node(a).unwrap().rank, 2);
        assert_eq!(tree.node(b).unwrap().rank, 3);
        assert!(tree.node(a).unwrap().children().is_empty());
        tree.assert_invariants();
    }

    #[test]
    fn test_reparent_rejects_cycles() {
        let (mut tree, a, _, a1) = sample();
        let err = tree.reparent(a, a1, None).unwrap_err();
        assert!(matches!(err, TreeError::InvalidStructure(_)));
        let root = tree.root_id();
        assert!(tree.reparent(root, a, None).is_err());
        tree.assert_invariants();
    }

    #[test]
    fn test_assign_rank_and_level_repairs_stale_stamps() {
        let (mut tree, a, b, a1) = sample();
        tree.node_mut(a).unwrap().rank = 9;
        tree.node_mut(a1).unwrap().level = 7;
        tree.node_mut(b).unwrap().content = Some("kept".into());
        assert!(tree.check_invariants().is_err());
        tree.assign_rank_and_level();
        tree.assert_invariants();
        assert_eq!(tree.node(b).unwrap().content(), Some("kept"));
    }

    #[test]
    #[should_panic(expected = "invariant violated")]
    fn test_assert_invariants_panics_on_gap() {
        let (mut tree, _, b, _) = sample();
        tree.node_mut(b).unwrap().rank = 5;
        tree.assert_invariants();
    }

    #[test]
    fn test_select_variants() {
        let (tree, a, b, a1) = sample();
        assert_eq!(tree.select(&NodeSelector::Section(1)).unwrap(), b);
        assert_eq!(tree.select(&NodeSelector::Rank(vec![1, 1, 1])).unwrap(), a1);
        assert_eq!(tree.select(&NodeSelector::Rank(vec![1])).unwrap(), tree.root_id());
        assert_eq!(tree.select(&NodeSelector::Id(a)).unwrap(), a);
        assert!(matches!(
            tree.select(&NodeSelector::Section(2)),
            Err(TreeError::NodeNotFound(_))
        ));
        assert!(tree.select(&NodeSelector::Rank(vec![2])).is_err());
        assert!(tree.select(&NodeSelector::Rank(vec![1, 0])).is_err());
    }

    #[test]
    fn test_final_content_is_immutable() {
        let mut node = ResearchNode::new("Formation");
        node.set_content("draft").unwrap();
        node.mark_final();
        assert!(matches!(
            node.set_content("rewrite"),
            Err(TreeError::NodeFinalized(_))
        ));
        assert_eq!(node.content(), Some("draft"));
        node.summary = Some("summaries stay editable".into());
    }

    #[test]
    fn test_attachments_are_deduplicated() {
        let mut tree = ResearchTree::new("q");
        let root = tree.root_id();
        assert!(tree.attach_chunk(root, Chunk::new("alpha")).unwrap());
        assert!(!tree.attach_chunk(root, Chunk::new("alpha")).unwrap());
        let q = Question::proposed(tree.id, "Why?", QuestionSource::Outline);
        assert!(tree.attach_question(root, q.clone()).unwrap());
        assert!(!tree.attach_question(root, q).unwrap());
        assert_eq!(tree.root().chunks().len(), 1);
        assert_eq!(tree.root().questions().len(), 1);
        assert!(tree.used_questions.contains("why?"));
        assert_eq!(tree.used_chunk_ids.len(), 1);
    }

    #[test]
    fn test_same_text_on_two_nodes_shares_one_question() {
        let mut tree = ResearchTree::new("q");
        let root = tree.root_id();
        let a = tree.add_child(root, ResearchNode::new("A")).unwrap();
        let b = tree.add_child(root, ResearchNode::new("B")).unwrap();
        let first = Question::proposed(tree.id, "Why?", QuestionSource::Outline);
        let mut second = Question::proposed(tree.id, "why?", QuestionSource::Expansion);
        second.status = QuestionStatus::Assigned;
        assert_ne!(first.id, second.id);

        tree.attach_question(a, first.clone()).unwrap();
        assert!(tree.attach_question(b, second).unwrap());

        let on_b = &tree.node(b).unwrap().questions()[0];
        assert_eq!(on_b.id, first.id);
        assert_eq!(on_b.text, "Why?");
        assert_eq!(tree.node(a).unwrap().question_ids(), tree.node(b).unwrap().question_ids());
        assert_eq!(tree.node(a).unwrap().questions()[0].status, QuestionStatus::Assigned);
        assert_eq!(tree.used_questions.len(), 1);
    }
}
