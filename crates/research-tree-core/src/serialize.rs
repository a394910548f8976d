//! Structured, renderer-friendly form of a tree.
//!
//! Nodes appear depth-first with children in rank order, each carrying its
//! dotted display rank and its parent's title.

use serde::Serialize;

use crate::models::{Chunk, NodeId, Question, SessionId};
use crate::tree::{ResearchNode, ResearchTree};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SerializedTree {
    pub session_id: SessionId,
    pub query: String,
    pub root: SerializedNode,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SerializedNode {
    pub id: NodeId,
    pub title: String,
    pub display_rank: String,
    pub rank: u32,
    pub level: u32,
    pub parent_title: Option<String>,
    pub goals: Option<String>,
    pub content: Option<String>,
    pub summary: Option<String>,
    pub conclusion: Option<String>,
    pub is_final: bool,
    pub questions: Vec<Question>,
    pub chunks: Vec<Chunk>,
    pub children: Vec<SerializedNode>,
}

impl SerializedNode {
    /// This node and all its descendants, depth-first.
    pub fn flatten(&self) -> Vec<&SerializedNode> {
        let mut out = vec![self];
        for child in &self.children {
            out.extend(child.flatten());
        }
        out
    }
}

pub fn serialize_tree(tree: &ResearchTree) -> SerializedTree {
    SerializedTree {
        session_id: tree.id,
        query: tree.query.clone(),
        root: serialize_node(tree, tree.root()),
    }
}

fn serialize_node(tree: &ResearchTree, node: &ResearchNode) -> SerializedNode {
    let id = node.id;
    SerializedNode {
        id,
        title: node.title.clone(),
        display_rank: tree.display_rank(id),
        rank: node.rank,
        level: node.level,
        parent_title: tree.parent(id).map(|p| p.title.clone()),
        goals: node.goals.clone(),
        content: node.content().map(str::to_string),
        summary: node.summary.clone(),
        conclusion: node.conclusion.clone(),
        is_final: node.is_final(),
        questions: node.questions().to_vec(),
        chunks: node.chunks().to_vec(),
        children: node
            .children()
            .iter()
            .filter_map(|c| tree.node(*c))
            .map(|c| serialize_node(tree, c))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialized_order_and_ranks() {
        let mut tree = ResearchTree::new("Black holes");
        let root = tree.root_id();
        let a = tree.add_child(root, ResearchNode::new("Formation")).unwrap();
        tree.add_child(root, ResearchNode::new("Evaporation")).unwrap();
        tree.add_child(a, ResearchNode::new("Collapse")).unwrap();

        let out = serialize_tree(&tree);
        let flat: Vec<(&str, &str, Option<&str>)> = out
            .root
            .flatten()
            .into_iter()
            .map(|n| (n.title.as_str(), n.display_rank.as_str(), n.parent_title.as_deref()))
            .collect();
        assert_eq!(
            flat,
            vec![
                ("Black holes", "1", None),
                ("Formation", "1.1", Some("Black holes")),
                ("Collapse", "1.1.1", Some("Formation")),
                ("Evaporation", "1.2", Some("Black holes")),
            ]
        );

        let json = serde_json::to_value(&out).unwrap();
        assert_eq!(json["root"]["children"][1]["display_rank"], "1.2");
    }
}
