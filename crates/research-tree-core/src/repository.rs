//! Saving and rebuilding whole trees.
//!
//! Loading is two-pass. All node rows are turned into childless shells keyed
//! by id first; children are linked in a second pass, sorted by their stored
//! rank so sibling order does not depend on fetch order. Question and chunk
//! associations are fetched in bulk and hydrated per node, so the number of
//! queries does not grow with the tree.

use std::collections::HashMap;

use anyhow::Result;
use tracing::{debug, warn};

use crate::error::TreeError;
use crate::models::{Chunk, NodeId, NodeRow, Question, SessionId, SessionRow};
use crate::store::Store;
use crate::tree::{ResearchNode, ResearchTree};

/// Build a tree from flat rows.
///
/// Fails with [`TreeError::InvalidStructure`] when there is not exactly one
/// parentless row, when a row names a parent outside the set, or when some
/// rows are unreachable from the root.
pub fn assemble_tree(
    session: SessionRow,
    mut rows: Vec<NodeRow>,
    question_links: Vec<(NodeId, Question)>,
    chunk_links: Vec<(NodeId, Chunk)>,
) -> Result<ResearchTree, TreeError> {
    let roots: Vec<NodeId> = rows.iter().filter(|r| r.parent_id.is_none()).map(|r| r.id).collect();
    let root = match roots.as_slice() {
        [only] => *only,
        [] => return Err(TreeError::InvalidStructure("no root node".into())),
        many => {
            return Err(TreeError::InvalidStructure(format!(
                "{} root nodes in session {}",
                many.len(),
                session.id
            )))
        }
    };

    let mut nodes: HashMap<NodeId, ResearchNode> =
        rows.iter().map(|r| (r.id, ResearchNode::from_row(r))).collect();

    rows.sort_by_key(|r| r.rank);
    for row in &rows {
        let Some(parent_id) = row.parent_id else { continue };
        if parent_id == row.id {
            return Err(TreeError::InvalidStructure(format!("node {} is its own parent", row.id)));
        }
        match nodes.get_mut(&parent_id) {
            Some(parent) => parent.push_child(row.id),
            None => {
                return Err(TreeError::InvalidStructure(format!(
                    "node {} references missing parent {}",
                    row.id, parent_id
                )))
            }
        }
    }

    for (node_id, question) in question_links {
        match nodes.get_mut(&node_id) {
            Some(node) => {
                node.attach_question(question);
            }
            None => warn!(node = %node_id, "question link for unknown node ignored"),
        }
    }
    for (node_id, chunk) in chunk_links {
        match nodes.get_mut(&node_id) {
            Some(node) => {
                node.attach_chunk(chunk);
            }
            None => warn!(node = %node_id, "chunk link for unknown node ignored"),
        }
    }

    let total = nodes.len();
    let mut tree = ResearchTree::from_parts(session.id, session.query, root, nodes);
    let reachable = tree.walk().len();
    if reachable != total {
        return Err(TreeError::InvalidStructure(format!(
            "{} node(s) unreachable from the root",
            total - reachable
        )));
    }
    tree.assign_rank_and_level();
    Ok(tree)
}

/// Persist a tree after checking its structural invariants.
///
/// # Panics
///
/// If the in-memory tree violates a rank, level, or linkage invariant.
pub async fn save_tree<S: Store + ?Sized>(store: &S, tree: &ResearchTree) -> Result<()> {
    tree.assert_invariants();
    store.save_tree(tree).await
}

/// Rebuild a saved tree.
pub async fn load_tree<S: Store + ?Sized>(store: &S, session: SessionId) -> Result<ResearchTree> {
    let meta = store
        .session(session)
        .await?
        .ok_or(TreeError::SessionNotFound(session))?;
    let rows = store.node_rows(session).await?;
    let question_links = store.question_links(session).await?;
    let chunk_links = store.chunk_links(session).await?;
    debug!(
        session = %session,
        nodes = rows.len(),
        questions = question_links.len(),
        chunks = chunk_links.len(),
        "loading tree"
    );
    Ok(assemble_tree(meta, rows, question_links, chunk_links)?)
}
