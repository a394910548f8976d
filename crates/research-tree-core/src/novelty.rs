//! Novelty of candidate questions.
//!
//! A candidate is novel when it is unlike everything the tree already
//! covers near the node:
//!
//! - the node's own questions that did not come from expansion,
//! - every question attached to any other node in the tree,
//! - the titles of the node's existing children.
//!
//! "Unlike" means a similarity strictly below the question threshold for
//! the first two baselines and strictly below the title threshold for the
//! third.

use serde::{Deserialize, Serialize};

use crate::cluster::Similarity;
use crate::error::TreeError;
use crate::models::{NodeId, Question, QuestionSource, QuestionStatus};
use crate::tree::ResearchTree;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoveltyThresholds {
    /// Question-to-question similarity at or above which a candidate is a repeat.
    pub question: f64,
    /// Question-to-child-title similarity at or above which a candidate is
    /// already covered by a sub-section.
    pub title: f64,
}

impl Default for NoveltyThresholds {
    fn default() -> Self {
        Self {
            question: 0.80,
            title: 0.70,
        }
    }
}

/// The three comparison sets for one node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Baselines {
    pub local: Vec<String>,
    pub global: Vec<String>,
    pub child_titles: Vec<String>,
}

impl Baselines {
    /// Collect the baselines for `node` from the hydrated tree.
    pub fn for_node(tree: &ResearchTree, node: NodeId) -> Result<Self, TreeError> {
        let target = tree.get(node)?;
        let local = target
            .questions()
            .iter()
            .filter(|q| q.source != QuestionSource::Expansion)
            .map(|q| q.text.clone())
            .collect();
        let global = tree
            .nodes()
            .filter(|n| n.id != node)
            .flat_map(|n| n.questions().iter().map(|q| q.text.clone()))
            .collect();
        let child_titles = target
            .children()
            .iter()
            .filter_map(|c| tree.node(*c))
            .map(|c| c.title.clone())
            .collect();
        Ok(Self {
            local,
            global,
            child_titles,
        })
    }

    pub fn is_novel(&self, candidate: &str, sim: &dyn Similarity, thresholds: &NoveltyThresholds) -> bool {
        let unlike = |against: &[String], threshold: f64| {
            against.iter().all(|existing| sim.score(candidate, existing) < threshold)
        };
        unlike(&self.local, thresholds.question)
            && unlike(&self.global, thresholds.question)
            && unlike(&self.child_titles, thresholds.title)
    }

    /// The novel subset of `candidates`, in input order.
    pub fn filter_novel<'a>(
        &self,
        candidates: impl IntoIterator<Item = &'a str>,
        sim: &dyn Similarity,
        thresholds: &NoveltyThresholds,
    ) -> Vec<&'a str> {
        candidates
            .into_iter()
            .filter(|c| self.is_novel(c, sim, thresholds))
            .collect()
    }
}

/// The node's assigned expansion questions that pass the novelty filter,
/// in attachment order.
pub fn novel_expansion_questions(
    tree: &ResearchTree,
    node: NodeId,
    sim: &dyn Similarity,
    thresholds: &NoveltyThresholds,
) -> Result<Vec<Question>, TreeError> {
    let target = tree.get(node)?;
    let candidates: Vec<&Question> = target
        .questions()
        .iter()
        .filter(|q| q.source == QuestionSource::Expansion && q.status == QuestionStatus::Assigned)
        .collect();
    if candidates.is_empty() {
        return Ok(Vec::new());
    }
    let baselines = Baselines::for_node(tree, node)?;
    Ok(candidates
        .into_iter()
        .filter(|q| baselines.is_novel(&q.text, sim, thresholds))
        .cloned()
        .collect())
}
