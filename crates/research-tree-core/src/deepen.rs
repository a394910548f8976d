//! Deciding whether a node should grow children, and growing them.
//!
//! Planning and applying are split so that titling (which may call an
//! external generator) happens between the two without holding a borrow on
//! the tree.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::cluster::{group_similar_by, Similarity};
use crate::error::TreeError;
use crate::models::{NodeId, Question};
use crate::novelty::{novel_expansion_questions, NoveltyThresholds};
use crate::tree::{ResearchNode, ResearchTree};

pub const NOT_ENOUGH_NOVEL: &str = "Not enough novel expansion questions";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeepenPolicy {
    pub novelty: NoveltyThresholds,
    /// Clustering threshold (τ).
    pub cluster_threshold: f64,
    pub min_novel: usize,
    pub min_clusters: usize,
    pub min_cluster_size: usize,
}

impl Default for DeepenPolicy {
    fn default() -> Self {
        Self {
            novelty: NoveltyThresholds::default(),
            cluster_threshold: 0.72,
            min_novel: 2,
            min_clusters: 1,
            min_cluster_size: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeepenPlan {
    /// Qualifying clusters, in the order clustering produced them.
    Ready { clusters: Vec<Vec<Question>> },
    Skipped { reason: String },
}

impl DeepenPlan {
    pub fn is_ready(&self) -> bool {
        matches!(self, DeepenPlan::Ready { .. })
    }
}

/// Run the novelty filter and clustering for `node` without touching the tree.
pub fn plan_deepen(
    tree: &ResearchTree,
    node: NodeId,
    sim: &dyn Similarity,
    policy: &DeepenPolicy,
) -> Result<DeepenPlan, TreeError> {
    let novel = novel_expansion_questions(tree, node, sim, &policy.novelty)?;
    debug!(node = %node, novel = novel.len(), "novelty filter");
    if novel.len() < policy.min_novel {
        return Ok(DeepenPlan::Skipped {
            reason: NOT_ENOUGH_NOVEL.to_string(),
        });
    }

    let clusters: Vec<Vec<Question>> =
        group_similar_by(novel, |q: &Question| q.text.as_str(), sim, policy.cluster_threshold)
            .into_iter()
            .filter(|c| c.len() >= policy.min_cluster_size)
            .collect();

    if clusters.is_empty() || clusters.len() < policy.min_clusters {
        return Ok(DeepenPlan::Skipped {
            reason: format!(
                "No clusters with at least {} related questions",
                policy.min_cluster_size
            ),
        });
    }
    Ok(DeepenPlan::Ready { clusters })
}

/// Append one child per titled cluster under `node`, attach each cluster's
/// questions to its child, and re-stamp ranks and levels.
///
/// Returns the created `(id, title)` pairs in rank order.
pub fn apply_deepen(
    tree: &mut ResearchTree,
    node: NodeId,
    titled: Vec<(String, Vec<Question>)>,
) -> Result<Vec<(NodeId, String)>, TreeError> {
    tree.get(node)?;
    let mut created = Vec::with_capacity(titled.len());
    for (title, questions) in titled {
        let child = tree.add_child(node, ResearchNode::new(title.clone()))?;
        for q in questions {
            tree.attach_question(child, q)?;
        }
        info!(parent = %node, child = %child, title = %title, "created sub-section");
        created.push((child, title));
    }
    tree.assign_rank_and_level();
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::LexicalRatio;
    use crate::models::{QuestionSource, QuestionStatus};

    fn add_expansion(tree: &mut ResearchTree, node: NodeId, texts: &[&str]) {
        for text in texts {
            let mut q = Question::proposed(tree.id, text, QuestionSource::Expansion);
            q.status = QuestionStatus::Assigned;
            tree.attach_question(node, q).unwrap();
        }
    }

    #[test]
    fn test_skips_with_one_novel_question() {
        let mut tree = ResearchTree::new("Black holes");
        let root = tree.root_id();
        let section = tree.add_child(root, ResearchNode::new("Formation")).unwrap();
        add_expansion(&mut tree, section, &["How do black holes form?"]);

        let plan = plan_deepen(&tree, section, &LexicalRatio, &DeepenPolicy::default()).unwrap();
        assert_eq!(
            plan,
            DeepenPlan::Skipped {
                reason: NOT_ENOUGH_NOVEL.into()
            }
        );
        assert!(tree.node(section).unwrap().children().is_empty());
    }

    #[test]
    fn test_skips_when_no_cluster_is_big_enough() {
        let mut tree = ResearchTree::new("Black holes");
        let root = tree.root_id();
        add_expansion(
            &mut tree,
            root,
            &["How do black holes form?", "Who discovered quasars?"],
        );
        let plan = plan_deepen(&tree, root, &LexicalRatio, &DeepenPolicy::default()).unwrap();
        assert_eq!(
            plan,
            DeepenPlan::Skipped {
                reason: "No clusters with at least 2 related questions".into()
            }
        );
    }

    #[test]
    fn test_two_clusters_become_two_children() {
        let mut tree = ResearchTree::new("Black holes");
        let root = tree.root_id();
        let section = tree.add_child(root, ResearchNode::new("Physics")).unwrap();
        tree.add_child(section, ResearchNode::new("Accretion")).unwrap();
        add_expansion(
            &mut tree,
            section,
            &[
                "How do black holes form?",
                "What is Hawking radiation?",
                "How do black holes evaporate?",
                "What is Hawking radiation made of?",
            ],
        );

        let plan = plan_deepen(&tree, section, &LexicalRatio, &DeepenPolicy::default()).unwrap();
        let clusters = match plan {
            DeepenPlan::Ready { clusters } => clusters,
            other => panic!("expected a ready plan, got {:?}", other),
        };
        assert_eq!(clusters.len(), 2);

        let titled = clusters
            .into_iter()
            .enumerate()
            .map(|(i, c)| (format!("Cluster {}", i + 1), c))
            .collect();
        let created = apply_deepen(&mut tree, section, titled).unwrap();
        assert_eq!(created.len(), 2);

        let parent = tree.node(section).unwrap();
        assert_eq!(parent.children().len(), 3);
        for (expected_rank, (id, _)) in (2u32..).zip(&created) {
            let child = tree.node(*id).unwrap();
            assert_eq!(child.rank, expected_rank);
            assert_eq!(child.level, parent.level + 1);
            assert_eq!(child.questions().len(), 2);
            assert!(child
                .questions()
                .iter()
                .all(|q| q.status == QuestionStatus::Assigned));
        }
        tree.assert_invariants();

        // the new children's questions now form the global baseline
        let again = plan_deepen(&tree, section, &LexicalRatio, &DeepenPolicy::default()).unwrap();
        assert!(!again.is_ready());
    }
}
