//! Outline documents.
//!
//! An outline is the planned section structure of an article, usually
//! produced by a generator and reviewed by a person before it is applied.
//!
//! ```json
//! {
//!   "title": "Black Holes",
//!   "abstract": "A short survey.",
//!   "sections": [
//!     {
//!       "heading": "Formation",
//!       "goals": "Explain stellar collapse",
//!       "questions": ["How do black holes form?"],
//!       "subsections": []
//!     }
//!   ]
//! }
//! ```

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::error::TreeError;
use crate::models::NodeId;
use crate::tree::{ResearchNode, ResearchTree};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outline {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, rename = "abstract")]
    pub abstract_text: Option<String>,
    #[serde(default)]
    pub sections: Vec<OutlineSection>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlineSection {
    pub heading: String,
    #[serde(default)]
    pub goals: Option<String>,
    pub questions: Vec<String>,
    #[serde(default)]
    pub subsections: Vec<OutlineSection>,
}

impl Outline {
    pub fn from_json(text: &str) -> Result<Self> {
        let outline: Outline = serde_json::from_str(text)?;
        outline.validate()?;
        Ok(outline)
    }

    /// Every section needs a heading and at least one non-blank question.
    pub fn validate(&self) -> Result<(), TreeError> {
        fn check(section: &OutlineSection, path: &str) -> Result<(), TreeError> {
            if section.heading.trim().is_empty() {
                return Err(TreeError::InvalidOutline(format!("section {} has an empty heading", path)));
            }
            if section.questions.iter().all(|q| q.trim().is_empty()) {
                return Err(TreeError::InvalidOutline(format!(
                    "section '{}' must have at least one question",
                    section.heading
                )));
            }
            for (i, sub) in section.subsections.iter().enumerate() {
                check(sub, &format!("{}.{}", path, i + 1))?;
            }
            Ok(())
        }
        for (i, section) in self.sections.iter().enumerate() {
            check(section, &(i + 1).to_string())?;
        }
        Ok(())
    }
}

/// Add the outline's sections under the root, after any existing children,
/// and adopt its title and abstract.
///
/// The title replaces the root title when present. The abstract becomes the
/// root content only when the root has none yet and is not final.
///
/// Returns each created node with the question texts it should receive, in
/// depth-first order.
pub fn apply_outline(tree: &mut ResearchTree, outline: &Outline) -> Result<Vec<(NodeId, Vec<String>)>, TreeError> {
    outline.validate()?;
    let root = tree.root_id();
    {
        let root_node = tree.get_mut(root)?;
        if let Some(title) = outline.title.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            root_node.title = title.to_string();
        }
        if let Some(text) = outline.abstract_text.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            if root_node.content().is_none() && !root_node.is_final() {
                root_node.set_content(text)?;
            }
        }
    }

    let mut created = Vec::new();
    for section in &outline.sections {
        add_section(tree, root, section, &mut created)?;
    }
    tree.assign_rank_and_level();
    Ok(created)
}

fn add_section(
    tree: &mut ResearchTree,
    parent: NodeId,
    section: &OutlineSection,
    created: &mut Vec<(NodeId, Vec<String>)>,
) -> Result<(), TreeError> {
    let goals = section
        .goals
        .as_deref()
        .map(str::trim)
        .filter(|g| !g.is_empty())
        .map(str::to_string);
    let node = ResearchNode::new(section.heading.trim()).with_goals(goals);
    let id = tree.add_child(parent, node)?;
    let questions = section
        .questions
        .iter()
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .collect();
    created.push((id, questions));
    for sub in &section.subsections {
        add_section(tree, id, sub, created)?;
    }
    Ok(())
}
