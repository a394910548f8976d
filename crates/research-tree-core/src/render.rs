//! Markdown rendering.
//!
//! The root title is the `#` heading, the root summary an executive summary,
//! the root content the abstract, and the root conclusion closes the
//! article. Sections start at `##` and nest one level per tree level,
//! capped at `######`.

use crate::serialize::{serialize_tree, SerializedNode};
use crate::tree::ResearchTree;

const MAX_HEADING_DEPTH: usize = 6;

pub fn to_markdown(tree: &ResearchTree) -> String {
    let doc = serialize_tree(tree);
    let root = &doc.root;

    let title = if root.title.trim().is_empty() {
        "Research Article"
    } else {
        root.title.trim()
    };
    let mut parts = vec![format!("# {}\n", title)];

    if let Some(summary) = non_blank(&root.summary) {
        parts.push(format!("**Executive Summary**\n\n{}\n", summary));
    }
    if let Some(content) = non_blank(&root.content) {
        parts.push(format!("**Abstract**\n\n{}\n", content));
    }
    for section in &root.children {
        let mut out = String::new();
        write_section(section, 2, &mut out);
        parts.push(out);
    }
    if let Some(conclusion) = non_blank(&root.conclusion) {
        parts.push(format!("## Overall Conclusion\n\n{}\n", conclusion));
    }

    parts.join("\n").trim().to_string()
}

fn write_section(node: &SerializedNode, depth: usize, out: &mut String) {
    let hashes = "#".repeat(depth.min(MAX_HEADING_DEPTH));
    out.push_str(&format!("{} {}\n\n", hashes, node.title.trim()));
    if let Some(content) = non_blank(&node.content) {
        out.push_str(content);
        out.push_str("\n\n");
    }
    for child in &node.children {
        write_section(child, depth + 1, out);
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::ResearchNode;

    #[test]
    fn test_markdown_layout() {
        let mut tree = ResearchTree::new("Black holes");
        let root = tree.root_id();
        {
            let r = tree.node_mut(root).unwrap();
            r.summary = Some("Short version.".into());
            r.conclusion = Some("They are strange.".into());
        }
        tree.node_mut(root).unwrap().set_content("A survey.").unwrap();
        let a = tree.add_child(root, ResearchNode::new("Formation")).unwrap();
        tree.node_mut(a).unwrap().set_content("Stars collapse.").unwrap();
        tree.add_child(a, ResearchNode::new("Collapse")).unwrap();
        tree.add_child(root, ResearchNode::new("Evaporation")).unwrap();

        let md = to_markdown(&tree);
        let expected = "# Black holes\n\n\
**Executive Summary**\n\nShort version.\n\n\
**Abstract**\n\nA survey.\n\n\
## Formation\n\nStars collapse.\n\n### Collapse\n\n\n\
## Evaporation\n\n\n\
## Overall Conclusion\n\nThey are strange.";
        assert_eq!(md, expected);
    }

    #[test]
    fn test_root_only_tree() {
        let tree = ResearchTree::new("What is a black hole?");
        assert_eq!(to_markdown(&tree), "# What is a black hole?");
    }
}
