//! Addressing a node inside a tree.
//!
//! Accepted forms, as parsed from the command line:
//!
//! | Input | Meaning |
//! |-------|---------|
//! | `3f2c…` (UUID) | the node with that id |
//! | `root` | the root node |
//! | `0`, `1`, … | the n-th top-level section (0-based) |
//! | `1.2.1` | the dotted display rank, root is `1` |

use std::fmt;
use std::str::FromStr;

use uuid::Uuid;

use crate::models::NodeId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeSelector {
    Id(NodeId),
    Section(usize),
    Rank(Vec<u32>),
}

impl NodeSelector {
    pub fn root() -> Self {
        NodeSelector::Rank(vec![1])
    }
}

impl FromStr for NodeSelector {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("root") {
            return Ok(NodeSelector::root());
        }
        if let Ok(id) = Uuid::parse_str(s) {
            return Ok(NodeSelector::Id(id));
        }
        if s.contains('.') {
            let path = s
                .split('.')
                .map(|p| p.parse::<u32>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|_| anyhow::anyhow!("Invalid rank path: '{}'", s))?;
            return Ok(NodeSelector::Rank(path));
        }
        match s.parse::<usize>() {
            Ok(index) => Ok(NodeSelector::Section(index)),
            Err(_) => anyhow::bail!(
                "Invalid node selector: '{}'. Use a node id, 'root', a section index, or a rank like 1.2",
                s
            ),
        }
    }
}

impl fmt::Display for NodeSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeSelector::Id(id) => write!(f, "{}", id),
            NodeSelector::Section(i) => write!(f, "section {}", i),
            NodeSelector::Rank(path) => {
                let parts: Vec<String> = path.iter().map(|p| p.to_string()).collect();
                write!(f, "rank {}", parts.join("."))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_forms() {
        assert_eq!("root".parse::<NodeSelector>().unwrap(), NodeSelector::Rank(vec![1]));
        assert_eq!("2".parse::<NodeSelector>().unwrap(), NodeSelector::Section(2));
        assert_eq!(
            "1.3.2".parse::<NodeSelector>().unwrap(),
            NodeSelector::Rank(vec![1, 3, 2])
        );
        let id = Uuid::new_v4();
        assert_eq!(
            id.to_string().parse::<NodeSelector>().unwrap(),
            NodeSelector::Id(id)
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("intro".parse::<NodeSelector>().is_err());
        assert!("1..2".parse::<NodeSelector>().is_err());
        assert!("-1".parse::<NodeSelector>().is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(NodeSelector::Rank(vec![1, 2]).to_string(), "rank 1.2");
        assert_eq!(NodeSelector::Section(0).to_string(), "section 0");
    }
}
