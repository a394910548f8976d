//! TOML configuration.
//!
//! ```toml
//! [db]
//! path = "./data/rtree.sqlite"
//!
//! [tree]
//! question_similarity = 0.80
//! title_similarity = 0.70
//! cluster_threshold = 0.72
//! min_novel = 2
//! min_clusters = 1
//! min_cluster_size = 2
//! top_k = 5
//!
//! [collaborators]
//! endpoint = "http://127.0.0.1:8088"
//! timeout_secs = 30
//! max_retries = 2
//!
//! [logging]
//! level = "warn"
//! ```
//!
//! Only `[db]` is required.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use research_tree_core::deepen::DeepenPolicy;
use research_tree_core::novelty::NoveltyThresholds;
use research_tree_core::EnginePolicy;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub tree: TreeConfig,
    #[serde(default)]
    pub collaborators: CollaboratorsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
    /// How long a write waits on another process's lock before failing.
    #[serde(default = "default_busy_timeout_secs")]
    pub busy_timeout_secs: u64,
}

fn default_busy_timeout_secs() -> u64 {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct TreeConfig {
    #[serde(default = "default_question_similarity")]
    pub question_similarity: f64,
    #[serde(default = "default_title_similarity")]
    pub title_similarity: f64,
    #[serde(default = "default_cluster_threshold")]
    pub cluster_threshold: f64,
    #[serde(default = "default_min_novel")]
    pub min_novel: usize,
    #[serde(default = "default_one")]
    pub min_clusters: usize,
    #[serde(default = "default_min_cluster_size")]
    pub min_cluster_size: usize,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            question_similarity: default_question_similarity(),
            title_similarity: default_title_similarity(),
            cluster_threshold: default_cluster_threshold(),
            min_novel: default_min_novel(),
            min_clusters: default_one(),
            min_cluster_size: default_min_cluster_size(),
            top_k: default_top_k(),
        }
    }
}

fn default_question_similarity() -> f64 {
    0.80
}
fn default_title_similarity() -> f64 {
    0.70
}
fn default_cluster_threshold() -> f64 {
    0.72
}
fn default_min_novel() -> usize {
    2
}
fn default_one() -> usize {
    1
}
fn default_min_cluster_size() -> usize {
    2
}
fn default_top_k() -> usize {
    5
}

impl TreeConfig {
    pub fn policy(&self) -> EnginePolicy {
        EnginePolicy {
            deepen: DeepenPolicy {
                novelty: NoveltyThresholds {
                    question: self.question_similarity,
                    title: self.title_similarity,
                },
                cluster_threshold: self.cluster_threshold,
                min_novel: self.min_novel,
                min_clusters: self.min_clusters,
                min_cluster_size: self.min_cluster_size,
            },
            top_k: self.top_k,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CollaboratorsConfig {
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for CollaboratorsConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

impl CollaboratorsConfig {
    pub fn is_enabled(&self) -> bool {
        self.endpoint.as_deref().is_some_and(|e| !e.trim().is_empty())
    }
}

fn default_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    2
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

fn default_level() -> String {
    "warn".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config = parse_config(&content)?;
    Ok(config)
}

/// Parse and validate configuration text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    // Validate thresholds
    for (name, value) in [
        ("tree.question_similarity", config.tree.question_similarity),
        ("tree.title_similarity", config.tree.title_similarity),
        ("tree.cluster_threshold", config.tree.cluster_threshold),
    ] {
        if !(0.0..=1.0).contains(&value) {
            anyhow::bail!("{} must be in [0.0, 1.0]", name);
        }
    }

    // Validate counts
    for (name, value) in [
        ("tree.min_novel", config.tree.min_novel),
        ("tree.min_clusters", config.tree.min_clusters),
        ("tree.min_cluster_size", config.tree.min_cluster_size),
        ("tree.top_k", config.tree.top_k),
    ] {
        if value < 1 {
            anyhow::bail!("{} must be >= 1", name);
        }
    }

    // Validate collaborators
    if config.collaborators.max_retries > 5 {
        anyhow::bail!("collaborators.max_retries must be <= 5");
    }
    if config.collaborators.timeout_secs == 0 {
        anyhow::bail!("collaborators.timeout_secs must be > 0");
    }
    if let Some(endpoint) = &config.collaborators.endpoint {
        if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
            anyhow::bail!(
                "collaborators.endpoint must start with http:// or https://, got '{}'",
                endpoint
            );
        }
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let cfg = parse_config("[db]\npath = \"./data/rtree.sqlite\"\n").unwrap();
        assert_eq!(cfg.tree.top_k, 5);
        assert_eq!(cfg.db.busy_timeout_secs, 5);
        assert_eq!(cfg.collaborators.max_retries, 2);
        assert!(!cfg.collaborators.is_enabled());
        assert_eq!(cfg.logging.level, "warn");
        let policy = cfg.tree.policy();
        assert_eq!(policy.deepen.cluster_threshold, 0.72);
        assert_eq!(policy.deepen.novelty.question, 0.80);
        assert_eq!(policy.deepen.novelty.title, 0.70);
    }

    #[test]
    fn test_rejects_out_of_range_threshold() {
        let err = parse_config("[db]\npath = \"x\"\n[tree]\ncluster_threshold = 1.5\n").unwrap_err();
        assert!(err.to_string().contains("tree.cluster_threshold"));
    }

    #[test]
    fn test_rejects_zero_counts_and_retry_storms() {
        assert!(parse_config("[db]\npath = \"x\"\n[tree]\nmin_novel = 0\n").is_err());
        assert!(parse_config("[db]\npath = \"x\"\n[collaborators]\nmax_retries = 9\n").is_err());
        assert!(parse_config("[db]\npath = \"x\"\n[collaborators]\nendpoint = \"localhost\"\n").is_err());
    }

    #[test]
    fn test_missing_db_section() {
        assert!(parse_config("[tree]\ntop_k = 3\n").is_err());
    }
}
