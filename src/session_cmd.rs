//! Session-level commands: create, list, inspect, outline, and register
//! questions.
//!
//! None of these call a collaborator; they only read and write the store.

use anyhow::{Context, Result};
use std::path::Path;

use research_tree_core::outline::Outline;
use research_tree_core::{NodeSelector, QuestionSource, ResearchEngine, ResearchTree, SessionId};

use crate::config::Config;
use crate::db;
use crate::sqlite_store::SqliteStore;

/// Connect to the configured database and build an engine with the
/// `[tree]` policy.
pub async fn open_engine(config: &Config) -> Result<ResearchEngine<SqliteStore>> {
    let pool = db::connect(config).await?;
    Ok(ResearchEngine::new(SqliteStore::new(pool)).with_policy(config.tree.policy()))
}

pub fn parse_session(id: &str) -> Result<SessionId> {
    uuid::Uuid::parse_str(id.trim()).with_context(|| format!("Invalid session id: '{}'", id))
}

pub fn parse_selector(selector: &str) -> Result<NodeSelector> {
    selector.parse::<NodeSelector>()
}

fn format_timestamp(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| ts.to_string())
}

/// Print the tree as an indented list of display ranks and titles.
pub fn print_outline(tree: &ResearchTree) {
    for id in tree.walk() {
        let Some(node) = tree.node(id) else { continue };
        let indent = "  ".repeat(node.level as usize);
        let marker = if node.is_final() { " [final]" } else { "" };
        println!(
            "{}{} {}{}  ({} questions, {} chunks)",
            indent,
            tree.display_rank(id),
            node.title,
            marker,
            node.questions().len(),
            node.chunks().len()
        );
    }
}

pub async fn run_create(config: &Config, query: &str) -> Result<()> {
    let engine = open_engine(config).await?;
    let tree = engine.create_tree(query).await?;
    engine.store().close().await;
    println!("{}", tree.id);
    Ok(())
}

pub async fn run_sessions(config: &Config) -> Result<()> {
    let engine = open_engine(config).await?;
    let sessions = engine.list_sessions().await?;
    engine.store().close().await;

    if sessions.is_empty() {
        println!("No sessions.");
        return Ok(());
    }
    for s in sessions {
        println!("{}  {}  {}", s.id, format_timestamp(s.created_at), s.query);
    }
    Ok(())
}

pub async fn run_show(config: &Config, session: &str) -> Result<()> {
    let session = parse_session(session)?;
    let engine = open_engine(config).await?;
    let serialized = engine.serialize(session).await?;
    engine.store().close().await;
    println!("{}", serde_json::to_string_pretty(&serialized)?);
    Ok(())
}

pub async fn run_render(config: &Config, session: &str) -> Result<()> {
    let session = parse_session(session)?;
    let engine = open_engine(config).await?;
    let markdown = engine.render_markdown(session).await?;
    engine.store().close().await;
    println!("{}", markdown);
    Ok(())
}

/// Re-stamp rank and level, save, and print the resulting outline.
pub async fn run_rank(config: &Config, session: &str) -> Result<()> {
    let session = parse_session(session)?;
    let engine = open_engine(config).await?;
    let tree = engine.assign_rank_and_level(session).await?;
    engine.store().close().await;
    print_outline(&tree);
    Ok(())
}

pub async fn run_outline(config: &Config, session: &str, path: &Path) -> Result<()> {
    let session = parse_session(session)?;
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read outline file: {}", path.display()))?;
    let outline = Outline::from_json(&text)?;

    let engine = open_engine(config).await?;
    let created = engine.apply_outline(session, &outline).await?;
    let tree = engine.load(session).await?;
    engine.store().close().await;

    println!("Applied outline: {} section(s) created.", created.len());
    print_outline(&tree);
    Ok(())
}

/// Register questions. Without `--node` they are root sub-questions routed
/// to the closest top-level section; with `--node` they attach to that node.
pub async fn run_ask(
    config: &Config,
    session: &str,
    node: Option<&str>,
    source: Option<&str>,
    questions: &[String],
) -> Result<()> {
    let session = parse_session(session)?;
    let source = source.map(str::parse::<QuestionSource>).transpose()?;
    let engine = open_engine(config).await?;

    let placed: Vec<(String, String)> = match node {
        None => {
            if let Some(s) = source.filter(|s| *s != QuestionSource::RootSubq) {
                anyhow::bail!(
                    "--source {} requires --node; unplaced questions are always root_subq",
                    s
                );
            }
            let routed = engine.add_root_questions(session, questions).await?;
            let tree = engine.load(session).await?;
            routed
                .into_iter()
                .map(|(id, q)| (tree.display_rank(id), q.text))
                .collect()
        }
        Some(sel) => {
            let selector = parse_selector(sel)?;
            let source = source.unwrap_or(QuestionSource::Outline);
            let attached = engine
                .attach_questions(session, &selector, questions, source)
                .await?;
            let tree = engine.load(session).await?;
            let rank = tree.display_rank(tree.select(&selector)?);
            attached.into_iter().map(|q| (rank.clone(), q.text)).collect()
        }
    };
    engine.store().close().await;

    for (rank, text) in placed {
        println!("{}  {}", rank, text);
    }
    Ok(())
}
