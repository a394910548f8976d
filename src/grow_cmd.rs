//! Collaborator-backed commands: expand, deepen, write, complete.

use anyhow::Result;

use research_tree_core::collab::{HeuristicTitler, TitleGenerator};
use research_tree_core::DeepenOutcome;

use crate::collaborators::HttpCollaborator;
use crate::config::Config;
use crate::session_cmd::{open_engine, parse_selector, parse_session};

pub async fn run_expand(
    config: &Config,
    session: &str,
    selector: &str,
    top_k: Option<usize>,
) -> Result<()> {
    let session = parse_session(session)?;
    let selector = parse_selector(selector)?;
    let collab = HttpCollaborator::from_config(&config.collaborators)?;

    let engine = open_engine(config).await?;
    let outcome = engine
        .expand(session, &selector, top_k, &collab, &collab)
        .await?;
    engine.store().close().await;

    println!(
        "Expanded: {} new chunk(s), {} new question(s).",
        outcome.new_chunks.len(),
        outcome.new_questions.len()
    );
    for q in &outcome.new_questions {
        println!("  ? {}", q.text);
    }
    if let Some(err) = &outcome.question_error {
        eprintln!("Warning: question generation failed: {}", err);
    }
    Ok(())
}

pub async fn run_deepen(config: &Config, session: &str, selector: &str, check: bool) -> Result<()> {
    let session = parse_session(session)?;
    let selector = parse_selector(selector)?;
    let engine = open_engine(config).await?;

    if check {
        let ready = engine.should_deepen(session, &selector).await?;
        engine.store().close().await;
        println!("{}", if ready { "ready" } else { "not ready" });
        return Ok(());
    }

    let http = if config.collaborators.is_enabled() {
        Some(HttpCollaborator::from_config(&config.collaborators)?)
    } else {
        None
    };
    let titler: &dyn TitleGenerator = match &http {
        Some(collab) => collab,
        None => &HeuristicTitler,
    };

    let outcome = engine.deepen(session, &selector, titler).await?;
    engine.store().close().await;

    match outcome {
        DeepenOutcome::Deepened { created } => {
            println!("Deepened: {} sub-section(s) created.", created.len());
            for (_, title) in created {
                println!("  + {}", title);
            }
        }
        DeepenOutcome::Skipped { reason } => {
            println!("Skipped: {}", reason);
        }
    }
    Ok(())
}

pub async fn run_write(config: &Config, session: &str, selector: &str) -> Result<()> {
    let session = parse_session(session)?;
    let selector = parse_selector(selector)?;
    let collab = HttpCollaborator::from_config(&config.collaborators)?;

    let engine = open_engine(config).await?;
    let content = engine.write_section(session, &selector, &collab).await?;
    engine.store().close().await;

    println!("{}", content);
    Ok(())
}

pub async fn run_complete(config: &Config, session: &str, selector: &str) -> Result<()> {
    let session = parse_session(session)?;
    let selector = parse_selector(selector)?;
    let collab = HttpCollaborator::from_config(&config.collaborators)?;

    let engine = open_engine(config).await?;
    let done = engine.complete_section(session, &selector, &collab).await?;
    engine.store().close().await;

    println!("Summary:\n{}\n", done.summary);
    println!("Conclusion:\n{}", done.conclusion);
    Ok(())
}
