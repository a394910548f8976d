//! HTTP collaborator backend.
//!
//! One base URL serves all four collaborator roles. Each call is a JSON
//! `POST` with a per-request timeout and retry with exponential backoff:
//!
//! | Route | Request | Response |
//! |-------|---------|----------|
//! | `/search` | `{"query", "top_k"}` | `{"chunks": [{"text", "page", "source", "id"}]}` |
//! | `/questions` | `{"evidence", "topic"}` | `{"questions": [".."]}` |
//! | `/write` | `{"kind", "context"}` | `{"text": ".."}` |
//! | `/title` | `{"questions"}` | `{"title": ".."}` |
//!
//! `kind` is one of `section`, `summary`, `conclusion`; `context` is a
//! serialized [`SectionContext`].
//!
//! Retry strategy:
//! - HTTP 429 or 5xx → retry with exponential backoff
//! - HTTP 4xx (not 429) → fail immediately
//! - Network error or timeout → retry

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use research_tree_core::collab::{
    ContentWriter, QuestionGenerator, Retriever, SectionContext, TitleGenerator,
};
use research_tree_core::models::RetrievedChunk;

use crate::config::CollaboratorsConfig;

/// Delay before retry number `attempt` (1-based): 1s, 2s, 4s, … capped at 32s.
pub fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(1 << attempt.saturating_sub(1).min(5))
}

pub struct HttpCollaborator {
    client: reqwest::Client,
    endpoint: String,
    max_retries: u32,
}

#[derive(Deserialize)]
struct SearchResponse {
    chunks: Vec<RetrievedChunk>,
}

#[derive(Deserialize)]
struct QuestionsResponse {
    questions: Vec<String>,
}

#[derive(Deserialize)]
struct TextResponse {
    text: String,
}

#[derive(Deserialize)]
struct TitleResponse {
    title: String,
}

#[derive(Serialize)]
struct WriteRequest<'a> {
    kind: &'a str,
    context: &'a SectionContext,
}

impl HttpCollaborator {
    pub fn new(endpoint: &str, timeout: Duration, max_retries: u32) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            max_retries,
        })
    }

    /// Build from `[collaborators]`. Fails when no endpoint is configured.
    pub fn from_config(config: &CollaboratorsConfig) -> Result<Self> {
        let endpoint = match config.endpoint.as_deref().map(str::trim) {
            Some(e) if !e.is_empty() => e,
            _ => bail!("No collaborator endpoint configured. Set [collaborators] endpoint in the config file."),
        };
        Self::new(
            endpoint,
            Duration::from_secs(config.timeout_secs),
            config.max_retries,
        )
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn post_json<B, T>(&self, route: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned + Send,
    {
        let url = format!("{}{}", self.endpoint, route);
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = backoff_delay(attempt);
                debug!(url = %url, attempt, delay_secs = delay.as_secs(), "retrying collaborator call");
                tokio::time::sleep(delay).await;
            }

            let resp = self.client.post(&url).json(body).send().await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return Ok(response.json::<T>().await?);
                    }

                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        warn!(url = %url, status = %status, "collaborator call failed, will retry");
                        last_err = Some(anyhow::anyhow!(
                            "Collaborator error {} from {}: {}",
                            status,
                            route,
                            body_text
                        ));
                        continue;
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    bail!("Collaborator error {} from {}: {}", status, route, body_text);
                }
                Err(e) => {
                    warn!(url = %url, error = %e, "collaborator request failed");
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("Collaborator call to {} failed after retries", route)))
    }

    async fn write(&self, kind: &str, ctx: &SectionContext) -> Result<String> {
        let resp: TextResponse = self
            .post_json("/write", &WriteRequest { kind, context: ctx })
            .await?;
        Ok(resp.text)
    }
}

#[async_trait]
impl Retriever for HttpCollaborator {
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<RetrievedChunk>> {
        let body = serde_json::json!({ "query": query, "top_k": top_k });
        let resp: SearchResponse = self.post_json("/search", &body).await?;
        let mut chunks = resp.chunks;
        chunks.truncate(top_k);
        Ok(chunks)
    }
}

#[async_trait]
impl QuestionGenerator for HttpCollaborator {
    async fn generate_questions(&self, evidence: &[String], topic: &str) -> Result<Vec<String>> {
        let body = serde_json::json!({ "evidence": evidence, "topic": topic });
        let resp: QuestionsResponse = self.post_json("/questions", &body).await?;
        Ok(resp.questions)
    }
}

#[async_trait]
impl ContentWriter for HttpCollaborator {
    async fn write_section(&self, ctx: &SectionContext) -> Result<String> {
        self.write("section", ctx).await
    }

    async fn write_summary(&self, ctx: &SectionContext) -> Result<String> {
        self.write("summary", ctx).await
    }

    async fn write_conclusion(&self, ctx: &SectionContext) -> Result<String> {
        self.write("conclusion", ctx).await
    }
}

#[async_trait]
impl TitleGenerator for HttpCollaborator {
    async fn title_from_cluster(&self, cluster: &[String]) -> Result<String> {
        let body = serde_json::json!({ "questions": cluster });
        let resp: TitleResponse = self.post_json("/title", &body).await?;
        Ok(resp.title)
    }
}
