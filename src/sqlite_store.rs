//! SQLite-backed [`Store`] implementation.
//!
//! UUIDs are stored as hyphenated TEXT. Association order is `rowid` order,
//! which is insertion order, so nodes list their questions and chunks in the
//! order they were attached.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use tracing::{debug, warn};
use uuid::Uuid;

use research_tree_core::ids::normalize_question;
use research_tree_core::models::{
    Chunk, NodeId, NodeRow, Question, QuestionId, QuestionSource, QuestionStatus, SessionId,
    SessionRow,
};
use research_tree_core::store::Store;
use research_tree_core::ResearchTree;

/// SQLite implementation of the [`Store`] trait.
///
/// Wraps a [`SqlitePool`]; the schema is created by
/// [`migrate::apply_schema`](crate::migrate::apply_schema).
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

const QUESTION_COLUMNS: &str = "q.id, q.session_id, q.text, q.source, q.status";

fn parse_uuid(value: &str) -> Result<Uuid> {
    Uuid::parse_str(value).with_context(|| format!("Invalid UUID in database: '{}'", value))
}

fn question_from_row(row: &SqliteRow) -> Result<Question> {
    let id: String = row.get("id");
    let session_id: String = row.get("session_id");
    let source: String = row.get("source");
    Ok(Question {
        id: parse_uuid(&id)?,
        session_id: parse_uuid(&session_id)?,
        text: row.get("text"),
        source: source.parse::<QuestionSource>()?,
        status: QuestionStatus::from_code(row.get("status"))?,
    })
}

fn chunk_from_row(row: &SqliteRow) -> Chunk {
    Chunk {
        id: row.get("id"),
        text: row.get("text"),
        page: row.get("page"),
        source: row.get("source"),
    }
}

fn node_from_row(row: &SqliteRow) -> Result<NodeRow> {
    let id: String = row.get("id");
    let session_id: String = row.get("session_id");
    let parent_id: Option<String> = row.get("parent_id");
    let rank: i64 = row.get("rank");
    let level: i64 = row.get("level");
    Ok(NodeRow {
        id: parse_uuid(&id)?,
        session_id: parse_uuid(&session_id)?,
        parent_id: parent_id.as_deref().map(parse_uuid).transpose()?,
        title: row.get("title"),
        goals: row.get("goals"),
        content: row.get("content"),
        summary: row.get("summary"),
        conclusion: row.get("conclusion"),
        rank: u32::try_from(rank).with_context(|| format!("Invalid rank {} for node {}", rank, id))?,
        level: u32::try_from(level).with_context(|| format!("Invalid level {} for node {}", level, id))?,
        is_final: row.get("is_final"),
    })
}

fn session_from_row(row: &SqliteRow) -> Result<SessionRow> {
    let id: String = row.get("id");
    Ok(SessionRow {
        id: parse_uuid(&id)?,
        query: row.get("query"),
        created_at: row.get("created_at"),
    })
}

async fn node_exists(tx: &mut Transaction<'_, Sqlite>, node: NodeId) -> Result<bool> {
    let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM research_nodes WHERE id = ?")
        .bind(node.to_string())
        .fetch_optional(&mut **tx)
        .await?;
    Ok(found.is_some())
}

/// Link a question and move it to at least `Assigned`. Returns whether a
/// new link was created.
async fn link_question(tx: &mut Transaction<'_, Sqlite>, node: NodeId, question: QuestionId) -> Result<bool> {
    let inserted = sqlx::query("INSERT OR IGNORE INTO node_questions (node_id, question_id) VALUES (?, ?)")
        .bind(node.to_string())
        .bind(question.to_string())
        .execute(&mut **tx)
        .await?
        .rows_affected();
    advance_status(tx, question, QuestionStatus::Assigned).await?;
    Ok(inserted > 0)
}

async fn advance_status(
    tx: &mut Transaction<'_, Sqlite>,
    question: QuestionId,
    to: QuestionStatus,
) -> Result<u64> {
    let changed = sqlx::query("UPDATE questions SET status = ? WHERE id = ? AND status < ?")
        .bind(to.code())
        .bind(question.to_string())
        .bind(to.code())
        .execute(&mut **tx)
        .await?
        .rows_affected();
    Ok(changed)
}

async fn insert_chunk(tx: &mut Transaction<'_, Sqlite>, chunk: &Chunk) -> Result<u64> {
    let inserted = sqlx::query("INSERT OR IGNORE INTO chunks (id, text, page, source) VALUES (?, ?, ?, ?)")
        .bind(&chunk.id)
        .bind(&chunk.text)
        .bind(chunk.page)
        .bind(&chunk.source)
        .execute(&mut **tx)
        .await?
        .rows_affected();
    Ok(inserted)
}

/// Insert a question if neither its id nor its text is registered, and
/// return the id the registry knows it by.
async fn merge_question(tx: &mut Transaction<'_, Sqlite>, q: &Question) -> Result<QuestionId> {
    let norm = normalize_question(&q.text);
    sqlx::query(
        r#"
        INSERT INTO questions (id, session_id, text, norm_text, source, status)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(q.id.to_string())
    .bind(q.session_id.to_string())
    .bind(&q.text)
    .bind(&norm)
    .bind(q.source.as_str())
    .bind(q.status.code())
    .execute(&mut **tx)
    .await?;

    let id: String = sqlx::query_scalar("SELECT id FROM questions WHERE session_id = ? AND norm_text = ?")
        .bind(q.session_id.to_string())
        .bind(&norm)
        .fetch_one(&mut **tx)
        .await?;
    let id = parse_uuid(&id)?;
    if id != q.id {
        warn!(question = %q.id, registered = %id, "question text already registered under another id");
    }
    advance_status(tx, id, q.status).await?;
    Ok(id)
}

#[async_trait]
impl Store for SqliteStore {
    async fn upsert_questions(
        &self,
        session: SessionId,
        texts: &[String],
        source: QuestionSource,
    ) -> Result<Vec<Question>> {
        let mut tx = self.pool.begin().await?;
        let mut out = Vec::with_capacity(texts.len());
        for text in texts.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
            let norm = normalize_question(text);
            sqlx::query(
                r#"
                INSERT INTO questions (id, session_id, text, norm_text, source, status)
                VALUES (?, ?, ?, ?, ?, 0)
                ON CONFLICT(session_id, norm_text) DO NOTHING
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(session.to_string())
            .bind(text)
            .bind(&norm)
            .bind(source.as_str())
            .execute(&mut *tx)
            .await?;

            let row = sqlx::query(&format!(
                "SELECT {} FROM questions q WHERE q.session_id = ? AND q.norm_text = ?",
                QUESTION_COLUMNS
            ))
            .bind(session.to_string())
            .bind(&norm)
            .fetch_one(&mut *tx)
            .await?;
            out.push(question_from_row(&row)?);
        }
        tx.commit().await?;
        debug!(session = %session, count = out.len(), source = %source, "questions upserted");
        Ok(out)
    }

    async fn attach_questions(&self, node: NodeId, ids: &[QuestionId]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;
        if !node_exists(&mut tx, node).await? {
            warn!(node = %node, "attach to unknown node skipped");
            return Ok(0);
        }
        let mut linked = 0;
        for id in ids {
            let known: Option<i64> = sqlx::query_scalar("SELECT 1 FROM questions WHERE id = ?")
                .bind(id.to_string())
                .fetch_optional(&mut *tx)
                .await?;
            if known.is_none() {
                warn!(node = %node, question = %id, "attach of unknown question skipped");
                continue;
            }
            if link_question(&mut tx, node, *id).await? {
                linked += 1;
            }
        }
        tx.commit().await?;
        Ok(linked)
    }

    async fn mark_questions_consumed(&self, ids: &[QuestionId]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;
        let mut changed = 0u64;
        for id in ids {
            changed += sqlx::query("UPDATE questions SET status = ? WHERE id = ? AND status = ?")
                .bind(QuestionStatus::Consumed.code())
                .bind(id.to_string())
                .bind(QuestionStatus::Assigned.code())
                .execute(&mut *tx)
                .await?
                .rows_affected();
        }
        tx.commit().await?;
        Ok(changed as usize)
    }

    async fn questions_for_node(&self, node: NodeId) -> Result<Vec<Question>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {}
            FROM node_questions nq
            JOIN questions q ON q.id = nq.question_id
            WHERE nq.node_id = ?
            ORDER BY nq.rowid
            "#,
            QUESTION_COLUMNS
        ))
        .bind(node.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(question_from_row).collect()
    }

    async fn upsert_chunks(&self, chunks: &[Chunk]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0u64;
        for chunk in chunks {
            inserted += insert_chunk(&mut tx, chunk).await?;
        }
        tx.commit().await?;
        Ok(inserted as usize)
    }

    async fn attach_chunks(&self, node: NodeId, ids: &[String]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;
        if !node_exists(&mut tx, node).await? {
            warn!(node = %node, "attach to unknown node skipped");
            return Ok(0);
        }
        let mut linked = 0u64;
        for id in ids {
            let known: Option<i64> = sqlx::query_scalar("SELECT 1 FROM chunks WHERE id = ?")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
            if known.is_none() {
                warn!(node = %node, chunk = %id, "attach of unknown chunk skipped");
                continue;
            }
            linked += sqlx::query("INSERT OR IGNORE INTO node_chunks (node_id, chunk_id) VALUES (?, ?)")
                .bind(node.to_string())
                .bind(id)
                .execute(&mut *tx)
                .await?
                .rows_affected();
        }
        tx.commit().await?;
        Ok(linked as usize)
    }

    async fn chunks_for_node(&self, node: NodeId) -> Result<Vec<Chunk>> {
        let rows = sqlx::query(
            r#"
            SELECT c.id, c.text, c.page, c.source
            FROM node_chunks nc
            JOIN chunks c ON c.id = nc.chunk_id
            WHERE nc.node_id = ?
            ORDER BY nc.rowid
            "#,
        )
        .bind(node.to_string())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(chunk_from_row).collect())
    }

    async fn save_tree(&self, tree: &ResearchTree) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO sessions (id, query, created_at) VALUES (?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET query = excluded.query
            "#,
        )
        .bind(tree.id.to_string())
        .bind(&tree.query)
        .bind(chrono::Utc::now().timestamp())
        .execute(&mut *tx)
        .await?;

        // Pre-order walk: every parent row is written before its children.
        for node in tree.nodes() {
            let row = node.to_row(tree.id);
            sqlx::query(
                r#"
                INSERT INTO research_nodes (id, session_id, parent_id, title, goals, content,
                                            summary, conclusion, rank, level, is_final)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    parent_id = excluded.parent_id,
                    title = excluded.title,
                    goals = excluded.goals,
                    content = excluded.content,
                    summary = excluded.summary,
                    conclusion = excluded.conclusion,
                    rank = excluded.rank,
                    level = excluded.level,
                    is_final = excluded.is_final
                "#,
            )
            .bind(row.id.to_string())
            .bind(row.session_id.to_string())
            .bind(row.parent_id.map(|p| p.to_string()))
            .bind(&row.title)
            .bind(&row.goals)
            .bind(&row.content)
            .bind(&row.summary)
            .bind(&row.conclusion)
            .bind(row.rank as i64)
            .bind(row.level as i64)
            .bind(row.is_final)
            .execute(&mut *tx)
            .await?;

            for chunk in node.chunks() {
                insert_chunk(&mut tx, chunk).await?;
                sqlx::query("INSERT OR IGNORE INTO node_chunks (node_id, chunk_id) VALUES (?, ?)")
                    .bind(node.id.to_string())
                    .bind(&chunk.id)
                    .execute(&mut *tx)
                    .await?;
            }
            for question in node.questions() {
                let id = merge_question(&mut tx, question).await?;
                link_question(&mut tx, node.id, id).await?;
            }
        }

        tx.commit().await?;
        debug!(session = %tree.id, nodes = tree.len(), "tree saved");
        Ok(())
    }

    async fn session(&self, id: SessionId) -> Result<Option<SessionRow>> {
        let row = sqlx::query("SELECT id, query, created_at FROM sessions WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(session_from_row).transpose()
    }

    async fn node_rows(&self, session: SessionId) -> Result<Vec<NodeRow>> {
        let rows = sqlx::query(
            r#"
            SELECT id, session_id, parent_id, title, goals, content, summary, conclusion,
                   rank, level, is_final
            FROM research_nodes
            WHERE session_id = ?
            ORDER BY rowid
            "#,
        )
        .bind(session.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(node_from_row).collect()
    }

    async fn question_links(&self, session: SessionId) -> Result<Vec<(NodeId, Question)>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT nq.node_id AS node_id, {}
            FROM node_questions nq
            JOIN research_nodes n ON n.id = nq.node_id
            JOIN questions q ON q.id = nq.question_id
            WHERE n.session_id = ?
            ORDER BY nq.rowid
            "#,
            QUESTION_COLUMNS
        ))
        .bind(session.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| {
                let node_id: String = row.get("node_id");
                Ok((parse_uuid(&node_id)?, question_from_row(row)?))
            })
            .collect()
    }

    async fn chunk_links(&self, session: SessionId) -> Result<Vec<(NodeId, Chunk)>> {
        let rows = sqlx::query(
            r#"
            SELECT nc.node_id AS node_id, c.id, c.text, c.page, c.source
            FROM node_chunks nc
            JOIN research_nodes n ON n.id = nc.node_id
            JOIN chunks c ON c.id = nc.chunk_id
            WHERE n.session_id = ?
            ORDER BY nc.rowid
            "#,
        )
        .bind(session.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| {
                let node_id: String = row.get("node_id");
                Ok((parse_uuid(&node_id)?, chunk_from_row(row)))
            })
            .collect()
    }

    async fn list_sessions(&self) -> Result<Vec<SessionRow>> {
        let rows = sqlx::query("SELECT id, query, created_at FROM sessions ORDER BY created_at, rowid")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(session_from_row).collect()
    }
}
