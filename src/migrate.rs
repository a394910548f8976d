use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply_schema(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create every table and index. Safe to run repeatedly.
pub async fn apply_schema(pool: &SqlitePool) -> Result<()> {
    // One row per research tree
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sessions (
            id TEXT PRIMARY KEY,
            query TEXT NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Flat node table; parent_id is NULL only for the root
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS research_nodes (
            id TEXT PRIMARY KEY,
            session_id TEXT NOT NULL,
            parent_id TEXT,
            title TEXT NOT NULL,
            goals TEXT,
            content TEXT,
            summary TEXT,
            conclusion TEXT,
            rank INTEGER NOT NULL,
            level INTEGER NOT NULL,
            is_final INTEGER NOT NULL DEFAULT 0,
            FOREIGN KEY (session_id) REFERENCES sessions(id),
            FOREIGN KEY (parent_id) REFERENCES research_nodes(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Question registry; status codes are ordered 0 < 1 < 2
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS questions (
            id TEXT PRIMARY KEY,
            session_id TEXT NOT NULL,
            text TEXT NOT NULL,
            norm_text TEXT NOT NULL,
            source TEXT NOT NULL,
            status INTEGER NOT NULL DEFAULT 0,
            UNIQUE(session_id, norm_text)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Chunk registry, content-addressed
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chunks (
            id TEXT PRIMARY KEY,
            text TEXT NOT NULL,
            page INTEGER,
            source TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS node_questions (
            node_id TEXT NOT NULL,
            question_id TEXT NOT NULL,
            PRIMARY KEY (node_id, question_id),
            FOREIGN KEY (node_id) REFERENCES research_nodes(id),
            FOREIGN KEY (question_id) REFERENCES questions(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS node_chunks (
            node_id TEXT NOT NULL,
            chunk_id TEXT NOT NULL,
            PRIMARY KEY (node_id, chunk_id),
            FOREIGN KEY (node_id) REFERENCES research_nodes(id),
            FOREIGN KEY (chunk_id) REFERENCES chunks(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_nodes_session_id ON research_nodes(session_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_nodes_parent_id ON research_nodes(parent_id)")
        .execute(pool)
        .await?;
    // One root per session.
    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_nodes_one_root ON research_nodes(session_id) WHERE parent_id IS NULL",
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_questions_session_id ON questions(session_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_node_chunks_chunk_id ON node_chunks(chunk_id)")
        .execute(pool)
        .await?;

    Ok(())
}
