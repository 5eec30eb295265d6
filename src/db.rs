use serde::Serialize;
use sqlx::{FromRow, SqlitePool};

use crate::editor::ProcessStatistics;

pub async fn init_db(pool: &SqlitePool) -> anyhow::Result<()> {
    // Pragmas for better durability/performance
    if let Err(e) = sqlx::query("PRAGMA journal_mode=WAL;").execute(pool).await {
        tracing::warn!("Failed to set WAL journal mode: {}", e);
    }
    if let Err(e) = sqlx::query("PRAGMA synchronous=NORMAL;").execute(pool).await {
        tracing::warn!("Failed to set synchronous mode: {}", e);
    }
    if let Err(e) = sqlx::query("PRAGMA busy_timeout=10000;").execute(pool).await {
        tracing::warn!("Failed to set busy_timeout: {}", e);
    }

    // processes table (registry + statistics written on save)
    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS processes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL UNIQUE,
            ruleset TEXT NOT NULL,
            docstruct_count INTEGER NOT NULL DEFAULT 0,
            metadata_count INTEGER NOT NULL DEFAULT 0,
            image_count INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now')),
            updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now'))
        )"#,
    )
    .execute(pool)
    .await?;

    if let Err(e) = sqlx::query("CREATE INDEX IF NOT EXISTS idx_processes_updated ON processes(updated_at DESC)")
        .execute(pool)
        .await
    {
        tracing::warn!("Failed to create index idx_processes_updated: {}", e);
    }

    Ok(())
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ProcessRow {
    pub id: i64,
    pub title: String,
    pub ruleset: String,
    pub docstruct_count: i64,
    pub metadata_count: i64,
    pub image_count: i64,
    pub created_at: String,
    pub updated_at: String,
}

const PROCESS_COLUMNS: &str =
    "id, title, ruleset, docstruct_count, metadata_count, image_count, created_at, updated_at";

pub async fn insert_process(pool: &SqlitePool, title: &str, ruleset: &str) -> Result<ProcessRow, sqlx::Error> {
    let id = sqlx::query("INSERT INTO processes(title, ruleset) VALUES(?1, ?2)")
        .bind(title)
        .bind(ruleset)
        .execute(pool)
        .await?
        .last_insert_rowid();
    get_process(pool, id).await?.ok_or(sqlx::Error::RowNotFound)
}

pub async fn get_process(pool: &SqlitePool, id: i64) -> Result<Option<ProcessRow>, sqlx::Error> {
    sqlx::query_as::<_, ProcessRow>(&format!("SELECT {} FROM processes WHERE id = ?1", PROCESS_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn find_process_by_title(pool: &SqlitePool, title: &str) -> Result<Option<ProcessRow>, sqlx::Error> {
    sqlx::query_as::<_, ProcessRow>(&format!("SELECT {} FROM processes WHERE title = ?1", PROCESS_COLUMNS))
        .bind(title)
        .fetch_optional(pool)
        .await
}

pub async fn list_processes(pool: &SqlitePool, limit: i64, offset: i64) -> Result<Vec<ProcessRow>, sqlx::Error> {
    sqlx::query_as::<_, ProcessRow>(&format!(
        "SELECT {} FROM processes ORDER BY id ASC LIMIT ?1 OFFSET ?2",
        PROCESS_COLUMNS
    ))
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
}

pub async fn update_statistics(pool: &SqlitePool, id: i64, stats: &ProcessStatistics) -> Result<(), sqlx::Error> {
    let result = sqlx::query(
        r#"UPDATE processes
           SET docstruct_count = ?2, metadata_count = ?3, image_count = ?4,
               updated_at = strftime('%Y-%m-%dT%H:%M:%SZ','now')
           WHERE id = ?1"#,
    )
    .bind(id)
    .bind(stats.docstruct_count)
    .bind(stats.metadata_count)
    .bind(stats.image_count)
    .execute(pool)
    .await?;
    if result.rows_affected() == 0 {
        return Err(sqlx::Error::RowNotFound);
    }
    Ok(())
}
