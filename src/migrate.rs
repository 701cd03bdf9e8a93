use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create every table and index. Safe to run repeatedly.
pub async fn migrate(pool: &SqlitePool) -> Result<()> {
    // Load jobs
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS jobs (
            id TEXT PRIMARY KEY,
            started_at TEXT NOT NULL,
            filenames_json TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Books and the jobs that touched them
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS books (
            id TEXT PRIMARY KEY,
            year INTEGER NOT NULL,
            number TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS book_jobs (
            book_id TEXT NOT NULL,
            job_id TEXT NOT NULL,
            PRIMARY KEY (book_id, job_id),
            FOREIGN KEY (book_id) REFERENCES books(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Cases: key columns plus the full document
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS cases (
            id TEXT PRIMARY KEY,
            book TEXT NOT NULL,
            number TEXT NOT NULL,
            arrest_date TEXT,
            load_job_id TEXT NOT NULL,
            source_hash TEXT NOT NULL,
            doc_json TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Encoded participant projections
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS participants (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            case_id TEXT NOT NULL,
            encoding TEXT NOT NULL,
            full_name TEXT NOT NULL,
            role TEXT NOT NULL,
            date TEXT,
            first_name_json TEXT,
            middle_name_json TEXT,
            last_name_json TEXT,
            UNIQUE(case_id, encoding, full_name, role)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Errors are append-only
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS errors (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            job_id TEXT NOT NULL,
            filename TEXT NOT NULL,
            line INTEGER,
            case_id TEXT,
            kind TEXT NOT NULL,
            message TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_cases_load_job_id ON cases(load_job_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_errors_job_id ON errors(job_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_participants_encoding ON participants(encoding)")
        .execute(pool)
        .await?;

    Ok(())
}
