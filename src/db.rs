use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};

use crate::config::{Config, DbConfig};

fn connect_options(db: &DbConfig) -> SqliteConnectOptions {
    SqliteConnectOptions::new()
        .filename(&db.path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_secs(db.busy_timeout_secs))
}

/// Open the docket database, creating the file and its directory if needed.
///
/// Case writers from every file share this pool; `db.busy_timeout_secs`
/// bounds how long one waits on another's write lock.
pub async fn connect(config: &Config) -> Result<SqlitePool> {
    let db = &config.db;
    if let Some(parent) = db.path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    SqlitePoolOptions::new()
        .max_connections(db.max_connections)
        .connect_with(connect_options(db))
        .await
        .with_context(|| format!("Failed to open database {}", db.path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{IngestConfig, SearchConfig};

    #[tokio::test]
    async fn test_connect_creates_directory_in_wal_mode() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("docket.sqlite");
        let config = Config {
            db: DbConfig::at(&path),
            ingest: IngestConfig::default(),
            search: SearchConfig::default(),
        };

        let pool = connect(&config).await.unwrap();
        assert!(path.exists());
        let mode: String = sqlx::query_scalar("PRAGMA journal_mode")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
        pool.close().await;
    }
}
