use anyhow::{Context, Result};
use docket_core::encoding::Encoding;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub search: SearchConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
    /// Pool size. Concurrent case writers queue for a connection.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// How long a writer waits on SQLite's lock before failing.
    #[serde(default = "default_busy_timeout_secs")]
    pub busy_timeout_secs: u64,
}

impl DbConfig {
    /// Database at `path` with default pool settings.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_connections: default_max_connections(),
            busy_timeout_secs: default_busy_timeout_secs(),
        }
    }
}

fn default_max_connections() -> u32 {
    5
}
fn default_busy_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    /// Files parsed concurrently.
    #[serde(default = "default_max_concurrent_files")]
    pub max_concurrent_files: usize,
    /// In-flight encode+store tasks per file.
    #[serde(default = "default_max_concurrent_cases")]
    pub max_concurrent_cases: usize,
    /// Parsed cases buffered between a file's parser and its writers.
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,
    /// Stop issuing new work after this many seconds. 0 disables the timeout.
    #[serde(default)]
    pub timeout_secs: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_concurrent_files: default_max_concurrent_files(),
            max_concurrent_cases: default_max_concurrent_cases(),
            queue_depth: default_queue_depth(),
            timeout_secs: 0,
        }
    }
}

fn default_max_concurrent_files() -> usize {
    4
}
fn default_max_concurrent_cases() -> usize {
    16
}
fn default_queue_depth() -> usize {
    64
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_encoding")]
    pub default_encoding: String,
    #[serde(default = "default_min_name_length")]
    pub min_name_length: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_encoding: default_encoding(),
            min_name_length: default_min_name_length(),
        }
    }
}

fn default_encoding() -> String {
    "normalized".to_string()
}
fn default_min_name_length() -> usize {
    2
}

impl SearchConfig {
    pub fn encoding(&self) -> Result<Encoding> {
        self.default_encoding
            .parse()
            .map_err(|e: String| anyhow::anyhow!("search.default_encoding: {}", e))
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.db.max_connections == 0 {
        anyhow::bail!("db.max_connections must be >= 1");
    }

    // Validate ingest
    if config.ingest.max_concurrent_files == 0 {
        anyhow::bail!("ingest.max_concurrent_files must be >= 1");
    }
    if config.ingest.max_concurrent_cases == 0 {
        anyhow::bail!("ingest.max_concurrent_cases must be >= 1");
    }
    if config.ingest.queue_depth == 0 {
        anyhow::bail!("ingest.queue_depth must be >= 1");
    }

    // Validate search
    config.search.encoding()?;
    if config.search.min_name_length == 0 {
        anyhow::bail!("search.min_name_length must be >= 1");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<Config> {
        let config: Config = toml::from_str(text)?;
        validate(&config)?;
        Ok(config)
    }

    #[test]
    fn test_defaults() {
        let config = parse("[db]\npath = \"./data/docket.sqlite\"\n").unwrap();
        assert_eq!(config.ingest.max_concurrent_files, 4);
        assert_eq!(config.ingest.max_concurrent_cases, 16);
        assert_eq!(config.ingest.queue_depth, 64);
        assert_eq!(config.ingest.timeout_secs, 0);
        assert_eq!(config.search.encoding().unwrap(), Encoding::Normalized);
        assert_eq!(config.search.min_name_length, 2);
        assert_eq!(config.db.max_connections, 5);
        assert_eq!(config.db.busy_timeout_secs, 10);
    }

    #[test]
    fn test_rejects_empty_pool() {
        let err = parse("[db]\npath = \"x\"\nmax_connections = 0\n").unwrap_err();
        assert!(err.to_string().contains("max_connections"));
    }

    #[test]
    fn test_rejects_zero_concurrency() {
        let err = parse("[db]\npath = \"x\"\n[ingest]\nmax_concurrent_cases = 0\n").unwrap_err();
        assert!(err.to_string().contains("max_concurrent_cases"));
    }

    #[test]
    fn test_rejects_unknown_encoding() {
        let err = parse("[db]\npath = \"x\"\n[search]\ndefault_encoding = \"fuzzy\"\n").unwrap_err();
        assert!(err.to_string().contains("fuzzy"));
    }

    #[test]
    fn test_missing_db_section() {
        assert!(parse("[search]\nmin_name_length = 3\n").is_err());
    }
}
