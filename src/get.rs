//! Case retrieval by `book/number` id, for `docket case <id>`.

use anyhow::{bail, Result};

use docket_core::models::Case;
use docket_core::store::Store;

use crate::config::Config;
use crate::db;
use crate::sqlite_store::SqliteStore;

pub async fn get_case(store: &dyn Store, id: &str) -> Result<Case> {
    match store.get_case(id).await? {
        Some(case) => Ok(case),
        None => bail!("case not found: {}", id),
    }
}

pub async fn run_get(config: &Config, id: &str) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool.clone());
    let result = get_case(&store, id).await;
    pool.close().await;
    println!("{}", serde_json::to_string_pretty(&result?)?);
    Ok(())
}
