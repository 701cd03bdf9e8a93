//! Load-job inspection for `docket jobs` and `docket job <id>`.

use anyhow::{bail, Result};

use docket_core::models::Job;
use docket_core::store::{JobDetail, Store};

use crate::config::Config;
use crate::db;
use crate::sqlite_store::SqliteStore;

/// A job and its recorded errors, or an error if no such job exists.
pub async fn job_detail(store: &dyn Store, id: &str) -> Result<JobDetail> {
    let Some(job) = store.get_job(id).await? else {
        bail!("job not found: {}", id);
    };
    let errors = store.errors_for_job(id).await?;
    Ok(JobDetail { job, errors })
}

pub fn format_job_line(job: &Job) -> String {
    format!("{} {}", job.started_at.to_rfc3339(), job.id)
}

pub async fn run_list_jobs(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool.clone());
    let jobs = store.list_jobs().await?;
    for job in &jobs {
        println!("{}", format_job_line(job));
    }
    tracing::debug!("found {} jobs", jobs.len());
    pool.close().await;
    Ok(())
}

pub async fn run_show_job(config: &Config, id: &str) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool.clone());
    let result = job_detail(&store, id).await;
    pool.close().await;
    println!("{}", serde_json::to_string_pretty(&result?)?);
    Ok(())
}
