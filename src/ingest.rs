//! Ingestion pipeline orchestration.
//!
//! Coordinates a load job: parse → encode → store, for every input file.
//!
//! - Each file is scanned sequentially on a blocking thread; line order
//!   carries the book/page context, so a single file is never split.
//! - Finished cases flow through a bounded channel. Each one is encoded and
//!   stored by its own task, bounded per file by `ingest.max_concurrent_cases`.
//! - Files run concurrently up to `ingest.max_concurrent_files`.
//!
//! Every recovered failure goes through an [`ErrorSink`], which records it
//! in the store against the job and keeps the message for the per-file
//! report. Only a file that cannot be opened or read is cut short.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use tokio::sync::{mpsc, Notify, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use docket_core::encoding::{encode_case, EncodedCase, Encoding};
use docket_core::error::{ErrorKind, ParseFailure};
use docket_core::models::{Case, ErrorRecord, Job};
use docket_core::store::Store;
use docket_core::vtr::CaseReader;

use crate::config::{Config, IngestConfig};
use crate::db;
use crate::sqlite_store::SqliteStore;

/// Shared stop signal for a load job.
///
/// Once cancelled, no new cases are dispatched; tasks already running are
/// allowed to finish their writes.
#[derive(Clone, Default)]
pub struct Cancellation {
    flag: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Resolves once [`cancel`](Self::cancel) has been called.
    pub async fn cancelled(&self) {
        let notified = self.notify.notified();
        if self.is_cancelled() {
            return;
        }
        notified.await;
    }
}

/// Records recovered failures for one file of one job.
pub struct ErrorSink {
    store: Arc<dyn Store>,
    job_id: String,
    filename: String,
    messages: Mutex<Vec<String>>,
}

impl ErrorSink {
    pub fn new(store: Arc<dyn Store>, job_id: &str, filename: &str) -> Self {
        Self {
            store,
            job_id: job_id.to_string(),
            filename: filename.to_string(),
            messages: Mutex::new(Vec::new()),
        }
    }

    pub async fn record(
        &self,
        kind: ErrorKind,
        line: Option<usize>,
        case_id: Option<&str>,
        message: String,
    ) {
        if kind.is_warning() {
            warn!(file = %self.filename, "{}", message);
        } else {
            error!(file = %self.filename, "{}", message);
        }
        if let Ok(mut messages) = self.messages.lock() {
            messages.push(message.clone());
        }
        let record = ErrorRecord {
            job_id: self.job_id.clone(),
            filename: self.filename.clone(),
            line,
            case_id: case_id.map(str::to_string),
            kind,
            message,
            created_at: Utc::now(),
        };
        if let Err(err) = self.store.record_error(&record).await {
            error!(file = %self.filename, "could not record error: {:#}", err);
        }
    }

    pub async fn parse_failure(&self, failure: &ParseFailure) {
        let message = format!(
            "Parse error at {}:{} \"{}\" ({})",
            self.filename, failure.line_number, failure.line, failure.cause
        );
        self.record(
            failure.kind,
            Some(failure.line_number),
            failure.case_id.as_deref(),
            message,
        )
        .await;
    }

    /// Messages recorded so far.
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().map(|m| m.clone()).unwrap_or_default()
    }
}

/// Result of scanning one file.
#[derive(Debug)]
pub struct ParseOutcome {
    pub failures: Vec<ParseFailure>,
    /// Set when reading stopped early on an I/O error.
    pub read_error: Option<io::Error>,
    /// Set when the scan stopped because the consumer or the job gave up.
    pub stopped: bool,
}

/// Scan `path`, handing each finished case to `on_case`.
///
/// `on_case` returns `false` to stop the scan. Fails only when the file
/// cannot be opened; an I/O error partway through ends the scan and is
/// returned in the outcome. A line that is not valid UTF-8 is decoded
/// lossily, scanned as usual, and reported as a `SemanticValidation`
/// failure.
pub fn parse_file<F>(path: &Path, cancel: &Cancellation, mut on_case: F) -> Result<ParseOutcome>
where
    F: FnMut(Case) -> bool,
{
    let file = File::open(path)?;
    let mut read_error = None;
    let mut decode_failures = Vec::new();
    let mut line_number = 0usize;
    let lines = BufReader::new(file)
        .split(b'\n')
        .map_while(|bytes| match bytes {
            Ok(bytes) => {
                line_number += 1;
                let mut text = match String::from_utf8(bytes) {
                    Ok(text) => text,
                    Err(err) => {
                        let text = String::from_utf8_lossy(err.as_bytes()).into_owned();
                        decode_failures.push(ParseFailure::semantic(
                            line_number,
                            text.trim_end_matches('\r'),
                            "line is not valid UTF-8",
                        ));
                        text
                    }
                };
                if text.ends_with('\r') {
                    text.pop();
                }
                Some(text)
            }
            Err(err) => {
                read_error = Some(err);
                None
            }
        });

    let mut stopped = false;
    let mut reader = CaseReader::new(lines);
    for case in reader.by_ref() {
        if cancel.is_cancelled() || !on_case(case) {
            stopped = true;
            break;
        }
    }
    let mut failures = reader.into_failures();
    if !decode_failures.is_empty() {
        failures.extend(decode_failures);
        failures.sort_by_key(|f| f.line_number);
    }

    Ok(ParseOutcome {
        failures,
        read_error,
        stopped,
    })
}

/// Store one encoded case: the case document, its book, and its
/// participant projections, which replace any stored for the same case.
/// Each write fails independently.
///
/// Returns `true` when every write succeeded.
pub async fn store_case(
    store: &dyn Store,
    mut case: Case,
    encoded: &EncodedCase,
    job_id: &str,
    sink: &ErrorSink,
) -> bool {
    case.load_job_id = job_id.to_string();
    debug!(case = %case.id, "storing");
    let mut ok = true;

    if let Err(err) = store.upsert_case(&case).await {
        ok = false;
        sink.record(
            ErrorKind::PersistenceFailure,
            None,
            Some(&case.id),
            format!("Could not store case {}: {:#}", case.id, err),
        )
        .await;
    }

    if let Err(err) = store.upsert_book(&case.book, job_id).await {
        ok = false;
        sink.record(
            ErrorKind::PersistenceFailure,
            None,
            Some(&case.id),
            format!("Could not store book {}: {:#}", case.book, err),
        )
        .await;
    }

    // Projections of an earlier load of this case may name people it no longer has.
    if let Err(err) = store.delete_participant_encodings(&case.id).await {
        ok = false;
        sink.record(
            ErrorKind::PersistenceFailure,
            None,
            Some(&case.id),
            format!("Could not clear encodings for {}: {:#}", case.id, err),
        )
        .await;
    }

    for participant in &encoded.participants {
        if let Err(err) = store.upsert_participant_encoding(participant).await {
            ok = false;
            sink.record(
                ErrorKind::PersistenceFailure,
                None,
                Some(&case.id),
                format!(
                    "Could not store {} encoding of {} for {}: {:#}",
                    participant.encoding, participant.full_name, case.id, err
                ),
            )
            .await;
        }
    }
    ok
}

/// Encode then store one case, reporting encoder failures to `sink`.
pub async fn process_case(store: &dyn Store, case: Case, job_id: &str, sink: &ErrorSink) -> bool {
    let encoded = encode_case(&case, &Encoding::ALL);
    for failure in &encoded.failures {
        sink.record(
            ErrorKind::EncodingFailure,
            None,
            Some(&failure.case_id),
            failure.message(),
        )
        .await;
    }
    store_case(store, case, &encoded, job_id, sink).await
}

/// Outcome of loading one file.
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub filename: String,
    pub num_cases: usize,
    pub errors: Vec<String>,
    /// The file could not be opened, or reading it failed partway.
    pub aborted: bool,
    /// The job was cancelled before the file was finished.
    pub cancelled: bool,
}

impl FileReport {
    /// A file fails when it could not be read or yielded no cases.
    pub fn failed(&self) -> bool {
        self.aborted || self.num_cases == 0
    }
}

/// Outcome of a load job.
#[derive(Debug, Clone, Serialize)]
pub struct LoadReport {
    pub job: Job,
    pub files: Vec<FileReport>,
}

impl LoadReport {
    pub fn failed(&self) -> bool {
        self.files.iter().any(FileReport::failed)
    }
}

async fn load_file(
    settings: IngestConfig,
    store: Arc<dyn Store>,
    job_id: String,
    filename: String,
    cancel: Cancellation,
) -> FileReport {
    info!(file = %filename, "loading");
    let sink = Arc::new(ErrorSink::new(store.clone(), &job_id, &filename));

    let (tx, mut rx) = mpsc::channel::<Case>(settings.queue_depth);
    let parser = {
        let path = PathBuf::from(&filename);
        let cancel = cancel.clone();
        tokio::task::spawn_blocking(move || {
            parse_file(&path, &cancel, |case| tx.blocking_send(case).is_ok())
        })
    };

    let permits = Arc::new(Semaphore::new(settings.max_concurrent_cases));
    let mut tasks = JoinSet::new();
    let mut num_cases = 0usize;
    let mut cancelled = false;

    loop {
        let case = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                cancelled = true;
                break;
            }
            case = rx.recv() => match case {
                Some(case) => case,
                None => break,
            },
        };
        let Ok(permit) = permits.clone().acquire_owned().await else {
            break;
        };
        info!(case = %case.id, "new case");
        num_cases += 1;
        let store = store.clone();
        let sink = sink.clone();
        let job_id = job_id.clone();
        tasks.spawn(async move {
            let _permit = permit;
            process_case(store.as_ref(), case, &job_id, &sink).await
        });
    }
    drop(rx);

    while let Some(joined) = tasks.join_next().await {
        if let Err(err) = joined {
            sink.record(
                ErrorKind::PersistenceFailure,
                None,
                None,
                format!("case task failed: {}", err),
            )
            .await;
        }
    }

    let mut aborted = false;
    match parser.await {
        Ok(Ok(outcome)) => {
            for failure in &outcome.failures {
                sink.parse_failure(failure).await;
            }
            if let Some(err) = outcome.read_error {
                aborted = true;
                sink.record(
                    ErrorKind::FileAccess,
                    None,
                    None,
                    format!("Could not read {}: {}", filename, err),
                )
                .await;
            }
            if outcome.stopped && cancel.is_cancelled() {
                cancelled = true;
            }
        }
        Ok(Err(err)) => {
            aborted = true;
            sink.record(
                ErrorKind::FileAccess,
                None,
                None,
                format!("Could not open {}: {:#}", filename, err),
            )
            .await;
        }
        Err(err) => {
            aborted = true;
            sink.record(
                ErrorKind::FileAccess,
                None,
                None,
                format!("parser for {} failed: {}", filename, err),
            )
            .await;
        }
    }

    if cancelled {
        sink.record(
            ErrorKind::FileAccess,
            None,
            None,
            "ingestion cancelled".to_string(),
        )
        .await;
    }

    info!(file = %filename, num_cases, "processed {} cases", num_cases);
    FileReport {
        filename,
        num_cases,
        errors: sink.messages(),
        aborted,
        cancelled,
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()
            .context("Failed to read current directory")?
            .join(path))
    }
}

/// Run one load job over `files`.
///
/// Records the job, then loads every file. Fails only when the job itself
/// cannot be recorded; per-file problems land in the report.
pub async fn run_load(
    config: &Config,
    store: Arc<dyn Store>,
    files: &[PathBuf],
    cancel: Cancellation,
) -> Result<LoadReport> {
    let filenames = files
        .iter()
        .map(|f| absolute(f).map(|p| p.display().to_string()))
        .collect::<Result<Vec<_>>>()?;

    let job = Job::new(filenames.clone());
    store
        .record_job(&job)
        .await
        .context("Failed to record load job")?;
    info!(job = %job.id, "starting job");

    let settings = config.ingest.clone();
    let timer = if settings.timeout_secs > 0 {
        let cancel = cancel.clone();
        let limit = Duration::from_secs(settings.timeout_secs);
        Some(tokio::spawn(async move {
            tokio::time::sleep(limit).await;
            warn!("load timed out after {:?}", limit);
            cancel.cancel();
        }))
    } else {
        None
    };

    let permits = Arc::new(Semaphore::new(settings.max_concurrent_files));
    let mut tasks = JoinSet::new();
    for (index, filename) in filenames.iter().enumerate() {
        let permits = permits.clone();
        let settings = settings.clone();
        let store = store.clone();
        let job_id = job.id.clone();
        let filename = filename.clone();
        let cancel = cancel.clone();
        tasks.spawn(async move {
            let _permit = permits.acquire_owned().await.ok();
            let report = load_file(settings, store, job_id, filename, cancel).await;
            (index, report)
        });
    }

    let mut reports: Vec<Option<FileReport>> = vec![None; filenames.len()];
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, report)) => reports[index] = Some(report),
            Err(err) => error!("file task failed: {}", err),
        }
    }

    if let Some(timer) = timer {
        timer.abort();
    }

    let files = reports
        .into_iter()
        .zip(filenames)
        .map(|(report, filename)| {
            report.unwrap_or(FileReport {
                filename,
                num_cases: 0,
                errors: vec!["file task failed".to_string()],
                aborted: true,
                cancelled: false,
            })
        })
        .collect();

    Ok(LoadReport { job, files })
}

/// `docket load`: ingest `files` into the configured database.
///
/// Returns `false` when any file failed. Ctrl-C cancels the job.
pub async fn run_load_files(config: &Config, files: &[PathBuf], reset: bool) -> Result<bool> {
    let pool = db::connect(config).await?;
    let store: Arc<dyn Store> = Arc::new(SqliteStore::new(pool.clone()));

    if reset {
        info!("resetting the database");
        store.reset().await?;
    }

    let cancel = Cancellation::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupted, finishing in-flight writes");
                cancel.cancel();
            }
        })
    };

    let report = run_load(config, store, files, cancel).await;
    interrupt.abort();
    pool.close().await;

    let report = report?;
    print_report(&report);
    Ok(!report.failed())
}

/// Print a load report the way `docket load` shows it.
pub fn print_report(report: &LoadReport) {
    println!("load {}", report.job.id);
    for file in &report.files {
        println!("  {}: processed {} cases", file.filename, file.num_cases);
        for message in &file.errors {
            println!("    {}", message);
        }
    }
    if report.failed() {
        println!("failed");
    } else {
        println!("ok");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docket_core::store::memory::InMemoryStore;
    use std::io::Write;

    #[test]
    fn test_parse_file_stops_when_consumer_refuses() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "b 1900/1\nc 1\nd A B\nc 2\nd C D\nc 3\nd E F").unwrap();
        let mut seen = Vec::new();
        let outcome = parse_file(file.path(), &Cancellation::new(), |case| {
            seen.push(case.id);
            seen.len() < 2
        })
        .unwrap();
        assert!(outcome.stopped);
        assert_eq!(seen, vec!["1900/1/1", "1900/1/2"]);
    }

    #[test]
    fn test_parse_file_continues_past_invalid_utf8() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"b 1900/1\r\nc 1\nd A B\nn caf\xe9\nc 2\nd C D\n").unwrap();
        let mut seen = Vec::new();
        let outcome = parse_file(file.path(), &Cancellation::new(), |case| {
            seen.push(case);
            true
        })
        .unwrap();
        assert!(outcome.read_error.is_none());
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].book, "1900/1");
        assert_eq!(seen[0].note.as_deref(), Some("caf\u{FFFD}"));
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].line_number, 4);
        assert_eq!(outcome.failures[0].kind, ErrorKind::SemanticValidation);
    }

    #[test]
    fn test_parse_file_missing() {
        let result = parse_file(Path::new("/nonexistent/ledger.vtr"), &Cancellation::new(), |_| true);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_cancelled_resolves_after_cancel() {
        let cancel = Cancellation::new();
        let waiter = {
            let cancel = cancel.clone();
            tokio::spawn(async move { cancel.cancelled().await })
        };
        cancel.cancel();
        waiter.await.unwrap();
        assert!(cancel.is_cancelled());
        cancel.cancelled().await;
    }

    #[tokio::test]
    async fn test_sink_records_parse_failure() {
        let store = Arc::new(InMemoryStore::new());
        let sink = ErrorSink::new(store.clone(), "job-1", "/tmp/x.vtr");
        let failure = ParseFailure::grammar(4, "zz 1", "unknown field keyword 'zz'");
        sink.parse_failure(&failure).await;
        let messages = sink.messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].starts_with("Parse error at /tmp/x.vtr:4 \"zz 1\""));
        let stored = store.errors_for_job("job-1").await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].line, Some(4));
        assert_eq!(stored[0].kind, ErrorKind::GrammarMismatch);
    }
}
