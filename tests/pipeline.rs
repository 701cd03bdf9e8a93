//! Load pipeline against the in-memory store.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use tempfile::TempDir;

use docket::config::{Config, DbConfig, IngestConfig, SearchConfig};
use docket::ingest::{run_load, Cancellation};
use docket_core::encoding::Encoding;
use docket_core::error::ErrorKind;
use docket_core::models::{Book, Case, EncodedParticipant, ErrorRecord, Job, Outcome, Plea, Role};
use docket_core::store::memory::InMemoryStore;
use docket_core::store::{ParticipantQuery, Store};

const SCENARIO: &str = "b 1902/6\npg 170\nc 172\nad 30 Mar 1903\nd Charley M. Thomas\nv 123 (speeding)\np g\no g\n";

fn test_config(ingest: IngestConfig) -> Config {
    Config {
        db: DbConfig::at("unused.sqlite"),
        ingest,
        search: SearchConfig::default(),
    }
}

fn write_file(dir: &TempDir, name: &str, content: impl AsRef<[u8]>) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

/// In-memory store whose case writes can be slowed down or made to fail
/// for one case id.
#[derive(Default)]
struct ScriptedStore {
    inner: InMemoryStore,
    fail_case: Option<String>,
    case_delay: Duration,
}

#[async_trait]
impl Store for ScriptedStore {
    async fn record_job(&self, job: &Job) -> Result<()> {
        self.inner.record_job(job).await
    }

    async fn upsert_book(&self, book_id: &str, job_id: &str) -> Result<()> {
        self.inner.upsert_book(book_id, job_id).await
    }

    async fn upsert_case(&self, case: &Case) -> Result<()> {
        if !self.case_delay.is_zero() {
            tokio::time::sleep(self.case_delay).await;
        }
        if self.fail_case.as_deref() == Some(case.id.as_str()) {
            bail!("disk full");
        }
        self.inner.upsert_case(case).await
    }

    async fn upsert_participant_encoding(&self, participant: &EncodedParticipant) -> Result<()> {
        self.inner.upsert_participant_encoding(participant).await
    }

    async fn delete_participant_encodings(&self, case_id: &str) -> Result<()> {
        self.inner.delete_participant_encodings(case_id).await
    }

    async fn record_error(&self, error: &ErrorRecord) -> Result<()> {
        self.inner.record_error(error).await
    }

    async fn get_job(&self, id: &str) -> Result<Option<Job>> {
        self.inner.get_job(id).await
    }

    async fn list_jobs(&self) -> Result<Vec<Job>> {
        self.inner.list_jobs().await
    }

    async fn errors_for_job(&self, job_id: &str) -> Result<Vec<ErrorRecord>> {
        self.inner.errors_for_job(job_id).await
    }

    async fn get_book(&self, id: &str) -> Result<Option<Book>> {
        self.inner.get_book(id).await
    }

    async fn get_case(&self, id: &str) -> Result<Option<Case>> {
        self.inner.get_case(id).await
    }

    async fn cases_for_job(&self, job_id: &str) -> Result<Vec<String>> {
        self.inner.cases_for_job(job_id).await
    }

    async fn find_participants(&self, query: &ParticipantQuery) -> Result<Vec<EncodedParticipant>> {
        self.inner.find_participants(query).await
    }

    async fn reset(&self) -> Result<()> {
        self.inner.reset().await
    }
}

#[tokio::test]
async fn test_end_to_end_scenario() {
    let tmp = TempDir::new().unwrap();
    let file = write_file(&tmp, "1902-6.vtr", SCENARIO);
    let store = Arc::new(InMemoryStore::new());
    let config = test_config(IngestConfig::default());

    let report = run_load(&config, store.clone(), &[file], Cancellation::new())
        .await
        .unwrap();

    assert!(!report.failed());
    assert_eq!(report.files.len(), 1);
    assert_eq!(report.files[0].num_cases, 1);
    assert!(report.files[0].errors.is_empty(), "{:?}", report.files[0].errors);

    let case = store.get_case("1902/6/172").await.unwrap().unwrap();
    assert_eq!(case.book, "1902/6");
    assert_eq!(case.number, "172");
    assert_eq!(case.page, Some(170));
    assert_eq!(case.arrest_date, NaiveDate::from_ymd_opt(1903, 3, 30));
    assert_eq!(case.violation.as_deref(), Some("123"));
    assert_eq!(case.violation_note.as_deref(), Some("speeding"));
    assert_eq!(case.plea, Some(Plea::Guilty));
    assert_eq!(case.outcome, Some(Outcome::Guilty));
    assert_eq!(case.load_job_id, report.job.id);
    assert_eq!(case.participants.len(), 1);
    let defendant = &case.participants[0];
    assert_eq!(defendant.role, Role::Defendant);
    assert_eq!(defendant.first_name, "Charley");
    assert_eq!(defendant.middle_name, "M.");
    assert_eq!(defendant.last_name, "Thomas");

    assert_eq!(store.participant_count(), Encoding::ALL.len());
    let book = store.get_book("1902/6").await.unwrap().unwrap();
    assert!(book.load_jobs.contains(&report.job.id));
    assert_eq!(
        store.cases_for_job(&report.job.id).await.unwrap(),
        vec!["1902/6/172".to_string()]
    );
    assert!(store.errors_for_job(&report.job.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_reload_is_idempotent() {
    let tmp = TempDir::new().unwrap();
    let file = write_file(&tmp, "a.vtr", SCENARIO);
    let store = Arc::new(InMemoryStore::new());
    let config = test_config(IngestConfig::default());

    let first = run_load(&config, store.clone(), &[file.clone()], Cancellation::new())
        .await
        .unwrap();
    let second = run_load(&config, store.clone(), &[file], Cancellation::new())
        .await
        .unwrap();

    assert_eq!(store.case_count(), 1);
    assert_eq!(store.participant_count(), Encoding::ALL.len());
    let book = store.get_book("1902/6").await.unwrap().unwrap();
    assert_eq!(book.load_jobs.len(), 2);
    assert!(book.load_jobs.contains(&first.job.id));
    let case = store.get_case("1902/6/172").await.unwrap().unwrap();
    assert_eq!(case.load_job_id, second.job.id);
    assert_eq!(store.list_jobs().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_recovered_errors_are_recorded() {
    let tmp = TempDir::new().unwrap();
    let file = write_file(
        &tmp,
        "messy.vtr",
        "l Main St\nb 1902/6\nc 1\nd John ?? Smith\nzz what\nsr o\nc 2\nw Mary Jones\n",
    );
    let store = Arc::new(InMemoryStore::new());
    let config = test_config(IngestConfig::default());

    let report = run_load(&config, store.clone(), &[file], Cancellation::new())
        .await
        .unwrap();
    let file_report = &report.files[0];
    assert_eq!(file_report.num_cases, 2);
    assert!(!file_report.failed());

    let errors = store.errors_for_job(&report.job.id).await.unwrap();
    let count = |kind: ErrorKind| errors.iter().filter(|e| e.kind == kind).count();
    // "l" before any case, "sr o" without a note
    assert_eq!(count(ErrorKind::SemanticValidation), 2);
    assert_eq!(count(ErrorKind::GrammarMismatch), 1);
    assert_eq!(count(ErrorKind::CaseValidation), 1);
    // "??" middle name under every encoder but exact
    assert_eq!(count(ErrorKind::EncodingFailure), Encoding::ALL.len() - 1);
    assert_eq!(errors.len(), file_report.errors.len());

    let grammar = errors
        .iter()
        .find(|e| e.kind == ErrorKind::GrammarMismatch)
        .unwrap();
    assert_eq!(grammar.line, Some(5));
    assert!(grammar.message.starts_with("Parse error at "));
    assert!(grammar.message.contains("messy.vtr:5 \"zz what\""));

    let warning = errors
        .iter()
        .find(|e| e.kind == ErrorKind::CaseValidation)
        .unwrap();
    assert_eq!(warning.case_id.as_deref(), Some("1902/6/2"));

    assert!(file_report
        .errors
        .iter()
        .any(|m| m.starts_with("Error encoding middle_name to soundex for 1902/6/1 \"??\"")));
}

#[tokio::test]
async fn test_missing_file_does_not_stop_others() {
    let tmp = TempDir::new().unwrap();
    let good = write_file(&tmp, "good.vtr", SCENARIO);
    let missing = tmp.path().join("missing.vtr");
    let store = Arc::new(InMemoryStore::new());
    let config = test_config(IngestConfig::default());

    let report = run_load(&config, store.clone(), &[missing, good], Cancellation::new())
        .await
        .unwrap();

    assert!(report.failed());
    assert!(report.files[0].aborted);
    assert_eq!(report.files[0].num_cases, 0);
    assert!(report.files[0].errors[0].starts_with("Could not open"));
    assert!(!report.files[1].failed());
    assert_eq!(report.files[1].num_cases, 1);

    let errors = store.errors_for_job(&report.job.id).await.unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].kind, ErrorKind::FileAccess);
    assert!(errors[0].filename.ends_with("missing.vtr"));
}

#[tokio::test]
async fn test_many_cases_with_tight_bounds() {
    let tmp = TempDir::new().unwrap();
    let mut content = String::from("b 1910/2\npg 1\n");
    for n in 1..=60 {
        content.push_str(&format!("c {}\nd Person Number{}\nsr 5 f\n", n, n));
    }
    let file = write_file(&tmp, "big.vtr", &content);
    let store = Arc::new(InMemoryStore::new());
    let config = test_config(IngestConfig {
        max_concurrent_files: 1,
        max_concurrent_cases: 2,
        queue_depth: 1,
        timeout_secs: 0,
    });

    let report = run_load(&config, store.clone(), &[file], Cancellation::new())
        .await
        .unwrap();

    assert_eq!(report.files[0].num_cases, 60);
    assert!(report.files[0].errors.is_empty());
    assert_eq!(store.case_count(), 60);
    assert_eq!(store.participant_count(), 60 * Encoding::ALL.len());
}

#[tokio::test]
async fn test_cancelled_job_dispatches_nothing() {
    let tmp = TempDir::new().unwrap();
    let file = write_file(&tmp, "a.vtr", SCENARIO);
    let store = Arc::new(InMemoryStore::new());
    let config = test_config(IngestConfig::default());
    let cancel = Cancellation::new();
    cancel.cancel();

    let report = run_load(&config, store.clone(), &[file], cancel)
        .await
        .unwrap();

    let file_report = &report.files[0];
    assert!(file_report.cancelled);
    assert_eq!(file_report.num_cases, 0);
    assert!(file_report.failed());
    assert!(file_report.errors.iter().any(|m| m == "ingestion cancelled"));
    assert_eq!(store.case_count(), 0);
    // The job itself is still on record.
    assert!(store.get_job(&report.job.id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_invalid_utf8_line_does_not_stop_file() {
    let tmp = TempDir::new().unwrap();
    let file = write_file(
        &tmp,
        "latin1.vtr",
        b"b 1902/6\nc 1\nd John Smith\nn caf\xe9\nc 2\nd Ann Lee\nc 3\nd Bo Ray\n".as_slice(),
    );
    let store = Arc::new(InMemoryStore::new());
    let config = test_config(IngestConfig::default());

    let report = run_load(&config, store.clone(), &[file], Cancellation::new())
        .await
        .unwrap();

    let file_report = &report.files[0];
    assert!(!file_report.aborted);
    assert!(!file_report.failed());
    assert_eq!(file_report.num_cases, 3);
    assert_eq!(store.case_count(), 3);

    let errors = store.errors_for_job(&report.job.id).await.unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].kind, ErrorKind::SemanticValidation);
    assert_eq!(errors[0].line, Some(4));
    let case = store.get_case("1902/6/1").await.unwrap().unwrap();
    assert!(case.note.unwrap().starts_with("caf"));
}

#[tokio::test]
async fn test_reload_replaces_participant_projections() {
    let tmp = TempDir::new().unwrap();
    let file = write_file(&tmp, "a.vtr", "b 1902/6\nc 1\nd John Smith\n");
    let store = Arc::new(InMemoryStore::new());
    let config = test_config(IngestConfig::default());

    run_load(&config, store.clone(), &[file.clone()], Cancellation::new())
        .await
        .unwrap();
    fs::write(&file, "b 1902/6\nc 1\nd John Smyth\n").unwrap();
    run_load(&config, store.clone(), &[file], Cancellation::new())
        .await
        .unwrap();

    assert_eq!(store.participant_count(), Encoding::ALL.len());
    let mut query = ParticipantQuery::new(Encoding::Exact);
    query.last_name = Some(vec!["Smith".into()]);
    assert!(store.find_participants(&query).await.unwrap().is_empty());
    query.last_name = Some(vec!["Smyth".into()]);
    assert_eq!(store.find_participants(&query).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_persistence_failure_is_isolated_to_one_case() {
    let tmp = TempDir::new().unwrap();
    let file = write_file(
        &tmp,
        "a.vtr",
        "b 1902/6\nc 1\nd Ann Lee\nc 2\nd Bo Ray\nc 3\nd Cy Young\n",
    );
    let store = Arc::new(ScriptedStore {
        fail_case: Some("1902/6/2".into()),
        ..Default::default()
    });
    let config = test_config(IngestConfig::default());

    let report = run_load(&config, store.clone(), &[file], Cancellation::new())
        .await
        .unwrap();

    assert_eq!(report.files[0].num_cases, 3);
    assert!(!report.failed());
    assert!(store.get_case("1902/6/1").await.unwrap().is_some());
    assert!(store.get_case("1902/6/2").await.unwrap().is_none());
    assert!(store.get_case("1902/6/3").await.unwrap().is_some());

    let errors = store.errors_for_job(&report.job.id).await.unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].kind, ErrorKind::PersistenceFailure);
    assert_eq!(errors[0].case_id.as_deref(), Some("1902/6/2"));
    assert!(errors[0].message.starts_with("Could not store case 1902/6/2"));
}

#[tokio::test]
async fn test_timeout_stops_dispatch_but_finishes_writes() {
    let tmp = TempDir::new().unwrap();
    let mut content = String::from("b 1910/2\n");
    for n in 1..=40 {
        content.push_str(&format!("c {}\nd Person Number{}\n", n, n));
    }
    let file = write_file(&tmp, "slow.vtr", content);
    let store = Arc::new(ScriptedStore {
        case_delay: Duration::from_millis(400),
        ..Default::default()
    });
    let config = test_config(IngestConfig {
        max_concurrent_files: 1,
        max_concurrent_cases: 2,
        queue_depth: 1,
        timeout_secs: 1,
    });

    let report = run_load(&config, store.clone(), &[file], Cancellation::new())
        .await
        .unwrap();

    let file_report = &report.files[0];
    assert!(file_report.cancelled);
    assert!(file_report.num_cases > 0);
    assert!(file_report.num_cases < 40);
    // Every dispatched case was written before the report came back.
    assert_eq!(
        store.cases_for_job(&report.job.id).await.unwrap().len(),
        file_report.num_cases
    );
    assert!(file_report.errors.iter().any(|m| m == "ingestion cancelled"));
}
