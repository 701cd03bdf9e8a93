//! Storage abstraction for Docket.
//!
//! The [`Store`] trait covers every document the ingestion pipeline writes
//! (jobs, books, cases, participant encodings, errors) and the read side
//! the CLI uses to inspect them. Writes are upserts keyed by natural keys,
//! so re-loading an unchanged ledger leaves the store unchanged apart from
//! the new job record.
//!
//! Implementations must be `Send + Sync`; the ingestion pipeline calls
//! them from many tasks at once.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;

use crate::encoding::Encoding;
use crate::models::{Book, Case, EncodedParticipant, ErrorRecord, Job};

/// A participant search over one encoding.
///
/// Each name field holds the encoded candidates for the search term; a
/// projection matches a field when any of its stored candidates equals any
/// query candidate. Fields left `None` are not constrained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantQuery {
    pub encoding: Encoding,
    pub first_name: Option<Vec<String>>,
    pub middle_name: Option<Vec<String>>,
    pub last_name: Option<Vec<String>>,
    /// Inclusive lower bound on the case arrest date.
    pub start: Option<NaiveDate>,
    /// Inclusive upper bound on the case arrest date.
    pub stop: Option<NaiveDate>,
}

impl ParticipantQuery {
    pub fn new(encoding: Encoding) -> Self {
        Self {
            encoding,
            first_name: None,
            middle_name: None,
            last_name: None,
            start: None,
            stop: None,
        }
    }

    /// True when no name field and no date bound is set.
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.middle_name.is_none()
            && self.last_name.is_none()
            && self.start.is_none()
            && self.stop.is_none()
    }

    /// Whether `p` satisfies this query.
    pub fn matches(&self, p: &EncodedParticipant) -> bool {
        fn field_matches(wanted: &Option<Vec<String>>, stored: &Option<Vec<String>>) -> bool {
            match wanted {
                None => true,
                Some(wanted) => stored
                    .as_ref()
                    .is_some_and(|stored| stored.iter().any(|s| wanted.contains(s))),
            }
        }
        if p.encoding != self.encoding {
            return false;
        }
        if self.start.is_some() || self.stop.is_some() {
            let Some(date) = p.date else {
                return false;
            };
            if self.start.is_some_and(|start| date < start) || self.stop.is_some_and(|stop| date > stop) {
                return false;
            }
        }
        field_matches(&self.first_name, &p.first_name)
            && field_matches(&self.middle_name, &p.middle_name)
            && field_matches(&self.last_name, &p.last_name)
    }

    /// The same query re-targeted at another encoding.
    pub fn with_encoding(&self, encoding: Encoding) -> Self {
        Self {
            encoding,
            ..self.clone()
        }
    }
}

/// A job together with every error recorded against it.
#[derive(Debug, Clone, Serialize)]
pub struct JobDetail {
    #[serde(flatten)]
    pub job: Job,
    pub errors: Vec<ErrorRecord>,
}

/// Abstract storage backend for Docket.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`record_job`](Store::record_job) | Insert the record of a new load job |
/// | [`upsert_book`](Store::upsert_book) | Create a book or add a job to its job set |
/// | [`upsert_case`](Store::upsert_case) | Replace-or-insert a case by `book/number` |
/// | [`upsert_participant_encoding`](Store::upsert_participant_encoding) | Replace-or-insert one encoded projection |
/// | [`delete_participant_encodings`](Store::delete_participant_encodings) | Drop every projection of one case |
/// | [`record_error`](Store::record_error) | Append an error record |
/// | [`get_job`](Store::get_job) / [`list_jobs`](Store::list_jobs) | Inspect jobs |
/// | [`errors_for_job`](Store::errors_for_job) | Errors recorded by one job |
/// | [`get_book`](Store::get_book) / [`get_case`](Store::get_case) | Fetch by key |
/// | [`cases_for_job`](Store::cases_for_job) | Case ids last stored by one job |
/// | [`find_participants`](Store::find_participants) | Encoded-name search |
/// | [`reset`](Store::reset) | Drop every stored document |
#[async_trait]
pub trait Store: Send + Sync {
    async fn record_job(&self, job: &Job) -> Result<()>;

    /// Upsert the book with key `book_id`, adding `job_id` to its job set.
    async fn upsert_book(&self, book_id: &str, job_id: &str) -> Result<()>;

    async fn upsert_case(&self, case: &Case) -> Result<()>;

    /// Keyed by `(case_id, encoding, full_name, role)`.
    async fn upsert_participant_encoding(&self, participant: &EncodedParticipant) -> Result<()>;

    /// Remove all projections of `case_id`, so a reloaded case does not
    /// keep matching names it no longer has.
    async fn delete_participant_encodings(&self, case_id: &str) -> Result<()>;

    /// Insert-only.
    async fn record_error(&self, error: &ErrorRecord) -> Result<()>;

    async fn get_job(&self, id: &str) -> Result<Option<Job>>;

    /// All jobs, newest first.
    async fn list_jobs(&self) -> Result<Vec<Job>>;

    /// Errors of one job, in the order they were recorded.
    async fn errors_for_job(&self, job_id: &str) -> Result<Vec<ErrorRecord>>;

    async fn get_book(&self, id: &str) -> Result<Option<Book>>;

    async fn get_case(&self, id: &str) -> Result<Option<Case>>;

    /// Ids of cases whose latest write came from `job_id`, sorted.
    async fn cases_for_job(&self, job_id: &str) -> Result<Vec<String>>;

    /// Projections matching `query`, ordered by case id.
    async fn find_participants(&self, query: &ParticipantQuery) -> Result<Vec<EncodedParticipant>>;

    async fn reset(&self) -> Result<()>;
}
