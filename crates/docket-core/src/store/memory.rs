//! In-memory [`Store`] implementation for tests.
//!
//! Maps behind `std::sync::RwLock`. Keys match the SQLite backend so both
//! stores give the same idempotence guarantees.

use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::encoding::Encoding;
use crate::models::{Book, Case, EncodedParticipant, ErrorRecord, Job, Role};

use super::{ParticipantQuery, Store};

type ParticipantKey = (String, Encoding, String, Role);

/// In-memory store for tests.
pub struct InMemoryStore {
    jobs: RwLock<HashMap<String, Job>>,
    books: RwLock<HashMap<String, Book>>,
    cases: RwLock<BTreeMap<String, Case>>,
    participants: RwLock<BTreeMap<ParticipantKey, EncodedParticipant>>,
    errors: RwLock<Vec<ErrorRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            books: RwLock::new(HashMap::new()),
            cases: RwLock::new(BTreeMap::new()),
            participants: RwLock::new(BTreeMap::new()),
            errors: RwLock::new(Vec::new()),
        }
    }

    /// Number of stored cases.
    pub fn case_count(&self) -> usize {
        self.cases.read().map(|c| c.len()).unwrap_or(0)
    }

    /// Number of stored participant projections.
    pub fn participant_count(&self) -> usize {
        self.participants.read().map(|p| p.len()).unwrap_or(0)
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>> {
    lock.read().map_err(|_| anyhow!("store lock poisoned"))
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>> {
    lock.write().map_err(|_| anyhow!("store lock poisoned"))
}

#[async_trait]
impl Store for InMemoryStore {
    async fn record_job(&self, job: &Job) -> Result<()> {
        write(&self.jobs)?.insert(job.id.clone(), job.clone());
        Ok(())
    }

    async fn upsert_book(&self, book_id: &str, job_id: &str) -> Result<()> {
        let fresh = Book::from_key(book_id)?;
        let mut books = write(&self.books)?;
        let book = books.entry(book_id.to_string()).or_insert(fresh);
        book.load_jobs.insert(job_id.to_string());
        Ok(())
    }

    async fn upsert_case(&self, case: &Case) -> Result<()> {
        write(&self.cases)?.insert(case.id.clone(), case.clone());
        Ok(())
    }

    async fn upsert_participant_encoding(&self, participant: &EncodedParticipant) -> Result<()> {
        write(&self.participants)?.insert(participant.key(), participant.clone());
        Ok(())
    }

    async fn delete_participant_encodings(&self, case_id: &str) -> Result<()> {
        write(&self.participants)?.retain(|(id, ..), _| id != case_id);
        Ok(())
    }

    async fn record_error(&self, error: &ErrorRecord) -> Result<()> {
        write(&self.errors)?.push(error.clone());
        Ok(())
    }

    async fn get_job(&self, id: &str) -> Result<Option<Job>> {
        Ok(read(&self.jobs)?.get(id).cloned())
    }

    async fn list_jobs(&self) -> Result<Vec<Job>> {
        let mut jobs: Vec<Job> = read(&self.jobs)?.values().cloned().collect();
        jobs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(jobs)
    }

    async fn errors_for_job(&self, job_id: &str) -> Result<Vec<ErrorRecord>> {
        Ok(read(&self.errors)?
            .iter()
            .filter(|e| e.job_id == job_id)
            .cloned()
            .collect())
    }

    async fn get_book(&self, id: &str) -> Result<Option<Book>> {
        Ok(read(&self.books)?.get(id).cloned())
    }

    async fn get_case(&self, id: &str) -> Result<Option<Case>> {
        Ok(read(&self.cases)?.get(id).cloned())
    }

    async fn cases_for_job(&self, job_id: &str) -> Result<Vec<String>> {
        Ok(read(&self.cases)?
            .values()
            .filter(|c| c.load_job_id == job_id)
            .map(|c| c.id.clone())
            .collect())
    }

    async fn find_participants(&self, query: &ParticipantQuery) -> Result<Vec<EncodedParticipant>> {
        Ok(read(&self.participants)?
            .values()
            .filter(|p| query.matches(p))
            .cloned()
            .collect())
    }

    async fn reset(&self) -> Result<()> {
        write(&self.jobs)?.clear();
        write(&self.books)?.clear();
        write(&self.cases)?.clear();
        write(&self.participants)?.clear();
        write(&self.errors)?.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::encode_case;
    use crate::error::ErrorKind;
    use crate::models::Participant;
    use chrono::{NaiveDate, Utc};

    fn sample_case(job_id: &str) -> Case {
        let mut case = Case::new("1902/6", "172", Some(170));
        case.arrest_date = NaiveDate::from_ymd_opt(1903, 3, 30);
        case.participants.push(Participant::new(Role::Defendant, "Charley M. Thomas"));
        case.load_job_id = job_id.to_string();
        case
    }

    #[tokio::test]
    async fn test_upsert_case_is_idempotent() {
        let store = InMemoryStore::new();
        let case = sample_case("job-1");
        store.upsert_case(&case).await.unwrap();
        store.upsert_case(&case).await.unwrap();
        assert_eq!(store.case_count(), 1);
        let stored = store.get_case("1902/6/172").await.unwrap().unwrap();
        assert_eq!(stored, case);
    }

    #[tokio::test]
    async fn test_participant_upsert_is_idempotent() {
        let store = InMemoryStore::new();
        let case = sample_case("job-1");
        for _ in 0..2 {
            for p in encode_case(&case, &Encoding::ALL).participants {
                store.upsert_participant_encoding(&p).await.unwrap();
            }
        }
        assert_eq!(store.participant_count(), Encoding::ALL.len());
    }

    #[tokio::test]
    async fn test_delete_participant_encodings_is_per_case() {
        let store = InMemoryStore::new();
        let first = sample_case("job-1");
        let mut second = Case::new("1902/6", "173", None);
        second.participants.push(Participant::new(Role::Witness, "Ann Lee"));
        for case in [&first, &second] {
            for p in encode_case(case, &Encoding::ALL).participants {
                store.upsert_participant_encoding(&p).await.unwrap();
            }
        }
        assert_eq!(store.participant_count(), 2 * Encoding::ALL.len());

        store.delete_participant_encodings(&first.id).await.unwrap();
        assert_eq!(store.participant_count(), Encoding::ALL.len());
        let mut query = ParticipantQuery::new(Encoding::Exact);
        query.last_name = Some(vec!["Thomas".into()]);
        assert!(store.find_participants(&query).await.unwrap().is_empty());
        query.last_name = Some(vec!["Lee".into()]);
        assert_eq!(store.find_participants(&query).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_book_accumulates_jobs() {
        let store = InMemoryStore::new();
        store.upsert_book("1902/6", "job-1").await.unwrap();
        store.upsert_book("1902/6", "job-2").await.unwrap();
        store.upsert_book("1902/6", "job-1").await.unwrap();
        let book = store.get_book("1902/6").await.unwrap().unwrap();
        assert_eq!(book.year, 1902);
        assert_eq!(book.load_jobs.len(), 2);
    }

    #[tokio::test]
    async fn test_bad_book_key_is_rejected() {
        let store = InMemoryStore::new();
        assert!(store.upsert_book("nonsense", "job-1").await.is_err());
    }

    #[tokio::test]
    async fn test_find_participants_by_any_candidate() {
        let store = InMemoryStore::new();
        let case = sample_case("job-1");
        for p in encode_case(&case, &[Encoding::Metaphone, Encoding::Normalized]).participants {
            store.upsert_participant_encoding(&p).await.unwrap();
        }

        let mut query = ParticipantQuery::new(Encoding::Metaphone);
        query.last_name = Some(Encoding::Metaphone.encode_term("Tomas").unwrap());
        let hits = store.find_participants(&query).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].case_id, "1902/6/172");

        query.stop = NaiveDate::from_ymd_opt(1903, 1, 1);
        assert!(store.find_participants(&query).await.unwrap().is_empty());

        let mut query = ParticipantQuery::new(Encoding::Normalized);
        query.first_name = Some(vec!["charley".into()]);
        query.start = NaiveDate::from_ymd_opt(1903, 3, 30);
        query.stop = NaiveDate::from_ymd_opt(1903, 3, 30);
        assert_eq!(store.find_participants(&query).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_errors_and_jobs() {
        let store = InMemoryStore::new();
        let job = Job::new(vec!["/tmp/a.vtr".into()]);
        store.record_job(&job).await.unwrap();
        let record = ErrorRecord {
            job_id: job.id.clone(),
            filename: "/tmp/a.vtr".into(),
            line: Some(3),
            case_id: None,
            kind: ErrorKind::GrammarMismatch,
            message: "bad".into(),
            created_at: Utc::now(),
        };
        store.record_error(&record).await.unwrap();
        store.record_error(&record).await.unwrap();
        assert_eq!(store.errors_for_job(&job.id).await.unwrap().len(), 2);
        assert_eq!(store.list_jobs().await.unwrap().len(), 1);

        store.reset().await.unwrap();
        assert!(store.get_job(&job.id).await.unwrap().is_none());
        assert!(store.errors_for_job(&job.id).await.unwrap().is_empty());
    }
}
