//! SQLite-backed [`Store`] implementation.
//!
//! Cases are stored as full JSON documents next to the key columns used
//! for lookup. Participant projections keep their encoded candidates as
//! JSON arrays and are matched with `json_each`.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use docket_core::encoding::Encoding;
use docket_core::error::ErrorKind;
use docket_core::models::{Book, Case, EncodedParticipant, ErrorRecord, Job, Role};
use docket_core::store::{ParticipantQuery, Store};

/// SQLite implementation of the [`Store`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(text: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(text)
        .with_context(|| format!("bad timestamp in database: {}", text))?
        .with_timezone(&Utc))
}

fn parse_date(text: Option<String>) -> Result<Option<NaiveDate>> {
    text.map(|t| {
        NaiveDate::parse_from_str(&t, "%Y-%m-%d")
            .with_context(|| format!("bad date in database: {}", t))
    })
    .transpose()
}

fn codes_to_json(codes: &Option<Vec<String>>) -> Result<Option<String>> {
    Ok(match codes {
        Some(codes) => Some(serde_json::to_string(codes)?),
        None => None,
    })
}

fn codes_from_json(text: Option<String>) -> Result<Option<Vec<String>>> {
    Ok(match text {
        Some(text) => Some(serde_json::from_str(&text)?),
        None => None,
    })
}

fn job_from_row(row: &SqliteRow) -> Result<Job> {
    let started_at: String = row.try_get("started_at")?;
    let filenames: String = row.try_get("filenames_json")?;
    Ok(Job {
        id: row.try_get("id")?,
        started_at: parse_ts(&started_at)?,
        filenames: serde_json::from_str(&filenames)?,
    })
}

fn error_from_row(row: &SqliteRow) -> Result<ErrorRecord> {
    let kind: String = row.try_get("kind")?;
    let line: Option<i64> = row.try_get("line")?;
    let created_at: String = row.try_get("created_at")?;
    Ok(ErrorRecord {
        job_id: row.try_get("job_id")?,
        filename: row.try_get("filename")?,
        line: line.map(|l| l as usize),
        case_id: row.try_get("case_id")?,
        kind: kind.parse::<ErrorKind>().map_err(|e| anyhow!(e))?,
        message: row.try_get("message")?,
        created_at: parse_ts(&created_at)?,
    })
}

fn participant_from_row(row: &SqliteRow) -> Result<EncodedParticipant> {
    let encoding: String = row.try_get("encoding")?;
    let role: String = row.try_get("role")?;
    Ok(EncodedParticipant {
        case_id: row.try_get("case_id")?,
        encoding: encoding.parse::<Encoding>().map_err(|e| anyhow!(e))?,
        role: role.parse::<Role>().map_err(|e| anyhow!(e))?,
        full_name: row.try_get("full_name")?,
        date: parse_date(row.try_get("date")?)?,
        first_name: codes_from_json(row.try_get("first_name_json")?)?,
        middle_name: codes_from_json(row.try_get("middle_name_json")?)?,
        last_name: codes_from_json(row.try_get("last_name_json")?)?,
    })
}

#[async_trait]
impl Store for SqliteStore {
    async fn record_job(&self, job: &Job) -> Result<()> {
        sqlx::query("INSERT INTO jobs (id, started_at, filenames_json) VALUES (?, ?, ?)")
            .bind(&job.id)
            .bind(format_ts(&job.started_at))
            .bind(serde_json::to_string(&job.filenames)?)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn upsert_book(&self, book_id: &str, job_id: &str) -> Result<()> {
        let book = Book::from_key(book_id)?;
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO books (id, year, number) VALUES (?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                year = excluded.year,
                number = excluded.number
            "#,
        )
        .bind(&book.id)
        .bind(book.year)
        .bind(&book.number)
        .execute(&mut *tx)
        .await?;

        sqlx::query("INSERT OR IGNORE INTO book_jobs (book_id, job_id) VALUES (?, ?)")
            .bind(&book.id)
            .bind(job_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn upsert_case(&self, case: &Case) -> Result<()> {
        let doc = serde_json::to_string(case)?;
        sqlx::query(
            r#"
            INSERT INTO cases (id, book, number, arrest_date, load_job_id, source_hash, doc_json)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                book = excluded.book,
                number = excluded.number,
                arrest_date = excluded.arrest_date,
                load_job_id = excluded.load_job_id,
                source_hash = excluded.source_hash,
                doc_json = excluded.doc_json
            "#,
        )
        .bind(&case.id)
        .bind(&case.book)
        .bind(&case.number)
        .bind(case.arrest_date.map(|d| d.to_string()))
        .bind(&case.load_job_id)
        .bind(&case.source_hash)
        .bind(doc)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn upsert_participant_encoding(&self, p: &EncodedParticipant) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO participants (case_id, encoding, full_name, role, date,
                                      first_name_json, middle_name_json, last_name_json)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(case_id, encoding, full_name, role) DO UPDATE SET
                date = excluded.date,
                first_name_json = excluded.first_name_json,
                middle_name_json = excluded.middle_name_json,
                last_name_json = excluded.last_name_json
            "#,
        )
        .bind(&p.case_id)
        .bind(p.encoding.name())
        .bind(&p.full_name)
        .bind(p.role.as_str())
        .bind(p.date.map(|d| d.to_string()))
        .bind(codes_to_json(&p.first_name)?)
        .bind(codes_to_json(&p.middle_name)?)
        .bind(codes_to_json(&p.last_name)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_participant_encodings(&self, case_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM participants WHERE case_id = ?")
            .bind(case_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn record_error(&self, error: &ErrorRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO errors (job_id, filename, line, case_id, kind, message, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&error.job_id)
        .bind(&error.filename)
        .bind(error.line.map(|l| l as i64))
        .bind(&error.case_id)
        .bind(error.kind.as_str())
        .bind(&error.message)
        .bind(format_ts(&error.created_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_job(&self, id: &str) -> Result<Option<Job>> {
        let row = sqlx::query("SELECT id, started_at, filenames_json FROM jobs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(job_from_row).transpose()
    }

    async fn list_jobs(&self) -> Result<Vec<Job>> {
        let rows = sqlx::query("SELECT id, started_at, filenames_json FROM jobs ORDER BY started_at DESC")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(job_from_row).collect()
    }

    async fn errors_for_job(&self, job_id: &str) -> Result<Vec<ErrorRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT job_id, filename, line, case_id, kind, message, created_at
            FROM errors WHERE job_id = ? ORDER BY id
            "#,
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(error_from_row).collect()
    }

    async fn get_book(&self, id: &str) -> Result<Option<Book>> {
        let row = sqlx::query("SELECT id, year, number FROM books WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let jobs: Vec<String> =
            sqlx::query_scalar("SELECT job_id FROM book_jobs WHERE book_id = ? ORDER BY job_id")
                .bind(id)
                .fetch_all(&self.pool)
                .await?;
        Ok(Some(Book {
            id: row.try_get("id")?,
            year: row.try_get("year")?,
            number: row.try_get("number")?,
            load_jobs: jobs.into_iter().collect(),
        }))
    }

    async fn get_case(&self, id: &str) -> Result<Option<Case>> {
        let doc: Option<String> = sqlx::query_scalar("SELECT doc_json FROM cases WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        doc.map(|d| serde_json::from_str(&d).with_context(|| format!("corrupt case document {}", id)))
            .transpose()
    }

    async fn cases_for_job(&self, job_id: &str) -> Result<Vec<String>> {
        let ids = sqlx::query_scalar("SELECT id FROM cases WHERE load_job_id = ? ORDER BY id")
            .bind(job_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }

    async fn find_participants(&self, query: &ParticipantQuery) -> Result<Vec<EncodedParticipant>> {
        let mut sql = String::from(
            r#"
            SELECT case_id, encoding, full_name, role, date,
                   first_name_json, middle_name_json, last_name_json
            FROM participants
            WHERE encoding = ?
            "#,
        );
        let mut binds: Vec<String> = vec![query.encoding.name().to_string()];

        for (column, wanted) in [
            ("first_name_json", &query.first_name),
            ("middle_name_json", &query.middle_name),
            ("last_name_json", &query.last_name),
        ] {
            if let Some(wanted) = wanted {
                sql.push_str(&format!(
                    " AND EXISTS (SELECT 1 FROM json_each({}) s, json_each(?) q WHERE s.value = q.value)",
                    column
                ));
                binds.push(serde_json::to_string(wanted)?);
            }
        }
        if let Some(start) = query.start {
            sql.push_str(" AND date IS NOT NULL AND date >= ?");
            binds.push(start.to_string());
        }
        if let Some(stop) = query.stop {
            sql.push_str(" AND date IS NOT NULL AND date <= ?");
            binds.push(stop.to_string());
        }
        sql.push_str(" ORDER BY case_id, role, full_name");

        let mut q = sqlx::query(&sql);
        for value in &binds {
            q = q.bind(value);
        }
        let rows = q.fetch_all(&self.pool).await?;
        rows.iter().map(participant_from_row).collect()
    }

    async fn reset(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for table in ["participants", "cases", "book_jobs", "books", "errors", "jobs"] {
            sqlx::query(&format!("DELETE FROM {}", table))
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}
