//! Participant name search.
//!
//! A search term is encoded with the chosen encoding and matched against
//! the stored projections of that encoding; any shared candidate is a
//! match. Hits are grouped by case. After the hits, the same terms are run
//! under every other encoding and only the number of matching cases is
//! reported, so a user can see whether a looser encoding would find more.

use std::collections::BTreeSet;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use serde::Serialize;

use docket_core::encoding::Encoding;
use docket_core::models::Role;
use docket_core::store::{ParticipantQuery, Store};

use crate::config::Config;
use crate::db;
use crate::sqlite_store::SqliteStore;

/// Search terms as given on the command line.
#[derive(Debug, Clone, Default)]
pub struct SearchRequest {
    pub first: Option<String>,
    pub middle: Option<String>,
    pub last: Option<String>,
    pub start: Option<NaiveDate>,
    pub stop: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HitParticipant {
    pub full_name: String,
    pub role: Role,
}

/// One matching case.
#[derive(Debug, Clone, Serialize)]
pub struct CaseHit {
    pub case_id: String,
    pub arrest_date: Option<NaiveDate>,
    pub participants: Vec<HitParticipant>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResults {
    pub encoding: Encoding,
    pub hits: Vec<CaseHit>,
    /// Number of matching cases under each other encoding.
    pub alternates: Vec<(Encoding, usize)>,
}

pub fn parse_date_arg(text: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .with_context(|| format!("invalid date '{}', expected YYYY-MM-DD", text))
}

fn encode_field(
    encoding: Encoding,
    label: &str,
    term: &Option<String>,
    min_len: usize,
) -> Result<Option<Vec<String>>> {
    let Some(term) = term else {
        return Ok(None);
    };
    let term = term.trim();
    if term.chars().count() < min_len {
        bail!(
            "{} name '{}' is shorter than {} characters",
            label,
            term,
            min_len
        );
    }
    let codes = encoding
        .encode_term(term)
        .with_context(|| format!("cannot encode {} name '{}' as {}", label, term, encoding))?;
    if codes.is_empty() {
        bail!("{} name '{}' has no {} code", label, term, encoding);
    }
    Ok(Some(codes))
}

/// Build the store query for `request` under `encoding`.
pub fn build_query(
    request: &SearchRequest,
    encoding: Encoding,
    min_len: usize,
) -> Result<ParticipantQuery> {
    let mut query = ParticipantQuery::new(encoding);
    query.first_name = encode_field(encoding, "first", &request.first, min_len)?;
    query.middle_name = encode_field(encoding, "middle", &request.middle, min_len)?;
    query.last_name = encode_field(encoding, "last", &request.last, min_len)?;
    query.start = request.start;
    query.stop = request.stop;
    if query.is_empty() {
        bail!("Provide at least one search parameter");
    }
    Ok(query)
}

async fn matching_case_ids(store: &dyn Store, query: &ParticipantQuery) -> Result<BTreeSet<String>> {
    Ok(store
        .find_participants(query)
        .await?
        .into_iter()
        .map(|p| p.case_id)
        .collect())
}

pub async fn search(
    store: &dyn Store,
    request: &SearchRequest,
    encoding: Encoding,
    min_len: usize,
) -> Result<SearchResults> {
    let query = build_query(request, encoding, min_len)?;
    tracing::debug!(?query, "search");

    let case_ids = matching_case_ids(store, &query).await?;
    let mut hits = Vec::with_capacity(case_ids.len());
    for case_id in case_ids {
        let Some(case) = store.get_case(&case_id).await? else {
            tracing::warn!(case = %case_id, "participant row without a case");
            continue;
        };
        hits.push(CaseHit {
            case_id,
            arrest_date: case.arrest_date,
            participants: case
                .participants
                .iter()
                .map(|p| HitParticipant {
                    full_name: p.full_name.clone(),
                    role: p.role,
                })
                .collect(),
        });
    }

    let mut alternates = Vec::new();
    for other in Encoding::ALL {
        if other == encoding {
            continue;
        }
        // A term that has no code under another encoding just has no count there.
        let Ok(query) = build_query(request, other, min_len) else {
            continue;
        };
        let count = matching_case_ids(store, &query).await?.len();
        alternates.push((other, count));
    }

    Ok(SearchResults {
        encoding,
        hits,
        alternates,
    })
}

pub fn print_results(results: &SearchResults) {
    if results.hits.is_empty() {
        println!("No results.");
    }
    for hit in &results.hits {
        println!("{}", hit.case_id);
        match hit.arrest_date {
            Some(date) => println!(" {}", date),
            None => println!(" (no arrest date)"),
        }
        for p in &hit.participants {
            println!(" {} ({})", p.full_name, p.role);
        }
        println!();
    }
    if !results.alternates.is_empty() {
        println!("Other encodings:");
        for (encoding, count) in &results.alternates {
            println!("  {}: {} cases", encoding.label(), count);
        }
    }
}

pub async fn run_search(
    config: &Config,
    request: &SearchRequest,
    encoding: Option<Encoding>,
) -> Result<()> {
    let encoding = match encoding {
        Some(encoding) => encoding,
        None => config.search.encoding()?,
    };
    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool.clone());
    let results = search(&store, request, encoding, config.search.min_name_length).await;
    pool.close().await;
    let results = results?;
    tracing::debug!("found {} results", results.hits.len());
    print_results(&results);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use docket_core::encoding::encode_case;
    use docket_core::models::{Case, Participant};
    use docket_core::store::memory::InMemoryStore;

    async fn seeded_store() -> InMemoryStore {
        let store = InMemoryStore::new();
        for (number, name, date) in [
            ("1", "Charley M. Thomas", (1903, 3, 30)),
            ("2", "Charles Tomas", (1904, 6, 1)),
        ] {
            let mut case = Case::new("1902/6", number, None);
            case.arrest_date = NaiveDate::from_ymd_opt(date.0, date.1, date.2);
            case.participants.push(Participant::new(Role::Defendant, name));
            store.upsert_case(&case).await.unwrap();
            for p in encode_case(&case, &Encoding::ALL).participants {
                store.upsert_participant_encoding(&p).await.unwrap();
            }
        }
        store
    }

    #[test]
    fn test_requires_a_parameter() {
        let err = build_query(&SearchRequest::default(), Encoding::Exact, 2).unwrap_err();
        assert!(err.to_string().contains("at least one"));
    }

    #[test]
    fn test_rejects_short_terms() {
        let request = SearchRequest {
            last: Some("T".into()),
            ..Default::default()
        };
        assert!(build_query(&request, Encoding::Exact, 2).is_err());
        assert!(build_query(&request, Encoding::Exact, 1).is_ok());
    }

    #[tokio::test]
    async fn test_phonetic_search_finds_both_spellings() {
        let store = seeded_store().await;
        let request = SearchRequest {
            last: Some("Thomas".into()),
            ..Default::default()
        };

        let exact = search(&store, &request, Encoding::Normalized, 2).await.unwrap();
        assert_eq!(exact.hits.len(), 1);
        assert_eq!(exact.hits[0].case_id, "1902/6/1");
        assert_eq!(exact.hits[0].participants[0].full_name, "Charley M. Thomas");

        let phonetic = search(&store, &request, Encoding::Soundex, 2).await.unwrap();
        assert_eq!(phonetic.hits.len(), 2);
        let normalized = phonetic
            .alternates
            .iter()
            .find(|(e, _)| *e == Encoding::Normalized)
            .unwrap();
        assert_eq!(normalized.1, 1);
    }

    #[tokio::test]
    async fn test_date_bounds() {
        let store = seeded_store().await;
        let request = SearchRequest {
            last: Some("Thomas".into()),
            start: Some(parse_date_arg("1904-01-01").unwrap()),
            ..Default::default()
        };
        let results = search(&store, &request, Encoding::Soundex, 2).await.unwrap();
        assert_eq!(results.hits.len(), 1);
        assert_eq!(results.hits[0].case_id, "1902/6/2");
    }
}
