//! Core data models for docket ingestion.
//!
//! These types are the documents that flow from the VTR reader through the
//! name encoders into the store: [`Book`], [`Case`] (with its
//! [`Participant`]s and [`Sentence`]s), the derived
//! [`EncodedParticipant`] projections, and the audit records [`Job`] and
//! [`ErrorRecord`].

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::encoding::Encoding;
use crate::error::{BookKeyError, ErrorKind};

/// A physical ledger, keyed `year/number`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub id: String,
    pub year: i32,
    pub number: String,
    /// Every job that stored a case from this book.
    #[serde(default)]
    pub load_jobs: BTreeSet<String>,
}

impl Book {
    /// Build a book from its `year/number` key.
    pub fn from_key(key: &str) -> Result<Self, BookKeyError> {
        let (year, number) = key
            .split_once('/')
            .ok_or_else(|| BookKeyError::MissingSeparator(key.to_string()))?;
        let year: i32 = year
            .trim()
            .parse()
            .map_err(|_| BookKeyError::BadYear(key.to_string()))?;
        Ok(Self {
            id: key.to_string(),
            year,
            number: number.trim().to_string(),
            load_jobs: BTreeSet::new(),
        })
    }
}

/// Role a person plays in a case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "defendant")]
    Defendant,
    #[serde(rename = "witness")]
    Witness,
    #[serde(rename = "defense witness")]
    DefenseWitness,
    #[serde(rename = "arresting officer")]
    ArrestingOfficer,
    #[serde(rename = "other")]
    Other,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Defendant => "defendant",
            Role::Witness => "witness",
            Role::DefenseWitness => "defense witness",
            Role::ArrestingOfficer => "arresting officer",
            Role::Other => "other",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "defendant" => Ok(Role::Defendant),
            "witness" => Ok(Role::Witness),
            "defense witness" => Ok(Role::DefenseWitness),
            "arresting officer" => Ok(Role::ArrestingOfficer),
            "other" => Ok(Role::Other),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

/// A named person attached to one case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub role: Role,
    pub full_name: String,
    pub first_name: String,
    pub middle_name: String,
    pub last_name: String,
    pub title: Option<String>,
    pub suffix: Option<String>,
    pub alias: Option<String>,
    pub note: Option<String>,
}

impl Participant {
    /// Create a participant, deriving first/middle/last from `full_name`.
    pub fn new(role: Role, full_name: &str) -> Self {
        let full_name = full_name.split_whitespace().collect::<Vec<_>>().join(" ");
        let (first_name, middle_name, last_name) = split_name(&full_name);
        Self {
            role,
            full_name,
            first_name,
            middle_name,
            last_name,
            title: None,
            suffix: None,
            alias: None,
            note: None,
        }
    }
}

/// Split a full name on whitespace.
///
/// The last token is the last name. Of the rest, the first token is the
/// first name and whatever remains is the middle name. A single token is
/// only a last name.
pub fn split_name(full_name: &str) -> (String, String, String) {
    let mut parts: Vec<&str> = full_name.split_whitespace().collect();
    let last = match parts.pop() {
        Some(last) => last.to_string(),
        None => return (String::new(), String::new(), String::new()),
    };
    if parts.is_empty() {
        return (String::new(), String::new(), last);
    }
    let first = parts.remove(0).to_string();
    (first, parts.join(" "), last)
}

/// What a sentence line says was imposed or paid.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SentenceType {
    Fine,
    Jail,
    Labor,
    Paid,
    Remitted,
    Other,
    Dismissed,
    Unknown,
    /// Any word the ledger used that has no fixed meaning, lower-cased.
    Code(String),
}

impl SentenceType {
    pub fn as_str(&self) -> &str {
        match self {
            SentenceType::Fine => "fine",
            SentenceType::Jail => "jail",
            SentenceType::Labor => "labor",
            SentenceType::Paid => "paid",
            SentenceType::Remitted => "remitted",
            SentenceType::Other => "other",
            SentenceType::Dismissed => "dismissed",
            SentenceType::Unknown => "unknown",
            SentenceType::Code(code) => code,
        }
    }
}

impl From<String> for SentenceType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "fine" => SentenceType::Fine,
            "jail" => SentenceType::Jail,
            "labor" => SentenceType::Labor,
            "paid" => SentenceType::Paid,
            "remitted" => SentenceType::Remitted,
            "other" => SentenceType::Other,
            "dismissed" => SentenceType::Dismissed,
            "unknown" => SentenceType::Unknown,
            _ => SentenceType::Code(s),
        }
    }
}

impl From<SentenceType> for String {
    fn from(t: SentenceType) -> Self {
        t.as_str().to_string()
    }
}

impl fmt::Display for SentenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Units of a sentence amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Units {
    #[serde(rename = "$")]
    Dollars,
    #[serde(rename = "days")]
    Days,
    #[serde(rename = "months")]
    Months,
    #[serde(rename = "unknown")]
    Unknown,
}

impl Units {
    pub fn as_str(&self) -> &'static str {
        match self {
            Units::Dollars => "$",
            Units::Days => "days",
            Units::Months => "months",
            Units::Unknown => "unknown",
        }
    }
}

/// One rendered, served, or contempt sentence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sentence {
    #[serde(rename = "type")]
    pub kind: SentenceType,
    pub units: Units,
    pub amount: f64,
    pub note: Option<String>,
    /// Only served sentences carry a date.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
}

impl Sentence {
    pub fn new(kind: SentenceType, units: Units, amount: f64) -> Self {
        Self {
            kind,
            units,
            amount,
            note: None,
            date: None,
        }
    }
}

/// Plea entered by the defendant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Plea {
    Guilty,
    NotGuilty,
    NoContest,
    Unknown,
    Other(String),
}

impl Plea {
    /// Normalize a ledger plea word, including the common `guitly` typo.
    pub fn parse(word: &str) -> Self {
        let word = word.trim().to_lowercase();
        match word.as_str() {
            "g" | "guilty" | "guitly" => Plea::Guilty,
            "ng" | "not guilty" => Plea::NotGuilty,
            "nc" | "no contest" => Plea::NoContest,
            "u" | "unknown" => Plea::Unknown,
            _ => Plea::Other(word),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Plea::Guilty => "guilty",
            Plea::NotGuilty => "not guilty",
            Plea::NoContest => "no contest",
            Plea::Unknown => "unknown",
            Plea::Other(s) => s,
        }
    }
}

impl From<String> for Plea {
    fn from(s: String) -> Self {
        Plea::parse(&s)
    }
}

impl From<Plea> for String {
    fn from(p: Plea) -> Self {
        p.as_str().to_string()
    }
}

/// How the case was decided.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Outcome {
    Guilty,
    NotGuilty,
    Dismissed,
    Suspended,
    Other(String),
}

impl Outcome {
    pub fn parse(word: &str) -> Self {
        let word = word.trim().to_lowercase();
        match word.as_str() {
            "g" | "guilty" | "guitly" => Outcome::Guilty,
            "ng" | "not guilty" => Outcome::NotGuilty,
            "d" | "dismissed" => Outcome::Dismissed,
            "s" | "suspended" => Outcome::Suspended,
            _ => Outcome::Other(word),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Outcome::Guilty => "guilty",
            Outcome::NotGuilty => "not guilty",
            Outcome::Dismissed => "dismissed",
            Outcome::Suspended => "suspended",
            Outcome::Other(s) => s,
        }
    }
}

impl From<String> for Outcome {
    fn from(s: String) -> Self {
        Outcome::parse(&s)
    }
}

impl From<Outcome> for String {
    fn from(o: Outcome) -> Self {
        o.as_str().to_string()
    }
}

/// A source line kept with its case for audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawLine {
    pub number: usize,
    pub text: String,
}

/// One adjudicated matter, keyed `book/number`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Case {
    pub id: String,
    pub book: String,
    pub number: String,
    pub page: Option<u32>,
    pub arrest_date: Option<NaiveDate>,
    pub hearing_date: Option<NaiveDate>,
    pub location: Option<String>,
    pub violation: Option<String>,
    pub violation_note: Option<String>,
    pub vehicle: Option<String>,
    pub plea: Option<Plea>,
    pub outcome: Option<Outcome>,
    pub gender: Option<String>,
    pub race: Option<String>,
    pub note: Option<String>,
    pub year: Option<i32>,
    pub participants: Vec<Participant>,
    pub sentence_rendered: Vec<Sentence>,
    pub sentence_served: Vec<Sentence>,
    pub sentence_contempt: Vec<Sentence>,
    pub raw_lines: Vec<RawLine>,
    pub source_hash: String,
    pub load_job_id: String,
}

impl Case {
    pub fn new(book: &str, number: &str, page: Option<u32>) -> Self {
        Self {
            id: case_id(book, number),
            book: book.to_string(),
            number: number.to_string(),
            page,
            arrest_date: None,
            hearing_date: None,
            location: None,
            violation: None,
            violation_note: None,
            vehicle: None,
            plea: None,
            outcome: None,
            gender: None,
            race: None,
            note: None,
            year: None,
            participants: Vec::new(),
            sentence_rendered: Vec::new(),
            sentence_served: Vec::new(),
            sentence_contempt: Vec::new(),
            raw_lines: Vec::new(),
            source_hash: String::new(),
            load_job_id: String::new(),
        }
    }

    pub fn has_defendant(&self) -> bool {
        self.participants.iter().any(|p| p.role == Role::Defendant)
    }

    /// Year of the arrest date, else the year half of the book key.
    pub fn derive_year(&self) -> Option<i32> {
        match self.arrest_date {
            Some(date) => Some(date.year()),
            None => Book::from_key(&self.book).ok().map(|b| b.year),
        }
    }

    /// Served sentences without a date default to the hearing date.
    pub fn apply_sentence_defaults(&mut self) {
        if let Some(hearing) = self.hearing_date {
            for sentence in &mut self.sentence_served {
                if sentence.date.is_none() {
                    sentence.date = Some(hearing);
                }
            }
        }
    }

    /// SHA-256 over the raw source lines, one per line.
    pub fn compute_source_hash(&self) -> String {
        let mut hasher = Sha256::new();
        for line in &self.raw_lines {
            hasher.update(line.text.as_bytes());
            hasher.update(b"\n");
        }
        format!("{:x}", hasher.finalize())
    }
}

/// Natural key of a case.
pub fn case_id(book: &str, number: &str) -> String {
    format!("{}/{}", book, number)
}

/// Per-encoding projection of a participant's names.
///
/// Keyed by `(case_id, encoding, full_name, role)`. A field is `None` when
/// its encoder failed; the other fields of the projection still stand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedParticipant {
    pub case_id: String,
    pub encoding: Encoding,
    pub role: Role,
    pub full_name: String,
    /// Arrest date of the owning case.
    pub date: Option<NaiveDate>,
    pub first_name: Option<Vec<String>>,
    pub middle_name: Option<Vec<String>>,
    pub last_name: Option<Vec<String>>,
}

impl EncodedParticipant {
    pub fn key(&self) -> (String, Encoding, String, Role) {
        (
            self.case_id.clone(),
            self.encoding,
            self.full_name.clone(),
            self.role,
        )
    }
}

/// One ingestion run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub filenames: Vec<String>,
}

impl Job {
    pub fn new(filenames: Vec<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            filenames,
        }
    }
}

/// A recovered failure, tied to the job that hit it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub job_id: String,
    pub filename: String,
    pub line: Option<usize>,
    pub case_id: Option<String>,
    pub kind: ErrorKind,
    pub message: String,
    pub created_at: DateTime<Utc>,
}
