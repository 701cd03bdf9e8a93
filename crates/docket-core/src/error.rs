//! Error kinds shared by the parser, the encoders, and the ingestion layer.
//!
//! Every failure the pipeline recovers from is classified by an
//! [`ErrorKind`] so it can be stored and reported without aborting the
//! surrounding batch. Only a file that cannot be opened or read stops that
//! file's ingestion.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classification of a recorded failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The line matches no field rule.
    GrammarMismatch,
    /// The line matched a rule but its value is unusable (bad date, missing note, ...).
    SemanticValidation,
    /// A finished case breaks a record-level rule. Warning only.
    CaseValidation,
    /// One encoder failed on one name field.
    EncodingFailure,
    /// The store rejected a write.
    PersistenceFailure,
    /// The input file could not be opened or read, or its ingestion was cut short.
    FileAccess,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::GrammarMismatch => "grammar_mismatch",
            ErrorKind::SemanticValidation => "semantic_validation",
            ErrorKind::CaseValidation => "case_validation",
            ErrorKind::EncodingFailure => "encoding_failure",
            ErrorKind::PersistenceFailure => "persistence_failure",
            ErrorKind::FileAccess => "file_access",
        }
    }

    /// Warnings are recorded like errors but never count against a file.
    pub fn is_warning(&self) -> bool {
        matches!(self, ErrorKind::CaseValidation)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ErrorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "grammar_mismatch" => Ok(ErrorKind::GrammarMismatch),
            "semantic_validation" => Ok(ErrorKind::SemanticValidation),
            "case_validation" => Ok(ErrorKind::CaseValidation),
            "encoding_failure" => Ok(ErrorKind::EncodingFailure),
            "persistence_failure" => Ok(ErrorKind::PersistenceFailure),
            "file_access" => Ok(ErrorKind::FileAccess),
            other => Err(format!("unknown error kind: {}", other)),
        }
    }
}

/// A single line the reader could not use.
///
/// Carries the 1-based line number and the trimmed line text so the
/// ingestion layer can point at the exact spot in the source ledger.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line_number}: {cause} ({line:?})")]
pub struct ParseFailure {
    pub line_number: usize,
    pub line: String,
    pub kind: ErrorKind,
    pub cause: String,
    /// Set for case-level warnings raised when a case is finalized.
    pub case_id: Option<String>,
}

impl ParseFailure {
    pub fn grammar(line_number: usize, line: &str, cause: impl Into<String>) -> Self {
        Self {
            line_number,
            line: line.to_string(),
            kind: ErrorKind::GrammarMismatch,
            cause: cause.into(),
            case_id: None,
        }
    }

    pub fn semantic(line_number: usize, line: &str, cause: impl Into<String>) -> Self {
        Self {
            line_number,
            line: line.to_string(),
            kind: ErrorKind::SemanticValidation,
            cause: cause.into(),
            case_id: None,
        }
    }
}

/// Why an encoder could not produce a code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("no encodable letters in {0:?}")]
    NoLetters(String),
}

/// A book key that is not of the form `<year>/<number>`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BookKeyError {
    #[error("book key {0:?} is missing the '/' separator")]
    MissingSeparator(String),
    #[error("book key {0:?} has a non-numeric year")]
    BadYear(String),
}
