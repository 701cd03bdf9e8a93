//! Field-line grammar of the VTR ledger format.
//!
//! Every non-blank line starts with a short keyword that says which field it
//! carries. [`scan_line`] looks the keyword up (case-insensitively) and runs
//! that field's value rule over the rest of the line, producing a typed
//! [`Field`] or a [`ParseFailure`].
//!
//! | Keyword | Field | Value |
//! |---------|-------|-------|
//! | `b` | book | `<year>/<number>` |
//! | `pg` | page | `<number>` |
//! | `c` | case | `<token>` |
//! | `ad` / `hd` | arrest / hearing date | `DD Mon YYYY` |
//! | `d` `w` `dw` `ao` `op` | participant | name expression |
//! | `dv` | vehicle | rest of line |
//! | `v` | violation | `<token> [(note)]` |
//! | `l` | location | rest of line |
//! | `n` | case note | rest of line |
//! | `o` | outcome | word |
//! | `p` | plea | word |
//! | `sr` / `ss` / `sc` | sentence rendered / served / contempt | see [`Ledger`] |
//! | `g` | gender | `m` or `f` |
//! | `r` | race | `w` or `c` |
//!
//! The grammar holds no state; one scan never affects another.

use chrono::NaiveDate;

use crate::error::{ErrorKind, ParseFailure};
use crate::models::{Outcome, Participant, Plea, Role, Sentence, SentenceType, Units};
use crate::vtr::date::parse_date;

/// Every keyword the grammar recognizes.
pub const KEYWORDS: &[&str] = &[
    "b", "pg", "c", "ad", "hd", "d", "w", "dw", "ao", "op", "dv", "v", "l", "n", "o", "p", "sr",
    "ss", "sc", "g", "r",
];

/// A recognized field line.
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    Book(String),
    Page(u32),
    Case(String),
    ArrestDate(NaiveDate),
    HearingDate(NaiveDate),
    Participant(Participant),
    Vehicle(String),
    Violation { code: String, note: Option<String> },
    Location(String),
    Note(String),
    Outcome(Outcome),
    Plea(Plea),
    SentenceRendered(Sentence),
    SentenceServed(Sentence),
    SentenceContempt(Sentence),
    Gender(String),
    Race(String),
}

/// Which of the three sentence lists a sentence line belongs to.
///
/// - rendered: `guilty | dismissed | pd`, `o (note)`, or `[amount] [type] [(note)]`;
///   type `o` requires a note.
/// - served: `[amount] [type] [DD Mon YYYY] [(note)]`, all optional.
/// - contempt: `<amount> [type] [(note)]`; type defaults to fine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ledger {
    Rendered,
    Served,
    Contempt,
}

struct Reject {
    kind: ErrorKind,
    cause: String,
}

impl Reject {
    fn grammar(cause: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::GrammarMismatch,
            cause: cause.into(),
        }
    }

    fn semantic(cause: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::SemanticValidation,
            cause: cause.into(),
        }
    }
}

impl From<String> for Reject {
    fn from(cause: String) -> Self {
        Reject::semantic(cause)
    }
}

/// Classify one trimmed, non-empty line.
pub fn scan_line(line_number: usize, line: &str) -> Result<Field, ParseFailure> {
    scan(line).map_err(|reject| ParseFailure {
        line_number,
        line: line.to_string(),
        kind: reject.kind,
        cause: reject.cause,
        case_id: None,
    })
}

fn scan(line: &str) -> Result<Field, Reject> {
    let line = line.trim();
    let (keyword, rest) = match line.find(char::is_whitespace) {
        Some(pos) => (&line[..pos], line[pos..].trim()),
        None => (line, ""),
    };
    let keyword = keyword.to_ascii_lowercase();
    if !KEYWORDS.contains(&keyword.as_str()) {
        return Err(Reject::grammar(format!(
            "unknown field keyword {:?}",
            keyword
        )));
    }
    // Every part of a served sentence is optional.
    if rest.is_empty() && keyword != "ss" {
        return Err(Reject::grammar(format!(
            "field {:?} has no value",
            keyword
        )));
    }

    match keyword.as_str() {
        "b" => scan_book(rest),
        "pg" => single_token(rest, "page")?
            .parse::<u32>()
            .map(Field::Page)
            .map_err(|_| Reject::semantic(format!("page {:?} is not a number", rest))),
        "c" => Ok(Field::Case(single_token(rest, "case number")?.to_string())),
        "ad" => Ok(Field::ArrestDate(parse_date(rest)?)),
        "hd" => Ok(Field::HearingDate(parse_date(rest)?)),
        "d" => scan_participant(Role::Defendant, rest),
        "w" => scan_participant(Role::Witness, rest),
        "dw" => scan_participant(Role::DefenseWitness, rest),
        "ao" => scan_participant(Role::ArrestingOfficer, rest),
        "op" => scan_participant(Role::Other, rest),
        "dv" => Ok(Field::Vehicle(rest.to_string())),
        "v" => scan_violation(rest),
        "l" => Ok(Field::Location(rest.to_string())),
        "n" => Ok(Field::Note(rest.to_string())),
        "o" => Ok(Field::Outcome(Outcome::parse(&collapse(rest)))),
        "p" => Ok(Field::Plea(Plea::parse(&collapse(rest)))),
        "sr" => Ok(Field::SentenceRendered(parse_sentence(rest, Ledger::Rendered)?)),
        "ss" => Ok(Field::SentenceServed(parse_sentence(rest, Ledger::Served)?)),
        "sc" => Ok(Field::SentenceContempt(parse_sentence(rest, Ledger::Contempt)?)),
        "g" => one_of(rest, &["m", "f"], "gender").map(Field::Gender),
        "r" => one_of(rest, &["w", "c"], "race").map(Field::Race),
        _ => Err(Reject::grammar(format!(
            "unknown field keyword {:?}",
            keyword
        ))),
    }
}

fn scan_book(rest: &str) -> Result<Field, Reject> {
    let token = single_token(rest, "book")?;
    let (year, number) = token
        .split_once('/')
        .ok_or_else(|| Reject::semantic(format!("book {:?} is not <year>/<number>", token)))?;
    if !is_digits(year) || !is_digits(number) {
        return Err(Reject::semantic(format!(
            "book {:?} is not <year>/<number>",
            token
        )));
    }
    Ok(Field::Book(format!("{}/{}", year, number)))
}

fn scan_violation(rest: &str) -> Result<Field, Reject> {
    let (head, note) = split_trailing_note(rest)?;
    let code = single_token(&head, "violation code")?.to_string();
    Ok(Field::Violation { code, note })
}

/// Name expression: `<full name> [alias=X] [title=X] [suffix=X] [(note)]`.
fn scan_participant(role: Role, rest: &str) -> Result<Field, Reject> {
    let (head, note) = split_trailing_note(rest)?;
    let mut name_tokens = Vec::new();
    let mut alias = None;
    let mut title = None;
    let mut suffix = None;
    let mut in_tags = false;

    let mut tokens = head.split_whitespace();
    while let Some(token) = tokens.next() {
        let Some((key, value)) = token.split_once('=') else {
            if in_tags {
                return Err(Reject::semantic(format!(
                    "name text {:?} after tags",
                    token
                )));
            }
            name_tokens.push(token);
            continue;
        };
        in_tags = true;
        let value = if value.is_empty() {
            tokens
                .next()
                .ok_or_else(|| Reject::semantic(format!("tag {:?} has no value", key)))?
        } else {
            value
        };
        let slot = match key.to_ascii_lowercase().as_str() {
            "alias" => &mut alias,
            "title" => &mut title,
            "suffix" => &mut suffix,
            other => return Err(Reject::semantic(format!("unknown name tag {:?}", other))),
        };
        *slot = Some(value.to_string());
    }

    if name_tokens.is_empty() {
        return Err(Reject::semantic("participant has no name"));
    }
    let mut participant = Participant::new(role, &name_tokens.join(" "));
    participant.alias = alias;
    participant.title = title;
    participant.suffix = suffix;
    participant.note = note;
    Ok(Field::Participant(participant))
}

/// Parse the value of a `sr`, `ss`, or `sc` line.
pub fn parse_sentence(rest: &str, ledger: Ledger) -> Result<Sentence, String> {
    let (head, note) = split_trailing_note(rest).map_err(|r| r.cause)?;
    let tokens: Vec<&str> = head.split_whitespace().collect();
    let mut pos = 0;
    let mut amount = None;
    let mut code = None;
    let mut date = None;

    let date_at = |pos: usize| -> Option<NaiveDate> {
        if ledger != Ledger::Served || tokens.len() < pos + 3 {
            return None;
        }
        parse_date(&tokens[pos..pos + 3].join(" ")).ok()
    };

    if pos < tokens.len() && date_at(pos).is_none() && is_amount(tokens[pos]) {
        amount = Some(parse_amount(tokens[pos])?);
        pos += 1;
    }
    if pos < tokens.len() && date_at(pos).is_none() && !is_amount(tokens[pos]) {
        code = Some(tokens[pos].to_ascii_lowercase());
        pos += 1;
    }
    if let Some(d) = date_at(pos) {
        date = Some(d);
        pos += 3;
    }
    if pos < tokens.len() {
        return Err(format!(
            "unexpected sentence text {:?}",
            tokens[pos..].join(" ")
        ));
    }

    match ledger {
        Ledger::Rendered if amount.is_none() && code.is_none() => {
            return Err("sentence rendered has no amount or type".to_string());
        }
        Ledger::Contempt if amount.is_none() => {
            return Err("sentence contempt requires an amount".to_string());
        }
        _ => {}
    }

    let (kind, units) = match code.as_deref() {
        Some(code) => sentence_type(code),
        None if ledger == Ledger::Contempt => sentence_type("f"),
        None => (SentenceType::Unknown, Units::Unknown),
    };
    if ledger == Ledger::Rendered && kind == SentenceType::Other && note.is_none() {
        return Err("sentence of type other requires a note".to_string());
    }

    let mut sentence = Sentence::new(kind, units, amount.unwrap_or(0.0));
    sentence.note = note;
    sentence.date = date;
    Ok(sentence)
}

/// Shared type-code table for all three sentence lists.
pub fn sentence_type(code: &str) -> (SentenceType, Units) {
    match code.to_ascii_lowercase().as_str() {
        "c" | "f" => (SentenceType::Fine, Units::Dollars),
        "j" => (SentenceType::Jail, Units::Days),
        "l" | "w" => (SentenceType::Labor, Units::Days),
        "m" => (SentenceType::Labor, Units::Months),
        "o" => (SentenceType::Other, Units::Unknown),
        "p" | "pd" => (SentenceType::Paid, Units::Dollars),
        "r" => (SentenceType::Remitted, Units::Dollars),
        other => (SentenceType::from(other.to_string()), Units::Unknown),
    }
}

/// Split `text (note)` into the text before the note and the note itself.
fn split_trailing_note(text: &str) -> Result<(String, Option<String>), Reject> {
    let Some(open) = text.find('(') else {
        if text.contains(')') {
            return Err(Reject::semantic("unbalanced ')'"));
        }
        return Ok((text.trim().to_string(), None));
    };
    let inner = text[open + 1..]
        .trim_end()
        .strip_suffix(')')
        .ok_or_else(|| Reject::semantic("note is not closed with ')' at end of line"))?;
    if inner.contains('(') || inner.contains(')') {
        return Err(Reject::semantic("nested parentheses in note"));
    }
    let inner = inner.trim();
    if inner.is_empty() {
        return Err(Reject::semantic("empty note"));
    }
    Ok((text[..open].trim().to_string(), Some(inner.to_string())))
}

fn single_token<'a>(rest: &'a str, what: &str) -> Result<&'a str, Reject> {
    let mut tokens = rest.split_whitespace();
    match (tokens.next(), tokens.next()) {
        (Some(token), None) => Ok(token),
        (None, _) => Err(Reject::grammar(format!("missing {}", what))),
        (Some(_), Some(extra)) => Err(Reject::semantic(format!(
            "unexpected text {:?} after {}",
            extra, what
        ))),
    }
}

fn one_of(rest: &str, allowed: &[&str], what: &str) -> Result<String, Reject> {
    let value = rest.to_ascii_lowercase();
    if allowed.contains(&value.as_str()) {
        Ok(value)
    } else {
        Err(Reject::semantic(format!(
            "{} {:?} is not one of {}",
            what,
            rest,
            allowed.join(", ")
        )))
    }
}

fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

fn is_amount(token: &str) -> bool {
    token.chars().any(|c| c.is_ascii_digit()) && token.chars().all(|c| c.is_ascii_digit() || c == '.')
}

fn parse_amount(token: &str) -> Result<f64, String> {
    token
        .parse::<f64>()
        .map_err(|_| format!("invalid amount {:?}", token))
}
