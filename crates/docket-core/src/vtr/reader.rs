//! Case accumulator: folds scanned field lines into finished [`Case`]s.
//!
//! A case is only known to be complete when the next `c` line (or the end
//! of input) arrives, so [`CaseReader`] holds exactly one finished case in
//! a ready slot and hands it out on the following call to `next()`.
//!
//! # States
//!
//! ```text
//! NoBook ──b──▶ HaveBook ──pg──▶ HaveBook+Page ──c──▶ InCase ──c──▶ InCase …
//! ```
//!
//! `b` and `pg` lines only change the context for the next `c` line; they
//! never close the case in progress. Any other field line mutates the open
//! case, or is reported as "field before case" when none is open.
//!
//! Lines that fail to scan are collected as [`ParseFailure`]s and do not
//! stop the reader.

use tracing::{debug, info, warn};

use crate::error::{ErrorKind, ParseFailure};
use crate::models::{Case, RawLine};
use crate::vtr::grammar::{scan_line, Field};

/// Pull-based reader over the lines of one ledger file.
///
/// Owns all mutable parse state; create one per file and do not share it
/// between concurrent parses.
pub struct CaseReader<I> {
    lines: I,
    line_number: usize,
    book: Option<String>,
    page: Option<u32>,
    current: Option<Case>,
    ready: Option<Case>,
    failures: Vec<ParseFailure>,
    finished: bool,
}

impl<I, S> CaseReader<I>
where
    I: Iterator<Item = S>,
    S: AsRef<str>,
{
    pub fn new(lines: I) -> Self {
        Self {
            lines,
            line_number: 0,
            book: None,
            page: None,
            current: None,
            ready: None,
            failures: Vec::new(),
            finished: false,
        }
    }

    /// Failures gathered so far, including case-level warnings.
    pub fn failures(&self) -> &[ParseFailure] {
        &self.failures
    }

    pub fn into_failures(self) -> Vec<ParseFailure> {
        self.failures
    }

    fn feed(&mut self, raw: &str) {
        self.line_number += 1;
        let text = raw.trim();
        if text.is_empty() {
            return;
        }
        debug!(line = self.line_number, text, "scanning");

        match scan_line(self.line_number, text) {
            Ok(Field::Case(number)) => self.open_case(text, number),
            Ok(field) => {
                self.keep_raw(text);
                self.apply(text, field);
            }
            Err(failure) => {
                warn!(line = failure.line_number, cause = %failure.cause, "parse error");
                self.keep_raw(text);
                self.failures.push(failure);
            }
        }
    }

    fn keep_raw(&mut self, text: &str) {
        if let Some(case) = self.current.as_mut() {
            case.raw_lines.push(RawLine {
                number: self.line_number,
                text: text.to_string(),
            });
        }
    }

    fn open_case(&mut self, text: &str, number: String) {
        if let Some(previous) = self.current.take() {
            self.ready = Some(self.finalize(previous));
        }
        let Some(book) = self.book.as_deref() else {
            self.failures.push(ParseFailure::semantic(
                self.line_number,
                text,
                "case before any book line",
            ));
            return;
        };
        let mut case = Case::new(book, &number, self.page);
        case.raw_lines.push(RawLine {
            number: self.line_number,
            text: text.to_string(),
        });
        debug!(case = %case.id, "opened case");
        self.current = Some(case);
    }

    fn apply(&mut self, text: &str, field: Field) {
        match field {
            Field::Book(key) => {
                info!(book = %key, "set book");
                self.book = Some(key);
                return;
            }
            Field::Page(page) => {
                self.page = Some(page);
                return;
            }
            _ => {}
        }

        let Some(case) = self.current.as_mut() else {
            self.failures.push(ParseFailure::semantic(
                self.line_number,
                text,
                "field before case",
            ));
            return;
        };

        match field {
            Field::Book(_) | Field::Page(_) | Field::Case(_) => {}
            Field::ArrestDate(date) => case.arrest_date = Some(date),
            Field::HearingDate(date) => case.hearing_date = Some(date),
            Field::Participant(p) => case.participants.push(p),
            Field::Vehicle(v) => case.vehicle = Some(v),
            Field::Violation { code, note } => {
                case.violation = Some(code);
                case.violation_note = note;
            }
            Field::Location(l) => case.location = Some(l),
            Field::Note(n) => {
                case.note = Some(match case.note.take() {
                    Some(existing) => format!("{}\n{}", existing, n),
                    None => n,
                });
            }
            Field::Outcome(o) => case.outcome = Some(o),
            Field::Plea(p) => case.plea = Some(p),
            Field::SentenceRendered(s) => case.sentence_rendered.push(s),
            Field::SentenceServed(s) => case.sentence_served.push(s),
            Field::SentenceContempt(s) => case.sentence_contempt.push(s),
            Field::Gender(g) => case.gender = Some(g),
            Field::Race(r) => case.race = Some(r),
        }
    }

    /// Validate, default, and stamp a case that has been closed.
    fn finalize(&mut self, mut case: Case) -> Case {
        if !case.has_defendant() {
            let (number, text) = case
                .raw_lines
                .first()
                .map(|l| (l.number, l.text.clone()))
                .unwrap_or_default();
            warn!(case = %case.id, "no defendant");
            self.failures.push(ParseFailure {
                line_number: number,
                line: text,
                kind: ErrorKind::CaseValidation,
                cause: format!("No defendant in case {}", case.id),
                case_id: Some(case.id.clone()),
            });
        }
        case.apply_sentence_defaults();
        case.year = case.derive_year();
        case.source_hash = case.compute_source_hash();
        info!(case = %case.id, "new case");
        case
    }
}

impl<I, S> Iterator for CaseReader<I>
where
    I: Iterator<Item = S>,
    S: AsRef<str>,
{
    type Item = Case;

    fn next(&mut self) -> Option<Case> {
        loop {
            if let Some(case) = self.ready.take() {
                return Some(case);
            }
            if self.finished {
                return None;
            }
            match self.lines.next() {
                Some(line) => self.feed(line.as_ref()),
                None => {
                    self.finished = true;
                    if let Some(last) = self.current.take() {
                        self.ready = Some(self.finalize(last));
                    }
                }
            }
        }
    }
}

/// Read every case from `lines`, returning the cases and the failures.
pub fn read_cases<I, S>(lines: I) -> (Vec<Case>, Vec<ParseFailure>)
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut reader = CaseReader::new(lines.into_iter());
    let cases: Vec<Case> = reader.by_ref().collect();
    (cases, reader.into_failures())
}
