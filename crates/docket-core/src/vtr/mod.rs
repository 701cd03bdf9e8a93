//! Reader for the VTR ("vague text record") ledger format.
//!
//! One field per line, keyword first. [`grammar`] recognizes single lines,
//! [`reader`] folds them into cases.

pub mod date;
pub mod grammar;
pub mod reader;

pub use grammar::{scan_line, Field};
pub use reader::{read_cases, CaseReader};
