//! # Docket
//!
//! Loads historical court-docket ledgers written in the line-oriented VTR
//! format into a searchable SQLite case store.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌──────────────┐   ┌──────────┐   ┌──────────┐
//! │ VTR files  │──▶│ Case reader  │──▶│ Encoders │──▶│  SQLite  │
//! │ (.vtr)     │   │ (per file)   │   │ (names)  │   │  store   │
//! └────────────┘   └──────────────┘   └──────────┘   └────┬─────┘
//!                                                         │
//!                                            ┌────────────┤
//!                                            ▼            ▼
//!                                      docket search  docket job
//! ```
//!
//! Parsing, encoding, and the store trait live in `docket-core`; this crate
//! adds configuration, the SQLite backend, the tokio load pipeline, and the
//! `docket` CLI.
//!
//! ## Quick Start
//!
//! ```bash
//! docket init
//! docket load ledgers/1902-6.vtr
//! docket jobs
//! docket search -l Thomas -e soundex
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite `Store` backend |
//! | [`ingest`] | Load pipeline |
//! | [`jobs`] | Job listing and detail |
//! | [`get`] | Case retrieval |
//! | [`search`] | Participant name search |

pub mod config;
pub mod db;
pub mod get;
pub mod ingest;
pub mod jobs;
pub mod migrate;
pub mod search;
pub mod sqlite_store;
