//! # Docket Core
//!
//! Shared, I/O-free logic for Docket: the case data model, the VTR
//! ledger grammar and case accumulator, participant name encoders, and the
//! storage abstraction.
//!
//! This crate contains no tokio, sqlx, or filesystem access. Callers hand
//! it lines of text and a [`store::Store`] implementation; everything else
//! happens here.
//!
//! ## Pipeline
//!
//! ```text
//! lines ──▶ vtr::grammar ──▶ vtr::reader ──▶ encoding ──▶ store
//!           (scan field)     (fold cases)    (names)      (upsert)
//! ```

pub mod encoding;
pub mod error;
pub mod models;
pub mod store;
pub mod vtr;
