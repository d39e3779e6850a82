//! # scout-core — the data model of contact-scout
//!
//! Vendor-agnostic types shared by the engine and the CLI: the normalized
//! [`FilterSpec`], the [`ContactRecord`] result row, and the [`SearchError`]
//! taxonomy. No I/O lives here.

pub mod error;
pub mod filter;
pub mod record;

pub use error::SearchError;
pub use filter::{Criterion, FilterSpec, MatchOp, RawCriterion, RawSearchInput, TimeRange};
pub use record::{ContactRecord, ResultPage, ResultSet};
