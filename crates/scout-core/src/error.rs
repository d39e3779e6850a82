//! # Error Taxonomy
//!
//! Every failure the search core can surface, classified by how the caller
//! should react: input errors abort before any network call, transient fetch
//! errors are retried internally and only show up once retries are exhausted,
//! terminal errors bubble with enough context to resume or report precisely.

use crate::record::ResultSet;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SearchError {
    /// Bad user input. Surfaced immediately, never retried.
    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    /// No vendor-side query can be formed from the given criteria.
    #[error("unsupported filter: {0}")]
    UnsupportedFilter(String),

    /// A network/API failure: either transient with retries exhausted, or
    /// terminal on first sight. Carries the last successfully consumed
    /// continuation token so the caller may resume from where it stopped.
    #[error("fetch failed: {detail}")]
    Fetch {
        detail: String,
        last_token: Option<String>,
        transient: bool,
    },

    /// Credential rejected by the vendor. Never retried by the core;
    /// refreshing credentials is the session collaborator's job.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Malformed upstream data (a record without a contact identifier).
    #[error("aggregation failed: {0}")]
    Aggregation(String),

    /// The overall search deadline elapsed. Carries whatever had been
    /// aggregated so far, refined and sorted, flagged partial.
    #[error("search deadline exceeded after {elapsed_ms} ms")]
    Timeout { elapsed_ms: u64, partial: ResultSet },
}

impl SearchError {
    /// Extract the partial result set from a timeout, if any.
    pub fn into_partial(self) -> Option<ResultSet> {
        match self {
            SearchError::Timeout { partial, .. } => Some(partial),
            _ => None,
        }
    }
}
