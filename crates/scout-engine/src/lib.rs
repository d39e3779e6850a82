//! # scout-engine — the search core of contact-scout
//!
//! Translates a normalized [`scout_core::FilterSpec`] into vendor-shaped
//! requests, fetches them page by page with retry and backoff, and merges
//! everything into one deduplicated, deterministically sorted result set.
//!
//! Data flows strictly: translator → fetcher(s) → aggregator → caller.
//! The vendor API sits behind the [`client::SearchApi`] seam so the whole
//! pipeline runs against in-memory mocks in tests.

pub mod aggregate;
pub mod client;
pub mod directory;
pub mod fetch;
pub mod http;
pub mod search;
pub mod translate;

pub use search::{EngineConfig, SearchEngine};
