//! # Result Aggregator
//!
//! The single synchronization point of a search: concurrent fetch workers
//! submit pages into an accumulation map keyed by contact identifier, and
//! [`Aggregator::finish`] turns the map into the final result set, applying
//! the predicates the vendor could not express, then sorting so the output
//! is deterministic no matter which worker finished first.

use scout_core::{ContactRecord, Criterion, ResultPage, ResultSet, SearchError, TimeRange};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use tokio::sync::Mutex;

pub struct Aggregator {
    records: Mutex<HashMap<String, ContactRecord>>,
    pages: AtomicUsize,
    started: Instant,
}

impl Aggregator {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            pages: AtomicUsize::new(0),
            started: Instant::now(),
        }
    }

    /// Merge one page. Safe for concurrent submission from worker tasks.
    ///
    /// A record already present absorbs the later sighting: union of
    /// attribute keys, later value winning on conflicts. A record without
    /// an identifier is malformed upstream data and fails the merge.
    pub async fn merge(&self, page: ResultPage) -> Result<(), SearchError> {
        self.pages.fetch_add(1, Ordering::Relaxed);
        let mut records = self.records.lock().await;
        for record in page.records {
            if record.contact_id.trim().is_empty() {
                return Err(SearchError::Aggregation(
                    "contact record is missing its identifier".into(),
                ));
            }
            match records.entry(record.contact_id.clone()) {
                Entry::Occupied(mut slot) => slot.get_mut().absorb(record),
                Entry::Vacant(slot) => {
                    slot.insert(record);
                }
            }
        }
        Ok(())
    }

    /// Close out the search: apply client-side predicates and time bounds,
    /// sort (timestamp descending, identifier ascending), stamp metadata.
    pub async fn finish(
        self,
        client_side: &[Criterion],
        time_bounds: Option<TimeRange>,
        requests_issued: usize,
        partial: bool,
    ) -> ResultSet {
        let pages_fetched = self.pages.into_inner();
        let mut rows: Vec<ContactRecord> = self
            .records
            .into_inner()
            .into_values()
            .filter(|record| client_side.iter().all(|c| c.matches(record)))
            .filter(|record| {
                time_bounds.map_or(true, |bounds| bounds.contains(record.initiated_at_ms))
            })
            .collect();
        rows.sort_by(|a, b| a.output_order(b));

        ResultSet {
            total: rows.len(),
            records: rows,
            partial,
            requests_issued,
            pages_fetched,
            elapsed_ms: self.started.elapsed().as_millis() as u64,
        }
    }
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new()
    }
}
