//! # Query Translator
//!
//! Maps a [`FilterSpec`] onto what the vendor API can actually answer.
//! The vendor takes equality clauses only, caps the number of clauses per
//! call, and bounds how long a time window a single call may cover, so one
//! logical search fans out into several [`QueryRequest`]s, and anything the
//! vendor cannot express comes back as a client-side predicate for the
//! aggregator to apply after the merge.

use crate::client::{QueryRequest, VendorFilter};
use scout_core::{Criterion, FilterSpec, MatchOp, SearchError, TimeRange};

/// Vendor capability limits driving the fan-out.
#[derive(Debug, Clone)]
pub struct VendorLimits {
    /// Maximum clauses per call; a time-range clause counts as one.
    pub max_clauses_per_call: usize,
    /// Longest time window a single call may cover.
    pub max_window_ms: i64,
    /// Page-size hint passed to every request.
    pub page_size: u32,
}

impl Default for VendorLimits {
    fn default() -> Self {
        Self {
            max_clauses_per_call: 1,
            max_window_ms: 7 * 24 * 60 * 60 * 1000,
            page_size: 100,
        }
    }
}

/// The translation of one logical search.
#[derive(Debug, Clone)]
pub struct Translation {
    /// Vendor requests, in deterministic order (stable over input criteria).
    pub requests: Vec<QueryRequest>,
    /// Predicates to re-apply in memory after the merge.
    pub client_side: Vec<Criterion>,
    /// Set when not every request carries the time range natively, so the
    /// bounds must be re-checked against each merged record.
    pub time_bounds: Option<TimeRange>,
}

/// Partition a spec into vendor-satisfiable requests plus client-side
/// leftovers.
///
/// `equals` criteria translate natively. `contains` has no vendor form at
/// all, and `in-range` only exists at the wire as the time-range clause, so
/// both are routed client-side. Whenever criteria end up split across
/// multiple requests, each result row is only guaranteed to satisfy ONE
/// group of clauses, so every split criterion is also re-checked client-side
/// to restore conjunctive semantics.
pub fn translate(spec: &FilterSpec, limits: &VendorLimits) -> Result<Translation, SearchError> {
    let mut native: Vec<&Criterion> = Vec::new();
    let mut client_side: Vec<Criterion> = Vec::new();
    for criterion in &spec.criteria {
        match criterion.op {
            MatchOp::Equals => native.push(criterion),
            MatchOp::Contains | MatchOp::InRange => client_side.push(criterion.clone()),
        }
    }

    if native.is_empty() && spec.time_range.is_none() {
        // Nothing to anchor a vendor query on. The first leftover names
        // the gap for the caller.
        let offending = client_side
            .first()
            .map(|c| format!("'{}' {}", c.attribute, c.op))
            .unwrap_or_else(|| "empty criteria".into());
        return Err(SearchError::UnsupportedFilter(format!(
            "no vendor-searchable criterion; {} can only be applied client-side",
            offending
        )));
    }

    let groups: Vec<Vec<VendorFilter>> = native
        .chunks(limits.max_clauses_per_call.max(1))
        .map(|chunk| {
            chunk
                .iter()
                .map(|c| VendorFilter {
                    field: c.attribute.clone(),
                    value: c.value.clone(),
                })
                .collect()
        })
        .collect();

    let windows = spec
        .time_range
        .map(|range| split_windows(range, limits.max_window_ms))
        .unwrap_or_default();

    let mut requests = Vec::new();
    let mut time_bounds = None;

    if groups.is_empty() {
        // Window-only search; every request is bounded natively.
        for window in &windows {
            requests.push(QueryRequest::new(vec![], Some(*window), limits.page_size));
        }
    } else if groups.len() == 1
        && groups[0].len() < limits.max_clauses_per_call
        && spec.time_range.is_some()
    {
        // The single clause group has room for the time-range clause:
        // one request per sub-window, everything native.
        for window in &windows {
            requests.push(QueryRequest::new(
                groups[0].clone(),
                Some(*window),
                limits.page_size,
            ));
        }
    } else {
        // Clause groups go out unwindowed; a time range (if any) becomes
        // its own set of window-only requests. Both splits cost us native
        // conjunction, so everything is re-checked after the merge.
        let split = groups.len() > 1 || !windows.is_empty();
        for group in &groups {
            requests.push(QueryRequest::new(group.clone(), None, limits.page_size));
        }
        for window in &windows {
            requests.push(QueryRequest::new(vec![], Some(*window), limits.page_size));
        }
        if split {
            client_side.extend(native.iter().map(|c| (*c).clone()));
            time_bounds = spec.time_range;
        }
    }

    Ok(Translation {
        requests,
        client_side,
        time_bounds,
    })
}

/// Split a range into consecutive sub-windows no longer than `max_ms`,
/// oldest first. Bounds are inclusive, so windows meet without overlap.
fn split_windows(range: TimeRange, max_ms: i64) -> Vec<TimeRange> {
    let max_ms = max_ms.max(1);
    let mut windows = Vec::new();
    let mut start = range.start_ms;
    while start <= range.end_ms {
        let end = (start + max_ms - 1).min(range.end_ms);
        windows.push(TimeRange {
            start_ms: start,
            end_ms: end,
        });
        start = end + 1;
    }
    windows
}
