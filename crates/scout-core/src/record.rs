//! # Result Records
//!
//! The normalized result row ([`ContactRecord`]), one fetched page
//! ([`ResultPage`]), and the final deduplicated output ([`ResultSet`]).

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

/// A single contact interaction, normalized from the vendor's raw shape.
///
/// Identity is `contact_id`: two records with the same identifier are the
/// same logical contact even when fetched from different pages or requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactRecord {
    /// Unique contact identifier.
    pub contact_id: String,
    /// Initiation timestamp, epoch milliseconds UTC.
    pub initiated_at_ms: i64,
    /// Associated queue identifier, when known.
    pub queue: Option<String>,
    /// Associated agent identifier, when known.
    pub agent: Option<String>,
    /// Custom contact attributes (keys unique).
    #[serde(default)]
    pub attributes: HashMap<String, String>,
}

impl ContactRecord {
    /// Fold a later-fetched sighting of the same contact into this one.
    ///
    /// Attribute maps take the union of keys; on a conflicting key the
    /// later value wins. Scalar fields are kept from the first sighting
    /// and only filled in when previously missing.
    pub fn absorb(&mut self, later: ContactRecord) {
        self.attributes.extend(later.attributes);
        if self.queue.is_none() {
            self.queue = later.queue;
        }
        if self.agent.is_none() {
            self.agent = later.agent;
        }
        if self.initiated_at_ms == 0 {
            self.initiated_at_ms = later.initiated_at_ms;
        }
    }

    /// Deterministic output order: initiation timestamp descending,
    /// ties broken by contact identifier ascending.
    pub fn output_order(&self, other: &ContactRecord) -> Ordering {
        other
            .initiated_at_ms
            .cmp(&self.initiated_at_ms)
            .then_with(|| self.contact_id.cmp(&other.contact_id))
    }
}

/// One page of results as returned by a single vendor call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultPage {
    pub records: Vec<ContactRecord>,
    /// Opaque cursor; absence signals end of stream.
    pub next_token: Option<String>,
}

/// The final, deduplicated, deterministically sorted result set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultSet {
    pub records: Vec<ContactRecord>,
    pub total: usize,
    /// True when the search was cut short (deadline) and more data may exist.
    pub partial: bool,
    /// Number of vendor requests the search fanned out into.
    pub requests_issued: usize,
    pub pages_fetched: usize,
    pub elapsed_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, ts: i64) -> ContactRecord {
        ContactRecord {
            contact_id: id.into(),
            initiated_at_ms: ts,
            queue: None,
            agent: None,
            attributes: HashMap::new(),
        }
    }

    #[test]
    fn test_absorb_unions_attributes() {
        let mut first = record("c1", 100);
        first.attributes.insert("lang".into(), "en".into());
        let mut later = record("c1", 100);
        later.attributes.insert("tier".into(), "gold".into());

        first.absorb(later);
        assert_eq!(first.attributes.len(), 2);
        assert_eq!(first.attributes["lang"], "en");
        assert_eq!(first.attributes["tier"], "gold");
    }

    #[test]
    fn test_absorb_conflict_later_wins() {
        let mut first = record("c1", 100);
        first.attributes.insert("tier".into(), "silver".into());
        let mut later = record("c1", 100);
        later.attributes.insert("tier".into(), "gold".into());

        first.absorb(later);
        assert_eq!(first.attributes["tier"], "gold");
    }

    #[test]
    fn test_absorb_fills_missing_scalars() {
        let mut first = record("c1", 0);
        let mut later = record("c1", 500);
        later.queue = Some("q-1".into());

        first.absorb(later);
        assert_eq!(first.initiated_at_ms, 500);
        assert_eq!(first.queue.as_deref(), Some("q-1"));
    }

    #[test]
    fn test_output_order() {
        let mut rows = vec![record("b", 100), record("a", 300), record("a2", 300)];
        rows.sort_by(|x, y| x.output_order(y));
        let ids: Vec<&str> = rows.iter().map(|r| r.contact_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "a2", "b"]);
    }
}
