//! # Filter Criteria
//!
//! Raw operator input is validated and normalized into a [`FilterSpec`]:
//! an ordered set of (attribute, operator, value) criteria plus an optional
//! time range, independent of any vendor API shape. The spec also knows how
//! to evaluate itself against a [`ContactRecord`] in memory, which is what
//! the aggregator uses for predicates the vendor cannot express.

use crate::error::SearchError;
use crate::record::ContactRecord;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// Comparison operators an operator may supply.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MatchOp {
    Equals,
    Contains,
    InRange,
}

impl MatchOp {
    /// Parse a user-supplied operator token (trimmed, case-insensitive).
    pub fn parse(token: &str) -> Option<MatchOp> {
        match token.trim().to_lowercase().as_str() {
            "equals" => Some(MatchOp::Equals),
            "contains" => Some(MatchOp::Contains),
            "in-range" | "in_range" => Some(MatchOp::InRange),
            _ => None,
        }
    }
}

impl std::fmt::Display for MatchOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchOp::Equals => write!(f, "equals"),
            MatchOp::Contains => write!(f, "contains"),
            MatchOp::InRange => write!(f, "in-range"),
        }
    }
}

/// One normalized criterion. For `in-range` the value is `"lo..hi"` with
/// numeric bounds, validated at build time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Criterion {
    pub attribute: String,
    pub op: MatchOp,
    pub value: String,
}

impl Criterion {
    /// Evaluate this criterion against a record in memory.
    pub fn matches(&self, record: &ContactRecord) -> bool {
        let Some(actual) = extract_field(record, &self.attribute) else {
            return false;
        };
        match self.op {
            MatchOp::Equals => actual == self.value,
            MatchOp::Contains => actual.contains(self.value.as_str()),
            MatchOp::InRange => {
                let Some((lo, hi)) = range_bounds(&self.value) else {
                    return false;
                };
                match actual.parse::<f64>() {
                    Ok(n) => n >= lo && n <= hi,
                    Err(_) => false,
                }
            }
        }
    }
}

/// Inclusive time range, epoch milliseconds UTC.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeRange {
    pub start_ms: i64,
    pub end_ms: i64,
}

impl TimeRange {
    pub fn contains(&self, ts_ms: i64) -> bool {
        ts_ms >= self.start_ms && ts_ms <= self.end_ms
    }

    pub fn duration_ms(&self) -> i64 {
        self.end_ms - self.start_ms
    }
}

/// Raw, unvalidated criterion as supplied by the presentation layer.
#[derive(Debug, Clone, Deserialize)]
pub struct RawCriterion {
    pub attribute: String,
    pub op: String,
    pub value: String,
}

/// Raw search input: criteria plus optional time bounds, all as strings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawSearchInput {
    pub criteria: Vec<RawCriterion>,
    pub start: Option<String>,
    pub end: Option<String>,
}

/// Normalized, validated search criteria. Immutable once built; discarded
/// after translation into vendor requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterSpec {
    pub criteria: Vec<Criterion>,
    pub time_range: Option<TimeRange>,
}

impl FilterSpec {
    /// Validate and normalize raw input. Pure, no side effects.
    pub fn build(input: RawSearchInput) -> Result<FilterSpec, SearchError> {
        if input.criteria.is_empty() {
            return Err(SearchError::InvalidFilter(
                "at least one criterion is required".into(),
            ));
        }

        let mut criteria = Vec::with_capacity(input.criteria.len());
        for raw in input.criteria {
            let attribute = raw.attribute.trim().to_string();
            if attribute.is_empty() {
                return Err(SearchError::InvalidFilter(
                    "criterion attribute name is blank".into(),
                ));
            }
            let op = MatchOp::parse(&raw.op).ok_or_else(|| {
                SearchError::InvalidFilter(format!(
                    "unrecognized operator '{}' for attribute '{}'",
                    raw.op.trim(),
                    attribute
                ))
            })?;
            let value = raw.value.trim().to_string();
            if op == MatchOp::InRange {
                let bounds = range_bounds(&value).ok_or_else(|| {
                    SearchError::InvalidFilter(format!(
                        "in-range value '{}' is not of the form 'lo..hi'",
                        value
                    ))
                })?;
                if bounds.0 > bounds.1 {
                    return Err(SearchError::InvalidFilter(format!(
                        "in-range lower bound exceeds upper bound in '{}'",
                        value
                    )));
                }
            }
            criteria.push(Criterion {
                attribute,
                op,
                value,
            });
        }

        let start = input.start.as_deref().map(parse_timestamp).transpose()?;
        let end = input.end.as_deref().map(parse_timestamp).transpose()?;
        let time_range = match (start, end) {
            (Some(start_ms), Some(end_ms)) => {
                if start_ms > end_ms {
                    return Err(SearchError::InvalidFilter(
                        "time range start is after end".into(),
                    ));
                }
                Some(TimeRange { start_ms, end_ms })
            }
            // An open bound is closed against the epoch or "now".
            (Some(start_ms), None) => Some(TimeRange {
                start_ms,
                end_ms: Utc::now().timestamp_millis(),
            }),
            (None, Some(end_ms)) => Some(TimeRange {
                start_ms: 0,
                end_ms,
            }),
            (None, None) => None,
        };

        Ok(FilterSpec {
            criteria,
            time_range,
        })
    }

    /// Full in-memory evaluation: every criterion matches and the
    /// initiation timestamp falls inside the time range, when present.
    pub fn matches(&self, record: &ContactRecord) -> bool {
        self.criteria.iter().all(|c| c.matches(record))
            && self
                .time_range
                .map_or(true, |range| range.contains(record.initiated_at_ms))
    }
}

/// Resolve an attribute name against a record: the well-known fields first,
/// then the custom attribute map.
pub fn extract_field<'a>(record: &'a ContactRecord, attribute: &str) -> Option<&'a str> {
    match attribute {
        "contact_id" | "id" => Some(record.contact_id.as_str()),
        "queue" => record.queue.as_deref(),
        "agent" => record.agent.as_deref(),
        _ => record.attributes.get(attribute).map(String::as_str),
    }
}

/// Parse `"lo..hi"` numeric bounds.
pub fn range_bounds(value: &str) -> Option<(f64, f64)> {
    let (lo, hi) = value.split_once("..")?;
    let lo = lo.trim().parse::<f64>().ok()?;
    let hi = hi.trim().parse::<f64>().ok()?;
    Some((lo, hi))
}

/// Canonical timestamp parse: RFC 3339, epoch milliseconds, or a bare
/// `YYYY-MM-DD` date (midnight UTC).
fn parse_timestamp(raw: &str) -> Result<i64, SearchError> {
    let value = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc).timestamp_millis());
    }
    if let Ok(ms) = value.parse::<i64>() {
        return Ok(ms);
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Ok(date.and_time(NaiveTime::MIN).and_utc().timestamp_millis());
    }
    Err(SearchError::InvalidFilter(format!(
        "unrecognized timestamp '{}'",
        value
    )))
}
