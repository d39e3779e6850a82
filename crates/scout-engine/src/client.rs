//! # Vendor API Seam
//!
//! The wire-level contract with the remote contact-search service: the
//! request payload ([`QueryRequest`]), the raw response shapes, and the
//! [`SearchApi`] trait the fetcher calls through. Only the
//! page/continuation-token/record contract is load-bearing; everything
//! else about the wire shape is vendor-defined.

use async_trait::async_trait;
use scout_core::{ContactRecord, ResultPage, SearchError, TimeRange};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One equality clause in vendor shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VendorFilter {
    pub field: String,
    pub value: String,
}

/// One vendor-shaped search payload.
///
/// Immutable once constructed: the fetcher derives follow-up requests via
/// [`QueryRequest::with_token`] instead of mutating this one.
#[derive(Debug, Clone, Serialize)]
pub struct QueryRequest {
    filters: Vec<VendorFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    window: Option<TimeRange>,
    page_size: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    next_token: Option<String>,
}

impl QueryRequest {
    pub fn new(filters: Vec<VendorFilter>, window: Option<TimeRange>, page_size: u32) -> Self {
        Self {
            filters,
            window,
            page_size,
            next_token: None,
        }
    }

    pub fn filters(&self) -> &[VendorFilter] {
        &self.filters
    }

    pub fn window(&self) -> Option<TimeRange> {
        self.window
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn next_token(&self) -> Option<&str> {
        self.next_token.as_deref()
    }

    /// Derive the follow-up request carrying a continuation token.
    pub fn with_token(&self, token: impl Into<String>) -> QueryRequest {
        QueryRequest {
            filters: self.filters.clone(),
            window: self.window,
            page_size: self.page_size,
            next_token: Some(token.into()),
        }
    }
}

/// How a vendor failure should be handled by the fetcher.
#[derive(Debug)]
pub enum ClientError {
    /// Rate limited. Transient, retried with backoff.
    Throttled(String),
    /// Server fault or connection failure. Transient, retried with backoff.
    Server(String),
    /// Credential rejected. Terminal, never retried by the core.
    Auth(String),
    /// The vendor rejected the request shape. Terminal.
    BadRequest(String),
    /// Unexpected status or undecodable body. Terminal.
    Protocol(String),
}

impl ClientError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ClientError::Throttled(_) | ClientError::Server(_))
    }
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientError::Throttled(detail) => write!(f, "throttled by vendor: {}", detail),
            ClientError::Server(detail) => write!(f, "vendor server error: {}", detail),
            ClientError::Auth(detail) => write!(f, "credential rejected: {}", detail),
            ClientError::BadRequest(detail) => write!(f, "request rejected: {}", detail),
            ClientError::Protocol(detail) => write!(f, "protocol error: {}", detail),
        }
    }
}

impl std::error::Error for ClientError {}

impl From<ClientError> for SearchError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Auth(detail) => SearchError::Auth(detail),
            other => SearchError::Fetch {
                transient: other.is_transient(),
                detail: other.to_string(),
                last_token: None,
            },
        }
    }
}

/// A contact row exactly as the vendor returns it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawContact {
    #[serde(default)]
    pub contact_id: String,
    /// RFC 3339 or epoch-millis string; vendors disagree.
    #[serde(default)]
    pub initiated_at: Option<String>,
    #[serde(default)]
    pub queue: Option<String>,
    #[serde(default)]
    pub agent: Option<String>,
    #[serde(default)]
    pub attributes: HashMap<String, String>,
}

impl RawContact {
    /// Normalize into the engine's record shape. An unparseable timestamp
    /// becomes 0 rather than dropping the record.
    pub fn into_record(self) -> ContactRecord {
        let initiated_at_ms = match self.initiated_at.as_deref() {
            Some(raw) => parse_vendor_timestamp(raw).unwrap_or_else(|| {
                tracing::warn!(
                    "contact {}: unparseable initiation timestamp '{}'",
                    self.contact_id,
                    raw
                );
                0
            }),
            None => 0,
        };
        ContactRecord {
            contact_id: self.contact_id,
            initiated_at_ms,
            queue: self.queue,
            agent: self.agent,
            attributes: self.attributes,
        }
    }
}

/// One raw response page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawPage {
    #[serde(default)]
    pub contacts: Vec<RawContact>,
    #[serde(default)]
    pub next_token: Option<String>,
}

impl RawPage {
    pub fn into_page(self) -> ResultPage {
        ResultPage {
            records: self
                .contacts
                .into_iter()
                .map(RawContact::into_record)
                .collect(),
            next_token: self.next_token,
        }
    }
}

fn parse_vendor_timestamp(raw: &str) -> Option<i64> {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&chrono::Utc).timestamp_millis());
    }
    raw.parse::<i64>().ok()
}

/// The contact-search call every backend must implement. Production uses
/// the HTTP client; tests use scripted in-memory fakes.
#[async_trait]
pub trait SearchApi: Send + Sync {
    async fn search_contacts(&self, request: &QueryRequest) -> Result<RawPage, ClientError>;
}
