//! # Paginating Fetcher
//!
//! A pull-based page sequence over one [`QueryRequest`]: each call to
//! [`PageFetcher::next_page`] issues at most one vendor request (plus
//! retries), following continuation tokens until the stream ends or a cap
//! is hit. Because pages are pulled, a caller that stops consuming stops
//! all network activity; there is no background work to cancel.

use crate::client::{ClientError, QueryRequest, SearchApi};
use rand::Rng;
use scout_core::{ResultPage, SearchError};
use std::sync::Arc;
use std::time::Duration;

/// Retry bounds for transient vendor failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(200),
        }
    }
}

impl RetryPolicy {
    /// Exponential backoff with jitter: `base * 2^(attempt-1)` plus a random
    /// slice of `base`, so concurrent workers don't reconverge on the vendor.
    fn delay_for(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        let backoff = self.base_delay.saturating_mul(1u32 << shift);
        let jitter_cap = (self.base_delay.as_millis() as u64).max(1);
        let jitter = rand::thread_rng().gen_range(0..=jitter_cap);
        backoff + Duration::from_millis(jitter)
    }
}

/// Caller-specified consumption caps.
#[derive(Debug, Clone, Copy)]
pub struct FetchCaps {
    pub max_pages: usize,
    pub max_results: usize,
}

impl Default for FetchCaps {
    fn default() -> Self {
        Self {
            max_pages: usize::MAX,
            max_results: usize::MAX,
        }
    }
}

/// Lazy, finite, restartable page sequence for one request.
pub struct PageFetcher {
    client: Arc<dyn SearchApi>,
    request: QueryRequest,
    caps: FetchCaps,
    retry: RetryPolicy,
    token: Option<String>,
    pages_yielded: usize,
    records_yielded: usize,
    done: bool,
}

impl PageFetcher {
    pub fn new(
        client: Arc<dyn SearchApi>,
        request: QueryRequest,
        caps: FetchCaps,
        retry: RetryPolicy,
    ) -> Self {
        let token = request.next_token().map(str::to_string);
        Self {
            client,
            request,
            caps,
            retry,
            token,
            pages_yielded: 0,
            records_yielded: 0,
            done: false,
        }
    }

    /// Seed the sequence from a previously saved continuation token.
    pub fn resume_from(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// The last successfully consumed continuation token, for resuming.
    pub fn resume_token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Fetch the next page, retrying transient failures with backoff.
    ///
    /// Returns `None` once the stream is exhausted (token absent, or a cap
    /// reached, or a prior error ended it). A transient failure that outlives
    /// the retry bound, or any terminal failure, ends the sequence with a
    /// [`SearchError`] carrying the resume token.
    pub async fn next_page(&mut self) -> Option<Result<ResultPage, SearchError>> {
        if self.done {
            return None;
        }

        let request = match &self.token {
            Some(token) => self.request.with_token(token.clone()),
            None => self.request.clone(),
        };

        let mut attempt: u32 = 0;
        loop {
            match self.client.search_contacts(&request).await {
                Ok(raw) => {
                    let mut page = raw.into_page();
                    let remaining = self.caps.max_results - self.records_yielded;
                    if page.records.len() > remaining {
                        page.records.truncate(remaining);
                    }
                    self.pages_yielded += 1;
                    self.records_yielded += page.records.len();
                    self.token = page.next_token.clone();
                    if self.token.is_none()
                        || self.pages_yielded >= self.caps.max_pages
                        || self.records_yielded >= self.caps.max_results
                    {
                        self.done = true;
                    }
                    return Some(Ok(page));
                }
                Err(err) if err.is_transient() && attempt < self.retry.max_retries => {
                    attempt += 1;
                    let delay = self.retry.delay_for(attempt);
                    tracing::warn!(
                        "transient fetch failure (attempt {}/{}), retrying in {:?}: {}",
                        attempt,
                        self.retry.max_retries,
                        delay,
                        err
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    self.done = true;
                    let failure = match err {
                        ClientError::Auth(detail) => SearchError::Auth(detail),
                        other => SearchError::Fetch {
                            transient: other.is_transient(),
                            detail: other.to_string(),
                            last_token: self.token.clone(),
                        },
                    };
                    return Some(Err(failure));
                }
            }
        }
    }
}
