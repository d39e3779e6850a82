//! # Search Orchestration
//!
//! Drives one logical search end to end: translate the filter spec, fetch the
//! resulting requests concurrently through a bounded worker pool, merge
//! pages into the aggregator as they arrive, and close out under an
//! overall deadline. The caller always gets a complete result set, an
//! explicitly flagged partial one inside a timeout error, or a hard
//! failure with a specific kind. Never silent truncation.

use crate::aggregate::Aggregator;
use crate::client::SearchApi;
use crate::fetch::{FetchCaps, PageFetcher, RetryPolicy};
use crate::translate::{translate, VendorLimits};
use futures_util::stream::{self, TryStreamExt};
use scout_core::{FilterSpec, RawSearchInput, ResultSet, SearchError};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Tunables for one engine instance.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub limits: VendorLimits,
    pub retry: RetryPolicy,
    pub caps: FetchCaps,
    /// Bounded worker pool for independent sub-queries.
    pub concurrency: usize,
    /// Overall search deadline.
    pub deadline: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            limits: VendorLimits::default(),
            retry: RetryPolicy::default(),
            caps: FetchCaps::default(),
            concurrency: 4,
            deadline: Duration::from_secs(30),
        }
    }
}

pub struct SearchEngine {
    client: Arc<dyn SearchApi>,
    config: EngineConfig,
}

impl SearchEngine {
    pub fn new(client: Arc<dyn SearchApi>, config: EngineConfig) -> Self {
        Self { client, config }
    }

    /// The presentation-layer entry point: validate raw input, then run.
    pub async fn search(&self, input: RawSearchInput) -> Result<ResultSet, SearchError> {
        let spec = FilterSpec::build(input)?;
        self.run(&spec).await
    }

    /// Run one logical search for an already-validated spec.
    pub async fn run(&self, spec: &FilterSpec) -> Result<ResultSet, SearchError> {
        let started = Instant::now();
        let translation = translate(spec, &self.config.limits)?;
        let requests_issued = translation.requests.len();
        tracing::info!(
            "search fan-out: {} request(s), {} client-side predicate(s)",
            requests_issued,
            translation.client_side.len()
        );

        let aggregator = Aggregator::new();
        let client = self.client.clone();
        let caps = self.config.caps;
        let retry = self.config.retry.clone();
        let fan_out = stream::iter(
            translation
                .requests
                .into_iter()
                .map(Ok::<_, SearchError>),
        )
        .try_for_each_concurrent(self.config.concurrency.max(1), |request| {
            let client = client.clone();
            let retry = retry.clone();
            let aggregator = &aggregator;
            async move {
                let mut fetcher = PageFetcher::new(client, request, caps, retry);
                while let Some(page) = fetcher.next_page().await {
                    aggregator.merge(page?).await?;
                }
                Ok(())
            }
        });

        match tokio::time::timeout(self.config.deadline, fan_out).await {
            Ok(Ok(())) => Ok(aggregator
                .finish(
                    &translation.client_side,
                    translation.time_bounds,
                    requests_issued,
                    false,
                )
                .await),
            Ok(Err(err)) => {
                tracing::error!("search failed: {}", err);
                Err(err)
            }
            Err(_) => {
                // In-flight fetches were dropped with the fan-out future;
                // nothing keeps running in the background.
                let elapsed_ms = started.elapsed().as_millis() as u64;
                tracing::warn!(
                    "search deadline exceeded after {} ms, returning partial results",
                    elapsed_ms
                );
                let partial = aggregator
                    .finish(
                        &translation.client_side,
                        translation.time_bounds,
                        requests_issued,
                        true,
                    )
                    .await;
                Err(SearchError::Timeout {
                    elapsed_ms,
                    partial,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ClientError, QueryRequest, RawContact, RawPage};
    use async_trait::async_trait;
    use scout_core::RawCriterion;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    /// Routes requests to scripted page sequences: keyed by the first
    /// filter value, or "window" for filterless (window-only) requests.
    struct RoutedApi {
        scripts: Mutex<HashMap<String, VecDeque<RawPage>>>,
        hang_key: Option<String>,
    }

    impl RoutedApi {
        fn new(scripts: Vec<(&str, Vec<RawPage>)>) -> Arc<Self> {
            Arc::new(Self {
                scripts: Mutex::new(
                    scripts
                        .into_iter()
                        .map(|(k, pages)| (k.to_string(), pages.into()))
                        .collect(),
                ),
                hang_key: None,
            })
        }

        fn hanging(scripts: Vec<(&str, Vec<RawPage>)>, hang_key: &str) -> Arc<Self> {
            let mut api = Arc::into_inner(Self::new(scripts)).unwrap();
            api.hang_key = Some(hang_key.to_string());
            Arc::new(api)
        }
    }

    #[async_trait]
    impl SearchApi for RoutedApi {
        async fn search_contacts(&self, request: &QueryRequest) -> Result<RawPage, ClientError> {
            let key = request
                .filters()
                .first()
                .map(|f| f.value.clone())
                .unwrap_or_else(|| "window".into());
            if self.hang_key.as_deref() == Some(key.as_str()) {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            self.scripts
                .lock()
                .unwrap()
                .get_mut(&key)
                .and_then(|pages| pages.pop_front())
                .ok_or_else(|| ClientError::Protocol(format!("no script for '{}'", key)))
        }
    }

    struct FailingApi(ClientError);

    #[async_trait]
    impl SearchApi for FailingApi {
        async fn search_contacts(&self, _request: &QueryRequest) -> Result<RawPage, ClientError> {
            Err(match &self.0 {
                ClientError::BadRequest(d) => ClientError::BadRequest(d.clone()),
                ClientError::Auth(d) => ClientError::Auth(d.clone()),
                other => ClientError::Protocol(other.to_string()),
            })
        }
    }

    fn contact(id: &str, ts: i64, extra: &[(&str, &str)]) -> RawContact {
        RawContact {
            contact_id: id.into(),
            initiated_at: Some(ts.to_string()),
            queue: Some("q-sales".into()),
            agent: Some("a-1".into()),
            attributes: extra
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        }
    }

    fn raw_page(contacts: Vec<RawContact>, next_token: Option<&str>) -> RawPage {
        RawPage {
            contacts,
            next_token: next_token.map(str::to_string),
        }
    }

    fn sales_input() -> RawSearchInput {
        RawSearchInput {
            criteria: vec![RawCriterion {
                attribute: "queue".into(),
                op: "equals".into(),
                value: "q-sales".into(),
            }],
            start: Some("1000".into()),
            end: Some("9000".into()),
        }
    }

    fn engine(api: Arc<dyn SearchApi>, deadline: Duration) -> SearchEngine {
        SearchEngine::new(
            api,
            EngineConfig {
                retry: RetryPolicy {
                    max_retries: 1,
                    base_delay: Duration::from_millis(1),
                },
                deadline,
                ..Default::default()
            },
        )
    }

    #[tokio::test]
    async fn test_split_search_merges_and_sorts() {
        // A queue filter plus a time range under the default 1-clause limit
        // fans out into two sub-queries, two pages each. One contact shows
        // up in both sub-queries; the result is 5 unique records, newest
        // first, with the duplicate's attributes merged in.
        let api = RoutedApi::new(vec![
            (
                "q-sales",
                vec![
                    raw_page(
                        vec![contact("c1", 8000, &[("lang", "en")]), contact("c2", 7000, &[])],
                        Some("t2"),
                    ),
                    raw_page(vec![contact("c3", 6000, &[])], None),
                ],
            ),
            (
                "window",
                vec![
                    raw_page(vec![contact("c4", 5000, &[])], Some("tw")),
                    raw_page(
                        vec![contact("c5", 4000, &[]), contact("c1", 8000, &[("tier", "gold")])],
                        None,
                    ),
                ],
            ),
        ]);

        let set = engine(api, Duration::from_secs(5))
            .search(sales_input())
            .await
            .unwrap();

        assert_eq!(set.total, 5);
        assert!(!set.partial);
        assert_eq!(set.requests_issued, 2);
        assert_eq!(set.pages_fetched, 4);
        let ids: Vec<&str> = set.records.iter().map(|r| r.contact_id.as_str()).collect();
        assert_eq!(ids, vec!["c1", "c2", "c3", "c4", "c5"]);
        assert_eq!(set.records[0].attributes["lang"], "en");
        assert_eq!(set.records[0].attributes["tier"], "gold");
    }

    #[tokio::test]
    async fn test_client_side_refinement_discards_strays() {
        // The window-only sub-query surfaces a contact from another queue;
        // the re-applied queue predicate drops it.
        let mut stray = contact("c9", 5000, &[]);
        stray.queue = Some("q-support".into());
        let api = RoutedApi::new(vec![
            (
                "q-sales",
                vec![raw_page(vec![contact("c1", 8000, &[])], None)],
            ),
            ("window", vec![raw_page(vec![stray], None)]),
        ]);

        let set = engine(api, Duration::from_secs(5))
            .search(sales_input())
            .await
            .unwrap();
        assert_eq!(set.total, 1);
        assert_eq!(set.records[0].contact_id, "c1");
    }

    #[tokio::test]
    async fn test_invalid_input_fails_before_any_call() {
        let api = RoutedApi::new(vec![]);
        let err = engine(api, Duration::from_secs(5))
            .search(RawSearchInput::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::InvalidFilter(_)));
    }

    #[tokio::test]
    async fn test_terminal_fetch_error_bubbles() {
        let api = Arc::new(FailingApi(ClientError::BadRequest("bad shape".into())));
        let err = engine(api, Duration::from_secs(5))
            .search(sales_input())
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::Fetch { transient: false, .. }));
    }

    #[tokio::test]
    async fn test_auth_error_bubbles_unretried() {
        let api = Arc::new(FailingApi(ClientError::Auth("expired".into())));
        let err = engine(api, Duration::from_secs(5))
            .search(sales_input())
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::Auth(_)));
    }

    #[tokio::test]
    async fn test_deadline_yields_flagged_partial() {
        // One sub-query answers instantly, the other never does. The search
        // must come back at the deadline with the fast records flagged
        // partial, not hang and not return an unmarked empty set.
        let api = RoutedApi::hanging(
            vec![(
                "q-sales",
                vec![raw_page(vec![contact("c1", 8000, &[])], None)],
            )],
            "window",
        );

        let err = engine(api, Duration::from_millis(200))
            .search(sales_input())
            .await
            .unwrap_err();
        match err {
            SearchError::Timeout { partial, .. } => {
                assert!(partial.partial);
                assert_eq!(partial.total, 1);
                assert_eq!(partial.records[0].contact_id, "c1");
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }
}
