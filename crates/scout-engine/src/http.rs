//! # HTTP Vendor Client
//!
//! The production backend behind [`SearchApi`] and [`DirectoryApi`]: plain
//! JSON-over-HTTP against the vendor endpoint, bearer-token auth, status
//! codes mapped onto the transient/terminal split the fetcher retries by.

use crate::client::{ClientError, QueryRequest, RawPage, SearchApi};
use crate::directory::{AgentSummary, DirectoryApi, QueueSummary};
use async_trait::async_trait;
use reqwest::StatusCode;

/// Opaque bearer credential. Displayed nowhere, logged nowhere.
#[derive(Clone)]
pub struct AuthToken(String);

impl AuthToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl std::fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AuthToken(..)")
    }
}

pub struct HttpVendorClient {
    http: reqwest::Client,
    base_url: String,
    token: AuthToken,
}

impl HttpVendorClient {
    pub fn new(base_url: impl Into<String>, token: AuthToken) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        }
    }

    fn classify(status: StatusCode, body: String) -> ClientError {
        match status {
            StatusCode::TOO_MANY_REQUESTS => ClientError::Throttled(body),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ClientError::Auth(body),
            StatusCode::BAD_REQUEST => ClientError::BadRequest(body),
            s if s.is_server_error() => ClientError::Server(format!("{}: {}", s, body)),
            s => ClientError::Protocol(format!("unexpected status {}: {}", s, body)),
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, String> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.token.0)
            .send()
            .await
            .map_err(|e| format!("request to {} failed: {}", url, e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(format!("{} returned {}", url, status));
        }
        response
            .json::<T>()
            .await
            .map_err(|e| format!("undecodable body from {}: {}", url, e))
    }
}

#[async_trait]
impl SearchApi for HttpVendorClient {
    async fn search_contacts(&self, request: &QueryRequest) -> Result<RawPage, ClientError> {
        let url = format!("{}/contacts/search", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.token.0)
            .json(request)
            .send()
            .await
            .map_err(|e| ClientError::Server(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::classify(status, body));
        }
        response
            .json::<RawPage>()
            .await
            .map_err(|e| ClientError::Protocol(format!("undecodable search response: {}", e)))
    }
}

#[async_trait]
impl DirectoryApi for HttpVendorClient {
    async fn list_queues(&self) -> Result<Vec<QueueSummary>, String> {
        self.get_json("/queues").await
    }

    async fn list_agents(&self) -> Result<Vec<AgentSummary>, String> {
        self.get_json("/agents").await
    }
}
