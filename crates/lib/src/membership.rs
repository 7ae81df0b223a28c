//! Membership store client: group size and member contact addresses.
//!
//! The store is the only external-storage dependency on the request path. Both
//! queries are scoped by group id; a failure aborts the whole inbound event with
//! a server error — there are no partial-success semantics here.

use async_trait::async_trait;
use serde::Deserialize;

/// Membership store query failure (unreachable store or malformed response).
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("membership request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("membership api error: {0}")]
    Api(String),
}

/// Resolves a recipient group to its size and member addresses.
#[async_trait]
pub trait MembershipResolver: Send + Sync {
    /// Number of members in the group.
    async fn member_count(&self, group_id: i64) -> Result<u64, QueryError>;

    /// Member contact addresses, in store order. The order is preserved all the
    /// way into the inline reply document and the deferred send sequence.
    async fn member_addresses(&self, group_id: i64) -> Result<Vec<String>, QueryError>;
}

#[derive(Debug, Deserialize)]
struct CountResponse {
    count: u64,
}

#[derive(Debug, Deserialize)]
struct MembersResponse {
    #[serde(default)]
    members: Vec<String>,
}

/// HTTP-backed membership store.
#[derive(Clone)]
pub struct HttpMembershipStore {
    base_url: String,
    client: reqwest::Client,
}

impl HttpMembershipStore {
    /// Build a client for the store at `base_url` with a per-request timeout.
    pub fn new(base_url: &str, timeout: std::time::Duration) -> Result<Self, QueryError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[async_trait]
impl MembershipResolver for HttpMembershipStore {
    /// GET /groups/{id}/count — `{"count": N}`.
    async fn member_count(&self, group_id: i64) -> Result<u64, QueryError> {
        let url = format!("{}/groups/{}/count", self.base_url, group_id);
        let res = self.client.get(&url).send().await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(QueryError::Api(format!("{} {}", status, body)));
        }
        let data: CountResponse = res.json().await?;
        Ok(data.count)
    }

    /// GET /groups/{id}/members — `{"members": ["+1...", ...]}`.
    async fn member_addresses(&self, group_id: i64) -> Result<Vec<String>, QueryError> {
        let url = format!("{}/groups/{}/members", self.base_url, group_id);
        let res = self.client.get(&url).send().await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(QueryError::Api(format!("{} {}", status, body)));
        }
        let data: MembersResponse = res.json().await?;
        Ok(data.members)
    }
}
