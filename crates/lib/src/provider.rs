//! Outbound provider client: one REST call per message, authenticated with the
//! configured account identity. Used only on the deferred path.

use async_trait::async_trait;

/// A single outbound send failed (network error or provider rejection).
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("provider request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("provider api error: {0}")]
    Api(String),
}

/// Sends one message through the outbound provider.
#[async_trait]
pub trait OutboundSender: Send + Sync {
    async fn send(&self, to: &str, from: &str, body: &str) -> Result<(), SendError>;
}

/// Twilio-style REST client (`POST /2010-04-01/Accounts/{sid}/Messages.json`
/// with basic auth and form fields To/From/Body).
#[derive(Clone)]
pub struct ProviderClient {
    base_url: String,
    account_sid: String,
    auth_token: String,
    client: reqwest::Client,
}

impl ProviderClient {
    pub fn new(
        base_url: &str,
        account_sid: &str,
        auth_token: &str,
        timeout: std::time::Duration,
    ) -> Result<Self, SendError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            account_sid: account_sid.to_string(),
            auth_token: auth_token.to_string(),
            client,
        })
    }
}

#[async_trait]
impl OutboundSender for ProviderClient {
    async fn send(&self, to: &str, from: &str, body: &str) -> Result<(), SendError> {
        let url = format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.base_url, self.account_sid
        );
        let form = [("To", to), ("From", from), ("Body", body)];
        let res = self
            .client
            .post(&url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&form)
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(SendError::Api(format!("{} {}", status, body)));
        }
        Ok(())
    }
}
