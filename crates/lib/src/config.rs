//! Configuration types and loading.
//!
//! Config is loaded once at startup from a YAML file (e.g. `~/.smsrelay/config.yaml`)
//! and never mutated afterwards: account identity, routes, delivery tuning, and the
//! membership/provider endpoints all live here. Malformed or missing configuration
//! is a startup error, never a request-time error.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Provider account identity (account SID + auth token).
    #[serde(default)]
    pub account: AccountConfig,

    /// Destination number → recipient group routes.
    #[serde(default)]
    pub routes: Vec<RouteConfig>,

    /// Inline-vs-deferred threshold and worker pool sizing.
    #[serde(default)]
    pub delivery: DeliveryConfig,

    /// Membership store endpoint.
    #[serde(default)]
    pub membership: MembershipConfig,

    /// Outbound provider endpoint.
    #[serde(default)]
    pub provider: ProviderConfig,
}

/// Server bind and port settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    /// Port for the webhook HTTP server (default 8080).
    #[serde(default = "default_server_port")]
    pub port: u16,

    /// Bind address (default "127.0.0.1").
    #[serde(default = "default_server_bind")]
    pub bind: String,
}

fn default_server_port() -> u16 {
    8080
}

fn default_server_bind() -> String {
    "127.0.0.1".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_server_port(),
            bind: default_server_bind(),
        }
    }
}

/// Provider account identity. Used to validate inbound webhooks (the event's
/// AccountSid must match) and to authenticate outbound sends.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountConfig {
    pub account_sid: String,
    /// Overridden by SMSRELAY_AUTH_TOKEN env when set.
    #[serde(default)]
    pub auth_token: String,
}

/// One route: inbound messages to `phoneNumber` fan out to group `groupId`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteConfig {
    /// Display name for logs.
    #[serde(default)]
    pub name: String,
    pub phone_number: String,
    pub group_id: i64,
}

/// Delivery tuning: inline threshold, worker count, and queue depth.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryConfig {
    /// Largest group answered inline in the webhook response (default 10).
    /// Groups at or below the limit get an inline reply document; larger
    /// groups are fanned out on the worker pool.
    #[serde(default = "default_inline_limit")]
    pub inline_limit: u64,

    /// Fixed worker task count for deferred fan-out (default 5).
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Deferred job queue depth (default 1024). When the backlog is full the
    /// webhook is answered 503 instead of queuing without bound. Queued jobs
    /// run to completion; there is no retry and no per-job deadline.
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,
}

fn default_inline_limit() -> u64 {
    10
}

fn default_workers() -> usize {
    5
}

fn default_queue_depth() -> usize {
    1024
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            inline_limit: default_inline_limit(),
            workers: default_workers(),
            queue_depth: default_queue_depth(),
        }
    }
}

/// Membership store endpoint and request timeout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipConfig {
    /// Base URL of the membership service (e.g. "http://127.0.0.1:9090").
    #[serde(default)]
    pub base_url: String,

    /// Request timeout in seconds (default 10). A stalled store aborts the
    /// webhook request instead of blocking it indefinitely.
    #[serde(default = "default_membership_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_membership_timeout_secs() -> u64 {
    10
}

impl Default for MembershipConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            timeout_secs: default_membership_timeout_secs(),
        }
    }
}

/// Outbound provider endpoint and request timeout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    /// Base URL of the provider REST API. Defaults to the Twilio API host.
    #[serde(default = "default_provider_base_url")]
    pub base_url: String,

    /// Request timeout in seconds (default 30).
    #[serde(default = "default_provider_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_provider_base_url() -> String {
    "https://api.twilio.com".to_string()
}

fn default_provider_timeout_secs() -> u64 {
    30
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_provider_base_url(),
            timeout_secs: default_provider_timeout_secs(),
        }
    }
}

/// Resolve the provider auth token: env SMSRELAY_AUTH_TOKEN overrides config.
pub fn resolve_auth_token(config: &Config) -> Option<String> {
    std::env::var("SMSRELAY_AUTH_TOKEN")
        .ok()
        .and_then(|s| {
            let t = s.trim();
            if t.is_empty() {
                None
            } else {
                Some(t.to_string())
            }
        })
        .or_else(|| {
            let t = config.account.auth_token.trim();
            if t.is_empty() {
                None
            } else {
                Some(t.to_string())
            }
        })
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("SMSRELAY_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .map(|h| h.join(".smsrelay").join("config.yaml"))
                .unwrap_or_else(|| PathBuf::from("config.yaml"))
        })
}

/// Load config from the given path (or SMSRELAY_CONFIG_PATH / the default).
/// A missing file is an error: the relay cannot run without an account and routes.
/// Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let s = std::fs::read_to_string(&path)
        .with_context(|| format!("reading config from {}", path.display()))?;
    let config: Config = serde_yaml::from_str(&s)
        .with_context(|| format!("parsing config from {}", path.display()))?;
    Ok((config, path))
}

impl Config {
    /// Check invariants that would otherwise surface as request-time failures:
    /// account identity present, auth token resolvable, at least one route.
    /// Duplicate route numbers are rejected by `RoutingTable::from_routes`.
    pub fn validate(&self) -> Result<()> {
        if self.account.account_sid.trim().is_empty() {
            anyhow::bail!("account.accountSid is not set");
        }
        if resolve_auth_token(self).is_none() {
            anyhow::bail!("account.authToken is not set (or set SMSRELAY_AUTH_TOKEN)");
        }
        if self.routes.is_empty() {
            anyhow::bail!("no routes configured");
        }
        if self.membership.base_url.trim().is_empty() {
            anyhow::bail!("membership.baseUrl is not set");
        }
        if self.delivery.workers == 0 {
            anyhow::bail!("delivery.workers must be at least 1");
        }
        if self.delivery.queue_depth == 0 {
            anyhow::bail!("delivery.queueDepth must be at least 1");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        let mut config = Config::default();
        config.account.account_sid = "ACXYZ".to_string();
        config.account.auth_token = "secret".to_string();
        config.membership.base_url = "http://127.0.0.1:9090".to_string();
        config.routes.push(RouteConfig {
            name: "ops".to_string(),
            phone_number: "+15550001000".to_string(),
            group_id: 7,
        });
        config
    }

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.bind, "127.0.0.1");
        assert_eq!(config.delivery.inline_limit, 10);
        assert_eq!(config.delivery.workers, 5);
        assert_eq!(config.delivery.queue_depth, 1024);
        assert_eq!(config.membership.timeout_secs, 10);
        assert_eq!(config.provider.base_url, "https://api.twilio.com");
    }

    #[test]
    fn parse_yaml() {
        let yaml = r#"
account:
  accountSid: ACXYZ
  authToken: secret
routes:
  - name: ops
    phoneNumber: "+15550001000"
    groupId: 7
delivery:
  inlineLimit: 3
membership:
  baseUrl: http://127.0.0.1:9090
"#;
        let config: Config = serde_yaml::from_str(yaml).expect("parse");
        assert_eq!(config.account.account_sid, "ACXYZ");
        assert_eq!(config.routes.len(), 1);
        assert_eq!(config.routes[0].group_id, 7);
        assert_eq!(config.delivery.inline_limit, 3);
        assert_eq!(config.delivery.workers, 5);
        config.validate().expect("valid");
    }

    #[test]
    fn validate_rejects_missing_account() {
        let mut config = valid_config();
        config.account.account_sid = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_empty_routes() {
        let mut config = valid_config();
        config.routes.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_workers() {
        let mut config = valid_config();
        config.delivery.workers = 0;
        assert!(config.validate().is_err());
    }
}
