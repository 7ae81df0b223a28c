//! Inbound webhook event: the provider's "message received" POST.
//!
//! The provider delivers events as `application/x-www-form-urlencoded` with
//! `AccountSid`/`To`/`From`/`Body`. Every field defaults to an empty string when
//! absent — a missing field is never a parse error by itself; it only fails
//! indirectly (an empty AccountSid matches no account, an empty To no route).

use serde::Deserialize;

/// One inbound message event, request-scoped.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InboundEvent {
    #[serde(rename = "AccountSid", default)]
    pub account_sid: String,
    #[serde(rename = "To", default)]
    pub to: String,
    #[serde(rename = "From", default)]
    pub from: String,
    #[serde(rename = "Body", default)]
    pub body: String,
}

/// The text relayed to group members, annotated with the original sender.
pub fn relay_text(from: &str, body: &str) -> String {
    format!("From: {}\nMessage:\n{}", from, body)
}
