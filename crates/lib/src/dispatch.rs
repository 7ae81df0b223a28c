//! Inline-vs-deferred delivery decision.

/// How a resolved group is delivered to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Answer the webhook with an inline multi-recipient reply document.
    Inline,
    /// Acknowledge immediately and fan out on the worker pool.
    Deferred,
}

/// Decide the delivery path for a group of `member_count` recipients.
/// A count exactly at the limit goes inline (inclusive bound). Evaluated fresh
/// per request; no memory of prior decisions.
pub fn decide(member_count: u64, inline_limit: u64) -> Delivery {
    if member_count <= inline_limit {
        Delivery::Inline
    } else {
        Delivery::Deferred
    }
}
