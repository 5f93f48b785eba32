// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `Messenger` capability interface (spec §4.5, §4.7): subject-based
//! publish/subscribe with an ack-timeout on outgoing requests.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::MessagingResult;

/// A single delivered message: the concrete subject it arrived on (not
/// the subscribed pattern) and its JSON-encoded payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub subject: String,
    pub payload: Vec<u8>,
}

impl Message {
    pub fn new(subject: impl Into<String>, payload: Vec<u8>) -> Self {
        Self { subject: subject.into(), payload }
    }
}

/// A live subscription to a subject pattern. Messages arrive in the order
/// the bus delivers them; `drain` is used at shutdown to flush whatever is
/// already queued without accepting new messages (spec §4.7 "shutdown").
#[async_trait]
pub trait Subscription: Send {
    async fn next(&mut self) -> Option<Message>;

    /// Deliver every already-queued message, then stop (no further waiting).
    async fn drain(&mut self) -> Vec<Message>;
}

/// Typed request/reply and subject-pattern subscription over a
/// publish/subscribe bus (spec §4.5). Subjects are NATS-style
/// dot-separated tokens; `*` in a subscribed pattern matches exactly one
/// token.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Fire-and-forget publish with no ack expectation (output chunks).
    async fn publish(&self, subject: &str, payload: Vec<u8>) -> MessagingResult<()>;

    /// Publish and wait up to `ack_timeout` for the peer to acknowledge
    /// receipt. Fails with [`crate::error::MessagingError::AckTimeout`] if
    /// nothing was listening on `subject` to receive it.
    async fn publish_with_ack(
        &self,
        subject: &str,
        payload: Vec<u8>,
        ack_timeout: Duration,
    ) -> MessagingResult<()>;

    /// Subscribe to a subject pattern, receiving every future message that
    /// matches it until the returned handle is dropped.
    async fn subscribe(&self, subject_pattern: &str) -> MessagingResult<Box<dyn Subscription>>;

    /// Convenience built on `subscribe`: wait up to `deadline` for a single
    /// message on `subject_pattern`. Only safe to use when nothing can
    /// reply before this call runs — callers racing a reply against a
    /// publish (every agent RPC, spec §4.5) must `subscribe` first and use
    /// [`await_reply`] instead, or the reply can arrive before this
    /// method's own `subscribe` registers.
    async fn wait_for(&self, subject_pattern: &str, deadline: Duration) -> MessagingResult<Message> {
        let mut sub = self.subscribe(subject_pattern).await?;
        await_reply(sub.as_mut(), subject_pattern, deadline).await
    }
}

/// Awaits a single message on an already-live subscription. This is the
/// second half of the subscribe-then-publish pattern spec §4.5 requires
/// for agent RPCs: "publish … and, in parallel, subscribe to a reply
/// subject" — the subscription must exist *before* the request is
/// published, or a reply posted between publish and subscribe is lost.
pub async fn await_reply(
    subscription: &mut dyn Subscription,
    subject_pattern: &str,
    deadline: Duration,
) -> MessagingResult<Message> {
    match tokio::time::timeout(deadline, subscription.next()).await {
        Ok(Some(msg)) => Ok(msg),
        Ok(None) => Err(crate::error::MessagingError::Io(format!(
            "subscription to {subject_pattern} closed before a message arrived"
        ))),
        Err(_) => Err(crate::error::MessagingError::DeadlineExceeded(subject_pattern.to_string())),
    }
}

/// `*` in `pattern` matches exactly one dot-separated token of `subject`;
/// token counts must match.
pub fn subject_matches(pattern: &str, subject: &str) -> bool {
    let pattern_tokens: Vec<&str> = pattern.split('.').collect();
    let subject_tokens: Vec<&str> = subject.split('.').collect();
    if pattern_tokens.len() != subject_tokens.len() {
        return false;
    }
    pattern_tokens.iter().zip(subject_tokens.iter()).all(|(p, s)| *p == "*" || p == s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_matches_single_token() {
        assert!(subject_matches("job.*.output", "job.abc123.output"));
        assert!(!subject_matches("job.*.output", "job.abc123.extra.output"));
        assert!(!subject_matches("job.*.output", "job.output"));
    }

    #[test]
    fn exact_subject_matches_itself() {
        assert!(subject_matches("node.1.job.start", "node.1.job.start"));
        assert!(!subject_matches("node.1.job.start", "node.2.job.start"));
    }
}
