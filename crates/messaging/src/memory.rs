// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory broker used by tests and by the fake "agent" task driving
//! scheduler integration tests.

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::mpsc;

use crate::error::{MessagingError, MessagingResult};
use crate::messenger::{subject_matches, Message, Messenger, Subscription};

struct Registration {
    pattern: String,
    sender: mpsc::UnboundedSender<Message>,
}

/// A single-process pub/sub bus keyed by subject pattern matching. Safe
/// for concurrent use from multiple execution tasks (spec §5).
#[derive(Default)]
pub struct InMemoryBroker {
    subs: RwLock<Vec<Registration>>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers `message` to every subscription whose pattern matches its
    /// subject. Returns whether at least one subscriber received it.
    fn deliver(&self, message: &Message) -> bool {
        let subs = self.subs.read();
        let mut delivered = false;
        for reg in subs.iter() {
            if subject_matches(&reg.pattern, &message.subject) {
                // A disconnected receiver just means that subscriber has
                // been dropped; other matching subscribers still get it.
                if reg.sender.send(message.clone()).is_ok() {
                    delivered = true;
                }
            }
        }
        delivered
    }
}

#[async_trait]
impl Messenger for InMemoryBroker {
    async fn publish(&self, subject: &str, payload: Vec<u8>) -> MessagingResult<()> {
        self.deliver(&Message::new(subject, payload));
        Ok(())
    }

    async fn publish_with_ack(
        &self,
        subject: &str,
        payload: Vec<u8>,
        _ack_timeout: std::time::Duration,
    ) -> MessagingResult<()> {
        // The in-memory bus delivers synchronously, so presence of a
        // subscriber is known immediately; a real adapter would actually
        // wait out `_ack_timeout` for a transport-level ack.
        if self.deliver(&Message::new(subject, payload)) {
            Ok(())
        } else {
            Err(MessagingError::AckTimeout(subject.to_string()))
        }
    }

    async fn subscribe(&self, subject_pattern: &str) -> MessagingResult<Box<dyn Subscription>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subs.write().push(Registration { pattern: subject_pattern.to_string(), sender: tx });
        Ok(Box::new(InMemorySubscription { rx }))
    }
}

struct InMemorySubscription {
    rx: mpsc::UnboundedReceiver<Message>,
}

#[async_trait]
impl Subscription for InMemorySubscription {
    async fn next(&mut self) -> Option<Message> {
        self.rx.recv().await
    }

    async fn drain(&mut self) -> Vec<Message> {
        let mut out = Vec::new();
        while let Ok(msg) = self.rx.try_recv() {
            out.push(msg);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn publish_then_subscribe_misses_the_message() {
        let broker = InMemoryBroker::new();
        broker.publish("job.1.output", b"late".to_vec()).await.unwrap();
        let mut sub = broker.subscribe("job.*.output").await.unwrap();
        assert!(sub.drain().await.is_empty());
    }

    #[tokio::test]
    async fn subscribe_then_publish_is_received() {
        let broker = InMemoryBroker::new();
        let mut sub = broker.subscribe("job.*.output").await.unwrap();
        broker.publish("job.1.output", b"hi".to_vec()).await.unwrap();
        let msg = sub.next().await.unwrap();
        assert_eq!(msg.subject, "job.1.output");
        assert_eq!(msg.payload, b"hi");
    }

    #[tokio::test]
    async fn ack_fails_fast_with_no_subscriber() {
        let broker = InMemoryBroker::new();
        let err =
            broker.publish_with_ack("node.1.job.start", vec![], Duration::from_secs(60)).await.unwrap_err();
        assert!(matches!(err, MessagingError::AckTimeout(_)));
    }

    #[tokio::test]
    async fn wait_for_times_out_with_no_reply() {
        let broker = InMemoryBroker::new();
        let err = broker.wait_for("job.1.finished", Duration::from_millis(20)).await.unwrap_err();
        assert!(matches!(err, MessagingError::DeadlineExceeded(_)));
    }
}
