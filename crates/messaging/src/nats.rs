// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A thin `async-nats`-backed [`Messenger`] for production wiring.
//!
//! NATS is the concrete bus named in the original source
//! (`internal/app/iomanager/manager.go` imports `github.com/nats-io/nats.go`)
//! and is the messaging crate the rest of this retrieval pack reaches for
//! when it touches a message bus.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;

use crate::error::{MessagingError, MessagingResult};
use crate::messenger::{Message, Messenger, Subscription};

pub struct NatsMessenger {
    client: async_nats::Client,
}

impl NatsMessenger {
    pub async fn connect(url: &str) -> MessagingResult<Self> {
        let client = async_nats::connect(url).await.map_err(|e| MessagingError::Io(e.to_string()))?;
        Ok(Self { client })
    }

    pub fn from_client(client: async_nats::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Messenger for NatsMessenger {
    async fn publish(&self, subject: &str, payload: Vec<u8>) -> MessagingResult<()> {
        self.client
            .publish(subject.to_string(), payload.into())
            .await
            .map_err(|e| MessagingError::Io(e.to_string()))
    }

    async fn publish_with_ack(
        &self,
        subject: &str,
        payload: Vec<u8>,
        ack_timeout: Duration,
    ) -> MessagingResult<()> {
        self.client
            .publish(subject.to_string(), payload.into())
            .await
            .map_err(|e| MessagingError::Io(e.to_string()))?;
        // Core NATS publish is fire-and-forget; the ack here is that the
        // message left the client's send buffer within the timeout.
        match tokio::time::timeout(ack_timeout, self.client.flush()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(MessagingError::Io(e.to_string())),
            Err(_) => Err(MessagingError::AckTimeout(subject.to_string())),
        }
    }

    async fn subscribe(&self, subject_pattern: &str) -> MessagingResult<Box<dyn Subscription>> {
        let sub = self
            .client
            .subscribe(subject_pattern.to_string())
            .await
            .map_err(|e| MessagingError::Io(e.to_string()))?;
        Ok(Box::new(NatsSubscription { sub }))
    }
}

struct NatsSubscription {
    sub: async_nats::Subscriber,
}

#[async_trait]
impl Subscription for NatsSubscription {
    async fn next(&mut self) -> Option<Message> {
        self.sub.next().await.map(|m| Message::new(m.subject.to_string(), m.payload.to_vec()))
    }

    async fn drain(&mut self) -> Vec<Message> {
        let mut out = Vec::new();
        while let Ok(Some(m)) = tokio::time::timeout(Duration::from_millis(0), self.sub.next()).await {
            out.push(Message::new(m.subject.to_string(), m.payload.to_vec()));
        }
        out
    }
}
