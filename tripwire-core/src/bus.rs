//! The outbound message bus seam.
//!
//! Rendered jobs leave the engine through a key-partitioned publish. The
//! production broker client lives outside the engine; what ships here is
//! the contract, an in-memory implementation for tests and single-process
//! use, and an HTTP bridge that forwards each publish to a configured
//! endpoint. Delivery is at-least-once: a publish that succeeds may still
//! be retried by a caller that crashed before recording its alert.

use std::sync::Mutex;
use std::sync::PoisonError;
use std::time::Duration;

use async_trait::async_trait;
use url::Url;

/// Failures reported by a bus client.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("publish to {topic} failed: {reason}")]
    Publish { topic: String, reason: String },
}

/// Key-partitioned publish of one message.
#[async_trait]
pub trait MessageBus: Send + Sync {
    async fn publish(&self, topic: &str, key: &str, value: &str) -> Result<(), BusError>;
}

/// One published message, as recorded by [`MemoryBus`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    pub topic: String,
    pub key: String,
    pub value: String,
}

/// In-memory bus: records every publish for inspection.
#[derive(Debug, Default)]
pub struct MemoryBus {
    messages: Mutex<Vec<BusMessage>>,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of everything published so far.
    pub fn messages(&self) -> Vec<BusMessage> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Drain the recorded messages.
    pub fn take(&self) -> Vec<BusMessage> {
        std::mem::take(
            &mut *self
                .messages
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        )
    }
}

#[async_trait]
impl MessageBus for MemoryBus {
    async fn publish(&self, topic: &str, key: &str, value: &str) -> Result<(), BusError> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(BusMessage {
                topic: topic.to_owned(),
                key: key.to_owned(),
                value: value.to_owned(),
            });
        Ok(())
    }
}

/// Header carrying the logical topic on HTTP-bridged publishes.
pub const TOPIC_HEADER: &str = "Tripwire-Topic";
/// Header carrying the partition key on HTTP-bridged publishes.
pub const KEY_HEADER: &str = "Tripwire-Key";

/// HTTP bridge: POSTs each message to a broker-facing relay endpoint.
#[derive(Debug, Clone)]
pub struct HttpBus {
    http: reqwest::Client,
    endpoint: Url,
}

impl HttpBus {
    pub fn new(endpoint: Url) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            endpoint,
        }
    }
}

#[async_trait]
impl MessageBus for HttpBus {
    #[tracing::instrument(skip(self, value), fields(endpoint = %self.endpoint))]
    async fn publish(&self, topic: &str, key: &str, value: &str) -> Result<(), BusError> {
        let publish_err = |reason: String| BusError::Publish {
            topic: topic.to_owned(),
            reason,
        };

        let response = self
            .http
            .post(self.endpoint.clone())
            .header(TOPIC_HEADER, topic)
            .header(KEY_HEADER, key)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(value.to_owned())
            .send()
            .await
            .map_err(|e| publish_err(e.to_string()))?;

        if !response.status().is_success() {
            return Err(publish_err(format!(
                "relay answered {}",
                response.status()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_bus_records_in_order() {
        let bus = MemoryBus::new();
        bus.publish("Request-Job-local", "k1", "one").await.unwrap();
        bus.publish("Request-Job-local", "k2", "two").await.unwrap();

        let messages = bus.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].key, "k1");
        assert_eq!(messages[1].value, "two");

        assert_eq!(bus.take().len(), 2);
        assert!(bus.messages().is_empty());
    }
}
