use std::sync::Arc;

use async_trait::async_trait;

use crate::error::BusError;

/// A subject-addressed message as seen by subscribers.
#[derive(Debug, Clone)]
pub struct BusMessage {
    /// Dot-separated routing key (e.g. `wd.a.agent-1.sys.cpu`).
    pub subject: String,
    /// Raw payload bytes. Watchdog payloads are JSON documents.
    pub payload: Vec<u8>,
}

/// Publishes payloads on subjects via the PUB/SUB pattern.
///
/// Publish is fire-and-forget: an `Err` means the local connection failed,
/// delivery guarantees beyond that are the bus's.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish a payload on the given subject.
    async fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<(), BusError>;
}

/// Blanket implementation so `Arc<dyn EventPublisher>` can be used directly.
#[async_trait]
impl<T: EventPublisher + ?Sized> EventPublisher for Arc<T> {
    async fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<(), BusError> {
        (**self).publish(subject, payload).await
    }
}

/// Subscribes to subjects matching prefixes via the PUB/SUB pattern.
#[async_trait]
pub trait EventSubscriber: Send + Sync {
    /// Subscribe to subjects matching the given prefix.
    async fn subscribe(&self, subject_prefix: &str) -> Result<(), BusError>;

    /// Drop a previously registered subscription.
    async fn unsubscribe(&self, subject_prefix: &str) -> Result<(), BusError>;

    /// Receive the next message. Blocks until a message matching a
    /// subscription arrives.
    async fn recv(&self) -> Result<BusMessage, BusError>;
}

/// Blanket implementation so `Arc<dyn EventSubscriber>` can be used directly.
#[async_trait]
impl<T: EventSubscriber + ?Sized> EventSubscriber for Arc<T> {
    async fn subscribe(&self, subject_prefix: &str) -> Result<(), BusError> {
        (**self).subscribe(subject_prefix).await
    }

    async fn unsubscribe(&self, subject_prefix: &str) -> Result<(), BusError> {
        (**self).unsubscribe(subject_prefix).await
    }

    async fn recv(&self) -> Result<BusMessage, BusError> {
        (**self).recv().await
    }
}
