use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};
use zeromq::prelude::*;
use zeromq::{PubSocket, SubSocket, ZmqMessage};

use crate::error::BusError;
use crate::traits::{BusMessage, EventPublisher, EventSubscriber};
use crate::transport::Transport;

/// ZeroMQ PUB socket publisher that connects to the broker's frontend.
///
/// Messages are sent as two-frame ZMQ messages:
/// 1. Subject string (used by SUB sockets for prefix filtering)
/// 2. Payload bytes (JSON document)
///
/// ZeroMQ handles transport-level reconnects; a `publish` issued while the
/// connection is down surfaces as an error that callers treat as a
/// health-degrading event, not a crash.
pub struct ZmqPublisher {
    socket: Mutex<PubSocket>,
}

impl ZmqPublisher {
    /// Create a publisher connected to each of the given broker frontend
    /// endpoints.
    #[instrument(skip_all, fields(endpoints = transports.len()))]
    pub async fn connect(transports: &[Transport]) -> Result<Self, BusError> {
        if transports.is_empty() {
            return Err(BusError::Transport("no publisher endpoints given".into()));
        }
        let mut socket = PubSocket::new();
        for transport in transports {
            let endpoint = transport.endpoint();
            info!(endpoint = %endpoint, "connecting PUB socket to broker frontend");
            socket.connect(&endpoint).await?;
        }
        Ok(Self {
            socket: Mutex::new(socket),
        })
    }

    /// Create a publisher that binds to the given endpoint.
    ///
    /// Use this for direct PUB/SUB without a broker (publisher binds,
    /// subscribers connect).
    #[instrument(skip_all, fields(endpoint = %transport))]
    pub async fn bind(transport: &Transport) -> Result<Self, BusError> {
        let mut socket = PubSocket::new();
        let endpoint = transport.endpoint();
        info!(endpoint = %endpoint, "binding PUB socket");
        socket.bind(&endpoint).await?;
        Ok(Self {
            socket: Mutex::new(socket),
        })
    }
}

#[async_trait]
impl EventPublisher for ZmqPublisher {
    /// Publish a payload as a two-frame ZMQ message: `[subject, payload]`.
    async fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<(), BusError> {
        let mut zmq_msg = ZmqMessage::from(subject);
        zmq_msg.push_back(payload.into());

        let mut socket = self.socket.lock().await;
        socket.send(zmq_msg).await?;

        debug!(subject = %subject, "published message");
        Ok(())
    }
}

/// ZeroMQ SUB socket subscriber that connects to the broker's backend.
///
/// Receives two-frame ZMQ messages: `[subject, payload]`.
pub struct ZmqSubscriber {
    socket: Mutex<SubSocket>,
}

impl ZmqSubscriber {
    /// Create a subscriber connected to each of the given broker backend
    /// endpoints.
    #[instrument(skip_all, fields(endpoints = transports.len()))]
    pub async fn connect(transports: &[Transport]) -> Result<Self, BusError> {
        if transports.is_empty() {
            return Err(BusError::Transport("no subscriber endpoints given".into()));
        }
        let mut socket = SubSocket::new();
        for transport in transports {
            let endpoint = transport.endpoint();
            info!(endpoint = %endpoint, "connecting SUB socket to broker backend");
            socket.connect(&endpoint).await?;
        }
        Ok(Self {
            socket: Mutex::new(socket),
        })
    }
}

#[async_trait]
impl EventSubscriber for ZmqSubscriber {
    /// Subscribe to subjects matching the given prefix.
    ///
    /// An empty string subscribes to all subjects. Multiple subscriptions
    /// can be active simultaneously.
    async fn subscribe(&self, subject_prefix: &str) -> Result<(), BusError> {
        let mut socket = self.socket.lock().await;
        socket.subscribe(subject_prefix).await?;
        info!(subject_prefix = %subject_prefix, "subscribed to subject prefix");
        Ok(())
    }

    /// Drop a previously registered subscription.
    async fn unsubscribe(&self, subject_prefix: &str) -> Result<(), BusError> {
        let mut socket = self.socket.lock().await;
        socket.unsubscribe(subject_prefix).await?;
        info!(subject_prefix = %subject_prefix, "unsubscribed from subject prefix");
        Ok(())
    }

    /// Receive the next message. Expects a two-frame ZMQ message
    /// `[subject, payload]`.
    async fn recv(&self) -> Result<BusMessage, BusError> {
        let mut socket = self.socket.lock().await;
        let zmq_msg = socket.recv().await?;

        let frames: Vec<_> = zmq_msg.iter().collect();
        if frames.len() < 2 {
            return Err(BusError::Transport(format!(
                "expected [subject, payload] frames, got {}",
                frames.len()
            )));
        }

        let subject = String::from_utf8(frames[0].to_vec())
            .map_err(|_| BusError::Transport("subject frame is not UTF-8".into()))?;
        let payload = frames[1].to_vec();

        debug!(subject = %subject, bytes = payload.len(), "received message");
        Ok(BusMessage { subject, payload })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zmq_message_two_frame_construction() {
        let subject = "wd.a.agent-1.sys.cpu";
        let payload = br#"{"family":"cpu"}"#;

        let mut msg = ZmqMessage::from(subject);
        msg.push_back(payload.to_vec().into());

        let frames: Vec<_> = msg.iter().collect();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].as_ref(), subject.as_bytes());
        assert_eq!(frames[1].as_ref(), payload);
    }

    #[tokio::test]
    async fn direct_pub_sub_roundtrip() {
        // Direct PUB/SUB without broker: publisher binds, subscriber connects.
        let transport = Transport::tcp("127.0.0.1", 16700);

        let publisher = ZmqPublisher::bind(&transport).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let subscriber = ZmqSubscriber::connect(std::slice::from_ref(&transport))
            .await
            .unwrap();
        subscriber.subscribe("wd.a.agent-1").await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;

        publisher
            .publish("wd.a.agent-1.sys.cpu", br#"{"usage":1.5}"#.to_vec())
            .await
            .unwrap();

        let received = tokio::time::timeout(
            std::time::Duration::from_secs(2),
            subscriber.recv(),
        )
        .await
        .expect("timed out waiting for message")
        .unwrap();

        assert_eq!(received.subject, "wd.a.agent-1.sys.cpu");
        assert_eq!(received.payload, br#"{"usage":1.5}"#.to_vec());
    }

    #[tokio::test]
    async fn subject_filtering_works() {
        // Subscriber should only receive messages matching its prefix.
        let transport = Transport::tcp("127.0.0.1", 16701);

        let publisher = ZmqPublisher::bind(&transport).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let subscriber = ZmqSubscriber::connect(std::slice::from_ref(&transport))
            .await
            .unwrap();
        subscriber.subscribe("wd.a.agent-1.mbox").await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;

        publisher
            .publish("wd.a.agent-1.mbox", b"{}".to_vec())
            .await
            .unwrap();
        publisher
            .publish("wd.a.agent-2.mbox", b"{}".to_vec())
            .await
            .unwrap();

        let received = tokio::time::timeout(
            std::time::Duration::from_secs(2),
            subscriber.recv(),
        )
        .await
        .expect("timed out")
        .unwrap();
        assert_eq!(received.subject, "wd.a.agent-1.mbox");

        // The agent-2 message was filtered out.
        let timeout_result = tokio::time::timeout(
            std::time::Duration::from_millis(300),
            subscriber.recv(),
        )
        .await;
        assert!(timeout_result.is_err(), "should not receive filtered message");
    }

    #[tokio::test]
    async fn broker_roundtrip() {
        use crate::broker::{BrokerConfig, EventBroker};

        let broker_cfg = BrokerConfig::tcp("127.0.0.1", 16710, 16711, 16712);

        let broker_handle = tokio::spawn({
            let cfg = broker_cfg.clone();
            async move {
                let broker = EventBroker::new(cfg);
                broker.run().await
            }
        });
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;

        // Publisher connects to broker frontend, subscriber to backend.
        let publisher = ZmqPublisher::connect(&[Transport::tcp("127.0.0.1", 16710)])
            .await
            .unwrap();
        let subscriber = ZmqSubscriber::connect(&[Transport::tcp("127.0.0.1", 16711)])
            .await
            .unwrap();
        subscriber.subscribe("wd.a.").await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;

        publisher
            .publish("wd.a.agent-1.event.heartbeat", br#"{"agent_id":"agent-1"}"#.to_vec())
            .await
            .unwrap();

        let received = tokio::time::timeout(
            std::time::Duration::from_secs(3),
            subscriber.recv(),
        )
        .await
        .expect("timed out waiting for broker-forwarded message")
        .unwrap();

        assert_eq!(received.subject, "wd.a.agent-1.event.heartbeat");
        assert_eq!(received.payload, br#"{"agent_id":"agent-1"}"#.to_vec());

        broker_handle.abort();
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_message() {
        // PUB/SUB is fan-out: all subscribers get every matching message.
        let transport = Transport::tcp("127.0.0.1", 16720);

        let publisher = ZmqPublisher::bind(&transport).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let sub1 = ZmqSubscriber::connect(std::slice::from_ref(&transport))
            .await
            .unwrap();
        let sub2 = ZmqSubscriber::connect(std::slice::from_ref(&transport))
            .await
            .unwrap();
        sub1.subscribe("wd.a.").await.unwrap();
        sub2.subscribe("wd.a.").await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;

        publisher
            .publish("wd.a.agent-1.sys.load", b"{}".to_vec())
            .await
            .unwrap();

        let r1 = tokio::time::timeout(std::time::Duration::from_secs(2), sub1.recv())
            .await
            .expect("sub1 timed out")
            .unwrap();
        let r2 = tokio::time::timeout(std::time::Duration::from_secs(2), sub2.recv())
            .await
            .expect("sub2 timed out")
            .unwrap();

        assert_eq!(r1.subject, "wd.a.agent-1.sys.load");
        assert_eq!(r2.subject, "wd.a.agent-1.sys.load");
    }
}
