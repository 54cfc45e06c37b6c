use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;
use zeromq::prelude::*;
use zeromq::{PubSocket, RepSocket, SubSocket, ZmqMessage};

use crate::error::BusError;
use crate::transport::Transport;

/// Counters collected by the broker during message proxying.
#[derive(Debug)]
pub struct BrokerMetrics {
    /// Total messages forwarded through the proxy.
    pub total_messages: AtomicU64,
    /// Per-subject message counts.
    pub subject_counts: Mutex<HashMap<String, u64>>,
}

impl BrokerMetrics {
    fn new() -> Self {
        Self {
            total_messages: AtomicU64::new(0),
            subject_counts: Mutex::new(HashMap::new()),
        }
    }

    /// Snapshot of total forwarded messages.
    pub fn total(&self) -> u64 {
        self.total_messages.load(Ordering::Relaxed)
    }
}

/// Configuration for the event broker.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Frontend endpoint where agents publish (broker binds SUB here).
    pub frontend: Transport,
    /// Backend endpoint where consumers subscribe (broker binds PUB here).
    pub backend: Transport,
    /// Health check endpoint (REP socket for liveness probes).
    pub health: Transport,
}

impl BrokerConfig {
    /// Create a local IPC broker configuration.
    pub fn local() -> Self {
        Self {
            frontend: Transport::ipc("broker-frontend"),
            backend: Transport::ipc("broker-backend"),
            health: Transport::ipc("broker-health"),
        }
    }

    /// Create a TCP broker configuration.
    pub fn tcp(host: &str, frontend_port: u16, backend_port: u16, health_port: u16) -> Self {
        Self {
            frontend: Transport::tcp(host, frontend_port),
            backend: Transport::tcp(host, backend_port),
            health: Transport::tcp(host, health_port),
        }
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self::local()
    }
}

/// XPUB/XSUB-style event broker using PUB/SUB as the underlying transport.
///
/// The broker is the rendezvous point between agents and consumers:
/// - Agents connect their PUB sockets to the **frontend** (SUB socket the broker binds).
/// - Consumers connect their SUB sockets to the **backend** (PUB socket the broker binds).
/// - Messages received on the frontend are forwarded to the backend unchanged.
///
/// Since `zeromq` 0.4 does not provide XPUB/XSUB socket types, the proxy
/// pattern is emulated with PUB+SUB. The broker subscribes to all subjects ("").
pub struct EventBroker {
    config: BrokerConfig,
    metrics: Arc<BrokerMetrics>,
    shutdown: Arc<AtomicBool>,
}

impl EventBroker {
    /// Create a new broker with the given configuration.
    pub fn new(config: BrokerConfig) -> Self {
        Self {
            config,
            metrics: Arc::new(BrokerMetrics::new()),
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Access the broker's forwarding counters.
    pub fn metrics(&self) -> &Arc<BrokerMetrics> {
        &self.metrics
    }

    /// Signal the broker to shut down gracefully.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Run the broker proxy loop.
    ///
    /// Binds three sockets:
    /// 1. SUB (frontend) — receives from agents, subscribed to all subjects.
    /// 2. PUB (backend) — forwards to consumers.
    /// 3. REP (health) — responds to health check pings with "ok".
    ///
    /// Returns when shutdown is signaled or an unrecoverable bind error occurs.
    pub async fn run(&self) -> Result<(), BusError> {
        let mut frontend = SubSocket::new();
        frontend.bind(&self.config.frontend.endpoint()).await?;
        // Subscribe to all subjects so every message is forwarded.
        frontend.subscribe("").await?;

        tracing::info!(
            endpoint = %self.config.frontend.endpoint(),
            "broker frontend (SUB) bound — agents publish here"
        );

        let mut backend = PubSocket::new();
        backend.bind(&self.config.backend.endpoint()).await?;

        tracing::info!(
            endpoint = %self.config.backend.endpoint(),
            "broker backend (PUB) bound — subscribers connect here"
        );

        let mut health = RepSocket::new();
        health.bind(&self.config.health.endpoint()).await?;

        tracing::info!(
            endpoint = %self.config.health.endpoint(),
            "broker health check (REP) bound"
        );

        // Spawn health check responder in background.
        let shutdown_flag = self.shutdown.clone();
        tokio::spawn(async move {
            Self::health_loop(&mut health, &shutdown_flag).await;
        });

        let metrics = self.metrics.clone();
        let shutdown = self.shutdown.clone();

        tracing::info!("broker proxy loop started");

        loop {
            if shutdown.load(Ordering::SeqCst) {
                tracing::info!("broker shutting down");
                break;
            }

            // Use a timeout so the shutdown flag is checked periodically.
            let recv_result =
                tokio::time::timeout(std::time::Duration::from_millis(100), frontend.recv()).await;

            let msg = match recv_result {
                Ok(Ok(msg)) => msg,
                Ok(Err(e)) => {
                    tracing::warn!(error = %e, "frontend recv error");
                    continue;
                }
                Err(_) => {
                    // Timeout — loop back to check the shutdown flag.
                    continue;
                }
            };

            let subject = extract_subject(&msg);

            metrics.total_messages.fetch_add(1, Ordering::Relaxed);
            {
                let mut counts = metrics.subject_counts.lock().await;
                *counts.entry(subject.clone()).or_insert(0) += 1;
            }

            tracing::debug!(
                subject = %subject,
                total = metrics.total_messages.load(Ordering::Relaxed),
                "forwarding message"
            );

            if let Err(e) = backend.send(msg).await {
                tracing::warn!(error = %e, "backend send error");
            }
        }

        tracing::info!(
            total = metrics.total_messages.load(Ordering::Relaxed),
            "broker stopped"
        );

        Ok(())
    }

    /// Health check responder loop — replies "ok" to any request.
    async fn health_loop(health: &mut RepSocket, shutdown: &AtomicBool) {
        loop {
            if shutdown.load(Ordering::SeqCst) {
                break;
            }

            let recv_result =
                tokio::time::timeout(std::time::Duration::from_millis(500), health.recv()).await;

            match recv_result {
                Ok(Ok(_request)) => {
                    let reply: ZmqMessage = "ok".into();
                    if let Err(e) = health.send(reply).await {
                        tracing::warn!(error = %e, "health reply error");
                    }
                }
                Ok(Err(e)) => {
                    tracing::warn!(error = %e, "health recv error");
                }
                Err(_) => {
                    // Timeout, loop back.
                }
            }
        }
    }
}

/// Extract a subject string from the first frame of a ZMQ message.
///
/// In ZeroMQ PUB/SUB the first frame carries the subject prefix. Non-UTF-8
/// frames are rendered as hex so counters stay usable.
fn extract_subject(msg: &ZmqMessage) -> String {
    msg.iter()
        .next()
        .map(|frame| {
            String::from_utf8(frame.to_vec()).unwrap_or_else(|_| hex_encode(frame.as_ref()))
        })
        .unwrap_or_else(|| "<empty>".to_string())
}

/// Minimal hex encoding (avoids pulling in the `hex` crate).
fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
