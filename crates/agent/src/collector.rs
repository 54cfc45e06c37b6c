//! Periodic metric collection.
//!
//! One [`MetricCollector`] owns one sampler, one interval, and one subject.
//! The [`CollectorManager`] constructs a collector per enabled family and
//! fans out start/stop/health calls.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use watchdog_bus::{EventPublisher, SubjectMap};

use crate::config::CollectorSection;
use crate::error::AgentError;
use crate::info::Diagnostic;
use crate::metrics::{MetricFamily, MetricRecord};
use crate::samplers::{self, Sampler};

/// Hard cap on one collect→encode→publish cycle, independent of the
/// configured interval.
const TICK_BUDGET: Duration = Duration::from_secs(5);

struct Inner {
    family: MetricFamily,
    subject: String,
    warn_subject: String,
    interval: Duration,
    agent_id: String,
    sampler: Arc<dyn Sampler>,
    publisher: Arc<dyn EventPublisher>,
    last_success: AtomicBool,
    shutdown: Notify,
}

/// Periodically samples one metric family and publishes the record.
///
/// The first tick runs immediately at `start` (warm fill); subsequent ticks
/// follow a strict periodic timer. A slow tick does not stack: if a tick
/// overruns the interval, the next one runs at the next nominal boundary.
pub struct MetricCollector {
    inner: Arc<Inner>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl MetricCollector {
    pub fn new(
        family: MetricFamily,
        subject: String,
        warn_subject: String,
        interval: Duration,
        sampler: Arc<dyn Sampler>,
        publisher: Arc<dyn EventPublisher>,
        agent_id: &str,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                family,
                subject,
                warn_subject,
                interval,
                agent_id: agent_id.to_string(),
                sampler,
                publisher,
                // Healthy until the first failed tick.
                last_success: AtomicBool::new(true),
                shutdown: Notify::new(),
            }),
            handle: Mutex::new(None),
        }
    }

    pub fn family(&self) -> MetricFamily {
        self.inner.family
    }

    pub fn subject(&self) -> &str {
        &self.inner.subject
    }

    /// Spawn the tick loop. Errors if the collector is already running.
    pub async fn start(&self) -> Result<(), AgentError> {
        let mut guard = self.handle.lock().await;
        if guard.is_some() {
            return Err(AgentError::AlreadyRunning("collector"));
        }

        debug!(
            family = %self.inner.family,
            subject = %self.inner.subject,
            interval = ?self.inner.interval,
            "starting collector"
        );

        let inner = self.inner.clone();
        *guard = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(inner.interval);
            // No catch-up: an overrunning tick skips to the next boundary
            // instead of queueing missed ticks.
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => Self::tick(&inner).await,
                    _ = inner.shutdown.notified() => break,
                }
            }
        }));
        Ok(())
    }

    /// Signal the loop to exit and wait for the in-progress tick to unwind
    /// (bounded by the tick budget).
    pub async fn stop(&self) -> Result<(), AgentError> {
        if let Some(handle) = self.handle.lock().await.take() {
            self.inner.shutdown.notify_one();
            handle
                .await
                .map_err(|e| AgentError::TaskFailed(format!("collector {}: {e}", self.inner.family)))?;
        }
        Ok(())
    }

    /// `Ok` while the last tick succeeded; the collector recovers on the
    /// next successful tick after a failure.
    pub fn healthy(&self) -> Result<(), AgentError> {
        if self.inner.last_success.load(Ordering::Relaxed) {
            Ok(())
        } else {
            Err(AgentError::CollectorUnhealthy {
                family: self.inner.family,
            })
        }
    }

    async fn tick(inner: &Inner) {
        match tokio::time::timeout(TICK_BUDGET, Self::collect_and_publish(inner)).await {
            Ok(Ok(())) => {
                inner.last_success.store(true, Ordering::Relaxed);
            }
            Ok(Err(e)) => {
                warn!(family = %inner.family, error = %e, "collector tick failed");
                inner.last_success.store(false, Ordering::Relaxed);
                // Acquisition failures leave the bus reachable, so surface
                // them on the warn subject; bus failures would only fail
                // again here.
                if matches!(e, AgentError::Sample { .. }) {
                    let diag = Diagnostic::new(&inner.agent_id, "collector", e.to_string());
                    if let Ok(bytes) = serde_json::to_vec(&diag) {
                        if let Err(e) = inner.publisher.publish(&inner.warn_subject, bytes).await {
                            warn!(family = %inner.family, error = %e, "failed to publish diagnostic");
                        }
                    }
                }
            }
            Err(_) => {
                warn!(
                    family = %inner.family,
                    budget = ?TICK_BUDGET,
                    "collector tick exceeded budget"
                );
                inner.last_success.store(false, Ordering::Relaxed);
            }
        }
    }

    async fn collect_and_publish(inner: &Inner) -> Result<(), AgentError> {
        let values = inner.sampler.sample().await.map_err(|e| AgentError::Sample {
            family: inner.family,
            message: e.to_string(),
        })?;
        let record = MetricRecord::new(inner.family, &inner.agent_id, values);
        let payload = serde_json::to_vec(&record)?;
        inner.publisher.publish(&inner.subject, payload).await?;
        debug!(family = %inner.family, subject = %inner.subject, "published metric record");
        Ok(())
    }
}

/// Owns one collector per enabled metric family.
pub struct CollectorManager {
    collectors: Vec<MetricCollector>,
}

impl CollectorManager {
    /// Build collectors from config, in family registration order.
    pub fn new(
        config: &CollectorSection,
        agent_id: &str,
        publisher: Arc<dyn EventPublisher>,
    ) -> Result<Self, AgentError> {
        let subjects = SubjectMap::new(&config.subject_prefix, agent_id)?;
        let collectors = config
            .enabled_families()
            .into_iter()
            .map(|family| {
                MetricCollector::new(
                    family,
                    subjects.metric(&config.suffix(family)),
                    subjects.warn(),
                    config.interval(family),
                    samplers::default_sampler(family),
                    publisher.clone(),
                    agent_id,
                )
            })
            .collect();
        Ok(Self { collectors })
    }

    /// Build a manager around pre-constructed collectors (used by tests).
    pub fn with_collectors(collectors: Vec<MetricCollector>) -> Self {
        Self { collectors }
    }

    pub fn families(&self) -> Vec<MetricFamily> {
        self.collectors.iter().map(|c| c.family()).collect()
    }

    /// Start collectors in registration order. Returns on the first error;
    /// collectors already started keep running and the caller must `stop`.
    pub async fn start(&self) -> Result<(), AgentError> {
        for collector in &self.collectors {
            collector.start().await?;
        }
        Ok(())
    }

    /// Stop every collector. The first error is kept but the remainder are
    /// still stopped.
    pub async fn stop(&self) -> Result<(), AgentError> {
        let mut first_error = None;
        for collector in &self.collectors {
            if let Err(e) = collector.stop().await {
                warn!(family = %collector.family(), error = %e, "collector stop failed");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// First unhealthy collector's error, if any.
    pub fn health(&self) -> Result<(), AgentError> {
        for collector in &self.collectors {
            collector.healthy()?;
        }
        Ok(())
    }
}
