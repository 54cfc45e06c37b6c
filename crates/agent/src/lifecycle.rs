//! Agent lifecycle: boots the collector manager and executor, runs the
//! heartbeat and info-report side loops, and tears everything down in
//! reverse order under the shutdown budget.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use watchdog_bus::{
    EventPublisher, EventSubscriber, SubjectMap, ZmqPublisher, ZmqSubscriber,
};

use crate::collector::CollectorManager;
use crate::config::AgentConfig;
use crate::error::AgentError;
use crate::executor::ExecutorManager;
use crate::info::{self, Heartbeat};

struct SideTasks {
    stop_tx: Option<watch::Sender<bool>>,
    handles: Vec<JoinHandle<()>>,
}

/// The agent runtime.
///
/// Start order: bus client (at construction) → collector manager →
/// executor manager → side loops. `stop` reverses it; the caller bounds
/// the whole teardown with [`AgentConfig::shutdown_timeout`].
pub struct Agent {
    config: AgentConfig,
    subjects: SubjectMap,
    publisher: Arc<dyn EventPublisher>,
    collectors: CollectorManager,
    executor: ExecutorManager,
    side_tasks: Mutex<SideTasks>,
    started_at: i64,
}

impl Agent {
    /// Build an agent over an already-connected bus client pair.
    pub fn with_bus(
        config: AgentConfig,
        publisher: Arc<dyn EventPublisher>,
        subscriber: Arc<dyn EventSubscriber>,
    ) -> Result<Self, AgentError> {
        config.validate()?;
        let subjects = SubjectMap::new(&config.collector.subject_prefix, &config.agent.id)?;
        let collectors =
            CollectorManager::new(&config.collector, &config.agent.id, publisher.clone())?;
        let executor = ExecutorManager::new(subjects.clone(), publisher.clone(), subscriber);

        Ok(Self {
            config,
            subjects,
            publisher,
            collectors,
            executor,
            side_tasks: Mutex::new(SideTasks {
                stop_tx: None,
                handles: Vec::new(),
            }),
            started_at: Utc::now().timestamp_millis(),
        })
    }

    /// Connect the ZeroMQ bus clients from config and build the agent.
    pub async fn connect(config: AgentConfig) -> Result<Self, AgentError> {
        let publisher: Arc<dyn EventPublisher> =
            Arc::new(ZmqPublisher::connect(&config.bus.publish_transports()?).await?);
        let subscriber: Arc<dyn EventSubscriber> =
            Arc::new(ZmqSubscriber::connect(&config.bus.subscribe_transports()?).await?);
        Self::with_bus(config, publisher, subscriber)
    }

    pub fn agent_id(&self) -> &str {
        &self.config.agent.id
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Boot collectors, the executor, and the side loops.
    ///
    /// Errors are fatal: the caller should `stop` (best-effort) and exit.
    pub async fn start(&self) -> Result<(), AgentError> {
        let mut side = self.side_tasks.lock().await;
        if side.stop_tx.is_some() {
            return Err(AgentError::AlreadyRunning("agent"));
        }

        info!(agent_id = %self.config.agent.id, "starting agent");

        self.collectors.start().await?;
        self.executor.start().await?;

        let (stop_tx, stop_rx) = watch::channel(false);
        side.handles.push(self.spawn_heartbeat_loop(stop_rx.clone()));
        side.handles.push(self.spawn_info_loop(stop_rx));
        side.stop_tx = Some(stop_tx);

        info!(agent_id = %self.config.agent.id, "agent started");
        Ok(())
    }

    /// Tear down in reverse start order: side loops, executor (draining
    /// in-flight commands), then collectors. Errors are accumulated; the
    /// first one is returned after teardown completes.
    pub async fn stop(&self) -> Result<(), AgentError> {
        info!(agent_id = %self.config.agent.id, "stopping agent");
        let mut first_error: Option<AgentError> = None;

        let mut side = self.side_tasks.lock().await;
        if let Some(stop_tx) = side.stop_tx.take() {
            let _ = stop_tx.send(true);
        }
        for handle in side.handles.drain(..) {
            if let Err(e) = handle.await {
                warn!(error = %e, "side task failed during stop");
                first_error.get_or_insert(AgentError::TaskFailed(e.to_string()));
            }
        }

        if let Err(e) = self.executor.stop().await {
            warn!(error = %e, "executor stop failed");
            first_error.get_or_insert(e);
        }
        if let Err(e) = self.collectors.stop().await {
            warn!(error = %e, "collector stop failed");
            first_error.get_or_insert(e);
        }

        info!(agent_id = %self.config.agent.id, "agent stopped");
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// First unhealthy collector's error, if any.
    pub fn health(&self) -> Result<(), AgentError> {
        self.collectors.health()
    }

    fn spawn_heartbeat_loop(&self, mut stop_rx: watch::Receiver<bool>) -> JoinHandle<()> {
        let publisher = self.publisher.clone();
        let subject = self.subjects.heartbeat();
        let agent_id = self.config.agent.id.clone();
        let interval = self.config.heartbeat_interval();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let beat = Heartbeat::new(&agent_id);
                        match serde_json::to_vec(&beat) {
                            Ok(bytes) => {
                                if let Err(e) = publisher.publish(&subject, bytes).await {
                                    warn!(error = %e, "failed to publish heartbeat");
                                }
                            }
                            Err(e) => warn!(error = %e, "failed to encode heartbeat"),
                        }
                    }
                    _ = stop_rx.changed() => break,
                }
            }
        })
    }

    fn spawn_info_loop(&self, mut stop_rx: watch::Receiver<bool>) -> JoinHandle<()> {
        let publisher = self.publisher.clone();
        let subject = self.subjects.info();
        let config = self.config.clone();
        let interval = self.config.info_report_interval();
        let started_at = self.started_at;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let report = info::collect(&config, started_at);
                        match serde_json::to_vec(&report) {
                            Ok(bytes) => {
                                if let Err(e) = publisher.publish(&subject, bytes).await {
                                    warn!(error = %e, "failed to publish info report");
                                }
                            }
                            Err(e) => warn!(error = %e, "failed to encode info report"),
                        }
                    }
                    _ = stop_rx.changed() => break,
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use watchdog_bus::{BusError, BusMessage};

    use crate::executor::CommandResult;
    use crate::info::AgentInfo;

    struct MockPublisher {
        messages: Mutex<Vec<(String, Vec<u8>)>>,
        fail: AtomicBool,
    }

    impl MockPublisher {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                messages: Mutex::new(Vec::new()),
                fail: AtomicBool::new(false),
            })
        }

        async fn on_subject(&self, subject: &str) -> Vec<Vec<u8>> {
            self.messages
                .lock()
                .await
                .iter()
                .filter(|(s, _)| s == subject)
                .map(|(_, p)| p.clone())
                .collect()
        }
    }

    #[async_trait]
    impl EventPublisher for MockPublisher {
        async fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<(), BusError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(BusError::Transport("connection lost".into()));
            }
            self.messages
                .lock()
                .await
                .push((subject.to_string(), payload));
            Ok(())
        }
    }

    struct MockSubscriber {
        rx: Mutex<tokio::sync::mpsc::UnboundedReceiver<BusMessage>>,
    }

    impl MockSubscriber {
        fn new() -> (Arc<Self>, tokio::sync::mpsc::UnboundedSender<BusMessage>) {
            let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
            (Arc::new(Self { rx: Mutex::new(rx) }), tx)
        }
    }

    #[async_trait]
    impl EventSubscriber for MockSubscriber {
        async fn subscribe(&self, _subject_prefix: &str) -> Result<(), BusError> {
            Ok(())
        }

        async fn unsubscribe(&self, _subject_prefix: &str) -> Result<(), BusError> {
            Ok(())
        }

        async fn recv(&self) -> Result<BusMessage, BusError> {
            let mut rx = self.rx.lock().await;
            match rx.recv().await {
                Some(msg) => Ok(msg),
                None => std::future::pending().await,
            }
        }
    }

    /// Config with collectors disabled except uptime so tests stay light.
    fn test_config() -> AgentConfig {
        AgentConfig::from_yaml(
            r#"
agent:
  id: agent-1
  heartbeat_interval: 1
  info_report_interval: 600
collector:
  cpu: { enabled: false }
  memory: { enabled: false }
  disk: { enabled: false }
  network: { enabled: false }
  load: { enabled: false }
  uptime: { enabled: true, interval: 1 }
"#,
        )
        .unwrap()
    }

    fn test_agent(
        publisher: Arc<MockPublisher>,
    ) -> (Agent, tokio::sync::mpsc::UnboundedSender<BusMessage>) {
        let (subscriber, tx) = MockSubscriber::new();
        let agent = Agent::with_bus(test_config(), publisher, subscriber).unwrap();
        (agent, tx)
    }

    #[tokio::test]
    async fn start_publishes_heartbeat_info_and_metrics() {
        let publisher = MockPublisher::new();
        let (agent, _tx) = test_agent(publisher.clone());

        agent.start().await.unwrap();
        // First heartbeat, info report, and warm-fill ticks are immediate.
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        agent.stop().await.unwrap();

        let beats = publisher.on_subject("wd.a.agent-1.event.heartbeat").await;
        assert!(!beats.is_empty(), "expected an immediate heartbeat");
        let beat: Heartbeat = serde_json::from_slice(&beats[0]).unwrap();
        assert_eq!(beat.agent_id, "agent-1");

        let infos = publisher.on_subject("wd.a.agent-1.sys.info").await;
        assert_eq!(infos.len(), 1, "info report fires once immediately");
        let report: AgentInfo = serde_json::from_slice(&infos[0]).unwrap();
        assert_eq!(report.agent_id, "agent-1");
        assert_eq!(report.collector_intervals.get("uptime"), Some(&1));

        assert!(
            !publisher.on_subject("wd.a.agent-1.sys.uptime").await.is_empty(),
            "uptime collector warm fill"
        );
    }

    #[tokio::test]
    async fn commands_flow_end_to_end() {
        let publisher = MockPublisher::new();
        let (agent, tx) = test_agent(publisher.clone());
        agent.start().await.unwrap();

        tx.send(BusMessage {
            subject: "wd.a.agent-1.mbox".into(),
            payload: br#"{"id":"c1","type":"shell","command":"echo hi"}"#.to_vec(),
        })
        .unwrap();

        let mut result: Option<CommandResult> = None;
        for _ in 0..50 {
            let messages = publisher
                .on_subject("wd.a.agent-1.exec.shell.c1.result")
                .await;
            if let Some(payload) = messages.first() {
                result = Some(serde_json::from_slice(payload).unwrap());
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        let result = result.expect("no command result observed");
        assert!(result.success);
        assert_eq!(result.stdout, "hi\n");

        agent.stop().await.unwrap();
    }

    #[tokio::test]
    async fn stop_halts_all_publishing() {
        let publisher = MockPublisher::new();
        let (agent, _tx) = test_agent(publisher.clone());

        agent.start().await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        agent.stop().await.unwrap();

        let count_after_stop = publisher.messages.lock().await.len();
        tokio::time::sleep(std::time::Duration::from_millis(300)).await;
        assert_eq!(
            publisher.messages.lock().await.len(),
            count_after_stop,
            "nothing may publish after stop"
        );
    }

    #[tokio::test]
    async fn start_twice_is_an_error() {
        let publisher = MockPublisher::new();
        let (agent, _tx) = test_agent(publisher);

        agent.start().await.unwrap();
        assert!(matches!(
            agent.start().await,
            Err(AgentError::AlreadyRunning(_))
        ));
        agent.stop().await.unwrap();
    }

    #[tokio::test]
    async fn stop_without_start_is_safe() {
        let publisher = MockPublisher::new();
        let (agent, _tx) = test_agent(publisher);
        agent.stop().await.unwrap();
    }

    #[tokio::test]
    async fn restart_after_stop_works() {
        let publisher = MockPublisher::new();
        let (agent, _tx) = test_agent(publisher.clone());

        agent.start().await.unwrap();
        agent.stop().await.unwrap();

        agent.start().await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        agent.stop().await.unwrap();

        assert!(
            publisher
                .on_subject("wd.a.agent-1.event.heartbeat")
                .await
                .len()
                >= 2,
            "heartbeats from both runs"
        );
    }

    #[tokio::test]
    async fn health_tracks_collectors() {
        let publisher = MockPublisher::new();
        let (agent, _tx) = test_agent(publisher.clone());

        agent.start().await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        assert!(agent.health().is_ok());

        // Bus outage degrades the uptime collector within one interval.
        publisher.fail.store(true, Ordering::SeqCst);
        tokio::time::sleep(std::time::Duration::from_millis(1200)).await;
        assert!(agent.health().is_err());

        publisher.fail.store(false, Ordering::SeqCst);
        tokio::time::sleep(std::time::Duration::from_millis(1200)).await;
        assert!(agent.health().is_ok());

        agent.stop().await.unwrap();
    }

    #[test]
    fn rejects_invalid_config() {
        let publisher = MockPublisher::new();
        let (subscriber, _tx) = MockSubscriber::new();
        let mut config = test_config();
        config.agent.id = "bad id".into();
        assert!(Agent::with_bus(config, publisher, subscriber).is_err());
    }
}
