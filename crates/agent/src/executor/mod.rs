//! Remote command execution.
//!
//! The [`ExecutorManager`] owns the agent's single subscription (the
//! mailbox), decodes incoming [`Command`]s, dispatches them to the first
//! matching [`CommandHandler`], and publishes each [`CommandResult`] on
//! the command's result subject. The bus owns durability: publish
//! failures are logged, never queued or retried.

pub mod command;
mod process;
pub mod script;
pub mod shell;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

use watchdog_bus::{EventPublisher, EventSubscriber, SubjectMap};

use crate::error::AgentError;
use crate::info::Diagnostic;

pub use command::{Command, CommandResult, CommandType};
pub use script::ScriptHandler;
pub use shell::ShellHandler;

/// A registered command executor.
///
/// Handlers are consulted in registration order; the first one whose
/// `can_handle` returns true wins. Execution never returns an error —
/// every outcome, including rejection, is a [`CommandResult`].
#[async_trait]
pub trait CommandHandler: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Whether this handler accepts the command.
    fn can_handle(&self, command: &Command) -> bool;

    /// Run the command to completion and describe the outcome.
    async fn execute(&self, command: &Command) -> CommandResult;
}

/// Subscribes to the agent mailbox and runs commands.
pub struct ExecutorManager {
    subjects: SubjectMap,
    publisher: Arc<dyn EventPublisher>,
    subscriber: Arc<dyn EventSubscriber>,
    handlers: Arc<Vec<Arc<dyn CommandHandler>>>,
    shutdown: Arc<Notify>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl ExecutorManager {
    /// Executor with the stock handler registry: shell, then script.
    pub fn new(
        subjects: SubjectMap,
        publisher: Arc<dyn EventPublisher>,
        subscriber: Arc<dyn EventSubscriber>,
    ) -> Self {
        Self::with_handlers(
            subjects,
            publisher,
            subscriber,
            vec![Arc::new(ShellHandler::new()), Arc::new(ScriptHandler)],
        )
    }

    /// Executor with an explicit handler registry (registration order is
    /// dispatch order).
    pub fn with_handlers(
        subjects: SubjectMap,
        publisher: Arc<dyn EventPublisher>,
        subscriber: Arc<dyn EventSubscriber>,
        handlers: Vec<Arc<dyn CommandHandler>>,
    ) -> Self {
        Self {
            subjects,
            publisher,
            subscriber,
            handlers: Arc::new(handlers),
            shutdown: Arc::new(Notify::new()),
            handle: Mutex::new(None),
        }
    }

    /// Subscribe to the mailbox and spawn the receive loop.
    ///
    /// Errors if already running, or if the subscription itself fails —
    /// the latter is fatal and bubbles up to the agent's `start`.
    pub async fn start(&self) -> Result<(), AgentError> {
        let mut guard = self.handle.lock().await;
        if guard.is_some() {
            return Err(AgentError::AlreadyRunning("executor"));
        }

        let mailbox = self.subjects.mailbox();
        self.subscriber.subscribe(&mailbox).await?;
        info!(mailbox = %mailbox, "executor subscribed to mailbox");

        let subjects = self.subjects.clone();
        let publisher = self.publisher.clone();
        let subscriber = self.subscriber.clone();
        let handlers = self.handlers.clone();
        let shutdown = self.shutdown.clone();
        *guard = Some(tokio::spawn(async move {
            Self::recv_loop(subjects, publisher, subscriber, handlers, shutdown).await;
        }));
        Ok(())
    }

    /// Stop accepting commands, drain in-flight executions, then drop the
    /// mailbox subscription.
    ///
    /// Safe to call when not running. The caller bounds the drain with the
    /// agent's shutdown budget. Errors are accumulated; the first is
    /// returned after teardown completes.
    pub async fn stop(&self) -> Result<(), AgentError> {
        let handle = self.handle.lock().await.take();
        let Some(handle) = handle else {
            return Ok(());
        };

        let mut first_error: Option<AgentError> = None;
        self.shutdown.notify_one();
        if let Err(e) = handle.await {
            first_error = Some(AgentError::TaskFailed(format!("executor: {e}")));
        }
        if let Err(e) = self.subscriber.unsubscribe(&self.subjects.mailbox()).await {
            warn!(error = %e, "mailbox unsubscribe failed");
            first_error.get_or_insert(AgentError::Bus(e));
        }
        info!("executor stopped");
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn recv_loop(
        subjects: SubjectMap,
        publisher: Arc<dyn EventPublisher>,
        subscriber: Arc<dyn EventSubscriber>,
        handlers: Arc<Vec<Arc<dyn CommandHandler>>>,
        shutdown: Arc<Notify>,
    ) {
        let mut in_flight = JoinSet::new();

        loop {
            tokio::select! {
                _ = shutdown.notified() => break,
                // Reap finished command tasks so the set stays bounded.
                Some(_) = in_flight.join_next(), if !in_flight.is_empty() => {}
                received = subscriber.recv() => match received {
                    Ok(msg) => {
                        let subjects = subjects.clone();
                        let publisher = publisher.clone();
                        let handlers = handlers.clone();
                        in_flight.spawn(async move {
                            Self::handle_message(&msg.payload, &subjects, &publisher, &handlers)
                                .await;
                        });
                    }
                    Err(e) => {
                        warn!(error = %e, "mailbox receive failed");
                        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
                    }
                },
            }
        }

        // Drain: no new commands are accepted, but commands already running
        // finish and publish their results.
        while in_flight.join_next().await.is_some() {}
    }

    async fn handle_message(
        payload: &[u8],
        subjects: &SubjectMap,
        publisher: &Arc<dyn EventPublisher>,
        handlers: &[Arc<dyn CommandHandler>],
    ) {
        // Malformed mailbox messages are dropped: there is no id to
        // correlate a result to, so senders must retry well-formed.
        let command: Command = match serde_json::from_slice(payload) {
            Ok(command) => command,
            Err(e) => {
                warn!(error = %e, "dropping malformed mailbox message");
                return;
            }
        };

        let result = match handlers.iter().find(|h| h.can_handle(&command)) {
            Some(handler) => {
                debug!(id = %command.id, handler = handler.name(), "dispatching command");
                handler.execute(&command).await
            }
            None => CommandResult::rejected(
                &command,
                format!("unsupported command type: {}", command.command_type),
            ),
        };

        let subject = subjects.exec_result(command.command_type.as_str(), &command.id);
        Self::publish_result(subjects, publisher, &subject, &result).await;
    }

    /// Publish a result exactly once, best-effort. Failures are logged and
    /// mirrored onto the error diagnostics subject.
    async fn publish_result(
        subjects: &SubjectMap,
        publisher: &Arc<dyn EventPublisher>,
        subject: &str,
        result: &CommandResult,
    ) {
        let payload = match serde_json::to_vec(result) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(id = %result.id, error = %e, "failed to encode command result");
                return;
            }
        };

        if let Err(e) = publisher.publish(subject, payload).await {
            warn!(id = %result.id, subject = %subject, error = %e, "failed to publish command result");
            let diag = Diagnostic::new(
                subjects.agent_id(),
                "executor",
                format!("result publish failed for command {}: {e}", result.id),
            );
            if let Ok(bytes) = serde_json::to_vec(&diag) {
                // Non-recursive: a failed diagnostic publish is only logged.
                if let Err(e) = publisher.publish(&subjects.error(), bytes).await {
                    warn!(error = %e, "failed to publish diagnostic");
                }
            }
        } else {
            debug!(id = %result.id, subject = %subject, success = result.success, "published command result");
        }
    }
}
