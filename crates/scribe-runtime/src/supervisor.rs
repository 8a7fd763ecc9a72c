//! Supervisor running one task per integration.
//!
//! Each integration runs in its own Tokio task with its own state machine:
//!
//! ```text
//! Starting -> Running <-> Backoff
//! Running -> Restarting -> Starting      (unexpected error or panic)
//! Running/Backoff -> Failed              (fatal error, restart budget spent)
//! any -> Stopped                         (shutdown)
//! ```
//!
//! Failures never cross task boundaries: a failed integration leaves its
//! siblings running.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::{broadcast, watch, RwLock};
use tokio::task::JoinSet;
use tokio::time::{sleep_until, timeout, Instant};
use tracing::{debug, error, info, warn};

use crate::backoff::{exponential, BackoffPolicy};
use crate::config::SupervisorConfig;
use crate::error::{Result, RuntimeError};
use crate::event::SupervisorEvent;
use crate::task::{CycleError, Integration, IntegrationFactory, TaskState};

type StateMap = Arc<RwLock<HashMap<String, TaskState>>>;

/// Supervises integration tasks.
pub struct BotSupervisor {
    config: SupervisorConfig,
    pending: Vec<(String, IntegrationFactory)>,
    states: StateMap,
    event_tx: broadcast::Sender<SupervisorEvent>,
    shutdown_tx: watch::Sender<bool>,
    tasks: JoinSet<()>,
    started: bool,
}

impl BotSupervisor {
    /// Creates a supervisor with no integrations.
    pub fn new(config: SupervisorConfig) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        let (shutdown_tx, _) = watch::channel(false);

        Self {
            config,
            pending: Vec::new(),
            states: Arc::new(RwLock::new(HashMap::new())),
            event_tx,
            shutdown_tx,
            tasks: JoinSet::new(),
            started: false,
        }
    }

    /// Registers an integration to run once the supervisor starts.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> Result<()>
    where
        F: Fn() -> std::result::Result<Box<dyn Integration>, CycleError> + Send + Sync + 'static,
    {
        if self.started {
            return Err(RuntimeError::AlreadyStarted);
        }
        let name = name.into();
        if self.pending.iter().any(|(n, _)| *n == name) {
            return Err(RuntimeError::DuplicateTask(name));
        }
        self.pending.push((name, Box::new(factory)));
        Ok(())
    }

    /// Subscribes to supervisor events.
    pub fn subscribe(&self) -> broadcast::Receiver<SupervisorEvent> {
        self.event_tx.subscribe()
    }

    /// Spawns one task per registered integration.
    pub async fn start(&mut self) -> Result<()> {
        if self.started {
            return Err(RuntimeError::AlreadyStarted);
        }
        if self.pending.is_empty() {
            return Err(RuntimeError::NoTasks);
        }

        for (name, factory) in self.pending.drain(..) {
            self.states
                .write()
                .await
                .insert(name.clone(), TaskState::Starting);

            let runner = TaskRunner {
                name,
                factory,
                config: self.config.clone(),
                states: Arc::clone(&self.states),
                event_tx: self.event_tx.clone(),
                shutdown: self.shutdown_tx.subscribe(),
            };
            info!(task = %runner.name, "Starting integration");
            self.tasks.spawn(runner.run());
        }

        self.started = true;
        Ok(())
    }

    /// Runs until every task has ended or `signal` resolves, then shuts down.
    pub async fn run_until<F>(&mut self, signal: F) -> Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        if !self.started {
            self.start().await?;
        }
        tokio::pin!(signal);

        loop {
            tokio::select! {
                _ = &mut signal => {
                    info!("Shutdown requested");
                    return self.shutdown().await;
                }
                joined = self.tasks.join_next() => match joined {
                    None => {
                        info!("All integrations have ended");
                        return Ok(());
                    }
                    Some(Err(e)) => error!(error = %e, "Integration task aborted"),
                    Some(Ok(())) => {}
                },
            }
        }
    }

    /// Signals shutdown and waits for every task to stop.
    ///
    /// In-flight cycles get the configured grace period and are then
    /// dropped.
    pub async fn shutdown(&mut self) -> Result<()> {
        if !self.started {
            return Err(RuntimeError::NotStarted);
        }
        let _ = self.shutdown_tx.send(true);

        while let Some(joined) = self.tasks.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Integration task aborted during shutdown");
            }
        }
        info!("Supervisor stopped");
        Ok(())
    }

    /// Current state of one task.
    pub async fn state(&self, name: &str) -> Option<TaskState> {
        self.states.read().await.get(name).cloned()
    }

    /// Snapshot of every task's state.
    pub async fn states(&self) -> HashMap<String, TaskState> {
        self.states.read().await.clone()
    }

    /// Returns true if there are tasks and all of them failed.
    pub async fn all_failed(&self) -> bool {
        let states = self.states.read().await;
        !states.is_empty() && states.values().all(TaskState::is_failed)
    }
}

impl Drop for BotSupervisor {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
    }
}

enum CycleOutcome {
    Finished(std::result::Result<(), CycleError>),
    Panicked(String),
    /// Shutdown arrived and the grace period ran out.
    Cancelled,
}

/// What the task loop does after handling a restart.
enum Next {
    Rebuild,
    Exit,
}

struct TaskRunner {
    name: String,
    factory: IntegrationFactory,
    config: SupervisorConfig,
    states: StateMap,
    event_tx: broadcast::Sender<SupervisorEvent>,
    shutdown: watch::Receiver<bool>,
}

impl TaskRunner {
    async fn run(mut self) {
        let mut restarts: u32 = 0;
        let mut backoff = BackoffPolicy::new(self.config.backoff_base, self.config.backoff_max);

        'build: loop {
            if self.shutdown_requested() {
                break;
            }
            self.set_state(TaskState::Starting).await;

            let mut integration = match (self.factory)() {
                Ok(integration) => integration,
                Err(CycleError::Fatal(reason)) => {
                    self.fail(reason).await;
                    return;
                }
                Err(e) => match self.restart(&mut restarts, e.to_string()).await {
                    Next::Rebuild => continue 'build,
                    Next::Exit => return,
                },
            };
            self.set_state(TaskState::Running).await;

            loop {
                if self.shutdown_requested() {
                    break 'build;
                }

                match self.run_cycle(integration.as_mut()).await {
                    CycleOutcome::Finished(Ok(())) => {
                        restarts = 0;
                        backoff.reset();
                        let _ = self.event_tx.send(SupervisorEvent::CycleCompleted {
                            task: self.name.clone(),
                        });
                        if self.sleep(Instant::now() + integration.poll_interval()).await {
                            break 'build;
                        }
                    }
                    CycleOutcome::Finished(Err(CycleError::RateLimited { reason, reset_at })) => {
                        let retry_at = backoff.next_retry_at(Instant::now(), reset_at);
                        warn!(
                            task = %self.name,
                            reason = %reason,
                            wait_secs = retry_at.saturating_duration_since(Instant::now()).as_secs(),
                            "Rate limited, backing off"
                        );
                        self.set_state(TaskState::Backoff { reason, retry_at }).await;
                        if self.sleep(retry_at).await {
                            break 'build;
                        }
                        self.set_state(TaskState::Running).await;
                    }
                    CycleOutcome::Finished(Err(CycleError::Transient(reason))) => {
                        warn!(task = %self.name, reason = %reason, "Cycle failed, retrying next cycle");
                        self.report_failure(&reason);
                        if self.sleep(Instant::now() + integration.poll_interval()).await {
                            break 'build;
                        }
                    }
                    CycleOutcome::Finished(Err(CycleError::Fatal(reason))) => {
                        self.report_failure(&reason);
                        self.fail(reason).await;
                        return;
                    }
                    CycleOutcome::Finished(Err(CycleError::Unexpected(reason))) => {
                        error!(task = %self.name, reason = %reason, "Cycle crashed");
                        self.report_failure(&reason);
                        drop(integration);
                        match self.restart(&mut restarts, reason).await {
                            Next::Rebuild => continue 'build,
                            Next::Exit => return,
                        }
                    }
                    CycleOutcome::Panicked(message) => {
                        error!(task = %self.name, panic = %message, "Cycle panicked");
                        self.report_failure(&message);
                        drop(integration);
                        match self.restart(&mut restarts, message).await {
                            Next::Rebuild => continue 'build,
                            Next::Exit => return,
                        }
                    }
                    CycleOutcome::Cancelled => {
                        warn!(task = %self.name, "In-flight cycle dropped after grace period");
                        break 'build;
                    }
                }
            }
        }

        self.set_state(TaskState::Stopped).await;
        info!(task = %self.name, "Integration stopped");
    }

    /// Runs one cycle, catching panics and honoring the shutdown grace period.
    async fn run_cycle(&mut self, integration: &mut dyn Integration) -> CycleOutcome {
        let cycle = AssertUnwindSafe(integration.poll_cycle()).catch_unwind();
        tokio::pin!(cycle);

        let result = tokio::select! {
            result = &mut cycle => result,
            _ = wait_for_shutdown(&mut self.shutdown) => {
                debug!(task = %self.name, grace = ?self.config.shutdown_grace, "Waiting for in-flight cycle");
                match timeout(self.config.shutdown_grace, &mut cycle).await {
                    Ok(result) => result,
                    Err(_) => return CycleOutcome::Cancelled,
                }
            }
        };

        match result {
            Ok(result) => CycleOutcome::Finished(result),
            Err(payload) => CycleOutcome::Panicked(panic_message(payload.as_ref())),
        }
    }

    /// Counts a restart and waits before rebuilding.
    async fn restart(&mut self, restarts: &mut u32, reason: String) -> Next {
        *restarts += 1;
        if *restarts > self.config.max_restarts {
            self.fail(format!(
                "restart budget of {} exhausted: {}",
                self.config.max_restarts, reason
            ))
            .await;
            return Next::Exit;
        }

        let delay = exponential(
            self.config.restart_base_delay,
            *restarts - 1,
            self.config.restart_max_delay,
        );
        warn!(task = %self.name, attempt = *restarts, delay_secs = delay.as_secs(), "Restarting integration");
        self.set_state(TaskState::Restarting { attempt: *restarts }).await;

        if self.sleep(Instant::now() + delay).await {
            self.set_state(TaskState::Stopped).await;
            return Next::Exit;
        }
        Next::Rebuild
    }

    async fn fail(&self, reason: String) {
        error!(task = %self.name, reason = %reason, "Integration failed");
        self.set_state(TaskState::Failed { reason }).await;
    }

    /// Sleeps until `deadline`. Returns true if shutdown interrupted it.
    async fn sleep(&mut self, deadline: Instant) -> bool {
        tokio::select! {
            _ = sleep_until(deadline) => false,
            _ = wait_for_shutdown(&mut self.shutdown) => true,
        }
    }

    fn shutdown_requested(&self) -> bool {
        *self.shutdown.borrow()
    }

    fn report_failure(&self, error: &str) {
        let _ = self.event_tx.send(SupervisorEvent::CycleFailed {
            task: self.name.clone(),
            error: error.to_string(),
        });
    }

    async fn set_state(&self, state: TaskState) {
        {
            let mut states = self.states.write().await;
            if states.get(&self.name) == Some(&state) {
                return;
            }
            states.insert(self.name.clone(), state.clone());
        }
        debug!(task = %self.name, state = %state, "Task state changed");
        let _ = self.event_tx.send(SupervisorEvent::StateChanged {
            task: self.name.clone(),
            state,
        });
    }
}

/// Resolves once shutdown is signalled or the supervisor is gone.
async fn wait_for_shutdown(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow() {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
