//! Shutdown coordination.
//!
//! # Responsibilities
//! - Start every registered task with a shared [`CancellationToken`]
//! - Cancel the token on the first termination signal, on TTL expiry,
//!   when any task cancels it, or when a task returns or panics early
//! - Wait for all tasks to return; a second signal while waiting forces
//!   the process down
//!
//! # Design Decisions
//! - Tasks are registered before [`Coordinator::run`], which consumes the
//!   coordinator: nothing can join after shutdown has begun
//! - Signals arrive over a channel so tests can inject them
//! - The forced path returns [`ShutdownOutcome::Forced`]; exiting is left
//!   to the binary

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::lifecycle::signals::TermSignal;

type TaskFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;
type TaskFactory = Box<dyn FnOnce(CancellationToken) -> TaskFuture + Send + 'static>;

/// How the coordinator finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// Every task returned.
    Graceful,
    /// A second signal arrived before the tasks finished.
    Forced,
    /// Every task returned, but at least one of them panicked.
    Panicked,
}

impl ShutdownOutcome {
    pub fn exit_code(self) -> i32 {
        match self {
            ShutdownOutcome::Graceful => 0,
            ShutdownOutcome::Forced | ShutdownOutcome::Panicked => 1,
        }
    }
}

/// Owns the process-wide cancellation token and the set of long-running tasks.
pub struct Coordinator {
    token: CancellationToken,
    tasks: Vec<(&'static str, TaskFactory)>,
}

impl Coordinator {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            tasks: Vec::new(),
        }
    }

    /// Register a task. It is started by [`Coordinator::run`] and handed a
    /// clone of the shared token; it must return once the token is cancelled.
    pub fn register<F, Fut>(&mut self, name: &'static str, task: F)
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let factory: TaskFactory = Box::new(move |token| Box::pin(task(token)) as TaskFuture);
        self.tasks.push((name, factory));
    }

    /// Number of tasks registered so far.
    pub fn registered(&self) -> usize {
        self.tasks.len()
    }

    /// The shared token. Cancelling it starts shutdown.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Start all tasks and block until they are done.
    ///
    /// `ttl` of `None` (or zero) runs until a signal or a task cancels.
    pub async fn run(
        self,
        ttl: Option<Duration>,
        mut signals: mpsc::Receiver<TermSignal>,
    ) -> ShutdownOutcome {
        let token = self.token;

        if let Some(ttl) = ttl.filter(|d| !d.is_zero()) {
            let timer = token.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = tokio::time::sleep(ttl) => {
                        tracing::info!(ttl_secs = ttl.as_secs(), "TTL expired, shutting down");
                        timer.cancel();
                    }
                    _ = timer.cancelled() => {}
                }
            });
        }

        let mut running = JoinSet::new();
        for (name, factory) in self.tasks {
            let task = factory(token.clone());
            running.spawn(async move {
                task.await;
                name
            });
        }
        tracing::info!(tasks = running.len(), "Coordinator started");

        let mut panicked = false;
        tokio::select! {
            Some(signal) = signals.recv() => {
                tracing::info!(%signal, "Signal received, shutting down");
                token.cancel();
            }
            _ = token.cancelled() => {
                tracing::info!("Shutdown requested");
            }
            Some(joined) = running.join_next() => {
                match joined {
                    Ok(name) => tracing::warn!(task = name, "Task exited early, shutting down"),
                    Err(e) => {
                        panicked = true;
                        tracing::error!(error = %e, "Task panicked, shutting down");
                    }
                }
                token.cancel();
            }
        }

        loop {
            tokio::select! {
                Some(signal) = signals.recv() => {
                    tracing::warn!(
                        %signal,
                        remaining = running.len(),
                        "Second signal received, forcing exit"
                    );
                    running.abort_all();
                    return ShutdownOutcome::Forced;
                }
                joined = running.join_next() => match joined {
                    None if panicked => {
                        tracing::info!("All tasks stopped after a panic");
                        return ShutdownOutcome::Panicked;
                    }
                    None => {
                        tracing::info!("All tasks stopped");
                        return ShutdownOutcome::Graceful;
                    }
                    Some(Ok(name)) => {
                        tracing::debug!(task = name, remaining = running.len(), "Task stopped");
                    }
                    Some(Err(e)) => {
                        panicked = true;
                        tracing::error!(error = %e, remaining = running.len(), "Task panicked");
                    }
                },
            }
        }
    }
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::new()
    }
}
