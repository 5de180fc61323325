//! The processor loop.
//!
//! # Responsibilities
//! - Own the interface's configuration file for the life of the process
//! - Write the `[Interface]` header once, then append one `[Peer]` per tick
//! - Enable the service at startup, restart it (debounced) after writes,
//!   disable it when a write fails
//! - Apply outstanding writes once more on shutdown

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio::sync::watch;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::observability::metrics;
use crate::processor::lock::InstanceLock;
use crate::processor::sink::{ConfigSink, SinkError};
use crate::processor::{PendingWrite, ProcessorError, ProcessorState};
use crate::service::ServiceController;
use crate::wireguard::conf::ServerInterface;

/// Processor tuning, resolved from configuration.
#[derive(Debug, Clone)]
pub struct ProcessorSettings {
    /// WireGuard interface name, e.g. `wg0`.
    pub interface: String,
    pub lock_path: PathBuf,
    /// How often the queue is polled (one write per tick).
    pub tick: Duration,
    /// Minimum time between two service restarts.
    pub restart_debounce: Duration,
}

/// Durable writer for admitted peers.
pub struct Processor {
    settings: ProcessorSettings,
    header: ServerInterface,
    queue: mpsc::Receiver<PendingWrite>,
    /// Only touched from the blocking pool.
    sink: Arc<Mutex<Box<dyn ConfigSink>>>,
    controller: Arc<dyn ServiceController>,
    state: watch::Sender<ProcessorState>,
}

impl Processor {
    pub fn new(
        settings: ProcessorSettings,
        header: ServerInterface,
        queue: mpsc::Receiver<PendingWrite>,
        sink: Box<dyn ConfigSink>,
        controller: Arc<dyn ServiceController>,
    ) -> Self {
        let (state, _) = watch::channel(ProcessorState::Starting);
        Self {
            settings,
            header,
            queue,
            sink: Arc::new(Mutex::new(sink)),
            controller,
            state,
        }
    }

    /// Observe state transitions.
    pub fn subscribe(&self) -> watch::Receiver<ProcessorState> {
        self.state.subscribe()
    }

    fn set_state(&self, next: ProcessorState) {
        tracing::info!(interface = %self.settings.interface, state = %next, "Processor state");
        self.state.send_replace(next);
    }

    /// Run until `token` is cancelled.
    ///
    /// Any error is fatal: the token is cancelled before returning so the
    /// rest of the process shuts down too.
    pub async fn run(mut self, token: CancellationToken) -> Result<(), ProcessorError> {
        let result = self.run_locked(&token).await;
        match &result {
            Ok(()) => self.set_state(ProcessorState::Stopped),
            Err(e) => {
                tracing::error!(interface = %self.settings.interface, error = %e, "Processor failed");
                self.set_state(ProcessorState::Failed);
                token.cancel();
            }
        }
        result
    }

    async fn run_locked(&mut self, token: &CancellationToken) -> Result<(), ProcessorError> {
        self.set_state(ProcessorState::Starting);

        // Dropped on every return below.
        let _lock = InstanceLock::try_acquire(&self.settings.lock_path)?;

        let header = self.header.to_string();
        self.with_sink(move |sink| sink.initialize(&header))
            .await
            .map_err(ProcessorError::Initialize)?;

        self.controller
            .enable_and_start(&self.settings.interface)
            .await
            .map_err(ProcessorError::Lifecycle)?;

        self.set_state(ProcessorState::Running);
        let mut unflushed = self.run_loop(token).await?;

        self.set_state(ProcessorState::Draining);
        // Accepted peers were promised to their clients: write what is still
        // queued before the final restart.
        self.queue.close();
        while let Ok(write) = self.queue.try_recv() {
            self.persist(write).await?;
            unflushed += 1;
        }

        if unflushed > 0 {
            match self.controller.restart(&self.settings.interface).await {
                Ok(()) => metrics::record_service_restart("drain"),
                Err(e) => tracing::error!(
                    interface = %self.settings.interface,
                    error = %e,
                    "Final restart failed"
                ),
            }
        }
        Ok(())
    }

    /// Returns the number of writes not yet applied by a restart.
    async fn run_loop(&mut self, token: &CancellationToken) -> Result<usize, ProcessorError> {
        let mut ticker = time::interval(self.settings.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut unflushed = 0usize;
        let mut last_restart = Instant::now();

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => return Ok(unflushed),
                _ = ticker.tick() => {}
            }

            match self.queue.try_recv() {
                Ok(write) => {
                    self.persist(write).await?;
                    unflushed += 1;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => {}
            }

            if unflushed > 0 && last_restart.elapsed() >= self.settings.restart_debounce {
                self.controller
                    .restart(&self.settings.interface)
                    .await
                    .map_err(ProcessorError::Restart)?;
                metrics::record_service_restart("debounce");
                tracing::info!(
                    interface = %self.settings.interface,
                    applied = unflushed,
                    "Service restarted"
                );
                last_restart = Instant::now();
                unflushed = 0;
            }
        }
    }

    /// Run a sink operation on the blocking pool; file writes end in
    /// `sync_data` and must not stall the runtime.
    async fn with_sink<F>(&self, op: F) -> Result<(), SinkError>
    where
        F: FnOnce(&mut dyn ConfigSink) -> Result<(), SinkError> + Send + 'static,
    {
        let sink = self.sink.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = sink.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            op(&mut **guard)
        })
        .await
        .map_err(|e| SinkError::Io {
            path: PathBuf::from("<sink>"),
            source: std::io::Error::other(e),
        })?
    }

    /// Append one peer. On failure the service is disabled first: a file
    /// that may be missing peers must not keep serving.
    async fn persist(&mut self, write: PendingWrite) -> Result<(), ProcessorError> {
        let block = write.to_peer().to_string();
        if let Err(e) = self.with_sink(move |sink| sink.append(&block)).await {
            tracing::error!(
                interface = %self.settings.interface,
                index = write.index,
                error = %e,
                "Failed to add entry"
            );
            if let Err(stop_err) = self.controller.disable_and_stop(&self.settings.interface).await {
                tracing::error!(error = %stop_err, "Failed to disable service");
            }
            return Err(ProcessorError::DurableWrite(e));
        }

        metrics::record_peer_written();
        tracing::info!(
            interface = %self.settings.interface,
            index = write.index,
            public_key = %write.public_key,
            "Peer persisted"
        );
        Ok(())
    }
}
