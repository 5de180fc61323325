//! Shared utilities for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::time::Instant;

use wg_exchange::config::ExchangeConfig;
use wg_exchange::processor::{ConfigSink, SinkError};
use wg_exchange::service::{ServiceController, ServiceError};

/// A configuration that passes validation, with every path under `dir`.
pub fn test_config(dir: &Path) -> ExchangeConfig {
    let mut config = ExchangeConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.tunnel.endpoint = Some("203.0.113.7:51820".parse().unwrap());
    config.tunnel.dns = vec!["9.9.9.9".parse().unwrap()];
    config.interface.address = vec!["10.8.0.1/24".parse().unwrap(), "fd00:8::1/120".parse().unwrap()];
    config.processor.config_dir = dir.to_path_buf();
    config.processor.lock_dir = Some(dir.to_path_buf());
    config
}

/// A distinct, valid-length public key per `n`.
pub fn key(n: u16) -> [u8; 32] {
    let mut k = [0x11u8; 32];
    k[..2].copy_from_slice(&n.to_be_bytes());
    k
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    EnableAndStart,
    Restart,
    DisableAndStop,
}

/// Service controller that records every call with its (tokio) timestamp.
#[derive(Default)]
pub struct RecordingController {
    calls: Mutex<Vec<(Instant, Call)>>,
    fail_enable: AtomicBool,
    fail_restart: AtomicBool,
}

impl RecordingController {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_enable(&self) {
        self.fail_enable.store(true, Ordering::SeqCst);
    }

    pub fn fail_restart(&self) {
        self.fail_restart.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().iter().map(|(_, c)| *c).collect()
    }

    pub fn restarts(&self) -> Vec<Instant> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, c)| *c == Call::Restart)
            .map(|(at, _)| *at)
            .collect()
    }

    fn record(&self, call: Call, fail: &AtomicBool) -> Result<(), ServiceError> {
        self.calls.lock().unwrap().push((Instant::now(), call));
        if fail.load(Ordering::SeqCst) {
            return Err(ServiceError::Rejected {
                operation: "test",
                unit: "wg-quick@wg0.service".into(),
                detail: "injected failure".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ServiceController for RecordingController {
    async fn enable_and_start(&self, _interface: &str) -> Result<(), ServiceError> {
        self.record(Call::EnableAndStart, &self.fail_enable)
    }

    async fn restart(&self, _interface: &str) -> Result<(), ServiceError> {
        self.record(Call::Restart, &self.fail_restart)
    }

    async fn disable_and_stop(&self, _interface: &str) -> Result<(), ServiceError> {
        self.record(Call::DisableAndStop, &AtomicBool::new(false))
    }
}

#[derive(Default)]
struct MemoryState {
    content: String,
    initialized: bool,
    appends: usize,
    fail_appends: bool,
}

/// In-memory sink; clones share the same buffer.
#[derive(Clone, Default)]
pub struct MemorySink {
    state: Arc<Mutex<MemoryState>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn content(&self) -> String {
        self.state.lock().unwrap().content.clone()
    }

    pub fn initialized(&self) -> bool {
        self.state.lock().unwrap().initialized
    }

    pub fn appends(&self) -> usize {
        self.state.lock().unwrap().appends
    }

    pub fn fail_appends(&self) {
        self.state.lock().unwrap().fail_appends = true;
    }
}

impl ConfigSink for MemorySink {
    fn initialize(&mut self, header: &str) -> Result<(), SinkError> {
        let mut state = self.state.lock().unwrap();
        state.content = header.to_string();
        state.initialized = true;
        Ok(())
    }

    fn append(&mut self, block: &str) -> Result<(), SinkError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_appends {
            return Err(SinkError::Io {
                path: "memory".into(),
                source: std::io::Error::other("injected failure"),
            });
        }
        state.content.push_str(block);
        state.appends += 1;
        Ok(())
    }
}
