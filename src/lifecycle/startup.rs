//! Startup orchestration.
//!
//! # Responsibilities
//! - Generate the server key pair
//! - Build the admission store and the processor around one bounded queue
//! - Resolve file and lock paths from configuration
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Nothing here touches the filesystem or the service manager; the
//!   processor does that once it runs under the instance lock

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::admission::{AddressPool, AdmissionStore, StoreSettings};
use crate::config::ExchangeConfig;
use crate::processor::{ConfFile, ConfigSink, InstanceLock, Processor, ProcessorSettings};
use crate::service::ServiceController;
use crate::wireguard::conf::{Interface, ServerInterface};
use crate::wireguard::keys::WgKeyPair;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("tunnel.endpoint is not configured")]
    MissingEndpoint,

    #[error("interface.address has no prefixes to allocate from")]
    EmptyPool,
}

/// The wired-up core: the store serves requests, the processor persists.
pub struct Services {
    pub store: Arc<AdmissionStore>,
    pub processor: Processor,
}

/// Build the core services, writing to `<config_dir>/<interface>.conf`.
pub fn build(
    config: &ExchangeConfig,
    controller: Arc<dyn ServiceController>,
) -> Result<Services, StartupError> {
    let sink = ConfFile::for_interface(&config.processor.config_dir, &config.tunnel.interface_name);
    build_with_sink(config, controller, Box::new(sink))
}

/// Like [`build`] with a caller-provided sink.
pub fn build_with_sink(
    config: &ExchangeConfig,
    controller: Arc<dyn ServiceController>,
    sink: Box<dyn ConfigSink>,
) -> Result<Services, StartupError> {
    let endpoint: SocketAddr = config.tunnel.endpoint.ok_or(StartupError::MissingEndpoint)?;
    let pool = AddressPool::new(config.interface.address.clone()).ok_or(StartupError::EmptyPool)?;

    let server_keys = WgKeyPair::generate();
    tracing::info!(
        interface = %config.tunnel.interface_name,
        public_key = %server_keys.public_key(),
        endpoint = %endpoint,
        "Server key pair generated"
    );

    let header = ServerInterface {
        listen_port: endpoint.port(),
        interface: Interface {
            address: config.interface.address.clone(),
            dns: config.interface.dns.clone(),
            fw_mark: config.interface.fw_mark,
            pre_up: config.interface.pre_up.clone(),
            post_up: config.interface.post_up.clone(),
            pre_down: config.interface.pre_down.clone(),
            post_down: config.interface.post_down.clone(),
            private_key: Some(server_keys.private_key().clone()),
        },
    };

    let (tx, rx) = mpsc::channel(config.processor.queue_capacity);

    let store = AdmissionStore::new(
        StoreSettings {
            endpoint,
            dns: config.tunnel.dns.clone(),
            client_fw_mark: config.tunnel.client_fw_mark,
            pool,
            server_keys,
        },
        tx,
    );

    let settings = ProcessorSettings {
        interface: config.tunnel.interface_name.clone(),
        lock_path: InstanceLock::path_for(&config.processor.lock_dir(), &config.tunnel.interface_name),
        tick: Duration::from_millis(config.processor.tick_ms),
        restart_debounce: Duration::from_secs(config.processor.restart_debounce_secs),
    };
    let processor = Processor::new(settings, header, rx, sink, controller);

    Ok(Services {
        store: Arc::new(store),
        processor,
    })
}
