//! WireGuard peer admission server.
//!
//! Clients post a public key (and optionally a preshared key) and get back
//! the parameters for their side of the tunnel. Every admitted peer is
//! appended to the interface's configuration file and picked up by a
//! debounced restart of the interface's service.
//!
//! # Architecture Overview
//!
//! ```text
//!     POST /add-peer        ┌──────────────┐   PendingWrite   ┌──────────────┐
//!     ─────────────────────▶│  admission   │─────(bounded)───▶│  processor   │
//!     ◀─────────────────────│    store     │                  │  (1 / tick)  │
//!       client parameters   └──────────────┘                  └──────┬───────┘
//!                                                                    │
//!                                              <iface>.conf ◀────────┤
//!                                              wg-quick@<iface> ◀────┘ (debounced)
//!
//!     SIGINT/SIGTERM/TTL ──▶ coordinator ──▶ cancellation token ──▶ all tasks
//! ```

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use wg_exchange::config::load_config;
use wg_exchange::config::schema::ServiceMode;
use wg_exchange::http::AdmissionServer;
use wg_exchange::lifecycle::{signals, startup, Coordinator, ShutdownOutcome};
use wg_exchange::observability::{logging, metrics};
use wg_exchange::service;

#[derive(Parser)]
#[command(name = "wge-server", version, about = "WireGuard peer admission server", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "server.toml")]
    conf: PathBuf,

    /// Drive the interface through systemd instead of simulating it.
    #[arg(long)]
    systemd: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = load_config(&cli.conf)?;
    if cli.systemd {
        config.service.mode = ServiceMode::Systemctl;
    }

    logging::init_logging(&config.observability);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        conf = %cli.conf.display(),
        "wge-server starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    tracing::info!(
        interface = %config.tunnel.interface_name,
        bind_address = %config.listener.bind_address,
        service_mode = ?config.service.mode,
        ttl_secs = config.lifecycle.ttl_secs,
        "Configuration loaded"
    );

    let controller = service::from_config(&config.service);
    let services = startup::build(&config, controller)?;
    let server = AdmissionServer::new(config.listener.clone(), services.store);
    let processor = services.processor;

    let failed = Arc::new(AtomicBool::new(false));
    let mut coordinator = Coordinator::new();
    {
        let failed = failed.clone();
        coordinator.register("processor", move |token| async move {
            if processor.run(token).await.is_err() {
                failed.store(true, Ordering::SeqCst);
            }
        });
    }
    {
        let failed = failed.clone();
        coordinator.register("http", move |token| async move {
            if server.run(token).await.is_err() {
                failed.store(true, Ordering::SeqCst);
            }
        });
    }

    let signals = signals::install()?;
    let ttl = Duration::from_secs(config.lifecycle.ttl_secs);
    let outcome = coordinator.run(Some(ttl), signals).await;

    if outcome == ShutdownOutcome::Forced {
        tracing::warn!("Forced exit");
        std::process::exit(outcome.exit_code());
    }
    if outcome == ShutdownOutcome::Panicked || failed.load(Ordering::SeqCst) {
        return Err("a service task failed; see log for details".into());
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
