//! OS signal handling.
//!
//! # Responsibilities
//! - Register SIGINT and SIGTERM handlers
//! - Forward each delivery, in order, to the shutdown coordinator
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - Every delivery is forwarded; the coordinator decides that the second
//!   one forces the exit

use std::fmt;
use tokio::sync::mpsc;

/// A termination request from the operating system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermSignal {
    Interrupt,
    Terminate,
}

impl fmt::Display for TermSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TermSignal::Interrupt => write!(f, "SIGINT"),
            TermSignal::Terminate => write!(f, "SIGTERM"),
        }
    }
}

/// Install the handlers and return the stream of deliveries.
///
/// Must be called from within a Tokio runtime.
#[cfg(unix)]
pub fn install() -> std::io::Result<mpsc::Receiver<TermSignal>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    let (tx, rx) = mpsc::channel(4);

    tokio::spawn(async move {
        loop {
            let received = tokio::select! {
                Some(()) = interrupt.recv() => TermSignal::Interrupt,
                Some(()) = terminate.recv() => TermSignal::Terminate,
                else => break,
            };
            if tx.send(received).await.is_err() {
                break;
            }
        }
    });

    Ok(rx)
}

#[cfg(not(unix))]
pub fn install() -> std::io::Result<mpsc::Receiver<TermSignal>> {
    let (tx, rx) = mpsc::channel(4);

    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if tx.send(TermSignal::Interrupt).await.is_err() {
                break;
            }
        }
    });

    Ok(rx)
}
