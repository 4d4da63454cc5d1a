use crate::pricing::{RefreshScheduler, TriggerOutcome};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info};

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

/// Shutdown signal types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    /// Graceful shutdown (drain connections, stop the refresh loop)
    Graceful,
}

/// Setup signal handlers for the server
///
/// Returns a broadcast sender for shutdown signals and a join handle for the signal task
///
/// Handles:
/// - SIGTERM/SIGINT: Graceful shutdown
/// - SIGHUP: Manual pricing refresh
#[cfg(unix)]
pub fn setup_signal_handlers(
    scheduler: Arc<RefreshScheduler>,
) -> (
    broadcast::Sender<ShutdownSignal>,
    tokio::task::JoinHandle<()>,
) {
    let (shutdown_tx, _) = broadcast::channel(16);
    let tx_clone = shutdown_tx.clone();

    let handle = tokio::spawn(async move {
        if let Err(e) = listen(scheduler, tx_clone).await {
            error!("Failed to install signal handlers: {}", e);
        }
    });

    (shutdown_tx, handle)
}

#[cfg(unix)]
async fn listen(
    scheduler: Arc<RefreshScheduler>,
    tx: broadcast::Sender<ShutdownSignal>,
) -> std::io::Result<()> {
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sighup = signal(SignalKind::hangup())?;

    loop {
        tokio::select! {
            _ = sigterm.recv() => {
                info!("SIGTERM received, initiating graceful shutdown");
                let _ = tx.send(ShutdownSignal::Graceful);
                break;
            }
            _ = sigint.recv() => {
                info!("SIGINT received, initiating graceful shutdown");
                let _ = tx.send(ShutdownSignal::Graceful);
                break;
            }
            _ = sighup.recv() => {
                match scheduler.trigger() {
                    TriggerOutcome::Started => info!("SIGHUP received, pricing refresh started"),
                    TriggerOutcome::AlreadyRunning => {
                        info!("SIGHUP received, refresh already in progress")
                    }
                }
            }
        }
    }

    Ok(())
}

/// Non-unix fallback: only Ctrl+C is supported
#[cfg(not(unix))]
pub fn setup_signal_handlers(
    _scheduler: Arc<RefreshScheduler>,
) -> (
    broadcast::Sender<ShutdownSignal>,
    tokio::task::JoinHandle<()>,
) {
    let (shutdown_tx, _) = broadcast::channel(16);
    let tx_clone = shutdown_tx.clone();

    let handle = tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Ctrl+C received, initiating shutdown");
                let _ = tx_clone.send(ShutdownSignal::Graceful);
            }
            Err(e) => {
                error!("Failed to listen for Ctrl+C: {}", e);
            }
        }
    });

    (shutdown_tx, handle)
}
