use crate::core::error::SyncError;
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, error, info, warn};

/// Runs the process-manager command that restarts the daemon
#[derive(Debug, Clone)]
pub struct Restarter {
    command: Vec<String>,
}

impl Restarter {
    pub fn new(command: Vec<String>) -> Self {
        Self { command }
    }

    pub async fn restart(&self) -> Result<(), SyncError> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| SyncError::Restart("empty restart command".to_string()))?;

        info!(command = ?self.command, "Restarting daemon");

        let output = Command::new(program)
            .args(args)
            .output()
            .await
            .map_err(|e| SyncError::Restart(format!("failed to spawn {}: {}", program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SyncError::Restart(format!(
                "{} exited with {}: {}",
                program,
                output.status,
                stderr.trim()
            )));
        }

        info!("Daemon restarted");
        Ok(())
    }
}

/// Bounded queue of restart requests served by one background worker.
///
/// Delivery is at-most-once with no confirmation: the caller only learns
/// whether the request was queued. The worker waits `delay` after picking up
/// a request and drains whatever else arrived meanwhile, so a burst of
/// registrations costs a single restart. Failures are logged, never returned.
#[derive(Clone)]
pub struct RestartQueue {
    tx: mpsc::Sender<()>,
}

impl RestartQueue {
    /// Spawn the worker on the current tokio runtime
    pub fn spawn(restarter: Restarter, delay: Duration, capacity: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<()>(capacity.max(1));

        tokio::spawn(async move {
            while rx.recv().await.is_some() {
                tokio::time::sleep(delay).await;

                let mut coalesced = 0usize;
                while rx.try_recv().is_ok() {
                    coalesced += 1;
                }

                debug!(coalesced, "Processing scheduled daemon restart");

                if let Err(e) = restarter.restart().await {
                    error!(error = %e, "Scheduled daemon restart failed");
                }
            }

            debug!("Restart queue closed, worker exiting");
        });

        Self { tx }
    }

    /// Ask for a restart. Returns `false` if the request was dropped.
    pub fn schedule(&self) -> bool {
        match self.tx.try_send(()) {
            Ok(()) => true,
            Err(TrySendError::Full(())) => {
                debug!("Restart queue full, a pending restart already covers this request");
                false
            }
            Err(TrySendError::Closed(())) => {
                warn!("Restart worker is gone, dropping restart request");
                false
            }
        }
    }
}
