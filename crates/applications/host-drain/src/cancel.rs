//! Cooperative cancellation
//!
//! Ctrl+C only flips a flag. The dispatcher looks at it between workloads,
//! so a migration that is already being waited on always runs to its own
//! completion or timeout first.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Shared stop flag, false until the operator interrupts the run
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create an unset token
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop at the next workload boundary
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether a stop was requested
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Translate Ctrl+C into `token.cancel()`
///
/// The listener stays installed for the whole run, so later interrupts are
/// swallowed instead of killing the process mid-migration.
pub fn install_interrupt_handler(token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for Ctrl+C, interrupts will not stop the run");
                return;
            }

            if token.is_cancelled() {
                warn!("Already stopping, waiting for the current migration to finish");
            } else {
                info!("Interrupt received, stopping after the current workload");
                token.cancel();
            }
        }
    })
}
