//! Alternating reconciliation loop
//!
//! The [`SyncLoop`] chains cycles by completion: an upload pass, then after
//! a fixed delay a deletion pass, then after the delay an upload pass again,
//! indefinitely. The delay is measured from the end of one cycle to the
//! start of the next, so cycles never overlap.
//!
//! After the first cycle the loop starts the [`WatchBridge`] exactly once.
//!
//! A [`SyncToggle`] pauses the chain. Pausing never interrupts a running
//! cycle; it only keeps the next one from being scheduled. Resuming restarts
//! the chain with an upload pass.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::engine::{CycleReport, SyncEngine};
use crate::watch_bridge::WatchBridge;

/// Cloneable handle that enables or disables synchronization
#[derive(Debug, Clone)]
pub struct SyncToggle {
    tx: Arc<watch::Sender<bool>>,
}

impl SyncToggle {
    pub fn enable(&self) {
        if !self.tx.send_replace(true) {
            info!("Synchronization enabled");
        }
    }

    pub fn disable(&self) {
        if self.tx.send_replace(false) {
            info!("Synchronization disabled");
        }
    }

    pub fn is_enabled(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Drives reconciliation cycles until cancelled
pub struct SyncLoop {
    engine: Arc<SyncEngine>,
    cycle_delay: Duration,
    toggle: SyncToggle,
    enabled_rx: watch::Receiver<bool>,
    bridge: Option<WatchBridge>,
    report_tx: Option<mpsc::UnboundedSender<CycleReport>>,
}

impl SyncLoop {
    pub fn new(engine: Arc<SyncEngine>, cycle_delay: Duration) -> Self {
        let (tx, enabled_rx) = watch::channel(true);
        Self {
            engine,
            cycle_delay,
            toggle: SyncToggle { tx: Arc::new(tx) },
            enabled_rx,
            bridge: None,
            report_tx: None,
        }
    }

    /// Starts `bridge` once the first cycle has completed
    pub fn with_watch_bridge(mut self, bridge: WatchBridge) -> Self {
        self.bridge = Some(bridge);
        self
    }

    /// Sends the report of every completed cycle to `tx`
    pub fn with_report_channel(mut self, tx: mpsc::UnboundedSender<CycleReport>) -> Self {
        self.report_tx = Some(tx);
        self
    }

    pub fn toggle(&self) -> SyncToggle {
        self.toggle.clone()
    }

    /// Runs cycles until `cancel` fires and returns how many ran
    ///
    /// A failed cycle is logged and the chain continues after the usual
    /// delay, so the next cycle acts as the retry.
    pub async fn run(mut self, cancel: CancellationToken) -> u64 {
        let mut cycles = 0u64;
        let mut deletion_pass = false;
        let mut bridge_task = None;

        loop {
            if !self.wait_until_enabled(&cancel).await {
                break;
            }

            match self.engine.run_cycle(deletion_pass, &cancel).await {
                Ok(report) => {
                    if !report.failures.is_empty() {
                        warn!(
                            failures = report.failures.len(),
                            deletion_pass, "Cycle finished with failures"
                        );
                    }
                    if let Some(tx) = &self.report_tx {
                        let _ = tx.send(report);
                    }
                }
                Err(e) => error!(error = %e, deletion_pass, "Reconciliation cycle failed"),
            }
            cycles += 1;

            if let Some(bridge) = self.bridge.take() {
                let token = cancel.child_token();
                bridge_task = Some(tokio::spawn(async move {
                    if let Err(e) = bridge.run(token).await {
                        error!(error = %e, "Watch bridge failed");
                    }
                }));
            }

            if cancel.is_cancelled() {
                break;
            }
            if !self.toggle.is_enabled() {
                deletion_pass = false;
                continue;
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.cycle_delay) => {}
            }

            deletion_pass = if self.toggle.is_enabled() {
                !deletion_pass
            } else {
                false
            };
        }

        if let Some(task) = bridge_task {
            let _ = task.await;
        }
        info!(cycles, "Sync loop stopped");
        cycles
    }

    /// Blocks while synchronization is disabled; `false` means cancelled
    async fn wait_until_enabled(&mut self, cancel: &CancellationToken) -> bool {
        if cancel.is_cancelled() {
            return false;
        }
        let mut announced = false;
        loop {
            if *self.enabled_rx.borrow_and_update() {
                return true;
            }
            if !announced {
                info!("Synchronization paused, waiting to be re-enabled");
                announced = true;
            }
            tokio::select! {
                _ = cancel.cancelled() => return false,
                changed = self.enabled_rx.changed() => {
                    if changed.is_err() {
                        return false;
                    }
                }
            }
        }
    }
}
