use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use crate::error::{Result, SweepError};

/// A periodic maintenance pass.
#[async_trait]
pub trait Sweep: Send + Sync {
    fn name(&self) -> &str;

    /// Run one pass. Returns how many records it changed.
    async fn run_once(&self) -> Result<usize>;
}

/// Runs registered sweeps on a fixed interval.
#[derive(Default)]
pub struct SweepRunner {
    sweeps: Vec<Arc<dyn Sweep>>,
}

impl SweepRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, sweep: Arc<dyn Sweep>) -> Self {
        info!(sweep = sweep.name(), "registering sweep");
        self.sweeps.push(sweep);
        self
    }

    pub fn len(&self) -> usize {
        self.sweeps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sweeps.is_empty()
    }

    /// Run every sweep once, in registration order. A failing sweep is
    /// logged and does not stop the others.
    pub async fn run_all(&self) -> usize {
        let mut changed = 0;
        for sweep in &self.sweeps {
            match sweep.run_once().await {
                Ok(n) => {
                    debug!(sweep = sweep.name(), changed = n, "sweep pass complete");
                    changed += n;
                }
                Err(e) => error!(sweep = sweep.name(), "sweep pass failed: {e}"),
            }
        }
        changed
    }

    /// Spawn the loop. The first pass runs immediately, then once per
    /// `interval`. Passes never overlap: a slow pass delays the next tick.
    pub fn start(self, interval: Duration) -> SweepHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let period = interval.max(Duration::from_millis(1));
        let task = tokio::spawn(self.run(period, shutdown_rx));
        SweepHandle {
            shutdown: shutdown_tx,
            task,
        }
    }

    async fn run(self, period: Duration, mut shutdown: watch::Receiver<bool>) {
        info!(sweeps = self.sweeps.len(), period_secs = period.as_secs(), "sweep runner started");

        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.run_all().await;
                }
                changed = shutdown.changed() => {
                    // A dropped sender means the handle is gone; stop too.
                    if changed.is_err() || *shutdown.borrow() {
                        info!("sweep runner shutting down");
                        break;
                    }
                }
            }
        }
    }
}

/// Owner of a running sweep loop.
pub struct SweepHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SweepHandle {
    /// Signal the loop to stop and wait for the current pass to finish.
    pub async fn stop(self) -> Result<()> {
        // Err only if the loop already exited, which is what we want anyway.
        let _ = self.shutdown.send(true);
        self.task
            .await
            .map_err(|e| SweepError::Task(e.to_string()))
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
