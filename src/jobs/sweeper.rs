//! Background job: revoke and drop expired installation tokens.
//!
//! Runs every `CLEANUP_INTERVAL_MS`. Stopping only cancels the next tick; a
//! sweep already in progress runs to completion.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::lifecycle::TokenLifecycle;

/// Owns the periodic sweep task.
pub struct Sweeper {
    lifecycle: Arc<TokenLifecycle>,
    period: Duration,
}

/// Handle to a running sweeper. Dropping it also ends the loop, without waiting.
pub struct SweeperHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl Sweeper {
    pub fn new(lifecycle: Arc<TokenLifecycle>, period: Duration) -> Self {
        Self { lifecycle, period }
    }

    /// Spawn the sweep loop. The first sweep happens one full period after start.
    pub fn start(self) -> SweeperHandle {
        let (shutdown, mut stop_rx) = watch::channel(false);
        let Sweeper { lifecycle, period } = self;

        let first_tick = time::Instant::now() + period;

        let task = tokio::spawn(async move {
            let mut interval = time::interval_at(first_tick, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    // Shutdown wins over a tick that is due at the same time.
                    _ = stop_rx.changed() => break,
                    _ = interval.tick() => {}
                }
                if *stop_rx.borrow() {
                    break;
                }
                // A sweep that already started runs to completion; stop is
                // only observed again at the top of the loop.
                let outcome = lifecycle.sweep().await;
                if outcome.removed_count > 0 {
                    tracing::info!(
                        removed = outcome.removed_count,
                        revoked = outcome.revoked_count,
                        "periodic sweep finished"
                    );
                }
            }
            tracing::info!("token sweeper stopped");
        });

        tracing::info!(
            period_ms = u64::try_from(period.as_millis()).unwrap_or(u64::MAX),
            "token sweeper started"
        );
        SweeperHandle { shutdown, task }
    }
}

impl SweeperHandle {
    /// Prevent further sweeps and wait for the loop to exit.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            tracing::error!("sweeper task ended abnormally: {}", e);
        }
    }
}
