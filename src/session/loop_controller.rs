// SPDX-License-Identifier: GPL-3.0-only

//! Continuous capture loop
//!
//! Cycles are chained, not timed: cycle n+1 starts only after cycle n has
//! resolved and the interval has elapsed, so two cycles of one loop can never
//! overlap. Each loop instance owns a fresh [`Liveness`] token; stopping
//! revokes it, which both prevents the next cycle and discards the result of
//! a cycle that is still in flight.

use super::{CycleOutcome, Liveness, Mode, Session};
use crate::config::Config;
use crate::constants::timing;
use crate::pipelines::inference::CaptureSource;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Loop parameters, fixed for the lifetime of one loop instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopConfig {
    /// Delay between the end of one cycle and the start of the next
    pub interval_ms: u64,
    pub enabled: bool,
    /// Stop on its own after this many cycles
    pub max_cycles: Option<u64>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            interval_ms: timing::DEFAULT_LOOP_INTERVAL_MS,
            enabled: true,
            max_cycles: None,
        }
    }
}

impl LoopConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            interval_ms: config.loop_interval_ms,
            ..Self::default()
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Counters reported when a loop instance ends
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopSummary {
    pub cycles: u64,
    pub successes: u64,
    pub failures: u64,
}

struct ActiveLoop {
    liveness: Liveness,
    wake: watch::Sender<bool>,
    handle: JoinHandle<LoopSummary>,
}

/// Starts, stops and restarts the continuous loop of one session
pub struct LoopController {
    session: Session,
    active: Option<ActiveLoop>,
}

impl LoopController {
    pub fn new(session: Session) -> Self {
        Self {
            session,
            active: None,
        }
    }

    /// Start a fresh loop, tearing down any previous one first
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&mut self, config: LoopConfig) {
        if self.active.is_some() {
            info!("Restarting capture loop");
            self.stop();
            self.active = None;
        }
        if !config.enabled {
            debug!("Capture loop disabled");
            return;
        }

        let liveness = Liveness::new();
        let (wake, sleeper) = watch::channel(false);
        let handle = tokio::spawn(run_loop(
            self.session.clone(),
            liveness.clone(),
            config,
            sleeper,
        ));

        info!(loop_id = liveness.id(), interval_ms = config.interval_ms, "Capture loop started");
        self.active = Some(ActiveLoop {
            liveness,
            wake,
            handle,
        });
    }

    /// Stop the loop; calling it again is a no-op
    ///
    /// A cycle already in flight may finish, but nothing it produces reaches
    /// the session.
    pub fn stop(&mut self) {
        let Some(active) = self.active.as_ref() else {
            return;
        };
        if !active.liveness.is_alive() {
            return;
        }

        self.session.revoke(&active.liveness);
        let _ = active.wake.send(true);
        info!(loop_id = active.liveness.id(), "Capture loop stopped");
    }

    /// True while the current loop instance is alive and its task running
    pub fn is_running(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|active| active.liveness.is_alive() && !active.handle.is_finished())
    }

    /// Wait for the current loop task to end
    ///
    /// Returns `None` if no loop was started or the task panicked.
    pub async fn wait(&mut self) -> Option<LoopSummary> {
        let active = self.active.take()?;
        match active.handle.await {
            Ok(summary) => Some(summary),
            Err(e) => {
                warn!(error = %e, "Capture loop task failed");
                None
            }
        }
    }
}

impl Drop for LoopController {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_loop(
    session: Session,
    liveness: Liveness,
    config: LoopConfig,
    mut sleeper: watch::Receiver<bool>,
) -> LoopSummary {
    let mut summary = LoopSummary::default();
    let mut consecutive_failures: u64 = 0;

    loop {
        if !liveness.is_alive() {
            break;
        }

        match session
            .run_cycle(CaptureSource::Camera, Mode::Continuous, &liveness)
            .await
        {
            CycleOutcome::Completed(result) => {
                summary.cycles += 1;
                summary.successes += 1;
                consecutive_failures = 0;
                debug!(cycle = summary.cycles, label = %result.label(), "Loop cycle completed");
            }
            CycleOutcome::Failed(e) => {
                summary.cycles += 1;
                summary.failures += 1;
                consecutive_failures += 1;
                // Retries are unbounded; make a dead endpoint visible in logs
                if consecutive_failures >= timing::LOOP_FAILURE_WARN_AFTER {
                    warn!(
                        consecutive_failures,
                        error = %e,
                        "Capture loop keeps failing"
                    );
                }
            }
            CycleOutcome::Skipped => {
                debug!("Loop cycle skipped, camera busy");
            }
            CycleOutcome::Discarded => {
                debug!(loop_id = liveness.id(), "Loop cycle discarded after stop");
                break;
            }
        }

        if !liveness.is_alive() {
            break;
        }
        if config.max_cycles.is_some_and(|max| summary.cycles >= max) {
            info!(cycles = summary.cycles, "Capture loop reached its cycle limit");
            break;
        }

        tokio::select! {
            _ = tokio::time::sleep(config.interval()) => {}
            _ = sleeper.changed() => {
                debug!(loop_id = liveness.id(), "Loop delay interrupted");
            }
        }
    }

    info!(
        loop_id = liveness.id(),
        cycles = summary.cycles,
        successes = summary.successes,
        failures = summary.failures,
        "Capture loop ended"
    );
    summary
}
