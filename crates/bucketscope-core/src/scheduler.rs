//! Periodic local evolution of the session model.
//!
//! Between round-trips the model is advanced on a fixed cadence so the
//! presentation layer sees tokens refill (or the queue leak) smoothly. The
//! driver is a single tokio task per session; starting it again cancels the
//! previous one first.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::session::Session;

/// Default tick cadence.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Drives [`Session::tick`] at a fixed interval.
#[derive(Debug)]
pub struct SimulationScheduler {
    interval: Duration,
    driver: Mutex<Option<JoinHandle<()>>>,
}

impl SimulationScheduler {
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            interval: interval.max(Duration::from_millis(1)),
            driver: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Start ticking `session`, cancelling any previous driver.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self, session: Arc<Session>) {
        let mut driver = self.driver.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = driver.take() {
            previous.abort();
            tracing::debug!(algorithm = %session.profile().kind, "cancelled previous simulation driver");
        }

        let interval = self.interval;
        tracing::debug!(
            algorithm = %session.profile().kind,
            interval_ms = interval.as_millis() as u64,
            "starting simulation driver"
        );
        *driver = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if !session.tick() {
                    tracing::debug!("session has no model; simulation driver exiting");
                    break;
                }
            }
        }));
    }

    /// Cancel the driver. No-op when not running.
    pub fn stop(&self) {
        let handle = self
            .driver
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = handle {
            handle.abort();
            tracing::debug!("simulation driver stopped");
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.driver
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }
}

impl Default for SimulationScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_TICK_INTERVAL)
    }
}

impl Drop for SimulationScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
