//! Session state shared by the reconciliation client and the scheduler.
//!
//! A session owns at most one [`RateLimiterModel`] at a time. Every successful
//! configuration installs a brand-new model and bumps the generation counter;
//! action responses carry the generation they were issued under and are
//! dropped if a newer configuration has been installed since.
//!
//! All mutation goes through a single mutex that is never held across an
//! await point, so ticks and in-flight calls interleave without racing.
//!
//! # Phases
//!
//! ```text
//! Unconfigured -> Configuring -> Configured <-> ActionInFlight
//!                      ^              |
//!                      +--------------+  (reconfigure)
//! ```

use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::sync::watch;

use crate::bucket::{BucketSnapshot, RateLimiterModel};
use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::events::{EventLog, LogEntry, Severity};
use crate::profile::AlgorithmProfile;

/// Session-level state machine position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Unconfigured,
    Configuring,
    Configured,
    ActionInFlight,
}

#[derive(Debug, Default)]
struct SessionState {
    model: Option<RateLimiterModel>,
    generation: u64,
    configuring: bool,
    acting: bool,
}

impl SessionState {
    fn phase(&self) -> SessionPhase {
        if self.configuring {
            SessionPhase::Configuring
        } else if self.model.is_none() {
            SessionPhase::Unconfigured
        } else if self.acting {
            SessionPhase::ActionInFlight
        } else {
            SessionPhase::Configured
        }
    }
}

/// One visualizer session for a fixed algorithm profile.
pub struct Session {
    profile: &'static AlgorithmProfile,
    clock: Arc<dyn Clock>,
    state: Mutex<SessionState>,
    snapshots: watch::Sender<Option<BucketSnapshot>>,
    log: EventLog,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("kind", &self.profile.kind)
            .field("phase", &self.phase())
            .field("generation", &self.generation())
            .finish()
    }
}

/// Which kind of user-triggered call holds the in-flight slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CallKind {
    Configure,
    Action,
}

/// Releases the in-flight slot when the call finishes or is dropped.
pub(crate) struct CallGuard<'a> {
    session: &'a Session,
    kind: CallKind,
}

impl Drop for CallGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.session.lock();
        match self.kind {
            CallKind::Configure => state.configuring = false,
            CallKind::Action => state.acting = false,
        }
    }
}

impl Session {
    #[must_use]
    pub fn new(
        profile: &'static AlgorithmProfile,
        clock: Arc<dyn Clock>,
        history_limit: usize,
    ) -> Self {
        let (snapshots, _) = watch::channel(None);
        let session = Self {
            profile,
            clock,
            state: Mutex::new(SessionState::default()),
            snapshots,
            log: EventLog::new(history_limit),
        };
        session.record(
            format!("{} interface initialized.", profile.labels.title),
            Severity::Info,
        );
        session
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    #[must_use]
    pub fn profile(&self) -> &'static AlgorithmProfile {
        self.profile
    }

    #[must_use]
    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.lock().phase()
    }

    /// Number of successful configurations so far.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    /// Current read-only view, if a model exists.
    #[must_use]
    pub fn snapshot(&self) -> Option<BucketSnapshot> {
        let state = self.lock();
        state.model.as_ref().map(|m| m.snapshot(state.generation))
    }

    /// Receive a fresh snapshot after every tick, configuration and action.
    #[must_use]
    pub fn subscribe_snapshots(&self) -> watch::Receiver<Option<BucketSnapshot>> {
        self.snapshots.subscribe()
    }

    /// Live stream of session log entries.
    #[must_use]
    pub fn subscribe_log(&self) -> tokio::sync::broadcast::Receiver<LogEntry> {
        self.log.subscribe()
    }

    /// Retained log entries, newest first.
    #[must_use]
    pub fn recent_log(&self) -> Vec<LogEntry> {
        self.log.recent()
    }

    pub(crate) fn record(&self, message: impl Into<String>, severity: Severity) {
        self.log.push(message, severity, self.now_ms());
    }

    /// Evolve the model to now and publish. Returns false when unconfigured.
    pub fn tick(&self) -> bool {
        let now = self.now_ms();
        let mut state = self.lock();
        let generation = state.generation;
        let Some(model) = state.model.as_mut() else {
            return false;
        };
        model.evolve(now);
        tracing::trace!(
            algorithm = %model.kind(),
            generation,
            level = model.level(),
            "simulation tick"
        );
        self.snapshots
            .send_replace(Some(model.snapshot(generation)));
        true
    }

    /// Claim the configuration slot. Only one configuration may be in flight;
    /// an outstanding action does not block it.
    pub(crate) fn begin_configure(&self) -> Result<CallGuard<'_>> {
        let mut state = self.lock();
        if state.configuring {
            return Err(Error::CallInFlight);
        }
        state.configuring = true;
        Ok(CallGuard {
            session: self,
            kind: CallKind::Configure,
        })
    }

    /// Claim the action slot and bring the prediction up to date.
    ///
    /// Returns the generation the action is issued under.
    pub(crate) fn begin_action(&self) -> Result<(CallGuard<'_>, u64)> {
        let now = self.now_ms();
        let mut state = self.lock();
        if state.configuring || state.acting {
            return Err(Error::CallInFlight);
        }
        let generation = state.generation;
        let Some(model) = state.model.as_mut() else {
            return Err(Error::NotConfigured);
        };
        model.evolve(now);
        self.snapshots
            .send_replace(Some(model.snapshot(generation)));
        state.acting = true;
        Ok((
            CallGuard {
                session: self,
                kind: CallKind::Action,
            },
            generation,
        ))
    }

    /// Replace the model wholesale and start a new generation.
    pub(crate) fn install(&self, model: RateLimiterModel) -> u64 {
        let mut state = self.lock();
        state.generation += 1;
        let generation = state.generation;
        self.snapshots
            .send_replace(Some(model.snapshot(generation)));
        state.model = Some(model);
        generation
    }

    /// Adopt a server-reported level if `generation` is still current.
    ///
    /// Returns false when the response is stale and was discarded.
    pub(crate) fn adopt_level(&self, generation: u64, server_level: f64) -> bool {
        let now = self.now_ms();
        let mut state = self.lock();
        if state.generation != generation {
            return false;
        }
        let Some(model) = state.model.as_mut() else {
            return false;
        };
        model.overwrite_level(server_level, now);
        self.snapshots
            .send_replace(Some(model.snapshot(generation)));
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::profile::{LEAKY_BUCKET, TOKEN_BUCKET};

    fn session_with(profile: &'static AlgorithmProfile) -> (Session, ManualClock) {
        let clock = ManualClock::new(10_000);
        (Session::new(profile, Arc::new(clock.clone()), 50), clock)
    }

    #[test]
    fn new_session_is_unconfigured() {
        let (session, _) = session_with(&TOKEN_BUCKET);
        assert_eq!(session.phase(), SessionPhase::Unconfigured);
        assert_eq!(session.generation(), 0);
        assert!(session.snapshot().is_none());
        assert!(!session.tick());
        assert_eq!(
            session.recent_log()[0].message,
            "Token Bucket interface initialized."
        );
    }

    #[test]
    fn action_before_configure_is_not_configured() {
        let (session, _) = session_with(&TOKEN_BUCKET);
        assert!(matches!(session.begin_action(), Err(Error::NotConfigured)));
        assert_eq!(session.phase(), SessionPhase::Unconfigured);
    }

    #[test]
    fn install_bumps_generation_and_publishes() {
        let (session, clock) = session_with(&LEAKY_BUCKET);
        let rx = session.subscribe_snapshots();
        let model = RateLimiterModel::new(&LEAKY_BUCKET, 5.0, 1.0, clock.now_ms()).unwrap();
        assert_eq!(session.install(model), 1);
        assert_eq!(session.phase(), SessionPhase::Configured);
        let published = rx.borrow().clone().expect("snapshot");
        assert_eq!(published.generation, 1);
        assert!(published.level.abs() < 1e-9);
    }

    #[test]
    fn guards_track_phase() {
        let (session, clock) = session_with(&TOKEN_BUCKET);
        session.install(RateLimiterModel::new(&TOKEN_BUCKET, 10.0, 1.0, clock.now_ms()).unwrap());

        let (guard, generation) = session.begin_action().unwrap();
        assert_eq!(generation, 1);
        assert_eq!(session.phase(), SessionPhase::ActionInFlight);
        assert!(matches!(session.begin_action(), Err(Error::CallInFlight)));

        // Reconfiguration may supersede an outstanding action.
        let configure = session.begin_configure().unwrap();
        assert_eq!(session.phase(), SessionPhase::Configuring);
        assert!(matches!(session.begin_configure(), Err(Error::CallInFlight)));

        drop(configure);
        drop(guard);
        assert_eq!(session.phase(), SessionPhase::Configured);
    }

    #[test]
    fn begin_action_evolves_first() {
        let (session, clock) = session_with(&LEAKY_BUCKET);
        let mut model = RateLimiterModel::new(&LEAKY_BUCKET, 5.0, 1.0, clock.now_ms()).unwrap();
        model.overwrite_level(4.0, clock.now_ms());
        session.install(model);

        clock.advance_ms(1_000);
        let (_guard, _) = session.begin_action().unwrap();
        let level = session.snapshot().unwrap().level;
        assert!((level - 3.0).abs() < 1e-9);
    }

    #[test]
    fn stale_generation_is_not_adopted() {
        let (session, clock) = session_with(&LEAKY_BUCKET);
        session.install(RateLimiterModel::new(&LEAKY_BUCKET, 5.0, 1.0, clock.now_ms()).unwrap());
        session.install(RateLimiterModel::new(&LEAKY_BUCKET, 8.0, 2.0, clock.now_ms()).unwrap());

        assert!(!session.adopt_level(1, 4.0));
        assert!(session.snapshot().unwrap().level.abs() < 1e-9);

        assert!(session.adopt_level(2, 4.0));
        assert!((session.snapshot().unwrap().level - 4.0).abs() < 1e-9);
    }
}
