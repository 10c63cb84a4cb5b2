//! Reconciliation between the local model and the remote limiter.
//!
//! [`ReconciliationClient::configure`] (re)initializes the remote limiter and,
//! on acceptance, installs a fresh model and restarts the simulation driver.
//! [`ReconciliationClient::perform_action`] evolves the local prediction,
//! makes one remote call and adopts the level the server reports.
//!
//! Every outcome is written to the session log with a severity so the
//! presentation layer can show it. Nothing here retries: each failure waits
//! for a new user-triggered call.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::bucket::{self, RateLimiterModel};
use crate::error::{Error, Result};
use crate::events::Severity;
use crate::profile::AlgorithmProfile;
use crate::remote::{ConfigureRequest, RemoteLimiter, RemoteReply};
use crate::scheduler::SimulationScheduler;
use crate::session::Session;

/// Result of an accepted configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigureOutcome {
    pub generation: u64,
    /// Capacity in effect (the server's echo when it sent a valid one).
    pub capacity: f64,
    /// Rate in effect (the server's echo when it sent a valid one).
    pub rate_per_second: f64,
    pub message: String,
}

/// Result of an action the remote limiter answered.
///
/// Non-2xx answers only come back this way when stale; otherwise they are
/// [`Error::RemoteRejected`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionOutcome {
    pub generation: u64,
    pub status: u16,
    pub message: String,
    /// Level reported by the server, before clamping.
    pub server_level: Option<f64>,
    /// Set when the response lacked the current-level field.
    pub missing_field: Option<&'static str>,
    /// A newer configuration superseded this action; nothing was adopted.
    pub stale: bool,
}

impl ActionOutcome {
    /// The non-fatal warning attached to this outcome, if any.
    #[must_use]
    pub fn warning(&self) -> Option<Error> {
        self.missing_field
            .map(|field| Error::IncompleteResponse { field })
    }
}

/// Bridges a [`Session`] and a [`RemoteLimiter`].
pub struct ReconciliationClient<R> {
    remote: R,
    session: Arc<Session>,
    scheduler: SimulationScheduler,
}

impl<R: RemoteLimiter> ReconciliationClient<R> {
    #[must_use]
    pub fn new(remote: R, session: Arc<Session>, tick_interval: Duration) -> Self {
        Self {
            remote,
            session,
            scheduler: SimulationScheduler::new(tick_interval),
        }
    }

    #[must_use]
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    #[must_use]
    pub fn remote(&self) -> &R {
        &self.remote
    }

    #[must_use]
    pub fn profile(&self) -> &'static AlgorithmProfile {
        self.session.profile()
    }

    #[must_use]
    pub fn is_simulating(&self) -> bool {
        self.scheduler.is_running()
    }

    /// Configure the remote limiter and, on success, reset the local model.
    ///
    /// Input is validated before any network call. On rejection or transport
    /// failure the current model (if any) is left untouched.
    pub async fn configure(&self, capacity: f64, rate_per_second: f64) -> Result<ConfigureOutcome> {
        let profile = self.profile();
        let whole_capacity = match validate_request(capacity, rate_per_second) {
            Ok(c) => c,
            Err(err) => {
                self.session.record(
                    "Please enter valid positive numbers for Capacity and Rate.",
                    Severity::Failure,
                );
                return Err(err);
            }
        };

        let _guard = self.session.begin_configure()?;
        self.session.record(
            format!("Attempting to configure {} on server...", profile.kind),
            Severity::Info,
        );

        let request = ConfigureRequest::new(profile, whole_capacity, rate_per_second);
        let reply = match self.remote.configure(&request).await {
            Ok(reply) => reply,
            Err(err) => {
                self.session.record(
                    format!(
                        "Network Error during configuration: {err}. Check API endpoint or server status."
                    ),
                    Severity::Failure,
                );
                return Err(Error::NetworkUnavailable(err.to_string()));
            }
        };

        if !reply.is_success() {
            self.record_failed(&reply);
            tracing::warn!(
                algorithm = %profile.kind,
                status = reply.status,
                "remote limiter rejected configuration"
            );
            return Err(Error::RemoteRejected {
                status: reply.status,
                message: reply.message().to_string(),
            });
        }

        let (capacity, rate_per_second) = adopt_echo(profile, &reply, capacity, rate_per_second);
        let model = RateLimiterModel::new(profile, capacity, rate_per_second, self.session.now_ms())?;
        let generation = self.session.install(model);

        self.session.record(
            format!("Server Response: SUCCESS - {}", reply.message()),
            Severity::Success,
        );
        self.session.record(
            format!(
                "{} configured on server: Capacity={capacity}, Rate={rate_per_second} per second.",
                profile.labels.title
            ),
            Severity::Info,
        );
        tracing::info!(
            algorithm = %profile.kind,
            generation,
            capacity,
            rate = rate_per_second,
            "rate limiter configured"
        );

        self.scheduler.start(Arc::clone(&self.session));

        Ok(ConfigureOutcome {
            generation,
            capacity,
            rate_per_second,
            message: reply.message().to_string(),
        })
    }

    /// Perform one action against the remote limiter.
    ///
    /// The local prediction is evolved before the call so it reflects elapsed
    /// time even if the call fails. A reported level is adopted whatever the
    /// status; a non-2xx status is then surfaced as [`Error::RemoteRejected`].
    pub async fn perform_action(&self) -> Result<ActionOutcome> {
        let profile = self.profile();
        let (_guard, generation) = match self.session.begin_action() {
            Ok(claimed) => claimed,
            Err(err) => {
                if matches!(err, Error::NotConfigured) {
                    self.session.record(
                        "Configure the bucket before sending requests.",
                        Severity::Failure,
                    );
                }
                return Err(err);
            }
        };

        self.session.record(
            format!(
                "Attempting to {} via {}...",
                profile.labels.action_verb, profile.endpoint_path
            ),
            Severity::Info,
        );

        let reply = match self.remote.act(profile.kind).await {
            Ok(reply) => reply,
            Err(err) => {
                self.session.record(
                    format!("Network Error: {err}. Check API endpoint or server status."),
                    Severity::Failure,
                );
                return Err(Error::NetworkUnavailable(err.to_string()));
            }
        };

        let field = profile.current_field_name;
        let server_level = reply.number(field);
        let stale = match server_level {
            Some(level) => !self.session.adopt_level(generation, level),
            None => self.session.generation() != generation,
        };

        let outcome = ActionOutcome {
            generation,
            status: reply.status,
            message: reply.message().to_string(),
            server_level,
            missing_field: server_level.is_none().then_some(field),
            stale,
        };

        if stale {
            self.session.record(
                format!(
                    "Discarded response (Status: {}) from a superseded configuration.",
                    reply.status
                ),
                Severity::Info,
            );
            tracing::debug!(
                algorithm = %profile.kind,
                generation,
                current = self.session.generation(),
                "stale action response discarded"
            );
            return Ok(outcome);
        }

        if outcome.missing_field.is_some() {
            self.session.record(
                format!("Warning: Server response did not contain {field}."),
                Severity::Info,
            );
        }

        if reply.is_success() {
            self.session.record(
                format!(
                    "Server Response: SUCCESS (Status: {}) - {}",
                    reply.status,
                    reply.message()
                ),
                Severity::Success,
            );
            tracing::debug!(
                algorithm = %profile.kind,
                generation,
                status = reply.status,
                level = ?server_level,
                "action admitted"
            );
            Ok(outcome)
        } else {
            self.record_failed(&reply);
            tracing::debug!(
                algorithm = %profile.kind,
                generation,
                status = reply.status,
                level = ?server_level,
                "action rejected"
            );
            Err(Error::RemoteRejected {
                status: reply.status,
                message: outcome.message,
            })
        }
    }

    /// End the session: stop the simulation driver.
    pub fn shutdown(&self) {
        self.scheduler.stop();
    }

    fn record_failed(&self, reply: &RemoteReply) {
        self.session.record(
            format!(
                "Server Response: FAILED (Status: {}) - {}",
                reply.status,
                reply.message()
            ),
            Severity::Failure,
        );
    }
}

/// Client-side validation: the model's rule plus a whole-number capacity,
/// since the wire carries capacity as an integer.
fn validate_request(capacity: f64, rate_per_second: f64) -> Result<u64> {
    bucket::validate(capacity, rate_per_second)?;
    if capacity.fract() != 0.0 || capacity >= u64::MAX as f64 {
        return Err(Error::InvalidConfiguration(format!(
            "capacity must be a whole number (got {capacity})"
        )));
    }
    Ok(capacity as u64)
}

/// Prefer the server's echoed capacity and rate when they are present and
/// valid; otherwise keep what was requested.
fn adopt_echo(
    profile: &AlgorithmProfile,
    reply: &RemoteReply,
    requested_capacity: f64,
    requested_rate: f64,
) -> (f64, f64) {
    let echoed = (
        reply.number("capacity"),
        reply.number(profile.rate_parameter_name),
    );
    match echoed {
        (Some(capacity), Some(rate)) if bucket::validate(capacity, rate).is_ok() => {
            (capacity, rate)
        }
        (None, None) => (requested_capacity, requested_rate),
        _ => {
            tracing::warn!(
                algorithm = %profile.kind,
                echoed_capacity = ?echoed.0,
                echoed_rate = ?echoed.1,
                "configuration echo incomplete or invalid; using requested values"
            );
            (requested_capacity, requested_rate)
        }
    }
}
