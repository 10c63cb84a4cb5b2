//! Local model of a remote rate limiter's bucket.
//!
//! The model predicts how the remote bucket evolves between round-trips and
//! adopts the remote's reported level whenever one arrives.
//!
//! # Algorithm
//!
//! - The bucket holds a `level` in `[0, capacity]`.
//! - `evolve(now)` moves the level by `elapsed_secs * rate_per_second`:
//!   upward for a token bucket (refill), downward for a leaky bucket (leak).
//! - `overwrite_level` replaces the prediction with the remote's value.
//!
//! Evolution is lazy and timestamp-based: no background work happens inside
//! the model; the scheduler decides when to call [`RateLimiterModel::evolve`].

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::profile::{AlgorithmKind, AlgorithmProfile, Direction, InitialLevel};

// =============================================================================
// RateLimiterModel
// =============================================================================

/// Predicted bucket state for one configured session.
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimiterModel {
    kind: AlgorithmKind,
    direction: Direction,
    /// Upper bound on `level`.
    capacity: f64,
    /// Magnitude of level change per elapsed second.
    rate_per_second: f64,
    /// Current level, always within `[0, capacity]`.
    level: f64,
    /// Last instant the level was known-accurate (epoch ms).
    last_sync_ms: u64,
}

/// Validate a capacity/rate pair.
///
/// Capacity must be finite and positive, rate finite and non-negative.
pub fn validate(capacity: f64, rate_per_second: f64) -> Result<()> {
    if !capacity.is_finite() || capacity <= 0.0 {
        return Err(Error::InvalidConfiguration(format!(
            "capacity must be a positive number (got {capacity})"
        )));
    }
    if !rate_per_second.is_finite() || rate_per_second < 0.0 {
        return Err(Error::InvalidConfiguration(format!(
            "rate must be a non-negative number (got {rate_per_second})"
        )));
    }
    Ok(())
}

impl RateLimiterModel {
    /// Build a freshly configured model for `profile`.
    pub fn new(
        profile: &AlgorithmProfile,
        capacity: f64,
        rate_per_second: f64,
        now_ms: u64,
    ) -> Result<Self> {
        validate(capacity, rate_per_second)?;
        Ok(Self {
            kind: profile.kind,
            direction: profile.direction,
            capacity,
            rate_per_second,
            level: initial_level(profile.initial_level, capacity),
            last_sync_ms: now_ms,
        })
    }

    /// Advance the prediction to `now_ms`.
    ///
    /// A clock that appears to run backward contributes zero elapsed time;
    /// the sync timestamp still moves to `now_ms` so later calls measure
    /// from the new timeline.
    pub fn evolve(&mut self, now_ms: u64) {
        let elapsed_secs = now_ms.saturating_sub(self.last_sync_ms) as f64 / 1000.0;
        let delta = elapsed_secs * self.rate_per_second;
        self.level = match self.direction {
            Direction::Increasing => (self.level + delta).min(self.capacity),
            Direction::Decreasing => (self.level - delta).max(0.0),
        };
        self.last_sync_ms = now_ms;
    }

    /// Replace capacity and rate and reset the level per `initial`.
    ///
    /// Validation happens first; on error nothing is modified. Sessions
    /// install a fresh model on reconfiguration instead, so the generation
    /// changes and late replies for the old settings are discarded.
    pub fn reconfigure(
        &mut self,
        capacity: f64,
        rate_per_second: f64,
        initial: InitialLevel,
        now_ms: u64,
    ) -> Result<()> {
        validate(capacity, rate_per_second)?;
        self.capacity = capacity;
        self.rate_per_second = rate_per_second;
        self.level = initial_level(initial, capacity);
        self.last_sync_ms = now_ms;
        Ok(())
    }

    /// Adopt the remote limiter's reported level.
    ///
    /// The value is clamped into `[0, capacity]`; a NaN report is treated as
    /// zero.
    pub fn overwrite_level(&mut self, server_level: f64, now_ms: u64) {
        self.level = clamp_level(server_level, self.capacity);
        self.last_sync_ms = now_ms;
    }

    #[must_use]
    pub fn kind(&self) -> AlgorithmKind {
        self.kind
    }

    #[must_use]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    #[must_use]
    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    #[must_use]
    pub fn rate_per_second(&self) -> f64 {
        self.rate_per_second
    }

    #[must_use]
    pub fn level(&self) -> f64 {
        self.level
    }

    #[must_use]
    pub fn last_sync_ms(&self) -> u64 {
        self.last_sync_ms
    }

    /// Read-only view handed to the presentation layer.
    #[must_use]
    pub fn snapshot(&self, generation: u64) -> BucketSnapshot {
        BucketSnapshot {
            kind: self.kind,
            level: self.level,
            capacity: self.capacity,
            rate_per_second: self.rate_per_second,
            last_sync_ms: self.last_sync_ms,
            fill_ratio: self.level / self.capacity,
            generation,
        }
    }
}

fn initial_level(initial: InitialLevel, capacity: f64) -> f64 {
    match initial {
        InitialLevel::Full => capacity,
        InitialLevel::Empty => 0.0,
    }
}

fn clamp_level(level: f64, capacity: f64) -> f64 {
    if level.is_nan() {
        return 0.0;
    }
    level.clamp(0.0, capacity)
}

// =============================================================================
// BucketSnapshot (serializable)
// =============================================================================

/// Serializable read-only view of the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketSnapshot {
    pub kind: AlgorithmKind,
    /// Current (predicted or server-reported) level.
    pub level: f64,
    pub capacity: f64,
    pub rate_per_second: f64,
    /// Last instant the level was known-accurate (epoch ms).
    pub last_sync_ms: u64,
    /// level / capacity, in `[0, 1]`.
    pub fill_ratio: f64,
    /// Configuration generation the snapshot belongs to.
    pub generation: u64,
}

// =============================================================================
// Tests
// =============================================================================
