//! Algorithm profiles: the static, per-variant constants of a session.
//!
//! A profile decides which way the level moves over time, where a freshly
//! configured bucket starts, which endpoint serves the variant and which
//! wire fields carry the rate and the current level. Profiles are selected
//! once per session and never mutated.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// =============================================================================
// Variant descriptors
// =============================================================================

/// Which traffic-shaping algorithm a session visualizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AlgorithmKind {
    TokenBucket,
    LeakyBucket,
}

impl AlgorithmKind {
    /// Canonical selector string (`token-bucket` / `leaky-bucket`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TokenBucket => "token-bucket",
            Self::LeakyBucket => "leaky-bucket",
        }
    }

    #[must_use]
    pub fn profile(self) -> &'static AlgorithmProfile {
        match self {
            Self::TokenBucket => &TOKEN_BUCKET,
            Self::LeakyBucket => &LEAKY_BUCKET,
        }
    }
}

impl std::fmt::Display for AlgorithmKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AlgorithmKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        match normalized.as_str() {
            "token-bucket" | "tokenbucket" => Ok(Self::TokenBucket),
            "leaky-bucket" | "leakybucket" => Ok(Self::LeakyBucket),
            _ => Err(Error::UnknownAlgorithm(s.to_string())),
        }
    }
}

/// Where the level starts after a successful configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitialLevel {
    /// Token bucket: starts at capacity.
    Full,
    /// Leaky bucket: starts with an empty queue.
    Empty,
}

/// Sign of the time-evolution step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Tokens accumulate toward capacity.
    Increasing,
    /// The queue drains toward zero.
    Decreasing,
}

/// User-facing wording for a variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProfileLabels {
    pub title: &'static str,
    pub description: &'static str,
    pub capacity: &'static str,
    pub rate: &'static str,
    pub current: &'static str,
    pub last_update: &'static str,
    pub action: &'static str,
    /// Completes "Attempting to ..." when an action is sent.
    pub action_verb: &'static str,
}

/// Immutable per-variant descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AlgorithmProfile {
    pub kind: AlgorithmKind,
    /// Form field carrying the per-second rate on configuration.
    pub rate_parameter_name: &'static str,
    /// Response field reporting the authoritative level.
    pub current_field_name: &'static str,
    pub initial_level: InitialLevel,
    pub direction: Direction,
    /// Fixed endpoint path, appended to the service base URL.
    pub endpoint_path: &'static str,
    pub labels: ProfileLabels,
}

pub static TOKEN_BUCKET: AlgorithmProfile = AlgorithmProfile {
    kind: AlgorithmKind::TokenBucket,
    rate_parameter_name: "refillRate",
    current_field_name: "currentTokens",
    initial_level: InitialLevel::Full,
    direction: Direction::Increasing,
    endpoint_path: "/token-bucket",
    labels: ProfileLabels {
        title: "Token Bucket",
        description: "Tokens refill at a fixed rate up to capacity; each request consumes one.",
        capacity: "Bucket Capacity (Tokens)",
        rate: "Refill Rate (Tokens/Second)",
        current: "Current Tokens",
        last_update: "Last Refill",
        action: "Send Single Request",
        action_verb: "consume a token",
    },
};

pub static LEAKY_BUCKET: AlgorithmProfile = AlgorithmProfile {
    kind: AlgorithmKind::LeakyBucket,
    rate_parameter_name: "leakRate",
    current_field_name: "currentSize",
    initial_level: InitialLevel::Empty,
    direction: Direction::Decreasing,
    endpoint_path: "/leaky-bucket",
    labels: ProfileLabels {
        title: "Leaky Bucket",
        description: "Requests queue up to capacity and leak out at a fixed rate.",
        capacity: "Bucket Capacity (Requests)",
        rate: "Leak Rate (Requests/Second)",
        current: "Current Queue Size",
        last_update: "Last Leak",
        action: "Add Request to Queue",
        action_verb: "add a request to the queue",
    },
};

impl AlgorithmProfile {
    /// Resolve a selector such as `token-bucket` or `leaky_bucket`.
    pub fn lookup(selector: &str) -> Result<&'static Self> {
        let kind: AlgorithmKind = selector.parse()?;
        Ok(kind.profile())
    }

    /// Every supported profile, in menu order.
    #[must_use]
    pub fn all() -> [&'static Self; 2] {
        [&TOKEN_BUCKET, &LEAKY_BUCKET]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_bucket_constants() {
        let p = AlgorithmProfile::lookup("token-bucket").unwrap();
        assert_eq!(p.kind, AlgorithmKind::TokenBucket);
        assert_eq!(p.rate_parameter_name, "refillRate");
        assert_eq!(p.current_field_name, "currentTokens");
        assert_eq!(p.initial_level, InitialLevel::Full);
        assert_eq!(p.direction, Direction::Increasing);
        assert_eq!(p.endpoint_path, "/token-bucket");
    }

    #[test]
    fn leaky_bucket_constants() {
        let p = AlgorithmProfile::lookup("leaky-bucket").unwrap();
        assert_eq!(p.kind, AlgorithmKind::LeakyBucket);
        assert_eq!(p.rate_parameter_name, "leakRate");
        assert_eq!(p.current_field_name, "currentSize");
        assert_eq!(p.initial_level, InitialLevel::Empty);
        assert_eq!(p.direction, Direction::Decreasing);
        assert_eq!(p.labels.last_update, "Last Leak");
    }

    #[test]
    fn selectors_are_lenient_about_case_and_separator() {
        for s in ["TOKEN-BUCKET", "token_bucket", " TokenBucket "] {
            assert_eq!(s.parse::<AlgorithmKind>().unwrap(), AlgorithmKind::TokenBucket);
        }
        assert_eq!(
            "Leaky_Bucket".parse::<AlgorithmKind>().unwrap(),
            AlgorithmKind::LeakyBucket
        );
    }

    #[test]
    fn unknown_selector_is_fatal() {
        let err = AlgorithmProfile::lookup("sliding-window").unwrap_err();
        assert!(matches!(err, Error::UnknownAlgorithm(ref s) if s == "sliding-window"));
        assert!(err.is_fatal());
    }

    #[test]
    fn kind_round_trips_through_display() {
        for profile in AlgorithmProfile::all() {
            let parsed: AlgorithmKind = profile.kind.to_string().parse().unwrap();
            assert_eq!(parsed, profile.kind);
            assert!(std::ptr::eq(parsed.profile(), profile));
        }
    }

    #[test]
    fn kind_serializes_as_selector() {
        let json = serde_json::to_string(&AlgorithmKind::LeakyBucket).unwrap();
        assert_eq!(json, "\"leaky-bucket\"");
    }
}
