//! bucketscope-core: rate-limiter visualizer core
//!
//! Keeps a local prediction of a remote token bucket or leaky bucket in step
//! with the service that actually enforces it.
//!
//! # Architecture
//!
//! ```text
//!  user ──configure/act──► ReconciliationClient ──HTTP──► remote limiter
//!                               │      ▲
//!                      install/adopt   │ reply
//!                               ▼      │
//!  SimulationScheduler ──tick──► Session (model + generation)
//!                                   │
//!                        snapshots (watch) + EventLog (broadcast)
//!                                   ▼
//!                            presentation layer
//! ```
//!
//! # Modules
//!
//! - `profile`: static description of each algorithm variant
//! - `bucket`: the local rate-limiter model and its snapshots
//! - `clock`: time sources (monotonic and manual)
//! - `session`: shared state, generation counter and in-flight slots
//! - `scheduler`: periodic local evolution
//! - `remote`: the remote limiter boundary and wire types
//! - `reconcile`: configure/act round-trips and reconciliation
//! - `events`: bounded, broadcasting session log
//! - `config`: `bucketscope.toml` loading and validation
//! - `logging`: tracing subscriber setup
//! - `error`: error types and remediation hints
//!
//! # Safety
//!
//! This crate forbids unsafe code.

#![forbid(unsafe_code)]

pub mod bucket;
pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod profile;
pub mod reconcile;
pub mod remote;
pub mod scheduler;
pub mod session;

pub use bucket::{BucketSnapshot, RateLimiterModel};
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::Config;
pub use error::{Error, Result};
pub use events::{EventLog, LogEntry, Severity};
pub use profile::{AlgorithmKind, AlgorithmProfile};
pub use reconcile::{ActionOutcome, ConfigureOutcome, ReconciliationClient};
pub use remote::{ConfigureRequest, RemoteLimiter, RemoteReply, TransportError};
pub use scheduler::SimulationScheduler;
pub use session::{Session, SessionPhase};

/// Version of the bucketscope-core library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
