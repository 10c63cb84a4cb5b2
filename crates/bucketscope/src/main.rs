//! bucketscope CLI (`bscope`)
//!
//! Drives a remote token-bucket or leaky-bucket limiter and shows the local
//! prediction next to what the server reports.
//!
//! ## Quick Start
//!
//! ```bash
//! # Limiter service on localhost:8888 (default)
//! bscope profiles
//! bscope configure --capacity 10 --rate 2 --requests 12 --spacing-ms 250
//! bscope --algorithm leaky-bucket visualize --capacity 5 --rate 1
//! ```
//!
//! ## Configuration
//!
//! Settings come from `bucketscope.toml` (see `bucketscope_core::config`),
//! then environment variables, then flags:
//! - `BUCKETSCOPE_CONFIG`: config file path
//! - `BUCKETSCOPE_ENDPOINT`: limiter base URL
//! - `BUCKETSCOPE_ALGORITHM`: `token-bucket` or `leaky-bucket`
//! - `BUCKETSCOPE_LOG`: diagnostic log level

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use bucketscope_core::logging::{LogError, LogFormat, init_logging};
use bucketscope_core::{
    ActionOutcome, AlgorithmProfile, BucketSnapshot, Config, ConfigureOutcome, LogEntry,
    MonotonicClock, ReconciliationClient, Session,
};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio::sync::broadcast;

mod http;
mod interactive;
mod render;

use http::HttpRemote;

#[derive(Parser)]
#[command(name = "bscope", version)]
#[command(about = "Token/leaky bucket rate-limiter visualizer", long_about = None)]
struct Cli {
    /// Config file (default: $BUCKETSCOPE_CONFIG, then the platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Limiter service base URL
    #[arg(long, global = true, env = "BUCKETSCOPE_ENDPOINT")]
    endpoint: Option<String>,

    /// Algorithm: token-bucket or leaky-bucket
    #[arg(short, long, global = true, env = "BUCKETSCOPE_ALGORITHM")]
    algorithm: Option<String>,

    /// Simulation tick interval in milliseconds
    #[arg(long, global = true)]
    tick_ms: Option<u64>,

    /// Diagnostic log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "BUCKETSCOPE_LOG")]
    log_level: Option<String>,

    /// Diagnostic log format (pretty or json)
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List supported algorithms
    Profiles {
        #[arg(long)]
        json: bool,
    },

    /// Configure the limiter, optionally send requests, and report
    Configure {
        #[arg(long, allow_hyphen_values = true)]
        capacity: f64,

        /// Refill or leak rate per second
        #[arg(long, allow_hyphen_values = true)]
        rate: f64,

        /// Requests to send after configuring
        #[arg(long, default_value_t = 0)]
        requests: u32,

        /// Delay between requests in milliseconds
        #[arg(long, default_value_t = 500)]
        spacing_ms: u64,

        #[arg(long)]
        json: bool,
    },

    /// Interactive session: send requests and watch the bucket evolve
    Visualize {
        /// Configure on start (requires --rate)
        #[arg(long, requires = "rate")]
        capacity: Option<f64>,

        #[arg(long, requires = "capacity")]
        rate: Option<f64>,
    },
}

/// Load the config file and layer CLI/env overrides on top.
fn resolve(cli: &Cli) -> Result<(Config, &'static AlgorithmProfile)> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(endpoint) = &cli.endpoint {
        config.remote.base_url = endpoint.clone();
    }
    if let Some(algorithm) = &cli.algorithm {
        config.session.algorithm = algorithm.clone();
    }
    if let Some(tick_ms) = cli.tick_ms {
        config.simulation.tick_interval_ms = tick_ms;
    }
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    if let Some(format) = cli.log_format {
        config.logging.format = format;
    }

    let profile = AlgorithmProfile::lookup(&config.session.algorithm)?;
    config
        .validate()
        .map_err(bucketscope_core::Error::from)?;
    Ok((config, profile))
}

fn build_client(
    config: &Config,
    profile: &'static AlgorithmProfile,
) -> ReconciliationClient<HttpRemote> {
    let session = Arc::new(Session::new(
        profile,
        Arc::new(MonotonicClock::new()),
        config.simulation.history_limit,
    ));
    ReconciliationClient::new(
        HttpRemote::new(&config.remote.base_url),
        session,
        config.tick_interval(),
    )
}

fn drain_log(rx: &mut broadcast::Receiver<LogEntry>, into: &mut Vec<LogEntry>, print: bool) {
    loop {
        match rx.try_recv() {
            Ok(entry) => {
                if print {
                    println!("{}", render::local_log(&entry));
                }
                into.push(entry);
            }
            Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "log drain lagged");
            }
            Err(_) => break,
        }
    }
}

#[derive(Serialize)]
struct ActionReport {
    outcome: Option<ActionOutcome>,
    error: Option<String>,
    snapshot: Option<BucketSnapshot>,
}

#[derive(Serialize)]
struct ConfigureReport {
    configured: ConfigureOutcome,
    actions: Vec<ActionReport>,
    log: Vec<LogEntry>,
}

async fn configure_command(
    config: &Config,
    profile: &'static AlgorithmProfile,
    capacity: f64,
    rate: f64,
    requests: u32,
    spacing: Duration,
    json: bool,
) -> Result<()> {
    let client = build_client(config, profile);
    let mut log_rx = client.session().subscribe_log();
    let mut log = Vec::new();

    let configured = client.configure(capacity, rate).await;
    drain_log(&mut log_rx, &mut log, !json);
    let configured = match configured {
        Ok(outcome) => outcome,
        Err(err) => {
            client.shutdown();
            return Err(err.into());
        }
    };
    if !json {
        if let Some(snapshot) = client.session().snapshot() {
            println!("{}", render::local_gauge(profile, &snapshot));
        }
    }

    let mut actions = Vec::with_capacity(requests as usize);
    for i in 0..requests {
        if i > 0 && !spacing.is_zero() {
            tokio::time::sleep(spacing).await;
        }
        let result = client.perform_action().await;
        drain_log(&mut log_rx, &mut log, !json);
        let snapshot = client.session().snapshot();
        if !json {
            if let Some(snapshot) = &snapshot {
                println!("{}", render::local_gauge(profile, snapshot));
            }
        }
        let (outcome, error) = match result {
            Ok(outcome) => (Some(outcome), None),
            Err(err) => (None, Some(err.to_string())),
        };
        actions.push(ActionReport {
            outcome,
            error,
            snapshot,
        });
    }
    client.shutdown();

    if json {
        let report = ConfigureReport {
            configured,
            actions,
            log,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let (config, profile) = resolve(&cli)?;
    match init_logging(&config.logging) {
        Ok(()) | Err(LogError::AlreadyInitialized) => {}
        Err(err) => return Err(err).context("failed to initialize logging"),
    }
    tracing::debug!(
        algorithm = %profile.kind,
        endpoint = %config.remote.base_url,
        tick_ms = config.simulation.tick_interval_ms,
        "bscope starting"
    );

    match cli.command {
        Commands::Profiles { json } => {
            let profiles = AlgorithmProfile::all();
            if json {
                println!("{}", serde_json::to_string_pretty(&profiles)?);
            } else {
                let blocks: Vec<String> = profiles.iter().map(|p| render::profile_block(p)).collect();
                println!("{}", blocks.join("\n\n"));
            }
        }
        Commands::Configure {
            capacity,
            rate,
            requests,
            spacing_ms,
            json,
        } => {
            configure_command(
                &config,
                profile,
                capacity,
                rate,
                requests,
                Duration::from_millis(spacing_ms),
                json,
            )
            .await?;
        }
        Commands::Visualize { capacity, rate } => {
            let client = build_client(&config, profile);
            interactive::run(client, capacity.zip(rate)).await?;
        }
    }
    Ok(())
}

fn report(err: &anyhow::Error) {
    if let Some(core) = err.downcast_ref::<bucketscope_core::Error>() {
        eprintln!("error: {core}");
        if let Some(remediation) = core.remediation() {
            eprint!("{}", remediation.render_plain());
        }
    } else {
        eprintln!("error: {err:#}");
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report(&err);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn flags_override_config() {
        let cli = Cli::try_parse_from([
            "bscope",
            "--endpoint",
            "http://127.0.0.1:9999",
            "--algorithm",
            "leaky_bucket",
            "--tick-ms",
            "50",
            "profiles",
        ])
        .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bucketscope.toml");
        std::fs::write(&path, "[simulation]\nhistory_limit = 10\n").unwrap();
        let cli = Cli {
            config: Some(path),
            ..cli
        };

        let (config, profile) = resolve(&cli).unwrap();
        assert_eq!(config.remote.base_url, "http://127.0.0.1:9999");
        assert_eq!(config.simulation.tick_interval_ms, 50);
        assert_eq!(config.simulation.history_limit, 10);
        assert_eq!(profile.endpoint_path, "/leaky-bucket");
    }

    #[test]
    fn unknown_algorithm_is_reported_as_such() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bucketscope.toml");
        std::fs::write(&path, "").unwrap();
        let cli = Cli::try_parse_from([
            "bscope",
            "--config",
            path.to_str().unwrap(),
            "--algorithm",
            "fixed-window",
            "profiles",
        ])
        .unwrap();
        let err = resolve(&cli).unwrap_err();
        let core = err.downcast_ref::<bucketscope_core::Error>().unwrap();
        assert!(core.is_fatal());
    }

    #[test]
    fn negative_capacity_parses_for_client_side_validation() {
        let cli = Cli::try_parse_from(["bscope", "configure", "--capacity", "-1", "--rate", "2"])
            .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Configure { capacity, .. } if capacity == -1.0
        ));
    }
}
