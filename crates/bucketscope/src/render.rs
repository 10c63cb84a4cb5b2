//! Terminal rendering of snapshots and session log entries.

use bucketscope_core::{AlgorithmProfile, BucketSnapshot, LogEntry, Severity};
use chrono::{DateTime, Local, TimeZone};

/// Width of the gauge bar in cells.
pub const GAUGE_WIDTH: usize = 20;

/// `HH:MM:SS` for an epoch-ms timestamp in `tz`.
pub fn clock_time<Tz: TimeZone>(at_ms: u64, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    DateTime::from_timestamp_millis(at_ms as i64).map_or_else(
        || "--:--:--".to_string(),
        |utc| utc.with_timezone(tz).format("%H:%M:%S").to_string(),
    )
}

/// Filled portion of the gauge, rounded to the nearest cell.
fn filled_cells(fill_ratio: f64, width: usize) -> usize {
    if !fill_ratio.is_finite() {
        return 0;
    }
    ((fill_ratio.clamp(0.0, 1.0) * width as f64).round() as usize).min(width)
}

/// `[#####---------------] 5.00 / 20  Last Refill: 12:00:01`
pub fn gauge_line<Tz: TimeZone>(
    profile: &AlgorithmProfile,
    snapshot: &BucketSnapshot,
    tz: &Tz,
) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let filled = filled_cells(snapshot.fill_ratio, GAUGE_WIDTH);
    format!(
        "[{}{}] {:.2} / {}  {}: {}",
        "#".repeat(filled),
        "-".repeat(GAUGE_WIDTH - filled),
        snapshot.level,
        snapshot.capacity,
        profile.labels.last_update,
        clock_time(snapshot.last_sync_ms, tz),
    )
}

fn severity_tag(severity: Severity) -> &'static str {
    match severity {
        Severity::Info => "info",
        Severity::Success => " ok ",
        Severity::Failure => "FAIL",
    }
}

pub fn log_line<Tz: TimeZone>(entry: &LogEntry, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!(
        "{} [{}] {}",
        clock_time(entry.at_ms, tz),
        severity_tag(entry.severity),
        entry.message
    )
}

/// Gauge line in the local timezone.
pub fn local_gauge(profile: &AlgorithmProfile, snapshot: &BucketSnapshot) -> String {
    gauge_line(profile, snapshot, &Local)
}

/// Log line in the local timezone.
pub fn local_log(entry: &LogEntry) -> String {
    log_line(entry, &Local)
}

/// Multi-line description of a profile for `bscope profiles`.
pub fn profile_block(profile: &AlgorithmProfile) -> String {
    let labels = &profile.labels;
    format!(
        "{} ({})\n  {}\n  endpoint:     {}\n  rate field:   {} ({})\n  level field:  {} ({})\n  action:       {}",
        labels.title,
        profile.kind,
        labels.description,
        profile.endpoint_path,
        profile.rate_parameter_name,
        labels.rate,
        profile.current_field_name,
        labels.current,
        labels.action,
    )
}
