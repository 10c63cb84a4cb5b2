//! Error types for bucketscope-core

use std::fmt::Write;
use thiserror::Error;

use crate::events::Severity;

/// Remediation command for resolving an error
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RemediationCommand {
    /// Short label describing the command purpose
    pub label: String,
    /// Command to run
    pub command: String,
}

/// Actionable remediation guidance for an error
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Remediation {
    /// One-line summary of how to fix the issue
    pub summary: String,
    /// Suggested commands to resolve or diagnose the issue
    pub commands: Vec<RemediationCommand>,
    /// Additional alternative guidance
    pub alternatives: Vec<String>,
}

impl Remediation {
    /// Create a new remediation with a summary
    #[must_use]
    pub fn new(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            commands: Vec::new(),
            alternatives: Vec::new(),
        }
    }

    /// Add a suggested command
    #[must_use]
    pub fn command(mut self, label: impl Into<String>, command: impl Into<String>) -> Self {
        self.commands.push(RemediationCommand {
            label: label.into(),
            command: command.into(),
        });
        self
    }

    /// Add an alternative suggestion
    #[must_use]
    pub fn alternative(mut self, alternative: impl Into<String>) -> Self {
        self.alternatives.push(alternative.into());
        self
    }

    /// Render remediation text for human-readable output
    #[must_use]
    pub fn render_plain(&self) -> String {
        let mut output = String::new();
        let _ = writeln!(output, "To fix:");
        let _ = writeln!(output, "  {}", self.summary);

        if !self.commands.is_empty() {
            let _ = writeln!(output, "  Commands:");
            for cmd in &self.commands {
                let _ = writeln!(output, "    - {}: {}", cmd.label, cmd.command);
            }
        }

        if !self.alternatives.is_empty() {
            let _ = writeln!(output, "  Alternatives:");
            for alt in &self.alternatives {
                let _ = writeln!(output, "    - {alt}");
            }
        }

        output
    }
}

/// Result type alias using the library's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for bucketscope-core
#[derive(Error, Debug)]
pub enum Error {
    /// Capacity or rate rejected before any network call
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Selector does not name a known algorithm; fatal for the session
    #[error("Unknown algorithm: {0}")]
    UnknownAlgorithm(String),

    /// Transport-level failure talking to the remote limiter
    #[error("Network unavailable: {0}")]
    NetworkUnavailable(String),

    /// Remote limiter answered with a non-2xx status
    #[error("Remote rejected request (status {status}): {message}")]
    RemoteRejected { status: u16, message: String },

    /// A response lacked a field the session relies on
    #[error("Response did not contain `{field}`")]
    IncompleteResponse { field: &'static str },

    /// Action attempted before any successful configuration
    #[error("Rate limiter is not configured")]
    NotConfigured,

    /// Another user-triggered call is still outstanding
    #[error("Another request is already in flight")]
    CallInFlight,

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Severity used when this error is surfaced in the session log.
    ///
    /// A missing field is only a warning: the local prediction is kept and
    /// the rest of the response still counts.
    #[must_use]
    pub const fn severity(&self) -> Severity {
        match self {
            Self::IncompleteResponse { .. } => Severity::Info,
            _ => Severity::Failure,
        }
    }

    /// Whether the session cannot continue after this error.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::UnknownAlgorithm(_))
    }

    /// Return remediation guidance when available.
    #[must_use]
    pub fn remediation(&self) -> Option<Remediation> {
        match self {
            Self::InvalidConfiguration(_) => Some(
                Remediation::new("Enter a positive whole capacity and a non-negative rate.")
                    .command("Example", "bscope configure --capacity 10 --rate 2"),
            ),
            Self::UnknownAlgorithm(_) => Some(
                Remediation::new("Select one of the supported algorithms.")
                    .command("List algorithms", "bscope profiles"),
            ),
            Self::NetworkUnavailable(_) => Some(
                Remediation::new("Check the limiter endpoint and that the service is running.")
                    .command("Override endpoint", "bscope --endpoint http://localhost:8888 ...")
                    .alternative("Set BUCKETSCOPE_ENDPOINT to the service base URL."),
            ),
            Self::RemoteRejected { status: 429, .. } => Some(
                Remediation::new("The limiter throttled the request. Wait for the bucket to recover."),
            ),
            Self::RemoteRejected { .. } => Some(
                Remediation::new("The limiter refused the request. Reconfigure and retry.")
                    .alternative("A restarted service forgets its configuration."),
            ),
            Self::IncompleteResponse { .. } => None,
            Self::NotConfigured => Some(
                Remediation::new("Configure the bucket before sending requests.")
                    .command("Configure", "bscope configure --capacity 10 --rate 2"),
            ),
            Self::CallInFlight => Some(Remediation::new(
                "Wait for the outstanding request to finish, then retry.",
            )),
            Self::Config(err) => Some(err.remediation()),
            Self::Io(_) => Some(
                Remediation::new("Check filesystem permissions and paths, then retry.")
                    .alternative("Verify the log file directory exists and is writable."),
            ),
        }
    }
}

/// Configuration file errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to read config file {0}: {1}")]
    ReadFailed(String, String),

    #[error("Failed to parse config: {0}")]
    ParseFailed(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl ConfigError {
    #[must_use]
    pub fn remediation(&self) -> Remediation {
        match self {
            Self::FileNotFound(path) => Remediation::new(format!(
                "Config file not found: {path}. Verify the path and retry."
            ))
            .command("Check path", format!("ls -l \"{path}\""))
            .alternative("Pass --config with the correct path."),
            Self::ReadFailed(path, _) => Remediation::new(format!(
                "Failed to read config file: {path}. Check permissions."
            ))
            .command("Check permissions", format!("ls -l \"{path}\"")),
            Self::ParseFailed(_) => Remediation::new("Config parse failed. Fix the TOML syntax and retry.")
                .alternative("Delete the file to fall back to defaults."),
            Self::ValidationError(_) => {
                Remediation::new("Config validation failed. Fix the invalid fields and retry.")
                    .alternative("Review bucketscope.toml against the documented defaults.")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_unknown_algorithm_is_fatal() {
        assert!(Error::UnknownAlgorithm("fixed-window".into()).is_fatal());
        assert!(!Error::NotConfigured.is_fatal());
        assert!(!Error::NetworkUnavailable("refused".into()).is_fatal());
        assert!(!Error::InvalidConfiguration("capacity".into()).is_fatal());
    }

    #[test]
    fn incomplete_response_is_a_warning() {
        let err = Error::IncompleteResponse {
            field: "currentTokens",
        };
        assert_eq!(err.severity(), Severity::Info);
        assert_eq!(err.to_string(), "Response did not contain `currentTokens`");
        assert!(err.remediation().is_none());
    }

    #[test]
    fn rejected_display_carries_status_and_message() {
        let err = Error::RemoteRejected {
            status: 429,
            message: "Too Many Requests. Please try again later.".into(),
        };
        assert_eq!(err.severity(), Severity::Failure);
        assert!(err.to_string().contains("status 429"));
        assert!(err.to_string().contains("Too Many Requests"));
    }

    #[test]
    fn remediation_renders_sections() {
        let text = Error::NotConfigured
            .remediation()
            .expect("remediation")
            .render_plain();
        assert!(text.starts_with("To fix:"));
        assert!(text.contains("Commands:"));
        assert!(text.contains("bscope configure"));
    }

    #[test]
    fn config_errors_convert() {
        let err: Error = ConfigError::ValidationError("tick_interval_ms".into()).into();
        assert!(matches!(err, Error::Config(_)));
        let rendered = err.remediation().expect("remediation").render_plain();
        assert!(rendered.contains("validation failed"));
    }
}
