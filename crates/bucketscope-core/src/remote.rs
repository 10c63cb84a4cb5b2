//! Boundary to the authoritative remote rate limiter.
//!
//! The service exposes one endpoint per algorithm. A form-encoded POST
//! (re)configures the limiter; a bodyless GET performs one action (consume a
//! token / enqueue a request). Both answer with a JSON object carrying at
//! least `message`; the status code says whether the call was accepted.
//!
//! This module only describes the exchange. The HTTP implementation lives in
//! the CLI crate so the core stays free of transport dependencies.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::profile::{AlgorithmKind, AlgorithmProfile};

/// Transport-level failure; the request never produced a usable reply.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// Connection refused, DNS failure, reset, timeout from the transport.
    #[error("{0}")]
    Unreachable(String),

    /// A reply arrived but its body was not a JSON object.
    #[error("unreadable response body: {0}")]
    Decode(String),
}

/// Form body of a configuration request.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigureRequest {
    pub kind: AlgorithmKind,
    pub capacity: u64,
    pub rate_parameter_name: &'static str,
    pub rate_per_second: f64,
}

impl ConfigureRequest {
    #[must_use]
    pub fn new(profile: &AlgorithmProfile, capacity: u64, rate_per_second: f64) -> Self {
        Self {
            kind: profile.kind,
            capacity,
            rate_parameter_name: profile.rate_parameter_name,
            rate_per_second,
        }
    }

    /// Key/value pairs in wire order.
    ///
    /// Whole rates are written without a fractional part so integer-only
    /// services accept them.
    #[must_use]
    pub fn form_pairs(&self) -> [(&'static str, String); 2] {
        [
            ("capacity", self.capacity.to_string()),
            (self.rate_parameter_name, format_rate(self.rate_per_second)),
        ]
    }

    /// `application/x-www-form-urlencoded` rendering of [`Self::form_pairs`].
    #[must_use]
    pub fn encode(&self) -> String {
        self.form_pairs()
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&")
    }
}

fn format_rate(rate: f64) -> String {
    if rate.fract() == 0.0 && rate.abs() < 1e15 {
        format!("{}", rate as i64)
    } else {
        rate.to_string()
    }
}

/// A reply from the remote limiter, successful or not.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteReply {
    pub status: u16,
    pub body: Map<String, Value>,
}

impl RemoteReply {
    #[must_use]
    pub fn new(status: u16, body: Map<String, Value>) -> Self {
        Self { status, body }
    }

    /// Parse a raw body; anything but a JSON object is a decode failure.
    pub fn from_body(status: u16, raw: &str) -> Result<Self, TransportError> {
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(body)) => Ok(Self { status, body }),
            Ok(other) => Err(TransportError::Decode(format!(
                "expected a JSON object, got {}",
                json_kind(&other)
            ))),
            Err(err) => Err(TransportError::Decode(err.to_string())),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The `message` field, or an empty string.
    #[must_use]
    pub fn message(&self) -> &str {
        self.body
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    /// A numeric field; numeric strings are accepted too.
    #[must_use]
    pub fn number(&self, field: &str) -> Option<f64> {
        match self.body.get(field)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// The remote authority, one endpoint per algorithm kind.
///
/// Implementations make exactly one attempt per call: no retries, and no
/// timeout beyond what the transport itself applies.
#[allow(async_fn_in_trait)]
pub trait RemoteLimiter: Send + Sync {
    /// POST the configuration form to the endpoint for `request.kind`.
    async fn configure(&self, request: &ConfigureRequest) -> Result<RemoteReply, TransportError>;

    /// GET the endpoint for `kind`, performing one limiter action.
    async fn act(&self, kind: AlgorithmKind) -> Result<RemoteReply, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{LEAKY_BUCKET, TOKEN_BUCKET};

    #[test]
    fn configure_form_uses_variant_rate_field() {
        let req = ConfigureRequest::new(&TOKEN_BUCKET, 10, 2.0);
        assert_eq!(req.encode(), "capacity=10&refillRate=2");

        let req = ConfigureRequest::new(&LEAKY_BUCKET, 5, 0.5);
        assert_eq!(req.encode(), "capacity=5&leakRate=0.5");
    }

    #[test]
    fn reply_reads_message_and_numbers() {
        let reply = RemoteReply::from_body(
            429,
            r#"{"status":"error","message":"Too Many Requests.","currentTokens":0}"#,
        )
        .unwrap();
        assert!(!reply.is_success());
        assert_eq!(reply.message(), "Too Many Requests.");
        assert_eq!(reply.number("currentTokens"), Some(0.0));
        assert_eq!(reply.number("currentSize"), None);
    }

    #[test]
    fn numeric_strings_are_accepted() {
        let reply = RemoteReply::from_body(200, r#"{"capacity":"12","leakRate":"1.5"}"#).unwrap();
        assert_eq!(reply.number("capacity"), Some(12.0));
        assert_eq!(reply.number("leakRate"), Some(1.5));
        assert_eq!(reply.message(), "");
    }

    #[test]
    fn non_object_bodies_fail_to_decode() {
        assert!(matches!(
            RemoteReply::from_body(200, "[1,2]"),
            Err(TransportError::Decode(msg)) if msg.contains("array")
        ));
        assert!(matches!(
            RemoteReply::from_body(502, "<html>Bad Gateway</html>"),
            Err(TransportError::Decode(_))
        ));
    }
}
