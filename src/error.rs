//! Error types shared across the notifier.
//!
//! Only [`ConfigError`] is ever returned synchronously from construction.
//! Everything else is reported through the
//! [`DiagnosticSink`](crate::diagnostics::DiagnosticSink) and, for
//! [`AirbrakeHandler::submit`](crate::AirbrakeHandler::submit), returned for
//! information only.

use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::notifier::FailureKind;

/// Payload construction failed.
#[derive(Debug, Error)]
pub enum BuildError {
    /// A field contains a character XML 1.0 cannot represent.
    #[error("{field} contains a character not allowed in XML: {ch:?}")]
    InvalidCharacter { field: &'static str, ch: char },
    /// The JSON serializer rejected the payload.
    #[error("JSON serialisation failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Network-level failure while delivering a payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The request did not complete within the configured timeout.
    #[error("request to {url} timed out: {message}")]
    Timeout { url: String, message: String },
    /// Connection refused, DNS failure, reset, and similar.
    #[error("request to {url} failed: {message}")]
    Network { url: String, message: String },
}

/// Failures surfaced by the handler and its worker.
#[derive(Debug, Error)]
pub enum NotifierError {
    #[error("failed to build payload: {0}")]
    Build(#[from] BuildError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// The service answered with a non-success status.
    #[error("{reason}")]
    Rejected {
        status: u16,
        reason: String,
        kind: FailureKind,
    },
    /// The worker did not drain within the grace period and was abandoned.
    #[error("delivery worker did not exit within {grace:?}; terminating")]
    ShutdownTimeout { grace: Duration },
    /// The handler has been shut down.
    #[error("handler is closed")]
    Closed,
    /// A delivery iteration panicked; the worker kept running.
    #[error("delivery worker panicked: {0}")]
    WorkerPanic(String),
}

/// Errors raised while configuring a handler.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Invalid user supplied configuration.
    #[error("invalid notifier configuration: {0}")]
    InvalidConfig(String),
    /// The configuration file does not exist.
    #[error("{path} doesn't exist")]
    NotFound { path: String },
    /// The configuration file could not be parsed.
    #[error("{path} is invalid: {message}")]
    Ini { path: String, message: String },
    /// No decoder exists for the requested encoding label.
    #[error("unknown encoding {0}")]
    UnknownEncoding(String),
    /// The file is not valid in the requested encoding.
    #[error("{path} could not be decoded as {encoding}")]
    Decode { path: String, encoding: String },
    /// The TLS connector could not be created.
    #[error("failed to initialise TLS: {0}")]
    Tls(String),
    /// Underlying I/O error whilst reading configuration.
    #[error(transparent)]
    Io(#[from] io::Error),
}
