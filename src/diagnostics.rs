//! Local sink for failures the notifier cannot report upstream.
//!
//! Delivery failures must never travel back through the stream being
//! reported, so they go to a [`DiagnosticSink`] instead. The default
//! [`LogSink`] logs under [`DIAGNOSTIC_TARGET`], which the `log` bridge
//! refuses to forward.

use std::io::{self, Write};

use crate::level::Level;

/// `log` target used for every diagnostic emitted by [`LogSink`].
pub const DIAGNOSTIC_TARGET: &str = "airbrake_notifier::diagnostics";

/// Receives diagnostics from the handler and its worker thread.
pub trait DiagnosticSink: Send + Sync {
    /// Report `message` at `level`.
    fn report(&self, level: Level, message: &str);
}

/// Writes diagnostics through the `log` facade.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn report(&self, level: Level, message: &str) {
        log::log!(target: DIAGNOSTIC_TARGET, log::Level::from(level), "{message}");
    }
}

/// Writes diagnostics straight to standard error.
#[derive(Clone, Copy, Debug, Default)]
pub struct StderrSink;

impl DiagnosticSink for StderrSink {
    fn report(&self, level: Level, message: &str) {
        // Nothing sensible remains if stderr itself is gone.
        let _ = writeln!(io::stderr().lock(), "airbrake_notifier {level}: {message}");
    }
}
