//! Compatibility bridge for the Rust `log` crate.
//!
//! [`AirbrakeLogAdapter`] implements `log::Log` so that ordinary
//! `log::error!` calls become Airbrake notices. Records logged under
//! [`DIAGNOSTIC_TARGET`] or from the delivery worker thread are never
//! forwarded: they describe the notifier itself.

use std::sync::Arc;

use log::{LevelFilter, Metadata, Record};

use crate::diagnostics::DIAGNOSTIC_TARGET;
use crate::event::{CallSite, ErrorEvent};
use crate::level::Level;
use crate::notifier::{AirbrakeHandler, is_worker_thread};

/// Bound on how long `log::logger().flush()` waits for pending notices.
const FLUSH_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

/// Adapter implementing the Rust `log::Log` trait.
///
/// Each enabled record becomes an [`ErrorEvent`] whose call site is the
/// record's file, line and module path.
pub struct AirbrakeLogAdapter {
    handler: Arc<AirbrakeHandler>,
    level: LevelFilter,
}

impl AirbrakeLogAdapter {
    /// Forward records at `Error` and above to `handler`.
    pub fn new(handler: Arc<AirbrakeHandler>) -> Self {
        Self {
            handler,
            level: LevelFilter::Error,
        }
    }

    /// Forward records at `level` and above.
    pub fn with_level(mut self, level: LevelFilter) -> Self {
        self.level = level;
        self
    }

    /// Install the adapter as the global `log` logger.
    ///
    /// # Errors
    ///
    /// Fails when another global logger has already been set.
    pub fn install(self) -> Result<(), log::SetLoggerError> {
        let level = self.level;
        log::set_boxed_logger(Box::new(self))?;
        log::set_max_level(level);
        Ok(())
    }

    fn event_for(record: &Record<'_>) -> ErrorEvent {
        let event = ErrorEvent::new(record.args().to_string()).with_level(Level::from(record.level()));
        match record.file() {
            Some(file) => event.with_call_site(CallSite::new(
                file,
                record.line().unwrap_or(0),
                record.module_path().unwrap_or_default(),
            )),
            None => event,
        }
    }
}

fn is_diagnostic(target: &str) -> bool {
    target.starts_with(DIAGNOSTIC_TARGET)
}

impl log::Log for AirbrakeLogAdapter {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.level
            && !is_diagnostic(metadata.target())
            && !is_worker_thread()
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        // Failures are already reported to the diagnostic sink.
        let _ = self.handler.submit(&Self::event_for(record));
    }

    fn flush(&self) {
        self.handler.flush(FLUSH_TIMEOUT);
    }
}

impl std::fmt::Debug for AirbrakeLogAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AirbrakeLogAdapter")
            .field("level", &self.level)
            .finish_non_exhaustive()
    }
}
