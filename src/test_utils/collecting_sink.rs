//! A diagnostic sink that keeps every report in memory.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::diagnostics::DiagnosticSink;
use crate::level::Level;

/// Sink storing `(level, message)` pairs for later assertions.
#[derive(Clone, Debug, Default)]
pub struct CollectingSink {
    messages: Arc<Mutex<Vec<(Level, String)>>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything reported so far.
    pub fn messages(&self) -> Vec<(Level, String)> {
        self.messages.lock().clone()
    }

    /// Whether any report contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.messages
            .lock()
            .iter()
            .any(|(_, message)| message.contains(needle))
    }
}

impl DiagnosticSink for CollectingSink {
    fn report(&self, level: Level, message: &str) {
        self.messages.lock().push((level, message.to_owned()));
    }
}
