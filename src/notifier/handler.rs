//! Public handler type exported by the crate.

use std::{sync::Arc, time::Duration};

use crossbeam_channel::{RecvTimeoutError, Sender, bounded};
use log::debug;
use parking_lot::{Mutex, RwLock};

use crate::{
    diagnostics::{DIAGNOSTIC_TARGET, DiagnosticSink},
    error::{ConfigError, NotifierError},
    event::ErrorEvent,
    level::Level,
    rate_limited_warner::RateLimitedWarner,
};

use super::{
    config::NotifierConfig,
    payload::PayloadBuilder,
    transport::{HttpTransport, Transport},
    worker::{DeliveryStats, QueueItem, WorkerShared, WorkerState, WorkerThread, spawn_worker},
};

/// Handler forwarding error events to Airbrake from a background thread.
///
/// [`submit`](Self::submit) builds the notice on the caller's thread and
/// enqueues it on an unbounded channel, so it never waits on the network.
/// A single worker thread delivers notices in submission order. Delivery
/// failures go to the configured
/// [`DiagnosticSink`](crate::diagnostics::DiagnosticSink) and never reach the
/// caller.
pub struct AirbrakeHandler {
    tx: RwLock<Option<Sender<QueueItem>>>,
    worker: Mutex<Option<WorkerThread>>,
    shared: Arc<WorkerShared>,
    builder: PayloadBuilder,
    diagnostics: Arc<dyn DiagnosticSink>,
    warner: RateLimitedWarner,
    service_url: String,
    /// Bounded wait for the worker during [`shutdown`](Self::shutdown).
    shutdown_grace: Duration,
}

impl AirbrakeHandler {
    /// Construct the handler from a configuration object.
    ///
    /// The service URL's scheme is forced to match `use_ssl` before the
    /// worker starts. No network activity happens here.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the TLS connector or the worker thread
    /// cannot be created.
    pub fn with_config(config: NotifierConfig) -> Result<Self, ConfigError> {
        let transport = HttpTransport::new(config.service_url(), config.timeout)?;
        Self::with_transport(config, transport)
    }

    /// Construct the handler around a caller-supplied transport.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the worker thread cannot be spawned.
    pub fn with_transport<T: Transport>(
        config: NotifierConfig,
        transport: T,
    ) -> Result<Self, ConfigError> {
        let builder = PayloadBuilder::from_config(&config);
        let service_url = config.service_url();
        let spawned = spawn_worker(
            transport,
            config.retry.clone(),
            Arc::clone(&config.diagnostics),
        )?;
        debug!(target: DIAGNOSTIC_TARGET, "Airbrake worker started for {service_url}");
        Ok(Self {
            tx: RwLock::new(Some(spawned.tx)),
            worker: Mutex::new(Some(spawned.thread)),
            shared: spawned.shared,
            builder,
            diagnostics: config.diagnostics,
            warner: RateLimitedWarner::new(config.warn_interval),
            service_url,
            shutdown_grace: config.shutdown_grace,
        })
    }

    /// Queue `event` for delivery.
    ///
    /// Never blocks. Errors are already reported to the diagnostic sink when
    /// this returns; the `Result` is informational and callers may ignore it.
    ///
    /// # Errors
    ///
    /// * [`NotifierError::Build`] - the event could not be serialized; it was
    ///   dropped
    /// * [`NotifierError::Closed`] - the handler has been shut down
    pub fn submit(&self, event: &ErrorEvent) -> Result<(), NotifierError> {
        let payload = match self.builder.build(event) {
            Ok(payload) => payload,
            Err(err) => {
                let err = NotifierError::from(err);
                self.diagnostics.report(Level::Error, &err.to_string());
                return Err(err);
            }
        };

        let guard = self.tx.read();
        let Some(tx) = guard.as_ref() else {
            self.warn_dropped("after shutdown");
            return Err(NotifierError::Closed);
        };
        if tx.send(QueueItem::Payload(payload)).is_err() {
            self.warn_dropped("because the worker has exited");
            return Err(NotifierError::Closed);
        }
        debug!(target: DIAGNOSTIC_TARGET, "Airbrake notice queued for delivery");
        Ok(())
    }

    /// Wait until every notice queued before this call has been attempted.
    ///
    /// Returns `false` if the handler is closed or the worker does not catch
    /// up within `timeout`.
    pub fn flush(&self, timeout: Duration) -> bool {
        self.warner.flush(|count| {
            self.diagnostics.report(
                Level::Warn,
                &format!("AirbrakeHandler dropped {count} notices in the last interval"),
            );
        });
        let (ack_tx, ack_rx) = bounded(1);
        {
            let guard = self.tx.read();
            let Some(tx) = guard.as_ref() else {
                return false;
            };
            if tx.send(QueueItem::Flush(ack_tx)).is_err() {
                return false;
            }
        }
        ack_rx.recv_timeout(timeout).is_ok()
    }

    /// Stop accepting notices and let the worker drain the queue.
    ///
    /// Waits up to the grace period for the worker to exit. On timeout the
    /// worker is cancelled and its thread detached; any in-flight notice is
    /// abandoned. Calling this again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`NotifierError::ShutdownTimeout`] (already reported) when the
    /// worker was abandoned.
    pub fn shutdown(&self) -> Result<(), NotifierError> {
        let Some(tx) = self.tx.write().take() else {
            return Ok(());
        };
        debug!(target: DIAGNOSTIC_TARGET, "Waiting for remaining notices to be sent to Airbrake");
        // A send error means the worker has already gone.
        let _ = tx.send(QueueItem::Shutdown);
        drop(tx);
        self.shared.begin_draining();

        let Some(worker) = self.worker.lock().take() else {
            return Ok(());
        };
        match worker.done_rx.recv_timeout(self.shutdown_grace) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if worker.handle.join().is_err() {
                    self.diagnostics
                        .report(Level::Error, "AirbrakeHandler: worker thread panicked");
                }
                self.report_pending_drops();
                Ok(())
            }
            Err(RecvTimeoutError::Timeout) => {
                self.shared.cancel();
                let err = NotifierError::ShutdownTimeout {
                    grace: self.shutdown_grace,
                };
                self.diagnostics.report(Level::Warn, &err.to_string());
                // Dropping the handle detaches the thread.
                drop(worker);
                Err(err)
            }
        }
    }

    /// Whether [`shutdown`](Self::shutdown) has been called.
    pub fn is_closed(&self) -> bool {
        self.tx.read().is_none()
    }

    pub fn worker_state(&self) -> WorkerState {
        self.shared.state()
    }

    pub fn stats(&self) -> DeliveryStats {
        self.shared.stats()
    }

    /// URL notices are posted to, after scheme normalisation.
    pub fn service_url(&self) -> &str {
        &self.service_url
    }

    fn warn_dropped(&self, why: &str) {
        self.warner.record_drop();
        self.warner.warn_if_due(|count| {
            self.diagnostics.report(
                Level::Warn,
                &format!("AirbrakeHandler dropped {count} notices {why}"),
            );
        });
    }

    fn report_pending_drops(&self) {
        self.warner.flush(|count| {
            self.diagnostics.report(
                Level::Warn,
                &format!("AirbrakeHandler dropped {count} notices in the last interval"),
            );
        });
    }
}

impl Drop for AirbrakeHandler {
    fn drop(&mut self) {
        // Failures have already been reported to the sink.
        let _ = self.shutdown();
    }
}

impl std::fmt::Debug for AirbrakeHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AirbrakeHandler")
            .field("service_url", &self.service_url)
            .field("worker_state", &self.worker_state())
            .field("shutdown_grace", &self.shutdown_grace)
            .finish_non_exhaustive()
    }
}
