//! Worker thread driving HTTP delivery.
//!
//! The worker owns the [`Transport`] and drains the queue one item at a time,
//! in submission order. Failures are reported through the diagnostic sink
//! and never leave this thread; only [`QueueItem::Shutdown`] (or the
//! cancellation flag set by an abandoned shutdown) ends the loop.

use std::{
    any::Any,
    cell::Cell,
    io,
    panic::{self, AssertUnwindSafe},
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering},
    },
    thread,
    time::Instant,
};

use crossbeam_channel::{Receiver, Sender, bounded, unbounded};
use log::debug;

use crate::{
    diagnostics::{DIAGNOSTIC_TARGET, DiagnosticSink},
    error::NotifierError,
    level::Level,
};

use super::{
    backoff::BackoffState,
    classify::{DeliveryOutcome, FailureKind, classify_status},
    config::RetryPolicy,
    payload::Payload,
    transport::Transport,
};

/// Items carried by the queue.
#[derive(Debug)]
pub enum QueueItem {
    Payload(Payload),
    /// Acknowledged once every earlier item has been attempted.
    Flush(Sender<()>),
    /// Ends the worker loop; nothing queued behind it is consumed.
    Shutdown,
}

/// Lifecycle of the delivery worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WorkerState {
    Running = 0,
    /// Shutdown has been requested; the worker is finishing earlier items.
    Draining = 1,
    Terminated = 2,
}

impl WorkerState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Running,
            1 => Self::Draining,
            _ => Self::Terminated,
        }
    }
}

/// Snapshot of the worker's delivery counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryStats {
    /// Payloads the service accepted.
    pub delivered: u64,
    /// Payloads dropped after a rejection, transport error, or panic.
    pub failed: u64,
}

/// State shared between the handler and its worker thread.
#[derive(Debug)]
pub(super) struct WorkerShared {
    state: AtomicU8,
    cancelled: AtomicBool,
    delivered: AtomicU64,
    failed: AtomicU64,
}

impl WorkerShared {
    fn new() -> Self {
        Self {
            state: AtomicU8::new(WorkerState::Running as u8),
            cancelled: AtomicBool::new(false),
            delivered: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    pub(super) fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub(super) fn begin_draining(&self) {
        let _ = self.state.compare_exchange(
            WorkerState::Running as u8,
            WorkerState::Draining as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    fn terminate(&self) {
        self.state
            .store(WorkerState::Terminated as u8, Ordering::Release);
    }

    pub(super) fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    pub(super) fn stats(&self) -> DeliveryStats {
        DeliveryStats {
            delivered: self.delivered.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

thread_local! {
    static ON_WORKER_THREAD: Cell<bool> = const { Cell::new(false) };
}

/// Whether the calling thread is a delivery worker.
///
/// Anything logged from the worker (including by the HTTP stack) must not be
/// turned back into notices.
#[cfg_attr(
    not(any(test, feature = "log-compat")),
    expect(dead_code, reason = "only the log bridge consults the flag")
)]
pub(crate) fn is_worker_thread() -> bool {
    ON_WORKER_THREAD.with(Cell::get)
}

/// Handles returned by [`spawn_worker`].
pub(super) struct SpawnedWorker {
    pub(super) tx: Sender<QueueItem>,
    pub(super) thread: WorkerThread,
    pub(super) shared: Arc<WorkerShared>,
}

/// Join handle plus the channel signalling loop exit.
pub(super) struct WorkerThread {
    pub(super) handle: thread::JoinHandle<()>,
    /// Receives `()` (or disconnects) once the loop has exited.
    pub(super) done_rx: Receiver<()>,
}

/// Spawns the delivery thread bound to a fresh unbounded queue.
///
/// # Errors
///
/// Returns the OS error if the thread cannot be spawned.
pub(super) fn spawn_worker<T: Transport>(
    transport: T,
    retry: RetryPolicy,
    diagnostics: Arc<dyn DiagnosticSink>,
) -> io::Result<SpawnedWorker> {
    let (tx, rx) = unbounded();
    let (done_tx, done_rx) = bounded(1);
    let shared = Arc::new(WorkerShared::new());
    let worker = Worker::new(transport, retry, diagnostics, Arc::clone(&shared));
    let handle = thread::Builder::new()
        .name("airbrake-sender".into())
        .spawn(move || {
            ON_WORKER_THREAD.with(|flag| flag.set(true));
            worker.run(rx);
            let _ = done_tx.send(());
        })?;
    Ok(SpawnedWorker {
        tx,
        thread: WorkerThread { handle, done_rx },
        shared,
    })
}

struct Worker<T> {
    transport: T,
    backoff: Option<BackoffState>,
    diagnostics: Arc<dyn DiagnosticSink>,
    shared: Arc<WorkerShared>,
}

impl<T: Transport> Worker<T> {
    fn new(
        transport: T,
        retry: RetryPolicy,
        diagnostics: Arc<dyn DiagnosticSink>,
        shared: Arc<WorkerShared>,
    ) -> Self {
        let backoff = match retry {
            RetryPolicy::Disabled => None,
            RetryPolicy::Backoff(policy) => Some(BackoffState::new(policy)),
        };
        Self {
            transport,
            backoff,
            diagnostics,
            shared,
        }
    }

    fn run(mut self, rx: Receiver<QueueItem>) {
        while let Ok(item) = rx.recv() {
            if self.shared.is_cancelled() {
                debug!(target: DIAGNOSTIC_TARGET, "Airbrake worker cancelled; abandoning queue");
                break;
            }
            match item {
                QueueItem::Payload(payload) => self.deliver_guarded(&payload),
                QueueItem::Flush(ack) => {
                    // The flusher may have timed out and gone away.
                    let _ = ack.send(());
                }
                QueueItem::Shutdown => {
                    debug!(target: DIAGNOSTIC_TARGET, "Airbrake worker received shutdown");
                    break;
                }
            }
        }
        self.shared.terminate();
    }

    /// Deliver one payload, containing any panic to this iteration.
    fn deliver_guarded(&mut self, payload: &Payload) {
        let result = panic::catch_unwind(AssertUnwindSafe(|| self.deliver(payload)));
        if let Err(panic) = result {
            self.shared.failed.fetch_add(1, Ordering::Relaxed);
            self.report(
                Level::Error,
                &NotifierError::WorkerPanic(panic_message(panic.as_ref())),
            );
        }
    }

    fn deliver(&mut self, payload: &Payload) {
        if let Some(backoff) = self.backoff.as_mut() {
            backoff.reset();
        }
        loop {
            let now = Instant::now();
            let failure = match self.transport.send(payload) {
                Ok(status) => match classify_status(status, payload) {
                    DeliveryOutcome::Success => {
                        self.shared.delivered.fetch_add(1, Ordering::Relaxed);
                        return;
                    }
                    DeliveryOutcome::Failure { reason, kind } => NotifierError::Rejected {
                        status,
                        reason,
                        kind,
                    },
                },
                Err(err) => NotifierError::Transport(err),
            };
            if !self.sleep_and_should_retry(&failure, now) {
                self.shared.failed.fetch_add(1, Ordering::Relaxed);
                self.report(Level::Error, &failure);
                return;
            }
        }
    }

    /// Sleeps before another attempt when the retry policy allows one.
    ///
    /// Returns `false` when the payload should be dropped: retries disabled,
    /// a terminal rejection, cancellation, or the backoff deadline passed.
    fn sleep_and_should_retry(&mut self, failure: &NotifierError, now: Instant) -> bool {
        if !is_retryable(failure) || self.shared.is_cancelled() {
            return false;
        }
        let Some(delay) = self.backoff.as_mut().and_then(|b| b.next_sleep(now)) else {
            return false;
        };
        self.report(Level::Warn, &format!("{failure}; retrying in {delay:?}"));
        thread::sleep(delay);
        !self.shared.is_cancelled()
    }

    fn report(&self, level: Level, message: &dyn std::fmt::Display) {
        self.diagnostics.report(level, &message.to_string());
    }
}

fn is_retryable(failure: &NotifierError) -> bool {
    matches!(
        failure,
        NotifierError::Transport(_)
            | NotifierError::Rejected {
                kind: FailureKind::Transient,
                ..
            }
    )
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        (*msg).to_owned()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::test_utils::{CollectingSink, FakeTransport};
    use std::time::Duration;

    fn payload(body: &str) -> Payload {
        Payload::new(body, "text/xml")
    }

    fn start(transport: FakeTransport, retry: RetryPolicy) -> (SpawnedWorker, CollectingSink) {
        let sink = CollectingSink::new();
        let worker = spawn_worker(transport, retry, Arc::new(sink.clone())).expect("spawn");
        (worker, sink)
    }

    fn stop(worker: SpawnedWorker) {
        worker.tx.send(QueueItem::Shutdown).expect("queue open");
        worker.thread.handle.join().expect("worker exits cleanly");
    }

    #[test]
    fn delivers_in_order_and_stops_at_shutdown() {
        let transport = FakeTransport::always(200);
        let (worker, sink) = start(transport.clone(), RetryPolicy::Disabled);
        for body in ["a", "b", "c"] {
            worker.tx.send(QueueItem::Payload(payload(body))).unwrap();
        }
        worker.tx.send(QueueItem::Shutdown).unwrap();
        // The worker may already have exited and dropped the receiver.
        let _ = worker.tx.send(QueueItem::Payload(payload("after")));
        let shared = Arc::clone(&worker.shared);
        worker.thread.handle.join().unwrap();

        assert_eq!(transport.bodies(), vec!["a", "b", "c"]);
        assert_eq!(shared.state(), WorkerState::Terminated);
        assert_eq!(
            shared.stats(),
            DeliveryStats {
                delivered: 3,
                failed: 0
            }
        );
        assert!(sink.messages().is_empty());
    }

    /// Records whether each send ran on a flagged worker thread.
    struct WorkerFlagTransport(Arc<AtomicBool>);

    impl Transport for WorkerFlagTransport {
        fn send(&mut self, _payload: &Payload) -> Result<u16, TransportError> {
            self.0.store(is_worker_thread(), Ordering::SeqCst);
            Ok(200)
        }
    }

    #[test]
    fn worker_thread_is_flagged() {
        let seen = Arc::new(AtomicBool::new(false));
        let sink = CollectingSink::new();
        let worker = spawn_worker(
            WorkerFlagTransport(Arc::clone(&seen)),
            RetryPolicy::Disabled,
            Arc::new(sink),
        )
        .expect("spawn");
        worker.tx.send(QueueItem::Payload(payload("x"))).unwrap();
        stop(worker);

        assert!(seen.load(Ordering::SeqCst));
        assert!(!is_worker_thread());
    }

    #[test]
    fn rejection_is_reported_and_loop_continues() {
        let transport = FakeTransport::with_statuses([422, 200]);
        let (worker, sink) = start(transport.clone(), RetryPolicy::Disabled);
        worker
            .tx
            .send(QueueItem::Payload(payload("<bad/>")))
            .unwrap();
        worker
            .tx
            .send(QueueItem::Payload(payload("<good/>")))
            .unwrap();
        let shared = Arc::clone(&worker.shared);
        stop(worker);

        assert_eq!(transport.bodies(), vec!["<bad/>", "<good/>"]);
        assert_eq!(
            sink.messages(),
            vec![(Level::Error, "Invalid XML sent: <bad/>".to_owned())]
        );
        assert_eq!(
            shared.stats(),
            DeliveryStats {
                delivered: 1,
                failed: 1
            }
        );
    }

    #[test]
    fn transport_errors_are_reported() {
        let transport = FakeTransport::with_results([
            Err(TransportError::Network {
                url: "http://localhost/".into(),
                message: "connection refused".into(),
            }),
            Ok(200),
        ]);
        let (worker, sink) = start(transport.clone(), RetryPolicy::Disabled);
        worker.tx.send(QueueItem::Payload(payload("one"))).unwrap();
        worker.tx.send(QueueItem::Payload(payload("two"))).unwrap();
        stop(worker);

        assert_eq!(transport.bodies(), vec!["one", "two"]);
        let messages = sink.messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].1.contains("connection refused"));
    }

    #[test]
    fn panics_do_not_stop_the_worker() {
        let transport = FakeTransport::always(200).panic_on("boom");
        let (worker, sink) = start(transport.clone(), RetryPolicy::Disabled);
        worker.tx.send(QueueItem::Payload(payload("boom"))).unwrap();
        worker.tx.send(QueueItem::Payload(payload("fine"))).unwrap();
        let shared = Arc::clone(&worker.shared);
        stop(worker);

        assert_eq!(transport.bodies(), vec!["fine"]);
        assert_eq!(shared.stats().failed, 1);
        assert!(sink.messages()[0].1.contains("delivery worker panicked"));
    }

    #[test]
    fn flush_is_acknowledged_after_earlier_items() {
        let transport = FakeTransport::always(200);
        let (worker, _sink) = start(transport.clone(), RetryPolicy::Disabled);
        worker.tx.send(QueueItem::Payload(payload("x"))).unwrap();
        let (ack_tx, ack_rx) = bounded(1);
        worker.tx.send(QueueItem::Flush(ack_tx)).unwrap();
        ack_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("flush acknowledged");
        assert_eq!(transport.bodies(), vec!["x"]);
        stop(worker);
    }

    #[test]
    fn transient_failures_retry_when_enabled() {
        let transport = FakeTransport::with_statuses([503, 500, 200]);
        let retry = RetryPolicy::Backoff(crate::notifier::BackoffPolicy {
            base: Duration::from_millis(1),
            cap: Duration::from_millis(5),
            deadline: Duration::from_secs(5),
        });
        let (worker, sink) = start(transport.clone(), retry);
        worker.tx.send(QueueItem::Payload(payload("r"))).unwrap();
        let shared = Arc::clone(&worker.shared);
        stop(worker);

        assert_eq!(transport.bodies(), vec!["r", "r", "r"]);
        assert_eq!(shared.stats().delivered, 1);
        assert!(sink.messages().iter().all(|(level, _)| *level == Level::Warn));
    }

    #[test]
    fn terminal_failures_never_retry() {
        let transport = FakeTransport::with_statuses([403, 200]);
        let retry = RetryPolicy::Backoff(crate::notifier::BackoffPolicy {
            base: Duration::from_millis(1),
            cap: Duration::from_millis(5),
            deadline: Duration::from_secs(5),
        });
        let (worker, sink) = start(transport.clone(), retry);
        worker.tx.send(QueueItem::Payload(payload("t"))).unwrap();
        stop(worker);

        assert_eq!(transport.bodies(), vec!["t"]);
        assert_eq!(
            sink.messages(),
            vec![(Level::Error, "Unable to send using SSL".to_owned())]
        );
    }

    #[test]
    fn cancellation_abandons_remaining_items() {
        let transport = FakeTransport::always(200);
        let (worker, _sink) = start(transport.clone(), RetryPolicy::Disabled);
        worker.shared.cancel();
        worker.tx.send(QueueItem::Payload(payload("late"))).unwrap();
        worker.thread.handle.join().unwrap();
        assert!(transport.bodies().is_empty());
    }

    #[test]
    fn panic_messages_are_extracted() {
        let boxed: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(boxed.as_ref()), "static");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(boxed.as_ref()), "owned");
        let boxed: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(boxed.as_ref()), "unknown panic payload");
    }
}
