//! Scripted [`Transport`] recording every payload it is asked to send.

use std::collections::VecDeque;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::TransportError;
use crate::notifier::{Payload, Transport};

#[derive(Debug)]
struct State {
    script: VecDeque<Result<u16, TransportError>>,
    fallback: u16,
    received: Vec<Payload>,
    panic_on: Option<String>,
    delay: Duration,
}

/// Cloneable fake; clones share the script and the received log.
#[derive(Clone, Debug)]
pub struct FakeTransport {
    state: Arc<Mutex<State>>,
}

impl FakeTransport {
    fn from_script(script: VecDeque<Result<u16, TransportError>>, fallback: u16) -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                script,
                fallback,
                received: Vec::new(),
                panic_on: None,
                delay: Duration::ZERO,
            })),
        }
    }

    /// Answer every request with `status`.
    pub fn always(status: u16) -> Self {
        Self::from_script(VecDeque::new(), status)
    }

    /// Answer with `statuses` in turn, then 200.
    pub fn with_statuses(statuses: impl IntoIterator<Item = u16>) -> Self {
        Self::with_results(statuses.into_iter().map(Ok))
    }

    /// Answer with `results` in turn, then 200.
    pub fn with_results(results: impl IntoIterator<Item = Result<u16, TransportError>>) -> Self {
        Self::from_script(results.into_iter().collect(), 200)
    }

    /// Panic instead of answering when the body equals `body`.
    pub fn panic_on(self, body: impl Into<String>) -> Self {
        self.state.lock().panic_on = Some(body.into());
        self
    }

    /// Block each request for `delay` before answering.
    pub fn with_delay(self, delay: Duration) -> Self {
        self.state.lock().delay = delay;
        self
    }

    /// Bodies of every payload sent so far, in order.
    pub fn bodies(&self) -> Vec<String> {
        self.state
            .lock()
            .received
            .iter()
            .map(|p| p.body().to_owned())
            .collect()
    }
}

impl Transport for FakeTransport {
    fn send(&mut self, payload: &Payload) -> Result<u16, TransportError> {
        let delay = {
            let state = self.state.lock();
            if state.panic_on.as_deref() == Some(payload.body()) {
                drop(state);
                panic!("fake transport refused {}", payload.body());
            }
            state.delay
        };
        if !delay.is_zero() {
            thread::sleep(delay);
        }
        let mut state = self.state.lock();
        state.received.push(payload.clone());
        let fallback = state.fallback;
        state.script.pop_front().unwrap_or(Ok(fallback))
    }
}
