//! Asynchronous Airbrake delivery pipeline.
//!
//! This module defines [`AirbrakeHandler`], which converts
//! [`ErrorEvent`](crate::event::ErrorEvent) values into Airbrake notices and
//! hands them to a dedicated worker thread for delivery over HTTP. The
//! caller's thread only builds the payload and enqueues it.
//!
//! # Outcome Classification
//!
//! Each response status is mapped to a [`DeliveryOutcome`]:
//!
//! - **200**: Success.
//! - **403**: Terminal - the service requires SSL.
//! - **422**: Terminal - the notice was rejected as invalid.
//! - **500, 503**: Transient - the service is down or over quota.
//! - **Anything else**: Transient - unexpected status.
//!
//! Failures are dropped after a single attempt unless a [`RetryPolicy`]
//! enables backoff for transient ones. Network errors count as transient.
//!
//! # Shutdown
//!
//! [`AirbrakeHandler::shutdown`] enqueues a shutdown marker behind all
//! pending notices and waits up to the grace period for the worker to reach
//! it. A worker that overruns the grace period is cancelled and detached.

mod backoff;
mod classify;
mod config;
mod handler;
mod payload;
mod transport;
mod worker;


pub use classify::{DeliveryOutcome, FailureKind, classify_status};
pub use config::{
    BacktraceFallback, BackoffPolicy, DEFAULT_SERVICE_URL, DEFAULT_SHUTDOWN_GRACE,
    DEFAULT_TIMEOUT, NotifierConfig, NotifierInfo, PayloadFormat, RetryPolicy, normalise_scheme,
};
pub use handler::AirbrakeHandler;
pub use payload::{NOTICE_VERSION, Payload, PayloadBuilder};
pub use transport::{HttpTransport, Transport};
pub(crate) use worker::is_worker_thread;
pub use worker::{DeliveryStats, WorkerState};
