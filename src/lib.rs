//! Asynchronous Airbrake error notifier.
//!
//! Application threads hand [`ErrorEvent`]s to an [`AirbrakeHandler`], which
//! serializes each one into an Airbrake v2 notice and queues it for a single
//! background worker. The worker posts notices over HTTP, classifies the
//! response, and reports failures to a local
//! [`DiagnosticSink`](diagnostics::DiagnosticSink) rather than to the caller.
//!
//! ```no_run
//! use airbrake_notifier::{ErrorEvent, NotifierBuilder};
//!
//! let handler = NotifierBuilder::new()
//!     .with_api_key("abc123")
//!     .with_environment("production")
//!     .build()?;
//! let _ = handler.submit(&ErrorEvent::new("disk full"));
//! handler.shutdown()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod builder;
pub mod config_file;
pub mod diagnostics;
mod error;
mod event;
mod level;
#[cfg(feature = "log-compat")]
mod log_compat;
pub mod notifier;
mod rate_limited_warner;
#[cfg(any(test, feature = "test-util"))]
pub mod test_utils;

pub use builder::NotifierBuilder;
pub use error::{BuildError, ConfigError, NotifierError, TransportError};
pub use event::{CallSite, ErrorEvent, ExceptionInfo, StackFrame};
pub use level::{Level, ParseLevelError};
#[cfg(feature = "log-compat")]
pub use log_compat::AirbrakeLogAdapter;
pub use notifier::{
    AirbrakeHandler, BacktraceFallback, BackoffPolicy, DeliveryStats, NotifierConfig,
    PayloadFormat, RetryPolicy, WorkerState,
};
pub use rate_limited_warner::{DEFAULT_WARN_INTERVAL, RateLimitedWarner};
