//! Configuration structures consumed by the handler lifecycle.
//!
//! [`NotifierBuilder`](crate::NotifierBuilder) validates user input and
//! produces a [`NotifierConfig`] which
//! [`AirbrakeHandler`](super::AirbrakeHandler) then owns for its lifetime.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::diagnostics::{DiagnosticSink, LogSink};
use crate::rate_limited_warner::DEFAULT_WARN_INTERVAL;

/// Endpoint used when no service URL is configured.
pub const DEFAULT_SERVICE_URL: &str = "http://airbrakeapp.com/notifier_api/v2/notices";
/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(30_000);
/// Bounded wait for the worker to drain on shutdown.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);
/// Default base delay for exponential backoff retries.
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_millis(100);
/// Default maximum delay for exponential backoff retries.
pub const DEFAULT_BACKOFF_CAP: Duration = Duration::from_secs(10);
/// Default absolute deadline for retrying a single payload.
pub const DEFAULT_BACKOFF_DEADLINE: Duration = Duration::from_secs(60);

/// Identity of this client as reported in every notice.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NotifierInfo {
    pub name: String,
    pub version: String,
    pub url: String,
}

impl Default for NotifierInfo {
    fn default() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_owned(),
            version: env!("CARGO_PKG_VERSION").to_owned(),
            url: env!("CARGO_PKG_REPOSITORY").to_owned(),
        }
    }
}

/// Wire format of the notice body.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PayloadFormat {
    /// Airbrake v2 XML notice, sent as `text/xml`.
    #[default]
    Xml,
    /// The same notice content as a JSON object, sent as `application/json`.
    Json,
}

impl PayloadFormat {
    pub fn content_type(self) -> &'static str {
        match self {
            Self::Xml => "text/xml",
            Self::Json => "application/json",
        }
    }
}

/// Backtrace emitted for events that carry no stack trace.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BacktraceFallback {
    /// Report the log call site when known, otherwise an empty frame.
    #[default]
    CallSite,
    /// Always report a single empty frame.
    Empty,
}

/// Exponential backoff settings for retrying transient failures.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub cap: Duration,
    /// Give up on a payload once it has been failing for this long.
    pub deadline: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: DEFAULT_BACKOFF_BASE,
            cap: DEFAULT_BACKOFF_CAP,
            deadline: DEFAULT_BACKOFF_DEADLINE,
        }
    }
}

/// Whether the worker retries transient failures.
///
/// Disabled by default: each payload is attempted once and dropped on any
/// failure.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum RetryPolicy {
    #[default]
    Disabled,
    /// Retry transient failures and transport errors with backoff.
    Backoff(BackoffPolicy),
}

impl RetryPolicy {
    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::Backoff(_))
    }
}

/// Configuration object describing how to construct an
/// [`AirbrakeHandler`](super::AirbrakeHandler).
#[derive(Clone)]
pub struct NotifierConfig {
    /// Project API key sent with every notice.
    pub api_key: String,
    pub environment: Option<String>,
    pub component_name: Option<String>,
    pub node_name: Option<String>,
    /// Destination URL as supplied; see [`NotifierConfig::service_url`].
    pub url: String,
    /// Force `https://` when true, `http://` when false.
    pub use_ssl: bool,
    /// Timeout applied to each HTTP request.
    pub timeout: Duration,
    pub shutdown_grace: Duration,
    pub format: PayloadFormat,
    pub backtrace_fallback: BacktraceFallback,
    pub retry: RetryPolicy,
    pub notifier: NotifierInfo,
    /// Interval between rate-limited drop warnings.
    pub warn_interval: Duration,
    pub diagnostics: Arc<dyn DiagnosticSink>,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            environment: None,
            component_name: None,
            node_name: None,
            url: DEFAULT_SERVICE_URL.to_owned(),
            use_ssl: false,
            timeout: DEFAULT_TIMEOUT,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            format: PayloadFormat::default(),
            backtrace_fallback: BacktraceFallback::default(),
            retry: RetryPolicy::default(),
            notifier: NotifierInfo::default(),
            warn_interval: DEFAULT_WARN_INTERVAL,
            diagnostics: Arc::new(LogSink),
        }
    }
}

impl NotifierConfig {
    /// Destination URL with its scheme forced to match `use_ssl`.
    pub fn service_url(&self) -> String {
        normalise_scheme(&self.url, self.use_ssl)
    }
}

impl fmt::Debug for NotifierConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotifierConfig")
            .field("environment", &self.environment)
            .field("component_name", &self.component_name)
            .field("node_name", &self.node_name)
            .field("url", &self.url)
            .field("use_ssl", &self.use_ssl)
            .field("timeout", &self.timeout)
            .field("shutdown_grace", &self.shutdown_grace)
            .field("format", &self.format)
            .field("backtrace_fallback", &self.backtrace_fallback)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

/// Swap the first `http://`/`https://` occurrence to match `use_ssl`.
///
/// This is a literal substitution, not a URL parse: a URL with neither
/// scheme is returned unchanged.
pub fn normalise_scheme(url: &str, use_ssl: bool) -> String {
    if use_ssl {
        url.replacen("http://", "https://", 1)
    } else {
        url.replacen("https://", "http://", 1)
    }
}
