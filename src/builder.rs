//! Builder for [`AirbrakeHandler`].
//!
//! Collects the user-facing options, validates them, and produces a
//! [`NotifierConfig`]. Unset options fall back to the defaults documented on
//! [`NotifierConfig`].

use std::{sync::Arc, time::Duration};

use crate::{
    diagnostics::DiagnosticSink,
    error::ConfigError,
    notifier::{
        AirbrakeHandler, BacktraceFallback, NotifierConfig, NotifierInfo, PayloadFormat,
        RetryPolicy,
    },
};

macro_rules! ensure_positive {
    ($value:expr, $field:expr) => {{
        if $value == 0 {
            Err(ConfigError::InvalidConfig(format!(
                "{} must be greater than zero",
                $field
            )))
        } else {
            Ok($value)
        }
    }};
}

macro_rules! option_setter {
    ($(#[$meta:meta])* $fn_name:ident, $field:ident, $ty:ty) => {
        $(#[$meta])*
        pub fn $fn_name(mut self, value: $ty) -> Self {
            self.$field = Some(value);
            self
        }
    };
}

/// Builder for constructing [`AirbrakeHandler`] instances.
#[derive(Clone, Default)]
pub struct NotifierBuilder {
    api_key: Option<String>,
    environment: Option<String>,
    component_name: Option<String>,
    node_name: Option<String>,
    url: Option<String>,
    use_ssl: Option<bool>,
    timeout_ms: Option<u64>,
    shutdown_grace_ms: Option<u64>,
    format: Option<PayloadFormat>,
    backtrace_fallback: Option<BacktraceFallback>,
    retry: Option<RetryPolicy>,
    notifier: Option<NotifierInfo>,
    warn_interval: Option<Duration>,
    diagnostics: Option<Arc<dyn DiagnosticSink>>,
}

impl NotifierBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the project API key (required).
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    pub fn with_component_name(mut self, name: impl Into<String>) -> Self {
        self.component_name = Some(name.into());
        self
    }

    pub fn with_node_name(mut self, name: impl Into<String>) -> Self {
        self.node_name = Some(name.into());
        self
    }

    /// Override the notices endpoint.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    option_setter!(
        #[doc = "Force `https://` (true) or `http://` (false) on the service URL."]
        with_use_ssl,
        use_ssl,
        bool
    );
    option_setter!(
        #[doc = "Set the per-request timeout in milliseconds."]
        with_timeout_ms,
        timeout_ms,
        u64
    );
    option_setter!(
        #[doc = "Set how long shutdown waits for the worker, in milliseconds."]
        with_shutdown_grace_ms,
        shutdown_grace_ms,
        u64
    );
    option_setter!(with_format, format, PayloadFormat);
    option_setter!(
        #[doc = "Choose the backtrace sent for events without frames."]
        with_backtrace_fallback,
        backtrace_fallback,
        BacktraceFallback
    );
    option_setter!(
        #[doc = "Enable or disable retries of transient failures."]
        with_retry,
        retry,
        RetryPolicy
    );
    option_setter!(with_notifier_info, notifier, NotifierInfo);
    option_setter!(
        #[doc = "Set the minimum interval between dropped-notice warnings."]
        with_warn_interval,
        warn_interval,
        Duration
    );

    /// Send notices as JSON instead of XML.
    pub fn with_json_format(self) -> Self {
        self.with_format(PayloadFormat::Json)
    }

    /// Route delivery diagnostics to `sink` instead of the `log` facade.
    pub fn with_diagnostics(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.diagnostics = Some(sink);
        self
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.validate_api_key()?;
        self.validate_url()?;
        self.validate_durations()?;
        Ok(())
    }

    fn validate_api_key(&self) -> Result<(), ConfigError> {
        match &self.api_key {
            None => Err(ConfigError::InvalidConfig(
                "Airbrake notifier requires an API key".into(),
            )),
            Some(key) if key.trim().is_empty() => Err(ConfigError::InvalidConfig(
                "API key must not be empty".into(),
            )),
            _ => Ok(()),
        }
    }

    fn validate_url(&self) -> Result<(), ConfigError> {
        match &self.url {
            Some(url) if url.trim().is_empty() => Err(ConfigError::InvalidConfig(
                "URL must not be empty".into(),
            )),
            _ => Ok(()),
        }
    }

    fn validate_durations(&self) -> Result<(), ConfigError> {
        if let Some(timeout) = self.timeout_ms {
            ensure_positive!(timeout, "timeout_ms")?;
        }
        if let Some(grace) = self.shutdown_grace_ms {
            ensure_positive!(grace, "shutdown_grace_ms")?;
        }
        Ok(())
    }

    /// Validate the options and resolve defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidConfig`] when the API key is missing or
    /// blank, the URL is blank, or a duration is zero.
    pub fn build_config(&self) -> Result<NotifierConfig, ConfigError> {
        self.validate()?;

        let defaults = NotifierConfig::default();
        Ok(NotifierConfig {
            api_key: self.api_key.clone().unwrap_or_default(),
            environment: self.environment.clone(),
            component_name: self.component_name.clone(),
            node_name: self.node_name.clone(),
            url: self.url.clone().unwrap_or(defaults.url),
            use_ssl: self.use_ssl.unwrap_or(defaults.use_ssl),
            timeout: self
                .timeout_ms
                .map_or(defaults.timeout, Duration::from_millis),
            shutdown_grace: self
                .shutdown_grace_ms
                .map_or(defaults.shutdown_grace, Duration::from_millis),
            format: self.format.unwrap_or(defaults.format),
            backtrace_fallback: self.backtrace_fallback.unwrap_or(defaults.backtrace_fallback),
            retry: self.retry.clone().unwrap_or(defaults.retry),
            notifier: self.notifier.clone().unwrap_or(defaults.notifier),
            warn_interval: self.warn_interval.unwrap_or(defaults.warn_interval),
            diagnostics: self.diagnostics.clone().unwrap_or(defaults.diagnostics),
        })
    }

    /// Build the handler and start its worker thread.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when validation fails or the handler cannot
    /// start.
    pub fn build(&self) -> Result<AirbrakeHandler, ConfigError> {
        AirbrakeHandler::with_config(self.build_config()?)
    }
}

impl std::fmt::Debug for NotifierBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifierBuilder")
            .field("api_key_set", &self.api_key.is_some())
            .field("environment", &self.environment)
            .field("component_name", &self.component_name)
            .field("node_name", &self.node_name)
            .field("url", &self.url)
            .field("use_ssl", &self.use_ssl)
            .field("timeout_ms", &self.timeout_ms)
            .field("format", &self.format)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifier::{BackoffPolicy, DEFAULT_SERVICE_URL, DEFAULT_TIMEOUT};
    use rstest::rstest;

    #[test]
    fn defaults_apply_to_unset_options() {
        let config = NotifierBuilder::new()
            .with_api_key("abc123")
            .build_config()
            .expect("valid");
        assert_eq!(config.api_key, "abc123");
        assert_eq!(config.url, DEFAULT_SERVICE_URL);
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
        assert!(!config.use_ssl);
        assert_eq!(config.format, PayloadFormat::Xml);
        assert_eq!(config.retry, RetryPolicy::Disabled);
        assert_eq!(config.environment, None);
    }

    #[test]
    fn options_reach_config() {
        let retry = RetryPolicy::Backoff(BackoffPolicy::default());
        let config = NotifierBuilder::new()
            .with_api_key("abc123")
            .with_environment("production")
            .with_component_name("billing")
            .with_node_name("web-1")
            .with_url("https://errors.example.com/notices")
            .with_use_ssl(false)
            .with_timeout_ms(1500)
            .with_shutdown_grace_ms(250)
            .with_json_format()
            .with_backtrace_fallback(BacktraceFallback::Empty)
            .with_retry(retry.clone())
            .build_config()
            .expect("valid");
        assert_eq!(config.environment.as_deref(), Some("production"));
        assert_eq!(config.component_name.as_deref(), Some("billing"));
        assert_eq!(config.node_name.as_deref(), Some("web-1"));
        assert_eq!(config.timeout, Duration::from_millis(1500));
        assert_eq!(config.shutdown_grace, Duration::from_millis(250));
        assert_eq!(config.format, PayloadFormat::Json);
        assert_eq!(config.backtrace_fallback, BacktraceFallback::Empty);
        assert_eq!(config.retry, retry);
        assert_eq!(config.service_url(), "http://errors.example.com/notices");
    }

    #[rstest]
    #[case::missing_key(NotifierBuilder::new(), "requires an API key")]
    #[case::blank_key(NotifierBuilder::new().with_api_key("  "), "API key must not be empty")]
    #[case::blank_url(
        NotifierBuilder::new().with_api_key("k").with_url(""),
        "URL must not be empty"
    )]
    #[case::zero_timeout(
        NotifierBuilder::new().with_api_key("k").with_timeout_ms(0),
        "timeout_ms must be greater than zero"
    )]
    #[case::zero_grace(
        NotifierBuilder::new().with_api_key("k").with_shutdown_grace_ms(0),
        "shutdown_grace_ms must be greater than zero"
    )]
    fn invalid_options_are_rejected(#[case] builder: NotifierBuilder, #[case] expected: &str) {
        let err = builder.build_config().expect_err("invalid");
        assert!(matches!(err, ConfigError::InvalidConfig(_)));
        assert!(err.to_string().contains(expected), "{err}");
    }

    #[test]
    fn debug_hides_api_key() {
        let builder = NotifierBuilder::new().with_api_key("secret-key");
        assert!(!format!("{builder:?}").contains("secret-key"));
    }

    #[test]
    fn build_starts_handler() {
        let handler = NotifierBuilder::new()
            .with_api_key("abc123")
            .with_use_ssl(true)
            .build()
            .expect("handler");
        assert_eq!(
            handler.service_url(),
            "https://airbrakeapp.com/notifier_api/v2/notices"
        );
        handler.shutdown().expect("idle worker exits");
    }
}
