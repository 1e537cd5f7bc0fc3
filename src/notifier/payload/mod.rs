//! Conversion of [`ErrorEvent`]s into wire payloads.
//!
//! The builder first borrows the event into a [`Notice`], the format-neutral
//! shape of one Airbrake notice, and then renders it as XML or JSON.

mod json;
mod xml;

use serde::Serialize;

use crate::error::BuildError;
use crate::event::ErrorEvent;

use super::config::{BacktraceFallback, NotifierConfig, NotifierInfo, PayloadFormat};

/// Notice schema version announced in every payload.
pub const NOTICE_VERSION: &str = "2.0";

/// A serialized notice ready for delivery.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Payload {
    body: String,
    content_type: &'static str,
}

impl Payload {
    pub fn new(body: impl Into<String>, content_type: &'static str) -> Self {
        Self {
            body: body.into(),
            content_type,
        }
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn content_type(&self) -> &'static str {
        self.content_type
    }

    pub fn into_body(self) -> String {
        self.body
    }
}

/// Builds payloads using the static parts of a handler's configuration.
#[derive(Clone, Debug)]
pub struct PayloadBuilder {
    api_key: String,
    environment: Option<String>,
    component_name: Option<String>,
    node_name: Option<String>,
    notifier: NotifierInfo,
    format: PayloadFormat,
    fallback: BacktraceFallback,
}

impl PayloadBuilder {
    pub fn from_config(config: &NotifierConfig) -> Self {
        Self {
            api_key: config.api_key.clone(),
            environment: config.environment.clone(),
            component_name: config.component_name.clone(),
            node_name: config.node_name.clone(),
            notifier: config.notifier.clone(),
            format: config.format,
            fallback: config.backtrace_fallback,
        }
    }

    /// Convert `event` into a payload in the configured format.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError`] when a field cannot be represented in the
    /// output format.
    pub fn build(&self, event: &ErrorEvent) -> Result<Payload, BuildError> {
        let notice = self.notice(event);
        let body = match self.format {
            PayloadFormat::Xml => xml::render(&notice)?,
            PayloadFormat::Json => json::render(&notice)?,
        };
        Ok(Payload::new(body, self.format.content_type()))
    }

    fn notice<'a>(&'a self, event: &'a ErrorEvent) -> Notice<'a> {
        let component = event
            .component_name
            .as_deref()
            .or(self.component_name.as_deref());
        let node = event.node_name.as_deref().or(self.node_name.as_deref());
        let request = (component.is_some() || node.is_some()).then(|| RequestBlock {
            url: "",
            component: component.unwrap_or_default(),
            cgi_data: CgiData {
                node_name: node.unwrap_or_default(),
                component_name: component.unwrap_or_default(),
            },
        });

        Notice {
            version: NOTICE_VERSION,
            api_key: &self.api_key,
            notifier: &self.notifier,
            server_environment: ServerEnvironment {
                environment_name: self.environment.as_deref().unwrap_or_default(),
            },
            request,
            error: ErrorBlock {
                class: event.exception_class(),
                message: event.full_message(),
                backtrace: self.backtrace(event),
            },
        }
    }

    fn backtrace<'a>(&self, event: &'a ErrorEvent) -> Vec<BacktraceLine<'a>> {
        if let Some(frames) = event.frames() {
            return frames
                .iter()
                .map(|frame| BacktraceLine {
                    file: &frame.filename,
                    number: Some(frame.lineno),
                    method: frame.method_label(),
                })
                .collect();
        }
        let line = match (self.fallback, event.call_site.as_ref()) {
            (BacktraceFallback::CallSite, Some(site)) => BacktraceLine {
                file: &site.filename,
                number: Some(site.lineno),
                method: site.function.clone(),
            },
            _ => BacktraceLine::empty(),
        };
        vec![line]
    }
}

/// Format-neutral view of one notice, borrowing from the event.
#[derive(Debug, Serialize)]
pub(super) struct Notice<'a> {
    version: &'static str,
    api_key: &'a str,
    notifier: &'a NotifierInfo,
    server_environment: ServerEnvironment<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    request: Option<RequestBlock<'a>>,
    error: ErrorBlock<'a>,
}

#[derive(Debug, Serialize)]
struct ServerEnvironment<'a> {
    environment_name: &'a str,
}

#[derive(Debug, Serialize)]
struct RequestBlock<'a> {
    url: &'static str,
    component: &'a str,
    cgi_data: CgiData<'a>,
}

#[derive(Debug, Serialize)]
struct CgiData<'a> {
    #[serde(rename = "nodeName")]
    node_name: &'a str,
    #[serde(rename = "componentName")]
    component_name: &'a str,
}

#[derive(Debug, Serialize)]
struct ErrorBlock<'a> {
    class: &'a str,
    message: String,
    backtrace: Vec<BacktraceLine<'a>>,
}

#[derive(Debug, Serialize)]
struct BacktraceLine<'a> {
    file: &'a str,
    /// `None` renders as an empty `number` attribute.
    number: Option<u32>,
    method: String,
}

impl BacktraceLine<'_> {
    fn empty() -> Self {
        Self {
            file: "",
            number: None,
            method: String::new(),
        }
    }
}
