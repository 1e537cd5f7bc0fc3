//! Error events handed to the notifier.
//!
//! An [`ErrorEvent`] is the record-like input consumed by
//! [`AirbrakeHandler::submit`](crate::AirbrakeHandler::submit). It carries the
//! log message, the optional exception that triggered it, and enough source
//! location data to build a backtrace for the remote service.

use std::error::Error;
use std::fmt;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::level::Level;

/// A single frame of a captured stack trace, outermost first.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackFrame {
    /// Source file where the frame originated.
    pub filename: String,
    /// Line number in the source file.
    pub lineno: u32,
    /// Function or method name.
    pub function: String,
    /// Source line text, when available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_line: Option<String>,
}

impl StackFrame {
    pub fn new(filename: impl Into<String>, lineno: u32, function: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            lineno,
            function: function.into(),
            source_line: None,
        }
    }

    /// Attach the source text of the frame's line.
    pub fn with_source_line(mut self, text: impl Into<String>) -> Self {
        self.source_line = Some(text.into());
        self
    }

    /// Method label reported to the service.
    ///
    /// `"<function>: <source line>"` when source text is known, otherwise the
    /// bare function name.
    pub fn method_label(&self) -> String {
        match self.source_line.as_deref() {
            Some(text) => format!("{}: {}", self.function, text),
            None => self.function.clone(),
        }
    }
}

/// Exception attached to an event.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionInfo {
    /// Runtime type name of the exception.
    pub class_name: String,
    /// String form of the exception.
    pub message: String,
    /// Captured stack trace, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frames: Option<Vec<StackFrame>>,
}

impl ExceptionInfo {
    pub fn new(class_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            message: message.into(),
            frames: None,
        }
    }

    /// Capture an error value using its Rust type name as the class.
    ///
    /// The module path is stripped so `std::io::Error` reports as `Error`,
    /// matching the short class names the service groups by. The name comes
    /// from the static type: `Box` and `Arc` wrappers are looked through, but
    /// a trait object reports the trait's name (`&*boxed` for a
    /// `Box<dyn Error + Send + Sync>` gives `Error`). Pass the concrete error
    /// to get its own name.
    pub fn from_error<E>(err: &E) -> Self
    where
        E: Error + ?Sized,
    {
        Self::new(short_type_name::<E>(), err.to_string())
    }

    pub fn with_frames(mut self, frames: Vec<StackFrame>) -> Self {
        self.frames = Some(frames);
        self
    }
}

fn short_type_name<T: ?Sized>() -> String {
    let mut name = std::any::type_name::<T>();
    loop {
        let inner = ["alloc::boxed::Box<", "alloc::sync::Arc<", "alloc::rc::Rc<"]
            .iter()
            .find_map(|wrapper| name.strip_prefix(wrapper))
            .and_then(|rest| rest.strip_suffix('>'));
        match inner {
            Some(inner) => name = inner,
            None => break,
        }
    }
    let name = name.strip_prefix("dyn ").unwrap_or(name);
    let base = name.split(['<', ' ']).next().unwrap_or(name);
    base.rsplit("::").next().unwrap_or(base).to_owned()
}

/// Source location of the log call that produced an event.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallSite {
    pub filename: String,
    pub lineno: u32,
    pub function: String,
}

impl CallSite {
    pub fn new(filename: impl Into<String>, lineno: u32, function: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            lineno,
            function: function.into(),
        }
    }
}

/// Capture the caller's file and line as a [`CallSite`].
///
/// The function field holds the enclosing module path.
#[macro_export]
macro_rules! call_site {
    () => {
        $crate::CallSite::new(file!(), line!(), module_path!())
    };
}

/// The occurrence reported to the remote service.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ErrorEvent {
    pub message: String,
    pub level: Level,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception: Option<ExceptionInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_site: Option<CallSite>,
    /// Overrides the handler's component name for this event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component_name: Option<String>,
    /// Overrides the handler's node name for this event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_name: Option<String>,
    pub timestamp: SystemTime,
}

impl ErrorEvent {
    /// Create an event at [`Level::Error`] with no exception attached.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            level: Level::Error,
            exception: None,
            call_site: None,
            component_name: None,
            node_name: None,
            timestamp: SystemTime::now(),
        }
    }

    /// Create an event describing `err`, using `message` as the log message.
    pub fn from_error<E>(message: impl Into<String>, err: &E) -> Self
    where
        E: Error + ?Sized,
    {
        Self::new(message).with_exception(ExceptionInfo::from_error(err))
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn with_exception(mut self, exception: ExceptionInfo) -> Self {
        self.exception = Some(exception);
        self
    }

    pub fn with_call_site(mut self, call_site: CallSite) -> Self {
        self.call_site = Some(call_site);
        self
    }

    pub fn with_component_name(mut self, component: impl Into<String>) -> Self {
        self.component_name = Some(component.into());
        self
    }

    pub fn with_node_name(mut self, node: impl Into<String>) -> Self {
        self.node_name = Some(node.into());
        self
    }

    /// Exception class reported to the service; empty without an exception.
    pub fn exception_class(&self) -> &str {
        self.exception
            .as_ref()
            .map_or("", |exc| exc.class_name.as_str())
    }

    /// Message reported to the service.
    pub fn full_message(&self) -> String {
        match &self.exception {
            Some(exc) => format!("{}: {}", self.message, exc.message),
            None => self.message.clone(),
        }
    }

    /// Stack frames of the attached exception, if a trace was captured.
    pub fn frames(&self) -> Option<&[StackFrame]> {
        self.exception
            .as_ref()
            .and_then(|exc| exc.frames.as_deref())
    }
}

impl fmt::Display for ErrorEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.level, self.full_message())
    }
}
