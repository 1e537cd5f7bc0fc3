//! Load notifier settings from an INI file.
//!
//! Settings live in an `[airbrake]` section:
//!
//! ```ini
//! [airbrake]
//! api_key = abc123
//! environment = production
//! use_ssl = true
//! timeout_ms = 5000
//! format = json
//! ```
//!
//! Recognised keys are `api_key`, `environment`, `component_name`,
//! `node_name`, `url`, `use_ssl`, `timeout_ms`, `shutdown_grace_ms`,
//! `format` (`xml` or `json`) and `backtrace_fallback` (`call_site` or
//! `empty`). Unknown keys are rejected. The result is a
//! [`NotifierBuilder`], so validation happens when it is built.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use encoding_rs::Encoding;
use ini::{Ini, Properties};

use crate::builder::NotifierBuilder;
use crate::error::ConfigError;
use crate::notifier::{BacktraceFallback, PayloadFormat};

/// Section holding the notifier settings.
pub const SECTION: &str = "airbrake";

/// Read `path`, decode it with `encoding` (UTF-8 when `None`), and parse it.
///
/// # Errors
///
/// * [`ConfigError::NotFound`] - `path` does not exist
/// * [`ConfigError::UnknownEncoding`] / [`ConfigError::Decode`] - the bytes
///   cannot be decoded
/// * [`ConfigError::Ini`] - the file is not valid INI
/// * [`ConfigError::InvalidConfig`] - the section is missing or a value is
///   malformed
pub fn load_file(
    path: impl AsRef<Path>,
    encoding: Option<&str>,
) -> Result<NotifierBuilder, ConfigError> {
    let path = path.as_ref();
    let display = path.display().to_string();
    let bytes = read_file_bytes(path, &display)?;
    let text = decode_with_encoding(&bytes, encoding.unwrap_or("utf-8"), &display)?;
    parse(&display, &text)
}

/// Parse INI `text` held in memory.
///
/// # Errors
///
/// As [`load_file`], minus the file and decoding errors.
pub fn load_str(text: &str) -> Result<NotifierBuilder, ConfigError> {
    parse("<string>", text)
}

fn read_file_bytes(path: &Path, display: &str) -> Result<Vec<u8>, ConfigError> {
    fs::read(path).map_err(|err| match err.kind() {
        ErrorKind::NotFound => ConfigError::NotFound {
            path: display.to_owned(),
        },
        _ => ConfigError::Io(err),
    })
}

fn decode_with_encoding(bytes: &[u8], label: &str, display: &str) -> Result<String, ConfigError> {
    let normalized_label = label.trim().to_ascii_lowercase();
    let encoding = Encoding::for_label(normalized_label.as_bytes())
        .ok_or_else(|| ConfigError::UnknownEncoding(label.to_owned()))?;
    let (decoded, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        return Err(ConfigError::Decode {
            path: display.to_owned(),
            encoding: encoding.name().to_owned(),
        });
    }
    Ok(decoded.into_owned())
}

fn parse(display: &str, text: &str) -> Result<NotifierBuilder, ConfigError> {
    let ini = Ini::load_from_str(text).map_err(|err| ConfigError::Ini {
        path: display.to_owned(),
        message: err.to_string(),
    })?;
    let section = ini.section(Some(SECTION)).ok_or_else(|| {
        ConfigError::InvalidConfig(format!("{display} has no [{SECTION}] section"))
    })?;
    apply_section(NotifierBuilder::new(), section)
}

fn apply_section(
    mut builder: NotifierBuilder,
    section: &Properties,
) -> Result<NotifierBuilder, ConfigError> {
    for (key, value) in section.iter() {
        let value = value.trim();
        builder = match key {
            "api_key" => builder.with_api_key(value),
            "environment" => builder.with_environment(value),
            "component_name" => builder.with_component_name(value),
            "node_name" => builder.with_node_name(value),
            "url" => builder.with_url(value),
            "use_ssl" => builder.with_use_ssl(parse_bool(key, value)?),
            "timeout_ms" => builder.with_timeout_ms(parse_u64(key, value)?),
            "shutdown_grace_ms" => builder.with_shutdown_grace_ms(parse_u64(key, value)?),
            "format" => builder.with_format(parse_format(value)?),
            "backtrace_fallback" => builder.with_backtrace_fallback(parse_fallback(value)?),
            other => {
                return Err(ConfigError::InvalidConfig(format!(
                    "unknown key {other:?} in [{SECTION}]"
                )));
            }
        };
    }
    Ok(builder)
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidConfig(format!(
            "{key} must be a boolean, got {value:?}"
        ))),
    }
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse().map_err(|_| {
        ConfigError::InvalidConfig(format!("{key} must be a non-negative integer, got {value:?}"))
    })
}

fn parse_format(value: &str) -> Result<PayloadFormat, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "xml" => Ok(PayloadFormat::Xml),
        "json" => Ok(PayloadFormat::Json),
        _ => Err(ConfigError::InvalidConfig(format!(
            "format must be xml or json, got {value:?}"
        ))),
    }
}

fn parse_fallback(value: &str) -> Result<BacktraceFallback, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "call_site" => Ok(BacktraceFallback::CallSite),
        "empty" => Ok(BacktraceFallback::Empty),
        _ => Err(ConfigError::InvalidConfig(format!(
            "backtrace_fallback must be call_site or empty, got {value:?}"
        ))),
    }
}
