//! Rendering of notices as Airbrake v2 XML documents.
//!
//! Elements are written without insignificant whitespace. Text and attribute
//! values are escaped; characters XML 1.0 cannot carry at all are rejected
//! with [`BuildError::InvalidCharacter`] instead of being silently mangled.

use crate::error::BuildError;

use super::{BacktraceLine, Notice};

const DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

pub(super) fn render(notice: &Notice<'_>) -> Result<String, BuildError> {
    let mut xml = XmlWriter::new();
    xml.open("notice", &[("version", notice.version)])?;
    xml.text_element("api-key", notice.api_key)?;

    xml.open("notifier", &[])?;
    xml.text_element("name", &notice.notifier.name)?;
    xml.text_element("version", &notice.notifier.version)?;
    xml.text_element("url", &notice.notifier.url)?;
    xml.close("notifier");

    xml.open("server-environment", &[])?;
    xml.text_element(
        "environment-name",
        notice.server_environment.environment_name,
    )?;
    xml.close("server-environment");

    if let Some(request) = &notice.request {
        xml.open("request", &[])?;
        xml.text_element("url", request.url)?;
        xml.text_element("component", request.component)?;
        xml.open("cgi-data", &[])?;
        xml.open("var", &[("key", "nodeName")])?;
        xml.text(request.cgi_data.node_name, "nodeName")?;
        xml.close("var");
        xml.open("var", &[("key", "componentName")])?;
        xml.text(request.cgi_data.component_name, "componentName")?;
        xml.close("var");
        xml.close("cgi-data");
        xml.close("request");
    }

    xml.open("error", &[])?;
    xml.text_element("class", notice.error.class)?;
    xml.text_element("message", &notice.error.message)?;
    xml.open("backtrace", &[])?;
    for line in &notice.error.backtrace {
        write_line(&mut xml, line)?;
    }
    xml.close("backtrace");
    xml.close("error");

    xml.close("notice");
    Ok(xml.finish())
}

fn write_line(xml: &mut XmlWriter, line: &BacktraceLine<'_>) -> Result<(), BuildError> {
    let number = line.number.map(|n| n.to_string()).unwrap_or_default();
    xml.empty_element(
        "line",
        &[
            ("file", line.file),
            ("number", number.as_str()),
            ("method", line.method.as_str()),
        ],
    )
}

struct XmlWriter {
    out: String,
}

impl XmlWriter {
    fn new() -> Self {
        let mut out = String::with_capacity(512);
        out.push_str(DECLARATION);
        Self { out }
    }

    fn start_tag(&mut self, name: &str, attrs: &[(&'static str, &str)]) -> Result<(), BuildError> {
        self.out.push('<');
        self.out.push_str(name);
        for (key, value) in attrs {
            self.out.push(' ');
            self.out.push_str(key);
            self.out.push_str("=\"");
            escape_into(&mut self.out, key, value, true)?;
            self.out.push('"');
        }
        Ok(())
    }

    fn open(&mut self, name: &str, attrs: &[(&'static str, &str)]) -> Result<(), BuildError> {
        self.start_tag(name, attrs)?;
        self.out.push('>');
        Ok(())
    }

    fn empty_element(
        &mut self,
        name: &str,
        attrs: &[(&'static str, &str)],
    ) -> Result<(), BuildError> {
        self.start_tag(name, attrs)?;
        self.out.push_str("/>");
        Ok(())
    }

    fn close(&mut self, name: &str) {
        self.out.push_str("</");
        self.out.push_str(name);
        self.out.push('>');
    }

    fn text(&mut self, value: &str, field: &'static str) -> Result<(), BuildError> {
        escape_into(&mut self.out, field, value, false)
    }

    fn text_element(&mut self, name: &'static str, value: &str) -> Result<(), BuildError> {
        self.open(name, &[])?;
        self.text(value, name)?;
        self.close(name);
        Ok(())
    }

    fn finish(self) -> String {
        self.out
    }
}

/// Whether `ch` may appear in an XML 1.0 document.
fn is_xml_char(ch: char) -> bool {
    matches!(ch, '\t' | '\n' | '\r')
        || ('\u{20}'..='\u{D7FF}').contains(&ch)
        || ('\u{E000}'..='\u{FFFD}').contains(&ch)
        || ch >= '\u{10000}'
}

fn escape_into(
    out: &mut String,
    field: &'static str,
    value: &str,
    attribute: bool,
) -> Result<(), BuildError> {
    for ch in value.chars() {
        if !is_xml_char(ch) {
            return Err(BuildError::InvalidCharacter { field, ch });
        }
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            // Attribute-value normalisation would fold these into spaces.
            '\n' if attribute => out.push_str("&#10;"),
            '\r' if attribute => out.push_str("&#13;"),
            '\t' if attribute => out.push_str("&#9;"),
            _ => out.push(ch),
        }
    }
    Ok(())
}
