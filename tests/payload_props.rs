//! Property tests for notice construction.

use airbrake_notifier::{
    BuildError, ErrorEvent, ExceptionInfo, NotifierConfig, PayloadFormat, StackFrame,
    notifier::PayloadBuilder,
};
use proptest::prelude::*;
use serde_json::Value;

fn builder(format: PayloadFormat) -> PayloadBuilder {
    PayloadBuilder::from_config(&NotifierConfig {
        api_key: "abc123".into(),
        environment: Some("prop".into()),
        format,
        ..Default::default()
    })
}

fn unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

fn element<'a>(body: &'a str, name: &str) -> &'a str {
    let open = format!("<{name}>");
    let close = format!("</{name}>");
    let start = body.find(&open).map_or(0, |i| i + open.len());
    let end = body.find(&close).unwrap_or(start);
    &body[start..end]
}

fn frames() -> impl Strategy<Value = Vec<StackFrame>> {
    prop::collection::vec(
        ("[a-z_/]{1,12}\\.rs", 1u32..5000, "[a-z_:]{1,16}")
            .prop_map(|(file, line, function)| StackFrame::new(file, line, function)),
        1..8,
    )
}

proptest! {
    #[test]
    fn plain_events_keep_message_and_blank_class(message in "\\PC*") {
        let payload = builder(PayloadFormat::Xml)
            .build(&ErrorEvent::new(message.clone()))
            .expect("printable text is valid XML");
        let body = payload.body();
        prop_assert!(body.contains("<class></class>"));
        prop_assert_eq!(unescape(element(body, "message")), message);
    }

    #[test]
    fn json_message_survives_unchanged(message in any::<String>()) {
        let payload = builder(PayloadFormat::Json)
            .build(&ErrorEvent::new(message.clone()))
            .expect("JSON accepts any string");
        let value: Value = serde_json::from_str(payload.body()).expect("valid JSON");
        prop_assert_eq!(value["error"]["message"].as_str(), Some(message.as_str()));
        prop_assert_eq!(value["error"]["class"].as_str(), Some(""));
    }

    #[test]
    fn every_frame_becomes_a_backtrace_line(frames in frames()) {
        let expected = frames.clone();
        let event = ErrorEvent::new("boom")
            .with_exception(ExceptionInfo::new("Panic", "boom").with_frames(frames));
        let payload = builder(PayloadFormat::Xml).build(&event).expect("builds");
        let body = payload.body();

        prop_assert_eq!(body.matches("<line ").count(), expected.len());
        let mut cursor = 0;
        for frame in &expected {
            let needle = format!(
                r#"<line file="{}" number="{}" method="{}"/>"#,
                frame.filename, frame.lineno, frame.function
            );
            let found = body[cursor..].find(&needle);
            prop_assert!(found.is_some(), "missing {} after offset {}", needle, cursor);
            cursor += found.unwrap_or_default() + needle.len();
        }
    }

    #[test]
    fn control_characters_are_refused(prefix in "[a-z]{0,8}", ch in 1u8..9) {
        let message = format!("{prefix}{}", char::from(ch));
        let err = builder(PayloadFormat::Xml)
            .build(&ErrorEvent::new(message))
            .expect_err("control characters cannot appear in XML");
        prop_assert!(
            matches!(err, BuildError::InvalidCharacter { field: "message", .. }),
            "unexpected error {:?}", err
        );
    }
}
