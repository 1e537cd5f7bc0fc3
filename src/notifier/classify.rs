//! Mapping of HTTP status codes onto delivery outcomes.

use super::payload::Payload;

/// Whether a failed delivery could succeed if attempted again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Repeating the request cannot help (bad payload, wrong transport).
    Terminal,
    /// The service may accept the same payload later.
    Transient,
}

/// Result of classifying one delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Success,
    Failure { reason: String, kind: FailureKind },
}

impl DeliveryOutcome {
    fn terminal(reason: impl Into<String>) -> Self {
        Self::Failure {
            reason: reason.into(),
            kind: FailureKind::Terminal,
        }
    }

    fn transient(reason: impl Into<String>) -> Self {
        Self::Failure {
            reason: reason.into(),
            kind: FailureKind::Transient,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Classifies the status returned for `payload`.
///
/// # Classification rules
///
/// * **200** → success
/// * **403** → terminal: the service requires SSL
/// * **422** → terminal: the payload was rejected; the diagnostic embeds it
/// * **500** → transient: destination unavailable
/// * **503** → transient: over quota
/// * **Other** → transient, naming the unexpected code
pub fn classify_status(status: u16, payload: &Payload) -> DeliveryOutcome {
    match status {
        200 => DeliveryOutcome::Success,
        403 => DeliveryOutcome::terminal("Unable to send using SSL"),
        422 => DeliveryOutcome::terminal(format!("Invalid XML sent: {}", payload.body())),
        500 => DeliveryOutcome::transient(
            "Destination server is unavailable. Please check the remote server status.",
        ),
        503 => DeliveryOutcome::transient("Service unavailable. You may be over your quota."),
        other => DeliveryOutcome::transient(format!("Unexpected status code {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn payload() -> Payload {
        Payload::new("<notice/>", "text/xml")
    }

    #[test]
    fn ok_is_success() {
        assert!(classify_status(200, &payload()).is_success());
    }

    #[rstest]
    #[case(403, FailureKind::Terminal, "Unable to send using SSL")]
    #[case(422, FailureKind::Terminal, "Invalid XML sent: <notice/>")]
    #[case(
        500,
        FailureKind::Transient,
        "Destination server is unavailable. Please check the remote server status."
    )]
    #[case(503, FailureKind::Transient, "Service unavailable. You may be over your quota.")]
    #[case(404, FailureKind::Transient, "Unexpected status code 404")]
    #[case(301, FailureKind::Transient, "Unexpected status code 301")]
    #[case(201, FailureKind::Transient, "Unexpected status code 201")]
    #[case(0, FailureKind::Transient, "Unexpected status code 0")]
    fn failures_carry_kind_and_reason(
        #[case] status: u16,
        #[case] kind: FailureKind,
        #[case] reason: &str,
    ) {
        assert_eq!(
            classify_status(status, &payload()),
            DeliveryOutcome::Failure {
                reason: reason.to_owned(),
                kind,
            }
        );
    }

    #[test]
    fn classification_is_deterministic() {
        for status in 0..=999u16 {
            assert_eq!(
                classify_status(status, &payload()),
                classify_status(status, &payload())
            );
        }
    }
}
