//! Acknowledgement classification.

use crate::message::{Message, Position};
use crate::Hl7Result;

/// Fixed prefix of every rejection message.
pub const REJECTION_MESSAGE: &str = "Failed to register new patient:\n";

const UNSUPPORTED_PREFIX: &str = "Message response received in unsupported format: ";

/// The interpreted result of a registry response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResponseOutcome {
    Success,
    Error { message: String },
}

impl ResponseOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// How much of the registry's error detail goes into a rejection message.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RejectionDetail {
    /// Only [`REJECTION_MESSAGE`].
    #[default]
    Fixed,
    /// [`REJECTION_MESSAGE`] followed by `MSA-3` and the `ERR-3` code and text, one per line.
    Detailed,
}

/// Classifies a raw registry response with the fixed rejection message.
///
/// # Errors
///
/// Returns [`crate::Hl7Error::Parse`] if `raw` is not an HL7 message. That is not an outcome:
/// the caller decides what an unreadable response means.
pub fn classify_response(raw: &str) -> Hl7Result<ResponseOutcome> {
    classify_response_with(raw, RejectionDetail::Fixed)
}

/// Classifies a raw registry response.
///
/// - `MSH-9-1` not `ACK` (any case): error naming the observed message type
/// - `MSA-1` equal to `AA` (any case): success
/// - anything else: rejection
pub fn classify_response_with(raw: &str, detail: RejectionDetail) -> Hl7Result<ResponseOutcome> {
    let message = Message::parse(raw)?;

    let is_ack = message
        .get("MSH", Position::component(9, 1))
        .is_some_and(|code| code.eq_ignore_ascii_case("ACK"));
    if !is_ack {
        let observed = message.raw_field("MSH", 9).unwrap_or("<none>");
        return Ok(ResponseOutcome::Error {
            message: format!("{UNSUPPORTED_PREFIX}{observed}"),
        });
    }

    let accepted = message
        .get("MSA", Position::field(1))
        .is_some_and(|code| code.eq_ignore_ascii_case("AA"));
    if accepted {
        return Ok(ResponseOutcome::Success);
    }

    let mut text = REJECTION_MESSAGE.to_string();
    if detail == RejectionDetail::Detailed {
        let details = [
            message.get("MSA", Position::field(3)),
            message.get("ERR", Position::component(3, 1)),
            message.get("ERR", Position::component(3, 2)),
        ];
        for line in details.into_iter().flatten() {
            text.push_str(&line);
            text.push('\n');
        }
    }

    Ok(ResponseOutcome::Error { message: text })
}
