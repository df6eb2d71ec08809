//! HL7 v2 wire boundary for the PIX gateway.
//!
//! This crate provides:
//! - a small ER7 segment codec ([`MessageBuilder`], [`Message`])
//! - the patient identity feed translators (ADT^A04 registration, ADT^A40 merge)
//! - acknowledgement classification
//! - ISO-8859-1 conversion for the transport
//!
//! It has no knowledge of sockets, correlation or the inbound JSON events.

pub mod ack;
pub mod feed;
pub mod latin1;
pub mod message;

pub use ack::{classify_response, classify_response_with, RejectionDetail, ResponseOutcome};
pub use feed::{FeedBuilder, FeedHeader};
pub use message::{Delimiters, Message, MessageBuilder, Position, SegmentBuilder};

/// Errors returned by the `hl7` boundary crate.
#[derive(Debug, thiserror::Error)]
pub enum Hl7Error {
    /// A message could not be built from the supplied values.
    #[error("failed to encode HL7 message: {0}")]
    Encoding(String),

    /// A received message is not valid ER7.
    #[error("failed to parse HL7 message: {0}")]
    Parse(String),
}

/// Type alias for Results that can fail with an [`Hl7Error`].
pub type Hl7Result<T> = Result<T, Hl7Error>;
