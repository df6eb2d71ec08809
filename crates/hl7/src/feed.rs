//! Patient identity feed translators.
//!
//! Builds the two outbound message shapes the gateway sends to the registry:
//! - `ADT^A04^ADT_A01`: register a new patient
//! - `ADT^A40^ADT_A39`: merge a retired identity into a surviving one
//!
//! Identifier lists are only read; each call produces a freshly encoded message.

use crate::message::{MessageBuilder, Position, SegmentBuilder};
use crate::Hl7Result;
use chrono::{DateTime, Utc};
use pix_types::Identifier;

/// Version stamped into `MSH-12`.
pub const HL7_VERSION: &str = "2.3.1";

/// Processing id stamped into `MSH-11` (production).
pub const PROCESSING_ID: &str = "P";

/// Patient class stamped into `PV1-2` of registrations (outpatient).
pub const OUTPATIENT_CLASS: &str = "O";

const MESSAGE_TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S%z";
const EVENT_DATE_FORMAT: &str = "%Y%m%d";

/// Sending and receiving endpoints written into every `MSH`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FeedHeader {
    pub sending_application: String,
    pub sending_facility: String,
    pub receiving_application: String,
    pub receiving_facility: String,
}

struct MessageType {
    code: &'static str,
    trigger: &'static str,
    structure: &'static str,
}

const ADT_A04: MessageType = MessageType {
    code: "ADT",
    trigger: "A04",
    structure: "ADT_A01",
};

const ADT_A40: MessageType = MessageType {
    code: "ADT",
    trigger: "A40",
    structure: "ADT_A39",
};

/// Builds feed messages for a fixed set of header endpoints.
#[derive(Clone, Debug)]
pub struct FeedBuilder {
    header: FeedHeader,
}

impl FeedBuilder {
    pub fn new(header: FeedHeader) -> Self {
        Self { header }
    }

    pub fn header(&self) -> &FeedHeader {
        &self.header
    }

    /// Builds a new-patient registration (`ADT^A04`) stamped with the current time.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Hl7Error::Encoding`] if any header or identifier value cannot be encoded.
    pub fn build_add_feed(
        &self,
        correlation_id: &str,
        identifiers: &[Identifier],
    ) -> Hl7Result<String> {
        self.build_add_feed_at(correlation_id, identifiers, Utc::now())
    }

    /// As [`FeedBuilder::build_add_feed`] with an explicit timestamp.
    pub fn build_add_feed_at(
        &self,
        correlation_id: &str,
        identifiers: &[Identifier],
        now: DateTime<Utc>,
    ) -> Hl7Result<String> {
        let mut message = MessageBuilder::new();
        self.write_header(message.header(), &ADT_A04, correlation_id, now)?;
        write_event(&mut message, now)?;

        let pid = message.segment("PID")?;
        for (repetition, id) in identifiers.iter().enumerate() {
            write_identifier(pid, 3, repetition, id)?;
        }

        message
            .segment("PV1")?
            .set(Position::field(2), OUTPATIENT_CLASS)?;

        Ok(message.encode())
    }

    /// Builds a patient merge (`ADT^A40`) stamped with the current time.
    ///
    /// `identifiers` is the surviving identity (written to `PID-3`), `pre_update_identifiers`
    /// the identity being retired (written to `MRG-1`).
    ///
    /// # Errors
    ///
    /// Returns [`crate::Hl7Error::Encoding`] if any header or identifier value cannot be encoded.
    pub fn build_merge_feed(
        &self,
        correlation_id: &str,
        identifiers: &[Identifier],
        pre_update_identifiers: &[Identifier],
    ) -> Hl7Result<String> {
        self.build_merge_feed_at(correlation_id, identifiers, pre_update_identifiers, Utc::now())
    }

    /// As [`FeedBuilder::build_merge_feed`] with an explicit timestamp.
    pub fn build_merge_feed_at(
        &self,
        correlation_id: &str,
        identifiers: &[Identifier],
        pre_update_identifiers: &[Identifier],
        now: DateTime<Utc>,
    ) -> Hl7Result<String> {
        let mut message = MessageBuilder::new();
        self.write_header(message.header(), &ADT_A40, correlation_id, now)?;
        write_event(&mut message, now)?;

        // PATIENT group: PID followed by MRG.
        let pid = message.segment("PID")?;
        for (repetition, id) in identifiers.iter().enumerate() {
            write_identifier(pid, 3, repetition, id)?;
        }

        let mrg = message.segment("MRG")?;
        for (repetition, id) in pre_update_identifiers.iter().enumerate() {
            write_identifier(mrg, 1, repetition, id)?;
        }

        Ok(message.encode())
    }

    fn write_header(
        &self,
        msh: &mut SegmentBuilder,
        message_type: &MessageType,
        correlation_id: &str,
        now: DateTime<Utc>,
    ) -> Hl7Result<()> {
        msh.set(Position::component(3, 1), &self.header.sending_application)?
            .set(Position::component(4, 1), &self.header.sending_facility)?
            .set(Position::component(5, 1), &self.header.receiving_application)?
            .set(Position::component(6, 1), &self.header.receiving_facility)?
            .set(
                Position::component(7, 1),
                &now.format(MESSAGE_TIMESTAMP_FORMAT).to_string(),
            )?
            .set(Position::component(9, 1), message_type.code)?
            .set(Position::component(9, 2), message_type.trigger)?
            .set(Position::component(9, 3), message_type.structure)?
            .set(Position::field(10), correlation_id)?
            .set(Position::component(11, 1), PROCESSING_ID)?
            .set(Position::component(12, 1), HL7_VERSION)?;
        Ok(())
    }
}

fn write_event(message: &mut MessageBuilder, now: DateTime<Utc>) -> Hl7Result<()> {
    message
        .segment("EVN")?
        .set(Position::field(2), &now.format(EVENT_DATE_FORMAT).to_string())?;
    Ok(())
}

/// Writes one CX identifier block: `value^^^namespace&universal id&universal id type`.
fn write_identifier(
    segment: &mut SegmentBuilder,
    field: usize,
    repetition: usize,
    id: &Identifier,
) -> Hl7Result<()> {
    let authority = id.authority();
    segment
        .set(Position::component(field, 1).with_repetition(repetition), id.value())?
        .set_opt(
            Position::subcomponent(field, 4, 1).with_repetition(repetition),
            authority.namespace_id(),
        )?
        .set_opt(
            Position::subcomponent(field, 4, 2).with_repetition(repetition),
            authority.universal_id(),
        )?
        .set_opt(
            Position::subcomponent(field, 4, 3).with_repetition(repetition),
            authority.universal_id_type(),
        )?;
    Ok(())
}
