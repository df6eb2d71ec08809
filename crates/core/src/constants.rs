//! Constants used throughout the gateway core.
//!
//! Configuration keys, defaults and fixed wire values live here so the binary, the front end and
//! the tests agree on them.

/// Marker that selects the identifier entry to forward from an inbound event.
pub const OPENEMPI_DOMAIN_MARKER: &str = "OpenEMPI";

/// Content type of a successful reply.
pub const HL7_CONTENT_TYPE: &str = "application/hl7-v2; charset=ISO-8859-1";

/// Content type of a rejection reply (only sent when rejections are reported).
pub const REJECTION_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// Label attached to every registry dispatch.
pub const FEED_LABEL: &str = "Sync XDS Registry PixFeed";

/// Capacity of the gateway mailbox.
pub const MAILBOX_CAPACITY: usize = 1024;

/// Default bound on connect + acknowledgement read for one dispatch.
pub const DEFAULT_TRANSPORT_TIMEOUT_SECS: u64 = 30;

pub const KEY_SENDING_APPLICATION: &str = "PIX_SENDING_APPLICATION";
pub const KEY_SENDING_FACILITY: &str = "PIX_SENDING_FACILITY";
pub const KEY_RECEIVING_APPLICATION: &str = "PIX_RECEIVING_APPLICATION";
pub const KEY_RECEIVING_FACILITY: &str = "PIX_RECEIVING_FACILITY";
pub const KEY_REGISTRY_HOST: &str = "XDS_REGISTRY_HOST";
pub const KEY_REGISTRY_PORT: &str = "XDS_REGISTRY_PORT";
pub const KEY_TRANSPORT_TIMEOUT_SECS: &str = "PIX_TRANSPORT_TIMEOUT_SECS";
pub const KEY_PENDING_TIMEOUT_SECS: &str = "PIX_PENDING_TIMEOUT_SECS";
pub const KEY_REPORT_REJECTIONS: &str = "PIX_REPORT_REJECTIONS";
pub const KEY_DETAILED_REJECTIONS: &str = "PIX_DETAILED_REJECTIONS";
