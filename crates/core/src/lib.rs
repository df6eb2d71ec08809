//! # PIX Core
//!
//! Core runtime of the PIX gateway.
//!
//! This crate turns identity change events from the master patient index into HL7 patient
//! identity feeds for the XDS registry:
//! - inbound event model and translation ([`event`])
//! - correlation of dispatched feeds with their acknowledgements ([`correlation`])
//! - the mailbox-driven orchestrator ([`gateway`])
//! - MLLP delivery to the registry ([`transport`])
//!
//! **No API concerns**: the HTTP front end lives in `api-rest`, HL7 encoding in `hl7`.

pub mod config;
pub mod constants;
pub mod correlation;
pub mod error;
pub mod event;
pub mod gateway;
pub mod transport;

pub use config::GatewayConfig;
pub use correlation::{CorrelationId, CorrelationStore, PendingRequest};
pub use error::{GatewayError, GatewayResult};
pub use event::{ChangeEvent, EventError, EventPayload, FeedKind};
pub use gateway::{
    ErrorReporter, Gateway, GatewayCommand, GatewayHandle, GatewayReply, ReplyTarget,
};
pub use transport::{MllpTransport, SocketRequest, Transport};

pub use hl7::{FeedHeader, RejectionDetail};
