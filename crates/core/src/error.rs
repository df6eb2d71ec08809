use crate::correlation::CorrelationId;
use crate::event::EventError;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("invalid change event: {0}")]
    Event(#[from] EventError),
    #[error("failed to build feed message: {0}")]
    Encoding(hl7::Hl7Error),
    #[error("failed to parse registry response: {0}")]
    Parse(hl7::Hl7Error),
    #[error("correlation id {0} is already pending")]
    DuplicateCorrelationId(CorrelationId),
    #[error("transport failure for {correlation_id}: {reason}")]
    Transport {
        correlation_id: CorrelationId,
        reason: String,
    },
    #[error("gateway is not running")]
    Stopped,
}

pub type GatewayResult<T> = std::result::Result<T, GatewayError>;
