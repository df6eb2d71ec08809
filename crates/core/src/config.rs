//! Gateway runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into the gateway. Values
//! come from a string-keyed lookup so the binary can read process environment variables while
//! tests supply a map; nothing in this crate reads the environment during request handling.

use crate::constants::{
    DEFAULT_TRANSPORT_TIMEOUT_SECS, KEY_DETAILED_REJECTIONS, KEY_PENDING_TIMEOUT_SECS,
    KEY_RECEIVING_APPLICATION, KEY_RECEIVING_FACILITY, KEY_REGISTRY_HOST, KEY_REGISTRY_PORT,
    KEY_REPORT_REJECTIONS, KEY_SENDING_APPLICATION, KEY_SENDING_FACILITY,
    KEY_TRANSPORT_TIMEOUT_SECS,
};
use crate::{GatewayError, GatewayResult};
use hl7::{FeedHeader, RejectionDetail};
use std::time::Duration;

/// Gateway configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct GatewayConfig {
    feed_header: FeedHeader,
    registry_host: String,
    registry_port: u16,
    transport_timeout: Duration,
    pending_timeout: Option<Duration>,
    report_rejections: bool,
    rejection_detail: RejectionDetail,
}

impl GatewayConfig {
    /// Create a new `GatewayConfig` with default behaviour switches.
    ///
    /// Defaults: 30 second transport timeout, pending requests never expire, rejections are not
    /// replied to and use the fixed rejection message.
    pub fn new(
        feed_header: FeedHeader,
        registry_host: String,
        registry_port: u16,
    ) -> GatewayResult<Self> {
        let required = [
            ("sending application", &feed_header.sending_application),
            ("sending facility", &feed_header.sending_facility),
            ("receiving application", &feed_header.receiving_application),
            ("receiving facility", &feed_header.receiving_facility),
            ("registry host", &registry_host),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(GatewayError::Config(format!("{name} cannot be empty")));
            }
        }
        if registry_port == 0 {
            return Err(GatewayError::Config("registry port cannot be 0".into()));
        }

        Ok(Self {
            feed_header,
            registry_host,
            registry_port,
            transport_timeout: Duration::from_secs(DEFAULT_TRANSPORT_TIMEOUT_SECS),
            pending_timeout: None,
            report_rejections: false,
            rejection_detail: RejectionDetail::Fixed,
        })
    }

    /// Resolve the configuration from a string-keyed lookup such as `std::env::var`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Config`] when a required key is missing or a value does not parse.
    pub fn from_lookup<F>(lookup: F) -> GatewayResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key).ok_or_else(|| GatewayError::Config(format!("{key} is not set")))
        };

        let feed_header = FeedHeader {
            sending_application: required(KEY_SENDING_APPLICATION)?,
            sending_facility: required(KEY_SENDING_FACILITY)?,
            receiving_application: required(KEY_RECEIVING_APPLICATION)?,
            receiving_facility: required(KEY_RECEIVING_FACILITY)?,
        };
        let registry_host = required(KEY_REGISTRY_HOST)?;
        let registry_port = required(KEY_REGISTRY_PORT)?;
        let registry_port = registry_port.trim().parse::<u16>().map_err(|e| {
            GatewayError::Config(format!("{KEY_REGISTRY_PORT} '{registry_port}': {e}"))
        })?;

        let mut cfg = Self::new(feed_header, registry_host, registry_port)?;

        if let Some(timeout) =
            duration_from_env_value(KEY_TRANSPORT_TIMEOUT_SECS, lookup(KEY_TRANSPORT_TIMEOUT_SECS))?
        {
            cfg.transport_timeout = timeout;
        }
        cfg.pending_timeout =
            duration_from_env_value(KEY_PENDING_TIMEOUT_SECS, lookup(KEY_PENDING_TIMEOUT_SECS))?;
        cfg.report_rejections =
            flag_from_env_value(KEY_REPORT_REJECTIONS, lookup(KEY_REPORT_REJECTIONS))?;
        if flag_from_env_value(KEY_DETAILED_REJECTIONS, lookup(KEY_DETAILED_REJECTIONS))? {
            cfg.rejection_detail = RejectionDetail::Detailed;
        }

        Ok(cfg)
    }

    pub fn with_transport_timeout(mut self, timeout: Duration) -> Self {
        self.transport_timeout = timeout;
        self
    }

    pub fn with_pending_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.pending_timeout = timeout.filter(|t| !t.is_zero());
        self
    }

    pub fn with_report_rejections(mut self, report: bool) -> Self {
        self.report_rejections = report;
        self
    }

    pub fn with_rejection_detail(mut self, detail: RejectionDetail) -> Self {
        self.rejection_detail = detail;
        self
    }

    pub fn feed_header(&self) -> &FeedHeader {
        &self.feed_header
    }

    pub fn registry_host(&self) -> &str {
        &self.registry_host
    }

    pub fn registry_port(&self) -> u16 {
        self.registry_port
    }

    pub fn transport_timeout(&self) -> Duration {
        self.transport_timeout
    }

    /// How long a dispatched request may wait for its response. `None` means forever.
    pub fn pending_timeout(&self) -> Option<Duration> {
        self.pending_timeout
    }

    /// Whether non-success outcomes are replied to the original caller.
    pub fn report_rejections(&self) -> bool {
        self.report_rejections
    }

    pub fn rejection_detail(&self) -> RejectionDetail {
        self.rejection_detail
    }
}

/// Parse a whole number of seconds from an optional string value.
///
/// `None`, empty/whitespace and `0` all mean "not set".
pub fn duration_from_env_value(
    key: &str,
    value: Option<String>,
) -> GatewayResult<Option<Duration>> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());
    let Some(value) = value else {
        return Ok(None);
    };

    let secs = value
        .parse::<u64>()
        .map_err(|e| GatewayError::Config(format!("{key} '{value}': {e}")))?;
    Ok((secs > 0).then(|| Duration::from_secs(secs)))
}

/// Parse a boolean switch from an optional string value. Unset means `false`.
pub fn flag_from_env_value(key: &str, value: Option<String>) -> GatewayResult<bool> {
    let Some(value) = value else {
        return Ok(false);
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "" | "0" | "false" | "no" | "off" => Ok(false),
        "1" | "true" | "yes" | "on" => Ok(true),
        other => Err(GatewayError::Config(format!(
            "{key} must be true or false, got '{other}'"
        ))),
    }
}
