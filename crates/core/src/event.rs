//! Inbound identity change events.
//!
//! The front end hands the gateway a JSON payload describing an identity change in the master
//! patient index. This module holds the wire model for that payload ([`EventPayload`]) and its
//! translation into the canonical [`ChangeEvent`] the gateway acts on.
//!
//! Selection rules:
//! - `transition` containing `JOIN` and `source` containing `ADD`: register ([`ChangeEvent::Add`])
//! - `transition` containing `JOIN` and `source` containing `UPDATE`: merge
//!   ([`ChangeEvent::Merge`])
//! - anything else is not an event the gateway forwards
//!
//! From each identifier list only the entry whose domain name contains
//! [`OPENEMPI_DOMAIN_MARKER`] is used (the last one when several match). Its authority fields
//! populate every identifier built from the event, including the retired identifier of a merge.

use crate::constants::OPENEMPI_DOMAIN_MARKER;
use pix_types::{AssigningAuthority, Identifier};
use serde::{Deserialize, Serialize};

/// Errors raised while reading an inbound event.
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("invalid event payload: {0}")]
    InvalidPayload(String),
    #[error("no usable OpenEMPI identifier in {0}")]
    MissingIdentifier(&'static str),
}

/// The two feed shapes the gateway sends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FeedKind {
    Add,
    Merge,
}

impl FeedKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Merge => "merge",
        }
    }
}

impl std::fmt::Display for FeedKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A canonical identity change.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChangeEvent {
    /// A new patient identity was created.
    Add { identifiers: Vec<Identifier> },
    /// `pre_update_identifiers` were folded into `identifiers`.
    Merge {
        identifiers: Vec<Identifier>,
        pre_update_identifiers: Vec<Identifier>,
    },
}

impl ChangeEvent {
    /// Translate a payload into an event.
    ///
    /// Returns `Ok(None)` when the `source`/`transition` combination is not one the gateway
    /// forwards.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::MissingIdentifier`] when a list needed by the selected event has no
    /// usable entry.
    pub fn from_payload(payload: &EventPayload) -> Result<Option<Self>, EventError> {
        let Some(kind) = payload.feed_kind() else {
            return Ok(None);
        };

        let post = select_openempi(&payload.post_update_identifiers)
            .ok_or(EventError::MissingIdentifier("postUpdateIdentifiers"))?;
        let authority = post.identifier_domain.authority();
        let identifier = Identifier::new(&post.identifier, authority.clone())
            .map_err(|_| EventError::MissingIdentifier("postUpdateIdentifiers"))?;

        let event = match kind {
            FeedKind::Add => Self::Add {
                identifiers: vec![identifier],
            },
            FeedKind::Merge => {
                let pre = select_openempi(&payload.pre_update_identifiers)
                    .ok_or(EventError::MissingIdentifier("preUpdateIdentifiers"))?;
                let retired = Identifier::new(&pre.identifier, authority)
                    .map_err(|_| EventError::MissingIdentifier("preUpdateIdentifiers"))?;
                Self::Merge {
                    identifiers: vec![identifier],
                    pre_update_identifiers: vec![retired],
                }
            }
        };

        Ok(Some(event))
    }

    pub fn kind(&self) -> FeedKind {
        match self {
            Self::Add { .. } => FeedKind::Add,
            Self::Merge { .. } => FeedKind::Merge,
        }
    }

    /// The surviving (or newly created) identity.
    pub fn identifiers(&self) -> &[Identifier] {
        match self {
            Self::Add { identifiers } | Self::Merge { identifiers, .. } => identifiers,
        }
    }
}

fn select_openempi(entries: &[PayloadIdentifier]) -> Option<&PayloadIdentifier> {
    entries.iter().rev().find(|entry| {
        entry
            .identifier_domain
            .identifier_domain_name
            .as_deref()
            .is_some_and(|name| name.contains(OPENEMPI_DOMAIN_MARKER))
    })
}

// ============================================================================
// Wire types
// ============================================================================

/// Wire representation of an inbound identity change notification.
///
/// Unknown fields are ignored; the index sends far more than the gateway needs.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPayload {
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub transition: String,
    #[serde(default)]
    pub post_update_identifiers: Vec<PayloadIdentifier>,
    #[serde(default)]
    pub pre_update_identifiers: Vec<PayloadIdentifier>,
}

impl EventPayload {
    /// Parse a payload from JSON text.
    ///
    /// This uses `serde_path_to_error` so the error names the failing field (for example
    /// `postUpdateIdentifiers[0].identifier`).
    pub fn from_json(text: &str) -> Result<Self, EventError> {
        let mut deserializer = serde_json::Deserializer::from_str(text);
        let payload = serde_path_to_error::deserialize::<_, Self>(&mut deserializer).map_err(|err| {
            let path = err.path().to_string();
            let path = if path.is_empty() || path == "." {
                "<root>".to_string()
            } else {
                path
            };
            EventError::InvalidPayload(format!("at {path}: {}", err.into_inner()))
        })?;
        deserializer
            .end()
            .map_err(|e| EventError::InvalidPayload(e.to_string()))?;
        Ok(payload)
    }

    fn feed_kind(&self) -> Option<FeedKind> {
        if !self.transition.contains("JOIN") {
            return None;
        }
        if self.source.contains("ADD") {
            Some(FeedKind::Add)
        } else if self.source.contains("UPDATE") {
            Some(FeedKind::Merge)
        } else {
            None
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayloadIdentifier {
    pub identifier: String,
    #[serde(default)]
    pub identifier_domain: IdentifierDomain,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentifierDomain {
    #[serde(default)]
    pub identifier_domain_name: Option<String>,
    #[serde(default)]
    pub namespace_identifier: Option<String>,
    #[serde(default)]
    pub universal_identifier: Option<String>,
    #[serde(default)]
    pub universal_identifier_type_code: Option<String>,
}

impl IdentifierDomain {
    fn authority(&self) -> AssigningAuthority {
        AssigningAuthority::new(
            self.namespace_identifier.clone(),
            self.universal_identifier.clone(),
            self.universal_identifier_type_code.clone(),
        )
    }
}
