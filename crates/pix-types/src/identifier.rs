//! Patient identifiers and the authorities that issue them.

/// Errors raised when constructing an [`Identifier`].
#[derive(Debug, thiserror::Error)]
pub enum IdentifierError {
    #[error("identifier value cannot be empty")]
    EmptyValue,
}

/// The namespace that scopes the meaning of a patient identifier.
///
/// Every field is optional. `None` means "not specified" and is distinct from `Some("")`:
/// unspecified fields are left out of encoded messages altogether.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct AssigningAuthority {
    namespace_id: Option<String>,
    universal_id: Option<String>,
    universal_id_type: Option<String>,
}

impl AssigningAuthority {
    pub fn new(
        namespace_id: Option<String>,
        universal_id: Option<String>,
        universal_id_type: Option<String>,
    ) -> Self {
        Self {
            namespace_id,
            universal_id,
            universal_id_type,
        }
    }

    pub fn namespace_id(&self) -> Option<&str> {
        self.namespace_id.as_deref()
    }

    pub fn universal_id(&self) -> Option<&str> {
        self.universal_id.as_deref()
    }

    pub fn universal_id_type(&self) -> Option<&str> {
        self.universal_id_type.as_deref()
    }
}

/// A patient identifier paired with its issuing authority.
///
/// Immutable once built; equality and hashing are structural. The value is kept exactly as
/// given, surrounding whitespace included.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Identifier {
    value: String,
    authority: AssigningAuthority,
}

impl Identifier {
    /// Builds an identifier, rejecting an empty or whitespace-only value.
    pub fn new(
        value: impl Into<String>,
        authority: AssigningAuthority,
    ) -> Result<Self, IdentifierError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(IdentifierError::EmptyValue);
        }
        Ok(Self { value, authority })
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn authority(&self) -> &AssigningAuthority {
        &self.authority
    }
}
