//! ISO-8859-1 conversion.
//!
//! Every ISO-8859-1 byte maps to the Unicode code point of the same value, so the conversion is
//! a straight cast in both directions. Characters above U+00FF have no representation.

use crate::{Hl7Error, Hl7Result};

/// Encodes `text` as ISO-8859-1 bytes.
pub fn encode(text: &str) -> Hl7Result<Vec<u8>> {
    text.chars()
        .map(|c| {
            u8::try_from(u32::from(c)).map_err(|_| {
                Hl7Error::Encoding(format!("character {c:?} cannot be represented in ISO-8859-1"))
            })
        })
        .collect()
}

/// Decodes ISO-8859-1 bytes. Never fails.
pub fn decode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| char::from(*b)).collect()
}
