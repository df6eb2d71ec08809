//! Patient identifier value types shared across the gateway crates.
//!
//! These are plain values: construction validates, everything else is accessors.

mod identifier;

pub use identifier::{AssigningAuthority, Identifier, IdentifierError};
