//! Tag and attribute name utilities
//!
//! Grammar front-ends hand us raw strings for element and attribute names.
//! Names are checked once while a schema is built so that the compact
//! encoding and the token alphabet never carry garbage.

use crate::error::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;

/// Reserved token name standing for character data
pub const TEXT_TOKEN: &str = "#text";

// Simplified XML Name production, optionally prefixed
static TAG_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^([A-Z_a-z\u{C0}-\u{D6}\u{D8}-\u{F6}\u{F8}-\u{2FF}][A-Z_a-z0-9\-\.\u{B7}\u{C0}-\u{D6}\u{D8}-\u{F6}\u{F8}-\u{2FF}]*:)?[A-Z_a-z\u{C0}-\u{D6}\u{D8}-\u{F6}\u{F8}-\u{2FF}][A-Z_a-z0-9\-\.\u{B7}\u{C0}-\u{D6}\u{D8}-\u{F6}\u{F8}-\u{2FF}]*$",
    )
    .unwrap()
});

/// Check if a string is a usable element or attribute name
pub fn is_valid_name(name: &str) -> bool {
    TAG_NAME.is_match(name)
}

/// Check if a name is the reserved text symbol
pub fn is_text_token(name: &str) -> bool {
    name == TEXT_TOKEN
}

/// Validate an element name and return an error if invalid
pub fn validate_tag_name(name: &str) -> Result<()> {
    if is_valid_name(name) {
        Ok(())
    } else {
        Err(Error::Name(format!("Invalid element name: '{}'", name)))
    }
}

/// Validate an attribute name and return an error if invalid
pub fn validate_attribute_name(name: &str) -> Result<()> {
    if is_valid_name(name) {
        Ok(())
    } else {
        Err(Error::Name(format!("Invalid attribute name: '{}'", name)))
    }
}
